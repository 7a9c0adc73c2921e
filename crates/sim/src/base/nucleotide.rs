use core::fmt;

use crate::errors::InvalidNucleotide;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A DNA nucleotide base.
///
/// `Nucleotide` is a compact, Copyable representation of DNA bases backed by
/// a single byte (u8). The mapping of variants to integers is stable and used
/// throughout the crate (A=0, C=1, G=2, T=3); the nucleotide-transition
/// matrix of the mutation regime is indexed with it.
///
/// Unknown input characters (the FASTA `N` placeholder and friends) never
/// become a `Nucleotide` variant; ingest resolves them with [`Nucleotide::random`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Nucleotide {
    A = 0,
    C = 1,
    G = 2,
    T = 3,
}

/// Number of bases in the alphabet.
pub(crate) const ALPHABET_SIZE: usize = 4;

impl Nucleotide {
    /// Convert from u8 index (0-3).
    #[inline(always)]
    pub const fn from_index(idx: u8) -> Option<Self> {
        match idx {
            0 => Some(Self::A),
            1 => Some(Self::C),
            2 => Some(Self::G),
            3 => Some(Self::T),
            _ => None,
        }
    }

    /// Convert to the compact u8 index (0-3).
    #[inline(always)]
    pub const fn to_index(self) -> u8 {
        self as u8
    }

    /// Convert from an ASCII byte (`b'A'`, `b'C'`, `b'G'`, `b'T'`), also
    /// accepting lowercase. Returns `None` for non-standard characters.
    #[inline]
    pub const fn from_ascii(byte: u8) -> Option<Self> {
        match byte {
            b'A' | b'a' => Some(Self::A),
            b'C' | b'c' => Some(Self::C),
            b'G' | b'g' => Some(Self::G),
            b'T' | b't' => Some(Self::T),
            _ => None,
        }
    }

    /// Convert to an uppercase ASCII byte representing this nucleotide.
    #[inline(always)]
    pub const fn to_ascii(self) -> u8 {
        match self {
            Self::A => b'A',
            Self::C => b'C',
            Self::G => b'G',
            Self::T => b'T',
        }
    }

    /// Convert to an uppercase `char` representing this nucleotide.
    #[inline(always)]
    pub const fn to_char(self) -> char {
        self.to_ascii() as char
    }

    /// Draw a base uniformly from {A, C, G, T}.
    ///
    /// Used only at ingest, to resolve characters outside the alphabet.
    #[inline]
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let idx = rng.random_range(0..ALPHABET_SIZE as u8);
        Self::from_index(idx).expect("index within alphabet")
    }
}

impl TryFrom<u8> for Nucleotide {
    type Error = InvalidNucleotide;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Self::from_ascii(byte).ok_or(InvalidNucleotide(byte))
    }
}

impl From<Nucleotide> for char {
    #[inline(always)]
    fn from(nuc: Nucleotide) -> char {
        nuc.to_char()
    }
}

impl fmt::Display for Nucleotide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_char())
    }
}
