use std::fmt;

use super::Nucleotide;
use crate::errors::InvalidAllele;
use serde::{Deserialize, Serialize};

/// A haploid allele: the founding sequence projected onto the marker sites.
///
/// An `Allele` is an ordered, fixed-length sequence over {A, C, G, T}.
/// Identity is sequence equality, which makes the type usable as a hash-map
/// key when mutated copies are merged back into an allele table. Alleles are
/// immutable once observed; a point mutation produces a fresh value through
/// [`Allele::with_substitution`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Allele(Vec<Nucleotide>);

impl Allele {
    /// Build an allele from its bases. Fails on an empty sequence.
    pub fn from_bases(bases: Vec<Nucleotide>) -> Result<Self, InvalidAllele> {
        if bases.is_empty() {
            return Err(InvalidAllele::Empty);
        }
        Ok(Self(bases))
    }

    /// Parse an identifier string such as `"ACGT"`.
    pub fn parse(s: &str) -> Result<Self, InvalidAllele> {
        let bases = s
            .chars()
            .map(|c| {
                u8::try_from(c)
                    .ok()
                    .and_then(Nucleotide::from_ascii)
                    .ok_or(InvalidAllele::InvalidChar(c))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_bases(bases)
    }

    /// Number of marker sites covered by this allele.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Base at marker position `site` (0-based).
    #[inline]
    pub fn site(&self, site: usize) -> Option<Nucleotide> {
        self.0.get(site).copied()
    }

    /// Borrow the underlying bases.
    #[inline]
    pub fn as_slice(&self) -> &[Nucleotide] {
        &self.0
    }

    /// A new allele equal to `self` with the base at `site` replaced.
    ///
    /// Panics if `site` is out of bounds; callers iterate marker positions
    /// that are valid by construction.
    pub fn with_substitution(&self, site: usize, base: Nucleotide) -> Self {
        let mut bases = self.0.clone();
        bases[site] = base;
        Self(bases)
    }
}

impl fmt::Display for Allele {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &base in &self.0 {
            write!(f, "{}", base.to_char())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrip() {
        let allele = Allele::parse("ACGT").unwrap();
        assert_eq!(allele.len(), 4);
        assert_eq!(allele.to_string(), "ACGT");
        assert_eq!(allele.site(2), Some(Nucleotide::G));
        assert_eq!(allele.site(4), None);
    }

    #[test]
    fn test_parse_accepts_lowercase() {
        assert_eq!(Allele::parse("acgt").unwrap().to_string(), "ACGT");
    }

    #[test]
    fn test_parse_rejects_unknown_chars() {
        assert!(matches!(
            Allele::parse("ACNT"),
            Err(InvalidAllele::InvalidChar('N'))
        ));
        assert!(matches!(Allele::parse(""), Err(InvalidAllele::Empty)));
    }

    #[test]
    fn test_identity_is_sequence_equality() {
        let a = Allele::parse("ACGT").unwrap();
        let b = Allele::parse("ACGT").unwrap();
        let c = Allele::parse("ACGA").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_with_substitution_produces_new_value() {
        let a = Allele::parse("AAAA").unwrap();
        let b = a.with_substitution(2, Nucleotide::T);
        assert_eq!(a.to_string(), "AAAA");
        assert_eq!(b.to_string(), "AATA");
    }
}
