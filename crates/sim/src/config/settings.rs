//! Line-oriented `KEY=VALUE` settings-file parser.
//!
//! Whitespace is stripped from each line, `#` starts a comment, and
//! list-valued keys separate entries with `|`. Unrecognized keys are
//! ignored so settings files can carry annotations for other tools.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::errors::SettingsError;

const KEY_GENERATIONS: &str = "GEN";
const KEY_REPLICATES: &str = "REP";
const KEY_MARKER_SITES: &str = "SITES";
const KEY_MODE: &str = "MODE";
const KEY_MUTATION_RATES: &str = "MUT";
const KEY_MUTATION_KIMURA: &str = "MUT_KIMURA";
const KEY_MUTATION_FELSENSTEIN: &str = "MUT_FELSENSTEIN";
const KEY_SELECTION_RATES: &str = "SEL";
const KEY_MIGRATION_MODEL: &str = "MIG_MODEL";
const KEY_MIGRATION_MODE: &str = "MIG_MODE";
const KEY_MIGRATION_RATES: &str = "MIG_RATES";
const KEY_REDUCTION: &str = "REDUCTION";
const KEY_BOTTLENECK_START: &str = "START";
const KEY_BOTTLENECK_END: &str = "END";

const COMMENT: char = '#';
const DECLARATION: char = '=';
const LIST_SEPARATOR: char = '|';

/// Raw values read from a settings file, before digest validation.
///
/// Every field is optional at this stage; [`Digest::from_input`] applies
/// defaults and validates the combination.
///
/// [`Digest::from_input`]: crate::config::Digest::from_input
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub generations: Option<usize>,
    pub replicates: Option<usize>,
    pub marker_sites: Vec<usize>,
    pub mode: Option<u32>,
    pub mutation_rates: Option<Vec<f64>>,
    pub kimura_delta: Option<f64>,
    pub felsenstein_constants: Option<Vec<f64>>,
    pub selection_coefficients: Option<Vec<f64>>,
    pub migration_model: Option<u32>,
    pub migration_mode: Option<u32>,
    pub migration_rates: Option<Vec<u64>>,
    pub reduction: Option<f64>,
    pub bottleneck_start: Option<usize>,
    pub bottleneck_end: Option<usize>,
}

impl Settings {
    /// Read and parse a settings file from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Parse settings from any line-oriented reader.
    pub fn from_reader(reader: impl BufRead) -> Result<Self, SettingsError> {
        let mut settings = Self::default();

        for line in reader.lines() {
            let line: String = line?.chars().filter(|c| !c.is_whitespace()).collect();
            if line.is_empty() || line.starts_with(COMMENT) {
                continue;
            }

            let Some((key, value)) = line.split_once(DECLARATION) else {
                continue;
            };

            match key {
                KEY_GENERATIONS => {
                    settings.generations = Some(parse_scalar(KEY_GENERATIONS, value)?)
                }
                KEY_REPLICATES => {
                    settings.replicates = Some(parse_scalar(KEY_REPLICATES, value)?)
                }
                KEY_MARKER_SITES => {
                    settings.marker_sites = parse_list(KEY_MARKER_SITES, value)?
                }
                KEY_MODE => settings.mode = Some(parse_scalar(KEY_MODE, value)?),
                KEY_MUTATION_RATES => {
                    settings.mutation_rates = Some(parse_list(KEY_MUTATION_RATES, value)?)
                }
                KEY_MUTATION_KIMURA => {
                    settings.kimura_delta = Some(parse_scalar(KEY_MUTATION_KIMURA, value)?)
                }
                KEY_MUTATION_FELSENSTEIN => {
                    settings.felsenstein_constants =
                        Some(parse_list(KEY_MUTATION_FELSENSTEIN, value)?)
                }
                KEY_SELECTION_RATES => {
                    settings.selection_coefficients =
                        Some(parse_list(KEY_SELECTION_RATES, value)?)
                }
                KEY_MIGRATION_MODEL => {
                    settings.migration_model = Some(parse_scalar(KEY_MIGRATION_MODEL, value)?)
                }
                KEY_MIGRATION_MODE => {
                    settings.migration_mode = Some(parse_scalar(KEY_MIGRATION_MODE, value)?)
                }
                KEY_MIGRATION_RATES => {
                    settings.migration_rates = Some(parse_list(KEY_MIGRATION_RATES, value)?)
                }
                KEY_REDUCTION => {
                    settings.reduction = Some(parse_scalar(KEY_REDUCTION, value)?)
                }
                KEY_BOTTLENECK_START => {
                    settings.bottleneck_start = Some(parse_scalar(KEY_BOTTLENECK_START, value)?)
                }
                KEY_BOTTLENECK_END => {
                    settings.bottleneck_end = Some(parse_scalar(KEY_BOTTLENECK_END, value)?)
                }
                _ => {}
            }
        }

        Ok(settings)
    }
}

fn parse_scalar<T: std::str::FromStr>(
    key: &'static str,
    value: &str,
) -> Result<T, SettingsError> {
    value.parse().map_err(|_| SettingsError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

fn parse_list<T: std::str::FromStr>(
    key: &'static str,
    value: &str,
) -> Result<Vec<T>, SettingsError> {
    value
        .split(LIST_SEPARATOR)
        .filter(|entry| !entry.is_empty())
        .map(|entry| parse_scalar(key, entry))
        .collect()
}
