use crate::{ingest, reconcile};
use rust_decimal::Decimal;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to open configuration file for reading")]
    Open(#[from] std::io::Error),
    #[error("Could not decode the configuration")]
    Decode(#[from] ron::de::SpannedError),
}

/// Everything that can be configured, with each field falling back to its default if omitted.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    /// Amounts that differ by no more than this are considered equal.
    pub tolerance: Decimal,
    pub loyalty: ingest::Options,
    pub operations: ingest::Options,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            tolerance: reconcile::Options::default().tolerance,
            loyalty: ingest::Options::loyalty(),
            operations: ingest::Options::operations(),
        }
    }
}

impl Config {
    pub fn from_path(path: &Path) -> Result<Self, Error> {
        Ok(ron::de::from_reader(std::fs::File::open(path)?)?)
    }

    pub fn reconcile_options(&self) -> reconcile::Options {
        reconcile::Options {
            tolerance: self.tolerance,
        }
    }
}
