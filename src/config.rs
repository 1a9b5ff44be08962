//! JSON tuning configuration; every field is optional in the file

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    tuning::{FixedSettings, HyperparameterRanges},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningConfig {
    /// dataset file, may also come from the command line
    pub data: Option<PathBuf>,
    pub method: String,
    pub nfolds: usize,
    pub nevals: usize,
    pub ranges: HyperparameterRanges,
    /// batch_size, epochs, seed, ... sit at the top level of the file
    #[serde(flatten)]
    pub settings: FixedSettings,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            data: None,
            method: "particle swarm".to_string(),
            nfolds: 3,
            nevals: 20,
            ranges: HyperparameterRanges::default(),
            settings: FixedSettings::default(),
        }
    }
}

impl TuningConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
