use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

use crate::error::SalesError;

/// Env var naming a YAML config file.
pub const CONFIG_ENV: &str = "SALESPREP_CONFIG";
/// Env var naming a CSV path tried before the built-in candidates.
pub const CSV_ENV: &str = "SALES_CSV";

/// Knobs for the statistical date-column inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DateInference {
    /// Max non-null values sampled per column.
    pub sample_cap: usize,
    /// Fraction of the sample that must parse for a column to be accepted.
    pub min_success_ratio: f64,
    /// Case-insensitive name pattern checked before sampling.
    pub name_pattern: String,
}

impl Default for DateInference {
    fn default() -> Self {
        Self {
            sample_cap: 500,
            min_success_ratio: 0.5,
            name_pattern: "(?i)date|time".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Ordered list of paths searched when no explicit source is given.
    pub candidates: Vec<PathBuf>,
    pub date_inference: DateInference,
    /// Optional YAML synonym table replacing the built-in one.
    pub synonyms: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            candidates: default_candidates(),
            date_inference: DateInference::default(),
            synonyms: None,
        }
    }
}

fn default_candidates() -> Vec<PathBuf> {
    [
        "data/Sales.csv",
        "data/sales.csv",
        "Sales.csv",
        "sales.csv",
        "../Sales.csv",
    ]
    .iter()
    .map(PathBuf::from)
    .collect()
}

impl PipelineConfig {
    /// Parse a YAML document; missing keys fall back to defaults.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let cfg: PipelineConfig = serde_yaml::from_str(text).context("parsing pipeline config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text =
            fs::read_to_string(path).with_context(|| format!("reading config {:?}", path))?;
        Self::from_yaml(&text).with_context(|| format!("loading config {:?}", path))
    }

    /// Resolve the effective config: explicit file, else `SALESPREP_CONFIG`, else
    /// defaults; then apply `SALES_CSV`.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let from_env = env::var_os(CONFIG_ENV).map(PathBuf::from);
        let mut cfg = match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => {
                info!(path = %path.display(), "loading config");
                Self::from_file(&path)?
            }
            None => Self::default(),
        };
        if let Some(csv) = env::var_os(CSV_ENV) {
            cfg.prepend_candidate(PathBuf::from(csv));
        }
        Ok(cfg)
    }

    /// Put `path` at the front of the candidate list (deduplicated).
    pub fn prepend_candidate(&mut self, path: PathBuf) {
        self.candidates.retain(|p| p != &path);
        debug!(path = %path.display(), "prepending candidate");
        self.candidates.insert(0, path);
    }

    pub fn validate(&self) -> Result<(), SalesError> {
        let di = &self.date_inference;
        if di.sample_cap == 0 {
            return Err(SalesError::Config("date_inference.sample_cap must be > 0".into()));
        }
        if !(di.min_success_ratio > 0.0 && di.min_success_ratio <= 1.0) {
            return Err(SalesError::Config(format!(
                "date_inference.min_success_ratio must be in (0, 1], got {}",
                di.min_success_ratio
            )));
        }
        if let Err(e) = regex::Regex::new(&di.name_pattern) {
            return Err(SalesError::Config(format!(
                "date_inference.name_pattern is not a valid regex: {}",
                e
            )));
        }
        Ok(())
    }
}
