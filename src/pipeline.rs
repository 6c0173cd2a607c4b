use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use crate::config::PipelineConfig;
use crate::dates::resolve_date_column;
use crate::normalize::normalize_with;
use crate::schema::{CanonicalTable, SynonymTable};
use crate::source::{
    load_bytes, load_from_candidates, load_path, LoadedSource, RawTable, SourceOrigin, Tolerance,
};

/// A canonical table plus where it came from.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub table: CanonicalTable,
    pub origin: SourceOrigin,
    pub tolerance: Tolerance,
    /// Rows the reader could not align with the header.
    pub skipped_rows: usize,
    /// Rows that were short and padded with empty cells.
    pub padded_rows: usize,
}

/// Locator → date resolver → normalizer, with one config and synonym table.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    synonyms: SynonymTable,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let synonyms = SynonymTable::load(config.synonyms.as_deref())?;
        Ok(Self { config, synonyms })
    }

    /// Build from `PipelineConfig::load`, i.e. explicit file, env, then defaults.
    pub fn from_env(config_path: Option<&Path>) -> Result<Self> {
        Self::new(PipelineConfig::load(config_path)?)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn synonyms(&self) -> &SynonymTable {
        &self.synonyms
    }

    /// Resolve the date column and normalize. Never fails on bad cell values.
    pub fn prepare(&self, raw: &RawTable) -> Result<CanonicalTable> {
        let batch = raw.to_record_batch().context("building raw batch")?;
        let (batch, resolution) = resolve_date_column(&batch, &self.config.date_inference)?;
        let mut table = normalize_with(&batch, &self.synonyms)?;
        table.report_mut().date_resolution = Some(resolution);
        Ok(table)
    }

    /// Search the configured candidates, then prepare the first readable file.
    pub fn load_and_prepare(&self) -> Result<Prepared> {
        let src = load_from_candidates(&self.config.candidates).into_result()?;
        self.finish(src)
    }

    pub fn load_path_and_prepare<P: AsRef<Path>>(&self, path: P) -> Result<Prepared> {
        let src = load_path(path).into_result()?;
        self.finish(src)
    }

    /// Prepare an uploaded byte stream, bypassing the candidate search.
    pub fn prepare_bytes(&self, bytes: &[u8], label: &str) -> Result<Prepared> {
        let src = load_bytes(bytes, label).into_result()?;
        self.finish(src)
    }

    fn finish(&self, src: LoadedSource) -> Result<Prepared> {
        let table = self
            .prepare(&src.table)
            .with_context(|| format!("preparing {}", src.origin))?;
        info!(
            origin = %src.origin,
            rows = table.num_rows(),
            usable_date = table.has_usable_date(),
            "prepared sales table"
        );
        Ok(Prepared {
            table,
            origin: src.origin,
            tolerance: src.tolerance,
            skipped_rows: src.table.skipped_rows,
            padded_rows: src.table.padded_rows,
        })
    }
}
