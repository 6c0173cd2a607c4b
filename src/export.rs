use anyhow::{Context, Result};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::{fs::File, path::Path};
use tracing::info;

/// Write `batch` to a single Snappy-compressed Parquet file, replacing any
/// existing file at `path`.
pub fn write_parquet<P: AsRef<Path>>(batch: &RecordBatch, path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating output dir {:?}", parent))?;
    }
    let file = File::create(path).with_context(|| format!("creating {:?}", path))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
        .context("creating Arrow writer for sales table")?;
    writer.write(batch).context("writing sales batch")?;
    writer.close().context("closing sales writer")?;
    info!(path = %path.display(), rows = batch.num_rows(), "wrote parquet");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{normalize, source::RawTable};
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use tempfile::TempDir;

    #[test]
    fn writes_readable_parquet() -> Result<()> {
        let raw = RawTable::new(
            vec!["Date".into(), "Revenue".into()],
            vec![
                vec!["2024-01-01".into(), "$5".into()],
                vec!["2024-02-01".into(), "7".into()],
            ],
        );
        let table = normalize(&raw.to_record_batch()?)?;

        let dir = TempDir::new()?;
        let path = dir.path().join("out").join("sales.parquet");
        write_parquet(table.batch(), &path)?;

        let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(&path)?)?.build()?;
        let batches: Vec<RecordBatch> = reader.collect::<std::result::Result<_, _>>()?;
        let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
        assert_eq!(rows, 2);
        assert_eq!(batches[0].schema().fields().len(), table.batch().num_columns());
        Ok(())
    }
}
