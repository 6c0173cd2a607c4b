//! Source locator: find the sales CSV (or take an uploaded stream) and read it
//! into a `RawTable` with trimmed header names.

pub mod raw_table;
pub mod reader;
pub mod utils;

pub use raw_table::RawTable;
pub use reader::{parse_csv, parse_with_fallback, Tolerance};

use std::{
    fmt, fs,
    io::Read,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

use crate::error::SalesError;

/// Where a table came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOrigin {
    Path(PathBuf),
    Stream(String),
}

impl fmt::Display for SourceOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceOrigin::Path(p) => write!(f, "{}", p.display()),
            SourceOrigin::Stream(label) => write!(f, "stream `{}`", label),
        }
    }
}

/// A successfully parsed source.
#[derive(Debug, Clone)]
pub struct LoadedSource {
    pub origin: SourceOrigin,
    pub table: RawTable,
    /// The strictest level that produced a usable table.
    pub tolerance: Tolerance,
}

/// Result of a locate/read attempt. Callers branch on the variant.
#[derive(Debug)]
pub enum LoadOutcome {
    Found(LoadedSource),
    /// No candidate path existed and no stream was given.
    NotFound { searched: Vec<PathBuf> },
    /// Something existed but could not be parsed at any tolerance level.
    ParseFailed { origin: String, cause: String },
}

impl LoadOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, LoadOutcome::Found(_))
    }

    pub fn into_result(self) -> Result<LoadedSource, SalesError> {
        match self {
            LoadOutcome::Found(src) => Ok(src),
            LoadOutcome::NotFound { searched } => Err(SalesError::SourceNotFound { searched }),
            LoadOutcome::ParseFailed { origin, cause } => {
                Err(SalesError::UnparseableSource { origin, cause })
            }
        }
    }
}

/// First candidate that exists as a regular file.
pub fn locate<P: AsRef<Path>>(candidates: &[P]) -> Option<PathBuf> {
    candidates
        .iter()
        .map(|p| p.as_ref())
        .find(|p| p.is_file())
        .map(Path::to_path_buf)
}

/// Search `candidates` in order and parse the first readable one.
///
/// An existing candidate that fails to read is logged and skipped; if nothing
/// parses, the last failure is reported instead of `NotFound`.
#[tracing::instrument(level = "info", skip(candidates), fields(n = candidates.len()))]
pub fn load_from_candidates<P: AsRef<Path>>(candidates: &[P]) -> LoadOutcome {
    let mut last_failure = None;

    for path in candidates.iter().map(|p| p.as_ref()) {
        if !path.is_file() {
            debug!(path = %path.display(), "candidate missing");
            continue;
        }
        match load_path(path) {
            LoadOutcome::Found(src) => return LoadOutcome::Found(src),
            LoadOutcome::ParseFailed { origin, cause } => {
                warn!(%origin, %cause, "failed reading candidate CSV");
                last_failure = Some((origin, cause));
            }
            LoadOutcome::NotFound { .. } => {}
        }
    }

    match last_failure {
        Some((origin, cause)) => LoadOutcome::ParseFailed { origin, cause },
        None => LoadOutcome::NotFound {
            searched: candidates.iter().map(|p| p.as_ref().to_path_buf()).collect(),
        },
    }
}

/// Read and parse one explicit path.
#[tracing::instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
pub fn load_path<P: AsRef<Path>>(path: P) -> LoadOutcome {
    let path = path.as_ref();
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return LoadOutcome::NotFound {
                searched: vec![path.to_path_buf()],
            }
        }
        Err(e) => {
            return LoadOutcome::ParseFailed {
                origin: path.display().to_string(),
                cause: format!("read error: {}", e),
            }
        }
    };
    parse_source(&bytes, SourceOrigin::Path(path.to_path_buf()))
}

/// Parse an in-memory upload, bypassing the candidate search.
pub fn load_bytes(bytes: &[u8], label: &str) -> LoadOutcome {
    parse_source(bytes, SourceOrigin::Stream(label.to_string()))
}

/// Drain `reader` and parse it as an upload.
pub fn load_reader<R: Read>(mut reader: R, label: &str) -> LoadOutcome {
    let mut buf = Vec::new();
    if let Err(e) = reader.read_to_end(&mut buf) {
        return LoadOutcome::ParseFailed {
            origin: SourceOrigin::Stream(label.to_string()).to_string(),
            cause: format!("read error: {}", e),
        };
    }
    load_bytes(&buf, label)
}

fn parse_source(bytes: &[u8], origin: SourceOrigin) -> LoadOutcome {
    match parse_with_fallback(bytes) {
        Ok((mut table, tolerance)) => {
            table.trim_headers();
            info!(
                %origin,
                %tolerance,
                rows = table.num_rows(),
                columns = table.num_columns(),
                skipped = table.skipped_rows,
                padded = table.padded_rows,
                "loaded sales table"
            );
            LoadOutcome::Found(LoadedSource {
                origin,
                table,
                tolerance,
            })
        }
        Err(e) => LoadOutcome::ParseFailed {
            origin: origin.to_string(),
            cause: format!("{:#}", e),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::io::Write;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, body: &[u8]) -> Result<PathBuf> {
        let path = dir.join(name);
        fs::File::create(&path)?.write_all(body)?;
        Ok(path)
    }

    #[test]
    fn first_existing_candidate_wins() -> Result<()> {
        let dir = TempDir::new()?;
        let a = dir.path().join("missing.csv");
        let b = write(dir.path(), "b.csv", b" Date ,Revenue\n2024-01-01,5\n")?;
        let c = write(dir.path(), "c.csv", b"Date,Revenue\n2024-01-01,9\n")?;

        assert_eq!(locate(&[&a, &b, &c]), Some(b.clone()));
        match load_from_candidates(&[a, b.clone(), c]) {
            LoadOutcome::Found(src) => {
                assert_eq!(src.origin, SourceOrigin::Path(b));
                assert_eq!(src.table.headers, vec!["Date", "Revenue"]);
                assert_eq!(src.tolerance, Tolerance::Strict);
            }
            other => panic!("expected Found, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn no_candidates_is_not_found() -> Result<()> {
        let dir = TempDir::new()?;
        let outcome = load_from_candidates(&[dir.path().join("nope.csv")]);
        assert!(matches!(outcome, LoadOutcome::NotFound { ref searched } if searched.len() == 1));
        let err = outcome.into_result().unwrap_err();
        assert!(matches!(err, SalesError::SourceNotFound { .. }));
        Ok(())
    }

    #[test]
    fn unreadable_candidate_is_skipped() -> Result<()> {
        let dir = TempDir::new()?;
        let bad = write(dir.path(), "bad.csv", b"Date,Revenue\n")?;
        let good = write(dir.path(), "good.csv", b"Date,Revenue\n2024-01-01,9\n")?;

        assert!(load_from_candidates(&[&bad, &good]).is_found());
        match load_from_candidates(&[&bad]) {
            LoadOutcome::ParseFailed { cause, .. } => assert!(cause.contains("no data rows")),
            other => panic!("expected ParseFailed, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn stream_bypasses_search() {
        let outcome = load_reader(&b"Product , Revenue\nBike,$10\n"[..], "upload.csv");
        let src = outcome.into_result().unwrap();
        assert_eq!(src.origin, SourceOrigin::Stream("upload.csv".into()));
        assert_eq!(src.table.headers, vec!["Product", "Revenue"]);
    }

    #[test]
    fn garbage_stream_is_unparseable() {
        let err = load_bytes(b"", "empty").into_result().unwrap_err();
        match err {
            SalesError::UnparseableSource { origin, .. } => assert!(origin.contains("empty")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
