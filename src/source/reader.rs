use anyhow::{anyhow, bail, Context, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::Serialize;
use std::{borrow::Cow, fmt};
use tracing::{debug, warn};

use super::raw_table::RawTable;
use super::utils::{consistent_delimiter, detect_delimiter, unterminated_quote};

/// How forgiving a parse attempt is. Attempts run in `LADDER` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Tolerance {
    /// Comma-separated, valid UTF-8, every row the width of the header.
    Strict,
    /// Invalid UTF-8 replaced, over-long rows skipped, short rows padded and counted.
    Lenient,
    /// Like `Lenient`, with the separator sniffed from the content.
    Sniffed,
}

impl Tolerance {
    pub const LADDER: [Tolerance; 3] = [Tolerance::Strict, Tolerance::Lenient, Tolerance::Sniffed];
}

impl fmt::Display for Tolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Tolerance::Strict => "strict",
            Tolerance::Lenient => "lenient",
            Tolerance::Sniffed => "sniffed",
        };
        f.write_str(s)
    }
}

/// Parse `bytes` at exactly one tolerance level.
///
/// Fails when the header is missing, when a strict attempt meets a malformed
/// row, when a quoted field runs to the end of the input, when a comma read
/// yields one column of what is plainly another separator, or when no data
/// rows survive.
pub fn parse_csv(bytes: &[u8], tolerance: Tolerance) -> Result<RawTable> {
    let text = match tolerance {
        Tolerance::Strict => {
            Cow::Borrowed(std::str::from_utf8(bytes).context("input is not valid UTF-8")?)
        }
        Tolerance::Lenient | Tolerance::Sniffed => String::from_utf8_lossy(bytes),
    };
    let delimiter = match tolerance {
        Tolerance::Sniffed => {
            let delim = detect_delimiter(&text);
            debug!(delimiter = %(delim as char).escape_default(), "sniffed separator");
            delim
        }
        Tolerance::Strict | Tolerance::Lenient => b',',
    };

    // the reader would swallow the rest of the file into one field
    if let Some(line) = unterminated_quote(&text, delimiter) {
        bail!("quoted field opened at line {} is never closed", line);
    }

    let table = match tolerance {
        Tolerance::Strict => read_strict(&text)?,
        Tolerance::Lenient | Tolerance::Sniffed => read_lenient(&text, delimiter)?,
    };

    if table.num_columns() == 1 {
        if let Some(other) = consistent_delimiter(&text).filter(|&d| d != delimiter) {
            bail!(
                "read as a single column but every line splits on {:?}",
                other as char
            );
        }
    }

    if table.rows.is_empty() {
        bail!("no data rows");
    }
    Ok(table)
}

/// Walk the tolerance ladder and return the first attempt that succeeds.
/// The error carries the cause of the last (most lenient) failure.
pub fn parse_with_fallback(bytes: &[u8]) -> Result<(RawTable, Tolerance)> {
    let mut last_err = None;
    for tolerance in Tolerance::LADDER {
        match parse_csv(bytes, tolerance) {
            Ok(table) => {
                debug!(%tolerance, rows = table.num_rows(), skipped = table.skipped_rows, "parsed");
                return Ok((table, tolerance));
            }
            Err(e) => {
                debug!(%tolerance, error = %e, "parse attempt failed");
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| anyhow!("failed to parse CSV")))
}

fn header_row(record: &StringRecord) -> Result<Vec<String>> {
    let headers: Vec<String> = record.iter().map(str::to_string).collect();
    if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
        bail!("missing header row");
    }
    Ok(headers)
}

fn read_strict(text: &str) -> Result<RawTable> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .from_reader(text.as_bytes());

    let headers = header_row(rdr.headers().context("reading header row")?)?;
    let mut rows = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        // line numbers are 1-based and the header is line 1
        let record = result.with_context(|| format!("malformed record at line {}", idx + 2))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(RawTable::new(headers, rows))
}

fn read_lenient(text: &str, delimiter: u8) -> Result<RawTable> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .trim(Trim::Fields)
        .from_reader(text.as_bytes());

    let headers = header_row(rdr.headers().context("reading header row")?)?;
    let width = headers.len();
    let mut rows = Vec::new();
    let mut skipped = 0usize;
    let mut padded = 0usize;

    for (idx, result) in rdr.records().enumerate() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warn!(line = idx + 2, error = %e, "skipping unreadable row");
                skipped += 1;
                continue;
            }
        };
        if record.len() > width {
            warn!(
                line = idx + 2,
                fields = record.len(),
                expected = width,
                "skipping row with too many fields"
            );
            skipped += 1;
            continue;
        }
        let mut row: Vec<String> = record.iter().map(str::to_string).collect();
        if row.len() < width {
            debug!(line = idx + 2, fields = row.len(), expected = width, "padding short row");
            padded += 1;
            row.resize(width, String::new());
        }
        rows.push(row);
    }

    // a separator that misaligns most rows is the wrong separator
    let misaligned = skipped + padded;
    if misaligned > rows.len() - padded {
        bail!(
            "{} of {} rows misaligned with a {}-column header",
            misaligned,
            skipped + rows.len(),
            width
        );
    }
    if padded > 0 {
        warn!(padded, "padded short rows with empty cells");
    }

    Ok(RawTable {
        headers,
        rows,
        skipped_rows: skipped,
        padded_rows: padded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_parses_clean_input() -> Result<()> {
        let data = b"Date,Revenue\n2024-01-01,10\n2024-01-02,20\n";
        let (table, tol) = parse_with_fallback(data)?;
        assert_eq!(tol, Tolerance::Strict);
        assert_eq!(table.headers, vec!["Date", "Revenue"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.skipped_rows, 0);
        Ok(())
    }

    #[test]
    fn ragged_rows_fall_through_to_lenient() -> Result<()> {
        let data = b"Date,Revenue,Profit\n2024-01-01,10,2\n2024-01-02,20,3,EXTRA\n2024-01-03,30\n2024-01-04,40,4\n";
        assert!(parse_csv(data, Tolerance::Strict).is_err());

        let (table, tol) = parse_with_fallback(data)?;
        assert_eq!(tol, Tolerance::Lenient);
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.skipped_rows, 1);
        assert_eq!(table.padded_rows, 1);
        assert_eq!(table.rows[1], vec!["2024-01-03", "30", ""]);
        Ok(())
    }

    #[test]
    fn invalid_utf8_is_replaced() -> Result<()> {
        let mut data = b"Product,Revenue\nCaf".to_vec();
        data.push(0xff);
        data.extend_from_slice(b",12\n");
        let (table, tol) = parse_with_fallback(&data)?;
        assert_eq!(tol, Tolerance::Lenient);
        assert!(table.rows[0][0].starts_with("Caf"));
        assert!(table.rows[0][0].contains('\u{fffd}'));
        Ok(())
    }

    #[test]
    fn semicolon_file_needs_sniffing() -> Result<()> {
        // read with commas, most rows overflow the one-column header
        let data = b"Date;Product;Revenue\n2024-01-01;Bike, red;1,200\n2024-01-02;Helmet, blue;30\n2024-01-03;Lock;15\n";
        assert!(parse_csv(data, Tolerance::Lenient).is_err());

        let (table, tol) = parse_with_fallback(data)?;
        assert_eq!(tol, Tolerance::Sniffed);
        assert_eq!(table.headers, vec!["Date", "Product", "Revenue"]);
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[0], vec!["2024-01-01", "Bike, red", "1,200"]);
        Ok(())
    }

    #[test]
    fn plain_semicolon_file_is_sniffed() -> Result<()> {
        let data = b"Date;Product;Revenue\n2024-01-01;Bike;10\n2024-01-02;Helmet;5\n";
        let err = parse_csv(data, Tolerance::Strict).unwrap_err();
        assert!(err.to_string().contains("single column"));
        assert!(parse_csv(data, Tolerance::Lenient).is_err());

        let (table, tol) = parse_with_fallback(data)?;
        assert_eq!(tol, Tolerance::Sniffed);
        assert_eq!(table.headers, vec!["Date", "Product", "Revenue"]);
        assert_eq!(table.rows[1], vec!["2024-01-02", "Helmet", "5"]);
        Ok(())
    }

    #[test]
    fn single_column_file_stays_strict() -> Result<()> {
        let (table, tol) = parse_with_fallback(b"Date\n2024-01-01\n2024-01-02\n")?;
        assert_eq!(tol, Tolerance::Strict);
        assert_eq!(table.num_columns(), 1);
        Ok(())
    }

    #[test]
    fn unclosed_quote_is_not_a_success() {
        let mut data = String::from("Date,Product,Revenue\n2024-01-01,\"Bike,10\n");
        for day in 2..=28 {
            data.push_str(&format!("2024-01-{:02},Helmet,5\n", day));
        }
        for tol in Tolerance::LADDER {
            assert!(parse_csv(data.as_bytes(), tol).is_err(), "{} accepted it", tol);
        }
        let err = parse_with_fallback(data.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 2"), "{}", err);
    }

    #[test]
    fn quoted_newline_is_kept() -> Result<()> {
        let data = b"Product,Note\nBike,\"two\nlines\"\nLock,plain\n";
        let (table, tol) = parse_with_fallback(data)?;
        assert_eq!(tol, Tolerance::Strict);
        assert_eq!(table.rows[0][1], "two\nlines");
        assert_eq!(table.rows.len(), 2);
        Ok(())
    }

    #[test]
    fn mostly_short_rows_are_rejected() {
        let data = b"Date,Product,Revenue\n2024-01-01\n2024-01-02\n2024-01-03,Bike,5\n";
        assert!(parse_csv(data, Tolerance::Lenient).is_err());
    }

    #[test]
    fn header_only_input_fails_everywhere() {
        let err = parse_with_fallback(b"Date,Revenue\n").unwrap_err();
        assert!(err.to_string().contains("no data rows"));
    }

    #[test]
    fn empty_input_fails() {
        assert!(parse_with_fallback(b"").is_err());
    }
}
