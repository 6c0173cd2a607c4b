use anyhow::{Context, Result};
use salesprep::diagnose::scan_malformed;
use std::{env, fs, path::Path, process::exit};
use tracing_subscriber::{fmt, EnvFilter};

fn main() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,salesprep=info"));
    fmt::Subscriber::builder().with_env_filter(filter).init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args.len() > 3 {
        eprintln!("Usage: {} <CSV_FILE> [LIMIT]", args[0]);
        exit(1);
    }
    let limit = match args.get(2).map(|s| s.parse::<usize>()) {
        None => 50,
        Some(Ok(n)) => n,
        Some(Err(e)) => {
            eprintln!("bad LIMIT {:?}: {}", args[2], e);
            exit(1);
        }
    };
    if let Err(e) = scan(Path::new(&args[1]), limit) {
        eprintln!("Error: {:#}", e);
        exit(1);
    }
}

fn scan(path: &Path, limit: usize) -> Result<()> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let report = scan_malformed(&bytes, limit)?;

    println!("File:          {}", path.display());
    println!("Header fields: {}", report.header_fields);
    println!("Rows scanned:  {}", report.rows_scanned);
    println!("Bad rows:      {}", report.total_bad);
    for bad in &report.bad_rows {
        println!("Line {}: {}", bad.line, bad.reason);
        println!("    {}", bad.sample);
    }
    if report.total_bad > report.bad_rows.len() {
        println!("... {} more", report.total_bad - report.bad_rows.len());
    }
    Ok(())
}
