use anyhow::Result;
use salesprep::{diagnose::diagnose_dates, source::load_path, PipelineConfig};
use std::{env, path::Path, process::exit};
use tracing_subscriber::{fmt, EnvFilter};

fn main() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,salesprep=info"));
    fmt::Subscriber::builder().with_env_filter(filter).init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <CSV_FILE>", args[0]);
        exit(1);
    }
    if let Err(e) = diagnose(Path::new(&args[1])) {
        eprintln!("Error: {:#}", e);
        exit(1);
    }
}

fn diagnose(path: &Path) -> Result<()> {
    println!("Path exists: {}", path.exists());
    let cfg = PipelineConfig::load(None)?;
    let src = load_path(path).into_result()?;
    let raw = src.table;
    println!(
        "Read with:   {} tolerance ({} rows skipped, {} padded)",
        src.tolerance, raw.skipped_rows, raw.padded_rows
    );
    println!("Rows, cols:  {}, {}", raw.num_rows(), raw.num_columns());
    println!("Columns:     {:?}", raw.headers);

    let batch = raw.to_record_batch()?;
    let d = diagnose_dates(&batch, &cfg.date_inference)?;
    println!("Date candidates by name: {:?}", d.name_candidates);
    for s in &d.scores {
        if s.sampled > 0 {
            println!("col={:?} parsed_count={} of {}", s.name, s.parsed, s.sampled);
        }
    }
    match &d.best {
        Some(best) => {
            println!("Best candidate by sample parse: {}", best);
            println!("Total parsed in full column: {} / {}", d.best_parsed, d.rows);
        }
        None => println!("No column parsed as dates"),
    }
    Ok(())
}
