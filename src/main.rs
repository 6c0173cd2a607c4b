use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use salesprep::{
    dates::parse_datetime,
    export::write_parquet,
    query::{monthly_series, sum_by, top_n, FilterChoices, GroupTotal, Kpis, SalesFilter},
    schema::{types::*, NormalizeReport},
    Pipeline, Prepared, SalesError,
};
use serde::Serialize;
use std::{
    env,
    io::{self, Read},
    path::PathBuf,
    process::exit,
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

const USAGE: &str = "Usage: salesprep [CSV|-] [--config FILE] [--out FILE.parquet] [--json] \
[--year Y]... [--country C]... [--category C]... [--from DATE] [--to DATE] [--top N]";

#[derive(Debug, Default, PartialEq)]
struct Args {
    source: Option<String>,
    config: Option<PathBuf>,
    out: Option<PathBuf>,
    json: bool,
    top: usize,
    filter: SalesFilter,
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Args> {
    let mut out = Args {
        top: 10,
        ..Args::default()
    };
    let mut it = args.into_iter();
    while let Some(arg) = it.next() {
        let mut value = |flag: &str| {
            it.next()
                .ok_or_else(|| anyhow!("{} needs a value", flag))
        };
        match arg.as_str() {
            "--config" => out.config = Some(PathBuf::from(value("--config")?)),
            "--out" => out.out = Some(PathBuf::from(value("--out")?)),
            "--json" => out.json = true,
            "--year" => {
                let y = value("--year")?;
                out.filter
                    .years
                    .push(y.parse().with_context(|| format!("bad year {:?}", y))?);
            }
            "--country" => out.filter.countries.push(value("--country")?),
            "--category" => out.filter.categories.push(value("--category")?),
            "--from" => out.filter.date_from = Some(parse_day(&value("--from")?)?),
            "--to" => out.filter.date_to = Some(parse_day(&value("--to")?)?),
            "--top" => {
                let n = value("--top")?;
                out.top = n.parse().with_context(|| format!("bad --top {:?}", n))?;
            }
            "-h" | "--help" => bail!("{}", USAGE),
            flag if flag.starts_with("--") => bail!("unknown flag {}\n{}", flag, USAGE),
            _ if out.source.is_none() => out.source = Some(arg.clone()),
            _ => bail!("unexpected argument {:?}\n{}", arg, USAGE),
        }
    }
    Ok(out)
}

fn parse_day(s: &str) -> Result<NaiveDate> {
    parse_datetime(s)
        .map(|dt| dt.date())
        .ok_or_else(|| anyhow!("cannot read {:?} as a date", s))
}

#[derive(Serialize)]
struct Summary<'a> {
    origin: String,
    tolerance: String,
    skipped_rows: usize,
    padded_rows: usize,
    rows: usize,
    columns: Vec<String>,
    report: &'a NormalizeReport,
    choices: FilterChoices,
    filtered_rows: usize,
    kpis: Kpis,
    monthly_revenue: Vec<GroupTotal>,
    revenue_by_category: Vec<GroupTotal>,
    top_products: Vec<GroupTotal>,
}

fn load(pipeline: &Pipeline, source: Option<&str>) -> Result<Prepared> {
    match source {
        Some("-") => {
            let mut buf = Vec::new();
            io::stdin()
                .read_to_end(&mut buf)
                .context("reading CSV from stdin")?;
            pipeline.prepare_bytes(&buf, "stdin")
        }
        Some(path) => pipeline.load_path_and_prepare(path),
        None => pipeline.load_and_prepare(),
    }
}

fn run(args: Args) -> Result<()> {
    let pipeline = Pipeline::from_env(args.config.as_deref())?;
    let prepared = load(&pipeline, args.source.as_deref())?;
    let table = &prepared.table;
    table.validate()?;

    let report = table.report();
    if prepared.skipped_rows > 0 {
        warn!(skipped = prepared.skipped_rows, "some rows could not be read");
    }
    if prepared.padded_rows > 0 {
        warn!(padded = prepared.padded_rows, "some rows were short and padded");
    }
    if report.date_nulls > 0 {
        warn!(nulls = report.date_nulls, "some Date values could not be parsed");
    }

    let choices = FilterChoices::from_table(table)?;
    let filtered = args.filter.apply(table.batch())?;
    info!(rows = filtered.num_rows(), "filtered");

    let summary = Summary {
        origin: prepared.origin.to_string(),
        tolerance: prepared.tolerance.to_string(),
        skipped_rows: prepared.skipped_rows,
        padded_rows: prepared.padded_rows,
        rows: table.num_rows(),
        columns: table.column_names(),
        report,
        choices,
        filtered_rows: filtered.num_rows(),
        kpis: Kpis::compute(&filtered)?,
        monthly_revenue: monthly_series(&filtered, REVENUE)?,
        revenue_by_category: sum_by(&filtered, PRODUCT_CATEGORY, REVENUE)?,
        top_products: top_n(&filtered, PRODUCT, REVENUE, args.top)?,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    if let Some(out) = &args.out {
        write_parquet(&filtered, out)?;
    }
    Ok(())
}

fn print_summary(s: &Summary<'_>) {
    println!("Source:        {} ({})", s.origin, s.tolerance);
    println!("Columns:       {}", s.columns.join(", "));
    println!("Rows:          {} ({} after filters)", s.rows, s.filtered_rows);
    for (col, n) in &s.report.coerced {
        println!("Coerced to 0:  {} in {}", n, col);
    }
    if let (Some(min), Some(max)) = (s.choices.date_min, s.choices.date_max) {
        println!("Date range:    {} .. {}", min, max);
    }
    println!();
    println!("Total revenue:       {:>14.2}", s.kpis.total_revenue);
    println!("Total profit:        {:>14.2}", s.kpis.total_profit);
    println!("Total quantity:      {:>14.0}", s.kpis.total_quantity);
    println!("Avg order value:     {:>14.2}", s.kpis.avg_order_value);

    println!();
    println!("=== Monthly revenue ===");
    for g in &s.monthly_revenue {
        println!("{:<10} {:>14.2}", g.key, g.total);
    }
    println!();
    println!("=== Revenue by category ===");
    for g in &s.revenue_by_category {
        println!("{:<30} {:>14.2}", g.key, g.total);
    }
    println!();
    println!("=== Top products ===");
    for g in &s.top_products {
        println!("{:<30} {:>14.2}", g.key, g.total);
    }
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,salesprep=info"));
    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let args = match parse_args(env::args().skip(1)) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("{}", e);
            exit(1);
        }
    };

    if let Err(e) = run(args) {
        let code = match e.downcast_ref::<SalesError>() {
            Some(SalesError::SourceNotFound { .. }) => {
                error!("no data available: {}", e);
                2
            }
            Some(SalesError::DateUnresolved) => {
                error!("data loaded but no usable Date column");
                3
            }
            _ => {
                error!("{:#}", e);
                1
            }
        };
        exit(code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn parses_filters_and_outputs() -> Result<()> {
        let a = args(&[
            "data/Sales.csv",
            "--year",
            "2015",
            "--year",
            "2016",
            "--country",
            "France",
            "--from",
            "2015-01-01",
            "--out",
            "out.parquet",
            "--json",
            "--top",
            "5",
        ])?;
        assert_eq!(a.source.as_deref(), Some("data/Sales.csv"));
        assert_eq!(a.filter.years, vec![2015, 2016]);
        assert_eq!(a.filter.countries, vec!["France"]);
        assert_eq!(a.filter.date_from, NaiveDate::from_ymd_opt(2015, 1, 1));
        assert_eq!(a.out, Some(PathBuf::from("out.parquet")));
        assert!(a.json);
        assert_eq!(a.top, 5);
        Ok(())
    }

    #[test]
    fn defaults_search_candidates() -> Result<()> {
        let a = args(&[])?;
        assert!(a.source.is_none());
        assert_eq!(a.top, 10);
        assert!(a.filter.is_empty());
        Ok(())
    }

    #[test]
    fn rejects_bad_input() {
        assert!(args(&["--year"]).is_err());
        assert!(args(&["--year", "twenty"]).is_err());
        assert!(args(&["--from", "someday"]).is_err());
        assert!(args(&["--bogus"]).is_err());
        assert!(args(&["a.csv", "b.csv"]).is_err());
    }
}
