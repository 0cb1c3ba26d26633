use anyhow::{Context, Result};
use chrono::Datelike;
use clap::{Args, Parser, Subcommand, ValueEnum};
use dashfeed::config::Config;
use dashfeed::extract::{self, EXTRACTION_INSTRUCTION, ExtractedTable};
use dashfeed::fetcher::HttpTransport;
use dashfeed::{Client, DateRange, ExtractError, ReshapeCache, ResilientFetcher, SeriesRequest};
use dashfeed::{CallOutcome, pipeline, stats, storage};
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "dashfeed",
    version,
    about = "Extract tables from text with an AI endpoint, or fetch & reshape World Bank series"
)]
struct Cli {
    /// Config file (TOML). Defaults to <config dir>/dashfeed/config.toml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Debug logging (RUST_LOG still wins when set).
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ask the AI endpoint to pull a CSV table out of an article.
    Extract(ExtractArgs),
    /// Fetch indicator series for one country and reshape them by year.
    Series(SeriesArgs),
}

#[derive(ValueEnum, Clone, Debug)]
enum OutFormat {
    Csv,
    Json,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// Article text file; reads stdin when omitted.
    #[arg(short, long)]
    file: Option<PathBuf>,
    /// File with a replacement system instruction.
    #[arg(long)]
    instruction: Option<PathBuf>,
    /// Save the extracted table as CSV instead of printing it.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct SeriesArgs {
    /// Country/region code (e.g., IND)
    #[arg(short, long)]
    entity: String,
    /// Series as NAME=CODE; repeat for more (e.g., --series GDP=NY.GDP.MKTP.CD)
    #[arg(short, long = "series", required = true)]
    series: Vec<String>,
    /// Inclusive range START:END. Defaults to <configured start>:<current year>.
    #[arg(short = 'd', long)]
    date: Option<String>,
    /// Source id (e.g., 2 for WDI) for joined multi-indicator requests.
    #[arg(long)]
    source: Option<u32>,
    /// Save results to file (format inferred by --format or extension).
    #[arg(long)]
    out: Option<PathBuf>,
    /// Output format (csv or json). If omitted, inferred from --out extension.
    #[arg(long, value_enum)]
    format: Option<OutFormat>,
    /// Print grouped statistics to stdout.
    #[arg(long, default_value_t = false)]
    stats: bool,
}

fn fmt_opt(v: Option<f64>) -> String {
    match v {
        Some(x) if x.is_finite() => {
            // Format up to 4 decimals, then trim trailing zeros and trailing dot.
            let s = format!("{:.4}", x);
            s.trim_end_matches('0').trim_end_matches('.').to_string()
        }
        _ => "NA".to_string(),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "dashfeed=debug" } else { "dashfeed=info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let cfg = Config::load(cli.config.as_deref())?;
    match cli.cmd {
        Command::Extract(args) => cmd_extract(&cfg, args),
        Command::Series(args) => cmd_series(&cfg, args),
    }
}

fn print_table(t: &ExtractedTable) {
    println!("{}", t.headers.join("\t"));
    for row in &t.rows {
        println!("{}", row.join("\t"));
    }
}

fn cmd_extract(cfg: &Config, args: ExtractArgs) -> Result<()> {
    let article = match &args.file {
        Some(p) => std::fs::read_to_string(p).with_context(|| format!("read {}", p.display()))?,
        None => {
            let mut s = String::new();
            std::io::stdin().read_to_string(&mut s).context("read stdin")?;
            s
        }
    };
    let instruction = match &args.instruction {
        Some(p) => std::fs::read_to_string(p).with_context(|| format!("read {}", p.display()))?,
        None => EXTRACTION_INSTRUCTION.to_string(),
    };

    let transport = HttpTransport::with_timeout(
        cfg.ai.endpoint.clone(),
        cfg.ai.api_key(),
        Duration::from_secs(cfg.ai.timeout_secs),
    )?;
    let fetcher = ResilientFetcher::new(transport).with_policy(cfg.ai.retry_policy());

    let text = match fetcher.fetch(&instruction, &article) {
        CallOutcome::Success(text) => text,
        CallOutcome::Failure(f) => anyhow::bail!("{}", f),
    };
    let table = match extract::parse_extraction(&text) {
        Ok(t) => t,
        Err(ExtractError::NoData) => {
            eprintln!("no data");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    match &args.out {
        Some(path) => {
            storage::save_extracted_csv(&table, path)?;
            eprintln!("Saved {} rows to {}", table.rows.len(), path.display());
        }
        None => print_table(&table),
    }
    Ok(())
}

fn cmd_series(cfg: &Config, args: SeriesArgs) -> Result<()> {
    let series = SeriesRequest::parse_pairs(args.series.as_slice())?;
    let range = match &args.date {
        Some(s) => s.parse::<DateRange>()?,
        None => DateRange::new(
            cfg.statistics.default_start_year,
            chrono::Utc::now().year(),
        )?,
    };
    let client = Client::new(
        cfg.statistics.base_url.clone(),
        Duration::from_secs(cfg.statistics.timeout_secs),
    )?
    .with_source(args.source.or(cfg.statistics.source));
    let cache = ReshapeCache::new();

    let Some(table) = pipeline::load_series(&client, Some(&cache), &args.entity, &series, range)?
    else {
        eprintln!("no data");
        return Ok(());
    };

    match args.out.as_ref() {
        Some(path) => {
            let fmt = match args.format {
                Some(OutFormat::Csv) => "csv",
                Some(OutFormat::Json) => "json",
                None => path.extension().and_then(|e| e.to_str()).unwrap_or("csv"),
            }
            .to_ascii_lowercase();
            match fmt.as_str() {
                "csv" => storage::save_csv(&table, path)?,
                "json" => storage::save_json(&table, path)?,
                other => anyhow::bail!("unsupported format: {}", other),
            }
            eprintln!("Saved {} rows to {}", table.len(), path.display());
        }
        None if !args.stats => {
            println!("entity\tyear\t{}", table.series.join("\t"));
            for r in &table.rows {
                let vals: Vec<String> = r.values.iter().map(|v| fmt_opt(*v)).collect();
                println!("{}\t{}\t{}", r.entity, r.year, vals.join("\t"));
            }
        }
        None => {}
    }

    if args.stats {
        for s in stats::grouped_summary(&table) {
            println!(
                "{} • {}  count={} missing={}  min={} max={} mean={} median={}",
                s.key.entity,
                s.key.series,
                s.count,
                s.missing,
                fmt_opt(s.min),
                fmt_opt(s.max),
                fmt_opt(s.mean),
                fmt_opt(s.median)
            );
        }
    }

    Ok(())
}
