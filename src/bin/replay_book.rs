//! CLI tool for replaying a captured book feed and sampling metrics.
//!
//! Reads a JSON Lines capture (aggregated `book` or order-level `level3`
//! channel), rebuilds every symbol's book, and writes metrics every interval
//! of record time.
//!
//! # Usage
//!
//! ```bash
//! # Aggregated book, one row per second per symbol
//! cargo run --release --bin replay_book -- \
//!     --input data/book_raw.jsonl --output data/book_metrics.csv
//!
//! # Order-level book, 5 second samples, one file per symbol
//! cargo run --release --bin replay_book -- \
//!     --input data/level3_raw.jsonl --output data/l3.csv \
//!     --level 3 --interval 5s --separate-files
//!
//! # Single symbol to JSON Lines
//! cargo run --release --bin replay_book -- \
//!     -i data/level3_raw.jsonl -o btc.jsonl --level 3 --symbol BTC/USD
//! ```

use std::env;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::Serialize;

use crypto_book_reconstructor::export::{CsvRecord, MetricsWriter};
use crypto_book_reconstructor::source::CaptureRecord;
use crypto_book_reconstructor::{
    parse_interval, parse_timestamp, BookConfig, BookError, IntervalSampler, JsonlSource,
    MultiSymbolBooks, OrderLevelBook, OrderLevelMetrics, OutputFormat, PerSymbolWriter,
    PriceLevelBook, PriceLevelMetrics, RecordSource, ReconstructedBook, Result, SymbolRecord,
};

/// Command-line arguments
struct Args {
    /// Capture file (.jsonl)
    input: PathBuf,
    /// Metrics file, or base name with --separate-files
    output: PathBuf,
    /// 2 = aggregated book, 3 = order-level book
    level: u8,
    /// Sampling interval as given on the command line
    interval_text: String,
    interval: Duration,
    /// Only process these symbols (empty = all)
    symbols: Vec<String>,
    format: OutputFormat,
    /// One output file per symbol
    separate_files: bool,
    /// Verify checksums on aggregated updates
    validate_checksums: bool,
    /// Skip undecodable lines instead of stopping
    skip_invalid: bool,
    /// Optional JSON Lines dump of recorded warnings
    warnings: Option<PathBuf>,
}

fn parse_args() -> std::result::Result<Args, String> {
    let args: Vec<String> = env::args().collect();

    let mut input: Option<PathBuf> = None;
    let mut output: Option<PathBuf> = None;
    let mut level = 2u8;
    let mut interval_text = "1s".to_string();
    let mut symbols = Vec::new();
    let mut format: Option<OutputFormat> = None;
    let mut separate_files = false;
    let mut validate_checksums = true;
    let mut skip_invalid = false;
    let mut warnings = None;

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        let mut value = || -> std::result::Result<String, String> {
            i += 1;
            args.get(i)
                .cloned()
                .ok_or_else(|| format!("{} requires a value", flag))
        };

        match flag {
            "--input" | "-i" => input = Some(PathBuf::from(value()?)),
            "--output" | "-o" => output = Some(PathBuf::from(value()?)),
            "--level" | "-l" => {
                level = match value()?.as_str() {
                    "2" => 2,
                    "3" => 3,
                    other => return Err(format!("--level must be 2 or 3, got {}", other)),
                };
            }
            "--interval" => interval_text = value()?,
            "--symbol" | "-s" => symbols.push(value()?),
            "--format" | "-f" => {
                let text = value()?;
                format = Some(
                    OutputFormat::parse(&text)
                        .ok_or_else(|| format!("Unknown format: {} (expected csv or jsonl)", text))?,
                );
            }
            "--separate-files" => separate_files = true,
            "--no-checksum" => validate_checksums = false,
            "--skip-invalid" => skip_invalid = true,
            "--warnings" => warnings = Some(PathBuf::from(value()?)),
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            arg => return Err(format!("Unknown argument: {}", arg)),
        }
        i += 1;
    }

    let input = input.ok_or("Input file is required")?;
    let output = output.ok_or("Output file is required")?;
    let interval = parse_interval(&interval_text).map_err(|e| e.to_string())?;

    // Infer the format from the output extension unless given.
    let format = format.unwrap_or_else(|| match output.extension().and_then(|e| e.to_str()) {
        Some("jsonl") | Some("json") => OutputFormat::Jsonl,
        _ => OutputFormat::Csv,
    });

    Ok(Args {
        input,
        output,
        level,
        interval_text,
        interval,
        symbols,
        format,
        separate_files,
        validate_checksums,
        skip_invalid,
        warnings,
    })
}

fn print_help() {
    eprintln!(r#"
Replay a captured order book feed and sample metrics

USAGE:
    replay_book [OPTIONS] --input <FILE> --output <FILE>

OPTIONS:
    -i, --input <FILE>      Capture file (JSON Lines, book or level3 channel)
    -o, --output <FILE>     Metrics file (base name with --separate-files)
    -l, --level <2|3>       2 = aggregated book (default), 3 = order-level book
        --interval <SPAN>   Sampling interval: 500ms, 1s, 5s, 1m, 1h (default 1s)
    -s, --symbol <SYM>      Only process this symbol (repeatable)
    -f, --format <FMT>      csv or jsonl (default: from output extension)
        --separate-files    Write one file per symbol: <base>_<SYMBOL>.<ext>
        --no-checksum       Do not verify checksums on aggregated updates
        --skip-invalid      Skip undecodable lines instead of stopping
        --warnings <FILE>   Write recorded warnings as JSON Lines
    -h, --help              Print this help message

EXAMPLES:
    replay_book -i book_raw.jsonl -o book_metrics.csv
    replay_book -i level3_raw.jsonl -o l3.csv --level 3 --interval 5s --separate-files
    replay_book -i level3_raw.jsonl -o btc.jsonl --level 3 --symbol BTC/USD
"#);
}

/// Where samples go.
enum Output {
    Single(MetricsWriter<BufWriter<File>>),
    Split(PerSymbolWriter),
}

impl Output {
    fn open(args: &Args) -> Result<Self> {
        Ok(if args.separate_files {
            Output::Split(PerSymbolWriter::new(&args.output, args.format))
        } else {
            Output::Single(MetricsWriter::create(&args.output, args.format)?)
        })
    }

    fn write<M: CsvRecord + Serialize>(&mut self, symbol: &str, metrics: &M) -> Result<()> {
        match self {
            Output::Single(writer) => writer.write(metrics),
            Output::Split(writer) => writer.write(symbol, metrics),
        }
    }

    fn finish(&mut self) -> Result<()> {
        match self {
            Output::Single(writer) => writer.flush(),
            Output::Split(writer) => writer.flush_all(),
        }
    }
}

/// Counters reported at the end of a run.
#[derive(Default)]
struct RunSummary {
    lines_read: u64,
    lines_skipped: u64,
    records_processed: u64,
    samples_written: u64,
    unparsable_timestamps: u64,
    files_created: usize,
}

/// Replay the capture through a session of `B` books, calling `sample` for
/// every due sample.
fn replay<B, M>(
    args: &Args,
    mut sample: impl FnMut(&mut B, &str, f64) -> M,
) -> Result<(RunSummary, MultiSymbolBooks<B>)>
where
    B: ReconstructedBook,
    B::Record: CaptureRecord,
    M: CsvRecord + Serialize,
{
    let config = BookConfig::new()
        .with_checksum_validation(args.validate_checksums)
        .with_symbols(args.symbols.iter().cloned());
    let mut session: MultiSymbolBooks<B> = MultiSymbolBooks::new(config);
    let mut sampler = IntervalSampler::new(args.interval);
    let mut output = Output::open(args)?;
    let mut summary = RunSummary::default();

    let source: JsonlSource<_, B::Record> =
        JsonlSource::open(&args.input)?.skip_invalid(args.skip_invalid);
    let mut records = source.records()?;

    for record in records.by_ref() {
        let record = record?;
        if session.process(&record)?.is_none() {
            continue;
        }
        summary.records_processed += 1;

        let Some(now) = parse_timestamp(record.timestamp()) else {
            if summary.unparsable_timestamps == 0 {
                log::warn!(
                    "Cannot parse timestamp {:?}; such records are not sampled",
                    record.timestamp()
                );
            }
            summary.unparsable_timestamps += 1;
            continue;
        };

        let symbol = record.symbol();
        if sampler.poll(symbol, now) {
            let book = session
                .book_mut(symbol)
                .ok_or_else(|| BookError::SymbolNotFound(symbol.to_string()))?;
            let metrics = sample(book, record.timestamp(), sampler.interval_secs());
            output.write(symbol, &metrics)?;
            summary.samples_written += 1;
        }
    }

    output.finish()?;
    summary.lines_read = records.line_no();
    summary.lines_skipped = records.skipped();
    summary.files_created = match &output {
        Output::Single(_) => 1,
        Output::Split(writer) => writer.file_count(),
    };

    Ok((summary, session))
}

fn report<B: ReconstructedBook>(args: &Args, summary: &RunSummary, session: &MultiSymbolBooks<B>) -> Result<()> {
    println!("\n{}", "=".repeat(60));
    println!("Summary");
    println!("{}", "=".repeat(60));
    println!("  Input lines: {}", summary.lines_read);
    println!("  Lines skipped: {}", summary.lines_skipped);
    println!("  Records processed: {}", summary.records_processed);
    println!("  Symbols: {}", session.symbol_count());
    println!("  Samples written: {}", summary.samples_written);
    if summary.unparsable_timestamps > 0 {
        println!("  Unparsable timestamps: {}", summary.unparsable_timestamps);
    }
    if args.separate_files {
        println!("  Files created: {}", summary.files_created);
    } else {
        println!("  Output file: {}", args.output.display());
    }

    for symbol in session.symbols() {
        if let Ok(stats) = session.symbol_stats(symbol) {
            println!(
                "  {}: {} snapshots, {} updates, {} invalid, {} orphan, {}/{} checksum failures",
                symbol,
                stats.snapshots,
                stats.updates,
                stats.invalid_inputs,
                stats.orphan_events,
                stats.checksum_failures,
                stats.checksum_checks,
            );
        }
    }

    let warnings = session.warnings();
    if !warnings.is_empty() {
        let summary = warnings.summary();
        println!("  Warnings: {}", summary.total);
        for (category, count) in &summary.by_category {
            println!("    {}: {}", category, count);
        }
    }

    if let Some(path) = &args.warnings {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        warnings.export_jsonl(&mut writer)?;
        writer.flush()?;
        println!("  Warnings file: {}", path.display());
    }

    Ok(())
}

fn run(args: &Args) -> Result<()> {
    match args.level {
        3 => {
            let (summary, session) = replay::<OrderLevelBook, _>(args, |book, timestamp, secs| {
                let metrics = OrderLevelMetrics::calculate(book, timestamp, secs);
                book.reset_event_counters();
                metrics
            })?;
            report(args, &summary, &session)
        }
        _ => {
            let (summary, session) = replay::<PriceLevelBook, _>(args, |book, timestamp, _| {
                PriceLevelMetrics::calculate(&*book, timestamp)
            })?;
            report(args, &summary, &session)
        }
    }
}

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    println!("Input: {}", args.input.display());
    println!("Level: {}", args.level);
    println!(
        "Interval: {} ({} seconds)",
        args.interval_text,
        args.interval.as_secs_f64()
    );
    if !args.symbols.is_empty() {
        println!("Symbols: {}", args.symbols.join(", "));
    }

    let start = Instant::now();
    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    println!(
        "Processing complete in {:.1}s.",
        start.elapsed().as_secs_f64()
    );
}
