//! smelter-analyze: Describe the structure of JSON and preview both conversions
//!
//! Usage:
//!   # Read from file, output to stdout
//!   smelter-analyze data.json
//!
//!   # Read from stdin with compact output
//!   echo '[{"id": 1, "tags": ["a"]}]' | smelter-analyze --compact

use anyhow::Result;
use clap::Parser;
use serde_json::json;
use smelter::{convert_json, ConvertConfig};
use std::fs::File;
use std::io::{stdin, Read};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "smelter-analyze")]
#[command(about = "Analyze JSON structure and recommend a storage model", long_about = None)]
struct Args {
    /// Input file (use stdin if omitted)
    #[arg(value_name = "FILE")]
    input: Option<String>,

    /// Process newline-delimited JSON (one JSON value per line)
    #[arg(long)]
    ndjson: bool,

    /// Compact output (no pretty-printing)
    #[arg(long)]
    compact: bool,

    /// Root table / collection name used for the preview
    #[arg(long, default_value = "data")]
    name: String,

    /// Number of leading array elements the analysis inspects
    #[arg(long, default_value_t = 10)]
    sample_size: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let reader: Box<dyn Read> = if let Some(file_path) = &args.input {
        Box::new(File::open(file_path)?)
    } else {
        Box::new(stdin())
    };

    let config = ConvertConfig {
        sample_size: args.sample_size,
        ..ConvertConfig::default()
    };
    let conversion = convert_json(reader, args.ndjson, &args.name, config)?;

    let report = json!({
        "analysis": conversion.analysis,
        "preview": conversion.preview,
    });

    let output = if args.compact {
        serde_json::to_string(&report)?
    } else {
        serde_json::to_string_pretty(&report)?
    };

    println!("{}", output);

    Ok(())
}
