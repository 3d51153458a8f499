//! smelter-convert: Convert JSON into a relational schema and/or a document model
//!
//! Usage:
//!   # Print CREATE TABLE statements for a file
//!   smelter-convert users.json --name users
//!
//!   # Schema plus INSERT statements, from stdin
//!   echo '[{"name": "Alice", "posts": [{"title": "Hi"}]}]' | smelter-convert --inserts
//!
//!   # Both models as JSON Lines files, one per table/collection
//!   smelter-convert --ndjson events.jsonl --mode both --output-dir ./out
//!
//!   # Reproducible document ids and timestamps
//!   smelter-convert data.json --mode nosql --now 1700000000 --seed 42
//!
//! Logging goes to stderr and is controlled with `RUST_LOG`.

// Use MiMalloc allocator for better performance (recommended by simd-json)
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use smelter::clock::{Clock, FixedClock, RandomSource, SeededRandom, SystemClock, ThreadRandom};
use smelter::input::read_json;
use smelter::storage::{NOSQL_CATEGORY, SQL_CATEGORY};
use smelter::{
    render_inserts, render_schema, ConvertConfig, DocumentConverter, ModelWriter,
    RelationalConverter, SingleWriter,
};
use std::fs::File;
use std::io::{stdin, Read};
use std::path::Path;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    Sql,
    Nosql,
    Both,
}

#[derive(Parser, Debug)]
#[command(name = "smelter-convert")]
#[command(about = "Convert JSON into SQL tables and NoSQL collections", long_about = None)]
struct Args {
    /// Input file (use stdin if omitted)
    #[arg(value_name = "FILE")]
    input: Option<String>,

    /// Process newline-delimited JSON (one JSON value per line)
    #[arg(long)]
    ndjson: bool,

    /// Root table / collection name
    #[arg(long, default_value = "data")]
    name: String,

    /// Which model(s) to produce
    #[arg(long, value_enum, default_value_t = Mode::Sql)]
    mode: Mode,

    /// Also print INSERT statements after the schema
    #[arg(long)]
    inserts: bool,

    /// Print rows and documents as one tagged JSON Lines stream
    #[arg(long, conflicts_with = "output_dir")]
    jsonl: bool,

    /// Output directory for separate .jsonl files per table and collection
    #[arg(long, short = 'o')]
    output_dir: Option<String>,

    /// JSON configuration file; flags below override its values
    #[arg(long)]
    config: Option<String>,

    /// Separator for nested table and collection names (default: "_")
    #[arg(long)]
    separator: Option<String>,

    /// Maximum nesting depth to extract (default: 64)
    #[arg(long)]
    max_depth: Option<usize>,

    /// Pin conversion time to this many seconds after the Unix epoch
    #[arg(long, value_name = "EPOCH_SECS")]
    now: Option<i64>,

    /// Seed the random segment of document ids; with --now the output is reproducible
    #[arg(long, requires = "now")]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = build_config(&args)?;

    let reader: Box<dyn Read> = if let Some(file_path) = &args.input {
        Box::new(File::open(file_path).with_context(|| format!("Failed to open {}", file_path))?)
    } else {
        Box::new(stdin())
    };
    let value = read_json(reader, args.ndjson).context("Failed to parse JSON")?;

    let relational = match args.mode {
        Mode::Sql | Mode::Both => Some(
            RelationalConverter::with_clock(config.clone(), clock_for(args.now))
                .convert(&value, &args.name)?,
        ),
        Mode::Nosql => None,
    };

    let document = match args.mode {
        Mode::Nosql | Mode::Both => {
            let converter = DocumentConverter::with_sources(
                config.clone(),
                clock_for(args.now),
                random_for(args.seed),
            );
            Some(converter.convert(&value, &args.name)?)
        }
        Mode::Sql => None,
    };

    if let Some(output_dir) = &args.output_dir {
        let root = Path::new(output_dir);

        // Tables and collections share names, so each model gets its own directory
        if let Some(model) = &relational {
            let dir = root.join(SQL_CATEGORY);
            let mut writer = ModelWriter::new(&dir)?;
            writer.write_relational(model)?;
            writer.flush()?;
            std::fs::write(dir.join("schema.sql"), render_schema(model))?;
            if args.inserts {
                std::fs::write(dir.join("inserts.sql"), render_inserts(model))?;
            }
            info!(dir = %dir.display(), tables = model.tables.len(), "wrote relational model");
        }
        if let Some(model) = &document {
            let dir = root.join(NOSQL_CATEGORY);
            let mut writer = ModelWriter::new(&dir)?;
            writer.write_documents(model)?;
            writer.flush()?;
            info!(dir = %dir.display(), collections = model.collections.len(), "wrote document model");
        }
        return Ok(());
    }

    if args.jsonl {
        let mut writer = SingleWriter::new(std::io::stdout().lock());
        if let Some(model) = &relational {
            writer.write_relational(model)?;
        }
        if let Some(model) = &document {
            writer.write_documents(model)?;
        }
        writer.flush()?;
        return Ok(());
    }

    if let Some(model) = &relational {
        println!("{}", render_schema(model));
        if args.inserts {
            println!();
            println!("{}", render_inserts(model));
        }
    }
    if let Some(model) = &document {
        if relational.is_some() {
            println!();
        }
        println!("{}", serde_json::to_string_pretty(model)?);
    }

    Ok(())
}

fn build_config(args: &Args) -> Result<ConvertConfig> {
    let mut config = match &args.config {
        Some(path) => ConvertConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path))?,
        None => ConvertConfig::default(),
    };

    if let Some(sep) = &args.separator {
        config.separator = sep.clone();
    }
    if let Some(depth) = args.max_depth {
        config.max_depth = depth;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn clock_for(now: Option<i64>) -> Box<dyn Clock> {
    match now {
        Some(secs) => Box::new(FixedClock::at_epoch_secs(secs)),
        None => Box::new(SystemClock),
    }
}

fn random_for(seed: Option<u64>) -> Box<dyn RandomSource> {
    match seed {
        Some(seed) => Box::new(SeededRandom::new(seed)),
        None => Box::new(ThreadRandom::default()),
    }
}
