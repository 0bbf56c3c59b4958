// Main entry point for the selectspec CLI
// Loads tables, builds one query spec from the command line, runs it and
// prints the result

use anyhow::{Context, Result};
use clap::{Parser as ClapParser, ValueEnum};
use selectspec::listing;
use selectspec::{LockContention, QueryExecutor, QuerySpecBuilder, SessionId, Value};
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// selectspec - build a query spec fluently and run it against in-memory tables
#[derive(ClapParser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// SQL script with CREATE TABLE / INSERT statements (default: built-in `mhs` table)
    #[arg(short, long)]
    script: Option<PathBuf>,

    /// Table to query
    #[arg(short, long, default_value = listing::MHS_TABLE)]
    table: String,

    /// Select list entry (`expr [AS alias]`), repeatable; default is every column
    #[arg(short, long = "field")]
    fields: Vec<String>,

    /// Search condition
    #[arg(short = 'w', long = "where")]
    filter: Option<String>,

    /// Grouping expression, repeatable
    #[arg(long)]
    group_by: Vec<String>,

    /// Aggregate filter (requires --group-by)
    #[arg(long)]
    having: Option<String>,

    /// Sort expression (`expr [ASC|DESC]`), repeatable
    #[arg(long)]
    order_by: Vec<String>,

    /// Maximum number of rows
    #[arg(long, allow_negative_numbers = true)]
    limit: Option<i64>,

    /// Rows to skip before the first returned row
    #[arg(long, allow_negative_numbers = true)]
    offset: Option<i64>,

    /// Bind a placeholder value (`name=value`), repeatable
    #[arg(short, long = "bind", value_parser = parse_binding)]
    bindings: Vec<(String, Value)>,

    /// Row lock to take on matching rows
    #[arg(long, value_enum)]
    lock: Option<LockArg>,

    /// What to do when a row lock is held by someone else
    #[arg(long, value_enum, default_value_t = ContentionArg::Default)]
    contention: ContentionArg,

    /// Output style
    #[arg(long, value_enum, default_value_t = Format::Table)]
    format: Format,

    /// Print the resolved spec (SQL and JSON) before running it
    #[arg(long)]
    explain: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum LockArg {
    Shared,
    Exclusive,
}

#[derive(Clone, Copy, ValueEnum)]
enum ContentionArg {
    Default,
    Nowait,
    SkipLocked,
}

impl From<ContentionArg> for LockContention {
    fn from(arg: ContentionArg) -> Self {
        match arg {
            ContentionArg::Default => LockContention::Default,
            ContentionArg::Nowait => LockContention::NoWait,
            ContentionArg::SkipLocked => LockContention::SkipLocked,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    /// Boxed table
    Table,
    /// `Label : value` lines per student (needs NAMA, NIM, Jurusan, Alamat)
    Students,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level)?;

    let mut executor = QueryExecutor::new();
    match &args.script {
        Some(path) => {
            let sql = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            executor.run_script(&sql)?;
            info!(script = %path.display(), tables = ?executor.list_tables(), "script loaded");
        }
        None => {
            listing::load_mhs(&mut executor)?;
            info!("built-in mhs table loaded");
        }
    }

    let spec = build_spec(&args)?.resolve()?;

    if args.explain {
        println!("{}", spec.to_sql(&args.table));
        println!("{}", serde_json::to_string_pretty(&spec)?);
        println!();
    }

    let fields: Vec<&str> = args.fields.iter().map(String::as_str).collect();
    let result = executor.select(SessionId(1), &args.table, &fields, &spec)?;

    match args.format {
        Format::Table => println!("{}", result.format()),
        Format::Students => println!("{}", listing::format_students(&result)?),
    }

    Ok(())
}

/// Apply every query flag to a fresh builder
fn build_spec(args: &Args) -> Result<QuerySpecBuilder> {
    let mut builder = QuerySpecBuilder::new();

    if let Some(filter) = &args.filter {
        builder.r#where(filter);
    }
    if !args.group_by.is_empty() {
        builder.group_by(args.group_by.iter().cloned());
    }
    if let Some(having) = &args.having {
        builder.having(having);
    }
    if !args.order_by.is_empty() {
        builder.order_by(args.order_by.iter().cloned());
    }
    if let Some(limit) = args.limit {
        builder.limit(limit)?;
    }
    if let Some(offset) = args.offset {
        builder.offset(offset)?;
    }
    for (name, value) in &args.bindings {
        builder.bind(name, value.clone());
    }

    let contention = LockContention::from(args.contention);
    match args.lock {
        Some(LockArg::Shared) => {
            builder.lock_shared_with(contention);
        }
        Some(LockArg::Exclusive) => {
            builder.lock_exclusive_with(contention);
        }
        None => {}
    }

    Ok(builder)
}

/// Parse `name=value`; the value is typed as integer, float, boolean, NULL or text
fn parse_binding(s: &str) -> Result<(String, Value), String> {
    let (name, raw) = s
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{}'", s))?;
    let name = name.trim().trim_start_matches(':');
    if name.is_empty() {
        return Err(format!("missing placeholder name in '{}'", s));
    }

    let value = if let Ok(i) = raw.parse::<i64>() {
        Value::Integer(i)
    } else if let Ok(f) = raw.parse::<f64>() {
        Value::Float(f)
    } else if raw.eq_ignore_ascii_case("true") || raw.eq_ignore_ascii_case("false") {
        Value::Boolean(raw.eq_ignore_ascii_case("true"))
    } else if raw.eq_ignore_ascii_case("null") {
        Value::Null
    } else {
        Value::Text(raw.to_string())
    };
    Ok((name.to_string(), value))
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}
