//! Dialect code generation CLI.
//!
//! Usage:
//!   mavgen message_definitions/common.xml -o src/common.rs
//!
//! Exits 0 on success; non-zero when the input XML is missing or malformed.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use mavswitch_dialect::{generate, load_dialect};

#[derive(Parser, Debug)]
#[command(name = "mavgen")]
#[command(about = "Generate a typed MAVLink codec from a dialect XML file")]
#[command(version)]
struct Args {
    /// Path to the dialect XML definition
    input: PathBuf,

    /// Where to write the generated Rust module
    #[arg(short, long)]
    output: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let dialect = load_dialect(&args.input)
        .with_context(|| format!("failed to load dialect from {}", args.input.display()))?;
    info!(
        enums = dialect.enums.len(),
        messages = dialect.messages.len(),
        "parsed dialect"
    );

    let code = generate(&dialect);
    std::fs::write(&args.output, code)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    info!(output = %args.output.display(), "generated dialect module");

    Ok(())
}

fn init_logging(level: &str) {
    let level = match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        _ => tracing::Level::ERROR,
    };
    tracing_subscriber::fmt().with_max_level(level).init();
}
