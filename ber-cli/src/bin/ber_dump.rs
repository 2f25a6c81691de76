//! `ber-dump`: pretty-print the BER-encoded values in a file.

use anyhow::{Context, Result};
use ber_codec::ber::printer::Printer;
use clap::Parser;
use std::path::PathBuf;

/// Pretty-print the TLV structure of a BER-encoded file.
#[derive(Parser, Debug)]
#[command(name = "ber-dump", version, about)]
struct Cli {
    /// File to decode.
    file: PathBuf,

    /// Spaces per indent level.
    #[arg(long, default_value_t = 2)]
    tab_size: usize,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let data = std::fs::read(&cli.file)
        .with_context(|| format!("reading {}", cli.file.display()))?;

    let printer = Printer::with_tab_size(cli.tab_size);
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    printer
        .print(&data, &mut handle)
        .with_context(|| format!("decoding {}", cli.file.display()))?;

    Ok(())
}
