use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(author, version, about = "Append new exchange candles to a local CSV file")]
pub struct Cli {
    /// Path to the config file (e.g. configs/bybit_btcusd_3m.toml)
    #[arg(short, long)]
    pub config: PathBuf,

    /// Stop after this many page requests, overriding `max_pages` in the config
    #[arg(long)]
    pub max_pages: Option<usize>,
}
