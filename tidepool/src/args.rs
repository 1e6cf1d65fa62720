//! The command line args for the tidepool demo

use clap::{Parser, ValueEnum};

/// The continuation style to page with
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    /// A sorted query over the seeded partition
    #[default]
    Query,
    /// An unordered scan over the whole table
    Scan,
    /// A batch get over every seeded key
    Batch,
}

/// Page through a seeded in memory table
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Args {
    /// The path to the config file for tidepool
    #[clap(short, long, default_value = "tidepool.yml")]
    pub conf: String,
    /// The number of rows to seed
    #[clap(short, long, default_value_t = 8)]
    pub rows: usize,
    /// The continuation style to page with
    #[clap(short, long, value_enum, default_value_t = Mode::Query)]
    pub mode: Mode,
    /// The most results to return
    #[clap(short, long)]
    pub limit: Option<usize>,
    /// A position token to resume from
    #[clap(short, long)]
    pub position: Option<String>,
    /// Supply the hash key apart from the position and leave it out of new ones
    #[clap(long)]
    pub hash_key: Option<String>,
}
