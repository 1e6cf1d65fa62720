//! Seeds an in memory table and pages through it from the command line

use clap::Parser;
use owo_colors::OwoColorize;
use std::error::Error;
use std::sync::Arc;
use tracing::info;

mod args;

use args::{Args, Mode};
use tidepool_core::client::{BatchGetSource, RangeQuerySource, ScanSource};
use tidepool_core::server::{trace, Conf};
use tidepool_core::shared::queries::{BatchGetRequest, QueryRequest, ScanRequest};
use tidepool_core::shared::traits::{PageSource, SourceKind};
use tidepool_core::shared::values::{KeySchema, Record, ResumeKey, Scalar};
use tidepool_core::tables::EphemeralTable;
use tidepool_core::{Errors, FromRecord, PagedIterable};

/// The table our demo rows live in
const TABLE: &str = "demo";

/// The partition our demo rows live in
const TENANT: &str = "acme";

/// A demo row
#[derive(Debug)]
struct DemoRow {
    /// The id of this row
    id: String,
    /// The position this row was seeded at
    n: f64,
}

impl FromRecord for DemoRow {
    fn from_record(record: &Record) -> Result<Self, Errors> {
        let id = record
            .get("id")
            .and_then(Scalar::as_str)
            .ok_or_else(|| Errors::materialize("demo row has no id"))?;
        let n = record
            .get("n")
            .and_then(Scalar::as_number)
            .ok_or_else(|| Errors::materialize("demo row has no n"))?;
        Ok(DemoRow {
            id: id.to_owned(),
            n,
        })
    }
}

/// Build the zero padded id for a row so ids sort in seed order
///
/// # Arguments
///
/// * `index` - The index of this row
/// * `rows` - The total number of rows
fn row_id(index: usize, rows: usize) -> String {
    let width = rows.saturating_sub(1).to_string().len();
    format!("H_{index:0width$}")
}

/// Seed our demo table
///
/// # Arguments
///
/// * `conf` - The tidepool config
/// * `rows` - The number of rows to seed
fn seed(conf: &Conf, rows: usize) -> Result<EphemeralTable, Box<dyn Error>> {
    let mut table = EphemeralTable::new(TABLE, KeySchema::composite("tenant", "id"), conf);
    for index in 0..rows {
        let row = Record::new()
            .with("tenant", TENANT)
            .with("id", row_id(index, rows))
            .with("n", index);
        table.insert(row)?;
    }
    info!(rows = table.len(), "seeded demo table");
    Ok(table)
}

/// Configure a paged iterable from our args and print everything it returns
///
/// # Arguments
///
/// * `iterable` - The iterable to drain
/// * `args` - The command line args
fn drain<S: PageSource + Clone>(
    mut iterable: PagedIterable<S, DemoRow>,
    args: &Args,
) -> Result<(), Box<dyn Error>> {
    if let Some(limit) = args.limit {
        iterable.set_limit(limit)?;
    }
    // resume from a prior run if we were asked to
    if let Some(position) = &args.position {
        match &args.hash_key {
            Some(hash_key) => iterable.set_position_with_hash_key(position, hash_key.as_str())?,
            None => iterable.set_position(position)?,
        }
    }
    let mut paging = iterable.iter();
    let mut returned = 0;
    for row in paging.by_ref() {
        let row = row?;
        println!("{} {}", row.id.bright_green(), row.n);
        returned += 1;
    }
    println!(
        "{} results over {} pages",
        returned.bright_blue(),
        paging.pages_fetched().bright_blue()
    );
    if args.limit.is_some() {
        let more = paging.has_results_past_limit()?;
        println!("results past limit: {}", more.bright_yellow());
    }
    // batch gets have no position to print
    let token = match paging.source().kind() {
        SourceKind::BatchGet => None,
        _ if args.hash_key.is_some() => paging.position_without_hash_key()?,
        _ => paging.position()?,
    };
    match token {
        Some(token) => println!("position: {}", token.bright_yellow()),
        None => println!("{}", "nothing to resume from".bright_red()),
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    // get our command line args
    let args = Args::parse();
    // load our config
    let conf = Conf::new(&args.conf)?;
    // setup tracing
    trace::setup(&conf)?;
    // seed the table we page through
    let table = Arc::new(seed(&conf, args.rows)?);
    let codec = conf.paging.codec();
    match args.mode {
        Mode::Query => {
            let request = QueryRequest::new(TABLE, TENANT);
            let source = RangeQuerySource::new(table, request)?;
            drain(PagedIterable::with_codec(source, codec), &args)
        }
        Mode::Scan => {
            let source = ScanSource::new(table, ScanRequest::new(TABLE))?;
            drain(PagedIterable::with_codec(source, codec), &args)
        }
        Mode::Batch => {
            let keys = (0..args.rows)
                .map(|index| {
                    ResumeKey::new()
                        .with("tenant", TENANT)
                        .with("id", row_id(index, args.rows))
                })
                .collect();
            let source = BatchGetSource::new(table, BatchGetRequest::new(TABLE, keys));
            drain(PagedIterable::with_codec(source, codec), &args)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::row_id;

    #[test]
    fn ids_sort_in_seed_order() {
        assert_eq!(row_id(3, 8), "H_3");
        assert_eq!(row_id(3, 120), "H_003");
        let mut ids = (0..12).map(|i| row_id(i, 12)).collect::<Vec<_>>();
        let seeded = ids.clone();
        ids.sort();
        assert_eq!(ids, seeded);
    }
}
