//! Enables trace logging for tidepool to some sink

use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Filtered;
use tracing_subscriber::fmt::format::{DefaultFields, Format};
use tracing_subscriber::fmt::Layer as LayerFmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, Registry};

use super::conf::{Conf, Tracing};
use super::ServerError;

/// A fmt layer that writes to stderr
type StderrLayer = LayerFmt<Registry, DefaultFields, Format, fn() -> std::io::Stderr>;

/// Setup local tracing to stderr
///
/// # Arguments
///
/// * `conf` - The tracing settings to use
fn setup_local(conf: &Tracing) -> Filtered<StderrLayer, LevelFilter, Registry> {
    tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr as fn() -> std::io::Stderr)
        .with_filter(conf.level.to_filter())
}

/// Setup basic tracing
///
/// This fails if a global subscriber was already installed.
///
/// # Arguments
///
/// * `conf` - The tidepool config
pub fn setup(conf: &Conf) -> Result<(), ServerError> {
    // setup our local tracer
    let local = setup_local(&conf.tracing);
    // install it as our global subscriber
    tracing_subscriber::registry().with(local).try_init()?;
    Ok(())
}
