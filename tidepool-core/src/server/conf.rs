//! The config for a tidepool store and the clients that page through it

use config::{Config, ConfigError};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

use crate::shared::position::{PositionCodec, DEFAULT_MAX_TOKEN_LEN};

/// Help serde default how many rows a page evaluates
fn default_page_size() -> usize {
    100
}

/// Help serde default how many keys a batch get resolves per call
fn default_batch_get_max() -> usize {
    100
}

/// Help serde default the longest position token we decode
fn default_max_token_len() -> usize {
    DEFAULT_MAX_TOKEN_LEN
}

/// The paging settings for tidepool
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Paging {
    /// The number of rows a query or scan page evaluates
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// The number of keys a batch get resolves per call
    #[serde(default = "default_batch_get_max")]
    pub batch_get_max: usize,
    /// The longest position token to decode
    #[serde(default = "default_max_token_len")]
    pub max_token_len: usize,
}

impl Default for Paging {
    /// Builds a default paging struct
    fn default() -> Self {
        Paging {
            page_size: default_page_size(),
            batch_get_max: default_batch_get_max(),
            max_token_len: default_max_token_len(),
        }
    }
}

impl Paging {
    /// Build a position codec bound by these settings
    #[must_use]
    pub fn codec(&self) -> PositionCodec {
        PositionCodec::new(self.max_token_len)
    }
}

/// The different levels to log tracing info at
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TraceLevel {
    /// Log everything include high verbosity low priority info
    Trace,
    /// Log low priority debug infomation and up
    Debug,
    /// Log standard priority information and up
    #[default]
    Info,
    /// Log only warning and Errors
    Warn,
    /// Log only errors
    Error,
    /// Do not log anything
    Off,
}

impl TraceLevel {
    /// Convert this [`TraceLevel`] to a [`LevelFilter`]
    #[must_use]
    pub fn to_filter(&self) -> LevelFilter {
        match self {
            TraceLevel::Trace => LevelFilter::TRACE,
            TraceLevel::Debug => LevelFilter::DEBUG,
            TraceLevel::Info => LevelFilter::INFO,
            TraceLevel::Warn => LevelFilter::WARN,
            TraceLevel::Error => LevelFilter::ERROR,
            TraceLevel::Off => LevelFilter::OFF,
        }
    }
}

/// The tracing settings for tidepool
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Tracing {
    // The level to log traces at
    #[serde(default)]
    pub level: TraceLevel,
}

/// The config for running tidepool
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Conf {
    /// The paging settings to use
    #[serde(default)]
    pub paging: Paging,
    /// The tracing settings to use
    #[serde(default)]
    pub tracing: Tracing,
}

impl Conf {
    /// Build a config from our environment and a config file
    ///
    /// The file is optional and env vars like `TIDEPOOL_PAGING__PAGE_SIZE`
    /// are overlaid on top of it.
    ///
    /// # Arguments
    ///
    /// * `path` - The path to our config file
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        // build our config sources
        let conf = Config::builder()
            // start with the settings in our config file
            .add_source(config::File::with_name(path).required(false))
            // overlay our env vars on top
            .add_source(
                config::Environment::with_prefix("tidepool")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        conf.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::{Conf, TraceLevel};
    use tracing::level_filters::LevelFilter;

    #[test]
    fn missing_files_use_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("absent.yml");
        let conf = Conf::new(path.to_str().expect("utf-8 path")).expect("defaults load");
        assert_eq!(conf.paging.page_size, 100);
        assert_eq!(conf.paging.batch_get_max, 100);
        assert_eq!(conf.paging.codec().max_token_len(), 8 * 1024);
    }

    #[test]
    fn files_override_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tidepool.yml");
        let mut file = std::fs::File::create(&path).expect("create config");
        writeln!(file, "paging:\n  page_size: 3\n  max_token_len: 64\ntracing:\n  level: Debug")
            .expect("write config");
        let conf = Conf::new(path.to_str().expect("utf-8 path")).expect("valid config");
        assert_eq!(conf.paging.page_size, 3);
        // unset fields keep their defaults
        assert_eq!(conf.paging.batch_get_max, 100);
        assert_eq!(conf.paging.codec().max_token_len(), 64);
        assert_eq!(conf.tracing.level, TraceLevel::Debug);
    }

    #[test]
    fn bad_files_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tidepool.yml");
        std::fs::write(&path, "paging:\n  page_size: lots\n").expect("write config");
        assert!(Conf::new(path.to_str().expect("utf-8 path")).is_err());
    }

    #[test]
    fn levels_map_to_filters() {
        assert_eq!(TraceLevel::default().to_filter(), LevelFilter::INFO);
        assert_eq!(TraceLevel::Off.to_filter(), LevelFilter::OFF);
        assert_eq!(TraceLevel::Trace.to_filter(), LevelFilter::TRACE);
    }
}
