//! The item store side of tidepool along with its ambient setup
//!
//! This holds the in memory tables that speak each continuation style and
//! the config and tracing setup shared by anything that hosts them.

mod conf;
pub mod errors;
pub mod tables;
pub mod trace;

pub use conf::{Conf, Paging, TraceLevel, Tracing};
pub use errors::ServerError;
