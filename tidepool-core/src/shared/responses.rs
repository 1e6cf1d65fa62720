//! The responses an item store sends back for a single page request

use super::values::{Record, ResumeKey};

/// The response to a query or scan page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOutput {
    /// The rows that passed all filters
    pub items: Vec<Record>,
    /// The number of rows read before filtering
    pub evaluated: usize,
    /// The key of the last row read when more rows remain
    pub last_evaluated_key: Option<ResumeKey>,
}

/// The response to a batch get
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchGetOutput {
    /// The rows that were found
    pub items: Vec<Record>,
    /// The requested keys that were not processed in this call
    pub unprocessed: Vec<ResumeKey>,
}
