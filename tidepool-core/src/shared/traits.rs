//! The traits that paging is built upon
//!
//! Item stores implement the backend traits for the continuation styles they
//! speak, and the client wraps each style in a [`PageSource`].

use std::fmt;

use super::queries::{BatchGetRequest, QueryRequest, ScanRequest};
use super::responses::{BatchGetOutput, QueryOutput};
use super::values::{KeySchema, Page, Record, ResumeKey};
use crate::client::Errors;

/// Allow types to be materialized from a raw record
pub trait FromRecord: Sized {
    /// Build this type from a raw record
    ///
    /// Any error returned here is handed to the caller unchanged.
    ///
    /// # Arguments
    ///
    /// * `record` - The record to materialize
    fn from_record(record: &Record) -> Result<Self, Errors>;
}

impl FromRecord for Record {
    fn from_record(record: &Record) -> Result<Self, Errors> {
        Ok(record.clone())
    }
}

/// The base trait for any item store
pub trait ItemBackend {
    /// The error this store fails with
    type Error: std::error::Error + Send + Sync + 'static;

    /// Get the key layout of a table
    ///
    /// # Arguments
    ///
    /// * `table` - The table to describe
    fn key_schema(&self, table: &str) -> Result<KeySchema, Self::Error>;
}

/// A store that can read one page of a sorted partition
pub trait QueryBackend: ItemBackend {
    /// Read one page of a partition
    ///
    /// # Arguments
    ///
    /// * `request` - The query to run
    /// * `start` - The key to continue after
    fn query(
        &self,
        request: &QueryRequest,
        start: Option<&ResumeKey>,
    ) -> Result<QueryOutput, Self::Error>;
}

/// A store that can read one page of a whole table
pub trait ScanBackend: ItemBackend {
    /// Read one page of a table
    ///
    /// # Arguments
    ///
    /// * `request` - The scan to run
    /// * `start` - The key to continue after
    fn scan(
        &self,
        request: &ScanRequest,
        start: Option<&ResumeKey>,
    ) -> Result<QueryOutput, Self::Error>;
}

/// A store that can resolve an explicit set of keys
pub trait BatchGetBackend: ItemBackend {
    /// Resolve as many of the requested keys as the store allows in one call
    ///
    /// # Arguments
    ///
    /// * `request` - The keys to resolve
    fn batch_get(&self, request: &BatchGetRequest) -> Result<BatchGetOutput, Self::Error>;
}

/// The continuation style a page source speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// A sorted query over one partition
    RangeQuery,
    /// An unordered scan over a table
    Scan,
    /// A batch get over explicit keys
    BatchGet,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::RangeQuery => write!(f, "range query"),
            SourceKind::Scan => write!(f, "scan"),
            SourceKind::BatchGet => write!(f, "batch get"),
        }
    }
}

/// Fetches pages from a store and tracks where the next one starts
pub trait PageSource {
    /// The continuation style of this source
    fn kind(&self) -> SourceKind;

    /// Fetch the next page and advance this sources continuation state
    fn fetch_page(&mut self) -> Result<Page, Errors>;

    /// Whether this source believes more pages may exist
    fn has_more(&self) -> bool;

    /// The key layout used to build resume keys
    fn key_schema(&self) -> Result<&KeySchema, Errors>;

    /// Set the key to continue after on the next fetch
    ///
    /// # Arguments
    ///
    /// * `key` - The exclusive start key
    fn set_exclusive_start_key(&mut self, key: ResumeKey) -> Result<(), Errors>;

    /// The last key the store reported evaluating
    fn last_evaluated_key(&self) -> Result<Option<&ResumeKey>, Errors>;

    /// The key fields of this sources table, hash key first
    fn key_fields(&self) -> Result<Vec<&str>, Errors> {
        Ok(self.key_schema()?.fields())
    }

    /// The hash key field of this sources table
    fn hash_key_field(&self) -> Result<&str, Errors> {
        Ok(self.key_schema()?.hash_key())
    }

    /// Check if a field is the hash key of this sources table
    ///
    /// # Arguments
    ///
    /// * `field` - The field to check
    fn is_hash_key_field(&self, field: &str) -> Result<bool, Errors> {
        Ok(self.key_schema()?.is_hash_key(field))
    }
}
