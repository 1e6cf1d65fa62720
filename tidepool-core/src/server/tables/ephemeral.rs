//! Ephemeral tables are fully in memory and are never persisted to disk
//!
//! They speak every continuation style the client understands, paging the way
//! a remote store would: a page evaluates a bounded number of rows, filters
//! run after evaluation, and a last evaluated key is only handed back while
//! evaluated rows remain.

use std::collections::BTreeMap;
use std::ops::Bound;
use tracing::{event, instrument, Level};

use super::partitions::Partition;
use crate::server::{Conf, ServerError};
use crate::shared::queries::{passes, BatchGetRequest, Filter, QueryRequest, ScanRequest};
use crate::shared::responses::{BatchGetOutput, QueryOutput};
use crate::shared::traits::{BatchGetBackend, ItemBackend, QueryBackend, ScanBackend};
use crate::shared::values::{KeySchema, Record, ResumeKey, Scalar};

/// A table that stores all rows only in memory
#[derive(Debug)]
pub struct EphemeralTable {
    /// The name of this table
    name: String,
    /// The key layout of this table
    schema: KeySchema,
    /// The partitions in this table keyed by hash value
    partitions: BTreeMap<Scalar, Partition>,
    /// The rows a page evaluates unless a request says otherwise
    page_size: usize,
    /// The keys a batch get resolves per call
    batch_get_max: usize,
}

impl EphemeralTable {
    /// Create an ephemeral table
    ///
    /// # Arguments
    ///
    /// * `name` - The name of this table
    /// * `schema` - The key layout of this table
    /// * `conf` - The tidepool config
    pub fn new<N: Into<String>>(name: N, schema: KeySchema, conf: &Conf) -> Self {
        EphemeralTable {
            name: name.into(),
            schema,
            partitions: BTreeMap::default(),
            // a page or batch of zero would never make progress
            page_size: conf.paging.page_size.max(1),
            batch_get_max: conf.paging.batch_get_max.max(1),
        }
    }

    /// The name of this table
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The key layout of this table
    #[must_use]
    pub fn schema(&self) -> &KeySchema {
        &self.schema
    }

    /// The number of rows in this table
    #[must_use]
    pub fn len(&self) -> usize {
        self.partitions.values().map(Partition::len).sum()
    }

    /// Whether this table has no rows
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// Build an invalid key error for this table
    fn invalid(&self, reason: String) -> ServerError {
        ServerError::InvalidKey {
            table: self.name.clone(),
            reason,
        }
    }

    /// Make sure a request is for this table
    fn check_table(&self, table: &str) -> Result<(), ServerError> {
        if table != self.name {
            return Err(ServerError::UnknownTable(table.to_owned()));
        }
        Ok(())
    }

    /// Pull the partition and range values out of a row or key
    ///
    /// Hash only tables store their single row per partition under a null
    /// range value.
    ///
    /// # Arguments
    ///
    /// * `lookup` - Gets a field from the row or key
    fn locate<'a, F>(&self, lookup: F) -> Result<(Scalar, Scalar), ServerError>
    where
        F: Fn(&str) -> Option<&'a Scalar>,
    {
        // get a key field and make sure its kind can be a key
        let field = |name: &str| match lookup(name) {
            Some(value @ (Scalar::S(_) | Scalar::N(_))) => Ok(value.clone()),
            Some(other) => Err(self.invalid(format!(
                "key field {name:?} holds a {} value",
                other.kind()
            ))),
            None => Err(self.invalid(format!("missing key field {name:?}"))),
        };
        let hash = field(self.schema.hash_key())?;
        let range = match self.schema.range_key() {
            Some(range_key) => field(range_key)?,
            None => Scalar::Null,
        };
        Ok((hash, range))
    }

    /// Insert a row, returning any row it replaced
    ///
    /// # Arguments
    ///
    /// * `row` - The row to insert
    pub fn insert(&mut self, row: Record) -> Result<Option<Record>, ServerError> {
        // get our partition and range values
        let (hash, range) = self.locate(|name| row.get(name))?;
        // get our partition
        let partition = self.partitions.entry(hash).or_default();
        // insert this row into this partition
        Ok(partition.insert(range, row))
    }

    /// Get a single row by its key
    ///
    /// # Arguments
    ///
    /// * `key` - The key of the row to get
    pub fn get(&self, key: &ResumeKey) -> Result<Option<&Record>, ServerError> {
        let (hash, range) = self.locate(|name| key.get(name))?;
        Ok(self
            .partitions
            .get(&hash)
            .and_then(|partition| partition.get(&range)))
    }

    /// Delete a single row by its key
    ///
    /// # Arguments
    ///
    /// * `key` - The key of the row to delete
    pub fn delete(&mut self, key: &ResumeKey) -> Result<Option<Record>, ServerError> {
        let (hash, range) = self.locate(|name| key.get(name))?;
        let Some(partition) = self.partitions.get_mut(&hash) else {
            return Ok(None);
        };
        let removed = partition.remove(&range);
        // drop partitions that no longer hold anything
        if partition.is_empty() {
            self.partitions.remove(&hash);
        }
        Ok(removed)
    }

    /// Evaluate up to one page of rows
    ///
    /// # Arguments
    ///
    /// * `rows` - The rows in evaluation order
    /// * `page_size` - The most rows to evaluate
    /// * `filters` - The filters to apply after evaluation
    fn collect_page<'a, I>(
        &self,
        rows: I,
        page_size: usize,
        filters: &[Filter],
    ) -> Result<QueryOutput, ServerError>
    where
        I: Iterator<Item = &'a Record>,
    {
        let mut rows = rows.peekable();
        let mut output = QueryOutput::default();
        let mut last = None;
        while output.evaluated < page_size {
            let Some(row) = rows.next() else {
                break;
            };
            output.evaluated += 1;
            last = Some(row);
            // filtered rows still count as evaluated
            if passes(filters, row) {
                output.items.push(row.clone());
            }
        }
        // only hand back a key if there is something left to evaluate
        if rows.peek().is_some() {
            if let Some(row) = last {
                let key = row
                    .project(self.schema.fields())
                    .map_err(|field| self.invalid(format!("missing key field {field:?}")))?;
                output.last_evaluated_key = Some(key);
            }
        }
        Ok(output)
    }
}

impl ItemBackend for EphemeralTable {
    type Error = ServerError;

    fn key_schema(&self, table: &str) -> Result<KeySchema, ServerError> {
        self.check_table(table)?;
        Ok(self.schema.clone())
    }
}

impl QueryBackend for EphemeralTable {
    #[instrument(name = "EphemeralTable::query", skip_all, fields(table = %self.name), err(Debug))]
    fn query(
        &self,
        request: &QueryRequest,
        start: Option<&ResumeKey>,
    ) -> Result<QueryOutput, ServerError> {
        self.check_table(&request.table)?;
        let range_key = self.schema.range_key();
        if request.range.is_some() && range_key.is_none() {
            return Err(self.invalid("range conditions need a range key".to_owned()));
        }
        let page_size = request.page_size.unwrap_or(self.page_size).max(1);
        // continue after the range value of our start key
        let start = match start {
            Some(start) => {
                let (hash, range) = self.locate(|name| start.get(name))?;
                // a start key can only continue the partition it came from
                if hash != request.hash_value {
                    return Err(self.invalid(format!(
                        "start key is in partition {hash} not {}",
                        request.hash_value
                    )));
                }
                Some(range)
            }
            None => None,
        };
        let Some(partition) = self.partitions.get(&request.hash_value) else {
            return Ok(QueryOutput::default());
        };
        let rows = partition
            .after(start.as_ref(), request.scan_forward)
            // rows outside our key condition are never evaluated
            .filter(|(range, _)| match &request.range {
                Some(condition) => condition.matches(range),
                None => true,
            })
            .map(|(_, row)| row);
        let output = self.collect_page(rows, page_size, &request.filters)?;
        event!(
            Level::TRACE,
            evaluated = output.evaluated,
            returned = output.items.len(),
            "query page"
        );
        Ok(output)
    }
}

impl ScanBackend for EphemeralTable {
    #[instrument(name = "EphemeralTable::scan", skip_all, fields(table = %self.name), err(Debug))]
    fn scan(
        &self,
        request: &ScanRequest,
        start: Option<&ResumeKey>,
    ) -> Result<QueryOutput, ServerError> {
        self.check_table(&request.table)?;
        let page_size = request.page_size.unwrap_or(self.page_size).max(1);
        let start = match start {
            Some(start) => Some(self.locate(|name| start.get(name))?),
            None => None,
        };
        // skip every partition before the one we stopped in
        let lower = match &start {
            Some((hash, _)) => Bound::Included(hash),
            None => Bound::Unbounded,
        };
        let rows = self
            .partitions
            .range::<Scalar, _>((lower, Bound::Unbounded))
            .flat_map(|(hash, partition)| {
                // only the partition we stopped in has an exclusive start
                let after = match &start {
                    Some((start_hash, range)) if start_hash == hash => Some(range),
                    _ => None,
                };
                partition.after(after, true)
            })
            .map(|(_, row)| row);
        let output = self.collect_page(rows, page_size, &request.filters)?;
        event!(
            Level::TRACE,
            evaluated = output.evaluated,
            returned = output.items.len(),
            "scan page"
        );
        Ok(output)
    }
}

impl BatchGetBackend for EphemeralTable {
    #[instrument(name = "EphemeralTable::batch_get", skip_all, fields(table = %self.name, keys = request.keys.len()), err(Debug))]
    fn batch_get(&self, request: &BatchGetRequest) -> Result<BatchGetOutput, ServerError> {
        self.check_table(&request.table)?;
        // only resolve as many keys as one call allows
        let split = request.keys.len().min(self.batch_get_max);
        let (now, later) = request.keys.split_at(split);
        let mut output = BatchGetOutput {
            items: Vec::with_capacity(now.len()),
            unprocessed: later.to_vec(),
        };
        for key in now {
            // keys without a row are simply absent from our response
            if let Some(row) = self.get(key)? {
                output.items.push(row.clone());
            }
        }
        Ok(output)
    }
}
