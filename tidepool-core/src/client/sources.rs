//! The page sources for each continuation style
//!
//! - [`RangeQuerySource`] continues a sorted partition query after a start key
//! - [`ScanSource`] continues an unordered table scan after a start key
//! - [`BatchGetSource`] keeps resending whatever keys the store left unprocessed

use std::sync::Arc;
use tracing::{debug, instrument, warn};

use super::Errors;
use crate::shared::queries::{BatchGetRequest, QueryRequest, ScanRequest};
use crate::shared::responses::QueryOutput;
use crate::shared::traits::{BatchGetBackend, PageSource, QueryBackend, ScanBackend, SourceKind};
use crate::shared::values::{Continuation, KeySchema, Page, ResumeKey};

/// Make sure a start key has every key field of a table
///
/// # Arguments
///
/// * `schema` - The key layout of the table
/// * `key` - The start key to check
fn check_start_key(schema: &KeySchema, key: &ResumeKey) -> Result<(), Errors> {
    for field in schema.fields() {
        if !key.contains(field) {
            return Err(Errors::MissingKeyField(field.to_owned()));
        }
    }
    Ok(())
}

/// Tracks where a store cursor left off for queries and scans
#[derive(Debug, Clone)]
struct StartKeyCursor {
    /// The key layout of the table we page through
    schema: KeySchema,
    /// The key to continue after
    start_key: Option<ResumeKey>,
    /// Whether we have fetched at least one page
    fetched: bool,
}

impl StartKeyCursor {
    /// Create a cursor that has not fetched anything yet
    ///
    /// # Arguments
    ///
    /// * `schema` - The key layout of the table we page through
    fn new(schema: KeySchema) -> Self {
        StartKeyCursor {
            schema,
            start_key: None,
            fetched: false,
        }
    }

    /// Move past a page the store sent back
    ///
    /// # Arguments
    ///
    /// * `output` - The page the store sent back
    fn advance(&mut self, output: QueryOutput) -> Page {
        self.fetched = true;
        // the stores last evaluated key is our next start key as is
        self.start_key = output.last_evaluated_key;
        let continuation = match &self.start_key {
            Some(key) => Continuation::StartKey(key.clone()),
            None => Continuation::None,
        };
        Page::new(output.items, continuation)
    }

    /// Whether the store may have more pages for us
    fn has_more(&self) -> bool {
        !self.fetched || self.start_key.is_some()
    }

    /// Continue after a key instead of where we are now
    ///
    /// # Arguments
    ///
    /// * `key` - The key to continue after
    fn set(&mut self, key: ResumeKey) -> Result<(), Errors> {
        check_start_key(&self.schema, &key)?;
        self.start_key = Some(key);
        Ok(())
    }
}

/// Pages through one partition in range key order
pub struct RangeQuerySource<B: QueryBackend> {
    /// The store to query
    backend: Arc<B>,
    /// The query to repeat for every page
    request: QueryRequest,
    /// Where the store left off
    cursor: StartKeyCursor,
}

impl<B: QueryBackend> RangeQuerySource<B> {
    /// Create a new range query source
    ///
    /// # Arguments
    ///
    /// * `backend` - The store to query
    /// * `request` - The query to page through
    pub fn new(backend: Arc<B>, request: QueryRequest) -> Result<Self, Errors> {
        // learn the key layout of this table
        let schema = backend
            .key_schema(&request.table)
            .map_err(Errors::source_fetch)?;
        Ok(RangeQuerySource {
            backend,
            request,
            cursor: StartKeyCursor::new(schema),
        })
    }

    /// The query this source repeats
    #[must_use]
    pub fn request(&self) -> &QueryRequest {
        &self.request
    }
}

impl<B: QueryBackend> Clone for RangeQuerySource<B> {
    fn clone(&self) -> Self {
        RangeQuerySource {
            backend: self.backend.clone(),
            request: self.request.clone(),
            cursor: self.cursor.clone(),
        }
    }
}

impl<B: QueryBackend> PageSource for RangeQuerySource<B> {
    fn kind(&self) -> SourceKind {
        SourceKind::RangeQuery
    }

    #[instrument(name = "RangeQuerySource::fetch_page", skip_all, fields(table = %self.request.table), err(Debug))]
    fn fetch_page(&mut self) -> Result<Page, Errors> {
        // ask for the page after our start key
        let output = self
            .backend
            .query(&self.request, self.cursor.start_key.as_ref())
            .map_err(Errors::source_fetch)?;
        debug!(
            items = output.items.len(),
            evaluated = output.evaluated,
            more = output.last_evaluated_key.is_some(),
            "fetched query page"
        );
        Ok(self.cursor.advance(output))
    }

    fn has_more(&self) -> bool {
        self.cursor.has_more()
    }

    fn key_schema(&self) -> Result<&KeySchema, Errors> {
        Ok(&self.cursor.schema)
    }

    fn set_exclusive_start_key(&mut self, key: ResumeKey) -> Result<(), Errors> {
        // a position from another partition would silently skip rows here
        let hash_key = self.cursor.schema.hash_key();
        if let Some(hash_value) = key.get(hash_key) {
            if *hash_value != self.request.hash_value {
                return Err(Errors::CorruptPosition(format!(
                    "position is for {hash_key} {hash_value} not {}",
                    self.request.hash_value
                )));
            }
        }
        self.cursor.set(key)
    }

    fn last_evaluated_key(&self) -> Result<Option<&ResumeKey>, Errors> {
        Ok(self.cursor.start_key.as_ref())
    }
}

/// Pages through a whole table in no particular order
///
/// Resuming a paused scan is only stable if the table is not modified in the
/// meantime.
pub struct ScanSource<B: ScanBackend> {
    /// The store to scan
    backend: Arc<B>,
    /// The scan to repeat for every page
    request: ScanRequest,
    /// Where the store left off
    cursor: StartKeyCursor,
}

impl<B: ScanBackend> ScanSource<B> {
    /// Create a new scan source
    ///
    /// # Arguments
    ///
    /// * `backend` - The store to scan
    /// * `request` - The scan to page through
    pub fn new(backend: Arc<B>, request: ScanRequest) -> Result<Self, Errors> {
        let schema = backend
            .key_schema(&request.table)
            .map_err(Errors::source_fetch)?;
        Ok(ScanSource {
            backend,
            request,
            cursor: StartKeyCursor::new(schema),
        })
    }
}

impl<B: ScanBackend> Clone for ScanSource<B> {
    fn clone(&self) -> Self {
        ScanSource {
            backend: self.backend.clone(),
            request: self.request.clone(),
            cursor: self.cursor.clone(),
        }
    }
}

impl<B: ScanBackend> PageSource for ScanSource<B> {
    fn kind(&self) -> SourceKind {
        SourceKind::Scan
    }

    #[instrument(name = "ScanSource::fetch_page", skip_all, fields(table = %self.request.table), err(Debug))]
    fn fetch_page(&mut self) -> Result<Page, Errors> {
        let output = self
            .backend
            .scan(&self.request, self.cursor.start_key.as_ref())
            .map_err(Errors::source_fetch)?;
        debug!(
            items = output.items.len(),
            evaluated = output.evaluated,
            more = output.last_evaluated_key.is_some(),
            "fetched scan page"
        );
        Ok(self.cursor.advance(output))
    }

    fn has_more(&self) -> bool {
        self.cursor.has_more()
    }

    fn key_schema(&self) -> Result<&KeySchema, Errors> {
        Ok(&self.cursor.schema)
    }

    fn set_exclusive_start_key(&mut self, key: ResumeKey) -> Result<(), Errors> {
        self.cursor.set(key)
    }

    fn last_evaluated_key(&self) -> Result<Option<&ResumeKey>, Errors> {
        Ok(self.cursor.start_key.as_ref())
    }
}

/// Resolves an explicit set of keys over as many calls as the store needs
///
/// There is no store cursor here, so positions and key field lookups are
/// rejected instead of quietly returning nothing.
pub struct BatchGetSource<B: BatchGetBackend> {
    /// The store to read from
    backend: Arc<B>,
    /// The table to read from
    table: String,
    /// The keys that still need resolving
    pending: Vec<ResumeKey>,
}

impl<B: BatchGetBackend> BatchGetSource<B> {
    /// Create a new batch get source
    ///
    /// # Arguments
    ///
    /// * `backend` - The store to read from
    /// * `request` - The keys to resolve
    #[must_use]
    pub fn new(backend: Arc<B>, request: BatchGetRequest) -> Self {
        BatchGetSource {
            backend,
            table: request.table,
            pending: request.keys,
        }
    }

    /// The keys that still need resolving
    #[must_use]
    pub fn pending(&self) -> &[ResumeKey] {
        &self.pending
    }
}

impl<B: BatchGetBackend> Clone for BatchGetSource<B> {
    fn clone(&self) -> Self {
        BatchGetSource {
            backend: self.backend.clone(),
            table: self.table.clone(),
            pending: self.pending.clone(),
        }
    }
}

impl<B: BatchGetBackend> PageSource for BatchGetSource<B> {
    fn kind(&self) -> SourceKind {
        SourceKind::BatchGet
    }

    #[instrument(name = "BatchGetSource::fetch_page", skip_all, fields(table = %self.table, pending = self.pending.len()), err(Debug))]
    fn fetch_page(&mut self) -> Result<Page, Errors> {
        // send every key we still need
        let request = BatchGetRequest::new(self.table.clone(), std::mem::take(&mut self.pending));
        let sent = request.keys.len();
        let output = match self.backend.batch_get(&request) {
            Ok(output) => output,
            Err(error) => {
                // put our keys back so the state still reflects what is pending
                self.pending = request.keys;
                return Err(Errors::source_fetch(error));
            }
        };
        // a store that resolves nothing will keep us looping
        if output.unprocessed.len() >= sent && output.items.is_empty() {
            warn!(sent, "batch get made no progress");
        }
        debug!(
            items = output.items.len(),
            unprocessed = output.unprocessed.len(),
            "fetched batch get page"
        );
        // whatever was left unprocessed is our next request
        self.pending = output.unprocessed;
        Ok(Page::new(
            output.items,
            Continuation::Pending(self.pending.clone()),
        ))
    }

    fn has_more(&self) -> bool {
        !self.pending.is_empty()
    }

    fn key_schema(&self) -> Result<&KeySchema, Errors> {
        Err(Errors::unsupported(SourceKind::BatchGet, "key_schema"))
    }

    fn set_exclusive_start_key(&mut self, _key: ResumeKey) -> Result<(), Errors> {
        Err(Errors::unsupported(
            SourceKind::BatchGet,
            "set_exclusive_start_key",
        ))
    }

    fn last_evaluated_key(&self) -> Result<Option<&ResumeKey>, Errors> {
        Err(Errors::unsupported(SourceKind::BatchGet, "last_evaluated_key"))
    }

    fn key_fields(&self) -> Result<Vec<&str>, Errors> {
        Err(Errors::unsupported(SourceKind::BatchGet, "key_fields"))
    }

    fn hash_key_field(&self) -> Result<&str, Errors> {
        Err(Errors::unsupported(SourceKind::BatchGet, "hash_key_field"))
    }

    fn is_hash_key_field(&self, _field: &str) -> Result<bool, Errors> {
        Err(Errors::unsupported(SourceKind::BatchGet, "is_hash_key_field"))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::fmt;
    use std::sync::Arc;

    use super::{check_start_key, BatchGetSource, StartKeyCursor};
    use crate::client::Errors;
    use crate::shared::queries::BatchGetRequest;
    use crate::shared::responses::{BatchGetOutput, QueryOutput};
    use crate::shared::traits::{BatchGetBackend, ItemBackend, PageSource, SourceKind};
    use crate::shared::values::{Continuation, KeySchema, Record, ResumeKey};

    #[derive(Debug)]
    struct Throttled;

    impl fmt::Display for Throttled {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "throttled")
        }
    }

    impl std::error::Error for Throttled {}

    /// Resolves one key per call after failing a set number of times
    struct Flaky {
        failures: Cell<usize>,
    }

    impl ItemBackend for Flaky {
        type Error = Throttled;

        fn key_schema(&self, _table: &str) -> Result<KeySchema, Throttled> {
            Ok(KeySchema::hash("id"))
        }
    }

    impl BatchGetBackend for Flaky {
        fn batch_get(&self, request: &BatchGetRequest) -> Result<BatchGetOutput, Throttled> {
            if self.failures.get() > 0 {
                self.failures.set(self.failures.get() - 1);
                return Err(Throttled);
            }
            let (now, later) = request.keys.split_at(1);
            let items = now
                .iter()
                .map(|key| {
                    key.iter()
                        .map(|(field, value)| (field.clone(), value.clone()))
                        .collect::<Record>()
                })
                .collect();
            Ok(BatchGetOutput {
                items,
                unprocessed: later.to_vec(),
            })
        }
    }

    fn keys(count: usize) -> Vec<ResumeKey> {
        (0..count)
            .map(|i| ResumeKey::new().with("id", format!("H_{i}")))
            .collect()
    }

    #[test]
    fn failed_batches_keep_their_keys() {
        let backend = Arc::new(Flaky {
            failures: Cell::new(1),
        });
        let mut source = BatchGetSource::new(backend, BatchGetRequest::new("t", keys(3)));
        assert!(matches!(source.fetch_page(), Err(Errors::SourceFetch(_))));
        assert_eq!(source.pending().len(), 3);
        assert!(source.has_more());
        let page = source.fetch_page().expect("store recovered");
        assert_eq!(page.len(), 1);
        assert_eq!(page.continuation, Continuation::Pending(keys(3)[1..].to_vec()));
    }

    #[test]
    fn batches_end_when_nothing_is_pending() {
        let backend = Arc::new(Flaky {
            failures: Cell::new(0),
        });
        let mut source = BatchGetSource::new(backend, BatchGetRequest::new("t", keys(2)));
        let mut pages = 0;
        while source.has_more() {
            source.fetch_page().expect("healthy store");
            pages += 1;
        }
        assert_eq!(pages, 2);
    }

    #[test]
    fn batches_have_no_key_schema() {
        let backend = Arc::new(Flaky {
            failures: Cell::new(0),
        });
        let mut source = BatchGetSource::new(backend, BatchGetRequest::new("t", keys(1)));
        for result in [
            source.key_fields().map(|_| ()),
            source.hash_key_field().map(|_| ()),
            source.is_hash_key_field("id").map(|_| ()),
            source.last_evaluated_key().map(|_| ()),
        ] {
            assert!(matches!(
                result,
                Err(Errors::UnsupportedByVariant {
                    variant: SourceKind::BatchGet,
                    ..
                })
            ));
        }
        assert!(source.set_exclusive_start_key(keys(1).remove(0)).is_err());
    }

    #[test]
    fn cursors_follow_the_last_evaluated_key() {
        let mut cursor = StartKeyCursor::new(KeySchema::hash("id"));
        assert!(cursor.has_more());
        let next = keys(1).remove(0);
        let page = cursor.advance(QueryOutput {
            items: vec![Record::new().with("id", "H_0")],
            evaluated: 1,
            last_evaluated_key: Some(next.clone()),
        });
        assert_eq!(page.continuation, Continuation::StartKey(next));
        assert!(cursor.has_more());
        let page = cursor.advance(QueryOutput::default());
        assert_eq!(page.continuation, Continuation::None);
        assert!(!cursor.has_more());
        assert!(matches!(
            cursor.set(ResumeKey::new()),
            Err(Errors::MissingKeyField(field)) if field == "id"
        ));
    }

    #[test]
    fn start_keys_need_every_key_field() {
        let schema = KeySchema::composite("pk", "sk");
        let partial = ResumeKey::new().with("pk", "a");
        assert!(matches!(
            check_start_key(&schema, &partial),
            Err(Errors::MissingKeyField(field)) if field == "sk"
        ));
        assert!(check_start_key(&schema, &partial.with("sk", 1)).is_ok());
    }
}
