//! The engine that turns a page source into a single forward sequence

use std::collections::VecDeque;
use std::marker::PhantomData;
use tracing::{debug, instrument, trace};
use uuid::Uuid;

use super::Errors;
use crate::shared::position::PositionCodec;
use crate::shared::traits::{FromRecord, PageSource, SourceKind};
use crate::shared::values::{Record, ResumeKey};

/// How many results a traversal may still return
///
/// An unbounded limit is kept apart from any large number so past-limit
/// checks can tell the two apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Limit {
    /// The limit that was asked for
    requested: Option<usize>,
    /// How many more results may be returned
    remaining: Option<usize>,
}

impl Limit {
    /// A limit that never caps a traversal
    #[must_use]
    pub fn unbounded() -> Self {
        Limit::default()
    }

    /// Cap a traversal at some number of results
    ///
    /// # Arguments
    ///
    /// * `limit` - The most results to return
    pub fn new(limit: usize) -> Result<Self, Errors> {
        if limit == 0 {
            return Err(Errors::InvalidLimit(limit));
        }
        Ok(Limit {
            requested: Some(limit),
            remaining: Some(limit),
        })
    }

    /// The limit that was asked for
    #[must_use]
    pub fn requested(&self) -> Option<usize> {
        self.requested
    }

    /// How many more results may be returned
    #[must_use]
    pub fn remaining(&self) -> Option<usize> {
        self.remaining
    }

    /// Whether this limit caps a traversal at all
    #[must_use]
    pub fn is_bounded(&self) -> bool {
        self.requested.is_some()
    }

    /// Whether every allowed result was returned
    #[must_use]
    pub fn is_reached(&self) -> bool {
        self.remaining == Some(0)
    }

    /// Count one returned result against this limit
    fn consume(&mut self) {
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining = remaining.saturating_sub(1);
        }
    }
}

/// The states a paging iterator moves through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterState {
    /// Nothing has been pulled yet
    Fresh,
    /// Records remain in the current page
    Buffering,
    /// The current page ran dry and we are deciding whether to fetch more
    LookingAhead,
    /// The source has no more records
    Exhausted,
    /// The limit was consumed
    LimitReached,
    /// A fetch failed and this traversal is over
    Failed,
}

/// Pulls records from a page source one at a time
///
/// Pages are fetched lazily, one at a time, only when the current page is used
/// up. Positions always point at the last record that was returned, never at
/// records that were only peeked at to answer [`Self::has_results_past_limit`].
pub struct PagingIterator<S: PageSource, T: FromRecord> {
    /// The id for this traversal in traces
    id: Uuid,
    /// Where our pages come from
    source: S,
    /// The records fetched but not yet returned
    buffer: VecDeque<Record>,
    /// How many more results we may return
    limit: Limit,
    /// The last record that was returned
    last_examined: Option<Record>,
    /// Where in a traversal we are
    state: IterState,
    /// The number of pages fetched so far
    pages: usize,
    /// Encodes positions
    codec: PositionCodec,
    /// The type we materialize records into
    phantom: PhantomData<T>,
}

impl<S: PageSource, T: FromRecord> PagingIterator<S, T> {
    /// Create a new paging iterator
    ///
    /// # Arguments
    ///
    /// * `source` - The page source to drive
    /// * `limit` - How many results to return at most
    /// * `codec` - The codec to encode positions with
    pub fn new(source: S, limit: Limit, codec: PositionCodec) -> Self {
        PagingIterator {
            id: Uuid::new_v4(),
            source,
            buffer: VecDeque::default(),
            limit,
            last_examined: None,
            state: IterState::Fresh,
            pages: 0,
            codec,
            phantom: PhantomData,
        }
    }

    /// The id of this traversal
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The current state of this traversal
    #[must_use]
    pub fn state(&self) -> IterState {
        self.state
    }

    /// The limit this traversal is capped at
    #[must_use]
    pub fn limit(&self) -> Limit {
        self.limit
    }

    /// The number of pages fetched so far
    #[must_use]
    pub fn pages_fetched(&self) -> usize {
        self.pages
    }

    /// The page source this traversal drives
    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// The last record that was returned
    #[must_use]
    pub fn last_examined(&self) -> Option<&Record> {
        self.last_examined.as_ref()
    }

    /// Check if another result can be returned
    ///
    /// This never touches the source once the limit is consumed.
    pub fn has_next(&mut self) -> Result<bool, Errors> {
        if self.state == IterState::Failed {
            return Err(Errors::UsageOrder("this traversal already failed"));
        }
        // a consumed limit answers without fetching anything
        if self.limit.is_reached() {
            self.state = IterState::LimitReached;
            return Ok(false);
        }
        let found = self.look_ahead()?;
        self.state = if found {
            IterState::Buffering
        } else {
            IterState::Exhausted
        };
        Ok(found)
    }

    /// Make sure a record is buffered if the source has one left
    ///
    /// Empty pages are skipped for as long as the source says more may exist
    /// and the last page fetched carried a continuation.
    #[instrument(name = "PagingIterator::look_ahead", skip_all, fields(id = %self.id), err(Debug))]
    fn look_ahead(&mut self) -> Result<bool, Errors> {
        if !self.buffer.is_empty() {
            return Ok(true);
        }
        if self.state != IterState::LimitReached {
            self.state = IterState::LookingAhead;
        }
        // keep fetching until we get records or the source runs dry
        while self.source.has_more() {
            let page = match self.source.fetch_page() {
                Ok(page) => page,
                Err(error) => {
                    self.state = IterState::Failed;
                    return Err(error);
                }
            };
            self.pages += 1;
            let more = page.continuation.is_some();
            trace!(page = self.pages, records = page.len(), more, "buffering page");
            if !page.is_empty() {
                self.buffer.extend(page.records);
                return Ok(true);
            }
            // an empty page with nothing after it ends our traversal
            if !more {
                break;
            }
        }
        debug!(pages = self.pages, "source exhausted");
        Ok(false)
    }

    /// Return the next result
    ///
    /// Fails with [`Errors::LimitReached`] once the limit is consumed and with
    /// [`Errors::UsageOrder`] when the source has nothing left.
    pub fn next_item(&mut self) -> Result<T, Errors> {
        if self.limit.is_reached() {
            return Err(Errors::LimitReached(self.limit.requested.unwrap_or_default()));
        }
        if !self.has_next()? {
            return Err(Errors::UsageOrder("next was called with no results left"));
        }
        let record = self
            .buffer
            .pop_front()
            .ok_or(Errors::UsageOrder("next was called with no results left"))?;
        self.limit.consume();
        // positions are derived from the last record handed out
        let item = T::from_record(&record);
        self.last_examined = Some(record);
        if self.limit.is_reached() {
            debug!(limit = self.limit.requested, "limit reached");
            self.state = IterState::LimitReached;
        }
        item
    }

    /// Check whether results exist past a consumed limit
    ///
    /// Once the limit is consumed this peeks one page past it. Peeked records
    /// are never returned and do not move the position.
    pub fn has_results_past_limit(&mut self) -> Result<bool, Errors> {
        if !self.limit.is_bounded() {
            return Err(Errors::NoLimitConfigured);
        }
        // if the limit was never consumed this is just a normal check
        if !self.limit.is_reached() {
            return self.has_next();
        }
        if self.state == IterState::Failed {
            return Err(Errors::UsageOrder("this traversal already failed"));
        }
        self.state = IterState::LimitReached;
        self.look_ahead()
    }

    /// Build the resume key for the current position
    ///
    /// # Arguments
    ///
    /// * `remove_hash_key` - Whether to leave the hash key out
    pub fn resume_key(&self, remove_hash_key: bool) -> Result<Option<ResumeKey>, Errors> {
        // batch gets reject this here
        let schema = self.source.key_schema()?;
        if remove_hash_key {
            if self.source.kind() != SourceKind::RangeQuery {
                return Err(Errors::unsupported(
                    self.source.kind(),
                    "removing the hash key from a position",
                ));
            }
            // a hash only table would be left with an empty position
            if schema.range_key().is_none() {
                return Err(Errors::unsupported(
                    self.source.kind(),
                    "removing the only key field from a position",
                ));
            }
        }
        // nothing is left to resume once the source is exhausted
        if self.state == IterState::Exhausted {
            return Ok(None);
        }
        let Some(record) = &self.last_examined else {
            return Ok(None);
        };
        let mut key = record
            .project(schema.fields())
            .map_err(Errors::MissingKeyField)?;
        if remove_hash_key {
            key.remove(schema.hash_key());
        }
        Ok(Some(key))
    }

    /// Get a token for the current position
    ///
    /// Returns `None` if nothing was returned yet or the source is exhausted.
    pub fn position(&self) -> Result<Option<String>, Errors> {
        self.encode_position(false)
    }

    /// Get a token for the current position without the hash key
    ///
    /// Only range queries support this since their hash key is fixed by the
    /// query and can be supplied again when resuming.
    pub fn position_without_hash_key(&self) -> Result<Option<String>, Errors> {
        self.encode_position(true)
    }

    /// Encode the current resume key
    ///
    /// # Arguments
    ///
    /// * `remove_hash_key` - Whether to leave the hash key out
    fn encode_position(&self, remove_hash_key: bool) -> Result<Option<String>, Errors> {
        match self.resume_key(remove_hash_key)? {
            Some(key) => Ok(Some(self.codec.encode(&key)?)),
            None => Ok(None),
        }
    }
}

impl<S: PageSource, T: FromRecord> Iterator for PagingIterator<S, T> {
    type Item = Result<T, Errors>;

    fn next(&mut self) -> Option<Self::Item> {
        // a failed traversal has already reported its error
        if self.state == IterState::Failed {
            return None;
        }
        match self.has_next() {
            Ok(true) => Some(self.next_item()),
            Ok(false) => None,
            Err(error) => Some(Err(error)),
        }
    }
}
