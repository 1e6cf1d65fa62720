//! The configuration facade that hands out paging iterators

use std::marker::PhantomData;
use tracing::{event, instrument, Level};

use super::iterator::{Limit, PagingIterator};
use super::Errors;
use crate::shared::position::PositionCodec;
use crate::shared::traits::{FromRecord, PageSource, SourceKind};
use crate::shared::values::Scalar;

/// A paged result set that can be configured and then iterated
///
/// Positions and limits may only be set before the first call to
/// [`PagedIterable::iter`]. Every call to `iter` starts an independent
/// traversal from the configured position, so positions and past-limit checks
/// are asked of the traversal instead: see [`PagingIterator::position`],
/// [`PagingIterator::position_without_hash_key`] and
/// [`PagingIterator::has_results_past_limit`].
pub struct PagedIterable<S: PageSource + Clone, T: FromRecord> {
    /// The source to clone for every traversal
    source: S,
    /// How many results each traversal may return
    limit: Limit,
    /// The codec for position tokens
    codec: PositionCodec,
    /// Whether a traversal was started
    started: bool,
    /// The type we materialize records into
    phantom: PhantomData<T>,
}

impl<S: PageSource + Clone, T: FromRecord> PagedIterable<S, T> {
    /// Create a new paged iterable
    ///
    /// # Arguments
    ///
    /// * `source` - The page source to traverse
    pub fn new(source: S) -> Self {
        Self::with_codec(source, PositionCodec::default())
    }

    /// Create a new paged iterable with a custom position codec
    ///
    /// # Arguments
    ///
    /// * `source` - The page source to traverse
    /// * `codec` - The codec for position tokens
    pub fn with_codec(source: S, codec: PositionCodec) -> Self {
        PagedIterable {
            source,
            limit: Limit::unbounded(),
            codec,
            started: false,
            phantom: PhantomData,
        }
    }

    /// Make sure we can still be configured
    fn check_unstarted(&self, what: &'static str) -> Result<(), Errors> {
        if self.started {
            return Err(Errors::UsageOrder(what));
        }
        Ok(())
    }

    /// Resume after the record a position token points at
    ///
    /// # Arguments
    ///
    /// * `token` - A token from [`PagingIterator::position`]
    #[instrument(name = "PagedIterable::set_position", skip_all, err(Debug))]
    pub fn set_position(&mut self, token: &str) -> Result<(), Errors> {
        self.check_unstarted("positions must be set before iterating")?;
        // batch gets have no key schema and so cannot resume
        self.source.key_schema()?;
        let key = self.codec.decode(token)?;
        event!(Level::DEBUG, fields = key.len(), "resuming from position");
        self.source.set_exclusive_start_key(key)
    }

    /// Resume a range query from a token that left out its hash key
    ///
    /// # Arguments
    ///
    /// * `token` - A token from [`PagingIterator::position_without_hash_key`]
    /// * `hash_value` - The hash key value to put back
    #[instrument(name = "PagedIterable::set_position_with_hash_key", skip_all, err(Debug))]
    pub fn set_position_with_hash_key<H: Into<Scalar>>(
        &mut self,
        token: &str,
        hash_value: H,
    ) -> Result<(), Errors> {
        self.check_unstarted("positions must be set before iterating")?;
        let kind = self.source.kind();
        if kind != SourceKind::RangeQuery {
            return Err(Errors::unsupported(kind, "resuming with a separate hash key"));
        }
        let hash_key = self.source.hash_key_field()?.to_owned();
        let mut key = self.codec.decode(token)?;
        // put our hash key back before handing the key to the source
        key.insert(hash_key, hash_value.into());
        self.source.set_exclusive_start_key(key)
    }

    /// Cap how many results each traversal returns
    ///
    /// # Arguments
    ///
    /// * `limit` - The most results to return, at least one
    pub fn set_limit(&mut self, limit: usize) -> Result<(), Errors> {
        self.check_unstarted("limits must be set before iterating")?;
        self.limit = Limit::new(limit)?;
        Ok(())
    }

    /// The limit each traversal is capped at
    #[must_use]
    pub fn limit(&self) -> Limit {
        self.limit
    }

    /// Whether a traversal was started
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// The configured page source
    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Start a new traversal from the configured position
    ///
    /// This freezes our configuration.
    pub fn iter(&mut self) -> PagingIterator<S, T> {
        self.started = true;
        PagingIterator::new(self.source.clone(), self.limit, self.codec)
    }
}

impl<S: PageSource + Clone, T: FromRecord> IntoIterator for PagedIterable<S, T> {
    type Item = Result<T, Errors>;
    type IntoIter = PagingIterator<S, T>;

    fn into_iter(self) -> Self::IntoIter {
        PagingIterator::new(self.source, self.limit, self.codec)
    }
}
