//! The client side of paging: sources, iterators, and their errors

mod errors;
mod iterable;
mod iterator;
pub mod sources;

pub use errors::{BoxedCause, Errors};
pub use iterable::PagedIterable;
pub use iterator::{IterState, Limit, PagingIterator};
pub use sources::{BatchGetSource, RangeQuerySource, ScanSource};
