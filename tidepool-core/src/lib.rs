//! Tidepool turns a server paginated item store into one forward sequence
//!
//! A [`client::PagedIterable`] drives a [`shared::traits::PageSource`] one page
//! at a time, caps results with a client limit that may span many pages, and
//! hands back opaque position tokens that let a later process resume exactly
//! where an earlier one stopped.

pub mod client;
#[cfg(feature = "server")]
pub mod server;
pub mod shared;

pub use client::{Errors, PagedIterable, PagingIterator};
#[cfg(feature = "server")]
pub use server::tables;
pub use shared::position::PositionCodec;
pub use shared::traits::FromRecord;
