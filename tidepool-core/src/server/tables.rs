//! Tables are how rows are stored in a tidepool store
//!
//! Only one kind of table exists today:
//!
//! - Ephemeral: fully in memory and speaks every continuation style

mod ephemeral;
mod partitions;

pub use ephemeral::EphemeralTable;
