//! The types shared between the paging client and the item store

pub mod position;
pub mod queries;
pub mod responses;
pub mod traits;
pub mod values;
