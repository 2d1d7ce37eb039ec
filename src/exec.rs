//! Request execution against a storage backend.

pub mod resolve;
pub mod assemble;

pub use assemble::Catalog;
pub use resolve::{resolve, Resolution};
