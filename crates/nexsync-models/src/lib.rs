//! Data models for nexsync.
//!
//! Defines the types shared between the sync engine and its storage
//! adapters: schema fields, raw and transformed records, foreign-key
//! extraction results, relationship edges, and sync options/results.
//!
//! This crate has no I/O and no async dependencies.

mod edge;
mod record;
mod schema;
mod sync;

pub use edge::*;
pub use record::*;
pub use schema::*;
pub use sync::*;
