//! Repository layer: record-scoped database operations.

mod record;

pub use record::*;
