// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Per-sector shard persistence.
//!
//! - [`ShardStore`]: path layout, whole-shard reads and atomic whole-shard replacement.
//! - [`ShardWriter`]: the create/append/close lifecycle used by the bulk partitioner.
//! - [`codec`]: the line-oriented array layout shared with the source dump.

pub mod codec;
pub mod error;
mod store;
mod writer;

pub use error::{Result, ShardError};
pub use store::ShardStore;
pub use writer::ShardWriter;
