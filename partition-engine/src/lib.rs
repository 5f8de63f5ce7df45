// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Bulk partitioning and incremental merging of the system dump into sector shards.
//!
//! - [`Partitioner`]: one sequential pass over the full dump.
//! - [`MergeUpdater`]: concurrent per-sector merge of a delta dump.
//! - [`survey`]: read-only verification of a dump against the sector grid.

pub mod error;
mod locate;
pub mod merge;
pub mod partitioner;
pub mod progress;
pub mod report;
pub mod source;
pub mod survey;

pub use error::{EngineError, Result};
pub use merge::{DeltaBatch, GroupedDelta, MergeUpdater, merge_sector};
pub use partitioner::Partitioner;
pub use progress::{MergeProgress, ProgressSnapshot};
pub use report::{
    AddressMismatch, LineIssues, MergeReport, PartitionReport, SectorFailure, SectorMergeOutcome,
    SurveyReport,
};
pub use source::{LineError, SourceEntry, SourceReader};
pub use survey::survey;
