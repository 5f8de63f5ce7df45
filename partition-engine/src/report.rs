// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use core_types::SystemId;
use sector_grid::{GridAddress, SizeClass};

use crate::error::EngineError;

/// Offending identifiers kept per error kind; counts are always exact.
pub const MAX_SAMPLES: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub struct Samples<T> {
    count: u64,
    items: Vec<T>,
}

impl<T> Default for Samples<T> {
    fn default() -> Self {
        Self {
            count: 0,
            items: Vec::new(),
        }
    }
}

impl<T> Samples<T> {
    pub fn record(&mut self, item: T) {
        self.count += 1;
        if self.items.len() < MAX_SAMPLES {
            self.items.push(item);
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// A record whose identifier places it in a different sector than its coordinates do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AddressMismatch {
    pub line: u64,
    pub id: SystemId,
    pub decoded: GridAddress,
    /// `None` when the coordinates do not map to any sector.
    pub from_coords: Option<GridAddress>,
}

/// Problems found while reading a source or delta stream. None of them stop the run.
#[derive(Debug, Clone, Default)]
pub struct LineIssues {
    pub parse_errors: Samples<u64>,
    /// `(line, id)` of records whose identifier could not be decoded.
    pub decode_errors: Samples<(u64, SystemId)>,
    pub mismatches: Samples<AddressMismatch>,
}

impl LineIssues {
    pub fn total(&self) -> u64 {
        self.parse_errors.count() + self.decode_errors.count()
    }
}

#[derive(Debug)]
pub struct PartitionReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub lines_read: u64,
    pub records_written: u64,
    pub issues: LineIssues,
    pub shards_closed: Vec<GridAddress>,
    pub new_sectors: Vec<GridAddress>,
    pub names_applied: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectorMergeOutcome {
    pub address: GridAddress,
    pub is_new_sector: bool,
    pub updated: u64,
    pub added: u64,
}

#[derive(Debug)]
pub struct SectorFailure {
    pub address: GridAddress,
    pub error: EngineError,
}

#[derive(Debug)]
pub struct MergeReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub delta_records: u64,
    pub issues: LineIssues,
    pub added: u64,
    pub updated: u64,
    /// Sectors whose shard did not exist before this pass, in address order.
    pub new_sectors: Vec<GridAddress>,
    pub sectors_merged: usize,
    pub failures: Vec<SectorFailure>,
}

impl MergeReport {
    pub fn summary(&self) -> String {
        format!(
            "added {} systems and updated {} systems, found {} new sectors",
            self.added,
            self.updated,
            self.new_sectors.len()
        )
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug)]
pub struct SurveyReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub records_checked: u64,
    pub issues: LineIssues,
    /// Records whose coordinates fall inside the sector their identifier names.
    pub contained: u64,
    pub size_classes: BTreeMap<SizeClass, u64>,
    pub sectors_observed: usize,
    pub new_sectors: Vec<GridAddress>,
    pub truncated: bool,
}
