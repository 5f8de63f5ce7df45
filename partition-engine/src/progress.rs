// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

/// Shared count of systems written by a merge pass, advanced once per completed sector task.
#[derive(Clone, Debug, Default)]
pub struct MergeProgress {
    inner: Arc<ProgressInner>,
}

#[derive(Debug, Default)]
struct ProgressInner {
    total: AtomicU64,
    done: AtomicU64,
    sectors_done: AtomicU64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub total: u64,
    pub done: u64,
    pub sectors_done: u64,
}

impl MergeProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&self, total: u64) {
        self.inner.total.store(total, Ordering::Relaxed);
        self.inner.done.store(0, Ordering::Relaxed);
        self.inner.sectors_done.store(0, Ordering::Relaxed);
    }

    pub fn complete_sector(&self, systems: u64) {
        self.inner.done.fetch_add(systems, Ordering::Relaxed);
        self.inner.sectors_done.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total: self.inner.total.load(Ordering::Relaxed),
            done: self.inner.done.load(Ordering::Relaxed),
            sectors_done: self.inner.sectors_done.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_by_systems_not_sectors() {
        let progress = MergeProgress::new();
        progress.reset(10);
        progress.complete_sector(7);
        progress.clone().complete_sector(3);
        assert_eq!(
            progress.snapshot(),
            ProgressSnapshot {
                total: 10,
                done: 10,
                sectors_done: 2
            }
        );
        progress.reset(4);
        assert_eq!(progress.snapshot().done, 0);
    }
}
