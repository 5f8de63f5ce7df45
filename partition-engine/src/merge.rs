// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
    sync::Arc,
};

use chrono::Utc;
use core_types::{MergeConfig, SystemId, SystemRecord};
use futures::{StreamExt, stream::FuturesUnordered};
use log::{error, info, warn};
use sector_catalog::{ReferenceNames, SectorCatalog};
use sector_grid::{GridAddress, SizeClass};
use shard_store::ShardStore;
use tokio::{
    runtime::Handle,
    sync::Semaphore,
    time::{Duration, Instant},
};

use crate::{
    error::{EngineError, Result},
    locate::locate,
    progress::MergeProgress,
    report::{LineIssues, MergeReport, SectorFailure, SectorMergeOutcome},
    source::SourceReader,
};

const LABEL: &str = "merge";

/// Delta records bound for one sector, one per system id.
///
/// A later record for an id already in the batch replaces the earlier one whole and keeps its
/// position.
#[derive(Debug, Clone)]
pub struct DeltaBatch {
    pub address: GridAddress,
    /// Size class of the first delta record seen for the sector.
    pub size_class: SizeClass,
    records: Vec<SystemRecord>,
    positions: HashMap<SystemId, usize>,
}

impl DeltaBatch {
    pub fn new(address: GridAddress, size_class: SizeClass) -> Self {
        Self {
            address,
            size_class,
            records: Vec::new(),
            positions: HashMap::new(),
        }
    }

    pub fn push(&mut self, record: SystemRecord) {
        match self.positions.get(&record.id).copied() {
            Some(idx) => self.records[idx] = record,
            None => {
                self.positions.insert(record.id, self.records.len());
                self.records.push(record);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[SystemRecord] {
        &self.records
    }
}

#[derive(Debug, Default)]
pub struct GroupedDelta {
    pub batches: BTreeMap<GridAddress, DeltaBatch>,
    pub records: u64,
    pub issues: LineIssues,
}

impl GroupedDelta {
    pub fn push(&mut self, address: GridAddress, size_class: SizeClass, record: SystemRecord) {
        self.records += 1;
        self.batches
            .entry(address)
            .or_insert_with(|| DeltaBatch::new(address, size_class))
            .push(record);
    }
}

/// Applies one sector's batch to its shard and writes the merged set back whole.
///
/// Records already present (by `id`) are overwritten field by field; the rest are appended.
/// A missing shard is treated as empty and reported as a new sector.
pub async fn merge_sector(
    store: &ShardStore,
    batch: DeltaBatch,
) -> shard_store::Result<SectorMergeOutcome> {
    let address = batch.address;
    let (mut records, is_new_sector) = match store.read_all(address).await? {
        Some(records) => (records, false),
        None => (Vec::new(), true),
    };
    let mut index: HashMap<SystemId, usize> = records
        .iter()
        .enumerate()
        .map(|(idx, record)| (record.id, idx))
        .collect();
    let mut updated = 0u64;
    let mut added = 0u64;
    for record in batch.records {
        match index.get(&record.id).copied() {
            Some(idx) => {
                let existing = &mut records[idx];
                existing.merge_from(record);
                existing.sector = Some(address);
                updated += 1;
            }
            None => {
                index.insert(record.id, records.len());
                records.push(record.with_sector(address));
                added += 1;
            }
        }
    }
    store.write_all(address, &records).await?;
    Ok(SectorMergeOutcome {
        address,
        is_new_sector,
        updated,
        added,
    })
}

/// Incremental updater: groups a delta stream by sector and merges every sector concurrently.
///
/// Each sector is one task and no two tasks share a shard. At most `workers` tasks run at
/// once; a failing sector is reported and never stops its siblings.
pub struct MergeUpdater {
    store: ShardStore,
    config: MergeConfig,
    workers: usize,
    verify_coordinates: bool,
    progress: MergeProgress,
}

impl MergeUpdater {
    pub fn new(store: ShardStore, config: MergeConfig, verify_coordinates: bool) -> Self {
        let workers = config.workers();
        Self {
            store,
            config,
            workers,
            verify_coordinates,
            progress: MergeProgress::new(),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn progress(&self) -> MergeProgress {
        self.progress.clone()
    }

    pub async fn group(&self, delta: &Path) -> Result<GroupedDelta> {
        let mut reader = SourceReader::open(delta).await?;
        let mut grouped = GroupedDelta::default();
        while let Some(entry) = reader.next_entry().await? {
            let record = match entry.record {
                Ok(record) => record,
                Err(err) => {
                    error!("[{}] line {}: unparseable record: {}", LABEL, entry.line, err);
                    grouped.issues.parse_errors.record(entry.line);
                    continue;
                }
            };
            match locate(
                LABEL,
                entry.line,
                &record,
                self.verify_coordinates,
                &mut grouped.issues,
            ) {
                Ok(decoded) => grouped.push(decoded.address, decoded.size_class, record),
                Err(err) => {
                    error!(
                        "[{}] line {}: cannot decode id64 {} of system {}: {}",
                        LABEL, entry.line, record.id64, record.id, err
                    );
                    grouped.issues.decode_errors.record((entry.line, record.id));
                }
            }
        }
        Ok(grouped)
    }

    /// Runs one blocking task per batch and waits for all of them.
    pub async fn merge_batches<I>(&self, batches: I) -> (Vec<SectorMergeOutcome>, Vec<SectorFailure>)
    where
        I: IntoIterator<Item = DeltaBatch>,
    {
        let pool = Arc::new(Semaphore::new(self.workers));
        let mut pending = FuturesUnordered::new();
        let mut total = 0u64;
        for batch in batches {
            total += batch.len() as u64;
            let address = batch.address;
            let store = self.store.clone();
            let pool = Arc::clone(&pool);
            pending.push(async move {
                let permit = pool.acquire_owned().await.ok();
                // gzip and JSON work runs off the async workers; the permit lives as long as it
                let runtime = Handle::current();
                let joined = tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    runtime.block_on(merge_sector(&store, batch))
                })
                .await;
                (address, joined)
            });
        }
        self.progress.reset(total);
        let sectors = pending.len();
        info!(
            "[{}] merging {} systems across {} sectors with {} workers",
            LABEL, total, sectors, self.workers
        );

        let mut outcomes = Vec::with_capacity(sectors);
        let mut failures = Vec::new();
        let mut last_progress = Instant::now();
        let interval = Duration::from_millis(self.config.progress_update_ms.max(10));
        while let Some((address, joined)) = pending.next().await {
            match joined {
                Ok(Ok(outcome)) => {
                    self.progress.complete_sector(outcome.updated + outcome.added);
                    outcomes.push(outcome);
                }
                Ok(Err(err)) => {
                    error!("[{}] sector {} failed: {}", LABEL, address, err);
                    failures.push(SectorFailure {
                        address,
                        error: err.into(),
                    });
                }
                Err(source) => {
                    error!("[{}] sector {} task aborted: {}", LABEL, address, source);
                    failures.push(SectorFailure {
                        address,
                        error: EngineError::Join { address, source },
                    });
                }
            }
            if last_progress.elapsed() >= interval {
                let snapshot = self.progress.snapshot();
                info!(
                    "[{}] {}/{} systems merged ({}/{} sectors)",
                    LABEL, snapshot.done, snapshot.total, snapshot.sectors_done, sectors
                );
                last_progress = Instant::now();
            }
        }
        (outcomes, failures)
    }

    /// Full incremental pass: group, merge, then fold newly created sectors into the catalog.
    pub async fn run(
        &self,
        delta: &Path,
        catalog: &mut SectorCatalog,
        names: &ReferenceNames,
    ) -> Result<MergeReport> {
        let started_at = Utc::now();
        info!("[{}] applying {} to {}", LABEL, delta.display(), self.store.root().display());
        let grouped = self.group(delta).await?;
        let classes: BTreeMap<GridAddress, SizeClass> = grouped
            .batches
            .values()
            .map(|batch| (batch.address, batch.size_class))
            .collect();
        let (outcomes, mut failures) = self.merge_batches(grouped.batches.into_values()).await;

        let mut new_sectors: Vec<GridAddress> = outcomes
            .iter()
            .filter(|outcome| outcome.is_new_sector)
            .map(|outcome| outcome.address)
            .collect();
        new_sectors.sort();
        catalog.merge_observed(
            new_sectors
                .iter()
                .filter_map(|address| classes.get(address).map(|class| (*address, *class))),
        );
        catalog.apply_names(names);
        catalog.persist()?;
        failures.sort_by_key(|failure| failure.address);

        let report = MergeReport {
            started_at,
            finished_at: Utc::now(),
            delta_records: grouped.records,
            issues: grouped.issues,
            added: outcomes.iter().map(|outcome| outcome.added).sum(),
            updated: outcomes.iter().map(|outcome| outcome.updated).sum(),
            new_sectors,
            sectors_merged: outcomes.len(),
            failures,
        };
        info!("[{}] {}", LABEL, report.summary());
        if !report.is_clean() {
            warn!(
                "[{}] {} sectors failed and were left unchanged",
                LABEL,
                report.failures.len()
            );
        }
        if report.issues.total() > 0 {
            warn!(
                "[{}] skipped {} unparseable and {} undecodable delta lines",
                LABEL,
                report.issues.parse_errors.count(),
                report.issues.decode_errors.count()
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(id: u64, name: &str) -> SystemRecord {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "id64": 5582283182826u64,
            "name": name,
            "coords": {"x": 533.75, "y": 117.875, "z": 122.4375},
        }))
        .unwrap()
    }

    fn batch(address: GridAddress, records: Vec<SystemRecord>) -> DeltaBatch {
        let mut batch = DeltaBatch::new(address, SizeClass::C);
        for record in records {
            batch.push(record);
        }
        batch
    }

    #[tokio::test]
    async fn missing_shard_is_a_new_sector() {
        let dir = tempdir().unwrap();
        let store = ShardStore::new(dir.path(), 9);
        let address = GridAddress::new(39, 32, 18);
        let outcome = merge_sector(&store, batch(address, vec![record(1, "A"), record(2, "B")]))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            SectorMergeOutcome {
                address,
                is_new_sector: true,
                updated: 0,
                added: 2
            }
        );
        assert_eq!(store.read_all(address).await.unwrap().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn existing_ids_are_updated_in_place() {
        let dir = tempdir().unwrap();
        let store = ShardStore::new(dir.path(), 9);
        let address = GridAddress::new(39, 32, 18);
        store
            .write_all(
                address,
                &[
                    record(1, "Old").with_sector(address),
                    record(2, "Keep").with_sector(address),
                ],
            )
            .await
            .unwrap();
        let outcome = merge_sector(&store, batch(address, vec![record(3, "New"), record(1, "Renamed")]))
            .await
            .unwrap();
        assert!(!outcome.is_new_sector);
        assert_eq!((outcome.updated, outcome.added), (1, 1));
        let names: Vec<String> = store
            .read_all(address)
            .await
            .unwrap()
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["Renamed", "Keep", "New"]);
    }

    #[tokio::test]
    async fn duplicate_ids_within_a_batch_collapse() {
        let dir = tempdir().unwrap();
        let store = ShardStore::new(dir.path(), 9);
        let address = GridAddress::new(39, 32, 18);
        let mut first = record(5, "First");
        first
            .extra
            .insert("date".to_string(), serde_json::Value::from("2017-02-24 09:27:10"));
        let duplicated = batch(address, vec![first, record(6, "Other"), record(5, "Second")]);
        assert_eq!(duplicated.len(), 2);
        let outcome = merge_sector(&store, duplicated).await.unwrap();
        assert_eq!((outcome.updated, outcome.added), (0, 2));
        let records = store.read_all(address).await.unwrap().unwrap();
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Second", "Other"]);
        assert!(records[0].extra.get("date").is_none());
    }

    #[tokio::test]
    async fn grouping_counts_each_delta_line_once_per_id() {
        let dir = tempdir().unwrap();
        let delta = dir.path().join("delta.json");
        let line = |id: u64, name: &str| serde_json::to_string(&record(id, name)).unwrap();
        let mut body = format!("[\n\t{},\n\t{},\n", line(7, "Early"), line(8, "Other")).into_bytes();
        body.extend_from_slice(b"\t{\"id\":9,\"name\":\"\xc3\x28\"},\n");
        body.extend_from_slice(format!("\t{}\n]\n", line(7, "Late")).as_bytes());
        tokio::fs::write(&delta, body).await.unwrap();

        let store = ShardStore::new(dir.path().join("edsm"), 9);
        let updater = MergeUpdater::new(store, MergeConfig::default(), false);
        let grouped = updater.group(&delta).await.unwrap();
        assert_eq!(grouped.records, 3);
        assert_eq!(grouped.issues.parse_errors.items(), &[4]);
        let batch = grouped.batches.get(&GridAddress::new(39, 32, 18)).unwrap();
        assert!(!batch.is_empty());
        let names: Vec<&str> = batch.records().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Late", "Other"]);
    }

    #[tokio::test]
    async fn failing_sector_does_not_stop_siblings() {
        let dir = tempdir().unwrap();
        let store = ShardStore::new(dir.path(), 9);
        let broken = GridAddress::new(1, 1, 1);
        let healthy = GridAddress::new(2, 2, 2);
        let path = store.path_for(broken);
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&path, b"not gzip").await.unwrap();

        let updater = MergeUpdater::new(store.clone(), MergeConfig::default(), false).with_workers(2);
        let (outcomes, failures) = updater
            .merge_batches(vec![
                batch(broken, vec![record(1, "A")]),
                batch(healthy, vec![record(2, "B")]),
            ])
            .await;
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].address, healthy);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].address, broken);
        assert_eq!(updater.progress().snapshot().done, 1);
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"not gzip");
    }
}
