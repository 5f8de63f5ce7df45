// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::{collections::BTreeMap, path::Path};

use chrono::Utc;
use core_types::PartitionConfig;
use log::{error, info, warn};
use sector_catalog::{ReferenceNames, SectorCatalog};
use sector_grid::{GridAddress, SizeClass};
use shard_store::{ShardStore, ShardWriter};
use tokio::time::{Duration, Instant};

use crate::{
    error::{EngineError, Result},
    locate::locate,
    report::{LineIssues, PartitionReport},
    source::SourceReader,
};

const LABEL: &str = "partition";

/// Single forward pass over the full dump, routing every record into its sector shard.
///
/// Shards are created on first use and sealed together once the source is exhausted. A line
/// that fails to parse or decode is logged and skipped. A read or storage failure ends the
/// pass and discards every unsealed shard, leaving earlier closed shards in place.
pub struct Partitioner {
    store: ShardStore,
    config: PartitionConfig,
}

impl Partitioner {
    pub fn new(store: ShardStore, config: PartitionConfig) -> Self {
        Self { store, config }
    }

    pub async fn run(
        &self,
        source: &Path,
        catalog: &mut SectorCatalog,
        names: &ReferenceNames,
    ) -> Result<PartitionReport> {
        let started_at = Utc::now();
        info!(
            "[{}] partitioning {} into {}",
            LABEL,
            source.display(),
            self.store.root().display()
        );
        let mut reader = SourceReader::open(source).await?;
        let mut writer = ShardWriter::new(self.store.clone(), self.config.max_open_shards);
        let mut pass = Pass::default();
        let streamed = match self.stream(&mut reader, &mut writer, &mut pass).await {
            Ok(()) => {
                info!("[{}] sealing {} shards", LABEL, writer.open_count());
                writer.close_all().await.map_err(EngineError::from)
            }
            Err(err) => Err(err),
        };
        let shards_closed = match streamed {
            Ok(closed) => closed,
            Err(err) => {
                error!(
                    "[{}] aborting after line {}: {}; discarding {} unsealed shards",
                    LABEL,
                    reader.lines_read(),
                    err,
                    writer.open_count()
                );
                writer.abandon().await;
                return Err(err);
            }
        };
        let Pass {
            touched,
            issues,
            records_written,
        } = pass;
        let new_sectors = catalog.merge_observed(touched);
        let names_applied = catalog.apply_names(names);
        catalog.persist()?;

        let report = PartitionReport {
            started_at,
            finished_at: Utc::now(),
            lines_read: reader.lines_read(),
            records_written,
            issues,
            shards_closed,
            new_sectors,
            names_applied,
        };
        info!(
            "[{}] wrote {} systems into {} shards ({} new sectors) in {}s",
            LABEL,
            report.records_written,
            report.shards_closed.len(),
            report.new_sectors.len(),
            (report.finished_at - report.started_at).num_seconds()
        );
        if report.issues.total() > 0 || !report.issues.mismatches.is_empty() {
            warn!(
                "[{}] skipped {} unparseable and {} undecodable lines; {} address mismatches",
                LABEL,
                report.issues.parse_errors.count(),
                report.issues.decode_errors.count(),
                report.issues.mismatches.count()
            );
        }
        Ok(report)
    }

    async fn stream(
        &self,
        reader: &mut SourceReader,
        writer: &mut ShardWriter,
        pass: &mut Pass,
    ) -> Result<()> {
        let mut last_progress = Instant::now();
        let interval = Duration::from_millis(self.config.progress_update_ms.max(10));

        while let Some(entry) = reader.next_entry().await? {
            let record = match entry.record {
                Ok(record) => record,
                Err(err) => {
                    error!("[{}] line {}: unparseable record: {}", LABEL, entry.line, err);
                    pass.issues.parse_errors.record(entry.line);
                    continue;
                }
            };
            let decoded = match locate(
                LABEL,
                entry.line,
                &record,
                self.config.verify_coordinates,
                &mut pass.issues,
            ) {
                Ok(decoded) => decoded,
                Err(err) => {
                    error!(
                        "[{}] line {}: cannot decode id64 {} of system {}: {}",
                        LABEL, entry.line, record.id64, record.id, err
                    );
                    pass.issues.decode_errors.record((entry.line, record.id));
                    continue;
                }
            };
            let address = decoded.address;
            if !writer.is_open(address) {
                writer.create(address).await?;
            }
            writer.append(address, record).await?;
            pass.touched.entry(address).or_insert(decoded.size_class);
            pass.records_written += 1;
            if last_progress.elapsed() >= interval {
                info!(
                    "[{}] streamed {} lines, {} systems into {} sectors",
                    LABEL,
                    reader.lines_read(),
                    pass.records_written,
                    pass.touched.len()
                );
                last_progress = Instant::now();
            }
        }
        Ok(())
    }
}

#[derive(Default)]
struct Pass {
    touched: BTreeMap<GridAddress, SizeClass>,
    issues: LineIssues,
    records_written: u64,
}
