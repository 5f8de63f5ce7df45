// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::{collections::BTreeMap, path::Path};

use chrono::Utc;
use log::{error, info};
use sector_catalog::SectorCatalog;
use sector_grid::{GridAddress, SizeClass, bounds_of};
use tokio::time::{Duration, Instant};

use crate::{
    error::Result,
    locate::locate,
    report::{LineIssues, SurveyReport},
    source::SourceReader,
};

const LABEL: &str = "survey";

/// Read-only pass that checks every record's coordinates against the sector its identifier
/// names and collects the sectors observed into `catalog`. `limit == 0` reads the whole source.
pub async fn survey(
    source: &Path,
    limit: usize,
    progress_update_ms: u64,
    catalog: &mut SectorCatalog,
) -> Result<SurveyReport> {
    let started_at = Utc::now();
    info!("[{}] surveying {}", LABEL, source.display());
    let mut reader = SourceReader::open(source).await?;
    let mut issues = LineIssues::default();
    let mut observed: BTreeMap<GridAddress, SizeClass> = BTreeMap::new();
    let mut size_classes: BTreeMap<SizeClass, u64> = BTreeMap::new();
    let mut records_checked = 0u64;
    let mut contained = 0u64;
    let mut truncated = false;
    let mut last_progress = Instant::now();
    let interval = Duration::from_millis(progress_update_ms.max(10));

    while let Some(entry) = reader.next_entry().await? {
        if limit > 0 && records_checked >= limit as u64 {
            truncated = true;
            break;
        }
        let record = match entry.record {
            Ok(record) => record,
            Err(err) => {
                error!("[{}] line {}: unparseable record: {}", LABEL, entry.line, err);
                issues.parse_errors.record(entry.line);
                continue;
            }
        };
        records_checked += 1;
        let decoded = match locate(LABEL, entry.line, &record, true, &mut issues) {
            Ok(decoded) => decoded,
            Err(err) => {
                error!(
                    "[{}] line {}: cannot decode id64 {}: {}",
                    LABEL, entry.line, record.id64, err
                );
                issues.decode_errors.record((entry.line, record.id));
                continue;
            }
        };
        if bounds_of(decoded.address).contains(&record.coords) {
            contained += 1;
        }
        *size_classes.entry(decoded.size_class).or_insert(0) += 1;
        observed.entry(decoded.address).or_insert(decoded.size_class);
        if last_progress.elapsed() >= interval {
            info!(
                "[{}] checked {} systems, {} sectors so far",
                LABEL,
                records_checked,
                observed.len()
            );
            last_progress = Instant::now();
        }
    }

    let sectors_observed = observed.len();
    let new_sectors = catalog.merge_observed(observed);
    let report = SurveyReport {
        started_at,
        finished_at: Utc::now(),
        records_checked,
        issues,
        contained,
        size_classes,
        sectors_observed,
        new_sectors,
        truncated,
    };
    info!(
        "[{}] {} of {} systems lie inside their decoded sector; {} sectors observed",
        LABEL, report.contained, report.records_checked, report.sectors_observed
    );
    for (class, count) in &report.size_classes {
        info!("[{}] size class {}: {} systems", LABEL, class, count);
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const BODY: &str = "[\n\
\t{\"id\":1,\"id64\":5582283182826,\"name\":\"A\",\"coords\":{\"x\":533.75,\"y\":117.875,\"z\":122.4375}},\n\
\t{\"id\":2,\"id64\":3238296097059,\"name\":\"B\",\"coords\":{\"x\":-9530.5,\"y\":-910.28125,\"z\":19808.125}},\n\
\t{\"id\":3,\"id64\":3238296097059,\"name\":\"C\",\"coords\":{\"x\":0.0,\"y\":0.0,\"z\":0.0}},\n\
\tbroken,\n\
]\n";

    #[tokio::test]
    async fn reports_containment_and_classes() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("systems.json");
        tokio::fs::write(&source, BODY).await.unwrap();
        let mut catalog = SectorCatalog::new(dir.path().join("catalog.json"));
        let report = survey(&source, 0, 1_000, &mut catalog).await.unwrap();
        assert_eq!(report.records_checked, 3);
        assert_eq!(report.contained, 2);
        assert_eq!(report.issues.mismatches.count(), 1);
        assert_eq!(report.issues.parse_errors.count(), 1);
        assert_eq!(report.size_classes.get(&SizeClass::C), Some(&1));
        assert_eq!(report.size_classes.get(&SizeClass::D), Some(&2));
        assert_eq!(report.sectors_observed, 2);
        assert_eq!(catalog.len(), 2);
        assert!(!report.truncated);
    }

    #[tokio::test]
    async fn limit_stops_early() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("systems.json");
        tokio::fs::write(&source, BODY).await.unwrap();
        let mut catalog = SectorCatalog::new(dir.path().join("catalog.json"));
        let report = survey(&source, 1, 1_000, &mut catalog).await.unwrap();
        assert_eq!(report.records_checked, 1);
        assert!(report.truncated);
        assert_eq!(catalog.len(), 1);
    }
}
