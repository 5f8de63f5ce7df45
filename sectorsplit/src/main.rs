// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::{env, path::PathBuf, process, str::FromStr};

use config::ConfigError;
use core_types::AppConfig;
use log::{info, warn};
use partition_engine::{EngineError, MergeUpdater, Partitioner, survey};
use sector_catalog::{CatalogError, ReferenceNames, SectorCatalog};
use shard_store::ShardStore;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();
    if let Err(err) = run().await {
        eprintln!("sectorsplit failed: {err}");
        process::exit(1);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Partition,
    Update,
    Survey,
    Export,
}

impl FromStr for Command {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "partition" => Ok(Command::Partition),
            "update" => Ok(Command::Update),
            "survey" => Ok(Command::Survey),
            "export" => Ok(Command::Export),
            _ => Err(AppError::Usage),
        }
    }
}

#[derive(Debug, Error)]
enum AppError {
    #[error("usage: sectorsplit <partition [source]|update [delta]|survey [source]|export>")]
    Usage,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("{failed} sectors could not be merged; see the log for details")]
    SectorsFailed { failed: usize },
}

async fn run() -> Result<(), AppError> {
    let mut args = env::args().skip(1);
    let command: Command = args.next().ok_or(AppError::Usage)?.parse()?;
    let path_arg = args.next().map(PathBuf::from);
    if args.next().is_some() {
        return Err(AppError::Usage);
    }
    let config = AppConfig::load()?;
    let store = ShardStore::new(config.shard_root(), config.partition.compression_level);
    let mut catalog = SectorCatalog::load_or_init(&config.catalog_path)?;
    info!(
        "sectorsplit {:?}: shards under {}, catalog {} ({} sectors)",
        command,
        store.root().display(),
        config.catalog_path.display(),
        catalog.len()
    );

    match command {
        Command::Partition => {
            let source = path_arg.unwrap_or_else(|| config.source_path.clone());
            let names = ReferenceNames::load_or_empty(&config.reference_path).await;
            Partitioner::new(store, config.partition.clone())
                .run(&source, &mut catalog, &names)
                .await?;
            catalog.export_json(&config.export_path)?;
        }
        Command::Update => {
            let delta = path_arg.unwrap_or_else(|| config.delta_path.clone());
            let names = ReferenceNames::load_or_empty(&config.reference_path).await;
            let store = ShardStore::new(config.shard_root(), config.merge.compression_level);
            let report = MergeUpdater::new(
                store,
                config.merge.clone(),
                config.partition.verify_coordinates,
            )
            .run(&delta, &mut catalog, &names)
            .await?;
            if !report.new_sectors.is_empty() {
                catalog.export_json(&config.export_path)?;
            }
            if !report.is_clean() {
                for failure in &report.failures {
                    warn!("sector {} left unchanged: {}", failure.address, failure.error);
                }
                return Err(AppError::SectorsFailed {
                    failed: report.failures.len(),
                });
            }
        }
        Command::Survey => {
            let source = path_arg.unwrap_or_else(|| config.source_path.clone());
            let report = survey(
                &source,
                config.partition.survey_limit,
                config.partition.progress_update_ms,
                &mut catalog,
            )
            .await?;
            if !report.new_sectors.is_empty() {
                let names = ReferenceNames::load_or_empty(&config.reference_path).await;
                catalog.apply_names(&names);
                catalog.persist()?;
            }
        }
        Command::Export => {
            if path_arg.is_some() {
                return Err(AppError::Usage);
            }
            let names = ReferenceNames::load_or_empty(&config.reference_path).await;
            let renamed = catalog.apply_names(&names);
            if renamed > 0 {
                catalog.persist()?;
            }
            catalog.export_json(&config.export_path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_commands() {
        assert_eq!("partition".parse::<Command>().unwrap(), Command::Partition);
        assert_eq!("update".parse::<Command>().unwrap(), Command::Update);
        assert_eq!("survey".parse::<Command>().unwrap(), Command::Survey);
        assert_eq!("export".parse::<Command>().unwrap(), Command::Export);
        assert!(matches!("rebuild".parse::<Command>(), Err(AppError::Usage)));
    }
}
