// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::{io, path::PathBuf};

use sector_catalog::CatalogError;
use sector_grid::GridAddress;
use shard_store::ShardError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to read source {path}: {source}")]
    Source {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Shard(#[from] ShardError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("merge task for sector {address} did not complete: {source}")]
    Join {
        address: GridAddress,
        #[source]
        source: tokio::task::JoinError,
    },
}
