// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::{io, path::PathBuf};

use sector_grid::GridAddress;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ShardError>;

#[derive(Debug, Error)]
pub enum ShardError {
    #[error("storage error for shard {address} at {path}: {source}")]
    Storage {
        address: GridAddress,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// `raw` holds the decompressed content so the shard can be repaired by hand.
    #[error("malformed shard {address}: {source}")]
    Parse {
        address: GridAddress,
        raw: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialise record for shard {address}: {source}")]
    Encode {
        address: GridAddress,
        #[source]
        source: serde_json::Error,
    },
    #[error("shard {address} is not open for append")]
    NotOpen { address: GridAddress },
}
