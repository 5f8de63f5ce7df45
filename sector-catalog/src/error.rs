// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CatalogError>;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv_async::Error),
    #[error("unsupported catalog version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },
}
