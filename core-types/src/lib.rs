// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Shared record model and run configuration for the sector partitioning tools.

pub mod config;
pub mod types;

pub use config::{AppConfig, MergeConfig, PartitionConfig};
pub use types::{SystemId, SystemRecord};
