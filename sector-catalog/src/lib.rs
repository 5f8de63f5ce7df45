// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Registry of every sector observed in the catalogue, enriched with human-readable names from
//! a reference table of named sectors.

pub mod catalog;
pub mod error;
pub mod reference;

pub use catalog::{Sector, SectorCatalog, UNKNOWN_SECTOR_NAME};
pub use error::{CatalogError, Result};
pub use reference::ReferenceNames;
