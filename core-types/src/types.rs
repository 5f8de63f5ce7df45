// Copyright (c) James Kassemi, SC, US. All rights reserved.

use sector_grid::{GridAddress, Point3};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type SystemId = u64;

/// One star system as it appears in the source dump and in sector shards.
///
/// Fields this model does not name (e.g. `date`) are carried through untouched in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemRecord {
    pub id: SystemId,
    pub id64: u64,
    pub name: String,
    pub coords: Point3,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<GridAddress>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SystemRecord {
    pub fn with_sector(mut self, address: GridAddress) -> Self {
        self.sector = Some(address);
        self
    }

    /// Overwrites every field present on `newer`, keeping passthrough fields `newer` lacks.
    pub fn merge_from(&mut self, newer: SystemRecord) {
        self.id64 = newer.id64;
        self.name = newer.name;
        self.coords = newer.coords;
        if newer.sector.is_some() {
            self.sector = newer.sector;
        }
        self.extra.extend(newer.extra);
    }
}
