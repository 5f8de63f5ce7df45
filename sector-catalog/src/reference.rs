// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::{collections::HashMap, path::Path};

use csv_async::AsyncReaderBuilder;
use futures::StreamExt;
use log::{info, warn};
use sector_grid::{GridAddress, Point3, address_of};
use serde::Deserialize;
use tokio::{fs::File, io::BufReader};

use crate::error::Result;

/// One row of the named-sector table. Other columns are ignored.
#[derive(Debug, Deserialize)]
struct ReferenceRow {
    #[serde(rename = "Sector")]
    name: String,
    #[serde(rename = "Avg X")]
    x: f64,
    #[serde(rename = "Avg Y")]
    y: f64,
    #[serde(rename = "Avg Z")]
    z: f64,
}

/// Sector names keyed by grid address, loaded once per run and handed to the catalog.
#[derive(Debug, Clone, Default)]
pub struct ReferenceNames {
    names: HashMap<GridAddress, String>,
}

impl ReferenceNames {
    /// Builds the lookup from `(name, average position)` pairs. When several entries land in the
    /// same sector the last one wins.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, Point3)>,
        S: Into<String>,
    {
        let mut names = HashMap::new();
        for (name, position) in entries {
            let name = name.into();
            match address_of(&position) {
                Some(address) => {
                    names.insert(address, name);
                }
                None => warn!("reference sector {} has no valid position", name),
            }
        }
        Self { names }
    }

    /// Reads the reference CSV. Rows that fail to parse are skipped with a warning.
    pub async fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).await?;
        let mut reader = AsyncReaderBuilder::new()
            .trim(csv_async::Trim::All)
            .create_deserializer(BufReader::new(file));
        let mut rows = reader.deserialize::<ReferenceRow>();
        let mut entries = Vec::new();
        let mut skipped = 0usize;
        while let Some(row) = rows.next().await {
            match row {
                Ok(row) => entries.push((row.name, Point3::new(row.x, row.y, row.z))),
                Err(err) => {
                    skipped += 1;
                    warn!("skipping reference row in {}: {}", path.display(), err);
                }
            }
        }
        let names = Self::from_entries(entries);
        info!(
            "loaded {} named sectors from {} ({} rows skipped)",
            names.len(),
            path.display(),
            skipped
        );
        Ok(names)
    }

    /// Like [`load`](Self::load), but an unreadable table degrades to an empty lookup so every
    /// sector keeps the default name.
    pub async fn load_or_empty(path: &Path) -> Self {
        match Self::load(path).await {
            Ok(names) => names,
            Err(err) => {
                warn!(
                    "reference sectors unavailable at {} ({}); sector names default to Unknown",
                    path.display(),
                    err
                );
                Self::default()
            }
        }
    }

    pub fn get(&self, address: GridAddress) -> Option<&str> {
        self.names.get(&address).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
