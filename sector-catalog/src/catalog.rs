// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::{
    collections::BTreeMap,
    ffi::OsString,
    fs, io,
    path::{Path, PathBuf},
};

use log::{debug, info};
use sector_grid::{CELL_SIZE, GridAddress, Point3, SizeClass, bounds_of};
use serde::{Deserialize, Serialize};

use crate::{
    error::{CatalogError, Result},
    reference::ReferenceNames,
};

pub const UNKNOWN_SECTOR_NAME: &str = "Unknown";

const CATALOG_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sector {
    pub sector_number: GridAddress,
    pub min: Point3,
    pub max: Point3,
    pub center: Point3,
    /// Size class of the first system observed in the sector.
    #[serde(rename = "mass_code")]
    pub size_class: SizeClass,
    #[serde(rename = "sectorName")]
    pub name: String,
}

impl Sector {
    pub fn new(address: GridAddress, size_class: SizeClass) -> Self {
        let bounds = bounds_of(address);
        Self {
            sector_number: address,
            min: bounds.min,
            max: bounds.max,
            center: bounds.center,
            size_class,
            name: UNKNOWN_SECTOR_NAME.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct CatalogFile {
    version: u32,
    sectors: Vec<Sector>,
}

#[derive(Serialize)]
struct ExportRow<'a> {
    #[serde(flatten)]
    sector: &'a Sector,
    size: [f64; 3],
}

/// Set of populated sectors, backed by a json file next to the shard tree.
///
/// Sectors are only ever added; a sector observed again keeps its first size class.
#[derive(Debug, Clone)]
pub struct SectorCatalog {
    sectors: BTreeMap<GridAddress, Sector>,
    path: PathBuf,
}

impl SectorCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            sectors: BTreeMap::new(),
            path: path.into(),
        }
    }

    /// Loads the catalog at `path`, or starts an empty one when the file is absent or empty.
    /// A file that exists but does not parse is an error.
    pub fn load_or_init(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::new(path)),
            Err(err) => return Err(err.into()),
        };
        if bytes.is_empty() {
            return Ok(Self::new(path));
        }
        let file: CatalogFile = serde_json::from_slice(&bytes)?;
        if file.version != CATALOG_VERSION {
            return Err(CatalogError::Version {
                found: file.version,
                expected: CATALOG_VERSION,
            });
        }
        let sectors = file
            .sectors
            .into_iter()
            .map(|sector| (sector.sector_number, sector))
            .collect::<BTreeMap<_, _>>();
        debug!("loaded {} sectors from {}", sectors.len(), path.display());
        Ok(Self { sectors, path })
    }

    /// Writes the catalog through a sibling temporary file so readers never see a partial file.
    pub fn persist(&self) -> Result<()> {
        let file = CatalogFile {
            version: CATALOG_VERSION,
            sectors: self.sectors.values().cloned().collect(),
        };
        let bytes = serde_json::to_vec_pretty(&file)?;
        write_replacing(&self.path, &bytes)?;
        debug!("persisted {} sectors to {}", self.sectors.len(), self.path.display());
        Ok(())
    }

    /// Records that `address` holds at least one system. Returns true when the sector is new.
    pub fn observe(&mut self, address: GridAddress, size_class: SizeClass) -> bool {
        if self.sectors.contains_key(&address) {
            return false;
        }
        self.sectors.insert(address, Sector::new(address, size_class));
        true
    }

    pub fn merge_observed<I>(&mut self, observed: I) -> Vec<GridAddress>
    where
        I: IntoIterator<Item = (GridAddress, SizeClass)>,
    {
        observed
            .into_iter()
            .filter(|(address, size_class)| self.observe(*address, *size_class))
            .map(|(address, _)| address)
            .collect()
    }

    /// Copies names from the reference table onto matching sectors. Sectors with no match keep
    /// whatever name they already carry. Returns the number of sectors renamed.
    pub fn apply_names(&mut self, names: &ReferenceNames) -> usize {
        let mut renamed = 0;
        for (address, sector) in self.sectors.iter_mut() {
            if let Some(name) = names.get(*address) {
                if sector.name != name {
                    sector.name = name.to_string();
                    renamed += 1;
                }
            }
        }
        renamed
    }

    pub fn get(&self, address: GridAddress) -> Option<&Sector> {
        self.sectors.get(&address)
    }

    pub fn len(&self) -> usize {
        self.sectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sectors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sector> {
        self.sectors.values()
    }

    /// Writes the flat sector listing consumed by the map front end.
    pub fn export_json(&self, path: &Path) -> Result<()> {
        let rows: Vec<ExportRow<'_>> = self
            .sectors
            .values()
            .map(|sector| ExportRow {
                sector,
                size: [CELL_SIZE; 3],
            })
            .collect();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let bytes = serde_json::to_vec(&rows)?;
        write_replacing(path, &bytes)?;
        info!("exported {} sectors to {}", rows.len(), path.display());
        Ok(())
    }
}

fn write_replacing(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut tmp = OsString::from(path.as_os_str());
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn observe_keeps_first_size_class() {
        let dir = tempdir().unwrap();
        let mut catalog = SectorCatalog::new(dir.path().join("catalog.json"));
        let address = GridAddress::new(39, 32, 18);
        assert!(catalog.observe(address, SizeClass::C));
        assert!(!catalog.observe(address, SizeClass::H));
        let sector = catalog.get(address).unwrap();
        assert_eq!(sector.size_class, SizeClass::C);
        assert_eq!(sector.name, UNKNOWN_SECTOR_NAME);
        assert_eq!(sector.min, Point3::new(-65.0, -25.0, -1065.0));
        assert_eq!(sector.center, Point3::new(575.0, 615.0, -425.0));
    }

    #[test]
    fn merge_observed_reports_only_new_sectors() {
        let dir = tempdir().unwrap();
        let mut catalog = SectorCatalog::new(dir.path().join("catalog.json"));
        catalog.observe(GridAddress::new(1, 1, 1), SizeClass::A);
        let fresh = catalog.merge_observed(vec![
            (GridAddress::new(1, 1, 1), SizeClass::B),
            (GridAddress::new(2, 2, 2), SizeClass::B),
        ]);
        assert_eq!(fresh, vec![GridAddress::new(2, 2, 2)]);
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn persist_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        let mut catalog = SectorCatalog::load_or_init(&path).unwrap();
        assert!(catalog.is_empty());
        catalog.observe(GridAddress::new(31, 31, 34), SizeClass::D);
        catalog.observe(GridAddress::new(39, 32, 18), SizeClass::C);
        catalog.persist().unwrap();

        let reloaded = SectorCatalog::load_or_init(&path).unwrap();
        let addresses: Vec<GridAddress> = reloaded.iter().map(|s| s.sector_number).collect();
        assert_eq!(
            addresses,
            vec![GridAddress::new(31, 31, 34), GridAddress::new(39, 32, 18)]
        );
        assert_eq!(
            reloaded.get(GridAddress::new(31, 31, 34)).unwrap().size_class,
            SizeClass::D
        );
    }

    #[test]
    fn corrupt_catalog_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        fs::write(&path, b"{\"version\": 1, \"sectors\": [").unwrap();
        assert!(SectorCatalog::load_or_init(&path).is_err());
        fs::write(&path, b"{\"version\": 7, \"sectors\": []}").unwrap();
        assert!(matches!(
            SectorCatalog::load_or_init(&path),
            Err(CatalogError::Version { found: 7, .. })
        ));
    }

    #[test]
    fn names_apply_only_where_matched() {
        let dir = tempdir().unwrap();
        let mut catalog = SectorCatalog::new(dir.path().join("catalog.json"));
        catalog.observe(GridAddress::new(39, 32, 18), SizeClass::C);
        catalog.observe(GridAddress::new(31, 31, 34), SizeClass::D);
        let names = ReferenceNames::from_entries(vec![("Wregoe", Point3::new(533.75, 117.875, 122.4375))]);
        assert_eq!(catalog.apply_names(&names), 1);
        assert_eq!(catalog.get(GridAddress::new(39, 32, 18)).unwrap().name, "Wregoe");
        assert_eq!(
            catalog.get(GridAddress::new(31, 31, 34)).unwrap().name,
            UNKNOWN_SECTOR_NAME
        );

        assert_eq!(catalog.apply_names(&ReferenceNames::default()), 0);
        assert_eq!(catalog.get(GridAddress::new(39, 32, 18)).unwrap().name, "Wregoe");
    }

    #[test]
    fn export_writes_flat_records_with_size() {
        let dir = tempdir().unwrap();
        let mut catalog = SectorCatalog::new(dir.path().join("catalog.json"));
        catalog.observe(GridAddress::new(39, 32, 18), SizeClass::C);
        let out = dir.path().join("docs").join("sectors.json");
        catalog.export_json(&out).unwrap();

        let rows: Vec<serde_json::Value> =
            serde_json::from_slice(&fs::read(&out).unwrap()).unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row["sector_number"], serde_json::json!([39, 32, 18]));
        assert_eq!(row["mass_code"], "c");
        assert_eq!(row["sectorName"], UNKNOWN_SECTOR_NAME);
        assert_eq!(row["size"], serde_json::json!([1280.0, 1280.0, 1280.0]));
    }
}
