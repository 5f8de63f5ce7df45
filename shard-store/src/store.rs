// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::{
    ffi::OsString,
    io,
    path::{Path, PathBuf},
};

use async_compression::{
    Level,
    tokio::{bufread::GzipDecoder, write::GzipEncoder},
};
use core_types::SystemRecord;
use log::{error, warn};
use sector_grid::GridAddress;
use tokio::{
    fs::{self, File},
    io::{AsyncReadExt, AsyncWriteExt, BufReader},
};

use crate::{
    codec,
    error::{Result, ShardError},
};

const SHARD_SUFFIX: &str = ".json.gz";
const PARTIAL_SUFFIX: &str = ".partial";
const OPEN_SUFFIX: &str = ".open";

/// Gzip-compressed JSON arrays, one per sector, under `<root>/<gx>/<gy>/<gx>_<gy>_<gz>.json.gz`.
///
/// A shard on disk is either absent or closed (a complete compressed array). While a
/// [`ShardWriter`] builds it, the plain-text open phase lives in a sibling `.open` file, so a
/// closed shard is only ever replaced whole, via a sibling partial file renamed into place.
///
/// [`ShardWriter`]: crate::ShardWriter
#[derive(Clone, Debug)]
pub struct ShardStore {
    root: PathBuf,
    compression_level: u32,
}

impl ShardStore {
    pub fn new(root: impl Into<PathBuf>, compression_level: u32) -> Self {
        Self {
            root: root.into(),
            compression_level: compression_level.min(9),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, address: GridAddress) -> PathBuf {
        self.root
            .join(address.gx.to_string())
            .join(address.gy.to_string())
            .join(format!(
                "{}_{}_{}{}",
                address.gx, address.gy, address.gz, SHARD_SUFFIX
            ))
    }

    pub(crate) fn open_path_for(&self, address: GridAddress) -> PathBuf {
        suffixed(&self.path_for(address), OPEN_SUFFIX)
    }

    /// Decompresses and parses a closed shard; `None` when the shard does not exist.
    pub async fn read_all(&self, address: GridAddress) -> Result<Option<Vec<SystemRecord>>> {
        let path = self.path_for(address);
        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(storage_error(address, &path, err)),
        };
        let mut decoder = GzipDecoder::new(BufReader::new(file));
        decoder.multiple_members(true);
        let mut raw = String::new();
        decoder
            .read_to_string(&mut raw)
            .await
            .map_err(|source| storage_error(address, &path, source))?;
        match codec::parse_array(&raw) {
            Ok(records) => Ok(Some(records)),
            Err(source) => {
                error!(
                    "shard {} at {} is malformed ({}); raw content: {}",
                    address,
                    path.display(),
                    source,
                    raw
                );
                Err(ShardError::Parse {
                    address,
                    raw,
                    source,
                })
            }
        }
    }

    /// Replaces the shard with exactly `records`, compressed in one pass.
    pub async fn write_all(&self, address: GridAddress, records: &[SystemRecord]) -> Result<()> {
        let content = codec::encode_array(records)
            .map_err(|source| ShardError::Encode { address, source })?;
        let path = self.path_for(address);
        self.compress_into(&path, &content)
            .await
            .map_err(|source| storage_error(address, &path, source))
    }

    /// Closes an open-phase shard: strips the final separator, appends the closing delimiter,
    /// compresses the result over the shard path and drops the open file.
    pub(crate) async fn seal(&self, address: GridAddress) -> Result<()> {
        let open_path = self.open_path_for(address);
        let open_content = fs::read_to_string(&open_path)
            .await
            .map_err(|source| storage_error(address, &open_path, source))?;
        let closed = codec::finish(&open_content);
        let path = self.path_for(address);
        self.compress_into(&path, &closed)
            .await
            .map_err(|source| storage_error(address, &path, source))?;
        fs::remove_file(&open_path)
            .await
            .map_err(|source| storage_error(address, &open_path, source))
    }

    /// Drops an open-phase file without touching the closed shard beside it.
    pub(crate) async fn discard_open(&self, address: GridAddress) -> io::Result<()> {
        match fs::remove_file(self.open_path_for(address)).await {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }

    async fn compress_into(&self, path: &Path, content: &str) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let partial = suffixed(path, PARTIAL_SUFFIX);
        let written = self.compress_file(&partial, content).await;
        let result = match written {
            Ok(()) => fs::rename(&partial, path).await,
            Err(err) => Err(err),
        };
        if result.is_err() {
            if let Err(err) = fs::remove_file(&partial).await {
                if err.kind() != io::ErrorKind::NotFound {
                    warn!("could not remove {}: {}", partial.display(), err);
                }
            }
        }
        result
    }

    async fn compress_file(&self, path: &Path, content: &str) -> io::Result<()> {
        let file = File::create(path).await?;
        let mut encoder =
            GzipEncoder::with_quality(file, Level::Precise(self.compression_level as i32));
        encoder.write_all(content.as_bytes()).await?;
        encoder.shutdown().await?;
        encoder.into_inner().sync_all().await
    }

    pub async fn addresses(&self) -> io::Result<Vec<GridAddress>> {
        let mut found = Vec::new();
        if !fs::try_exists(&self.root).await? {
            return Ok(found);
        }
        let mut gx_dirs = fs::read_dir(&self.root).await?;
        while let Some(gx_dir) = gx_dirs.next_entry().await? {
            if !gx_dir.file_type().await?.is_dir() {
                continue;
            }
            let mut gy_dirs = fs::read_dir(gx_dir.path()).await?;
            while let Some(gy_dir) = gy_dirs.next_entry().await? {
                if !gy_dir.file_type().await?.is_dir() {
                    continue;
                }
                let mut files = fs::read_dir(gy_dir.path()).await?;
                while let Some(file) = files.next_entry().await? {
                    if let Some(address) = file.file_name().to_str().and_then(parse_file_name) {
                        found.push(address);
                    }
                }
            }
        }
        found.sort();
        Ok(found)
    }
}

pub(crate) fn storage_error(address: GridAddress, path: &Path, source: io::Error) -> ShardError {
    ShardError::Storage {
        address,
        path: path.to_path_buf(),
        source,
    }
}

fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

fn parse_file_name(name: &str) -> Option<GridAddress> {
    let stem = name.strip_suffix(SHARD_SUFFIX)?;
    let mut parts = stem.split('_').map(str::parse::<i32>);
    let gx = parts.next()?.ok()?;
    let gy = parts.next()?.ok()?;
    let gz = parts.next()?.ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(GridAddress::new(gx, gy, gz))
}
