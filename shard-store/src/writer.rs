// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::collections::{HashMap, HashSet};

use core_types::SystemRecord;
use log::{debug, warn};
use sector_grid::GridAddress;
use tokio::{
    fs::{self, File, OpenOptions},
    io::{AsyncWriteExt, BufWriter},
};

use crate::{
    codec,
    error::{Result, ShardError},
    store::{ShardStore, storage_error},
};

struct OpenHandle {
    writer: BufWriter<File>,
    last_used: u64,
}

/// Open-phase lifecycle for shards built by a single sequential writer.
///
/// `create` writes the opening delimiter, `append` adds one record per line, and `close`
/// seals and compresses the shard. The open phase is written beside the shard, so a closed
/// shard from an earlier run survives until its replacement is sealed. At most `max_handles`
/// files stay open at a time; the least recently used one is flushed and reopened in append
/// mode on its next write.
pub struct ShardWriter {
    store: ShardStore,
    open: HashSet<GridAddress>,
    handles: HashMap<GridAddress, OpenHandle>,
    max_handles: usize,
    tick: u64,
}

impl ShardWriter {
    pub fn new(store: ShardStore, max_handles: usize) -> Self {
        Self {
            store,
            open: HashSet::new(),
            handles: HashMap::new(),
            max_handles: max_handles.max(1),
            tick: 0,
        }
    }

    pub fn is_open(&self, address: GridAddress) -> bool {
        self.open.contains(&address)
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    /// Starts a fresh open phase for `address`, truncating any earlier leftover.
    pub async fn create(&mut self, address: GridAddress) -> Result<()> {
        let path = self.store.open_path_for(address);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| storage_error(address, &path, source))?;
        }
        let file = File::create(&path)
            .await
            .map_err(|source| storage_error(address, &path, source))?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(codec::OPEN_DELIMITER.as_bytes())
            .await
            .map_err(|source| storage_error(address, &path, source))?;
        self.evict_if_full().await?;
        self.tick += 1;
        self.handles.insert(
            address,
            OpenHandle {
                writer,
                last_used: self.tick,
            },
        );
        self.open.insert(address);
        Ok(())
    }

    pub async fn append(&mut self, address: GridAddress, record: SystemRecord) -> Result<()> {
        if !self.open.contains(&address) {
            return Err(ShardError::NotOpen { address });
        }
        let entry = codec::encode_entry(&record.with_sector(address))
            .map_err(|source| ShardError::Encode { address, source })?;
        let path = self.store.open_path_for(address);
        let handle = self.handle(address).await?;
        handle
            .writer
            .write_all(entry.as_bytes())
            .await
            .map_err(|source| storage_error(address, &path, source))
    }

    pub async fn close(&mut self, address: GridAddress) -> Result<()> {
        if !self.open.remove(&address) {
            return Err(ShardError::NotOpen { address });
        }
        if let Some(handle) = self.handles.remove(&address) {
            flush_handle(&self.store, address, handle).await?;
        }
        self.store.seal(address).await
    }

    pub async fn close_all(&mut self) -> Result<Vec<GridAddress>> {
        let mut addresses: Vec<GridAddress> = self.open.iter().copied().collect();
        addresses.sort();
        for address in &addresses {
            self.close(*address).await?;
        }
        Ok(addresses)
    }

    /// Drops every open phase without sealing it. Closed shards are left as they were.
    pub async fn abandon(&mut self) {
        self.handles.clear();
        let mut addresses: Vec<GridAddress> = self.open.drain().collect();
        addresses.sort();
        for address in addresses {
            if let Err(err) = self.store.discard_open(address).await {
                warn!("could not discard open shard {}: {}", address, err);
            }
        }
    }

    async fn handle(&mut self, address: GridAddress) -> Result<&mut OpenHandle> {
        if !self.handles.contains_key(&address) {
            self.evict_if_full().await?;
            let path = self.store.open_path_for(address);
            let file = OpenOptions::new()
                .append(true)
                .open(&path)
                .await
                .map_err(|source| storage_error(address, &path, source))?;
            self.handles.insert(
                address,
                OpenHandle {
                    writer: BufWriter::new(file),
                    last_used: 0,
                },
            );
        }
        self.tick += 1;
        let tick = self.tick;
        match self.handles.get_mut(&address) {
            Some(handle) => {
                handle.last_used = tick;
                Ok(handle)
            }
            None => Err(ShardError::NotOpen { address }),
        }
    }

    async fn evict_if_full(&mut self) -> Result<()> {
        if self.handles.len() < self.max_handles {
            return Ok(());
        }
        let victim = self
            .handles
            .iter()
            .min_by_key(|(_, handle)| handle.last_used)
            .map(|(address, _)| *address);
        if let Some(address) = victim {
            if let Some(handle) = self.handles.remove(&address) {
                debug!("parking shard {} to stay under {} open files", address, self.max_handles);
                flush_handle(&self.store, address, handle).await?;
            }
        }
        Ok(())
    }
}

async fn flush_handle(store: &ShardStore, address: GridAddress, mut handle: OpenHandle) -> Result<()> {
    handle
        .writer
        .flush()
        .await
        .map_err(|source| storage_error(address, &store.open_path_for(address), source))
}
