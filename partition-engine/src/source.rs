// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::{
    path::{Path, PathBuf},
    str::Utf8Error,
};

use async_compression::tokio::bufread::GzipDecoder;
use core_types::SystemRecord;
use shard_store::codec::{self, SourceLine};
use thiserror::Error;
use tokio::{
    fs::File,
    io::{AsyncBufRead, AsyncBufReadExt, BufReader},
};

use crate::error::{EngineError, Result};

#[derive(Debug, Error)]
pub enum LineError {
    #[error("line is not valid utf-8: {0}")]
    Encoding(#[from] Utf8Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug)]
pub struct SourceEntry {
    /// 1-based line number in the (decompressed) source.
    pub line: u64,
    pub record: std::result::Result<SystemRecord, LineError>,
}

/// Line-at-a-time reader over a pseudo-array dump, gzip-compressed when the path ends in `.gz`.
///
/// Blank lines and the array delimiters are skipped. A line that is not valid utf-8 is handed
/// back as a failed entry; only read failures of the underlying file end the stream.
pub struct SourceReader {
    path: PathBuf,
    reader: Box<dyn AsyncBufRead + Unpin + Send>,
    buf: Vec<u8>,
    line: u64,
}

impl SourceReader {
    pub async fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).await.map_err(|source| EngineError::Source {
            path: path.to_path_buf(),
            source,
        })?;
        let reader: Box<dyn AsyncBufRead + Unpin + Send> = if is_gzip(path) {
            let mut decoder = GzipDecoder::new(BufReader::new(file));
            decoder.multiple_members(true);
            Box::new(BufReader::new(decoder))
        } else {
            Box::new(BufReader::new(file))
        };
        Ok(Self {
            path: path.to_path_buf(),
            reader,
            buf: Vec::new(),
            line: 0,
        })
    }

    pub fn lines_read(&self) -> u64 {
        self.line
    }

    pub async fn next_entry(&mut self) -> Result<Option<SourceEntry>> {
        loop {
            self.buf.clear();
            let read = self
                .reader
                .read_until(b'\n', &mut self.buf)
                .await
                .map_err(|source| EngineError::Source {
                    path: self.path.clone(),
                    source,
                })?;
            if read == 0 {
                return Ok(None);
            }
            self.line += 1;
            let text = match std::str::from_utf8(&self.buf) {
                Ok(text) => text,
                Err(err) => {
                    return Ok(Some(SourceEntry {
                        line: self.line,
                        record: Err(err.into()),
                    }));
                }
            };
            match codec::classify_line(text) {
                SourceLine::Blank | SourceLine::Delimiter => continue,
                SourceLine::Record(payload) => {
                    return Ok(Some(SourceEntry {
                        line: self.line,
                        record: codec::parse_record(payload).map_err(LineError::from),
                    }));
                }
            }
        }
    }
}

fn is_gzip(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_compression::tokio::write::GzipEncoder;
    use tempfile::tempdir;
    use tokio::io::AsyncWriteExt;

    const DUMP: &str = "[\n\
\t{\"id\":1,\"id64\":5582283182826,\"name\":\"A\",\"coords\":{\"x\":533.75,\"y\":117.875,\"z\":122.4375}},\n\
\n\
\t{\"id\":2,\"id64\":\n\
\t{\"id\":3,\"id64\":3238296097059,\"name\":\"C\",\"coords\":{\"x\":-9530.5,\"y\":-910.28125,\"z\":19808.125}}\n\
]\n";

    async fn collect(path: &Path) -> Vec<SourceEntry> {
        let mut reader = SourceReader::open(path).await.unwrap();
        let mut out = Vec::new();
        while let Some(entry) = reader.next_entry().await.unwrap() {
            out.push(entry);
        }
        out
    }

    #[tokio::test]
    async fn reads_plain_dump_and_skips_framing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("systems.json");
        tokio::fs::write(&path, DUMP).await.unwrap();
        let entries = collect(&path).await;
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].line, 2);
        assert_eq!(entries[0].record.as_ref().unwrap().id, 1);
        assert_eq!(entries[1].line, 4);
        assert!(entries[1].record.is_err());
        assert_eq!(entries[2].record.as_ref().unwrap().id, 3);
    }

    #[tokio::test]
    async fn reads_gzip_dump() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("systems.json.gz");
        let file = File::create(&path).await.unwrap();
        let mut encoder = GzipEncoder::new(file);
        encoder.write_all(DUMP.as_bytes()).await.unwrap();
        encoder.shutdown().await.unwrap();
        let entries = collect(&path).await;
        assert_eq!(entries.len(), 3);
        assert_eq!(entries.iter().filter(|e| e.record.is_ok()).count(), 2);
    }

    #[tokio::test]
    async fn invalid_utf8_line_is_a_failed_entry_not_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("systems.json");
        let mut body = Vec::new();
        body.extend_from_slice(b"[\n");
        body.extend_from_slice(b"\t{\"id\":2,\"name\":\"\xff\xfe\"},\n");
        body.extend_from_slice(
            b"\t{\"id\":3,\"id64\":3238296097059,\"name\":\"C\",\"coords\":{\"x\":-9530.5,\"y\":-910.28125,\"z\":19808.125}}\n]",
        );
        tokio::fs::write(&path, body).await.unwrap();
        let entries = collect(&path).await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].line, 2);
        assert!(matches!(entries[0].record, Err(LineError::Encoding(_))));
        assert_eq!(entries[1].record.as_ref().unwrap().id, 3);
    }

    #[tokio::test]
    async fn missing_source_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            SourceReader::open(&dir.path().join("absent.json.gz")).await,
            Err(EngineError::Source { .. })
        ));
    }
}
