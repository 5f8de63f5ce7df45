// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Line-oriented JSON array layout shared by the source dump and the shard files.
//!
//! The first and last lines hold the array delimiters and every interior line carries one
//! record followed by a comma, so readers can stream line by line and writers can append
//! while a shard is open. Closing strips the comma after the final record.

use core_types::SystemRecord;

pub const OPEN_DELIMITER: &str = "[\n";
pub const CLOSE_DELIMITER: &str = "\n]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLine<'a> {
    Blank,
    Delimiter,
    /// Record payload with whitespace and the trailing separator removed.
    Record(&'a str),
}

pub fn classify_line(line: &str) -> SourceLine<'_> {
    let trimmed = line.trim();
    let payload = trimmed.strip_suffix(',').unwrap_or(trimmed).trim_end();
    match payload {
        "" => SourceLine::Blank,
        "[" | "]" => SourceLine::Delimiter,
        record => SourceLine::Record(record),
    }
}

pub fn parse_record(payload: &str) -> Result<SystemRecord, serde_json::Error> {
    serde_json::from_str(payload)
}

/// Serialises one open-phase entry: tab indent, record, trailing separator, newline.
pub fn encode_entry(record: &SystemRecord) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(record)?;
    let mut entry = String::with_capacity(json.len() + 3);
    entry.push('\t');
    entry.push_str(&json);
    entry.push_str(",\n");
    Ok(entry)
}

/// Turns accumulated open-phase content into a complete array.
pub fn finish(open_content: &str) -> String {
    let body = open_content.trim_end();
    let body = body.strip_suffix(',').unwrap_or(body);
    let mut closed = String::with_capacity(body.len() + CLOSE_DELIMITER.len());
    closed.push_str(body);
    closed.push_str(CLOSE_DELIMITER);
    closed
}

/// Serialises a complete shard in the same line layout the open phase produces.
pub fn encode_array(records: &[SystemRecord]) -> Result<String, serde_json::Error> {
    let mut out = String::from(OPEN_DELIMITER);
    for record in records {
        out.push_str(&encode_entry(record)?);
    }
    Ok(finish(&out))
}

/// Parses a closed shard. Older writers left a separator after the last record
/// (`..},\n]`); that single malformation is repaired before giving up.
pub fn parse_array(raw: &str) -> Result<Vec<SystemRecord>, serde_json::Error> {
    match serde_json::from_str(raw) {
        Ok(records) => Ok(records),
        Err(err) => match strip_legacy_separator(raw) {
            Some(repaired) => serde_json::from_str(&repaired),
            None => Err(err),
        },
    }
}

fn strip_legacy_separator(raw: &str) -> Option<String> {
    let body = raw.trim_end().strip_suffix(']')?.trim_end();
    let body = body.strip_suffix(',')?;
    Some(finish(body))
}
