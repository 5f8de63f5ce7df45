// Copyright (c) James Kassemi, SC, US. All rights reserved.
use core_types::SystemRecord;
use log::warn;
use sector_grid::{DecodeError, Decoded, address_of, decode};

use crate::report::{AddressMismatch, LineIssues};

/// Decodes a record's sector from its identifier, optionally cross-checking it against the
/// sector its coordinates fall in. A disagreement is logged and recorded, never fatal; the
/// identifier stays authoritative for routing.
pub fn locate(
    label: &str,
    line: u64,
    record: &SystemRecord,
    verify: bool,
    issues: &mut LineIssues,
) -> Result<Decoded, DecodeError> {
    let decoded = decode(record.id64)?;
    if verify {
        let from_coords = address_of(&record.coords);
        if from_coords != Some(decoded.address) {
            warn!(
                "[{}] line {}: system {} decodes to sector {} but its coordinates lie in {}",
                label,
                line,
                record.id,
                decoded.address,
                from_coords.map_or_else(|| "no sector".to_string(), |a| a.to_string())
            );
            issues.mismatches.record(AddressMismatch {
                line,
                id: record.id,
                decoded: decoded.address,
                from_coords,
            });
        }
    }
    Ok(decoded)
}
