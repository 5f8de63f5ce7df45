// Copyright (c) James Kassemi, SC, US. All rights reserved.
use thiserror::Error;

use crate::id64::BitRange;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unrecognised size class code {code} in id64 {packed}")]
    UnknownSizeClass { packed: u64, code: u8 },
    #[error("bit range {range:?} does not fit a 64-bit identifier")]
    FieldOutOfRange { range: BitRange },
}
