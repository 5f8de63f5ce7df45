// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Decoding of packed 64-bit system identifiers (id64).
//!
//! Bit ranges are written as `(low, high)` offsets counted from the most-significant bit, so a
//! range covers the same bits as the slice `bits[low..high]` of the zero-padded 64 character
//! binary rendering of the identifier.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{error::DecodeError, grid::GridAddress};

const ID64_BITS: u8 = 64;

/// The three least-significant bits carry the size class code.
const CLASS_RANGE: BitRange = BitRange::new(61, 64);

/// Half-open bit range `[low, high)` counted from the most-significant bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BitRange {
    pub low: u8,
    pub high: u8,
}

impl BitRange {
    pub const fn new(low: u8, high: u8) -> Self {
        Self { low, high }
    }

    pub const fn width(&self) -> u8 {
        self.high.saturating_sub(self.low)
    }

    fn validate(&self) -> Result<(), DecodeError> {
        if self.low >= self.high || self.high > ID64_BITS || self.width() > 32 {
            return Err(DecodeError::FieldOutOfRange { range: *self });
        }
        Ok(())
    }

    pub fn extract(&self, packed: u64) -> Result<u32, DecodeError> {
        self.validate()?;
        let shift = u32::from(ID64_BITS - self.high);
        let mask = (1u64 << self.width()) - 1;
        Ok(((packed >> shift) & mask) as u32)
    }
}

/// Bit ranges holding the x, y and z sector indices for one size class.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldLayout {
    pub x: BitRange,
    pub y: BitRange,
    pub z: BitRange,
}

impl FieldLayout {
    const fn new(x: (u8, u8), y: (u8, u8), z: (u8, u8)) -> Self {
        Self {
            x: BitRange::new(x.0, x.1),
            y: BitRange::new(y.0, y.1),
            z: BitRange::new(z.0, z.1),
        }
    }
}

/// Layouts indexed by [`SizeClass::code`].
const LAYOUTS: [FieldLayout; 8] = [
    FieldLayout::new((20, 27), (34, 40), (47, 54)),
    FieldLayout::new((23, 30), (36, 42), (48, 55)),
    FieldLayout::new((26, 33), (38, 44), (49, 56)),
    FieldLayout::new((29, 36), (40, 46), (50, 57)),
    FieldLayout::new((32, 39), (42, 48), (51, 58)),
    FieldLayout::new((35, 42), (44, 50), (52, 59)),
    FieldLayout::new((38, 45), (46, 52), (53, 60)),
    FieldLayout::new((41, 48), (48, 54), (54, 61)),
];

/// Mass code embedded in an id64, `a` (smallest) through `h` (largest).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeClass {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
}

impl SizeClass {
    pub const ALL: [SizeClass; 8] = [
        SizeClass::A,
        SizeClass::B,
        SizeClass::C,
        SizeClass::D,
        SizeClass::E,
        SizeClass::F,
        SizeClass::G,
        SizeClass::H,
    ];

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn letter(self) -> char {
        (b'a' + self.code()) as char
    }

    pub fn layout(self) -> &'static FieldLayout {
        &LAYOUTS[self.code() as usize]
    }
}

impl fmt::Display for SizeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Decoded {
    pub address: GridAddress,
    pub size_class: SizeClass,
}

/// Unpacks the sector grid indices of a packed identifier.
///
/// The values read are sector numbers, not world coordinates; use
/// [`bounds_of`](crate::grid::bounds_of) to place them in space.
pub fn decode(packed: u64) -> Result<Decoded, DecodeError> {
    let code = CLASS_RANGE.extract(packed)? as u8;
    let size_class =
        SizeClass::from_code(code).ok_or(DecodeError::UnknownSizeClass { packed, code })?;
    let layout = size_class.layout();
    let x = layout.x.extract(packed)?;
    let y = layout.y.extract(packed)?;
    let z = layout.z.extract(packed)?;
    Ok(Decoded {
        address: GridAddress::new(x as i32, y as i32, z as i32),
        size_class,
    })
}
