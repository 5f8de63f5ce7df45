// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Fixed sector grid. Cells are 1280 units on every axis, anchored at [`ORIGIN`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// Edge length of one sector cell in world units.
pub const CELL_SIZE: f64 = 1280.0;
pub const HALF_CELL: f64 = CELL_SIZE / 2.0;

/// World-space minimum corner of sector `(0, 0, 0)`.
pub const ORIGIN: Point3 = Point3::new(-49_985.0, -40_985.0, -24_105.0);

/// Integer sector address; the partition key for shards.
///
/// Serialises as `[gx, gy, gz]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "[i32; 3]", into = "[i32; 3]")]
pub struct GridAddress {
    pub gx: i32,
    pub gy: i32,
    pub gz: i32,
}

impl GridAddress {
    pub const fn new(gx: i32, gy: i32, gz: i32) -> Self {
        Self { gx, gy, gz }
    }
}

impl From<[i32; 3]> for GridAddress {
    fn from(value: [i32; 3]) -> Self {
        Self::new(value[0], value[1], value[2])
    }
}

impl From<GridAddress> for [i32; 3] {
    fn from(value: GridAddress) -> Self {
        [value.gx, value.gy, value.gz]
    }
}

impl fmt::Display for GridAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.gx, self.gy, self.gz)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    fn offset(&self, delta: f64) -> Self {
        Self::new(self.x + delta, self.y + delta, self.z + delta)
    }
}

/// World-space box of one sector. Closed at `min`, open at `max`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Point3,
    pub max: Point3,
    pub center: Point3,
}

impl Bounds {
    pub fn contains(&self, point: &Point3) -> bool {
        axis_contains(self.min.x, self.max.x, point.x)
            && axis_contains(self.min.y, self.max.y, point.y)
            && axis_contains(self.min.z, self.max.z, point.z)
    }
}

fn axis_contains(min: f64, max: f64, value: f64) -> bool {
    value >= min && value < max
}

fn axis_origin(index: i32, origin: f64) -> f64 {
    f64::from(index) * CELL_SIZE + origin
}

pub fn origin_of(address: GridAddress) -> Point3 {
    Point3::new(
        axis_origin(address.gx, ORIGIN.x),
        axis_origin(address.gy, ORIGIN.y),
        axis_origin(address.gz, ORIGIN.z),
    )
}

pub fn bounds_of(address: GridAddress) -> Bounds {
    let min = origin_of(address);
    Bounds {
        min,
        max: min.offset(CELL_SIZE),
        center: min.offset(HALF_CELL),
    }
}

/// Floor-divides a world-space point into its sector address.
///
/// Returns `None` for non-finite points or points beyond the addressable range.
pub fn address_of(point: &Point3) -> Option<GridAddress> {
    Some(GridAddress::new(
        axis_index(point.x, ORIGIN.x)?,
        axis_index(point.y, ORIGIN.y)?,
        axis_index(point.z, ORIGIN.z)?,
    ))
}

fn axis_index(value: f64, origin: f64) -> Option<i32> {
    if !value.is_finite() {
        return None;
    }
    let estimate = ((value - origin) / CELL_SIZE).floor();
    if estimate < f64::from(i32::MIN) + 1.0 || estimate > f64::from(i32::MAX) - 1.0 {
        return None;
    }
    let mut index = estimate as i32;
    // The subtraction may round across a cell edge; settle against the exact cell origin.
    if value < axis_origin(index, origin) {
        index -= 1;
    } else if value >= axis_origin(index, origin) + CELL_SIZE {
        index += 1;
    }
    Some(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ulp_below(value: f64) -> f64 {
        match value {
            v if v > 0.0 => f64::from_bits(v.to_bits() - 1),
            v if v < 0.0 => f64::from_bits(v.to_bits() + 1),
            _ => -f64::from_bits(1),
        }
    }

    fn ulp_above(value: f64) -> f64 {
        -ulp_below(-value)
    }

    fn assert_contained(point: Point3) {
        let address = address_of(&point).expect("finite point");
        let bounds = bounds_of(address);
        assert!(
            bounds.contains(&point),
            "{point:?} not inside {address} bounds {bounds:?}"
        );
    }

    #[test]
    fn bounds_are_derived_from_origin() {
        let bounds = bounds_of(GridAddress::new(0, 0, 0));
        assert_eq!(bounds.min, ORIGIN);
        assert_eq!(bounds.max, Point3::new(-48_705.0, -39_705.0, -22_825.0));
        assert_eq!(bounds.center, Point3::new(-49_345.0, -40_345.0, -23_465.0));
    }

    #[test]
    fn address_of_fixture_points() {
        assert_eq!(
            address_of(&Point3::new(533.75, 117.875, 122.4375)),
            Some(GridAddress::new(39, 32, 18))
        );
        assert_eq!(
            address_of(&Point3::new(-9530.5, -910.28125, 19808.125)),
            Some(GridAddress::new(31, 31, 34))
        );
    }

    #[test]
    fn boundary_is_closed_at_min_open_at_max() {
        let address = GridAddress::new(39, 32, 18);
        let bounds = bounds_of(address);
        assert_eq!(address_of(&bounds.min), Some(address));
        assert_eq!(
            address_of(&bounds.max),
            Some(GridAddress::new(40, 33, 19))
        );
        let just_below = Point3::new(
            ulp_below(bounds.max.x),
            ulp_below(bounds.max.y),
            ulp_below(bounds.max.z),
        );
        assert_eq!(address_of(&just_below), Some(address));
    }

    #[test]
    fn negative_addresses_use_floor_division() {
        let point = Point3::new(ORIGIN.x - 0.5, ORIGIN.y - 1280.0, ORIGIN.z - 1280.5);
        assert_eq!(address_of(&point), Some(GridAddress::new(-1, -1, -2)));
        assert_contained(point);
    }

    #[test]
    fn containment_holds_around_cell_edges() {
        for index in [-3, -1, 0, 1, 17, 39, 127] {
            let edge = axis_origin(index, ORIGIN.x);
            for value in [
                edge,
                ulp_below(edge),
                ulp_above(edge),
                edge - 1e-9,
                edge + 1e-9,
                edge + HALF_CELL,
            ] {
                assert_contained(Point3::new(value, value, value));
            }
        }
    }

    #[test]
    fn containment_holds_across_a_sweep() {
        let mut value = -70_000.0;
        while value < 70_000.0 {
            assert_contained(Point3::new(value, -value / 3.0, value * 0.7));
            value += 97.131;
        }
    }

    #[test]
    fn non_finite_points_have_no_address() {
        assert_eq!(address_of(&Point3::new(f64::NAN, 0.0, 0.0)), None);
        assert_eq!(address_of(&Point3::new(0.0, f64::INFINITY, 0.0)), None);
        assert_eq!(address_of(&Point3::new(0.0, 0.0, 1e300)), None);
    }

    #[test]
    fn address_serializes_as_triple() {
        let json = serde_json::to_string(&GridAddress::new(-1, 2, 3)).unwrap();
        assert_eq!(json, "[-1,2,3]");
        let parsed: GridAddress = serde_json::from_str("[4,5,6]").unwrap();
        assert_eq!(parsed, GridAddress::new(4, 5, 6));
    }
}
