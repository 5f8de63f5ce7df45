// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Spatial addressing for the star-system catalogue.
//!
//! The crate exposes:
//! - [`decode`]: unpacks a 64-bit system identifier into its [`GridAddress`] and [`SizeClass`].
//! - [`grid`]: the fixed 1280-unit sector grid, mapping addresses to world-space [`Bounds`] and
//!   world-space points back to addresses.

pub mod error;
pub mod grid;
pub mod id64;

pub use error::DecodeError;
pub use grid::{
    Bounds, CELL_SIZE, GridAddress, HALF_CELL, ORIGIN, Point3, address_of, bounds_of, origin_of,
};
pub use id64::{BitRange, Decoded, FieldLayout, SizeClass, decode};
