//! Grid geometry: tile coordinates, switchbox sides and terminal directions.
//!
//! The grid origin is the north-west corner. `x` grows eastward and `y` grows
//! southward, so the northern neighbour of `(x, y)` is `(x, y - 1)`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A tile coordinate in the fabric grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coord {
    /// Column, counted from the west edge.
    pub x: u32,
    /// Row, counted from the north edge.
    pub y: u32,
}

impl Coord {
    /// Creates a coordinate.
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Returns the coordinate `distance` tiles away towards `side`, or `None`
    /// if it falls outside a `width` x `height` grid.
    pub fn step(self, side: Side, distance: u32, width: u32, height: u32) -> Option<Coord> {
        let (x, y) = match side {
            Side::North => (Some(self.x), self.y.checked_sub(distance)),
            Side::South => (Some(self.x), self.y.checked_add(distance)),
            Side::East => (self.x.checked_add(distance), Some(self.y)),
            Side::West => (self.x.checked_sub(distance), Some(self.y)),
        };
        match (x, y) {
            (Some(x), Some(y)) if x < width && y < height => Some(Coord { x, y }),
            _ => None,
        }
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// One of the four sides of a switchbox.
///
/// The derived ordering is the canonical side order used everywhere a
/// deterministic iteration is required: North, East, South, West.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Towards `y - 1`.
    North = 0,
    /// Towards `x + 1`.
    East = 1,
    /// Towards `y + 1`.
    South = 2,
    /// Towards `x - 1`.
    West = 3,
}

impl Side {
    /// All sides in canonical order.
    pub const ALL: [Side; 4] = [Side::North, Side::East, Side::South, Side::West];

    /// Returns the side facing this one across a tile boundary.
    pub fn opposite(self) -> Side {
        match self {
            Side::North => Side::South,
            Side::East => Side::West,
            Side::South => Side::North,
            Side::West => Side::East,
        }
    }

    /// Returns the upper-case name used in canonical node names.
    pub fn name(self) -> &'static str {
        match self {
            Side::North => "NORTH",
            Side::East => "EAST",
            Side::South => "SOUTH",
            Side::West => "WEST",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Direction of a switchbox terminal relative to the switchbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SbIo {
    /// Enters the switchbox from a neighbouring tile.
    In,
    /// Leaves the switchbox towards a neighbouring tile.
    Out,
}

impl SbIo {
    /// Returns the upper-case name used in canonical node names.
    pub fn name(self) -> &'static str {
        match self {
            SbIo::In => "IN",
            SbIo::Out => "OUT",
        }
    }
}

impl fmt::Display for SbIo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Direction of a core port or lifted interface port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    /// Data flows into the owner.
    Input,
    /// Data flows out of the owner.
    Output,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortDirection::Input => f.write_str("input"),
            PortDirection::Output => f.write_str("output"),
        }
    }
}
