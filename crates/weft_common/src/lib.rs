//! Shared foundational types used across the Weft CGRA fabric generator.
//!
//! This crate provides dense arena storage with opaque handles, grid geometry
//! (coordinates, switchbox sides and directions), content hashing for
//! topology fingerprints, and the common error type.

#![warn(missing_docs)]

pub mod arena;
pub mod geom;
pub mod hash;
pub mod ids;
pub mod result;

pub use arena::{Arena, ArenaId};
pub use geom::{Coord, PortDirection, SbIo, Side};
pub use hash::ContentHash;
pub use ids::NodeId;
pub use result::{WeftError, WeftResult};
