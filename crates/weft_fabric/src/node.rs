//! Routing-graph vertices.
//!
//! A [`Node`] is one wire endpoint in a single data-width layer: a switchbox
//! terminal, a pipeline register, the bypass mux behind a register, or a core
//! port. Nodes live in the layer's arena and carry their ordered fan-in and
//! fan-out as handle lists. The position of a driver in the fan-in list is the
//! selector index that programs it.

use serde::{Deserialize, Serialize};
use std::fmt;
use weft_common::{Coord, NodeId, SbIo, Side};

/// What a node represents.
///
/// The derived ordering (variant first, then fields) is the canonical order
/// in which a tile's nodes are visited during address assignment.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// A switchbox terminal on one side and track.
    SwitchBox {
        /// Side of the switchbox.
        side: Side,
        /// Track index on that side.
        track: u32,
        /// Whether the terminal enters or leaves the switchbox.
        io: SbIo,
    },
    /// A pipeline register behind a switchbox output.
    Register {
        /// Side of the registered output.
        side: Side,
        /// Track of the registered output.
        track: u32,
    },
    /// The mux choosing between the registered and bypass value of an output.
    RegisterMux {
        /// Side of the registered output.
        side: Side,
        /// Track of the registered output.
        track: u32,
    },
    /// A declared core port.
    Port {
        /// Port name as declared by the core.
        name: String,
    },
}

impl NodeKind {
    /// Short upper-case prefix used in canonical names.
    pub fn prefix(&self) -> &'static str {
        match self {
            NodeKind::SwitchBox { .. } => "SB",
            NodeKind::Register { .. } => "REG",
            NodeKind::RegisterMux { .. } => "RMUX",
            NodeKind::Port { .. } => "PORT",
        }
    }

    /// Returns the side, if the node belongs to a switchbox side.
    pub fn side(&self) -> Option<Side> {
        match self {
            NodeKind::SwitchBox { side, .. }
            | NodeKind::Register { side, .. }
            | NodeKind::RegisterMux { side, .. } => Some(*side),
            NodeKind::Port { .. } => None,
        }
    }

    /// Returns the track, if the node belongs to a track.
    pub fn track(&self) -> Option<u32> {
        match self {
            NodeKind::SwitchBox { track, .. }
            | NodeKind::Register { track, .. }
            | NodeKind::RegisterMux { track, .. } => Some(*track),
            NodeKind::Port { .. } => None,
        }
    }
}

/// Identity of a node within one layer: coordinate plus kind.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeKey {
    /// Owning tile coordinate.
    pub coord: Coord,
    /// Node kind and its side/track/io/name qualifiers.
    pub kind: NodeKind,
}

/// A node handle that also names its layer.
///
/// [`NodeId`]s are only meaningful inside one layer arena; `NodeRef` is what
/// crosses the API boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeRef {
    /// Bit-width of the layer holding the node.
    pub width: u32,
    /// Handle within that layer.
    pub id: NodeId,
}

impl NodeRef {
    /// Creates a reference to `id` in the `width` layer.
    pub fn new(width: u32, id: NodeId) -> Self {
        Self { width, id }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}b#{}", self.width, self.id)
    }
}

/// A routing-graph vertex.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Owning tile coordinate.
    pub coord: Coord,
    /// Bit-width of the wire.
    pub width: u32,
    /// What the node represents.
    pub kind: NodeKind,
    /// Drivers, in selector-index order.
    pub fan_in: Vec<NodeId>,
    /// Driven nodes, in insertion order.
    pub fan_out: Vec<NodeId>,
}

impl Node {
    /// Creates an unconnected node.
    pub fn new(coord: Coord, width: u32, kind: NodeKind) -> Self {
        Self {
            coord,
            width,
            kind,
            fan_in: Vec::new(),
            fan_out: Vec::new(),
        }
    }

    /// Returns the node's identity key.
    pub fn key(&self) -> NodeKey {
        NodeKey {
            coord: self.coord,
            kind: self.kind.clone(),
        }
    }

    /// Returns `true` if more than one candidate drives this node, i.e. it
    /// needs a configuration register.
    pub fn is_selection_point(&self) -> bool {
        self.fan_in.len() > 1
    }

    /// Returns the canonical interface name, e.g. `SB_T0_NORTH_IN_B16_X0_Y1`.
    pub fn canonical_name(&self) -> String {
        let body = match &self.kind {
            NodeKind::SwitchBox { side, track, io } => format!("SB_T{track}_{side}_{io}"),
            NodeKind::Register { side, track } => format!("REG_T{track}_{side}"),
            NodeKind::RegisterMux { side, track } => format!("RMUX_T{track}_{side}"),
            NodeKind::Port { name } => format!("PORT_{name}"),
        };
        format!(
            "{body}_B{}_X{}_Y{}",
            self.width, self.coord.x, self.coord.y
        )
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Coord { x, y } = self.coord;
        match &self.kind {
            NodeKind::SwitchBox { side, track, io } => {
                write!(f, "SB ({track}, {x}, {y}, {side}, {io}, {})", self.width)
            }
            NodeKind::Register { side, track } => {
                write!(f, "REG T{track}_{side} ({track}, {x}, {y}, {})", self.width)
            }
            NodeKind::RegisterMux { side, track } => {
                write!(f, "RMUX {side} ({track}, {x}, {y}, {})", self.width)
            }
            NodeKind::Port { name } => write!(f, "PORT {name} ({x}, {y}, {})", self.width),
        }
    }
}
