//! Per-width routing graphs.
//!
//! Every data-width layer of the fabric is an independent [`LayerGraph`]:
//! nodes never connect across widths. Nodes are stored in an arena and indexed
//! by their [`NodeKey`], which makes identity unique within the layer and gives
//! a canonical per-tile iteration order.

use crate::node::{Node, NodeKey, NodeKind};
use serde::Serialize;
use std::collections::BTreeMap;
use weft_common::{Arena, Coord, NodeId, SbIo, Side, WeftError, WeftResult};

/// One directed edge, as reported by [`LayerGraph::edges`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Edge {
    /// Driving node.
    pub src: NodeId,
    /// Driven node.
    pub dst: NodeId,
    /// Position of `src` in the fan-in of `dst`, i.e. its selector index.
    pub index: u32,
    /// `true` when `dst` has more than one candidate driver.
    pub configurable: bool,
}

/// The routing graph of one data-width layer.
#[derive(Debug, Clone)]
pub struct LayerGraph {
    width: u32,
    nodes: Arena<NodeId, Node>,
    index: BTreeMap<NodeKey, NodeId>,
}

impl LayerGraph {
    /// Creates an empty layer of the given bit-width.
    pub fn new(width: u32) -> Self {
        Self {
            width,
            nodes: Arena::new(),
            index: BTreeMap::new(),
        }
    }

    /// Returns the bit-width shared by every node in this layer.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Allocates a node. Fails if a node with the same identity exists.
    pub fn add_node(&mut self, coord: Coord, kind: NodeKind) -> WeftResult<NodeId> {
        let node = Node::new(coord, self.width, kind);
        let key = node.key();
        if self.index.contains_key(&key) {
            return Err(WeftError::config(format!(
                "duplicate node {} in layer {}",
                node.canonical_name(),
                self.width
            )));
        }
        let id = self.nodes.alloc(node);
        self.index.insert(key, id);
        Ok(id)
    }

    /// Appends `src` to the fan-in of `dst`.
    ///
    /// Adding an edge that already exists is a no-op, so the selector index of
    /// an existing candidate never changes.
    pub fn add_edge(&mut self, src: NodeId, dst: NodeId) -> WeftResult<()> {
        self.try_node(src)?;
        self.try_node(dst)?;
        if self.nodes[dst].fan_in.contains(&src) {
            return Ok(());
        }
        self.nodes[dst].fan_in.push(src);
        self.nodes[src].fan_out.push(dst);
        Ok(())
    }

    /// Moves every outgoing edge of `from` so that it leaves `to` instead.
    ///
    /// The receivers keep `to` at the position `from` held in their fan-in, so
    /// existing selector indices are preserved.
    pub fn move_fan_out(&mut self, from: NodeId, to: NodeId) -> WeftResult<()> {
        self.try_node(from)?;
        self.try_node(to)?;
        let receivers = std::mem::take(&mut self.nodes[from].fan_out);
        for dst in receivers {
            for driver in self.nodes[dst].fan_in.iter_mut() {
                if *driver == from {
                    *driver = to;
                }
            }
            if !self.nodes[to].fan_out.contains(&dst) {
                self.nodes[to].fan_out.push(dst);
            }
        }
        Ok(())
    }

    /// Returns the node behind a handle from this layer.
    ///
    /// # Panics
    ///
    /// Panics if the handle was not produced by this layer.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// Returns the node, or a lookup error for a foreign handle.
    pub fn try_node(&self, id: NodeId) -> WeftResult<&Node> {
        self.nodes.try_get(id).ok_or_else(|| {
            WeftError::lookup(format!("node {id} does not exist in layer {}", self.width))
        })
    }

    /// Finds a node by identity.
    pub fn locate(&self, key: &NodeKey) -> Option<NodeId> {
        self.index.get(key).copied()
    }

    /// Finds a switchbox terminal.
    pub fn locate_sb(&self, coord: Coord, side: Side, track: u32, io: SbIo) -> Option<NodeId> {
        self.locate(&NodeKey {
            coord,
            kind: NodeKind::SwitchBox { side, track, io },
        })
    }

    /// Iterates the nodes of one tile in canonical order: switchbox terminals
    /// by (side, track, io), then registers, then register muxes, then ports
    /// by name.
    pub fn nodes_at(&self, coord: Coord) -> impl Iterator<Item = NodeId> + '_ {
        let start = NodeKey {
            coord,
            kind: NodeKind::SwitchBox {
                side: Side::North,
                track: 0,
                io: SbIo::In,
            },
        };
        self.index
            .range(start..)
            .take_while(move |(key, _)| key.coord == coord)
            .map(|(_, id)| *id)
    }

    /// Iterates `(id, node)` pairs in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter()
    }

    /// Iterates every edge, grouped by destination in allocation order and in
    /// candidate order within each destination.
    pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
        self.nodes.iter().flat_map(|(dst, node)| {
            let configurable = node.is_selection_point();
            node.fan_in
                .iter()
                .enumerate()
                .map(move |(index, src)| Edge {
                    src: *src,
                    dst,
                    index: index as u32,
                    configurable,
                })
        })
    }

    /// Returns the number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the number of edges.
    pub fn edge_count(&self) -> usize {
        self.nodes.values().map(|n| n.fan_in.len()).sum()
    }
}
