//! Configuration addressing and the configuration register file.
//!
//! Every node with more than one candidate driver is a selection point and
//! owns one configuration register. Slots are handed out per tile, walking
//! layers in ascending width and each layer's nodes in canonical order, so an
//! address depends only on topology:
//!
//! ```text
//! address = (slot << tile_id_width) | ((x << tile_id_width / 2) | y)
//! ```

use crate::graph::LayerGraph;
use crate::interconnect::Interconnect;
use crate::node::NodeRef;
use crate::spec::BusSpec;
use crate::tile::Tile;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::trace;
use weft_common::{Coord, WeftError, WeftResult};

/// Register address and selector value programming one edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BitstreamConfig {
    /// Configuration address of the destination's register.
    pub address: u32,
    /// Selector value choosing the source.
    pub index: u32,
}

/// A node with its own configuration register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionPoint {
    /// The mux node.
    pub node: NodeRef,
    /// Its configuration address.
    pub address: u32,
    /// Selector width in bits.
    pub sel_width: u32,
    /// Number of candidate drivers.
    pub fan_in: u32,
}

/// Bits needed to select one of `fan_in` candidates.
pub fn selector_width(fan_in: u32) -> u32 {
    if fan_in <= 1 {
        0
    } else {
        u32::BITS - (fan_in - 1).leading_zeros()
    }
}

/// Selection points and their addresses.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AddressTable {
    points: BTreeMap<NodeRef, SelectionPoint>,
    by_address: BTreeMap<u32, NodeRef>,
}

impl AddressTable {
    /// Runs the addressing pass over a built interconnect.
    ///
    /// The result is identical to the table installed by finalize; this is
    /// the entry point for checking that addressing is deterministic.
    pub fn assign(ic: &Interconnect) -> WeftResult<Self> {
        ic.ensure_not_poisoned()?;
        Self::build(ic.tiles(), ic.layer_graphs(), &ic.spec().bus)
    }

    pub(crate) fn build(
        tiles: &BTreeMap<Coord, Tile>,
        layers: &BTreeMap<u32, LayerGraph>,
        bus: &BusSpec,
    ) -> WeftResult<Self> {
        let mut table = Self::default();
        for &coord in tiles.keys() {
            let tile_id = bus.tile_id(coord);
            let mut slot: u64 = 0;
            for (&width, graph) in layers {
                for id in graph.nodes_at(coord) {
                    let node = graph.node(id);
                    if !node.is_selection_point() {
                        continue;
                    }
                    if slot >= bus.max_slots() {
                        return Err(WeftError::topology(format!(
                            "tile {coord} needs more than {} configuration registers",
                            bus.max_slots()
                        )));
                    }
                    let fan_in = node.fan_in.len() as u32;
                    let sel_width = selector_width(fan_in);
                    if sel_width > bus.data_width {
                        return Err(WeftError::topology(format!(
                            "{} needs a {sel_width}-bit selector but data_width is {}",
                            node.canonical_name(),
                            bus.data_width
                        )));
                    }
                    let address = ((slot as u32) << bus.tile_id_width) | tile_id;
                    let node_ref = NodeRef::new(width, id);
                    table.points.insert(
                        node_ref,
                        SelectionPoint {
                            node: node_ref,
                            address,
                            sel_width,
                            fan_in,
                        },
                    );
                    table.by_address.insert(address, node_ref);
                    slot += 1;
                }
            }
        }
        Ok(table)
    }

    /// Returns the selection point of a node, if it is one.
    pub fn get(&self, node: NodeRef) -> Option<&SelectionPoint> {
        self.points.get(&node)
    }

    /// Returns the node owning an address.
    pub fn node_at(&self, address: u32) -> Option<NodeRef> {
        self.by_address.get(&address).copied()
    }

    /// Finds the register and selector value for the edge `pre -> next`.
    pub fn lookup(
        &self,
        graph: &LayerGraph,
        pre: NodeRef,
        next: NodeRef,
    ) -> WeftResult<BitstreamConfig> {
        if pre.width != next.width || pre.width != graph.width() {
            return Err(WeftError::lookup(format!(
                "no edge {pre} -> {next} in the {}-bit layer",
                graph.width()
            )));
        }
        let dst = graph.try_node(next.id)?;
        let index = dst
            .fan_in
            .iter()
            .position(|src| *src == pre.id)
            .ok_or_else(|| WeftError::lookup(format!("no edge {pre} -> {next}")))?;
        let point = self.get(next).ok_or_else(|| {
            WeftError::lookup(format!(
                "{} has a single driver and no configuration register",
                dst.canonical_name()
            ))
        })?;
        Ok(BitstreamConfig {
            address: point.address,
            index: index as u32,
        })
    }

    /// Iterates selection points in address order.
    pub fn iter(&self) -> impl Iterator<Item = &SelectionPoint> {
        self.by_address.values().filter_map(|node| self.points.get(node))
    }

    /// Number of selection points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns `true` if the fabric has no configurable mux.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// The configuration registers of a fabric, with the read-back path.
#[derive(Debug, Clone)]
pub struct ConfigRegisterFile {
    sel_widths: BTreeMap<u32, u32>,
    values: BTreeMap<u32, u32>,
    read_address: Option<u32>,
    read_data: u32,
}

impl ConfigRegisterFile {
    /// Creates a register per selection point, all cleared.
    pub fn new(table: &AddressTable) -> Self {
        Self {
            sel_widths: table.iter().map(|p| (p.address, p.sel_width)).collect(),
            values: BTreeMap::new(),
            read_address: None,
            read_data: 0,
        }
    }

    /// Writes a register.
    ///
    /// With `set == false` the write is masked: the address is still checked
    /// but no register changes.
    pub fn configure(&mut self, address: u32, value: u32, set: bool) -> WeftResult<()> {
        let sel_width = self.sel_width(address)?;
        if !set {
            trace!(address = format_args!("{address:#x}"), value, "masked config write");
            return Ok(());
        }
        if u64::from(value) >> sel_width != 0 {
            return Err(WeftError::config(format!(
                "value {value} does not fit the {sel_width}-bit register at {address:#x}"
            )));
        }
        self.values.insert(address, value);
        Ok(())
    }

    /// Selects a register for read-back; takes effect on the next
    /// [`eval`](Self::eval).
    pub fn config_read(&mut self, address: u32) -> WeftResult<()> {
        self.sel_width(address)?;
        self.read_address = Some(address);
        Ok(())
    }

    /// Updates the read-back output.
    pub fn eval(&mut self) {
        self.read_data = self.read_address.map_or(0, |address| self.value(address));
    }

    /// The read-back output.
    pub fn read_config_data(&self) -> u32 {
        self.read_data
    }

    /// Current value of a register; unknown addresses read as 0.
    pub fn value(&self, address: u32) -> u32 {
        self.values.get(&address).copied().unwrap_or(0)
    }

    /// Clears every register and the read-back path.
    pub fn reset(&mut self) {
        self.values.clear();
        self.read_address = None;
        self.read_data = 0;
    }

    fn sel_width(&self, address: u32) -> WeftResult<u32> {
        self.sel_widths
            .get(&address)
            .copied()
            .ok_or_else(|| WeftError::lookup(format!("no configuration register at {address:#x}")))
    }
}
