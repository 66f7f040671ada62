//! The fabric: tiles, per-width routing graphs and the finalize lifecycle.
//!
//! An [`Interconnect`] is built in one pass from an [`InterconnectSpec`] and
//! may then be extended with [`Interconnect::add_edge`]. [`finalize`] checks
//! the topology, lifts dangling terminals to the interface, assigns
//! configuration addresses and freezes the graph. Everything downstream
//! (bitstream lookup, global wiring, export, the functional model) requires a
//! finalized interconnect.
//!
//! [`finalize`]: Interconnect::finalize

use crate::bitstream::{AddressTable, BitstreamConfig};
use crate::cores::CoreCache;
use crate::global::GlobalNetwork;
use crate::graph::LayerGraph;
use crate::node::{Node, NodeRef};
use crate::pnr::{self, PnrArtifacts};
use crate::spec::InterconnectSpec;
use crate::tile::Tile;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};
use weft_common::{Coord, NodeId, PortDirection, SbIo, WeftError, WeftResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Building,
    Finalized,
    Poisoned,
}

/// A node exposed on the fabric boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiftedPort {
    /// Canonical name.
    pub name: String,
    /// The exposed node. For a registered output this is the register mux.
    pub node: NodeRef,
    /// `Input` when the outside world drives the node.
    pub direction: PortDirection,
}

/// Size summary of a fabric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FabricStats {
    /// Grid columns.
    pub width: u32,
    /// Grid rows.
    pub height: u32,
    /// Node count per layer width.
    pub nodes: BTreeMap<u32, usize>,
    /// Edge count per layer width.
    pub edges: BTreeMap<u32, usize>,
    /// Number of configuration registers.
    pub selection_points: usize,
    /// Number of interface ports.
    pub lifted_ports: usize,
    /// Largest fan-out of the global network, if one is attached.
    pub global_max_fanout: Option<usize>,
    /// Depth of the global network, if one is attached.
    pub global_depth: Option<usize>,
}

/// A routing fabric.
#[derive(Debug)]
pub struct Interconnect {
    spec: InterconnectSpec,
    tiles: BTreeMap<Coord, Tile>,
    layers: BTreeMap<u32, LayerGraph>,
    stage: Stage,
    interface: BTreeMap<String, LiftedPort>,
    address_table: Option<AddressTable>,
    global: Option<GlobalNetwork>,
}

impl Interconnect {
    /// Builds a fabric from its description.
    ///
    /// One tile is created per coordinate, bound to the core `cores` holds
    /// for it. Each layer's switchboxes are stitched to their neighbours one
    /// track length away, then the requested pipeline registers are inserted.
    pub fn build(spec: &InterconnectSpec, cores: &CoreCache) -> WeftResult<Self> {
        spec.validate()?;
        let sb_spec = spec.switchbox_spec();

        let mut layers: BTreeMap<u32, LayerGraph> = spec
            .bit_widths
            .iter()
            .map(|&width| (width, LayerGraph::new(width)))
            .collect();

        let mut tiles = BTreeMap::new();
        for x in 0..spec.width {
            for y in 0..spec.height {
                let coord = Coord::new(x, y);
                let mut tile = Tile::new(coord, cores.get(coord));
                for graph in layers.values_mut() {
                    tile.add_layer(graph, &sb_spec, &spec.connections)?;
                }
                tiles.insert(coord, tile);
            }
        }

        for (&width, graph) in layers.iter_mut() {
            let mut stitched = 0usize;
            for (&coord, tile) in &tiles {
                let Some(layer) = tile.layer(width) else {
                    continue;
                };
                for &side in layer.switchbox.sides() {
                    for track in 0..layer.switchbox.num_tracks() {
                        let Some(length) = spec.track_length(track) else {
                            continue;
                        };
                        let Some(next) = coord.step(side, length, spec.width, spec.height) else {
                            continue;
                        };
                        let src = layer.switchbox.get_sb(side, track, SbIo::Out);
                        let dst = tiles
                            .get(&next)
                            .and_then(|t| t.layer(width))
                            .and_then(|l| l.switchbox.get_sb(side.opposite(), track, SbIo::In));
                        if let (Some(src), Some(dst)) = (src, dst) {
                            graph.add_edge(src, dst)?;
                            stitched += 1;
                        }
                    }
                }
            }
            debug!(width, stitched, "layer stitched");
        }

        for tile in tiles.values_mut() {
            for (&width, graph) in layers.iter_mut() {
                let Some(layer) = tile.layer_mut(width) else {
                    continue;
                };
                for &(track, side) in &spec.pipeline_registers {
                    layer.switchbox.add_pipeline_register(graph, side, track)?;
                }
            }
        }

        info!(
            width = spec.width,
            height = spec.height,
            layers = layers.len(),
            tracks = spec.num_tracks(),
            "interconnect built"
        );
        Ok(Self {
            spec: spec.clone(),
            tiles,
            layers,
            stage: Stage::Building,
            interface: BTreeMap::new(),
            address_table: None,
            global: None,
        })
    }

    /// Adds an edge between two existing nodes of the same width.
    pub fn add_edge(&mut self, src: NodeRef, dst: NodeRef) -> WeftResult<()> {
        if self.stage != Stage::Building {
            return Err(WeftError::state("topology is frozen after finalize"));
        }
        if src.width != dst.width {
            return Err(WeftError::config(format!(
                "cannot connect a {}-bit node to a {}-bit node",
                src.width, dst.width
            )));
        }
        let graph = self
            .layers
            .get_mut(&src.width)
            .ok_or_else(|| WeftError::lookup(format!("no {}-bit layer", src.width)))?;
        graph.add_edge(src.id, dst.id)
    }

    /// Checks the topology, lifts ports, assigns addresses and freezes.
    ///
    /// Calling it again after success does nothing. A failure leaves the
    /// interconnect unusable.
    pub fn finalize(&mut self) -> WeftResult<()> {
        match self.stage {
            Stage::Finalized => return Ok(()),
            Stage::Poisoned => {
                return Err(WeftError::state("interconnect was poisoned by a failed finalize"))
            }
            Stage::Building => {}
        }
        match self.check_and_address() {
            Ok((interface, table)) => {
                info!(
                    lifted = interface.len(),
                    selection_points = table.len(),
                    "interconnect finalized"
                );
                self.interface = interface;
                self.address_table = Some(table);
                self.stage = Stage::Finalized;
                Ok(())
            }
            Err(err) => {
                warn!(%err, "finalize failed");
                self.stage = Stage::Poisoned;
                Err(err)
            }
        }
    }

    fn check_and_address(&self) -> WeftResult<(BTreeMap<String, LiftedPort>, AddressTable)> {
        for &width in self.layers.keys() {
            if !self.tiles.values().any(|t| t.layer(width).is_some()) {
                return Err(WeftError::topology(format!("layer {width} has no tiles")));
            }
        }
        for tile in self.tiles.values() {
            if let Some(core) = tile.core() {
                let missing = core
                    .ports()
                    .into_iter()
                    .find(|p| !self.layers.contains_key(&p.width));
                if let Some(port) = missing {
                    return Err(WeftError::topology(format!(
                        "core {} at {} declares {}-bit port {} but there is no such layer",
                        core.name(),
                        tile.coord(),
                        port.width,
                        port.name
                    )));
                }
            }
            for layer in tile.layers() {
                let graph = &self.layers[&layer.width];
                let muxes = layer
                    .switchbox
                    .terminals()
                    .filter(|((_, _, io), _)| *io == SbIo::Out)
                    .map(|(_, id)| id)
                    .chain(layer.switchbox.registers().map(|(_, pipe)| pipe.mux));
                for id in muxes {
                    let node = graph.node(id);
                    if node.fan_in.is_empty() {
                        return Err(WeftError::topology(format!(
                            "{} has no candidate drivers",
                            node.canonical_name()
                        )));
                    }
                }
            }
            tile.check_coordinates(&self.layers)?;
        }

        let dangling = self.dangling_ports();
        let mut interface = BTreeMap::new();
        if self.spec.lift_ports {
            for port in dangling {
                if interface.contains_key(&port.name) {
                    return Err(WeftError::topology(format!(
                        "duplicate interface port {}",
                        port.name
                    )));
                }
                interface.insert(port.name.clone(), port);
            }
        } else if !dangling.is_empty() {
            warn!(count = dangling.len(), "dangling terminals left unlifted");
        }

        let table = AddressTable::build(&self.tiles, &self.layers, &self.spec.bus)?;
        Ok((interface, table))
    }

    /// Switchbox terminals with no neighbouring tile on their outer side, and
    /// core ports with nothing connected.
    fn dangling_ports(&self) -> Vec<LiftedPort> {
        let mut found = Vec::new();
        for tile in self.tiles.values() {
            for layer in tile.layers() {
                let width = layer.width;
                let graph = &self.layers[&width];
                let coord = tile.coord();
                let remote =
                    |peers: &[NodeId]| peers.iter().any(|&p| graph.node(p).coord != coord);
                for ((side, track, io), id) in layer.switchbox.terminals() {
                    let node = graph.node(id);
                    match io {
                        SbIo::In if !remote(&node.fan_in) => found.push(LiftedPort {
                            name: node.canonical_name(),
                            node: NodeRef::new(width, id),
                            direction: PortDirection::Input,
                        }),
                        SbIo::Out => {
                            let Some(external) = layer.switchbox.external_out(side, track) else {
                                continue;
                            };
                            // core inputs reading SB_OUT do not make it internal
                            if !remote(&graph.node(external).fan_out) {
                                found.push(LiftedPort {
                                    name: node.canonical_name(),
                                    node: NodeRef::new(width, external),
                                    direction: PortDirection::Output,
                                });
                            }
                        }
                        SbIo::In => {}
                    }
                }
                for port in layer.ports.values() {
                    let node = graph.node(port.node);
                    let open = match port.direction {
                        PortDirection::Input => node.fan_in.is_empty(),
                        PortDirection::Output => node.fan_out.is_empty(),
                    };
                    if open {
                        found.push(LiftedPort {
                            name: node.canonical_name(),
                            node: NodeRef::new(width, port.node),
                            direction: port.direction,
                        });
                    }
                }
            }
        }
        found
    }

    /// Returns `true` once finalize has succeeded.
    pub fn is_finalized(&self) -> bool {
        self.stage == Stage::Finalized
    }

    pub(crate) fn ensure_finalized(&self) -> WeftResult<()> {
        match self.stage {
            Stage::Finalized => Ok(()),
            Stage::Building => Err(WeftError::state("interconnect is not finalized")),
            Stage::Poisoned => Err(WeftError::state(
                "interconnect was poisoned by a failed finalize",
            )),
        }
    }

    pub(crate) fn ensure_not_poisoned(&self) -> WeftResult<()> {
        if self.stage == Stage::Poisoned {
            return Err(WeftError::state("interconnect was poisoned by a failed finalize"));
        }
        Ok(())
    }

    /// The description this fabric was built from.
    pub fn spec(&self) -> &InterconnectSpec {
        &self.spec
    }

    /// Returns the tile at a coordinate.
    pub fn tile(&self, coord: Coord) -> Option<&Tile> {
        self.tiles.get(&coord)
    }

    /// All tiles by coordinate.
    pub fn tiles(&self) -> &BTreeMap<Coord, Tile> {
        &self.tiles
    }

    /// Returns the routing graph of one layer.
    pub fn layer(&self, width: u32) -> Option<&LayerGraph> {
        self.layers.get(&width)
    }

    /// All routing graphs by width.
    pub fn layer_graphs(&self) -> &BTreeMap<u32, LayerGraph> {
        &self.layers
    }

    /// Resolves a node reference.
    pub fn node(&self, node: NodeRef) -> WeftResult<&Node> {
        self.layers
            .get(&node.width)
            .ok_or_else(|| WeftError::lookup(format!("no {}-bit layer", node.width)))?
            .try_node(node.id)
    }

    /// Lifted ports by canonical name. Empty until finalized.
    pub fn interface(&self) -> &BTreeMap<String, LiftedPort> {
        &self.interface
    }

    /// The address table installed by finalize.
    pub fn address_table(&self) -> WeftResult<&AddressTable> {
        self.ensure_finalized()?;
        self.address_table
            .as_ref()
            .ok_or_else(|| WeftError::state("interconnect is not finalized"))
    }

    /// Returns the register and selector value that make `pre` drive `next`.
    pub fn get_node_bitstream_config(
        &self,
        pre: NodeRef,
        next: NodeRef,
    ) -> WeftResult<BitstreamConfig> {
        let table = self.address_table()?;
        let graph = self
            .layers
            .get(&next.width)
            .ok_or_else(|| WeftError::lookup(format!("no {}-bit layer", next.width)))?;
        table.lookup(graph, pre, next)
    }

    /// The attached global network, if any.
    pub fn global_network(&self) -> Option<&GlobalNetwork> {
        self.global.as_ref()
    }

    pub(crate) fn attach_global(&mut self, network: GlobalNetwork) -> WeftResult<()> {
        self.ensure_finalized()?;
        if self.global.is_some() {
            return Err(WeftError::state("global wiring has already been applied"));
        }
        self.global = Some(network);
        Ok(())
    }

    /// Writes the place-and-route files into `dir`.
    pub fn dump_pnr(&self, dir: impl AsRef<Path>, design: &str) -> WeftResult<PnrArtifacts> {
        pnr::dump_pnr(self, dir.as_ref(), design)
    }

    /// Summarizes the fabric size.
    pub fn stats(&self) -> FabricStats {
        FabricStats {
            width: self.spec.width,
            height: self.spec.height,
            nodes: self.layers.iter().map(|(w, g)| (*w, g.node_count())).collect(),
            edges: self.layers.iter().map(|(w, g)| (*w, g.edge_count())).collect(),
            selection_points: self.address_table.as_ref().map_or(0, AddressTable::len),
            lifted_ports: self.interface.len(),
            global_max_fanout: self.global.as_ref().map(GlobalNetwork::max_fanout),
            global_depth: self.global.as_ref().map(GlobalNetwork::depth),
        }
    }
}
