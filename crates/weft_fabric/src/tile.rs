//! Tiles: one grid coordinate with its switchboxes and core ports.

use crate::cores::Core;
use crate::graph::LayerGraph;
use crate::node::{NodeKind, NodeRef};
use crate::spec::{PortConnection, SwitchBoxSpec};
use crate::switchbox::SwitchBox;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;
use weft_common::{Coord, NodeId, PortDirection, SbIo, Side, WeftError, WeftResult};

/// A core port instantiated in one layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilePort {
    /// Port node.
    pub node: NodeId,
    /// Direction relative to the core.
    pub direction: PortDirection,
    /// Registered core output.
    pub sequential: bool,
}

/// Everything a tile owns in one data-width layer.
#[derive(Debug, Clone)]
pub struct TileLayer {
    /// Layer width.
    pub width: u32,
    /// The tile's switchbox.
    pub switchbox: SwitchBox,
    /// Core ports of this width, by name.
    pub ports: BTreeMap<String, TilePort>,
}

/// One grid coordinate.
#[derive(Debug, Clone)]
pub struct Tile {
    coord: Coord,
    core: Option<Arc<dyn Core>>,
    layers: BTreeMap<u32, TileLayer>,
}

impl Tile {
    /// Creates a tile with no layers.
    pub fn new(coord: Coord, core: Option<Arc<dyn Core>>) -> Self {
        Self {
            coord,
            core,
            layers: BTreeMap::new(),
        }
    }

    /// Builds this tile's part of `graph`: the switchbox, a node per core
    /// port of the layer's width, and the core connections.
    ///
    /// An input port is driven from every track of each `(side, io)` it is
    /// connected to. An output port drives every `SB_OUT` track of each side
    /// it is connected to; connecting an output to `SB_IN` is an error.
    pub fn add_layer(
        &mut self,
        graph: &mut LayerGraph,
        spec: &SwitchBoxSpec,
        connections: &BTreeMap<String, Vec<PortConnection>>,
    ) -> WeftResult<()> {
        let width = graph.width();
        if self.layers.contains_key(&width) {
            return Err(WeftError::config(format!(
                "tile {} already has a {width}-bit layer",
                self.coord
            )));
        }
        let switchbox = SwitchBox::build(graph, self.coord, spec)?;

        let mut declared = match &self.core {
            Some(core) => core.ports(),
            None => Vec::new(),
        };
        declared.sort_by(|a, b| a.name.cmp(&b.name));
        if let Some(pair) = declared.windows(2).find(|pair| pair[0].name == pair[1].name) {
            return Err(WeftError::config(format!(
                "core at {} declares port {} twice",
                self.coord, pair[0].name
            )));
        }

        let mut ports = BTreeMap::new();
        for port in declared.iter().filter(|p| p.width == width) {
            let node = graph.add_node(
                self.coord,
                NodeKind::Port {
                    name: port.name.clone(),
                },
            )?;
            ports.insert(
                port.name.clone(),
                TilePort {
                    node,
                    direction: port.direction,
                    sequential: port.sequential,
                },
            );
        }

        for (name, port) in &ports {
            let Some(conns) = connections.get(name) else {
                continue;
            };
            for conn in conns {
                for track in 0..switchbox.num_tracks() {
                    // disabled sides have no terminals to connect to
                    let Some(sb) = switchbox.get_sb(conn.side, track, conn.io) else {
                        continue;
                    };
                    match (port.direction, conn.io) {
                        (PortDirection::Input, _) => graph.add_edge(sb, port.node)?,
                        (PortDirection::Output, SbIo::Out) => graph.add_edge(port.node, sb)?,
                        (PortDirection::Output, SbIo::In) => {
                            return Err(WeftError::config(format!(
                                "output port {name} at {} cannot drive SB_IN on side {}",
                                self.coord, conn.side
                            )));
                        }
                    }
                }
            }
        }

        debug!(
            coord = %self.coord,
            width,
            ports = ports.len(),
            "tile layer built"
        );
        self.layers.insert(
            width,
            TileLayer {
                width,
                switchbox,
                ports,
            },
        );
        Ok(())
    }

    /// Returns the tile coordinate.
    pub fn coord(&self) -> Coord {
        self.coord
    }

    /// Returns the bound core.
    pub fn core(&self) -> Option<&Arc<dyn Core>> {
        self.core.as_ref()
    }

    /// Returns the layer of the given width.
    pub fn layer(&self, width: u32) -> Option<&TileLayer> {
        self.layers.get(&width)
    }

    pub(crate) fn layer_mut(&mut self, width: u32) -> Option<&mut TileLayer> {
        self.layers.get_mut(&width)
    }

    /// Iterates layers in ascending width.
    pub fn layers(&self) -> impl Iterator<Item = &TileLayer> {
        self.layers.values()
    }

    /// Returns a switchbox terminal.
    pub fn get_sb(&self, width: u32, side: Side, track: u32, io: SbIo) -> WeftResult<NodeRef> {
        let layer = self.require_layer(width)?;
        layer
            .switchbox
            .get_sb(side, track, io)
            .map(|id| NodeRef::new(width, id))
            .ok_or_else(|| {
                WeftError::lookup(format!(
                    "no terminal T{track} {side} {io} in the {width}-bit layer of tile {}",
                    self.coord
                ))
            })
    }

    /// Returns a core port node.
    pub fn get_port(&self, width: u32, name: &str) -> WeftResult<NodeRef> {
        let layer = self.require_layer(width)?;
        layer
            .ports
            .get(name)
            .map(|port| NodeRef::new(width, port.node))
            .ok_or_else(|| {
                WeftError::lookup(format!(
                    "no port {name} in the {width}-bit layer of tile {}",
                    self.coord
                ))
            })
    }

    /// Verifies every node the tile owns reports the tile's coordinate.
    pub fn check_coordinates(&self, graphs: &BTreeMap<u32, LayerGraph>) -> WeftResult<()> {
        for layer in self.layers.values() {
            let graph = graphs.get(&layer.width).ok_or_else(|| {
                WeftError::topology(format!(
                    "tile {} has an unknown layer {}",
                    self.coord, layer.width
                ))
            })?;
            let owned = layer
                .switchbox
                .terminals()
                .map(|(_, id)| id)
                .chain(
                    layer
                        .switchbox
                        .registers()
                        .flat_map(|(_, pipe)| [pipe.register, pipe.mux]),
                )
                .chain(layer.ports.values().map(|port| port.node));
            for id in owned {
                let node = graph.try_node(id)?;
                if node.coord != self.coord {
                    return Err(WeftError::topology(format!(
                        "node {} belongs to tile {} but reports {}",
                        node.canonical_name(),
                        self.coord,
                        node.coord
                    )));
                }
            }
        }
        Ok(())
    }

    fn require_layer(&self, width: u32) -> WeftResult<&TileLayer> {
        self.layers.get(&width).ok_or_else(|| {
            WeftError::lookup(format!("tile {} has no {width}-bit layer", self.coord))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cores::{CorePort, GenericCore};
    use crate::spec::SwitchBoxType;

    fn pe() -> Arc<dyn Core> {
        Arc::new(GenericCore::new(
            "pe",
            vec![
                CorePort::input("data_in_16b", 16),
                CorePort::output("data_out_16b", 16),
                CorePort::input("bit_in", 1),
            ],
        ))
    }

    fn connections() -> BTreeMap<String, Vec<PortConnection>> {
        let mut conns = BTreeMap::new();
        conns.insert("data_in_16b".to_string(), PortConnection::all_sides(SbIo::In));
        conns.insert("data_out_16b".to_string(), PortConnection::all_sides(SbIo::Out));
        conns
    }

    #[test]
    fn ports_follow_layer_width() {
        let mut graph = LayerGraph::new(16);
        let mut tile = Tile::new(Coord::new(1, 1), Some(pe()));
        tile.add_layer(&mut graph, &SwitchBoxSpec::new(2, SwitchBoxType::Disjoint), &connections())
            .unwrap();

        assert!(tile.get_port(16, "data_in_16b").is_ok());
        assert!(matches!(tile.get_port(16, "bit_in"), Err(WeftError::Lookup(_))));
        assert!(matches!(tile.get_port(1, "bit_in"), Err(WeftError::Lookup(_))));

        let input = tile.get_port(16, "data_in_16b").unwrap();
        assert_eq!(graph.node(input.id).fan_in.len(), 8);
        let output = tile.get_port(16, "data_out_16b").unwrap();
        assert_eq!(graph.node(output.id).fan_out.len(), 8);

        // core output is the last candidate of each SB_OUT
        let north_out = tile.get_sb(16, Side::North, 0, SbIo::Out).unwrap();
        let fan_in = &graph.node(north_out.id).fan_in;
        assert_eq!(fan_in.len(), 4);
        assert_eq!(fan_in[3], output.id);
    }

    #[test]
    fn output_on_sb_in_rejected() {
        let mut graph = LayerGraph::new(16);
        let mut tile = Tile::new(Coord::new(0, 0), Some(pe()));
        let mut conns = BTreeMap::new();
        conns.insert(
            "data_out_16b".to_string(),
            vec![PortConnection::new(Side::North, SbIo::In)],
        );
        let err = tile
            .add_layer(&mut graph, &SwitchBoxSpec::new(1, SwitchBoxType::Disjoint), &conns)
            .unwrap_err();
        assert!(matches!(err, WeftError::Configuration(_)));
    }

    #[test]
    fn input_from_sb_out() {
        let mut graph = LayerGraph::new(16);
        let mut tile = Tile::new(Coord::new(0, 0), Some(pe()));
        let mut conns = BTreeMap::new();
        conns.insert(
            "data_in_16b".to_string(),
            vec![PortConnection::new(Side::East, SbIo::Out)],
        );
        tile.add_layer(&mut graph, &SwitchBoxSpec::new(2, SwitchBoxType::Disjoint), &conns)
            .unwrap();
        let input = tile.get_port(16, "data_in_16b").unwrap();
        let east0 = tile.get_sb(16, Side::East, 0, SbIo::Out).unwrap();
        let east1 = tile.get_sb(16, Side::East, 1, SbIo::Out).unwrap();
        assert_eq!(graph.node(input.id).fan_in, vec![east0.id, east1.id]);
    }

    #[test]
    fn duplicate_layer_rejected() {
        let mut graph = LayerGraph::new(1);
        let mut tile = Tile::new(Coord::new(0, 0), None);
        let spec = SwitchBoxSpec::new(1, SwitchBoxType::Disjoint);
        tile.add_layer(&mut graph, &spec, &BTreeMap::new()).unwrap();
        assert!(tile.add_layer(&mut graph, &spec, &BTreeMap::new()).is_err());
    }

    #[test]
    fn coordinates_are_consistent() {
        let mut graphs = BTreeMap::new();
        let mut tile = Tile::new(Coord::new(2, 3), Some(pe()));
        for width in [1, 16] {
            let mut graph = LayerGraph::new(width);
            let sb_spec = SwitchBoxSpec::new(2, SwitchBoxType::Wilton);
            tile.add_layer(&mut graph, &sb_spec, &connections()).unwrap();
            graphs.insert(width, graph);
        }
        tile.check_coordinates(&graphs).unwrap();
        for layer in tile.layers() {
            let graph = &graphs[&layer.width];
            for (_, id) in layer.switchbox.terminals() {
                assert_eq!(graph.node(id).coord, Coord::new(2, 3));
            }
        }
        assert!(matches!(
            tile.get_sb(8, Side::North, 0, SbIo::In),
            Err(WeftError::Lookup(_))
        ));
    }
}
