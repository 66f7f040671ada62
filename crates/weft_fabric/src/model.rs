//! Functional model of a configured fabric.
//!
//! The model evaluates a finalized [`Interconnect`] under its current
//! configuration. Every mux forwards the candidate its register selects,
//! pipeline registers and registered core outputs update on
//! [`clock`](InterconnectModel::clock), and combinational core outputs come
//! from [`Core::eval_model`](crate::cores::Core::eval_model). Values are masked
//! to the width of the layer they travel in.

use crate::bitstream::{AddressTable, ConfigRegisterFile};
use crate::interconnect::Interconnect;
use crate::node::{NodeKind, NodeRef};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::BTreeMap;
use tracing::{debug, trace};
use weft_common::{Coord, PortDirection, WeftError, WeftResult};

#[derive(Debug, Clone)]
struct CorePortInfo {
    coord: Coord,
    name: String,
    direction: PortDirection,
    sequential: bool,
}

enum Drive {
    External,
    From(NodeRef),
    Floating,
}

fn mask(value: u64, width: u32) -> u64 {
    if width >= 64 {
        value
    } else {
        value & ((1u64 << width) - 1)
    }
}

/// Cycle-level evaluator over a finalized fabric.
#[derive(Debug)]
pub struct InterconnectModel<'a> {
    ic: &'a Interconnect,
    table: &'a AddressTable,
    config: ConfigRegisterFile,
    ports: BTreeMap<NodeRef, CorePortInfo>,
    tile_inputs: BTreeMap<Coord, Vec<NodeRef>>,
    inputs: BTreeMap<NodeRef, u64>,
    values: BTreeMap<NodeRef, u64>,
    state: BTreeMap<NodeRef, u64>,
    read_coord: Option<Coord>,
    read_data: u32,
}

impl<'a> InterconnectModel<'a> {
    /// Creates a model with every register cleared.
    pub fn new(ic: &'a Interconnect) -> WeftResult<Self> {
        let table = ic.address_table()?;
        let mut ports = BTreeMap::new();
        let mut tile_inputs: BTreeMap<Coord, Vec<NodeRef>> = BTreeMap::new();
        for (&coord, tile) in ic.tiles() {
            for layer in tile.layers() {
                for (name, port) in &layer.ports {
                    let node = NodeRef::new(layer.width, port.node);
                    if port.direction == PortDirection::Input {
                        tile_inputs.entry(coord).or_default().push(node);
                    }
                    ports.insert(
                        node,
                        CorePortInfo {
                            coord,
                            name: name.clone(),
                            direction: port.direction,
                            sequential: port.sequential,
                        },
                    );
                }
            }
        }
        Ok(Self {
            ic,
            table,
            config: ConfigRegisterFile::new(table),
            ports,
            tile_inputs,
            inputs: BTreeMap::new(),
            values: BTreeMap::new(),
            state: BTreeMap::new(),
            read_coord: None,
            read_data: 0,
        })
    }

    /// Writes a configuration register; see [`ConfigRegisterFile::configure`].
    pub fn configure(&mut self, address: u32, value: u32, set: bool) -> WeftResult<()> {
        self.config.configure(address, value, set)
    }

    /// Selects a register for read-back on the next [`eval`](Self::eval).
    pub fn config_read(&mut self, address: u32) -> WeftResult<()> {
        self.config.config_read(address)?;
        let owner = self
            .table
            .node_at(address)
            .ok_or_else(|| {
                WeftError::lookup(format!("no configuration register at {address:#x}"))
            })?;
        self.read_coord = Some(self.ic.node(owner)?.coord);
        Ok(())
    }

    /// The read-back output as of the last [`eval`](Self::eval).
    pub fn read_config_data(&self) -> u32 {
        self.read_data
    }

    /// The configuration registers.
    pub fn config(&self) -> &ConfigRegisterFile {
        &self.config
    }

    /// Programs every mux along a route so each node drives the next.
    ///
    /// Consecutive nodes must be connected by an edge; hops into nodes with a
    /// single driver need no configuration and are skipped.
    pub fn configure_route(&mut self, route: &[NodeRef]) -> WeftResult<()> {
        for hop in route.windows(2) {
            let (pre, next) = (hop[0], hop[1]);
            let node = self.ic.node(next)?;
            if pre.width != next.width || !node.fan_in.contains(&pre.id) {
                return Err(WeftError::lookup(format!("no edge {pre} -> {next}")));
            }
            if node.is_selection_point() {
                let cfg = self.ic.get_node_bitstream_config(pre, next)?;
                self.config.configure(cfg.address, cfg.index, true)?;
            }
        }
        debug!(hops = route.len().saturating_sub(1), "route configured");
        Ok(())
    }

    /// Drives an interface input.
    pub fn poke(&mut self, name: &str, value: u64) -> WeftResult<()> {
        let port = self
            .ic
            .interface()
            .get(name)
            .filter(|port| port.direction == PortDirection::Input)
            .ok_or_else(|| WeftError::lookup(format!("no input port {name}")))?;
        self.inputs.insert(port.node, mask(value, port.node.width));
        Ok(())
    }

    /// Reads an interface port as of the last [`eval`](Self::eval).
    pub fn peek(&self, name: &str) -> WeftResult<u64> {
        let port = self
            .ic
            .interface()
            .get(name)
            .ok_or_else(|| WeftError::lookup(format!("no port {name}")))?;
        Ok(self.value(port.node))
    }

    /// Reads any node as of the last [`eval`](Self::eval).
    pub fn value(&self, node: NodeRef) -> u64 {
        self.values.get(&node).copied().unwrap_or(0)
    }

    fn drive(&self, node: NodeRef) -> WeftResult<Drive> {
        let n = self.ic.node(node)?;
        Ok(match n.fan_in.len() {
            0 => Drive::External,
            1 => Drive::From(NodeRef::new(node.width, n.fan_in[0])),
            _ => {
                let point = self.table.get(node).ok_or_else(|| {
                    WeftError::state(format!(
                        "{} has no configuration register",
                        n.canonical_name()
                    ))
                })?;
                let sel = self.config.value(point.address) as usize;
                match n.fan_in.get(sel) {
                    Some(id) => Drive::From(NodeRef::new(node.width, *id)),
                    None => Drive::Floating,
                }
            }
        })
    }

    fn is_register(&self, node: NodeRef) -> WeftResult<bool> {
        Ok(matches!(self.ic.node(node)?.kind, NodeKind::Register { .. }))
    }

    fn evaluation_order(&self) -> WeftResult<Vec<NodeRef>> {
        let mut graph: DiGraph<NodeRef, ()> = DiGraph::new();
        let mut index: BTreeMap<NodeRef, NodeIndex> = BTreeMap::new();
        for (&width, layer) in self.ic.layer_graphs() {
            for (id, _) in layer.iter() {
                let node = NodeRef::new(width, id);
                index.insert(node, graph.add_node(node));
            }
        }
        for (&node, &to) in &index {
            if self.is_register(node)? {
                continue;
            }
            if let Some(port) = self.ports.get(&node) {
                if port.direction == PortDirection::Output {
                    if !port.sequential {
                        for input in self.tile_inputs.get(&port.coord).into_iter().flatten() {
                            graph.add_edge(index[input], to, ());
                        }
                    }
                    continue;
                }
            }
            if let Drive::From(driver) = self.drive(node)? {
                graph.add_edge(index[&driver], to, ());
            }
        }
        let order = toposort(&graph, None).map_err(|cycle| {
            let node = graph[cycle.node_id()];
            let name = self
                .ic
                .node(node)
                .map(|n| n.canonical_name())
                .unwrap_or_else(|_| node.to_string());
            WeftError::state(format!("combinational loop through {name}"))
        })?;
        Ok(order.into_iter().map(|i| graph[i]).collect())
    }

    fn core_inputs(&self, coord: Coord, values: &BTreeMap<NodeRef, u64>) -> BTreeMap<String, u64> {
        self.tile_inputs
            .get(&coord)
            .into_iter()
            .flatten()
            .filter_map(|node| {
                let port = self.ports.get(node)?;
                Some((port.name.clone(), values.get(node).copied().unwrap_or(0)))
            })
            .collect()
    }

    fn core_outputs(&self, coord: Coord, values: &BTreeMap<NodeRef, u64>) -> BTreeMap<String, u64> {
        match self.ic.tile(coord).and_then(|tile| tile.core()) {
            Some(core) => core.eval_model(&self.core_inputs(coord, values)),
            None => BTreeMap::new(),
        }
    }

    /// Propagates values through the selected drivers and updates the
    /// read-back path.
    pub fn eval(&mut self) -> WeftResult<()> {
        let order = self.evaluation_order()?;
        let mut values = BTreeMap::new();
        let mut outputs: BTreeMap<Coord, BTreeMap<String, u64>> = BTreeMap::new();
        for node in order {
            let value = if self.is_register(node)? {
                self.state.get(&node).copied().unwrap_or(0)
            } else {
                match self.ports.get(&node) {
                    Some(port) if port.direction == PortDirection::Output => {
                        if port.sequential {
                            self.state.get(&node).copied().unwrap_or(0)
                        } else {
                            let computed = outputs
                                .entry(port.coord)
                                .or_insert_with(|| self.core_outputs(port.coord, &values));
                            computed.get(&port.name).copied().unwrap_or(0)
                        }
                    }
                    _ => match self.drive(node)? {
                        Drive::External => self.inputs.get(&node).copied().unwrap_or(0),
                        Drive::From(driver) => values.get(&driver).copied().unwrap_or(0),
                        Drive::Floating => 0,
                    },
                }
            };
            values.insert(node, mask(value, node.width));
        }
        self.values = values;

        self.config.eval();
        let data = self.config.read_config_data();
        self.read_data = match (self.ic.global_network(), self.read_coord) {
            (Some(net), Some(coord)) => net
                .reduce_read_data(&BTreeMap::from([(coord, data)]))
                .values()
                .fold(0, |acc, lane| acc | lane),
            _ => data,
        };
        Ok(())
    }

    /// Latches pipeline registers and registered core outputs, then
    /// re-evaluates.
    pub fn clock(&mut self) -> WeftResult<()> {
        let mut next = BTreeMap::new();
        for (&width, layer) in self.ic.layer_graphs() {
            for (id, node) in layer.iter() {
                if let (NodeKind::Register { .. }, Some(driver)) =
                    (&node.kind, node.fan_in.first())
                {
                    next.insert(NodeRef::new(width, id), self.value(NodeRef::new(width, *driver)));
                }
            }
        }
        let mut outputs: BTreeMap<Coord, BTreeMap<String, u64>> = BTreeMap::new();
        for (&node, port) in &self.ports {
            if port.direction == PortDirection::Output && port.sequential {
                let computed = outputs
                    .entry(port.coord)
                    .or_insert_with(|| self.core_outputs(port.coord, &self.values));
                let value = computed.get(&port.name).copied().unwrap_or(0);
                next.insert(node, mask(value, node.width));
            }
        }
        trace!(latched = next.len(), "clock edge");
        self.state = next;
        self.eval()
    }

    /// Clears configuration, registers and computed values. Poked inputs
    /// are kept.
    pub fn reset(&mut self) {
        self.config.reset();
        self.state.clear();
        self.values.clear();
        self.read_coord = None;
        self.read_data = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cores::{Core, CoreCache, CorePort};
    use crate::global::apply_global_meso_wiring;
    use crate::spec::{InterconnectSpec, PortConnection};
    use std::sync::Arc;
    use weft_common::{SbIo, Side};

    #[derive(Debug)]
    struct Incrementer {
        registered: bool,
    }

    impl Core for Incrementer {
        fn name(&self) -> &str {
            "inc"
        }

        fn ports(&self) -> Vec<CorePort> {
            let out = CorePort::output("b", 16);
            vec![
                CorePort::input("a", 16),
                if self.registered { out.registered() } else { out },
            ]
        }

        fn eval_model(&self, inputs: &BTreeMap<String, u64>) -> BTreeMap<String, u64> {
            let a = inputs.get("a").copied().unwrap_or(0);
            BTreeMap::from([("b".to_string(), a + 1)])
        }
    }

    fn row(width: u32) -> InterconnectSpec {
        InterconnectSpec::new(width, 1)
            .with_bit_widths([1, 16])
            .with_lift_ports(true)
    }

    fn sb(ic: &Interconnect, x: u32, width: u32, side: Side, io: SbIo) -> NodeRef {
        ic.tile(Coord::new(x, 0))
            .unwrap()
            .get_sb(width, side, 0, io)
            .unwrap()
    }

    #[test]
    fn requires_finalize() {
        let ic = Interconnect::build(&row(2), &CoreCache::new()).unwrap();
        assert!(matches!(InterconnectModel::new(&ic), Err(WeftError::State(_))));
    }

    #[test]
    fn route_across_row() {
        let mut ic = Interconnect::build(&row(2), &CoreCache::new()).unwrap();
        ic.finalize().unwrap();
        let route = [
            sb(&ic, 0, 16, Side::West, SbIo::In),
            sb(&ic, 0, 16, Side::East, SbIo::Out),
            sb(&ic, 1, 16, Side::West, SbIo::In),
            sb(&ic, 1, 16, Side::East, SbIo::Out),
        ];
        let mut model = InterconnectModel::new(&ic).unwrap();
        model.poke("SB_T0_WEST_IN_B16_X0_Y0", 0xabcd).unwrap();
        model.eval().unwrap();
        assert_eq!(model.peek("SB_T0_EAST_OUT_B16_X1_Y0").unwrap(), 0);

        model.configure_route(&route).unwrap();
        model.eval().unwrap();
        assert_eq!(model.peek("SB_T0_EAST_OUT_B16_X1_Y0").unwrap(), 0xabcd);

        model.reset();
        model.eval().unwrap();
        assert_eq!(model.peek("SB_T0_EAST_OUT_B16_X1_Y0").unwrap(), 0);
    }

    #[test]
    fn values_are_masked_to_layer_width() {
        let mut ic = Interconnect::build(&row(1), &CoreCache::new()).unwrap();
        ic.finalize().unwrap();
        let mut model = InterconnectModel::new(&ic).unwrap();
        let route = [
            sb(&ic, 0, 1, Side::West, SbIo::In),
            sb(&ic, 0, 1, Side::East, SbIo::Out),
        ];
        model.configure_route(&route).unwrap();
        model.poke("SB_T0_WEST_IN_B1_X0_Y0", 3).unwrap();
        model.eval().unwrap();
        assert_eq!(model.peek("SB_T0_EAST_OUT_B1_X0_Y0").unwrap(), 1);
        assert!(matches!(model.poke("SB_T0_EAST_OUT_B1_X0_Y0", 1), Err(WeftError::Lookup(_))));
        assert!(matches!(model.peek("nope"), Err(WeftError::Lookup(_))));
    }

    #[test]
    fn registers_delay_by_one_clock() {
        let spec = row(2).with_all_pipeline_registers();
        let mut ic = Interconnect::build(&spec, &CoreCache::new()).unwrap();
        ic.finalize().unwrap();
        let tile0 = ic.tile(Coord::new(0, 0)).unwrap();
        let pipe = tile0
            .layer(16)
            .unwrap()
            .switchbox
            .registers()
            .find(|((track, side), _)| *track == 0 && *side == Side::East)
            .map(|(_, pipe)| pipe)
            .unwrap();
        let tile1 = ic.tile(Coord::new(1, 0)).unwrap();
        let mux1 = tile1.layer(16).unwrap().switchbox.external_out(Side::East, 0).unwrap();
        let route = [
            sb(&ic, 0, 16, Side::West, SbIo::In),
            sb(&ic, 0, 16, Side::East, SbIo::Out),
            NodeRef::new(16, pipe.register),
            NodeRef::new(16, pipe.mux),
            sb(&ic, 1, 16, Side::West, SbIo::In),
            sb(&ic, 1, 16, Side::East, SbIo::Out),
            NodeRef::new(16, mux1),
        ];
        let mut model = InterconnectModel::new(&ic).unwrap();
        model.configure_route(&route).unwrap();
        model.poke("SB_T0_WEST_IN_B16_X0_Y0", 7).unwrap();
        model.eval().unwrap();
        assert_eq!(model.peek("SB_T0_EAST_OUT_B16_X1_Y0").unwrap(), 0);
        model.clock().unwrap();
        assert_eq!(model.peek("SB_T0_EAST_OUT_B16_X1_Y0").unwrap(), 7);
    }

    fn looped(registered: bool) -> Interconnect {
        let mut cores = CoreCache::new();
        let core: Arc<dyn Core> = Arc::new(Incrementer { registered });
        cores.insert(Coord::new(0, 0), core);
        let spec = InterconnectSpec::new(1, 1)
            .with_lift_ports(true)
            .connect("a", vec![PortConnection::new(Side::North, SbIo::Out)])
            .connect("b", vec![PortConnection::new(Side::North, SbIo::Out)]);
        let mut ic = Interconnect::build(&spec, &cores).unwrap();
        ic.finalize().unwrap();
        ic
    }

    fn close_loop(model: &mut InterconnectModel<'_>, ic: &Interconnect) {
        let tile = ic.tile(Coord::new(0, 0)).unwrap();
        let b = tile.get_port(16, "b").unwrap();
        let north = tile.get_sb(16, Side::North, 0, SbIo::Out).unwrap();
        model.configure_route(&[b, north]).unwrap();
    }

    #[test]
    fn combinational_loop_is_state_error() {
        let ic = looped(false);
        let mut model = InterconnectModel::new(&ic).unwrap();
        model.eval().unwrap();
        close_loop(&mut model, &ic);
        assert!(matches!(model.eval(), Err(WeftError::State(_))));
    }

    #[test]
    fn registered_core_output_counts_clocks() {
        let ic = looped(true);
        let mut model = InterconnectModel::new(&ic).unwrap();
        close_loop(&mut model, &ic);
        model.eval().unwrap();
        let b = ic.tile(Coord::new(0, 0)).unwrap().get_port(16, "b").unwrap();
        assert_eq!(model.value(b), 0);
        model.clock().unwrap();
        assert_eq!(model.value(b), 1);
        model.clock().unwrap();
        model.clock().unwrap();
        assert_eq!(model.value(b), 3);
    }

    #[test]
    fn read_back_through_global_network() {
        let mut ic = Interconnect::build(&row(2), &CoreCache::new()).unwrap();
        ic.finalize().unwrap();
        apply_global_meso_wiring(&mut ic, 1).unwrap();
        let pre = sb(&ic, 1, 16, Side::West, SbIo::In);
        let next = sb(&ic, 1, 16, Side::East, SbIo::Out);
        let cfg = ic.get_node_bitstream_config(pre, next).unwrap();
        let mut model = InterconnectModel::new(&ic).unwrap();
        model.configure(cfg.address, cfg.index, true).unwrap();
        model.configure(cfg.address, cfg.index + 1, false).unwrap();
        model.config_read(cfg.address).unwrap();
        model.eval().unwrap();
        assert_eq!(model.read_config_data(), cfg.index);
        assert_eq!(model.config().value(cfg.address), cfg.index);
    }
}
