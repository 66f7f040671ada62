//! Switchboxes: the programmable crossbar at every tile and layer.
//!
//! A switchbox owns one `SB_IN` and one `SB_OUT` terminal per enabled side and
//! track. Every `SB_OUT` is a mux whose candidates are the `SB_IN` terminals of
//! the other enabled sides, chosen by the topology. Pipeline registers can be
//! inserted behind individual outputs after the tile has been stitched into
//! the fabric.

use crate::graph::LayerGraph;
use crate::node::NodeKind;
use crate::spec::{SwitchBoxSpec, SwitchBoxType};
use std::collections::BTreeMap;
use tracing::trace;
use weft_common::{Coord, NodeId, SbIo, Side, WeftError, WeftResult};

/// The register and bypass mux inserted behind one output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineRegister {
    /// Register node latching the `SB_OUT` value.
    pub register: NodeId,
    /// Mux selecting bypass (index 0) or registered (index 1) value.
    pub mux: NodeId,
}

/// The switchbox of one tile in one layer.
#[derive(Debug, Clone)]
pub struct SwitchBox {
    coord: Coord,
    width: u32,
    topology: SwitchBoxType,
    num_tracks: u32,
    sides: Vec<Side>,
    terminals: BTreeMap<(Side, u32, SbIo), NodeId>,
    registers: BTreeMap<(u32, Side), PipelineRegister>,
}

impl SwitchBox {
    /// Creates the terminals and internal edges of a switchbox in `graph`.
    ///
    /// Register requests in `spec` are validated here but inserted by
    /// [`SwitchBox::add_pipeline_register`].
    pub fn build(graph: &mut LayerGraph, coord: Coord, spec: &SwitchBoxSpec) -> WeftResult<Self> {
        let n = spec.num_tracks;
        if n == 0 {
            return Err(WeftError::config(format!(
                "switchbox at {coord} has zero tracks"
            )));
        }
        let sides = spec.enabled_sides();
        if sides.len() < 2 {
            return Err(WeftError::config(format!(
                "switchbox at {coord} needs at least two enabled sides, got {}",
                sides.len()
            )));
        }
        for &(track, side) in &spec.pipeline_registers {
            if track >= n {
                return Err(WeftError::config(format!(
                    "pipeline register on track {track} but the switchbox has {n} tracks"
                )));
            }
            if !sides.contains(&side) {
                return Err(WeftError::config(format!(
                    "pipeline register on disabled side {side}"
                )));
            }
        }

        let mut terminals = BTreeMap::new();
        for &side in &sides {
            for track in 0..n {
                for io in [SbIo::In, SbIo::Out] {
                    let id = graph.add_node(coord, NodeKind::SwitchBox { side, track, io })?;
                    terminals.insert((side, track, io), id);
                }
            }
        }

        for &from in &sides {
            for &to in &sides {
                if from == to {
                    continue;
                }
                for track in 0..n {
                    let out = spec.topology.map_track(from, to, track, n);
                    graph.add_edge(
                        terminals[&(from, track, SbIo::In)],
                        terminals[&(to, out, SbIo::Out)],
                    )?;
                }
            }
        }

        Ok(Self {
            coord,
            width: graph.width(),
            topology: spec.topology,
            num_tracks: n,
            sides,
            terminals,
            registers: BTreeMap::new(),
        })
    }

    /// Inserts a pipeline register behind `SB_OUT(side, track)`.
    ///
    /// Everything the output drove is moved to the register mux, then the
    /// output feeds the mux directly (index 0) and through the register
    /// (index 1). Inserting the same register twice is a no-op.
    pub fn add_pipeline_register(
        &mut self,
        graph: &mut LayerGraph,
        side: Side,
        track: u32,
    ) -> WeftResult<PipelineRegister> {
        if let Some(existing) = self.registers.get(&(track, side)) {
            return Ok(*existing);
        }
        let out = self.get_sb(side, track, SbIo::Out).ok_or_else(|| {
            WeftError::config(format!(
                "no output T{track} {side} to register at {}",
                self.coord
            ))
        })?;
        let register = graph.add_node(self.coord, NodeKind::Register { side, track })?;
        let mux = graph.add_node(self.coord, NodeKind::RegisterMux { side, track })?;
        graph.move_fan_out(out, mux)?;
        graph.add_edge(out, mux)?;
        graph.add_edge(out, register)?;
        graph.add_edge(register, mux)?;
        trace!(coord = %self.coord, width = self.width, %side, track, "pipeline register inserted");

        let pipe = PipelineRegister { register, mux };
        self.registers.insert((track, side), pipe);
        Ok(pipe)
    }

    /// Returns the coordinate of the owning tile.
    pub fn coord(&self) -> Coord {
        self.coord
    }

    /// Returns the connection pattern.
    pub fn topology(&self) -> SwitchBoxType {
        self.topology
    }

    /// Returns the number of tracks per side.
    pub fn num_tracks(&self) -> u32 {
        self.num_tracks
    }

    /// Returns the enabled sides in canonical order.
    pub fn sides(&self) -> &[Side] {
        &self.sides
    }

    /// Returns a terminal, or `None` if the side is disabled or the track is
    /// out of range.
    pub fn get_sb(&self, side: Side, track: u32, io: SbIo) -> Option<NodeId> {
        self.terminals.get(&(side, track, io)).copied()
    }

    /// Returns the node that leaves the tile on `(side, track)`: the register
    /// mux when the output is registered, the `SB_OUT` terminal otherwise.
    pub fn external_out(&self, side: Side, track: u32) -> Option<NodeId> {
        match self.registers.get(&(track, side)) {
            Some(pipe) => Some(pipe.mux),
            None => self.get_sb(side, track, SbIo::Out),
        }
    }

    /// Iterates all terminals in `(side, track, io)` order.
    pub fn terminals(&self) -> impl Iterator<Item = ((Side, u32, SbIo), NodeId)> + '_ {
        self.terminals.iter().map(|(key, id)| (*key, *id))
    }

    /// Iterates the inserted pipeline registers by `(track, side)`.
    pub fn registers(&self) -> impl Iterator<Item = ((u32, Side), PipelineRegister)> + '_ {
        self.registers.iter().map(|(key, pipe)| (*key, *pipe))
    }
}
