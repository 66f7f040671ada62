//! Routing-fabric generator for coarse-grained reconfigurable arrays.
//!
//! A fabric is a grid of tiles. Every tile holds one switchbox per data-width
//! layer plus the ports of an optional compute core. [`Interconnect::build`]
//! turns an [`InterconnectSpec`] into per-width routing graphs, and
//! [`Interconnect::finalize`] freezes them and gives every configurable mux a
//! configuration address. On top of a finalized fabric this crate provides
//! global configuration-signal wiring ([`global`]), place-and-route export
//! ([`pnr`]) and a functional model ([`model`]).

#![warn(missing_docs)]

pub mod bitstream;
pub mod cores;
pub mod global;
pub mod graph;
pub mod interconnect;
pub mod model;
pub mod node;
pub mod pnr;
pub mod spec;
pub mod switchbox;
pub mod tile;

pub use bitstream::{AddressTable, BitstreamConfig, ConfigRegisterFile, SelectionPoint};
pub use cores::{Core, CoreCache, CorePort, GenericCore};
pub use global::{
    apply_global_fanout_wiring, apply_global_meso_wiring, apply_global_wiring, GlobalEndpoint,
    GlobalNetwork, GlobalSignal, GlobalWiring,
};
pub use graph::{Edge, LayerGraph};
pub use interconnect::{FabricStats, Interconnect, LiftedPort};
pub use model::InterconnectModel;
pub use node::{Node, NodeKey, NodeKind, NodeRef};
pub use pnr::{dump_pnr, PnrArtifacts};
pub use spec::{
    BusSpec, InterconnectSpec, PortConnection, SwitchBoxSpec, SwitchBoxType, TrackSegment,
};
pub use switchbox::{PipelineRegister, SwitchBox};
pub use tile::{Tile, TileLayer, TilePort};
