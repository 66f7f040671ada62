//! Configuration types deserialized from `weft.toml`.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use weft_common::{PortDirection, SbIo, Side};

/// The top-level fabric configuration parsed from `weft.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct FabricConfig {
    /// Grid, layer and track parameters.
    pub fabric: FabricSection,
    /// Configuration-bus widths.
    #[serde(default)]
    pub bus: BusConfig,
    /// Pipeline registers on switchbox outputs.
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Core-port to switchbox connections, by port name.
    #[serde(default)]
    pub connections: BTreeMap<String, ConnectionConfig>,
    /// Named core definitions.
    #[serde(default)]
    pub cores: BTreeMap<String, CoreDef>,
    /// Placement of cores on the grid.
    #[serde(default)]
    pub layout: LayoutConfig,
    /// Global configuration-signal wiring, if any.
    #[serde(default)]
    pub global: Option<GlobalConfig>,
}

impl FabricConfig {
    /// Total number of tracks across every segment.
    pub fn num_tracks(&self) -> u32 {
        self.fabric.tracks.iter().map(|t| t.count).sum()
    }
}

/// The `[fabric]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct FabricSection {
    /// Fabric name, used as the default design name on export.
    pub name: String,
    /// Grid columns.
    pub width: u32,
    /// Grid rows.
    pub height: u32,
    /// Data widths with a routing layer each.
    #[serde(default = "default_bit_widths")]
    pub bit_widths: Vec<u32>,
    /// Switchbox topology.
    #[serde(default)]
    pub switchbox: Topology,
    /// Whether dangling terminals become interface ports.
    #[serde(default)]
    pub lift_ports: bool,
    /// Sides with no switchbox terminals.
    #[serde(default)]
    pub disabled_sides: Vec<Side>,
    /// Track segments, numbered consecutively in declaration order.
    #[serde(default = "default_tracks")]
    pub tracks: Vec<TrackConfig>,
}

fn default_bit_widths() -> Vec<u32> {
    vec![16]
}

fn default_tracks() -> Vec<TrackConfig> {
    vec![TrackConfig {
        length: 1,
        count: 1,
    }]
}

fn default_track_length() -> u32 {
    1
}

/// Switchbox topology.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    /// Track `t` only reaches track `t` on every other side.
    #[default]
    Disjoint,
    /// Track indices are permuted when turning a corner.
    Wilton,
}

/// One `[[fabric.tracks]]` entry.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct TrackConfig {
    /// Tiles spanned by one wire.
    #[serde(default = "default_track_length")]
    pub length: u32,
    /// Tracks of this length.
    pub count: u32,
}

/// The `[bus]` section.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct BusConfig {
    /// Bits selecting a register within a tile.
    #[serde(default = "default_addr_width")]
    pub addr_width: u32,
    /// Width of a configuration word.
    #[serde(default = "default_data_width")]
    pub data_width: u32,
    /// Bits identifying a tile.
    #[serde(default = "default_tile_id_width")]
    pub tile_id_width: u32,
}

fn default_addr_width() -> u32 {
    8
}

fn default_data_width() -> u32 {
    32
}

fn default_tile_id_width() -> u32 {
    16
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            addr_width: default_addr_width(),
            data_width: default_data_width(),
            tile_id_width: default_tile_id_width(),
        }
    }
}

/// The `[pipeline]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PipelineConfig {
    /// Register every output of every enabled side.
    #[serde(default)]
    pub all: bool,
    /// Individual registers, used when `all` is false.
    #[serde(default)]
    pub registers: Vec<RegisterConfig>,
}

/// A single pipeline register position.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct RegisterConfig {
    /// Track index.
    pub track: u32,
    /// Switchbox side.
    pub side: Side,
}

/// A `[connections.<port>]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Sides the port connects to. Accepts `"all"`, one side or a list.
    #[serde(deserialize_with = "deserialize_sides")]
    pub sides: Vec<Side>,
    /// Which switchbox terminals the port attaches to.
    pub io: SbIo,
}

/// Deserializes `"all"`, a single side name, or a list of side names.
fn deserialize_sides<'de, D>(deserializer: D) -> Result<Vec<Side>, D::Error>
where
    D: Deserializer<'de>,
{
    struct SidesVisitor;

    impl<'de> Visitor<'de> for SidesVisitor {
        type Value = Vec<Side>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("\"all\", a side name, or a list of side names")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            match v {
                "all" => Ok(Side::ALL.to_vec()),
                "north" => Ok(vec![Side::North]),
                "east" => Ok(vec![Side::East]),
                "south" => Ok(vec![Side::South]),
                "west" => Ok(vec![Side::West]),
                other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
            }
        }

        fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut sides = Vec::new();
            while let Some(side) = seq.next_element::<Side>()? {
                sides.push(side);
            }
            Ok(sides)
        }
    }

    deserializer.deserialize_any(SidesVisitor)
}

/// A `[cores.<name>]` definition.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoreDef {
    /// Ports by name.
    #[serde(default)]
    pub ports: BTreeMap<String, CorePortConfig>,
}

/// A `[cores.<name>.ports.<port>]` entry.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct CorePortConfig {
    /// Data width; selects the routing layer.
    pub width: u32,
    /// Direction relative to the core.
    pub direction: PortDirection,
    /// Registered output.
    #[serde(default)]
    pub sequential: bool,
}

/// The `[layout]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LayoutConfig {
    /// Core placed on every tile without an override.
    #[serde(default)]
    pub default: Option<String>,
    /// Per-tile overrides.
    #[serde(default)]
    pub tiles: Vec<TileOverride>,
}

/// A `[[layout.tiles]]` entry. Omitting `core` leaves the tile empty.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TileOverride {
    /// Column.
    pub x: u32,
    /// Row.
    pub y: u32,
    /// Core name.
    #[serde(default)]
    pub core: Option<String>,
}

/// The `[global]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GlobalConfig {
    /// Distribution strategy.
    #[serde(default)]
    pub wiring: WiringKind,
    /// Fanout strategy: tiles per buffer.
    #[serde(default)]
    pub max_fanout: Option<u32>,
    /// Meso strategy: columns per region.
    #[serde(default)]
    pub region_width: Option<u32>,
}

/// Global-signal distribution strategy.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WiringKind {
    /// Top-level ports fan out to every tile.
    #[default]
    Fanout,
    /// Signals are chained through tiles within column regions.
    Meso,
}
