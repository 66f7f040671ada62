//! Declarative fabric description consumed by [`Interconnect::build`].
//!
//! [`Interconnect::build`]: crate::interconnect::Interconnect::build

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use weft_common::{Coord, SbIo, Side, WeftError, WeftResult};

/// Switchbox connection pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchBoxType {
    /// Every input reaches the same track on every other side.
    Disjoint,
    /// Straight connections keep the track and turns permute it.
    Wilton,
}

impl SwitchBoxType {
    /// Returns the output track reached from `track` when turning from side
    /// `from` to side `to` on a switchbox with `num_tracks` tracks.
    ///
    /// For a fixed pair of sides the mapping is a permutation of the tracks.
    pub fn map_track(self, from: Side, to: Side, track: u32, num_tracks: u32) -> u32 {
        let n = num_tracks;
        let t = track % n;
        match self {
            SwitchBoxType::Disjoint => t,
            SwitchBoxType::Wilton => match (from, to) {
                (Side::West, Side::North) | (Side::North, Side::West) => (n - t) % n,
                (Side::North, Side::East) | (Side::South, Side::West) => (t + 1) % n,
                (Side::East, Side::North) | (Side::West, Side::South) => (t + n - 1) % n,
                (Side::East, Side::South) | (Side::South, Side::East) => (2 * n - 2 - t) % n,
                _ => t,
            },
        }
    }
}

impl fmt::Display for SwitchBoxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwitchBoxType::Disjoint => f.write_str("disjoint"),
            SwitchBoxType::Wilton => f.write_str("wilton"),
        }
    }
}

/// A group of tracks sharing one segment length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSegment {
    /// Distance in tiles between the two switchboxes a track connects.
    pub length: u32,
    /// Number of tracks of this length.
    pub count: u32,
}

/// Per-tile switchbox parameters for one layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchBoxSpec {
    /// Tracks per side.
    pub num_tracks: u32,
    /// Connection pattern.
    pub topology: SwitchBoxType,
    /// Sides that get no terminals at all.
    pub disabled_sides: BTreeSet<Side>,
    /// `(track, side)` outputs that get a pipeline register.
    pub pipeline_registers: BTreeSet<(u32, Side)>,
}

impl SwitchBoxSpec {
    /// Creates a spec with all sides enabled and no registers.
    pub fn new(num_tracks: u32, topology: SwitchBoxType) -> Self {
        Self {
            num_tracks,
            topology,
            disabled_sides: BTreeSet::new(),
            pipeline_registers: BTreeSet::new(),
        }
    }

    /// Returns the enabled sides in canonical order.
    pub fn enabled_sides(&self) -> Vec<Side> {
        Side::ALL
            .into_iter()
            .filter(|side| !self.disabled_sides.contains(side))
            .collect()
    }
}

/// Configuration-bus geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusSpec {
    /// Bits of per-tile register slot in a configuration address.
    pub addr_width: u32,
    /// Width of the configuration data bus.
    pub data_width: u32,
    /// Bits of tile id in a configuration address.
    pub tile_id_width: u32,
}

impl Default for BusSpec {
    fn default() -> Self {
        Self {
            addr_width: 8,
            data_width: 32,
            tile_id_width: 16,
        }
    }
}

impl BusSpec {
    /// Bits available for each of x and y inside a tile id.
    pub fn coord_bits(&self) -> u32 {
        self.tile_id_width / 2
    }

    /// Returns `(x << tile_id_width/2) | y`.
    pub fn tile_id(&self, coord: Coord) -> u32 {
        (coord.x << self.coord_bits()) | coord.y
    }

    /// Total width of a configuration address.
    pub fn config_addr_width(&self) -> u32 {
        self.addr_width + self.tile_id_width
    }

    /// Number of register slots each tile may use.
    pub fn max_slots(&self) -> u64 {
        1u64 << self.addr_width
    }

    fn validate(&self, width: u32, height: u32) -> WeftResult<()> {
        if self.addr_width == 0 || self.tile_id_width == 0 {
            return Err(WeftError::config("bus widths must be positive"));
        }
        if self.addr_width + self.tile_id_width > 32 {
            return Err(WeftError::config(format!(
                "tile_id_width {} + addr_width {} exceeds 32 bits",
                self.tile_id_width, self.addr_width
            )));
        }
        if self.data_width == 0 || self.data_width > 32 {
            return Err(WeftError::config(format!(
                "data_width {} must be in 1..=32",
                self.data_width
            )));
        }
        let limit = 1u64 << self.coord_bits();
        if u64::from(width) > limit || u64::from(height) > limit {
            return Err(WeftError::config(format!(
                "a {width}x{height} grid does not fit in {} coordinate bits",
                self.coord_bits()
            )));
        }
        Ok(())
    }
}

/// Where a core port attaches to the switchbox of its tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortConnection {
    /// Switchbox side.
    pub side: Side,
    /// Terminal direction on that side.
    pub io: SbIo,
}

impl PortConnection {
    /// Creates a connection.
    pub fn new(side: Side, io: SbIo) -> Self {
        Self { side, io }
    }

    /// Connections to every side with the given direction.
    pub fn all_sides(io: SbIo) -> Vec<Self> {
        Side::ALL.into_iter().map(|side| Self { side, io }).collect()
    }
}

/// Complete description of a fabric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterconnectSpec {
    /// Columns.
    pub width: u32,
    /// Rows.
    pub height: u32,
    /// Data-width layers.
    pub bit_widths: BTreeSet<u32>,
    /// Track segments, assigned consecutive track indices in order.
    pub tracks: Vec<TrackSegment>,
    /// Switchbox connection pattern.
    pub topology: SwitchBoxType,
    /// Sides without terminals.
    pub disabled_sides: BTreeSet<Side>,
    /// Registered `(track, side)` outputs, applied to every tile.
    pub pipeline_registers: BTreeSet<(u32, Side)>,
    /// Core port connections, by port name.
    pub connections: BTreeMap<String, Vec<PortConnection>>,
    /// Whether finalize exposes dangling terminals as interface ports.
    pub lift_ports: bool,
    /// Configuration-bus geometry.
    pub bus: BusSpec,
}

impl InterconnectSpec {
    /// Creates a `width` x `height` fabric with one 16-bit layer of one
    /// length-1 track, Disjoint switchboxes and the default bus.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bit_widths: BTreeSet::from([16]),
            tracks: vec![TrackSegment {
                length: 1,
                count: 1,
            }],
            topology: SwitchBoxType::Disjoint,
            disabled_sides: BTreeSet::new(),
            pipeline_registers: BTreeSet::new(),
            connections: BTreeMap::new(),
            lift_ports: false,
            bus: BusSpec::default(),
        }
    }

    /// Replaces the layer widths.
    pub fn with_bit_widths(mut self, widths: impl IntoIterator<Item = u32>) -> Self {
        self.bit_widths = widths.into_iter().collect();
        self
    }

    /// Replaces the track segments.
    pub fn with_tracks(mut self, tracks: impl IntoIterator<Item = TrackSegment>) -> Self {
        self.tracks = tracks.into_iter().collect();
        self
    }

    /// Uses `count` tracks of length `length`.
    pub fn with_uniform_tracks(self, length: u32, count: u32) -> Self {
        self.with_tracks([TrackSegment { length, count }])
    }

    /// Sets the switchbox pattern.
    pub fn with_topology(mut self, topology: SwitchBoxType) -> Self {
        self.topology = topology;
        self
    }

    /// Disables the given sides.
    pub fn with_disabled_sides(mut self, sides: impl IntoIterator<Item = Side>) -> Self {
        self.disabled_sides = sides.into_iter().collect();
        self
    }

    /// Registers the given `(track, side)` outputs.
    pub fn with_pipeline_registers(
        mut self,
        registers: impl IntoIterator<Item = (u32, Side)>,
    ) -> Self {
        self.pipeline_registers = registers.into_iter().collect();
        self
    }

    /// Registers every output of every enabled side.
    pub fn with_all_pipeline_registers(mut self) -> Self {
        let tracks = self.num_tracks();
        self.pipeline_registers = (0..tracks)
            .flat_map(|track| Side::ALL.into_iter().map(move |side| (track, side)))
            .filter(|(_, side)| !self.disabled_sides.contains(side))
            .collect();
        self
    }

    /// Attaches the named core port to the given terminals.
    pub fn connect(mut self, port: impl Into<String>, connections: Vec<PortConnection>) -> Self {
        self.connections.insert(port.into(), connections);
        self
    }

    /// Enables or disables port lifting.
    pub fn with_lift_ports(mut self, lift: bool) -> Self {
        self.lift_ports = lift;
        self
    }

    /// Replaces the bus geometry.
    pub fn with_bus(mut self, bus: BusSpec) -> Self {
        self.bus = bus;
        self
    }

    /// Total tracks per side over all segments.
    pub fn num_tracks(&self) -> u32 {
        self.tracks.iter().map(|seg| seg.count).sum()
    }

    /// Segment length of a track index.
    pub fn track_length(&self, track: u32) -> Option<u32> {
        let mut first = 0;
        for seg in &self.tracks {
            if track < first + seg.count {
                return Some(seg.length);
            }
            first += seg.count;
        }
        None
    }

    /// Derives the switchbox spec shared by every tile.
    pub fn switchbox_spec(&self) -> SwitchBoxSpec {
        SwitchBoxSpec {
            num_tracks: self.num_tracks(),
            topology: self.topology,
            disabled_sides: self.disabled_sides.clone(),
            pipeline_registers: self.pipeline_registers.clone(),
        }
    }

    /// Checks everything that can be checked without building.
    ///
    /// Switchbox-level checks (track counts, enabled sides, register
    /// placement) are performed by [`SwitchBox::build`].
    ///
    /// [`SwitchBox::build`]: crate::switchbox::SwitchBox::build
    pub fn validate(&self) -> WeftResult<()> {
        if self.bit_widths.is_empty() {
            return Err(WeftError::config("at least one bit-width layer is required"));
        }
        if let Some(w) = self.bit_widths.iter().find(|w| **w == 0 || **w > 64) {
            return Err(WeftError::config(format!(
                "layer width {w} must be in 1..=64"
            )));
        }
        if let Some(seg) = self.tracks.iter().find(|seg| seg.length == 0) {
            return Err(WeftError::config(format!(
                "track segment of {} tracks has length 0",
                seg.count
            )));
        }
        self.bus.validate(self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wilton_turns_are_permutations() {
        for n in [1, 2, 3, 4, 5] {
            for from in Side::ALL {
                for to in Side::ALL {
                    if from == to {
                        continue;
                    }
                    let mut hit: BTreeSet<u32> = BTreeSet::new();
                    for t in 0..n {
                        let mapped = SwitchBoxType::Wilton.map_track(from, to, t, n);
                        assert!(mapped < n);
                        hit.insert(mapped);
                    }
                    assert_eq!(hit.len() as u32, n, "{from}->{to} n={n}");
                }
            }
        }
    }

    #[test]
    fn wilton_turns() {
        let w = SwitchBoxType::Wilton;
        assert_eq!(w.map_track(Side::West, Side::East, 1, 4), 1);
        assert_eq!(w.map_track(Side::West, Side::North, 1, 4), 3);
        assert_eq!(w.map_track(Side::North, Side::East, 3, 4), 0);
        assert_eq!(w.map_track(Side::East, Side::North, 0, 4), 3);
        assert_eq!(w.map_track(Side::East, Side::South, 0, 4), 2);
        assert_eq!(w.map_track(Side::South, Side::West, 1, 4), 2);
        assert_eq!(SwitchBoxType::Disjoint.map_track(Side::West, Side::North, 1, 4), 1);
    }

    #[test]
    fn tile_id_packs_coordinates() {
        let bus = BusSpec::default();
        assert_eq!(bus.tile_id(Coord::new(0, 0)), 0);
        assert_eq!(bus.tile_id(Coord::new(1, 2)), (1 << 8) | 2);
        assert_eq!(bus.config_addr_width(), 24);
        assert_eq!(bus.max_slots(), 256);
    }

    #[test]
    fn track_lengths_follow_declaration_order() {
        let spec = InterconnectSpec::new(4, 4).with_tracks([
            TrackSegment {
                length: 1,
                count: 2,
            },
            TrackSegment {
                length: 2,
                count: 1,
            },
        ]);
        assert_eq!(spec.num_tracks(), 3);
        assert_eq!(spec.track_length(0), Some(1));
        assert_eq!(spec.track_length(1), Some(1));
        assert_eq!(spec.track_length(2), Some(2));
        assert_eq!(spec.track_length(3), None);
    }

    #[test]
    fn all_registers_skip_disabled_sides() {
        let spec = InterconnectSpec::new(2, 2)
            .with_uniform_tracks(1, 2)
            .with_disabled_sides([Side::West])
            .with_all_pipeline_registers();
        assert_eq!(spec.pipeline_registers.len(), 6);
        assert!(!spec.pipeline_registers.contains(&(0, Side::West)));
    }

    #[test]
    fn validate_rejects_bad_bus() {
        let wide = InterconnectSpec::new(2, 2).with_bus(BusSpec {
            addr_width: 20,
            data_width: 32,
            tile_id_width: 16,
        });
        assert!(matches!(wide.validate(), Err(WeftError::Configuration(_))));

        let big = InterconnectSpec::new(300, 2);
        assert!(matches!(big.validate(), Err(WeftError::Configuration(_))));

        let ok = InterconnectSpec::new(256, 256);
        ok.validate().unwrap();
    }

    #[test]
    fn validate_rejects_empty_layers() {
        let spec = InterconnectSpec::new(2, 2).with_bit_widths(Vec::new());
        assert!(matches!(spec.validate(), Err(WeftError::Configuration(_))));
        let zero = InterconnectSpec::new(2, 2).with_bit_widths([0]);
        assert!(zero.validate().is_err());
    }

    #[test]
    fn serde_roundtrip() {
        let spec = InterconnectSpec::new(2, 3)
            .with_bit_widths([1, 16])
            .with_topology(SwitchBoxType::Wilton)
            .connect("data_in_16b", PortConnection::all_sides(SbIo::In));
        let json = serde_json::to_string(&spec).unwrap();
        let back: InterconnectSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(spec, back);
    }
}
