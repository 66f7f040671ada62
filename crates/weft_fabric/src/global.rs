//! Distribution of the global configuration signals.
//!
//! The configuration bus (`config_addr`, `config_data`, `config_read`,
//! `config_write`) and `reset` travel from the top level down to every tile;
//! `read_config_data` travels back up and is OR-reduced on the way. The
//! network is a tree kept beside the routing graphs and never adds data-plane
//! edges.
//!
//! Two strategies are provided:
//!
//! * **Fanout**: one top-level lane drives every tile, optionally through a
//!   single level of buffers that each drive at most `max_fanout` tiles.
//! * **Meso**: columns are grouped into regions of `region_width` columns.
//!   Each region has its own lane driving the top tile of its first column;
//!   from there the signals chain along the region's top row and down each
//!   column, so no stage drives more than two loads.

use crate::interconnect::Interconnect;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::info;
use weft_common::{Coord, WeftError, WeftResult};

/// Strategy used to build a [`GlobalNetwork`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "wiring", rename_all = "lowercase")]
pub enum GlobalWiring {
    /// Direct fan-out from one top-level lane.
    Fanout {
        /// Loads per buffer; `None` drives every tile directly.
        max_fanout: Option<u32>,
    },
    /// Hierarchical per-region chains.
    Meso {
        /// Columns per region.
        region_width: u32,
    },
}

impl fmt::Display for GlobalWiring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GlobalWiring::Fanout { max_fanout: None } => f.write_str("fanout"),
            GlobalWiring::Fanout { max_fanout: Some(k) } => write!(f, "fanout(max_fanout={k})"),
            GlobalWiring::Meso { region_width } => write!(f, "meso(region_width={region_width})"),
        }
    }
}

/// A global configuration signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlobalSignal {
    /// Configuration address.
    ConfigAddr,
    /// Configuration write data.
    ConfigData,
    /// Read strobe.
    ConfigRead,
    /// Write strobe.
    ConfigWrite,
    /// Fabric reset.
    Reset,
    /// Read-back data, OR-reduced towards the top level.
    ReadConfigData,
}

impl GlobalSignal {
    /// Every signal, downstream ones first.
    pub const ALL: [GlobalSignal; 6] = [
        GlobalSignal::ConfigAddr,
        GlobalSignal::ConfigData,
        GlobalSignal::ConfigRead,
        GlobalSignal::ConfigWrite,
        GlobalSignal::Reset,
        GlobalSignal::ReadConfigData,
    ];

    /// Port name of the signal.
    pub fn name(self) -> &'static str {
        match self {
            GlobalSignal::ConfigAddr => "config_addr",
            GlobalSignal::ConfigData => "config_data",
            GlobalSignal::ConfigRead => "config_read",
            GlobalSignal::ConfigWrite => "config_write",
            GlobalSignal::Reset => "reset",
            GlobalSignal::ReadConfigData => "read_config_data",
        }
    }

    /// `true` for the read-back path.
    pub fn is_upstream(self) -> bool {
        self == GlobalSignal::ReadConfigData
    }
}

/// A vertex of the global network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GlobalEndpoint {
    /// A set of top-level ports.
    TopLevel {
        /// Lane index.
        lane: u32,
    },
    /// A fan-out buffer.
    Buffer {
        /// Buffer index.
        id: u32,
    },
    /// A tile.
    Tile(Coord),
}

impl fmt::Display for GlobalEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GlobalEndpoint::TopLevel { lane } => write!(f, "top{lane}"),
            GlobalEndpoint::Buffer { id } => write!(f, "buf{id}"),
            GlobalEndpoint::Tile(coord) => write!(f, "tile{coord}"),
        }
    }
}

/// A downstream connection; the read-back path uses it in reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalLink {
    /// Driving endpoint.
    pub from: GlobalEndpoint,
    /// Driven endpoint.
    pub to: GlobalEndpoint,
}

/// The global signal tree of a finalized fabric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalNetwork {
    wiring: GlobalWiring,
    lanes: u32,
    links: Vec<GlobalLink>,
    drivers: BTreeMap<Coord, GlobalEndpoint>,
}

impl GlobalNetwork {
    fn new(wiring: GlobalWiring, lanes: u32, links: Vec<GlobalLink>) -> Self {
        let drivers = links
            .iter()
            .filter_map(|link| match link.to {
                GlobalEndpoint::Tile(coord) => Some((coord, link.from)),
                _ => None,
            })
            .collect();
        Self {
            wiring,
            lanes,
            links,
            drivers,
        }
    }

    /// The strategy that produced this network.
    pub fn wiring(&self) -> GlobalWiring {
        self.wiring
    }

    /// All links in construction order.
    pub fn links(&self) -> &[GlobalLink] {
        &self.links
    }

    /// Top-level port names, `<signal>_<lane>`, lane by lane.
    pub fn top_level_ports(&self) -> Vec<String> {
        (0..self.lanes)
            .flat_map(|lane| {
                GlobalSignal::ALL
                    .into_iter()
                    .map(move |signal| format!("{}_{lane}", signal.name()))
            })
            .collect()
    }

    /// Returns what drives the global signals of a tile.
    pub fn driver_of(&self, coord: Coord) -> Option<GlobalEndpoint> {
        self.drivers.get(&coord).copied()
    }

    /// Tiles reached by the network.
    pub fn reached_tiles(&self) -> BTreeSet<Coord> {
        self.drivers.keys().copied().collect()
    }

    /// Largest number of loads on any endpoint.
    pub fn max_fanout(&self) -> usize {
        let mut loads: BTreeMap<GlobalEndpoint, usize> = BTreeMap::new();
        for link in &self.links {
            *loads.entry(link.from).or_default() += 1;
        }
        loads.into_values().max().unwrap_or(0)
    }

    /// Longest chain of links from a top-level lane to a tile.
    pub fn depth(&self) -> usize {
        self.drivers
            .keys()
            .map(|&coord| self.distance(GlobalEndpoint::Tile(coord)))
            .max()
            .unwrap_or(0)
    }

    fn distance(&self, mut endpoint: GlobalEndpoint) -> usize {
        let mut hops = 0;
        while let Some(from) = self.parent(endpoint) {
            hops += 1;
            endpoint = from;
        }
        hops
    }

    fn parent(&self, endpoint: GlobalEndpoint) -> Option<GlobalEndpoint> {
        match endpoint {
            GlobalEndpoint::TopLevel { .. } => None,
            GlobalEndpoint::Tile(coord) => self.driver_of(coord),
            GlobalEndpoint::Buffer { .. } => self
                .links
                .iter()
                .find(|link| link.to == endpoint)
                .map(|link| link.from),
        }
    }

    /// OR-reduces per-tile read-back data into one value per lane.
    ///
    /// Tiles missing from `tile_data` contribute 0.
    pub fn reduce_read_data(&self, tile_data: &BTreeMap<Coord, u32>) -> BTreeMap<u32, u32> {
        let mut lanes: BTreeMap<u32, u32> = (0..self.lanes).map(|lane| (lane, 0)).collect();
        for (&coord, &data) in tile_data {
            let mut endpoint = GlobalEndpoint::Tile(coord);
            while let Some(from) = self.parent(endpoint) {
                endpoint = from;
            }
            if let (GlobalEndpoint::TopLevel { lane }, true) =
                (endpoint, self.drivers.contains_key(&coord))
            {
                *lanes.entry(lane).or_default() |= data;
            }
        }
        lanes
    }
}

fn check_applicable(ic: &Interconnect) -> WeftResult<()> {
    ic.ensure_finalized()?;
    if ic.global_network().is_some() {
        return Err(WeftError::state("global wiring has already been applied"));
    }
    Ok(())
}

/// Drives every tile from one top-level lane, through one level of buffers
/// when `max_fanout` is given.
pub fn apply_global_fanout_wiring(
    ic: &mut Interconnect,
    max_fanout: Option<u32>,
) -> WeftResult<()> {
    check_applicable(ic)?;
    let top = GlobalEndpoint::TopLevel { lane: 0 };
    let coords: Vec<Coord> = ic.tiles().keys().copied().collect();
    let mut links = Vec::new();
    match max_fanout {
        Some(0) => return Err(WeftError::config("max_fanout must be positive")),
        Some(k) => {
            for (id, chunk) in coords.chunks(k as usize).enumerate() {
                let buffer = GlobalEndpoint::Buffer { id: id as u32 };
                links.push(GlobalLink { from: top, to: buffer });
                links.extend(chunk.iter().map(|&c| GlobalLink {
                    from: buffer,
                    to: GlobalEndpoint::Tile(c),
                }));
            }
        }
        None => {
            links.extend(coords.iter().map(|&c| GlobalLink {
                from: top,
                to: GlobalEndpoint::Tile(c),
            }));
        }
    }
    let network = GlobalNetwork::new(GlobalWiring::Fanout { max_fanout }, 1, links);
    info!(
        tiles = coords.len(),
        max_fanout = network.max_fanout(),
        depth = network.depth(),
        "fanout global wiring applied"
    );
    ic.attach_global(network)
}

/// Wires each region of `region_width` columns as a chain along its top row
/// and down every column.
pub fn apply_global_meso_wiring(ic: &mut Interconnect, region_width: u32) -> WeftResult<()> {
    check_applicable(ic)?;
    if region_width == 0 {
        return Err(WeftError::config("region_width must be positive"));
    }
    let width = ic.spec().width;
    let height = ic.spec().height;
    let mut links = Vec::new();
    let mut lanes = 0;
    for x0 in (0..width).step_by(region_width as usize) {
        let x1 = (x0 + region_width).min(width);
        links.push(GlobalLink {
            from: GlobalEndpoint::TopLevel { lane: lanes },
            to: GlobalEndpoint::Tile(Coord::new(x0, 0)),
        });
        for x in x0..x1 {
            if x + 1 < x1 {
                links.push(GlobalLink {
                    from: GlobalEndpoint::Tile(Coord::new(x, 0)),
                    to: GlobalEndpoint::Tile(Coord::new(x + 1, 0)),
                });
            }
            for y in 0..height.saturating_sub(1) {
                links.push(GlobalLink {
                    from: GlobalEndpoint::Tile(Coord::new(x, y)),
                    to: GlobalEndpoint::Tile(Coord::new(x, y + 1)),
                });
            }
        }
        lanes += 1;
    }
    let network = GlobalNetwork::new(GlobalWiring::Meso { region_width }, lanes, links);
    info!(
        regions = lanes,
        max_fanout = network.max_fanout(),
        depth = network.depth(),
        "meso global wiring applied"
    );
    ic.attach_global(network)
}

/// Applies either strategy.
pub fn apply_global_wiring(ic: &mut Interconnect, wiring: GlobalWiring) -> WeftResult<()> {
    match wiring {
        GlobalWiring::Fanout { max_fanout } => apply_global_fanout_wiring(ic, max_fanout),
        GlobalWiring::Meso { region_width } => apply_global_meso_wiring(ic, region_width),
    }
}
