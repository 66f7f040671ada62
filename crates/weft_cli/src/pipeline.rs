//! Shared pipeline helpers for CLI commands.
//!
//! Resolves the project root, translates a loaded [`FabricConfig`] into an
//! [`InterconnectSpec`] plus the per-tile core cache, and runs the
//! build/finalize/wire sequence shared by `build` and `stats`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;
use weft_common::Coord;
use weft_config::{FabricConfig, Topology, WiringKind, CONFIG_FILE};
use weft_fabric::{
    apply_global_wiring, BusSpec, Core, CoreCache, CorePort, GenericCore, GlobalWiring,
    Interconnect, InterconnectSpec, PortConnection, SwitchBoxType, TrackSegment,
};

use crate::GlobalArgs;

/// Walks up from `start` looking for the nearest directory containing `weft.toml`.
pub fn find_project_root(start: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(CONFIG_FILE).exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(format!(
                "could not find {CONFIG_FILE} in {} or any parent directory",
                start.display()
            )
            .into());
        }
    }
}

/// Resolves the project root directory from global CLI args.
///
/// If `--config` is specified, uses that path (file → parent dir, dir → itself).
/// Otherwise walks up from the current directory looking for `weft.toml`.
pub fn resolve_project_root(global: &GlobalArgs) -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Some(ref config_path) = global.config {
        let p = PathBuf::from(config_path);
        if p.is_file() {
            Ok(p.parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".")))
        } else {
            Ok(p)
        }
    } else {
        find_project_root(&std::env::current_dir()?)
    }
}

/// Translates the configuration into an interconnect description.
pub fn interconnect_spec(config: &FabricConfig) -> InterconnectSpec {
    let fabric = &config.fabric;
    let topology = match fabric.switchbox {
        Topology::Disjoint => SwitchBoxType::Disjoint,
        Topology::Wilton => SwitchBoxType::Wilton,
    };
    let mut spec = InterconnectSpec::new(fabric.width, fabric.height)
        .with_bit_widths(fabric.bit_widths.iter().copied())
        .with_tracks(fabric.tracks.iter().map(|t| TrackSegment {
            length: t.length,
            count: t.count,
        }))
        .with_topology(topology)
        .with_disabled_sides(fabric.disabled_sides.iter().copied())
        .with_lift_ports(fabric.lift_ports)
        .with_bus(BusSpec {
            addr_width: config.bus.addr_width,
            data_width: config.bus.data_width,
            tile_id_width: config.bus.tile_id_width,
        });
    spec = if config.pipeline.all {
        spec.with_all_pipeline_registers()
    } else {
        spec.with_pipeline_registers(config.pipeline.registers.iter().map(|r| (r.track, r.side)))
    };
    for (port, conn) in &config.connections {
        let conns = conn
            .sides
            .iter()
            .map(|side| PortConnection::new(*side, conn.io))
            .collect();
        spec = spec.connect(port.clone(), conns);
    }
    spec
}

/// Instantiates the configured core on every tile of the layout.
///
/// Tiles sharing a core name share one core instance.
pub fn core_cache(config: &FabricConfig) -> Result<CoreCache, Box<dyn std::error::Error>> {
    let mut instances: BTreeMap<String, Arc<dyn Core>> = BTreeMap::new();
    let mut cache = CoreCache::new();
    for x in 0..config.fabric.width {
        for y in 0..config.fabric.height {
            let Some(resolved) = weft_config::resolve_core(config, x, y)? else {
                continue;
            };
            let core = instances
                .entry(resolved.name.clone())
                .or_insert_with(|| {
                    let ports = resolved
                        .ports
                        .iter()
                        .map(|(name, port)| CorePort {
                            name: name.clone(),
                            width: port.width,
                            direction: port.direction,
                            sequential: port.sequential,
                        })
                        .collect();
                    let core: Arc<dyn Core> =
                        Arc::new(GenericCore::new(resolved.name.clone(), ports));
                    core
                })
                .clone();
            cache.insert(Coord::new(x, y), core);
        }
    }
    Ok(cache)
}

/// The configured global wiring strategy, if any.
pub fn global_wiring(config: &FabricConfig) -> Option<GlobalWiring> {
    let global = config.global.as_ref()?;
    Some(match global.wiring {
        WiringKind::Fanout => GlobalWiring::Fanout {
            max_fanout: global.max_fanout,
        },
        WiringKind::Meso => GlobalWiring::Meso {
            region_width: global.region_width.unwrap_or(1),
        },
    })
}

/// Builds, finalizes and wires the fabric described by `config`.
pub fn build_fabric(config: &FabricConfig) -> Result<Interconnect, Box<dyn std::error::Error>> {
    let spec = interconnect_spec(config);
    let cores = core_cache(config)?;
    let mut ic = Interconnect::build(&spec, &cores)?;
    ic.finalize()?;
    if let Some(wiring) = global_wiring(config) {
        apply_global_wiring(&mut ic, wiring)?;
    }
    info!(fabric = %config.fabric.name, "fabric ready");
    Ok(ic)
}
