//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::{FabricConfig, WiringKind};
use std::collections::BTreeSet;
use std::path::Path;

/// Name of the configuration file inside a project directory.
pub const CONFIG_FILE: &str = "weft.toml";

/// Loads and validates a `weft.toml` configuration from a project directory.
pub fn load_config(project_dir: &Path) -> Result<FabricConfig, ConfigError> {
    let config_path = project_dir.join(CONFIG_FILE);
    let content = std::fs::read_to_string(&config_path)?;
    load_config_from_str(&content)
}

/// Parses and validates a `weft.toml` configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<FabricConfig, ConfigError> {
    let config: FabricConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Checks cross-field consistency that serde cannot express.
fn validate_config(config: &FabricConfig) -> Result<(), ConfigError> {
    let fabric = &config.fabric;
    if fabric.name.is_empty() {
        return Err(ConfigError::MissingField("fabric.name".to_string()));
    }
    if fabric.width == 0 || fabric.height == 0 {
        return Err(ConfigError::ValidationError(format!(
            "grid {}x{} has no tiles",
            fabric.width, fabric.height
        )));
    }
    if fabric.bit_widths.is_empty() {
        return Err(ConfigError::MissingField("fabric.bit_widths".to_string()));
    }
    if let Some(w) = fabric.bit_widths.iter().find(|w| **w == 0 || **w > 64) {
        return Err(ConfigError::ValidationError(format!(
            "bit width {w} is outside 1..=64"
        )));
    }
    if fabric.tracks.is_empty() {
        return Err(ConfigError::MissingField("fabric.tracks".to_string()));
    }
    if let Some(t) = fabric.tracks.iter().find(|t| t.length == 0 || t.count == 0) {
        return Err(ConfigError::ValidationError(format!(
            "track segment length={} count={} must be non-zero",
            t.length, t.count
        )));
    }

    let num_tracks = config.num_tracks();
    for reg in &config.pipeline.registers {
        if reg.track >= num_tracks {
            return Err(ConfigError::ValidationError(format!(
                "pipeline register on track {} but only {num_tracks} tracks exist",
                reg.track
            )));
        }
        if fabric.disabled_sides.contains(&reg.side) {
            return Err(ConfigError::ValidationError(format!(
                "pipeline register on disabled side {}",
                reg.side
            )));
        }
    }

    for (port, conn) in &config.connections {
        let declared = config.cores.values().any(|core| core.ports.contains_key(port));
        if !declared {
            return Err(ConfigError::ValidationError(format!(
                "connection for port '{port}' which no core declares"
            )));
        }
        if conn.sides.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "connection for port '{port}' lists no sides"
            )));
        }
    }

    if let Some(name) = &config.layout.default {
        if !config.cores.contains_key(name) {
            return Err(ConfigError::UnknownCore(name.clone()));
        }
    }
    let mut placed = BTreeSet::new();
    for tile in &config.layout.tiles {
        if tile.x >= fabric.width || tile.y >= fabric.height {
            return Err(ConfigError::ValidationError(format!(
                "layout tile ({}, {}) is outside the {}x{} grid",
                tile.x, tile.y, fabric.width, fabric.height
            )));
        }
        if !placed.insert((tile.x, tile.y)) {
            return Err(ConfigError::ValidationError(format!(
                "layout tile ({}, {}) is listed twice",
                tile.x, tile.y
            )));
        }
        if let Some(name) = &tile.core {
            if !config.cores.contains_key(name) {
                return Err(ConfigError::UnknownCore(name.clone()));
            }
        }
    }

    if let Some(global) = &config.global {
        match global.wiring {
            WiringKind::Fanout => {
                if global.max_fanout == Some(0) {
                    return Err(ConfigError::ValidationError(
                        "global.max_fanout must be at least 1".to_string(),
                    ));
                }
            }
            WiringKind::Meso => match global.region_width {
                None => return Err(ConfigError::MissingField("global.region_width".to_string())),
                Some(0) => {
                    return Err(ConfigError::ValidationError(
                        "global.region_width must be at least 1".to_string(),
                    ))
                }
                Some(_) => {}
            },
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Topology;
    use weft_common::Side;

    #[test]
    fn parse_minimal_config() {
        let toml = r#"
[fabric]
name = "cgra"
width = 4
height = 4
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.fabric.name, "cgra");
        assert_eq!(config.fabric.bit_widths, vec![16]);
        assert_eq!(config.fabric.switchbox, Topology::Disjoint);
        assert_eq!(config.num_tracks(), 1);
        assert_eq!(config.bus.addr_width, 8);
        assert_eq!(config.bus.data_width, 32);
        assert_eq!(config.bus.tile_id_width, 16);
        assert!(!config.fabric.lift_ports);
        assert!(config.global.is_none());
        assert!(config.cores.is_empty());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[fabric]
name = "cgra"
width = 4
height = 2
bit_widths = [1, 16]
switchbox = "wilton"
lift_ports = true
disabled_sides = ["west"]

[[fabric.tracks]]
length = 1
count = 4

[[fabric.tracks]]
length = 2
count = 1

[bus]
addr_width = 6
data_width = 16
tile_id_width = 8

[pipeline]
registers = [{ track = 0, side = "north" }, { track = 4, side = "east" }]

[cores.pe.ports.data_in_16b]
width = 16
direction = "input"

[cores.pe.ports.data_out_16b]
width = 16
direction = "output"

[connections.data_in_16b]
sides = "all"
io = "in"

[connections.data_out_16b]
sides = ["north", "east"]
io = "out"

[layout]
default = "pe"

[[layout.tiles]]
x = 0
y = 0

[global]
wiring = "meso"
region_width = 2
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.fabric.bit_widths, vec![1, 16]);
        assert_eq!(config.fabric.switchbox, Topology::Wilton);
        assert_eq!(config.fabric.disabled_sides, vec![Side::West]);
        assert_eq!(config.num_tracks(), 5);
        assert_eq!(config.bus.tile_id_width, 8);
        assert_eq!(config.pipeline.registers.len(), 2);
        assert_eq!(config.pipeline.registers[1].side, Side::East);
        assert_eq!(config.connections.len(), 2);
        let global = config.global.unwrap();
        assert_eq!(global.wiring, WiringKind::Meso);
        assert_eq!(global.region_width, Some(2));
    }

    #[test]
    fn missing_name_errors() {
        let toml = r#"
[fabric]
name = ""
width = 1
height = 1
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(_)));
    }

    #[test]
    fn empty_grid_errors() {
        let toml = r#"
[fabric]
name = "cgra"
width = 0
height = 3
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn invalid_toml_errors() {
        let err = load_config_from_str("this is not valid toml {{{}}}").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn bad_widths_and_tracks_error() {
        for extra in [
            "bit_widths = []",
            "bit_widths = [0]",
            "bit_widths = [65]",
            "tracks = []",
            "tracks = [{ length = 0, count = 1 }]",
            "tracks = [{ length = 1, count = 0 }]",
        ] {
            let toml = format!(
                r#"
[fabric]
name = "cgra"
width = 1
height = 1
{extra}
"#
            );
            assert!(load_config_from_str(&toml).is_err(), "{extra} accepted");
        }
    }

    #[test]
    fn register_track_out_of_range_errors() {
        let toml = r#"
[fabric]
name = "cgra"
width = 1
height = 1

[pipeline]
registers = [{ track = 1, side = "north" }]
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn register_on_disabled_side_errors() {
        let toml = r#"
[fabric]
name = "cgra"
width = 1
height = 1
disabled_sides = ["south"]

[pipeline]
registers = [{ track = 0, side = "south" }]
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn undeclared_connection_port_errors() {
        let toml = r#"
[fabric]
name = "cgra"
width = 1
height = 1

[connections.ghost]
sides = "all"
io = "in"
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn unknown_layout_core_errors() {
        let toml = r#"
[fabric]
name = "cgra"
width = 2
height = 2

[layout]
default = "mem"
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownCore(name) if name == "mem"));
    }

    #[test]
    fn layout_override_checks() {
        let base = r#"
[fabric]
name = "cgra"
width = 2
height = 2

[cores.pe]
"#;
        let outside = format!("{base}\n[[layout.tiles]]\nx = 2\ny = 0\n");
        assert!(matches!(
            load_config_from_str(&outside).unwrap_err(),
            ConfigError::ValidationError(_)
        ));

        let twice = format!(
            "{base}\n[[layout.tiles]]\nx = 1\ny = 0\n\n\
             [[layout.tiles]]\nx = 1\ny = 0\ncore = \"pe\"\n"
        );
        assert!(matches!(
            load_config_from_str(&twice).unwrap_err(),
            ConfigError::ValidationError(_)
        ));

        let unknown = format!("{base}\n[[layout.tiles]]\nx = 1\ny = 1\ncore = \"io\"\n");
        assert!(matches!(
            load_config_from_str(&unknown).unwrap_err(),
            ConfigError::UnknownCore(_)
        ));
    }

    #[test]
    fn global_wiring_checks() {
        let base = r#"
[fabric]
name = "cgra"
width = 2
height = 2
"#;
        let meso = format!("{base}\n[global]\nwiring = \"meso\"\n");
        assert!(matches!(
            load_config_from_str(&meso).unwrap_err(),
            ConfigError::MissingField(_)
        ));
        let zero = format!("{base}\n[global]\nwiring = \"fanout\"\nmax_fanout = 0\n");
        assert!(matches!(
            load_config_from_str(&zero).unwrap_err(),
            ConfigError::ValidationError(_)
        ));
        let fanout = format!("{base}\n[global]\n");
        let config = load_config_from_str(&fanout).unwrap();
        let global = config.global.unwrap();
        assert_eq!(global.wiring, WiringKind::Fanout);
        assert_eq!(global.max_fanout, None);
    }

    #[test]
    fn load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[fabric]\nname = \"disk\"\nwidth = 1\nheight = 1\n",
        )
        .unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.fabric.name, "disk");
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}
