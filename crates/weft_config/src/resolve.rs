//! Layout resolution: which core sits on a given tile.

use crate::error::ConfigError;
use crate::types::{CorePortConfig, FabricConfig};
use std::collections::BTreeMap;

/// The core placed on one tile, with its port list copied out of the
/// configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCore {
    /// Core name from `[cores]`.
    pub name: String,
    /// Ports by name.
    pub ports: BTreeMap<String, CorePortConfig>,
}

/// Resolves the core on tile `(x, y)`.
///
/// A `[[layout.tiles]]` override wins over `layout.default`; an override
/// without a core leaves the tile empty. Returns `Ok(None)` for empty tiles.
pub fn resolve_core(
    config: &FabricConfig,
    x: u32,
    y: u32,
) -> Result<Option<ResolvedCore>, ConfigError> {
    if x >= config.fabric.width || y >= config.fabric.height {
        return Err(ConfigError::ValidationError(format!(
            "tile ({x}, {y}) is outside the {}x{} grid",
            config.fabric.width, config.fabric.height
        )));
    }

    let name = match config.layout.tiles.iter().find(|t| t.x == x && t.y == y) {
        Some(tile) => tile.core.as_ref(),
        None => config.layout.default.as_ref(),
    };
    let Some(name) = name else {
        return Ok(None);
    };

    let def = config
        .cores
        .get(name)
        .ok_or_else(|| ConfigError::UnknownCore(name.clone()))?;
    Ok(Some(ResolvedCore {
        name: name.clone(),
        ports: def.ports.clone(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_config_from_str;

    const LAYOUT: &str = r#"
[fabric]
name = "cgra"
width = 3
height = 2

[cores.pe.ports.data_in]
width = 16
direction = "input"

[cores.mem.ports.rd]
width = 16
direction = "output"
sequential = true

[layout]
default = "pe"

[[layout.tiles]]
x = 2
y = 0
core = "mem"

[[layout.tiles]]
x = 0
y = 1
"#;

    #[test]
    fn default_and_overrides() {
        let config = load_config_from_str(LAYOUT).unwrap();
        let pe = resolve_core(&config, 1, 1).unwrap().unwrap();
        assert_eq!(pe.name, "pe");
        assert!(pe.ports.contains_key("data_in"));

        let mem = resolve_core(&config, 2, 0).unwrap().unwrap();
        assert_eq!(mem.name, "mem");
        assert!(mem.ports["rd"].sequential);

        assert_eq!(resolve_core(&config, 0, 1).unwrap(), None);
    }

    #[test]
    fn no_default_means_empty() {
        let config = load_config_from_str(
            "[fabric]\nname = \"cgra\"\nwidth = 2\nheight = 2\n",
        )
        .unwrap();
        assert_eq!(resolve_core(&config, 0, 0).unwrap(), None);
    }

    #[test]
    fn outside_grid_errors() {
        let config = load_config_from_str(LAYOUT).unwrap();
        let err = resolve_core(&config, 3, 0).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn unvalidated_unknown_core_errors() {
        let mut config = load_config_from_str(LAYOUT).unwrap();
        config.cores.remove("mem");
        let err = resolve_core(&config, 2, 0).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownCore(_)));
    }
}
