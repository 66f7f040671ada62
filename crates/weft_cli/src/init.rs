//! `weft init`: project scaffolding command.
//!
//! Creates a project directory holding a template `weft.toml` that describes
//! a small fabric with one processing-element core on every tile.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use weft_config::CONFIG_FILE;

use crate::GlobalArgs;

/// Runs the `weft init` command.
///
/// If `name` is `Some`, creates a new subdirectory with that name.
/// Otherwise initializes in the current working directory.
pub fn run(name: Option<String>, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project_dir = match &name {
        Some(n) => {
            let dir = PathBuf::from(n);
            if dir.exists() {
                return Err(format!("directory '{n}' already exists").into());
            }
            fs::create_dir_all(&dir)?;
            dir
        }
        None => std::env::current_dir()?,
    };
    if project_dir.join(CONFIG_FILE).exists() {
        return Err(format!(
            "{} already exists in {}",
            CONFIG_FILE,
            project_dir.display()
        )
        .into());
    }

    let project_name = project_dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("fabric");

    if !global.quiet {
        eprintln!("  Creating new Weft project `{project_name}`");
    }
    write_weft_toml(&project_dir, project_name)?;
    if !global.quiet {
        eprintln!("     Created {}", project_dir.join(CONFIG_FILE).display());
    }
    Ok(0)
}

/// Design names end up in file names; keep them to a safe alphabet.
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Writes the template `weft.toml`.
fn write_weft_toml(root: &Path, name: &str) -> io::Result<()> {
    let name = sanitize_name(name);
    let content = format!(
        r#"[fabric]
name = "{name}"
width = 4
height = 4
bit_widths = [1, 16]
switchbox = "disjoint"
lift_ports = true

[[fabric.tracks]]
length = 1
count = 5

[bus]
addr_width = 8
data_width = 32
tile_id_width = 16

[pipeline]
all = true

[cores.pe.ports.data_in_16b]
width = 16
direction = "input"

[cores.pe.ports.data_out_16b]
width = 16
direction = "output"

[cores.pe.ports.bit_in]
width = 1
direction = "input"

[cores.pe.ports.bit_out]
width = 1
direction = "output"

[connections.data_in_16b]
sides = "all"
io = "in"

[connections.data_out_16b]
sides = "all"
io = "out"

[connections.bit_in]
sides = "all"
io = "in"

[connections.bit_out]
sides = "all"
io = "out"

[layout]
default = "pe"

[global]
wiring = "meso"
region_width = 2
"#
    );
    fs::write(root.join(CONFIG_FILE), content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn quiet() -> GlobalArgs {
        GlobalArgs {
            quiet: true,
            verbose: false,
            config: None,
        }
    }

    #[test]
    fn init_creates_config() {
        let tmp = TempDir::new().unwrap();
        let project_dir = tmp.path().join("my_fabric");
        let code = run(Some(project_dir.to_str().unwrap().to_string()), &quiet()).unwrap();
        assert_eq!(code, 0);
        assert!(project_dir.join(CONFIG_FILE).exists());
    }

    #[test]
    fn init_generates_valid_toml() {
        let tmp = TempDir::new().unwrap();
        let project_dir = tmp.path().join("toml_proj");
        run(Some(project_dir.to_str().unwrap().to_string()), &quiet()).unwrap();

        let config = weft_config::load_config(&project_dir);
        assert!(config.is_ok(), "generated weft.toml should be valid: {config:?}");
        let config = config.unwrap();
        assert_eq!(config.fabric.name, "toml_proj");
        assert_eq!(config.fabric.width, 4);
        assert_eq!(config.num_tracks(), 5);
        assert!(config.pipeline.all);
    }

    #[test]
    fn template_builds() {
        let tmp = TempDir::new().unwrap();
        let project_dir = tmp.path().join("buildable");
        run(Some(project_dir.to_str().unwrap().to_string()), &quiet()).unwrap();
        let config = weft_config::load_config(&project_dir).unwrap();
        let ic = crate::pipeline::build_fabric(&config).unwrap();
        assert_eq!(ic.stats().width, 4);
        assert!(ic.global_network().is_some());
    }

    #[test]
    fn init_existing_dir_fails() {
        let tmp = TempDir::new().unwrap();
        let project_dir = tmp.path().join("exists");
        fs::create_dir_all(&project_dir).unwrap();
        let result = run(Some(project_dir.to_str().unwrap().to_string()), &quiet());
        assert!(result.is_err());
    }

    #[test]
    fn names_are_sanitized() {
        assert_eq!(sanitize_name("my fabric.v2"), "my_fabric_v2");
        assert_eq!(sanitize_name("cgra-4x4"), "cgra-4x4");
    }
}
