//! `weft build`: generate a fabric and write its place-and-route files.
//!
//! Loads `weft.toml`, builds and finalizes the interconnect, applies the
//! configured global wiring and dumps one `.graph` file per layer plus the
//! `.layout` and `.info` files into the output directory.

use std::path::{Path, PathBuf};

use crate::pipeline::{build_fabric, resolve_project_root};
use crate::{BuildArgs, GlobalArgs};

/// Runs the `weft build` command.
pub fn run(args: &BuildArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project_dir = resolve_project_root(global)?;
    let config = weft_config::load_config(&project_dir)?;

    if !global.quiet {
        eprintln!(
            "   Building {} ({}x{})",
            config.fabric.name, config.fabric.width, config.fabric.height
        );
    }

    let ic = build_fabric(&config)?;
    let stats = ic.stats();
    if !global.quiet {
        eprintln!(
            "   Finalized: {} selection points, {} interface ports",
            stats.selection_points, stats.lifted_ports
        );
    }

    let out_dir = determine_build_dir(&project_dir, args.out.as_deref());
    let design = args.design.as_deref().unwrap_or(&config.fabric.name);
    let artifacts = ic.dump_pnr(&out_dir, design)?;

    if !global.quiet {
        for path in artifacts.graphs.values() {
            eprintln!("     Wrote {}", path.display());
        }
        eprintln!("     Wrote {}", artifacts.layout.display());
        eprintln!("     Wrote {}", artifacts.info.display());
        eprintln!("    Finished fingerprint {}", artifacts.fingerprint);
    }
    Ok(0)
}

/// Determines the output directory for build artifacts.
///
/// CLI `--out` overrides the default `<project>/build`.
pub fn determine_build_dir(project_dir: &Path, cli_out: Option<&str>) -> PathBuf {
    match cli_out {
        Some(dir) => PathBuf::from(dir),
        None => project_dir.join("build"),
    }
}
