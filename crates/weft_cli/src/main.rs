//! Weft CLI: the command-line interface for the CGRA fabric generator.
//!
//! Provides `weft init` for project scaffolding, `weft build` for generating
//! a fabric and writing its place-and-route files, and `weft stats` for
//! summarizing a fabric without writing anything.

#![warn(missing_docs)]

mod build;
mod init;
mod pipeline;
mod stats;

use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

/// Weft: a routing-fabric generator for coarse-grained reconfigurable arrays.
#[derive(Parser, Debug)]
#[command(name = "weft", version, about = "Weft CGRA fabric generator")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a custom `weft.toml` configuration file or project directory.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new Weft project.
    Init {
        /// Project name (creates a subdirectory). If omitted, initializes in
        /// the current directory.
        name: Option<String>,
    },
    /// Build the fabric and write place-and-route files.
    Build(BuildArgs),
    /// Print fabric statistics.
    Stats(StatsArgs),
}

/// Arguments for the `weft build` subcommand.
#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Output directory (default: `<project>/build`).
    #[arg(short, long)]
    pub out: Option<String>,

    /// Design name used for the `.info` and `.layout` files
    /// (default: `fabric.name`).
    #[arg(short, long)]
    pub design: Option<String>,
}

/// Arguments for the `weft stats` subcommand.
#[derive(Parser, Debug)]
pub struct StatsArgs {
    /// Output format.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Report output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Optional path to a custom config file.
    pub config: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        config: cli.config,
    };
    init_tracing(&global);

    let result = match cli.command {
        Command::Init { name } => init::run(name, &global),
        Command::Build(ref args) => build::run(args, &global),
        Command::Stats(ref args) => stats::run(args, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

/// Default log filter for the given flags.
fn default_filter(global: &GlobalArgs) -> &'static str {
    if global.quiet {
        "error"
    } else if global.verbose {
        "debug"
    } else {
        "warn"
    }
}

/// Installs the stderr subscriber. `RUST_LOG` takes precedence over the flags.
fn init_tracing(global: &GlobalArgs) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(global)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parse_init_default() {
        let cli = Cli::parse_from(["weft", "init"]);
        match cli.command {
            Command::Init { name } => assert!(name.is_none()),
            _ => panic!("expected Init command"),
        }
    }

    #[test]
    fn parse_init_with_name() {
        let cli = Cli::parse_from(["weft", "init", "my_fabric"]);
        match cli.command {
            Command::Init { name } => assert_eq!(name.as_deref(), Some("my_fabric")),
            _ => panic!("expected Init command"),
        }
    }

    #[test]
    fn parse_build_default() {
        let cli = Cli::parse_from(["weft", "build"]);
        match cli.command {
            Command::Build(args) => {
                assert!(args.out.is_none());
                assert!(args.design.is_none());
            }
            _ => panic!("expected Build command"),
        }
    }

    #[test]
    fn parse_build_with_args() {
        let cli = Cli::parse_from(["weft", "build", "--out", "pnr", "--design", "top"]);
        match cli.command {
            Command::Build(args) => {
                assert_eq!(args.out.as_deref(), Some("pnr"));
                assert_eq!(args.design.as_deref(), Some("top"));
            }
            _ => panic!("expected Build command"),
        }
    }

    #[test]
    fn parse_stats_formats() {
        let cli = Cli::parse_from(["weft", "stats"]);
        match cli.command {
            Command::Stats(args) => assert_eq!(args.format, ReportFormat::Text),
            _ => panic!("expected Stats command"),
        }
        let cli = Cli::parse_from(["weft", "stats", "--format", "json"]);
        match cli.command {
            Command::Stats(args) => assert_eq!(args.format, ReportFormat::Json),
            _ => panic!("expected Stats command"),
        }
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::parse_from(["weft", "--quiet", "--config", "fab/weft.toml", "stats"]);
        assert!(cli.quiet);
        assert!(!cli.verbose);
        assert_eq!(cli.config.as_deref(), Some("fab/weft.toml"));
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from(["weft", "build", "-v"]);
        assert!(cli.verbose);
    }

    #[test]
    fn filter_follows_flags() {
        let mut global = GlobalArgs {
            quiet: false,
            verbose: false,
            config: None,
        };
        assert_eq!(default_filter(&global), "warn");
        global.verbose = true;
        assert_eq!(default_filter(&global), "debug");
        global.quiet = true;
        assert_eq!(default_filter(&global), "error");
    }
}
