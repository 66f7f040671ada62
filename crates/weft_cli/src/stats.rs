//! `weft stats`: print a fabric summary.

use weft_fabric::FabricStats;

use crate::pipeline::{build_fabric, resolve_project_root};
use crate::{GlobalArgs, ReportFormat, StatsArgs};

/// Runs the `weft stats` command.
pub fn run(args: &StatsArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project_dir = resolve_project_root(global)?;
    let config = weft_config::load_config(&project_dir)?;
    let ic = build_fabric(&config)?;
    println!("{}", render(&config.fabric.name, &ic.stats(), args.format)?);
    Ok(0)
}

/// Renders the statistics in the requested format.
pub fn render(
    name: &str,
    stats: &FabricStats,
    format: ReportFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    match format {
        ReportFormat::Json => Ok(serde_json::to_string_pretty(stats)?),
        ReportFormat::Text => Ok(render_text(name, stats)),
    }
}

fn render_text(name: &str, stats: &FabricStats) -> String {
    let mut lines = vec![format!("fabric {name} {}x{}", stats.width, stats.height)];
    for (width, nodes) in &stats.nodes {
        let edges = stats.edges.get(width).copied().unwrap_or(0);
        lines.push(format!("  layer {width:>3}b  {nodes} nodes  {edges} edges"));
    }
    lines.push(format!("  selection points  {}", stats.selection_points));
    lines.push(format!("  interface ports   {}", stats.lifted_ports));
    match (stats.global_max_fanout, stats.global_depth) {
        (Some(fanout), Some(depth)) => {
            lines.push(format!("  global fan-out    {fanout}"));
            lines.push(format!("  global depth      {depth}"));
        }
        _ => lines.push("  global wiring     none".to_string()),
    }
    lines.join("\n")
}
