//! Place-and-route export.
//!
//! A finalized fabric is written as three kinds of plain-text files:
//!
//! * `<design>.info`: design summary and the names of the other files;
//! * `<width>.graph`: one per layer, `NODE` lines in arena order followed by
//!   `EDGE` lines grouped by destination in candidate order;
//! * `<design>.layout`: one `TILE` line per coordinate and a grid of core
//!   initials.

use crate::interconnect::Interconnect;
use crate::node::{NodeKind, NodeRef};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use weft_common::{ContentHash, Coord, WeftError, WeftResult};

/// Paths of the files written by [`dump_pnr`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PnrArtifacts {
    /// The `.info` file.
    pub info: PathBuf,
    /// The `.layout` file.
    pub layout: PathBuf,
    /// One `.graph` file per layer width.
    pub graphs: BTreeMap<u32, PathBuf>,
    /// XXH3 fingerprint over every graph file, in width order.
    pub fingerprint: ContentHash,
}

/// Writes the place-and-route files of `ic` into `dir`, creating it if
/// needed and overwriting existing files.
pub fn dump_pnr(ic: &Interconnect, dir: &Path, design: &str) -> WeftResult<PnrArtifacts> {
    ic.ensure_finalized()?;
    if design.is_empty()
        || !design
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(WeftError::config(format!("invalid design name {design:?}")));
    }
    fs::create_dir_all(dir)?;

    let mut graphs = BTreeMap::new();
    let mut texts = Vec::new();
    for &width in ic.layer_graphs().keys() {
        let text = render_graph(ic, width)?;
        let path = dir.join(format!("{width}.graph"));
        fs::write(&path, &text)?;
        graphs.insert(width, path);
        texts.push(text);
    }
    let fingerprint = ContentHash::from_parts(texts.iter().map(|t| t.as_bytes()));

    let layout = dir.join(format!("{design}.layout"));
    fs::write(&layout, render_layout(ic))?;

    let info_path = dir.join(format!("{design}.info"));
    fs::write(&info_path, render_info(ic, design, fingerprint))?;

    info!(
        dir = %dir.display(),
        design,
        graphs = graphs.len(),
        %fingerprint,
        "place-and-route files written"
    );
    Ok(PnrArtifacts {
        info: info_path,
        layout,
        graphs,
        fingerprint,
    })
}

/// Renders the routing graph of one layer.
pub fn render_graph(ic: &Interconnect, width: u32) -> WeftResult<String> {
    let graph = ic
        .layer(width)
        .ok_or_else(|| WeftError::lookup(format!("no {width}-bit layer")))?;
    let table = ic.address_table()?;

    let mut out = String::new();
    let _ = writeln!(out, "# width {width}");
    for (id, node) in graph.iter() {
        let (side, track, io) = match &node.kind {
            NodeKind::SwitchBox { side, track, io } => {
                (side.to_string(), track.to_string(), io.to_string())
            }
            NodeKind::Register { side, track } | NodeKind::RegisterMux { side, track } => {
                (side.to_string(), track.to_string(), "-".to_string())
            }
            NodeKind::Port { .. } => ("-".to_string(), "-".to_string(), "-".to_string()),
        };
        let _ = writeln!(
            out,
            "NODE {id} {} {} {} {} {side} {track} {io} {}",
            node.kind.prefix(),
            node.coord.x,
            node.coord.y,
            node.width,
            node.canonical_name()
        );
    }
    for edge in graph.edges() {
        if edge.configurable {
            let sel = table
                .get(NodeRef::new(width, edge.dst))
                .ok_or_else(|| WeftError::state(format!("node {} has no address", edge.dst)))?;
            let _ = writeln!(
                out,
                "EDGE {} {} {} {:#010x} {}",
                edge.src, edge.dst, edge.index, sel.address, sel.sel_width
            );
        } else {
            let _ = writeln!(out, "EDGE {} {} {} wire", edge.src, edge.dst, edge.index);
        }
    }
    Ok(out)
}

fn core_label(ic: &Interconnect, coord: Coord) -> Option<String> {
    ic.tile(coord)
        .and_then(|tile| tile.core())
        .map(|core| core.name().to_string())
}

/// Renders the tile layout.
pub fn render_layout(ic: &Interconnect) -> String {
    let spec = ic.spec();
    let mut out = String::new();
    for &coord in ic.tiles().keys() {
        let name = core_label(ic, coord).unwrap_or_else(|| "-".to_string());
        let _ = writeln!(out, "TILE {} {} {name}", coord.x, coord.y);
    }
    let _ = writeln!(out, "LAYOUT {} {}", spec.width, spec.height);
    for y in 0..spec.height {
        let row: String = (0..spec.width)
            .map(|x| {
                core_label(ic, Coord::new(x, y))
                    .and_then(|name| name.chars().next())
                    .map_or('.', |c| c.to_ascii_lowercase())
            })
            .collect();
        let _ = writeln!(out, "{row}");
    }
    out
}

/// Renders the design summary.
pub fn render_info(ic: &Interconnect, design: &str, fingerprint: ContentHash) -> String {
    let spec = ic.spec();
    let mut out = String::new();
    let _ = writeln!(out, "design {design}");
    let _ = writeln!(out, "grid {} {}", spec.width, spec.height);
    let widths: Vec<String> = spec.bit_widths.iter().map(u32::to_string).collect();
    let _ = writeln!(out, "layers {}", widths.join(" "));
    for seg in &spec.tracks {
        let _ = writeln!(out, "tracks length={} count={}", seg.length, seg.count);
    }
    let _ = writeln!(out, "switchbox {}", spec.topology);
    let _ = writeln!(
        out,
        "bus addr_width={} data_width={} tile_id_width={}",
        spec.bus.addr_width, spec.bus.data_width, spec.bus.tile_id_width
    );
    let _ = writeln!(out, "layout {design}.layout");
    for width in &spec.bit_widths {
        let _ = writeln!(out, "graph {width} {width}.graph");
    }
    match ic.global_network() {
        Some(net) => {
            let _ = writeln!(
                out,
                "global {} max_fanout={} depth={}",
                net.wiring(),
                net.max_fanout(),
                net.depth()
            );
        }
        None => {
            let _ = writeln!(out, "global none");
        }
    }
    let _ = writeln!(out, "fingerprint {fingerprint}");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cores::{Core, CoreCache, CorePort, GenericCore};
    use crate::global::apply_global_fanout_wiring;
    use crate::spec::{InterconnectSpec, PortConnection};
    use std::sync::Arc;
    use weft_common::SbIo;

    fn fabric() -> Interconnect {
        let mut cores = CoreCache::new();
        let pe: Arc<dyn Core> = Arc::new(GenericCore::new(
            "pe",
            vec![CorePort::input("a", 16), CorePort::output("b", 16)],
        ));
        cores.insert(Coord::new(0, 0), pe.clone());
        cores.insert(Coord::new(1, 1), pe);
        let spec = InterconnectSpec::new(2, 2)
            .with_bit_widths([1, 16])
            .with_lift_ports(true)
            .connect("a", PortConnection::all_sides(SbIo::In))
            .connect("b", PortConnection::all_sides(SbIo::Out));
        let mut ic = Interconnect::build(&spec, &cores).unwrap();
        ic.finalize().unwrap();
        ic
    }

    #[test]
    fn graph_lists_nodes_then_edges() {
        let ic = fabric();
        let text = render_graph(&ic, 16).unwrap();
        let first_edge = text.lines().position(|l| l.starts_with("EDGE")).unwrap();
        let last_node = text.lines().collect::<Vec<_>>().iter().rposition(|l| l.starts_with("NODE")).unwrap();
        assert!(last_node < first_edge);
        assert!(text.contains("NODE 0 SB 0 0 16 NORTH 0 IN SB_T0_NORTH_IN_B16_X0_Y0"));
        assert!(text.contains("PORT 0 0 16 - - - PORT_a_B16_X0_Y0"));
        assert!(text.lines().any(|l| l.starts_with("EDGE") && l.ends_with("wire")));
        let nodes = text.lines().filter(|l| l.starts_with("NODE")).count();
        let edges = text.lines().filter(|l| l.starts_with("EDGE")).count();
        assert_eq!(nodes, ic.layer(16).unwrap().node_count());
        assert_eq!(edges, ic.layer(16).unwrap().edge_count());
    }

    #[test]
    fn layout_marks_cores() {
        let ic = fabric();
        let text = render_layout(&ic);
        assert!(text.contains("TILE 0 0 pe"));
        assert!(text.contains("TILE 1 0 -"));
        assert!(text.ends_with("p.\n.p\n"));
    }

    #[test]
    fn dump_writes_all_files() {
        let mut ic = fabric();
        apply_global_fanout_wiring(&mut ic, None).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested");
        let artifacts = dump_pnr(&ic, &out, "demo").unwrap();
        assert_eq!(artifacts.graphs.len(), 2);
        let info = fs::read_to_string(&artifacts.info).unwrap();
        assert!(info.contains("design demo"));
        assert!(info.contains("graph 16 16.graph"));
        assert!(info.contains("global fanout max_fanout=4 depth=1"));
        assert!(info.contains(&format!("fingerprint {}", artifacts.fingerprint)));

        let again = dump_pnr(&ic, &out, "demo").unwrap();
        assert_eq!(again.fingerprint, artifacts.fingerprint);
    }

    #[test]
    fn bad_design_name() {
        let ic = fabric();
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            dump_pnr(&ic, dir.path(), "../x"),
            Err(WeftError::Configuration(_))
        ));
        assert!(dump_pnr(&ic, dir.path(), "").is_err());
    }
}
