//! Compute-core declarations.
//!
//! Cores are opaque to the fabric: a tile only needs the names, widths and
//! directions of the core's ports. The functional model additionally asks a
//! core to compute its outputs from its inputs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;
use weft_common::{Coord, PortDirection};

/// One declared core port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorePort {
    /// Port name, unique within the core.
    pub name: String,
    /// Bit-width; selects the layer the port lives in.
    pub width: u32,
    /// Data direction relative to the core.
    pub direction: PortDirection,
    /// Registered output: the model updates it on clock edges only.
    #[serde(default)]
    pub sequential: bool,
}

impl CorePort {
    /// Declares a combinational input.
    pub fn input(name: impl Into<String>, width: u32) -> Self {
        Self {
            name: name.into(),
            width,
            direction: PortDirection::Input,
            sequential: false,
        }
    }

    /// Declares a combinational output.
    pub fn output(name: impl Into<String>, width: u32) -> Self {
        Self {
            name: name.into(),
            width,
            direction: PortDirection::Output,
            sequential: false,
        }
    }

    /// Marks the port as registered.
    pub fn registered(mut self) -> Self {
        self.sequential = true;
        self
    }
}

/// A compute core bound to a tile.
pub trait Core: Debug + Send + Sync {
    /// Core name, used in the layout export.
    fn name(&self) -> &str;

    /// Declared ports.
    fn ports(&self) -> Vec<CorePort>;

    /// Computes output port values from input port values.
    ///
    /// Outputs missing from the returned map read as 0.
    fn eval_model(&self, inputs: &BTreeMap<String, u64>) -> BTreeMap<String, u64> {
        let _ = inputs;
        BTreeMap::new()
    }
}

/// A declaration-only core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericCore {
    name: String,
    ports: Vec<CorePort>,
}

impl GenericCore {
    /// Creates a core with the given ports.
    pub fn new(name: impl Into<String>, ports: Vec<CorePort>) -> Self {
        Self {
            name: name.into(),
            ports,
        }
    }
}

impl Core for GenericCore {
    fn name(&self) -> &str {
        &self.name
    }

    fn ports(&self) -> Vec<CorePort> {
        self.ports.clone()
    }
}

/// Cores keyed by tile coordinate, owned by whoever drives construction.
///
/// A coordinate with no entry gets a switchbox-only tile.
#[derive(Debug, Clone, Default)]
pub struct CoreCache {
    cores: BTreeMap<Coord, Arc<dyn Core>>,
}

impl CoreCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a core to a coordinate, replacing any previous one.
    pub fn insert(&mut self, coord: Coord, core: Arc<dyn Core>) {
        self.cores.insert(coord, core);
    }

    /// Returns the core at a coordinate.
    pub fn get(&self, coord: Coord) -> Option<Arc<dyn Core>> {
        self.cores.get(&coord).cloned()
    }

    /// Returns the core at a coordinate, creating it on first use.
    pub fn get_or_insert_with(
        &mut self,
        coord: Coord,
        create: impl FnOnce() -> Arc<dyn Core>,
    ) -> Arc<dyn Core> {
        self.cores.entry(coord).or_insert_with(create).clone()
    }

    /// Number of bound coordinates.
    pub fn len(&self) -> usize {
        self.cores.len()
    }

    /// Returns `true` if no core is bound.
    pub fn is_empty(&self) -> bool {
        self.cores.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_core_outputs_default_to_empty() {
        let core = GenericCore::new(
            "pe",
            vec![CorePort::input("a", 16), CorePort::output("b", 16)],
        );
        assert_eq!(core.name(), "pe");
        assert_eq!(core.ports().len(), 2);
        let mut inputs = BTreeMap::new();
        inputs.insert("a".to_string(), 5);
        assert!(core.eval_model(&inputs).is_empty());
    }

    #[test]
    fn cache_shares_instances() {
        let mut cache = CoreCache::new();
        let c = Coord::new(1, 0);
        let first = cache.get_or_insert_with(c, || Arc::new(GenericCore::new("mem", vec![])));
        let second = cache.get_or_insert_with(c, || Arc::new(GenericCore::new("pe", vec![])));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.name(), "mem");
        assert_eq!(cache.len(), 1);
        assert!(cache.get(Coord::new(0, 0)).is_none());
    }

    #[test]
    fn port_serde_defaults_combinational() {
        let port: CorePort =
            serde_json::from_str(r#"{"name":"x","width":1,"direction":"output"}"#).unwrap();
        assert!(!port.sequential);
        assert_eq!(port, CorePort::output("x", 1));
        assert!(CorePort::output("q", 1).registered().sequential);
    }
}
