//! Opaque ID newtypes for routing-graph entities.
//!
//! Each ID is a thin `u32` wrapper that is `Copy`, `Ord`, `Hash`, and
//! `Serialize`/`Deserialize`. IDs are handed out by
//! [`Arena::alloc`](crate::arena::Arena::alloc) and are only meaningful inside
//! the arena that produced them.

use crate::arena::ArenaId;
use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
        pub struct $name(u32);

        impl $name {
            /// Creates an ID from a raw `u32` index.
            pub fn from_raw(index: u32) -> Self {
                Self(index)
            }

            /// Returns the raw `u32` index.
            pub fn as_raw(self) -> u32 {
                self.0
            }
        }

        impl ArenaId for $name {
            fn from_raw(index: u32) -> Self {
                Self(index)
            }

            fn as_raw(self) -> u32 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(
    /// Opaque, copyable handle for a node within one data-width layer graph.
    NodeId
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn id_roundtrip() {
        let id = NodeId::from_raw(42);
        assert_eq!(id.as_raw(), 42);
    }

    #[test]
    fn id_ordering() {
        let mut set = BTreeSet::new();
        set.insert(NodeId::from_raw(3));
        set.insert(NodeId::from_raw(1));
        set.insert(NodeId::from_raw(3));
        let raw: Vec<u32> = set.into_iter().map(NodeId::as_raw).collect();
        assert_eq!(raw, vec![1, 3]);
    }

    #[test]
    fn id_serde_roundtrip() {
        let id = NodeId::from_raw(99);
        let json = serde_json::to_string(&id).unwrap();
        let restored: NodeId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, restored);
    }

    #[test]
    fn id_display() {
        assert_eq!(format!("{}", NodeId::from_raw(7)), "7");
    }
}
