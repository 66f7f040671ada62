//! Dense, handle-indexed storage for routing-graph entities.
//!
//! Graph nodes are allocated into an [`Arena`] and referred to everywhere else
//! by an opaque [`ArenaId`] handle, so edges are plain handle pairs and the
//! graph never needs reference cycles even where the routing fabric itself
//! loops back on its own tracks.

use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

/// A handle type usable as an arena key.
pub trait ArenaId: Copy {
    /// Wraps a slot number.
    fn from_raw(index: u32) -> Self;

    /// Returns the slot number.
    fn as_raw(self) -> u32;
}

/// An append-only container addressed by handles.
///
/// Items are never reordered or removed: a handle stays valid for the
/// lifetime of the arena and allocation order is the iteration order.
#[derive(Debug, Clone)]
pub struct Arena<I: ArenaId, T> {
    slots: Vec<T>,
    _id: PhantomData<I>,
}

impl<I: ArenaId, T> Arena<I, T> {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            _id: PhantomData,
        }
    }

    /// Stores `item` and returns its handle.
    pub fn alloc(&mut self, item: T) -> I {
        let id = I::from_raw(self.slots.len() as u32);
        self.slots.push(item);
        id
    }

    /// Returns the item, or `None` for a handle from another arena.
    pub fn try_get(&self, id: I) -> Option<&T> {
        self.slots.get(id.as_raw() as usize)
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if nothing has been allocated.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// `(handle, item)` pairs in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = (I, &T)> {
        self.slots
            .iter()
            .enumerate()
            .map(|(slot, item)| (I::from_raw(slot as u32), item))
    }

    /// Items in allocation order.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.slots.iter()
    }
}

impl<I: ArenaId, T> Default for Arena<I, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: ArenaId, T> Index<I> for Arena<I, T> {
    type Output = T;

    fn index(&self, id: I) -> &T {
        &self.slots[id.as_raw() as usize]
    }
}

impl<I: ArenaId, T> IndexMut<I> for Arena<I, T> {
    fn index_mut(&mut self, id: I) -> &mut T {
        &mut self.slots[id.as_raw() as usize]
    }
}
