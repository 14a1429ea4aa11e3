//! Late-Bound Resource Slots
//!
//! Passes are built during `sync`, but several of the resources they read
//! (pooled textures, growable buffers) only get a concrete handle during
//! `draw`. A [`Slot`] is a shared cell the owner fills once the handle is
//! known; commands recorded earlier hold a clone of the slot and resolve it at
//! submission time.
//!
//! Frame orchestration is single-threaded, so a plain `Rc<Cell<_>>` is enough.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::renderer::backend::{BufferHandle, TextureHandle};

/// Shared, late-bound handle.
pub struct Slot<H: Copy> {
    cell: Rc<Cell<Option<H>>>,
}

impl<H: Copy> Slot<H> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cell: Rc::new(Cell::new(None)),
        }
    }

    #[inline]
    pub fn set(&self, handle: Option<H>) {
        self.cell.set(handle);
    }

    #[inline]
    #[must_use]
    pub fn get(&self) -> Option<H> {
        self.cell.get()
    }

    /// Returns `true` when both slots share the same cell.
    #[must_use]
    pub fn same_slot(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }
}

impl<H: Copy> Clone for Slot<H> {
    fn clone(&self) -> Self {
        Self {
            cell: Rc::clone(&self.cell),
        }
    }
}

impl<H: Copy> Default for Slot<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Copy + fmt::Debug> fmt::Debug for Slot<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Slot").field(&self.cell.get()).finish()
    }
}

pub type TextureSlot = Slot<TextureHandle>;
pub type BufferSlot = Slot<BufferHandle>;

/// A resource reference inside a recorded command.
#[derive(Clone, Debug)]
pub enum Binding<H: Copy> {
    /// Handle known at record time.
    Direct(H),
    /// Handle filled in later through a [`Slot`].
    Deferred(Slot<H>),
}

impl<H: Copy> Binding<H> {
    /// Resolves the handle; `None` means the owner never filled the slot.
    #[inline]
    #[must_use]
    pub fn resolve(&self) -> Option<H> {
        match self {
            Self::Direct(handle) => Some(*handle),
            Self::Deferred(slot) => slot.get(),
        }
    }
}

impl From<TextureHandle> for Binding<TextureHandle> {
    fn from(handle: TextureHandle) -> Self {
        Self::Direct(handle)
    }
}

impl From<BufferHandle> for Binding<BufferHandle> {
    fn from(handle: BufferHandle) -> Self {
        Self::Direct(handle)
    }
}

impl<H: Copy> From<&Slot<H>> for Binding<H> {
    fn from(slot: &Slot<H>) -> Self {
        Self::Deferred(slot.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn test_deferred_binding_sees_later_value() {
        let mut keys: SlotMap<TextureHandle, ()> = SlotMap::with_key();
        let handle = keys.insert(());

        let slot = TextureSlot::new();
        let binding = Binding::from(&slot);
        assert_eq!(binding.resolve(), None);

        slot.set(Some(handle));
        assert_eq!(binding.resolve(), Some(handle));

        slot.set(None);
        assert_eq!(binding.resolve(), None);
    }

    #[test]
    fn test_clones_share_cell() {
        let a = BufferSlot::new();
        let b = a.clone();
        assert!(a.same_slot(&b));
        assert!(!a.same_slot(&BufferSlot::new()));
    }
}
