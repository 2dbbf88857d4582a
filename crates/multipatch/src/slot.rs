//! In-process patch targets
//!
//! [`PatchSlot`] is a shared value cell that code under test reads instead of
//! a hard-wired value. [`SlotPatch`] swaps a replacement into a slot and puts
//! the original back. [`FnPatch`] builds a handle from two closures.

use crate::error::HandleError;
use crate::handle::{PatchHandle, Replacement};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Shared, replaceable value
///
/// Clones share the same cell, so a slot can be stored wherever the value is
/// needed and patched from a test.
pub struct PatchSlot<T> {
    inner: Arc<RwLock<SlotState<T>>>,
}

struct SlotState<T> {
    current: Arc<T>,

    /// Installed patches, oldest first, each with the value it displaced
    installed: Vec<(u64, Arc<T>)>,

    next_id: u64,
}

impl<T: Send + Sync + 'static> PatchSlot<T> {
    /// Create slot holding `value`
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(RwLock::new(SlotState {
                current: Arc::new(value),
                installed: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// Current value, patched or not
    #[must_use]
    pub fn get(&self) -> Arc<T> {
        Arc::clone(&self.inner.read().current)
    }

    /// Overwrite the current value without patching
    pub fn set(&self, value: T) {
        self.inner.write().current = Arc::new(value);
    }

    /// Check if at least one patch is installed
    #[must_use]
    pub fn is_patched(&self) -> bool {
        !self.inner.read().installed.is_empty()
    }

    /// Create a handle that installs `replacement` into this slot
    #[must_use]
    pub fn patch(&self, replacement: T) -> SlotPatch<T> {
        SlotPatch::new(self.clone(), replacement)
    }

    fn install(&self, value: Arc<T>) -> u64 {
        let mut state = self.inner.write();
        let id = state.next_id;
        state.next_id += 1;
        let displaced = std::mem::replace(&mut state.current, value);
        state.installed.push((id, displaced));
        id
    }

    /// Remove patch `id`, in any order
    ///
    /// Removing the top patch puts its displaced value back. Removing a lower
    /// one hands its displaced value to the patch above it, so the slot ends
    /// at its unpatched value once every patch is gone.
    fn restore(&self, id: u64) -> bool {
        let mut state = self.inner.write();
        let Some(pos) = state.installed.iter().position(|(slot_id, _)| *slot_id == id) else {
            return false;
        };
        let (_, displaced) = state.installed.remove(pos);
        match state.installed.get_mut(pos) {
            Some((_, above)) => *above = displaced,
            None => state.current = displaced,
        }
        true
    }
}

impl<T> Clone for PatchSlot<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for PatchSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.read();
        f.debug_struct("PatchSlot")
            .field("current", &state.current)
            .field("depth", &state.installed.len())
            .finish()
    }
}

/// Handle that patches a [`PatchSlot`]
///
/// `activate` installs the replacement on top of the slot; `deactivate`
/// removes it again. Several patches on one slot may be removed in any order.
pub struct SlotPatch<T> {
    slot: PatchSlot<T>,
    replacement: Arc<T>,
    installed: Option<u64>,
    label: String,
}

impl<T: Send + Sync + 'static> SlotPatch<T> {
    /// Create handle installing `replacement` into `slot`
    #[must_use]
    pub fn new(slot: PatchSlot<T>, replacement: T) -> Self {
        Self {
            slot,
            replacement: Arc::new(replacement),
            installed: None,
            label: std::any::type_name::<T>().to_string(),
        }
    }

    /// Describe the patched target in diagnostics
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Check if the replacement is currently installed by this handle
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.installed.is_some()
    }
}

impl<T: Send + Sync + 'static> PatchHandle for SlotPatch<T> {
    fn activate(&mut self) -> Result<Replacement, HandleError> {
        if self.installed.is_some() {
            return Err(HandleError::AlreadyActive);
        }
        self.installed = Some(self.slot.install(Arc::clone(&self.replacement)));
        let value: Replacement = self.replacement.clone();
        Ok(value)
    }

    fn deactivate(&mut self) -> Result<(), HandleError> {
        let id = self.installed.take().ok_or(HandleError::NotActive)?;
        if self.slot.restore(id) {
            Ok(())
        } else {
            Err(HandleError::NotActive)
        }
    }

    fn target(&self) -> String {
        self.label.clone()
    }
}

impl<T> fmt::Debug for SlotPatch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotPatch")
            .field("label", &self.label)
            .field("active", &self.installed.is_some())
            .finish_non_exhaustive()
    }
}

type ActivateFn = Box<dyn FnMut() -> Result<Replacement, HandleError> + Send>;
type DeactivateFn = Box<dyn FnMut() -> Result<(), HandleError> + Send>;

/// Handle built from closures
pub struct FnPatch {
    on_activate: ActivateFn,
    on_deactivate: DeactivateFn,
    label: String,
}

impl FnPatch {
    /// Create handle from activate and deactivate closures
    #[must_use]
    pub fn new<A, D>(activate: A, deactivate: D) -> Self
    where
        A: FnMut() -> Result<Replacement, HandleError> + Send + 'static,
        D: FnMut() -> Result<(), HandleError> + Send + 'static,
    {
        Self {
            on_activate: Box::new(activate),
            on_deactivate: Box::new(deactivate),
            label: String::from("fn"),
        }
    }

    /// Describe the patched target in diagnostics
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

impl PatchHandle for FnPatch {
    fn activate(&mut self) -> Result<Replacement, HandleError> {
        (self.on_activate)()
    }

    fn deactivate(&mut self) -> Result<(), HandleError> {
        (self.on_deactivate)()
    }

    fn target(&self) -> String {
        self.label.clone()
    }
}

impl fmt::Debug for FnPatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnPatch")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}
