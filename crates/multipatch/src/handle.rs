//! Patch handle capability
//!
//! Provides the [`PatchHandle`] trait and [`SharedHandle`], the form in which
//! handles are stored so the same patch can be registered in several groups.

use crate::error::HandleError;
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Value installed by an active patch
///
/// Type-erased; use [`crate::PatchGroup::mock`] for typed access.
pub type Replacement = Arc<dyn Any + Send + Sync>;

/// Something that can temporarily replace a value and restore it
///
/// Implementations must tolerate any number of activate/deactivate cycles.
/// The group never calls `activate` twice without a `deactivate` in between.
pub trait PatchHandle: Send {
    /// Install the replacement and return it
    ///
    /// # Errors
    /// Handle-specific failure; the group propagates it from `start()`
    fn activate(&mut self) -> Result<Replacement, HandleError>;

    /// Restore whatever `activate` replaced
    ///
    /// # Errors
    /// Handle-specific failure; the group propagates it from `stop()`
    fn deactivate(&mut self) -> Result<(), HandleError>;

    /// What this handle patches (for diagnostics)
    fn target(&self) -> String {
        String::from("<opaque>")
    }
}

/// Reference-counted patch handle
///
/// Cloning shares the underlying handle. Merging groups copies these,
/// so both groups drive the same patch.
#[derive(Clone)]
pub struct SharedHandle {
    inner: Arc<Mutex<dyn PatchHandle>>,
}

impl SharedHandle {
    /// Wrap a handle
    #[must_use]
    pub fn new<H: PatchHandle + 'static>(handle: H) -> Self {
        Self {
            inner: Arc::new(Mutex::new(handle)),
        }
    }

    /// Activate the wrapped handle
    ///
    /// # Errors
    /// Whatever the handle reports
    pub fn activate(&self) -> Result<Replacement, HandleError> {
        self.inner.lock().activate()
    }

    /// Deactivate the wrapped handle
    ///
    /// # Errors
    /// Whatever the handle reports
    pub fn deactivate(&self) -> Result<(), HandleError> {
        self.inner.lock().deactivate()
    }

    /// Target description of the wrapped handle
    #[must_use]
    pub fn target(&self) -> String {
        self.inner.lock().target()
    }

    /// Check if both point at the same handle
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for SharedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedHandle")
            .field("target", &self.target())
            .finish_non_exhaustive()
    }
}
