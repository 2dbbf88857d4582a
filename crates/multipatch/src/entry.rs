//! Group entries
//!
//! A [`PatchEntry`] is either a plain handle or a nested group. Both expose
//! the same activate/deactivate surface so the group lifecycle never needs to
//! know which one it holds.

use crate::error::HandleError;
use crate::group::PatchGroup;
use crate::handle::{PatchHandle, Replacement, SharedHandle};

/// Entry registered under a name in a [`PatchGroup`]
#[derive(Debug)]
pub enum PatchEntry {
    /// Plain patch; its replacement is whatever `activate` returns
    Handle(SharedHandle),

    /// Nested group; activating it starts it and the running group is its value
    Group(PatchGroup),
}

impl PatchEntry {
    /// Wrap a handle
    #[must_use]
    pub fn handle<H: PatchHandle + 'static>(handle: H) -> Self {
        Self::Handle(SharedHandle::new(handle))
    }

    /// Activate the entry
    ///
    /// Returns the replacement for plain handles and `None` for nested groups,
    /// whose value is the group itself.
    pub(crate) fn activate(&mut self) -> Result<Option<Replacement>, HandleError> {
        match self {
            Self::Handle(handle) => handle.activate().map(Some),
            Self::Group(group) => {
                group.start()?;
                Ok(None)
            }
        }
    }

    /// Deactivate the entry
    pub(crate) fn deactivate(&mut self) -> Result<(), HandleError> {
        match self {
            Self::Handle(handle) => handle.deactivate(),
            Self::Group(group) => Ok(group.stop()?),
        }
    }

    /// Check if a failed activation still left this entry running
    ///
    /// Only nested groups can tell; a plain handle that failed is assumed inactive.
    pub(crate) fn left_running(&self) -> bool {
        matches!(self, Self::Group(group) if group.is_running())
    }

    /// Copy for another group: handles are shared, nested groups are copied stopped
    pub(crate) fn duplicate(&self) -> Self {
        match self {
            Self::Handle(handle) => Self::Handle(handle.clone()),
            Self::Group(group) => Self::Group(group.detached_copy()),
        }
    }

    /// Target description (for diagnostics)
    #[must_use]
    pub fn target(&self) -> String {
        match self {
            Self::Handle(handle) => handle.target(),
            Self::Group(group) => format!("group of {}", group.len()),
        }
    }

    /// Check if this entry is a nested group
    #[inline]
    #[must_use]
    pub fn is_group(&self) -> bool {
        matches!(self, Self::Group(_))
    }
}

impl From<SharedHandle> for PatchEntry {
    fn from(handle: SharedHandle) -> Self {
        Self::Handle(handle)
    }
}

impl From<PatchGroup> for PatchEntry {
    fn from(group: PatchGroup) -> Self {
        Self::Group(group)
    }
}
