//! Group construction
//!
//! Provides [`create_group`] and the fluent [`PatchGroupBuilder`]. Both merge
//! source groups first and add named entries afterwards, so a name collision
//! is always reported against the sources.

use crate::config::GroupConfig;
use crate::entry::PatchEntry;
use crate::error::PatchError;
use crate::group::PatchGroup;
use crate::handle::{PatchHandle, SharedHandle};

/// Build a group from source groups and named entries
///
/// Sources are merged in order, then named entries are added in order.
///
/// # Errors
/// [`PatchError::DuplicateName`] for the first colliding name
///
/// # Example
///
/// ```rust
/// use multipatch::{create_group, PatchEntry, PatchSlot};
///
/// let x = PatchSlot::new(1_u32);
/// let y = PatchSlot::new(2_u32);
///
/// let first = create_group(&[], vec![("x", PatchEntry::handle(x.patch(10)))])?;
/// let second = create_group(&[], vec![("y", PatchEntry::handle(y.patch(20)))])?;
/// let both = create_group(&[&first, &second], Vec::new())?;
///
/// assert_eq!(both.names().collect::<Vec<_>>(), ["x", "y"]);
/// assert!(create_group(&[&first], vec![("x", PatchEntry::handle(y.patch(30)))]).is_err());
/// # Ok::<(), multipatch::PatchError>(())
/// ```
pub fn create_group(
    sources: &[&PatchGroup],
    named: Vec<(&str, PatchEntry)>,
) -> Result<PatchGroup, PatchError> {
    let mut group = PatchGroup::new();
    for source in sources {
        group.merge(source)?;
    }
    for (name, entry) in named {
        group.add_entry(name, entry)?;
    }
    Ok(group)
}

/// Fluent builder for [`PatchGroup`]
///
/// Errors are deferred to [`PatchGroupBuilder::build`].
#[derive(Debug, Default)]
#[must_use]
pub struct PatchGroupBuilder<'a> {
    sources: Vec<&'a PatchGroup>,
    named: Vec<(String, PatchEntry)>,
    config: GroupConfig,
}

impl<'a> PatchGroupBuilder<'a> {
    /// Create empty builder
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge every entry of `source`
    #[inline]
    pub fn merge(mut self, source: &'a PatchGroup) -> Self {
        self.sources.push(source);
        self
    }

    /// Add a handle under `name`
    #[inline]
    pub fn patch<H: PatchHandle + 'static>(self, name: impl Into<String>, handle: H) -> Self {
        self.entry(name, PatchEntry::handle(handle))
    }

    /// Add a shared handle under `name`
    #[inline]
    pub fn shared(self, name: impl Into<String>, handle: SharedHandle) -> Self {
        self.entry(name, PatchEntry::Handle(handle))
    }

    /// Add a nested group under `name`
    #[inline]
    pub fn group(self, name: impl Into<String>, group: PatchGroup) -> Self {
        self.entry(name, PatchEntry::Group(group))
    }

    /// Add an entry under `name`
    #[inline]
    pub fn entry(mut self, name: impl Into<String>, entry: PatchEntry) -> Self {
        self.named.push((name.into(), entry));
        self
    }

    /// Set the group configuration
    #[inline]
    pub fn config(mut self, config: GroupConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the group
    ///
    /// # Errors
    /// Same as [`create_group`]
    pub fn build(self) -> Result<PatchGroup, PatchError> {
        let mut group = PatchGroup::with_config(self.config);
        for source in self.sources {
            group.merge(source)?;
        }
        for (name, entry) in self.named {
            group.add_entry(name, entry)?;
        }
        Ok(group)
    }
}
