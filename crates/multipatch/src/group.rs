//! Patch group lifecycle
//!
//! Provides [`PatchGroup`], an ordered, name-keyed collection of patches that
//! is started and stopped as one unit, and [`PatchGuard`] for scoped use.
//!
//! # State machine
//!
//! ```text
//! NotRunning --start()--> Running --stop()--> NotRunning
//! Running    --start()--> Running      (no-op)
//! NotRunning --stop()---> NotRunning   (no-op)
//! ```

use crate::config::{ActivationFailurePolicy, GroupConfig, StopOrder};
use crate::entry::PatchEntry;
use crate::error::{DeactivationFailure, HandleError, PatchError};
use crate::handle::{PatchHandle, Replacement, SharedHandle};
use indexmap::IndexMap;
use std::any::Any;
use std::ops::Deref;
use std::sync::Arc;

/// Lifecycle state of a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    /// Created or stopped; nothing is patched
    #[default]
    NotRunning,

    /// Started; active replacements can be looked up
    Running,
}

/// Active value found by [`PatchGroup::get`]
#[derive(Debug, Clone, Copy)]
pub enum Active<'a> {
    /// Replacement installed by a plain handle
    Value(&'a Replacement),

    /// Running nested group
    Group(&'a PatchGroup),
}

impl<'a> Active<'a> {
    /// Replacement value, if this is a plain handle
    #[inline]
    #[must_use]
    pub fn as_value(&self) -> Option<&'a Replacement> {
        match *self {
            Self::Value(value) => Some(value),
            Self::Group(_) => None,
        }
    }

    /// Nested group, if this is a group
    #[inline]
    #[must_use]
    pub fn as_group(&self) -> Option<&'a PatchGroup> {
        match *self {
            Self::Group(group) => Some(group),
            Self::Value(_) => None,
        }
    }
}

/// Named collection of patches managed as one unit
///
/// Names are unique at all times; duplicates are rejected when registered,
/// not when started. Entries are activated in insertion order.
#[derive(Debug, Default)]
pub struct PatchGroup {
    /// Registered entries in insertion order
    entries: IndexMap<String, PatchEntry>,

    /// Replacements of plain handles, only while running
    active: IndexMap<String, Replacement>,

    /// Entry indices in activation order, only while running
    activated: Vec<usize>,

    state: RunState,
    config: GroupConfig,
}

impl PatchGroup {
    /// Create empty group with default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create empty group with configuration
    #[inline]
    #[must_use]
    pub fn with_config(config: GroupConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Register a handle under `name`
    ///
    /// # Errors
    /// - [`PatchError::DuplicateName`] if `name` is taken
    /// - [`PatchError::InvalidName`] if `name` is empty
    /// - [`PatchError::GroupRunning`] if the group is running
    pub fn add_patch<H: PatchHandle + 'static>(
        &mut self,
        name: impl Into<String>,
        handle: H,
    ) -> Result<&mut Self, PatchError> {
        self.add_entry(name, PatchEntry::handle(handle))
    }

    /// Register an already shared handle under `name`
    ///
    /// # Errors
    /// Same as [`Self::add_patch`]
    pub fn add_shared(
        &mut self,
        name: impl Into<String>,
        handle: SharedHandle,
    ) -> Result<&mut Self, PatchError> {
        self.add_entry(name, PatchEntry::Handle(handle))
    }

    /// Register a nested group under `name`
    ///
    /// Starting this group starts the nested one; while running, `get(name)`
    /// returns the running nested group.
    ///
    /// # Errors
    /// Same as [`Self::add_patch`]
    pub fn add_group(
        &mut self,
        name: impl Into<String>,
        group: PatchGroup,
    ) -> Result<&mut Self, PatchError> {
        self.add_entry(name, PatchEntry::Group(group))
    }

    /// Register an entry under `name`
    ///
    /// A failed registration leaves the group unchanged.
    ///
    /// # Errors
    /// Same as [`Self::add_patch`]
    pub fn add_entry(
        &mut self,
        name: impl Into<String>,
        entry: PatchEntry,
    ) -> Result<&mut Self, PatchError> {
        let name = name.into();
        self.check_insert(&name)?;
        self.entries.insert(name, entry);
        Ok(self)
    }

    /// Copy every entry of `other` into this group
    ///
    /// All names are checked before anything is copied, so a conflict leaves
    /// this group unchanged. `other` is never modified.
    ///
    /// # Errors
    /// Same as [`Self::add_patch`], for the first conflicting name of `other`
    pub fn merge(&mut self, other: &PatchGroup) -> Result<&mut Self, PatchError> {
        for name in other.entries.keys() {
            self.check_insert(name)?;
        }
        for (name, entry) in &other.entries {
            self.entries.insert(name.clone(), entry.duplicate());
        }
        Ok(self)
    }

    fn check_insert(&self, name: &str) -> Result<(), PatchError> {
        if self.is_running() {
            return Err(PatchError::GroupRunning {
                name: name.to_string(),
            });
        }
        if name.is_empty() {
            return Err(PatchError::InvalidName);
        }
        if self.entries.contains_key(name) {
            return Err(PatchError::duplicate_name(name));
        }
        Ok(())
    }

    /// Same entries and config, not running, sharing no active state
    pub(crate) fn detached_copy(&self) -> PatchGroup {
        PatchGroup {
            entries: self
                .entries
                .iter()
                .map(|(name, entry)| (name.clone(), entry.duplicate()))
                .collect(),
            ..PatchGroup::with_config(self.config)
        }
    }

    /// Activate every entry in insertion order
    ///
    /// No-op on a running group. On failure the configured
    /// [`ActivationFailurePolicy`] decides what stays active.
    ///
    /// # Errors
    /// [`PatchError::Activation`] for the first entry that failed
    pub fn start(&mut self) -> Result<&mut Self, PatchError> {
        if self.is_running() {
            return Ok(self);
        }

        tracing::debug!(entries = self.entries.len(), "starting patch group");

        for index in 0..self.entries.len() {
            let Some((name, entry)) = self.entries.get_index_mut(index) else {
                continue;
            };

            tracing::trace!(name = %name, target = %entry.target(), "activating patch");

            match entry.activate() {
                Ok(replacement) => {
                    if let Some(value) = replacement {
                        self.active.insert(name.clone(), value);
                    }
                    self.activated.push(index);
                }
                Err(source) => {
                    let name = name.clone();
                    if entry.left_running() {
                        self.activated.push(index);
                    }
                    return Err(self.activation_failed(name, source));
                }
            }
        }

        self.state = RunState::Running;
        Ok(self)
    }

    fn activation_failed(&mut self, name: String, source: HandleError) -> PatchError {
        match self.config.on_activation_failure {
            ActivationFailurePolicy::Unwind => {
                let rollback_failures = self.deactivate_activated(StopOrder::Reverse);
                for failure in &rollback_failures {
                    tracing::warn!(
                        name = %failure.name,
                        error = %failure.error,
                        "failed to roll back patch"
                    );
                }
                self.active.clear();
                self.state = RunState::NotRunning;
                PatchError::Activation {
                    name,
                    source,
                    rollback_failures,
                }
            }
            ActivationFailurePolicy::KeepPartial => {
                self.state = RunState::Running;
                PatchError::Activation {
                    name,
                    source,
                    rollback_failures: Vec::new(),
                }
            }
        }
    }

    /// Deactivate every entry that was activated
    ///
    /// No-op on a group that is not running. Every entry is attempted even if
    /// an earlier one fails; replacements are cleared and the group is
    /// stopped before any failure is returned.
    ///
    /// # Errors
    /// [`PatchError::Deactivation`] listing every entry that failed
    pub fn stop(&mut self) -> Result<(), PatchError> {
        if !self.is_running() {
            return Ok(());
        }

        tracing::debug!(entries = self.activated.len(), "stopping patch group");

        let failures = self.deactivate_activated(self.config.stop_order);
        self.active.clear();
        self.state = RunState::NotRunning;

        if failures.is_empty() {
            Ok(())
        } else {
            Err(PatchError::Deactivation { failures })
        }
    }

    fn deactivate_activated(&mut self, order: StopOrder) -> Vec<DeactivationFailure> {
        let mut activated = std::mem::take(&mut self.activated);
        if order == StopOrder::Reverse {
            activated.reverse();
        }

        let mut failures = Vec::new();
        for index in activated {
            let Some((name, entry)) = self.entries.get_index_mut(index) else {
                continue;
            };

            tracing::trace!(name = %name, "deactivating patch");

            if let Err(error) = entry.deactivate() {
                failures.push(DeactivationFailure::new(name.clone(), error));
            }
        }
        failures
    }

    /// Start the group and return a guard that stops it when dropped
    ///
    /// If activation fails nothing is left running, whatever the configured
    /// policy.
    ///
    /// # Errors
    /// Same as [`Self::start`]
    pub fn enter(&mut self) -> Result<PatchGuard<'_>, PatchError> {
        let started = self.start().map(|_| ());
        if let Err(err) = started {
            if let Err(stop_err) = self.stop() {
                tracing::warn!(error = %stop_err, "failed to stop partially started patch group");
            }
            return Err(err);
        }
        Ok(PatchGuard {
            group: self,
            exited: false,
        })
    }

    /// Run `body` with the group started, stopping it afterwards
    ///
    /// The group is stopped even if `body` fails or panics. An error from
    /// `body` is returned unchanged; a stop error is only returned when
    /// `body` succeeded, and is logged otherwise.
    ///
    /// # Errors
    /// Activation errors, the error of `body`, or the deactivation error
    pub fn scoped<T, E, F>(&mut self, body: F) -> Result<T, E>
    where
        F: FnOnce(&PatchGroup) -> Result<T, E>,
        E: From<PatchError>,
    {
        let guard = self.enter()?;
        match body(&*guard) {
            Ok(value) => {
                guard.exit()?;
                Ok(value)
            }
            Err(err) => {
                drop(guard);
                Err(err)
            }
        }
    }

    /// Look up the active value registered under `name`
    ///
    /// Repeated lookups within one running session return the same value.
    ///
    /// # Errors
    /// [`PatchError::NoActiveReplacement`] if the group is not running or
    /// `name` has no active entry
    pub fn get(&self, name: &str) -> Result<Active<'_>, PatchError> {
        if !self.is_running() {
            return Err(PatchError::no_active_replacement(name));
        }
        if let Some(value) = self.active.get(name) {
            return Ok(Active::Value(value));
        }
        match self.entries.get(name) {
            Some(PatchEntry::Group(group)) if group.is_running() => Ok(Active::Group(group)),
            _ => Err(PatchError::no_active_replacement(name)),
        }
    }

    /// Look up the replacement installed by the plain handle `name`
    ///
    /// # Errors
    /// Lookup failures of [`Self::get`], or [`PatchError::ReplacementType`]
    /// if `name` is a nested group
    pub fn replacement(&self, name: &str) -> Result<&Replacement, PatchError> {
        self.get(name)?
            .as_value()
            .ok_or_else(|| PatchError::ReplacementType {
                name: name.to_string(),
                expected: "replacement value",
            })
    }

    /// Look up the replacement under `name` as a `T`
    ///
    /// # Errors
    /// Lookup failures of [`Self::replacement`], or
    /// [`PatchError::ReplacementType`] if the value is not a `T`
    pub fn mock<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, PatchError> {
        let value = Arc::clone(self.replacement(name)?);
        value
            .downcast::<T>()
            .map_err(|_| PatchError::ReplacementType {
                name: name.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// Look up the running nested group under `name`
    ///
    /// # Errors
    /// Lookup failures of [`Self::get`], or [`PatchError::ReplacementType`]
    /// if `name` is a plain handle
    pub fn nested(&self, name: &str) -> Result<&PatchGroup, PatchError> {
        self.get(name)?
            .as_group()
            .ok_or_else(|| PatchError::ReplacementType {
                name: name.to_string(),
                expected: "patch group",
            })
    }

    /// Registered entry under `name`, running or not
    #[inline]
    #[must_use]
    pub fn entry(&self, name: &str) -> Option<&PatchEntry> {
        self.entries.get(name)
    }

    /// Check if `name` is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names in insertion order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of registered entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no entries are registered
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current lifecycle state
    #[inline]
    #[must_use]
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Check if the group is running
    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == RunState::Running
    }

    /// Group configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &GroupConfig {
        &self.config
    }
}

/// Scoped activation of a [`PatchGroup`]
///
/// Dereferences to the running group. Dropping the guard stops the group,
/// also while unwinding; use [`PatchGuard::exit`] to observe stop errors.
#[derive(Debug)]
#[must_use = "dropping the guard immediately stops the group"]
pub struct PatchGuard<'a> {
    group: &'a mut PatchGroup,
    exited: bool,
}

impl PatchGuard<'_> {
    /// Stop the group and report deactivation failures
    ///
    /// # Errors
    /// Same as [`PatchGroup::stop`]
    pub fn exit(mut self) -> Result<(), PatchError> {
        self.exited = true;
        self.group.stop()
    }
}

impl Deref for PatchGuard<'_> {
    type Target = PatchGroup;

    fn deref(&self) -> &PatchGroup {
        self.group
    }
}

impl Drop for PatchGuard<'_> {
    fn drop(&mut self) {
        if self.exited {
            return;
        }
        if let Err(err) = self.group.stop() {
            tracing::warn!(error = %err, "failed to stop patch group on scope exit");
        }
    }
}
