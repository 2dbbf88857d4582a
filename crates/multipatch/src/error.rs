//! Error types for patch groups
//!
//! - [`PatchError`]: registration, lookup and lifecycle failures of a group
//! - [`HandleError`]: failures reported by an individual patch handle
//! - [`ConfigError`]: invalid group configuration

use std::fmt;

/// Errors raised by a [`crate::PatchGroup`]
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    /// Name already registered in the group
    #[error("a patch with the same name already exists: {name}")]
    DuplicateName {
        /// Conflicting name
        name: String,
    },

    /// Empty patch name
    #[error("patch names must not be empty")]
    InvalidName,

    /// Entries cannot be added while the group is running
    #[error("cannot add patch '{name}' while the group is running")]
    GroupRunning {
        /// Name that was being added
        name: String,
    },

    /// Group is not running or has no active patch under this name
    #[error("there was no active patch with the given name: {name}")]
    NoActiveReplacement {
        /// Requested name
        name: String,
    },

    /// Active value exists but is not of the requested kind
    #[error("active patch '{name}' is not a {expected}")]
    ReplacementType {
        /// Requested name
        name: String,

        /// Requested type or kind
        expected: &'static str,
    },

    /// A handle failed to activate during `start()`
    #[error("failed to activate patch '{name}': {source}")]
    Activation {
        /// Entry that failed
        name: String,

        /// Error reported by the handle
        #[source]
        source: HandleError,

        /// Entries that could not be rolled back afterwards
        rollback_failures: Vec<DeactivationFailure>,
    },

    /// One or more handles failed to deactivate during `stop()`
    #[error("failed to deactivate {} patch(es): {}", .failures.len(), FailureList(.failures))]
    Deactivation {
        /// Every failure, in deactivation order
        failures: Vec<DeactivationFailure>,
    },
}

impl PatchError {
    /// Create duplicate name error
    #[inline]
    #[must_use]
    pub fn duplicate_name(name: impl Into<String>) -> Self {
        Self::DuplicateName { name: name.into() }
    }

    /// Create lookup failure
    #[inline]
    #[must_use]
    pub fn no_active_replacement(name: impl Into<String>) -> Self {
        Self::NoActiveReplacement { name: name.into() }
    }

    /// Check if this is a duplicate name error
    #[inline]
    #[must_use]
    pub fn is_duplicate_name(&self) -> bool {
        matches!(self, Self::DuplicateName { .. })
    }

    /// Check if this is a lookup failure
    #[inline]
    #[must_use]
    pub fn is_lookup_failure(&self) -> bool {
        matches!(
            self,
            Self::NoActiveReplacement { .. } | Self::ReplacementType { .. }
        )
    }

    /// Entry name the error refers to, if any
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::DuplicateName { name }
            | Self::GroupRunning { name }
            | Self::NoActiveReplacement { name }
            | Self::ReplacementType { name, .. }
            | Self::Activation { name, .. } => Some(name),
            Self::InvalidName | Self::Deactivation { .. } => None,
        }
    }
}

/// Errors reported by a [`crate::PatchHandle`]
#[derive(Debug, thiserror::Error)]
pub enum HandleError {
    /// Handle-specific failure
    #[error("patch handle failed: {0}")]
    Failed(String),

    /// Handle is already installed
    #[error("patch is already active")]
    AlreadyActive,

    /// Handle was never installed
    #[error("patch is not active")]
    NotActive,

    /// Nested group failed to start or stop
    #[error("nested group: {0}")]
    Group(#[source] Box<PatchError>),

    /// Any other error
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl HandleError {
    /// Create handle failure with message
    #[inline]
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Wrap an arbitrary error
    #[inline]
    #[must_use]
    pub fn other(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Other(Box::new(error))
    }
}

impl From<PatchError> for HandleError {
    fn from(error: PatchError) -> Self {
        Self::Group(Box::new(error))
    }
}

/// A single failed deactivation
#[derive(Debug)]
pub struct DeactivationFailure {
    /// Entry name
    pub name: String,

    /// Error reported by the handle
    pub error: HandleError,
}

impl DeactivationFailure {
    /// Create failure record
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, error: HandleError) -> Self {
        Self {
            name: name.into(),
            error,
        }
    }
}

impl fmt::Display for DeactivationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}': {}", self.name, self.error)
    }
}

struct FailureList<'a>(&'a [DeactivationFailure]);

impl fmt::Display for FailureList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{failure}")?;
        }
        Ok(())
    }
}

/// Errors loading a [`crate::GroupConfig`]
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML could not be parsed into a config
    #[error("invalid group config: {0}")]
    Parse(#[from] toml::de::Error),
}
