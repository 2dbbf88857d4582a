//! Group configuration
//!
//! Provides [`GroupConfig`] for choosing how a group unwinds.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Order in which `stop()` deactivates entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopOrder {
    /// Last activated, first deactivated - default
    #[default]
    Reverse,

    /// Same order as activation
    Insertion,
}

/// What `start()` does when a handle fails to activate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationFailurePolicy {
    /// Roll back entries already activated and stay stopped - default
    #[default]
    Unwind,

    /// Keep entries already activated; the group is running with those only
    KeepPartial,
}

/// Per-group configuration
///
/// # Example
///
/// ```rust
/// use multipatch::{ActivationFailurePolicy, GroupConfig, StopOrder};
///
/// let config = GroupConfig::from_toml_str(r#"
///     stop_order = "insertion"
///     on_activation_failure = "keep_partial"
/// "#)?;
///
/// assert_eq!(config.stop_order, StopOrder::Insertion);
/// assert_eq!(config.on_activation_failure, ActivationFailurePolicy::KeepPartial);
/// # Ok::<(), multipatch::ConfigError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupConfig {
    /// Deactivation order used by `stop()`
    pub stop_order: StopOrder,

    /// Activation failure handling used by `start()`
    pub on_activation_failure: ActivationFailurePolicy,
}

impl GroupConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With stop order
    #[inline]
    #[must_use]
    pub fn with_stop_order(mut self, order: StopOrder) -> Self {
        self.stop_order = order;
        self
    }

    /// With activation failure policy
    #[inline]
    #[must_use]
    pub fn with_activation_failure(mut self, policy: ActivationFailurePolicy) -> Self {
        self.on_activation_failure = policy;
        self
    }

    /// Parse configuration from TOML; missing keys keep their defaults
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] on malformed TOML or unknown values
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }
}
