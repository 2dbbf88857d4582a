//! Multipatch
//!
//! Bundle several independent patches into one named group that is
//! activated and restored as a unit.
//!
//! # Core Concepts
//!
//! - [`PatchHandle`]: anything that can install a replacement and restore the original
//! - [`PatchGroup`]: ordered, name-keyed collection of patches with a start/stop lifecycle
//! - [`PatchEntry`]: an entry is either a plain handle or a nested group
//! - [`PatchGuard`]: scoped activation, stops the group when dropped
//! - [`PatchGroupBuilder`] / [`create_group`]: build a group from other groups and named patches
//! - [`PatchSlot`] / [`SlotPatch`]: in-process replaceable values and the handles that patch them
//!
//! # Example
//!
//! ```rust
//! use multipatch::{PatchGroupBuilder, PatchSlot};
//!
//! let greeting = PatchSlot::new(String::from("hello"));
//! let farewell = PatchSlot::new(String::from("bye"));
//!
//! let mut group = PatchGroupBuilder::new()
//!     .patch("greeting", greeting.patch(String::from("hi")))
//!     .patch("farewell", farewell.patch(String::from("ciao")))
//!     .build()?;
//!
//! {
//!     let active = group.enter()?;
//!     assert_eq!(*greeting.get(), "hi");
//!     assert_eq!(*active.mock::<String>("farewell")?, "ciao");
//! }
//!
//! assert_eq!(*greeting.get(), "hello");
//! assert!(group.get("greeting").is_err());
//! # Ok::<(), multipatch::PatchError>(())
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod builder;
mod config;
mod entry;
mod error;
mod group;
mod handle;
mod slot;

// Re-exports
pub use builder::{create_group, PatchGroupBuilder};
pub use config::{ActivationFailurePolicy, GroupConfig, StopOrder};
pub use entry::PatchEntry;
pub use error::{ConfigError, DeactivationFailure, HandleError, PatchError};
pub use group::{Active, PatchGroup, PatchGuard, RunState};
pub use handle::{PatchHandle, Replacement, SharedHandle};
pub use slot::{FnPatch, PatchSlot, SlotPatch};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for building and driving patch groups
    pub use crate::{
        create_group, Active, GroupConfig, PatchEntry, PatchError, PatchGroup,
        PatchGroupBuilder, PatchGuard, PatchHandle, PatchSlot, Replacement, SlotPatch,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
