//! Testing utilities for the multipatch workspace
//!
//! Shared handles and fixtures for exercising patch groups.

#![allow(missing_docs)]

use multipatch::{HandleError, PatchHandle, PatchSlot, Replacement};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Install a test-writer subscriber once; honours `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone, Default)]
pub struct HandleCounts {
    activations: Arc<AtomicUsize>,
    deactivations: Arc<AtomicUsize>,
}

impl HandleCounts {
    pub fn activations(&self) -> usize {
        self.activations.load(Ordering::SeqCst)
    }

    pub fn deactivations(&self) -> usize {
        self.deactivations.load(Ordering::SeqCst)
    }
}

/// Handle returning a fixed value and counting calls
#[derive(Debug)]
pub struct CountingHandle {
    value: Replacement,
    counts: HandleCounts,
}

impl CountingHandle {
    pub fn value(&self) -> &Replacement {
        &self.value
    }
}

impl PatchHandle for CountingHandle {
    fn activate(&mut self) -> Result<Replacement, HandleError> {
        self.counts.activations.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::clone(&self.value))
    }

    fn deactivate(&mut self) -> Result<(), HandleError> {
        self.counts.deactivations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn target(&self) -> String {
        String::from("counting")
    }
}

pub fn counting<T: Send + Sync + 'static>(value: T) -> (CountingHandle, HandleCounts) {
    let counts = HandleCounts::default();
    let handle = CountingHandle {
        value: Arc::new(value),
        counts: counts.clone(),
    };
    (handle, counts)
}

/// Which call a [`FailingHandle`] fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    Activate,
    Deactivate,
}

/// Handle that fails on one side of its lifecycle
#[derive(Debug)]
pub struct FailingHandle {
    fail_on: FailOn,
    counts: HandleCounts,
}

impl PatchHandle for FailingHandle {
    fn activate(&mut self) -> Result<Replacement, HandleError> {
        if self.fail_on == FailOn::Activate {
            return Err(HandleError::failed("activation refused"));
        }
        self.counts.activations.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(()))
    }

    fn deactivate(&mut self) -> Result<(), HandleError> {
        self.counts.deactivations.fetch_add(1, Ordering::SeqCst);
        if self.fail_on == FailOn::Deactivate {
            return Err(HandleError::failed("deactivation refused"));
        }
        Ok(())
    }
}

pub fn failing(fail_on: FailOn) -> (FailingHandle, HandleCounts) {
    let counts = HandleCounts::default();
    let handle = FailingHandle {
        fail_on,
        counts: counts.clone(),
    };
    (handle, counts)
}

/// Shared call log for ordering assertions
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Handle that records `+name` on activate and `-name` on deactivate
    pub fn handle(&self, name: &str) -> RecordingHandle {
        RecordingHandle {
            name: name.to_string(),
            log: self.clone(),
        }
    }

    fn push(&self, entry: String) {
        self.calls.lock().push(entry);
    }
}

#[derive(Debug)]
pub struct RecordingHandle {
    name: String,
    log: CallLog,
}

impl PatchHandle for RecordingHandle {
    fn activate(&mut self) -> Result<Replacement, HandleError> {
        self.log.push(format!("+{}", self.name));
        Ok(Arc::new(self.name.clone()))
    }

    fn deactivate(&mut self) -> Result<(), HandleError> {
        self.log.push(format!("-{}", self.name));
        Ok(())
    }

    fn target(&self) -> String {
        self.name.clone()
    }
}

/// Two independent slots standing in for two patchable types
pub fn class_slots() -> (PatchSlot<&'static str>, PatchSlot<&'static str>) {
    (PatchSlot::new("Class1"), PatchSlot::new("Class2"))
}
