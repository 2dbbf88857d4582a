//! PatchGroup lifecycle tests
//!
//! End-to-end behaviour of building, starting, looking up and stopping groups.

use multipatch::prelude::*;
use multipatch::{ActivationFailurePolicy, SharedHandle, StopOrder};
use multipatch_test_utils::{counting, failing, init_tracing, CallLog, FailOn};
use pretty_assertions::assert_eq;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

#[test]
fn test_lookup_lifecycle_alpha_beta() {
    init_tracing();
    let (h1, _) = counting(1_u32);
    let (h2, _) = counting(2_u32);

    let mut group = create_group(
        &[],
        vec![("alpha", PatchEntry::handle(h1)), ("beta", PatchEntry::handle(h2))],
    )
    .unwrap();

    assert!(matches!(
        group.get("alpha"),
        Err(PatchError::NoActiveReplacement { .. })
    ));

    group.start().unwrap();
    assert_eq!(*group.mock::<u32>("alpha").unwrap(), 1);
    assert_eq!(*group.mock::<u32>("beta").unwrap(), 2);

    group.stop().unwrap();
    for name in ["alpha", "beta"] {
        let err = group.get(name).unwrap_err();
        assert!(matches!(err, PatchError::NoActiveReplacement { .. }));
        assert_eq!(err.name(), Some(name));
    }
}

#[test]
fn test_lookup_returns_activation_value() {
    let (handle, _) = counting(String::from("mock"));
    let expected = Arc::clone(handle.value());

    let mut group = PatchGroupBuilder::new().patch("svc", handle).build().unwrap();
    group.start().unwrap();

    let value = group.replacement("svc").unwrap();
    assert!(Arc::ptr_eq(value, &expected));
}

#[test]
fn test_repeated_lookup_is_stable() {
    let (handle, _) = counting(vec![1, 2, 3]);
    let mut group = PatchGroupBuilder::new().patch("list", handle).build().unwrap();
    group.start().unwrap();

    let first = group.mock::<Vec<i32>>("list").unwrap();
    let second = group.mock::<Vec<i32>>("list").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_merge_collapses_groups() {
    let (h1, _) = counting("x");
    let (h2, _) = counting("y");
    let g1 = create_group(&[], vec![("x", PatchEntry::handle(h1))]).unwrap();
    let g2 = create_group(&[], vec![("y", PatchEntry::handle(h2))]).unwrap();

    let mut g3 = create_group(&[&g1, &g2], Vec::new()).unwrap();
    g3.start().unwrap();
    assert!(g3.get("x").is_ok());
    assert!(g3.get("y").is_ok());
    g3.stop().unwrap();

    let (h3, _) = counting("x again");
    let err = create_group(&[&g1], vec![("x", PatchEntry::handle(h3))]).unwrap_err();
    assert!(err.is_duplicate_name());
    assert_eq!(err.name(), Some("x"));
}

#[test]
fn test_merge_is_non_destructive() {
    let log = CallLog::new();
    let mut source = PatchGroupBuilder::new()
        .patch("a", log.handle("a"))
        .build()
        .unwrap();

    let mut merged = PatchGroupBuilder::new()
        .merge(&source)
        .patch("b", log.handle("b"))
        .build()
        .unwrap();

    assert_eq!(source.names().collect::<Vec<_>>(), vec!["a"]);
    assert_eq!(merged.names().collect::<Vec<_>>(), vec!["a", "b"]);

    merged.start().unwrap();
    assert!(!source.is_running());
    assert!(source.get("a").is_err());
    merged.stop().unwrap();

    source.start().unwrap();
    assert_eq!(*source.mock::<String>("a").unwrap(), "a");
    assert!(source.get("b").is_err());
    source.stop().unwrap();

    assert_eq!(log.calls(), vec!["+a", "+b", "-b", "-a", "+a", "-a"]);
}

#[test]
fn test_merged_groups_share_handles() {
    let (handle, counts) = counting(0_u8);
    let source = PatchGroupBuilder::new().patch("h", handle).build().unwrap();
    let mut first = PatchGroupBuilder::new().merge(&source).build().unwrap();
    let mut second = PatchGroupBuilder::new().merge(&source).build().unwrap();

    first.start().unwrap();
    first.stop().unwrap();
    second.start().unwrap();
    second.stop().unwrap();

    assert_eq!(counts.activations(), 2);
    assert_eq!(counts.deactivations(), 2);
}

#[test]
fn test_shared_handle_registered_in_two_groups() {
    let (handle, counts) = counting(7_u32);
    let shared = SharedHandle::new(handle);

    let mut first = PatchGroup::new();
    first.add_shared("h", shared.clone()).unwrap();
    let mut second = PatchGroupBuilder::new()
        .shared("h", shared.clone())
        .build()
        .unwrap();

    first.start().unwrap();
    assert_eq!(*first.mock::<u32>("h").unwrap(), 7);
    first.stop().unwrap();

    second.start().unwrap();
    assert_eq!(*second.mock::<u32>("h").unwrap(), 7);
    second.stop().unwrap();

    assert_eq!(counts.activations(), 2);
    assert_eq!(counts.deactivations(), 2);
    assert_eq!(first.entry("h").unwrap().target(), shared.target());
}

#[test]
fn test_start_and_stop_idempotent() {
    let (handle, counts) = counting(());
    let mut group = PatchGroupBuilder::new().patch("h", handle).build().unwrap();

    group.stop().unwrap();
    assert_eq!(counts.deactivations(), 0);

    group.start().unwrap();
    group.start().unwrap();
    assert_eq!(counts.activations(), 1);

    group.stop().unwrap();
    group.stop().unwrap();
    assert_eq!(counts.deactivations(), 1);
}

#[test]
fn test_restart_cycles_are_independent() {
    let (handle, counts) = counting(5_u64);
    let mut group = PatchGroupBuilder::new().patch("n", handle).build().unwrap();

    for cycle in 1..=3 {
        group.start().unwrap();
        assert_eq!(*group.mock::<u64>("n").unwrap(), 5);
        group.stop().unwrap();
        assert!(group.get("n").is_err());
        assert_eq!(counts.activations(), cycle);
        assert_eq!(counts.deactivations(), cycle);
    }
}

#[test]
fn test_nested_group_lookup() {
    let (inner_handle, _) = counting(42_i32);
    let inner = PatchGroupBuilder::new()
        .patch("class1", inner_handle)
        .build()
        .unwrap();

    let mut outer = PatchGroupBuilder::new().group("other", inner).build().unwrap();

    {
        let active = outer.enter().unwrap();
        let nested = active.nested("other").unwrap();
        assert!(nested.is_running());
        assert_eq!(*nested.mock::<i32>("class1").unwrap(), 42);
    }

    assert!(outer.get("other").is_err());
    match outer.entry("other") {
        Some(PatchEntry::Group(inner)) => assert!(!inner.is_running()),
        _ => panic!("expected nested group"),
    }
}

#[test]
fn test_merge_copies_nested_group() {
    let log = CallLog::new();
    let inner = PatchGroupBuilder::new()
        .patch("leaf", log.handle("leaf"))
        .build()
        .unwrap();
    let source = PatchGroupBuilder::new().group("inner", inner).build().unwrap();

    let mut copy = PatchGroupBuilder::new().merge(&source).build().unwrap();
    copy.start().unwrap();
    assert!(copy.nested("inner").unwrap().get("leaf").is_ok());
    assert!(source.get("inner").is_err());
    copy.stop().unwrap();

    assert_eq!(log.calls(), vec!["+leaf", "-leaf"]);
}

#[test]
fn test_scoped_stops_after_body() {
    let (handle, counts) = counting("v");
    let mut group = PatchGroupBuilder::new().patch("v", handle).build().unwrap();

    let seen = group
        .scoped(|active| {
            assert!(active.is_running());
            active.mock::<&str>("v").map(|v| *v)
        })
        .unwrap();

    assert_eq!(seen, "v");
    assert!(!group.is_running());
    assert_eq!(counts.deactivations(), 1);
}

#[test]
fn test_scoped_body_error_propagates() {
    let (handle, counts) = counting(());
    let mut group = PatchGroupBuilder::new().patch("h", handle).build().unwrap();

    let result: anyhow::Result<()> = group.scoped(|_| Err(anyhow::anyhow!("body failed")));

    assert_eq!(result.unwrap_err().to_string(), "body failed");
    assert!(!group.is_running());
    assert_eq!(counts.deactivations(), 1);
}

#[test]
fn test_scoped_body_error_wins_over_stop_error() {
    let (broken, _) = failing(FailOn::Deactivate);
    let mut group = PatchGroupBuilder::new().patch("b", broken).build().unwrap();

    let result: anyhow::Result<()> = group.scoped(|_| Err(anyhow::anyhow!("body failed")));
    assert_eq!(result.unwrap_err().to_string(), "body failed");
    assert!(!group.is_running());
}

#[test]
fn test_scoped_stop_error_reported_on_success() {
    let (broken, _) = failing(FailOn::Deactivate);
    let mut group = PatchGroupBuilder::new().patch("b", broken).build().unwrap();

    let result = group.scoped(|_| Ok::<_, PatchError>(()));
    assert!(matches!(result, Err(PatchError::Deactivation { .. })));
}

#[test]
fn test_guard_stops_during_panic() {
    let (handle, counts) = counting(());
    let mut group = PatchGroupBuilder::new().patch("h", handle).build().unwrap();

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let _guard = group.enter().unwrap();
        panic!("test body panicked");
    }));

    assert!(outcome.is_err());
    assert!(!group.is_running());
    assert_eq!(counts.deactivations(), 1);
}

#[test]
fn test_guard_exit_reports_failure() {
    let (broken, counts) = failing(FailOn::Deactivate);
    let mut group = PatchGroupBuilder::new().patch("b", broken).build().unwrap();

    let guard = group.enter().unwrap();
    let err = guard.exit().unwrap_err();

    assert!(matches!(err, PatchError::Deactivation { ref failures } if failures[0].name == "b"));
    assert!(!group.is_running());
    assert_eq!(counts.deactivations(), 1);
}

#[test]
fn test_activation_failure_unwinds() {
    let log = CallLog::new();
    let (broken, _) = failing(FailOn::Activate);
    let mut group = PatchGroupBuilder::new()
        .patch("a", log.handle("a"))
        .patch("b", log.handle("b"))
        .patch("broken", broken)
        .patch("c", log.handle("c"))
        .build()
        .unwrap();

    let err = group.start().unwrap_err();
    match err {
        PatchError::Activation {
            name,
            rollback_failures,
            ..
        } => {
            assert_eq!(name, "broken");
            assert!(rollback_failures.is_empty());
        }
        other => panic!("unexpected error: {other}"),
    }

    assert!(!group.is_running());
    assert_eq!(log.calls(), vec!["+a", "+b", "-b", "-a"]);
}

#[test]
fn test_rollback_failures_are_reported() {
    let (sticky, _) = failing(FailOn::Deactivate);
    let (broken, _) = failing(FailOn::Activate);
    let mut group = PatchGroupBuilder::new()
        .patch("sticky", sticky)
        .patch("broken", broken)
        .build()
        .unwrap();

    match group.start().unwrap_err() {
        PatchError::Activation {
            rollback_failures, ..
        } => {
            assert_eq!(rollback_failures.len(), 1);
            assert_eq!(rollback_failures[0].name, "sticky");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!group.is_running());
}

#[test]
fn test_nested_failure_unwinds_outer() {
    let log = CallLog::new();
    let (broken, _) = failing(FailOn::Activate);
    let inner = PatchGroupBuilder::new()
        .patch("leaf", log.handle("leaf"))
        .patch("broken", broken)
        .build()
        .unwrap();

    let mut outer = PatchGroupBuilder::new()
        .patch("first", log.handle("first"))
        .group("inner", inner)
        .build()
        .unwrap();

    let err = outer.start().unwrap_err();
    assert_eq!(err.name(), Some("inner"));
    assert!(!outer.is_running());
    assert_eq!(log.calls(), vec!["+first", "+leaf", "-leaf", "-first"]);
}

#[test]
fn test_keep_partial_nested_group_is_stopped_by_outer() {
    let log = CallLog::new();
    let (broken, _) = failing(FailOn::Activate);
    let keep = GroupConfig::new().with_activation_failure(ActivationFailurePolicy::KeepPartial);
    let inner = PatchGroupBuilder::new()
        .config(keep)
        .patch("leaf", log.handle("leaf"))
        .patch("broken", broken)
        .build()
        .unwrap();

    let mut outer = PatchGroupBuilder::new().group("inner", inner).build().unwrap();

    assert!(outer.start().is_err());
    assert!(!outer.is_running());
    assert_eq!(log.calls(), vec!["+leaf", "-leaf"]);
}

#[test]
fn test_stop_order_from_config() {
    let log = CallLog::new();
    let mut group = PatchGroupBuilder::new()
        .config(GroupConfig::new().with_stop_order(StopOrder::Insertion))
        .patch("a", log.handle("a"))
        .patch("b", log.handle("b"))
        .build()
        .unwrap();

    group.start().unwrap();
    group.stop().unwrap();
    assert_eq!(log.calls(), vec!["+a", "+b", "-a", "-b"]);
}

#[test]
fn test_add_after_stop_is_allowed() {
    let log = CallLog::new();
    let mut group = PatchGroup::new();
    group.add_patch("a", log.handle("a")).unwrap();

    group.start().unwrap();
    assert!(matches!(
        group.add_patch("b", log.handle("b")),
        Err(PatchError::GroupRunning { .. })
    ));
    group.stop().unwrap();

    group.add_patch("b", log.handle("b")).unwrap();
    group.start().unwrap();
    assert!(group.get("b").is_ok());
    group.stop().unwrap();
}
