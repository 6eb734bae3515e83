//! Integration tests for target type registration and lookup.

use std::sync::{Arc, Barrier};
use std::thread;

use dm_remap_core::testing::TargetTestHarness;
use dm_remap_core::{
    ArgumentCursor, ErrorTarget, IoRequest, LinearTarget, MapResult, RegistryError,
    SegmentBounds, TargetRegistry, TargetTypeRef,
};

/// Registering a name twice fails and keeps the first registration.
#[test]
fn test_duplicate_registration_keeps_first() {
    let harness = TargetTestHarness::new();
    let before = harness.registry.lookup("io-err").unwrap();

    let err = harness.registry.register("io-err", LinearTarget).unwrap_err();
    assert!(matches!(err, RegistryError::DuplicateTargetName { ref name } if name == "io-err"));

    let after = harness.registry.lookup("io-err").unwrap();
    assert!(TargetTypeRef::ptr_eq(&before, &after));

    // Still fails requests: the linear registration never took effect.
    let instance = harness.construct("io-err", 0, 8, "").unwrap();
    let mut req = IoRequest::read(TargetTestHarness::LOGICAL, 3);
    assert_eq!(instance.map(&mut req), MapResult::Failed);
    instance.destruct(harness.devices.as_ref());
}

/// Lookups of unknown names return nothing until the name is registered.
#[test]
fn test_lookup_after_register() {
    let registry = TargetRegistry::new();
    assert!(registry.lookup("linear").is_none());

    registry.register("linear", LinearTarget).unwrap();
    let linear = registry.lookup("linear").unwrap();

    let harness = TargetTestHarness::new();
    let instance = linear
        .construct(
            harness.devices.as_ref(),
            SegmentBounds::new(100, 100),
            &mut ArgumentCursor::new("/dev/sda 500"),
            &mut |_: &str| {},
        )
        .unwrap();

    let mut req = IoRequest::read(TargetTestHarness::LOGICAL, 150);
    assert_eq!(instance.map(&mut req), MapResult::Remapped);
    assert_eq!(req.device(), TargetTestHarness::SDA);
    assert_eq!(req.sector(), 550);
    instance.destruct(harness.devices.as_ref());
}

/// Many threads racing to register one name: exactly one wins.
#[test]
fn test_concurrent_duplicate_registration() {
    const THREADS: usize = 16;

    let registry = Arc::new(TargetRegistry::new());
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                registry.register("racy", ErrorTarget)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let wins = results.iter().filter(|r| r.is_ok()).count();
    let duplicates = results
        .iter()
        .filter(|r| matches!(r, Err(RegistryError::DuplicateTargetName { .. })))
        .count();

    assert_eq!(wins, 1);
    assert_eq!(duplicates, THREADS - 1);
    assert_eq!(registry.len(), 1);
}

/// Distinct names registered concurrently all land.
#[test]
fn test_concurrent_distinct_registration() {
    let registry = Arc::new(TargetRegistry::new());

    thread::scope(|s| {
        for i in 0..8 {
            let registry = &registry;
            s.spawn(move || {
                registry
                    .register(&format!("target-{i}"), ErrorTarget)
                    .unwrap();
            });
        }
    });

    assert_eq!(registry.len(), 8);
    assert!(registry.contains("target-0"));
    assert!(registry.contains("target-7"));
}

/// The process-wide registry is bootstrapped with exactly the built-ins.
#[test]
fn test_global_bootstrap() {
    let names = TargetRegistry::global().names();
    assert!(names.contains(&"io-err".to_string()));
    assert!(names.contains(&"linear".to_string()));
}
