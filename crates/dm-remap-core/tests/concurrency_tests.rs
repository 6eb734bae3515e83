//! Integration tests for concurrent mapping.
//!
//! `map` is called from many I/O threads at once, including against the
//! same instance. Results must be independent per request.

use std::sync::Arc;
use std::thread;

use dm_remap_core::metrics::TargetMetrics;
use dm_remap_core::testing::TargetTestHarness;
use dm_remap_core::{DeviceTable, IoRequest, MapResult, TableBuilder};

/// Threads hammering one linear instance each see their own translation.
#[test]
fn test_concurrent_map_same_instance() {
    const THREADS: u64 = 8;
    const REQUESTS: u64 = 10_000;

    let harness = TargetTestHarness::new();
    let instance = harness
        .construct("linear", 100, THREADS * REQUESTS, "/dev/sdb 500")
        .unwrap();

    thread::scope(|s| {
        for t in 0..THREADS {
            let instance = &instance;
            s.spawn(move || {
                for i in 0..REQUESTS {
                    let logical = 100 + t * REQUESTS + i;
                    let mut req = IoRequest::read(TargetTestHarness::LOGICAL, logical);
                    assert_eq!(instance.map(&mut req), MapResult::Remapped);
                    assert_eq!(req.device(), TargetTestHarness::SDB);
                    assert_eq!(req.sector(), logical + 400);
                }
            });
        }
    });

    instance.destruct(harness.devices.as_ref());
    assert_eq!(harness.devices.total_dependencies(), 0);
}

/// Threads dispatching through a shared table, with counters enabled.
#[test]
fn test_concurrent_dispatch() {
    const THREADS: usize = 4;
    const ROUNDS: u64 = 1_000;

    let harness = TargetTestHarness::new();
    let metrics = Arc::new(TargetMetrics::new());
    let devices: Arc<dyn DeviceTable> = harness.devices.clone();
    let table = TableBuilder::build_from_lines(
        &harness.registry,
        devices,
        Some(Arc::clone(&metrics)),
        [
            "0 1000 linear /dev/sda 0",
            "1000 1000 io-err",
            "2000 1000 linear /dev/sdb 10000",
        ],
    )
    .unwrap();
    let dispatcher = table.dispatcher();

    thread::scope(|s| {
        for t in 0..THREADS {
            s.spawn(move || {
                for round in 0..ROUNDS {
                    let sector = (round * 3 + t as u64) % 3000;
                    let (result, req) = dispatcher.map_sector(TargetTestHarness::LOGICAL, sector);
                    match sector {
                        0..=999 => {
                            assert_eq!(result, MapResult::Remapped);
                            assert_eq!(req.device(), TargetTestHarness::SDA);
                            assert_eq!(req.sector(), sector);
                        }
                        1000..=1999 => {
                            assert_eq!(result, MapResult::Failed);
                            assert!(req.is_failed());
                        }
                        _ => {
                            assert_eq!(result, MapResult::Remapped);
                            assert_eq!(req.device(), TargetTestHarness::SDB);
                            assert_eq!(req.sector(), sector - 2000 + 10_000);
                        }
                    }
                }
            });
        }
    });

    let mut total = 0.0;
    for target in ["linear", "io-err"] {
        for result in ["remapped", "failed"] {
            total += metrics
                .requests_total
                .with_label_values(&[target, result])
                .get();
        }
    }
    assert!((total - (THREADS as u64 * ROUNDS) as f64).abs() < f64::EPSILON);

    table.teardown();
    assert_eq!(harness.devices.total_dependencies(), 0);
}
