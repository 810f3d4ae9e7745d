//! Architectural Contract Test: Cadence
//!
//! Constraints verified:
//! - No work happens between scheduled cycles
//! - Cycle N starts at N x interval, however long each pass took
//! - An overrunning cycle is followed immediately by the next, with a warning
//!   event and no catch-up
//! - Heartbeats are emitted on their own period
//!
//! - A timer that fires late does not push later cycles back
//!
//! All but the late-wake test run on tokio's paused clock.

mod common;

use common::*;
use ddns_core::{DdnsEngine, EngineEvent};
use std::sync::Arc;
use std::time::Duration;

fn offsets(source: &ScriptedIpSource) -> Vec<Duration> {
    let times = source.call_times();
    let first = times[0];
    times.iter().map(|t| *t - first).collect()
}

#[tokio::test(start_paused = true)]
async fn idle_between_cycles() {
    let source = Arc::new(ScriptedIpSource::new("198.51.100.4"));
    let zone = Arc::new(FakeZone::with_record("198.51.100.4", 600));

    let (engine, _events) =
        DdnsEngine::new(source.clone(), zone.clone(), test_config(300)).unwrap();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let engine_handle =
        tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(source.call_count(), 1);

    tokio::time::sleep(Duration::from_secs(280)).await;
    assert_eq!(source.call_count(), 1, "no work before the next tick");
    assert_eq!(zone.list_count(), 1);

    tokio::time::sleep(Duration::from_secs(660)).await;
    // Ticks at 0, 300, 600, 900
    assert_eq!(source.call_count(), 4);
    assert_eq!(zone.create_count() + zone.modify_count(), 0);

    shutdown_tx.send(()).unwrap();
    engine_handle.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn slow_passes_do_not_drift() {
    let source = Arc::new(ScriptedIpSource::with_delay(
        "198.51.100.4",
        Duration::from_secs(7),
    ));
    let zone = Arc::new(FakeZone::new());

    let mut config = test_config(300);
    config.engine.operation_timeout_secs = 60;
    let (engine, _events) = DdnsEngine::new(source.clone(), zone.clone(), config).unwrap();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let engine_handle =
        tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    tokio::time::sleep(Duration::from_secs(1250)).await;
    shutdown_tx.send(()).unwrap();
    engine_handle.await.unwrap().unwrap();

    let expected: Vec<Duration> = (0..5).map(|n| Duration::from_secs(300 * n)).collect();
    assert_eq!(offsets(&source), expected);
}

#[tokio::test(start_paused = true)]
async fn overrun_starts_next_cycle_immediately() {
    let source = Arc::new(ScriptedIpSource::with_delay(
        "198.51.100.4",
        Duration::from_secs(400),
    ));
    let zone = Arc::new(FakeZone::new());

    let mut config = test_config(300);
    config.engine.operation_timeout_secs = 500;
    let (engine, mut events) = DdnsEngine::new(source.clone(), zone.clone(), config).unwrap();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let engine_handle =
        tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    tokio::time::sleep(Duration::from_secs(850)).await;
    shutdown_tx.send(()).unwrap();
    engine_handle.await.unwrap().unwrap();

    // No skipped slots and no catch-up burst
    assert_eq!(
        offsets(&source),
        vec![
            Duration::ZERO,
            Duration::from_secs(400),
            Duration::from_secs(800)
        ]
    );

    let overruns: Vec<_> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            EngineEvent::CycleOverrun { elapsed, interval } => Some((elapsed, interval)),
            _ => None,
        })
        .collect();
    assert_eq!(
        overruns,
        vec![
            (Duration::from_secs(400), Duration::from_secs(300)),
            (Duration::from_secs(400), Duration::from_secs(300)),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn heartbeat_runs_on_its_own_period() {
    let source = Arc::new(ScriptedIpSource::new("198.51.100.4"));
    let zone = Arc::new(FakeZone::new());

    let mut config = test_config(300);
    config.engine.heartbeat_secs = 1000;
    let (engine, mut events) = DdnsEngine::new(source.clone(), zone.clone(), config).unwrap();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let engine_handle =
        tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    tokio::time::sleep(Duration::from_secs(2050)).await;
    shutdown_tx.send(()).unwrap();
    engine_handle.await.unwrap().unwrap();

    let heartbeats: Vec<_> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            EngineEvent::Heartbeat(snapshot) => Some(snapshot),
            _ => None,
        })
        .collect();

    assert_eq!(heartbeats.len(), 2);
    // Ticks at 0, 300, 600, 900 precede the first beat
    assert_eq!(heartbeats[0].cycles, 4);
    assert_eq!(heartbeats[0].successes, 4);
    assert_eq!(heartbeats[0].active_operations, 0);
    assert_eq!(heartbeats[1].cycles, 7);
}

#[tokio::test]
async fn late_wakeups_do_not_accumulate() {
    let source = Arc::new(ScriptedIpSource::new("198.51.100.4"));
    let zone = Arc::new(FakeZone::with_record("198.51.100.4", 600));

    let (engine, _events) =
        DdnsEngine::new(source.clone(), zone.clone(), test_config(1)).unwrap();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let started = tokio::time::Instant::now();
    let engine_handle =
        tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    // Block the runtime across each tick so the engine's timer fires late
    for n in 1..=4u32 {
        tokio::time::sleep_until(started + Duration::from_secs(n.into()) - Duration::from_millis(5))
            .await;
        std::thread::sleep(Duration::from_millis(40));
    }
    tokio::time::sleep(Duration::from_millis(200)).await;
    shutdown_tx.send(()).unwrap();
    engine_handle.await.unwrap().unwrap();

    let offsets = offsets(&source);
    assert_eq!(offsets.len(), 5);
    for (n, offset) in offsets.iter().enumerate() {
        let slot = Duration::from_secs(n as u64);
        assert!(
            *offset < slot + Duration::from_millis(80),
            "cycle {} started {:?} after cycle 0, slot {:?}",
            n,
            offset,
            slot
        );
    }
}
