//! Integration Tests: a wired runtime driven by ticks and by the heartbeat.

use std::io::Write as _;
use std::sync::Arc;
use std::time::Duration;

use lapse_core::{Lifespan, TimeUnit};
use lapse_host::{HostConfig, HostProfile, PlayerId, Runtime, TickScheduler, spawn_heartbeat};
use lapse_respond::{Interception, RequestSpec, Reply};

fn cooperative() -> Runtime {
    Runtime::new(HostConfig::default()).expect("default config is valid")
}

fn every_tick() -> HostConfig {
    let mut config = HostConfig::default();
    config.profile = HostProfile::Threaded;
    config.lapse.janitor.start_delay_ticks = 1;
    config.lapse.janitor.interval_ticks = 1;
    config
}

// ---------------------------------------------------------------------------
// Cooperative ticking
// ---------------------------------------------------------------------------

#[test]
fn janitor_sweeps_on_its_tick_schedule() {
    let runtime = cooperative();
    let set = runtime.timed_set("online");
    set.insert_for("steve", Lifespan::of(1, TimeUnit::Seconds));

    for _ in 0..19 {
        runtime.tick();
    }
    assert!(set.contains(&"steve"));
    assert_eq!(runtime.janitor().counters().passes, 0);

    // Tick 20 is both the deadline and the first janitor pass.
    assert_eq!(runtime.tick(), 1);
    assert!(!set.contains(&"steve"));
    assert_eq!(set.len(), 0);
    assert_eq!(runtime.janitor().counters().entries_expired, 1);
    assert_eq!(runtime.stamp().tick, 20);
}

#[test]
fn containers_use_configured_default_lifespan() {
    let config = HostConfig::from_toml("[containers]\ndefault_lifespan = { amount = 5, unit = \"ticks\" }")
        .expect("valid toml");
    let runtime = Runtime::new(config).expect("runtime");
    let map = runtime.timed_map("cooldowns");
    map.insert("steve", 3);

    assert_eq!(runtime.default_lifespan(), Lifespan::of(5, TimeUnit::Ticks));
    runtime.scheduler().run_ticks(4);
    assert_eq!(map.get(&"steve"), Some(3));
    runtime.tick();
    assert_eq!(map.get(&"steve"), None);
}

#[test]
fn request_times_out_after_its_ticks() {
    let runtime = cooperative();
    let registry = runtime.replies().expect("registry");
    let steve = PlayerId::new();
    let request = registry
        .submit(
            RequestSpec::new(steve, "trade")
                .accepting(Reply::Yes)
                .timeout(40, TimeUnit::Ticks),
        )
        .expect("submit");

    runtime.scheduler().run_ticks(39);
    assert!(request.is_pending());
    runtime.tick();
    assert!(request.is_timed_out());
    assert_eq!(registry.pending_count(), 0);
}

#[test]
fn ambiguity_notice_reaches_the_player() {
    let runtime = cooperative();
    let registry = runtime.replies().expect("registry");
    let steve = PlayerId::new();
    runtime.outbox().connect(steve);

    registry.request(steve, "trade", [Reply::Accept, Reply::Deny]).expect("submit");
    registry.request(steve, "party", [Reply::Accept, Reply::Deny]).expect("submit");

    let result = registry.handle_message(&steve, "/accept");
    assert!(matches!(result, Interception::Ambiguous { .. }));

    let inbox = runtime.outbox().drain(&steve);
    assert_eq!(inbox.len(), 1);
    assert!(inbox[0].contains("trade, party"));

    assert!(registry.handle_message(&steve, "/accept party").is_intercepted());
    assert_eq!(registry.pending_for(&steve).len(), 1);
}

#[test]
fn dropping_runtime_detaches_janitor() {
    let runtime = cooperative();
    let scheduler = Arc::clone(runtime.scheduler());
    assert_eq!(scheduler.pending(), 1);

    drop(runtime);
    assert_eq!(scheduler.pending(), 0);
}

#[test]
fn runtime_from_file() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    writeln!(file, "profile = \"threaded\"\ntick_rate = 40\n\n[janitor]\ninterval_ticks = 2").expect("write");

    let config = HostConfig::from_file(file.path()).expect("load");
    let runtime = Runtime::new(config).expect("runtime");
    assert_eq!(runtime.config().profile, HostProfile::Threaded);
    assert_eq!(runtime.config().tick_period(), Duration::from_millis(25));
}

#[test]
fn zero_heartbeat_period_is_rejected() {
    let scheduler = Arc::new(TickScheduler::new());
    assert!(spawn_heartbeat(scheduler, Duration::ZERO).is_err());
}

// ---------------------------------------------------------------------------
// Heartbeat (paused tokio time)
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn heartbeat_ticks_at_configured_rate() {
    let runtime = Runtime::new(every_tick()).expect("runtime");
    let set = runtime.timed_set("recent");
    set.insert_for("steve", Lifespan::of(500, TimeUnit::Milliseconds));

    let heartbeat = runtime.start_heartbeat().expect("heartbeat");
    tokio::time::sleep(Duration::from_millis(1_010)).await;

    assert_eq!(runtime.scheduler().current_tick(), 20);
    assert!(set.is_empty());
    assert_eq!(runtime.janitor().counters().entries_expired, 1);

    assert_eq!(heartbeat.shutdown().await, 20);
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_ticking() {
    let runtime = Runtime::new(every_tick()).expect("runtime");
    let heartbeat = runtime.start_heartbeat().expect("heartbeat");

    tokio::time::sleep(Duration::from_millis(260)).await;
    heartbeat.shutdown().await;
    let stopped_at = runtime.scheduler().current_tick();
    assert_eq!(stopped_at, 5);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(runtime.scheduler().current_tick(), stopped_at);
}
