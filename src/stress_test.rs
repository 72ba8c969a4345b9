use async_stream::stream;
use chrono::Local;
use futures::stream::Stream;
use futures::stream::StreamExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use sheetlock_core::{DocumentId, ManualClock, MemoryStore, SystemClock, UserId};
use sheetlock_lock::{LockConfig, LockError, LockManager};
use sheetlock_offline::{OfflineConfig, OfflineManager};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Statistics collected during stress testing
#[derive(Clone, Debug, Default)]
pub struct StressTestStats {
    pub name: String,
    pub num_viewers: usize,
    pub operations_per_viewer: usize,
    pub acquisitions: usize,
    pub conflicts: usize,
    pub contended: usize,
    pub renewals: usize,
    pub releases: usize,
    /// Highest number of viewers that believed they held the lock at once.
    pub max_concurrent_holders: usize,
    pub total_time: Duration,
    pub ops_per_second: f64,
}

impl StressTestStats {
    pub fn print(&self) {
        println!("\n╔════════════════════════════════════════════════════════════╗");
        println!("║  {:<58}║", format!("{} Statistics", self.name));
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║  Number of Viewers:         {:>30} ║", self.num_viewers);
        println!("║  Operations per Viewer:     {:>30} ║", self.operations_per_viewer);
        println!("║  Acquisitions:              {:>30} ║", self.acquisitions);
        println!("║  Conflicts:                 {:>30} ║", self.conflicts);
        println!("║  Contended Writes:          {:>30} ║", self.contended);
        println!("║  Renewals:                  {:>30} ║", self.renewals);
        println!("║  Releases:                  {:>30} ║", self.releases);
        println!("║  Max Concurrent Holders:    {:>30} ║", self.max_concurrent_holders);
        println!("║  Total Time:                {:>29}s ║", format!("{:.3}", self.total_time.as_secs_f64()));
        println!("║  Operations/Second:         {:>30.0} ║", self.ops_per_second);
        println!("╚════════════════════════════════════════════════════════════╝");
    }

    fn absorb(&mut self, tally: &Tally) {
        self.acquisitions += tally.acquisitions;
        self.conflicts += tally.conflicts;
        self.contended += tally.contended;
        self.renewals += tally.renewals;
        self.releases += tally.releases;
    }
}

#[derive(Default)]
struct Tally {
    acquisitions: usize,
    conflicts: usize,
    contended: usize,
    renewals: usize,
    releases: usize,
}

#[derive(Clone, Copy, Debug)]
enum Op {
    Acquire,
    Renew,
    Release,
}

/// Generator that yields a random lock operation schedule for one viewer
fn op_generator(seed: u64, num_ops: usize) -> impl Stream<Item = Op> {
    stream! {
        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..num_ops {
            yield match rng.gen_range(0..10) {
                0..=4 => Op::Acquire,
                5..=7 => Op::Renew,
                _ => Op::Release,
            };
        }
    }
}

fn banner(title: &str, detail: String) {
    println!("\n╔════════════════════════════════════════════════════════════╗");
    println!("║  {:<58}║", title);
    println!("║  {:<58}║", detail);
    println!("╚════════════════════════════════════════════════════════════╝");
}

/// Many viewers hammer the same lock record. The lock must never be held by
/// two viewers at once.
pub async fn stress_test_contention(num_viewers: usize, ops_per_viewer: usize) -> StressTestStats {
    banner(
        "Lock Contention Stress Test (Async)",
        format!("Viewers: {} | Ops/Viewer: {}", num_viewers, ops_per_viewer),
    );

    let start = Instant::now();
    let store = MemoryStore::new();
    let holders = Arc::new(AtomicUsize::new(0));
    let max_holders = Arc::new(AtomicUsize::new(0));
    let stats = Arc::new(Mutex::new(StressTestStats {
        name: "Lock Contention".into(),
        num_viewers,
        operations_per_viewer: ops_per_viewer,
        ..Default::default()
    }));

    let mut handles = vec![];
    for idx in 0..num_viewers {
        let store = store.clone();
        let holders = Arc::clone(&holders);
        let max_holders = Arc::clone(&max_holders);
        let stats = Arc::clone(&stats);

        handles.push(tokio::spawn(async move {
            let mut manager = match LockManager::new(
                store,
                SystemClock,
                DocumentId::default(),
                UserId::new(format!("viewer_{}", idx)),
                LockConfig::default(),
            ) {
                Ok(manager) => manager,
                Err(e) => {
                    eprintln!("  viewer_{} could not start: {}", idx, e);
                    return;
                }
            };

            let mut tally = Tally::default();
            let mut ops = Box::pin(op_generator(idx as u64, ops_per_viewer));
            while let Some(op) = ops.next().await {
                match op {
                    Op::Acquire => match manager.acquire() {
                        Ok(acquisition) if !acquisition.reentrant => {
                            tally.acquisitions += 1;
                            let now = holders.fetch_add(1, Ordering::SeqCst) + 1;
                            max_holders.fetch_max(now, Ordering::SeqCst);
                        }
                        Ok(_) => tally.renewals += 1,
                        Err(LockError::Conflict { .. }) => tally.conflicts += 1,
                        Err(LockError::Contended) => tally.contended += 1,
                        Err(e) => eprintln!("  viewer_{}: {}", idx, e),
                    },
                    Op::Renew => {
                        if matches!(manager.renew(), Ok(true)) {
                            tally.renewals += 1;
                        }
                    }
                    Op::Release => {
                        if manager.is_held_by_self() {
                            holders.fetch_sub(1, Ordering::SeqCst);
                            match manager.release() {
                                Ok(true) => tally.releases += 1,
                                Ok(false) => {}
                                Err(LockError::Contended) => {
                                    // Still ours; count it back.
                                    holders.fetch_add(1, Ordering::SeqCst);
                                    tally.contended += 1;
                                }
                                Err(e) => eprintln!("  viewer_{}: {}", idx, e),
                            }
                        }
                    }
                }
                tokio::task::yield_now().await;
            }

            if manager.is_held_by_self() {
                holders.fetch_sub(1, Ordering::SeqCst);
                if manager.release().is_ok() {
                    tally.releases += 1;
                }
            }
            stats.lock().await.absorb(&tally);
        }));
    }

    for handle in handles {
        let _ = handle.await;
    }

    let total_time = start.elapsed();
    let mut stats = stats.lock().await.clone();
    stats.max_concurrent_holders = max_holders.load(Ordering::SeqCst);
    stats.total_time = total_time;
    stats.ops_per_second = (num_viewers * ops_per_viewer) as f64 / total_time.as_secs_f64();
    stats
}

/// Every round the holder goes idle past the timeout and all viewers race
/// for the freed lock. Exactly one must win each round.
pub async fn stress_test_expiry_race(num_viewers: usize, rounds: usize) -> StressTestStats {
    banner(
        "Expiry Race Stress Test (Async)",
        format!("Viewers: {} | Rounds: {}", num_viewers, rounds),
    );

    let start = Instant::now();
    let store = MemoryStore::new();
    let clock = ManualClock::new(0);
    let config = LockConfig::default();
    let timeout = config.lock_timeout_ms;

    let mut managers = Vec::with_capacity(num_viewers);
    for idx in 0..num_viewers {
        match LockManager::new(
            store.clone(),
            clock.clone(),
            DocumentId::default(),
            UserId::new(format!("viewer_{}", idx)),
            config.clone(),
        ) {
            Ok(manager) => managers.push(Arc::new(Mutex::new(manager))),
            Err(e) => eprintln!("  viewer_{} could not start: {}", idx, e),
        }
    }

    let mut stats = StressTestStats {
        name: "Expiry Race".into(),
        num_viewers,
        operations_per_viewer: rounds,
        ..Default::default()
    };

    for round in 0..rounds {
        clock.advance(timeout);

        let winners = Arc::new(AtomicUsize::new(0));
        let mut handles = vec![];
        for manager in &managers {
            let manager = Arc::clone(manager);
            let winners = Arc::clone(&winners);
            handles.push(tokio::spawn(async move {
                let mut manager = manager.lock().await;
                let mut tally = Tally::default();
                match manager.acquire() {
                    Ok(_) => {
                        winners.fetch_add(1, Ordering::SeqCst);
                        tally.acquisitions += 1;
                    }
                    Err(LockError::Conflict { .. }) => tally.conflicts += 1,
                    Err(LockError::Contended) => tally.contended += 1,
                    Err(e) => eprintln!("  {}: {}", manager.user(), e),
                }
                tally
            }));
        }

        for handle in handles {
            if let Ok(tally) = handle.await {
                stats.absorb(&tally);
            }
        }

        let won = winners.load(Ordering::SeqCst);
        stats.max_concurrent_holders = stats.max_concurrent_holders.max(won);
        if won != 1 {
            println!("  ✗ round {}: {} winners", round, won);
        } else if round % 10 == 0 {
            println!("  Rounds completed: {}/{}", round + 1, rounds);
        }
    }

    stats.total_time = start.elapsed();
    stats.ops_per_second = (num_viewers * rounds) as f64 / stats.total_time.as_secs_f64();
    stats
}

/// Concurrent offline snapshot writes from many users on one document. Each
/// user must read back only their own last snapshot.
pub async fn stress_test_snapshots(num_viewers: usize, saves_per_viewer: usize) -> bool {
    banner(
        "Offline Snapshot Isolation (Async)",
        format!("Viewers: {} | Saves/Viewer: {}", num_viewers, saves_per_viewer),
    );

    let store = MemoryStore::new();
    let mut handles = vec![];
    for idx in 0..num_viewers {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let user = UserId::new(format!("viewer_{}", idx));
            let mut manager = OfflineManager::new(
                store,
                SystemClock,
                DocumentId::default(),
                user.clone(),
                OfflineConfig::default(),
                false,
            )
            .ok()?;

            for i in 0..saves_per_viewer {
                manager
                    .save_snapshot(json!({"viewer": idx, "save": i}))
                    .ok()?;
                tokio::task::yield_now().await;
            }

            let snapshot = manager.load_snapshot().ok()??;
            Some(snapshot.user_id == user && snapshot.payload == json!({"viewer": idx, "save": saves_per_viewer - 1}))
        }));
    }

    let mut isolated = true;
    for handle in handles {
        isolated &= matches!(handle.await, Ok(Some(true)));
    }

    let expected = num_viewers;
    let stored = store
        .keys()
        .iter()
        .filter(|key| key.starts_with("offline:"))
        .count();
    println!("  Snapshots stored: {} (expected {})", stored, expected);
    println!(
        "  {} {}",
        if isolated { "✓" } else { "✗" },
        if isolated { "every viewer read back only its own edits" } else { "SNAPSHOT LEAK DETECTED" }
    );
    isolated && stored == expected
}

/// Contention at growing viewer counts
pub async fn stress_test_scaling(max_viewers: usize, step_size: usize) {
    println!("\n╔════════════════════════════════════════════════════════════╗");
    println!("║      Scaling Analysis - Lock Contention vs Viewers         ║");
    println!("║      Started {:<46}║", Local::now().format("%Y-%m-%d %H:%M:%S").to_string());
    println!("╚════════════════════════════════════════════════════════════╝");

    let mut current_viewers = step_size;
    while current_viewers <= max_viewers {
        let stats = stress_test_contention(current_viewers, 200).await;
        stats.print();
        current_viewers += step_size;
    }
}
