//! In-memory walkthrough of the five lock and offline scenarios.
//!
//! All viewers share one `MemoryStore` and one `ManualClock`, so "ten
//! minutes later" is a single `advance` call.

use crate::ui;
use anyhow::Result;
use serde_json::json;
use sheetlock_sdk::client::quick;
use sheetlock_sdk::{
    commit, format_remaining, Client, EditorConfig, ManualClock, MemoryPublisher, MemoryStore,
    Store, DEFAULT_DOCUMENT_ID,
};
use std::sync::Arc;

const MINUTE: u64 = 60_000;

fn viewers(users: &[&str]) -> (MemoryStore, ManualClock, Vec<Client<MemoryStore, ManualClock>>) {
    let clock = ManualClock::new(1_751_328_000_000);
    let (store, clients) = quick::create_viewers(
        users,
        clock.clone(),
        EditorConfig::default(),
        Arc::new(ui::ConsoleNotifier),
    );
    (store, clock, clients)
}

// ─── Scenario 1 ────────────────────────────────────────────────────────────

fn idle_lock_clears() -> Result<()> {
    ui::header("SCENARIO 1: An idle lock clears itself");
    let (_store, clock, clients) = viewers(&["alice", "bob"]);
    let alice = clients[0].open_session(DEFAULT_DOCUMENT_ID, true)?;
    let bob = clients[1].open_session(DEFAULT_DOCUMENT_ID, true)?;

    ui::section("alice enters edit mode and walks away");
    alice.lock().begin_editing()?;
    bob.lock().remaining_ms()?;
    ui::show_view(&bob.lock().view());

    ui::section("10 minutes pass without activity");
    clock.advance(10 * MINUTE);
    let remaining = bob.lock().remaining_ms()?;
    ui::step(&format!("bob re-reads the lock: {} left", format_remaining(remaining)));

    ui::section("bob can edit now");
    bob.lock().begin_editing()?;
    ui::show_view(&bob.lock().view());
    Ok(())
}

// ─── Scenario 2 ────────────────────────────────────────────────────────────

fn second_viewer_conflict() -> Result<()> {
    ui::header("SCENARIO 2: Second viewer is turned away");
    let (_store, _clock, clients) = viewers(&["alice", "bob"]);
    let alice = clients[0].open_session(DEFAULT_DOCUMENT_ID, true)?;
    let bob = clients[1].open_session(DEFAULT_DOCUMENT_ID, true)?;

    alice.lock().begin_editing()?;
    ui::step("alice holds the lock");

    ui::section("bob tries to enter edit mode");
    let attempt = bob.lock().begin_editing();
    if let Err(e) = attempt {
        ui::step(&format!("bob: {}", e));
    }
    ui::show_view(&bob.lock().view());
    Ok(())
}

// ─── Scenario 3 ────────────────────────────────────────────────────────────

async fn offline_edits_survive() -> Result<()> {
    ui::header("SCENARIO 3: Offline edits survive a reconnect");
    let (store, clock, clients) = viewers(&["alice"]);
    let alice = clients[0].open_session(DEFAULT_DOCUMENT_ID, true)?;
    let publisher = MemoryPublisher::new();

    alice.lock().begin_editing()?;

    ui::section("the connection drops while alice edits");
    clients[0].set_online(false);
    clock.advance(2 * MINUTE);
    alice.lock().edit(json!({"B2": 11}))?;
    let key = format!("offline:{}:alice", DEFAULT_DOCUMENT_ID);
    ui::step(&format!(
        "snapshot stored under `{}`: {}",
        key,
        store.get(&key)?.is_some()
    ));
    ui::show_view(&alice.lock().view());

    ui::section("the connection returns and alice saves");
    clock.advance(MINUTE);
    clients[0].set_online(true);
    commit(&alice, &publisher).await?;
    for (document, user, payload) in publisher.published() {
        ui::step(&format!("published {} to {} as {}", payload, document, user));
    }
    ui::step(&format!("snapshot left behind: {}", store.get(&key)?.is_some()));
    ui::show_view(&alice.lock().view());
    Ok(())
}

// ─── Scenario 4 ────────────────────────────────────────────────────────────

fn recovery_after_restart() -> Result<()> {
    ui::header("SCENARIO 4: Unsynced edits are offered after a restart");
    let (_store, clock, clients) = viewers(&["alice"]);

    ui::section("alice edits offline, then closes the tab");
    let first = clients[0].open_session(DEFAULT_DOCUMENT_ID, false)?;
    first.lock().begin_editing()?;
    first.lock().edit(json!({"B2": 14}))?;
    clients[0].close_session(DEFAULT_DOCUMENT_ID)?;

    ui::section("a fresh tab opens online");
    clock.advance(30 * MINUTE);
    let fresh = clients[0].open_session(DEFAULT_DOCUMENT_ID, true)?;
    if let Some(prompt) = fresh.lock().recovery_prompt() {
        ui::step(&prompt.message());
    }
    ui::show_view(&fresh.lock().view());

    ui::section("alice discards them");
    fresh.lock().discard_snapshot()?;
    ui::show_view(&fresh.lock().view());
    Ok(())
}

// ─── Scenario 5 ────────────────────────────────────────────────────────────

fn warning_then_continue() -> Result<()> {
    ui::header("SCENARIO 5: Idle warning, then continue editing");
    let (_store, clock, clients) = viewers(&["alice"]);
    let alice = clients[0].open_session(DEFAULT_DOCUMENT_ID, true)?;

    alice.lock().begin_editing()?;

    ui::section("9 minutes of inactivity");
    clock.advance(9 * MINUTE);
    alice.lock().tick()?;
    ui::show_view(&alice.lock().view());

    ui::section("alice chooses to continue");
    alice.lock().continue_editing()?;
    ui::show_view(&alice.lock().view());
    Ok(())
}

// ─── Entry point ───────────────────────────────────────────────────────────

pub async fn run() -> Result<()> {
    idle_lock_clears()?;
    second_viewer_conflict()?;
    offline_edits_survive().await?;
    recovery_after_restart()?;
    warning_then_continue()?;
    ui::done("All five scenarios ran as expected");
    Ok(())
}
