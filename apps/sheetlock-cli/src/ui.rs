//! Terminal output helpers.

use colored::*;
use sheetlock_sdk::{LockState, NoticeKind, Notifier, OfflineState, SessionView};

// ─── Notices ───────────────────────────────────────────────────────────────

/// Prints user notices as coloured one-liners.
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, kind: NoticeKind, message: &str) {
        let (title, body) = message.split_once(": ").unwrap_or((message, ""));
        let badge = match kind {
            NoticeKind::Info => "ℹ".bright_blue(),
            NoticeKind::Warning => "⚠".bright_yellow(),
            NoticeKind::Error => "✗".bright_red(),
        };
        println!("  {} {} {}", badge, title.bold(), body);
    }
}

// ─── Pretty printing ──────────────────────────────────────────────────────

pub fn header(text: &str) {
    let bar = "═".repeat(60);
    println!("\n{}", bar.bright_cyan());
    println!("  {}", text.bold().bright_white());
    println!("{}", bar.bright_cyan());
}

pub fn section(text: &str) {
    println!("\n{} {}", "▸".bright_yellow(), text.bold());
}

pub fn step(text: &str) {
    println!("  {} {}", "•".bright_green(), text);
}

pub fn done(text: &str) {
    println!("\n  {} {}", "✓".bright_green().bold(), text.bright_green().bold());
}

fn row(label: &str, value: String) {
    println!("  │ {:<12} {:<31} │", label.dimmed().to_string(), value);
}

/// Render a session the way the sheet header would.
pub fn show_view(view: &SessionView) {
    let border = "─".repeat(46);
    println!("  ┌{}┐", border);
    println!(
        "  │ {:^44} │",
        format!("{} @ {}", view.user, view.document)
            .bright_yellow()
            .to_string()
    );
    println!("  ├{}┤", border);

    let lock = match &view.lock_state {
        LockState::Unlocked => "unlocked".normal().to_string(),
        LockState::EditingSelf => format!("editing, {} left", view.remaining_label())
            .bright_green()
            .to_string(),
        LockState::WarningPending => format!("expiring in {}", view.remaining_label())
            .bright_yellow()
            .to_string(),
        LockState::LockedByOther { holder } => format!("read-only, {} is editing", holder)
            .bright_red()
            .to_string(),
    };
    row("lock", lock);

    let connection = match view.offline_state {
        OfflineState::Online => "online".bright_green().to_string(),
        OfflineState::Offline { .. } => format!("offline, {} grace left", view.offline_remaining_label())
            .bright_yellow()
            .to_string(),
        OfflineState::OfflineExpired { .. } => "offline, editing suspended".bright_red().to_string(),
    };
    row("connection", connection);

    let recovery = match &view.recovery {
        Some(prompt) => format!("changes from {}", prompt.captured_at_local)
            .bright_magenta()
            .to_string(),
        None => "none".dimmed().to_string(),
    };
    row("unsynced", recovery);
    println!("  └{}┘", border);
}
