//! Countdown rendering.

/// Render a duration as `mm:ss`, truncating partial seconds.
pub fn format_remaining(ms: u64) -> String {
    let minutes = ms / 60_000;
    let seconds = (ms % 60_000) / 1_000;
    format!("{:02}:{:02}", minutes, seconds)
}
