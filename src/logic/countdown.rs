use crate::state::PredictionsState;

/// Seconds until `target_block`, negative once it has passed.
pub fn countdown(target_block: u64, current_block: u64, seconds_per_block: u64) -> i64 {
    let blocks = target_block as i64 - current_block as i64;
    blocks * seconds_per_block as i64
}

pub fn target_block_for_interval(current_round_start_block: u64, interval_blocks: u64, intervals_ahead: u64) -> u64 {
    current_round_start_block + intervals_ahead * interval_blocks
}

/// Countdown to the start of the round `intervals_ahead` after the current one.
pub fn round_countdown(
    state: &PredictionsState,
    current_block: u64,
    seconds_per_block: u64,
    intervals_ahead: u64,
) -> i64 {
    let target = target_block_for_interval(state.current_round_start_block, state.interval_blocks, intervals_ahead);
    countdown(target, current_block, seconds_per_block)
}

/// `MM:SS`, or `HH:MM:SS` once an hour or more remains. The sign is ignored.
pub fn format_round_time(seconds: i64) -> String {
    let total = seconds.unsigned_abs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

pub fn countdown_label(seconds: i64) -> String {
    let prefix = if seconds > 0 { "Start" } else { "End" };
    format!("{}: ~{}", prefix, format_round_time(seconds))
}
