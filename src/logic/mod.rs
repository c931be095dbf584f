pub mod countdown;
pub mod format;
pub mod rewards;

pub use countdown::{countdown, countdown_label, format_round_time, round_countdown, target_block_for_interval};
pub use format::{balance_amount, full_display_balance};
pub use rewards::apply_rewards;
