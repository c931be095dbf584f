use crate::state::{BetPosition, Round};

pub const BPS_DENOMINATOR: u64 = 10_000;

/// Fill in the reward fields of a round the oracle has closed.
///
/// Winners split the pool minus the treasury fee. A tie leaves nothing to claim.
pub fn apply_rewards(round: &mut Round, treasury_fee_bps: u64) {
    if !round.oracle_called {
        return;
    }
    let (Some(lock_price), Some(close_price)) = (round.lock_price, round.close_price) else {
        return;
    };

    let treasury_share = treasury_fee_bps.min(BPS_DENOMINATOR) as f64 / BPS_DENOMINATOR as f64;
    let reward_amount = round.total_amount * (1.0 - treasury_share);

    let (base, reward, position) = if close_price > lock_price {
        (round.bull_amount, reward_amount, BetPosition::Bull)
    } else if close_price < lock_price {
        (round.bear_amount, reward_amount, BetPosition::Bear)
    } else {
        (0.0, 0.0, BetPosition::House)
    };

    round.reward_base_cal_amount = base;
    round.reward_amount = reward;
    round.position.get_or_insert(position);
}
