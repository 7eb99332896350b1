use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::clock::UnixTimestamp;

use crate::raffle_state::{Raffle, RoundState};

/// First predicate that failed, or `Ready`
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpkeepReason {
    Ready,
    RoundNotOpen,
    IntervalNotElapsed,
    NoPlayers,
    EmptyPot,
}

/// Result of an upkeep evaluation, returned to off-chain pollers
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpkeepCheck {
    pub needed: bool,
    pub reason: UpkeepReason,
}

pub struct UpkeepEvaluator;

impl UpkeepEvaluator {
    /// Decides whether a draw may be triggered at `now`. Never mutates.
    pub fn evaluate(raffle: &Raffle, now: UnixTimestamp) -> UpkeepCheck {
        let reason = if raffle.state != RoundState::Open {
            UpkeepReason::RoundNotOpen
        } else if Self::elapsed(raffle, now) < raffle.interval() {
            UpkeepReason::IntervalNotElapsed
        } else if raffle.players.is_empty() {
            UpkeepReason::NoPlayers
        } else if raffle.pot_balance == 0 {
            UpkeepReason::EmptyPot
        } else {
            UpkeepReason::Ready
        };

        UpkeepCheck {
            needed: reason == UpkeepReason::Ready,
            reason,
        }
    }

    /// Seconds since the interval started; a clock behind it counts as zero
    fn elapsed(raffle: &Raffle, now: UnixTimestamp) -> u64 {
        now.saturating_sub(raffle.last_timestamp).max(0) as u64
    }
}
