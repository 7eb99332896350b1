use solana_program::{program_error::ProgramError, pubkey::Pubkey};

use crate::{
    events::RaffleEvent,
    raffle_error::RaffleError,
    raffle_state::{Raffle, RoundState, MAX_PLAYERS},
};

/// Participant list and pot of the live round.
pub struct EntryLedger;

impl EntryLedger {
    /// Appends one entry for `player`.
    ///
    /// The fee is checked before the round state, so a wrong amount is
    /// reported as `InsufficientFee` even while the round is locked.
    /// Nothing is mutated on failure.
    pub fn record_entry(
        raffle: &mut Raffle,
        player: Pubkey,
        paid_amount: u64,
    ) -> Result<RaffleEvent, ProgramError> {
        if paid_amount != raffle.entrance_fee() {
            return Err(RaffleError::InsufficientFee.into());
        }
        if raffle.state != RoundState::Open {
            return Err(RaffleError::RoundLocked.into());
        }
        if raffle.players.len() >= MAX_PLAYERS {
            return Err(RaffleError::RaffleFull.into());
        }
        let pot_balance = raffle
            .pot_balance
            .checked_add(paid_amount)
            .ok_or(RaffleError::Overflow)?;

        raffle.players.push(player);
        raffle.pot_balance = pot_balance;

        Ok(RaffleEvent::Entered { player })
    }

    /// Empties the round after a confirmed payout.
    pub(crate) fn reset(raffle: &mut Raffle) {
        raffle.players.clear();
        raffle.pot_balance = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raffle_state::{PendingRequest, RaffleConfig};

    const FEE: u64 = 100;

    fn raffle() -> Raffle {
        let config = RaffleConfig {
            entrance_fee: FEE,
            ..RaffleConfig::default()
        };
        Raffle::new(config, Pubkey::new_unique(), 255, 0)
    }

    #[test]
    fn entries_accumulate_players_and_pot() {
        let mut raffle = raffle();
        let player = Pubkey::new_unique();
        for _ in 0..3 {
            let event = EntryLedger::record_entry(&mut raffle, player, FEE).unwrap();
            assert_eq!(event, RaffleEvent::Entered { player });
        }
        // Repeat entries from one key are separate tickets
        assert_eq!(raffle.players, vec![player; 3]);
        assert_eq!(raffle.pot_balance, 3 * FEE);
    }

    #[test]
    fn wrong_amount_is_rejected_without_mutation() {
        let mut raffle = raffle();
        for amount in [0, FEE - 1, FEE + 1, u64::MAX] {
            assert_eq!(
                EntryLedger::record_entry(&mut raffle, Pubkey::new_unique(), amount),
                Err(RaffleError::InsufficientFee.into())
            );
        }
        assert_eq!(raffle.num_players(), 0);
        assert_eq!(raffle.pot_balance, 0);
    }

    #[test]
    fn locked_round_rejects_entries() {
        let mut raffle = raffle();
        raffle.state = RoundState::Calculating;
        raffle.pending_request = Some(PendingRequest {
            request_id: 1,
            generation: 0,
        });
        assert_eq!(
            EntryLedger::record_entry(&mut raffle, Pubkey::new_unique(), FEE),
            Err(RaffleError::RoundLocked.into())
        );
        assert_eq!(
            EntryLedger::record_entry(&mut raffle, Pubkey::new_unique(), FEE + 1),
            Err(RaffleError::InsufficientFee.into())
        );
        assert!(raffle.players.is_empty());
    }

    #[test]
    fn full_round_rejects_entries() {
        let mut raffle = raffle();
        for _ in 0..MAX_PLAYERS {
            EntryLedger::record_entry(&mut raffle, Pubkey::new_unique(), FEE).unwrap();
        }
        assert_eq!(
            EntryLedger::record_entry(&mut raffle, Pubkey::new_unique(), FEE),
            Err(RaffleError::RaffleFull.into())
        );
        assert_eq!(raffle.pot_balance, MAX_PLAYERS as u64 * FEE);
    }

    #[test]
    fn reset_empties_the_round() {
        let mut raffle = raffle();
        EntryLedger::record_entry(&mut raffle, Pubkey::new_unique(), FEE).unwrap();
        EntryLedger::reset(&mut raffle);
        assert!(raffle.players.is_empty());
        assert_eq!(raffle.pot_balance, 0);
    }
}
