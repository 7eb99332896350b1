use solana_program::{
    clock::UnixTimestamp, entrypoint::ProgramResult, msg, program_error::ProgramError,
    pubkey::Pubkey,
};

use crate::{
    events::RaffleEvent,
    ledger::EntryLedger,
    raffle_error::RaffleError,
    raffle_state::{Raffle, RoundState},
};

/// Maps a random word onto a participant index
pub fn winner_index(random_word: u64, num_players: usize) -> usize {
    (random_word % num_players as u64) as usize
}

/// Turns a fulfilled request into a paid-out winner and a fresh round.
pub struct WinnerSelector;

impl WinnerSelector {
    /// Settles the pending request.
    ///
    /// `transfer` moves the prize to the winner. The round is only committed
    /// after it returns `Ok`; on error the round is left exactly as it was
    /// (still `Calculating`) and `TransferFailure` is returned. The exclusive
    /// borrow of `raffle` is held across the transfer, so it cannot re-enter.
    pub fn fulfill_randomness<F>(
        raffle: &mut Raffle,
        request_id: u64,
        random_words: &[u64],
        now: UnixTimestamp,
        transfer: F,
    ) -> Result<(Pubkey, RaffleEvent), ProgramError>
    where
        F: FnOnce(&Pubkey, u64) -> ProgramResult,
    {
        let pending = match raffle.pending_request {
            Some(pending) if raffle.state == RoundState::Calculating => pending,
            _ => {
                msg!("No randomness request is pending, rejecting {}", request_id);
                return Err(RaffleError::InvalidRequest.into());
            }
        };
        if pending.request_id != request_id || pending.generation != raffle.generation {
            msg!(
                "Fulfillment {} does not match pending request {} (generation {}/{})",
                request_id,
                pending.request_id,
                pending.generation,
                raffle.generation
            );
            return Err(RaffleError::InvalidRequest.into());
        }
        let random_word = match random_words.first() {
            Some(word) => *word,
            None => {
                msg!("Fulfillment {} carries no random words", request_id);
                return Err(RaffleError::InvalidRequest.into());
            }
        };
        if raffle.players.is_empty() {
            return Err(RaffleError::InvalidRequest.into());
        }

        let index = winner_index(random_word, raffle.players.len());
        let winner = raffle.players[index];
        let prize = raffle.pot_balance;
        let generation = raffle
            .generation
            .checked_add(1)
            .ok_or(RaffleError::Overflow)?;
        msg!("Winner index {} of {}: {}", index, raffle.players.len(), winner);

        if let Err(err) = transfer(&winner, prize) {
            msg!("Prize transfer of {} to {} failed: {}", prize, winner, err);
            return Err(RaffleError::TransferFailure.into());
        }

        raffle.recent_winner = Some(winner);
        EntryLedger::reset(raffle);
        raffle.state = RoundState::Open;
        raffle.last_timestamp = now;
        raffle.pending_request = None;
        raffle.generation = generation;

        Ok((winner, RaffleEvent::WinnerPicked { winner, prize }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raffle_state::{PendingRequest, RaffleConfig};
    use std::cell::RefCell;

    const FEE: u64 = 100;
    const REQUEST: u64 = 31;
    const NOW: UnixTimestamp = 500;

    fn settle<F>(
        raffle: &mut Raffle,
        request_id: u64,
        random_words: &[u64],
        transfer: F,
    ) -> Result<(Pubkey, RaffleEvent), ProgramError>
    where
        F: FnOnce(&Pubkey, u64) -> ProgramResult,
    {
        WinnerSelector::fulfill_randomness(raffle, request_id, random_words, NOW, transfer)
    }

    fn locked_raffle(players: usize) -> Raffle {
        let config = RaffleConfig {
            entrance_fee: FEE,
            ..RaffleConfig::default()
        };
        let mut raffle = Raffle::new(config, Pubkey::new_unique(), 255, 0);
        raffle.players = (0..players).map(|_| Pubkey::new_unique()).collect();
        raffle.pot_balance = FEE * players as u64;
        raffle.state = RoundState::Calculating;
        raffle.pending_request = Some(PendingRequest {
            request_id: REQUEST,
            generation: 0,
        });
        raffle
    }

    #[test]
    fn index_wraps_over_players() {
        assert_eq!(winner_index(7, 1), 0);
        assert_eq!(winner_index(42, 4), 2);
        assert_eq!(winner_index(u64::MAX, 10), 5);
    }

    #[test]
    fn pays_the_selected_player_and_resets() {
        let mut raffle = locked_raffle(4);
        let expected = raffle.players[2];
        let payouts = RefCell::new(Vec::new());

        let (winner, event) = settle(&mut raffle, REQUEST, &[42], |to, amount| {
            payouts.borrow_mut().push((*to, amount));
            Ok(())
        })
        .unwrap();

        assert_eq!(winner, expected);
        assert_eq!(event, RaffleEvent::WinnerPicked { winner, prize: 400 });
        assert_eq!(payouts.into_inner(), vec![(expected, 400)]);
        assert_eq!(raffle.recent_winner, Some(expected));
        assert_eq!(raffle.state, RoundState::Open);
        assert!(raffle.players.is_empty());
        assert_eq!(raffle.pot_balance, 0);
        assert_eq!(raffle.pending_request, None);
        assert_eq!(raffle.last_timestamp, NOW);
        assert_eq!(raffle.generation, 1);
    }

    #[test]
    fn mismatched_request_changes_nothing() {
        let mut raffle = locked_raffle(3);
        let before = raffle.clone();
        let result = settle(&mut raffle, REQUEST + 1, &[1], |_, _| {
            panic!("no payout expected")
        });
        assert_eq!(result, Err(RaffleError::InvalidRequest.into()));
        assert_eq!(raffle, before);
    }

    #[test]
    fn stale_generation_is_rejected() {
        let mut raffle = locked_raffle(2);
        raffle.generation = 5;
        let result = settle(&mut raffle, REQUEST, &[1], |_, _| Ok(()));
        assert_eq!(result, Err(RaffleError::InvalidRequest.into()));
        assert_eq!(raffle.state, RoundState::Calculating);
    }

    #[test]
    fn unsolicited_fulfillment_is_rejected() {
        let mut raffle = locked_raffle(2);
        raffle.state = RoundState::Open;
        raffle.pending_request = None;
        let result = settle(&mut raffle, 0, &[1], |_, _| Ok(()));
        assert_eq!(result, Err(RaffleError::InvalidRequest.into()));
        assert_eq!(raffle.players.len(), 2);
    }

    #[test]
    fn empty_word_list_is_rejected() {
        let mut raffle = locked_raffle(2);
        let result = settle(&mut raffle, REQUEST, &[], |_, _| Ok(()));
        assert_eq!(result, Err(RaffleError::InvalidRequest.into()));
        assert_eq!(raffle.pending_request_id(), Some(REQUEST));
    }

    #[test]
    fn failed_transfer_keeps_the_round_locked() {
        let mut raffle = locked_raffle(4);
        let before = raffle.clone();
        let result = settle(&mut raffle, REQUEST, &[42], |_, _| {
            Err(ProgramError::InsufficientFunds)
        });
        assert_eq!(result, Err(RaffleError::TransferFailure.into()));
        assert_eq!(raffle, before);

        // The same fulfillment can be retried once the payout goes through
        let (winner, _) = settle(&mut raffle, REQUEST, &[42], |_, _| Ok(())).unwrap();
        assert_eq!(winner, before.players[2]);
    }

    #[test]
    fn replayed_fulfillment_pays_only_once() {
        let mut raffle = locked_raffle(1);
        let paid = RefCell::new(0u64);
        let pay = |_: &Pubkey, amount: u64| -> ProgramResult {
            *paid.borrow_mut() += amount;
            Ok(())
        };
        settle(&mut raffle, REQUEST, &[7], pay).unwrap();
        assert_eq!(
            WinnerSelector::fulfill_randomness(&mut raffle, REQUEST, &[7], 600, pay),
            Err(RaffleError::InvalidRequest.into())
        );
        assert_eq!(*paid.borrow(), FEE);
        assert_eq!(raffle.last_timestamp, NOW);
    }
}
