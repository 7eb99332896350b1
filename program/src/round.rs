use solana_program::{
    clock::UnixTimestamp, entrypoint::ProgramResult, msg, program_error::ProgramError,
    pubkey::Pubkey,
};

use crate::{
    events::RaffleEvent,
    ledger::EntryLedger,
    raffle_error::RaffleError,
    raffle_state::{Raffle, RoundState},
    upkeep::{UpkeepCheck, UpkeepEvaluator},
    vrf::{RandomnessProvider, RandomnessRequestCoordinator},
    winner::WinnerSelector,
};

/// Owns the raffle for the duration of one instruction and applies the
/// OPEN / CALCULATING transition rules.
///
/// Events are buffered and only handed out once the caller has persisted
/// the resulting state, see [`RoundStateMachine::take_events`].
pub struct RoundStateMachine {
    raffle: Raffle,
    events: Vec<RaffleEvent>,
}

impl RoundStateMachine {
    pub fn new(raffle: Raffle) -> Self {
        Self {
            raffle,
            events: Vec::new(),
        }
    }

    pub fn raffle(&self) -> &Raffle {
        &self.raffle
    }

    pub fn into_raffle(self) -> Raffle {
        self.raffle
    }

    /// Drains the events produced by successful operations
    pub fn take_events(&mut self) -> Vec<RaffleEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn enter(&mut self, player: Pubkey, paid_amount: u64) -> ProgramResult {
        let event = EntryLedger::record_entry(&mut self.raffle, player, paid_amount)?;
        self.events.push(event);
        Ok(())
    }

    pub fn check_upkeep(&self, now: UnixTimestamp) -> UpkeepCheck {
        UpkeepEvaluator::evaluate(&self.raffle, now)
    }

    /// Requests randomness and locks the round. Returns the request id.
    pub fn perform_upkeep<P: RandomnessProvider>(
        &mut self,
        now: UnixTimestamp,
        provider: &mut P,
    ) -> Result<u64, ProgramError> {
        let (request_id, event) =
            RandomnessRequestCoordinator::request_draw(&mut self.raffle, now, provider)?;
        self.events.push(event);
        Ok(request_id)
    }

    /// Inbound callback of the randomness protocol. `caller` must be the
    /// coordinator the raffle was created with.
    pub fn fulfill_randomness<F>(
        &mut self,
        caller: &Pubkey,
        request_id: u64,
        random_words: &[u64],
        now: UnixTimestamp,
        transfer: F,
    ) -> Result<Pubkey, ProgramError>
    where
        F: FnOnce(&Pubkey, u64) -> ProgramResult,
    {
        if *caller != self.raffle.coordinator {
            msg!(
                "Fulfillment from {} rejected, expected coordinator {}",
                caller,
                self.raffle.coordinator
            );
            return Err(RaffleError::OnlyCoordinatorCanFulfill.into());
        }
        let (winner, event) = WinnerSelector::fulfill_randomness(
            &mut self.raffle,
            request_id,
            random_words,
            now,
            transfer,
        )?;
        self.events.push(event);
        Ok(winner)
    }

    pub fn entrance_fee(&self) -> u64 {
        self.raffle.entrance_fee()
    }

    pub fn interval(&self) -> u64 {
        self.raffle.interval()
    }

    pub fn num_players(&self) -> usize {
        self.raffle.num_players()
    }

    pub fn player(&self, index: usize) -> Result<Pubkey, RaffleError> {
        self.raffle.player(index)
    }

    pub fn recent_winner(&self) -> Option<Pubkey> {
        self.raffle.recent_winner
    }

    pub fn round_state(&self) -> RoundState {
        self.raffle.state
    }

    pub fn latest_timestamp(&self) -> UnixTimestamp {
        self.raffle.last_timestamp
    }

    pub fn num_words(&self) -> u32 {
        self.raffle.num_words()
    }

    pub fn request_confirmations(&self) -> u16 {
        self.raffle.request_confirmations()
    }

    pub fn coordinator(&self) -> Pubkey {
        self.raffle.coordinator
    }

    pub fn pot_balance(&self) -> u64 {
        self.raffle.pot_balance
    }

    pub fn round_generation(&self) -> u64 {
        self.raffle.generation
    }

    pub fn pending_request_id(&self) -> Option<u64> {
        self.raffle.pending_request_id()
    }
}
