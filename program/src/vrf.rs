// Randomness requests for the raffle draw
use solana_program::{
    clock::UnixTimestamp, keccak, msg, program_error::ProgramError, pubkey::Pubkey,
};

use crate::{
    events::RaffleEvent,
    raffle_error::RaffleError,
    raffle_state::{PendingRequest, Raffle, RoundState},
    upkeep::UpkeepEvaluator,
};

/// Everything the coordinator needs to answer a request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RandomnessRequestParams {
    pub key_hash: [u8; 32],
    pub subscription_id: u64,
    pub request_confirmations: u16,
    pub callback_gas_limit: u32,
    pub num_words: u32,
    /// Raffle-local request counter
    pub nonce: u64,
}

impl RandomnessRequestParams {
    pub fn for_raffle(raffle: &Raffle) -> Self {
        Self {
            key_hash: raffle.config.key_hash,
            subscription_id: raffle.config.subscription_id,
            request_confirmations: raffle.config.request_confirmations,
            callback_gas_limit: raffle.config.callback_gas_limit,
            num_words: raffle.config.num_words,
            nonce: raffle.request_nonce,
        }
    }
}

/// Outbound half of the randomness protocol.
///
/// Issues a request and returns its correlation id. The answer arrives
/// later through a separate fulfillment instruction, never from this call.
pub trait RandomnessProvider {
    fn request_randomness(&mut self, params: &RandomnessRequestParams) -> Result<u64, ProgramError>;
}

/// On-chain provider: derives the request id and publishes the request
/// in the transaction log, where the off-chain coordinator picks it up.
pub struct CoordinatorRequestLog {
    pub raffle: Pubkey,
}

impl CoordinatorRequestLog {
    pub fn derive_request_id(raffle: &Pubkey, params: &RandomnessRequestParams) -> u64 {
        let hash = keccak::hashv(&[
            &params.key_hash,
            raffle.as_ref(),
            &params.subscription_id.to_le_bytes(),
            &params.nonce.to_le_bytes(),
        ]);
        let bytes = hash.to_bytes();
        u64::from_le_bytes(*arrayref::array_ref![bytes, 0, 8])
    }
}

impl RandomnessProvider for CoordinatorRequestLog {
    fn request_randomness(
        &mut self,
        params: &RandomnessRequestParams,
    ) -> Result<u64, ProgramError> {
        let request_id = Self::derive_request_id(&self.raffle, params);
        RaffleEvent::RandomWordsRequested {
            raffle: self.raffle,
            request_id,
            key_hash: params.key_hash,
            subscription_id: params.subscription_id,
            request_confirmations: params.request_confirmations,
            callback_gas_limit: params.callback_gas_limit,
            num_words: params.num_words,
        }
        .emit();
        Ok(request_id)
    }
}

/// Owns the single outstanding request of a round.
pub struct RandomnessRequestCoordinator;

impl RandomnessRequestCoordinator {
    /// Re-validates upkeep, issues one randomness request and locks the round.
    ///
    /// The predicate is evaluated again here rather than trusted from an
    /// earlier `check_upkeep`, and its `Open` requirement is what rejects a
    /// second request while one is pending.
    pub fn request_draw<P: RandomnessProvider>(
        raffle: &mut Raffle,
        now: UnixTimestamp,
        provider: &mut P,
    ) -> Result<(u64, RaffleEvent), ProgramError> {
        let check = UpkeepEvaluator::evaluate(raffle, now);
        if !check.needed {
            msg!(
                "Upkeep not needed: reason={:?} balance={} players={} state={:?}",
                check.reason,
                raffle.pot_balance,
                raffle.players.len(),
                raffle.state
            );
            return Err(RaffleError::UpkeepNotNeeded.into());
        }

        let params = RandomnessRequestParams::for_raffle(raffle);
        let request_id = provider.request_randomness(&params)?;
        let request_nonce = raffle
            .request_nonce
            .checked_add(1)
            .ok_or(RaffleError::Overflow)?;

        raffle.state = RoundState::Calculating;
        raffle.pending_request = Some(PendingRequest {
            request_id,
            generation: raffle.generation,
        });
        raffle.request_nonce = request_nonce;

        Ok((request_id, RaffleEvent::DrawRequested { request_id }))
    }
}
