use arrayref::{array_mut_ref, array_ref, array_refs, mut_array_refs};
use solana_program::{
    clock::UnixTimestamp,
    program_error::ProgramError,
    program_pack::{IsInitialized, Pack, Sealed},
    pubkey::{Pubkey, PUBKEY_BYTES},
};

use crate::raffle_error::RaffleError;

/// Capacity of the participant list stored in a raffle account.
pub const MAX_PLAYERS: usize = 256;

/// Upper bound on random words a single request may ask for.
pub const MAX_RANDOM_WORDS: u32 = 8;

/// State of the live round
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundState {
    /// Accepting entries, a draw may be requested
    Open,
    /// Entries rejected, exactly one randomness request outstanding
    Calculating,
}

impl TryFrom<u8> for RoundState {
    type Error = &'static str;

    fn try_from(val: u8) -> Result<Self, Self::Error> {
        match val {
            0 => Ok(RoundState::Open),
            1 => Ok(RoundState::Calculating),
            _ => Err("Invalid round state"),
        }
    }
}

impl From<RoundState> for u8 {
    fn from(state: RoundState) -> Self {
        match state {
            RoundState::Open => 0,
            RoundState::Calculating => 1,
        }
    }
}

/// Parameters fixed when the raffle is created
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RaffleConfig {
    /// Exact amount in lamports required per entry
    pub entrance_fee: u64,
    /// Minimum seconds between draws
    pub interval: u64,
    /// Coordinator gas lane the request is billed against
    pub key_hash: [u8; 32],
    /// Coordinator subscription paying for requests
    pub subscription_id: u64,
    /// Compute budget reserved for the fulfillment callback
    pub callback_gas_limit: u32,
    /// Confirmations the coordinator waits for before answering
    pub request_confirmations: u16,
    /// Random words requested per draw
    pub num_words: u32,
}

impl RaffleConfig {
    pub const LEN: usize = 8 + 8 + 32 + 8 + 4 + 2 + 4;

    pub fn validate(&self) -> Result<(), RaffleError> {
        if self.entrance_fee == 0
            || self.callback_gas_limit == 0
            || self.num_words == 0
            || self.num_words > MAX_RANDOM_WORDS
        {
            return Err(RaffleError::InvalidRaffleConfig);
        }
        Ok(())
    }
}

impl Default for RaffleConfig {
    fn default() -> Self {
        // Development-network values: 0.01 SOL per entry, a draw every 30 seconds
        Self {
            entrance_fee: 10_000_000,
            interval: 30,
            key_hash: [0u8; 32],
            subscription_id: 0,
            callback_gas_limit: 500_000,
            request_confirmations: 3,
            num_words: 1,
        }
    }
}

/// Correlation record for the outstanding randomness request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingRequest {
    pub request_id: u64,
    /// Round generation that issued the request
    pub generation: u64,
}

/// Raffle account data: configuration plus the single live round.
#[derive(Clone, Debug, PartialEq)]
pub struct Raffle {
    /// Is the account initialized
    pub is_initialized: bool,
    pub state: RoundState,
    /// Bump of the raffle PDA
    pub bump: u8,
    /// Only key allowed to deliver randomness
    pub coordinator: Pubkey,
    pub config: RaffleConfig,
    /// Start of the current interval
    pub last_timestamp: UnixTimestamp,
    /// Sum of accepted fees in the current round
    pub pot_balance: u64,
    /// Incremented on every payout
    pub generation: u64,
    /// Incremented on every randomness request
    pub request_nonce: u64,
    /// Present only while calculating
    pub pending_request: Option<PendingRequest>,
    /// Last paid-out winner, kept after reset
    pub recent_winner: Option<Pubkey>,
    /// One entry per paid fee, in entry order
    pub players: Vec<Pubkey>,
}

impl Raffle {
    /// Size of the fixed header preceding the participant region
    pub const HEADER_LEN: usize =
        1 + 1 + 1 + 32 + RaffleConfig::LEN + 8 + 8 + 8 + 8 + 1 + 8 + 8 + 1 + 32 + 4;

    pub fn new(config: RaffleConfig, coordinator: Pubkey, bump: u8, now: UnixTimestamp) -> Self {
        Self {
            is_initialized: true,
            state: RoundState::Open,
            bump,
            coordinator,
            config,
            last_timestamp: now,
            pot_balance: 0,
            generation: 0,
            request_nonce: 0,
            pending_request: None,
            recent_winner: None,
            players: Vec::new(),
        }
    }

    pub fn entrance_fee(&self) -> u64 {
        self.config.entrance_fee
    }

    pub fn interval(&self) -> u64 {
        self.config.interval
    }

    pub fn num_words(&self) -> u32 {
        self.config.num_words
    }

    pub fn request_confirmations(&self) -> u16 {
        self.config.request_confirmations
    }

    pub fn num_players(&self) -> usize {
        self.players.len()
    }

    pub fn player(&self, index: usize) -> Result<Pubkey, RaffleError> {
        self.players
            .get(index)
            .copied()
            .ok_or(RaffleError::PlayerIndexOutOfRange)
    }

    pub fn pending_request_id(&self) -> Option<u64> {
        self.pending_request.map(|p| p.request_id)
    }
}

impl Sealed for Raffle {}

impl IsInitialized for Raffle {
    fn is_initialized(&self) -> bool {
        self.is_initialized
    }
}

impl Pack for Raffle {
    const LEN: usize = Raffle::HEADER_LEN + MAX_PLAYERS * PUBKEY_BYTES;

    fn unpack_from_slice(src: &[u8]) -> Result<Self, ProgramError> {
        let header = array_ref![src, 0, Raffle::HEADER_LEN];
        let (
            is_initialized,
            state,
            bump,
            coordinator,
            config,
            last_timestamp,
            pot_balance,
            generation,
            request_nonce,
            has_pending,
            pending_request_id,
            pending_generation,
            has_winner,
            recent_winner,
            player_count,
        ) = array_refs![header, 1, 1, 1, 32, RaffleConfig::LEN, 8, 8, 8, 8, 1, 8, 8, 1, 32, 4];

        let state = RoundState::try_from(state[0]).map_err(|_| ProgramError::InvalidAccountData)?;
        let pending_request = match has_pending[0] {
            0 => None,
            1 => Some(PendingRequest {
                request_id: u64::from_le_bytes(*pending_request_id),
                generation: u64::from_le_bytes(*pending_generation),
            }),
            _ => return Err(ProgramError::InvalidAccountData),
        };
        // A pending request exists exactly while the round is calculating
        if pending_request.is_some() != (state == RoundState::Calculating) {
            return Err(ProgramError::InvalidAccountData);
        }

        let player_count = u32::from_le_bytes(*player_count) as usize;
        if player_count > MAX_PLAYERS {
            return Err(ProgramError::InvalidAccountData);
        }
        let players = src[Raffle::HEADER_LEN..]
            .chunks_exact(PUBKEY_BYTES)
            .take(player_count)
            .map(|key| Pubkey::new_from_array(*array_ref![key, 0, PUBKEY_BYTES]))
            .collect();

        Ok(Raffle {
            is_initialized: is_initialized[0] != 0,
            state,
            bump: bump[0],
            coordinator: Pubkey::new_from_array(*coordinator),
            config: unpack_config(config),
            last_timestamp: UnixTimestamp::from_le_bytes(*last_timestamp),
            pot_balance: u64::from_le_bytes(*pot_balance),
            generation: u64::from_le_bytes(*generation),
            request_nonce: u64::from_le_bytes(*request_nonce),
            pending_request,
            recent_winner: match has_winner[0] {
                0 => None,
                _ => Some(Pubkey::new_from_array(*recent_winner)),
            },
            players,
        })
    }

    fn pack_into_slice(&self, dst: &mut [u8]) {
        let (header, players_dst) = dst.split_at_mut(Raffle::HEADER_LEN);
        let header = array_mut_ref![header, 0, Raffle::HEADER_LEN];
        let (
            is_initialized_dst,
            state_dst,
            bump_dst,
            coordinator_dst,
            config_dst,
            last_timestamp_dst,
            pot_balance_dst,
            generation_dst,
            request_nonce_dst,
            has_pending_dst,
            pending_request_id_dst,
            pending_generation_dst,
            has_winner_dst,
            recent_winner_dst,
            player_count_dst,
        ) = mut_array_refs![header, 1, 1, 1, 32, RaffleConfig::LEN, 8, 8, 8, 8, 1, 8, 8, 1, 32, 4];

        is_initialized_dst[0] = self.is_initialized as u8;
        state_dst[0] = self.state.into();
        bump_dst[0] = self.bump;
        coordinator_dst.copy_from_slice(self.coordinator.as_ref());
        pack_config(&self.config, config_dst);
        *last_timestamp_dst = self.last_timestamp.to_le_bytes();
        *pot_balance_dst = self.pot_balance.to_le_bytes();
        *generation_dst = self.generation.to_le_bytes();
        *request_nonce_dst = self.request_nonce.to_le_bytes();

        let pending = self.pending_request.unwrap_or(PendingRequest {
            request_id: 0,
            generation: 0,
        });
        has_pending_dst[0] = self.pending_request.is_some() as u8;
        *pending_request_id_dst = pending.request_id.to_le_bytes();
        *pending_generation_dst = pending.generation.to_le_bytes();

        has_winner_dst[0] = self.recent_winner.is_some() as u8;
        recent_winner_dst.copy_from_slice(self.recent_winner.unwrap_or_default().as_ref());
        *player_count_dst = (self.players.len() as u32).to_le_bytes();

        // Stale keys past the live count are zeroed so a reset leaves no residue
        for (i, slot) in players_dst.chunks_exact_mut(PUBKEY_BYTES).enumerate() {
            match self.players.get(i) {
                Some(player) => slot.copy_from_slice(player.as_ref()),
                None => slot.fill(0),
            }
        }
    }
}

pub(crate) fn unpack_config(src: &[u8; RaffleConfig::LEN]) -> RaffleConfig {
    let (
        entrance_fee,
        interval,
        key_hash,
        subscription_id,
        callback_gas_limit,
        request_confirmations,
        num_words,
    ) = array_refs![src, 8, 8, 32, 8, 4, 2, 4];

    RaffleConfig {
        entrance_fee: u64::from_le_bytes(*entrance_fee),
        interval: u64::from_le_bytes(*interval),
        key_hash: *key_hash,
        subscription_id: u64::from_le_bytes(*subscription_id),
        callback_gas_limit: u32::from_le_bytes(*callback_gas_limit),
        request_confirmations: u16::from_le_bytes(*request_confirmations),
        num_words: u32::from_le_bytes(*num_words),
    }
}

pub(crate) fn pack_config(config: &RaffleConfig, dst: &mut [u8; RaffleConfig::LEN]) {
    let (
        entrance_fee_dst,
        interval_dst,
        key_hash_dst,
        subscription_id_dst,
        callback_gas_limit_dst,
        request_confirmations_dst,
        num_words_dst,
    ) = mut_array_refs![dst, 8, 8, 32, 8, 4, 2, 4];

    *entrance_fee_dst = config.entrance_fee.to_le_bytes();
    *interval_dst = config.interval.to_le_bytes();
    *key_hash_dst = config.key_hash;
    *subscription_id_dst = config.subscription_id.to_le_bytes();
    *callback_gas_limit_dst = config.callback_gas_limit.to_le_bytes();
    *request_confirmations_dst = config.request_confirmations.to_le_bytes();
    *num_words_dst = config.num_words.to_le_bytes();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calculating_raffle() -> Raffle {
        let mut raffle = Raffle::new(RaffleConfig::default(), Pubkey::new_unique(), 254, 1_000);
        raffle.players = vec![Pubkey::new_unique(), Pubkey::new_unique()];
        raffle.pot_balance = 2 * raffle.entrance_fee();
        raffle.state = RoundState::Calculating;
        raffle.request_nonce = 1;
        raffle.pending_request = Some(PendingRequest {
            request_id: 77,
            generation: 0,
        });
        raffle
    }

    #[test]
    fn account_fits_a_single_cpi_allocation() {
        assert!(Raffle::LEN <= 10 * 1024);
    }

    #[test]
    fn packed_account_preserves_the_round() {
        let raffle = calculating_raffle();
        let mut data = vec![0u8; Raffle::LEN];
        Raffle::pack(raffle.clone(), &mut data).unwrap();
        assert_eq!(Raffle::unpack(&data).unwrap(), raffle);
    }

    #[test]
    fn reset_round_clears_stale_player_slots() {
        let mut raffle = calculating_raffle();
        let mut data = vec![0u8; Raffle::LEN];
        Raffle::pack(raffle.clone(), &mut data).unwrap();

        raffle.players.clear();
        raffle.state = RoundState::Open;
        raffle.pending_request = None;
        Raffle::pack(raffle, &mut data).unwrap();

        assert!(data[Raffle::HEADER_LEN..].iter().all(|b| *b == 0));
    }

    #[test]
    fn pending_request_without_lock_is_rejected() {
        let mut raffle = calculating_raffle();
        raffle.state = RoundState::Open;
        let mut data = vec![0u8; Raffle::LEN];
        Raffle::pack(raffle, &mut data).unwrap();
        assert_eq!(
            Raffle::unpack(&data).unwrap_err(),
            ProgramError::InvalidAccountData
        );
    }

    #[test]
    fn player_lookup_past_the_end_fails() {
        let raffle = calculating_raffle();
        assert!(raffle.player(1).is_ok());
        assert_eq!(raffle.player(2), Err(RaffleError::PlayerIndexOutOfRange));
    }

    #[test]
    fn config_rejects_zero_fee_and_word_bounds() {
        assert!(RaffleConfig::default().validate().is_ok());
        let zero_fee = RaffleConfig {
            entrance_fee: 0,
            ..RaffleConfig::default()
        };
        assert_eq!(zero_fee.validate(), Err(RaffleError::InvalidRaffleConfig));
        let too_many_words = RaffleConfig {
            num_words: MAX_RANDOM_WORDS + 1,
            ..RaffleConfig::default()
        };
        assert_eq!(too_many_words.validate(), Err(RaffleError::InvalidRaffleConfig));
    }
}
