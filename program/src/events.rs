use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{log::sol_log_data, msg, pubkey::Pubkey};
use std::fmt;

/// Observable records for off-chain listeners.
///
/// Each event is logged twice: once as a readable `msg!` line and once as
/// borsh bytes through `sol_log_data`, whose first byte is the variant tag.
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub enum RaffleEvent {
    Entered {
        player: Pubkey,
    },
    DrawRequested {
        request_id: u64,
    },
    /// Published for the coordinator that answers requests
    RandomWordsRequested {
        raffle: Pubkey,
        request_id: u64,
        key_hash: [u8; 32],
        subscription_id: u64,
        request_confirmations: u16,
        callback_gas_limit: u32,
        num_words: u32,
    },
    WinnerPicked {
        winner: Pubkey,
        prize: u64,
    },
}

impl RaffleEvent {
    pub fn emit(&self) {
        msg!("{}", self);
        match self.try_to_vec() {
            Ok(data) => sol_log_data(&[&data]),
            Err(err) => msg!("Failed to encode event: {}", err),
        }
    }
}

impl fmt::Display for RaffleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RaffleEvent::Entered { player } => write!(f, "Entered: player={}", player),
            RaffleEvent::DrawRequested { request_id } => {
                write!(f, "DrawRequested: request_id={}", request_id)
            }
            RaffleEvent::RandomWordsRequested {
                raffle,
                request_id,
                subscription_id,
                request_confirmations,
                callback_gas_limit,
                num_words,
                ..
            } => write!(
                f,
                "RandomWordsRequested: raffle={} request_id={} subscription={} \
                 confirmations={} gas_limit={} words={}",
                raffle,
                request_id,
                subscription_id,
                request_confirmations,
                callback_gas_limit,
                num_words
            ),
            RaffleEvent::WinnerPicked { winner, prize } => {
                write!(f, "WinnerPicked: winner={} prize={}", winner, prize)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_event_leads_with_its_variant_tag() {
        let data = RaffleEvent::WinnerPicked {
            winner: Pubkey::new_unique(),
            prize: 400,
        }
        .try_to_vec()
        .unwrap();
        assert_eq!(data[0], 3);
        assert_eq!(
            RaffleEvent::try_from_slice(&data).unwrap(),
            RaffleEvent::WinnerPicked {
                winner: Pubkey::new_from_array(*arrayref::array_ref![data, 1, 32]),
                prize: 400,
            }
        );
    }
}
