use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program,
};
use std::mem::size_of;

use crate::{
    raffle_error::RaffleError,
    raffle_state::{pack_config, unpack_config, RaffleConfig, MAX_RANDOM_WORDS},
    utils::find_raffle_address,
};

#[derive(Clone, Debug, PartialEq)]
pub enum RaffleInstruction {
    /// Create the raffle account and open the first round
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The creator, pays for the raffle account
    /// 1. `[writable]` The raffle account (PDA of `["raffle", creator]`)
    /// 2. `[]` The randomness coordinator allowed to fulfill requests
    /// 3. `[]` The system program
    InitializeRaffle { config: RaffleConfig },

    /// Buy one entry into the open round
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The entrant, pays the fee
    /// 1. `[writable]` The raffle account
    /// 2. `[]` The system program
    EnterRaffle {
        /// Must equal the entrance fee exactly
        amount: u64,
    },

    /// Evaluate whether a draw may be triggered now. The borsh encoded
    /// `UpkeepCheck` is written to the transaction return data.
    ///
    /// Accounts expected:
    /// 0. `[]` The raffle account
    CheckUpkeep,

    /// Request randomness and lock the round. Anyone may call this.
    ///
    /// Accounts expected:
    /// 0. `[signer]` The caller
    /// 1. `[writable]` The raffle account
    PerformUpkeep,

    /// Deliver the random words for the pending request and pay the winner
    ///
    /// Accounts expected:
    /// 0. `[signer]` The coordinator
    /// 1. `[writable]` The raffle account
    /// 2. `[writable]` The winner, must match the player the words select
    FulfillRandomWords {
        request_id: u64,
        random_words: Vec<u64>,
    },
}

impl RaffleInstruction {
    /// Unpacks a byte buffer into a RaffleInstruction
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        let (tag, rest) = input.split_first().ok_or(RaffleError::InvalidInstruction)?;

        Ok(match tag {
            0 => {
                let config = rest
                    .get(..RaffleConfig::LEN)
                    .and_then(|slice| slice.try_into().ok())
                    .map(unpack_config)
                    .ok_or(RaffleError::InvalidInstruction)?;
                Self::InitializeRaffle { config }
            }
            1 => {
                let (amount, _) = Self::unpack_u64(rest)?;
                Self::EnterRaffle { amount }
            }
            2 => Self::CheckUpkeep,
            3 => Self::PerformUpkeep,
            4 => {
                let (request_id, rest) = Self::unpack_u64(rest)?;
                let (count, mut rest) = rest.split_first().ok_or(RaffleError::InvalidInstruction)?;
                if *count as u32 > MAX_RANDOM_WORDS {
                    return Err(RaffleError::InvalidInstruction.into());
                }
                let mut random_words = Vec::with_capacity(*count as usize);
                for _ in 0..*count {
                    let (word, next) = Self::unpack_u64(rest)?;
                    random_words.push(word);
                    rest = next;
                }
                Self::FulfillRandomWords {
                    request_id,
                    random_words,
                }
            }
            _ => return Err(RaffleError::InvalidInstruction.into()),
        })
    }

    /// Packs a RaffleInstruction into a byte buffer
    pub fn pack(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(size_of::<Self>());
        match self {
            Self::InitializeRaffle { config } => {
                buf.push(0);
                let mut packed = [0u8; RaffleConfig::LEN];
                pack_config(config, &mut packed);
                buf.extend_from_slice(&packed);
            }
            Self::EnterRaffle { amount } => {
                buf.push(1);
                buf.extend_from_slice(&amount.to_le_bytes());
            }
            Self::CheckUpkeep => buf.push(2),
            Self::PerformUpkeep => buf.push(3),
            Self::FulfillRandomWords {
                request_id,
                random_words,
            } => {
                buf.push(4);
                buf.extend_from_slice(&request_id.to_le_bytes());
                buf.push(random_words.len() as u8);
                for word in random_words {
                    buf.extend_from_slice(&word.to_le_bytes());
                }
            }
        }
        buf
    }

    fn unpack_u64(input: &[u8]) -> Result<(u64, &[u8]), ProgramError> {
        if input.len() < 8 {
            return Err(RaffleError::InvalidInstruction.into());
        }
        let (amount, rest) = input.split_at(8);
        let amount = amount
            .try_into()
            .map(u64::from_le_bytes)
            .map_err(|_| RaffleError::InvalidInstruction)?;
        Ok((amount, rest))
    }
}

/// Create initialize_raffle instruction. The raffle address is derived
/// from the creator.
pub fn initialize_raffle(
    program_id: &Pubkey,
    creator: &Pubkey,
    coordinator: &Pubkey,
    config: RaffleConfig,
) -> Result<Instruction, ProgramError> {
    let (raffle_account, _) = find_raffle_address(program_id, creator);
    let data = RaffleInstruction::InitializeRaffle { config }.pack();

    let accounts = vec![
        AccountMeta::new(*creator, true),
        AccountMeta::new(raffle_account, false),
        AccountMeta::new_readonly(*coordinator, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

/// Create enter_raffle instruction
pub fn enter_raffle(
    program_id: &Pubkey,
    entrant: &Pubkey,
    raffle_account: &Pubkey,
    amount: u64,
) -> Result<Instruction, ProgramError> {
    let data = RaffleInstruction::EnterRaffle { amount }.pack();

    let accounts = vec![
        AccountMeta::new(*entrant, true),
        AccountMeta::new(*raffle_account, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

/// Create check_upkeep instruction
pub fn check_upkeep(
    program_id: &Pubkey,
    raffle_account: &Pubkey,
) -> Result<Instruction, ProgramError> {
    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![AccountMeta::new_readonly(*raffle_account, false)],
        data: RaffleInstruction::CheckUpkeep.pack(),
    })
}

/// Create perform_upkeep instruction
pub fn perform_upkeep(
    program_id: &Pubkey,
    caller: &Pubkey,
    raffle_account: &Pubkey,
) -> Result<Instruction, ProgramError> {
    let data = RaffleInstruction::PerformUpkeep.pack();

    let accounts = vec![
        AccountMeta::new_readonly(*caller, true),
        AccountMeta::new(*raffle_account, false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

/// Create fulfill_random_words instruction
pub fn fulfill_random_words(
    program_id: &Pubkey,
    coordinator: &Pubkey,
    raffle_account: &Pubkey,
    winner: &Pubkey,
    request_id: u64,
    random_words: Vec<u64>,
) -> Result<Instruction, ProgramError> {
    if random_words.len() > MAX_RANDOM_WORDS as usize {
        return Err(RaffleError::InvalidInstruction.into());
    }
    let data = RaffleInstruction::FulfillRandomWords {
        request_id,
        random_words,
    }
    .pack();

    let accounts = vec![
        AccountMeta::new_readonly(*coordinator, true),
        AccountMeta::new(*raffle_account, false),
        AccountMeta::new(*winner, false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}
