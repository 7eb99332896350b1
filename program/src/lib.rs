//! Upkeep-driven raffle: players buy entries into a single round, a keeper
//! triggers the draw once the interval has elapsed, and a randomness
//! coordinator fulfills the request that picks and pays the winner.

pub mod events;
pub mod ledger;
pub mod raffle_error;
pub mod raffle_instruction;
pub mod raffle_processor;
pub mod raffle_state;
pub mod round;
pub mod upkeep;
pub mod utils;
pub mod vrf;
pub mod winner;

#[cfg(not(feature = "no-entrypoint"))]
mod raffle_entrypoint;

use solana_program::{
    account_info::AccountInfo,
    entrypoint::ProgramResult,
    program_error::PrintProgramError,
    pubkey::Pubkey,
};

use crate::raffle_error::RaffleError;

pub fn process_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    let result = raffle_processor::Processor::process(program_id, accounts, instruction_data);
    if let Err(error) = result {
        error.print::<RaffleError>();
        return Err(error);
    }
    Ok(())
}
