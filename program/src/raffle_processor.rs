use borsh::BorshSerialize;
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    msg,
    program::{invoke, invoke_signed, set_return_data},
    program_error::ProgramError,
    program_pack::Pack,
    pubkey::Pubkey,
    system_instruction, system_program,
    sysvar::{clock::Clock, rent::Rent, Sysvar},
};

use crate::{
    raffle_error::RaffleError,
    raffle_instruction::RaffleInstruction,
    raffle_state::{Raffle, RaffleConfig},
    round::RoundStateMachine,
    utils::{find_raffle_address, RAFFLE_SEED},
    vrf::CoordinatorRequestLog,
};

pub struct Processor;

impl Processor {
    pub fn process(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        instruction_data: &[u8],
    ) -> ProgramResult {
        let instruction = RaffleInstruction::unpack(instruction_data)?;

        match instruction {
            RaffleInstruction::InitializeRaffle { config } => {
                msg!("Instruction: Initialize Raffle");
                Self::process_initialize_raffle(accounts, config, program_id)
            }
            RaffleInstruction::EnterRaffle { amount } => {
                msg!("Instruction: Enter Raffle");
                Self::process_enter_raffle(accounts, amount, program_id)
            }
            RaffleInstruction::CheckUpkeep => {
                msg!("Instruction: Check Upkeep");
                Self::process_check_upkeep(accounts, program_id)
            }
            RaffleInstruction::PerformUpkeep => {
                msg!("Instruction: Perform Upkeep");
                Self::process_perform_upkeep(accounts, program_id)
            }
            RaffleInstruction::FulfillRandomWords {
                request_id,
                random_words,
            } => {
                msg!("Instruction: Fulfill Random Words");
                Self::process_fulfill_random_words(accounts, request_id, &random_words, program_id)
            }
        }
    }

    fn process_initialize_raffle(
        accounts: &[AccountInfo],
        config: RaffleConfig,
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let creator_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let coordinator_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !creator_info.is_signer {
            msg!("Creator must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }
        if !system_program::check_id(system_program_info.key) {
            return Err(ProgramError::IncorrectProgramId);
        }

        let (expected_raffle, bump) = find_raffle_address(program_id, creator_info.key);
        if *raffle_info.key != expected_raffle {
            msg!("Invalid raffle account address");
            return Err(ProgramError::InvalidSeeds);
        }
        if raffle_info.owner == program_id {
            msg!("Raffle account is already initialized");
            return Err(ProgramError::AccountAlreadyInitialized);
        }
        config.validate()?;

        let rent_lamports = Rent::get()?.minimum_balance(Raffle::LEN);
        let bump_seed = [bump];
        let signer_seeds: &[&[u8]] = &[RAFFLE_SEED, creator_info.key.as_ref(), &bump_seed];

        if raffle_info.lamports() == 0 {
            invoke_signed(
                &system_instruction::create_account(
                    creator_info.key,
                    raffle_info.key,
                    rent_lamports,
                    Raffle::LEN as u64,
                    program_id,
                ),
                &[
                    creator_info.clone(),
                    raffle_info.clone(),
                    system_program_info.clone(),
                ],
                &[signer_seeds],
            )?;
        } else {
            // create_account rejects an address that already holds lamports
            let shortfall = rent_lamports.saturating_sub(raffle_info.lamports());
            if shortfall > 0 {
                invoke(
                    &system_instruction::transfer(creator_info.key, raffle_info.key, shortfall),
                    &[
                        creator_info.clone(),
                        raffle_info.clone(),
                        system_program_info.clone(),
                    ],
                )?;
            }
            invoke_signed(
                &system_instruction::allocate(raffle_info.key, Raffle::LEN as u64),
                &[raffle_info.clone(), system_program_info.clone()],
                &[signer_seeds],
            )?;
            invoke_signed(
                &system_instruction::assign(raffle_info.key, program_id),
                &[raffle_info.clone(), system_program_info.clone()],
                &[signer_seeds],
            )?;
        }

        let now = Clock::get()?.unix_timestamp;
        let raffle = Raffle::new(config, *coordinator_info.key, bump, now);
        Raffle::pack(raffle, &mut raffle_info.data.borrow_mut())?;

        msg!(
            "Raffle initialized: fee={} interval={} coordinator={}",
            config.entrance_fee,
            config.interval,
            coordinator_info.key
        );
        Ok(())
    }

    fn process_enter_raffle(
        accounts: &[AccountInfo],
        amount: u64,
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let entrant_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !entrant_info.is_signer {
            msg!("Entrant must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut machine = RoundStateMachine::new(Self::load_raffle(raffle_info, program_id)?);
        machine.enter(*entrant_info.key, amount)?;

        invoke(
            &system_instruction::transfer(entrant_info.key, raffle_info.key, amount),
            &[
                entrant_info.clone(),
                raffle_info.clone(),
                system_program_info.clone(),
            ],
        )?;

        msg!("Entry {} recorded, pot={}", machine.num_players(), machine.pot_balance());
        Self::commit(machine, raffle_info)
    }

    fn process_check_upkeep(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let raffle_info = next_account_info(account_info_iter)?;

        let machine = RoundStateMachine::new(Self::load_raffle(raffle_info, program_id)?);
        let check = machine.check_upkeep(Clock::get()?.unix_timestamp);
        msg!("Upkeep needed={} reason={:?}", check.needed, check.reason);

        let data = check
            .try_to_vec()
            .map_err(|err| ProgramError::BorshIoError(err.to_string()))?;
        set_return_data(&data);
        Ok(())
    }

    fn process_perform_upkeep(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let caller_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;

        if !caller_info.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut machine = RoundStateMachine::new(Self::load_raffle(raffle_info, program_id)?);
        let mut provider = CoordinatorRequestLog {
            raffle: *raffle_info.key,
        };
        let request_id = machine.perform_upkeep(Clock::get()?.unix_timestamp, &mut provider)?;

        msg!("Round locked by {}, awaiting request {}", caller_info.key, request_id);
        Self::commit(machine, raffle_info)
    }

    fn process_fulfill_random_words(
        accounts: &[AccountInfo],
        request_id: u64,
        random_words: &[u64],
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let coordinator_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let winner_info = next_account_info(account_info_iter)?;

        if !coordinator_info.is_signer {
            msg!("Coordinator must sign the fulfillment");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut machine = RoundStateMachine::new(Self::load_raffle(raffle_info, program_id)?);
        // The raffle must stay rent exempt after the prize leaves it
        let rent_floor = Rent::get()?.minimum_balance(raffle_info.data_len());
        let now = Clock::get()?.unix_timestamp;

        let payout = |winner: &Pubkey, prize: u64| -> ProgramResult {
            if winner != winner_info.key {
                msg!("Winner account {} does not match drawn winner {}", winner_info.key, winner);
                return Err(ProgramError::InvalidArgument);
            }
            let remaining = raffle_info
                .lamports()
                .checked_sub(prize)
                .filter(|remaining| *remaining >= rent_floor)
                .ok_or(ProgramError::InsufficientFunds)?;
            let credited = winner_info
                .lamports()
                .checked_add(prize)
                .ok_or(RaffleError::Overflow)?;

            **raffle_info.try_borrow_mut_lamports()? = remaining;
            **winner_info.try_borrow_mut_lamports()? = credited;
            Ok(())
        };

        let result =
            machine.fulfill_randomness(coordinator_info.key, request_id, random_words, now, payout);
        if let Err(err) = &result {
            msg!("Fulfillment of request {} failed: {}", request_id, err);
        }
        let winner = result?;

        msg!("Prize paid to {}", winner);
        Self::commit(machine, raffle_info)
    }

    fn load_raffle(raffle_info: &AccountInfo, program_id: &Pubkey) -> Result<Raffle, ProgramError> {
        if raffle_info.owner != program_id {
            msg!("Raffle account must be owned by this program");
            return Err(ProgramError::IncorrectProgramId);
        }
        Raffle::unpack(&raffle_info.data.borrow())
    }

    /// Persists the round, then publishes what happened to it
    fn commit(mut machine: RoundStateMachine, raffle_info: &AccountInfo) -> ProgramResult {
        let events = machine.take_events();
        Raffle::pack(machine.into_raffle(), &mut raffle_info.data.borrow_mut())?;
        for event in &events {
            event.emit();
        }
        Ok(())
    }
}
