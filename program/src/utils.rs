use solana_program::pubkey::Pubkey;

/// Seed prefix of the raffle account
pub const RAFFLE_SEED: &[u8] = b"raffle";

/// Find the program derived address of a creator's raffle
pub fn find_raffle_address(program_id: &Pubkey, creator: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[RAFFLE_SEED, creator.as_ref()], program_id)
}
