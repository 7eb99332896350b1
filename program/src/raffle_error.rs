use solana_program::{
    decode_error::DecodeError,
    msg,
    program_error::{PrintProgramError, ProgramError},
};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive as _;
use thiserror::Error;

/// Errors that may be returned by the raffle program.
///
/// Discriminants are stable: they are surfaced to clients as
/// `ProgramError::Custom(code)`.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq, FromPrimitive)]
pub enum RaffleError {
    /// Invalid instruction data passed
    #[error("Invalid instruction data")]
    InvalidInstruction,

    /// Paid amount is not exactly the entrance fee
    #[error("Paid amount does not match the entrance fee")]
    InsufficientFee,

    /// Entry attempted while a draw is being calculated
    #[error("Round is locked while a draw is being calculated")]
    RoundLocked,

    /// Draw requested while the upkeep predicate is false
    #[error("Upkeep not needed")]
    UpkeepNotNeeded,

    /// Fulfillment for an unknown, stale or mismatched request
    #[error("Randomness fulfillment does not match the pending request")]
    InvalidRequest,

    /// Prize could not be paid out; the round stays locked
    #[error("Prize transfer to the winner failed")]
    TransferFailure,

    #[error("Only the configured coordinator can fulfill randomness")]
    OnlyCoordinatorCanFulfill,

    #[error("Raffle has reached its participant capacity")]
    RaffleFull,

    #[error("Player index out of range")]
    PlayerIndexOutOfRange,

    #[error("Arithmetic overflow")]
    Overflow,

    #[error("Invalid raffle configuration")]
    InvalidRaffleConfig,
}

impl From<RaffleError> for ProgramError {
    fn from(e: RaffleError) -> Self {
        ProgramError::Custom(e as u32)
    }
}

impl<T> DecodeError<T> for RaffleError {
    fn type_of() -> &'static str {
        "Raffle Error"
    }
}

impl PrintProgramError for RaffleError {
    fn print<E>(&self) {
        msg!("Raffle error: {}", self);
    }
}

impl RaffleError {
    /// Maps a `ProgramError::Custom` code back to the variant that produced it.
    pub fn from_code(code: u32) -> Option<Self> {
        Self::from_u32(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_codes_decode_back_to_their_variant() {
        let err: ProgramError = RaffleError::InvalidRequest.into();
        match err {
            ProgramError::Custom(code) => {
                assert_eq!(RaffleError::from_code(code), Some(RaffleError::InvalidRequest))
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(RaffleError::from_code(999), None);
    }

    #[test]
    fn custom_program_errors_print_through_the_raffle_enum() {
        for code in 0..=RaffleError::InvalidRaffleConfig as u32 {
            let err = RaffleError::from_code(code).unwrap();
            assert_eq!(err as u32, code);
            err.print::<RaffleError>();
            ProgramError::from(err).print::<RaffleError>();
        }
        assert_eq!(
            <RaffleError as DecodeError<RaffleError>>::decode_custom_error_to_enum(2),
            Some(RaffleError::RoundLocked)
        );
        assert_eq!(
            RaffleError::RoundLocked.to_string(),
            "Round is locked while a draw is being calculated"
        );
    }
}
