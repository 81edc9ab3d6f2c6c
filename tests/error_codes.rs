//! Error code uniqueness and completeness tests.

use farm_router::error::{ErrorKind, FarmError};
use solana_program::program_error::ProgramError;

const ALL: [FarmError; 31] = [
    FarmError::CallerNotAssetRouter,
    FarmError::MissingRole,
    FarmError::Unauthorized,
    FarmError::AlreadyInitialized,
    FarmError::NotInitialized,
    FarmError::NoLiquidity,
    FarmError::NoLiquidityProvided,
    FarmError::InsufficientAmount,
    FarmError::FarmAlreadyExists,
    FarmError::FarmNotFound,
    FarmError::PoolNotRegistered,
    FarmError::PoolAlreadyRegistered,
    FarmError::Paused,
    FarmError::Reentrancy,
    FarmError::InvalidRoutes,
    FarmError::InsufficientFunds,
    FarmError::DepositCapExceeded,
    FarmError::FeeTooHigh,
    FarmError::UnknownImplementation,
    FarmError::InvalidConfig,
    FarmError::Overflow,
    FarmError::SlippageExceeded,
    FarmError::OperationNotReady,
    FarmError::OperationAlreadyScheduled,
    FarmError::OperationAlreadyExecuted,
    FarmError::OperationNotFound,
    FarmError::OperationCancelled,
    FarmError::InsufficientDelay,
    FarmError::MissingDependency,
    FarmError::InvalidInstruction,
    FarmError::UnknownTarget,
];

#[test]
fn test_all_error_codes_sequential() {
    for (i, err) in ALL.iter().enumerate() {
        assert_eq!(*err as u32, i as u32, "{:?} expected code {}", err, i);
    }
}

#[test]
fn test_error_to_program_error() {
    let err: ProgramError = FarmError::Unauthorized.into();
    match err {
        ProgramError::Custom(code) => assert_eq!(code, 2),
        _ => panic!("Expected Custom error"),
    }
    for err in ALL {
        let pe: ProgramError = err.into();
        assert_eq!(pe, ProgramError::Custom(err as u32));
    }
}

#[test]
fn test_error_kinds() {
    assert_eq!(FarmError::CallerNotAssetRouter.kind(), ErrorKind::Authorization);
    assert_eq!(FarmError::MissingRole.kind(), ErrorKind::Authorization);
    assert_eq!(FarmError::Overflow.kind(), ErrorKind::Arithmetic);
    assert_eq!(FarmError::SlippageExceeded.kind(), ErrorKind::Slippage);
    assert_eq!(FarmError::MissingDependency.kind(), ErrorKind::GovernanceTiming);
    assert_eq!(FarmError::UnknownTarget.kind(), ErrorKind::Codec);
    assert_eq!(FarmError::Paused.kind(), ErrorKind::State);
    assert_eq!(FarmError::DepositCapExceeded.kind(), ErrorKind::State);
}
