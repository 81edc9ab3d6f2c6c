use solana_program::program_error::ProgramError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum FarmError {
    /// Farm entry point invoked by someone other than the asset router
    CallerNotAssetRouter = 0,
    /// Caller lacks the role required by this entry point
    MissingRole = 1,
    /// Caller is not the governor, or governor quorum not reached
    Unauthorized = 2,
    /// Farm already initialized
    AlreadyInitialized = 3,
    /// Farm not initialized
    NotInitialized = 4,
    /// Farm has no staked liquidity (or holds orphaned liquidity)
    NoLiquidity = 5,
    /// Zero liquidity provided, or deposit too small to mint a share
    NoLiquidityProvided = 6,
    /// Share amount is zero or exceeds the recorded balance
    InsufficientAmount = 7,
    /// A farm already exists for this pool
    FarmAlreadyExists = 8,
    /// No farm exists for this pool
    FarmNotFound = 9,
    /// Pool has no registered venue
    PoolNotRegistered = 10,
    /// Pool venue already registered
    PoolAlreadyRegistered = 11,
    /// Router is paused
    Paused = 12,
    /// Entry point re-entered while a mutation is in progress
    Reentrancy = 13,
    /// Route count or route amounts do not match the pool
    InvalidRoutes = 14,
    /// Token balance or allowance too low
    InsufficientFunds = 15,
    /// Deposit cap exceeded
    DepositCapExceeded = 16,
    /// Distribution fee above the configured cap
    FeeTooHigh = 17,
    /// Implementation id not present in the behaviour table
    UnknownImplementation = 18,
    /// Protocol configuration rejected
    InvalidConfig = 19,
    /// Arithmetic overflow
    Overflow = 20,
    /// Swap or liquidity output below the declared minimum
    SlippageExceeded = 21,
    /// Operation eta not reached
    OperationNotReady = 22,
    /// Operation already scheduled (or cancelled)
    OperationAlreadyScheduled = 23,
    /// Operation already executed
    OperationAlreadyExecuted = 24,
    /// Operation never scheduled
    OperationNotFound = 25,
    /// Operation was cancelled
    OperationCancelled = 26,
    /// Requested delay below the governor's minimum
    InsufficientDelay = 27,
    /// Predecessor operation not executed yet
    MissingDependency = 28,
    /// Instruction data could not be decoded
    InvalidInstruction = 29,
    /// Instruction sent to a component that does not handle it
    UnknownTarget = 30,
}

/// Coarse error classes callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authorization,
    State,
    Arithmetic,
    Slippage,
    GovernanceTiming,
    Codec,
}

impl FarmError {
    pub fn kind(self) -> ErrorKind {
        use FarmError::*;
        match self {
            CallerNotAssetRouter | MissingRole | Unauthorized => ErrorKind::Authorization,
            Overflow => ErrorKind::Arithmetic,
            SlippageExceeded => ErrorKind::Slippage,
            OperationNotReady
            | OperationAlreadyScheduled
            | OperationAlreadyExecuted
            | OperationNotFound
            | OperationCancelled
            | InsufficientDelay
            | MissingDependency => ErrorKind::GovernanceTiming,
            InvalidInstruction | UnknownTarget => ErrorKind::Codec,
            _ => ErrorKind::State,
        }
    }
}

impl From<FarmError> for ProgramError {
    fn from(e: FarmError) -> Self {
        ProgramError::Custom(e as u32)
    }
}
