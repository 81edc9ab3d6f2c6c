//! Farm Router: auto-compounding LP farms with share accounting and
//! timelocked upgrades.
//!
//! Users deposit liquidity-pool tokens (or a single asset that is swapped into
//! the pool's assets) through one router. Each pool has a farm that stakes the
//! LP into an external yield source, compounds harvested rewards back into
//! LP, and tracks a share supply. The router keeps the per-user share ledger.
//!
//! Architecture:
//! - `Protocol` owns the world and makes every operation atomic (snapshot and
//!   restore on error)
//! - `AssetRouter` is the only caller a farm accepts; it owns `UserStake`s
//! - Farm storage (`FarmState`) is a fixed-layout record; farm behaviour is a
//!   `FarmLogic` chosen by the factory's single implementation pointer
//! - Swaps go through an opaque `SwapExecutor` under a min-output guard;
//!   route bytes are never inspected
//! - Upgrades are scheduled on the `UpgradeGovernor`, which waits out a delay
//!   and needs signer quorum before dispatching encoded instructions
//!
//! Instructions:
//!   0 - GrantRole:            ADMIN grants a role
//!   1 - RevokeRole:           ADMIN revokes a role
//!   2 - CreateFarm:           Deploy + initialize the farm for a pool
//!   3 - UpgradeFarms:         Governor repoints every farm's behaviour
//!   4 - Deposit:              LP in, shares out
//!   5 - DepositTokens:        Pool assets in, LP staked, shares out
//!   6 - DepositWithSwap:      One token in, two-asset pool
//!   7 - DepositSingleAsset:   One token in, any pool
//!   8 - Withdraw:             Shares in, LP out
//!   9 - WithdrawTokens:       Shares in, pool assets out
//!  10 - WithdrawWithSwap:     Shares in, one token out (two-asset pool)
//!  11 - WithdrawSingleAsset:  Shares in, one token out
//!  12 - WithdrawSingleEth:    Shares in, native coin out
//!  13 - Distribute:           KEEPER compounds rewards (fee first)
//!  14 - Pause:                PAUSER stops deposits and distribution
//!  15 - Unpause
//!  16 - SetDepositCap:        ADMIN caps a pool's staked LP
//!  17 - UpgradeRouter:        Governor repoints the router implementation
//!  18 - UpdateMinDelay:       Governor changes its own delay
//!  19 - RenounceRole:         Caller drops one of its roles

pub mod access;
pub mod capability;
pub mod config;
pub mod error;
pub mod event;
pub mod factory;
pub mod farm;
pub mod governor;
pub mod instruction;
pub mod math;
pub mod processor;
pub mod protocol;
pub mod router;
pub mod state;
pub mod token;

pub use error::FarmError;
pub use protocol::Protocol;
