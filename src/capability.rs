//! External collaborators and the swap guard.
//!
//! The yield source, the AMM and the swap executor are opaque: the core only
//! sees these traits and checks their effects against ledger balances.

use solana_program::{msg, pubkey::Pubkey};

use crate::error::FarmError;
use crate::token::TokenLedger;

/// External staking protocol for one pool's LP token.
pub trait YieldSource: std::fmt::Debug {
    fn address(&self) -> Pubkey;
    fn lp_mint(&self) -> Pubkey;
    fn reward_mint(&self) -> Pubkey;

    /// LP currently staked by `staker`.
    fn staked(&self, staker: &Pubkey) -> u64;

    fn pending_reward(&self, tokens: &TokenLedger, staker: &Pubkey) -> u64;

    /// Move `amount` LP from `staker` into the source.
    fn stake(
        &mut self,
        tokens: &mut TokenLedger,
        staker: &Pubkey,
        amount: u64,
    ) -> Result<(), FarmError>;

    /// Return `amount` staked LP to `staker`.
    fn unstake(
        &mut self,
        tokens: &mut TokenLedger,
        staker: &Pubkey,
        amount: u64,
    ) -> Result<(), FarmError>;

    /// Pay accrued rewards to `staker`; returns the amount credited.
    fn harvest(&mut self, tokens: &mut TokenLedger, staker: &Pubkey) -> Result<u64, FarmError>;

    fn box_clone(&self) -> Box<dyn YieldSource>;
}

/// AMM whose LP token a farm stakes.
pub trait LiquidityPool: std::fmt::Debug {
    fn address(&self) -> Pubkey;
    fn lp_mint(&self) -> Pubkey;

    /// Constituent asset mints in pool order.
    fn assets(&self) -> Vec<Pubkey>;

    /// Reserves in the same order as `assets`.
    fn reserves(&self, tokens: &TokenLedger) -> Vec<u64>;

    /// Offer up to `amounts[i]` of each asset from `provider`. The pool pulls
    /// what it uses, mints LP to `provider` and returns the LP minted.
    fn add_liquidity(
        &mut self,
        tokens: &mut TokenLedger,
        provider: &Pubkey,
        amounts: &[u64],
    ) -> Result<u64, FarmError>;

    /// Burn `lp` from `provider` and pay out the underlying assets.
    fn remove_liquidity(
        &mut self,
        tokens: &mut TokenLedger,
        provider: &Pubkey,
        lp: u64,
    ) -> Result<Vec<u64>, FarmError>;

    fn box_clone(&self) -> Box<dyn LiquidityPool>;
}

/// Executes opaque swap routes.
pub trait SwapExecutor: std::fmt::Debug {
    fn address(&self) -> Pubkey;

    /// Swap the owner's `input_mint` (pulled through the allowance granted to
    /// `address()`) into `output_mint`, paid to the owner. Returns the output.
    fn execute(&mut self, tokens: &mut TokenLedger, request: &SwapRequest<'_>)
        -> Result<u64, FarmError>;

    fn box_clone(&self) -> Box<dyn SwapExecutor>;
}

impl Clone for Box<dyn YieldSource> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

impl Clone for Box<dyn LiquidityPool> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

impl Clone for Box<dyn SwapExecutor> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// Caller-supplied route. `data` is passed to the executor untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwapRoute {
    pub amount_in: u64,
    pub min_amount_out: u64,
    pub data: Vec<u8>,
}

impl SwapRoute {
    pub fn new(amount_in: u64, min_amount_out: u64, data: Vec<u8>) -> Self {
        Self { amount_in, min_amount_out, data }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SwapRequest<'a> {
    pub owner: Pubkey,
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    pub max_amount_in: u64,
    pub route: &'a SwapRoute,
}

/// Measured effect of one guarded swap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwapOutcome {
    pub spent: u64,
    pub received: u64,
}

/// Run one route for `owner`, spending at most `max_amount_in`.
///
/// The executor is approved for exactly `max_amount_in` and the residual
/// approval is revoked afterwards. Spent and received amounts are measured
/// from balances, not taken from the executor's return value. Spending more
/// than `max_amount_in` or receiving less than `route.min_amount_out` fails
/// with `SlippageExceeded`.
pub fn swap_with_guard(
    executor: &mut dyn SwapExecutor,
    tokens: &mut TokenLedger,
    owner: &Pubkey,
    input_mint: &Pubkey,
    output_mint: &Pubkey,
    max_amount_in: u64,
    route: &SwapRoute,
) -> Result<SwapOutcome, FarmError> {
    if max_amount_in == 0 {
        if route.min_amount_out > 0 {
            return Err(FarmError::SlippageExceeded);
        }
        return Ok(SwapOutcome::default());
    }
    if input_mint == output_mint {
        return Err(FarmError::InvalidRoutes);
    }

    let spender = executor.address();
    let in_before = tokens.balance_of(input_mint, owner);
    let out_before = tokens.balance_of(output_mint, owner);

    tokens.approve(input_mint, owner, &spender, max_amount_in);
    let request = SwapRequest {
        owner: *owner,
        input_mint: *input_mint,
        output_mint: *output_mint,
        max_amount_in,
        route,
    };
    executor.execute(tokens, &request)?;
    tokens.revoke(input_mint, owner, &spender);

    let spent = in_before.saturating_sub(tokens.balance_of(input_mint, owner));
    let received = tokens
        .balance_of(output_mint, owner)
        .saturating_sub(out_before);

    if spent > max_amount_in {
        msg!("Error: swap spent {} over its limit {}", spent, max_amount_in);
        return Err(FarmError::SlippageExceeded);
    }
    if received < route.min_amount_out {
        msg!(
            "Error: swap returned {} below minimum {}",
            received,
            route.min_amount_out
        );
        return Err(FarmError::SlippageExceeded);
    }
    Ok(SwapOutcome { spent, received })
}

/// A registered pool's external capabilities.
#[derive(Debug, Clone)]
pub struct Venue {
    pub amm: Box<dyn LiquidityPool>,
    pub yield_source: Box<dyn YieldSource>,
}

impl Venue {
    pub fn new(amm: Box<dyn LiquidityPool>, yield_source: Box<dyn YieldSource>) -> Self {
        Self { amm, yield_source }
    }

    pub fn pool(&self) -> Pubkey {
        self.amm.address()
    }

    pub fn lp_mint(&self) -> Pubkey {
        self.amm.lp_mint()
    }

    pub fn assets(&self) -> Vec<Pubkey> {
        self.amm.assets()
    }
}
