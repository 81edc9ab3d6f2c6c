//! Farm behaviour.
//!
//! A farm's storage (`FarmState`) lives in the factory; its behaviour is a
//! `FarmLogic` picked from the factory's implementation pointer on every call.
//! The standard behaviour is provided as free functions so that newer
//! implementations can override one entry point and delegate the rest.

use solana_program::{msg, pubkey::Pubkey};

use crate::capability::{swap_with_guard, SwapExecutor, SwapRoute, Venue};
use crate::error::FarmError;
use crate::event::{Event, EventLog};
use crate::math;
use crate::state::{FarmState, MAX_POOL_ASSETS};
use crate::token::TokenLedger;

/// Everything a farm touches outside its own storage record.
pub struct FarmContext<'a> {
    /// The farm's own address (holds its LP, reward and asset balances)
    pub address: Pubkey,
    pub tokens: &'a mut TokenLedger,
    pub venue: &'a mut Venue,
    pub swaps: &'a mut (dyn SwapExecutor + 'static),
    pub events: &'a mut EventLog,
    pub now: i64,
}

/// Distribution fee, taken from the harvested reward before conversion.
///
/// Paid in reward tokens, or in `swap.output_mint` when a fee swap is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeConfig {
    pub fee_to: Pubkey,
    pub fee_bps: u16,
    pub swap: Option<FeeSwap>,
}

/// Route converting the fee portion before it is paid out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeSwap {
    pub output_mint: Pubkey,
    pub route: SwapRoute,
}

impl FeeConfig {
    pub fn new(fee_to: Pubkey, fee_bps: u16) -> Self {
        Self { fee_to, fee_bps, swap: None }
    }

    pub fn none() -> Self {
        Self::new(Pubkey::default(), 0)
    }

    pub fn with_swap(mut self, output_mint: Pubkey, route: SwapRoute) -> Self {
        self.swap = Some(FeeSwap { output_mint, route });
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DistributeReport {
    pub reward: u64,
    pub fee: u64,
    pub lp_added: u64,
}

pub trait FarmLogic: std::fmt::Debug {
    fn version(&self) -> u64;

    fn initialize(
        &self,
        farm: &mut FarmState,
        farm_address: &Pubkey,
        venue: &Venue,
        asset_router: &Pubkey,
        events: &mut EventLog,
    ) -> Result<(), FarmError> {
        initialize(self.version(), farm, farm_address, venue, asset_router, events)
    }

    fn deposit(
        &self,
        farm: &mut FarmState,
        ctx: &mut FarmContext<'_>,
        caller: &Pubkey,
        amount_lp: u64,
        staker: &Pubkey,
    ) -> Result<u64, FarmError> {
        deposit(farm, ctx, caller, amount_lp, staker)
    }

    fn withdraw(
        &self,
        farm: &mut FarmState,
        ctx: &mut FarmContext<'_>,
        caller: &Pubkey,
        shares: u64,
        recipient: &Pubkey,
    ) -> Result<u64, FarmError> {
        withdraw(farm, ctx, caller, shares, recipient)
    }

    fn distribute(
        &self,
        farm: &mut FarmState,
        ctx: &mut FarmContext<'_>,
        caller: &Pubkey,
        routes: &[SwapRoute],
        fee: &FeeConfig,
        max_fee_bps: u16,
    ) -> Result<DistributeReport, FarmError> {
        distribute(farm, ctx, caller, routes, fee, max_fee_bps)
    }
}

/// The first farm implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardFarm;

impl FarmLogic for StandardFarm {
    fn version(&self) -> u64 {
        1
    }
}

fn check_caller(farm: &FarmState, caller: &Pubkey) -> Result<(), FarmError> {
    if !farm.is_initialized() {
        return Err(FarmError::NotInitialized);
    }
    if *caller != farm.asset_router_pubkey() {
        msg!("Error: farm called by {}, not the asset router", caller);
        return Err(FarmError::CallerNotAssetRouter);
    }
    Ok(())
}

/// Run `f` with the farm's reentrancy flag held. The flag is released on
/// both paths.
fn with_lock<T>(
    farm: &mut FarmState,
    f: impl FnOnce(&mut FarmState) -> Result<T, FarmError>,
) -> Result<T, FarmError> {
    if farm.locked != 0 {
        return Err(FarmError::Reentrancy);
    }
    farm.locked = 1;
    let result = f(farm);
    farm.locked = 0;
    result
}

pub fn initialize(
    version: u64,
    farm: &mut FarmState,
    farm_address: &Pubkey,
    venue: &Venue,
    asset_router: &Pubkey,
    events: &mut EventLog,
) -> Result<(), FarmError> {
    if farm.is_initialized() {
        return Err(FarmError::AlreadyInitialized);
    }
    let assets = venue.assets();
    if assets.len() < 2 || assets.len() > MAX_POOL_ASSETS {
        return Err(FarmError::InvalidConfig);
    }

    farm.version = version;
    farm.pool = venue.pool().to_bytes();
    farm.asset_router = asset_router.to_bytes();
    farm.lp_mint = venue.lp_mint().to_bytes();
    farm.reward_mint = venue.yield_source.reward_mint().to_bytes();
    farm.stake_source = venue.yield_source.address().to_bytes();
    farm.asset_count = assets.len() as u8;
    for (slot, asset) in farm.assets.iter_mut().zip(&assets) {
        *slot = asset.to_bytes();
    }
    farm.share_price_index = math::PRICE_SCALE;
    farm.is_initialized = 1;

    events.emit(Event::Initialized { farm: *farm_address, version });
    msg!("Farm {} initialized for pool {} (v{})", farm_address, venue.pool(), version);
    Ok(())
}

/// Stake `amount_lp` already transferred to the farm and mint shares for it.
pub fn deposit(
    farm: &mut FarmState,
    ctx: &mut FarmContext<'_>,
    caller: &Pubkey,
    amount_lp: u64,
    staker: &Pubkey,
) -> Result<u64, FarmError> {
    check_caller(farm, caller)?;
    with_lock(farm, |farm| {
        if amount_lp == 0 {
            return Err(FarmError::NoLiquidityProvided);
        }
        if (farm.total_shares == 0) != (farm.total_staked_lp == 0) {
            msg!(
                "Error: orphaned farm state (shares {}, staked {})",
                farm.total_shares,
                farm.total_staked_lp
            );
            return Err(FarmError::NoLiquidity);
        }

        let source = &mut ctx.venue.yield_source;
        let before = source.staked(&ctx.address);
        source.stake(ctx.tokens, &ctx.address, amount_lp)?;
        let staked = source
            .staked(&ctx.address)
            .checked_sub(before)
            .ok_or(FarmError::Overflow)?;

        let shares = farm.calc_shares_for_deposit(staked).ok_or(FarmError::Overflow)?;
        if shares == 0 {
            return Err(FarmError::NoLiquidityProvided);
        }

        farm.total_staked_lp = farm
            .total_staked_lp
            .checked_add(staked)
            .ok_or(FarmError::Overflow)?;
        farm.total_shares = farm
            .total_shares
            .checked_add(shares)
            .ok_or(FarmError::Overflow)?;
        farm.share_price_index = math::share_price(farm.total_staked_lp, farm.total_shares);

        msg!("Farm staked {} LP, minted {} shares for {}", staked, shares, staker);
        Ok(shares)
    })
}

/// Burn `shares` and send the LP behind them to `recipient`.
pub fn withdraw(
    farm: &mut FarmState,
    ctx: &mut FarmContext<'_>,
    caller: &Pubkey,
    shares: u64,
    recipient: &Pubkey,
) -> Result<u64, FarmError> {
    check_caller(farm, caller)?;
    with_lock(farm, |farm| {
        if shares == 0 || shares > farm.total_shares || farm.total_staked_lp == 0 {
            return Err(FarmError::InsufficientAmount);
        }
        let lp = farm.calc_lp_for_shares(shares).ok_or(FarmError::Overflow)?;
        if lp == 0 {
            return Err(FarmError::InsufficientAmount);
        }

        // Totals move before any external call.
        farm.total_shares -= shares;
        farm.total_staked_lp = farm
            .total_staked_lp
            .checked_sub(lp)
            .ok_or(FarmError::Overflow)?;
        farm.share_price_index = math::share_price(farm.total_staked_lp, farm.total_shares);

        ctx.venue.yield_source.unstake(ctx.tokens, &ctx.address, lp)?;
        ctx.tokens
            .transfer(&farm.lp_mint_pubkey(), &ctx.address, recipient, lp)?;

        msg!("Farm burned {} shares, released {} LP to {}", shares, lp, recipient);
        Ok(lp)
    })
}

/// Harvest, take the fee, convert the rest into pool assets and restake the
/// resulting LP without minting shares.
pub fn distribute(
    farm: &mut FarmState,
    ctx: &mut FarmContext<'_>,
    caller: &Pubkey,
    routes: &[SwapRoute],
    fee: &FeeConfig,
    max_fee_bps: u16,
) -> Result<DistributeReport, FarmError> {
    check_caller(farm, caller)?;
    with_lock(farm, |farm| {
        if fee.fee_bps > max_fee_bps {
            return Err(FarmError::FeeTooHigh);
        }
        if farm.total_staked_lp == 0 {
            return Err(FarmError::NoLiquidity);
        }
        let assets = farm.assets();
        if routes.len() != assets.len() {
            return Err(FarmError::InvalidRoutes);
        }

        let reward_mint = farm.reward_mint_pubkey();
        let lp_mint = farm.lp_mint_pubkey();
        // Only what this harvest credits is yield. Reward tokens already at
        // the farm are unconsumed asset dust and are never charged again.
        let held = ctx.tokens.balance_of(&reward_mint, &ctx.address);
        ctx.venue.yield_source.harvest(ctx.tokens, &ctx.address)?;
        let reward = ctx
            .tokens
            .balance_of(&reward_mint, &ctx.address)
            .saturating_sub(held);
        if reward == 0 {
            return Ok(DistributeReport::default());
        }

        let (fee_amount, net) = math::split_fee(reward, fee.fee_bps).ok_or(FarmError::Overflow)?;
        if fee_amount > 0 {
            pay_fee(ctx, &reward_mint, fee, fee_amount)?;
        }

        let parts = math::split_evenly(net, assets.len());
        for ((asset, part), route) in assets.iter().zip(parts).zip(routes) {
            if *asset == reward_mint {
                continue;
            }
            swap_with_guard(
                &mut *ctx.swaps,
                ctx.tokens,
                &ctx.address,
                &reward_mint,
                asset,
                part,
                route,
            )?;
        }

        let amounts: Vec<u64> = assets
            .iter()
            .map(|a| ctx.tokens.balance_of(a, &ctx.address))
            .collect();
        let lp_before = ctx.tokens.balance_of(&lp_mint, &ctx.address);
        if amounts.iter().any(|a| *a > 0) {
            ctx.venue
                .amm
                .add_liquidity(ctx.tokens, &ctx.address, &amounts)?;
        }
        let minted = ctx
            .tokens
            .balance_of(&lp_mint, &ctx.address)
            .saturating_sub(lp_before);

        let mut lp_added = 0;
        if minted > 0 {
            let source = &mut ctx.venue.yield_source;
            let before = source.staked(&ctx.address);
            source.stake(ctx.tokens, &ctx.address, minted)?;
            lp_added = source.staked(&ctx.address).saturating_sub(before);
        }

        farm.total_staked_lp = farm
            .total_staked_lp
            .checked_add(lp_added)
            .ok_or(FarmError::Overflow)?;
        farm.total_compounded_lp = farm.total_compounded_lp.saturating_add(lp_added);
        farm.total_fees_paid = farm.total_fees_paid.saturating_add(fee_amount);
        farm.share_price_index = math::share_price(farm.total_staked_lp, farm.total_shares);
        farm.last_distribute_ts = ctx.now;

        ctx.events.emit(Event::Distributed {
            lp_pool: farm.pool_pubkey(),
            reward,
            fee: fee_amount,
            lp_added,
        });
        msg!(
            "Distributed {} reward: fee {}, compounded {} LP",
            reward,
            fee_amount,
            lp_added
        );
        Ok(DistributeReport { reward, fee: fee_amount, lp_added })
    })
}

fn pay_fee(
    ctx: &mut FarmContext<'_>,
    reward_mint: &Pubkey,
    fee: &FeeConfig,
    amount: u64,
) -> Result<(), FarmError> {
    let swap = match &fee.swap {
        Some(swap) if swap.output_mint != *reward_mint => swap,
        _ => return ctx.tokens.transfer(reward_mint, &ctx.address, &fee.fee_to, amount),
    };

    let outcome = swap_with_guard(
        &mut *ctx.swaps,
        ctx.tokens,
        &ctx.address,
        reward_mint,
        &swap.output_mint,
        amount,
        &swap.route,
    )?;
    ctx.tokens
        .transfer(&swap.output_mint, &ctx.address, &fee.fee_to, outcome.received)?;
    // Whatever the route left unspent is still fee.
    let unspent = amount.saturating_sub(outcome.spent);
    if unspent > 0 {
        ctx.tokens
            .transfer(reward_mint, &ctx.address, &fee.fee_to, unspent)?;
    }
    msg!(
        "Fee of {} reward paid as {} {}",
        amount,
        outcome.received,
        swap.output_mint
    );
    Ok(())
}
