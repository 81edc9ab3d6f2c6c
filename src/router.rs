//! Asset router: the user-facing entry point.
//!
//! Owns the `(pool, user) -> UserStake` ledger and per-pool totals, and runs
//! the multi-step swap/liquidity sequences around farm calls. Intermediate
//! tokens are held at the router's address and swept out before returning.

use std::collections::BTreeMap;

use bytemuck::Zeroable;
use solana_program::{msg, pubkey::Pubkey};

use crate::access::{AccessManager, Role};
use crate::capability::{swap_with_guard, SwapExecutor, SwapRoute, Venue};
use crate::error::FarmError;
use crate::event::{Event, EventLog};
use crate::factory::FarmFactory;
use crate::farm::{DistributeReport, FarmContext, FarmLogic, FeeConfig};
use crate::math::mul_div_floor;
use crate::state::{FarmState, UserStake};
use crate::token::{TokenLedger, NATIVE_MINT};

/// Router-side totals for one pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolLedger {
    pub total_shares: u64,
    pub total_deposited_lp: u64,
    pub total_withdrawn_lp: u64,
    /// Ceiling on the farm's staked LP; 0 = uncapped
    pub deposit_cap: u64,
}

/// LP claim and its per-asset breakdown, in pool asset order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StakeBreakdown {
    pub lp: u64,
    pub assets: Vec<u64>,
}

impl StakeBreakdown {
    pub fn stake_a(&self) -> u64 {
        self.assets.first().copied().unwrap_or(0)
    }

    pub fn stake_b(&self) -> u64 {
        self.assets.get(1).copied().unwrap_or(0)
    }
}

/// Pool-wide deposits; same shape as a single user's breakdown.
pub type TotalDeposits = StakeBreakdown;

/// Collaborators the router reaches during one operation.
pub struct RouterEnv<'a> {
    pub access: &'a AccessManager,
    pub factory: &'a mut FarmFactory,
    pub venues: &'a mut BTreeMap<Pubkey, Venue>,
    pub swaps: &'a mut (dyn SwapExecutor + 'static),
    pub tokens: &'a mut TokenLedger,
    pub events: &'a mut EventLog,
    pub now: i64,
    pub max_fee_bps: u16,
}

/// Run `op` against the farm for `pool` under the factory's current
/// implementation.
fn farm_op<T>(
    env: &mut RouterEnv<'_>,
    pool: &Pubkey,
    op: impl FnOnce(&dyn FarmLogic, &mut FarmState, &mut FarmContext<'_>) -> Result<T, FarmError>,
) -> Result<T, FarmError> {
    let logic = env.factory.logic()?;
    let account = env.factory.farm_mut(pool).ok_or(FarmError::FarmNotFound)?;
    let venue = env.venues.get_mut(pool).ok_or(FarmError::PoolNotRegistered)?;
    let mut ctx = FarmContext {
        address: account.address,
        tokens: &mut *env.tokens,
        venue,
        swaps: &mut *env.swaps,
        events: &mut *env.events,
        now: env.now,
    };
    op(logic.as_ref(), &mut account.state, &mut ctx)
}

fn pool_assets(env: &RouterEnv<'_>, pool: &Pubkey) -> Result<Vec<Pubkey>, FarmError> {
    env.venues
        .get(pool)
        .map(|v| v.assets())
        .ok_or(FarmError::PoolNotRegistered)
}

#[derive(Debug, Clone)]
pub struct AssetRouter {
    address: Pubkey,
    governor: Pubkey,
    implementation: Pubkey,
    paused: bool,
    locked: bool,
    stakes: BTreeMap<(Pubkey, Pubkey), UserStake>,
    pools: BTreeMap<Pubkey, PoolLedger>,
}

impl AssetRouter {
    pub fn new(address: Pubkey, governor: Pubkey) -> Self {
        Self {
            address,
            governor,
            implementation: Pubkey::default(),
            paused: false,
            locked: false,
            stakes: BTreeMap::new(),
            pools: BTreeMap::new(),
        }
    }

    pub fn address(&self) -> Pubkey {
        self.address
    }

    pub fn implementation(&self) -> Pubkey {
        self.implementation
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn stake(&self, pool: &Pubkey, user: &Pubkey) -> Option<&UserStake> {
        self.stakes.get(&(*pool, *user))
    }

    pub fn shares_of(&self, pool: &Pubkey, user: &Pubkey) -> u64 {
        self.stake(pool, user).map(|s| s.shares).unwrap_or(0)
    }

    pub fn pool_ledger(&self, pool: &Pubkey) -> PoolLedger {
        self.pools.get(pool).copied().unwrap_or_default()
    }

    /// Every stake record for `pool`, zeroed ones included.
    pub fn stakes_for(&self, pool: &Pubkey) -> impl Iterator<Item = &UserStake> + '_ {
        let pool = *pool;
        self.stakes
            .iter()
            .filter(move |((p, _), _)| *p == pool)
            .map(|(_, s)| s)
    }

    fn guarded<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, FarmError>,
    ) -> Result<T, FarmError> {
        if self.locked {
            return Err(FarmError::Reentrancy);
        }
        self.locked = true;
        let result = f(self);
        self.locked = false;
        result
    }

    fn require_not_paused(&self) -> Result<(), FarmError> {
        if self.paused {
            return Err(FarmError::Paused);
        }
        Ok(())
    }

    // ── Deposits ──

    /// Deposit `amount` LP held by the caller; shares go to `recipient`.
    pub fn deposit(
        &mut self,
        env: &mut RouterEnv<'_>,
        caller: &Pubkey,
        pool: &Pubkey,
        amount: u64,
        recipient: &Pubkey,
    ) -> Result<u64, FarmError> {
        self.guarded(|router| {
            router.require_not_paused()?;
            router.credit_deposit(env, caller, caller, pool, amount, recipient)
        })
    }

    /// Deposit the pool's constituent assets; unused amounts are refunded.
    pub fn deposit_tokens(
        &mut self,
        env: &mut RouterEnv<'_>,
        caller: &Pubkey,
        pool: &Pubkey,
        amounts: &[u64],
        min_lp: u64,
        recipient: &Pubkey,
    ) -> Result<u64, FarmError> {
        self.guarded(|router| {
            router.require_not_paused()?;
            let assets = pool_assets(env, pool)?;
            if amounts.len() != assets.len() {
                return Err(FarmError::InvalidRoutes);
            }
            let address = router.address;
            for (asset, amount) in assets.iter().zip(amounts) {
                env.tokens.transfer(asset, caller, &address, *amount)?;
            }
            let lp = router.provide_liquidity(env, pool, amounts, min_lp, &assets, caller)?;
            router.credit_deposit(env, &address, caller, pool, lp, recipient)
        })
    }

    /// Two-asset form of `deposit_single_asset` with no LP minimum.
    pub fn deposit_with_swap(
        &mut self,
        env: &mut RouterEnv<'_>,
        caller: &Pubkey,
        pool: &Pubkey,
        input_mint: &Pubkey,
        routes: &[SwapRoute],
        recipient: &Pubkey,
    ) -> Result<u64, FarmError> {
        self.guarded(|router| {
            router.require_not_paused()?;
            if routes.len() != 2 || pool_assets(env, pool)?.len() != 2 {
                return Err(FarmError::InvalidRoutes);
            }
            let amount = routes
                .iter()
                .try_fold(0u64, |acc, r| acc.checked_add(r.amount_in))
                .ok_or(FarmError::Overflow)?;
            router.single_asset_deposit(env, caller, pool, input_mint, amount, routes, 0, recipient)
        })
    }

    /// Swap one input token into every pool asset, add liquidity and deposit
    /// the LP for `recipient`.
    #[allow(clippy::too_many_arguments)]
    pub fn deposit_single_asset(
        &mut self,
        env: &mut RouterEnv<'_>,
        caller: &Pubkey,
        pool: &Pubkey,
        input_mint: &Pubkey,
        amount: u64,
        routes: &[SwapRoute],
        min_lp: u64,
        recipient: &Pubkey,
    ) -> Result<u64, FarmError> {
        self.guarded(|router| {
            router.require_not_paused()?;
            router.single_asset_deposit(env, caller, pool, input_mint, amount, routes, min_lp, recipient)
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn single_asset_deposit(
        &mut self,
        env: &mut RouterEnv<'_>,
        caller: &Pubkey,
        pool: &Pubkey,
        input_mint: &Pubkey,
        amount: u64,
        routes: &[SwapRoute],
        min_lp: u64,
        recipient: &Pubkey,
    ) -> Result<u64, FarmError> {
        let assets = pool_assets(env, pool)?;
        if routes.len() != assets.len() {
            return Err(FarmError::InvalidRoutes);
        }
        let declared = routes
            .iter()
            .try_fold(0u64, |acc, r| acc.checked_add(r.amount_in))
            .ok_or(FarmError::Overflow)?;
        if declared != amount {
            msg!("Error: routes spend {} but deposit is {}", declared, amount);
            return Err(FarmError::InvalidRoutes);
        }
        if amount == 0 {
            return Err(FarmError::NoLiquidityProvided);
        }

        let router = self.address;
        env.tokens.transfer(input_mint, caller, &router, amount)?;

        let mut amounts = Vec::with_capacity(assets.len());
        for (asset, route) in assets.iter().zip(routes) {
            if asset == input_mint {
                amounts.push(route.amount_in);
            } else {
                let out = swap_with_guard(
                    &mut *env.swaps,
                    env.tokens,
                    &router,
                    input_mint,
                    asset,
                    route.amount_in,
                    route,
                )?;
                amounts.push(out.received);
            }
        }

        let mut sweep = assets.clone();
        sweep.push(*input_mint);
        let lp = self.provide_liquidity(env, pool, &amounts, min_lp, &sweep, caller)?;
        self.credit_deposit(env, &router, caller, pool, lp, recipient)
    }

    /// Add router-held assets as liquidity, then refund whatever the pool did
    /// not take. The LP stays at the router.
    fn provide_liquidity(
        &self,
        env: &mut RouterEnv<'_>,
        pool: &Pubkey,
        amounts: &[u64],
        min_lp: u64,
        sweep: &[Pubkey],
        refund_to: &Pubkey,
    ) -> Result<u64, FarmError> {
        let venue = env.venues.get_mut(pool).ok_or(FarmError::PoolNotRegistered)?;
        let lp_mint = venue.lp_mint();
        let before = env.tokens.balance_of(&lp_mint, &self.address);
        venue.amm.add_liquidity(env.tokens, &self.address, amounts)?;
        let lp = env
            .tokens
            .balance_of(&lp_mint, &self.address)
            .saturating_sub(before);
        if lp < min_lp {
            msg!("Error: minted {} LP below minimum {}", lp, min_lp);
            return Err(FarmError::SlippageExceeded);
        }
        self.sweep(env.tokens, sweep, refund_to)?;
        Ok(lp)
    }

    /// Send the router's entire balance of each mint to `to`.
    fn sweep(&self, tokens: &mut TokenLedger, mints: &[Pubkey], to: &Pubkey) -> Result<(), FarmError> {
        for mint in mints {
            let balance = tokens.balance_of(mint, &self.address);
            tokens.transfer(mint, &self.address, to, balance)?;
        }
        Ok(())
    }

    /// Move `amount` LP from `source` into the farm and book the shares.
    fn credit_deposit(
        &mut self,
        env: &mut RouterEnv<'_>,
        source: &Pubkey,
        sender: &Pubkey,
        pool: &Pubkey,
        amount: u64,
        recipient: &Pubkey,
    ) -> Result<u64, FarmError> {
        let account = env.factory.farm(pool).ok_or(FarmError::FarmNotFound)?;
        let (farm_address, lp_mint, staked) = (
            account.address,
            account.state.lp_mint_pubkey(),
            account.state.total_staked_lp,
        );

        let cap = self.pool_ledger(pool).deposit_cap;
        if cap != 0 && staked.checked_add(amount).map_or(true, |t| t > cap) {
            msg!("Error: deposit of {} exceeds cap {}", amount, cap);
            return Err(FarmError::DepositCapExceeded);
        }

        env.tokens.transfer(&lp_mint, source, &farm_address, amount)?;
        let router = self.address;
        let shares = farm_op(env, pool, |logic, state, ctx| {
            logic.deposit(state, ctx, &router, amount, recipient)
        })?;

        let stake = self.stakes.entry((*pool, *recipient)).or_insert_with(|| {
            let mut s = UserStake::zeroed();
            s.is_initialized = 1;
            s.pool = pool.to_bytes();
            s.user = recipient.to_bytes();
            s
        });
        stake.shares = stake.shares.checked_add(shares).ok_or(FarmError::Overflow)?;
        stake.total_deposited_lp = stake.total_deposited_lp.saturating_add(amount);
        stake.last_update_ts = env.now;

        let ledger = self.pools.entry(*pool).or_default();
        ledger.total_shares = ledger.total_shares.checked_add(shares).ok_or(FarmError::Overflow)?;
        ledger.total_deposited_lp = ledger.total_deposited_lp.saturating_add(amount);

        env.events.emit(Event::Deposit {
            lp_pool: *pool,
            sender: *sender,
            recipient: *recipient,
            amount,
        });
        msg!("Deposited {} LP into {}, {} shares to {}", amount, pool, shares, recipient);
        Ok(shares)
    }

    // ── Withdrawals ──

    /// Burn the caller's `shares` and send the LP to `recipient`.
    pub fn withdraw(
        &mut self,
        env: &mut RouterEnv<'_>,
        caller: &Pubkey,
        pool: &Pubkey,
        shares: u64,
        recipient: &Pubkey,
    ) -> Result<u64, FarmError> {
        self.guarded(|router| router.debit_withdraw(env, caller, pool, shares, recipient, recipient))
    }

    /// Withdraw into the pool's constituent assets.
    pub fn withdraw_tokens(
        &mut self,
        env: &mut RouterEnv<'_>,
        caller: &Pubkey,
        pool: &Pubkey,
        shares: u64,
        min_amounts: &[u64],
        recipient: &Pubkey,
    ) -> Result<Vec<u64>, FarmError> {
        self.guarded(|router| {
            let assets = pool_assets(env, pool)?;
            if min_amounts.len() != assets.len() {
                return Err(FarmError::InvalidRoutes);
            }
            let removed = router.withdraw_underlying(env, caller, pool, shares, recipient, &assets)?;
            for (got, min) in removed.iter().zip(min_amounts) {
                if got < min {
                    msg!("Error: removed {} below minimum {}", got, min);
                    return Err(FarmError::SlippageExceeded);
                }
            }
            router.sweep(env.tokens, &assets, recipient)?;
            Ok(removed)
        })
    }

    /// Two-asset form of `withdraw_single_asset`.
    pub fn withdraw_with_swap(
        &mut self,
        env: &mut RouterEnv<'_>,
        caller: &Pubkey,
        pool: &Pubkey,
        shares: u64,
        target_mint: &Pubkey,
        routes: &[SwapRoute],
        recipient: &Pubkey,
    ) -> Result<u64, FarmError> {
        self.guarded(|router| {
            if routes.len() != 2 || pool_assets(env, pool)?.len() != 2 {
                return Err(FarmError::InvalidRoutes);
            }
            router.single_asset_withdraw(env, caller, pool, shares, target_mint, routes, recipient)
        })
    }

    /// Withdraw and convert every pool asset into `target_mint`. Returns the
    /// amount of `target_mint` delivered.
    pub fn withdraw_single_asset(
        &mut self,
        env: &mut RouterEnv<'_>,
        caller: &Pubkey,
        pool: &Pubkey,
        shares: u64,
        target_mint: &Pubkey,
        routes: &[SwapRoute],
        recipient: &Pubkey,
    ) -> Result<u64, FarmError> {
        self.guarded(|router| {
            router.single_asset_withdraw(env, caller, pool, shares, target_mint, routes, recipient)
        })
    }

    /// `withdraw_single_asset` paying out the native coin.
    pub fn withdraw_single_eth(
        &mut self,
        env: &mut RouterEnv<'_>,
        caller: &Pubkey,
        pool: &Pubkey,
        shares: u64,
        routes: &[SwapRoute],
        recipient: &Pubkey,
    ) -> Result<u64, FarmError> {
        self.guarded(|router| {
            router.single_asset_withdraw(env, caller, pool, shares, &NATIVE_MINT, routes, recipient)
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn single_asset_withdraw(
        &mut self,
        env: &mut RouterEnv<'_>,
        caller: &Pubkey,
        pool: &Pubkey,
        shares: u64,
        target_mint: &Pubkey,
        routes: &[SwapRoute],
        recipient: &Pubkey,
    ) -> Result<u64, FarmError> {
        let assets = pool_assets(env, pool)?;
        if routes.len() != assets.len() {
            return Err(FarmError::InvalidRoutes);
        }
        let router = self.address;
        let target_before = env.tokens.balance_of(target_mint, &router);
        let removed = self.withdraw_underlying(env, caller, pool, shares, recipient, &assets)?;

        for ((asset, amount), route) in assets.iter().zip(&removed).zip(routes) {
            if asset == target_mint {
                continue;
            }
            swap_with_guard(
                &mut *env.swaps,
                env.tokens,
                &router,
                asset,
                target_mint,
                *amount,
                route,
            )?;
        }
        let output = env
            .tokens
            .balance_of(target_mint, &router)
            .saturating_sub(target_before);

        let mut sweep = assets;
        if !sweep.contains(target_mint) {
            sweep.push(*target_mint);
        }
        self.sweep(env.tokens, &sweep, recipient)?;
        msg!("Withdrew {} of {} to {}", output, target_mint, recipient);
        Ok(output)
    }

    /// Withdraw LP to the router and break it into the pool assets. Returns
    /// the measured amount of each asset now held by the router.
    fn withdraw_underlying(
        &mut self,
        env: &mut RouterEnv<'_>,
        caller: &Pubkey,
        pool: &Pubkey,
        shares: u64,
        recipient: &Pubkey,
        assets: &[Pubkey],
    ) -> Result<Vec<u64>, FarmError> {
        let router = self.address;
        let lp = self.debit_withdraw(env, caller, pool, shares, &router, recipient)?;

        let before: Vec<u64> = assets.iter().map(|a| env.tokens.balance_of(a, &router)).collect();
        let venue = env.venues.get_mut(pool).ok_or(FarmError::PoolNotRegistered)?;
        venue.amm.remove_liquidity(env.tokens, &router, lp)?;
        Ok(assets
            .iter()
            .zip(before)
            .map(|(a, b)| env.tokens.balance_of(a, &router).saturating_sub(b))
            .collect())
    }

    /// Debit the caller's shares and have the farm release LP to `lp_to`.
    /// The `Withdraw` event names `recipient` and the LP amount.
    fn debit_withdraw(
        &mut self,
        env: &mut RouterEnv<'_>,
        caller: &Pubkey,
        pool: &Pubkey,
        shares: u64,
        lp_to: &Pubkey,
        recipient: &Pubkey,
    ) -> Result<u64, FarmError> {
        if shares == 0 || shares > self.shares_of(pool, caller) {
            return Err(FarmError::InsufficientAmount);
        }

        let router = self.address;
        let lp = farm_op(env, pool, |logic, state, ctx| {
            logic.withdraw(state, ctx, &router, shares, lp_to)
        })?;

        let stake = self
            .stakes
            .get_mut(&(*pool, *caller))
            .ok_or(FarmError::InsufficientAmount)?;
        stake.shares -= shares;
        stake.total_withdrawn_lp = stake.total_withdrawn_lp.saturating_add(lp);
        stake.last_update_ts = env.now;

        let ledger = self.pools.entry(*pool).or_default();
        ledger.total_shares = ledger.total_shares.checked_sub(shares).ok_or(FarmError::Overflow)?;
        ledger.total_withdrawn_lp = ledger.total_withdrawn_lp.saturating_add(lp);

        env.events.emit(Event::Withdraw {
            lp_pool: *pool,
            sender: *caller,
            recipient: *recipient,
            amount: lp,
        });
        msg!("Withdrew {} LP from {} for {} shares", lp, pool, shares);
        Ok(lp)
    }

    // ── Keeper / admin ──

    /// Compound the farm's rewards. KEEPER only.
    pub fn distribute(
        &mut self,
        env: &mut RouterEnv<'_>,
        caller: &Pubkey,
        pool: &Pubkey,
        routes: &[SwapRoute],
        fee: &FeeConfig,
    ) -> Result<DistributeReport, FarmError> {
        env.access.require_role(Role::Keeper, caller)?;
        self.guarded(|router| {
            router.require_not_paused()?;
            let address = router.address;
            let max_fee_bps = env.max_fee_bps;
            farm_op(env, pool, |logic, state, ctx| {
                logic.distribute(state, ctx, &address, routes, fee, max_fee_bps)
            })
        })
    }

    pub fn pause(
        &mut self,
        access: &AccessManager,
        caller: &Pubkey,
        events: &mut EventLog,
    ) -> Result<(), FarmError> {
        access.require_role(Role::Pauser, caller)?;
        if !self.paused {
            self.paused = true;
            events.emit(Event::Paused { account: *caller });
            msg!("Router paused by {}", caller);
        }
        Ok(())
    }

    pub fn unpause(
        &mut self,
        access: &AccessManager,
        caller: &Pubkey,
        events: &mut EventLog,
    ) -> Result<(), FarmError> {
        access.require_role(Role::Pauser, caller)?;
        if self.paused {
            self.paused = false;
            events.emit(Event::Unpaused { account: *caller });
            msg!("Router unpaused by {}", caller);
        }
        Ok(())
    }

    /// `None` removes the cap.
    pub fn set_deposit_cap(
        &mut self,
        access: &AccessManager,
        caller: &Pubkey,
        pool: &Pubkey,
        cap: Option<u64>,
        events: &mut EventLog,
    ) -> Result<(), FarmError> {
        access.require_role(Role::Admin, caller)?;
        let cap = cap.unwrap_or(0);
        self.pools.entry(*pool).or_default().deposit_cap = cap;
        events.emit(Event::DepositCapUpdated { lp_pool: *pool, cap });
        msg!("Deposit cap for {} set to {}", pool, cap);
        Ok(())
    }

    /// Governor only.
    pub fn upgrade_to(
        &mut self,
        caller: &Pubkey,
        implementation: &Pubkey,
        events: &mut EventLog,
    ) -> Result<(), FarmError> {
        if *caller != self.governor {
            return Err(FarmError::Unauthorized);
        }
        self.implementation = *implementation;
        events.emit(Event::RouterUpgraded { implementation: *implementation });
        msg!("Router upgraded to {}", implementation);
        Ok(())
    }

    // ── Queries ──

    /// `user`'s LP claim in `pool` and its per-asset value at current
    /// reserves. All rounding is down.
    pub fn user_stake(
        &self,
        factory: &FarmFactory,
        venues: &BTreeMap<Pubkey, Venue>,
        tokens: &TokenLedger,
        user: &Pubkey,
        pool: &Pubkey,
    ) -> Result<StakeBreakdown, FarmError> {
        let farm = &factory.farm(pool).ok_or(FarmError::FarmNotFound)?.state;
        let shares = self.shares_of(pool, user);
        let lp = if shares == 0 {
            0
        } else {
            farm.calc_lp_for_shares(shares).ok_or(FarmError::Overflow)?
        };
        breakdown(venues, tokens, pool, lp)
    }

    pub fn total_deposits(
        &self,
        factory: &FarmFactory,
        venues: &BTreeMap<Pubkey, Venue>,
        tokens: &TokenLedger,
        pool: &Pubkey,
    ) -> Result<TotalDeposits, FarmError> {
        let farm = &factory.farm(pool).ok_or(FarmError::FarmNotFound)?.state;
        breakdown(venues, tokens, pool, farm.total_staked_lp)
    }
}

fn breakdown(
    venues: &BTreeMap<Pubkey, Venue>,
    tokens: &TokenLedger,
    pool: &Pubkey,
    lp: u64,
) -> Result<StakeBreakdown, FarmError> {
    let venue = venues.get(pool).ok_or(FarmError::PoolNotRegistered)?;
    let supply = tokens.total_supply(&venue.lp_mint());
    let assets = venue
        .amm
        .reserves(tokens)
        .into_iter()
        .map(|reserve| mul_div_floor(reserve, lp, supply).unwrap_or(0))
        .collect();
    Ok(StakeBreakdown { lp, assets })
}
