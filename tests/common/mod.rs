//! Shared mocks and fixture for integration tests.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use farm_router::access::Role;
use farm_router::capability::{
    LiquidityPool, SwapExecutor, SwapRequest, SwapRoute, Venue, YieldSource,
};
use farm_router::config::ProtocolConfig;
use farm_router::error::FarmError;
use farm_router::farm::StandardFarm;
use farm_router::governor::QuorumAuthorizer;
use farm_router::token::TokenLedger;
use farm_router::Protocol;
use solana_program::pubkey::Pubkey;

// ═══════════════════════════════════════════════════════════════
// Mock yield source: every reward token sitting at the source's
// address belongs to whoever harvests next.
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct MockYieldSource {
    pub address: Pubkey,
    pub lp_mint: Pubkey,
    pub reward_mint: Pubkey,
    pub stakes: BTreeMap<Pubkey, u64>,
}

impl MockYieldSource {
    pub fn new(lp_mint: Pubkey, reward_mint: Pubkey) -> Self {
        Self {
            address: Pubkey::new_unique(),
            lp_mint,
            reward_mint,
            stakes: BTreeMap::new(),
        }
    }
}

impl YieldSource for MockYieldSource {
    fn address(&self) -> Pubkey {
        self.address
    }

    fn lp_mint(&self) -> Pubkey {
        self.lp_mint
    }

    fn reward_mint(&self) -> Pubkey {
        self.reward_mint
    }

    fn staked(&self, staker: &Pubkey) -> u64 {
        self.stakes.get(staker).copied().unwrap_or(0)
    }

    fn pending_reward(&self, tokens: &TokenLedger, _staker: &Pubkey) -> u64 {
        tokens.balance_of(&self.reward_mint, &self.address)
    }

    fn stake(&mut self, tokens: &mut TokenLedger, staker: &Pubkey, amount: u64) -> Result<(), FarmError> {
        tokens.transfer(&self.lp_mint, staker, &self.address, amount)?;
        *self.stakes.entry(*staker).or_default() += amount;
        Ok(())
    }

    fn unstake(&mut self, tokens: &mut TokenLedger, staker: &Pubkey, amount: u64) -> Result<(), FarmError> {
        let staked = self.staked(staker);
        let left = staked.checked_sub(amount).ok_or(FarmError::InsufficientFunds)?;
        self.stakes.insert(*staker, left);
        tokens.transfer(&self.lp_mint, &self.address, staker, amount)
    }

    fn harvest(&mut self, tokens: &mut TokenLedger, staker: &Pubkey) -> Result<u64, FarmError> {
        let amount = tokens.balance_of(&self.reward_mint, &self.address);
        tokens.transfer(&self.reward_mint, &self.address, staker, amount)?;
        Ok(amount)
    }

    fn box_clone(&self) -> Box<dyn YieldSource> {
        Box::new(self.clone())
    }
}

// ═══════════════════════════════════════════════════════════════
// Mock AMM: proportional add/remove, rounding in the pool's favour.
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct MockPool {
    pub address: Pubkey,
    pub lp_mint: Pubkey,
    pub assets: Vec<Pubkey>,
}

impl MockPool {
    pub fn new(lp_mint: Pubkey, assets: Vec<Pubkey>) -> Self {
        Self { address: Pubkey::new_unique(), lp_mint, assets }
    }
}

impl LiquidityPool for MockPool {
    fn address(&self) -> Pubkey {
        self.address
    }

    fn lp_mint(&self) -> Pubkey {
        self.lp_mint
    }

    fn assets(&self) -> Vec<Pubkey> {
        self.assets.clone()
    }

    fn reserves(&self, tokens: &TokenLedger) -> Vec<u64> {
        self.assets
            .iter()
            .map(|a| tokens.balance_of(a, &self.address))
            .collect()
    }

    fn add_liquidity(
        &mut self,
        tokens: &mut TokenLedger,
        provider: &Pubkey,
        amounts: &[u64],
    ) -> Result<u64, FarmError> {
        if amounts.len() != self.assets.len() {
            return Err(FarmError::InvalidRoutes);
        }
        let supply = tokens.total_supply(&self.lp_mint) as u128;
        let reserves = self.reserves(tokens);

        let (lp, used): (u128, Vec<u128>) = if supply == 0 {
            let lp = amounts.iter().copied().min().unwrap_or(0) as u128;
            (lp, amounts.iter().map(|a| *a as u128).collect())
        } else {
            let lp = amounts
                .iter()
                .zip(&reserves)
                .map(|(a, r)| if *r == 0 { 0 } else { *a as u128 * supply / *r as u128 })
                .min()
                .unwrap_or(0);
            let used = reserves
                .iter()
                .map(|r| (lp * *r as u128 + supply - 1) / supply)
                .collect();
            (lp, used)
        };
        if lp == 0 {
            return Ok(0);
        }

        for (asset, amount) in self.assets.iter().zip(used) {
            tokens.transfer(asset, provider, &self.address, amount as u64)?;
        }
        tokens.mint_to(&self.lp_mint, provider, lp as u64)?;
        Ok(lp as u64)
    }

    fn remove_liquidity(
        &mut self,
        tokens: &mut TokenLedger,
        provider: &Pubkey,
        lp: u64,
    ) -> Result<Vec<u64>, FarmError> {
        let supply = tokens.total_supply(&self.lp_mint) as u128;
        if supply == 0 {
            return Err(FarmError::NoLiquidity);
        }
        let out: Vec<u64> = self
            .reserves(tokens)
            .iter()
            .map(|r| (lp as u128 * *r as u128 / supply) as u64)
            .collect();
        tokens.burn(&self.lp_mint, provider, lp)?;
        for (asset, amount) in self.assets.iter().zip(&out) {
            tokens.transfer(asset, &self.address, provider, *amount)?;
        }
        Ok(out)
    }

    fn box_clone(&self) -> Box<dyn LiquidityPool> {
        Box::new(self.clone())
    }
}

// ═══════════════════════════════════════════════════════════════
// Mock swap executor: route data is `num (u64 LE) || den (u64 LE)`,
// output = spent * num / den, less `haircut_bps`. Spends the full
// allowance, or with `overspend` set ignores it and takes twice as much.
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct MockSwapExecutor {
    pub address: Pubkey,
    pub haircut_bps: u64,
    pub overspend: bool,
}

impl MockSwapExecutor {
    pub fn new() -> Self {
        Self { address: Pubkey::new_unique(), haircut_bps: 0, overspend: false }
    }
}

fn decode_rate(data: &[u8]) -> (u128, u128) {
    if data.len() != 16 {
        return (1, 1);
    }
    let mut num = [0u8; 8];
    let mut den = [0u8; 8];
    num.copy_from_slice(&data[..8]);
    den.copy_from_slice(&data[8..]);
    (u64::from_le_bytes(num) as u128, u64::from_le_bytes(den).max(1) as u128)
}

impl SwapExecutor for MockSwapExecutor {
    fn address(&self) -> Pubkey {
        self.address
    }

    fn execute(&mut self, tokens: &mut TokenLedger, request: &SwapRequest<'_>) -> Result<u64, FarmError> {
        let amount_in = if self.overspend {
            let taken = request.max_amount_in.saturating_mul(2);
            tokens.transfer(&request.input_mint, &request.owner, &self.address, taken)?;
            taken
        } else {
            tokens.transfer_from(
                &request.input_mint,
                &self.address,
                &request.owner,
                &self.address,
                request.max_amount_in,
            )?;
            request.max_amount_in
        };
        tokens.burn(&request.input_mint, &self.address, amount_in)?;

        let (num, den) = decode_rate(&request.route.data);
        let gross = amount_in as u128 * num / den;
        let out = (gross * (10_000 - self.haircut_bps as u128) / 10_000) as u64;
        tokens.mint_to(&request.output_mint, &request.owner, out)?;
        Ok(out)
    }

    fn box_clone(&self) -> Box<dyn SwapExecutor> {
        Box::new(self.clone())
    }
}

/// Route priced at `num / den` output per input.
pub fn route(amount_in: u64, min_amount_out: u64, num: u64, den: u64) -> SwapRoute {
    let mut data = num.to_le_bytes().to_vec();
    data.extend_from_slice(&den.to_le_bytes());
    SwapRoute::new(amount_in, min_amount_out, data)
}

// ═══════════════════════════════════════════════════════════════
// Fixture: one A/B pool (reserves 1M A, 2M B, LP supply 1M),
// farm created, roles granted.
// ═══════════════════════════════════════════════════════════════

pub const GENESIS_TS: i64 = 1_700_000_000;

pub struct Fixture {
    pub protocol: Protocol,
    pub admin: Pubkey,
    pub keeper: Pubkey,
    pub pauser: Pubkey,
    pub farm_owner: Pubkey,
    pub signers: Vec<Pubkey>,
    pub pool: Pubkey,
    pub lp_mint: Pubkey,
    pub asset_a: Pubkey,
    pub asset_b: Pubkey,
    pub reward_mint: Pubkey,
    pub source: Pubkey,
    pub farm: Pubkey,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_executor(MockSwapExecutor::new())
    }

    pub fn with_executor(executor: MockSwapExecutor) -> Self {
        let config = ProtocolConfig::with_unique_addresses();
        let admin = Pubkey::new_unique();
        let keeper = Pubkey::new_unique();
        let pauser = Pubkey::new_unique();
        let farm_owner = Pubkey::new_unique();
        let signers: Vec<Pubkey> = (0..3).map(|_| Pubkey::new_unique()).collect();
        let authorizer = QuorumAuthorizer::new(signers.iter().copied(), 2).unwrap();

        let mut protocol = Protocol::new(
            config,
            admin,
            Arc::new(authorizer),
            Box::new(executor),
            Pubkey::new_unique(),
            Arc::new(StandardFarm),
        )
        .unwrap();
        protocol.set_unix_timestamp(GENESIS_TS);

        protocol.grant_role(&admin, Role::Keeper, &keeper).unwrap();
        protocol.grant_role(&admin, Role::Pauser, &pauser).unwrap();
        protocol.grant_role(&admin, Role::FarmOwner, &farm_owner).unwrap();

        let lp_mint = Pubkey::new_unique();
        let asset_a = Pubkey::new_unique();
        let asset_b = Pubkey::new_unique();
        let reward_mint = Pubkey::new_unique();
        let amm = MockPool::new(lp_mint, vec![asset_a, asset_b]);
        let yield_source = MockYieldSource::new(lp_mint, reward_mint);
        let source = yield_source.address;
        let pool_address = amm.address;

        let pool = protocol
            .register_pool(&admin, Venue::new(Box::new(amm), Box::new(yield_source)))
            .unwrap();
        assert_eq!(pool, pool_address);

        let genesis = Pubkey::new_unique();
        let tokens = protocol.tokens_mut();
        tokens.mint_to(&asset_a, &pool, 1_000_000).unwrap();
        tokens.mint_to(&asset_b, &pool, 2_000_000).unwrap();
        tokens.mint_to(&lp_mint, &genesis, 1_000_000).unwrap();

        let farm = protocol.create_farm(&farm_owner, &pool).unwrap();

        Self {
            protocol,
            admin,
            keeper,
            pauser,
            farm_owner,
            signers,
            pool,
            lp_mint,
            asset_a,
            asset_b,
            reward_mint,
            source,
            farm,
        }
    }

    /// Give `user` `lp` LP, backed by `lp` A and `2 * lp` B added to the pool.
    pub fn fund_lp(&mut self, user: &Pubkey, lp: u64) {
        let tokens = self.protocol.tokens_mut();
        tokens.mint_to(&self.asset_a, &self.pool, lp).unwrap();
        tokens.mint_to(&self.asset_b, &self.pool, 2 * lp).unwrap();
        tokens.mint_to(&self.lp_mint, user, lp).unwrap();
    }

    /// New user holding `lp` LP, deposited for themselves.
    pub fn depositor(&mut self, lp: u64) -> Pubkey {
        let user = Pubkey::new_unique();
        self.fund_lp(&user, lp);
        self.protocol.deposit(&user, &self.pool, lp, &user).unwrap();
        user
    }

    /// Rewards waiting in the yield source for the next harvest.
    pub fn accrue(&mut self, reward: u64) {
        let (mint, source) = (self.reward_mint, self.source);
        self.protocol.tokens_mut().mint_to(&mint, &source, reward).unwrap();
    }

    /// Reward -> A at 1:1, reward -> B at 2:1.
    pub fn reward_routes(&self) -> Vec<SwapRoute> {
        vec![route(0, 0, 1, 1), route(0, 0, 2, 1)]
    }

    pub fn staked_in_source(&self) -> u64 {
        self.protocol
            .venue(&self.pool)
            .unwrap()
            .yield_source
            .staked(&self.farm)
    }

    pub fn balance(&self, mint: &Pubkey, owner: &Pubkey) -> u64 {
        self.protocol.tokens().balance_of(mint, owner)
    }

    /// The router must hold nothing and have no open approvals between calls.
    pub fn assert_router_clean(&self, mints: &[Pubkey]) {
        let router = self.protocol.config().asset_router;
        for mint in mints {
            assert_eq!(self.balance(mint, &router), 0, "router holds {}", mint);
        }
        assert_eq!(self.protocol.tokens().open_allowances(&router), 0);
    }
}
