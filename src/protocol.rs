//! The protocol world.
//!
//! `Protocol` owns every component, the token ledger, the external
//! capabilities, the clock and the event log. Each state-changing method runs
//! inside `transact`: the whole world is snapshotted first and restored if the
//! operation fails, so a failed call leaves no trace (events included).

use std::collections::BTreeMap;
use std::sync::Arc;

use solana_program::{clock::Clock, msg, pubkey::Pubkey};

use crate::access::{AccessManager, Role};
use crate::capability::{SwapExecutor, SwapRoute, Venue};
use crate::config::ProtocolConfig;
use crate::error::FarmError;
use crate::event::{Event, EventLog};
use crate::factory::FarmFactory;
use crate::farm::{DistributeReport, FarmLogic, FeeConfig};
use crate::governor::{Authorizer, Operation, OperationState, UpgradeGovernor};
use crate::processor::process_instruction;
use crate::router::{AssetRouter, RouterEnv, StakeBreakdown, TotalDeposits};
use crate::state::{FarmState, MAX_POOL_ASSETS};
use crate::token::{TokenLedger, NATIVE_MINT};

#[derive(Debug, Clone)]
pub struct Protocol {
    config: ProtocolConfig,
    clock: Clock,
    tokens: TokenLedger,
    access: AccessManager,
    factory: FarmFactory,
    router: AssetRouter,
    governor: UpgradeGovernor,
    venues: BTreeMap<Pubkey, Venue>,
    swap_executor: Box<dyn SwapExecutor>,
    events: EventLog,
}

impl Protocol {
    /// Wire up a protocol. `admin` receives ADMIN; `farm_logic` is
    /// registered as `farm_implementation` and is what new farms run.
    pub fn new(
        config: ProtocolConfig,
        admin: Pubkey,
        authorizer: Arc<dyn Authorizer>,
        swap_executor: Box<dyn SwapExecutor>,
        farm_implementation: Pubkey,
        farm_logic: Arc<dyn FarmLogic>,
    ) -> Result<Self, FarmError> {
        config.validate()?;
        Ok(Self {
            config,
            clock: Clock::default(),
            tokens: TokenLedger::new(),
            access: AccessManager::new(config.access_manager, admin),
            factory: FarmFactory::new(
                config.farm_factory,
                config.asset_router,
                config.governor,
                farm_implementation,
                farm_logic,
            ),
            router: AssetRouter::new(config.asset_router, config.governor),
            governor: UpgradeGovernor::new(config.governor, config.min_delay, authorizer),
            venues: BTreeMap::new(),
            swap_executor,
            events: EventLog::default(),
        })
    }

    /// Run `f` atomically: on error every change it made is discarded.
    ///
    /// The event log is append-only, so it stays out of the snapshot and is
    /// cut back to its length at entry instead.
    pub fn transact<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, FarmError>,
    ) -> Result<T, FarmError> {
        let mark = self.events.len();
        let events = std::mem::take(&mut self.events);
        let snapshot = self.clone();
        self.events = events;

        match f(self) {
            Ok(v) => Ok(v),
            Err(e) => {
                let mut events = std::mem::take(&mut self.events);
                events.truncate(mark);
                *self = snapshot;
                self.events = events;
                msg!("Operation reverted: {:?}", e);
                Err(e)
            }
        }
    }

    fn router_parts(&mut self) -> (&mut AssetRouter, RouterEnv<'_>) {
        let Self {
            config,
            clock,
            tokens,
            access,
            factory,
            router,
            venues,
            swap_executor,
            events,
            ..
        } = self;
        let env = RouterEnv {
            access,
            factory,
            venues,
            swaps: &mut **swap_executor,
            tokens,
            events,
            now: clock.unix_timestamp,
            max_fee_bps: config.max_fee_bps,
        };
        (router, env)
    }

    // ── Clock ──

    pub fn now(&self) -> i64 {
        self.clock.unix_timestamp
    }

    pub fn set_unix_timestamp(&mut self, ts: i64) {
        self.clock.unix_timestamp = ts;
    }

    /// Advance the clock by `seconds`.
    pub fn warp(&mut self, seconds: i64) {
        self.clock.unix_timestamp = self.clock.unix_timestamp.saturating_add(seconds);
    }

    // ── Accessors ──

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn tokens(&self) -> &TokenLedger {
        &self.tokens
    }

    /// Direct ledger access for funding accounts and simulating external
    /// activity. Not transactional.
    pub fn tokens_mut(&mut self) -> &mut TokenLedger {
        &mut self.tokens
    }

    pub fn access(&self) -> &AccessManager {
        &self.access
    }

    pub fn factory(&self) -> &FarmFactory {
        &self.factory
    }

    pub fn router(&self) -> &AssetRouter {
        &self.router
    }

    pub fn governor(&self) -> &UpgradeGovernor {
        &self.governor
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn venue(&self, pool: &Pubkey) -> Option<&Venue> {
        self.venues.get(pool)
    }

    pub fn farm(&self, pool: &Pubkey) -> Option<&FarmState> {
        self.factory.farm(pool).map(|f| &f.state)
    }

    pub fn farm_address(&self, pool: &Pubkey) -> Option<Pubkey> {
        self.factory.farm(pool).map(|f| f.address)
    }

    // ── Setup ──

    /// Register a pool's AMM and yield source. ADMIN only.
    pub fn register_pool(&mut self, caller: &Pubkey, venue: Venue) -> Result<Pubkey, FarmError> {
        self.transact(|p| {
            p.access.require_role(Role::Admin, caller)?;
            let pool = venue.pool();
            if p.venues.contains_key(&pool) {
                return Err(FarmError::PoolAlreadyRegistered);
            }
            let assets = venue.assets();
            let distinct = assets
                .iter()
                .enumerate()
                .all(|(i, a)| !assets[i + 1..].contains(a));
            if assets.len() < 2 || assets.len() > MAX_POOL_ASSETS || !distinct {
                msg!("Error: pool {} has an unsupported asset set", pool);
                return Err(FarmError::InvalidConfig);
            }
            if venue.lp_mint() != venue.yield_source.lp_mint() {
                msg!("Error: yield source does not stake the pool's LP");
                return Err(FarmError::InvalidConfig);
            }

            let lp_mint = venue.lp_mint();
            p.venues.insert(pool, venue);
            p.events.emit(Event::PoolRegistered { pool, lp_mint });
            msg!("Pool {} registered ({} assets)", pool, assets.len());
            Ok(pool)
        })
    }

    /// Deploy farm behaviour under `id`. ADMIN only; activation goes through
    /// the governor.
    pub fn register_farm_implementation(
        &mut self,
        caller: &Pubkey,
        id: Pubkey,
        logic: Arc<dyn FarmLogic>,
    ) -> Result<(), FarmError> {
        self.transact(|p| {
            p.access.require_role(Role::Admin, caller)?;
            p.factory.register_implementation(id, logic)
        })
    }

    // ── Access ──

    pub fn grant_role(&mut self, caller: &Pubkey, role: Role, account: &Pubkey) -> Result<bool, FarmError> {
        self.transact(|p| p.access.grant_role(caller, role, account, &mut p.events))
    }

    pub fn revoke_role(&mut self, caller: &Pubkey, role: Role, account: &Pubkey) -> Result<bool, FarmError> {
        self.transact(|p| p.access.revoke_role(caller, role, account, &mut p.events))
    }

    pub fn renounce_role(&mut self, caller: &Pubkey, role: Role) -> Result<bool, FarmError> {
        self.transact(|p| p.access.renounce_role(caller, role, &mut p.events))
    }

    // ── Factory ──

    pub fn create_farm(&mut self, caller: &Pubkey, pool: &Pubkey) -> Result<Pubkey, FarmError> {
        self.transact(|p| {
            let venue = p.venues.get(pool);
            p.factory
                .create_farm(&p.access, caller, pool, venue, &mut p.events)
        })
    }

    pub fn upgrade_farms(&mut self, caller: &Pubkey, implementation: &Pubkey) -> Result<u64, FarmError> {
        self.transact(|p| p.factory.upgrade_farms(caller, implementation, &mut p.events))
    }

    // ── Router ──

    pub fn deposit(
        &mut self,
        caller: &Pubkey,
        pool: &Pubkey,
        amount: u64,
        recipient: &Pubkey,
    ) -> Result<u64, FarmError> {
        self.transact(|p| {
            let (router, mut env) = p.router_parts();
            router.deposit(&mut env, caller, pool, amount, recipient)
        })
    }

    pub fn deposit_tokens(
        &mut self,
        caller: &Pubkey,
        pool: &Pubkey,
        amounts: &[u64],
        min_lp: u64,
        recipient: &Pubkey,
    ) -> Result<u64, FarmError> {
        self.transact(|p| {
            let (router, mut env) = p.router_parts();
            router.deposit_tokens(&mut env, caller, pool, amounts, min_lp, recipient)
        })
    }

    pub fn deposit_with_swap(
        &mut self,
        caller: &Pubkey,
        pool: &Pubkey,
        input_mint: &Pubkey,
        routes: &[SwapRoute],
        recipient: &Pubkey,
    ) -> Result<u64, FarmError> {
        self.transact(|p| {
            let (router, mut env) = p.router_parts();
            router.deposit_with_swap(&mut env, caller, pool, input_mint, routes, recipient)
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn deposit_single_asset(
        &mut self,
        caller: &Pubkey,
        pool: &Pubkey,
        input_mint: &Pubkey,
        amount: u64,
        routes: &[SwapRoute],
        min_lp: u64,
        recipient: &Pubkey,
    ) -> Result<u64, FarmError> {
        self.transact(|p| {
            let (router, mut env) = p.router_parts();
            router.deposit_single_asset(
                &mut env, caller, pool, input_mint, amount, routes, min_lp, recipient,
            )
        })
    }

    pub fn withdraw(
        &mut self,
        caller: &Pubkey,
        pool: &Pubkey,
        shares: u64,
        recipient: &Pubkey,
    ) -> Result<u64, FarmError> {
        self.transact(|p| {
            let (router, mut env) = p.router_parts();
            router.withdraw(&mut env, caller, pool, shares, recipient)
        })
    }

    pub fn withdraw_tokens(
        &mut self,
        caller: &Pubkey,
        pool: &Pubkey,
        shares: u64,
        min_amounts: &[u64],
        recipient: &Pubkey,
    ) -> Result<Vec<u64>, FarmError> {
        self.transact(|p| {
            let (router, mut env) = p.router_parts();
            router.withdraw_tokens(&mut env, caller, pool, shares, min_amounts, recipient)
        })
    }

    pub fn withdraw_with_swap(
        &mut self,
        caller: &Pubkey,
        pool: &Pubkey,
        shares: u64,
        target_mint: &Pubkey,
        routes: &[SwapRoute],
        recipient: &Pubkey,
    ) -> Result<u64, FarmError> {
        self.transact(|p| {
            let (router, mut env) = p.router_parts();
            router.withdraw_with_swap(&mut env, caller, pool, shares, target_mint, routes, recipient)
        })
    }

    pub fn withdraw_single_asset(
        &mut self,
        caller: &Pubkey,
        pool: &Pubkey,
        shares: u64,
        target_mint: &Pubkey,
        routes: &[SwapRoute],
        recipient: &Pubkey,
    ) -> Result<u64, FarmError> {
        self.transact(|p| {
            let (router, mut env) = p.router_parts();
            router.withdraw_single_asset(&mut env, caller, pool, shares, target_mint, routes, recipient)
        })
    }

    /// Pays out in `NATIVE_MINT`.
    pub fn withdraw_single_eth(
        &mut self,
        caller: &Pubkey,
        pool: &Pubkey,
        shares: u64,
        routes: &[SwapRoute],
        recipient: &Pubkey,
    ) -> Result<u64, FarmError> {
        self.transact(|p| {
            let (router, mut env) = p.router_parts();
            router.withdraw_single_eth(&mut env, caller, pool, shares, routes, recipient)
        })
    }

    pub fn distribute(
        &mut self,
        caller: &Pubkey,
        pool: &Pubkey,
        routes: &[SwapRoute],
        fee: &FeeConfig,
    ) -> Result<DistributeReport, FarmError> {
        self.transact(|p| {
            let (router, mut env) = p.router_parts();
            router.distribute(&mut env, caller, pool, routes, fee)
        })
    }

    pub fn pause(&mut self, caller: &Pubkey) -> Result<(), FarmError> {
        self.transact(|p| p.router.pause(&p.access, caller, &mut p.events))
    }

    pub fn unpause(&mut self, caller: &Pubkey) -> Result<(), FarmError> {
        self.transact(|p| p.router.unpause(&p.access, caller, &mut p.events))
    }

    pub fn set_deposit_cap(
        &mut self,
        caller: &Pubkey,
        pool: &Pubkey,
        cap: Option<u64>,
    ) -> Result<(), FarmError> {
        self.transact(|p| p.router.set_deposit_cap(&p.access, caller, pool, cap, &mut p.events))
    }

    pub fn upgrade_router(&mut self, caller: &Pubkey, implementation: &Pubkey) -> Result<(), FarmError> {
        self.transact(|p| p.router.upgrade_to(caller, implementation, &mut p.events))
    }

    // ── Governor ──

    pub fn schedule(
        &mut self,
        approvals: &[Pubkey],
        op: &Operation,
        delay: i64,
    ) -> Result<[u8; 32], FarmError> {
        self.transact(|p| {
            let now = p.now();
            p.governor.schedule(approvals, op, delay, now, &mut p.events)
        })
    }

    pub fn cancel(&mut self, approvals: &[Pubkey], id: &[u8; 32]) -> Result<(), FarmError> {
        self.transact(|p| {
            let now = p.now();
            p.governor.cancel(approvals, id, now, &mut p.events)
        })
    }

    /// Run a ready operation: forward `value` native coin to the target,
    /// dispatch the calldata with the governor as caller, mark it done.
    pub fn execute(&mut self, approvals: &[Pubkey], op: &Operation) -> Result<[u8; 32], FarmError> {
        self.transact(|p| {
            let now = p.now();
            let id = p.governor.begin_execution(approvals, op, now)?;
            let governor = p.governor.address();
            if op.value > 0 {
                p.tokens.transfer(&NATIVE_MINT, &governor, &op.target, op.value)?;
            }
            if !op.data.is_empty() {
                process_instruction(p, &governor, &op.target, &op.data)?;
            }
            p.governor.complete_execution(&id, now, &mut p.events)?;
            Ok(id)
        })
    }

    pub fn update_min_delay(&mut self, caller: &Pubkey, delay: i64) -> Result<(), FarmError> {
        self.transact(|p| p.governor.update_min_delay(caller, delay, &mut p.events))
    }

    pub fn operation_state(&self, id: &[u8; 32]) -> OperationState {
        self.governor.operation_state(id, self.now())
    }

    /// Instruction-level entry point.
    pub fn process(&mut self, caller: &Pubkey, target: &Pubkey, data: &[u8]) -> Result<(), FarmError> {
        self.transact(|p| process_instruction(p, caller, target, data))
    }

    // ── Queries ──

    pub fn user_stake(&self, user: &Pubkey, pool: &Pubkey) -> Result<StakeBreakdown, FarmError> {
        self.router
            .user_stake(&self.factory, &self.venues, &self.tokens, user, pool)
    }

    pub fn total_deposits(&self, pool: &Pubkey) -> Result<TotalDeposits, FarmError> {
        self.router
            .total_deposits(&self.factory, &self.venues, &self.tokens, pool)
    }

    pub fn shares_of(&self, pool: &Pubkey, user: &Pubkey) -> u64 {
        self.router.shares_of(pool, user)
    }
}
