use bytemuck::{Pod, Zeroable};
use solana_program::pubkey::Pubkey;

/// Maximum constituent assets per pool (stable pools).
pub const MAX_POOL_ASSETS: usize = 4;

/// Farm storage record, one per pool.
/// Address seeds: [b"farm", pool_pubkey] under the factory address.
///
/// This record survives implementation upgrades untouched. New fields are
/// carved out of `_reserved` only; existing offsets never move
/// (see tests/struct_layout.rs).
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct FarmState {
    /// Whether the farm is initialized (1 = yes, 0 = no)
    pub is_initialized: u8,

    /// Reentrancy flag (1 while a mutating entry point runs)
    pub locked: u8,

    /// Number of populated entries in `assets`
    pub asset_count: u8,

    /// Padding for alignment
    pub _padding: [u8; 5],

    /// Version of the implementation that ran `initialize`
    pub version: u64,

    /// Pool identifier this farm compounds
    pub pool: [u8; 32],

    /// Only address allowed to mutate this farm
    pub asset_router: [u8; 32],

    /// LP token staked into the yield source
    pub lp_mint: [u8; 32],

    /// Token paid out by the yield source
    pub reward_mint: [u8; 32],

    /// External yield-source handle
    pub stake_source: [u8; 32],

    /// Constituent assets of the pool, `asset_count` used
    pub assets: [[u8; 32]; MAX_POOL_ASSETS],

    /// LP currently staked in the yield source on behalf of all shares
    pub total_staked_lp: u64,

    /// Shares outstanding
    pub total_shares: u64,

    /// LP per share scaled by math::PRICE_SCALE, refreshed on every compound
    pub share_price_index: u64,

    /// Lifetime LP added through compounding
    pub total_compounded_lp: u64,

    /// Lifetime protocol fees paid, in reward-token units
    pub total_fees_paid: u64,

    /// Unix timestamp of the last successful distribute
    pub last_distribute_ts: i64,

    /// Reserved for future use
    pub _reserved: [u8; 96],
}

/// Size of FarmState in bytes
pub const FARM_STATE_SIZE: usize = core::mem::size_of::<FarmState>();

/// Per-depositor ledger entry, owned by the asset router.
/// Keyed by (pool, user). Zeroed, never removed, when shares reach zero.
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct UserStake {
    /// Whether this record has ever been written
    pub is_initialized: u8,

    /// Padding
    pub _padding: [u8; 7],

    /// The pool this stake belongs to
    pub pool: [u8; 32],

    /// The staker
    pub user: [u8; 32],

    /// Farm shares held
    pub shares: u64,

    /// Lifetime LP deposited on behalf of this user
    pub total_deposited_lp: u64,

    /// Lifetime LP withdrawn by this user
    pub total_withdrawn_lp: u64,

    /// Unix timestamp of the last ledger change
    pub last_update_ts: i64,

    /// Reserved for future use
    pub _reserved: [u8; 64],
}

/// Size of UserStake in bytes
pub const USER_STAKE_SIZE: usize = core::mem::size_of::<UserStake>();

pub const PROPOSAL_UNSET: u8 = 0;
pub const PROPOSAL_SCHEDULED: u8 = 1;
pub const PROPOSAL_EXECUTED: u8 = 2;
pub const PROPOSAL_CANCELLED: u8 = 3;

/// Governor record for one scheduled operation, keyed by its content hash.
/// Calldata is not stored: execution re-supplies it and is re-hashed.
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct ProposalRecord {
    /// One of the PROPOSAL_* constants
    pub status: u8,

    /// Padding
    pub _padding: [u8; 7],

    /// Content hash of (target, value, calldata, predecessor, salt)
    pub id: [u8; 32],

    /// Component the calldata is dispatched to
    pub target: [u8; 32],

    /// Operation that must be executed first (all zeroes = none)
    pub predecessor: [u8; 32],

    /// Native coin forwarded to the target
    pub value: u64,

    /// Earliest execution timestamp
    pub eta: i64,

    /// When it was scheduled
    pub scheduled_at: i64,

    /// When it was executed or cancelled
    pub closed_at: i64,

    /// Reserved for future use
    pub _reserved: [u8; 32],
}

/// Size of ProposalRecord in bytes
pub const PROPOSAL_RECORD_SIZE: usize = core::mem::size_of::<ProposalRecord>();

impl FarmState {
    pub fn is_initialized(&self) -> bool {
        self.is_initialized == 1
    }

    pub fn pool_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.pool)
    }

    pub fn asset_router_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.asset_router)
    }

    pub fn lp_mint_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.lp_mint)
    }

    pub fn reward_mint_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.reward_mint)
    }

    pub fn stake_source_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.stake_source)
    }

    /// Constituent assets in pool order.
    pub fn assets(&self) -> Vec<Pubkey> {
        self.assets[..self.asset_count as usize]
            .iter()
            .map(|a| Pubkey::new_from_array(*a))
            .collect()
    }

    /// Shares minted for `amount_lp` newly staked LP.
    /// Delegates to pure math module (Kani-verified).
    pub fn calc_shares_for_deposit(&self, amount_lp: u64) -> Option<u64> {
        crate::math::calc_shares_for_deposit(self.total_shares, self.total_staked_lp, amount_lp)
    }

    /// LP released by burning `shares`.
    /// Delegates to pure math module (Kani-verified).
    pub fn calc_lp_for_shares(&self, shares: u64) -> Option<u64> {
        crate::math::calc_lp_for_shares(self.total_shares, self.total_staked_lp, shares)
    }
}

impl UserStake {
    pub fn pool_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.pool)
    }

    pub fn user_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.user)
    }
}

impl ProposalRecord {
    pub fn target_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.target)
    }
}

/// Derive the farm address for a pool.
pub fn derive_farm_address(factory: &Pubkey, pool: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[b"farm", pool.as_ref()], factory)
}
