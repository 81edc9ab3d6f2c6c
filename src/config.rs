use solana_program::{msg, pubkey::Pubkey};

use crate::error::FarmError;
use crate::math::BPS_DENOMINATOR;

/// Governor minimum delay: 2 days.
pub const DEFAULT_MIN_DELAY: i64 = 172_800;

/// Ceiling on the distribution fee a keeper may request (20%).
pub const DEFAULT_MAX_FEE_BPS: u16 = 2_000;

/// Component addresses and protocol-wide limits, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolConfig {
    pub access_manager: Pubkey,
    pub asset_router: Pubkey,
    pub farm_factory: Pubkey,
    pub governor: Pubkey,
    pub min_delay: i64,
    pub max_fee_bps: u16,
}

impl ProtocolConfig {
    /// Fresh unique component addresses with default limits.
    pub fn with_unique_addresses() -> Self {
        Self {
            access_manager: Pubkey::new_unique(),
            asset_router: Pubkey::new_unique(),
            farm_factory: Pubkey::new_unique(),
            governor: Pubkey::new_unique(),
            min_delay: DEFAULT_MIN_DELAY,
            max_fee_bps: DEFAULT_MAX_FEE_BPS,
        }
    }

    pub fn validate(&self) -> Result<(), FarmError> {
        let addrs = [
            self.access_manager,
            self.asset_router,
            self.farm_factory,
            self.governor,
        ];
        for (i, a) in addrs.iter().enumerate() {
            if *a == Pubkey::default() || addrs[i + 1..].contains(a) {
                msg!("Error: component address {} is zero or reused", a);
                return Err(FarmError::InvalidConfig);
            }
        }
        if self.min_delay < 0 {
            msg!("Error: negative min_delay {}", self.min_delay);
            return Err(FarmError::InvalidConfig);
        }
        if self.max_fee_bps as u64 > BPS_DENOMINATOR {
            msg!("Error: max_fee_bps {} above 100%", self.max_fee_bps);
            return Err(FarmError::InvalidConfig);
        }
        Ok(())
    }
}
