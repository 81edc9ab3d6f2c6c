use solana_program::pubkey::Pubkey;

use crate::access::Role;
use crate::capability::SwapRoute;
use crate::error::FarmError;
use crate::farm::{FeeConfig, FeeSwap};

/// Instructions accepted by the protocol components.
///
/// Encoding: one tag byte, then fields in declaration order, little-endian.
/// Lists carry a u8 count; route data carries a u32 length. Optional fields
/// carry a u8 presence flag. Tags are stable: governor operation ids hash
/// these bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Grant `role` to `account`.
    ///
    /// Target: access manager. Caller: ADMIN.
    GrantRole { role: Role, account: Pubkey },

    /// Target: access manager. Caller: ADMIN.
    RevokeRole { role: Role, account: Pubkey },

    /// Deploy the farm for a registered pool.
    ///
    /// Target: farm factory. Caller: FARM_OWNER or ADMIN.
    CreateFarm { pool: Pubkey },

    /// Repoint every farm at a registered implementation.
    ///
    /// Target: farm factory. Caller: governor.
    UpgradeFarms { implementation: Pubkey },

    /// Deposit LP held by the caller.
    ///
    /// Target: asset router. Caller: anyone (not while paused).
    Deposit {
        pool: Pubkey,
        amount: u64,
        recipient: Pubkey,
    },

    /// Deposit constituent assets, one amount per asset in pool order.
    DepositTokens {
        pool: Pubkey,
        amounts: Vec<u64>,
        min_lp: u64,
        recipient: Pubkey,
    },

    /// Two-asset single-token deposit; total input is the sum of route inputs.
    DepositWithSwap {
        pool: Pubkey,
        input_mint: Pubkey,
        routes: Vec<SwapRoute>,
        recipient: Pubkey,
    },

    DepositSingleAsset {
        pool: Pubkey,
        input_mint: Pubkey,
        amount: u64,
        routes: Vec<SwapRoute>,
        min_lp: u64,
        recipient: Pubkey,
    },

    /// Burn shares for LP. Allowed while paused.
    Withdraw {
        pool: Pubkey,
        shares: u64,
        recipient: Pubkey,
    },

    WithdrawTokens {
        pool: Pubkey,
        shares: u64,
        min_amounts: Vec<u64>,
        recipient: Pubkey,
    },

    WithdrawWithSwap {
        pool: Pubkey,
        shares: u64,
        target_mint: Pubkey,
        routes: Vec<SwapRoute>,
        recipient: Pubkey,
    },

    WithdrawSingleAsset {
        pool: Pubkey,
        shares: u64,
        target_mint: Pubkey,
        routes: Vec<SwapRoute>,
        recipient: Pubkey,
    },

    /// Like `WithdrawSingleAsset` with the native coin as target.
    WithdrawSingleEth {
        pool: Pubkey,
        shares: u64,
        routes: Vec<SwapRoute>,
        recipient: Pubkey,
    },

    /// Compound a farm's rewards.
    ///
    /// Target: asset router. Caller: KEEPER.
    Distribute {
        pool: Pubkey,
        routes: Vec<SwapRoute>,
        fee: FeeConfig,
    },

    /// Target: asset router. Caller: PAUSER.
    Pause,

    /// Target: asset router. Caller: PAUSER.
    Unpause,

    /// `None` removes the cap.
    ///
    /// Target: asset router. Caller: ADMIN.
    SetDepositCap { pool: Pubkey, cap: Option<u64> },

    /// Target: asset router. Caller: governor.
    UpgradeRouter { implementation: Pubkey },

    /// Target: governor. Caller: governor (scheduled operation).
    UpdateMinDelay { delay: i64 },

    /// Drop one of the caller's own roles.
    ///
    /// Target: access manager. Caller: the role holder.
    RenounceRole { role: Role },
}

impl Instruction {
    pub fn tag(&self) -> u8 {
        match self {
            Self::GrantRole { .. } => 0,
            Self::RevokeRole { .. } => 1,
            Self::CreateFarm { .. } => 2,
            Self::UpgradeFarms { .. } => 3,
            Self::Deposit { .. } => 4,
            Self::DepositTokens { .. } => 5,
            Self::DepositWithSwap { .. } => 6,
            Self::DepositSingleAsset { .. } => 7,
            Self::Withdraw { .. } => 8,
            Self::WithdrawTokens { .. } => 9,
            Self::WithdrawWithSwap { .. } => 10,
            Self::WithdrawSingleAsset { .. } => 11,
            Self::WithdrawSingleEth { .. } => 12,
            Self::Distribute { .. } => 13,
            Self::Pause => 14,
            Self::Unpause => 15,
            Self::SetDepositCap { .. } => 16,
            Self::UpgradeRouter { .. } => 17,
            Self::UpdateMinDelay { .. } => 18,
            Self::RenounceRole { .. } => 19,
        }
    }

    /// Fails with `InvalidInstruction` when a list or route payload is too
    /// long for its length prefix.
    pub fn pack(&self) -> Result<Vec<u8>, FarmError> {
        let mut w = Writer(vec![self.tag()]);
        match self {
            Self::GrantRole { role, account } | Self::RevokeRole { role, account } => {
                w.u8(*role as u8);
                w.pubkey(account);
            }
            Self::CreateFarm { pool } => w.pubkey(pool),
            Self::UpgradeFarms { implementation } | Self::UpgradeRouter { implementation } => {
                w.pubkey(implementation)
            }
            Self::Deposit { pool, amount, recipient } => {
                w.pubkey(pool);
                w.u64(*amount);
                w.pubkey(recipient);
            }
            Self::DepositTokens { pool, amounts, min_lp, recipient } => {
                w.pubkey(pool);
                w.u64_list(amounts)?;
                w.u64(*min_lp);
                w.pubkey(recipient);
            }
            Self::DepositWithSwap { pool, input_mint, routes, recipient } => {
                w.pubkey(pool);
                w.pubkey(input_mint);
                w.routes(routes)?;
                w.pubkey(recipient);
            }
            Self::DepositSingleAsset { pool, input_mint, amount, routes, min_lp, recipient } => {
                w.pubkey(pool);
                w.pubkey(input_mint);
                w.u64(*amount);
                w.routes(routes)?;
                w.u64(*min_lp);
                w.pubkey(recipient);
            }
            Self::Withdraw { pool, shares, recipient } => {
                w.pubkey(pool);
                w.u64(*shares);
                w.pubkey(recipient);
            }
            Self::WithdrawTokens { pool, shares, min_amounts, recipient } => {
                w.pubkey(pool);
                w.u64(*shares);
                w.u64_list(min_amounts)?;
                w.pubkey(recipient);
            }
            Self::WithdrawWithSwap { pool, shares, target_mint, routes, recipient }
            | Self::WithdrawSingleAsset { pool, shares, target_mint, routes, recipient } => {
                w.pubkey(pool);
                w.u64(*shares);
                w.pubkey(target_mint);
                w.routes(routes)?;
                w.pubkey(recipient);
            }
            Self::WithdrawSingleEth { pool, shares, routes, recipient } => {
                w.pubkey(pool);
                w.u64(*shares);
                w.routes(routes)?;
                w.pubkey(recipient);
            }
            Self::Distribute { pool, routes, fee } => {
                w.pubkey(pool);
                w.routes(routes)?;
                w.pubkey(&fee.fee_to);
                w.0.extend_from_slice(&fee.fee_bps.to_le_bytes());
                w.u8(fee.swap.is_some() as u8);
                if let Some(swap) = &fee.swap {
                    w.pubkey(&swap.output_mint);
                    w.route(&swap.route)?;
                }
            }
            Self::Pause | Self::Unpause => {}
            Self::SetDepositCap { pool, cap } => {
                w.pubkey(pool);
                w.u8(cap.is_some() as u8);
                w.u64(cap.unwrap_or(0));
            }
            Self::UpdateMinDelay { delay } => w.0.extend_from_slice(&delay.to_le_bytes()),
            Self::RenounceRole { role } => w.u8(*role as u8),
        }
        Ok(w.0)
    }

    pub fn unpack(data: &[u8]) -> Result<Self, FarmError> {
        let (&tag, rest) = data.split_first().ok_or(FarmError::InvalidInstruction)?;
        let mut r = Reader(rest);

        let ix = match tag {
            0 => Self::GrantRole { role: r.role()?, account: r.pubkey()? },
            1 => Self::RevokeRole { role: r.role()?, account: r.pubkey()? },
            2 => Self::CreateFarm { pool: r.pubkey()? },
            3 => Self::UpgradeFarms { implementation: r.pubkey()? },
            4 => Self::Deposit {
                pool: r.pubkey()?,
                amount: r.u64()?,
                recipient: r.pubkey()?,
            },
            5 => Self::DepositTokens {
                pool: r.pubkey()?,
                amounts: r.u64_list()?,
                min_lp: r.u64()?,
                recipient: r.pubkey()?,
            },
            6 => Self::DepositWithSwap {
                pool: r.pubkey()?,
                input_mint: r.pubkey()?,
                routes: r.routes()?,
                recipient: r.pubkey()?,
            },
            7 => Self::DepositSingleAsset {
                pool: r.pubkey()?,
                input_mint: r.pubkey()?,
                amount: r.u64()?,
                routes: r.routes()?,
                min_lp: r.u64()?,
                recipient: r.pubkey()?,
            },
            8 => Self::Withdraw {
                pool: r.pubkey()?,
                shares: r.u64()?,
                recipient: r.pubkey()?,
            },
            9 => Self::WithdrawTokens {
                pool: r.pubkey()?,
                shares: r.u64()?,
                min_amounts: r.u64_list()?,
                recipient: r.pubkey()?,
            },
            10 => Self::WithdrawWithSwap {
                pool: r.pubkey()?,
                shares: r.u64()?,
                target_mint: r.pubkey()?,
                routes: r.routes()?,
                recipient: r.pubkey()?,
            },
            11 => Self::WithdrawSingleAsset {
                pool: r.pubkey()?,
                shares: r.u64()?,
                target_mint: r.pubkey()?,
                routes: r.routes()?,
                recipient: r.pubkey()?,
            },
            12 => Self::WithdrawSingleEth {
                pool: r.pubkey()?,
                shares: r.u64()?,
                routes: r.routes()?,
                recipient: r.pubkey()?,
            },
            13 => {
                let pool = r.pubkey()?;
                let routes = r.routes()?;
                let mut fee = FeeConfig::new(r.pubkey()?, u16::from_le_bytes(r.array()?));
                fee.swap = match r.u8()? {
                    0 => None,
                    1 => Some(FeeSwap { output_mint: r.pubkey()?, route: r.route()? }),
                    _ => return Err(FarmError::InvalidInstruction),
                };
                Self::Distribute { pool, routes, fee }
            }
            14 => Self::Pause,
            15 => Self::Unpause,
            16 => {
                let pool = r.pubkey()?;
                let has_cap = r.u8()? != 0;
                let cap = r.u64()?;
                Self::SetDepositCap { pool, cap: if has_cap { Some(cap) } else { None } }
            }
            17 => Self::UpgradeRouter { implementation: r.pubkey()? },
            18 => Self::UpdateMinDelay { delay: i64::from_le_bytes(r.array()?) },
            19 => Self::RenounceRole { role: r.role()? },
            _ => return Err(FarmError::InvalidInstruction),
        };

        if !r.0.is_empty() {
            return Err(FarmError::InvalidInstruction);
        }
        Ok(ix)
    }
}

struct Writer(Vec<u8>);

impl Writer {
    fn u8(&mut self, v: u8) {
        self.0.push(v);
    }

    fn u64(&mut self, v: u64) {
        self.0.extend_from_slice(&v.to_le_bytes());
    }

    fn pubkey(&mut self, key: &Pubkey) {
        self.0.extend_from_slice(key.as_ref());
    }

    fn count(&mut self, len: usize) -> Result<(), FarmError> {
        let n = u8::try_from(len).map_err(|_| FarmError::InvalidInstruction)?;
        self.u8(n);
        Ok(())
    }

    fn u64_list(&mut self, values: &[u64]) -> Result<(), FarmError> {
        self.count(values.len())?;
        for v in values {
            self.u64(*v);
        }
        Ok(())
    }

    fn route(&mut self, route: &SwapRoute) -> Result<(), FarmError> {
        let len = u32::try_from(route.data.len()).map_err(|_| FarmError::InvalidInstruction)?;
        self.u64(route.amount_in);
        self.u64(route.min_amount_out);
        self.0.extend_from_slice(&len.to_le_bytes());
        self.0.extend_from_slice(&route.data);
        Ok(())
    }

    fn routes(&mut self, routes: &[SwapRoute]) -> Result<(), FarmError> {
        self.count(routes.len())?;
        routes.iter().try_for_each(|route| self.route(route))
    }
}

struct Reader<'a>(&'a [u8]);

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], FarmError> {
        if self.0.len() < n {
            return Err(FarmError::InvalidInstruction);
        }
        let (head, tail) = self.0.split_at(n);
        self.0 = tail;
        Ok(head)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], FarmError> {
        self.take(N)?
            .try_into()
            .map_err(|_| FarmError::InvalidInstruction)
    }

    fn u8(&mut self) -> Result<u8, FarmError> {
        Ok(self.take(1)?[0])
    }

    fn u64(&mut self) -> Result<u64, FarmError> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn pubkey(&mut self) -> Result<Pubkey, FarmError> {
        Ok(Pubkey::new_from_array(self.array()?))
    }

    fn role(&mut self) -> Result<Role, FarmError> {
        Role::from_u8(self.u8()?).ok_or(FarmError::InvalidInstruction)
    }

    fn u64_list(&mut self) -> Result<Vec<u64>, FarmError> {
        let n = self.u8()? as usize;
        (0..n).map(|_| self.u64()).collect()
    }

    fn route(&mut self) -> Result<SwapRoute, FarmError> {
        let amount_in = self.u64()?;
        let min_amount_out = self.u64()?;
        let len = u32::from_le_bytes(self.array()?) as usize;
        let data = self.take(len)?.to_vec();
        Ok(SwapRoute { amount_in, min_amount_out, data })
    }

    fn routes(&mut self) -> Result<Vec<SwapRoute>, FarmError> {
        let n = self.u8()? as usize;
        (0..n).map(|_| self.route()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Tag 4: Deposit ──

    #[test]
    fn test_unpack_deposit() {
        let pool = Pubkey::new_unique();
        let recipient = Pubkey::new_unique();
        let mut data = vec![4u8];
        data.extend_from_slice(pool.as_ref());
        data.extend_from_slice(&42u64.to_le_bytes());
        data.extend_from_slice(recipient.as_ref());
        match Instruction::unpack(&data).unwrap() {
            Instruction::Deposit { pool: p, amount, recipient: r } => {
                assert_eq!(p, pool);
                assert_eq!(amount, 42);
                assert_eq!(r, recipient);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn test_unpack_deposit_too_short() {
        let data = vec![4u8, 1, 2, 3];
        assert_eq!(Instruction::unpack(&data), Err(FarmError::InvalidInstruction));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut data = Instruction::Pause.pack().unwrap();
        data.push(0);
        assert_eq!(Instruction::unpack(&data), Err(FarmError::InvalidInstruction));
    }

    // ── Routes ──

    #[test]
    fn test_route_data_preserved() {
        let ix = Instruction::Distribute {
            pool: Pubkey::new_unique(),
            routes: vec![
                SwapRoute::new(10, 9, vec![]),
                SwapRoute::new(20, 19, vec![0xde, 0xad, 0xbe, 0xef]),
            ],
            fee: FeeConfig::new(Pubkey::new_unique(), 250),
        };
        assert_eq!(Instruction::unpack(&ix.pack().unwrap()).unwrap(), ix);
    }

    #[test]
    fn test_fee_swap_preserved() {
        let ix = Instruction::Distribute {
            pool: Pubkey::new_unique(),
            routes: vec![SwapRoute::new(0, 0, vec![]), SwapRoute::new(0, 0, vec![])],
            fee: FeeConfig::new(Pubkey::new_unique(), 100)
                .with_swap(Pubkey::new_unique(), SwapRoute::new(0, 7, vec![1, 2])),
        };
        let mut data = ix.pack().unwrap();
        assert_eq!(Instruction::unpack(&data).unwrap(), ix);

        // Presence flag follows fee_to and fee_bps.
        let flag = 1 + 32 + 1 + 20 + 20 + 32 + 2;
        assert_eq!(data[flag], 1);
        data[flag] = 2;
        assert_eq!(Instruction::unpack(&data), Err(FarmError::InvalidInstruction));
    }

    #[test]
    fn test_pack_rejects_oversized_lists() {
        let ix = Instruction::DepositTokens {
            pool: Pubkey::new_unique(),
            amounts: vec![1; 256],
            min_lp: 0,
            recipient: Pubkey::new_unique(),
        };
        assert_eq!(ix.pack(), Err(FarmError::InvalidInstruction));

        let ix = Instruction::Distribute {
            pool: Pubkey::new_unique(),
            routes: vec![SwapRoute::default(); 256],
            fee: FeeConfig::none(),
        };
        assert_eq!(ix.pack(), Err(FarmError::InvalidInstruction));

        let ix = Instruction::DepositTokens {
            pool: Pubkey::new_unique(),
            amounts: vec![1; 255],
            min_lp: 0,
            recipient: Pubkey::new_unique(),
        };
        assert_eq!(Instruction::unpack(&ix.pack().unwrap()).unwrap(), ix);
    }

    #[test]
    fn test_route_length_past_end() {
        let mut data = vec![13u8];
        data.extend_from_slice(Pubkey::new_unique().as_ref());
        data.push(1);
        data.extend_from_slice(&1u64.to_le_bytes());
        data.extend_from_slice(&1u64.to_le_bytes());
        data.extend_from_slice(&1_000u32.to_le_bytes());
        assert_eq!(Instruction::unpack(&data), Err(FarmError::InvalidInstruction));
    }

    // ── Tag 16: SetDepositCap ──

    #[test]
    fn test_set_deposit_cap_flag() {
        let pool = Pubkey::new_unique();
        let mut data = vec![16u8];
        data.extend_from_slice(pool.as_ref());
        data.push(0);
        data.extend_from_slice(&5_000u64.to_le_bytes());
        assert_eq!(
            Instruction::unpack(&data).unwrap(),
            Instruction::SetDepositCap { pool, cap: None }
        );
        data[33] = 1;
        assert_eq!(
            Instruction::unpack(&data).unwrap(),
            Instruction::SetDepositCap { pool, cap: Some(5_000) }
        );
    }

    #[test]
    fn test_unknown_role_rejected() {
        assert_eq!(Instruction::unpack(&[19, 9]), Err(FarmError::InvalidInstruction));
    }

    #[test]
    fn test_invalid_tag() {
        assert!(Instruction::unpack(&[20]).is_err());
        assert!(Instruction::unpack(&[255]).is_err());
        assert!(Instruction::unpack(&[]).is_err());
    }
}
