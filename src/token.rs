//! In-memory token ledger.
//!
//! Every value movement in the protocol (LP, constituent assets, reward
//! tokens, native coin) is a balance change here. External capabilities get a
//! `&mut TokenLedger` and move funds through it the way a program moves funds
//! through the token program.

use std::collections::BTreeMap;

use solana_program::pubkey::Pubkey;

use crate::error::FarmError;

/// Sentinel mint standing for the chain's native coin.
pub const NATIVE_MINT: Pubkey = Pubkey::new_from_array([0xEE; 32]);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenLedger {
    balances: BTreeMap<(Pubkey, Pubkey), u64>,
    supplies: BTreeMap<Pubkey, u64>,
    allowances: BTreeMap<(Pubkey, Pubkey, Pubkey), u64>,
}

impl TokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, mint: &Pubkey, owner: &Pubkey) -> u64 {
        self.balances.get(&(*mint, *owner)).copied().unwrap_or(0)
    }

    pub fn total_supply(&self, mint: &Pubkey) -> u64 {
        self.supplies.get(mint).copied().unwrap_or(0)
    }

    pub fn allowance(&self, mint: &Pubkey, owner: &Pubkey, spender: &Pubkey) -> u64 {
        self.allowances
            .get(&(*mint, *owner, *spender))
            .copied()
            .unwrap_or(0)
    }

    pub fn mint_to(&mut self, mint: &Pubkey, to: &Pubkey, amount: u64) -> Result<(), FarmError> {
        let supply = self.total_supply(mint).checked_add(amount).ok_or(FarmError::Overflow)?;
        let balance = self.balance_of(mint, to).checked_add(amount).ok_or(FarmError::Overflow)?;
        self.supplies.insert(*mint, supply);
        self.balances.insert((*mint, *to), balance);
        Ok(())
    }

    pub fn burn(&mut self, mint: &Pubkey, from: &Pubkey, amount: u64) -> Result<(), FarmError> {
        let balance = self
            .balance_of(mint, from)
            .checked_sub(amount)
            .ok_or(FarmError::InsufficientFunds)?;
        let supply = self.total_supply(mint).checked_sub(amount).ok_or(FarmError::Overflow)?;
        self.balances.insert((*mint, *from), balance);
        self.supplies.insert(*mint, supply);
        Ok(())
    }

    pub fn transfer(
        &mut self,
        mint: &Pubkey,
        from: &Pubkey,
        to: &Pubkey,
        amount: u64,
    ) -> Result<(), FarmError> {
        if amount == 0 || from == to {
            return Ok(());
        }
        let from_balance = self
            .balance_of(mint, from)
            .checked_sub(amount)
            .ok_or(FarmError::InsufficientFunds)?;
        let to_balance = self
            .balance_of(mint, to)
            .checked_add(amount)
            .ok_or(FarmError::Overflow)?;
        self.balances.insert((*mint, *from), from_balance);
        self.balances.insert((*mint, *to), to_balance);
        Ok(())
    }

    /// Set (not add to) the amount `spender` may move out of `owner`.
    pub fn approve(&mut self, mint: &Pubkey, owner: &Pubkey, spender: &Pubkey, amount: u64) {
        if amount == 0 {
            self.allowances.remove(&(*mint, *owner, *spender));
        } else {
            self.allowances.insert((*mint, *owner, *spender), amount);
        }
    }

    pub fn revoke(&mut self, mint: &Pubkey, owner: &Pubkey, spender: &Pubkey) {
        self.allowances.remove(&(*mint, *owner, *spender));
    }

    /// Move `owner`'s tokens on the strength of an allowance held by `spender`.
    pub fn transfer_from(
        &mut self,
        mint: &Pubkey,
        spender: &Pubkey,
        owner: &Pubkey,
        to: &Pubkey,
        amount: u64,
    ) -> Result<(), FarmError> {
        let remaining = self
            .allowance(mint, owner, spender)
            .checked_sub(amount)
            .ok_or(FarmError::InsufficientFunds)?;
        self.transfer(mint, owner, to, amount)?;
        self.approve(mint, owner, spender, remaining);
        Ok(())
    }

    /// Number of live allowances granted by `owner` (any mint, any spender).
    pub fn open_allowances(&self, owner: &Pubkey) -> usize {
        self.allowances.keys().filter(|(_, o, _)| o == owner).count()
    }
}
