//! Role membership store.
//!
//! No inheritance chain: every privileged entry point elsewhere calls
//! `require_role` / `require_any_role` against this collaborator first.

use std::collections::BTreeSet;

use solana_program::{msg, pubkey::Pubkey};

use crate::error::FarmError;
use crate::event::{Event, EventLog};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Role {
    /// Grants and revokes roles, registers pools and implementations
    Admin = 0,
    /// Creates farms
    FarmOwner = 1,
    /// Triggers reward distribution
    Keeper = 2,
    /// Pauses and unpauses the router
    Pauser = 3,
}

impl Role {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Role::Admin),
            1 => Some(Role::FarmOwner),
            2 => Some(Role::Keeper),
            3 => Some(Role::Pauser),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessManager {
    address: Pubkey,
    members: BTreeSet<(Role, Pubkey)>,
}

impl AccessManager {
    /// New store with `admin` holding `Role::Admin`.
    pub fn new(address: Pubkey, admin: Pubkey) -> Self {
        let mut members = BTreeSet::new();
        members.insert((Role::Admin, admin));
        Self { address, members }
    }

    pub fn address(&self) -> Pubkey {
        self.address
    }

    pub fn has_role(&self, role: Role, account: &Pubkey) -> bool {
        self.members.contains(&(role, *account))
    }

    pub fn require_role(&self, role: Role, account: &Pubkey) -> Result<(), FarmError> {
        if self.has_role(role, account) {
            Ok(())
        } else {
            Err(FarmError::MissingRole)
        }
    }

    pub fn require_any_role(&self, roles: &[Role], account: &Pubkey) -> Result<(), FarmError> {
        if roles.iter().any(|r| self.has_role(*r, account)) {
            Ok(())
        } else {
            Err(FarmError::MissingRole)
        }
    }

    /// Accounts holding `role`, in key order.
    pub fn members(&self, role: Role) -> Vec<Pubkey> {
        self.members
            .iter()
            .filter(|(r, _)| *r == role)
            .map(|(_, a)| *a)
            .collect()
    }

    /// Returns whether membership changed.
    pub fn grant_role(
        &mut self,
        caller: &Pubkey,
        role: Role,
        account: &Pubkey,
        events: &mut EventLog,
    ) -> Result<bool, FarmError> {
        self.require_role(Role::Admin, caller)?;
        let changed = self.members.insert((role, *account));
        if changed {
            events.emit(Event::RoleGranted { role, account: *account, sender: *caller });
            msg!("Granted {:?} to {}", role, account);
        }
        Ok(changed)
    }

    /// Returns whether membership changed.
    pub fn revoke_role(
        &mut self,
        caller: &Pubkey,
        role: Role,
        account: &Pubkey,
        events: &mut EventLog,
    ) -> Result<bool, FarmError> {
        self.require_role(Role::Admin, caller)?;
        let changed = self.members.remove(&(role, *account));
        if changed {
            events.emit(Event::RoleRevoked { role, account: *account, sender: *caller });
            msg!("Revoked {:?} from {}", role, account);
        }
        Ok(changed)
    }

    /// Drop one of the caller's own roles.
    pub fn renounce_role(
        &mut self,
        caller: &Pubkey,
        role: Role,
        events: &mut EventLog,
    ) -> Result<bool, FarmError> {
        let changed = self.members.remove(&(role, *caller));
        if changed {
            events.emit(Event::RoleRevoked { role, account: *caller, sender: *caller });
        }
        Ok(changed)
    }
}
