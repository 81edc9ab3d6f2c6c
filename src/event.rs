use solana_program::pubkey::Pubkey;

use crate::access::Role;

/// Records emitted by state-changing operations. Discarded with the rest of
/// the operation's effects when it fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Initialized {
        farm: Pubkey,
        version: u64,
    },
    PoolRegistered {
        pool: Pubkey,
        lp_mint: Pubkey,
    },
    FarmCreated {
        pool: Pubkey,
        farm: Pubkey,
    },
    FarmsUpgraded {
        implementation: Pubkey,
        farms: u64,
    },
    RouterUpgraded {
        implementation: Pubkey,
    },
    Deposit {
        lp_pool: Pubkey,
        sender: Pubkey,
        recipient: Pubkey,
        amount: u64,
    },
    Withdraw {
        lp_pool: Pubkey,
        sender: Pubkey,
        recipient: Pubkey,
        amount: u64,
    },
    Distributed {
        lp_pool: Pubkey,
        reward: u64,
        fee: u64,
        lp_added: u64,
    },
    RoleGranted {
        role: Role,
        account: Pubkey,
        sender: Pubkey,
    },
    RoleRevoked {
        role: Role,
        account: Pubkey,
        sender: Pubkey,
    },
    Paused {
        account: Pubkey,
    },
    Unpaused {
        account: Pubkey,
    },
    DepositCapUpdated {
        lp_pool: Pubkey,
        cap: u64,
    },
    ProposalScheduled {
        id: [u8; 32],
        eta: i64,
    },
    ProposalExecuted {
        id: [u8; 32],
    },
    ProposalCancelled {
        id: [u8; 32],
    },
    MinDelayUpdated {
        old: i64,
        new: i64,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn last(&self) -> Option<&Event> {
        self.events.last()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Drop every event after the first `len`.
    pub fn truncate(&mut self, len: usize) {
        self.events.truncate(len);
    }

    /// Take every event recorded so far, leaving the log empty.
    pub fn drain(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
}
