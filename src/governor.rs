//! Timelocked upgrade governor.
//!
//! Operations are identified by a blake3 hash of their content and move
//! `Unset -> Pending -> Ready -> Done`, or to `Cancelled` from Pending/Ready.
//! Signer mechanics sit behind `Authorizer`.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use bytemuck::Zeroable;
use solana_program::{msg, pubkey::Pubkey};

use crate::error::FarmError;
use crate::event::{Event, EventLog};
use crate::state::{
    ProposalRecord, PROPOSAL_CANCELLED, PROPOSAL_EXECUTED, PROPOSAL_SCHEDULED,
};

/// Predecessor value meaning "no dependency".
pub const NO_PREDECESSOR: [u8; 32] = [0u8; 32];

/// A call the governor can schedule: `data` is an encoded `Instruction`
/// dispatched to `target` with the governor as caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub target: Pubkey,
    /// Native coin forwarded from the governor to `target`
    pub value: u64,
    pub data: Vec<u8>,
    pub predecessor: [u8; 32],
    pub salt: [u8; 32],
}

impl Operation {
    pub fn new(target: Pubkey, data: Vec<u8>) -> Self {
        Self {
            target,
            value: 0,
            data,
            predecessor: NO_PREDECESSOR,
            salt: [0u8; 32],
        }
    }

    pub fn with_salt(mut self, salt: [u8; 32]) -> Self {
        self.salt = salt;
        self
    }

    pub fn with_predecessor(mut self, predecessor: [u8; 32]) -> Self {
        self.predecessor = predecessor;
        self
    }

    pub fn with_value(mut self, value: u64) -> Self {
        self.value = value;
        self
    }

    /// Content hash. `data` is length-prefixed so no two field splits collide.
    pub fn id(&self) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.target.as_ref());
        hasher.update(&self.value.to_le_bytes());
        hasher.update(&(self.data.len() as u64).to_le_bytes());
        hasher.update(&self.data);
        hasher.update(&self.predecessor);
        hasher.update(&self.salt);
        *hasher.finalize().as_bytes()
    }
}

/// Decides whether a set of approvals is enough to act.
pub trait Authorizer: std::fmt::Debug {
    fn authorize(&self, approvals: &[Pubkey]) -> bool;
}

/// `threshold` distinct members of `signers` must approve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuorumAuthorizer {
    signers: BTreeSet<Pubkey>,
    threshold: usize,
}

impl QuorumAuthorizer {
    pub fn new(
        signers: impl IntoIterator<Item = Pubkey>,
        threshold: usize,
    ) -> Result<Self, FarmError> {
        let signers: BTreeSet<Pubkey> = signers.into_iter().collect();
        if threshold == 0 || threshold > signers.len() {
            return Err(FarmError::InvalidConfig);
        }
        Ok(Self { signers, threshold })
    }
}

impl Authorizer for QuorumAuthorizer {
    fn authorize(&self, approvals: &[Pubkey]) -> bool {
        let approved: BTreeSet<&Pubkey> = approvals
            .iter()
            .filter(|a| self.signers.contains(*a))
            .collect();
        approved.len() >= self.threshold
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    Unset,
    Pending,
    Ready,
    Done,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct UpgradeGovernor {
    address: Pubkey,
    min_delay: i64,
    authorizer: Arc<dyn Authorizer>,
    operations: BTreeMap<[u8; 32], ProposalRecord>,
}

impl UpgradeGovernor {
    pub fn new(address: Pubkey, min_delay: i64, authorizer: Arc<dyn Authorizer>) -> Self {
        Self {
            address,
            min_delay,
            authorizer,
            operations: BTreeMap::new(),
        }
    }

    pub fn address(&self) -> Pubkey {
        self.address
    }

    pub fn min_delay(&self) -> i64 {
        self.min_delay
    }

    pub fn record(&self, id: &[u8; 32]) -> Option<&ProposalRecord> {
        self.operations.get(id)
    }

    pub fn operation_state(&self, id: &[u8; 32], now: i64) -> OperationState {
        match self.operations.get(id) {
            None => OperationState::Unset,
            Some(r) if r.status == PROPOSAL_EXECUTED => OperationState::Done,
            Some(r) if r.status == PROPOSAL_CANCELLED => OperationState::Cancelled,
            Some(r) if now >= r.eta => OperationState::Ready,
            Some(_) => OperationState::Pending,
        }
    }

    pub fn is_done(&self, id: &[u8; 32]) -> bool {
        self.operations
            .get(id)
            .map_or(false, |r| r.status == PROPOSAL_EXECUTED)
    }

    fn check_quorum(&self, approvals: &[Pubkey]) -> Result<(), FarmError> {
        if !self.authorizer.authorize(approvals) {
            msg!("Error: governor quorum not reached ({} approvals)", approvals.len());
            return Err(FarmError::Unauthorized);
        }
        Ok(())
    }

    pub fn schedule(
        &mut self,
        approvals: &[Pubkey],
        op: &Operation,
        delay: i64,
        now: i64,
        events: &mut EventLog,
    ) -> Result<[u8; 32], FarmError> {
        self.check_quorum(approvals)?;
        if delay < self.min_delay {
            return Err(FarmError::InsufficientDelay);
        }
        let id = op.id();
        if let Some(existing) = self.operations.get(&id) {
            return Err(if existing.status == PROPOSAL_EXECUTED {
                FarmError::OperationAlreadyExecuted
            } else {
                FarmError::OperationAlreadyScheduled
            });
        }
        let eta = now.checked_add(delay).ok_or(FarmError::Overflow)?;

        let mut record = ProposalRecord::zeroed();
        record.status = PROPOSAL_SCHEDULED;
        record.id = id;
        record.target = op.target.to_bytes();
        record.predecessor = op.predecessor;
        record.value = op.value;
        record.eta = eta;
        record.scheduled_at = now;
        self.operations.insert(id, record);

        events.emit(Event::ProposalScheduled { id, eta });
        msg!("Operation scheduled for {} at {}", op.target, eta);
        Ok(id)
    }

    pub fn cancel(
        &mut self,
        approvals: &[Pubkey],
        id: &[u8; 32],
        now: i64,
        events: &mut EventLog,
    ) -> Result<(), FarmError> {
        self.check_quorum(approvals)?;
        let record = self
            .operations
            .get_mut(id)
            .ok_or(FarmError::OperationNotFound)?;
        match record.status {
            PROPOSAL_EXECUTED => return Err(FarmError::OperationAlreadyExecuted),
            PROPOSAL_CANCELLED => return Err(FarmError::OperationCancelled),
            _ => {}
        }
        record.status = PROPOSAL_CANCELLED;
        record.closed_at = now;

        events.emit(Event::ProposalCancelled { id: *id });
        msg!("Operation cancelled");
        Ok(())
    }

    /// Check that `op` may run now. The caller performs the call and then
    /// reports back through `complete_execution`.
    pub fn begin_execution(
        &self,
        approvals: &[Pubkey],
        op: &Operation,
        now: i64,
    ) -> Result<[u8; 32], FarmError> {
        self.check_quorum(approvals)?;
        let id = op.id();
        let record = self.operations.get(&id).ok_or(FarmError::OperationNotFound)?;
        match record.status {
            PROPOSAL_EXECUTED => return Err(FarmError::OperationAlreadyExecuted),
            PROPOSAL_CANCELLED => return Err(FarmError::OperationCancelled),
            _ => {}
        }
        if now < record.eta {
            msg!("Error: operation ready at {}, now {}", record.eta, now);
            return Err(FarmError::OperationNotReady);
        }
        if op.predecessor != NO_PREDECESSOR && !self.is_done(&op.predecessor) {
            return Err(FarmError::MissingDependency);
        }
        Ok(id)
    }

    pub fn complete_execution(
        &mut self,
        id: &[u8; 32],
        now: i64,
        events: &mut EventLog,
    ) -> Result<(), FarmError> {
        let record = self
            .operations
            .get_mut(id)
            .ok_or(FarmError::OperationNotFound)?;
        if record.status != PROPOSAL_SCHEDULED {
            return Err(FarmError::OperationAlreadyExecuted);
        }
        record.status = PROPOSAL_EXECUTED;
        record.closed_at = now;

        events.emit(Event::ProposalExecuted { id: *id });
        msg!("Operation executed against {}", record.target_pubkey());
        Ok(())
    }

    /// Only reachable through one of the governor's own operations.
    pub fn update_min_delay(
        &mut self,
        caller: &Pubkey,
        delay: i64,
        events: &mut EventLog,
    ) -> Result<(), FarmError> {
        if *caller != self.address {
            return Err(FarmError::Unauthorized);
        }
        if delay < 0 {
            return Err(FarmError::InvalidConfig);
        }
        let old = self.min_delay;
        self.min_delay = delay;
        events.emit(Event::MinDelayUpdated { old, new: delay });
        msg!("Governor min delay {} -> {}", old, delay);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn governor(signers: &[Pubkey], threshold: usize) -> UpgradeGovernor {
        let auth = QuorumAuthorizer::new(signers.iter().copied(), threshold).unwrap();
        UpgradeGovernor::new(Pubkey::new_unique(), 100, Arc::new(auth))
    }

    #[test]
    fn test_id_depends_on_every_field() {
        let base = Operation::new(Pubkey::new_unique(), vec![1, 2, 3]);
        let ids = [
            base.id(),
            base.clone().with_value(1).id(),
            base.clone().with_salt([1; 32]).id(),
            base.clone().with_predecessor([2; 32]).id(),
            Operation { data: vec![1, 2], ..base.clone() }.id(),
        ];
        for i in 0..ids.len() {
            for j in i + 1..ids.len() {
                assert_ne!(ids[i], ids[j]);
            }
        }
        assert_eq!(base.id(), base.clone().id());
    }

    #[test]
    fn test_quorum_counts_distinct_members() {
        let signers = [Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique()];
        let auth = QuorumAuthorizer::new(signers, 2).unwrap();
        assert!(!auth.authorize(&[signers[0], signers[0]]));
        assert!(!auth.authorize(&[signers[0], Pubkey::new_unique()]));
        assert!(auth.authorize(&[signers[0], signers[2]]));
        assert_eq!(
            QuorumAuthorizer::new(signers, 4).unwrap_err(),
            FarmError::InvalidConfig
        );
    }

    #[test]
    fn test_state_machine() {
        let signers = [Pubkey::new_unique()];
        let mut gov = governor(&signers, 1);
        let mut events = EventLog::default();
        let op = Operation::new(Pubkey::new_unique(), vec![]);
        let id = op.id();

        assert_eq!(gov.operation_state(&id, 0), OperationState::Unset);
        gov.schedule(&signers, &op, 100, 1_000, &mut events).unwrap();
        assert_eq!(gov.operation_state(&id, 1_099), OperationState::Pending);
        assert_eq!(gov.operation_state(&id, 1_100), OperationState::Ready);

        assert_eq!(
            gov.begin_execution(&signers, &op, 1_099),
            Err(FarmError::OperationNotReady)
        );
        gov.begin_execution(&signers, &op, 1_100).unwrap();
        gov.complete_execution(&id, 1_100, &mut events).unwrap();
        assert_eq!(gov.operation_state(&id, 2_000), OperationState::Done);
        assert_eq!(
            gov.begin_execution(&signers, &op, 2_000),
            Err(FarmError::OperationAlreadyExecuted)
        );
        assert_eq!(
            gov.schedule(&signers, &op, 100, 2_000, &mut events),
            Err(FarmError::OperationAlreadyExecuted)
        );
    }

    #[test]
    fn test_short_delay_and_missing_quorum() {
        let signers = [Pubkey::new_unique(), Pubkey::new_unique()];
        let mut gov = governor(&signers, 2);
        let mut events = EventLog::default();
        let op = Operation::new(Pubkey::new_unique(), vec![]);

        assert_eq!(
            gov.schedule(&signers[..1], &op, 100, 0, &mut events),
            Err(FarmError::Unauthorized)
        );
        assert_eq!(
            gov.schedule(&signers, &op, 99, 0, &mut events),
            Err(FarmError::InsufficientDelay)
        );
        assert!(events.is_empty());
    }

    #[test]
    fn test_cancel_is_terminal() {
        let signers = [Pubkey::new_unique()];
        let mut gov = governor(&signers, 1);
        let mut events = EventLog::default();
        let op = Operation::new(Pubkey::new_unique(), vec![7]);
        let id = gov.schedule(&signers, &op, 100, 0, &mut events).unwrap();

        gov.cancel(&signers, &id, 10, &mut events).unwrap();
        assert_eq!(gov.operation_state(&id, 500), OperationState::Cancelled);
        assert_eq!(
            gov.begin_execution(&signers, &op, 500),
            Err(FarmError::OperationCancelled)
        );
        assert_eq!(
            gov.schedule(&signers, &op, 100, 500, &mut events),
            Err(FarmError::OperationAlreadyScheduled)
        );
        assert_eq!(
            gov.cancel(&signers, &id, 500, &mut events),
            Err(FarmError::OperationCancelled)
        );
    }

    #[test]
    fn test_predecessor_must_be_done() {
        let signers = [Pubkey::new_unique()];
        let mut gov = governor(&signers, 1);
        let mut events = EventLog::default();
        let first = Operation::new(Pubkey::new_unique(), vec![1]);
        let first_id = gov.schedule(&signers, &first, 100, 0, &mut events).unwrap();
        let second = Operation::new(Pubkey::new_unique(), vec![2]).with_predecessor(first_id);
        gov.schedule(&signers, &second, 100, 0, &mut events).unwrap();

        assert_eq!(
            gov.begin_execution(&signers, &second, 100),
            Err(FarmError::MissingDependency)
        );
        gov.complete_execution(&first_id, 100, &mut events).unwrap();
        assert!(gov.begin_execution(&signers, &second, 100).is_ok());
    }

    #[test]
    fn test_min_delay_self_call_only() {
        let signers = [Pubkey::new_unique()];
        let mut gov = governor(&signers, 1);
        let mut events = EventLog::default();
        let me = gov.address();

        assert_eq!(
            gov.update_min_delay(&signers[0], 10, &mut events),
            Err(FarmError::Unauthorized)
        );
        gov.update_min_delay(&me, 10, &mut events).unwrap();
        assert_eq!(gov.min_delay(), 10);
    }
}
