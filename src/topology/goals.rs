//! Goal engine (C4, spec §4.4.3).
//!
//! Concurrency/exclusivity between goals is a static relation over goal
//! ids; precomputed as bitsets per goal for O(1) admission checks
//! (spec §9), the same way `rule_event`'s `RuleEventSet` precomputes a
//! mask rather than walking a list.

use enumflags2::{bitflags, BitFlags};

use crate::rule_event::RuleEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GoalId {
    PairPeer,
    FindRole,
    SecondaryConnectPeer,
    PrimaryConnectablePeer,
    PrimaryConnectPeerProfiles,
    PrimaryDisconnectPeerProfiles,
    NoRoleIdle,
    ConnectHandset,
    DisconnectHandset,
    ConnectableHandset,
    LeConnectableHandset,
    BecomePrimary,
    BecomeSecondary,
    BecomeActingPrimary,
    RoleSwitchToSecondary,
    NoRoleFindRole,
    CancelFindRole,
    ReleasePeer,
    DynamicHandover,
    SystemStop,
    AllowHandsetConnect,
    DisconnectLruHandset,
}

#[bitflags]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GoalBit {
    PairPeer = 1 << 0,
    FindRole = 1 << 1,
    SecondaryConnectPeer = 1 << 2,
    PrimaryConnectablePeer = 1 << 3,
    PrimaryConnectPeerProfiles = 1 << 4,
    PrimaryDisconnectPeerProfiles = 1 << 5,
    NoRoleIdle = 1 << 6,
    ConnectHandset = 1 << 7,
    DisconnectHandset = 1 << 8,
    ConnectableHandset = 1 << 9,
    LeConnectableHandset = 1 << 10,
    BecomePrimary = 1 << 11,
    BecomeSecondary = 1 << 12,
    BecomeActingPrimary = 1 << 13,
    RoleSwitchToSecondary = 1 << 14,
    NoRoleFindRole = 1 << 15,
    CancelFindRole = 1 << 16,
    ReleasePeer = 1 << 17,
    DynamicHandover = 1 << 18,
    SystemStop = 1 << 19,
    AllowHandsetConnect = 1 << 20,
    DisconnectLruHandset = 1 << 21,
}

fn bit_for(id: GoalId) -> GoalBit {
    match id {
        GoalId::PairPeer => GoalBit::PairPeer,
        GoalId::FindRole => GoalBit::FindRole,
        GoalId::SecondaryConnectPeer => GoalBit::SecondaryConnectPeer,
        GoalId::PrimaryConnectablePeer => GoalBit::PrimaryConnectablePeer,
        GoalId::PrimaryConnectPeerProfiles => GoalBit::PrimaryConnectPeerProfiles,
        GoalId::PrimaryDisconnectPeerProfiles => GoalBit::PrimaryDisconnectPeerProfiles,
        GoalId::NoRoleIdle => GoalBit::NoRoleIdle,
        GoalId::ConnectHandset => GoalBit::ConnectHandset,
        GoalId::DisconnectHandset => GoalBit::DisconnectHandset,
        GoalId::ConnectableHandset => GoalBit::ConnectableHandset,
        GoalId::LeConnectableHandset => GoalBit::LeConnectableHandset,
        GoalId::BecomePrimary => GoalBit::BecomePrimary,
        GoalId::BecomeSecondary => GoalBit::BecomeSecondary,
        GoalId::BecomeActingPrimary => GoalBit::BecomeActingPrimary,
        GoalId::RoleSwitchToSecondary => GoalBit::RoleSwitchToSecondary,
        GoalId::NoRoleFindRole => GoalBit::NoRoleFindRole,
        GoalId::CancelFindRole => GoalBit::CancelFindRole,
        GoalId::ReleasePeer => GoalBit::ReleasePeer,
        GoalId::DynamicHandover => GoalBit::DynamicHandover,
        GoalId::SystemStop => GoalBit::SystemStop,
        GoalId::AllowHandsetConnect => GoalBit::AllowHandsetConnect,
        GoalId::DisconnectLruHandset => GoalBit::DisconnectLruHandset,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentionPolicy {
    CancelOthers,
    ConcurrentWithSet,
    Wait,
}

#[derive(Debug, Clone, Copy)]
pub struct Goal {
    pub id: GoalId,
    pub exclusive_goal_id: Option<GoalId>,
    pub contention_policy: ContentionPolicy,
    pub success_event: Option<RuleEvent>,
    pub failure_event: Option<RuleEvent>,
    pub timeout_event: Option<RuleEvent>,
    /// Precomputed: goal ids this one may run concurrently with
    /// (spec §4.4.3, §9).
    concurrent_with: BitFlags<GoalBit>,
}

impl Goal {
    pub fn new(id: GoalId, contention_policy: ContentionPolicy) -> Self {
        Self {
            id,
            exclusive_goal_id: None,
            contention_policy,
            success_event: None,
            failure_event: None,
            timeout_event: None,
            concurrent_with: BitFlags::empty(),
        }
    }

    pub fn exclusive_with(mut self, other: GoalId) -> Self {
        self.exclusive_goal_id = Some(other);
        self
    }

    pub fn events(mut self, success: Option<RuleEvent>, failure: Option<RuleEvent>, timeout: Option<RuleEvent>) -> Self {
        self.success_event = success;
        self.failure_event = failure;
        self.timeout_event = timeout;
        self
    }

    pub fn concurrent_with(mut self, others: &[GoalId]) -> Self {
        for &o in others {
            self.concurrent_with |= bit_for(o);
        }
        self
    }

    fn may_run_concurrently_with(&self, other: GoalId) -> bool {
        self.concurrent_with.contains(bit_for(other))
    }
}

/// Representative goal catalogue (spec §4.4.3). `dynamic_handover` is
/// exclusive with both role-switch goals since a handover in flight
/// and a separately-triggered role switch would race the same link.
pub fn goal_catalogue() -> Vec<Goal> {
    vec![
        Goal::new(GoalId::PairPeer, ContentionPolicy::Wait),
        Goal::new(GoalId::FindRole, ContentionPolicy::CancelOthers),
        Goal::new(GoalId::SecondaryConnectPeer, ContentionPolicy::Wait)
            .events(None, Some(RuleEvent::FailedPeerConnect), None),
        Goal::new(GoalId::PrimaryConnectablePeer, ContentionPolicy::ConcurrentWithSet)
            .concurrent_with(&[GoalId::ConnectHandset, GoalId::ConnectableHandset]),
        Goal::new(GoalId::PrimaryConnectPeerProfiles, ContentionPolicy::Wait),
        Goal::new(GoalId::PrimaryDisconnectPeerProfiles, ContentionPolicy::Wait)
            .exclusive_with(GoalId::PrimaryConnectPeerProfiles),
        Goal::new(GoalId::NoRoleIdle, ContentionPolicy::Wait).events(Some(RuleEvent::NoRole), None, None),
        Goal::new(GoalId::ConnectHandset, ContentionPolicy::ConcurrentWithSet)
            .concurrent_with(&[GoalId::PrimaryConnectablePeer]),
        Goal::new(GoalId::DisconnectHandset, ContentionPolicy::Wait).exclusive_with(GoalId::ConnectHandset),
        Goal::new(GoalId::ConnectableHandset, ContentionPolicy::ConcurrentWithSet)
            .concurrent_with(&[GoalId::PrimaryConnectablePeer]),
        Goal::new(GoalId::LeConnectableHandset, ContentionPolicy::ConcurrentWithSet),
        Goal::new(GoalId::BecomePrimary, ContentionPolicy::CancelOthers)
            .events(Some(RuleEvent::RoleSwitch), None, None),
        Goal::new(GoalId::BecomeSecondary, ContentionPolicy::CancelOthers)
            .events(Some(RuleEvent::RoleSwitch), None, None),
        Goal::new(GoalId::BecomeActingPrimary, ContentionPolicy::CancelOthers)
            .events(Some(RuleEvent::RoleSwitch), None, None),
        Goal::new(GoalId::RoleSwitchToSecondary, ContentionPolicy::CancelOthers),
        Goal::new(GoalId::NoRoleFindRole, ContentionPolicy::Wait),
        Goal::new(GoalId::CancelFindRole, ContentionPolicy::CancelOthers).exclusive_with(GoalId::FindRole),
        Goal::new(GoalId::ReleasePeer, ContentionPolicy::Wait),
        Goal::new(GoalId::DynamicHandover, ContentionPolicy::Wait)
            .exclusive_with(GoalId::BecomePrimary)
            .events(Some(RuleEvent::RoleSwitch), Some(RuleEvent::HandoverFailed), None),
        Goal::new(GoalId::SystemStop, ContentionPolicy::CancelOthers),
        Goal::new(GoalId::AllowHandsetConnect, ContentionPolicy::ConcurrentWithSet),
        Goal::new(GoalId::DisconnectLruHandset, ContentionPolicy::Wait),
    ]
}

/// Maintains the active set and pending queue (spec §4.4.3); a new
/// decision is queued only if its exclusive or non-concurrent partner is
/// active.
pub struct GoalEngine {
    catalogue: Vec<Goal>,
    active: Vec<GoalId>,
    pending: Vec<GoalId>,
    stopped: bool,
}

impl GoalEngine {
    pub fn new() -> Self {
        Self { catalogue: goal_catalogue(), active: Vec::new(), pending: Vec::new(), stopped: false }
    }

    pub fn active(&self) -> &[GoalId] {
        &self.active
    }

    pub fn pending(&self) -> &[GoalId] {
        &self.pending
    }

    fn goal(&self, id: GoalId) -> &Goal {
        self.catalogue.iter().find(|g| g.id == id).expect("goal id not in catalogue")
    }

    /// All goals received after `stop` is initiated are silently dropped
    /// (spec §4.4.5).
    pub fn mark_stopped(&mut self) {
        self.stopped = true;
        self.active.clear();
        self.pending.clear();
    }

    pub fn reset_for_start(&mut self) {
        self.stopped = false;
    }

    fn conflicts_with_active(&self, goal: &Goal) -> bool {
        self.active.iter().any(|&active_id| {
            if Some(active_id) == goal.exclusive_goal_id {
                return true;
            }
            let active_goal = self.goal(active_id);
            if active_goal.exclusive_goal_id == Some(goal.id) {
                return true;
            }
            !goal.may_run_concurrently_with(active_id) && !active_goal.may_run_concurrently_with(goal.id)
        })
    }

    /// Admits a rule decision's goal: runs immediately if nothing
    /// conflicting is active, otherwise queues it (spec §4.4.3).
    pub fn admit(&mut self, id: GoalId) -> bool {
        if self.stopped {
            return false;
        }
        let goal = *self.goal(id);
        if self.conflicts_with_active(&goal) {
            if !self.pending.contains(&id) {
                self.pending.push(id);
            }
            false
        } else {
            self.active.retain(|&a| a != id);
            self.active.push(id);
            true
        }
    }

    /// Called when an active goal completes; releases any pending goal
    /// whose conflicts have cleared.
    pub fn complete(&mut self, id: GoalId) -> Vec<GoalId> {
        self.active.retain(|&a| a != id);
        if self.stopped {
            return Vec::new();
        }
        let mut released = Vec::new();
        let pending = std::mem::take(&mut self.pending);
        for pending_id in pending {
            if self.admit(pending_id) {
                released.push(pending_id);
            } else {
                self.pending.push(pending_id);
            }
        }
        released
    }
}

impl Default for GoalEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_conflicting_goal_runs_immediately() {
        let mut engine = GoalEngine::new();
        assert!(engine.admit(GoalId::PairPeer));
        assert_eq!(engine.active(), &[GoalId::PairPeer]);
    }

    #[test]
    fn exclusive_goal_is_queued_while_partner_active() {
        let mut engine = GoalEngine::new();
        engine.admit(GoalId::PrimaryConnectPeerProfiles);
        let admitted = engine.admit(GoalId::PrimaryDisconnectPeerProfiles);
        assert!(!admitted);
        assert_eq!(engine.pending(), &[GoalId::PrimaryDisconnectPeerProfiles]);
    }

    #[test]
    fn completing_active_goal_releases_pending_exclusive_partner() {
        let mut engine = GoalEngine::new();
        engine.admit(GoalId::PrimaryConnectPeerProfiles);
        engine.admit(GoalId::PrimaryDisconnectPeerProfiles);
        let released = engine.complete(GoalId::PrimaryConnectPeerProfiles);
        assert_eq!(released, vec![GoalId::PrimaryDisconnectPeerProfiles]);
        assert_eq!(engine.active(), &[GoalId::PrimaryDisconnectPeerProfiles]);
    }

    #[test]
    fn concurrent_goals_both_run() {
        let mut engine = GoalEngine::new();
        engine.admit(GoalId::PrimaryConnectablePeer);
        assert!(engine.admit(GoalId::ConnectHandset));
        assert_eq!(engine.active().len(), 2);
    }

    #[test]
    fn stopped_engine_drops_all_goal_decisions() {
        let mut engine = GoalEngine::new();
        engine.mark_stopped();
        assert!(!engine.admit(GoalId::PairPeer));
        assert!(engine.active().is_empty());
        assert!(engine.pending().is_empty());
    }
}
