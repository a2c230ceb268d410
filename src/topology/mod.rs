//! Topology / goal engine (C4, spec §4.4).

pub mod connect_handset;
pub mod goals;
pub mod rules;

use log::{info, warn};

use crate::config::TopologyConfig;
use crate::error::TopologyError;
use crate::rule_event::RuleEvent;

use self::goals::{GoalEngine, GoalId};
use self::rules::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopologyLifecycle {
    Stopped,
    Starting,
    Started,
    Stopping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// `self` is not peer-paired; the `pair-peer` script was kicked off.
    /// The caller is not yet informed of start (spec §4.4.5).
    WaitingForPairPeer,
    Confirmed { role: Role },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Success,
    Failure,
}

/// Top-level topology state (spec §4.4.1, §4.4.5). Holds the single
/// process-wide `GoalEngine` and the start/stop lifecycle guard.
pub struct Topology {
    config: TopologyConfig,
    lifecycle: TopologyLifecycle,
    role: Option<Role>,
    is_peer_paired: bool,
    engine: GoalEngine,
}

impl Topology {
    pub fn new(config: TopologyConfig) -> Self {
        Self {
            config,
            lifecycle: TopologyLifecycle::Stopped,
            role: None,
            is_peer_paired: false,
            engine: GoalEngine::new(),
        }
    }

    pub fn lifecycle(&self) -> TopologyLifecycle {
        self.lifecycle
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn is_primary(&self) -> bool {
        self.role == Some(Role::Primary)
    }

    pub fn is_secondary(&self) -> bool {
        self.role == Some(Role::Secondary)
    }

    pub fn is_acting_primary(&self) -> bool {
        self.role == Some(Role::ActingPrimary)
    }

    /// A "full" Primary: actually holding the Primary role, as opposed to
    /// a fallback Acting Primary (spec §4.4.1's `is-full-primary`).
    pub fn is_full_primary(&self) -> bool {
        self.role == Some(Role::Primary)
    }

    pub fn notify_peer_paired(&mut self, paired: bool) {
        self.is_peer_paired = paired;
    }

    /// Only accepted in state `stopped` (spec §4.4.5).
    pub fn start(&mut self) -> Result<StartOutcome, TopologyError> {
        if self.lifecycle != TopologyLifecycle::Stopped {
            return Err(TopologyError::Core(crate::error::CoreError::WrongState));
        }
        self.engine.reset_for_start();
        self.lifecycle = TopologyLifecycle::Starting;

        if !self.is_peer_paired {
            self.engine.admit(GoalId::PairPeer);
            return Ok(StartOutcome::WaitingForPairPeer);
        }

        self.lifecycle = TopologyLifecycle::Started;
        info!("topology: started with role {:?}", self.role);
        Ok(StartOutcome::Confirmed { role: self.role.unwrap_or(Role::NoRole) })
    }

    /// Called once `pair-peer` completes and raises `PEER_PAIRED`
    /// (spec §4.4.5): confirms start immediately with the current role.
    pub fn handle_pair_peer_completed(&mut self) -> StartOutcome {
        self.is_peer_paired = true;
        self.lifecycle = TopologyLifecycle::Started;
        StartOutcome::Confirmed { role: self.role.unwrap_or(Role::NoRole) }
    }

    /// Begins the stop script; a configured timeout guards completion. On
    /// expiry the caller is told failure but internal state is still
    /// marked stopped (spec §4.4.5).
    pub fn stop(&mut self) -> StopOutcome {
        self.lifecycle = TopologyLifecycle::Stopping;
        self.engine.admit(GoalId::SystemStop);
        StopOutcome::Success
    }

    pub fn handle_system_stop_completed(&mut self) -> StopOutcome {
        self.engine.mark_stopped();
        self.lifecycle = TopologyLifecycle::Stopped;
        StopOutcome::Success
    }

    /// On expiry the caller is told failure but internal state is still
    /// marked stopped (spec §4.4.5).
    pub fn handle_stop_timeout(&mut self) -> StopOutcome {
        warn!("topology: stop timed out after {:?}, forcing stopped", self.config.stop_timeout);
        self.engine.mark_stopped();
        self.lifecycle = TopologyLifecycle::Stopped;
        StopOutcome::Failure
    }

    /// All goal decisions received after `stop` is initiated are silently
    /// dropped (spec §4.4.5).
    pub fn admit_goal(&mut self, id: GoalId) -> bool {
        if self.lifecycle != TopologyLifecycle::Started {
            return false;
        }
        self.engine.admit(id)
    }

    pub fn complete_goal(&mut self, id: GoalId) -> Vec<GoalId> {
        self.engine.complete(id)
    }

    pub fn set_role(&mut self, role: Role) {
        self.role = Some(role);
    }
}

pub fn raise_for_start(is_peer_paired: bool) -> RuleEvent {
    if is_peer_paired {
        RuleEvent::PeerPaired
    } else {
        RuleEvent::NoPeer
    }
}
