//! Peer-mode link-policy sub-SM (C1, spec §4.1).
//!
//! A small cycle between `active` and `sniff`, with the two transitional
//! states holding a lock that defers any newly committed target until the
//! controller confirms the link-policy change. Modeled as a tagged enum
//! with a discriminant-only state (no payload carried in the variant) plus
//! a side struct of deferred/retry bookkeeping, the same split the teacher
//! uses between `dds::statusevents`' status-kind enum and its change-log
//! side table.

use std::time::Duration;

use log::{debug, trace, warn};

use crate::config::PeerModeConfig;
use crate::device::BdAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPolicyState {
    Disconnected,
    Active,
    EnterSniff,
    Sniff,
    ExitSniff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPolicyTarget {
    Active,
    Sniff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkMode {
    Active,
    Sniff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleStatus {
    Success,
    Failure,
}

/// Effects the sub-SM asks its caller to perform; kept as a plain data
/// return (rather than a callback trait) since every effect here is a
/// single fire-and-forget controller primitive or timer arm/cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPolicyEffect {
    RequestLinkPolicy(LinkMode),
    ArmActivePeriodTimer(Duration),
    CancelActivePeriodTimer,
    ArmRoleRetryTimer(Duration),
    None,
}

/// Whether `set-target` reached the requested state synchronously, or was
/// deferred behind the transition lock (spec §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetTargetOutcome {
    ReachedImmediately,
    Deferred,
}

/// Whether the mirror-profile main SM is currently in a transitional
/// sub-step; `enter-sniff` may only be entered from `active` once it is not
/// (spec §4.1's "not engaged in a transitional sub-step" precondition).
pub trait MirrorTransitionGate {
    fn is_acl_connected_steady(&self) -> bool;
}

pub struct PeerLinkPolicy {
    peer_addr: BdAddr,
    config: PeerModeConfig,
    state: LinkPolicyState,
    target: Option<LinkPolicyTarget>,
    /// `set-target` calls received while the lock is held, to replay once
    /// the current transition settles.
    deferred_target: Option<LinkPolicyTarget>,
    link_policy_initialised: bool,
}

impl PeerLinkPolicy {
    pub fn new(peer_addr: BdAddr, config: PeerModeConfig) -> Self {
        Self {
            peer_addr,
            config,
            state: LinkPolicyState::Disconnected,
            target: None,
            deferred_target: None,
            link_policy_initialised: false,
        }
    }

    pub fn state(&self) -> LinkPolicyState {
        self.state
    }

    pub fn is_locked(&self) -> bool {
        matches!(self.state, LinkPolicyState::EnterSniff | LinkPolicyState::ExitSniff)
    }

    /// Sets the ambition and kicks the SM (spec §4.1). Returns whether the
    /// target was reached synchronously, or deferred behind the lock.
    pub fn set_target(
        &mut self,
        target: LinkPolicyTarget,
        gate: &impl MirrorTransitionGate,
    ) -> (SetTargetOutcome, Option<LinkPolicyEffect>) {
        self.target = Some(target);

        if self.is_locked() {
            self.deferred_target = Some(target);
            trace!("peer {:?}: set-target({:?}) deferred behind lock", self.peer_addr, target);
            return (SetTargetOutcome::Deferred, None);
        }

        match (self.state, target) {
            (LinkPolicyState::Active, LinkPolicyTarget::Sniff) if gate.is_acl_connected_steady() => {
                self.state = LinkPolicyState::EnterSniff;
                (SetTargetOutcome::Deferred, Some(LinkPolicyEffect::RequestLinkPolicy(LinkMode::Sniff)))
            }
            (LinkPolicyState::Sniff, LinkPolicyTarget::Active) => {
                self.state = LinkPolicyState::ExitSniff;
                (SetTargetOutcome::Deferred, Some(LinkPolicyEffect::RequestLinkPolicy(LinkMode::Active)))
            }
            (LinkPolicyState::Active, LinkPolicyTarget::Active)
            | (LinkPolicyState::Sniff, LinkPolicyTarget::Sniff) => {
                (SetTargetOutcome::ReachedImmediately, None)
            }
            (LinkPolicyState::Disconnected, _) => (SetTargetOutcome::Deferred, None),
            _ => (SetTargetOutcome::Deferred, None),
        }
    }

    /// Forces `active` for a window; a deferred message returns to `sniff`
    /// when the timer elapses unless superseded (spec §4.1).
    pub fn active_period(
        &mut self,
        duration: Option<Duration>,
        gate: &impl MirrorTransitionGate,
    ) -> Vec<LinkPolicyEffect> {
        let window = duration.unwrap_or(self.config.default_active_period);
        let mut effects = Vec::new();
        let (_, effect) = self.set_target(LinkPolicyTarget::Active, gate);
        effects.extend(effect);
        effects.push(LinkPolicyEffect::ArmActivePeriodTimer(window));
        effects
    }

    /// Timer callback for the active-period window: reverts to sniff unless
    /// a later `set-target(active)` has already superseded it.
    pub fn active_period_elapsed(&mut self, gate: &impl MirrorTransitionGate) -> Option<LinkPolicyEffect> {
        if self.target != Some(LinkPolicyTarget::Active) {
            return None;
        }
        let (_, effect) = self.set_target(LinkPolicyTarget::Sniff, gate);
        effect
    }

    pub fn handle_connect_ind(&mut self, addr: BdAddr) {
        if addr != self.peer_addr {
            return;
        }
        self.state = LinkPolicyState::Active;
        self.target = Some(LinkPolicyTarget::Active);
        debug!("peer {:?}: link connected, link-policy active", addr);
    }

    /// On disconnect, all state is reset, link-policy-initialised flag
    /// cleared, pending enter-sniff timer cancelled (spec §4.1).
    pub fn handle_disconnect_ind(&mut self, addr: BdAddr) -> Option<LinkPolicyEffect> {
        if addr != self.peer_addr {
            return None;
        }
        self.state = LinkPolicyState::Disconnected;
        self.target = None;
        self.deferred_target = None;
        self.link_policy_initialised = false;
        Some(LinkPolicyEffect::CancelActivePeriodTimer)
    }

    pub fn handle_mode_change(&mut self, addr: BdAddr, mode: LinkMode) {
        if addr != self.peer_addr {
            return;
        }
        self.link_policy_initialised = true;
        trace!("peer {:?}: controller reports link mode {:?}", addr, mode);
    }

    /// On link-policy confirmation the SM advances to the matching steady
    /// state and releases the lock (spec §4.1). Failure requeues a retry
    /// timer.
    pub fn handle_role_cfm(
        &mut self,
        addr: BdAddr,
        status: RoleStatus,
        gate: &impl MirrorTransitionGate,
    ) -> Vec<LinkPolicyEffect> {
        if addr != self.peer_addr {
            return Vec::new();
        }

        let mut effects = Vec::new();
        match status {
            RoleStatus::Success => {
                self.state = match self.state {
                    LinkPolicyState::EnterSniff => LinkPolicyState::Sniff,
                    LinkPolicyState::ExitSniff => LinkPolicyState::Active,
                    other => other,
                };
                if let Some(deferred) = self.deferred_target.take() {
                    let (_, effect) = self.set_target(deferred, gate);
                    effects.extend(effect);
                }
            }
            RoleStatus::Failure => {
                warn!("peer {:?}: role-cfm failed in state {:?}, retrying", addr, self.state);
                effects.push(LinkPolicyEffect::ArmRoleRetryTimer(self.config.role_switch_retry_backoff));
            }
        }
        effects
    }

    pub fn handle_role_ind(&mut self, addr: BdAddr, mode: LinkMode, _status: RoleStatus) {
        if addr != self.peer_addr {
            return;
        }
        self.state = match mode {
            LinkMode::Active if self.is_locked() => self.state,
            LinkMode::Active => LinkPolicyState::Active,
            LinkMode::Sniff if self.is_locked() => self.state,
            LinkMode::Sniff => LinkPolicyState::Sniff,
        };
    }
}
