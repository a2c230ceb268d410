//! Topology rule sets (C4, spec §4.4.2).
//!
//! Rules are pure functions of the event mask plus a small world-state
//! snapshot, returning a `RuleDecision`. Modeled as free functions rather
//! than a trait-object table since each rule in the spec is a standalone
//! named predicate, not a family implementing shared behaviour - the
//! calling convention (`fn(&WorldState, RuleEventSet) -> RuleDecision`) is
//! the whole abstraction. The engine in `goals` looks rules up by an enum
//! discriminant rather than a string table, for the same reason the
//! teacher keys its status-change dispatch off an enum rather than a name.

use crate::rule_event::{RuleEvent, RuleEventSet};

use super::goals::GoalId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectReason {
    RoleSwitch,
    OutOfCase,
    Pairing,
    Linkloss,
    User,
    PostHandover,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleDecision {
    Run,
    RunWithParams(RuleParams),
    Ignore,
    Defer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleParams {
    ConnectHandsetProfiles { hfp: bool, a2dp: bool },
    InCaseWatchdogTimer { millis: u64 },
}

/// Which role a device currently holds (spec §3.1 `PeerLinkPolicyMode`
/// reuses `idle`; topology's own role vocabulary is distinct, spec §4.4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    NoRole,
    Primary,
    Secondary,
    ActingPrimary,
}

/// World-state snapshot rules read from (spec §4.4.2); never mutated by a
/// rule - rules are pure.
#[derive(Debug, Clone, Default)]
pub struct WorldState {
    pub role: Option<Role>,
    pub peer_connected: bool,
    pub handset_connected: bool,
    pub in_case: bool,
    pub just_went_in_case: bool,
    pub lid_open: Option<bool>,
    pub lid_events_enabled: bool,
    pub dfu_mode: bool,
    pub app_prohibit_handset_connect: bool,
    pub remain_active_for_peer: bool,
    pub another_ag_streaming: bool,
    pub previously_connected_profiles: ConnectReasonProfiles,
    pub active_goals: Vec<GoalId>,
    pub pending_goals: Vec<GoalId>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectReasonProfiles {
    pub hfp: bool,
    pub a2dp: bool,
}

impl WorldState {
    fn goal_active_or_queued(&self, id: GoalId) -> bool {
        self.active_goals.contains(&id) || self.pending_goals.contains(&id)
    }
}

/// `run` iff (not in case, or remain-active-for-peer set, or lid open) and
/// no `no-role-find-role` goal is active/queued (spec §4.4.2).
pub fn pri_peer_paired_out_case(world: &WorldState, events: RuleEventSet) -> RuleDecision {
    if !events.contains(RuleEvent::PeerPaired) {
        return RuleDecision::Ignore;
    }
    let case_ok = !world.in_case || world.remain_active_for_peer || world.lid_open == Some(true);
    if case_ok && !world.goal_active_or_queued(GoalId::NoRoleFindRole) {
        RuleDecision::Run
    } else {
        RuleDecision::Ignore
    }
}

/// `run` iff role==primary and no role-switch goal active and secondary is
/// not reachable and we did not just go in-case (unless remain-active-for-peer)
/// (spec §4.4.2).
pub fn pri_peer_lost_find_role(world: &WorldState, events: RuleEventSet) -> RuleDecision {
    if !(events.contains(RuleEvent::PeerLinkloss) || events.contains(RuleEvent::PeerDisconnectedBredr)) {
        return RuleDecision::Ignore;
    }
    let is_primary = world.role == Some(Role::Primary);
    let no_role_switch_active = !world.goal_active_or_queued(GoalId::BecomePrimary)
        && !world.goal_active_or_queued(GoalId::BecomeSecondary)
        && !world.goal_active_or_queued(GoalId::RoleSwitchToSecondary);
    let just_in_case_ok = !world.just_went_in_case || world.remain_active_for_peer;

    if is_primary && no_role_switch_active && !world.peer_connected && just_in_case_ok {
        RuleDecision::Run
    } else {
        RuleDecision::Ignore
    }
}

/// Parameterised by reason: for out-of-case/pairing always include
/// HFP+A2DP; otherwise restrict to previously-connected profiles; ignored
/// if app-prohibit is set or if linkloss and another AG is streaming
/// (spec §4.4.2).
pub fn pri_connect_handset(world: &WorldState, events: RuleEventSet, reason: ConnectReason) -> RuleDecision {
    let triggered = match reason {
        ConnectReason::RoleSwitch => events.contains(RuleEvent::RoleSwitch),
        ConnectReason::OutOfCase => events.contains(RuleEvent::OutCase),
        ConnectReason::Pairing => events.contains(RuleEvent::PeerPaired),
        ConnectReason::Linkloss => events.contains(RuleEvent::HandsetLinkloss),
        ConnectReason::User => events.contains(RuleEvent::UserRequestConnectHandset),
        ConnectReason::PostHandover => events.contains(RuleEvent::Handover),
    };
    if !triggered {
        return RuleDecision::Ignore;
    }

    if world.app_prohibit_handset_connect {
        return RuleDecision::Ignore;
    }
    if reason == ConnectReason::Linkloss && world.another_ag_streaming {
        return RuleDecision::Ignore;
    }

    let profiles = match reason {
        ConnectReason::OutOfCase | ConnectReason::Pairing => ConnectReasonProfiles { hfp: true, a2dp: true },
        _ => world.previously_connected_profiles,
    };

    RuleDecision::RunWithParams(RuleParams::ConnectHandsetProfiles { hfp: profiles.hfp, a2dp: profiles.a2dp })
}

/// `run` only if a handset is BR/EDR-connected (spec §4.4.2).
pub fn pri_disable_connectable_handset(world: &WorldState, events: RuleEventSet) -> RuleDecision {
    if !events.contains(RuleEvent::InCase) {
        return RuleDecision::Ignore;
    }
    if world.handset_connected {
        RuleDecision::Run
    } else {
        RuleDecision::Ignore
    }
}

/// `run` iff primary out-of-case (or remain-active set; lid not closed if
/// lid-events enabled) (spec §4.4.2).
pub fn pri_allow_handset_connect(world: &WorldState, events: RuleEventSet) -> RuleDecision {
    if !(events.contains(RuleEvent::OutCase) || events.contains(RuleEvent::CaseLidOpen)) {
        return RuleDecision::Ignore;
    }
    let lid_ok = !world.lid_events_enabled || world.lid_open != Some(false);
    if (!world.in_case || world.remain_active_for_peer) && lid_ok {
        RuleDecision::Run
    } else {
        RuleDecision::Ignore
    }
}

/// `run` with configured timer iff in case, lid closed or lid events
/// disabled, no peer-pairing active, and not in DFU (spec §4.4.2).
pub fn pri_in_case_watchdog_start(
    world: &WorldState,
    events: RuleEventSet,
    timer_millis: u64,
) -> RuleDecision {
    if !events.contains(RuleEvent::InCase) {
        return RuleDecision::Ignore;
    }
    let lid_ok = !world.lid_events_enabled || world.lid_open == Some(false);
    if lid_ok && !world.goal_active_or_queued(GoalId::PairPeer) && !world.dfu_mode {
        RuleDecision::RunWithParams(RuleParams::InCaseWatchdogTimer { millis: timer_millis })
    } else {
        RuleDecision::Ignore
    }
}

/// Secondary-side mirror of `pri_peer_paired_out_case`: the Secondary's
/// equivalent reaction to pairing out-of-case is simply to find its role
/// (spec §4.4.2's "symmetric rules exist for Secondary").
pub fn sec_peer_paired_out_case(world: &WorldState, events: RuleEventSet) -> RuleDecision {
    if !events.contains(RuleEvent::PeerPaired) {
        return RuleDecision::Ignore;
    }
    let case_ok = !world.in_case || world.remain_active_for_peer || world.lid_open == Some(true);
    if case_ok {
        RuleDecision::Run
    } else {
        RuleDecision::Ignore
    }
}

/// Secondary mirror of `pri_peer_lost_find_role`: on peer loss the
/// Secondary re-enters role-finding too, gated the same way.
pub fn sec_peer_lost_find_role(world: &WorldState, events: RuleEventSet) -> RuleDecision {
    if !(events.contains(RuleEvent::PeerLinkloss) || events.contains(RuleEvent::PeerDisconnectedBredr)) {
        return RuleDecision::Ignore;
    }
    if world.role == Some(Role::Secondary) && !world.peer_connected {
        RuleDecision::Run
    } else {
        RuleDecision::Ignore
    }
}
