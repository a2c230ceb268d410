//! The closed rule-event bitset consumed by the topology rule sets (spec §6.4).
//!
//! Modeled as an `enumflags2` bitflags enum over a `u64`, the same crate and
//! pattern the teacher uses for QoS policy / participant capability sets
//! (`enumflags2 = { features = ["serde"] }`), rather than a bag of untyped
//! `u64` constants.

use enumflags2::{bitflags, BitFlags};

#[bitflags]
#[repr(u64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleEvent {
    PeerPaired = 1 << 0,
    NoPeer = 1 << 1,
    RoleSelectedPrimary = 1 << 2,
    RoleSelectedSecondary = 1 << 3,
    RoleSelectedActingPrimary = 1 << 4,
    RoleSwitch = 1 << 5,
    InCase = 1 << 6,
    OutCase = 1 << 7,
    CaseLidOpen = 1 << 8,
    CaseLidClosed = 1 << 9,
    HandsetConnectedBredr = 1 << 10,
    HandsetDisconnectedBredr = 1 << 11,
    HandsetLinkloss = 1 << 12,
    HandsetAclConnected = 1 << 13,
    PeerConnectedBredr = 1 << 14,
    PeerDisconnectedBredr = 1 << 15,
    PeerLinkloss = 1 << 16,
    FailedPeerConnect = 1 << 17,
    FailedSwitchSecondary = 1 << 18,
    Handover = 1 << 19,
    HandoverFailed = 1 << 20,
    NoRole = 1 << 21,
    Shutdown = 1 << 22,
    PairingActivityChanged = 1 << 23,
    ProhibitConnectToHandset = 1 << 24,
    UserRequestConnectHandset = 1 << 25,
    UserRequestDisconnectLruHandset = 1 << 26,
    UserRequestDisconnectAllHandsets = 1 << 27,
    Kick = 1 << 28,
}

/// A set of rule events, as delivered over the peer-signalling topology
/// channel (`remote-rule-event { events: u64 }`, spec §6.1) or raised
/// locally by a goal's completion.
pub type RuleEventSet = BitFlags<RuleEvent>;
