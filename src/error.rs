//! Error kinds shared by the core state machines (spec §7).
//!
//! Programming errors — an SM reaching a transition the invariants say is
//! unreachable, or a required device/handle missing when the invariants
//! guarantee one exists — are not represented here. Those paths `panic!`
//! or `unreachable!()` at the call site, same as the teacher crate's
//! `static_assertions`/`debug_assert!` treat its own wire-format invariants
//! as unconditionally true.

use thiserror::Error;

/// Top-level error kind, shared vocabulary across C1-C4.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("device is not paired")]
    NotPaired,

    #[error("no active connection")]
    NotConnected,

    #[error("operation not valid in the current state machine state")]
    WrongState,

    #[error("an exclusive goal is already active")]
    ExclusiveGoalActive,

    #[error("operation timed out")]
    Timeout,

    #[error("controller rejected the request")]
    ControllerFailure,

    #[error("out of memory during erase")]
    OutOfMemory,

    #[error("operation was vetoed")]
    Vetoed,

    #[error("operation was cancelled")]
    Cancelled,

    #[error("peer link was lost")]
    LinkLoss,
}

pub type CoreResult<T> = Result<T, CoreError>;

/// Errors specific to the mirror-profile main state machine (C2).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MirrorError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("voice source tesco={tesco} is not mirrorable (must be >= 7 slots)")]
    VoiceSourceNotMirrorable { tesco: u8 },

    #[error("no mirror ACL is connected")]
    NoMirrorAcl,

    #[error("audio-sync handshake is not ready for source")]
    AudioSyncNotReady,
}

/// Errors specific to the VA capture state machine (C3).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VaError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("event {event:?} is not valid in state {state:?}")]
    InvalidTransition { state: &'static str, event: &'static str },
}

/// Errors specific to the topology / goal engine (C4).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TopologyError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("topology is not started")]
    NotStarted,

    #[error("goal {0} is already active or queued and is exclusive")]
    GoalExclusive(&'static str),
}
