//! Handover procedure (spec §4.2.8).
//!
//! A tagged-state procedure mirroring the teacher's SLC-initialization
//! procedure state pattern (`impl SlcProcedureState` per-state structs
//! driving a fixed sequence with a shared cancel path) - here specialised
//! to the sequential prepare steps, a bounded controller-level retry loop,
//! and a two-path cancel/unwind.

use std::time::Duration;

use log::{info, warn};

use crate::config::MirrorConfig;
use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoverReason {
    InCase,
    OutOfEar,
    BatteryLevel,
    VoiceQuality,
    External,
    Rssi,
    LinkQuality,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoverState {
    Idle,
    NotifyingRoleChange,
    SettingPermitBtFalse,
    DisconnectingLe,
    RequestingControllerHandover,
    RetryBackoff,
    UnwindingNotify,
    UnwindingPermitBt,
    Failed,
    Succeeded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoverEffect {
    NotifyRoleChangeClientsForced,
    SetPermitBt(bool),
    DisconnectLeConnections,
    RequestControllerHandover,
    ArmRetryTimer(Duration),
    NotifyRoleChangeClientsCancel,
    CompleteSuccess,
    CompleteFailure,
}

/// Drives the three-step prepare sequence, a bounded controller retry loop,
/// and the reverse-order unwind on cancel or exhausted retries
/// (spec §4.2.8, §5's cancellation semantics, testable properties 6-7).
pub struct HandoverProcedure {
    config: MirrorConfig,
    state: HandoverState,
    reason: Option<HandoverReason>,
    retries: u32,
    /// Present only on a script-engine-initiated cancel; its absence
    /// distinguishes an internal-failure/HDMA-cancel unwind, which must
    /// still run but does not owe a `cancel-cfm` callback (spec §9 open
    /// question: the discriminator for which completion message to emit).
    cancel_cfm_owed: bool,
}

impl HandoverProcedure {
    pub fn new(config: MirrorConfig) -> Self {
        Self { config, state: HandoverState::Idle, reason: None, retries: 0, cancel_cfm_owed: false }
    }

    pub fn state(&self) -> HandoverState {
        self.state
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn start(&mut self, reason: HandoverReason) -> Vec<HandoverEffect> {
        self.reason = Some(reason);
        self.retries = 0;
        self.state = HandoverState::NotifyingRoleChange;
        info!("handover: starting, reason={reason:?}");
        vec![HandoverEffect::NotifyRoleChangeClientsForced]
    }

    /// Each of the three prepare steps must succeed in order, or the whole
    /// procedure fails and unwinds (spec §4.2.8).
    pub fn handle_prepare_step_result(&mut self, success: bool) -> Vec<HandoverEffect> {
        if !success {
            return self.begin_unwind(false);
        }

        match self.state {
            HandoverState::NotifyingRoleChange => {
                self.state = HandoverState::SettingPermitBtFalse;
                vec![HandoverEffect::SetPermitBt(false)]
            }
            HandoverState::SettingPermitBtFalse => {
                self.state = HandoverState::DisconnectingLe;
                vec![HandoverEffect::DisconnectLeConnections]
            }
            HandoverState::DisconnectingLe => {
                self.state = HandoverState::RequestingControllerHandover;
                vec![HandoverEffect::RequestControllerHandover]
            }
            other => {
                warn!("handover: unexpected prepare-step result in state {other:?}");
                Vec::new()
            }
        }
    }

    /// Controller-level timeout: retry up to the configured maximum,
    /// replaying only the LE-disconnect before each retry (testable
    /// property 6); veto once exceeded.
    pub fn handle_controller_timeout(&mut self) -> Vec<HandoverEffect> {
        if self.retries >= self.config.handover_max_retries {
            warn!("handover: exceeded {} retries, vetoing", self.config.handover_max_retries);
            return self.begin_unwind(false);
        }
        self.retries += 1;
        self.state = HandoverState::RetryBackoff;
        vec![HandoverEffect::ArmRetryTimer(self.config.handover_retry_backoff)]
    }

    pub fn handle_retry_timer_elapsed(&mut self) -> Vec<HandoverEffect> {
        self.state = HandoverState::DisconnectingLe;
        vec![HandoverEffect::DisconnectLeConnections]
    }

    pub fn handle_controller_success(&mut self) -> Vec<HandoverEffect> {
        self.state = HandoverState::Succeeded;
        vec![HandoverEffect::CompleteSuccess]
    }

    /// A cancellation from HDMA (or the script engine) at any time
    /// transitions directly to the unwind path (spec §4.2.8). `from_script`
    /// records whether a `cancel-cfm` callback is owed on completion.
    pub fn cancel(&mut self, from_script: bool) -> Vec<HandoverEffect> {
        self.begin_unwind(from_script)
    }

    fn begin_unwind(&mut self, cancel_cfm_owed: bool) -> Vec<HandoverEffect> {
        self.cancel_cfm_owed = cancel_cfm_owed;
        // Reverse of the steps already completed (spec §5): notify-cancel,
        // then permit-BT=true.
        let mut effects = Vec::new();
        if matches!(
            self.state,
            HandoverState::SettingPermitBtFalse
                | HandoverState::DisconnectingLe
                | HandoverState::RequestingControllerHandover
                | HandoverState::RetryBackoff
        ) {
            self.state = HandoverState::UnwindingPermitBt;
            effects.push(HandoverEffect::SetPermitBt(true));
        }
        self.state = HandoverState::UnwindingNotify;
        effects.push(HandoverEffect::NotifyRoleChangeClientsCancel);
        effects
    }

    pub fn finish_unwind(&mut self) -> Vec<HandoverEffect> {
        self.state = HandoverState::Failed;
        vec![HandoverEffect::CompleteFailure]
    }

    /// Whether the just-completed unwind owes a `cancel-cfm` callback to
    /// the script engine, as opposed to an internal-failure/HDMA-cancel
    /// unwind which does not (spec §9 open question).
    pub fn cancel_cfm_owed(&self) -> bool {
        self.cancel_cfm_owed
    }
}

pub fn reason_from_code(code: u8) -> Result<HandoverReason, CoreError> {
    Ok(match code {
        0 => HandoverReason::InCase,
        1 => HandoverReason::OutOfEar,
        2 => HandoverReason::BatteryLevel,
        3 => HandoverReason::VoiceQuality,
        4 => HandoverReason::External,
        5 => HandoverReason::Rssi,
        6 => HandoverReason::LinkQuality,
        _ => return Err(CoreError::ControllerFailure),
    })
}
