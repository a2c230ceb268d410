//! Connect-handset internal sub-SM (spec §4.4.4).
//!
//! Drives paging a handset while coordinating with the streaming/reconnect
//! chatter coming back from the handset service, and owes at most one
//! `prepare-for-role-selection` response. Kept as its own small state
//! machine (rather than folded into the goal procedure) since it tracks
//! cancellation and streaming races the goal engine itself does not need
//! to know about - matching the teacher's `ServiceLevelConnection` holding
//! its own procedure runner apart from the peer-level state.

use std::time::Duration;

use log::{debug, warn};

use crate::config::TopologyConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectHandsetState {
    Idle,
    Paging,
    StreamingStopPending,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectHandsetEffect {
    DisablePeerFindRoleScanning,
    SubscribeReconnectAndStreamingIndications,
    RequestConnectionStop,
    ArmStreamingStopTimeout(Duration),
    ReissueReconnectRequest,
    CompleteFailed,
    CompleteSuccess,
    EmitPrepareForRoleSelectionResponse,
    ReenablePeerFindRoleScanning,
}

pub struct ConnectHandsetProcedure {
    config: TopologyConfig,
    state: ConnectHandsetState,
    prepare_response_owed: bool,
    cancel_requested: bool,
}

impl ConnectHandsetProcedure {
    pub fn new(config: TopologyConfig) -> Self {
        Self {
            config,
            state: ConnectHandsetState::Idle,
            prepare_response_owed: false,
            cancel_requested: false,
        }
    }

    pub fn state(&self) -> ConnectHandsetState {
        self.state
    }

    pub fn start(&mut self) -> Vec<ConnectHandsetEffect> {
        self.state = ConnectHandsetState::Paging;
        vec![
            ConnectHandsetEffect::DisablePeerFindRoleScanning,
            ConnectHandsetEffect::SubscribeReconnectAndStreamingIndications,
        ]
    }

    /// On streaming start, request a connection stop and arm the
    /// streaming-stop timeout (spec §4.4.4).
    pub fn handle_streaming_start(&mut self) -> Vec<ConnectHandsetEffect> {
        self.state = ConnectHandsetState::StreamingStopPending;
        vec![
            ConnectHandsetEffect::RequestConnectionStop,
            ConnectHandsetEffect::ArmStreamingStopTimeout(self.config.streaming_stop_timeout),
        ]
    }

    /// On streaming stop within the window, reissue the reconnect request.
    pub fn handle_streaming_stopped(&mut self) -> Vec<ConnectHandsetEffect> {
        if self.state != ConnectHandsetState::StreamingStopPending {
            return Vec::new();
        }
        let mut effects = vec![ConnectHandsetEffect::ReissueReconnectRequest];
        if self.prepare_response_owed {
            effects.push(ConnectHandsetEffect::EmitPrepareForRoleSelectionResponse);
            self.prepare_response_owed = false;
        }
        self.state = ConnectHandsetState::Paging;
        effects
    }

    /// On timeout, complete failed (spec §4.4.4).
    pub fn handle_streaming_stop_timeout(&mut self) -> Vec<ConnectHandsetEffect> {
        warn!("connect-handset: streaming-stop timed out, failing");
        self.state = ConnectHandsetState::Failed;
        vec![ConnectHandsetEffect::CompleteFailed, ConnectHandsetEffect::ReenablePeerFindRoleScanning]
    }

    /// On prepare-for-role-selection, stop reconnect and flag that one
    /// prepare response is owed; the response is emitted only once
    /// streaming truly stops (spec §4.4.4).
    pub fn handle_prepare_for_role_selection(&mut self) {
        self.prepare_response_owed = true;
        debug!("connect-handset: prepare-for-role-selection received, response deferred");
    }

    pub fn handle_reconnect_succeeded(&mut self) -> Vec<ConnectHandsetEffect> {
        self.state = ConnectHandsetState::Done;
        vec![ConnectHandsetEffect::CompleteSuccess, ConnectHandsetEffect::ReenablePeerFindRoleScanning]
    }

    /// Cancellation callback is posted when handset-service confirms the
    /// stop, not on first call (spec §4.4.4).
    pub fn request_cancel(&mut self) {
        self.cancel_requested = true;
    }

    pub fn handle_handset_service_stop_confirmed(&mut self) -> Option<ConnectHandsetEffect> {
        self.cancel_requested.then(|| {
            self.state = ConnectHandsetState::Failed;
            ConnectHandsetEffect::CompleteFailed
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streaming_start_requests_stop_and_arms_timeout() {
        let mut proc = ConnectHandsetProcedure::new(TopologyConfig::default());
        proc.start();
        let effects = proc.handle_streaming_start();
        assert_eq!(
            effects,
            vec![
                ConnectHandsetEffect::RequestConnectionStop,
                ConnectHandsetEffect::ArmStreamingStopTimeout(TopologyConfig::default().streaming_stop_timeout),
            ]
        );
        assert_eq!(proc.state(), ConnectHandsetState::StreamingStopPending);
    }

    #[test]
    fn prepare_response_deferred_until_streaming_stops() {
        let mut proc = ConnectHandsetProcedure::new(TopologyConfig::default());
        proc.start();
        proc.handle_streaming_start();
        proc.handle_prepare_for_role_selection();
        let effects = proc.handle_streaming_stopped();
        assert!(effects.contains(&ConnectHandsetEffect::EmitPrepareForRoleSelectionResponse));
    }

    #[test]
    fn timeout_completes_failed() {
        let mut proc = ConnectHandsetProcedure::new(TopologyConfig::default());
        proc.start();
        proc.handle_streaming_start();
        let effects = proc.handle_streaming_stop_timeout();
        assert_eq!(proc.state(), ConnectHandsetState::Failed);
        assert!(effects.contains(&ConnectHandsetEffect::CompleteFailed));
    }

    #[test]
    fn cancel_completes_only_after_stop_confirmed() {
        let mut proc = ConnectHandsetProcedure::new(TopologyConfig::default());
        proc.start();
        proc.request_cancel();
        assert!(proc.handle_handset_service_stop_confirmed().is_some());
    }

    #[test]
    fn stop_confirmed_without_cancel_is_a_no_op() {
        let mut proc = ConnectHandsetProcedure::new(TopologyConfig::default());
        proc.start();
        assert!(proc.handle_handset_service_stop_confirmed().is_none());
    }
}
