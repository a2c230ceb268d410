//! Mirror-profile main state machine (C2, spec §4.2).
//!
//! One process-wide instance (spec §5); Primary-only target derivation,
//! Secondary is accept-only and only answers `set-sco-volume`/`set-sco-codec`.
//! Modeled as a `MirrorSm` holding the composite `MirrorState` plus the three
//! link states, mirroring the teacher's pattern of a connection-level struct
//! (`bt-a2dp`'s `Peer`) owning sub-objects rather than one flat bag of fields.

use log::{debug, info, warn};

use crate::config::MirrorConfig;
use crate::device::BdAddr;
use crate::error::{CoreError, MirrorError};

use super::state::{
    AudioSource, MirrorA2dpState, MirrorAclState, MirrorEscoState, MirrorState, MirrorTarget,
    SourceSyncState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MirrorRole {
    pub is_primary: bool,
}

/// The subset of world state that feeds target derivation (spec §4.2.1);
/// kept separate from `MirrorSm`'s own fields since it is gathered from
/// other components (peer-signalling, handset link, key-sync) rather than
/// owned here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TargetInputs {
    pub peer_sig_connected: bool,
    pub audio_sync_l2cap_connected: bool,
    pub handset_connected: bool,
    pub peer_qhs_ready: bool,
    pub target_handset: Option<BdAddr>,
    pub key_sync_complete: bool,
    pub currently_mirrored: Option<BdAddr>,
    pub mirrored_hfp_has_active_sco: bool,
    pub esco_mirroring_enabled: bool,
    pub a2dp_mirroring_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorEffect {
    ConnectMirrorAcl(BdAddr),
    DisconnectMirrorAcl,
    SwitchMirrorAcl(BdAddr),
    ConnectMirrorEsco,
    DisconnectMirrorEsco,
    ConnectMirrorA2dp,
    DisconnectMirrorA2dp,
    RequestPeerLinkActive,
    RequestPeerLinkSniff,
    NotifyClients(MirrorState),
}

pub struct MirrorSm {
    config: MirrorConfig,
    role: MirrorRole,
    state: MirrorState,
    target: Option<MirrorTarget>,
    pub acl: MirrorAclState,
    pub esco: MirrorEscoState,
    pub a2dp: MirrorA2dpState,
    clients_registered: u32,
}

impl MirrorSm {
    pub fn new(config: MirrorConfig) -> Self {
        Self {
            config,
            role: MirrorRole::default(),
            state: MirrorState::Disconnected,
            target: None,
            acl: MirrorAclState::default(),
            esco: MirrorEscoState::default(),
            a2dp: MirrorA2dpState::default(),
            clients_registered: 0,
        }
    }

    pub fn state(&self) -> MirrorState {
        self.state
    }

    pub fn set_role(&mut self, primary: bool) {
        self.role.is_primary = primary;
    }

    pub fn client_register(&mut self) {
        self.clients_registered += 1;
    }

    pub fn client_unregister(&mut self) {
        self.clients_registered = self.clients_registered.saturating_sub(1);
    }

    pub fn is_connected(&self) -> bool {
        self.acl.is_connected()
    }

    pub fn get_mirror_acl_handle(&self) -> Option<u16> {
        self.acl.is_connected().then_some(self.acl.conn_handle)
    }

    /// Voice-source admissibility (spec §4.2.4): only tesco >= 7 may be
    /// mirrored; SCO (0) and HV3 (6) are refused and accepted locally.
    pub fn voice_source_is_mirrorable(&self, tesco: u8) -> bool {
        tesco >= self.config.min_mirrorable_tesco
    }

    /// Target-state derivation, Primary-only (spec §4.2.1).
    pub fn derive_target(&self, inputs: &TargetInputs, esco_tesco: Option<u8>) -> MirrorTarget {
        if !self.role.is_primary {
            return self.target.unwrap_or(MirrorTarget::Disconnected);
        }

        let gating = inputs.peer_sig_connected
            && inputs.audio_sync_l2cap_connected
            && inputs.handset_connected
            && inputs.peer_qhs_ready
            && inputs.target_handset.is_some()
            && inputs.key_sync_complete;

        if !gating {
            return MirrorTarget::Disconnected;
        }

        if inputs.target_handset != inputs.currently_mirrored {
            return MirrorTarget::Switch;
        }

        let voice_mirrorable = esco_tesco.is_some_and(|t| self.voice_source_is_mirrorable(t));
        if inputs.mirrored_hfp_has_active_sco && inputs.esco_mirroring_enabled && voice_mirrorable {
            return MirrorTarget::EscoConnected;
        }

        if inputs.a2dp_mirroring_enabled {
            match self.a2dp.sync_state_for(self.a2dp.audio_source) {
                Some(SourceSyncState::Active) => return MirrorTarget::A2dpRouted,
                Some(SourceSyncState::Ready) => return MirrorTarget::A2dpConnected,
                _ => {}
            }
        }

        MirrorTarget::AclConnected
    }

    /// Sets target and, if not locked, fires the matching transition
    /// (spec §4.2.2/§4.2.3). Deferred while the transition lock is held;
    /// the caller re-applies `set_target` once the pending transition
    /// reaches a steady state.
    pub fn set_target(
        &mut self,
        target: MirrorTarget,
        peer_addr: BdAddr,
        peer_link_is_sniff: bool,
        single_handset_bredr_connected: bool,
    ) -> Vec<MirrorEffect> {
        self.target = Some(target);

        if !self.state.is_steady() {
            debug!("mirror sm: set-target({target:?}) deferred, lock held in {:?}", self.state);
            return Vec::new();
        }

        self.fire_transition(target, peer_addr, peer_link_is_sniff, single_handset_bredr_connected)
    }

    fn fire_transition(
        &mut self,
        target: MirrorTarget,
        peer_addr: BdAddr,
        peer_link_is_sniff: bool,
        single_handset_bredr_connected: bool,
    ) -> Vec<MirrorEffect> {
        use MirrorState::*;
        use MirrorTarget::*;

        let mut effects = Vec::new();

        match (self.state, target) {
            (Disconnected, AclConnected | EscoConnected | A2dpConnected | A2dpRouted) => {
                if !peer_link_is_sniff {
                    // Precondition unmet (spec §4.2.3): defer until link policy
                    // reports steady Sniff, then re-derive and retry.
                    effects.push(MirrorEffect::RequestPeerLinkSniff);
                    return effects;
                }
                self.state = AclConnecting;
                effects.push(MirrorEffect::ConnectMirrorAcl(peer_addr));
            }

            (AclConnected | Switch, EscoConnected) => {
                if single_handset_bredr_connected {
                    effects.push(MirrorEffect::RequestPeerLinkActive);
                }
                self.state = EscoConnecting;
                effects.push(MirrorEffect::ConnectMirrorEsco);
            }

            (AclConnected | Switch, A2dpConnected | A2dpRouted) => {
                if single_handset_bredr_connected {
                    effects.push(MirrorEffect::RequestPeerLinkActive);
                }
                self.state = A2dpConnecting;
                effects.push(MirrorEffect::ConnectMirrorA2dp);
            }

            (AclConnected, Switch) => {
                // Nothing else mirrored: the ACL switch itself is the whole
                // job (spec §4.2.2, testable property 2).
                self.state = MirrorState::Switch;
                effects.push(MirrorEffect::SwitchMirrorAcl(peer_addr));
            }

            (EscoConnected, other) if other != EscoConnected => {
                self.state = EscoDisconnecting;
                effects.push(MirrorEffect::DisconnectMirrorEsco);
            }

            (A2dpConnected | A2dpRouted, other) if other == EscoConnected || other == Switch => {
                // eSCO has priority over A2DP, and a handset switch must drop
                // A2DP before the ACL switch fires (spec §3.2, testable
                // property 2): tear down A2DP first either way.
                self.state = A2dpDisconnecting;
                effects.push(MirrorEffect::DisconnectMirrorA2dp);
            }

            (state, Disconnected) if state.is_steady() && state != Disconnected => {
                self.state = match state {
                    EscoConnected => EscoDisconnecting,
                    A2dpConnected | A2dpRouted => A2dpDisconnecting,
                    Switch | AclConnected => AclDisconnecting,
                    _ => state,
                };
                effects.push(match self.state {
                    EscoDisconnecting => MirrorEffect::DisconnectMirrorEsco,
                    A2dpDisconnecting => MirrorEffect::DisconnectMirrorA2dp,
                    _ => MirrorEffect::DisconnectMirrorAcl,
                });
            }

            (Switch, AclConnected) => {
                self.state = AclConnected;
            }

            (Switch, Switch) | (AclConnected, AclConnected) => {}

            _ => {
                warn!("mirror sm: no transition rule from {:?} to {target:?}", self.state);
            }
        }

        effects
    }

    /// Controller confirmation that a transitional state has completed;
    /// advances to the matching steady state and releases the lock, then
    /// lets the caller re-derive and re-apply the target (spec §4.2.2).
    pub fn handle_transition_cfm(&mut self, success: bool) -> Result<(), MirrorError> {
        use MirrorState::*;

        if success {
            self.state = match self.state {
                AclConnecting => AclConnected,
                AclDisconnecting => Disconnected,
                EscoConnecting => EscoConnected,
                EscoDisconnecting => AclConnected,
                A2dpConnecting => A2dpConnected,
                A2dpDisconnecting => AclConnected,
                steady => steady,
            };
            info!("mirror sm: transition confirmed, now {:?}", self.state);
            Ok(())
        } else {
            // Timeouts/failures on connecting states unwind to the prior
            // steady state and re-target via 4.2.1 (spec §4.2.10).
            self.state = match self.state {
                AclConnecting | AclDisconnecting => Disconnected,
                EscoConnecting | EscoDisconnecting => AclConnected,
                A2dpConnecting | A2dpDisconnecting => AclConnected,
                steady => steady,
            };
            Err(MirrorError::Core(CoreError::ControllerFailure))
        }
    }

    /// Link-loss to peer resets peer-mode to Active and re-initialises link
    /// policy (spec §4.2.10); the mirror SM itself drops straight to
    /// `Disconnected` since the mirror ACL cannot survive peer link loss.
    pub fn handle_peer_link_loss(&mut self) {
        self.state = MirrorState::Disconnected;
        self.acl = MirrorAclState::default();
        self.esco = MirrorEscoState::default();
        self.a2dp = MirrorA2dpState::default();
        self.target = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primary_sm() -> MirrorSm {
        let mut sm = MirrorSm::new(MirrorConfig::default());
        sm.set_role(true);
        sm
    }

    #[test]
    fn disconnected_with_missing_inputs_stays_disconnected() {
        let sm = primary_sm();
        let inputs = TargetInputs::default();
        assert_eq!(sm.derive_target(&inputs, None), MirrorTarget::Disconnected);
    }

    #[test]
    fn fully_gated_inputs_with_matching_handset_yield_acl_connected() {
        let sm = primary_sm();
        let inputs = TargetInputs {
            peer_sig_connected: true,
            audio_sync_l2cap_connected: true,
            handset_connected: true,
            peer_qhs_ready: true,
            target_handset: Some(BdAddr(1)),
            key_sync_complete: true,
            currently_mirrored: Some(BdAddr(1)),
            ..Default::default()
        };
        assert_eq!(sm.derive_target(&inputs, None), MirrorTarget::AclConnected);
    }

    #[test]
    fn mismatched_target_handset_yields_switch() {
        let sm = primary_sm();
        let inputs = TargetInputs {
            peer_sig_connected: true,
            audio_sync_l2cap_connected: true,
            handset_connected: true,
            peer_qhs_ready: true,
            target_handset: Some(BdAddr(2)),
            key_sync_complete: true,
            currently_mirrored: Some(BdAddr(1)),
            ..Default::default()
        };
        assert_eq!(sm.derive_target(&inputs, None), MirrorTarget::Switch);
    }

    #[test]
    fn active_sco_with_mirrorable_tesco_yields_esco_connected() {
        let sm = primary_sm();
        let inputs = TargetInputs {
            peer_sig_connected: true,
            audio_sync_l2cap_connected: true,
            handset_connected: true,
            peer_qhs_ready: true,
            target_handset: Some(BdAddr(1)),
            key_sync_complete: true,
            currently_mirrored: Some(BdAddr(1)),
            mirrored_hfp_has_active_sco: true,
            esco_mirroring_enabled: true,
            ..Default::default()
        };
        assert_eq!(sm.derive_target(&inputs, Some(12)), MirrorTarget::EscoConnected);
    }

    #[test]
    fn non_mirrorable_tesco_never_yields_esco_target() {
        let sm = primary_sm();
        let inputs = TargetInputs {
            peer_sig_connected: true,
            audio_sync_l2cap_connected: true,
            handset_connected: true,
            peer_qhs_ready: true,
            target_handset: Some(BdAddr(1)),
            key_sync_complete: true,
            currently_mirrored: Some(BdAddr(1)),
            mirrored_hfp_has_active_sco: true,
            esco_mirroring_enabled: true,
            ..Default::default()
        };
        for tesco in [0u8, 6u8] {
            assert_ne!(sm.derive_target(&inputs, Some(tesco)), MirrorTarget::EscoConnected);
        }
    }

    #[test]
    fn transition_lock_defers_new_targets() {
        let mut sm = primary_sm();
        let effects = sm.set_target(MirrorTarget::AclConnected, BdAddr(1), true, false);
        assert_eq!(effects, vec![MirrorEffect::ConnectMirrorAcl(BdAddr(1))]);
        assert!(!sm.state().is_steady());

        let effects = sm.set_target(MirrorTarget::EscoConnected, BdAddr(1), true, false);
        assert!(effects.is_empty(), "should defer behind the transition lock");
    }

    #[test]
    fn acl_connecting_requires_sniff_peer_link() {
        let mut sm = primary_sm();
        let effects = sm.set_target(MirrorTarget::AclConnected, BdAddr(1), false, false);
        assert_eq!(effects, vec![MirrorEffect::RequestPeerLinkSniff]);
        assert_eq!(sm.state(), MirrorState::Disconnected);
    }

    #[test]
    fn esco_has_priority_disconnects_a2dp_first() {
        let mut sm = primary_sm();
        sm.set_target(MirrorTarget::AclConnected, BdAddr(1), true, false);
        sm.handle_transition_cfm(true).unwrap();
        sm.set_target(MirrorTarget::A2dpConnected, BdAddr(1), true, false);
        sm.handle_transition_cfm(true).unwrap();
        assert_eq!(sm.state(), MirrorState::A2dpConnected);

        let effects = sm.set_target(MirrorTarget::EscoConnected, BdAddr(1), true, false);
        assert_eq!(effects, vec![MirrorEffect::DisconnectMirrorA2dp]);
        assert_eq!(sm.state(), MirrorState::A2dpDisconnecting);
    }

    #[test]
    fn connecting_timeout_unwinds_to_prior_steady_state() {
        let mut sm = primary_sm();
        sm.set_target(MirrorTarget::AclConnected, BdAddr(1), true, false);
        sm.handle_transition_cfm(true).unwrap();
        sm.set_target(MirrorTarget::EscoConnected, BdAddr(1), true, false);
        assert_eq!(sm.state(), MirrorState::EscoConnecting);

        assert!(sm.handle_transition_cfm(false).is_err());
        assert_eq!(sm.state(), MirrorState::AclConnected);
    }

    #[test]
    fn switch_from_a2dp_disconnects_a2dp_then_switches_acl_then_reconnects_a2dp() {
        let mut sm = primary_sm();
        sm.set_target(MirrorTarget::AclConnected, BdAddr(1), true, false);
        sm.handle_transition_cfm(true).unwrap();
        sm.set_target(MirrorTarget::A2dpConnected, BdAddr(1), true, false);
        sm.handle_transition_cfm(true).unwrap();
        assert_eq!(sm.state(), MirrorState::A2dpConnected);

        let effects = sm.set_target(MirrorTarget::Switch, BdAddr(2), true, false);
        assert_eq!(effects, vec![MirrorEffect::DisconnectMirrorA2dp]);
        assert_eq!(sm.state(), MirrorState::A2dpDisconnecting);

        sm.handle_transition_cfm(true).unwrap();
        assert_eq!(sm.state(), MirrorState::AclConnected);

        let effects = sm.set_target(MirrorTarget::Switch, BdAddr(2), true, false);
        assert_eq!(effects, vec![MirrorEffect::SwitchMirrorAcl(BdAddr(2))]);
        assert_eq!(sm.state(), MirrorState::Switch);

        let effects = sm.set_target(MirrorTarget::A2dpConnected, BdAddr(2), true, false);
        assert_eq!(effects, vec![MirrorEffect::ConnectMirrorA2dp]);
        assert_eq!(sm.state(), MirrorState::A2dpConnecting);

        sm.handle_transition_cfm(true).unwrap();
        assert_eq!(sm.state(), MirrorState::A2dpConnected);
    }

    #[test]
    fn switch_from_esco_disconnects_esco_then_switches_acl() {
        let mut sm = primary_sm();
        sm.set_target(MirrorTarget::AclConnected, BdAddr(1), true, false);
        sm.handle_transition_cfm(true).unwrap();
        sm.set_target(MirrorTarget::EscoConnected, BdAddr(1), true, false);
        sm.handle_transition_cfm(true).unwrap();
        assert_eq!(sm.state(), MirrorState::EscoConnected);

        let effects = sm.set_target(MirrorTarget::Switch, BdAddr(2), true, false);
        assert_eq!(effects, vec![MirrorEffect::DisconnectMirrorEsco]);
        assert_eq!(sm.state(), MirrorState::EscoDisconnecting);

        sm.handle_transition_cfm(true).unwrap();
        assert_eq!(sm.state(), MirrorState::AclConnected);

        let effects = sm.set_target(MirrorTarget::Switch, BdAddr(2), true, false);
        assert_eq!(effects, vec![MirrorEffect::SwitchMirrorAcl(BdAddr(2))]);
        assert_eq!(sm.state(), MirrorState::Switch);
    }

    #[test]
    fn peer_link_loss_resets_mirror_entirely() {
        let mut sm = primary_sm();
        sm.set_target(MirrorTarget::AclConnected, BdAddr(1), true, false);
        sm.handle_transition_cfm(true).unwrap();
        sm.handle_peer_link_loss();
        assert_eq!(sm.state(), MirrorState::Disconnected);
        assert!(!sm.is_connected());
    }
}
