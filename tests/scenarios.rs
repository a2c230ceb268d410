//! End-to-end scenarios (spec §8, literal values S1-S6), driven across the
//! public APIs of the four components rather than their internal unit
//! tests, to catch composition bugs a single module's tests can't see.

use std::time::Duration;

use tws_core::config::{Config, MirrorConfig, TopologyConfig};
use tws_core::device::BdAddr;
use tws_core::mirror::handover::{HandoverEffect, HandoverProcedure, HandoverReason};
use tws_core::mirror::sm::{MirrorEffect, MirrorSm, TargetInputs};
use tws_core::mirror::state::MirrorState;
use tws_core::peer_link_policy::{MirrorTransitionGate, PeerLinkPolicy};
use tws_core::topology::goals::GoalId;
use tws_core::topology::rules::Role;
use tws_core::topology::{StartOutcome, Topology};
use tws_core::va::chain::MockAudioChain;
use tws_core::va::sm::{VaEvent, VaSm, VaState};

struct AlwaysSteady;
impl MirrorTransitionGate for AlwaysSteady {
    fn is_acl_connected_steady(&self) -> bool {
        true
    }
}

/// S1: peer-paired out-of-case brings up role selection and an ACL mirror
/// with no SCO/A2DP yet.
#[test]
fn s1_peer_paired_out_of_case_establishes_mirror_acl_only() {
    let mut topo = Topology::new(TopologyConfig::default());
    topo.notify_peer_paired(true);
    topo.set_role(Role::Primary);
    let outcome = topo.start().unwrap();
    assert_eq!(outcome, StartOutcome::Confirmed { role: Role::Primary });

    let mut mirror = MirrorSm::new(MirrorConfig::default());
    mirror.set_role(true);
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
    let target = mirror.derive_target(&inputs, None);
    let effects = mirror.set_target(target, BdAddr(1), true, false);
    assert_eq!(effects, vec![MirrorEffect::ConnectMirrorAcl(BdAddr(1))]);
    mirror.handle_transition_cfm(true).unwrap();
    assert_eq!(mirror.state(), MirrorState::AclConnected);
}

/// S2: an inbound SCO with tesco=12 drives the mirror target to
/// `ESCO_CONNECTED` and puts the peer link Active for the active-period.
#[test]
fn s2_inbound_sco_drives_esco_mirror_and_peer_link_active() {
    let mut mirror = MirrorSm::new(MirrorConfig::default());
    mirror.set_role(true);
    mirror.set_target(
        tws_core::mirror::state::MirrorTarget::AclConnected,
        BdAddr(1),
        true,
        false,
    );
    mirror.handle_transition_cfm(true).unwrap();

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
    let target = mirror.derive_target(&inputs, Some(12));
    assert_eq!(target, tws_core::mirror::state::MirrorTarget::EscoConnected);

    let mut peer_link = PeerLinkPolicy::new(BdAddr(1), Config::default().peer_mode);
    peer_link.handle_connect_ind(BdAddr(1));
    let effects = peer_link.active_period(None, &AlwaysSteady);
    assert!(effects.contains(&tws_core::peer_link_policy::LinkPolicyEffect::ArmActivePeriodTimer(
        Duration::from_millis(1500)
    )));

    let effects = mirror.set_target(target, BdAddr(1), true, true);
    assert_eq!(effects, vec![MirrorEffect::RequestPeerLinkActive, MirrorEffect::ConnectMirrorEsco]);
}

/// S3: A2DP streaming swap of handsets. Two handsets A and B are both
/// connected to the Primary with A currently mirrored and streaming; focus
/// moves to B. Mirror target becomes `SWITCH`, which must disconnect
/// mirror-A2DP, ACL-switch to B, then re-raise the target so A2DP comes back
/// up on the new handset.
#[test]
fn s3_a2dp_streaming_swap_of_handsets_switches_mirror_to_new_handset() {
    let handset_a = BdAddr(1);
    let handset_b = BdAddr(2);

    let mut mirror = MirrorSm::new(MirrorConfig::default());
    mirror.set_role(true);
    mirror.set_target(tws_core::mirror::state::MirrorTarget::AclConnected, handset_a, true, false);
    mirror.handle_transition_cfm(true).unwrap();
    mirror.set_target(tws_core::mirror::state::MirrorTarget::A2dpConnected, handset_a, true, false);
    mirror.handle_transition_cfm(true).unwrap();
    assert_eq!(mirror.state(), MirrorState::A2dpConnected);

    let effects =
        mirror.set_target(tws_core::mirror::state::MirrorTarget::Switch, handset_b, true, false);
    assert_eq!(effects, vec![MirrorEffect::DisconnectMirrorA2dp]);
    assert_eq!(mirror.state(), MirrorState::A2dpDisconnecting);
    mirror.handle_transition_cfm(true).unwrap();
    assert_eq!(mirror.state(), MirrorState::AclConnected);

    let effects =
        mirror.set_target(tws_core::mirror::state::MirrorTarget::Switch, handset_b, true, false);
    assert_eq!(effects, vec![MirrorEffect::SwitchMirrorAcl(handset_b)]);
    assert_eq!(mirror.state(), MirrorState::Switch);

    let effects =
        mirror.set_target(tws_core::mirror::state::MirrorTarget::A2dpConnected, handset_b, true, false);
    assert_eq!(effects, vec![MirrorEffect::ConnectMirrorA2dp]);
    assert_eq!(mirror.state(), MirrorState::A2dpConnecting);
    mirror.handle_transition_cfm(true).unwrap();
    assert_eq!(mirror.state(), MirrorState::A2dpConnected);
}

/// S4: wake-word detect then abort; mic-user flips non-interruptible
/// briefly at `wuw-detected` and back at `wuw-ignore-detected`.
#[test]
fn s4_wake_word_detect_then_abort_round_trips_mic_arbitration() {
    let mut sm = VaSm::new(Default::default(), MockAudioChain::default(), 16_000, 16_000);
    sm.handle(VaEvent::WuwDetectStart).unwrap();
    assert_eq!(sm.state(), VaState::WuwDetecting);
    assert!(!sm.chain().mic_user_non_interruptible);

    sm.handle(VaEvent::WuwDetected).unwrap();
    assert_eq!(sm.state(), VaState::WuwDetected);
    assert!(sm.chain().mic_user_non_interruptible);

    sm.handle(VaEvent::WuwIgnoreDetected).unwrap();
    assert_eq!(sm.state(), VaState::WuwDetecting);
    assert!(!sm.chain().mic_user_non_interruptible);
}

/// S5: handover on going-in-case, succeeding on the Nth retry (N <= max).
#[test]
fn s5_handover_in_case_succeeds_after_retries() {
    let config = MirrorConfig { handover_max_retries: 20, ..MirrorConfig::default() };
    let mut handover = HandoverProcedure::new(config);
    handover.start(HandoverReason::InCase);
    handover.handle_prepare_step_result(true);
    handover.handle_prepare_step_result(true);
    handover.handle_prepare_step_result(true);

    for _ in 0..19 {
        let effects = handover.handle_controller_timeout();
        assert!(matches!(effects[0], HandoverEffect::ArmRetryTimer(_)));
        handover.handle_retry_timer_elapsed();
    }
    assert_eq!(handover.retries(), 19);

    let effects = handover.handle_controller_success();
    assert_eq!(effects, vec![HandoverEffect::CompleteSuccess]);
}

/// S5 (failure branch): exceeding the configured maximum raises
/// `HANDOVER_FAILED` and unwinds rather than completing.
#[test]
fn s5_handover_exceeding_max_retries_unwinds_instead_of_succeeding() {
    let config = MirrorConfig { handover_max_retries: 2, ..MirrorConfig::default() };
    let mut handover = HandoverProcedure::new(config);
    handover.start(HandoverReason::InCase);
    handover.handle_prepare_step_result(true);
    handover.handle_prepare_step_result(true);
    handover.handle_prepare_step_result(true);

    handover.handle_controller_timeout();
    handover.handle_retry_timer_elapsed();
    handover.handle_controller_timeout();
    handover.handle_retry_timer_elapsed();
    let effects = handover.handle_controller_timeout();
    assert!(effects.contains(&HandoverEffect::NotifyRoleChangeClientsCancel));
}

/// S6: stop completes within the configured timeout, or reports failure
/// while still marking internal state stopped; further goals are dropped.
#[test]
fn s6_stop_completes_and_drops_further_goals() {
    let mut topo = Topology::new(TopologyConfig::default());
    topo.notify_peer_paired(true);
    topo.start().unwrap();

    let outcome = topo.stop();
    assert_eq!(outcome, tws_core::topology::StopOutcome::Success);
    let outcome = topo.handle_system_stop_completed();
    assert_eq!(outcome, tws_core::topology::StopOutcome::Success);

    assert!(!topo.admit_goal(GoalId::ConnectHandset));
}

/// S6 (failure branch): a stop that times out still ends up stopped.
#[test]
fn s6_stop_timeout_still_marks_stopped_and_reports_failure() {
    let mut topo = Topology::new(TopologyConfig::default());
    topo.notify_peer_paired(true);
    topo.start().unwrap();
    topo.stop();

    let outcome = topo.handle_stop_timeout();
    assert_eq!(outcome, tws_core::topology::StopOutcome::Failure);
    assert_eq!(topo.lifecycle(), tws_core::topology::TopologyLifecycle::Stopped);
}

/// Testable property 3: voice sources with tesco in {0, 6} never cause an
/// ESCO_CONNECTING transition.
#[test]
fn property_3_non_mirrorable_tesco_never_reaches_esco_connecting() {
    let mut mirror = MirrorSm::new(MirrorConfig::default());
    mirror.set_role(true);
    mirror.set_target(tws_core::mirror::state::MirrorTarget::AclConnected, BdAddr(1), true, false);
    mirror.handle_transition_cfm(true).unwrap();

    for tesco in [0u8, 6u8] {
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
        let target = mirror.derive_target(&inputs, Some(tesco));
        assert_ne!(target, tws_core::mirror::state::MirrorTarget::EscoConnected);
    }
    assert_eq!(mirror.state(), MirrorState::AclConnected);
}
