//! Audio-sync handshake, SCO-sync interception, and A2DP start modes
//! (spec §4.2.5-§4.2.7).
//!
//! Three loosely related pieces of the Primary's audio-facing edge, kept in
//! one module since they share the per-source sync-state vocabulary from
//! `mirror::state` and none is large enough to warrant its own file.

use std::time::Duration;

use log::{debug, info};

use crate::config::MirrorConfig;

use super::state::{DeferredSyncResponse, SourceSyncState};

/// Inbound audio-sync indications from the local audio subsystem
/// (spec §4.2.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncIndication {
    Connect,
    Prepare { task: u32, id: u32 },
    Activate { task: u32, id: u32 },
    State(SourceSyncState),
    CodecReconfigured,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioSyncEffect {
    ForwardStreamContextToPeer { ack_requested: bool },
    RespondPrepare { task: u32, id: u32 },
    RespondActivate { task: u32, id: u32 },
}

/// Per-source audio-sync tracker (spec §4.2.5): advances `SourceSyncState`
/// and holds deferred prepare/activate responses until the new stream
/// context has gone out over peer-signalling.
#[derive(Debug, Default)]
pub struct AudioSyncTracker {
    state: Option<SourceSyncState>,
    stream_change_lock: bool,
}

impl AudioSyncTracker {
    pub fn sync_state(&self) -> Option<SourceSyncState> {
        self.state
    }

    pub fn is_locked(&self) -> bool {
        self.stream_change_lock
    }

    pub fn handle(&mut self, indication: SyncIndication) -> Vec<AudioSyncEffect> {
        let mut effects = Vec::new();
        match indication {
            SyncIndication::Connect => {
                self.state = Some(SourceSyncState::Connected);
            }
            SyncIndication::Prepare { task, id } => {
                self.stream_change_lock = true;
                effects.push(AudioSyncEffect::ForwardStreamContextToPeer { ack_requested: true });
                // Response is deferred; released once the peer-signalling
                // ack lands (handle_stream_context_acked below).
                debug!("audio-sync: prepare deferred for task={task} id={id}");
            }
            SyncIndication::Activate { task, id } => {
                self.state = Some(SourceSyncState::Active);
                effects.push(AudioSyncEffect::RespondActivate { task, id });
            }
            SyncIndication::State(state) => {
                self.state = Some(state);
            }
            SyncIndication::CodecReconfigured => {}
        }
        effects
    }

    /// Releases the deferred prepare response once the stream context has
    /// been acked by the Secondary, clearing the stream-change lock (so
    /// target-state kicks resume, spec §4.2.5).
    pub fn handle_stream_context_acked(&mut self, deferred: DeferredSyncResponse) -> AudioSyncEffect {
        self.stream_change_lock = false;
        self.state = Some(SourceSyncState::Ready);
        AudioSyncEffect::RespondPrepare { task: deferred.task, id: deferred.id }
    }
}

/// Inbound SCO-sync indication from the local HFP stack (spec §4.2.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoSyncIndication {
    pub addr_is_mirrored: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoSyncEffect {
    RespondImmediately,
    QueueConditionalOnLock { timeout: Duration },
    KickTargetReevaluation,
}

/// SCO-sync lock: gates the response to an inbound SCO while topology
/// switches the mirrored handset (spec §4.2.6).
#[derive(Debug, Default)]
pub struct ScoSyncLock {
    held: bool,
}

impl ScoSyncLock {
    pub fn handle_indication(
        &mut self,
        indication: ScoSyncIndication,
        config: &MirrorConfig,
    ) -> Vec<ScoSyncEffect> {
        if indication.addr_is_mirrored {
            return vec![ScoSyncEffect::RespondImmediately];
        }
        self.held = true;
        vec![
            ScoSyncEffect::QueueConditionalOnLock { timeout: config.sco_sync_timeout },
            ScoSyncEffect::KickTargetReevaluation,
        ]
    }

    /// Released once the mirror is ready for the new handset, delivering
    /// the queued response.
    pub fn release_when_mirror_ready(&mut self) -> bool {
        let was_held = self.held;
        self.held = false;
        was_held
    }

    /// On timeout, accept the SCO locally anyway rather than drop the call
    /// (spec §4.2.6).
    pub fn timeout_elapsed(&mut self) {
        if self.held {
            info!("sco-sync: timeout elapsed, accepting SCO locally");
        }
        self.held = false;
    }

    pub fn is_held(&self) -> bool {
        self.held
    }
}

/// A2DP start mode selection (spec §4.2.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum A2dpStartMode {
    Q2Q,
    PrimarySyncUnmute,
    PrimarySynchronised,
    PrimaryUnsynchronised,
    SecondarySynchronised,
    SecondarySyncUnmute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct A2dpStartContext {
    pub q2q_mode: bool,
    pub mirrored_av_already_streaming: bool,
    pub is_handset_switch: bool,
}

pub fn select_a2dp_start_mode(is_primary: bool, ctx: A2dpStartContext) -> A2dpStartMode {
    if ctx.q2q_mode {
        return A2dpStartMode::Q2Q;
    }

    if is_primary {
        if ctx.mirrored_av_already_streaming {
            A2dpStartMode::PrimarySyncUnmute
        } else {
            A2dpStartMode::PrimarySynchronised
        }
    } else if ctx.is_handset_switch {
        A2dpStartMode::SecondarySynchronised
    } else {
        A2dpStartMode::SecondarySyncUnmute
    }
}
