//! Mirror-profile state and data model (spec §3.1, §4.2).
//!
//! The composite state is a tagged enum whose discriminant carries a
//! sub-state membership bitmask, so `is_steady()` and `is_transitional()`
//! stay O(1) without a second lookup table (spec §9's hierarchical-SM note).

use enumflags2::{bitflags, BitFlags};
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use speedy::{Readable, Writable};

use crate::device::BdAddr;

/// Sentinel for an absent mirror ACL connection handle.
pub const CONN_HANDLE_NONE: u16 = 0xFFFF;
/// Sentinel for an absent mirror A2DP L2CAP channel id.
pub const L2CAP_CID_INVALID: u16 = 0x0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr, Readable, Writable)]
#[repr(u8)]
pub enum CodecMode {
    None = 0,
    Nb = 1,
    Wb = 2,
    UltraWb = 3,
    SuperWb = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioSource {
    None,
    A2dp1,
    A2dp2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SourceSyncState {
    Disconnected,
    Ready,
    Connected,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MirrorAclState {
    pub conn_handle: u16,
    pub bd_addr: Option<BdAddr>,
}

impl Default for MirrorAclState {
    fn default() -> Self {
        Self { conn_handle: CONN_HANDLE_NONE, bd_addr: None }
    }
}

impl MirrorAclState {
    pub fn is_connected(&self) -> bool {
        self.conn_handle != CONN_HANDLE_NONE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MirrorEscoState {
    pub conn_handle: u16,
    pub wesco: u8,
    pub codec_mode: CodecMode,
    pub voice_source: AudioSource,
    pub volume: u8,
}

impl Default for MirrorEscoState {
    fn default() -> Self {
        Self {
            conn_handle: CONN_HANDLE_NONE,
            wesco: 0,
            codec_mode: CodecMode::None,
            voice_source: AudioSource::None,
            volume: 0,
        }
    }
}

impl MirrorEscoState {
    pub fn is_connected(&self) -> bool {
        self.conn_handle != CONN_HANDLE_NONE
    }
}

/// A prepare/activate handshake record deferred until the peer-signalling
/// context update has been forwarded (spec §4.2.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeferredSyncResponse {
    pub task: u32,
    pub id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PerSourceA2dpState {
    pub sync_state: Option<SourceSyncState>,
    pub deferred_prepare: Option<DeferredSyncResponse>,
    pub deferred_activate: Option<DeferredSyncResponse>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MirrorA2dpState {
    pub l2cap_cid: u16,
    pub mtu: u16,
    pub seid: u8,
    pub q2q_mode: bool,
    pub sample_rate: u32,
    pub content_protection: bool,
    pub audio_source: AudioSource,
    pub source_a: PerSourceA2dpState,
    pub source_b: PerSourceA2dpState,
    pub aptx_adaptive_features: u32,
}

impl Default for MirrorA2dpState {
    fn default() -> Self {
        Self {
            l2cap_cid: L2CAP_CID_INVALID,
            mtu: 0,
            seid: 0,
            q2q_mode: false,
            sample_rate: 0,
            content_protection: false,
            audio_source: AudioSource::None,
            source_a: PerSourceA2dpState::default(),
            source_b: PerSourceA2dpState::default(),
            aptx_adaptive_features: 0,
        }
    }
}

impl MirrorA2dpState {
    pub fn is_connected(&self) -> bool {
        self.l2cap_cid != L2CAP_CID_INVALID
    }

    pub fn sync_state_for(&self, source: AudioSource) -> Option<SourceSyncState> {
        match source {
            AudioSource::A2dp1 => self.source_a.sync_state,
            AudioSource::A2dp2 => self.source_b.sync_state,
            AudioSource::None => None,
        }
    }
}

/// Sub-state membership bits, carried on the composite discriminant so
/// `is_steady`/`is_connecting`/`is_disconnecting` are bitmask tests
/// (spec §9: "encode sub-state membership as a bitmask").
#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateMembership {
    Steady = 1 << 0,
    Connecting = 1 << 1,
    Disconnecting = 1 << 2,
    EscoTier = 1 << 3,
    A2dpTier = 1 << 4,
}

pub type MembershipSet = BitFlags<StateMembership>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MirrorState {
    Disconnected,
    Switch,
    AclConnecting,
    AclConnected,
    AclDisconnecting,
    EscoConnecting,
    EscoConnected,
    EscoDisconnecting,
    A2dpConnecting,
    A2dpConnected,
    A2dpRouted,
    A2dpDisconnecting,
}

impl MirrorState {
    pub fn membership(self) -> MembershipSet {
        use MirrorState::*;
        use StateMembership::*;
        match self {
            Disconnected | Switch | AclConnected | EscoConnected | A2dpConnected | A2dpRouted => {
                Steady.into()
            }
            AclConnecting => Connecting.into(),
            AclDisconnecting => Disconnecting.into(),
            EscoConnecting => Connecting | EscoTier,
            EscoDisconnecting => Disconnecting | EscoTier,
            A2dpConnecting => Connecting | A2dpTier,
            A2dpDisconnecting => Disconnecting | A2dpTier,
        }
    }

    /// Steady = transition lock clear (spec §4.2, testable property 1).
    pub fn is_steady(self) -> bool {
        self.membership().contains(StateMembership::Steady)
    }
}

/// Derived ambition for the mirror SM (spec §4.2.1); `Disconnected` subsumes
/// "no valid target" the same way the transition table treats it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorTarget {
    Disconnected,
    Switch,
    AclConnected,
    A2dpConnected,
    A2dpRouted,
    EscoConnected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steady_states_match_spec_list() {
        for s in [
            MirrorState::Disconnected,
            MirrorState::Switch,
            MirrorState::AclConnected,
            MirrorState::EscoConnected,
            MirrorState::A2dpConnected,
            MirrorState::A2dpRouted,
        ] {
            assert!(s.is_steady(), "{s:?} should be steady");
        }
        for s in [
            MirrorState::AclConnecting,
            MirrorState::AclDisconnecting,
            MirrorState::EscoConnecting,
            MirrorState::EscoDisconnecting,
            MirrorState::A2dpConnecting,
            MirrorState::A2dpDisconnecting,
        ] {
            assert!(!s.is_steady(), "{s:?} should not be steady");
        }
    }

    #[test]
    fn codec_mode_speedy_round_trip() {
        let bytes = CodecMode::Wb.write_to_vec_with_ctx(speedy::Endianness::LittleEndian).unwrap();
        let back: CodecMode =
            CodecMode::read_from_buffer_with_ctx(speedy::Endianness::LittleEndian, &bytes).unwrap();
        assert_eq!(back, CodecMode::Wb);
    }
}
