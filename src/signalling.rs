//! Peer-signalling channel payloads (spec §6.1).
//!
//! Three marshalled channels run over the peer link: topology, mirror, and
//! DFU. Each carries a closed set of typed messages with a single incoming
//! and a single outgoing task. The teacher marshals its RTPS wire types with
//! `speedy`'s `Readable`/`Writable` derive over a CDR-like little-endian
//! stream; these messages reuse that derive rather than `cdr-encoding`,
//! since there is no RTPS/DDS interop requirement on this link - just two
//! earbuds speaking a private protocol - and `serde` is kept alongside for
//! any host-side tooling that wants JSON instead of the wire form.

use serde::{Deserialize, Serialize};
use speedy::{Readable, Writable};

use crate::mirror::state::CodecMode;

/// `remote-rule-event { events: u64 }` (spec §6.1): injects a rule event
/// set on the peer's topology task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Readable, Writable, Serialize, Deserialize)]
pub struct RemoteRuleEvent {
    pub events: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Readable, Writable, Serialize, Deserialize)]
pub struct HfpVolume {
    pub volume: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Readable, Writable, Serialize, Deserialize)]
pub struct HfpCodecVolume {
    pub codec_mode: CodecMode,
    pub volume: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Readable, Writable, Serialize, Deserialize)]
pub struct A2dpVolume {
    pub volume: u8,
}

/// An updated A2DP stream context, propagated ahead of a mirror start so the
/// Secondary never begins with stale parameters (spec §4.2.5's "stream-change
/// lock" defers local kicks while this is in flight).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Readable, Writable, Serialize, Deserialize)]
pub struct A2dpStreamContext {
    pub seid: u8,
    pub sample_rate: u32,
    pub q2q_mode: bool,
    /// Whether the sender wants an ack back on the same channel.
    pub ack_requested: bool,
}

/// Raised by the Secondary when its local Kymera graph actually starts the
/// mirrored SCO, letting the Primary resolve the sco-sync lock (spec §4.2.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Readable, Writable, Serialize, Deserialize)]
pub struct KymeraScoStarted {
    pub conn_handle: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Readable, Writable, Serialize, Deserialize)]
pub enum MirrorMessage {
    HfpVolume(HfpVolume),
    HfpCodecVolume(HfpCodecVolume),
    A2dpVolume(A2dpVolume),
    A2dpStreamContext(A2dpStreamContext),
    KymeraScoStarted(KymeraScoStarted),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Readable, Writable, Serialize, Deserialize)]
pub struct PeerEraseReq {
    /// Opaque DFU-partition request payload; `None` acts as a bare poll.
    pub req: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Readable, Writable, Serialize, Deserialize)]
pub struct PeerEraseRes {
    pub status: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Readable, Writable, Serialize, Deserialize)]
pub struct PeerSetContext {
    pub context: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Readable, Writable, Serialize, Deserialize)]
pub enum DfuMessage {
    PeerEraseReq(PeerEraseReq),
    PeerEraseRes(PeerEraseRes),
    PeerDeviceNotInUse,
    PeerSetContext(PeerSetContext),
}

/// The three marshalled channels (spec §6.1); each is delivered on its own
/// task with a single incoming and single outgoing side, so this is kept as
/// a sum type per channel rather than one big enum - matching the teacher's
/// per-builtin-endpoint message framing in `dds::statusevents`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Readable, Writable, Serialize, Deserialize)]
pub enum PeerSignal {
    Topology(RemoteRuleEvent),
    Mirror(MirrorMessage),
    Dfu(DfuMessage),
}

#[cfg(test)]
mod tests {
    use super::*;
    use speedy::Endianness;

    #[test]
    fn remote_rule_event_round_trips_over_speedy() {
        let msg = PeerSignal::Topology(RemoteRuleEvent { events: 0xDEAD_BEEF });
        let bytes = msg.write_to_vec_with_ctx(Endianness::LittleEndian).unwrap();
        let back = PeerSignal::read_from_buffer_with_ctx(Endianness::LittleEndian, &bytes).unwrap();
        assert_eq!(msg, back);
    }

    #[test]
    fn mirror_stream_context_round_trips() {
        let msg = PeerSignal::Mirror(MirrorMessage::A2dpStreamContext(A2dpStreamContext {
            seid: 3,
            sample_rate: 48_000,
            q2q_mode: false,
            ack_requested: true,
        }));
        let bytes = msg.write_to_vec_with_ctx(Endianness::LittleEndian).unwrap();
        let back = PeerSignal::read_from_buffer_with_ctx(Endianness::LittleEndian, &bytes).unwrap();
        assert_eq!(msg, back);
    }
}
