//! Tunables referenced by name throughout spec.md.
//!
//! Grouped the way the original firmware's `*_config.c`/`*_config.h` pairs
//! group theirs (one config struct per subsystem); collected here into a
//! single `Config` the way the teacher collects `QosPolicies` into one
//! struct per entity rather than scattering constants through the code.

use std::time::Duration;

/// Tunables for the peer-mode link-policy sub-SM (C1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerModeConfig {
    /// Default window granted by `active-period` before reverting to sniff.
    pub default_active_period: Duration,
    /// Backoff before retrying a failed role-switch confirmation.
    pub role_switch_retry_backoff: Duration,
}

impl Default for PeerModeConfig {
    fn default() -> Self {
        Self {
            default_active_period: Duration::from_millis(1500),
            role_switch_retry_backoff: Duration::from_millis(500),
        }
    }
}

/// Tunables for the mirror-profile main SM (C2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MirrorConfig {
    /// How long to hold peer-link Active while a single BR/EDR handset is
    /// connected and a mirror connect/reconnect is in flight (spec §4.2.3).
    pub active_window_for_connect: Duration,
    /// Minimum eSCO `tesco` (in slots) that may be mirrored (spec §4.2.4).
    pub min_mirrorable_tesco: u8,
    /// How long topology waits, holding the sco-sync lock, for the mirror
    /// to become ready for a new handset before accepting the SCO locally
    /// anyway (spec §4.2.6).
    pub sco_sync_timeout: Duration,
    /// Maximum controller-level handover retries before giving up (spec §4.2.8, S5).
    pub handover_max_retries: u32,
    /// Backoff between handover retries.
    pub handover_retry_backoff: Duration,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            active_window_for_connect: Duration::from_millis(1000),
            min_mirrorable_tesco: 7,
            sco_sync_timeout: Duration::from_millis(500),
            handover_max_retries: 20,
            handover_retry_backoff: Duration::from_millis(200),
        }
    }
}

/// Tunables for the VA capture SM (C3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VaConfig {
    /// Pre-roll buffer held by the splitter ahead of WUW detection, in ms.
    pub pre_roll_ms: u32,
    /// Metadata reframing size used by the splitter (spec §4.3).
    pub metadata_reframe_size: usize,
}

impl Default for VaConfig {
    fn default() -> Self {
        Self { pre_roll_ms: 2000, metadata_reframe_size: 384 }
    }
}

/// Tunables for the topology / goal engine (C4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopologyConfig {
    /// `TwsTopologyConfig_TwsTopologyStopTimeoutS` (spec §4.4.5, S6).
    pub stop_timeout: Duration,
    /// How long `PriConnectHandset`'s internal sub-SM waits for AV streaming
    /// to stop before giving up (spec §4.4.4).
    pub streaming_stop_timeout: Duration,
    /// Delay before the in-case watchdog goal fires (spec §4.4.2).
    pub in_case_watchdog: Duration,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            stop_timeout: Duration::from_secs(5),
            streaming_stop_timeout: Duration::from_secs(30),
            in_case_watchdog: Duration::from_secs(10),
        }
    }
}

/// Every tunable used by the core, grouped by owning component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Config {
    pub peer_mode: PeerModeConfig,
    pub mirror: MirrorConfig,
    pub va: VaConfig,
    pub topology: TopologyConfig,
}
