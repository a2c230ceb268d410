//! Audio-chain abstraction for the VA capture SM (C3, spec §4.3).
//!
//! The three chains (mic, encode, WUW) and the DSP clock/keep-on controls
//! they share are represented as one `AudioChain` collaborator trait, kept
//! out-of-scope per spec §1/§4.3 the same way `DeviceDatabase` is: the SM
//! drives it through elementary operations and never owns the DSP resources
//! directly. `MockAudioChain` is the in-crate test double, grounded in the
//! teacher's habit of keeping a trivial in-memory stand-in next to a trait
//! (`dds::statusevents`' plain struct vs. the full `DomainParticipant`).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockSpeed {
    Slow,
    Base,
    Turbo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainKind {
    Mic,
    Encode,
    Wuw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitterConfig {
    pub buffer_size: usize,
    pub use_sram: bool,
    pub packed: bool,
    pub metadata_reframe_size: usize,
}

/// `buffer-size = ceil(pre-roll-ms * sample-rate / 1000)` (spec §4.3).
pub fn splitter_buffer_size(pre_roll_ms: u32, sample_rate: u32) -> usize {
    let numerator = pre_roll_ms as u64 * sample_rate as u64;
    ((numerator + 999) / 1000) as usize
}

/// Elementary operations the VA SM issues against the audio-chain
/// collaborator; every transition's action list (spec §4.3) is built from
/// these. Kept as a trait of individual methods rather than one "apply"
/// entry point so each transition's action list reads as an ordered call
/// sequence, matching the per-verb methods on the teacher's `Peer` type.
pub trait AudioChain {
    fn mark_mic_user_non_interruptible(&mut self);
    fn mark_mic_user_interruptible(&mut self);
    fn keep_dsp_on(&mut self, on: bool);
    fn boost_clock(&mut self);
    fn set_clock_speed(&mut self, speed: ClockSpeed);
    fn update_kick_period(&mut self);
    fn set_sample_rate(&mut self, chain: ChainKind, sample_rate: u32);
    fn load_downloadable_caps(&mut self);
    fn create_chain(&mut self, chain: ChainKind);
    fn destroy_chain(&mut self, chain: ChainKind);
    fn connect_wuw_to_mic(&mut self);
    fn configure_splitter(&mut self, config: SplitterConfig);
    fn start_chain(&mut self, chain: ChainKind);
    fn stop_chain(&mut self, chain: ChainKind);
    fn activate_mic_wuw_output(&mut self, active: bool);
    fn activate_mic_encode_output(&mut self, active: bool);
    fn start_graph_manager_delegation(&mut self);
    fn stop_graph_manager_delegation(&mut self);
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MockAudioChain {
    pub mic_user_non_interruptible: bool,
    pub dsp_kept_on: bool,
    pub clock_speed_log: Vec<ClockSpeed>,
    pub live_chains: Vec<ChainKind>,
    pub wuw_output_active: bool,
    pub encode_output_active: bool,
    pub graph_manager_delegated: bool,
    pub call_log: Vec<&'static str>,
}

impl AudioChain for MockAudioChain {
    fn mark_mic_user_non_interruptible(&mut self) {
        self.mic_user_non_interruptible = true;
        self.call_log.push("mark_mic_user_non_interruptible");
    }

    fn mark_mic_user_interruptible(&mut self) {
        self.mic_user_non_interruptible = false;
        self.call_log.push("mark_mic_user_interruptible");
    }

    fn keep_dsp_on(&mut self, on: bool) {
        self.dsp_kept_on = on;
        self.call_log.push(if on { "keep_dsp_on(true)" } else { "keep_dsp_on(false)" });
    }

    fn boost_clock(&mut self) {
        self.call_log.push("boost_clock");
    }

    fn set_clock_speed(&mut self, speed: ClockSpeed) {
        self.clock_speed_log.push(speed);
        self.call_log.push("set_clock_speed");
    }

    fn update_kick_period(&mut self) {
        self.call_log.push("update_kick_period");
    }

    fn set_sample_rate(&mut self, _chain: ChainKind, _sample_rate: u32) {
        self.call_log.push("set_sample_rate");
    }

    fn load_downloadable_caps(&mut self) {
        self.call_log.push("load_downloadable_caps");
    }

    fn create_chain(&mut self, chain: ChainKind) {
        self.live_chains.push(chain);
        self.call_log.push("create_chain");
    }

    fn destroy_chain(&mut self, chain: ChainKind) {
        self.live_chains.retain(|c| *c != chain);
        self.call_log.push("destroy_chain");
    }

    fn connect_wuw_to_mic(&mut self) {
        self.call_log.push("connect_wuw_to_mic");
    }

    fn configure_splitter(&mut self, _config: SplitterConfig) {
        self.call_log.push("configure_splitter");
    }

    fn start_chain(&mut self, _chain: ChainKind) {
        self.call_log.push("start_chain");
    }

    fn stop_chain(&mut self, _chain: ChainKind) {
        self.call_log.push("stop_chain");
    }

    fn activate_mic_wuw_output(&mut self, active: bool) {
        self.wuw_output_active = active;
        self.call_log.push("activate_mic_wuw_output");
    }

    fn activate_mic_encode_output(&mut self, active: bool) {
        self.encode_output_active = active;
        self.call_log.push("activate_mic_encode_output");
    }

    fn start_graph_manager_delegation(&mut self) {
        self.graph_manager_delegated = true;
        self.call_log.push("start_graph_manager_delegation");
    }

    fn stop_graph_manager_delegation(&mut self) {
        self.graph_manager_delegated = false;
        self.call_log.push("stop_graph_manager_delegation");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splitter_buffer_size_rounds_up() {
        assert_eq!(splitter_buffer_size(2000, 16_000), 32_000);
        assert_eq!(splitter_buffer_size(1, 1), 1);
        assert_eq!(splitter_buffer_size(0, 16_000), 0);
    }
}
