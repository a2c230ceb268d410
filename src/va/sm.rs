//! VA capture state machine (C3, spec §4.3).
//!
//! Each transition is declared as `(event, new_state, action list)`, driven
//! through the `AudioChain` collaborator. Kept as one `match` over
//! `(state, event)` rather than a trait-object-per-state: unlike the
//! teacher's SLC procedures (a linear sequence of one-shot steps), this is
//! a genuine many-to-many transition table revisited from multiple states,
//! which a flat match represents more directly than a chain of boxed
//! successors.

use log::trace;

use crate::config::VaConfig;
use crate::error::VaError;

use super::chain::{AudioChain, ChainKind, ClockSpeed, SplitterConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaState {
    Idle,
    LiveCapturing,
    WuwDetecting,
    WuwDetectingPaused,
    WuwDetected,
    WuwCapturing,
    WuwCapturingDetectPending,
    LiveCapturingDetectPending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaEvent {
    LiveCaptureStart,
    WuwCaptureStart,
    CaptureStop,
    WuwDetectStart,
    WuwDetectStop,
    WuwDetected,
    WuwIgnoreDetected,
    MicStart,
    MicStop,
}

impl VaEvent {
    fn name(self) -> &'static str {
        match self {
            VaEvent::LiveCaptureStart => "live-capture-start",
            VaEvent::WuwCaptureStart => "wuw-capture-start",
            VaEvent::CaptureStop => "capture-stop",
            VaEvent::WuwDetectStart => "wuw-detect-start",
            VaEvent::WuwDetectStop => "wuw-detect-stop",
            VaEvent::WuwDetected => "wuw-detected",
            VaEvent::WuwIgnoreDetected => "wuw-ignore-detected",
            VaEvent::MicStart => "mic-start",
            VaEvent::MicStop => "mic-stop",
        }
    }
}

impl VaState {
    fn name(self) -> &'static str {
        match self {
            VaState::Idle => "idle",
            VaState::LiveCapturing => "live-capturing",
            VaState::WuwDetecting => "wuw-detecting",
            VaState::WuwDetectingPaused => "wuw-detecting-paused",
            VaState::WuwDetected => "wuw-detected",
            VaState::WuwCapturing => "wuw-capturing",
            VaState::WuwCapturingDetectPending => "wuw-capturing-detect-pending",
            VaState::LiveCapturingDetectPending => "live-capturing-detect-pending",
        }
    }
}

pub struct VaSm<C: AudioChain> {
    config: VaConfig,
    state: VaState,
    chain: C,
    live_sample_rate: u32,
    wuw_sample_rate: u32,
}

impl<C: AudioChain> VaSm<C> {
    pub fn new(config: VaConfig, chain: C, live_sample_rate: u32, wuw_sample_rate: u32) -> Self {
        Self { config, state: VaState::Idle, chain, live_sample_rate, wuw_sample_rate }
    }

    pub fn state(&self) -> VaState {
        self.state
    }

    pub fn chain(&self) -> &C {
        &self.chain
    }

    fn splitter_config(&self) -> SplitterConfig {
        SplitterConfig {
            buffer_size: super::chain::splitter_buffer_size(self.config.pre_roll_ms, self.wuw_sample_rate),
            use_sram: true,
            packed: true,
            metadata_reframe_size: self.config.metadata_reframe_size,
        }
    }

    /// Low-power mode is enabled iff the chain is not using multi-mic CVC
    /// (spec §4.3); this crate never drives multi-mic CVC, so the WUW
    /// states always consider low-power available.
    fn clock_for(state: VaState) -> ClockSpeed {
        match state {
            VaState::Idle | VaState::WuwDetectingPaused => ClockSpeed::Slow,
            VaState::WuwDetecting | VaState::WuwDetected => ClockSpeed::Base,
            _ => ClockSpeed::Turbo,
        }
    }

    pub fn handle(&mut self, event: VaEvent) -> Result<(), VaError> {
        use VaEvent::*;
        use VaState::*;

        trace!("va sm: {:?} -- {:?} -->", self.state, event);

        let next = match (self.state, event) {
            (Idle, LiveCaptureStart) => {
                self.chain.mark_mic_user_non_interruptible();
                self.chain.keep_dsp_on(true);
                self.chain.boost_clock();
                self.chain.update_kick_period();
                self.chain.set_sample_rate(ChainKind::Mic, self.live_sample_rate);
                self.chain.create_chain(ChainKind::Mic);
                self.chain.create_chain(ChainKind::Encode);
                self.chain.set_clock_speed(Self::clock_for(LiveCapturing));
                self.chain.keep_dsp_on(false);
                self.chain.start_chain(ChainKind::Encode);
                self.chain.start_chain(ChainKind::Mic);
                LiveCapturing
            }

            (Idle, WuwDetectStart) => {
                self.chain.keep_dsp_on(true);
                self.chain.boost_clock();
                self.chain.update_kick_period();
                self.chain.set_sample_rate(ChainKind::Mic, self.wuw_sample_rate);
                self.chain.load_downloadable_caps();
                self.chain.create_chain(ChainKind::Mic);
                self.chain.create_chain(ChainKind::Wuw);
                self.chain.connect_wuw_to_mic();
                self.chain.set_clock_speed(Self::clock_for(WuwDetecting));
                self.chain.keep_dsp_on(false);
                self.chain.configure_splitter(self.splitter_config());
                self.chain.start_chain(ChainKind::Wuw);
                self.chain.start_chain(ChainKind::Mic);
                self.chain.activate_mic_wuw_output(true);
                self.chain.start_graph_manager_delegation();
                WuwDetecting
            }

            (WuwDetecting, LiveCaptureStart) => {
                self.chain.mark_mic_user_non_interruptible();
                self.chain.stop_graph_manager_delegation();
                self.chain.activate_mic_wuw_output(false);
                self.chain.stop_chain(ChainKind::Wuw);
                self.chain.activate_mic_encode_output(false);
                self.chain.boost_clock();
                self.chain.update_kick_period();
                self.chain.create_chain(ChainKind::Encode);
                self.chain.set_clock_speed(Self::clock_for(LiveCapturingDetectPending));
                self.chain.start_chain(ChainKind::Encode);
                self.chain.activate_mic_encode_output(true);
                LiveCapturingDetectPending
            }

            (LiveCapturingDetectPending, CaptureStop) => {
                // Resumption path back to wuw-detecting (spec §4.3).
                self.chain.destroy_chain(ChainKind::Encode);
                self.chain.activate_mic_wuw_output(true);
                self.chain.mark_mic_user_interruptible();
                self.chain.start_graph_manager_delegation();
                self.chain.set_clock_speed(Self::clock_for(WuwDetecting));
                WuwDetecting
            }

            (LiveCapturingDetectPending, WuwDetectStop) => {
                // Conversion path into wuw-capturing (spec §4.3).
                self.chain.destroy_chain(ChainKind::Wuw);
                self.chain.set_clock_speed(Self::clock_for(WuwCapturing));
                WuwCapturing
            }

            (LiveCapturing, CaptureStop) => {
                self.chain.stop_chain(ChainKind::Mic);
                self.chain.stop_chain(ChainKind::Encode);
                self.chain.destroy_chain(ChainKind::Mic);
                self.chain.destroy_chain(ChainKind::Encode);
                self.chain.mark_mic_user_interruptible();
                self.chain.set_clock_speed(Self::clock_for(Idle));
                Idle
            }

            (WuwDetecting, WuwDetectStop) => {
                self.chain.stop_graph_manager_delegation();
                self.chain.activate_mic_wuw_output(false);
                self.chain.stop_chain(ChainKind::Wuw);
                self.chain.stop_chain(ChainKind::Mic);
                self.chain.destroy_chain(ChainKind::Wuw);
                self.chain.destroy_chain(ChainKind::Mic);
                self.chain.set_clock_speed(Self::clock_for(Idle));
                Idle
            }

            (WuwDetecting, WuwDetected) => {
                self.chain.mark_mic_user_non_interruptible();
                self.chain.stop_graph_manager_delegation();
                self.chain.activate_mic_wuw_output(false);
                WuwDetected
            }

            (WuwDetected, WuwIgnoreDetected) => {
                self.chain.activate_mic_wuw_output(true);
                self.chain.start_graph_manager_delegation();
                self.chain.mark_mic_user_interruptible();
                WuwDetecting
            }

            (WuwDetected, WuwCaptureStart) => {
                // wuw chain is stopped, not destroyed, until wuw-detect-stop
                // confirms the capture is staying (spec §4.3).
                self.chain.stop_chain(ChainKind::Wuw);
                self.chain.boost_clock();
                self.chain.update_kick_period();
                self.chain.create_chain(ChainKind::Encode);
                self.chain.set_clock_speed(Self::clock_for(WuwCapturingDetectPending));
                self.chain.start_chain(ChainKind::Encode);
                self.chain.activate_mic_encode_output(true);
                WuwCapturingDetectPending
            }

            (WuwCapturingDetectPending, WuwDetectStop) => {
                self.chain.destroy_chain(ChainKind::Wuw);
                self.chain.set_clock_speed(Self::clock_for(WuwCapturing));
                WuwCapturing
            }

            (WuwCapturingDetectPending, CaptureStop) => {
                // Resumption path back to wuw-detecting (spec §4.3).
                self.chain.destroy_chain(ChainKind::Encode);
                self.chain.activate_mic_wuw_output(true);
                self.chain.mark_mic_user_interruptible();
                self.chain.start_graph_manager_delegation();
                self.chain.set_clock_speed(Self::clock_for(WuwDetecting));
                WuwDetecting
            }

            (WuwCapturing, CaptureStop) => {
                self.chain.activate_mic_encode_output(false);
                self.chain.destroy_chain(ChainKind::Encode);
                self.chain.mark_mic_user_interruptible();
                self.chain.set_clock_speed(Self::clock_for(Idle));
                Idle
            }

            (WuwDetecting, MicStop) => {
                WuwDetectingPaused
            }

            (WuwDetectingPaused, MicStart) => {
                self.chain.set_clock_speed(Self::clock_for(WuwDetecting));
                WuwDetecting
            }

            (state, event) => {
                return Err(VaError::InvalidTransition { state: state.name(), event: event.name() });
            }
        };

        self.state = next;
        Ok(())
    }
}
