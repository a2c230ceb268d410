//! Primary/Secondary role selection, mirror-profile link replication, and
//! VA capture orchestration for a true-wireless earbud.
//!
//! Four cooperating components, each owned by a single task in the
//! cooperative event loop (spec §5):
//! - [`peer_link_policy`]: the peer-mode link-policy sub-SM (C1).
//! - [`mirror`]: the mirror-profile main SM (C2).
//! - [`va`]: the VA capture SM (C3).
//! - [`topology`]: the topology / goal engine (C4).

pub mod config;
pub mod device;
pub mod error;
pub mod event_loop;
pub mod mirror;
pub mod peer_link_policy;
pub mod rule_event;
pub mod signalling;
pub mod topology;
pub mod va;

pub use config::Config;
pub use error::{CoreError, CoreResult, MirrorError, TopologyError, VaError};
