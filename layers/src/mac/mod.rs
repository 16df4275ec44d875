//! Medium Access Control (MAC) View of the Monitored Cell
//!
//! Tracks which RNTIs are scheduled and turns raw blind decodes into a
//! consistent set of grants per subframe.

pub mod ue_tracker;
pub mod location_resolver;
pub mod subframe_resolver;

pub use location_resolver::LocationResolver;
pub use subframe_resolver::{GroupOutcome, PruneMethod, SubframeDecodeResult, SubframeResolver};
pub use ue_tracker::{UeActivity, UeTracker, DEFAULT_INACTIVITY_WINDOW};
