//! Subframe Status Tracking
//!
//! Per-carrier result rings with token admission, ticket-ordered shutdown
//! draining, and the cross-carrier view used for usage reports and rate
//! prediction.

pub mod ring;
pub mod ticket;
pub mod usage;
pub mod carrier_group;

pub use carrier_group::CarrierGroup;
pub use ring::{SlotState, StatusRing};
pub use ticket::TicketDrain;
pub use usage::{CarrierReport, RateEstimate, StatusReport, UsageSample};
