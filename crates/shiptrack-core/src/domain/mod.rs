//! # Domain Models
//!
//! Canonical domain types for shipment tracking.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`TrackingNumber`] | Validated container/booking/BoL/vessel number |
//! | [`IdentifierType`] | Kind of tracking number |
//! | [`ShipmentStatus`] | Closed set of shipment milestones |
//! | [`TimelineEvent`] | One reported milestone |
//! | [`ShipmentRecord`] | Canonical merged shipment view |
//! | [`UtcDateTime`] | UTC timestamp |
//!
//! Identifiers are validated at construction, so a `TrackingNumber` in hand
//! is always 3 to 50 uppercase ASCII alphanumerics, `-` or `_`.

mod identifier;
mod shipment;
mod timestamp;

pub use identifier::{IdentifierType, TrackingNumber};
pub use shipment::{ShipmentRecord, ShipmentStatus, TimelineEvent};
pub use timestamp::UtcDateTime;
