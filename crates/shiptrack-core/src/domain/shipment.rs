use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::{IdentifierType, TrackingNumber, UtcDateTime};

/// Canonical shipment milestone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    Booked,
    GateIn,
    Loaded,
    Departed,
    InTransit,
    Transshipment,
    Arrived,
    Discharged,
    GateOut,
    Delivered,
    EmptyReturned,
    Exception,
    Unknown,
}

impl ShipmentStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Booked => "booked",
            Self::GateIn => "gate_in",
            Self::Loaded => "loaded",
            Self::Departed => "departed",
            Self::InTransit => "in_transit",
            Self::Transshipment => "transshipment",
            Self::Arrived => "arrived",
            Self::Discharged => "discharged",
            Self::GateOut => "gate_out",
            Self::Delivered => "delivered",
            Self::EmptyReturned => "empty_returned",
            Self::Exception => "exception",
            Self::Unknown => "unknown",
        }
    }

    /// Maps a provider's free-form status or event label onto the canonical set.
    pub fn normalize(raw: &str) -> Self {
        let value = raw.trim().to_ascii_lowercase().replace(['-', ' '], "_");

        // Order matters: "empty_returned" must win over "returned", "unload" over "load".
        if contains_any(&value, &["empty_return", "empty_in", "returned_empty"]) {
            Self::EmptyReturned
        } else if contains_any(&value, &["deliver"]) {
            Self::Delivered
        } else if contains_any(&value, &["gate_out", "gateout", "picked_up", "released"]) {
            Self::GateOut
        } else if contains_any(&value, &["gate_in", "gatein", "received"]) {
            Self::GateIn
        } else if contains_any(&value, &["discharg", "unload"]) {
            Self::Discharged
        } else if contains_any(&value, &["transship"]) {
            Self::Transshipment
        } else if contains_any(&value, &["arriv", "berth"]) {
            Self::Arrived
        } else if contains_any(&value, &["depart", "sail"]) {
            Self::Departed
        } else if contains_any(&value, &["load", "on_board", "onboard"]) {
            Self::Loaded
        } else if contains_any(&value, &["transit", "en_route", "underway"]) {
            Self::InTransit
        } else if contains_any(&value, &["book", "confirm"]) {
            Self::Booked
        } else if contains_any(&value, &["exception", "hold", "delay", "damage"]) {
            Self::Exception
        } else {
            Self::Unknown
        }
    }
}

impl Display for ShipmentStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn contains_any(value: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| value.contains(needle))
}

/// One reported milestone on a shipment's timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    pub timestamp: UtcDateTime,
    pub status: ShipmentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vessel: Option<String>,
}

impl TimelineEvent {
    pub fn new(timestamp: UtcDateTime, status: ShipmentStatus, location: Option<String>) -> Self {
        Self {
            timestamp,
            status,
            location: location
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty()),
            description: None,
            vessel: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_vessel(mut self, vessel: impl Into<String>) -> Self {
        self.vessel = Some(vessel.into());
        self
    }

    /// Identity used for cross-source deduplication.
    pub fn dedup_key(&self) -> (UtcDateTime, ShipmentStatus, Option<&str>) {
        (self.timestamp, self.status, self.location.as_deref())
    }
}

/// Canonical, merged view of a shipment.
///
/// `timeline` is sorted ascending by timestamp and holds no two events with
/// the same `(timestamp, status, location)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentRecord {
    pub identifier: TrackingNumber,
    pub identifier_type: IdentifierType,
    pub carrier: Option<String>,
    pub status: ShipmentStatus,
    pub timeline: Vec<TimelineEvent>,
    pub data_source: String,
    pub reliability: f64,
    pub last_updated: UtcDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vessel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta: Option<UtcDateTime>,
}

impl ShipmentRecord {
    pub fn latest_event(&self) -> Option<&TimelineEvent> {
        self.timeline.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_common_provider_labels() {
        assert_eq!(ShipmentStatus::normalize("Vessel Departure"), ShipmentStatus::Departed);
        assert_eq!(ShipmentStatus::normalize("LOADED_ON_VESSEL"), ShipmentStatus::Loaded);
        assert_eq!(ShipmentStatus::normalize("Gate out full"), ShipmentStatus::GateOut);
        assert_eq!(ShipmentStatus::normalize("Empty returned"), ShipmentStatus::EmptyReturned);
        assert_eq!(ShipmentStatus::normalize("Discharged at POD"), ShipmentStatus::Discharged);
        assert_eq!(ShipmentStatus::normalize("in-transit"), ShipmentStatus::InTransit);
        assert_eq!(ShipmentStatus::normalize("???"), ShipmentStatus::Unknown);
    }

    #[test]
    fn event_location_is_trimmed_and_blank_dropped() {
        let ts = UtcDateTime::parse("2024-03-01T08:00:00Z").expect("valid");
        let event = TimelineEvent::new(ts, ShipmentStatus::GateIn, Some(String::from("  ")));
        assert_eq!(event.location, None);

        let event = TimelineEvent::new(ts, ShipmentStatus::GateIn, Some(String::from(" Rotterdam ")));
        assert_eq!(event.location.as_deref(), Some("Rotterdam"));
    }
}
