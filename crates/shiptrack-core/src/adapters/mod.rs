//! Provider families.
//!
//! | Family | Transport |
//! |--------|-----------|
//! | [`CarrierApiAdapter`] | `GET {base}/tracking/{type}/{id}` with an API-key header |
//! | [`AggregatorAdapter`] | `POST {base}/v1/track` with a bearer token and JSON body |
//!
//! Both families synthesise deterministic payloads when their transport is
//! a mock, so offline runs exercise the whole pipeline.

mod aggregator;
mod carrier;

pub use aggregator::AggregatorAdapter;
pub use carrier::CarrierApiAdapter;

use tracing::debug;

use crate::http_client::HttpResponse;
use crate::provider::{ProviderError, ProviderPayload};
use crate::{IdentifierType, ShipmentStatus, TimelineEvent, TrackingNumber, UtcDateTime};

const MAX_ERROR_BODY_CHARS: usize = 200;

const MOCK_PORTS: [&str; 6] = [
    "Shanghai",
    "Singapore",
    "Rotterdam",
    "Antwerp",
    "Los Angeles",
    "Hamburg",
];
const MOCK_VESSELS: [&str; 4] = [
    "MAERSK EDMONTON",
    "CMA CGM JACQUES SAADE",
    "EVER GIVEN",
    "HMM ALGECIRAS",
];
const MOCK_MILESTONES: [ShipmentStatus; 5] = [
    ShipmentStatus::GateIn,
    ShipmentStatus::Loaded,
    ShipmentStatus::Departed,
    ShipmentStatus::InTransit,
    ShipmentStatus::Arrived,
];
const MOCK_EPOCH: &str = "2024-01-01T00:00:00Z";

/// Rejects non-2xx responses, keeping a short body excerpt for classification.
fn ensure_success(response: &HttpResponse) -> Result<(), ProviderError> {
    if response.is_success() {
        return Ok(());
    }

    Err(ProviderError::Http {
        status: response.status,
        message: response.body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
    })
}

fn parse_timestamp(provider: &str, raw: &str) -> Option<UtcDateTime> {
    match UtcDateTime::parse(raw) {
        Ok(timestamp) => Some(timestamp),
        Err(error) => {
            debug!(provider, error = %error, "dropping event with unparseable timestamp");
            None
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn identifier_seed(identifier: &TrackingNumber) -> u64 {
    identifier.as_str().bytes().fold(17_u64, |acc, byte| {
        acc.wrapping_mul(31).wrapping_add(u64::from(byte))
    })
}

/// Deterministic payload derived from the identifier alone.
fn mock_payload(carrier: &str, identifier: &TrackingNumber, identifier_type: IdentifierType) -> ProviderPayload {
    let seed = identifier_seed(identifier);
    let epoch = UtcDateTime::parse(MOCK_EPOCH).unwrap_or_else(|_| UtcDateTime::now());
    let start = epoch.saturating_add(std::time::Duration::from_secs((seed % 90) * 86_400));

    let ports = MOCK_PORTS.len() as u64;
    let origin_index = seed % ports;
    let destination_index = (origin_index + 1 + (seed / 7) % (ports - 1)) % ports;
    let origin = MOCK_PORTS[origin_index as usize];
    let destination = MOCK_PORTS[destination_index as usize];
    let vessel = MOCK_VESSELS[((seed / 3) % MOCK_VESSELS.len() as u64) as usize];

    let milestones = 2 + (seed % 4) as usize;
    let events = MOCK_MILESTONES
        .iter()
        .take(milestones)
        .enumerate()
        .map(|(index, status)| {
            let location = if *status == ShipmentStatus::Arrived {
                destination
            } else {
                origin
            };
            let offset = std::time::Duration::from_secs(index as u64 * 2 * 86_400);
            TimelineEvent::new(start.saturating_add(offset), *status, Some(location.to_owned()))
                .with_description(format!("{status} ({identifier_type})"))
        })
        .collect::<Vec<_>>();

    ProviderPayload {
        carrier: Some(carrier.to_owned()),
        status: events.last().map(|event| event.status),
        vessel: Some(vessel.to_owned()),
        origin: Some(origin.to_owned()),
        destination: Some(destination.to_owned()),
        eta: Some(start.saturating_add(std::time::Duration::from_secs(30 * 86_400))),
        events,
    }
}
