//! Reconciles per-provider results into one [`ShipmentRecord`].
//!
//! Results arrive in priority order. The first usable result is the primary
//! source: its carrier and current status win even when a later provider
//! disagrees. Service fields the primary leaves empty are filled from later
//! sources. Timelines are unioned, deduplicated on
//! `(timestamp, status, location)` and sorted ascending.

use std::collections::HashSet;

use crate::provider::{ProviderPayload, RawProviderResult};
use crate::{ShipmentRecord, ShipmentStatus, TimelineEvent};

/// Merges usable results; `None` when no input is a success or partial.
pub fn merge(results: &[RawProviderResult]) -> Option<ShipmentRecord> {
    let usable = results
        .iter()
        .filter(|result| result.is_usable())
        .filter_map(|result| result.payload.as_ref().map(|payload| (result, payload)))
        .collect::<Vec<_>>();

    let (primary, primary_payload) = *usable.first()?;
    let payloads = usable.iter().map(|(_, payload)| *payload).collect::<Vec<_>>();

    let timeline = merge_timelines(&payloads);
    let status = primary_payload
        .status
        .or_else(|| first_present(&payloads, |payload| payload.status))
        .or_else(|| timeline.last().map(|event| event.status))
        .unwrap_or(ShipmentStatus::Unknown);

    Some(ShipmentRecord {
        identifier: primary.identifier.clone(),
        identifier_type: primary.identifier_type,
        carrier: first_present(&payloads, |payload| payload.carrier.clone()),
        status,
        timeline,
        data_source: primary.provider.clone(),
        reliability: primary.reliability,
        last_updated: primary.timestamp,
        vessel: first_present(&payloads, |payload| payload.vessel.clone()),
        origin: first_present(&payloads, |payload| payload.origin.clone()),
        destination: first_present(&payloads, |payload| payload.destination.clone()),
        eta: first_present(&payloads, |payload| payload.eta),
    })
}

fn first_present<T>(
    payloads: &[&ProviderPayload],
    field: impl Fn(&ProviderPayload) -> Option<T>,
) -> Option<T> {
    payloads.iter().find_map(|payload| field(*payload))
}

fn merge_timelines(payloads: &[&ProviderPayload]) -> Vec<TimelineEvent> {
    let mut seen = HashSet::new();
    let mut timeline = Vec::new();

    for event in payloads.iter().flat_map(|payload| payload.events.iter()) {
        if seen.insert(event.dedup_key()) {
            timeline.push(event.clone());
        }
    }

    // Stable: equal timestamps keep priority order.
    timeline.sort_by_key(|event| event.timestamp);
    timeline
}
