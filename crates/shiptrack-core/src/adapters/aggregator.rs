use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::http_client::{HttpAuth, HttpClient, HttpRequest, NoopHttpClient};
use crate::provider::{ProviderError, ProviderFuture, ProviderPayload, TrackingProvider};
use crate::registry::ProviderDescriptor;
use crate::{IdentifierType, ShipmentStatus, TimelineEvent, TrackingNumber};

use super::{ensure_success, mock_payload, non_blank, parse_timestamp};

/// Multi-carrier aggregator integration.
///
/// Aggregators answer 200 with `"success": false` for lookups they cannot
/// serve; the message is surfaced verbatim so the classifier can read it.
#[derive(Clone)]
pub struct AggregatorAdapter {
    descriptor: ProviderDescriptor,
    http_client: Arc<dyn HttpClient>,
    auth: HttpAuth,
}

impl AggregatorAdapter {
    pub fn mock(descriptor: ProviderDescriptor) -> Self {
        Self {
            descriptor,
            http_client: Arc::new(NoopHttpClient),
            auth: HttpAuth::None,
        }
    }

    pub fn with_http_client(
        descriptor: ProviderDescriptor,
        http_client: Arc<dyn HttpClient>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            descriptor,
            http_client,
            auth: HttpAuth::BearerToken(token.into()),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/track", self.descriptor.base_url.trim_end_matches('/'))
    }

    fn normalize(&self, body: &str) -> Result<ProviderPayload, ProviderError> {
        let envelope: AggregatorEnvelope = serde_json::from_str(body)
            .map_err(|error| ProviderError::InvalidPayload(format!("{}: {error}", self.descriptor.name)))?;

        if !envelope.success {
            return Err(ProviderError::Other(
                envelope
                    .message
                    .unwrap_or_else(|| String::from("aggregator reported an unsuccessful lookup")),
            ));
        }

        let Some(data) = envelope.data else {
            return Ok(ProviderPayload::default());
        };

        let provider = self.descriptor.name.as_str();
        let mut events = data
            .milestones
            .into_iter()
            .filter_map(|milestone| {
                let timestamp = parse_timestamp(provider, &milestone.date)?;
                let status = ShipmentStatus::normalize(&milestone.event);
                let location = milestone.location.and_then(|location| location.name);
                let mut event = TimelineEvent::new(timestamp, status, location)
                    .with_description(milestone.event.trim().to_owned());
                if let Some(vessel) = non_blank(milestone.vessel_name) {
                    event = event.with_vessel(vessel);
                }
                Some(event)
            })
            .collect::<Vec<_>>();
        events.sort_by_key(|event| event.timestamp);

        let route = data.route.unwrap_or_default();
        Ok(ProviderPayload {
            carrier: non_blank(data.shipping_line),
            status: data.current_status.as_deref().map(ShipmentStatus::normalize),
            vessel: data.vessel.and_then(|vessel| non_blank(vessel.name)),
            origin: non_blank(route.pol),
            destination: non_blank(route.pod),
            eta: route.eta.as_deref().and_then(|raw| parse_timestamp(provider, raw)),
            events,
        })
    }
}

impl TrackingProvider for AggregatorAdapter {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    fn fetch<'a>(
        &'a self,
        identifier: &'a TrackingNumber,
        identifier_type: IdentifierType,
        timeout: Duration,
    ) -> ProviderFuture<'a> {
        Box::pin(async move {
            let body = serde_json::to_string(&TrackRequest {
                number: identifier.as_str(),
                kind: identifier_type,
            })
            .map_err(|error| ProviderError::Other(error.to_string()))?;

            let request = HttpRequest::post(self.endpoint())
                .with_json_body(body)
                .with_auth(&self.auth)
                .with_timeout(timeout);

            let response = self
                .http_client
                .execute(request)
                .await
                .map_err(|error| error.into_provider_error(timeout))?;

            if self.http_client.is_mock() {
                let carrier = self.descriptor.name.to_ascii_uppercase();
                return Ok(mock_payload(&carrier, identifier, identifier_type));
            }

            ensure_success(&response)?;
            self.normalize(&response.body)
        })
    }
}

#[derive(Debug, Serialize)]
struct TrackRequest<'a> {
    number: &'a str,
    #[serde(rename = "type")]
    kind: IdentifierType,
}

#[derive(Debug, Deserialize)]
struct AggregatorEnvelope {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<AggregatorShipment>,
}

fn default_success() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct AggregatorShipment {
    #[serde(default)]
    shipping_line: Option<String>,
    #[serde(default)]
    current_status: Option<String>,
    #[serde(default)]
    vessel: Option<AggregatorVessel>,
    #[serde(default)]
    route: Option<AggregatorRoute>,
    #[serde(default)]
    milestones: Vec<AggregatorMilestone>,
}

#[derive(Debug, Deserialize)]
struct AggregatorVessel {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AggregatorRoute {
    #[serde(default)]
    pol: Option<String>,
    #[serde(default)]
    pod: Option<String>,
    #[serde(default)]
    eta: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AggregatorMilestone {
    date: String,
    event: String,
    #[serde(default)]
    location: Option<AggregatorLocation>,
    #[serde(default)]
    vessel_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AggregatorLocation {
    #[serde(default)]
    name: Option<String>,
}
