use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::http_client::{HttpAuth, HttpClient, HttpRequest, NoopHttpClient};
use crate::provider::{ProviderError, ProviderFuture, ProviderPayload, TrackingProvider};
use crate::registry::ProviderDescriptor;
use crate::{IdentifierType, ShipmentStatus, TimelineEvent, TrackingNumber};

use super::{ensure_success, mock_payload, non_blank, parse_timestamp};

const API_KEY_HEADER: &str = "X-API-Key";

/// Direct carrier REST integration.
#[derive(Clone)]
pub struct CarrierApiAdapter {
    descriptor: ProviderDescriptor,
    carrier: String,
    http_client: Arc<dyn HttpClient>,
    auth: HttpAuth,
}

impl CarrierApiAdapter {
    /// Offline adapter that answers with deterministic data.
    pub fn mock(descriptor: ProviderDescriptor, carrier: impl Into<String>) -> Self {
        Self {
            descriptor,
            carrier: carrier.into(),
            http_client: Arc::new(NoopHttpClient),
            auth: HttpAuth::None,
        }
    }

    pub fn with_http_client(
        descriptor: ProviderDescriptor,
        carrier: impl Into<String>,
        http_client: Arc<dyn HttpClient>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            descriptor,
            carrier: carrier.into(),
            http_client,
            auth: HttpAuth::Header {
                name: String::from(API_KEY_HEADER),
                value: api_key.into(),
            },
        }
    }

    fn endpoint(&self, identifier: &TrackingNumber, identifier_type: IdentifierType) -> String {
        format!(
            "{}/tracking/{}/{}",
            self.descriptor.base_url.trim_end_matches('/'),
            identifier_type,
            urlencoding::encode(identifier.as_str())
        )
    }

    fn normalize(&self, body: &str) -> Result<ProviderPayload, ProviderError> {
        let response: CarrierTrackingResponse = serde_json::from_str(body)
            .map_err(|error| ProviderError::InvalidPayload(format!("{}: {error}", self.descriptor.name)))?;

        let provider = self.descriptor.name.as_str();
        let mut events = response
            .events
            .into_iter()
            .filter_map(|event| {
                let timestamp = parse_timestamp(provider, &event.timestamp)?;
                let status = ShipmentStatus::normalize(&event.status);
                let mut normalized = TimelineEvent::new(timestamp, status, event.location);
                if let Some(description) = non_blank(event.description) {
                    normalized = normalized.with_description(description);
                }
                if let Some(vessel) = non_blank(event.vessel) {
                    normalized = normalized.with_vessel(vessel);
                }
                Some(normalized)
            })
            .collect::<Vec<_>>();
        events.sort_by_key(|event| event.timestamp);

        Ok(ProviderPayload {
            carrier: non_blank(response.carrier).or_else(|| {
                (!events.is_empty() || response.status.is_some()).then(|| self.carrier.clone())
            }),
            status: response.status.as_deref().map(ShipmentStatus::normalize),
            vessel: non_blank(response.vessel),
            origin: non_blank(response.origin),
            destination: non_blank(response.destination),
            eta: response
                .eta
                .as_deref()
                .and_then(|raw| parse_timestamp(provider, raw)),
            events,
        })
    }
}

impl TrackingProvider for CarrierApiAdapter {
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
            let request = HttpRequest::get(self.endpoint(identifier, identifier_type))
                .with_header("accept", "application/json")
                .with_auth(&self.auth)
                .with_timeout(timeout);

            let response = self
                .http_client
                .execute(request)
                .await
                .map_err(|error| error.into_provider_error(timeout))?;

            if self.http_client.is_mock() {
                return Ok(mock_payload(&self.carrier, identifier, identifier_type));
            }

            ensure_success(&response)?;
            self.normalize(&response.body)
        })
    }
}

#[derive(Debug, Deserialize)]
struct CarrierTrackingResponse {
    #[serde(default)]
    carrier: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    vessel: Option<String>,
    #[serde(default)]
    origin: Option<String>,
    #[serde(default)]
    destination: Option<String>,
    #[serde(default)]
    eta: Option<String>,
    #[serde(default)]
    events: Vec<CarrierEvent>,
}

#[derive(Debug, Deserialize)]
struct CarrierEvent {
    timestamp: String,
    status: String,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    vessel: Option<String>,
}
