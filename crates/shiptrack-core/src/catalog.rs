//! Built-in provider catalog and the registry builder.
//!
//! # Environment Variables
//!
//! | Provider | Primary Env Var | Fallback Env Var |
//! |----------|----------------|------------------|
//! | Maersk | `SHIPTRACK_MAERSK_API_KEY` | `MAERSK_API_KEY` |
//! | Hapag-Lloyd | `SHIPTRACK_HAPAG_LLOYD_API_KEY` | `HAPAG_LLOYD_API_KEY` |
//! | CMA CGM | `SHIPTRACK_CMA_CGM_API_KEY` | `CMA_CGM_API_KEY` |
//! | ShipsGo | `SHIPTRACK_SHIPSGO_API_KEY` | `SHIPSGO_API_KEY` |
//! | SeaRates | `SHIPTRACK_SEARATES_API_KEY` | `SEARATES_API_KEY` |
//! | VesselFinder | `SHIPTRACK_VESSELFINDER_API_KEY` | `VESSELFINDER_API_KEY` |
//!
//! A provider without a key is registered but never selected.
//!
//! ```rust,ignore
//! use shiptrack_core::ProviderRegistryBuilder;
//!
//! let registry = ProviderRegistryBuilder::new().with_real_clients().build()?;
//! let offline = ProviderRegistryBuilder::new().with_mock_mode().build()?;
//! ```

use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::adapters::{AggregatorAdapter, CarrierApiAdapter};
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::provider::TrackingProvider;
use crate::registry::{CostTier, ProviderDescriptor, ProviderRegistry};
use crate::{CoreError, IdentifierType, ValidationError};

/// Which adapter family serves a catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderFamily {
    Carrier,
    Aggregator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(flatten)]
    pub descriptor: ProviderDescriptor,
    pub family: ProviderFamily,
    /// Carrier label reported when the upstream omits one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carrier: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderCatalog {
    pub providers: Vec<CatalogEntry>,
}

impl Default for ProviderCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ProviderCatalog {
    pub fn builtin() -> Self {
        use IdentifierType::{Bol, Booking, Container, Vessel};

        let carrier = |descriptor: ProviderDescriptor, label: &str| CatalogEntry {
            descriptor,
            family: ProviderFamily::Carrier,
            carrier: Some(label.to_owned()),
        };
        let aggregator = |descriptor: ProviderDescriptor| CatalogEntry {
            descriptor: descriptor.with_aggregator(true),
            family: ProviderFamily::Aggregator,
            carrier: None,
        };

        Self {
            providers: vec![
                carrier(
                    ProviderDescriptor::new("maersk", "https://api.maersk.com/track-and-trace")
                        .with_cost_tier(CostTier::Free)
                        .with_reliability(0.95)
                        .with_rate_limit(60, 1_000)
                        .with_timeout(Duration::from_secs(8))
                        .with_retry_attempts(1)
                        .with_supported_types(vec![Container, Booking, Bol]),
                    "MAERSK",
                ),
                carrier(
                    ProviderDescriptor::new("hapag_lloyd", "https://api.hlag.com/hlag/external/v2")
                        .with_cost_tier(CostTier::Free)
                        .with_reliability(0.92)
                        .with_rate_limit(30, 500)
                        .with_timeout(Duration::from_secs(8))
                        .with_retry_attempts(1)
                        .with_supported_types(vec![Container, Booking, Bol]),
                    "HAPAG-LLOYD",
                ),
                carrier(
                    ProviderDescriptor::new("cma_cgm", "https://apis.cma-cgm.net/operation/trackandtrace/v1")
                        .with_cost_tier(CostTier::Freemium)
                        .with_reliability(0.85)
                        .with_rate_limit(20, 300)
                        .with_timeout(Duration::from_secs(10))
                        .with_supported_types(vec![Container, Booking, Bol]),
                    "CMA CGM",
                ),
                aggregator(
                    ProviderDescriptor::new("shipsgo", "https://shipsgo.com/api")
                        .with_cost_tier(CostTier::Paid)
                        .with_reliability(0.88)
                        .with_rate_limit(30, 1_000)
                        .with_timeout(Duration::from_secs(12))
                        .with_retry_attempts(1)
                        .with_supported_types(vec![Container, Bol]),
                ),
                aggregator(
                    ProviderDescriptor::new("searates", "https://tracking.searates.com")
                        .with_cost_tier(CostTier::Paid)
                        .with_reliability(0.90)
                        .with_rate_limit(20, 500)
                        .with_timeout(Duration::from_secs(12))
                        .with_supported_types(vec![Container, Booking, Bol]),
                ),
                carrier(
                    ProviderDescriptor::new("vesselfinder", "https://api.vesselfinder.com")
                        .with_cost_tier(CostTier::Freemium)
                        .with_reliability(0.78)
                        .with_rate_limit(10, 200)
                        .with_timeout(Duration::from_secs(6))
                        .with_supported_types(vec![Vessel]),
                    "VESSELFINDER",
                ),
            ],
        }
    }

    /// Parses a catalog file. Credentials are never read from it.
    pub fn from_json(input: &str) -> Result<Self, CoreError> {
        let catalog: Self = serde_json::from_str(input)?;
        for entry in &catalog.providers {
            entry.descriptor.validate()?;
        }
        Ok(catalog)
    }

    pub fn entry(&self, name: &str) -> Option<&CatalogEntry> {
        self.providers
            .iter()
            .find(|entry| entry.descriptor.name == name)
    }
}

/// Builds a [`ProviderRegistry`] from the catalog and available credentials.
#[derive(Default)]
pub struct ProviderRegistryBuilder {
    catalog: ProviderCatalog,
    use_mock: bool,
    api_keys: HashMap<String, String>,
    enabled: HashMap<String, bool>,
    http_client: Option<Arc<dyn HttpClient>>,
}

impl ProviderRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every provider uses the offline transport and counts as credentialed.
    pub fn with_mock_mode(mut self) -> Self {
        self.use_mock = true;
        self
    }

    /// Real HTTP transport with keys read from the environment.
    pub fn with_real_clients(self) -> Self {
        self.with_real_clients_from(|key| env::var(key).ok())
    }

    /// Same as [`ProviderRegistryBuilder::with_real_clients`] with an injectable variable source.
    pub fn with_real_clients_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        self.use_mock = false;
        for entry in &self.catalog.providers {
            let name = &entry.descriptor.name;
            if self.api_keys.contains_key(name) {
                continue;
            }
            let suffix = format!("{}_API_KEY", name.to_ascii_uppercase());
            let key = lookup(&format!("SHIPTRACK_{suffix}"))
                .or_else(|| lookup(&suffix))
                .filter(|key| !key.trim().is_empty());
            if let Some(key) = key {
                self.api_keys.insert(name.clone(), key);
            }
        }
        self
    }

    pub fn with_api_key(mut self, provider: impl Into<String>, key: impl Into<String>) -> Self {
        self.api_keys.insert(provider.into(), key.into());
        self
    }

    pub fn with_provider_enabled(mut self, provider: impl Into<String>, enabled: bool) -> Self {
        self.enabled.insert(provider.into(), enabled);
        self
    }

    pub fn with_catalog(mut self, catalog: ProviderCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Overrides the transport used in real mode.
    pub fn with_http_client(mut self, http_client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(http_client);
        self
    }

    pub fn build(self) -> Result<ProviderRegistry, ValidationError> {
        for name in self.enabled.keys() {
            if self.catalog.entry(name).is_none() {
                return Err(ValidationError::UnknownProvider { name: name.clone() });
            }
        }

        let http_client = self
            .http_client
            .clone()
            .unwrap_or_else(|| Arc::new(ReqwestHttpClient::new()));

        let providers = self
            .catalog
            .providers
            .iter()
            .filter(|entry| {
                self.enabled
                    .get(&entry.descriptor.name)
                    .copied()
                    .unwrap_or(true)
            })
            .map(|entry| self.adapter(entry, &http_client))
            .collect::<Vec<_>>();

        ProviderRegistry::new(providers)
    }

    fn adapter(&self, entry: &CatalogEntry, http_client: &Arc<dyn HttpClient>) -> Arc<dyn TrackingProvider> {
        let name = entry.descriptor.name.as_str();
        let label = entry
            .carrier
            .clone()
            .unwrap_or_else(|| name.to_ascii_uppercase());

        if self.use_mock {
            let descriptor = entry.descriptor.clone().with_credential(true);
            return match entry.family {
                ProviderFamily::Carrier => Arc::new(CarrierApiAdapter::mock(descriptor, label)),
                ProviderFamily::Aggregator => Arc::new(AggregatorAdapter::mock(descriptor)),
            };
        }

        let key = self.api_keys.get(name);
        debug!(provider = name, has_credential = key.is_some(), "registering provider");
        let descriptor = entry.descriptor.clone().with_credential(key.is_some());
        let key = key.cloned().unwrap_or_default();

        match entry.family {
            ProviderFamily::Carrier => Arc::new(CarrierApiAdapter::with_http_client(
                descriptor,
                label,
                Arc::clone(http_client),
                key,
            )),
            ProviderFamily::Aggregator => Arc::new(AggregatorAdapter::with_http_client(
                descriptor,
                Arc::clone(http_client),
                key,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::NoopHttpClient;

    fn names(registry: &ProviderRegistry, identifier_type: Option<IdentifierType>) -> Vec<String> {
        registry
            .list_providers(identifier_type)
            .into_iter()
            .map(|descriptor| descriptor.name)
            .collect()
    }

    #[test]
    fn builtin_catalog_is_valid() {
        let catalog = ProviderCatalog::builtin();
        assert_eq!(catalog.providers.len(), 6);
        assert!(catalog
            .providers
            .iter()
            .all(|entry| entry.descriptor.validate().is_ok()));
    }

    #[test]
    fn mock_mode_credentials_every_provider() {
        let registry = ProviderRegistryBuilder::new()
            .with_mock_mode()
            .build()
            .expect("valid registry");

        assert_eq!(registry.list_providers(None).len(), 6);
        assert_eq!(names(&registry, Some(IdentifierType::Vessel)), vec!["vesselfinder"]);
    }

    #[test]
    fn real_mode_only_credentials_providers_with_keys() {
        let registry = ProviderRegistryBuilder::new()
            .with_http_client(Arc::new(NoopHttpClient))
            .with_real_clients_from(|key| match key {
                "SHIPTRACK_MAERSK_API_KEY" => Some(String::from("primary")),
                "SHIPSGO_API_KEY" => Some(String::from("fallback")),
                "SHIPTRACK_SEARATES_API_KEY" => Some(String::from("  ")),
                _ => None,
            })
            .build()
            .expect("valid registry");

        assert_eq!(names(&registry, None), vec!["maersk", "shipsgo"]);
        assert_eq!(registry.len(), 6);
    }

    #[test]
    fn explicit_keys_and_disabled_providers_apply() {
        let registry = ProviderRegistryBuilder::new()
            .with_http_client(Arc::new(NoopHttpClient))
            .with_api_key("cma_cgm", "key")
            .with_api_key("maersk", "key")
            .with_provider_enabled("maersk", false)
            .build()
            .expect("valid registry");

        assert_eq!(names(&registry, None), vec!["cma_cgm"]);
        assert!(registry.provider("maersk").is_none());
    }

    #[test]
    fn unknown_provider_toggle_is_rejected() {
        let result = ProviderRegistryBuilder::new()
            .with_provider_enabled("evergreen", true)
            .build();

        assert!(matches!(
            result.err(),
            Some(ValidationError::UnknownProvider { .. })
        ));
    }

    #[test]
    fn catalog_loads_from_json_without_credentials() {
        let json = r#"{
            "providers": [{
                "name": "one_line",
                "base_url": "https://ecomm.one-line.test",
                "rate_limit": { "per_minute": 10, "per_hour": 100 },
                "reliability": 0.83,
                "timeout_ms": 5000,
                "retry_attempts": 0,
                "supported_types": ["container", "booking"],
                "cost_tier": "free",
                "family": "carrier",
                "carrier": "ONE"
            }]
        }"#;

        let catalog = ProviderCatalog::from_json(json).expect("valid catalog");
        let entry = catalog.entry("one_line").expect("entry present");
        assert_eq!(entry.family, ProviderFamily::Carrier);
        assert!(!entry.descriptor.has_credential);
        assert_eq!(entry.descriptor.timeout, Duration::from_secs(5));
    }

    #[test]
    fn catalog_rejects_invalid_reliability() {
        let json = r#"{
            "providers": [{
                "name": "broken",
                "base_url": "https://broken.test",
                "rate_limit": { "per_minute": 10, "per_hour": 100 },
                "reliability": 1.4,
                "timeout_ms": 5000,
                "retry_attempts": 0,
                "supported_types": ["container"],
                "cost_tier": "paid",
                "family": "aggregator"
            }]
        }"#;

        assert!(matches!(
            ProviderCatalog::from_json(json),
            Err(CoreError::Validation(ValidationError::ReliabilityOutOfRange { .. }))
        ));
    }
}
