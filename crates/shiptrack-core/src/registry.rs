//! Provider descriptors and the registry of configured providers.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::provider::TrackingProvider;
use crate::{IdentifierType, ValidationError};

/// Commercial tier of a provider, used as the first prioritization key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostTier {
    Free,
    Freemium,
    Paid,
}

impl CostTier {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Freemium => "freemium",
            Self::Paid => "paid",
        }
    }
}

impl Display for CostTier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CostTier {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "freemium" => Ok(Self::Freemium),
            "paid" => Ok(Self::Paid),
            other => Err(ValidationError::InvalidCostTier {
                value: other.to_owned(),
            }),
        }
    }
}

/// Request budget advertised by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    pub per_minute: u32,
    pub per_hour: u32,
}

impl RateLimit {
    pub const fn new(per_minute: u32, per_hour: u32) -> Self {
        Self {
            per_minute,
            per_hour,
        }
    }
}

/// Immutable description of one tracking provider, loaded at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub name: String,
    pub base_url: String,
    /// Resolved from the environment at build time, never from catalog files.
    #[serde(skip)]
    pub has_credential: bool,
    pub rate_limit: RateLimit,
    pub reliability: f64,
    #[serde(with = "duration_ms", rename = "timeout_ms")]
    pub timeout: Duration,
    pub retry_attempts: u32,
    pub supported_types: Vec<IdentifierType>,
    pub cost_tier: CostTier,
    #[serde(default)]
    pub is_aggregator: bool,
}

impl ProviderDescriptor {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            has_credential: false,
            rate_limit: RateLimit::new(60, 1_000),
            reliability: 0.5,
            timeout: Duration::from_secs(10),
            retry_attempts: 0,
            supported_types: IdentifierType::ALL.to_vec(),
            cost_tier: CostTier::Paid,
            is_aggregator: false,
        }
    }

    pub fn with_credential(mut self, has_credential: bool) -> Self {
        self.has_credential = has_credential;
        self
    }

    pub fn with_reliability(mut self, reliability: f64) -> Self {
        self.reliability = reliability;
        self
    }

    pub fn with_cost_tier(mut self, cost_tier: CostTier) -> Self {
        self.cost_tier = cost_tier;
        self
    }

    pub fn with_rate_limit(mut self, per_minute: u32, per_hour: u32) -> Self {
        self.rate_limit = RateLimit::new(per_minute, per_hour);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_attempts(mut self, retry_attempts: u32) -> Self {
        self.retry_attempts = retry_attempts;
        self
    }

    pub fn with_supported_types(mut self, supported_types: Vec<IdentifierType>) -> Self {
        self.supported_types = supported_types;
        self
    }

    pub fn with_aggregator(mut self, is_aggregator: bool) -> Self {
        self.is_aggregator = is_aggregator;
        self
    }

    pub fn supports(&self, identifier_type: IdentifierType) -> bool {
        self.supported_types.contains(&identifier_type)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyProviderName);
        }
        if !(0.0..=1.0).contains(&self.reliability) {
            return Err(ValidationError::ReliabilityOutOfRange {
                name: self.name.clone(),
                value: self.reliability,
            });
        }
        if self.supported_types.is_empty() {
            return Err(ValidationError::NoSupportedTypes {
                name: self.name.clone(),
            });
        }
        if self.rate_limit.per_minute == 0 || self.rate_limit.per_hour == 0 {
            return Err(ValidationError::ZeroRateLimit {
                name: self.name.clone(),
            });
        }
        Ok(())
    }
}

/// Read-only catalog of configured providers.
///
/// Built once at startup and shared by reference; never mutated afterwards.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    ordered: Vec<Arc<dyn TrackingProvider>>,
    by_name: HashMap<String, Arc<dyn TrackingProvider>>,
}

impl ProviderRegistry {
    /// Registers providers, rejecting invalid descriptors. Later duplicates
    /// of a name replace earlier ones.
    pub fn new(providers: Vec<Arc<dyn TrackingProvider>>) -> Result<Self, ValidationError> {
        let mut ordered: Vec<Arc<dyn TrackingProvider>> = Vec::with_capacity(providers.len());
        let mut by_name = HashMap::with_capacity(providers.len());

        for provider in providers {
            provider.descriptor().validate()?;
            let name = provider.descriptor().name.clone();
            ordered.retain(|existing| existing.descriptor().name != name);
            ordered.push(Arc::clone(&provider));
            by_name.insert(name, provider);
        }

        Ok(Self { ordered, by_name })
    }

    /// Credentialed providers, optionally narrowed to those supporting `identifier_type`.
    pub fn list_providers(&self, identifier_type: Option<IdentifierType>) -> Vec<ProviderDescriptor> {
        self.ordered
            .iter()
            .map(|provider| provider.descriptor())
            .filter(|descriptor| descriptor.has_credential)
            .filter(|descriptor| identifier_type.map_or(true, |kind| descriptor.supports(kind)))
            .cloned()
            .collect()
    }

    pub fn provider(&self, name: &str) -> Option<Arc<dyn TrackingProvider>> {
        self.by_name.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
