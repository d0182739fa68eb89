//! Shared fixtures for the behaviour suites: scripted providers, a frozen
//! clock and a service wired around an in-memory store.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use shiptrack_core::{
    CircuitBreakerConfig, CircuitBreakerSet, Clock, CostTier, FetchOrchestrator, IdentifierType,
    KeyValueStore, ManualClock, MemoryStore, ProviderDescriptor, ProviderError, ProviderFuture,
    ProviderPayload, ProviderRegistry, RateLimitTracker, ResolutionService, ResponseCache,
    RetryConfig, ShipmentStatus, TimelineEvent, TrackerConfig, TrackingNumber, TrackingProvider,
    UtcDateTime,
};

pub const START: &str = "2024-06-01T12:00:00Z";

/// One scripted answer to a `fetch` call.
#[derive(Debug, Clone)]
pub enum Reply {
    Payload(ProviderPayload),
    Fail(ProviderError),
    /// Sleeps before answering, so the orchestrator's timeout can fire first.
    Delayed(Duration, Box<Reply>),
}

impl Reply {
    pub fn delayed(delay: Duration, reply: Reply) -> Self {
        Self::Delayed(delay, Box::new(reply))
    }
}

/// Provider that answers from a queue, then repeats its fallback reply.
pub struct ScriptedProvider {
    descriptor: ProviderDescriptor,
    queued: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(descriptor: ProviderDescriptor, fallback: Reply) -> Arc<Self> {
        Self::with_queue(descriptor, Vec::new(), fallback)
    }

    pub fn with_queue(descriptor: ProviderDescriptor, queued: Vec<Reply>, fallback: Reply) -> Arc<Self> {
        Arc::new(Self {
            descriptor,
            queued: Mutex::new(queued.into()),
            fallback,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_reply(&self) -> Reply {
        self.queued
            .lock()
            .expect("script lock is not poisoned")
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl TrackingProvider for ScriptedProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    fn fetch<'a>(
        &'a self,
        _identifier: &'a TrackingNumber,
        _identifier_type: IdentifierType,
        _timeout: Duration,
    ) -> ProviderFuture<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut reply = self.next_reply();
        Box::pin(async move {
            loop {
                match reply {
                    Reply::Payload(payload) => return Ok(payload),
                    Reply::Fail(error) => return Err(error),
                    Reply::Delayed(delay, inner) => {
                        tokio::time::sleep(delay).await;
                        reply = *inner;
                    }
                }
            }
        })
    }
}

/// Credentialed free-tier container provider with a generous budget.
pub fn descriptor(name: &str, reliability: f64) -> ProviderDescriptor {
    ProviderDescriptor::new(name, format!("https://{name}.test"))
        .with_credential(true)
        .with_reliability(reliability)
        .with_cost_tier(CostTier::Free)
        .with_rate_limit(100, 1_000)
        .with_timeout(Duration::from_secs(2))
}

pub fn at(raw: &str) -> UtcDateTime {
    UtcDateTime::parse(raw).expect("valid timestamp")
}

pub fn event(raw: &str, status: ShipmentStatus, location: &str) -> TimelineEvent {
    TimelineEvent::new(at(raw), status, Some(location.to_owned()))
}

/// Carrier, status and one gate-in event.
pub fn complete_payload(carrier: &str) -> ProviderPayload {
    ProviderPayload {
        carrier: Some(carrier.to_owned()),
        status: Some(ShipmentStatus::InTransit),
        events: vec![event("2024-05-28T08:00:00Z", ShipmentStatus::GateIn, "Shanghai")],
        ..ProviderPayload::default()
    }
}

pub fn not_found() -> Reply {
    Reply::Fail(ProviderError::Http {
        status: 404,
        message: String::from("container not found"),
    })
}

pub fn connection_refused() -> Reply {
    Reply::Fail(ProviderError::Connect(String::from("connection refused")))
}

pub fn registry(providers: &[&Arc<ScriptedProvider>]) -> ProviderRegistry {
    let providers = providers
        .iter()
        .map(|provider| Arc::clone(*provider) as Arc<dyn TrackingProvider>)
        .collect();
    ProviderRegistry::new(providers).expect("valid registry")
}

pub fn manual_clock() -> ManualClock {
    ManualClock::new(at(START))
}

/// Defaults with a near-zero retry delay so retry tests stay fast.
pub fn test_config() -> TrackerConfig {
    TrackerConfig {
        retry: RetryConfig::fixed(Duration::from_millis(1)),
        ..TrackerConfig::default()
    }
}

pub struct Harness {
    pub clock: ManualClock,
    pub store: Arc<MemoryStore>,
    pub service: ResolutionService,
}

pub fn service(providers: &[&Arc<ScriptedProvider>]) -> Harness {
    service_with_config(providers, test_config())
}

pub fn service_with_config(providers: &[&Arc<ScriptedProvider>], config: TrackerConfig) -> Harness {
    let clock = manual_clock();
    let store = Arc::new(MemoryStore::new(Arc::new(clock.clone())));
    let service = ResolutionService::new(
        registry(providers),
        Arc::clone(&store) as Arc<dyn KeyValueStore>,
        Arc::new(clock.clone()),
        config,
    );
    Harness {
        clock,
        store,
        service,
    }
}

pub fn orchestrator(providers: &[&Arc<ScriptedProvider>], clock: &ManualClock) -> FetchOrchestrator {
    let clock: Arc<dyn Clock> = Arc::new(clock.clone());
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new(Arc::clone(&clock)));
    let registry = registry(providers);
    let rate_limits = RateLimitTracker::for_providers(Arc::clone(&clock), &registry.list_providers(None));

    FetchOrchestrator::new(
        registry,
        rate_limits,
        ResponseCache::new(store, Duration::from_secs(15 * 60)),
        CircuitBreakerSet::new(CircuitBreakerConfig::default(), Arc::clone(&clock)),
        clock,
    )
    .with_retry(RetryConfig::fixed(Duration::from_millis(1)))
}

pub fn container(raw: &str) -> TrackingNumber {
    TrackingNumber::parse(raw).expect("valid identifier")
}
