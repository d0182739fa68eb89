mod health;
mod providers;
mod track;

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use shiptrack_core::{
    Clock, KeyValueStore, MemoryStore, ProviderCatalog, ProviderRegistryBuilder, ResolutionService,
    SystemClock, TrackerConfig, TrackingError,
};
use tracing::debug;

use crate::cli::{Cli, Command};
use crate::error::CliError;
use crate::metadata::Metadata;
use crate::output::Envelope;

/// How the invocation ended, mapped onto the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Degraded,
    NoData,
}

pub struct CommandResult {
    pub data: Value,
    pub errors: Vec<TrackingError>,
    pub source_chain: Vec<String>,
    pub outcome: Outcome,
}

impl CommandResult {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            errors: Vec::new(),
            source_chain: Vec::new(),
            outcome: Outcome::Success,
        }
    }

    pub fn with_errors(mut self, errors: Vec<TrackingError>) -> Self {
        self.errors.extend(errors);
        self
    }

    pub fn with_source_chain(mut self, source_chain: Vec<String>) -> Self {
        self.source_chain = source_chain;
        self
    }

    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = outcome;
        self
    }
}

pub async fn run(cli: &Cli) -> Result<(Envelope, Outcome), CliError> {
    let started = Instant::now();
    let service = build_service(cli)?;

    let CommandResult {
        data,
        errors,
        source_chain,
        outcome,
    } = match &cli.command {
        Command::Track(args) => track::run(args, &service).await?,
        Command::Refresh(args) => track::refresh(args, &service).await?,
        Command::Providers(args) => providers::run(args, &service)?,
        Command::Health => health::run(&service)?,
    };

    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    let envelope = Envelope {
        meta: Metadata::new(latency_ms, source_chain),
        data,
        errors,
    };
    Ok((envelope, outcome))
}

fn build_service(cli: &Cli) -> Result<ResolutionService, CliError> {
    let mut builder = ProviderRegistryBuilder::new();
    if let Some(path) = &cli.catalog {
        let raw = std::fs::read_to_string(path)?;
        builder = builder.with_catalog(ProviderCatalog::from_json(&raw)?);
    }

    let registry = if cli.mock {
        builder.with_mock_mode()
    } else {
        builder.with_real_clients()
    }
    .build()?;
    debug!(providers = registry.len(), mock = cli.mock, "provider registry ready");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new(Arc::clone(&clock)));
    Ok(ResolutionService::new(
        registry,
        store,
        clock,
        TrackerConfig::from_env()?,
    ))
}
