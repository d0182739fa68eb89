use serde::Serialize;
use shiptrack_core::{CostTier, IdentifierType, ResolutionService};

use crate::cli::ProvidersArgs;
use crate::error::CliError;

use super::CommandResult;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProviderChain {
    identifier_type: IdentifierType,
    providers: Vec<ChainEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChainEntry {
    rank: usize,
    name: String,
    cost_tier: CostTier,
    reliability: f64,
    is_aggregator: bool,
}

#[derive(Debug, Serialize)]
struct ProvidersResponseData {
    chains: Vec<ProviderChain>,
}

pub fn run(args: &ProvidersArgs, service: &ResolutionService) -> Result<CommandResult, CliError> {
    let types = match args.identifier_type {
        Some(selected) => vec![IdentifierType::from(selected)],
        None => IdentifierType::ALL.to_vec(),
    };

    let chains = types
        .into_iter()
        .map(|identifier_type| ProviderChain {
            identifier_type,
            providers: service
                .provider_chain(identifier_type)
                .into_iter()
                .enumerate()
                .map(|(index, descriptor)| ChainEntry {
                    rank: index + 1,
                    name: descriptor.name,
                    cost_tier: descriptor.cost_tier,
                    reliability: descriptor.reliability,
                    is_aggregator: descriptor.is_aggregator,
                })
                .collect(),
        })
        .collect();

    let data = serde_json::to_value(ProvidersResponseData { chains })?;
    Ok(CommandResult::ok(data))
}
