use shiptrack_core::{ResolutionResult, ResolutionService, TrackingNumber};

use crate::cli::{RefreshArgs, TrackArgs};
use crate::error::CliError;

use super::{CommandResult, Outcome};

pub async fn run(args: &TrackArgs, service: &ResolutionService) -> Result<CommandResult, CliError> {
    TrackingNumber::parse(&args.identifier)?;

    let result = service
        .track(
            &args.identifier,
            args.identifier_type.map(Into::into),
            args.refresh,
        )
        .await;
    into_command_result(result)
}

pub async fn refresh(args: &RefreshArgs, service: &ResolutionService) -> Result<CommandResult, CliError> {
    TrackingNumber::parse(&args.identifier)?;

    let result = service
        .refresh_tracking_data(&args.identifier, args.identifier_type.map(Into::into))
        .await;
    into_command_result(result)
}

fn into_command_result(result: ResolutionResult) -> Result<CommandResult, CliError> {
    let outcome = outcome_of(&result);
    let errors = result.error.clone().into_iter().collect();
    let source_chain = result.source_chain.clone();

    Ok(CommandResult::ok(serde_json::to_value(&result)?)
        .with_errors(errors)
        .with_source_chain(source_chain)
        .with_outcome(outcome))
}

fn outcome_of(result: &ResolutionResult) -> Outcome {
    if !result.success {
        Outcome::NoData
    } else if result.path.is_degraded() {
        Outcome::Degraded
    } else {
        Outcome::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shiptrack_core::{
        IdentifierType, MemoryStore, ProviderRegistryBuilder, ResolutionPath, SystemClock,
        TrackerConfig,
    };
    use std::sync::Arc;

    use crate::cli::TypeArg;

    fn mock_service() -> ResolutionService {
        let registry = ProviderRegistryBuilder::new()
            .with_mock_mode()
            .build()
            .expect("builtin catalog is valid");
        ResolutionService::new(
            registry,
            Arc::new(MemoryStore::default()),
            Arc::new(SystemClock),
            TrackerConfig::default(),
        )
    }

    #[tokio::test]
    async fn tracking_in_mock_mode_succeeds() {
        let service = mock_service();
        let args = TrackArgs {
            identifier: String::from("MSKU1234567"),
            identifier_type: Some(TypeArg::Container),
            refresh: false,
        };

        let result = run(&args, &service).await.expect("command succeeds");

        assert_eq!(result.outcome, Outcome::Success);
        assert!(result.errors.is_empty());
        assert_eq!(result.source_chain, vec![String::from("maersk")]);
        assert_eq!(result.data["path"], "fetch_success");
        assert_eq!(result.data["data"]["identifierType"], IdentifierType::Container.as_str());
    }

    #[tokio::test]
    async fn invalid_identifier_is_a_validation_error() {
        let service = mock_service();
        let args = RefreshArgs {
            identifier: String::from("AB"),
            identifier_type: None,
        };

        let error = refresh(&args, &service).await.err().expect("must fail");

        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn stale_results_are_degraded() {
        let result = ResolutionResult {
            success: true,
            data: None,
            error: None,
            from_cache: true,
            data_age_minutes: Some(120),
            path: ResolutionPath::RefreshFailedReturnStale,
            source_chain: Vec::new(),
        };

        assert_eq!(outcome_of(&result), Outcome::Degraded);
    }
}
