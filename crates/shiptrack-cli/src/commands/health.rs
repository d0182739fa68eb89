use shiptrack_core::{OverallHealth, ResolutionService};

use crate::error::CliError;

use super::{CommandResult, Outcome};

pub fn run(service: &ResolutionService) -> Result<CommandResult, CliError> {
    let report = service.get_provider_health();
    let outcome = match report.overall_health {
        OverallHealth::Healthy => Outcome::Success,
        OverallHealth::Degraded | OverallHealth::Unavailable => Outcome::Degraded,
    };

    Ok(CommandResult::ok(serde_json::to_value(&report)?).with_outcome(outcome))
}
