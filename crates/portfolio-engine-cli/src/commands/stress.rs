use clap::Args;
use serde_json::Value;

use portfolio_engine_core::StressTestRequest;

use super::{build_service, read_request};

/// Arguments for stress testing
#[derive(Args)]
pub struct StressArgs {
    /// Path to JSON request: {holdings, scenarios?}
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_stress_test(
    args: StressArgs,
    config: Option<&str>,
) -> Result<Value, Box<dyn std::error::Error>> {
    let request: StressTestRequest = read_request(args.input.as_deref(), "stress testing")?;
    // Scenario impacts depend on weights only.
    let service = build_service(None, config)?;
    let result = match &request.scenarios {
        Some(scenarios) => service.run_custom_stress_tests(&request.holdings, scenarios)?,
        None => service.run_stress_tests(&request.holdings)?,
    };
    Ok(serde_json::to_value(result)?)
}
