use clap::Args;
use serde_json::Value;

use portfolio_engine_core::MonteCarloRequest;

use super::{build_service, read_request};

/// Arguments for Monte Carlo simulation
#[derive(Args)]
pub struct MonteCarloArgs {
    /// Path to JSON request: {symbols, initial_value, num_simulations, time_horizon, seed?, per_path?, weights?}
    #[arg(long)]
    pub input: Option<String>,

    /// Path to JSON price history
    #[arg(long)]
    pub prices: String,

    /// Drop the per-simulation paths from the output
    #[arg(long)]
    pub summary_only: bool,
}

pub fn run_monte_carlo(
    args: MonteCarloArgs,
    config: Option<&str>,
) -> Result<Value, Box<dyn std::error::Error>> {
    let request: MonteCarloRequest = read_request(args.input.as_deref(), "Monte Carlo simulation")?;
    let service = build_service(Some(&args.prices), config)?;
    let mut result = service.run_monte_carlo(&request)?;
    if args.summary_only {
        result.result.paths.clear();
    }
    Ok(serde_json::to_value(result)?)
}
