use clap::Args;
use serde_json::Value;

use portfolio_engine_core::OptimizationRequest;

use super::{build_service, read_request};

/// Arguments for portfolio optimization
#[derive(Args)]
pub struct OptimizeArgs {
    /// Path to JSON request: {holdings, risk_tolerance, time_horizon, target_return}
    #[arg(long)]
    pub input: Option<String>,

    /// Path to JSON price history: {SYMBOL: [{date, close}, ...]}
    #[arg(long)]
    pub prices: String,
}

pub fn run_optimize(
    args: OptimizeArgs,
    config: Option<&str>,
) -> Result<Value, Box<dyn std::error::Error>> {
    let request: OptimizationRequest = read_request(args.input.as_deref(), "optimization")?;
    let service = build_service(Some(&args.prices), config)?;
    let result = service.optimize_portfolio(&request)?;
    Ok(serde_json::to_value(result)?)
}
