use clap::Args;
use serde::Deserialize;
use serde_json::Value;

use portfolio_engine_core::Holding;

use super::{build_service, read_request};

/// Arguments for a portfolio risk report
#[derive(Args)]
pub struct RiskArgs {
    /// Path to JSON request: {holdings: [{symbol, market_value}, ...]}
    #[arg(long)]
    pub input: Option<String>,

    /// Path to JSON price history, including the market index
    #[arg(long)]
    pub prices: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RiskInput {
    #[serde(default)]
    holdings: Vec<Holding>,
}

pub fn run_assess_risk(
    args: RiskArgs,
    config: Option<&str>,
) -> Result<Value, Box<dyn std::error::Error>> {
    let request: RiskInput = read_request(args.input.as_deref(), "risk assessment")?;
    let service = build_service(args.prices.as_deref(), config)?;
    let result = service.assess_risk(&request.holdings)?;
    Ok(serde_json::to_value(result)?)
}
