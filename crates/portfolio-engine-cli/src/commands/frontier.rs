use clap::Args;
use serde_json::Value;

use portfolio_engine_core::FrontierRequest;

use super::{build_service, read_request};

/// Arguments for efficient frontier sampling
#[derive(Args)]
pub struct FrontierArgs {
    /// Path to JSON request: {symbols, num_points}
    #[arg(long)]
    pub input: Option<String>,

    /// Path to JSON price history
    #[arg(long)]
    pub prices: String,
}

pub fn run_frontier(
    args: FrontierArgs,
    config: Option<&str>,
) -> Result<Value, Box<dyn std::error::Error>> {
    let request: FrontierRequest = read_request(args.input.as_deref(), "frontier sampling")?;
    let service = build_service(Some(&args.prices), config)?;
    let result = service.efficient_frontier(&request.symbols, request.num_points)?;
    Ok(serde_json::to_value(result)?)
}
