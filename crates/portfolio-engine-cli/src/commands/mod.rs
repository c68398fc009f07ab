pub mod frontier;
pub mod monte_carlo;
pub mod optimize;
pub mod risk;
pub mod stress;

use portfolio_engine_core::market_data::InMemoryPriceProvider;
use portfolio_engine_core::{EngineConfig, PortfolioService};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::input;

/// Request body from `--input`, else from piped stdin.
pub(crate) fn read_request<T: DeserializeOwned>(
    path: Option<&str>,
    what: &str,
) -> Result<T, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        input::file::read_json(path)
    } else if let Some(data) = input::stdin::read_stdin()? {
        Ok(serde_json::from_value(data)?)
    } else {
        Err(format!("--input <file.json> or stdin required for {what}").into())
    }
}

pub(crate) fn load_config(path: Option<&str>) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(input::file::read_json(path)?),
        None => Ok(EngineConfig::default()),
    }
}

/// Service over the prices in `prices_path` (symbol -> [{date, close}]).
pub(crate) fn build_service(
    prices_path: Option<&str>,
    config_path: Option<&str>,
) -> Result<PortfolioService<InMemoryPriceProvider>, Box<dyn std::error::Error>> {
    let provider: InMemoryPriceProvider = match prices_path {
        Some(path) => input::file::read_json(path)?,
        None => InMemoryPriceProvider::new(),
    };
    debug!(symbols = provider.symbols().len(), "loaded price history");
    let config = load_config(config_path)?;
    Ok(PortfolioService::new(provider, config)?)
}
