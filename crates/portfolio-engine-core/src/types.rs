use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.05 = 5%). Never as percentages.
pub type Rate = Decimal;

/// A single position supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: String,
    pub market_value: Money,
}

impl Holding {
    pub fn new(symbol: impl Into<String>, market_value: Money) -> Self {
        Self {
            symbol: symbol.into(),
            market_value,
        }
    }
}

/// Sum of market values across holdings.
pub fn total_value(holdings: &[Holding]) -> Money {
    holdings.iter().map(|h| h.market_value).sum()
}

/// Market value of `symbol`, zero when it is not held. Duplicate entries are summed.
pub fn holding_value(holdings: &[Holding], symbol: &str) -> Money {
    holdings
        .iter()
        .filter(|h| h.symbol == symbol)
        .map(|h| h.market_value)
        .sum()
}

/// Share of total market value per symbol. Empty when the total is not positive.
pub fn portfolio_weights(holdings: &[Holding]) -> BTreeMap<String, Rate> {
    let total = total_value(holdings);
    if total <= Decimal::ZERO {
        return BTreeMap::new();
    }
    let mut weights: BTreeMap<String, Rate> = BTreeMap::new();
    for h in holdings {
        *weights.entry(h.symbol.clone()).or_default() += h.market_value / total;
    }
    weights
}

/// Investor risk appetite driving the optimizer objective.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTolerance {
    Conservative,
    #[default]
    Moderate,
    Aggressive,
}

impl fmt::Display for RiskTolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskTolerance::Conservative => "conservative",
            RiskTolerance::Moderate => "moderate",
            RiskTolerance::Aggressive => "aggressive",
        };
        f.write_str(s)
    }
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    wrap(
        methodology,
        assumptions,
        warnings,
        elapsed_us,
        "rust_decimal_128bit",
        result,
    )
}

/// Same envelope for results computed in floating point.
pub fn with_metadata_f64<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    wrap(
        methodology,
        assumptions,
        warnings,
        elapsed_us,
        "ieee754_f64",
        result,
    )
}

fn wrap<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    precision: &str,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: precision.to_string(),
        },
    }
}
