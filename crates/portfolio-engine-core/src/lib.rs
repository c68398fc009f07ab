pub mod cache;
pub mod config;
pub mod error;
pub mod linalg;
pub mod market_data;
pub mod optimization;
pub mod risk;
pub mod service;
pub mod statistics;
pub mod stress;
pub mod types;

#[cfg(feature = "monte_carlo")]
pub mod monte_carlo;

pub use config::EngineConfig;
pub use error::PortfolioError;
pub use service::{
    FrontierRequest, OptimizationRequest, OptimizationResult, PortfolioService, StressTestRequest,
};
#[cfg(feature = "monte_carlo")]
pub use service::MonteCarloRequest;
pub use types::*;

/// Standard result type for all portfolio-engine operations
pub type PortfolioResult<T> = Result<T, PortfolioError>;
