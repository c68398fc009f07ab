pub mod assessment;
pub mod concentration;
pub mod correlation;
pub mod metrics;

pub use assessment::{
    assess_portfolio_risk, empty_report, risk_rating, risk_score, RiskRating, RiskReport,
    RiskSummary,
};
pub use concentration::{concentration_risk, ConcentrationLevel, ConcentrationRisk};
pub use correlation::{analyze_correlations, CorrelatedPair, CorrelationAnalysis};
pub use metrics::{
    AssetRiskMetrics, BenchmarkReturns, PortfolioRiskMetrics, ReturnMetrics,
};
