pub mod efficient_frontier;
pub mod qp;
pub mod rebalancing;
pub mod recommendations;

pub use efficient_frontier::{
    clean_weights, optimize_allocation, EfficientFrontier, FrontierOutcome, FrontierPoint,
    FrontierSweep, OptimizationMethod, OptimizedAllocation, PortfolioPerformance,
};
pub use rebalancing::{plan_rebalancing, RebalancingPlan, TradeAction, TradePriority, Transaction};
pub use recommendations::{generate_recommendations, PositionRecommendation, RecommendationAction};
