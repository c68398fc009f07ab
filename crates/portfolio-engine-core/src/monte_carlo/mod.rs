pub mod simulation;

pub use simulation::{
    simulate_portfolio_paths, DistributionStats, MonteCarloOutput, PathCompounding,
    SimulationParameters, SimulationSummary,
};
