mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use commands::frontier::FrontierArgs;
use commands::monte_carlo::MonteCarloArgs;
use commands::optimize::OptimizeArgs;
use commands::risk::RiskArgs;
use commands::stress::StressArgs;

/// Portfolio optimization and risk analytics
#[derive(Parser)]
#[command(
    name = "pfe",
    version,
    about = "Portfolio optimization and risk analytics",
    long_about = "A CLI for mean-variance portfolio optimization, rebalancing plans, \
                  historical risk metrics, stress tests and Monte Carlo simulation \
                  over caller-supplied price history."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Path to an engine configuration JSON file (defaults apply when omitted)
    #[arg(long, global = true)]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Optimize weights and plan rebalancing for a set of holdings
    Optimize(OptimizeArgs),
    /// Risk report: VaR, expected shortfall, drawdown, beta, concentration
    AssessRisk(RiskArgs),
    /// Apply stress scenarios to holdings
    StressTest(StressArgs),
    /// Simulate forward portfolio value paths
    MonteCarlo(MonteCarloArgs),
    /// Sample the efficient frontier
    Frontier(FrontierArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    let config = cli.config.as_deref();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Optimize(args) => commands::optimize::run_optimize(args, config),
        Commands::AssessRisk(args) => commands::risk::run_assess_risk(args, config),
        Commands::StressTest(args) => commands::stress::run_stress_test(args, config),
        Commands::MonteCarlo(args) => commands::monte_carlo::run_monte_carlo(args, config),
        Commands::Frontier(args) => commands::frontier::run_frontier(args, config),
        Commands::Version => {
            println!("pfe {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
