use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::config::EngineConfig;
use crate::types::{holding_value, total_value, Holding, Money, Rate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeAction {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradePriority {
    High,
    Medium,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub symbol: String,
    pub action: TradeAction,
    /// Absolute value to trade.
    pub amount: Money,
    pub priority: TradePriority,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebalancingPlan {
    pub needed: bool,
    pub transactions: Vec<Transaction>,
    pub estimated_cost: Money,
    pub threshold: Rate,
}

/// Trades moving current holdings to `target_weights`.
///
/// Only symbols whose target weight reaches `weight_cutoff` are traded;
/// positions the optimizer dropped are left untouched. A trade is emitted
/// when the value gap exceeds `rebalance_trade_threshold` of the portfolio.
/// HIGH priority trades come first, then larger amounts.
pub fn plan_rebalancing(
    holdings: &[Holding],
    target_weights: &BTreeMap<String, Decimal>,
    config: &EngineConfig,
) -> RebalancingPlan {
    let total = total_value(holdings);
    if total <= Decimal::ZERO {
        return RebalancingPlan {
            needed: false,
            transactions: Vec::new(),
            estimated_cost: Decimal::ZERO,
            threshold: config.rebalancing_threshold,
        };
    }

    let trade_floor = total * config.rebalance_trade_threshold;
    let high_floor = total * config.high_priority_threshold;

    let mut transactions: Vec<Transaction> = target_weights
        .iter()
        .filter_map(|(symbol, target)| {
            if *target < config.weight_cutoff {
                return None;
            }
            let current_value = holding_value(holdings, symbol);
            let diff = total * *target - current_value;
            if diff.abs() <= trade_floor {
                return None;
            }
            Some(Transaction {
                symbol: symbol.clone(),
                action: if diff > Decimal::ZERO {
                    TradeAction::Buy
                } else {
                    TradeAction::Sell
                },
                amount: diff.abs(),
                priority: if diff.abs() > high_floor {
                    TradePriority::High
                } else {
                    TradePriority::Medium
                },
            })
        })
        .collect();

    transactions.sort_by(|a, b| match (a.priority, b.priority) {
        (TradePriority::High, TradePriority::Medium) => Ordering::Less,
        (TradePriority::Medium, TradePriority::High) => Ordering::Greater,
        _ => b.amount.cmp(&a.amount),
    });

    let estimated_cost: Money = transactions
        .iter()
        .map(|t| t.amount * config.transaction_cost_rate)
        .sum();

    RebalancingPlan {
        needed: !transactions.is_empty(),
        transactions,
        estimated_cost,
        threshold: config.rebalancing_threshold,
    }
}
