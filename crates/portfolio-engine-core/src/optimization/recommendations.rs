use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::EngineConfig;
use crate::types::{holding_value, total_value, Holding, Money, Rate};

const MAX_CONFIDENCE: Decimal = dec!(90);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationAction {
    Increase,
    Decrease,
}

/// Suggested weight change for one position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRecommendation {
    pub symbol: String,
    pub action: RecommendationAction,
    pub current_weight: Rate,
    pub target_weight: Rate,
    /// target - current
    pub weight_change: Rate,
    pub value_change: Money,
    /// 0-90, proportional to the size of the move.
    pub confidence: Decimal,
    pub reasoning: String,
}

/// Compare cleaned target weights with current holdings.
///
/// Only symbols at or above the weight cutoff are considered, and only moves
/// larger than the recommendation threshold are reported. Output is sorted
/// by confidence, highest first.
pub fn generate_recommendations(
    holdings: &[Holding],
    target_weights: &BTreeMap<String, Decimal>,
    config: &EngineConfig,
) -> Vec<PositionRecommendation> {
    let total = total_value(holdings);
    if total <= Decimal::ZERO {
        return Vec::new();
    }

    let mut recommendations: Vec<PositionRecommendation> = target_weights
        .iter()
        .filter(|(_, w)| **w >= config.weight_cutoff)
        .filter_map(|(symbol, target)| {
            let current_value = holding_value(holdings, symbol);
            let current_weight = current_value / total;
            let weight_change = *target - current_weight;
            if weight_change.abs() <= config.recommendation_threshold {
                return None;
            }
            let action = if weight_change > Decimal::ZERO {
                RecommendationAction::Increase
            } else {
                RecommendationAction::Decrease
            };
            Some(PositionRecommendation {
                symbol: symbol.clone(),
                action,
                current_weight,
                target_weight: *target,
                weight_change,
                value_change: total * *target - current_value,
                confidence: (weight_change.abs() * dec!(1000)).min(MAX_CONFIDENCE),
                reasoning: reasoning(symbol, action, *target),
            })
        })
        .collect();

    recommendations.sort_by(|a, b| b.confidence.cmp(&a.confidence));
    recommendations
}

fn reasoning(symbol: &str, action: RecommendationAction, target_weight: Rate) -> String {
    match action {
        RecommendationAction::Increase if target_weight > dec!(0.1) => format!(
            "Increase allocation to {symbol} for better diversification and risk-adjusted returns"
        ),
        RecommendationAction::Increase => {
            format!("Add small position in {symbol} to improve portfolio diversification")
        }
        RecommendationAction::Decrease if target_weight < dec!(0.05) => {
            format!("Reduce or eliminate {symbol} position to optimize risk-return profile")
        }
        RecommendationAction::Decrease => {
            format!("Reduce {symbol} allocation to achieve optimal portfolio balance")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights(entries: &[(&str, Decimal)]) -> BTreeMap<String, Decimal> {
        entries.iter().map(|(s, w)| (s.to_string(), *w)).collect()
    }

    #[test]
    fn test_increase_and_decrease() {
        let holdings = vec![
            Holding::new("AAPL", dec!(6000)),
            Holding::new("BND", dec!(4000)),
        ];
        let target = weights(&[("AAPL", dec!(0.3)), ("BND", dec!(0.4)), ("GLD", dec!(0.3))]);
        let recs = generate_recommendations(&holdings, &target, &EngineConfig::default());

        // AAPL -0.30, GLD +0.30, BND unchanged
        assert_eq!(recs.len(), 2);
        let aapl = recs.iter().find(|r| r.symbol == "AAPL").unwrap();
        assert_eq!(aapl.action, RecommendationAction::Decrease);
        assert_eq!(aapl.confidence, dec!(90));
        assert_eq!(aapl.value_change, dec!(-3000));
        assert_eq!(
            aapl.reasoning,
            "Reduce AAPL allocation to achieve optimal portfolio balance"
        );

        let gld = recs.iter().find(|r| r.symbol == "GLD").unwrap();
        assert_eq!(gld.action, RecommendationAction::Increase);
        assert_eq!(gld.current_weight, Decimal::ZERO);
        assert!(gld.reasoning.starts_with("Increase allocation to GLD"));
    }

    #[test]
    fn test_sorted_by_confidence() {
        let holdings = vec![Holding::new("A", dec!(1000))];
        let target = weights(&[("A", dec!(0.93)), ("B", dec!(0.07))]);
        let recs = generate_recommendations(&holdings, &target, &EngineConfig::default());
        assert_eq!(recs.len(), 2);
        // |diff| = 0.07 for both, confidence capped at 70
        assert_eq!(recs[0].confidence, dec!(70));
        assert_eq!(recs[1].reasoning, "Add small position in B to improve portfolio diversification");
        assert!(recs.windows(2).all(|p| p[0].confidence >= p[1].confidence));
    }

    #[test]
    fn test_small_moves_and_tiny_weights_ignored() {
        let holdings = vec![Holding::new("A", dec!(500)), Holding::new("B", dec!(500))];
        let target = weights(&[("A", dec!(0.52)), ("B", dec!(0.48)), ("C", dec!(0.005))]);
        assert!(generate_recommendations(&holdings, &target, &EngineConfig::default()).is_empty());
    }

    #[test]
    fn test_zero_portfolio_value() {
        let target = weights(&[("A", dec!(1))]);
        assert!(generate_recommendations(&[], &target, &EngineConfig::default()).is_empty());
    }
}
