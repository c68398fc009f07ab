use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::Rate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConcentrationLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationRisk {
    /// Herfindahl-Hirschman index Σwᵢ².
    pub hhi: Decimal,
    pub max_position_weight: Rate,
    pub num_positions: usize,
    /// 1 / HHI, zero for an empty portfolio.
    pub effective_positions: Decimal,
    pub concentration_level: ConcentrationLevel,
}

pub fn concentration_risk(weights: &BTreeMap<String, Decimal>) -> ConcentrationRisk {
    let hhi: Decimal = weights.values().map(|w| *w * *w).sum();
    let max_position_weight = weights.values().copied().max().unwrap_or(Decimal::ZERO);
    let effective_positions = if hhi > Decimal::ZERO {
        Decimal::ONE / hhi
    } else {
        Decimal::ZERO
    };
    ConcentrationRisk {
        hhi,
        max_position_weight,
        num_positions: weights.len(),
        effective_positions,
        concentration_level: concentration_level(hhi, max_position_weight),
    }
}

pub fn concentration_level(hhi: Decimal, max_weight: Rate) -> ConcentrationLevel {
    if hhi > dec!(0.25) || max_weight > dec!(0.4) {
        ConcentrationLevel::High
    } else if hhi > dec!(0.15) || max_weight > dec!(0.25) {
        ConcentrationLevel::Medium
    } else {
        ConcentrationLevel::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(n: usize) -> BTreeMap<String, Decimal> {
        let w = Decimal::ONE / Decimal::from(n as u64);
        (0..n).map(|i| (format!("S{i}"), w)).collect()
    }

    #[test]
    fn test_uniform_weights() {
        let risk = concentration_risk(&uniform(4));
        assert_eq!(risk.hhi, dec!(0.25));
        assert_eq!(risk.effective_positions, dec!(4));
        assert_eq!(risk.num_positions, 4);

        for n in [3usize, 7, 10] {
            let risk = concentration_risk(&uniform(n));
            let expected = Decimal::ONE / Decimal::from(n as u64);
            assert!((risk.hhi - expected).abs() < dec!(0.0000000001));
            assert!((risk.effective_positions - Decimal::from(n as u64)).abs() < dec!(0.000001));
        }
    }

    #[test]
    fn test_levels() {
        // max weight drives HIGH even with low HHI
        assert_eq!(concentration_level(dec!(0.10), dec!(0.41)), ConcentrationLevel::High);
        assert_eq!(concentration_level(dec!(0.26), dec!(0.30)), ConcentrationLevel::High);
        assert_eq!(concentration_level(dec!(0.16), dec!(0.20)), ConcentrationLevel::Medium);
        assert_eq!(concentration_level(dec!(0.10), dec!(0.26)), ConcentrationLevel::Medium);
        assert_eq!(concentration_level(dec!(0.10), dec!(0.10)), ConcentrationLevel::Low);
        // uniform 4 sits exactly on the HHI boundary: not HIGH
        assert_eq!(concentration_level(dec!(0.25), dec!(0.25)), ConcentrationLevel::Medium);
    }

    #[test]
    fn test_empty() {
        let risk = concentration_risk(&BTreeMap::new());
        assert_eq!(risk.hhi, Decimal::ZERO);
        assert_eq!(risk.effective_positions, Decimal::ZERO);
        assert_eq!(risk.concentration_level, ConcentrationLevel::Low);
    }
}
