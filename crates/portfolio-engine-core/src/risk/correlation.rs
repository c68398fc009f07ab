use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::statistics::{mean, pearson_correlation, ReturnSeries};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelatedPair {
    pub symbol1: String,
    pub symbol2: String,
    pub correlation: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationAnalysis {
    /// Full symmetric matrix, unit diagonal.
    pub correlation_matrix: BTreeMap<String, BTreeMap<String, Decimal>>,
    pub high_correlations: Vec<CorrelatedPair>,
    /// Mean of the strict upper triangle.
    pub average_correlation: Decimal,
    /// 1 - |average_correlation|
    pub diversification_score: Decimal,
}

/// Pairwise Pearson correlation of every column in `returns`.
///
/// Pairs with |ρ| above `threshold` are flagged. With fewer than two
/// symbols there are no pairs; the average is taken as 1 and the
/// diversification score as 0.
pub fn analyze_correlations(returns: &ReturnSeries, threshold: Decimal) -> CorrelationAnalysis {
    let symbols = returns.symbols();
    let columns: Vec<&[Decimal]> = symbols.iter().filter_map(|s| returns.get(s)).collect();

    let mut correlation_matrix: BTreeMap<String, BTreeMap<String, Decimal>> = BTreeMap::new();
    let mut upper = Vec::new();
    let mut high_correlations = Vec::new();

    for (i, si) in symbols.iter().enumerate() {
        correlation_matrix
            .entry(si.clone())
            .or_default()
            .insert(si.clone(), Decimal::ONE);
        for (j, sj) in symbols.iter().enumerate().skip(i + 1) {
            let corr = pearson_correlation(columns[i], columns[j]);
            correlation_matrix
                .entry(si.clone())
                .or_default()
                .insert(sj.clone(), corr);
            correlation_matrix
                .entry(sj.clone())
                .or_default()
                .insert(si.clone(), corr);
            upper.push(corr);
            if corr.abs() > threshold {
                high_correlations.push(CorrelatedPair {
                    symbol1: si.clone(),
                    symbol2: sj.clone(),
                    correlation: corr,
                });
            }
        }
    }

    let average_correlation = if upper.is_empty() {
        Decimal::ONE
    } else {
        mean(&upper)
    };

    CorrelationAnalysis {
        correlation_matrix,
        high_correlations,
        average_correlation,
        diversification_score: Decimal::ONE - average_correlation.abs(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn series(columns: &[(&str, Vec<Decimal>)]) -> ReturnSeries {
        let n = columns[0].1.len();
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        ReturnSeries {
            dates: (0..n)
                .map(|i| start + chrono::Duration::days(i as i64))
                .collect(),
            returns: columns
                .iter()
                .map(|(s, r)| (s.to_string(), r.clone()))
                .collect(),
            excluded: vec![],
        }
    }

    #[test]
    fn test_perfect_and_inverse_pairs() {
        let a = vec![dec!(0.01), dec!(-0.02), dec!(0.03), dec!(0.00)];
        let b: Vec<Decimal> = a.iter().map(|x| *x * dec!(2)).collect();
        let c: Vec<Decimal> = a.iter().map(|x| -*x).collect();
        let analysis = analyze_correlations(
            &series(&[("A", a), ("B", b), ("C", c)]),
            dec!(0.7),
        );

        assert_eq!(analysis.correlation_matrix["A"]["A"], Decimal::ONE);
        assert!((analysis.correlation_matrix["A"]["B"] - Decimal::ONE).abs() < dec!(0.0000001));
        assert!((analysis.correlation_matrix["C"]["A"] + Decimal::ONE).abs() < dec!(0.0000001));
        assert_eq!(analysis.high_correlations.len(), 3);
        assert_eq!(analysis.high_correlations[0].symbol1, "A");
        assert_eq!(analysis.high_correlations[0].symbol2, "B");

        // (1 - 1 - 1) / 3
        assert!((analysis.average_correlation + dec!(1) / dec!(3)).abs() < dec!(0.000001));
        assert!((analysis.diversification_score - dec!(2) / dec!(3)).abs() < dec!(0.000001));
    }

    #[test]
    fn test_threshold_filters_pairs() {
        let a = vec![dec!(1), dec!(2), dec!(3), dec!(4), dec!(5)];
        let b = vec![dec!(2), dec!(1), dec!(4), dec!(3), dec!(5)];
        // ρ = 0.8
        let analysis = analyze_correlations(&series(&[("A", a.clone()), ("B", b.clone())]), dec!(0.81));
        assert!(analysis.high_correlations.is_empty());
        let analysis = analyze_correlations(&series(&[("A", a), ("B", b)]), dec!(0.79));
        assert_eq!(analysis.high_correlations.len(), 1);
    }

    #[test]
    fn test_single_symbol() {
        let analysis = analyze_correlations(&series(&[("A", vec![dec!(0.01), dec!(0.02)])]), dec!(0.7));
        assert_eq!(analysis.average_correlation, Decimal::ONE);
        assert_eq!(analysis.diversification_score, Decimal::ZERO);
        assert!(analysis.high_correlations.is_empty());
    }
}
