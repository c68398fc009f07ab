use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::MathematicalOps;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use crate::error::PortfolioError;
use crate::linalg::sqrt_decimal;
use crate::market_data::PriceTable;
use crate::PortfolioResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Daily simple returns on a common date index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReturnSeries {
    /// Date of each return (the later of the two closes).
    pub dates: Vec<NaiveDate>,
    pub returns: BTreeMap<String, Vec<Decimal>>,
    /// Symbols dropped for insufficient coverage or unusable prices.
    pub excluded: Vec<String>,
}

impl ReturnSeries {
    pub fn symbols(&self) -> Vec<String> {
        self.returns.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty() || self.returns.is_empty()
    }

    pub fn get(&self, symbol: &str) -> Option<&[Decimal]> {
        self.returns.get(symbol).map(|r| r.as_slice())
    }

    /// Returns of `self[symbol]` and `other` restricted to dates present in both.
    pub fn intersect_with(
        &self,
        symbol: &str,
        other_dates: &[NaiveDate],
        other: &[Decimal],
    ) -> (Vec<Decimal>, Vec<Decimal>) {
        let Some(own) = self.returns.get(symbol) else {
            return (Vec::new(), Vec::new());
        };
        intersect_by_date(&self.dates, own, other_dates, other)
    }
}

/// Annualized expected returns and covariance, indexed like `symbols`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnualizedStatistics {
    pub symbols: Vec<String>,
    pub expected_returns: Vec<Decimal>,
    pub covariance: Vec<Vec<Decimal>>,
    pub observations: usize,
}

impl AnnualizedStatistics {
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Alignment
// ---------------------------------------------------------------------------

/// Drop poorly covered symbols, intersect the remaining dates and convert
/// closes to daily percentage changes.
pub fn align_returns(
    table: &PriceTable,
    coverage_threshold: Decimal,
) -> PortfolioResult<ReturnSeries> {
    if table.is_empty() {
        return Err(PortfolioError::DataInsufficient(
            "Price table is empty".into(),
        ));
    }

    let mut excluded = Vec::new();
    let mut kept: Vec<(&String, &Vec<Option<Decimal>>)> = Vec::new();
    for (symbol, column) in &table.closes {
        let coverage = table.coverage(symbol).unwrap_or(Decimal::ZERO);
        let has_bad_price = column.iter().flatten().any(|p| *p <= Decimal::ZERO);
        if coverage < coverage_threshold || has_bad_price {
            warn!(
                symbol = %symbol,
                coverage = %coverage,
                "excluding symbol with insufficient price history"
            );
            excluded.push(symbol.clone());
        } else {
            kept.push((symbol, column));
        }
    }

    if kept.is_empty() {
        return Err(PortfolioError::DataInsufficient(format!(
            "No symbol meets the {coverage_threshold} coverage threshold"
        )));
    }

    let rows: Vec<usize> = (0..table.dates.len())
        .filter(|&i| kept.iter().all(|(_, column)| column[i].is_some()))
        .collect();

    if rows.len() < 2 {
        return Err(PortfolioError::DataInsufficient(format!(
            "Only {} date(s) shared by all symbols",
            rows.len()
        )));
    }

    let dates = rows[1..].iter().map(|&i| table.dates[i]).collect();
    let returns = kept
        .into_iter()
        .map(|(symbol, column)| {
            let closes: Vec<Decimal> = rows.iter().filter_map(|&i| column[i]).collect();
            let rets = closes.windows(2).map(|w| w[1] / w[0] - Decimal::ONE).collect();
            (symbol.clone(), rets)
        })
        .collect();

    Ok(ReturnSeries {
        dates,
        returns,
        excluded,
    })
}

// ---------------------------------------------------------------------------
// Estimation
// ---------------------------------------------------------------------------

/// Annualized mean-return vector and sample covariance matrix.
///
/// With `compounding`, expected return is the geometric rate
/// `(Π(1 + r))^(periods / n) - 1`; otherwise `mean(r) * periods`.
pub fn estimate(
    returns: &ReturnSeries,
    periods_per_year: Decimal,
    compounding: bool,
) -> PortfolioResult<AnnualizedStatistics> {
    let count = returns.returns.len();
    if count < 2 {
        return Err(PortfolioError::DataInsufficient(format!(
            "At least 2 symbols with usable data required, got {count}"
        )));
    }
    annualize(returns, periods_per_year, compounding)
}

/// Same estimates as [`estimate`] without the two-asset floor; a single
/// column is enough to drive a simulation.
pub fn annualize(
    returns: &ReturnSeries,
    periods_per_year: Decimal,
    compounding: bool,
) -> PortfolioResult<AnnualizedStatistics> {
    let symbols = returns.symbols();
    if symbols.is_empty() {
        return Err(PortfolioError::DataInsufficient(
            "No symbol with usable data".into(),
        ));
    }
    let n = returns.len();
    if n < 2 {
        return Err(PortfolioError::DataInsufficient(
            "At least 2 return observations required".into(),
        ));
    }

    let columns: Vec<&[Decimal]> = symbols
        .iter()
        .filter_map(|s| returns.get(s))
        .collect();

    let expected_returns = columns
        .iter()
        .map(|r| annualized_return(r, periods_per_year, compounding))
        .collect();

    let k = columns.len();
    let mut covariance = vec![vec![Decimal::ZERO; k]; k];
    for i in 0..k {
        for j in i..k {
            let c = sample_covariance(columns[i], columns[j]) * periods_per_year;
            covariance[i][j] = c;
            covariance[j][i] = c;
        }
    }

    Ok(AnnualizedStatistics {
        symbols,
        expected_returns,
        covariance,
        observations: n,
    })
}

fn annualized_return(returns: &[Decimal], periods_per_year: Decimal, compounding: bool) -> Decimal {
    if returns.is_empty() {
        return Decimal::ZERO;
    }
    if !compounding {
        return mean(returns) * periods_per_year;
    }
    let growth: Decimal = returns.iter().map(|r| Decimal::ONE + r).product();
    if growth <= Decimal::ZERO {
        return -Decimal::ONE;
    }
    let exponent = periods_per_year / Decimal::from(returns.len() as u64);
    growth
        .checked_powd(exponent)
        .map(|g| g - Decimal::ONE)
        .unwrap_or_else(|| mean(returns) * periods_per_year)
}

// ---------------------------------------------------------------------------
// Descriptive helpers
// ---------------------------------------------------------------------------

pub fn mean(values: &[Decimal]) -> Decimal {
    if values.is_empty() {
        return Decimal::ZERO;
    }
    values.iter().sum::<Decimal>() / Decimal::from(values.len() as u64)
}

/// Sample variance (n - 1 denominator).
pub fn sample_variance(values: &[Decimal]) -> Decimal {
    sample_covariance(values, values)
}

pub fn sample_std(values: &[Decimal]) -> Decimal {
    sqrt_decimal(sample_variance(values))
}

/// Sample covariance (n - 1 denominator) over the common prefix of `a` and `b`.
pub fn sample_covariance(a: &[Decimal], b: &[Decimal]) -> Decimal {
    let n = a.len().min(b.len());
    if n < 2 {
        return Decimal::ZERO;
    }
    let (a, b) = (&a[..n], &b[..n]);
    let (ma, mb) = (mean(a), mean(b));
    let sum: Decimal = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (*x - ma) * (*y - mb))
        .sum();
    sum / Decimal::from((n - 1) as u64)
}

/// Pearson correlation; zero when either side has no variance.
pub fn pearson_correlation(a: &[Decimal], b: &[Decimal]) -> Decimal {
    let denom = sample_std(a) * sample_std(b);
    if denom.is_zero() {
        return Decimal::ZERO;
    }
    let corr = sample_covariance(a, b) / denom;
    corr.max(-Decimal::ONE).min(Decimal::ONE)
}

/// Percentile `p` (0-100) with linear interpolation between closest ranks.
pub fn percentile(values: &[Decimal], p: Decimal) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort();
    Some(percentile_sorted(&sorted, p))
}

/// Same as [`percentile`] on an already ascending slice.
pub fn percentile_sorted(sorted: &[Decimal], p: Decimal) -> Decimal {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = p / Decimal::ONE_HUNDRED * Decimal::from((sorted.len() - 1) as u64);
    let lower = rank.floor();
    let frac = rank - lower;
    let lo = lower.to_usize().unwrap_or(0).min(sorted.len() - 1);
    let hi = (lo + 1).min(sorted.len() - 1);
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Pair up two dated series on their common dates.
pub fn intersect_by_date(
    dates_a: &[NaiveDate],
    a: &[Decimal],
    dates_b: &[NaiveDate],
    b: &[Decimal],
) -> (Vec<Decimal>, Vec<Decimal>) {
    let lookup: BTreeMap<NaiveDate, Decimal> =
        dates_b.iter().copied().zip(b.iter().copied()).collect();
    dates_a
        .iter()
        .zip(a.iter())
        .filter_map(|(d, x)| lookup.get(d).map(|y| (*x, *y)))
        .unzip()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::PricePoint;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn table(entries: &[(&str, &[Option<i64>])]) -> PriceTable {
        let mut series = BTreeMap::new();
        for (symbol, closes) in entries {
            let points = closes
                .iter()
                .enumerate()
                .filter_map(|(i, c)| {
                    c.map(|v| PricePoint {
                        date: day(i as u32 + 1),
                        close: Decimal::from(v),
                    })
                })
                .collect();
            series.insert(symbol.to_string(), points);
        }
        PriceTable::from_series(&series)
    }

    #[test]
    fn test_percent_change() {
        let t = table(&[
            ("A", &[Some(100), Some(110), Some(99)]),
            ("B", &[Some(50), Some(50), Some(55)]),
        ]);
        let r = align_returns(&t, dec!(0.8)).unwrap();
        assert_eq!(r.len(), 2);
        assert_eq!(r.get("A").unwrap(), &[dec!(0.1), dec!(-0.1)]);
        assert_eq!(r.get("B").unwrap(), &[dec!(0), dec!(0.1)]);
        assert_eq!(r.dates, vec![day(2), day(3)]);
    }

    #[test]
    fn test_low_coverage_symbol_excluded() {
        // B has 3 of 5 closes = 60% < 80%
        let t = table(&[
            ("A", &[Some(100), Some(101), Some(102), Some(103), Some(104)]),
            ("B", &[Some(10), None, Some(11), None, Some(12)]),
        ]);
        let r = align_returns(&t, dec!(0.8)).unwrap();
        assert_eq!(r.symbols(), vec!["A".to_string()]);
        assert_eq!(r.excluded, vec!["B".to_string()]);
        assert_eq!(r.len(), 4);
    }

    #[test]
    fn test_intersection_of_dates() {
        // B misses one of five days: 80% coverage, kept; that day is dropped for both.
        let t = table(&[
            ("A", &[Some(100), Some(101), Some(102), Some(103), Some(104)]),
            ("B", &[Some(10), Some(11), None, Some(12), Some(13)]),
        ]);
        let r = align_returns(&t, dec!(0.8)).unwrap();
        assert_eq!(r.symbols().len(), 2);
        assert_eq!(r.len(), 3);
        assert_eq!(r.get("A").unwrap()[1], dec!(103) / dec!(101) - Decimal::ONE);
    }

    #[test]
    fn test_estimate_requires_two_symbols() {
        let t = table(&[("A", &[Some(100), Some(101), Some(102)])]);
        let r = align_returns(&t, dec!(0.8)).unwrap();
        assert!(matches!(
            estimate(&r, dec!(252), true),
            Err(PortfolioError::DataInsufficient(_))
        ));
        let single = annualize(&r, dec!(252), true).unwrap();
        assert_eq!(single.symbols, vec!["A".to_string()]);
        assert_eq!(single.covariance.len(), 1);
    }

    #[test]
    fn test_estimate_arithmetic_and_covariance() {
        let t = table(&[
            ("A", &[Some(100), Some(110), Some(99), Some(108)]),
            ("B", &[Some(100), Some(105), Some(100), Some(103)]),
        ]);
        let r = align_returns(&t, dec!(0.8)).unwrap();
        let stats = estimate(&r, dec!(252), false).unwrap();
        let a = r.get("A").unwrap();
        let b = r.get("B").unwrap();
        assert_eq!(stats.expected_returns[0], mean(a) * dec!(252));
        assert_eq!(stats.covariance[0][1], stats.covariance[1][0]);
        assert_eq!(stats.covariance[0][1], sample_covariance(a, b) * dec!(252));
        assert!(stats.covariance[0][0] > Decimal::ZERO);
    }

    #[test]
    fn test_compounded_return_of_constant_growth() {
        // +1% every day for 4 days annualised over 4 periods = 1.01^4 - 1
        let returns = vec![dec!(0.01); 4];
        let annual = annualized_return(&returns, dec!(4), true);
        assert!((annual - dec!(0.04060401)).abs() < dec!(0.000001));
    }

    #[test]
    fn test_percentile_linear_interpolation() {
        let v: Vec<Decimal> = (1..=5).map(Decimal::from).collect();
        assert_eq!(percentile(&v, dec!(50)), Some(dec!(3)));
        assert_eq!(percentile(&v, dec!(0)), Some(dec!(1)));
        assert_eq!(percentile(&v, dec!(100)), Some(dec!(5)));
        // rank = 0.05 * 4 = 0.2 -> 1 + 0.2
        assert_eq!(percentile(&v, dec!(5)), Some(dec!(1.2)));
        assert_eq!(percentile(&[], dec!(5)), None);
    }

    #[test]
    fn test_pearson_bounds() {
        let a = vec![dec!(1), dec!(2), dec!(3), dec!(4)];
        let b = vec![dec!(2), dec!(4), dec!(6), dec!(8)];
        let c = vec![dec!(4), dec!(3), dec!(2), dec!(1)];
        assert!((pearson_correlation(&a, &b) - Decimal::ONE).abs() < dec!(0.0000001));
        assert!((pearson_correlation(&a, &c) + Decimal::ONE).abs() < dec!(0.0000001));
        assert_eq!(pearson_correlation(&a, &[dec!(1); 4]), Decimal::ZERO);
    }

    #[test]
    fn test_intersect_by_date() {
        let (x, y) = intersect_by_date(
            &[day(1), day(2), day(3)],
            &[dec!(1), dec!(2), dec!(3)],
            &[day(2), day(3), day(4)],
            &[dec!(20), dec!(30), dec!(40)],
        );
        assert_eq!(x, vec![dec!(2), dec!(3)]);
        assert_eq!(y, vec![dec!(20), dec!(30)]);
    }
}
