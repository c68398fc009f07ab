use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::PortfolioError;
use crate::PortfolioResult;

/// A single daily close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: Decimal,
}

/// How much history to request, in trading days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lookback {
    pub trading_days: u32,
}

impl Lookback {
    pub fn days(trading_days: u32) -> Self {
        Self { trading_days }
    }
}

/// Closing prices for several symbols on a shared date index.
///
/// `closes[symbol][i]` is the close on `dates[i]`, or `None` when the
/// symbol did not trade (or the provider had no print) that day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceTable {
    pub dates: Vec<NaiveDate>,
    pub closes: BTreeMap<String, Vec<Option<Decimal>>>,
}

impl PriceTable {
    /// Build a table from per-symbol series, indexing on the union of dates.
    pub fn from_series(series: &BTreeMap<String, Vec<PricePoint>>) -> Self {
        let dates: Vec<NaiveDate> = series
            .values()
            .flat_map(|points| points.iter().map(|p| p.date))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let index: HashMap<NaiveDate, usize> =
            dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();

        let closes = series
            .iter()
            .map(|(symbol, points)| {
                let mut column = vec![None; dates.len()];
                for p in points {
                    if let Some(&i) = index.get(&p.date) {
                        column[i] = Some(p.close);
                    }
                }
                (symbol.clone(), column)
            })
            .collect();

        Self { dates, closes }
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty() || self.closes.is_empty()
    }

    pub fn symbols(&self) -> Vec<String> {
        self.closes.keys().cloned().collect()
    }

    /// Keep only the most recent `n` dates.
    pub fn tail(mut self, n: usize) -> Self {
        if self.dates.len() > n {
            let skip = self.dates.len() - n;
            self.dates.drain(..skip);
            for column in self.closes.values_mut() {
                column.drain(..skip);
            }
        }
        self
    }

    /// Fraction of dates with a close for `symbol`.
    pub fn coverage(&self, symbol: &str) -> Option<Decimal> {
        let column = self.closes.get(symbol)?;
        if self.dates.is_empty() {
            return Some(Decimal::ZERO);
        }
        let present = column.iter().filter(|c| c.is_some()).count();
        Some(Decimal::from(present as u64) / Decimal::from(self.dates.len() as u64))
    }
}

/// Source of historical closes. Implementations perform exactly one fetch
/// per call; retries and backoff belong to the implementation, not the engine.
pub trait PriceHistoryProvider: Send + Sync {
    /// Fetch closes for `symbols` over `lookback`. Symbols the provider
    /// does not know are simply absent from the table.
    fn fetch(&self, symbols: &[String], lookback: Lookback) -> PortfolioResult<PriceTable>;
}

/// Provider backed by series held in memory (loaded from files or built in tests).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InMemoryPriceProvider {
    series: BTreeMap<String, Vec<PricePoint>>,
}

impl InMemoryPriceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, symbol: impl Into<String>, points: Vec<PricePoint>) -> Self {
        self.insert(symbol, points);
        self
    }

    pub fn insert(&mut self, symbol: impl Into<String>, mut points: Vec<PricePoint>) {
        points.sort_by_key(|p| p.date);
        self.series.insert(symbol.into(), points);
    }

    pub fn symbols(&self) -> Vec<String> {
        self.series.keys().cloned().collect()
    }
}

impl PriceHistoryProvider for InMemoryPriceProvider {
    fn fetch(&self, symbols: &[String], lookback: Lookback) -> PortfolioResult<PriceTable> {
        let selected: BTreeMap<String, Vec<PricePoint>> = symbols
            .iter()
            .filter_map(|s| self.series.get(s).map(|p| (s.clone(), p.clone())))
            .collect();

        if selected.is_empty() {
            return Err(PortfolioError::NoMarketData(format!(
                "No price history for any of [{}]",
                symbols.join(", ")
            )));
        }

        Ok(PriceTable::from_series(&selected).tail(lookback.trading_days as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn points(days: &[u32]) -> Vec<PricePoint> {
        days.iter()
            .map(|d| PricePoint {
                date: day(*d),
                close: Decimal::from(100 + *d),
            })
            .collect()
    }

    #[test]
    fn test_union_index_with_gaps() {
        let mut series = BTreeMap::new();
        series.insert("A".to_string(), points(&[2, 3, 4, 5]));
        series.insert("B".to_string(), points(&[2, 4, 5]));
        let table = PriceTable::from_series(&series);

        assert_eq!(table.dates.len(), 4);
        assert_eq!(table.closes["B"][1], None);
        assert_eq!(table.closes["B"][2], Some(dec!(104)));
        assert_eq!(table.coverage("A"), Some(Decimal::ONE));
        assert_eq!(table.coverage("B"), Some(dec!(0.75)));
        assert_eq!(table.coverage("C"), None);
    }

    #[test]
    fn test_tail_keeps_latest() {
        let mut series = BTreeMap::new();
        series.insert("A".to_string(), points(&[2, 3, 4, 5]));
        let table = PriceTable::from_series(&series).tail(2);
        assert_eq!(table.dates, vec![day(4), day(5)]);
        assert_eq!(table.closes["A"], vec![Some(dec!(104)), Some(dec!(105))]);
    }

    #[test]
    fn test_provider_unknown_symbols() {
        let provider = InMemoryPriceProvider::new().with_series("A", points(&[2, 3]));
        let err = provider.fetch(&["ZZZ".to_string()], Lookback::days(10));
        assert!(matches!(err, Err(PortfolioError::NoMarketData(_))));

        let table = provider
            .fetch(&["A".to_string(), "ZZZ".to_string()], Lookback::days(10))
            .unwrap();
        assert_eq!(table.symbols(), vec!["A".to_string()]);
    }

    #[test]
    fn test_provider_deserializes_from_symbol_map() {
        let json = r#"{"A": [{"date": "2024-01-03", "close": "101"}, {"date": "2024-01-02", "close": "100"}]}"#;
        let provider: InMemoryPriceProvider = serde_json::from_str(json).unwrap();
        let table = provider.fetch(&["A".to_string()], Lookback::days(5)).unwrap();
        assert_eq!(table.dates, vec![day(2), day(3)]);
    }
}
