use std::collections::HashMap;

/// One OHLCV row, as produced by the external Data Service (SPEC_FULL.md §6).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// An indicator-enriched frame for one timeframe: the ordered candle
/// sequence plus named indicator columns appended by the external Feature
/// Service (SPEC_FULL.md §4.2, §6).
///
/// Columns are looked up by name rather than modeled as fixed struct
/// fields because `get_required_features()` (SPEC_FULL.md §4.5) is a
/// per-strategy, data-driven list — a strategy declares what it needs and
/// the frame is the single point where "is this column present" is
/// checked.
#[derive(Debug, Clone, Default)]
pub struct AnalysisFrame {
    pub candles: Vec<Candle>,
    pub columns: HashMap<String, Vec<f64>>,
}

impl AnalysisFrame {
    pub fn new(candles: Vec<Candle>) -> Self {
        Self {
            candles,
            columns: HashMap::new(),
        }
    }

    pub fn with_column(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.columns.insert(name.into(), values);
        self
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn close(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    pub fn high(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.high).collect()
    }

    pub fn low(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.low).collect()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.candles.last().map(|c| c.close)
    }

    /// Fetches a named column, falling back to the well-known OHLC series
    /// for `close`/`high`/`low` even when they were not explicitly
    /// inserted via `with_column`.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        match name {
            "close" => Some(self.close()),
            "high" => Some(self.high()),
            "low" => Some(self.low()),
            other => self.columns.get(other).cloned(),
        }
    }

    pub fn last_value(&self, name: &str) -> Option<f64> {
        self.column(name).and_then(|c| c.last().copied())
    }

    /// Checks that every requested column exists and the last row has no
    /// NaN in any of them (the "data guard" step common to all concrete
    /// strategies, SPEC_FULL.md §4.5.x step 1).
    pub fn has_required_columns(&self, required: &[&str]) -> bool {
        required.iter().all(|name| match self.last_value(name) {
            Some(v) => v.is_finite(),
            None => false,
        })
    }

    pub fn missing_columns(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|name| self.column(name).is_none())
            .map(|s| s.to_string())
            .collect()
    }
}
