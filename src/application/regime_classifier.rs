use crate::domain::{AnalysisFrame, Regime, ThresholdStore};

const REQUIRED_COLUMNS: &[&str] = &["close", "high", "low", "atr_14", "adx_14"];

/// Diagnostic snapshot of the metrics behind one classification
/// (SPEC_FULL.md §4.2 "ambient", grounded in `get_regime_stats`).
#[derive(Debug, Clone, Copy)]
pub struct RegimeStats {
    pub bb_width: f64,
    pub price_range: f64,
    pub ema_slope: f64,
    pub atr_ratio: f64,
    pub regime: Regime,
}

/// Derives a four-way market regime from an indicator frame
/// (SPEC_FULL.md §4.2, grounded in `market_regime_classifier.py`).
///
/// Never panics or returns an error: any missing-column, short-frame, or
/// non-finite condition falls back to `Regime::NormalRange` with a
/// warning, matching the source's outer try/except.
pub struct RegimeClassifier<'a> {
    store: &'a ThresholdStore,
    bb_period: usize,
    price_range_lookback: usize,
    ema_period: usize,
    ema_lookback: usize,
}

impl<'a> RegimeClassifier<'a> {
    pub fn new(store: &'a ThresholdStore) -> Self {
        Self {
            store,
            bb_period: 20,
            price_range_lookback: 20,
            ema_period: 20,
            ema_lookback: 5,
        }
    }

    pub fn classify(&self, frame: &AnalysisFrame) -> Regime {
        self.regime_stats(frame)
            .map(|stats| stats.regime)
            .unwrap_or_else(|| {
                tracing::warn!("regime classification failed, defaulting to NORMAL_RANGE");
                Regime::NormalRange
            })
    }

    pub fn regime_stats(&self, frame: &AnalysisFrame) -> Option<RegimeStats> {
        if frame.is_empty() {
            return None;
        }
        if !frame.has_required_columns(REQUIRED_COLUMNS) {
            return None;
        }

        let bb_width = self.bb_width(frame).unwrap_or(0.04);
        let price_range = self.price_range(frame)?;
        let ema_slope = self.ema_slope(frame);
        let adx = frame.last_value("adx_14")?;
        let atr_ratio = self.atr_ratio(frame)?;

        if !(bb_width.is_finite()
            && price_range.is_finite()
            && ema_slope.is_finite()
            && adx.is_finite()
            && atr_ratio.is_finite())
        {
            return None;
        }

        let regime = self.classify_from_metrics(atr_ratio, bb_width, price_range, adx, ema_slope);

        Some(RegimeStats {
            bb_width,
            price_range,
            ema_slope,
            atr_ratio,
            regime,
        })
    }

    fn classify_from_metrics(
        &self,
        atr_ratio: f64,
        bb_width: f64,
        price_range: f64,
        adx: f64,
        ema_slope: f64,
    ) -> Regime {
        let high_vol_threshold = self
            .store
            .get("market_regime.high_volatility.atr_ratio_threshold", 0.018);
        if atr_ratio > high_vol_threshold {
            return Regime::HighVolatility;
        }

        let tight_bb_threshold = self
            .store
            .get("market_regime.tight_range.bb_width_threshold", 0.025);
        let tight_pr_threshold = self
            .store
            .get("market_regime.tight_range.price_range_threshold", 0.015);
        if bb_width < tight_bb_threshold && price_range < tight_pr_threshold {
            return Regime::TightRange;
        }

        let trend_adx_threshold = self.store.get("market_regime.trending.adx_threshold", 20.0);
        let trend_slope_threshold = self
            .store
            .get("market_regime.trending.ema_slope_threshold", 0.007);
        if adx > trend_adx_threshold && ema_slope.abs() > trend_slope_threshold {
            return Regime::Trending;
        }

        let normal_bb_threshold = self
            .store
            .get("market_regime.normal_range.bb_width_threshold", 0.05);
        let normal_adx_threshold = self
            .store
            .get("market_regime.normal_range.adx_threshold", 20.0);
        if bb_width < normal_bb_threshold && adx < normal_adx_threshold {
            return Regime::NormalRange;
        }

        Regime::NormalRange
    }

    /// `(mean + 2*std - (mean - 2*std)) / mean` over the last `bb_period`
    /// closes. `None` when std can't be computed (fewer than 2 points or
    /// zero mean) — callers substitute the 0.04 midpoint fallback.
    fn bb_width(&self, frame: &AnalysisFrame) -> Option<f64> {
        let close = frame.close();
        if close.len() < 2 {
            return None;
        }
        let window = &close[close.len().saturating_sub(self.bb_period)..];
        let mean = window.iter().sum::<f64>() / window.len() as f64;
        if mean == 0.0 {
            return None;
        }
        let variance = window.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / window.len() as f64;
        let std = variance.sqrt();
        if std == 0.0 || !std.is_finite() {
            return None;
        }
        let upper = mean + 2.0 * std;
        let lower = mean - 2.0 * std;
        Some((upper - lower) / mean)
    }

    fn price_range(&self, frame: &AnalysisFrame) -> Option<f64> {
        let close = frame.close();
        if close.is_empty() {
            return None;
        }
        let window = &close[close.len().saturating_sub(self.price_range_lookback)..];
        let max = window.iter().cloned().fold(f64::MIN, f64::max);
        let min = window.iter().cloned().fold(f64::MAX, f64::min);
        let current = *close.last()?;
        if current == 0.0 {
            return None;
        }
        Some((max - min) / current)
    }

    /// `(ema[t] - ema[t-L]) / ema[t-L]`. Uses the `ema_20` column if the
    /// feature service produced it; otherwise recomputes an EWM over
    /// `close` with the configured period, treating NaN/zero denominators
    /// as a slope of 0.0 rather than propagating them (SPEC_FULL.md §9's
    /// NaN-handling note).
    fn ema_slope(&self, frame: &AnalysisFrame) -> f64 {
        let ema = match frame.column("ema_20") {
            Some(values) if values.len() >= self.ema_lookback + 1 => values,
            _ => self.compute_ema(&frame.close(), self.ema_period),
        };

        if ema.len() < self.ema_lookback + 1 {
            return 0.0;
        }
        let current = ema[ema.len() - 1];
        let past = ema[ema.len() - 1 - self.ema_lookback];
        if past <= 0.0 || !current.is_finite() || !past.is_finite() {
            return 0.0;
        }
        (current - past) / past
    }

    fn compute_ema(&self, close: &[f64], period: usize) -> Vec<f64> {
        if close.is_empty() || period == 0 {
            return Vec::new();
        }
        let alpha = 2.0 / (period as f64 + 1.0);
        let mut ema = Vec::with_capacity(close.len());
        ema.push(close[0]);
        for &price in &close[1..] {
            let prev = *ema.last().unwrap();
            ema.push(alpha * price + (1.0 - alpha) * prev);
        }
        ema
    }

    fn atr_ratio(&self, frame: &AnalysisFrame) -> Option<f64> {
        let atr = frame.last_value("atr_14")?;
        let close = frame.last_close()?;
        if close == 0.0 {
            return None;
        }
        Some(atr / close)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Candle;

    fn candle(close: f64) -> Candle {
        Candle {
            timestamp: 0,
            open: close,
            high: close,
            low: close,
            close,
            volume: 0.0,
        }
    }

    fn store() -> ThresholdStore {
        ThresholdStore::new("/nonexistent/base.yaml", "/nonexistent/overlay.yaml")
    }

    /// S2: high-volatility short-circuit regardless of other features.
    #[test]
    fn high_volatility_always_wins_first() {
        let store = store();
        let classifier = RegimeClassifier::new(&store);

        let candles: Vec<Candle> = (0..25).map(|i| candle(10_000_000.0 + i as f64)).collect();
        let frame = AnalysisFrame::new(candles)
            .with_column("atr_14", vec![300_000.0; 25])
            .with_column("adx_14", vec![10.0; 25]);

        assert_eq!(classifier.classify(&frame), Regime::HighVolatility);
    }

    /// S1: tight-range classification from a narrow closing band.
    #[test]
    fn tight_range_from_narrow_band() {
        let store = store();
        let classifier = RegimeClassifier::new(&store);

        let closes = [
            9_990_000.0, 9_995_000.0, 10_000_000.0, 10_002_000.0, 10_005_000.0,
        ];
        let candles: Vec<Candle> = (0..20)
            .map(|i| candle(closes[i % closes.len()]))
            .collect();
        let frame = AnalysisFrame::new(candles)
            .with_column("atr_14", vec![5_000.0; 20])
            .with_column("adx_14", vec![10.0; 20]);

        assert_eq!(classifier.classify(&frame), Regime::TightRange);
    }

    #[test]
    fn short_frame_falls_back_to_normal_range() {
        let store = store();
        let classifier = RegimeClassifier::new(&store);
        let frame = AnalysisFrame::new(vec![candle(100.0); 3]);

        assert_eq!(classifier.classify(&frame), Regime::NormalRange);
    }

    #[test]
    fn missing_columns_fall_back_to_normal_range() {
        let store = store();
        let classifier = RegimeClassifier::new(&store);
        let frame = AnalysisFrame::new(vec![candle(100.0); 25]);

        assert_eq!(classifier.classify(&frame), Regime::NormalRange);
    }
}
