//! Technical indicators over an adjusted-close series.
//!
//! Every function here takes the already-adjusted close/high/low series for
//! the visible window (index 0 aligned with the window's first bar) and
//! returns one output slot per input index. Slots where the indicator is
//! still undefined (insufficient history) come back as `None`, per the
//! "undefined prefix" behaviour the replay engine preserves for KDJ/RSI.

/// Return `val` if finite, otherwise `default` — guards against the
/// division-by-zero edges in RSV/RSI (flat ranges, zero average loss).
#[inline]
fn finite_or(val: f64, default: f64) -> f64 {
    if val.is_finite() {
        val
    } else {
        default
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Simple moving average, one slot per input index; `None` until the
/// window of `period` elements is filled.
pub fn sma(data: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; data.len()];
    if period == 0 {
        return out;
    }
    for i in 0..data.len() {
        if i + 1 >= period {
            let sum: f64 = data[i + 1 - period..=i].iter().sum();
            out[i] = Some(round2(finite_or(sum / period as f64, 0.0)));
        }
    }
    out
}

/// Standard recursive EMA seeded at the series' first value, so every index
/// carries a value (no undefined prefix) — matches MACD's own smoothing.
pub fn ema_from_first(data: &[f64], period: usize) -> Vec<f64> {
    if data.is_empty() {
        return Vec::new();
    }
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(data.len());
    out.push(data[0]);
    for &v in &data[1..] {
        let prev = *out.last().unwrap();
        out.push(finite_or(alpha * v + (1.0 - alpha) * prev, prev));
    }
    out
}

/// Wilder-style recursive EMA (pandas `ewm(alpha=1/period, adjust=False)`),
/// seeded at the first element of `data` (already the gain/loss series,
/// itself one shorter than the close series because it is built from diffs).
fn wilder_ema(data: &[f64], period: usize) -> Vec<f64> {
    if data.is_empty() {
        return Vec::new();
    }
    let alpha = 1.0 / period as f64;
    let mut out = Vec::with_capacity(data.len());
    out.push(data[0]);
    for &v in &data[1..] {
        let prev = *out.last().unwrap();
        out.push(finite_or(alpha * v + (1.0 - alpha) * prev, prev));
    }
    out
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MacdPoint {
    pub dif: f64,
    pub dea: f64,
    pub histogram: f64,
}

/// MACD(fast, slow, signal): `dif = ema_fast - ema_slow`, `dea = EMA(dif,
/// signal)`, `histogram = 2*(dif - dea)`. Defined for every index from the
/// very first close, per the recursive-EMA convention.
pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> Vec<MacdPoint> {
    if closes.is_empty() {
        return Vec::new();
    }
    let ema_fast = ema_from_first(closes, fast);
    let ema_slow = ema_from_first(closes, slow);
    let dif: Vec<f64> = ema_fast
        .iter()
        .zip(ema_slow.iter())
        .map(|(f, s)| f - s)
        .collect();
    let dea = ema_from_first(&dif, signal);
    dif.iter()
        .zip(dea.iter())
        .map(|(d, e)| MacdPoint {
            dif: round2(*d),
            dea: round2(*e),
            histogram: round2(2.0 * (d - e)),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct KdjPoint {
    pub k: f64,
    pub d: f64,
    pub j: f64,
}

/// KDJ(n, m1, m2). `rsv` is defined from index 0 (partial windows at the
/// start), but `k = SMA(rsv, m1)` and `d = SMA(k, m2)` are plain moving
/// averages, so the first `m1 - 1` (resp. `m1 + m2 - 2`) slots are `None`.
pub fn kdj(highs: &[f64], lows: &[f64], closes: &[f64], n: usize, m1: usize, m2: usize) -> Vec<Option<KdjPoint>> {
    let len = closes.len();
    let mut rsv = vec![0.0; len];
    for i in 0..len {
        let start = i + 1 - n.min(i + 1);
        let window_high = highs[start..=i].iter().cloned().fold(f64::MIN, f64::max);
        let window_low = lows[start..=i].iter().cloned().fold(f64::MAX, f64::min);
        let denom = window_high - window_low;
        let raw = if denom.abs() < f64::EPSILON {
            50.0
        } else {
            100.0 * (closes[i] - window_low) / denom
        };
        rsv[i] = finite_or(raw, 50.0);
    }

    let k = sma(&rsv, m1);
    let k_filled: Vec<f64> = k.iter().map(|v| v.unwrap_or(f64::NAN)).collect();
    let d = sma(&k_filled, m2);

    (0..len)
        .map(|i| match (k[i], d[i]) {
            (Some(kv), Some(dv)) => Some(KdjPoint {
                k: round2(kv),
                d: round2(dv),
                j: round2(3.0 * kv - 2.0 * dv),
            }),
            _ => None,
        })
        .collect()
}

/// RSI for one period: Wilder-smoothed gain/loss ratio. `None` at index 0
/// (no previous close to diff against); defined everywhere after.
pub fn rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let len = closes.len();
    if len < 2 {
        return vec![None; len];
    }
    let mut gains = Vec::with_capacity(len - 1);
    let mut losses = Vec::with_capacity(len - 1);
    for i in 1..len {
        let delta = closes[i] - closes[i - 1];
        gains.push(delta.max(0.0));
        losses.push((-delta).max(0.0));
    }
    let avg_gain = wilder_ema(&gains, period);
    let avg_loss = wilder_ema(&losses, period);

    let mut out = vec![None; len];
    for i in 0..avg_gain.len() {
        let (g, l) = (avg_gain[i], avg_loss[i]);
        let value = if l.abs() < f64::EPSILON {
            100.0
        } else {
            100.0 - 100.0 / (1.0 + g / l)
        };
        out[i + 1] = Some(round2(finite_or(value, 50.0)));
    }
    out
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BollPoint {
    pub middle: f64,
    pub upper: f64,
    pub lower: f64,
}

/// Bollinger Bands(period, k-sigma): `middle = SMA(close, period)`, bands at
/// `middle ± k*sigma` with sigma the sample standard deviation over the same
/// window. `None` until the window is filled.
pub fn bollinger(closes: &[f64], period: usize, k: f64) -> Vec<Option<BollPoint>> {
    let len = closes.len();
    let mut out = vec![None; len];
    if period == 0 {
        return out;
    }
    for i in 0..len {
        if i + 1 >= period && period >= 2 {
            let window = &closes[i + 1 - period..=i];
            let mean = window.iter().sum::<f64>() / period as f64;
            let sum_sq: f64 = window.iter().map(|v| (v - mean).powi(2)).sum();
            // sample standard deviation (ddof=1), matching pandas' rolling().std()
            let sigma = (sum_sq / (period as f64 - 1.0)).sqrt();
            out[i] = Some(BollPoint {
                middle: round2(mean),
                upper: round2(mean + k * sigma),
                lower: round2(mean - k * sigma),
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_undefined_prefix() {
        let out = sma(&[1.0, 2.0, 3.0, 4.0], 3);
        assert_eq!(out[0], None);
        assert_eq!(out[1], None);
        assert_eq!(out[2], Some(2.0));
        assert_eq!(out[3], Some(3.0));
    }

    #[test]
    fn rsi_undefined_at_first_index_only() {
        let closes = vec![10.0, 10.5, 10.2, 10.8, 11.0, 10.9, 11.3];
        let out = rsi(&closes, 6);
        assert_eq!(out[0], None);
        assert!(out[1].is_some());
        assert!(out.last().unwrap().is_some());
    }

    #[test]
    fn macd_defined_from_first_bar() {
        let closes = vec![10.0, 10.5, 10.2, 10.8];
        let out = macd(&closes, 12, 26, 9);
        assert_eq!(out.len(), closes.len());
    }

    #[test]
    fn bollinger_undefined_until_window_filled() {
        let closes: Vec<f64> = (0..25).map(|i| 10.0 + i as f64 * 0.1).collect();
        let out = bollinger(&closes, 20, 2.0);
        assert!(out[18].is_none());
        assert!(out[19].is_some());
    }
}
