//! Small statistics helpers shared by the factor modules and metrics.

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation.
pub fn stddev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

/// Population covariance of two equal-length series.
pub fn covariance(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() {
        return None;
    }
    let ma = mean(a)?;
    let mb = mean(b)?;
    let sum: f64 = a.iter().zip(b).map(|(x, y)| (x - ma) * (y - mb)).sum();
    Some(sum / a.len() as f64)
}

/// Annualized volatility of daily returns: stddev * sqrt(252).
pub fn annualized_volatility(daily_returns: &[f64]) -> Option<f64> {
    stddev(daily_returns).map(|s| s * TRADING_DAYS_PER_YEAR.sqrt())
}

/// CAPM beta: cov(asset, market) / var(market). `None` when the market
/// series has no variance.
pub fn beta(asset: &[f64], market: &[f64]) -> Option<f64> {
    let cov = covariance(asset, market)?;
    let var = covariance(market, market)?;
    if var > 0.0 { Some(cov / var) } else { None }
}

/// Largest peak-to-trough decline of a price or equity series, as a
/// fraction of the running peak.
pub fn max_drawdown(series: &[f64]) -> f64 {
    let mut peak = match series.first() {
        Some(&v) => v,
        None => return 0.0,
    };
    let mut max_dd = 0.0_f64;
    for &v in series {
        if v > peak {
            peak = v;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - v) / peak);
        }
    }
    max_dd
}

/// Coefficient of variation, stddev / |mean|. `None` for a zero mean.
pub fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    if m.abs() < f64::EPSILON {
        return None;
    }
    stddev(values).map(|s| s / m.abs())
}
