//! Value scaling and small numeric helpers shared by the normalizers.

/// Rates with an absolute value below this are decimal fractions; at or
/// above it they are already percentages.
///
/// Provisional: the boundary has not been validated against a full sample
/// of provider output. Changing it only touches this constant.
pub const FUNDING_FRACTION_THRESHOLD: f64 = 0.001;

/// Express a funding rate as a percentage.
///
/// `|v| < FUNDING_FRACTION_THRESHOLD` → `v * 100`; otherwise `v` unchanged.
/// The boundary is exclusive, so exactly `0.001` is returned as is.
pub fn funding_rate_percent(v: f64) -> f64 {
    if v.abs() < FUNDING_FRACTION_THRESHOLD {
        v * 100.0
    } else {
        v
    }
}

/// Round half away from zero to `dp` decimal places.
pub fn round_dp(v: f64, dp: u32) -> f64 {
    let factor = 10f64.powi(dp as i32);
    (v * factor).round() / factor
}

/// `(latest - prev) / prev * 100`; `None` when `prev` is zero.
pub fn pct_change(prev: f64, latest: f64) -> Option<f64> {
    if prev == 0.0 {
        None
    } else {
        Some((latest - prev) / prev * 100.0)
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Sample standard deviation (n - 1); `None` below two values.
pub fn stdev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fraction_becomes_percent() {
        assert!((funding_rate_percent(0.0001) - 0.01).abs() < 1e-12);
        assert!((funding_rate_percent(-0.0005) + 0.05).abs() < 1e-12);
    }

    #[test]
    fn percent_passes_through() {
        assert_eq!(funding_rate_percent(0.05), 0.05);
        assert_eq!(funding_rate_percent(0.0123), 0.0123);
    }

    #[test]
    fn threshold_is_exclusive() {
        assert_eq!(funding_rate_percent(0.001), 0.001);
        assert_eq!(funding_rate_percent(-0.001), -0.001);
    }

    #[test]
    fn rounding() {
        assert_eq!(round_dp(62.342_795, 2), 62.34);
        assert_eq!(round_dp(0.125, 2), 0.13);
        assert_eq!(round_dp(-2.456, 2), -2.46);
    }

    #[test]
    fn pct_change_guards_zero() {
        assert_eq!(pct_change(0.0, 5.0), None);
        assert!((pct_change(100.0, 102.0).unwrap() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn sample_stdev() {
        let s = stdev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((s - 2.138_089_935).abs() < 1e-6);
        assert_eq!(stdev(&[1.0]), None);
    }
}
