//! Small numeric helpers shared by the algorithms and the runner metrics.

/// Arithmetic mean. NaN for an empty slice.
pub fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return f64::NAN;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Population standard deviation (divides by n).
pub fn std_population(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return f64::NAN;
    }
    let m = mean(xs);
    (xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / xs.len() as f64).sqrt()
}

/// Sample standard deviation (divides by n - 1). NaN below two values.
pub fn std_sample(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return f64::NAN;
    }
    let m = mean(xs);
    (xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (xs.len() - 1) as f64).sqrt()
}

/// Least-squares fit of `ys` against `0..n`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

/// Ordinary least squares of `ys` on the index `0, 1, …, n-1`.
///
/// A flat series fits with slope 0 and R² 0. Fewer than two points return
/// `None`.
pub fn linregress(ys: &[f64]) -> Option<LinearFit> {
    let n = ys.len();
    if n < 2 {
        return None;
    }
    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = mean(ys);

    let mut sxx = 0.0;
    let mut syy = 0.0;
    let mut sxy = 0.0;
    for (i, y) in ys.iter().enumerate() {
        let dx = i as f64 - x_mean;
        let dy = y - y_mean;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }

    let slope = sxy / sxx;
    let r_squared = if syy == 0.0 {
        0.0
    } else {
        ((sxy * sxy) / (sxx * syy)).min(1.0)
    };
    Some(LinearFit {
        slope,
        intercept: y_mean - slope * x_mean,
        r_squared,
    })
}

/// Clip every value into `mean ± k·sample_std` of the slice.
///
/// Fewer than two values have no spread to clip against and pass through.
pub fn winsorize(xs: &[f64], k: f64) -> Vec<f64> {
    let sd = std_sample(xs);
    if !sd.is_finite() {
        return xs.to_vec();
    }
    let m = mean(xs);
    let (lo, hi) = (m - k * sd, m + k * sd);
    xs.iter().map(|x| x.clamp(lo, hi)).collect()
}

/// Rescale to `[0, 1]`. A constant slice maps to all 0.5.
pub fn min_max(xs: &[f64]) -> Vec<f64> {
    let lo = xs.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = hi - lo;
    if range.is_nan() || range <= 0.0 {
        return vec![0.5; xs.len()];
    }
    xs.iter().map(|x| ((x - lo) / range).clamp(0.0, 1.0)).collect()
}
