//! Numeric kernels for comparing intensity traces

/// The fewest jointly non-zero points a correlation is computed over
pub const MIN_OVERLAP: usize = 4;

/// Pearson's correlation between `x` and `y`, computed only over the positions where
/// both series are non-zero.
///
/// Returns `None` when fewer than `min_overlap` positions are shared, or when either
/// series is constant over the shared positions. Otherwise the result lies in `[-1, 1]`.
pub fn pearson_nonzero(x: &[f64], y: &[f64], min_overlap: usize) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .copied()
        .zip(y.iter().copied())
        .filter(|(a, b)| *a != 0.0 && *b != 0.0)
        .collect();
    let n = pairs.len();
    if n < min_overlap.max(1) {
        return None;
    }

    let mean_x = pairs.iter().map(|(a, _)| a).sum::<f64>() / n as f64;
    let mean_y = pairs.iter().map(|(_, b)| b).sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (a, b) in pairs {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return None;
    }
    let r = cov / denom;
    if r.is_nan() {
        None
    } else {
        Some(r.clamp(-1.0, 1.0))
    }
}

/// Scale `values` in place so that the largest is `1.0`. Series whose maximum is not
/// positive are left untouched.
pub fn normalize_to_max(values: &mut [f64]) {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max > 0.0 {
        values.iter_mut().for_each(|v| *v /= max);
    }
}

#[inline(always)]
fn interpolate_point(x_j: f64, x: f64, x_j1: f64, y_j: f64, y_j1: f64) -> f64 {
    ((y_j * (x_j1 - x)) + (y_j1 * (x - x_j))) / (x_j1 - x_j)
}

/// Piecewise-linear resampling of the series `(xp, fp)` at each point of `x`.
///
/// `xp` must be non-decreasing. Points before the first or after the last knot take
/// the value of that knot.
pub fn interpolate_linear(xp: &[f64], fp: &[f64], x: &[f64]) -> Vec<f64> {
    let n = xp.len().min(fp.len());
    if n == 0 {
        return vec![0.0; x.len()];
    }
    x.iter()
        .map(|xi| {
            let j = xp[..n].partition_point(|v| *v <= *xi);
            if j == 0 {
                fp[0]
            } else if j == n {
                fp[n - 1]
            } else {
                let (x_j, x_j1) = (xp[j - 1], xp[j]);
                if x_j1 == x_j {
                    fp[j - 1]
                } else {
                    interpolate_point(x_j, *xi, x_j1, fp[j - 1], fp[j])
                }
            }
        })
        .collect()
}
