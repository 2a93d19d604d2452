use crate::math::stats::StatsHelper;

/// Half-maximum crossings of a single-peaked signal, in units of the supplied axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HalfMaxEdges {
    pub left: f64,
    pub right: f64,
    pub center: f64,
    pub peak_mean: f64,
}

impl HalfMaxEdges {
    pub fn span(&self) -> f64 {
        self.right - self.left
    }

    pub fn midpoint(&self) -> f64 {
        (self.left + self.right) / 2.0
    }
}

/// Locates the half-maximum edges of `values` sampled along `axis`.
///
/// The peak is the dose-weighted median of the samples at or above
/// `percentile * max`; the search walks outward from it until a sample drops
/// below half of the mean of those peak samples, and interpolates the crossing.
pub fn locate_half_max(axis: &[f64], values: &[f64], percentile: f64) -> Option<HalfMaxEdges> {
    if axis.len() != values.len() || values.len() < 3 {
        return None;
    }

    let max = StatsHelper::max(values)?;
    if !(max > 0.0) {
        return None;
    }

    let cutoff = percentile * max;
    let peak_indices: Vec<usize> = (0..values.len())
        .filter(|&idx| values[idx] >= cutoff)
        .collect();
    let peak_values: Vec<f64> = peak_indices.iter().map(|&idx| values[idx]).collect();
    let peak_mean = StatsHelper::mean(&peak_values)?;
    let center_idx = peak_indices[StatsHelper::weighted_median_index(&peak_values)?];
    let half = peak_mean / 2.0;

    let below_left = (0..center_idx).rev().find(|&idx| values[idx] < half)?;
    let below_right = (center_idx + 1..values.len()).find(|&idx| values[idx] < half)?;

    let left = interpolate(axis, values, below_left, below_left + 1, half);
    let right = interpolate(axis, values, below_right - 1, below_right, half);

    Some(HalfMaxEdges {
        left,
        right,
        center: axis[center_idx],
        peak_mean,
    })
}

fn interpolate(axis: &[f64], values: &[f64], from: usize, to: usize, level: f64) -> f64 {
    let rise = values[to] - values[from];
    if rise == 0.0 {
        return axis[from];
    }
    axis[from] + (level - values[from]) / rise * (axis[to] - axis[from])
}
