use ndarray::ArrayView1;

pub struct StatsHelper;

impl StatsHelper {
    pub fn mean(samples: &[f64]) -> Option<f64> {
        ArrayView1::from(samples).mean()
    }

    /// Standard deviation with one delta degree of freedom; needs two samples.
    pub fn sample_std(samples: &[f64]) -> Option<f64> {
        if samples.len() < 2 {
            return None;
        }
        Some(ArrayView1::from(samples).std(1.0))
    }

    pub fn max(samples: &[f64]) -> Option<f64> {
        samples.iter().copied().reduce(f64::max)
    }

    /// Centered moving average. Positions where the window does not fit are `None`.
    ///
    /// Position `i` averages `[i - window / 2, i + (window - 1) / 2]`.
    pub fn rolling_centered_mean(samples: &[f64], window: usize) -> Vec<Option<f64>> {
        let mut smoothed = vec![None; samples.len()];
        if window == 0 || window > samples.len() {
            return smoothed;
        }

        let leading = window / 2;
        let view = ArrayView1::from(samples);
        for (start, frame) in view.windows(window).into_iter().enumerate() {
            smoothed[start + leading] = frame.mean();
        }
        smoothed
    }

    /// Index at which the cumulative weight first reaches half of the total.
    pub fn weighted_median_index(weights: &[f64]) -> Option<usize> {
        let total: f64 = weights.iter().sum();
        if !(total > 0.0) {
            return None;
        }
        let half = total / 2.0;
        let mut cumulative = 0.0;
        for (idx, weight) in weights.iter().enumerate() {
            cumulative += weight;
            if cumulative >= half {
                return Some(idx);
            }
        }
        None
    }
}
