//! Evaluation of predicted trajectories against ground truth, on flattened
//! (case, x, y, slice) tensors.

use crate::constants::{HOTSPOT_AREA_THRESHOLD, HOTSPOT_TEMPERATURE, SENSITIVITY_STEPS};
use crate::error::{ParcError, Result};
use crate::normalize::ChannelRange;
use ndarray::{s, Array2, Array4, ArrayView2, ArrayView3, Axis};

fn check_pair(y_true: &Array4<f64>, y_pred: &Array4<f64>, cases: usize, slices: usize) -> Result<()> {
    if y_true.dim() != y_pred.dim() {
        return Err(ParcError::shape("prediction", y_true.dim(), y_pred.dim()));
    }
    let (n, _, _, t) = y_true.dim();
    if cases > n || slices > t {
        return Err(ParcError::shape("evaluation window", (n, t), (cases, slices)));
    }
    Ok(())
}

fn per_slice(
    y_true: &Array4<f64>,
    y_pred: &Array4<f64>,
    cases: usize,
    time_steps: usize,
    score: fn(ArrayView2<f64>, ArrayView2<f64>) -> f64,
) -> Result<Array2<f64>> {
    let slices = time_steps.saturating_sub(1);
    check_pair(y_true, y_pred, cases, slices)?;
    Ok(Array2::from_shape_fn((cases, slices), |(i, j)| {
        score(
            y_true.slice(s![i, .., .., j]),
            y_pred.slice(s![i, .., .., j]),
        )
    }))
}

fn rmse_slice(a: ArrayView2<f64>, b: ArrayView2<f64>) -> f64 {
    let n = a.len() as f64;
    let sq: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum();
    (sq / n).sqrt()
}

fn r2_slice(a: ArrayView2<f64>, b: ArrayView2<f64>) -> f64 {
    let mean = a.mean().unwrap_or(0.0);
    let ss_res: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum();
    let ss_tot: f64 = a.iter().map(|x| (x - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        // Constant ground truth: perfect only if the prediction matches
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// Root mean squared error for the first `cases` cases and the first
/// `time_steps - 1` slices. Shape (cases, time_steps - 1).
pub fn rmse(y_true: &Array4<f64>, y_pred: &Array4<f64>, cases: usize, time_steps: usize) -> Result<Array2<f64>> {
    per_slice(y_true, y_pred, cases, time_steps, rmse_slice)
}

/// Coefficient of determination, same layout as [`rmse`].
pub fn r2(y_true: &Array4<f64>, y_pred: &Array4<f64>, cases: usize, time_steps: usize) -> Result<Array2<f64>> {
    per_slice(y_true, y_pred, cases, time_steps, r2_slice)
}

/// Hotspot pixel counts of one sample (x, y, slice) over the sensitivity
/// window, after rescaling from [-1, 1] to [0, 1].
pub fn hotspot_areas(sample: ArrayView3<f64>) -> Result<Vec<usize>> {
    let slices = sample.len_of(Axis(2));
    if slices < SENSITIVITY_STEPS.end {
        return Err(ParcError::shape("hotspot slices", SENSITIVITY_STEPS.end, slices));
    }
    Ok(SENSITIVITY_STEPS
        .map(|i| {
            sample
                .index_axis(Axis(2), i)
                .iter()
                .filter(|&&v| (v + 1.0) / 2.0 > HOTSPOT_AREA_THRESHOLD)
                .count()
        })
        .collect())
}

/// Linear-interpolated percentile. `q` is clamped to [0, 100]; NaN input or
/// an empty slice gives NaN.
pub fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() || q.is_nan() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let pos = q.clamp(0.0, 100.0) / 100.0 * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Per-step hotspot area statistics over a set of cases.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaStats {
    pub mean: Vec<f64>,
    pub upper: Vec<f64>, // 95th percentile
    pub lower: Vec<f64>, // 5th percentile
}

impl AreaStats {
    fn from_areas(areas: &[Vec<usize>]) -> Self {
        let steps = areas.first().map_or(0, |a| a.len());
        let column = |k: usize| -> Vec<f64> { areas.iter().map(|a| a[k] as f64).collect() };
        let mut stats = AreaStats {
            mean: Vec::with_capacity(steps),
            upper: Vec::with_capacity(steps),
            lower: Vec::with_capacity(steps),
        };
        for k in 0..steps {
            let col = column(k);
            stats.mean.push(col.iter().sum::<f64>() / col.len() as f64);
            stats.upper.push(percentile(&col, 95.0));
            stats.lower.push(percentile(&col, 5.0));
        }
        stats
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sensitivity {
    pub prediction: AreaStats,
    pub ground_truth: AreaStats,
}

/// Hotspot area statistics of prediction and ground truth over the first
/// `cases` cases.
pub fn average_sensitivity(y_true: &Array4<f64>, y_pred: &Array4<f64>, cases: usize) -> Result<Sensitivity> {
    check_pair(y_true, y_pred, cases, SENSITIVITY_STEPS.end)?;
    let areas = |data: &Array4<f64>| -> Result<Vec<Vec<usize>>> {
        (0..cases)
            .map(|i| hotspot_areas(data.index_axis(Axis(0), i)))
            .collect()
    };
    Ok(Sensitivity {
        prediction: AreaStats::from_areas(&areas(y_pred)?),
        ground_truth: AreaStats::from_areas(&areas(y_true)?),
    })
}

/// Pixels of a normalized temperature slice hotter than the hotspot
/// threshold once mapped back through `range`.
pub fn saliency_mask(temperature: ArrayView2<f64>, range: ChannelRange) -> Array2<bool> {
    temperature.mapv(|v| range.denormalize(v) > HOTSPOT_TEMPERATURE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{array, Array};

    #[test]
    fn rmse_of_constant_offset() {
        let y_true = Array4::<f64>::zeros((2, 3, 3, 4));
        let y_pred = Array4::<f64>::from_elem((2, 3, 3, 4), 0.5);
        let scores = rmse(&y_true, &y_pred, 2, 4).unwrap();
        assert_eq!(scores.dim(), (2, 3));
        assert!(scores.iter().all(|&v| (v - 0.5).abs() < 1e-12));
    }

    #[test]
    fn r2_perfect_and_mean() {
        let y_true = Array::from_shape_fn((1, 2, 2, 3), |(_, i, j, t)| (i * 2 + j + t) as f64);
        let perfect = r2(&y_true, &y_true, 1, 3).unwrap();
        assert!(perfect.iter().all(|&v| v == 1.0));

        // Predicting the mean of each slice scores 0
        let mut y_mean = y_true.clone();
        for t in 0..3 {
            let m = y_true.slice(s![0, .., .., t]).mean().unwrap();
            y_mean.slice_mut(s![0, .., .., t]).fill(m);
        }
        let scores = r2(&y_true, &y_mean, 1, 3).unwrap();
        assert_relative_eq!(scores[[0, 0]], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn r2_constant_truth() {
        let a = Array2::<f64>::ones((2, 2));
        assert_eq!(r2_slice(a.view(), a.view()), 1.0);
        assert_eq!(r2_slice(a.view(), (&a * 2.0).view()), 0.0);
    }

    #[test]
    fn window_larger_than_data() {
        let y = Array4::<f64>::zeros((1, 2, 2, 3));
        assert!(rmse(&y, &y, 2, 3).is_err());
        assert!(rmse(&y, &y, 1, 5).is_err());
        assert!(rmse(&y, &Array4::zeros((1, 2, 2, 4)), 1, 2).is_err());
    }

    #[test]
    fn hotspot_counts() {
        // Slice i has i hot pixels out of 25
        let sample = Array::from_shape_fn((5, 5, 20), |(x, y, i)| {
            if x * 5 + y < i { 1.0 } else { -1.0 }
        });
        let areas = hotspot_areas(sample.view()).unwrap();
        assert_eq!(areas, (3..18).collect::<Vec<usize>>());
        assert!(hotspot_areas(Array::zeros((2, 2, 10)).view()).is_err());
    }

    #[test]
    fn percentile_interpolates() {
        let v = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_relative_eq!(percentile(&v, 50.0), 3.0);
        assert_relative_eq!(percentile(&v, 95.0), 4.8);
        assert_relative_eq!(percentile(&v, 5.0), 1.2);
        assert!(percentile(&[], 50.0).is_nan());
    }

    #[test]
    fn percentile_clamps_out_of_range_q() {
        let v = [3.0, 1.0, 2.0];
        assert_eq!(percentile(&v, 150.0), 3.0);
        assert_eq!(percentile(&v, f64::INFINITY), 3.0);
        assert_eq!(percentile(&v, -20.0), 1.0);
        assert!(percentile(&v, f64::NAN).is_nan());
    }

    #[test]
    fn sensitivity_statistics() {
        let hot = Array4::<f64>::ones((3, 2, 2, 18));
        let cold = Array4::<f64>::from_elem((3, 2, 2, 18), -1.0);
        let s = average_sensitivity(&cold, &hot, 3).unwrap();
        assert_eq!(s.prediction.mean, vec![4.0; 15]);
        assert_eq!(s.ground_truth.upper, vec![0.0; 15]);
        assert_eq!(s.prediction.lower.len(), 15);
    }

    #[test]
    fn saliency_thresholds_kelvin() {
        let range = ChannelRange::TEMPERATURE_CLIP;
        let t = array![[range.normalize(870.0), range.normalize(880.0)], [-1.0, 1.0]];
        let mask = saliency_mask(t.view(), range);
        assert_eq!(mask, array![[false, true], [false, true]]);
    }
}
