//! Collapses a vehicle's position-over-time series into one scalar: the area
//! under the route-position curve, by the trapezoidal rule. Two trajectories
//! walk the union of their timesteps together so both areas cover the same
//! window.

use std::collections::{BTreeMap, BTreeSet};

use crate::compare::normalized_diff;
use crate::{Diff, Timestep, Trajectory};

/// Composite trapezoidal rule over equally spaced samples. Fewer than two
/// samples bound no area.
pub fn integrate_trapezoidal(ordinates: &[f64], step_length: f64) -> f64 {
    let mut area = 0.0;
    for pair in ordinates.windows(2) {
        area += step_length * (pair[0] + pair[1]) / 2.0;
    }
    area
}

pub struct TrajectoryComparison {
    /// Signed position difference (test - baseline) at each union timestep
    /// where both sides have been seen at least once, filtered by magnitude.
    pub per_step: BTreeMap<Timestep, Diff>,
    /// Normalized difference of the two spacetime areas.
    pub area_diff: Diff,
}

/// One union-walk step: the timestep and each side's carried value, still
/// `None` before that side's first real sample.
type CarriedSample = (Timestep, Option<f64>, Option<f64>);

/// Walk the ascending union of both sides' timesteps. At each step a side
/// either has a real sample (which becomes its new last-known value) or
/// carries its previous value forward. The carried value is never a future
/// sample.
fn carry_forward(test: &Trajectory, baseline: &Trajectory) -> Vec<CarriedSample> {
    let union: BTreeSet<Timestep> = test.0.keys().chain(baseline.0.keys()).cloned().collect();

    let mut samples = Vec::with_capacity(union.len());
    let mut last_test: Option<f64> = None;
    let mut last_baseline: Option<f64> = None;
    for step in union {
        if let Some(x) = test.0.get(&step) {
            last_test = Some(*x);
        }
        if let Some(x) = baseline.0.get(&step) {
            last_baseline = Some(*x);
        }
        samples.push((step, last_test, last_baseline));
    }
    samples
}

/// Compare two position-over-time series for the same vehicle.
///
/// Timesteps where one side hasn't produced a sample yet get no per-step row;
/// a vehicle that hasn't departed has no meaningful position to diff. For the
/// area reduction those gaps count as position 0 (the route's start), so a
/// late-departing side simply bounds less area. `normalize` governs the area
/// scalar; per-step differences are always raw.
pub fn compare_trajectories(
    test: &Trajectory,
    baseline: &Trajectory,
    normalize: bool,
    min_abs_diff: f64,
) -> TrajectoryComparison {
    let samples = carry_forward(test, baseline);

    let mut per_step = BTreeMap::new();
    let mut test_ordinates = Vec::with_capacity(samples.len());
    let mut baseline_ordinates = Vec::with_capacity(samples.len());
    for (step, test_value, baseline_value) in samples {
        if let (Some(t), Some(b)) = (test_value, baseline_value) {
            let diff = Diff::Finite(t - b);
            if diff.magnitude() >= min_abs_diff {
                per_step.insert(step, diff);
            }
        }
        test_ordinates.push(test_value.unwrap_or(0.0));
        baseline_ordinates.push(baseline_value.unwrap_or(0.0));
    }

    let area_test = integrate_trapezoidal(&test_ordinates, 1.0);
    let area_baseline = integrate_trapezoidal(&baseline_ordinates, 1.0);
    TrajectoryComparison {
        per_step,
        area_diff: normalized_diff(area_test, area_baseline, normalize),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trajectory(samples: Vec<(f64, f64)>) -> Trajectory {
        Trajectory(
            samples
                .into_iter()
                .map(|(t, pos)| (Timestep(t), pos))
                .collect(),
        )
    }

    #[test]
    fn trapezoid_of_a_constant() {
        // n samples bound n-1 unit intervals
        assert_eq!(integrate_trapezoidal(&[7.0, 7.0, 7.0, 7.0], 1.0), 21.0);
        assert_eq!(integrate_trapezoidal(&[0.0, 1.0, 2.0], 1.0), 2.0);
        assert_eq!(integrate_trapezoidal(&[5.0], 1.0), 0.0);
        assert_eq!(integrate_trapezoidal(&[], 1.0), 0.0);
        // Step length scales linearly
        assert_eq!(integrate_trapezoidal(&[3.0, 3.0], 0.5), 1.5);
    }

    #[test]
    fn union_walk_carries_last_known_values() {
        let a = trajectory(vec![(0.0, 1.0), (2.0, 3.0)]);
        let b = trajectory(vec![(1.0, 5.0)]);

        let samples = carry_forward(&a, &b);
        assert_eq!(
            samples,
            vec![
                (Timestep(0.0), Some(1.0), None),
                (Timestep(1.0), Some(1.0), Some(5.0)),
                (Timestep(2.0), Some(3.0), Some(5.0)),
            ]
        );
    }

    #[test]
    fn per_step_rows_need_both_sides() {
        let a = trajectory(vec![(0.0, 1.0), (2.0, 3.0)]);
        let b = trajectory(vec![(1.0, 5.0)]);

        let result = compare_trajectories(&a, &b, false, 0.0);
        // t=0 has no baseline sample yet, so only t=1 and t=2 get rows
        assert_eq!(result.per_step.len(), 2);
        assert_eq!(result.per_step[&Timestep(1.0)], Diff::Finite(-4.0));
        assert_eq!(result.per_step[&Timestep(2.0)], Diff::Finite(-2.0));
    }

    #[test]
    fn areas_zero_fill_before_first_sample() {
        let a = trajectory(vec![(0.0, 1.0), (2.0, 3.0)]);
        let b = trajectory(vec![(1.0, 5.0)]);

        let result = compare_trajectories(&a, &b, false, 0.0);
        // A: [1, 1, 3] -> 3.0; B: [0, 5, 5] -> 7.5
        assert_eq!(result.area_diff, Diff::Finite(-4.5));
    }

    #[test]
    fn identical_trajectories_have_zero_area_diff() {
        let a = trajectory(vec![(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)]);
        let result = compare_trajectories(&a, &a.clone(), true, 0.0);
        assert_eq!(result.area_diff, Diff::Finite(0.0));
        for diff in result.per_step.values() {
            assert_eq!(*diff, Diff::Finite(0.0));
        }
    }

    #[test]
    fn zero_baseline_area_is_infinite() {
        // Baseline vehicle never moves off position 0
        let a = trajectory(vec![(0.0, 1.0), (1.0, 2.0)]);
        let b = trajectory(vec![(0.0, 0.0), (1.0, 0.0)]);
        let result = compare_trajectories(&a, &b, true, 0.0);
        assert_eq!(result.area_diff, Diff::Infinite);
    }
}
