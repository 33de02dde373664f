//! Per-key differences between two metric mappings, with optional
//! normalization by the reference side and threshold filtering.

use std::collections::BTreeMap;

use anyhow::Result;

use crate::{Diff, MetricMap};

/// The signed difference `value - baseline`. When normalizing, a nonzero
/// difference is divided by the baseline; a zero baseline yields
/// `Diff::Infinite`. A zero difference is 0 no matter the baseline.
pub fn normalized_diff(value: f64, baseline: f64, normalize: bool) -> Diff {
    let diff = value - baseline;
    if !normalize || diff == 0.0 {
        return Diff::Finite(diff);
    }
    if baseline == 0.0 {
        Diff::Infinite
    } else {
        Diff::Finite(diff / baseline)
    }
}

/// Compare `test` against `baseline` key by key, walking the baseline's keys.
/// Only differences at least `min_abs_diff` in magnitude are retained, so the
/// default 0.0 keeps everything and raising the threshold can only shrink the
/// result.
///
/// The two mappings must cover the same entities. A size mismatch, or a
/// baseline key absent on the test side, means the runs aren't comparable for
/// this metric; that's an `Err` the caller is expected to swallow after
/// recording it, not a panic.
pub fn compare_metric_maps(
    test: &MetricMap,
    baseline: &MetricMap,
    normalize: bool,
    min_abs_diff: f64,
) -> Result<BTreeMap<String, Diff>> {
    if test.len() != baseline.len() {
        bail!(
            "the two sides have different cardinality: {} vs {}",
            test.len(),
            baseline.len()
        );
    }

    let mut result = BTreeMap::new();
    for (key, base) in baseline {
        let value = match test.get(key) {
            Some(x) => *x,
            None => bail!("{} is missing from the test side", key),
        };
        let diff = normalized_diff(value, *base, normalize);
        if diff.magnitude() >= min_abs_diff {
            result.insert(key.clone(), diff);
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: Vec<(&str, f64)>) -> MetricMap {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn identical_maps_diff_to_zero() {
        let m = map(vec![("a", 1.0), ("b", 0.0), ("c", -7.5)]);
        let result = compare_metric_maps(&m, &m, true, 0.0).unwrap();
        assert_eq!(result.len(), 3);
        for diff in result.values() {
            assert_eq!(*diff, Diff::Finite(0.0));
        }
    }

    #[test]
    fn zero_baseline() {
        let result = compare_metric_maps(
            &map(vec![("k", 5.0)]),
            &map(vec![("k", 0.0)]),
            true,
            0.0,
        )
        .unwrap();
        assert_eq!(result["k"], Diff::Infinite);

        // A zero difference never divides
        let result = compare_metric_maps(
            &map(vec![("k", 0.0)]),
            &map(vec![("k", 0.0)]),
            true,
            0.0,
        )
        .unwrap();
        assert_eq!(result["k"], Diff::Finite(0.0));
    }

    #[test]
    fn filter_is_monotonic() {
        let test = map(vec![("a", 11.0), ("b", 18.0), ("c", 30.0), ("d", 3.0)]);
        let baseline = map(vec![("a", 10.0), ("b", 20.0), ("c", 30.0), ("d", 0.0)]);
        let mut last_len = usize::MAX;
        for threshold in [0.0, 0.05, 0.2, 2.0] {
            let result = compare_metric_maps(&test, &baseline, true, threshold).unwrap();
            assert!(result.len() <= last_len);
            last_len = result.len();
        }
        // Infinite exceeds any finite threshold
        let result = compare_metric_maps(&test, &baseline, true, 2.0).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result["d"], Diff::Infinite);
    }

    #[test]
    fn normalized_trip_durations() {
        let ronin = map(vec![("veh1", 11.0), ("veh2", 18.0), ("veh3", 30.0)]);
        let sumo = map(vec![("veh1", 10.0), ("veh2", 20.0), ("veh3", 30.0)]);

        let result = compare_metric_maps(&ronin, &sumo, true, 0.0).unwrap();
        assert_eq!(result["veh1"], Diff::Finite(0.1));
        assert_eq!(result["veh2"], Diff::Finite(-0.1));
        assert_eq!(result["veh3"], Diff::Finite(0.0));

        let result = compare_metric_maps(&ronin, &sumo, true, 0.05).unwrap();
        assert_eq!(result.len(), 2);
        assert!(!result.contains_key("veh3"));
    }

    #[test]
    fn cardinality_mismatch_is_recoverable() {
        let err = compare_metric_maps(
            &map(vec![("a", 1.0)]),
            &map(vec![("a", 1.0), ("b", 2.0)]),
            false,
            0.0,
        );
        assert!(err.is_err());

        // Same size, different keys
        let err = compare_metric_maps(
            &map(vec![("a", 1.0)]),
            &map(vec![("b", 2.0)]),
            false,
            0.0,
        );
        assert!(err.is_err());
    }
}
