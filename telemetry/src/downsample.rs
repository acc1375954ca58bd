//! Largest-triangle-three-buckets downsampling.
//!
//! Keeps the first and last points, splits the interior into
//! `threshold - 2` buckets and from each bucket keeps the point spanning the
//! largest triangle with the previously kept point and a look-ahead
//! reference. Output is always a subsequence of the input.

use crate::model::Timestamped;

/// Reduces `series` to at most `threshold` points for plotting.
///
/// The x axis is the timestamp in epoch milliseconds, the y axis is whatever
/// `value` extracts. Input must already be sorted ascending by time. When
/// `threshold <= 2` or `threshold >= series.len()` the series is returned
/// as is.
pub fn downsample<T, F>(series: &[T], threshold: usize, value: F) -> Vec<T>
where
    T: Timestamped + Clone,
    F: Fn(&T) -> f64,
{
    select_indices(series.len(), threshold, |i| {
        let point = &series[i];
        (point.timestamp().timestamp_millis() as f64, value(point))
    })
    .into_iter()
    .map(|i| series[i].clone())
    .collect()
}

/// Picks the indices LTTB keeps out of `len` points, in ascending order.
///
/// `point(i)` yields the `(x, y)` coordinates of the i-th point.
pub fn select_indices<F>(len: usize, threshold: usize, point: F) -> Vec<usize>
where
    F: Fn(usize) -> (f64, f64),
{
    if threshold >= len || threshold <= 2 {
        return (0..len).collect();
    }

    let last = len - 1;
    let buckets = threshold - 2;
    let every = (len - 2) as f64 / buckets as f64;
    let bucket_start = |bucket: usize| ((bucket as f64 * every).floor() as usize + 1).min(last);

    let mut sampled = Vec::with_capacity(threshold);
    let mut anchor = 0;
    sampled.push(anchor);

    for bucket in 0..buckets {
        let start = bucket_start(bucket);
        let end = bucket_start(bucket + 1).max(start + 1);

        let a = point(anchor);
        let reference = point(bucket_start(bucket + 2));

        let mut max_area = -1.0;
        let mut chosen = start;
        for candidate in start..end {
            let area = triangle_area(a, point(candidate), reference);
            // Strict comparison keeps the first of equal maxima
            if area > max_area {
                max_area = area;
                chosen = candidate;
            }
        }

        sampled.push(chosen);
        anchor = chosen;
    }

    sampled.push(last);
    sampled
}

fn triangle_area((x1, y1): (f64, f64), (x2, y2): (f64, f64), (x3, y3): (f64, f64)) -> f64 {
    (x1 * (y2 - y3) + x2 * (y3 - y1) + x3 * (y1 - y2)).abs() / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TimeSeriesPoint;
    use chrono::{Duration, TimeZone, Utc};

    fn series(values: &[f64]) -> Vec<TimeSeriesPoint> {
        let start = Utc.with_ymd_and_hms(2024, 9, 1, 0, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, value)| TimeSeriesPoint {
                timestamp: start + Duration::minutes(i as i64),
                value: *value,
            })
            .collect()
    }

    fn wave(len: usize) -> Vec<TimeSeriesPoint> {
        let values: Vec<f64> = (0..len)
            .map(|i| 20.0 + 5.0 * (i as f64 / 7.0).sin() + (i % 3) as f64)
            .collect();
        series(&values)
    }

    #[test]
    fn test_identity_when_threshold_not_below_len() {
        let input = wave(10);
        assert_eq!(downsample(&input, 10, |p| p.value), input);
        assert_eq!(downsample(&input, 50, |p| p.value), input);
    }

    #[test]
    fn test_identity_when_threshold_too_small() {
        let input = wave(40);
        assert_eq!(downsample(&input, 2, |p| p.value), input);
        assert_eq!(downsample(&input, 0, |p| p.value), input);
    }

    #[test]
    fn test_empty_series() {
        let input: Vec<TimeSeriesPoint> = Vec::new();
        assert!(downsample(&input, 5, |p| p.value).is_empty());
    }

    #[test]
    fn test_output_length() {
        let input = wave(100);
        let output = downsample(&input, 10, |p| p.value);
        assert_eq!(output.len(), 10);
    }

    #[test]
    fn test_keeps_first_and_last() {
        let input = wave(500);
        for threshold in [3, 4, 17, 100, 499] {
            let output = downsample(&input, threshold, |p| p.value);
            assert_eq!(output.len(), threshold);
            assert_eq!(output.first(), input.first());
            assert_eq!(output.last(), input.last());
        }
    }

    #[test]
    fn test_ordered_subsequence() {
        let len = 1000;
        for threshold in [3, 10, 64, 333] {
            let indices = select_indices(len, threshold, |i| (i as f64, ((i * 37) % 101) as f64));
            assert_eq!(indices.len(), threshold);
            assert!(indices.windows(2).all(|w| w[0] < w[1]));
            assert!(indices.iter().all(|i| *i < len));
        }

        let input = wave(250);
        let output = downsample(&input, 25, |p| p.value);
        let mut cursor = 0;
        for point in &output {
            let found = input[cursor..].iter().position(|p| p == point);
            assert!(found.is_some(), "point not taken from input in order");
            cursor += found.unwrap() + 1;
        }
    }

    #[test]
    fn test_deterministic() {
        let input = wave(777);
        let first = downsample(&input, 50, |p| p.value);
        let second = downsample(&input, 50, |p| p.value);
        assert_eq!(first, second);
    }

    #[test]
    fn test_keeps_spike() {
        let mut values = vec![20.0; 101];
        values[37] = 80.0;
        let input = series(&values);

        let output = downsample(&input, 10, |p| p.value);

        assert!(output.iter().any(|p| p.value == 80.0));
    }

    #[test]
    fn test_flat_series_takes_first_in_bucket() {
        // Every triangle is degenerate, so each bucket keeps its first point
        let indices = select_indices(12, 4, |i| (i as f64, 1.0));
        assert_eq!(indices, vec![0, 1, 6, 11]);
    }

    #[test]
    fn test_reference_is_start_of_bucket_after_next() {
        // len 8, threshold 5: every = 2, bucket starts at 1, 3, 5 and 7
        let mut ys = vec![0.0; 8];
        ys[5] = 10.0;

        let indices = select_indices(8, 5, |i| (i as f64, ys[i]));

        // Bucket 0 looks ahead to index 5, which makes index 2 the wider triangle
        assert_eq!(indices, vec![0, 2, 3, 5, 7]);
    }

    #[test]
    fn test_generic_accessor() {
        #[derive(Clone)]
        struct Reading {
            at: chrono::DateTime<Utc>,
            humidity: f64,
        }

        impl Timestamped for Reading {
            fn timestamp(&self) -> chrono::DateTime<Utc> {
                self.at
            }
        }

        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let readings: Vec<Reading> = (0..60)
            .map(|i| Reading {
                at: start + Duration::seconds(i * 30),
                humidity: (i % 13) as f64,
            })
            .collect();

        let output = downsample(&readings, 12, |r| r.humidity);

        assert_eq!(output.len(), 12);
        assert_eq!(output[0].at, start);
        assert_eq!(output[11].at, readings[59].at);
    }
}
