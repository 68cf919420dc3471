//! Partitioning a series into baseline segments.
//!
//! A segment is a contiguous run of observations sharing one set of
//! statistics. Change dates start new segments, each with freshly computed
//! limits; a baseline date restricts which leading observations of the first
//! segment contribute to the statistics while the limits still cover the
//! whole segment.
//!
//! | `change_dates` | `baseline_date` | segments | statistics from |
//! |----------------|-----------------|----------|-----------------|
//! | empty | `None` | 1 | every point |
//! | `k` dates | `None` | `k + 1` | every point of each segment |
//! | empty | `b` | 1 | points at or before `b` |
//! | `k` dates | `b` | `k + 1` | first segment: points at or before `b`; others: all |

use std::cmp::Ordering;

use tracing::debug;

use super::chart::{ChartType, Observation};
use crate::error::{Result, SpcError};

/// A contiguous run of observations sharing one set of statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment<'a, T> {
    /// Position of the segment in the partition.
    pub index: usize,
    /// Series position of the first observation.
    pub start_index: usize,
    /// Series position one past the last observation.
    pub end_index: usize,
    /// The observations themselves.
    pub observations: &'a [Observation<T>],
    /// Number of leading observations that contribute to statistics.
    pub baseline_len: usize,
}

impl<'a, T> Segment<'a, T> {
    /// Number of observations in the segment.
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Whether the segment holds no observations. Never true for segments
    /// produced by [`segment`].
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Observations contributing to the segment's statistics.
    pub fn baseline(&self) -> &'a [Observation<T>] {
        &self.observations[..self.baseline_len]
    }

    /// Whether the series position falls inside this segment.
    pub fn contains(&self, index: usize) -> bool {
        (self.start_index..self.end_index).contains(&index)
    }

    /// Insufficient-data error carrying this segment's bounds.
    pub(crate) fn insufficient(&self, chart_type: ChartType, required: usize) -> SpcError {
        SpcError::InsufficientData {
            start_index: self.start_index,
            end_index: self.end_index,
            found: self.baseline_len,
            required,
            chart_type,
        }
    }
}

/// Check that timestamps strictly increase.
pub(crate) fn ensure_ordered<T: Ord>(observations: &[Observation<T>]) -> Result<()> {
    match observations
        .windows(2)
        .position(|w| w[1].timestamp <= w[0].timestamp)
    {
        Some(i) => Err(SpcError::UnorderedObservations { index: i + 1 }),
        None => Ok(()),
    }
}

/// Split a series into segments.
///
/// Each change date starts a new segment at the first observation whose
/// timestamp is at or after it, so dates need not match an observation
/// exactly. Change dates must be strictly increasing and lie after the first
/// observation and no later than the last; each must start a non-empty
/// segment. A baseline date must lie within the series and, when change dates
/// are given, before the first of them.
///
/// The returned segments partition `observations` exactly, in order.
///
/// ```
/// use u_spc::spc::{segment, Observation};
///
/// let data: Vec<_> = (0..10).map(|day| Observation::new(day, 1.0)).collect();
/// let segments = segment(&data, &[4, 7], Some(&2)).unwrap();
///
/// assert_eq!(segments.len(), 3);
/// assert_eq!((segments[1].start_index, segments[1].end_index), (4, 7));
/// assert_eq!(segments[0].baseline().len(), 3);
/// ```
pub fn segment<'a, T: Ord>(
    observations: &'a [Observation<T>],
    change_dates: &[T],
    baseline_date: Option<&T>,
) -> Result<Vec<Segment<'a, T>>> {
    let (first, last) = match (observations.first(), observations.last()) {
        (Some(first), Some(last)) => (&first.timestamp, &last.timestamp),
        _ => return Err(SpcError::EmptySeries),
    };
    ensure_ordered(observations)?;

    let mut starts = vec![0_usize];
    for (position, date) in change_dates.iter().enumerate() {
        if let Some(previous) = position.checked_sub(1).map(|p| &change_dates[p]) {
            match date.cmp(previous) {
                Ordering::Less => return Err(SpcError::UnorderedChangeDates { position }),
                Ordering::Equal => return Err(SpcError::DuplicateChangeDate { position }),
                Ordering::Greater => {}
            }
        }
        if date <= first || date > last {
            return Err(SpcError::ChangeDateOutOfRange { position });
        }
        let start = observations.partition_point(|o| o.timestamp < *date);
        if starts.last() == Some(&start) {
            return Err(SpcError::EmptySegment { position });
        }
        starts.push(start);
    }

    let first_end = starts.get(1).copied().unwrap_or(observations.len());
    let first_baseline = match baseline_date {
        None => first_end,
        Some(date) => {
            if date < first || date > last {
                return Err(SpcError::BaselineDateOutOfRange);
            }
            if change_dates.first().is_some_and(|change| date >= change) {
                return Err(SpcError::BaselineBeyondFirstSegment);
            }
            observations.partition_point(|o| o.timestamp <= *date)
        }
    };

    let segments: Vec<_> = starts
        .iter()
        .enumerate()
        .map(|(index, &start)| {
            let end = starts.get(index + 1).copied().unwrap_or(observations.len());
            Segment {
                index,
                start_index: start,
                end_index: end,
                observations: &observations[start..end],
                baseline_len: if index == 0 { first_baseline } else { end - start },
            }
        })
        .collect();

    debug!(
        observations = observations.len(),
        segments = segments.len(),
        first_baseline,
        "partitioned series"
    );
    Ok(segments)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn strictly_increasing(max_len: usize) -> BoxedStrategy<Vec<i64>> {
        proptest::collection::vec(1_i64..5, 1..=max_len)
            .prop_map(|steps| {
                steps
                    .iter()
                    .scan(0_i64, |t, step| {
                        *t += step;
                        Some(*t)
                    })
                    .collect()
            })
            .boxed()
    }

    proptest! {
        #[test]
        fn segments_partition_series(
            days in strictly_increasing(60),
            picks in proptest::collection::btree_set(0_usize..60, 0..6),
        ) {
            let data: Vec<_> = days.iter().map(|&d| Observation::new(d, 0.0)).collect();
            // Change dates at existing timestamps after the first one
            let changes: Vec<i64> = picks
                .iter()
                .filter(|&&i| i >= 1 && i < days.len())
                .map(|&i| days[i])
                .collect();
            let segments = segment(&data, &changes, None).unwrap();

            prop_assert_eq!(segments.len(), changes.len() + 1);
            let mut expected_start = 0;
            let mut rebuilt = Vec::new();
            for s in &segments {
                prop_assert_eq!(s.start_index, expected_start);
                prop_assert!(!s.is_empty());
                expected_start = s.end_index;
                rebuilt.extend(s.observations.iter().map(|o| o.timestamp));
            }
            prop_assert_eq!(expected_start, data.len());
            prop_assert_eq!(rebuilt, days);
        }

        #[test]
        fn baseline_never_exceeds_first_segment(
            days in strictly_increasing(40),
            pick in 0_usize..40,
        ) {
            let data: Vec<_> = days.iter().map(|&d| Observation::new(d, 0.0)).collect();
            let baseline = days[pick.min(days.len() - 1)];
            let segments = segment(&data, &[], Some(&baseline)).unwrap();
            prop_assert_eq!(segments.len(), 1);
            prop_assert!(segments[0].baseline_len >= 1);
            prop_assert!(segments[0].baseline_len <= segments[0].len());
            prop_assert!(segments[0].baseline().iter().all(|o| o.timestamp <= baseline));
        }
    }
}
