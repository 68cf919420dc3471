//! Chart dataset assembly: the end-to-end pipeline.
//!
//! [`analyze`] validates the input, partitions it into segments, computes
//! per-segment statistics, broadcasts them back onto every observation, and
//! runs the rule engine over the annotated series. The result is a
//! [`ChartDataset`] with one row per observation, in input order.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::debug;

use super::chart::{
    compute, ChartType, ControlLimits, Observation, RuleViolation, SegmentStatistics,
    ViolationType,
};
use super::config::{validate, ChartConfig};
use super::rules::{evaluate, AnnotatedPoint, RuleSet, RunRule};
use super::segment::{segment, Segment};
use crate::error::Result;

/// One plotted point with its limits and the rules it violates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartRow<T> {
    /// Position of the source observation in the input series.
    pub index: usize,
    /// Timestamp of the source observation.
    pub timestamp: T,
    /// Plotted statistic.
    pub value: f64,
    /// Center line in force at this point.
    pub center_line: f64,
    /// Sigma in force at this point.
    pub sigma: f64,
    /// Upper control limit.
    pub ucl: f64,
    /// Lower control limit.
    pub lcl: f64,
    /// Segment the point belongs to.
    pub segment: usize,
    /// Rules violated at this point; empty when in control.
    pub violated_rules: BTreeSet<ViolationType>,
}

impl<T> ChartRow<T> {
    /// The limits in force at this point.
    pub fn limits(&self) -> ControlLimits {
        ControlLimits {
            center_line: self.center_line,
            sigma: self.sigma,
            ucl: self.ucl,
            lcl: self.lcl,
        }
    }

    /// Whether any rule fired here.
    pub fn is_violation(&self) -> bool {
        !self.violated_rules.is_empty()
    }
}

/// Bounds and statistics of one segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SegmentSummary {
    /// Position of the segment in the series.
    pub index: usize,
    /// First observation of the segment.
    pub start_index: usize,
    /// One past the last observation of the segment.
    pub end_index: usize,
    /// Leading observations that fed the statistics.
    pub baseline_len: usize,
    /// Statistics in force over the segment.
    pub statistics: SegmentStatistics,
}

/// The assembled chart: one row per observation plus an optional dispersion
/// chart (moving range, range, or standard deviation).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartDataset<T> {
    /// Chart type the dataset was computed for.
    pub chart_type: ChartType,
    /// Primary chart rows, one per observation, in input order.
    pub rows: Vec<ChartRow<T>>,
    /// Dispersion chart rows for XmR, XbarR, and XbarS.
    ///
    /// The first observation of each XmR segment has no moving range and
    /// therefore no row here.
    pub dispersion: Option<Vec<ChartRow<T>>>,
    /// Segments in time order.
    pub segments: Vec<SegmentSummary>,
}

fn violations_of<T>(rows: &[ChartRow<T>]) -> Vec<RuleViolation> {
    rows.iter()
        .flat_map(|row| {
            row.violated_rules.iter().map(|&rule| RuleViolation {
                observation_index: row.index,
                rule,
            })
        })
        .collect()
}

impl<T> ChartDataset<T> {
    /// Primary chart violations, ordered by observation then rule.
    pub fn violations(&self) -> Vec<RuleViolation> {
        violations_of(&self.rows)
    }

    /// Dispersion chart violations, indexed by observation.
    pub fn dispersion_violations(&self) -> Vec<RuleViolation> {
        self.dispersion
            .as_deref()
            .map(violations_of)
            .unwrap_or_default()
    }

    /// Whether no rule fired on either chart.
    pub fn is_in_control(&self) -> bool {
        let quiet = |rows: &[ChartRow<T>]| !rows.iter().any(ChartRow::is_violation);
        quiet(self.rows.as_slice()) && self.dispersion.as_deref().map_or(true, quiet)
    }

    /// Observation indices violating each rule on the primary chart.
    ///
    /// Rules that never fired are absent.
    pub fn rule_summary(&self) -> BTreeMap<ViolationType, Vec<usize>> {
        let mut summary: BTreeMap<ViolationType, Vec<usize>> = BTreeMap::new();
        for violation in self.violations() {
            summary
                .entry(violation.rule)
                .or_default()
                .push(violation.observation_index);
        }
        summary
    }

    /// The segment containing observation `index`.
    pub fn segment_of(&self, index: usize) -> Option<&SegmentSummary> {
        self.segments
            .iter()
            .find(|s| (s.start_index..s.end_index).contains(&index))
    }
}

/// Compute the full chart for a series.
///
/// Configuration errors surface before any statistics are computed;
/// a segment too short for the chart type fails with
/// [`SpcError::InsufficientData`](crate::SpcError::InsufficientData).
///
/// ```
/// use u_spc::spc::{analyze, ChartConfig, ChartType, Observation, ViolationType};
///
/// let mut readings = vec![10.0; 20];
/// readings[14] = 50.0;
/// let data: Vec<_> = readings
///     .iter()
///     .enumerate()
///     .map(|(day, &x)| Observation::new(day, x))
///     .collect();
///
/// let chart = analyze(&data, &ChartConfig::new(ChartType::XmR)).unwrap();
/// assert_eq!(chart.rows.len(), 20);
/// assert!(chart.rows[14].violated_rules.contains(&ViolationType::BeyondLimits));
/// ```
pub fn analyze<T: Ord + Clone>(
    observations: &[Observation<T>],
    config: &ChartConfig<T>,
) -> Result<ChartDataset<T>> {
    validate(observations, config)?;
    let segments = segment(
        observations,
        &config.change_dates,
        config.baseline_date.as_ref(),
    )?;
    let statistics = segments
        .iter()
        .map(|s| compute(config.chart_type, s))
        .collect::<Result<Vec<_>>>()?;

    let dataset = assemble(
        config.chart_type,
        &segments,
        &statistics,
        &config.primary_rules(),
    );
    debug!(
        chart = %dataset.chart_type,
        rows = dataset.rows.len(),
        segments = dataset.segments.len(),
        violations = dataset.violations().len(),
        "assembled chart dataset"
    );
    Ok(dataset)
}

/// Join observations, per-segment limits, and rule violations.
pub(crate) fn assemble<T: Clone>(
    chart_type: ChartType,
    segments: &[Segment<'_, T>],
    statistics: &[SegmentStatistics],
    rules: &impl RunRule,
) -> ChartDataset<T> {
    let mut rows = Vec::new();
    let mut dispersion = chart_type.has_dispersion_chart().then(Vec::new);

    for (segment, stats) in segments.iter().zip(statistics) {
        for (offset, observation) in segment.observations.iter().enumerate() {
            let index = segment.start_index + offset;
            let limits = stats.primary.limits_at(chart_type.weight(observation));
            rows.push(row(
                index,
                observation,
                chart_type.statistic(observation),
                limits,
                segment.index,
            ));

            let previous = offset.checked_sub(1).map(|p| &segment.observations[p]);
            if let (Some(out), Some(spread), Some(value)) = (
                dispersion.as_mut(),
                stats.dispersion,
                chart_type.dispersion_statistic(observation, previous),
            ) {
                out.push(row(
                    index,
                    observation,
                    value,
                    spread.limits_at(1.0),
                    segment.index,
                ));
            }
        }
    }

    annotate(&mut rows, rules);
    if let Some(dispersion_rows) = dispersion.as_mut() {
        annotate(dispersion_rows, &RuleSet::zone_free());
    }

    ChartDataset {
        chart_type,
        rows,
        dispersion,
        segments: segments
            .iter()
            .zip(statistics)
            .map(|(s, &stats)| SegmentSummary {
                index: s.index,
                start_index: s.start_index,
                end_index: s.end_index,
                baseline_len: s.baseline_len,
                statistics: stats,
            })
            .collect(),
    }
}

fn row<T: Clone>(
    index: usize,
    observation: &Observation<T>,
    value: f64,
    limits: ControlLimits,
    segment: usize,
) -> ChartRow<T> {
    ChartRow {
        index,
        timestamp: observation.timestamp.clone(),
        value,
        center_line: limits.center_line,
        sigma: limits.sigma,
        ucl: limits.ucl,
        lcl: limits.lcl,
        segment,
        violated_rules: BTreeSet::new(),
    }
}

/// Run `rules` over `rows` and record each violation on its row.
fn annotate<T>(rows: &mut [ChartRow<T>], rules: &impl RunRule) {
    let points: Vec<AnnotatedPoint> = rows
        .iter()
        .map(|r| AnnotatedPoint::new(r.value, &r.limits(), r.segment))
        .collect();
    for violation in evaluate(&points, rules) {
        if let Some(row) = rows.get_mut(violation.observation_index) {
            row.violated_rules.insert(violation.rule);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SpcError;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).expect("valid date")
    }

    fn readings(values: &[f64]) -> Vec<Observation<NaiveDate>> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| Observation::new(day(i as u32 + 1), v))
            .collect()
    }

    fn flagged<T>(rows: &[ChartRow<T>]) -> Vec<usize> {
        rows.iter()
            .filter(|r| r.is_violation())
            .map(|r| r.index)
            .collect()
    }

    fn spike_series() -> Vec<Observation<NaiveDate>> {
        let mut values = vec![10.0; 20];
        values[14] = 50.0;
        readings(&values)
    }

    fn alternating(low: f64, count: usize) -> Vec<f64> {
        (0..count)
            .map(|i| if i % 2 == 0 { low } else { low + 1.0 })
            .collect()
    }

    /// The center line is the classical mean, 12 rather than the 10 of the
    /// undisturbed readings, so rule 2 also fires on indices 8..=13.
    #[test]
    fn test_spike_flagged_beyond_limits() {
        let chart = analyze(&spike_series(), &ChartConfig::new(ChartType::XmR)).unwrap();
        assert_eq!(chart.rows.len(), 20);

        // Mean of nineteen 10s and one 50
        for row in &chart.rows {
            assert!((row.center_line - 12.0).abs() < 1e-9);
            assert!(row.lcl <= row.center_line && row.center_line <= row.ucl);
        }
        assert_eq!(
            chart.rows[14].violated_rules,
            BTreeSet::from([ViolationType::BeyondLimits])
        );
        // The spike lifts the mean, so the fourteen 10s before it sit on
        // one side of the center line
        for row in &chart.rows[8..14] {
            assert_eq!(
                row.violated_rules,
                BTreeSet::from([ViolationType::NineOneSide])
            );
        }
        assert_eq!(flagged(&chart.rows), (8..=14).collect::<Vec<_>>());
        assert!(!chart.is_in_control());
    }

    #[test]
    fn test_spike_moving_range_chart() {
        let chart = analyze(&spike_series(), &ChartConfig::new(ChartType::XmR)).unwrap();
        let mr = chart.dispersion.as_ref().expect("moving range chart");
        assert_eq!(mr.len(), 19);
        assert_eq!(mr[0].index, 1);

        let mr_bar = 80.0 / 19.0;
        for row in mr {
            assert!((row.center_line - mr_bar).abs() < 1e-9);
            assert!((row.ucl - 3.267 * mr_bar).abs() < 1e-9);
            assert!((row.lcl - 0.0).abs() < f64::EPSILON);
        }
        let beyond: Vec<usize> = chart
            .dispersion_violations()
            .iter()
            .filter(|v| v.rule == ViolationType::BeyondLimits)
            .map(|v| v.observation_index)
            .collect();
        assert_eq!(beyond, vec![14, 15]);
        assert_eq!(flagged(mr), vec![9, 10, 11, 12, 13, 14, 15]);
    }

    #[test]
    fn test_individual_chart_has_no_dispersion() {
        let chart = analyze(&spike_series(), &ChartConfig::new(ChartType::Individual)).unwrap();
        assert!(chart.dispersion.is_none());
        assert!(chart.rows[14].violated_rules.contains(&ViolationType::BeyondLimits));
    }

    #[test]
    fn test_rule_override() {
        let config = ChartConfig::new(ChartType::XmR)
            .with_rules(RuleSet::from_rule_ids(&[1]).unwrap());
        let chart = analyze(&spike_series(), &config).unwrap();
        assert_eq!(
            chart.violations(),
            vec![RuleViolation {
                observation_index: 14,
                rule: ViolationType::BeyondLimits,
            }]
        );
    }

    #[test]
    fn test_analyze_is_idempotent() {
        let data = spike_series();
        let config = ChartConfig::new(ChartType::XmR);
        assert_eq!(analyze(&data, &config), analyze(&data, &config));
    }

    #[test]
    fn test_change_dates_give_piecewise_limits() {
        let mut values = alternating(10.0, 10);
        values.extend(alternating(20.0, 10));
        let data = readings(&values);
        let config = ChartConfig::new(ChartType::XmR).with_change_dates(vec![day(11)]);
        let chart = analyze(&data, &config).unwrap();

        assert_eq!(chart.segments.len(), 2);
        for row in &chart.rows[..10] {
            assert!((row.center_line - 10.5).abs() < 1e-9);
            assert_eq!(row.segment, 0);
        }
        for row in &chart.rows[10..] {
            assert!((row.center_line - 20.5).abs() < 1e-9);
            assert_eq!(row.segment, 1);
        }
        assert!((chart.rows[0].sigma - 1.0 / 1.128).abs() < 1e-9);
        // Each segment starts its moving ranges afresh
        let mr = chart.dispersion.as_ref().expect("moving range chart");
        assert_eq!(mr.len(), 18);
        assert!(mr.iter().all(|r| r.index != 0 && r.index != 10));
        assert!(chart.is_in_control());
        assert_eq!(chart.segment_of(12).map(|s| s.index), Some(1));
        assert_eq!(chart.segment_of(20), None);
    }

    #[test]
    fn test_baseline_limits_broadcast_over_later_points() {
        let mut values = alternating(10.0, 10);
        values.extend(alternating(15.0, 10));
        let data = readings(&values);
        let config = ChartConfig::new(ChartType::XmR).with_baseline_date(day(10));
        let chart = analyze(&data, &config).unwrap();

        assert_eq!(chart.segments.len(), 1);
        assert_eq!(chart.segments[0].baseline_len, 10);
        for row in &chart.rows {
            assert!((row.center_line - 10.5).abs() < 1e-9);
        }
        for row in &chart.rows[..10] {
            assert!(!row.is_violation());
        }
        for row in &chart.rows[10..] {
            assert!(row.violated_rules.contains(&ViolationType::BeyondLimits));
        }
    }

    #[test]
    fn test_xbar_r_rows() {
        let data: Vec<_> = (0..6)
            .map(|i| {
                let shift = if i % 2 == 0 { 0.0 } else { 1.0 };
                let readings = [45.0, 47.0, 50.0, 53.0, 55.0].map(|x| x + shift);
                Observation::subgroup(day(i + 1), readings.to_vec())
            })
            .collect();
        let chart = analyze(&data, &ChartConfig::new(ChartType::XbarR)).unwrap();

        assert!((chart.rows[1].value - 51.0).abs() < 1e-9);
        assert!((chart.rows[0].center_line - 50.5).abs() < 1e-9);
        assert!((chart.rows[0].ucl - (50.5 + 0.577 * 10.0)).abs() < 1e-9);

        let r = chart.dispersion.as_ref().expect("range chart");
        assert_eq!(r.len(), 6);
        for row in r {
            assert!((row.value - 10.0).abs() < 1e-9);
            assert!((row.ucl - 21.14).abs() < 1e-9);
        }
        assert!(chart.is_in_control());
    }

    #[test]
    fn test_xbar_s_rows() {
        let data = vec![
            Observation::subgroup(day(1), vec![1.0, 2.0, 3.0]),
            Observation::subgroup(day(2), vec![4.0, 6.0, 8.0]),
        ];
        let chart = analyze(&data, &ChartConfig::new(ChartType::XbarS)).unwrap();
        let s = chart.dispersion.as_ref().expect("S chart");
        assert!((s[0].value - 1.0).abs() < 1e-9);
        assert!((s[1].value - 2.0).abs() < 1e-9);
        assert!((s[0].center_line - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_p_chart_rows_vary_with_sample_size() {
        let data = vec![
            Observation::counted(day(1), 5.0, 100),
            Observation::counted(day(2), 10.0, 200),
            Observation::counted(day(3), 3.0, 50),
        ];
        let chart = analyze(&data, &ChartConfig::new(ChartType::P)).unwrap();
        assert!(chart.dispersion.is_none());

        let p_bar = 18.0 / 350.0;
        assert!((chart.rows[2].value - 0.06).abs() < 1e-12);
        for row in &chart.rows {
            assert!((row.center_line - p_bar).abs() < 1e-12);
            assert!(row.lcl >= 0.0);
        }
        let width = |r: &ChartRow<NaiveDate>| r.ucl - r.center_line;
        assert!(width(&chart.rows[1]) < width(&chart.rows[0]));
        assert!(width(&chart.rows[0]) < width(&chart.rows[2]));
        let expected = (p_bar * (1.0 - p_bar) / 200.0).sqrt();
        assert!((chart.rows[1].sigma - expected).abs() < 1e-12);
    }

    #[test]
    fn test_c_chart_rule_summary() {
        let mut values = vec![5.0; 20];
        values.push(50.0);
        let data: Vec<_> = values
            .iter()
            .enumerate()
            .map(|(i, &c)| Observation::new(i, c))
            .collect();
        let chart = analyze(&data, &ChartConfig::new(ChartType::C)).unwrap();

        let summary = chart.rule_summary();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[&ViolationType::BeyondLimits], vec![20]);
        assert_eq!(
            summary[&ViolationType::NineOneSide],
            (8..20).collect::<Vec<_>>()
        );
        assert!((chart.rows[0].lcl - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_u_chart_rows() {
        let data = vec![
            Observation::counted(day(1), 8.0, 4),
            Observation::counted(day(2), 12.0, 4),
            Observation::counted(day(3), 5.0, 2),
        ];
        let chart = analyze(&data, &ChartConfig::new(ChartType::U)).unwrap();
        // u-bar = 25 / 10
        assert!((chart.rows[0].center_line - 2.5).abs() < 1e-12);
        assert!((chart.rows[1].value - 3.0).abs() < 1e-12);
        assert!((chart.rows[2].sigma - (2.5_f64 / 2.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_configuration_errors_surface_first() {
        let config: ChartConfig<NaiveDate> = ChartConfig::new(ChartType::XmR);
        assert_eq!(analyze(&[], &config), Err(SpcError::EmptySeries));

        let err = analyze(&readings(&[1.0, 2.0]), &ChartConfig::new(ChartType::P)).unwrap_err();
        assert!(err.is_configuration());
        assert!(matches!(err, SpcError::MissingField { index: 0, .. }));
    }

    #[test]
    fn test_insufficient_data_reports_segment() {
        let data = readings(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let config = ChartConfig::new(ChartType::XmR).with_change_dates(vec![day(5)]);
        assert!(validate(&data, &config).is_ok());

        let err = analyze(&data, &config).unwrap_err();
        assert_eq!(
            err,
            SpcError::InsufficientData {
                start_index: 4,
                end_index: 5,
                found: 1,
                required: 2,
                chart_type: ChartType::XmR,
            }
        );
        assert!(!err.is_configuration());

        // A single point is enough for a c-chart
        let chart = analyze(&data, &ChartConfig::new(ChartType::C).with_change_dates(vec![day(5)]));
        assert!(chart.is_ok());
    }

    #[test]
    fn test_constant_series_collapses_limits() {
        let chart = analyze(&readings(&[4.0; 6]), &ChartConfig::new(ChartType::XmR)).unwrap();
        for row in &chart.rows {
            assert!((row.ucl - 4.0).abs() < f64::EPSILON);
            assert!((row.lcl - 4.0).abs() < f64::EPSILON);
        }
        assert!(chart.is_in_control());
    }

    #[test]
    fn test_long_constant_series_stays_in_control() {
        let chart = analyze(&readings(&[10.0; 20]), &ChartConfig::new(ChartType::XmR)).unwrap();
        assert!(chart.rows.iter().all(|r| r.sigma.abs() < f64::EPSILON));
        assert!(chart.rule_summary().is_empty());
        assert!(chart.is_in_control());
    }

    #[test]
    fn test_dataset_serializes_for_rendering() {
        let chart = analyze(&spike_series(), &ChartConfig::new(ChartType::XmR)).unwrap();
        let json = serde_json::to_value(&chart).unwrap();
        assert_eq!(json["chart_type"], "XmR-chart");
        assert_eq!(json["rows"][14]["timestamp"], "2024-01-15");
        assert_eq!(json["rows"][14]["violated_rules"], serde_json::json!([1]));
        assert_eq!(json["rows"][0]["violated_rules"], serde_json::json!([]));
        assert_eq!(json["segments"].as_array().map(Vec::len), Some(1));
    }
}
