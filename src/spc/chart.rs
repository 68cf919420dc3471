//! Core control chart types and the per-segment statistics dispatch.
//!
//! Defines the fundamental building blocks shared by every chart: the
//! [`Observation`] record handed in by collaborators, the closed set of
//! [`ChartType`]s, per-point [`ControlLimits`], the per-segment
//! [`ChartStatistics`] they are realized from, and the violation types
//! produced by the run rules.
//!
//! # References
//!
//! - Montgomery, D.C. (2019). *Introduction to Statistical Quality Control*, 8th ed.
//! - ASTM E2587 — Standard Practice for Use of Control Charts

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use u_numflow::stats;

use super::attributes::{c_statistics, p_statistics, u_statistics};
use super::rules::RuleSet;
use super::segment::Segment;
use super::variables::{individuals_statistics, xbar_r_statistics, xbar_s_statistics};
use crate::error::{Result, SpcError};

/// Control limits sit this many sigmas from the center line.
pub const LIMIT_SIGMAS: f64 = 3.0;

/// Statistics windows shorter than this still produce limits, but they are
/// reported as unreliable.
pub const RELIABLE_WINDOW: usize = 15;

// ---------------------------------------------------------------------------
// Observation
// ---------------------------------------------------------------------------

/// One time-ordered process measurement.
///
/// `value` is the primary measured quantity. Its meaning depends on the chart:
///
/// | Chart | `value` | extra field |
/// |-------|---------|-------------|
/// | XmR, Individual | individual reading | — |
/// | p | number of defective items | `sample_size` |
/// | c | defect count | — |
/// | u | defect count | `sample_size` (units inspected) |
/// | XbarR, XbarS | subgroup mean | `subgroup` |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation<T> {
    /// Position of the observation on the time axis.
    pub timestamp: T,
    /// Primary measured value.
    pub value: f64,
    /// Raw readings of the subgroup (XbarR / XbarS only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subgroup: Option<Vec<f64>>,
    /// Denominator of the proportion or rate (p / u only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_size: Option<u64>,
}

impl<T> Observation<T> {
    /// An individual reading (XmR, Individual, c charts).
    pub fn new(timestamp: T, value: f64) -> Self {
        Self {
            timestamp,
            value,
            subgroup: None,
            sample_size: None,
        }
    }

    /// A count observed over `sample_size` items or units (p, u charts).
    pub fn counted(timestamp: T, count: f64, sample_size: u64) -> Self {
        Self {
            timestamp,
            value: count,
            subgroup: None,
            sample_size: Some(sample_size),
        }
    }

    /// A subgroup of raw readings (XbarR, XbarS charts).
    ///
    /// `value` is set to the subgroup mean, or NaN for an empty subgroup
    /// (which validation rejects).
    pub fn subgroup(timestamp: T, readings: Vec<f64>) -> Self {
        let value = stats::mean(&readings).unwrap_or(f64::NAN);
        Self {
            timestamp,
            value,
            subgroup: Some(readings),
            sample_size: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Chart type
// ---------------------------------------------------------------------------

/// The closed set of supported chart types.
///
/// Parses from (and serializes to) the conventional names such as
/// `"XmR-chart"` or `"p-chart"`; the `-chart` suffix is optional and
/// matching is case-insensitive.
///
/// ```
/// use u_spc::spc::ChartType;
///
/// let chart: ChartType = "XbarR-chart".parse().unwrap();
/// assert_eq!(chart, ChartType::XbarR);
/// assert_eq!("u".parse::<ChartType>().unwrap(), ChartType::U);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum ChartType {
    /// Individuals chart paired with a moving-range chart.
    XmR,
    /// Individuals chart alone.
    Individual,
    /// Proportion defective, variable sample size.
    P,
    /// Defect count per constant inspection unit.
    C,
    /// Defects per unit, variable inspection size.
    U,
    /// Subgroup means with a range chart.
    XbarR,
    /// Subgroup means with a standard-deviation chart.
    XbarS,
}

impl ChartType {
    /// All chart types, in declaration order.
    pub const ALL: [ChartType; 7] = [
        ChartType::XmR,
        ChartType::Individual,
        ChartType::P,
        ChartType::C,
        ChartType::U,
        ChartType::XbarR,
        ChartType::XbarS,
    ];

    /// Conventional chart name.
    pub fn name(self) -> &'static str {
        match self {
            ChartType::XmR => "XmR-chart",
            ChartType::Individual => "Individual-chart",
            ChartType::P => "p-chart",
            ChartType::C => "c-chart",
            ChartType::U => "u-chart",
            ChartType::XbarR => "XbarR-chart",
            ChartType::XbarS => "XbarS-chart",
        }
    }

    /// Minimum number of observations a statistics window must contain.
    ///
    /// Moving-range charts need two points to form one moving range.
    pub fn min_points(self) -> usize {
        match self {
            ChartType::XmR | ChartType::Individual => 2,
            _ => 1,
        }
    }

    /// Whether every observation must carry a `sample_size`.
    pub fn requires_sample_size(self) -> bool {
        matches!(self, ChartType::P | ChartType::U)
    }

    /// Whether every observation must carry a `subgroup`.
    pub fn requires_subgroups(self) -> bool {
        matches!(self, ChartType::XbarR | ChartType::XbarS)
    }

    /// Whether the chart comes with a secondary dispersion chart
    /// (moving range, range, or standard deviation).
    pub fn has_dispersion_chart(self) -> bool {
        matches!(self, ChartType::XmR | ChartType::XbarR | ChartType::XbarS)
    }

    /// Rules applied to the primary chart unless overridden.
    ///
    /// Attribute charts get only the zone-free rules (1 through 4).
    pub fn default_rules(self) -> RuleSet {
        match self {
            ChartType::P | ChartType::C | ChartType::U => RuleSet::zone_free(),
            _ => RuleSet::nelson(),
        }
    }

    /// The plotted statistic of an observation.
    pub fn statistic<T>(self, observation: &Observation<T>) -> f64 {
        match self {
            ChartType::P | ChartType::U => observation
                .sample_size
                .map_or(observation.value, |n| observation.value / n as f64),
            ChartType::XbarR | ChartType::XbarS => observation
                .subgroup
                .as_deref()
                .and_then(stats::mean)
                .unwrap_or(observation.value),
            _ => observation.value,
        }
    }

    /// Size of the area of opportunity behind an observation.
    ///
    /// Only p and u charts scale their sigma by it; every other chart uses 1.
    pub fn weight<T>(self, observation: &Observation<T>) -> f64 {
        match self {
            ChartType::P | ChartType::U => observation.sample_size.map_or(1.0, |n| n as f64),
            _ => 1.0,
        }
    }

    /// The dispersion-chart statistic of an observation, if it has one.
    ///
    /// For XmR this is the moving range against `previous`, so the first
    /// point of a segment has none.
    pub fn dispersion_statistic<T>(
        self,
        observation: &Observation<T>,
        previous: Option<&Observation<T>>,
    ) -> Option<f64> {
        match self {
            ChartType::XmR => previous.map(|p| (observation.value - p.value).abs()),
            ChartType::XbarR => observation.subgroup.as_deref().and_then(subgroup_range),
            ChartType::XbarS => observation.subgroup.as_deref().and_then(stats::std_dev),
            _ => None,
        }
    }
}

impl fmt::Display for ChartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChartType {
    type Err = SpcError;

    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_ascii_lowercase();
        let bare = lowered
            .strip_suffix("-chart")
            .or_else(|| lowered.strip_suffix("_chart"))
            .or_else(|| lowered.strip_suffix(" chart"))
            .unwrap_or(&lowered);
        match bare {
            "xmr" => Ok(ChartType::XmR),
            "individual" | "individuals" => Ok(ChartType::Individual),
            "p" => Ok(ChartType::P),
            "c" => Ok(ChartType::C),
            "u" => Ok(ChartType::U),
            "xbarr" => Ok(ChartType::XbarR),
            "xbars" => Ok(ChartType::XbarS),
            _ => Err(SpcError::UnknownChartType(s.to_string())),
        }
    }
}

impl TryFrom<String> for ChartType {
    type Error = SpcError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ChartType> for &'static str {
    fn from(chart: ChartType) -> Self {
        chart.name()
    }
}

// ---------------------------------------------------------------------------
// Limits and statistics
// ---------------------------------------------------------------------------

/// Control limits at one point of a chart.
///
/// # Invariants
///
/// - `lcl <= center_line <= ucl`
/// - `sigma >= 0`; `sigma == 0` collapses all three lines onto the center
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ControlLimits {
    /// Center line (process mean or pooled rate).
    pub center_line: f64,
    /// Sigma estimate at this point.
    pub sigma: f64,
    /// Upper control limit (center + 3 sigma).
    pub ucl: f64,
    /// Lower control limit (center - 3 sigma, clamped for counts and rates).
    pub lcl: f64,
}

impl ControlLimits {
    /// The `(lower, upper)` zone line `k` sigmas from the center.
    ///
    /// `zone(1.0)` and `zone(2.0)` are the boundaries rules 5 through 8 test
    /// against.
    pub fn zone(&self, k: f64) -> (f64, f64) {
        (
            self.center_line - k * self.sigma,
            self.center_line + k * self.sigma,
        )
    }
}

/// How the sigma of a chart varies from point to point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Spread {
    /// The same sigma everywhere.
    Fixed(f64),
    /// `sqrt(p̄(1 - p̄) / n)` with the point's sample size `n`.
    Binomial,
    /// `sqrt(ū / n)` with the point's area of opportunity `n`.
    Poisson,
}

/// Center line and spread model estimated from one baseline window.
///
/// Realized into concrete [`ControlLimits`] per point by
/// [`limits_at`](Self::limits_at), which lets a single estimate be broadcast
/// over points that did not contribute to it (baseline mode) and gives p/u
/// charts their variable-width limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChartStatistics {
    /// Center line.
    pub center_line: f64,
    /// Spread model.
    pub spread: Spread,
    /// Smallest admissible lower limit, if any.
    pub lower_bound: Option<f64>,
}

impl ChartStatistics {
    /// Statistics with a constant sigma and no lower bound.
    pub fn fixed(center_line: f64, sigma: f64) -> Self {
        Self {
            center_line,
            spread: Spread::Fixed(sigma),
            lower_bound: None,
        }
    }

    /// Clamp lower limits at `bound`.
    pub fn with_lower_bound(mut self, bound: f64) -> Self {
        self.lower_bound = Some(bound);
        self
    }

    /// Sigma for a point with the given weight (sample size or unit count).
    pub fn sigma_at(&self, weight: f64) -> f64 {
        let center = self.center_line;
        match self.spread {
            Spread::Fixed(sigma) => sigma,
            Spread::Binomial => (center * (1.0 - center) / weight).max(0.0).sqrt(),
            Spread::Poisson => (center / weight).max(0.0).sqrt(),
        }
    }

    /// Control limits for a point with the given weight.
    pub fn limits_at(&self, weight: f64) -> ControlLimits {
        let sigma = self.sigma_at(weight);
        let ucl = self.center_line + LIMIT_SIGMAS * sigma;
        let mut lcl = self.center_line - LIMIT_SIGMAS * sigma;
        if let Some(bound) = self.lower_bound {
            lcl = lcl.max(bound);
        }
        ControlLimits {
            center_line: self.center_line,
            sigma,
            ucl,
            lcl,
        }
    }
}

/// Statistics of one segment: the primary chart and, for XmR/XbarR/XbarS,
/// the dispersion chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SegmentStatistics {
    /// Primary chart (individuals, subgroup means, proportions, counts, rates).
    pub primary: ChartStatistics,
    /// Moving-range, range, or standard-deviation chart.
    pub dispersion: Option<ChartStatistics>,
}

/// Compute the statistics of a segment for the given chart type.
///
/// Only the segment's baseline window contributes. Fails with
/// [`SpcError::InsufficientData`] when the window is shorter than
/// [`ChartType::min_points`], and with a configuration error when an
/// observation lacks the fields the chart needs.
///
/// ```
/// use u_spc::spc::{compute, segment, ChartType, Observation};
///
/// let data: Vec<_> = [95.0, 105.0]
///     .iter()
///     .enumerate()
///     .map(|(day, &x)| Observation::new(day, x))
///     .collect();
/// let segments = segment(&data, &[], None).unwrap();
/// let stats = compute(ChartType::XmR, &segments[0]).unwrap();
/// let limits = stats.primary.limits_at(1.0);
/// assert!((limits.center_line - 100.0).abs() < 1e-9);
/// assert!(stats.dispersion.is_some());
/// ```
pub fn compute<T>(chart_type: ChartType, segment: &Segment<'_, T>) -> Result<SegmentStatistics> {
    let window = segment.baseline().len();
    let required = chart_type.min_points();
    if window < required {
        return Err(segment.insufficient(chart_type, required));
    }
    if window < RELIABLE_WINDOW {
        warn!(
            chart = %chart_type,
            segment = segment.index,
            points = window,
            "baseline window has fewer than {RELIABLE_WINDOW} points; limits may be unreliable"
        );
    }

    let statistics = match chart_type {
        ChartType::XmR => individuals_statistics(segment)?,
        ChartType::Individual => SegmentStatistics {
            dispersion: None,
            ..individuals_statistics(segment)?
        },
        ChartType::P => p_statistics(segment)?,
        ChartType::C => c_statistics(segment)?,
        ChartType::U => u_statistics(segment)?,
        ChartType::XbarR => xbar_r_statistics(segment)?,
        ChartType::XbarS => xbar_s_statistics(segment)?,
    };

    debug!(
        chart = %chart_type,
        segment = segment.index,
        start = segment.start_index,
        end = segment.end_index,
        center = statistics.primary.center_line,
        "computed segment statistics"
    );
    Ok(statistics)
}

/// Range (max - min) of a subgroup, `None` when empty or not finite.
pub(crate) fn subgroup_range(subgroup: &[f64]) -> Option<f64> {
    let (&first, rest) = subgroup.split_first()?;
    let (low, high) = rest
        .iter()
        .fold((first, first), |(low, high), &x| (low.min(x), high.max(x)));
    let range = high - low;
    range.is_finite().then_some(range)
}

// ---------------------------------------------------------------------------
// Violations
// ---------------------------------------------------------------------------

/// Special-cause patterns, numbered 1..=8.
///
/// Each variant corresponds to one of Nelson's tests for special causes
/// of variation.
///
/// # Reference
///
/// Nelson, L.S. (1984). "The Shewhart Control Chart — Tests for Special Causes",
/// *Journal of Quality Technology* 16(4), pp. 237-239.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ViolationType {
    /// Rule 1: a single point more than 3 sigma from the center line.
    BeyondLimits,

    /// Rule 2: 9 points in a row on the same side of the center line.
    ///
    /// Indicates a sustained shift in the process mean.
    NineOneSide,

    /// Rule 3: 6 points in a row steadily increasing or decreasing.
    SixTrend,

    /// Rule 4: 14 points in a row alternating up and down.
    ///
    /// Indicates systematic variation (e.g., two alternating streams).
    FourteenAlternating,

    /// Rule 5: 2 out of 3 points beyond 2 sigma on the same side.
    TwoOfThreeBeyond2Sigma,

    /// Rule 6: 4 out of 5 points beyond 1 sigma on the same side.
    FourOfFiveBeyond1Sigma,

    /// Rule 7: 15 points in a row within 1 sigma of the center line.
    ///
    /// Indicates stratification: less variation than the limits imply.
    FifteenWithin1Sigma,

    /// Rule 8: 8 points in a row beyond 1 sigma on either side.
    ///
    /// Indicates a mixture pattern: points avoid the center zone.
    EightBeyond1Sigma,
}

impl ViolationType {
    /// All rules in rule-id order.
    pub const ALL: [ViolationType; 8] = [
        ViolationType::BeyondLimits,
        ViolationType::NineOneSide,
        ViolationType::SixTrend,
        ViolationType::FourteenAlternating,
        ViolationType::TwoOfThreeBeyond2Sigma,
        ViolationType::FourOfFiveBeyond1Sigma,
        ViolationType::FifteenWithin1Sigma,
        ViolationType::EightBeyond1Sigma,
    ];

    /// Rule id, 1..=8.
    pub fn rule_id(self) -> u8 {
        match self {
            ViolationType::BeyondLimits => 1,
            ViolationType::NineOneSide => 2,
            ViolationType::SixTrend => 3,
            ViolationType::FourteenAlternating => 4,
            ViolationType::TwoOfThreeBeyond2Sigma => 5,
            ViolationType::FourOfFiveBeyond1Sigma => 6,
            ViolationType::FifteenWithin1Sigma => 7,
            ViolationType::EightBeyond1Sigma => 8,
        }
    }

    /// Look up a rule by id.
    pub fn from_rule_id(id: u8) -> Option<Self> {
        Self::ALL.get(usize::from(id).checked_sub(1)?).copied()
    }

    /// Short description of the pattern.
    pub fn description(self) -> &'static str {
        match self {
            ViolationType::BeyondLimits => "point beyond 3 sigma",
            ViolationType::NineOneSide => "9 points on one side of the center line",
            ViolationType::SixTrend => "6 points steadily increasing or decreasing",
            ViolationType::FourteenAlternating => "14 points alternating up and down",
            ViolationType::TwoOfThreeBeyond2Sigma => "2 of 3 points beyond 2 sigma, same side",
            ViolationType::FourOfFiveBeyond1Sigma => "4 of 5 points beyond 1 sigma, same side",
            ViolationType::FifteenWithin1Sigma => "15 points within 1 sigma",
            ViolationType::EightBeyond1Sigma => "8 points beyond 1 sigma, either side",
        }
    }
}

impl fmt::Display for ViolationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule {}: {}", self.rule_id(), self.description())
    }
}

impl From<ViolationType> for u8 {
    fn from(rule: ViolationType) -> Self {
        rule.rule_id()
    }
}

impl TryFrom<u8> for ViolationType {
    type Error = SpcError;

    fn try_from(id: u8) -> Result<Self> {
        ViolationType::from_rule_id(id).ok_or(SpcError::UnknownRule(id))
    }
}

/// A rule violation at one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RuleViolation {
    /// Zero-based position of the flagged point.
    pub observation_index: usize,
    /// The violated rule.
    pub rule: ViolationType,
}

impl RuleViolation {
    /// Rule id, 1..=8.
    pub fn rule_id(&self) -> u8 {
        self.rule.rule_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chart_type_parses_conventional_names() {
        assert_eq!("XmR-chart".parse::<ChartType>().unwrap(), ChartType::XmR);
        assert_eq!(
            "Individual-chart".parse::<ChartType>().unwrap(),
            ChartType::Individual
        );
        assert_eq!("p-chart".parse::<ChartType>().unwrap(), ChartType::P);
        assert_eq!("C".parse::<ChartType>().unwrap(), ChartType::C);
        assert_eq!("u_chart".parse::<ChartType>().unwrap(), ChartType::U);
        assert_eq!("xbarr".parse::<ChartType>().unwrap(), ChartType::XbarR);
        assert_eq!("XbarS-chart".parse::<ChartType>().unwrap(), ChartType::XbarS);
    }

    #[test]
    fn test_chart_type_name_round_trip() {
        for chart in ChartType::ALL {
            assert_eq!(chart.name().parse::<ChartType>().unwrap(), chart);
        }
    }

    #[test]
    fn test_chart_type_unknown() {
        let err = "np-chart".parse::<ChartType>().unwrap_err();
        assert_eq!(err, SpcError::UnknownChartType("np-chart".to_string()));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_chart_type_serde_uses_names() {
        let json = serde_json::to_string(&ChartType::XbarS).unwrap();
        assert_eq!(json, "\"XbarS-chart\"");
        let parsed: ChartType = serde_json::from_str("\"Individual-chart\"").unwrap();
        assert_eq!(parsed, ChartType::Individual);
        assert!(serde_json::from_str::<ChartType>("\"pie-chart\"").is_err());
    }

    #[test]
    fn test_statistic_per_chart_type() {
        let counted = Observation::counted(0, 5.0, 50);
        assert!((ChartType::P.statistic(&counted) - 0.1).abs() < 1e-12);
        assert!((ChartType::U.statistic(&counted) - 0.1).abs() < 1e-12);
        assert!((ChartType::C.statistic(&counted) - 5.0).abs() < 1e-12);
        assert!((ChartType::P.weight(&counted) - 50.0).abs() < 1e-12);
        assert!((ChartType::C.weight(&counted) - 1.0).abs() < 1e-12);

        let subgroup = Observation::subgroup(0, vec![1.0, 2.0, 6.0]);
        assert!((subgroup.value - 3.0).abs() < 1e-12);
        assert!((ChartType::XbarR.statistic(&subgroup) - 3.0).abs() < 1e-12);
        let range = ChartType::XbarR
            .dispersion_statistic(&subgroup, None)
            .expect("range");
        assert!((range - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_moving_range_needs_previous() {
        let a = Observation::new(0, 10.0);
        let b = Observation::new(1, 13.5);
        assert_eq!(ChartType::XmR.dispersion_statistic(&a, None), None);
        let mr = ChartType::XmR.dispersion_statistic(&b, Some(&a)).expect("mr");
        assert!((mr - 3.5).abs() < 1e-12);
        assert_eq!(ChartType::Individual.dispersion_statistic(&b, Some(&a)), None);
    }

    #[test]
    fn test_fixed_limits() {
        let limits = ChartStatistics::fixed(25.0, 2.0).limits_at(1.0);
        assert!((limits.ucl - 31.0).abs() < f64::EPSILON);
        assert!((limits.center_line - 25.0).abs() < f64::EPSILON);
        assert!((limits.lcl - 19.0).abs() < f64::EPSILON);
        let (lower, upper) = limits.zone(2.0);
        assert!((lower - 21.0).abs() < f64::EPSILON);
        assert!((upper - 29.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zero_sigma_collapses_limits() {
        let limits = ChartStatistics::fixed(10.0, 0.0).limits_at(1.0);
        assert!((limits.ucl - 10.0).abs() < f64::EPSILON);
        assert!((limits.lcl - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_binomial_width_scales_with_sample_size() {
        let stats = ChartStatistics {
            center_line: 0.1,
            spread: Spread::Binomial,
            lower_bound: Some(0.0),
        };
        let small = stats.limits_at(100.0);
        let large = stats.limits_at(400.0);
        // sigma ∝ 1/sqrt(n): quadrupling n halves sigma
        assert!((small.sigma / large.sigma - 2.0).abs() < 1e-12);
        assert!(small.ucl - small.center_line > large.ucl - large.center_line);
        assert!((small.sigma - 0.03).abs() < 1e-12);
    }

    #[test]
    fn test_poisson_lower_bound_clamped() {
        let stats = ChartStatistics {
            center_line: 1.0,
            spread: Spread::Poisson,
            lower_bound: Some(0.0),
        };
        let limits = stats.limits_at(1.0);
        assert!((limits.lcl - 0.0).abs() < f64::EPSILON);
        assert!((limits.ucl - 4.0).abs() < f64::EPSILON);
        assert!((limits.sigma - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rule_ids() {
        for (i, rule) in ViolationType::ALL.iter().enumerate() {
            assert_eq!(usize::from(rule.rule_id()), i + 1);
            assert_eq!(ViolationType::from_rule_id(rule.rule_id()), Some(*rule));
        }
        assert_eq!(ViolationType::from_rule_id(0), None);
        assert_eq!(ViolationType::from_rule_id(9), None);
    }

    #[test]
    fn test_violation_type_serializes_as_id() {
        let json = serde_json::to_string(&ViolationType::SixTrend).unwrap();
        assert_eq!(json, "3");
        let parsed: ViolationType = serde_json::from_str("8").unwrap();
        assert_eq!(parsed, ViolationType::EightBeyond1Sigma);
        assert!(serde_json::from_str::<ViolationType>("9").is_err());
    }

    #[test]
    fn test_rule_violation_construction() {
        let v = RuleViolation {
            observation_index: 5,
            rule: ViolationType::SixTrend,
        };
        assert_eq!(v.observation_index, 5);
        assert_eq!(v.rule_id(), 3);
    }
}
