//! Run rules for detecting non-random patterns in control charts.
//!
//! Implements the eight Nelson run tests and the Western Electric and
//! zone-free subsets of them. Rules operate on standardized deviations
//! `z = (value - center) / sigma`, so they are independent of the chart
//! type that produced the limits.
//!
//! Runs never straddle a segment boundary: every window is scanned within
//! one segment, and a new segment starts every run afresh.
//!
//! # References
//!
//! - Nelson, L.S. (1984). "The Shewhart Control Chart — Tests for Special Causes",
//!   *Journal of Quality Technology* 16(4), pp. 237-239.
//! - Western Electric (1956). *Statistical Quality Control Handbook*.
//! - Montgomery, D.C. (2019). *Introduction to Statistical Quality Control*, 8th ed.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::chart::{ControlLimits, RuleViolation, ViolationType};
use crate::error::Result;

/// One point of a chart with the center line and sigma in force at it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnnotatedPoint {
    /// The plotted statistic.
    pub value: f64,
    /// Center line at this point.
    pub center_line: f64,
    /// Sigma at this point.
    pub sigma: f64,
    /// Segment the point belongs to. Rule windows reset when it changes.
    pub segment: usize,
}

impl AnnotatedPoint {
    /// Annotate `value` with the limits in force at it.
    pub fn new(value: f64, limits: &ControlLimits, segment: usize) -> Self {
        Self {
            value,
            center_line: limits.center_line,
            sigma: limits.sigma,
            segment,
        }
    }

    /// Deviation from the center line in sigma units.
    ///
    /// With zero sigma the point is either on the center (0) or infinitely
    /// far from it.
    pub fn z_score(&self) -> f64 {
        let deviation = self.value - self.center_line;
        if self.sigma > 0.0 {
            deviation / self.sigma
        } else if deviation > 0.0 {
            f64::INFINITY
        } else if deviation < 0.0 {
            f64::NEG_INFINITY
        } else {
            0.0
        }
    }
}

/// Trait for applying run rules to chart data.
///
/// Run rules detect non-random patterns that indicate special causes of
/// variation even when individual points remain within control limits.
pub trait RunRule {
    /// Check points against this rule set and return violations per point index.
    ///
    /// Returns `(point_index, violation_type)` pairs sorted by index. A
    /// single point may appear multiple times if it triggers multiple rules.
    fn check(&self, points: &[AnnotatedPoint]) -> Vec<(usize, ViolationType)>;
}

/// Western Electric rules (4 rules).
///
/// A subset of Nelson's rules, these are the original run tests from the
/// Western Electric *Statistical Quality Control Handbook* (1956):
///
/// 1. Any point beyond 3 sigma (Nelson Rule 1)
/// 2. 2 of 3 consecutive points beyond 2 sigma, same side (Nelson Rule 5)
/// 3. 4 of 5 consecutive points beyond 1 sigma, same side (Nelson Rule 6)
/// 4. 9 consecutive points on the same side of center line (Nelson Rule 2)
#[derive(Debug, Clone, Copy, Default)]
pub struct WesternElectricRules;

/// Nelson rules (8 rules, superset of Western Electric).
#[derive(Debug, Clone, Copy, Default)]
pub struct NelsonRules;

/// An arbitrary selection of the eight rules.
///
/// Serializes as the sorted list of rule ids.
///
/// ```
/// use u_spc::spc::{RuleSet, ViolationType};
///
/// let rules = RuleSet::from_rule_ids(&[1, 2, 5, 6]).unwrap();
/// assert_eq!(rules, RuleSet::western_electric());
/// assert!(rules.contains(ViolationType::TwoOfThreeBeyond2Sigma));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet(BTreeSet<ViolationType>);

impl RuleSet {
    /// All eight Nelson rules.
    pub fn nelson() -> Self {
        ViolationType::ALL.into_iter().collect()
    }

    /// Rules 1, 2, 5, and 6.
    pub fn western_electric() -> Self {
        [
            ViolationType::BeyondLimits,
            ViolationType::NineOneSide,
            ViolationType::TwoOfThreeBeyond2Sigma,
            ViolationType::FourOfFiveBeyond1Sigma,
        ]
        .into_iter()
        .collect()
    }

    /// Rules 1 through 4, which do not test the ±1σ/±2σ zones.
    pub fn zone_free() -> Self {
        [
            ViolationType::BeyondLimits,
            ViolationType::NineOneSide,
            ViolationType::SixTrend,
            ViolationType::FourteenAlternating,
        ]
        .into_iter()
        .collect()
    }

    /// Build a set from rule ids 1..=8.
    pub fn from_rule_ids(ids: &[u8]) -> Result<Self> {
        ids.iter()
            .map(|&id| ViolationType::try_from(id))
            .collect::<Result<_>>()
            .map(Self)
    }

    /// Whether `rule` is part of the set.
    pub fn contains(&self, rule: ViolationType) -> bool {
        self.0.contains(&rule)
    }

    /// Rules in id order.
    pub fn iter(&self) -> impl Iterator<Item = ViolationType> + Clone + '_ {
        self.0.iter().copied()
    }

    /// Number of rules in the set.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set selects no rules.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<ViolationType> for RuleSet {
    fn from_iter<I: IntoIterator<Item = ViolationType>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// +1 above the center, -1 below, 0 exactly on it.
fn side(point: &AnnotatedPoint) -> i8 {
    let z = point.z_score();
    if z > 0.0 {
        1
    } else if z < 0.0 {
        -1
    } else {
        0
    }
}

/// Direction between consecutive points: +1 up, -1 down, 0 equal.
fn directions(points: &[AnnotatedPoint]) -> Vec<i8> {
    points
        .windows(2)
        .map(|w| {
            if w[1].value > w[0].value {
                1
            } else if w[1].value < w[0].value {
                -1
            } else {
                0
            }
        })
        .collect()
}

/// Flag the last point of every `window`-point run whose points satisfy `hit`
/// at least `needed` times.
fn count_in_window(
    points: &[AnnotatedPoint],
    window: usize,
    needed: usize,
    rule: ViolationType,
    hit: impl Fn(f64) -> bool,
) -> Vec<(usize, ViolationType)> {
    if points.len() < window {
        return Vec::new();
    }
    points
        .windows(window)
        .enumerate()
        .filter(|(_, w)| w.iter().filter(|p| hit(p.z_score())).count() >= needed)
        .map(|(start, _)| (start + window - 1, rule))
        .collect()
}

/// Flag every point ending a run of at least `length` consecutive points
/// satisfying `hit`.
fn consecutive(
    points: &[AnnotatedPoint],
    length: usize,
    rule: ViolationType,
    hit: impl Fn(&AnnotatedPoint) -> bool,
) -> Vec<(usize, ViolationType)> {
    let mut violations = Vec::new();
    let mut run_length = 0_usize;
    for (i, point) in points.iter().enumerate() {
        if hit(point) {
            run_length += 1;
        } else {
            run_length = 0;
        }
        if run_length >= length {
            violations.push((i, rule));
        }
    }
    violations
}

/// Nelson Rule 1: a point more than 3 sigma from the center line.
fn check_rule1(points: &[AnnotatedPoint]) -> Vec<(usize, ViolationType)> {
    consecutive(points, 1, ViolationType::BeyondLimits, |p| {
        p.z_score().abs() > 3.0
    })
}

/// Nelson Rule 2: 9 consecutive points on the same side of center line.
///
/// A point exactly on the center line belongs to neither side.
fn check_rule2(points: &[AnnotatedPoint]) -> Vec<(usize, ViolationType)> {
    let mut violations = Vec::new();
    if points.len() < 9 {
        return violations;
    }

    let sides: Vec<i8> = points.iter().map(side).collect();
    let mut run_length = usize::from(sides[0] != 0);
    for i in 1..sides.len() {
        if sides[i] == 0 {
            run_length = 0;
        } else if sides[i] == sides[i - 1] {
            run_length += 1;
        } else {
            run_length = 1;
        }
        if run_length >= 9 {
            violations.push((i, ViolationType::NineOneSide));
        }
    }
    violations
}

/// Nelson Rule 3: 6 consecutive points steadily increasing or decreasing.
fn check_rule3(points: &[AnnotatedPoint]) -> Vec<(usize, ViolationType)> {
    let mut violations = Vec::new();
    if points.len() < 6 {
        return violations;
    }

    let dirs = directions(points);
    let mut run_length = usize::from(dirs[0] != 0);
    for i in 1..dirs.len() {
        if dirs[i] == 0 {
            run_length = 0;
        } else if dirs[i] == dirs[i - 1] {
            run_length += 1;
        } else {
            run_length = 1;
        }
        // 5 same-direction steps = 6 points; dirs[i] ends at points[i + 1]
        if run_length >= 5 {
            violations.push((i + 1, ViolationType::SixTrend));
        }
    }
    violations
}

/// Nelson Rule 4: 14 consecutive points alternating up and down.
fn check_rule4(points: &[AnnotatedPoint]) -> Vec<(usize, ViolationType)> {
    let mut violations = Vec::new();
    if points.len() < 14 {
        return violations;
    }

    let dirs = directions(points);
    let mut alt_length = usize::from(dirs[0] != 0);
    for i in 1..dirs.len() {
        if dirs[i] == 0 {
            alt_length = 0;
        } else if dirs[i] == -dirs[i - 1] {
            alt_length += 1;
        } else {
            alt_length = 1;
        }
        // 13 alternating steps = 14 points; dirs[i] ends at points[i + 1]
        if alt_length >= 13 {
            violations.push((i + 1, ViolationType::FourteenAlternating));
        }
    }
    violations
}

/// Nelson Rule 5: 2 out of 3 consecutive points beyond 2 sigma, same side.
fn check_rule5(points: &[AnnotatedPoint]) -> Vec<(usize, ViolationType)> {
    let rule = ViolationType::TwoOfThreeBeyond2Sigma;
    let mut violations = count_in_window(points, 3, 2, rule, |z| z > 2.0);
    violations.extend(count_in_window(points, 3, 2, rule, |z| z < -2.0));
    violations.sort_unstable();
    violations.dedup();
    violations
}

/// Nelson Rule 6: 4 out of 5 consecutive points beyond 1 sigma, same side.
fn check_rule6(points: &[AnnotatedPoint]) -> Vec<(usize, ViolationType)> {
    let rule = ViolationType::FourOfFiveBeyond1Sigma;
    let mut violations = count_in_window(points, 5, 4, rule, |z| z > 1.0);
    violations.extend(count_in_window(points, 5, 4, rule, |z| z < -1.0));
    violations.sort_unstable();
    violations.dedup();
    violations
}

/// Nelson Rule 7: 15 consecutive points within 1 sigma of center line.
///
/// Indicates stratification: less variation than the limits imply.
/// Points under collapsed limits (zero sigma) never count: the limits
/// already imply no variation.
fn check_rule7(points: &[AnnotatedPoint]) -> Vec<(usize, ViolationType)> {
    consecutive(points, 15, ViolationType::FifteenWithin1Sigma, |p| {
        p.sigma > 0.0 && p.z_score().abs() <= 1.0
    })
}

/// Nelson Rule 8: 8 consecutive points beyond 1 sigma on either side.
fn check_rule8(points: &[AnnotatedPoint]) -> Vec<(usize, ViolationType)> {
    consecutive(points, 8, ViolationType::EightBeyond1Sigma, |p| {
        p.z_score().abs() > 1.0
    })
}

fn check_one(rule: ViolationType, points: &[AnnotatedPoint]) -> Vec<(usize, ViolationType)> {
    match rule {
        ViolationType::BeyondLimits => check_rule1(points),
        ViolationType::NineOneSide => check_rule2(points),
        ViolationType::SixTrend => check_rule3(points),
        ViolationType::FourteenAlternating => check_rule4(points),
        ViolationType::TwoOfThreeBeyond2Sigma => check_rule5(points),
        ViolationType::FourOfFiveBeyond1Sigma => check_rule6(points),
        ViolationType::FifteenWithin1Sigma => check_rule7(points),
        ViolationType::EightBeyond1Sigma => check_rule8(points),
    }
}

/// Run `rules` over each segment separately, reporting series-wide indices.
fn check_segmented(
    points: &[AnnotatedPoint],
    rules: impl Iterator<Item = ViolationType> + Clone,
) -> Vec<(usize, ViolationType)> {
    let mut results = Vec::new();
    let mut offset = 0;
    for run in points.chunk_by(|a, b| a.segment == b.segment) {
        for rule in rules.clone() {
            results.extend(
                check_one(rule, run)
                    .into_iter()
                    .map(|(idx, violation)| (idx + offset, violation)),
            );
        }
        offset += run.len();
    }
    results.sort_unstable();
    results
}

// ---------------------------------------------------------------------------
// RunRule implementations
// ---------------------------------------------------------------------------

impl RunRule for WesternElectricRules {
    /// Apply the 4 Western Electric run rules.
    ///
    /// These correspond to Nelson Rules 1, 2, 5, and 6.
    fn check(&self, points: &[AnnotatedPoint]) -> Vec<(usize, ViolationType)> {
        RuleSet::western_electric().check(points)
    }
}

impl RunRule for NelsonRules {
    /// Apply all 8 Nelson run rules.
    fn check(&self, points: &[AnnotatedPoint]) -> Vec<(usize, ViolationType)> {
        check_segmented(points, ViolationType::ALL.into_iter())
    }
}

impl RunRule for RuleSet {
    fn check(&self, points: &[AnnotatedPoint]) -> Vec<(usize, ViolationType)> {
        check_segmented(points, self.iter())
    }
}

/// Evaluate `rules` over an annotated series.
///
/// Violations are ordered by point index, then rule id.
pub fn evaluate(points: &[AnnotatedPoint], rules: &impl RunRule) -> Vec<RuleViolation> {
    let violations: Vec<RuleViolation> = rules
        .check(points)
        .into_iter()
        .map(|(observation_index, rule)| RuleViolation {
            observation_index,
            rule,
        })
        .collect();

    for rule in ViolationType::ALL {
        let count = violations.iter().filter(|v| v.rule == rule).count();
        if count > 0 {
            trace!(rule = rule.rule_id(), count, "rule violations");
        }
    }
    violations
}
