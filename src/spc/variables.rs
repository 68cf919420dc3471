//! Variables control charts: Individuals (XmR), X-bar-R, and X-bar-S.
//!
//! These charts monitor continuous (variables) data from a process.
//! Subgroup charts (X-bar-R, X-bar-S) track the mean and within-subgroup
//! variation of small samples; the individuals chart handles single
//! observations, estimating variation from the moving range.
//!
//! # Control Chart Factors
//!
//! All constants (A2, A3, d2, D3, D4, B3, B4) are sourced from
//! ASTM E2587 — Standard Practice for Use of Control Charts in Statistical
//! Process Control, for subgroup sizes n = 2..=25.
//!
//! # References
//!
//! - Montgomery, D.C. (2019). *Introduction to Statistical Quality Control*, 8th ed.
//! - ASTM E2587 — Standard Practice for Use of Control Charts
//! - Shewhart, W.A. (1931). *Economic Control of Quality of Manufactured Product*.

use u_numflow::stats;

use super::chart::{subgroup_range, ChartStatistics, ChartType, SegmentStatistics, LIMIT_SIGMAS};
use super::segment::Segment;
use crate::error::{Result, SpcError};

// ---------------------------------------------------------------------------
// Control chart factor tables (ASTM E2587), indexed by subgroup size n=2..25
// Index 0 corresponds to n=2.
// ---------------------------------------------------------------------------

/// Smallest subgroup size with tabulated factors.
pub const MIN_SUBGROUP_SIZE: usize = 2;

/// Largest subgroup size with tabulated factors.
pub const MAX_SUBGROUP_SIZE: usize = 25;

const FACTOR_COUNT: usize = MAX_SUBGROUP_SIZE - MIN_SUBGROUP_SIZE + 1;

/// A2 factors: X-bar limits = X-double-bar +/- A2 * R-bar.
const A2: [f64; FACTOR_COUNT] = [
    1.880, 1.023, 0.729, 0.577, 0.483, 0.419, 0.373, 0.337, 0.308, 0.285, 0.266, 0.249, 0.235,
    0.223, 0.212, 0.203, 0.194, 0.187, 0.180, 0.173, 0.167, 0.162, 0.157, 0.153,
];

/// A3 factors: X-bar limits = X-double-bar +/- A3 * S-bar.
const A3: [f64; FACTOR_COUNT] = [
    2.659, 1.954, 1.628, 1.427, 1.287, 1.182, 1.099, 1.032, 0.975, 0.927, 0.886, 0.850, 0.817,
    0.789, 0.763, 0.739, 0.718, 0.698, 0.680, 0.663, 0.647, 0.633, 0.619, 0.606,
];

/// d2 factors (mean of the relative range): sigma-hat = R-bar / d2.
const D2: [f64; FACTOR_COUNT] = [
    1.128, 1.693, 2.059, 2.326, 2.534, 2.704, 2.847, 2.970, 3.078, 3.173, 3.258, 3.336, 3.407,
    3.472, 3.532, 3.588, 3.640, 3.689, 3.735, 3.778, 3.819, 3.858, 3.895, 3.931,
];

/// D3 factors: LCL_R = D3 * R-bar.
const D3: [f64; FACTOR_COUNT] = [
    0.0, 0.0, 0.0, 0.0, 0.0, 0.076, 0.136, 0.184, 0.223, 0.256, 0.283, 0.307, 0.328, 0.347,
    0.363, 0.378, 0.391, 0.403, 0.415, 0.425, 0.434, 0.443, 0.451, 0.459,
];

/// D4 factors: UCL_R = D4 * R-bar.
const D4: [f64; FACTOR_COUNT] = [
    3.267, 2.574, 2.282, 2.114, 2.004, 1.924, 1.864, 1.816, 1.777, 1.744, 1.717, 1.693, 1.672,
    1.653, 1.637, 1.622, 1.608, 1.597, 1.585, 1.575, 1.566, 1.557, 1.548, 1.541,
];

/// B3 factors: LCL_S = B3 * S-bar.
const B3: [f64; FACTOR_COUNT] = [
    0.0, 0.0, 0.0, 0.0, 0.030, 0.118, 0.185, 0.239, 0.284, 0.321, 0.354, 0.382, 0.406, 0.428,
    0.448, 0.466, 0.482, 0.497, 0.510, 0.523, 0.534, 0.545, 0.555, 0.565,
];

/// B4 factors: UCL_S = B4 * S-bar.
const B4: [f64; FACTOR_COUNT] = [
    3.267, 2.568, 2.266, 2.089, 1.970, 1.882, 1.815, 1.761, 1.716, 1.679, 1.646, 1.618, 1.594,
    1.572, 1.552, 1.534, 1.518, 1.503, 1.490, 1.477, 1.466, 1.455, 1.445, 1.435,
];

/// Tabulated control chart factors for one subgroup size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubgroupFactors {
    /// Subgroup size the factors belong to.
    pub size: usize,
    /// X-bar-R limit factor.
    pub a2: f64,
    /// X-bar-S limit factor.
    pub a3: f64,
    /// Mean relative range.
    pub d2: f64,
    /// R chart lower limit factor.
    pub d3: f64,
    /// R chart upper limit factor.
    pub d4: f64,
    /// S chart lower limit factor.
    pub b3: f64,
    /// S chart upper limit factor.
    pub b4: f64,
}

impl SubgroupFactors {
    /// Factors for subgroup size `n`, or `None` outside 2..=25.
    ///
    /// ```
    /// use u_spc::spc::SubgroupFactors;
    ///
    /// let f = SubgroupFactors::for_size(5).unwrap();
    /// assert!((f.a2 - 0.577).abs() < 1e-12);
    /// assert!(SubgroupFactors::for_size(26).is_none());
    /// ```
    pub fn for_size(n: usize) -> Option<Self> {
        let idx = n.checked_sub(MIN_SUBGROUP_SIZE)?;
        if idx >= FACTOR_COUNT {
            return None;
        }
        Some(Self {
            size: n,
            a2: A2[idx],
            a3: A3[idx],
            d2: D2[idx],
            d3: D3[idx],
            d4: D4[idx],
            b3: B3[idx],
            b4: B4[idx],
        })
    }
}

/// Factors for the two-point moving range.
const MOVING_RANGE: SubgroupFactors = SubgroupFactors {
    size: 2,
    a2: A2[0],
    a3: A3[0],
    d2: D2[0],
    d3: D3[0],
    d4: D4[0],
    b3: B3[0],
    b4: B4[0],
};

/// Dispersion-chart statistics with limits `lower * bar ..= upper * bar`.
///
/// Sigma is taken from the upper factor; the lower limit is clamped at the
/// tabulated lower factor, which is zero for small subgroups.
fn dispersion_statistics(bar: f64, lower: f64, upper: f64) -> ChartStatistics {
    ChartStatistics::fixed(bar, (upper - 1.0) * bar / LIMIT_SIGMAS).with_lower_bound(lower * bar)
}

// ---------------------------------------------------------------------------
// Individuals (XmR) Chart
// ---------------------------------------------------------------------------

/// Individuals and moving-range statistics.
///
/// # Algorithm
///
/// 1. Compute moving ranges: MR_i = |x_i - x_{i-1}| for i >= 1.
/// 2. Compute the mean of the observations (X-bar) and the average
///    moving range (MR-bar).
/// 3. I chart: CL = X-bar, sigma = MR-bar / d2(2), limits CL +/- 3 sigma.
/// 4. MR chart: CL = MR-bar, UCL = D4(2) * MR-bar, LCL = 0.
///
/// # Reference
///
/// Montgomery, D.C. (2019). *Introduction to Statistical Quality Control*, 8th ed.,
/// Chapter 6: Control Charts for Variables.
pub fn individuals_statistics<T>(segment: &Segment<'_, T>) -> Result<SegmentStatistics> {
    let insufficient = || segment.insufficient(ChartType::XmR, ChartType::XmR.min_points());
    let values: Vec<f64> = segment.baseline().iter().map(|o| o.value).collect();
    let moving_ranges: Vec<f64> = values.windows(2).map(|w| (w[1] - w[0]).abs()).collect();

    let x_bar = stats::mean(&values).ok_or_else(insufficient)?;
    let mr_bar = stats::mean(&moving_ranges).ok_or_else(insufficient)?;

    Ok(SegmentStatistics {
        primary: ChartStatistics::fixed(x_bar, mr_bar / MOVING_RANGE.d2),
        dispersion: Some(dispersion_statistics(
            mr_bar,
            MOVING_RANGE.d3,
            MOVING_RANGE.d4,
        )),
    })
}

// ---------------------------------------------------------------------------
// X-bar-R / X-bar-S Charts
// ---------------------------------------------------------------------------

/// Subgroup size shared by every observation of the segment, with its factors.
fn segment_factors<T>(segment: &Segment<'_, T>, chart_type: ChartType) -> Result<SubgroupFactors> {
    let mut expected = None;
    for (offset, observation) in segment.observations.iter().enumerate() {
        let index = segment.start_index + offset;
        let size = observation
            .subgroup
            .as_ref()
            .map(Vec::len)
            .filter(|&n| n > 0)
            .ok_or(SpcError::MissingField {
                index,
                chart_type,
                field: "subgroup",
            })?;
        match expected {
            None => expected = Some(size),
            Some(first) if first != size => {
                return Err(SpcError::InconsistentSubgroupSize {
                    index,
                    size,
                    expected: first,
                })
            }
            Some(_) => {}
        }
    }
    let size = expected.ok_or_else(|| segment.insufficient(chart_type, chart_type.min_points()))?;
    SubgroupFactors::for_size(size).ok_or(SpcError::UnsupportedSubgroupSize {
        index: segment.start_index,
        size,
    })
}

/// Per-subgroup means and dispersions over the baseline window.
fn subgroup_summaries<T>(
    segment: &Segment<'_, T>,
    chart_type: ChartType,
    dispersion: fn(&[f64]) -> Option<f64>,
) -> Result<(Vec<f64>, Vec<f64>)> {
    let baseline = segment.baseline();
    let mut means = Vec::with_capacity(baseline.len());
    let mut spreads = Vec::with_capacity(baseline.len());
    for (offset, observation) in baseline.iter().enumerate() {
        let index = segment.start_index + offset;
        let invalid = || SpcError::InvalidObservation {
            index,
            reason: "subgroup readings must be finite".to_string(),
        };
        let subgroup = observation.subgroup.as_deref().ok_or(SpcError::MissingField {
            index,
            chart_type,
            field: "subgroup",
        })?;
        means.push(stats::mean(subgroup).ok_or_else(invalid)?);
        spreads.push(dispersion(subgroup).ok_or_else(invalid)?);
    }
    Ok((means, spreads))
}

/// X-bar and range statistics.
///
/// # Algorithm
///
/// 1. For each subgroup, compute the mean (X-bar) and range (R).
/// 2. Compute the grand mean (X-double-bar) and average range (R-bar).
/// 3. X-bar chart: CL = X-double-bar, UCL/LCL = CL +/- A2 * R-bar.
/// 4. R chart: CL = R-bar, UCL = D4 * R-bar, LCL = D3 * R-bar.
///
/// # Reference
///
/// Montgomery, D.C. (2019). *Introduction to Statistical Quality Control*, 8th ed.,
/// Chapter 6: Control Charts for Variables.
pub fn xbar_r_statistics<T>(segment: &Segment<'_, T>) -> Result<SegmentStatistics> {
    let chart_type = ChartType::XbarR;
    let factors = segment_factors(segment, chart_type)?;
    let (means, ranges) = subgroup_summaries(segment, chart_type, subgroup_range)?;
    let insufficient = || segment.insufficient(chart_type, chart_type.min_points());

    let grand_mean = stats::mean(&means).ok_or_else(insufficient)?;
    let r_bar = stats::mean(&ranges).ok_or_else(insufficient)?;

    Ok(SegmentStatistics {
        primary: ChartStatistics::fixed(grand_mean, factors.a2 * r_bar / LIMIT_SIGMAS),
        dispersion: Some(dispersion_statistics(r_bar, factors.d3, factors.d4)),
    })
}

/// X-bar and standard deviation statistics.
///
/// Preferred over X-bar-R for larger subgroups where the range is a less
/// efficient estimator.
///
/// # Algorithm
///
/// 1. For each subgroup, compute the mean (X-bar) and sample standard deviation (S).
/// 2. Compute the grand mean (X-double-bar) and average S (S-bar).
/// 3. X-bar chart: CL = X-double-bar, UCL/LCL = CL +/- A3 * S-bar.
/// 4. S chart: CL = S-bar, UCL = B4 * S-bar, LCL = B3 * S-bar.
pub fn xbar_s_statistics<T>(segment: &Segment<'_, T>) -> Result<SegmentStatistics> {
    let chart_type = ChartType::XbarS;
    let factors = segment_factors(segment, chart_type)?;
    let (means, deviations) = subgroup_summaries(segment, chart_type, stats::std_dev)?;
    let insufficient = || segment.insufficient(chart_type, chart_type.min_points());

    let grand_mean = stats::mean(&means).ok_or_else(insufficient)?;
    let s_bar = stats::mean(&deviations).ok_or_else(insufficient)?;

    Ok(SegmentStatistics {
        primary: ChartStatistics::fixed(grand_mean, factors.a3 * s_bar / LIMIT_SIGMAS),
        dispersion: Some(dispersion_statistics(s_bar, factors.b3, factors.b4)),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
