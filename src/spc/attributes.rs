//! Attributes control charts: P, C, and U charts.
//!
//! These charts monitor discrete (count/proportion) data from a process.
//! Unlike variables charts, attributes charts use the binomial or Poisson
//! distribution to compute control limits, so the sigma of a point depends
//! on its own sample size and is realized per point from the segment's
//! [`Spread`].
//!
//! # Chart Selection Guide
//!
//! | Chart | Data Type | Sample Size |
//! |-------|-----------|-------------|
//! | P     | Proportion defective | Variable |
//! | C     | Count of defects | Constant area |
//! | U     | Defects per unit | Variable area |
//!
//! # References
//!
//! - Montgomery, D.C. (2019). *Introduction to Statistical Quality Control*, 8th ed.,
//!   Chapter 7: Control Charts for Attributes.
//! - ASTM E2587 — Standard Practice for Use of Control Charts

use u_numflow::stats;

use super::chart::{ChartStatistics, ChartType, SegmentStatistics, Spread};
use super::segment::Segment;
use crate::error::{Result, SpcError};

/// Totals of counts and sample sizes over the baseline window.
fn pooled_totals<T>(segment: &Segment<'_, T>, chart_type: ChartType) -> Result<(f64, f64)> {
    let mut counts = 0.0;
    let mut inspected = 0.0;
    for (offset, observation) in segment.baseline().iter().enumerate() {
        let index = segment.start_index + offset;
        let n = observation.sample_size.ok_or(SpcError::MissingField {
            index,
            chart_type,
            field: "sample_size",
        })?;
        if n == 0 {
            return Err(SpcError::InvalidObservation {
                index,
                reason: "sample_size must be positive".to_string(),
            });
        }
        counts += observation.value;
        inspected += n as f64;
    }
    Ok((counts, inspected))
}

fn attribute_statistics(center_line: f64, spread: Spread) -> SegmentStatistics {
    SegmentStatistics {
        primary: ChartStatistics {
            center_line,
            spread,
            lower_bound: Some(0.0),
        },
        dispersion: None,
    }
}

// ---------------------------------------------------------------------------
// P Chart
// ---------------------------------------------------------------------------

/// Proportion nonconforming (P) chart statistics.
///
/// Monitors the fraction of defective items in samples that may have
/// different sizes. Control limits vary per point when sample sizes differ.
///
/// # Formulas
///
/// - CL = p-bar = total_defectives / total_inspected
/// - UCL_i = p-bar + 3 * sqrt(p-bar * (1 - p-bar) / n_i)
/// - LCL_i = max(0, p-bar - 3 * sqrt(p-bar * (1 - p-bar) / n_i))
///
/// p-bar is the pooled estimator, not the mean of per-sample proportions.
///
/// # Reference
///
/// Montgomery, D.C. (2019). *Introduction to Statistical Quality Control*, 8th ed.,
/// Chapter 7, Section 7.3.
pub fn p_statistics<T>(segment: &Segment<'_, T>) -> Result<SegmentStatistics> {
    let (defectives, inspected) = pooled_totals(segment, ChartType::P)?;
    Ok(attribute_statistics(defectives / inspected, Spread::Binomial))
}

// ---------------------------------------------------------------------------
// C Chart
// ---------------------------------------------------------------------------

/// Count of defects (C) chart statistics.
///
/// Monitors the total number of defects per inspection unit, where the
/// area of opportunity is constant.
///
/// # Formulas
///
/// - CL = c-bar = mean defect count
/// - UCL = c-bar + 3 * sqrt(c-bar)
/// - LCL = max(0, c-bar - 3 * sqrt(c-bar))
pub fn c_statistics<T>(segment: &Segment<'_, T>) -> Result<SegmentStatistics> {
    let counts: Vec<f64> = segment.baseline().iter().map(|o| o.value).collect();
    let c_bar = stats::mean(&counts)
        .ok_or_else(|| segment.insufficient(ChartType::C, ChartType::C.min_points()))?;
    Ok(attribute_statistics(c_bar, Spread::Poisson))
}

// ---------------------------------------------------------------------------
// U Chart
// ---------------------------------------------------------------------------

/// Defects per unit (U) chart statistics.
///
/// Monitors the defect rate when the area of opportunity varies.
///
/// # Formulas
///
/// - CL = u-bar = total_defects / total_units
/// - UCL_i = u-bar + 3 * sqrt(u-bar / n_i)
/// - LCL_i = max(0, u-bar - 3 * sqrt(u-bar / n_i))
///
/// u-bar is pooled the same way as p-bar.
///
/// # Reference
///
/// Montgomery, D.C. (2019). *Introduction to Statistical Quality Control*, 8th ed.,
/// Chapter 7, Section 7.3.
pub fn u_statistics<T>(segment: &Segment<'_, T>) -> Result<SegmentStatistics> {
    let (defects, units) = pooled_totals(segment, ChartType::U)?;
    Ok(attribute_statistics(defects / units, Spread::Poisson))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
