//! Chart configuration and input validation.
//!
//! A [`ChartConfig`] names the chart type, the dates at which limits are
//! re-derived, an optional baseline cut-off, and an optional rule-set
//! override. It deserializes from any serde format:
//!
//! ```
//! use u_spc::spc::{ChartConfig, ChartType};
//!
//! let config: ChartConfig<u32> =
//!     serde_json::from_str(r#"{ "chart_type": "p-chart", "change_dates": [30] }"#).unwrap();
//! assert_eq!(config.chart_type, ChartType::P);
//! assert_eq!(config.change_dates, vec![30]);
//! assert!(config.baseline_date.is_none());
//! ```

use serde::{Deserialize, Serialize};

use super::chart::{ChartType, Observation};
use super::rules::RuleSet;
use super::segment::{ensure_ordered, segment};
use super::variables::{MAX_SUBGROUP_SIZE, MIN_SUBGROUP_SIZE};
use crate::error::{Result, SpcError};

/// What to chart and where limits are re-derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartConfig<T> {
    /// Chart type.
    pub chart_type: ChartType,
    /// Each date starts a new segment with freshly computed limits.
    #[serde(default = "Vec::new")]
    pub change_dates: Vec<T>,
    /// Only observations up to this date feed the first segment's statistics.
    #[serde(default = "Option::default")]
    pub baseline_date: Option<T>,
    /// Rules for the primary chart; the chart type's defaults when `None`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<RuleSet>,
}

impl<T> ChartConfig<T> {
    /// A single-segment chart with the default rules.
    pub fn new(chart_type: ChartType) -> Self {
        Self {
            chart_type,
            change_dates: Vec::new(),
            baseline_date: None,
            rules: None,
        }
    }

    /// Re-derive limits at each of these dates.
    pub fn with_change_dates(mut self, change_dates: Vec<T>) -> Self {
        self.change_dates = change_dates;
        self
    }

    /// Derive the first segment's limits from observations up to `date`.
    pub fn with_baseline_date(mut self, date: T) -> Self {
        self.baseline_date = Some(date);
        self
    }

    /// Evaluate these rules on the primary chart.
    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.rules = Some(rules);
        self
    }

    /// Rules applied to the primary chart.
    pub fn primary_rules(&self) -> RuleSet {
        self.rules
            .clone()
            .unwrap_or_else(|| self.chart_type.default_rules())
    }
}

fn invalid(index: usize, reason: impl Into<String>) -> SpcError {
    SpcError::InvalidObservation {
        index,
        reason: reason.into(),
    }
}

/// Check one observation against what its chart type requires.
fn validate_observation<T>(
    index: usize,
    observation: &Observation<T>,
    chart_type: ChartType,
    subgroup_size: &mut Option<usize>,
) -> Result<()> {
    if !observation.value.is_finite() {
        return Err(invalid(index, "value must be finite"));
    }

    if chart_type.requires_sample_size() {
        let n = observation.sample_size.ok_or(SpcError::MissingField {
            index,
            chart_type,
            field: "sample_size",
        })?;
        if n == 0 {
            return Err(invalid(index, "sample_size must be positive"));
        }
        if observation.value < 0.0 {
            return Err(invalid(index, "count must not be negative"));
        }
        if chart_type == ChartType::P && observation.value > n as f64 {
            return Err(invalid(index, "defectives exceed sample_size"));
        }
    }

    if chart_type == ChartType::C && observation.value < 0.0 {
        return Err(invalid(index, "count must not be negative"));
    }

    if chart_type.requires_subgroups() {
        let subgroup = observation.subgroup.as_deref().ok_or(SpcError::MissingField {
            index,
            chart_type,
            field: "subgroup",
        })?;
        if subgroup.iter().any(|x| !x.is_finite()) {
            return Err(invalid(index, "subgroup readings must be finite"));
        }
        let size = subgroup.len();
        if !(MIN_SUBGROUP_SIZE..=MAX_SUBGROUP_SIZE).contains(&size) {
            return Err(SpcError::UnsupportedSubgroupSize { index, size });
        }
        match *subgroup_size {
            None => *subgroup_size = Some(size),
            Some(expected) if expected != size => {
                return Err(SpcError::InconsistentSubgroupSize {
                    index,
                    size,
                    expected,
                })
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Check a series and configuration for every configuration error.
///
/// Covers the series itself (non-empty, strictly increasing timestamps,
/// finite values), the per-observation fields the chart type needs, and the
/// change and baseline dates. Insufficient-data conditions are left to the
/// statistics step.
pub fn validate<T: Ord>(observations: &[Observation<T>], config: &ChartConfig<T>) -> Result<()> {
    if observations.is_empty() {
        return Err(SpcError::EmptySeries);
    }
    ensure_ordered(observations)?;

    let mut subgroup_size = None;
    for (index, observation) in observations.iter().enumerate() {
        validate_observation(index, observation, config.chart_type, &mut subgroup_size)?;
    }

    segment(
        observations,
        &config.change_dates,
        config.baseline_date.as_ref(),
    )?;
    Ok(())
}
