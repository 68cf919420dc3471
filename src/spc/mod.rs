//! Statistical Process Control (SPC) charts with piecewise control limits.
//!
//! The pipeline turns a time-ordered series of [`Observation`]s into a
//! [`ChartDataset`]:
//!
//! 1. [`segment`] partitions the series at change dates, optionally
//!    restricting the first segment's statistics to a baseline window.
//! 2. [`compute`] derives each segment's center line and sigma model for
//!    the configured [`ChartType`].
//! 3. Limits are broadcast onto every observation of their segment, and
//!    [`evaluate`] runs the rule set over the annotated series.
//!
//! [`analyze`] runs all three steps after [`validate`] has checked the
//! input.
//!
//! # Variables Charts
//!
//! - XmR: individuals with a moving-range chart
//! - Individual: individuals alone
//! - XbarR / XbarS: subgroup means with a range or standard-deviation chart
//!   (n = 2..=25)
//!
//! # Attributes Charts
//!
//! - p: proportion nonconforming (variable sample size)
//! - c: count of defects per unit (constant area of opportunity)
//! - u: defects per unit (variable area of opportunity)
//!
//! # Run Rules
//!
//! - [`NelsonRules`]: 8 rules
//! - [`WesternElectricRules`]: 4 classic run rules
//! - [`RuleSet`]: any selection of the eight
//!
//! # References
//!
//! - Montgomery, D.C. (2019). *Introduction to Statistical Quality Control*, 8th ed.
//! - ASTM E2587 — Standard Practice for Use of Control Charts
//! - Nelson, L.S. (1984). "The Shewhart Control Chart — Tests for Special Causes",
//!   *Journal of Quality Technology* 16(4), pp. 237-239.

mod attributes;
mod chart;
mod config;
mod dataset;
mod rules;
mod segment;
mod variables;

pub use attributes::{c_statistics, p_statistics, u_statistics};
pub use chart::{
    compute, ChartStatistics, ChartType, ControlLimits, Observation, RuleViolation,
    SegmentStatistics, Spread, ViolationType, LIMIT_SIGMAS, RELIABLE_WINDOW,
};
pub use config::{validate, ChartConfig};
pub use dataset::{analyze, ChartDataset, ChartRow, SegmentSummary};
pub use rules::{evaluate, AnnotatedPoint, NelsonRules, RuleSet, RunRule, WesternElectricRules};
pub use segment::{segment, Segment};
pub use variables::{
    individuals_statistics, xbar_r_statistics, xbar_s_statistics, SubgroupFactors,
    MAX_SUBGROUP_SIZE, MIN_SUBGROUP_SIZE,
};
