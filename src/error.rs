//! Error types for control chart computation.
//!
//! Two families: configuration errors (the inputs do not describe a valid
//! chart) and insufficient-data errors (a segment is too short for its chart
//! type). Both are raised before any result is produced. Zero-variance data
//! is not an error; it yields collapsed limits.

use thiserror::Error;

use crate::spc::ChartType;

/// Errors raised by segmentation, statistics, and the analysis pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SpcError {
    // ============ Configuration Errors ============
    /// The chart type name is not one of the supported seven.
    #[error("unknown chart type '{0}'")]
    UnknownChartType(String),

    /// A rule id outside 1..=8.
    #[error("unknown rule id {0}, expected 1..=8")]
    UnknownRule(u8),

    /// No observations were supplied.
    #[error("series is empty")]
    EmptySeries,

    /// An observation's timestamp is not later than its predecessor's.
    #[error("observation {index} is not later than the observation before it")]
    UnorderedObservations {
        /// Position of the offending observation.
        index: usize,
    },

    /// An observation lacks a field the chart type requires.
    #[error("observation {index}: {chart_type} requires `{field}`")]
    MissingField {
        /// Position of the offending observation.
        index: usize,
        /// The configured chart type.
        chart_type: ChartType,
        /// Name of the missing field.
        field: &'static str,
    },

    /// An observation carries a value the chart type cannot accept.
    #[error("observation {index}: {reason}")]
    InvalidObservation {
        /// Position of the offending observation.
        index: usize,
        /// What is wrong with it.
        reason: String,
    },

    /// A subgroup size with no tabulated chart factors.
    #[error("observation {index}: subgroup size {size} outside the supported range 2..=25")]
    UnsupportedSubgroupSize {
        /// Position of the offending observation.
        index: usize,
        /// Its subgroup size.
        size: usize,
    },

    /// Subgroups of different sizes in one series.
    #[error("observation {index}: subgroup size {size} differs from the series' size {expected}")]
    InconsistentSubgroupSize {
        /// Position of the offending observation.
        index: usize,
        /// Its subgroup size.
        size: usize,
        /// Size of the first subgroup.
        expected: usize,
    },

    /// A change date earlier than the one before it.
    #[error("change date #{position} is earlier than the change date before it")]
    UnorderedChangeDates {
        /// Position in the change-date list.
        position: usize,
    },

    /// A change date repeated.
    #[error("change date #{position} duplicates the change date before it")]
    DuplicateChangeDate {
        /// Position in the change-date list.
        position: usize,
    },

    /// A change date at or before the first observation, or after the last.
    #[error("change date #{position} lies outside the series range")]
    ChangeDateOutOfRange {
        /// Position in the change-date list.
        position: usize,
    },

    /// Two change dates with no observation between them.
    #[error("change date #{position} starts a segment with no observations")]
    EmptySegment {
        /// Position in the change-date list.
        position: usize,
    },

    /// The baseline date lies before the first or after the last observation.
    #[error("baseline date lies outside the series range")]
    BaselineDateOutOfRange,

    /// With change dates, the baseline date must fall inside the first segment.
    #[error("baseline date is not earlier than the first change date")]
    BaselineBeyondFirstSegment,

    // ============ Insufficient Data ============
    /// A statistics window shorter than the chart type's minimum.
    #[error(
        "segment {start_index}..{end_index} has {found} baseline points, {chart_type} needs at least {required}"
    )]
    InsufficientData {
        /// First observation of the segment.
        start_index: usize,
        /// One past the last observation of the segment.
        end_index: usize,
        /// Points available for statistics.
        found: usize,
        /// Points required.
        required: usize,
        /// The configured chart type.
        chart_type: ChartType,
    },
}

impl SpcError {
    /// Whether this is a configuration error (as opposed to insufficient data).
    pub fn is_configuration(&self) -> bool {
        !matches!(self, SpcError::InsufficientData { .. })
    }
}

/// Result alias for control chart operations.
pub type Result<T> = std::result::Result<T, SpcError>;
