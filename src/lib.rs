//! # u-spc
//!
//! Statistical process control charts with piecewise control limits and
//! special-cause run rules.
//!
//! Given a time-ordered series of measurements, the crate partitions it at
//! change dates, derives a center line and control limits per segment for
//! one of seven classical chart types (XmR, Individual, p, c, u, X̄-R, X̄-S),
//! and flags the observations that violate the Nelson run rules.
//!
//! ## Modules
//!
//! - [`spc`] — Segmentation, per-chart statistics, run rules, and dataset assembly
//! - [`error`] — Configuration and insufficient-data errors
//!
//! ## Design Philosophy
//!
//! - **Pure computation**: every call is a function of its inputs; nothing is cached
//! - **Numerical stability**: Leverages `u-numflow` for stable statistics
//! - **Research-backed**: All algorithms reference academic literature

pub mod error;
pub mod spc;

pub use error::{Result, SpcError};
