//! Analysis services: timeline reconciliation, production joining, indicator
//! computation and the frontend projections, orchestrated by [`pipeline`].

pub mod indicators;
pub mod pipeline;
pub mod production;
pub mod projection;
pub mod timeline;

#[cfg(test)]
mod production_tests;

pub use indicators::IndicatorEngine;
pub use pipeline::{AnalysisInputs, AnalysisOutputs, AnalysisPipeline};
pub use production::join_quality_production;
pub use projection::{convert_quality_volumes, project_hourly_production};
pub use timeline::TimelineMerger;

/// Rounds to three decimal places, the precision the persisted KPI tables use.
pub(crate) fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
