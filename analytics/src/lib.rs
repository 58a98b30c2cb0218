//! SFM analytics core.
//!
//! Reconciles shop-floor machine telemetry with operator-entered stoppage
//! annotations into a single per-machine state timeline, merges production
//! counts with quality rejections, and derives the three production
//! indicators (eficiencia, performance, reparo) per machine/shift/day.
//!
//! The crate is a pure, synchronous batch-transformation pipeline: it holds
//! no state, performs no I/O, and reads no clock. The surrounding scheduling
//! and persistence layers feed it already-materialized tables and the current
//! wall-clock time, and upsert whatever it returns.

pub mod config;
pub mod core;
pub mod parsing;
pub mod services;
pub mod time;
pub mod transformations;

pub use crate::config::IndicatorConfig;
pub use crate::core::domain::{
    AnnotationRecord, HourlyProduction, IndicatorKind, IndicatorRecord, MachineStatus,
    ProductionRecord, ProductionWithQuality, QualityRecord, Shift, TelemetryRecord,
    UnifiedInterval,
};
pub use crate::core::errors::{AnalysisError, AnalysisResult};
pub use crate::services::indicators::IndicatorEngine;
pub use crate::services::pipeline::{AnalysisInputs, AnalysisOutputs, AnalysisPipeline};
pub use crate::services::projection::{convert_quality_volumes, project_hourly_production};
pub use crate::services::timeline::TimelineMerger;
