//! JSON table parsing.

use serde::de::DeserializeOwned;

use crate::core::domain::{
    AnnotationRecord, ProductionRecord, ProductionWithQuality, QualityRecord, TelemetryRecord,
    UnifiedInterval,
};
use crate::core::errors::{AnalysisError, AnalysisResult};

fn parse_table<T: DeserializeOwned>(json: &str, table: &str) -> AnalysisResult<Vec<T>> {
    let mut deserializer = serde_json::Deserializer::from_str(json);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
        AnalysisError::parse(format!(
            "table `{table}` at `{}`: {}",
            e.path(),
            e.inner()
        ))
    })
}

/// Parses the raw telemetry table (`maquina_info`).
pub fn parse_telemetry_json(json: &str) -> AnalysisResult<Vec<TelemetryRecord>> {
    parse_table(json, "maquina_info")
}

/// Parses the raw annotation table (`maquina_ihm`).
pub fn parse_annotations_json(json: &str) -> AnalysisResult<Vec<AnnotationRecord>> {
    parse_table(json, "maquina_ihm")
}

/// Parses the per-shift production table.
pub fn parse_production_json(json: &str) -> AnalysisResult<Vec<ProductionRecord>> {
    parse_table(json, "maquina_info_production")
}

/// Parses the quality-rejection table (`qualidade_ihm`).
pub fn parse_quality_json(json: &str) -> AnalysisResult<Vec<QualityRecord>> {
    parse_table(json, "qualidade_ihm")
}

/// Parses previously persisted unified intervals (`analysis_info_ihm`),
/// refetched by the scheduler when computing indicators.
pub fn parse_intervals_json(json: &str) -> AnalysisResult<Vec<UnifiedInterval>> {
    parse_table(json, "analysis_info_ihm")
}

/// Parses previously persisted production-with-quality rows
/// (`analysis_production`).
pub fn parse_production_quality_json(json: &str) -> AnalysisResult<Vec<ProductionWithQuality>> {
    parse_table(json, "analysis_production")
}
