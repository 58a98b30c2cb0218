//! End-to-end analysis pipeline, mirroring the scheduled batch run: timeline
//! reconciliation, quality conversion, production join and the three
//! indicator tables, all from one set of raw inputs.

use chrono::NaiveDateTime;
use log::info;

use crate::config::IndicatorConfig;
use crate::core::domain::{
    AnnotationRecord, IndicatorKind, IndicatorRecord, ProductionRecord, ProductionWithQuality,
    QualityRecord, TelemetryRecord, UnifiedInterval,
};
use crate::core::errors::AnalysisResult;
use crate::services::indicators::IndicatorEngine;
use crate::services::production::join_quality_production;
use crate::services::projection::convert_quality_volumes;
use crate::services::timeline::TimelineMerger;

/// Raw tables for one analysis window.
#[derive(Debug, Clone, Default)]
pub struct AnalysisInputs {
    pub telemetry: Vec<TelemetryRecord>,
    pub annotations: Vec<AnnotationRecord>,
    pub production: Vec<ProductionRecord>,
    pub quality: Vec<QualityRecord>,
}

/// Derived tables ready for upsert.
#[derive(Debug, Clone, Default)]
pub struct AnalysisOutputs {
    pub intervals: Vec<UnifiedInterval>,
    pub production: Vec<ProductionWithQuality>,
    pub eficiencia: Vec<IndicatorRecord>,
    pub performance: Vec<IndicatorRecord>,
    pub reparo: Vec<IndicatorRecord>,
}

/// Runs the full analysis for one window.
pub struct AnalysisPipeline {
    config: IndicatorConfig,
    merger: TimelineMerger,
    engine: IndicatorEngine,
}

impl Default for AnalysisPipeline {
    fn default() -> Self {
        Self::new(IndicatorConfig::default())
    }
}

impl AnalysisPipeline {
    pub fn new(config: IndicatorConfig) -> Self {
        let merger = TimelineMerger::new(&config);
        let engine = IndicatorEngine::new(config.clone());
        Self {
            config,
            merger,
            engine,
        }
    }

    /// Processes one window of raw tables.
    ///
    /// `now` bounds open intervals and decides which shifts are still
    /// running; the same value is threaded through every stage so a rerun
    /// over the same window reproduces the same outputs.
    pub fn run(&self, inputs: &AnalysisInputs, now: NaiveDateTime) -> AnalysisResult<AnalysisOutputs> {
        info!(
            "analysis run: {} telemetry, {} annotations, {} production, {} quality rows",
            inputs.telemetry.len(),
            inputs.annotations.len(),
            inputs.production.len(),
            inputs.quality.len()
        );

        let intervals = self
            .merger
            .merge(&inputs.annotations, &inputs.telemetry, now)?;

        let quality = convert_quality_volumes(&inputs.quality, &self.config);
        let production = join_quality_production(&inputs.production, &quality)?;

        let eficiencia =
            self.engine
                .create_indicators(&intervals, &production, IndicatorKind::Efficiency, now);
        let performance =
            self.engine
                .create_indicators(&intervals, &production, IndicatorKind::Performance, now);
        let reparo =
            self.engine
                .create_indicators(&intervals, &production, IndicatorKind::Repair, now);

        info!(
            "analysis run produced {} intervals, {} production rows, {} indicator rows",
            intervals.len(),
            production.len(),
            eficiencia.len() + performance.len() + reparo.len()
        );

        Ok(AnalysisOutputs {
            intervals,
            production,
            eficiencia,
            performance,
            reparo,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    fn inputs() -> AnalysisInputs {
        let telemetry = vec![
            TelemetryRecord {
                maquina_id: Some("TMF001".to_string()),
                status: Some("true".to_string()),
                produto: Some("PAO FORMA 500G".to_string()),
                turno: Some("MAT".to_string()),
                data_registro: Some(date()),
                hora_registro: Some("08:00:00".to_string()),
                ..TelemetryRecord::default()
            },
            TelemetryRecord {
                maquina_id: Some("TMF001".to_string()),
                status: Some("false".to_string()),
                turno: Some("MAT".to_string()),
                data_registro: Some(date()),
                hora_registro: Some("12:00:00".to_string()),
                ..TelemetryRecord::default()
            },
        ];
        let annotations = vec![AnnotationRecord {
            linha: Some(1),
            maquina_id: Some("TMF001".to_string()),
            motivo: Some("Refeição".to_string()),
            data_registro: Some(date()),
            hora_registro: Some("12:00:30".to_string()),
            ..AnnotationRecord::default()
        }];
        let production = vec![ProductionRecord {
            linha: Some(1),
            maquina_id: Some("TMF001".to_string()),
            turno: Some("MAT".to_string()),
            data_registro: Some(date()),
            produto: Some("PAO FORMA 500G".to_string()),
            total_ciclos: Some(5000.0),
            total_produzido_sensor: Some(4950.0),
        }];
        let quality = vec![QualityRecord {
            recno: Some(1),
            linha: Some(1),
            maquina_id: Some("TMF001".to_string()),
            bdj_vazias: Some(0.64),
            bdj_retrabalho: Some(0.0),
            data_registro: Some(date()),
            hora_registro: Some("11:00:00".to_string()),
            ..QualityRecord::default()
        }];

        AnalysisInputs {
            telemetry,
            annotations,
            production,
            quality,
        }
    }

    #[test]
    fn runs_all_stages() {
        let now = date().and_hms_opt(13, 0, 0).unwrap();
        let outputs = AnalysisPipeline::default().run(&inputs(), now).unwrap();

        assert_eq!(outputs.intervals.len(), 2);
        assert_eq!(outputs.production.len(), 1);
        assert_eq!(outputs.eficiencia.len(), 1);
        assert_eq!(outputs.performance.len(), 1);
        assert_eq!(outputs.reparo.len(), 1);

        // Quality masses were converted before the join.
        assert_eq!(outputs.production[0].bdj_vazias, 20);
        // Sensor within tolerance: sensor reading minus rework.
        assert_eq!(outputs.production[0].total_produzido, 4950);

        let eff = &outputs.eficiencia[0];
        assert_eq!(eff.indicador, IndicatorKind::Efficiency);
        // Lunch stop discounts 60 of the 300 elapsed minutes.
        assert_eq!(eff.desconto, 60);
        assert_eq!(eff.tempo_esperado, 240);
    }

    #[test]
    fn rerun_is_reproducible() {
        let now = date().and_hms_opt(13, 0, 0).unwrap();
        let pipeline = AnalysisPipeline::default();
        let first = pipeline.run(&inputs(), now).unwrap();
        let second = pipeline.run(&inputs(), now).unwrap();

        assert_eq!(first.intervals, second.intervals);
        assert_eq!(first.production, second.production);
        assert_eq!(first.eficiencia, second.eficiencia);
    }

    #[test]
    fn empty_window_produces_empty_tables() {
        let now = date().and_hms_opt(13, 0, 0).unwrap();
        let outputs = AnalysisPipeline::default()
            .run(&AnalysisInputs::default(), now)
            .unwrap();

        assert!(outputs.intervals.is_empty());
        assert!(outputs.production.is_empty());
        assert!(outputs.eficiencia.is_empty());
    }
}
