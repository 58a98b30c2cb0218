//! Frontend-facing projections: quality mass-to-tray conversion and the
//! hourly production board.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDateTime, Timelike};
use log::debug;

use crate::config::IndicatorConfig;
use crate::core::domain::{HourlyProduction, QualityRecord, TelemetryRecord};
use crate::core::errors::AnalysisResult;
use crate::services::round3;
use crate::time::parse_hora_registro;

/// Relative drift above which the product sensor is considered to have
/// missed trays within an hourly bucket.
const HOURLY_SENSOR_TOLERANCE: f64 = 0.25;

/// Trays per shipping box.
const TRAYS_PER_BOX: f64 = 10.0;

/// Converts the quality masses (kilograms) into tray counts.
///
/// The operator weighs the rejected trays bag and all; the count is the net
/// mass divided by the average tray mass. Values at or below zero collapse
/// to zero trays. Runs before [`super::production::join_quality_production`],
/// which aggregates the converted counts.
pub fn convert_quality_volumes(
    quality: &[QualityRecord],
    config: &IndicatorConfig,
) -> Vec<QualityRecord> {
    let to_trays = |mass: f64| -> f64 {
        if mass > 0.0 {
            (((mass - config.peso_saco) / config.peso_bandejas).round()).max(0.0)
        } else {
            mass.trunc().max(0.0)
        }
    };

    quality
        .iter()
        .map(|record| {
            let mut converted = record.clone();
            converted.bdj_vazias = record.bdj_vazias.map(round3).map(to_trays);
            converted.bdj_retrabalho = record.bdj_retrabalho.map(round3).map(to_trays);
            converted.descarte_paes = record.descarte_paes.map(round3);
            converted.descarte_paes_pasta = record.descarte_paes_pasta.map(round3);
            converted.descarte_pasta = record.descarte_pasta.map(round3);
            converted
        })
        .collect()
}

#[derive(Debug, Default, Clone, Copy)]
struct HourBucket {
    first_produzido: Option<f64>,
    last_produzido: Option<f64>,
    first_ciclos: Option<f64>,
    last_ciclos: Option<f64>,
}

impl HourBucket {
    fn push(&mut self, produzido: Option<f64>, ciclos: Option<f64>) {
        if let Some(p) = produzido {
            self.first_produzido.get_or_insert(p);
            self.last_produzido = Some(p);
        }
        if let Some(c) = ciclos {
            self.first_ciclos.get_or_insert(c);
            self.last_ciclos = Some(c);
        }
    }

    /// Boxes produced in this bucket: the delta of the cumulative product
    /// counter, replaced by the cycle counter delta when the sensor missed
    /// more than a quarter of the trays.
    fn boxes(&self) -> i64 {
        let produzido = match (self.first_produzido, self.last_produzido) {
            (Some(first), Some(last)) => last - first,
            _ => return 0,
        };
        let ciclos = match (self.first_ciclos, self.last_ciclos) {
            (Some(first), Some(last)) => Some(last - first),
            _ => None,
        };

        let total = match ciclos {
            Some(c) if c != 0.0 && (c - produzido) / c > HOURLY_SENSOR_TOLERANCE => c,
            _ => produzido,
        };
        (total.max(0.0) / TRAYS_PER_BOX).floor() as i64
    }
}

/// Builds the hourly production board from raw telemetry.
///
/// One row per machine and hour slot of the covered window, in boxes, plus a
/// `"Total"` row per machine. Only the packaging machines (`TMF` prefix) are
/// reported, but every machine's samples widen the hour grid.
pub fn project_hourly_production(
    telemetry: &[TelemetryRecord],
) -> AnalysisResult<Vec<HourlyProduction>> {
    let mut buckets: BTreeMap<(String, NaiveDateTime), HourBucket> = BTreeMap::new();

    let mut samples = Vec::new();
    for record in telemetry {
        let (Some(maquina_id), Some(data_registro), Some(hora_raw)) = (
            record.maquina_id.as_deref(),
            record.data_registro,
            record.hora_registro.as_deref(),
        ) else {
            continue;
        };
        let hora = parse_hora_registro(hora_raw, maquina_id)?;
        samples.push((
            maquina_id.to_string(),
            data_registro.and_time(hora),
            record.contagem_total_produzido,
            record.contagem_total_ciclos,
        ));
    }
    samples.sort_by(|a, b| (&a.0, a.1).cmp(&(&b.0, b.1)));

    for (maquina_id, data_hora, produzido, ciclos) in samples {
        let bucket_start = data_hora
            .date()
            .and_hms_opt(data_hora.hour(), 0, 0)
            .unwrap_or(data_hora);
        buckets
            .entry((maquina_id, bucket_start))
            .or_default()
            .push(produzido, ciclos);
    }

    if buckets.is_empty() {
        return Ok(Vec::new());
    }

    // Each machine contributes its full covered range to the shared grid, so
    // a machine that idled an hour still shows a zero row.
    let mut grid: BTreeSet<NaiveDateTime> = BTreeSet::new();
    let mut span: BTreeMap<&str, (NaiveDateTime, NaiveDateTime)> = BTreeMap::new();
    for (maquina_id, bucket_start) in buckets.keys() {
        span.entry(maquina_id.as_str())
            .and_modify(|(min, max)| {
                *min = (*min).min(*bucket_start);
                *max = (*max).max(*bucket_start);
            })
            .or_insert((*bucket_start, *bucket_start));
    }
    for (min, max) in span.values() {
        let mut hour = *min;
        while hour <= *max {
            grid.insert(hour);
            hour += chrono::Duration::hours(1);
        }
    }

    let machines: Vec<&str> = span
        .keys()
        .copied()
        .filter(|m| m.starts_with("TMF"))
        .collect();

    let mut rows = Vec::with_capacity(machines.len() * (grid.len() + 1));
    for maquina_id in machines {
        let mut machine_total = 0;
        for hour in &grid {
            let total = buckets
                .get(&(maquina_id.to_string(), *hour))
                .map(HourBucket::boxes)
                .unwrap_or(0);
            machine_total += total;
            rows.push(HourlyProduction {
                maquina_id: maquina_id.to_string(),
                intervalo: format!("{:02}hs - {:02}hs", hour.hour(), hour.hour() + 1),
                total,
            });
        }
        rows.push(HourlyProduction {
            maquina_id: maquina_id.to_string(),
            intervalo: "Total".to_string(),
            total: machine_total,
        });
    }

    debug!(
        "hourly projection: {} machines over {} hour slots",
        span.len(),
        grid.len()
    );
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn quality(vazias: f64, retrabalho: f64) -> QualityRecord {
        QualityRecord {
            recno: Some(1),
            linha: Some(1),
            maquina_id: Some("TMF001".to_string()),
            bdj_vazias: Some(vazias),
            bdj_retrabalho: Some(retrabalho),
            descarte_paes: Some(1.23456),
            data_registro: NaiveDate::from_ymd_opt(2024, 5, 1),
            hora_registro: Some("09:00:00".to_string()),
            ..QualityRecord::default()
        }
    }

    fn tel(maquina: &str, hora: &str, produzido: f64, ciclos: f64) -> TelemetryRecord {
        TelemetryRecord {
            maquina_id: Some(maquina.to_string()),
            contagem_total_produzido: Some(produzido),
            contagem_total_ciclos: Some(ciclos),
            data_registro: NaiveDate::from_ymd_opt(2024, 5, 1),
            hora_registro: Some(hora.to_string()),
            ..TelemetryRecord::default()
        }
    }

    #[test]
    fn converts_mass_to_tray_count() {
        // 0.640 kg: (0.640 - 0.080) / 0.028 = 20 trays.
        let converted = convert_quality_volumes(&[quality(0.64, 0.0)], &IndicatorConfig::default());
        assert_eq!(converted[0].bdj_vazias, Some(20.0));
        assert_eq!(converted[0].bdj_retrabalho, Some(0.0));
        // Discard masses are only rounded.
        assert_eq!(converted[0].descarte_paes, Some(1.235));
    }

    #[test]
    fn tray_count_never_negative() {
        // Below the bag mass the net count would be negative.
        let converted =
            convert_quality_volumes(&[quality(0.05, -1.2)], &IndicatorConfig::default());
        assert_eq!(converted[0].bdj_vazias, Some(0.0));
        assert_eq!(converted[0].bdj_retrabalho, Some(0.0));
    }

    #[test]
    fn missing_masses_pass_through() {
        let mut record = quality(0.64, 0.0);
        record.bdj_retrabalho = None;
        let converted = convert_quality_volumes(&[record], &IndicatorConfig::default());
        assert_eq!(converted[0].bdj_retrabalho, None);
    }

    #[test]
    fn hourly_totals_from_counter_deltas() {
        let telemetry = vec![
            tel("TMF001", "08:00:00", 100.0, 100.0),
            tel("TMF001", "08:30:00", 150.0, 150.0),
            tel("TMF001", "08:59:00", 220.0, 220.0),
            tel("TMF001", "09:10:00", 300.0, 300.0),
            tel("TMF001", "09:50:00", 340.0, 340.0),
        ];

        let rows = project_hourly_production(&telemetry).unwrap();
        assert_eq!(rows.len(), 3);
        // 120 trays in the 8h slot, 40 in the 9h slot.
        assert_eq!(rows[0].intervalo, "08hs - 09hs");
        assert_eq!(rows[0].total, 12);
        assert_eq!(rows[1].intervalo, "09hs - 10hs");
        assert_eq!(rows[1].total, 4);
        assert_eq!(rows[2].intervalo, "Total");
        assert_eq!(rows[2].total, 16);
    }

    #[test]
    fn falls_back_to_cycles_on_sensor_gap() {
        // Sensor counted 100 trays, cycles say 200: more than 25% missing.
        let telemetry = vec![
            tel("TMF001", "08:00:00", 0.0, 0.0),
            tel("TMF001", "08:59:00", 100.0, 200.0),
        ];

        let rows = project_hourly_production(&telemetry).unwrap();
        assert_eq!(rows[0].total, 20);
    }

    #[test]
    fn idle_hours_are_zero_filled() {
        let telemetry = vec![
            tel("TMF001", "08:10:00", 0.0, 0.0),
            tel("TMF001", "08:50:00", 100.0, 100.0),
            tel("TMF001", "10:10:00", 100.0, 100.0),
            tel("TMF001", "10:50:00", 200.0, 200.0),
        ];

        let rows = project_hourly_production(&telemetry).unwrap();
        let nine: Vec<_> = rows.iter().filter(|r| r.intervalo == "09hs - 10hs").collect();
        assert_eq!(nine.len(), 1);
        assert_eq!(nine[0].total, 0);
    }

    #[test]
    fn only_packaging_machines_are_reported() {
        let telemetry = vec![
            tel("TMF001", "08:00:00", 0.0, 0.0),
            tel("TMF001", "08:30:00", 100.0, 100.0),
            tel("FOR001", "08:00:00", 0.0, 0.0),
        ];

        let rows = project_hourly_production(&telemetry).unwrap();
        assert!(rows.iter().all(|r| r.maquina_id == "TMF001"));
    }

    #[test]
    fn empty_telemetry_yields_no_rows() {
        assert!(project_hourly_production(&[]).unwrap().is_empty());
    }

    #[test]
    fn counter_reset_clamps_to_zero() {
        let telemetry = vec![
            tel("TMF001", "08:00:00", 5000.0, 5000.0),
            tel("TMF001", "08:30:00", 100.0, 100.0),
        ];

        let rows = project_hourly_production(&telemetry).unwrap();
        assert_eq!(rows[0].total, 0);
    }
}
