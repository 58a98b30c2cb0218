//! Join of per-shift production aggregates with quality rejections.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use log::debug;

use crate::core::domain::{ProductionRecord, ProductionWithQuality, QualityRecord, Shift};
use crate::core::errors::{AnalysisError, AnalysisResult};
use crate::services::round3;
use crate::time::parse_hora_registro;

/// Tolerated relative drift between the cycle counter and the product sensor.
const SENSOR_TOLERANCE: f64 = 0.05;

#[derive(Debug, Default, Clone)]
struct QualityTotals {
    bdj_vazias: f64,
    bdj_retrabalho: f64,
    descarte_paes: f64,
    descarte_paes_pasta: f64,
    descarte_pasta: f64,
}

type QualityKey = (i64, String, NaiveDate, Shift);

/// Aggregates quality rejections per line/machine/day/shift. The shift is
/// derived from the entry's registration hour; rows missing any key field are
/// skipped.
fn aggregate_quality(quality: &[QualityRecord]) -> AnalysisResult<BTreeMap<QualityKey, QualityTotals>> {
    let mut totals: BTreeMap<QualityKey, QualityTotals> = BTreeMap::new();

    for record in quality {
        let (Some(linha), Some(maquina_id), Some(data_registro), Some(hora_raw)) = (
            record.linha,
            record.maquina_id.as_deref(),
            record.data_registro,
            record.hora_registro.as_deref(),
        ) else {
            continue;
        };

        let context = format!("{maquina_id}, {data_registro}");
        let hora = parse_hora_registro(hora_raw, &context)?;
        let turno = Shift::from_time(hora);

        let entry = totals
            .entry((linha, maquina_id.to_string(), data_registro, turno))
            .or_default();
        entry.bdj_vazias += record.bdj_vazias.unwrap_or(0.0);
        entry.bdj_retrabalho += record.bdj_retrabalho.unwrap_or(0.0);
        entry.descarte_paes += record.descarte_paes.unwrap_or(0.0);
        entry.descarte_paes_pasta += record.descarte_paes_pasta.unwrap_or(0.0);
        entry.descarte_pasta += record.descarte_pasta.unwrap_or(0.0);
    }

    for entry in totals.values_mut() {
        entry.bdj_vazias = round3(entry.bdj_vazias);
        entry.bdj_retrabalho = round3(entry.bdj_retrabalho);
        entry.descarte_paes = round3(entry.descarte_paes);
        entry.descarte_paes_pasta = round3(entry.descarte_paes_pasta);
        entry.descarte_pasta = round3(entry.descarte_pasta);
    }

    Ok(totals)
}

/// Left-joins quality rejections onto the production aggregates and
/// reconciles the produced total against sensor drift.
///
/// When the sensor undercounts by less than 5% of the cycle counter the
/// sensor reading is trusted (minus reworked trays); otherwise the produced
/// total is rebuilt from cycles minus empty and reworked trays. A zero cycle
/// counter always takes the cycle-based path.
pub fn join_quality_production(
    production: &[ProductionRecord],
    quality: &[QualityRecord],
) -> AnalysisResult<Vec<ProductionWithQuality>> {
    let quality_totals = aggregate_quality(quality)?;

    let mut joined = Vec::with_capacity(production.len());
    for record in production {
        let (Some(linha), Some(maquina_id), Some(turno_raw), Some(data_registro)) = (
            record.linha,
            record.maquina_id.as_deref(),
            record.turno.as_deref(),
            record.data_registro,
        ) else {
            continue;
        };

        let turno = Shift::from_wire(turno_raw).ok_or_else(|| {
            AnalysisError::parse(format!("turno `{turno_raw}` ({maquina_id}, {data_registro})"))
        })?;

        let totals = quality_totals
            .get(&(linha, maquina_id.to_string(), data_registro, turno))
            .cloned()
            .unwrap_or_default();

        let total_ciclos = record.total_ciclos.unwrap_or(0.0);
        let total_sensor = record.total_produzido_sensor.unwrap_or(0.0);

        let sensor_ok = total_ciclos != 0.0
            && (total_ciclos - total_sensor) / total_ciclos < SENSOR_TOLERANCE;
        let total_produzido = if sensor_ok {
            total_sensor - totals.bdj_retrabalho
        } else {
            total_ciclos - totals.bdj_vazias - totals.bdj_retrabalho
        };

        joined.push(ProductionWithQuality {
            linha,
            maquina_id: maquina_id.to_string(),
            turno,
            data_registro,
            produto: record.produto.clone(),
            total_ciclos: total_ciclos as i64,
            total_produzido_sensor: total_sensor as i64,
            bdj_vazias: totals.bdj_vazias as i64,
            bdj_retrabalho: totals.bdj_retrabalho as i64,
            descarte_paes: totals.descarte_paes,
            descarte_paes_pasta: totals.descarte_paes_pasta,
            descarte_pasta: totals.descarte_pasta,
            total_produzido: total_produzido as i64,
        });
    }

    joined.sort_by(|a, b| {
        (a.data_registro, a.linha, a.turno).cmp(&(b.data_registro, b.linha, b.turno))
    });

    debug!(
        "production join: {} production rows, {} quality groups",
        joined.len(),
        quality_totals.len()
    );
    Ok(joined)
}
