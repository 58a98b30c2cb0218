//! Cleaning of raw telemetry and annotation tables.
//!
//! Both streams go through the same shape of pass: drop exact duplicates,
//! validate that the mandatory columns exist at all, drop rows where a
//! mandatory value is missing, then normalize the remaining values into the
//! typed clean records. Blank or whitespace-only strings count as missing
//! throughout.

use std::collections::HashSet;

use crate::core::domain::{
    AnnotationRecord, CleanAnnotation, CleanTelemetry, MachineStatus, Shift, TelemetryRecord,
};
use crate::core::errors::{AnalysisError, AnalysisResult};
use crate::time::parse_hora_registro;

/// Normalizes an optional string column: trims, maps blanks to `None`.
fn normalize(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Drops rows that serialize to a payload already seen.
///
/// Duplicate submissions happen when the controller or the operator panel
/// retries a write; equality over the serialized row matches the upstream
/// dedup semantics exactly.
fn dedup<T: serde::Serialize + Clone>(records: &[T]) -> AnalysisResult<Vec<T>> {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(records.len());
    for record in records {
        let key = serde_json::to_string(record)
            .map_err(|e| AnalysisError::integrity(format!("unserializable record: {e}")))?;
        if seen.insert(key) {
            unique.push(record.clone());
        }
    }
    Ok(unique)
}

/// A mandatory column that is null on every record of a non-empty table means
/// the upstream query changed shape, not that the data is sparse.
fn require_column<T>(
    records: &[T],
    table: &str,
    column: &str,
    present: impl Fn(&T) -> bool,
) -> AnalysisResult<()> {
    if !records.is_empty() && !records.iter().any(present) {
        return Err(AnalysisError::validation(format!(
            "table `{table}` has no `{column}` values on any record"
        )));
    }
    Ok(())
}

/// Cleans the raw telemetry stream.
///
/// An empty input is a valid quiet period and yields an empty output. Rows
/// missing any mandatory field are dropped; malformed status, shift or time
/// values on surviving rows are parse errors, not drops.
pub fn clean_telemetry(records: &[TelemetryRecord]) -> AnalysisResult<Vec<CleanTelemetry>> {
    if records.is_empty() {
        return Ok(Vec::new());
    }

    let records = dedup(records)?;

    require_column(&records, "maquina_info", "maquina_id", |r: &TelemetryRecord| {
        normalize(&r.maquina_id).is_some()
    })?;
    require_column(&records, "maquina_info", "data_registro", |r| {
        r.data_registro.is_some()
    })?;
    require_column(&records, "maquina_info", "hora_registro", |r| {
        normalize(&r.hora_registro).is_some()
    })?;
    require_column(&records, "maquina_info", "status", |r| {
        normalize(&r.status).is_some()
    })?;

    let mut clean = Vec::with_capacity(records.len());
    for record in &records {
        let (Some(maquina_id), Some(data_registro), Some(hora_raw), Some(status_raw)) = (
            normalize(&record.maquina_id),
            record.data_registro,
            normalize(&record.hora_registro),
            normalize(&record.status),
        ) else {
            continue;
        };

        let context = format!("{maquina_id}, {data_registro}");
        let hora_registro = parse_hora_registro(&hora_raw, &context)?;

        let status = MachineStatus::from_flag(&status_raw).ok_or_else(|| {
            AnalysisError::parse(format!("status flag `{status_raw}` ({context})"))
        })?;

        let turno = match normalize(&record.turno) {
            Some(raw) => Shift::from_wire(&raw)
                .ok_or_else(|| AnalysisError::parse(format!("turno `{raw}` ({context})")))?,
            None => Shift::from_time(hora_registro),
        };

        clean.push(CleanTelemetry {
            maquina_id,
            status,
            produto: normalize(&record.produto),
            contagem_total_ciclos: record.contagem_total_ciclos.map(|v| v as i64),
            contagem_total_produzido: record.contagem_total_produzido.map(|v| v as i64),
            turno,
            data_registro,
            hora_registro,
        });
    }

    Ok(clean)
}

/// Operator badge numbers are stored zero-padded to six digits; an
/// all-zero badge is a placeholder and counts as absent.
fn normalize_operador(value: Option<String>) -> Option<String> {
    let raw = value?;
    let padded = match raw.parse::<i64>() {
        Ok(n) => format!("{n:06}"),
        Err(_) => raw,
    };
    if padded == "000000" {
        None
    } else {
        Some(padded)
    }
}

/// Cleans the raw annotation stream.
///
/// Splits backup-machine entries out of the equipment column: the operator
/// panel writes the backup machine number into `equipamento`, so an all-digit
/// value there is a backup reference, not equipment.
pub fn clean_annotations(records: &[AnnotationRecord]) -> AnalysisResult<Vec<CleanAnnotation>> {
    if records.is_empty() {
        return Ok(Vec::new());
    }

    let records = dedup(records)?;

    require_column(&records, "maquina_ihm", "maquina_id", |r: &AnnotationRecord| {
        normalize(&r.maquina_id).is_some()
    })?;
    require_column(&records, "maquina_ihm", "data_registro", |r| {
        r.data_registro.is_some()
    })?;
    require_column(&records, "maquina_ihm", "hora_registro", |r| {
        normalize(&r.hora_registro).is_some()
    })?;

    let mut clean = Vec::with_capacity(records.len());
    for record in &records {
        let (Some(maquina_id), Some(data_registro), Some(hora_raw)) = (
            normalize(&record.maquina_id),
            record.data_registro,
            normalize(&record.hora_registro),
        ) else {
            continue;
        };

        let linha = record.linha.unwrap_or(0);
        if linha == 0 {
            continue;
        }
        let fabrica = if (1..=9).contains(&linha) { 1 } else { 2 };

        let context = format!("{maquina_id}, {data_registro}");
        let hora_registro = parse_hora_registro(&hora_raw, &context)?;

        let mut equipamento = normalize(&record.equipamento);
        let mut s_backup = normalize(&record.s_backup);
        if let Some(equip) = &equipamento {
            if equip.chars().all(|c| c.is_ascii_digit()) {
                s_backup = Some(equip.clone());
                equipamento = None;
            }
        }

        let os_numero = normalize(&record.os_numero).filter(|v| v != "0");

        clean.push(CleanAnnotation {
            fabrica,
            linha,
            maquina_id,
            motivo: normalize(&record.motivo),
            equipamento,
            problema: normalize(&record.problema),
            causa: normalize(&record.causa),
            os_numero,
            operador_id: normalize_operador(normalize(&record.operador_id)),
            s_backup,
            afeta_eff: record.afeta_eff,
            data_registro,
            hora_registro,
        });
    }

    Ok(clean)
}
