//! Timeline reconciliation: merges the dense telemetry stream with the sparse
//! operator annotations into collapsed machine-state intervals.
//!
//! The merge walks several passes over a per-row event sequence:
//!
//! 1. nearest-timestamp match of annotations onto telemetry, per machine,
//!    within a fixed tolerance;
//! 2. line/factory backfill for telemetry rows that never matched;
//! 3. segmentation on status, machine or shift changes;
//! 4. annotation spreading within each segment, then re-segmentation on
//!    annotation changes;
//! 5. collapse to one interval per segment, with the end bound taken from the
//!    next segment's start (or "now" for the open tail).

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use log::debug;

use crate::config::IndicatorConfig;
use crate::core::domain::{
    AnnotationRecord, CleanAnnotation, CleanTelemetry, MachineStatus, Shift, TelemetryRecord,
    UnifiedInterval,
};
use crate::core::errors::AnalysisResult;
use crate::time::floor_to_second;
use crate::transformations::{clean_annotations, clean_telemetry};

/// Maximum distance between a telemetry sample and the operator annotation
/// that describes it (2m10s, matching the panel's write latency).
const MATCH_TOLERANCE_SECONDS: i64 = 130;

/// One telemetry row with its (possibly absent) matched annotation and the
/// segmentation bookkeeping threaded through the passes.
#[derive(Debug, Clone)]
struct MergedEvent {
    fabrica: Option<i64>,
    linha: Option<i64>,
    maquina_id: String,
    turno: Shift,
    status: MachineStatus,
    data_registro: NaiveDate,
    hora_registro: NaiveTime,
    motivo: Option<String>,
    equipamento: Option<String>,
    problema: Option<String>,
    causa: Option<String>,
    os_numero: Option<String>,
    operador_id: Option<String>,
    s_backup: Option<String>,
    afeta_eff: Option<i64>,
    data_registro_ihm: Option<NaiveDate>,
    hora_registro_ihm: Option<NaiveTime>,
    data_hora: NaiveDateTime,
    maquina_change: bool,
    change: bool,
    group: usize,
}

/// Merges annotations and telemetry into the unified stoppage timeline.
pub struct TimelineMerger {
    not_eff: Vec<String>,
}

impl TimelineMerger {
    pub fn new(config: &IndicatorConfig) -> Self {
        Self {
            not_eff: config.not_eff.clone(),
        }
    }

    /// Produces the collapsed interval timeline for the given raw streams.
    ///
    /// `now` bounds the open tail interval of each machine; it is injected so
    /// reprocessing a past window gives reproducible results.
    pub fn merge(
        &self,
        annotations: &[AnnotationRecord],
        telemetry: &[TelemetryRecord],
        now: NaiveDateTime,
    ) -> AnalysisResult<Vec<UnifiedInterval>> {
        let ihm = clean_annotations(annotations)?;
        let info = clean_telemetry(telemetry)?;

        // A quiet window on either stream leaves nothing to reconcile.
        if ihm.is_empty() || info.is_empty() {
            debug!(
                "timeline merge skipped: {} annotations, {} telemetry rows",
                ihm.len(),
                info.len()
            );
            return Ok(Vec::new());
        }

        let mut events = merge_nearest(&info, &ihm);
        fill_line_factory(&mut events, &ihm);
        self.flag_afeta_eff(&mut events);

        events.sort_by(|a, b| {
            let ka = (a.linha.is_none(), a.linha, a.data_registro, a.hora_registro);
            let kb = (b.linha.is_none(), b.linha, b.data_registro, b.hora_registro);
            ka.cmp(&kb)
        });

        detect_status_changes(&mut events);
        fill_annotation_groups(&mut events);
        detect_annotation_changes(&mut events);

        let intervals = collapse_groups(&events, now);
        debug!(
            "timeline merge: {} telemetry rows collapsed into {} intervals",
            events.len(),
            intervals.len()
        );
        Ok(intervals)
    }

    /// Stoppage reasons on the exclusion list never count against efficiency.
    fn flag_afeta_eff(&self, events: &mut [MergedEvent]) {
        let excluded = |value: &Option<String>| {
            value
                .as_deref()
                .is_some_and(|v| self.not_eff.iter().any(|e| e == v))
        };
        for event in events {
            if excluded(&event.motivo) || excluded(&event.causa) || excluded(&event.problema) {
                event.afeta_eff = Some(1);
            }
        }
    }
}

/// Nearest-timestamp join of annotations onto telemetry, per machine, within
/// [`MATCH_TOLERANCE_SECONDS`]. Telemetry rows without a close enough
/// annotation keep empty annotation fields.
fn merge_nearest(info: &[CleanTelemetry], ihm: &[CleanAnnotation]) -> Vec<MergedEvent> {
    let mut by_machine: HashMap<&str, Vec<&CleanAnnotation>> = HashMap::new();
    for annotation in ihm {
        by_machine
            .entry(annotation.maquina_id.as_str())
            .or_default()
            .push(annotation);
    }
    for annotations in by_machine.values_mut() {
        annotations.sort_by_key(|a| a.data_hora());
    }

    let mut info_sorted: Vec<&CleanTelemetry> = info.iter().collect();
    info_sorted.sort_by_key(|t| t.data_hora());

    info_sorted
        .into_iter()
        .map(|sample| {
            let matched = by_machine
                .get(sample.maquina_id.as_str())
                .and_then(|candidates| nearest_within(candidates, sample.data_hora()));

            let mut event = MergedEvent {
                fabrica: None,
                linha: None,
                maquina_id: sample.maquina_id.clone(),
                turno: sample.turno,
                status: sample.status,
                data_registro: sample.data_registro,
                hora_registro: sample.hora_registro,
                motivo: None,
                equipamento: None,
                problema: None,
                causa: None,
                os_numero: None,
                operador_id: None,
                s_backup: None,
                afeta_eff: None,
                data_registro_ihm: None,
                hora_registro_ihm: None,
                data_hora: sample.data_hora(),
                maquina_change: false,
                change: false,
                group: 0,
            };

            if let Some(annotation) = matched {
                event.fabrica = Some(annotation.fabrica);
                event.linha = Some(annotation.linha);
                event.motivo = annotation.motivo.clone();
                event.equipamento = annotation.equipamento.clone();
                event.problema = annotation.problema.clone();
                event.causa = annotation.causa.clone();
                event.os_numero = annotation.os_numero.clone();
                event.operador_id = annotation.operador_id.clone();
                event.s_backup = annotation.s_backup.clone();
                event.afeta_eff = annotation.afeta_eff;
                event.data_registro_ihm = Some(annotation.data_registro);
                event.hora_registro_ihm = Some(annotation.hora_registro);
            }

            event
        })
        .collect()
}

/// Closest annotation by absolute time distance, if any lies within the
/// tolerance. `candidates` must be sorted by timestamp.
fn nearest_within<'a>(
    candidates: &[&'a CleanAnnotation],
    at: NaiveDateTime,
) -> Option<&'a CleanAnnotation> {
    let idx = candidates.partition_point(|a| a.data_hora() < at);
    let mut best: Option<(&'a CleanAnnotation, i64)> = None;
    for i in idx.checked_sub(1).into_iter().chain(std::iter::once(idx)) {
        let Some(candidate) = candidates.get(i).copied() else {
            continue;
        };
        let distance = (candidate.data_hora() - at).num_seconds().abs();
        if distance <= MATCH_TOLERANCE_SECONDS && best.is_none_or(|(_, d)| distance < d) {
            best = Some((candidate, distance));
        }
    }
    best.map(|(a, _)| a)
}

/// Backfills line and factory on unmatched telemetry rows from the machine →
/// line association the annotations carry. The association is not
/// date-aware: a machine that moved lines mid-window keeps its most recent
/// line for the whole window.
fn fill_line_factory(events: &mut [MergedEvent], ihm: &[CleanAnnotation]) {
    let mut lines: HashMap<&str, (i64, i64)> = HashMap::new();
    for annotation in ihm {
        lines.insert(
            annotation.maquina_id.as_str(),
            (annotation.linha, annotation.fabrica),
        );
    }

    for event in events {
        if event.linha.is_none() {
            if let Some(&(linha, fabrica)) = lines.get(event.maquina_id.as_str()) {
                event.linha = Some(linha);
                event.fabrica = Some(fabrica);
            }
        }
    }
}

/// First segmentation: a new group starts whenever status, machine or shift
/// changes from the previous row.
fn detect_status_changes(events: &mut [MergedEvent]) {
    let flags: Vec<(bool, bool)> = (0..events.len())
        .map(|i| {
            if i == 0 {
                return (true, true);
            }
            let (prev, cur) = (&events[i - 1], &events[i]);
            let maquina_change = cur.maquina_id != prev.maquina_id;
            let change =
                cur.status != prev.status || maquina_change || cur.turno != prev.turno;
            (change, maquina_change)
        })
        .collect();

    let mut group = 0;
    for (event, (change, maquina_change)) in events.iter_mut().zip(flags) {
        event.maquina_change = maquina_change;
        event.change = change;
        if change {
            group += 1;
        }
        event.group = group;
    }
}

macro_rules! fill_within {
    ($events:expr, $range:expr, [$($field:ident),+ $(,)?]) => {
        $(
            {
                let mut carry = None;
                for i in $range.clone() {
                    match &$events[i].$field {
                        Some(value) => carry = Some(value.clone()),
                        None => $events[i].$field = carry.clone(),
                    }
                }
                let mut carry = None;
                for i in $range.clone().rev() {
                    match &$events[i].$field {
                        Some(value) => carry = Some(value.clone()),
                        None => $events[i].$field = carry.clone(),
                    }
                }
            }
        )+
    };
}

/// Spreads annotation fields across each segment (forward then backward), so
/// a single operator entry describes the whole stoppage it was written for.
/// Running rows carry no stoppage annotation at all.
fn fill_annotation_groups(events: &mut [MergedEvent]) {
    let mut start = 0;
    while start < events.len() {
        let group = events[start].group;
        let mut end = start;
        while end < events.len() && events[end].group == group {
            end += 1;
        }

        fill_within!(
            events,
            (start..end),
            [
                motivo,
                equipamento,
                problema,
                causa,
                os_numero,
                operador_id,
                s_backup,
                data_registro_ihm,
                hora_registro_ihm,
                afeta_eff,
            ]
        );

        start = end;
    }

    for event in events.iter_mut() {
        if event.status == MachineStatus::Running {
            event.motivo = None;
            event.equipamento = None;
            event.problema = None;
            event.causa = None;
            event.os_numero = None;
            event.operador_id = None;
            event.s_backup = None;
            event.data_registro_ihm = None;
            event.hora_registro_ihm = None;
            event.afeta_eff = None;
        }
        event.afeta_eff = Some(event.afeta_eff.unwrap_or(0));
    }
}

/// Second segmentation: splits segments further when the annotation itself
/// changes mid-stoppage (reason, cause, efficiency flag or the annotation
/// timestamp, which catches corrected re-submissions).
fn detect_annotation_changes(events: &mut [MergedEvent]) {
    let flags: Vec<bool> = (0..events.len())
        .map(|i| {
            if i == 0 {
                return true;
            }
            let (prev, cur) = (&events[i - 1], &events[i]);
            (cur.motivo != prev.motivo && cur.motivo.is_some())
                || (cur.causa != prev.causa && cur.causa.is_some())
                || cur.afeta_eff != prev.afeta_eff
                || (cur.hora_registro_ihm != prev.hora_registro_ihm
                    && cur.hora_registro_ihm.is_some())
        })
        .collect();

    let mut group = 0;
    for (event, motivo_change) in events.iter_mut().zip(flags) {
        event.change = event.change || motivo_change;
        if event.change {
            group += 1;
        }
        event.group = group;
    }
}

/// Collapses each segment to one interval, bounds it, and applies the final
/// row-level corrections.
fn collapse_groups(events: &[MergedEvent], now: NaiveDateTime) -> Vec<UnifiedInterval> {
    let mut heads: Vec<&MergedEvent> = Vec::new();
    for event in events {
        if heads.last().map(|h| h.group) != Some(event.group) {
            heads.push(event);
        }
    }

    let now = floor_to_second(now);
    let mut intervals = Vec::with_capacity(heads.len());
    for (i, head) in heads.iter().enumerate() {
        // The next segment bounds this one unless it belongs to another
        // machine; the open tail is bounded by "now".
        let data_hora_final = match heads.get(i + 1) {
            Some(next) if !next.maquina_change => next.data_hora,
            _ => now,
        };

        let minutes = (data_hora_final - head.data_hora).num_seconds() as f64 / 60.0;
        let mut tempo = (minutes.round() as i64).clamp(0, 480);
        // 478 minutes is a full shift that lost two minutes to bounding.
        if tempo == 478 {
            tempo = 480;
        }

        let fabrica = head.fabrica.unwrap_or(0).max(0);
        if !(1..=14).contains(&fabrica) {
            continue;
        }

        let backup_exit = head.motivo.as_deref() == Some("Saída para Backup");
        let s_backup = if backup_exit { head.s_backup.clone() } else { None };
        let problema = if backup_exit {
            Some("Parada Planejada".to_string())
        } else {
            head.problema.clone()
        };
        let causa = if backup_exit {
            Some("Backup".to_string())
        } else {
            head.causa.clone()
        };

        intervals.push(UnifiedInterval {
            fabrica,
            linha: head.linha.unwrap_or(0),
            maquina_id: head.maquina_id.clone(),
            turno: head.turno,
            status: head.status,
            data_registro: head.data_registro,
            hora_registro: head.hora_registro,
            motivo: head.motivo.clone(),
            equipamento: head.equipamento.clone(),
            problema,
            causa,
            os_numero: head.os_numero.clone(),
            operador_id: head.operador_id.clone(),
            data_registro_ihm: head.data_registro_ihm.unwrap_or(head.data_registro),
            hora_registro_ihm: head.hora_registro_ihm.unwrap_or(head.hora_registro),
            s_backup,
            data_hora: head.data_hora,
            data_hora_final,
            tempo,
            afeta_eff: head.afeta_eff.unwrap_or(0),
        });
    }

    intervals
}
