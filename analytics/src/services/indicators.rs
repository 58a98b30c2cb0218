//! Production indicator computation (efficiency, performance, repair).
//!
//! Each indicator is derived from the stopped intervals of the unified
//! timeline: stoppage minutes are discounted according to the indicator's
//! policy, aggregated per machine/line/day/shift and scored against the
//! production aggregates.

use std::collections::{HashMap, HashSet};

use chrono::{NaiveDate, NaiveDateTime};
use log::debug;

use crate::config::IndicatorConfig;
use crate::core::domain::{
    IndicatorKind, IndicatorRecord, MachineStatus, ProductionWithQuality, Shift, UnifiedInterval,
};
use crate::services::round3;
use crate::time::{elapsed_shift_minutes, SHIFT_MINUTES};

/// Stoppage causes that mark a whole shift as planned downtime when they
/// cover (almost) the full shift.
const PLANNED_CAUSES: [&str; 2] = ["Sem Produção", "Backup"];

#[derive(Debug, Default, Clone, Copy)]
struct StopTotals {
    tempo: i64,
    desconto: i64,
    excedente: i64,
}

type StopKey = (String, i64, NaiveDate, Shift);

/// Computes the three production indicators from timeline and production
/// data.
pub struct IndicatorEngine {
    config: IndicatorConfig,
}

impl IndicatorEngine {
    pub fn new(config: IndicatorConfig) -> Self {
        Self { config }
    }

    /// Computes one indicator table.
    ///
    /// `now` decides whether a row covers a still-running shift (scored
    /// against the elapsed window) or a concluded one (against the full
    /// shift).
    pub fn create_indicators(
        &self,
        info: &[UnifiedInterval],
        production: &[ProductionWithQuality],
        kind: IndicatorKind,
        now: NaiveDateTime,
    ) -> Vec<IndicatorRecord> {
        let stops: Vec<&UnifiedInterval> = info
            .iter()
            .filter(|i| i.status == MachineStatus::Stopped)
            .collect();

        // Full-shift planned stoppages void performance and repair scoring
        // for the whole line/shift.
        let mut planned: HashSet<(NaiveDate, Shift, i64)> = HashSet::new();
        if kind != IndicatorKind::Efficiency {
            for stop in &stops {
                let planned_cause = stop
                    .causa
                    .as_deref()
                    .is_some_and(|c| PLANNED_CAUSES.contains(&c));
                if planned_cause && stop.tempo >= 478 {
                    planned.insert((stop.data_registro, stop.turno, stop.linha));
                }
            }
        }

        let totals = self.discount_and_aggregate(&stops, kind);

        let mut records = Vec::with_capacity(production.len());
        for prod in production {
            let key = (
                prod.maquina_id.clone(),
                prod.linha,
                prod.data_registro,
                prod.turno,
            );
            let stop = totals.get(&key).copied().unwrap_or_default();

            // Still-running shifts are scored against the elapsed window
            // only, concluded shifts against the full 480 minutes.
            let base = if prod.data_registro == now.date() {
                (elapsed_shift_minutes(prod.turno, now) - stop.desconto as f64).floor() as i64
            } else {
                SHIFT_MINUTES - stop.desconto
            };
            let tempo_esperado = base.max(1);

            let mut record = IndicatorRecord {
                fabrica: if (1..=9).contains(&prod.linha) { 1 } else { 2 },
                linha: prod.linha,
                maquina_id: prod.maquina_id.clone(),
                turno: prod.turno,
                data_registro: prod.data_registro,
                tempo: stop.tempo,
                desconto: stop.desconto,
                excedente: stop.excedente,
                tempo_esperado,
                total_produzido: None,
                producao_esperada: None,
                indicador: kind,
                valor: 0.0,
            };

            match kind {
                IndicatorKind::Efficiency => {
                    self.adjust_efficiency(&mut record, prod);
                }
                IndicatorKind::Performance | IndicatorKind::Repair => {
                    adjust_ratio(&mut record, &planned);
                }
            }

            records.push(record);
        }

        debug!(
            "{} indicator: {} stop groups, {} production rows",
            kind,
            totals.len(),
            records.len()
        );
        records
    }

    /// Applies the per-interval discount policy for `kind` and sums the
    /// result per machine/line/day/shift.
    fn discount_and_aggregate(
        &self,
        stops: &[&UnifiedInterval],
        kind: IndicatorKind,
    ) -> HashMap<StopKey, StopTotals> {
        let skip_list = self.config.skip_list(kind);
        let schedule = self.config.discount_schedule(kind);

        let mut totals: HashMap<StopKey, StopTotals> = HashMap::new();
        for stop in stops {
            let fields = [
                stop.motivo.as_deref(),
                stop.problema.as_deref(),
                stop.causa.as_deref(),
            ];
            let skipped = fields
                .iter()
                .flatten()
                .any(|value| skip_list.iter().any(|s| s == value));

            // Repair scores only the maintenance-related stops; the other
            // two exclude them.
            let selected = match kind {
                IndicatorKind::Efficiency => true,
                IndicatorKind::Performance => !skipped,
                IndicatorKind::Repair => skipped,
            };
            if !selected {
                continue;
            }

            let mut desconto = if skipped && kind != IndicatorKind::Repair {
                stop.tempo
            } else {
                0
            };

            // Ordered schedule: a later matching entry overwrites an
            // earlier one.
            for (needle, minutes) in schedule {
                let needle = needle.to_lowercase();
                let matched = fields
                    .iter()
                    .flatten()
                    .any(|value| value.to_lowercase().contains(&needle));
                if matched {
                    desconto = *minutes;
                }
            }

            desconto = desconto.min(stop.tempo);
            if stop.afeta_eff == 1 {
                desconto = stop.tempo;
            }
            let excedente = (stop.tempo - desconto).max(0);

            let entry = totals
                .entry((
                    stop.maquina_id.clone(),
                    stop.linha,
                    stop.data_registro,
                    stop.turno,
                ))
                .or_default();
            entry.tempo += stop.tempo;
            entry.desconto += desconto;
            entry.excedente += excedente;
        }

        totals
    }

    /// Efficiency: produced units against the expected output of the
    /// discounted window.
    fn adjust_efficiency(&self, record: &mut IndicatorRecord, prod: &ProductionWithQuality) {
        let cycles = self.config.expected_cycles(prod.produto.as_deref());
        // Two trays leave the machine per cycle.
        let esperada = (record.tempo_esperado as f64 * cycles * 2.0).round() as i64;
        let produzido = prod.total_produzido;

        let mut valor = if esperada != 0 {
            round3(produzido as f64 / esperada as f64)
        } else {
            0.0
        };
        if !valor.is_finite() || valor < 0.0 {
            valor = 0.0;
        }

        record.total_produzido = Some(produzido);
        record.producao_esperada = Some(esperada);

        // Windows too short to score, and fully discounted shifts.
        if record.tempo_esperado <= 10 || record.desconto == 480 {
            record.tempo_esperado = 0;
            record.producao_esperada = Some(0);
            valor = 0.0;
        }

        // Early-shift spikes are capped before the general clip.
        if valor > 1.2 && record.tempo_esperado < 15 {
            valor = 1.2;
        }
        valor = valor.clamp(0.0, 1.5);

        // A line idle with nothing produced and nothing discounted must
        // still weigh on the aggregate, so it gets a floor value.
        if record.desconto < 5 && produzido < 20 && valor == 0.0 {
            valor = 0.01;
        }

        record.valor = valor;
    }
}

/// Performance and repair: excess stoppage minutes against the expected
/// window, voided for planned full-shift stoppages.
fn adjust_ratio(record: &mut IndicatorRecord, planned: &HashSet<(NaiveDate, Shift, i64)>) {
    let mut valor = if record.tempo_esperado != 0 {
        round3(record.excedente as f64 / record.tempo_esperado as f64)
    } else {
        0.0
    };
    if !valor.is_finite() {
        valor = 0.0;
    }

    if planned.contains(&(record.data_registro, record.turno, record.linha)) {
        valor = 0.0;
        record.tempo_esperado = 0;
    }

    record.valor = valor.clamp(0.0, 1.0);
}
