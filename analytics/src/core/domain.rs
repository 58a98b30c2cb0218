//! Domain models for machine telemetry, stoppage annotations and derived
//! indicators.
//!
//! Boundary records mirror the column names of the tables the excluded
//! persistence/API layer supplies (`maquina_info`, `maquina_ihm`,
//! `qualidade_ihm`, production aggregates); derived records mirror the tables
//! it upserts (`analysis_info_ihm`, `analysis_production` and the three
//! indicator tables).

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// One of the three fixed 8-hour production shifts.
///
/// Wire names follow the plant convention: `NOT` (00-08), `MAT` (08-16),
/// `VES` (16-24).
///
/// # Examples
///
/// ```
/// use sfm_analytics::core::domain::Shift;
///
/// assert_eq!(Shift::from_hour(7), Shift::Night);
/// assert_eq!(Shift::from_hour(8), Shift::Morning);
/// assert_eq!(Shift::from_hour(23), Shift::Evening);
/// assert_eq!(Shift::Morning.start_hour(), 8);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Shift {
    #[serde(rename = "NOT")]
    Night,
    #[serde(rename = "MAT")]
    Morning,
    #[serde(rename = "VES")]
    Evening,
}

impl Shift {
    /// Parses the three-letter wire name.
    pub fn from_wire(value: &str) -> Option<Shift> {
        match value {
            "NOT" => Some(Shift::Night),
            "MAT" => Some(Shift::Morning),
            "VES" => Some(Shift::Evening),
            _ => None,
        }
    }

    /// Derives the shift from an hour of day (`hour / 8`).
    pub fn from_hour(hour: u32) -> Shift {
        match hour / 8 {
            0 => Shift::Night,
            1 => Shift::Morning,
            _ => Shift::Evening,
        }
    }

    /// Derives the shift from a time-of-day value.
    pub fn from_time(time: NaiveTime) -> Shift {
        Shift::from_hour(time.hour())
    }

    /// Hour at which this shift starts (0, 8 or 16).
    pub fn start_hour(self) -> u32 {
        match self {
            Shift::Night => 0,
            Shift::Morning => 8,
            Shift::Evening => 16,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Shift::Night => "NOT",
            Shift::Morning => "MAT",
            Shift::Evening => "VES",
        }
    }
}

impl fmt::Display for Shift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Semantic machine state, mapped from the telemetry boolean status flag
/// (`"true"` → running, `"false"` → stopped).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MachineStatus {
    #[serde(rename = "rodando")]
    Running,
    #[serde(rename = "parada")]
    Stopped,
}

impl MachineStatus {
    /// Parses the raw telemetry flag.
    pub fn from_flag(value: &str) -> Option<MachineStatus> {
        match value {
            "true" => Some(MachineStatus::Running),
            "false" => Some(MachineStatus::Stopped),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MachineStatus::Running => "rodando",
            MachineStatus::Stopped => "parada",
        }
    }
}

impl fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three production indicators derived from the unified timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndicatorKind {
    #[serde(rename = "eficiencia")]
    Efficiency,
    #[serde(rename = "performance")]
    Performance,
    #[serde(rename = "reparo")]
    Repair,
}

impl IndicatorKind {
    /// Column name used for the indicator value in the persisted tables.
    pub fn column_name(self) -> &'static str {
        match self {
            IndicatorKind::Efficiency => "eficiencia",
            IndicatorKind::Performance => "performance",
            IndicatorKind::Repair => "reparo",
        }
    }
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

/// Accepts identifier columns that arrive either as strings or as numbers,
/// depending on which upstream serializer produced the table.
fn deserialize_flexible_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        Text(String),
        Int(i64),
        Float(f64),
    }

    let value = Option::<StringOrNumber>::deserialize(deserializer)?;
    Ok(value.map(|v| match v {
        StringOrNumber::Text(s) => s,
        StringOrNumber::Int(i) => i.to_string(),
        StringOrNumber::Float(f) => (f as i64).to_string(),
    }))
}

/// Accepts integer columns that arrive as integers, floats or numeric
/// strings.
fn deserialize_flexible_int<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IntLike {
        Int(i64),
        Float(f64),
        Text(String),
    }

    match Option::<IntLike>::deserialize(deserializer)? {
        None => Ok(None),
        Some(IntLike::Int(i)) => Ok(Some(i)),
        Some(IntLike::Float(f)) => Ok(Some(f as i64)),
        Some(IntLike::Text(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed
                .parse::<f64>()
                .map(|f| Some(f as i64))
                .map_err(|_| D::Error::custom(format!("invalid integer value `{s}`")))
        }
    }
}

/// Raw machine-controller telemetry row (`maquina_info` table).
///
/// Sampled at high frequency; identical consecutive statuses are common and
/// collapsed later by the timeline merger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryRecord {
    #[serde(deserialize_with = "deserialize_flexible_id")]
    pub maquina_id: Option<String>,
    pub status: Option<String>,
    pub produto: Option<String>,
    pub ciclo_1_min: Option<f64>,
    pub ciclo_15_min: Option<f64>,
    pub contagem_total_ciclos: Option<f64>,
    pub contagem_total_produzido: Option<f64>,
    pub turno: Option<String>,
    pub data_registro: Option<NaiveDate>,
    pub hora_registro: Option<String>,
}

/// Raw operator-entered stoppage annotation row (`maquina_ihm` table).
///
/// Sparse and event-driven: rows appear only when an operator registers a
/// state change or corrects a previous entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationRecord {
    #[serde(deserialize_with = "deserialize_flexible_int")]
    pub linha: Option<i64>,
    #[serde(deserialize_with = "deserialize_flexible_id")]
    pub maquina_id: Option<String>,
    pub motivo: Option<String>,
    pub equipamento: Option<String>,
    pub problema: Option<String>,
    pub causa: Option<String>,
    #[serde(deserialize_with = "deserialize_flexible_id")]
    pub os_numero: Option<String>,
    #[serde(deserialize_with = "deserialize_flexible_id")]
    pub operador_id: Option<String>,
    pub s_backup: Option<String>,
    #[serde(deserialize_with = "deserialize_flexible_int")]
    pub afeta_eff: Option<i64>,
    pub data_registro: Option<NaiveDate>,
    pub hora_registro: Option<String>,
}

/// Raw per-shift production aggregate (last cumulative counters per
/// machine/shift/day, as produced by the upstream period query).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductionRecord {
    #[serde(deserialize_with = "deserialize_flexible_int")]
    pub linha: Option<i64>,
    #[serde(deserialize_with = "deserialize_flexible_id")]
    pub maquina_id: Option<String>,
    pub turno: Option<String>,
    pub data_registro: Option<NaiveDate>,
    pub produto: Option<String>,
    pub total_ciclos: Option<f64>,
    pub total_produzido_sensor: Option<f64>,
}

/// Raw quality-rejection row (`qualidade_ihm` table).
///
/// The tray columns (`bdj_*`) arrive as masses in kilograms and are converted
/// to tray counts by [`crate::services::projection::convert_quality_volumes`]
/// before the production join consumes them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityRecord {
    #[serde(deserialize_with = "deserialize_flexible_int")]
    pub recno: Option<i64>,
    #[serde(deserialize_with = "deserialize_flexible_int")]
    pub linha: Option<i64>,
    #[serde(deserialize_with = "deserialize_flexible_id")]
    pub maquina_id: Option<String>,
    pub bdj_vazias: Option<f64>,
    pub bdj_retrabalho: Option<f64>,
    pub descarte_paes: Option<f64>,
    pub descarte_paes_pasta: Option<f64>,
    pub descarte_pasta: Option<f64>,
    pub data_registro: Option<NaiveDate>,
    pub hora_registro: Option<String>,
}

/// Telemetry row after cleaning: mandatory fields present, time-of-day
/// parsed, status and shift resolved to their semantic enums.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanTelemetry {
    pub maquina_id: String,
    pub status: MachineStatus,
    pub produto: Option<String>,
    pub contagem_total_ciclos: Option<i64>,
    pub contagem_total_produzido: Option<i64>,
    pub turno: Shift,
    pub data_registro: NaiveDate,
    pub hora_registro: NaiveTime,
}

impl CleanTelemetry {
    /// Combined registration timestamp.
    pub fn data_hora(&self) -> NaiveDateTime {
        self.data_registro.and_time(self.hora_registro)
    }
}

/// Annotation row after cleaning: line/factory resolved, operator id
/// zero-padded, backup machine split out of the equipment column.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanAnnotation {
    pub fabrica: i64,
    pub linha: i64,
    pub maquina_id: String,
    pub motivo: Option<String>,
    pub equipamento: Option<String>,
    pub problema: Option<String>,
    pub causa: Option<String>,
    pub os_numero: Option<String>,
    pub operador_id: Option<String>,
    pub s_backup: Option<String>,
    pub afeta_eff: Option<i64>,
    pub data_registro: NaiveDate,
    pub hora_registro: NaiveTime,
}

impl CleanAnnotation {
    /// Combined registration timestamp.
    pub fn data_hora(&self) -> NaiveDateTime {
        self.data_registro.and_time(self.hora_registro)
    }
}

/// One collapsed machine-state interval of the unified timeline
/// (`analysis_info_ihm` table).
///
/// Upsert key: (`maquina_id`, `data_registro`, `hora_registro_ihm`).
/// `data_hora_final` is exclusive; for the last interval of a machine it is
/// the invocation's "now" floored to the second (open interval).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedInterval {
    pub fabrica: i64,
    pub linha: i64,
    pub maquina_id: String,
    pub turno: Shift,
    pub status: MachineStatus,
    pub data_registro: NaiveDate,
    pub hora_registro: NaiveTime,
    pub motivo: Option<String>,
    pub equipamento: Option<String>,
    pub problema: Option<String>,
    pub causa: Option<String>,
    pub os_numero: Option<String>,
    pub operador_id: Option<String>,
    pub data_registro_ihm: NaiveDate,
    pub hora_registro_ihm: NaiveTime,
    pub s_backup: Option<String>,
    pub data_hora: NaiveDateTime,
    pub data_hora_final: NaiveDateTime,
    /// Interval duration in minutes, clipped to `[0, 480]`.
    pub tempo: i64,
    /// 1 when the stoppage reason does not count against efficiency.
    pub afeta_eff: i64,
}

/// Production joined with aggregated quality rejections
/// (`analysis_production` table).
///
/// Upsert key: (`maquina_id`, `data_registro`, `turno`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionWithQuality {
    pub linha: i64,
    pub maquina_id: String,
    pub turno: Shift,
    pub data_registro: NaiveDate,
    pub produto: Option<String>,
    pub total_ciclos: i64,
    pub total_produzido_sensor: i64,
    pub bdj_vazias: i64,
    pub bdj_retrabalho: i64,
    pub descarte_paes: f64,
    pub descarte_paes_pasta: f64,
    pub descarte_pasta: f64,
    /// Corrected total, reconciled against sensor drift (5% tolerance rule).
    pub total_produzido: i64,
}

/// One row of an indicator table.
///
/// `total_produzido` and `producao_esperada` are populated for the efficiency
/// indicator only. Upsert key: (`maquina_id`, `data_registro`, `turno`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorRecord {
    pub fabrica: i64,
    pub linha: i64,
    pub maquina_id: String,
    pub turno: Shift,
    pub data_registro: NaiveDate,
    pub tempo: i64,
    pub desconto: i64,
    pub excedente: i64,
    pub tempo_esperado: i64,
    pub total_produzido: Option<i64>,
    pub producao_esperada: Option<i64>,
    pub indicador: IndicatorKind,
    /// Indicator value: `[0, 1.5]` for efficiency, `[0, 1]` otherwise.
    pub valor: f64,
}

/// One hourly production bucket for the frontend projection, in boxes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyProduction {
    pub maquina_id: String,
    /// Label of the hour slot, e.g. `"08hs - 09hs"`, or `"Total"` for the
    /// per-machine sum row.
    pub intervalo: String,
    pub total: i64,
}
