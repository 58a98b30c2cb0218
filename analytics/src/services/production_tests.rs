use chrono::NaiveDate;

use crate::core::domain::{ProductionRecord, QualityRecord, Shift};
use crate::services::production::join_quality_production;

fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
}

fn prod(linha: i64, maquina: &str, turno: &str, ciclos: f64, sensor: f64) -> ProductionRecord {
    ProductionRecord {
        linha: Some(linha),
        maquina_id: Some(maquina.to_string()),
        turno: Some(turno.to_string()),
        data_registro: Some(date(1)),
        produto: Some("PAO FORMA 500G".to_string()),
        total_ciclos: Some(ciclos),
        total_produzido_sensor: Some(sensor),
    }
}

fn qual(linha: i64, maquina: &str, hora: &str, vazias: f64, retrabalho: f64) -> QualityRecord {
    QualityRecord {
        recno: Some(1),
        linha: Some(linha),
        maquina_id: Some(maquina.to_string()),
        bdj_vazias: Some(vazias),
        bdj_retrabalho: Some(retrabalho),
        data_registro: Some(date(1)),
        hora_registro: Some(hora.to_string()),
        ..QualityRecord::default()
    }
}

#[test]
fn trusts_sensor_within_tolerance() {
    // 2% drift: take sensor minus rework.
    let production = vec![prod(1, "TMF001", "MAT", 100.0, 98.0)];
    let quality = vec![qual(1, "TMF001", "09:00:00", 0.0, 3.0)];

    let joined = join_quality_production(&production, &quality).unwrap();
    assert_eq!(joined.len(), 1);
    assert_eq!(joined[0].total_produzido, 95);
}

#[test]
fn rebuilds_from_cycles_outside_tolerance() {
    // 20% drift: rebuild from cycles minus empty and reworked trays.
    let production = vec![prod(1, "TMF001", "MAT", 100.0, 80.0)];
    let quality = vec![qual(1, "TMF001", "09:00:00", 2.0, 3.0)];

    let joined = join_quality_production(&production, &quality).unwrap();
    assert_eq!(joined[0].total_produzido, 95);
}

#[test]
fn zero_cycle_counter_takes_cycle_path() {
    let production = vec![prod(1, "TMF001", "MAT", 0.0, 50.0)];
    let joined = join_quality_production(&production, &[]).unwrap();
    assert_eq!(joined[0].total_produzido, 0);
}

#[test]
fn aggregates_quality_per_shift() {
    let production = vec![
        prod(1, "TMF001", "MAT", 100.0, 100.0),
        prod(1, "TMF001", "VES", 100.0, 100.0),
    ];
    let quality = vec![
        qual(1, "TMF001", "09:00:00", 1.0, 1.0),
        qual(1, "TMF001", "15:59:59", 1.0, 1.0),
        qual(1, "TMF001", "16:00:00", 5.0, 0.0),
    ];

    let joined = join_quality_production(&production, &quality).unwrap();
    assert_eq!(joined.len(), 2);

    let morning = joined.iter().find(|r| r.turno == Shift::Morning).unwrap();
    assert_eq!(morning.bdj_vazias, 2);
    assert_eq!(morning.bdj_retrabalho, 2);
    assert_eq!(morning.total_produzido, 98);

    let evening = joined.iter().find(|r| r.turno == Shift::Evening).unwrap();
    assert_eq!(evening.bdj_vazias, 5);
    assert_eq!(evening.total_produzido, 100);
}

#[test]
fn unmatched_production_is_zero_filled() {
    let production = vec![prod(2, "TMF002", "NOT", 500.0, 495.0)];
    let joined = join_quality_production(&production, &[]).unwrap();

    assert_eq!(joined[0].bdj_vazias, 0);
    assert_eq!(joined[0].bdj_retrabalho, 0);
    assert_eq!(joined[0].descarte_paes, 0.0);
    assert_eq!(joined[0].total_produzido, 495);
}

#[test]
fn quality_on_another_line_does_not_join() {
    let production = vec![prod(1, "TMF001", "MAT", 100.0, 100.0)];
    let quality = vec![qual(2, "TMF001", "09:00:00", 10.0, 10.0)];

    let joined = join_quality_production(&production, &quality).unwrap();
    assert_eq!(joined[0].bdj_vazias, 0);
    assert_eq!(joined[0].total_produzido, 100);
}

#[test]
fn output_sorted_by_date_line_shift() {
    let mut late = prod(1, "TMF001", "MAT", 10.0, 10.0);
    late.data_registro = Some(date(2));
    let production = vec![
        late,
        prod(3, "TMF003", "NOT", 10.0, 10.0),
        prod(1, "TMF001", "VES", 10.0, 10.0),
        prod(1, "TMF001", "NOT", 10.0, 10.0),
    ];

    let joined = join_quality_production(&production, &[]).unwrap();
    let keys: Vec<_> = joined
        .iter()
        .map(|r| (r.data_registro, r.linha, r.turno))
        .collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
    assert_eq!(joined[0].linha, 1);
    assert_eq!(joined[0].turno, Shift::Night);
}

#[test]
fn malformed_quality_time_is_a_parse_error() {
    let production = vec![prod(1, "TMF001", "MAT", 100.0, 100.0)];
    let quality = vec![qual(1, "TMF001", "9h30", 1.0, 1.0)];

    let err = join_quality_production(&production, &quality).unwrap_err();
    assert!(err.to_string().contains("TMF001"));
}
