//! Business configuration for the indicator engine.
//!
//! Discount schedules, exclusion lists and conversion constants are plant
//! policy, not algorithm: they are threaded through the merger and the engine
//! as an explicit immutable value so a different plant (or a test) can swap
//! them without touching the computation.

use crate::core::domain::IndicatorKind;

/// Immutable indicator configuration.
///
/// Discount tables are ordered: entries are applied in sequence and a later
/// match overwrites an earlier one, matching the production behavior the
/// historical KPI data was computed with.
#[derive(Debug, Clone)]
pub struct IndicatorConfig {
    /// Discount schedule for efficiency: substring → minutes.
    pub desc_eff: Vec<(String, i64)>,
    /// Discount schedule for performance.
    pub desc_perf: Vec<(String, i64)>,
    /// Discount schedule for repair.
    pub desc_rep: Vec<(String, i64)>,
    /// Stoppage reasons that do not count against efficiency.
    pub not_eff: Vec<String>,
    /// Stoppage reasons excluded from performance scoring.
    pub not_perf: Vec<String>,
    /// Stoppage reasons that count towards the repair indicator.
    pub af_rep: Vec<String>,
    /// Expected cycles per minute for regular products.
    pub ciclos_esperados: f64,
    /// Expected cycles per minute for "bolinha" products (` BOL` substring).
    pub ciclos_bolinha: f64,
    /// Average tray mass in kg, used for mass → tray-count conversion.
    pub peso_bandejas: f64,
    /// Empty bag mass in kg, subtracted before the tray conversion.
    pub peso_saco: f64,
}

fn schedule(entries: &[(&str, i64)]) -> Vec<(String, i64)> {
    entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn list(entries: &[&str]) -> Vec<String> {
    entries.iter().map(|s| s.to_string()).collect()
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            desc_eff: schedule(&[
                ("Troca de Sabor", 15),
                ("Troca de Produto", 35),
                ("Refeição", 65),
                ("Café e Ginástica Laboral", 10),
                ("Treinamento", 60),
            ]),
            desc_perf: schedule(&[
                ("Troca de Sabor", 15),
                ("Troca de Produto", 35),
                ("Refeição", 65),
                ("Café e Ginástica Laboral", 10),
                ("Treinamento", 60),
            ]),
            desc_rep: schedule(&[
                ("Troca de Produto", 35),
                ("Manutenção Preventiva", 480),
                ("Manutenção Corretiva Programada", 480),
            ]),
            not_eff: list(&[
                "Sem Produção",
                "Backup",
                "Limpeza para parada de Fábrica",
                "Saída para backup",
                "Revezamento",
                "Manutenção Preventiva",
                "Manutenção Corretiva Programada",
            ]),
            not_perf: list(&[
                "Sem Produção",
                "Backup",
                "Limpeza para parada de Fábrica",
                "Risco de Contaminação",
                "Parâmetros de Qualidade",
                "Manutenção",
                "Saída para backup",
                "Revezamento",
                "Manutenção Preventiva",
                "Manutenção Corretiva Programada",
            ]),
            af_rep: list(&["Manutenção", "Troca de Produtos"]),
            ciclos_esperados: 11.5,
            ciclos_bolinha: 7.0,
            peso_bandejas: 0.028,
            peso_saco: 0.080,
        }
    }
}

impl IndicatorConfig {
    /// Ordered discount schedule for the given indicator.
    pub fn discount_schedule(&self, kind: IndicatorKind) -> &[(String, i64)] {
        match kind {
            IndicatorKind::Efficiency => &self.desc_eff,
            IndicatorKind::Performance => &self.desc_perf,
            IndicatorKind::Repair => &self.desc_rep,
        }
    }

    /// Skip list for the given indicator: reasons excluded from penalty
    /// (efficiency/performance) or selected for scoring (repair).
    pub fn skip_list(&self, kind: IndicatorKind) -> &[String] {
        match kind {
            IndicatorKind::Efficiency => &self.not_eff,
            IndicatorKind::Performance => &self.not_perf,
            IndicatorKind::Repair => &self.af_rep,
        }
    }

    /// Expected cycles per minute for a product description.
    pub fn expected_cycles(&self, produto: Option<&str>) -> f64 {
        if produto.is_some_and(|p| p.contains(" BOL")) {
            self.ciclos_bolinha
        } else {
            self.ciclos_esperados
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schedules_keep_declaration_order() {
        let config = IndicatorConfig::default();
        assert_eq!(config.desc_eff[0].0, "Troca de Sabor");
        assert_eq!(config.desc_eff[0].1, 15);
        assert_eq!(config.desc_rep.last().unwrap().1, 480);
    }

    #[test]
    fn expected_cycles_keyed_on_bol_substring() {
        let config = IndicatorConfig::default();
        assert_eq!(config.expected_cycles(Some("PAO BOL 300G")), 7.0);
        assert_eq!(config.expected_cycles(Some("PAO FORMA 500G")), 11.5);
        assert_eq!(config.expected_cycles(None), 11.5);
        // The match is on the space-prefixed token, not the bare substring.
        assert_eq!(config.expected_cycles(Some("PAOBOL")), 11.5);
    }

    #[test]
    fn repair_skip_list_selects_maintenance() {
        let config = IndicatorConfig::default();
        assert!(config
            .skip_list(IndicatorKind::Repair)
            .iter()
            .any(|r| r == "Manutenção"));
    }
}
