use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// 权重之和允许的舍入容差
const WEIGHT_SUM_TOLERANCE: i64 = 1;

/// 阶段的单个表现等级描述
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceLevel {
    /// 等级名称，如 "Excelente" / "Bueno" / "Satisfactorio" / "Insuficiente"
    pub name: String,
    /// 该等级的表现描述
    pub descriptor: String,
    /// 指示性分数带下限
    pub band_min: u32,
    /// 指示性分数带上限
    pub band_max: u32,
}

/// 评分量表的单个阶段
///
/// 一个阶段是量表中的一个加权维度，按 0-100 打分。
/// 同一张量表所有阶段的权重之和必须为 100（±1 容差）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RubricPhase {
    pub id: String,
    pub description: String,
    /// 权重（百分比）
    pub weight: u32,
    /// 四个从高到低排序的表现等级
    #[serde(rename = "level")]
    pub levels: Vec<PerformanceLevel>,
}

/// 评分量表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rubric {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "phase")]
    pub phases: Vec<RubricPhase>,
}

impl Rubric {
    /// 校验量表结构——在加载时执行一次，而不是每次评估
    ///
    /// 规则：
    /// - 至少有一个阶段，阶段 id 不重复
    /// - 每个阶段恰好 4 个等级描述
    /// - 权重之和为 100（±1 舍入容差）
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.phases.is_empty() {
            return Err(ConfigError::EmptyRubric {
                rubric_id: self.id.clone(),
            });
        }

        let mut seen = std::collections::HashSet::new();
        for phase in &self.phases {
            if !seen.insert(phase.id.as_str()) {
                return Err(ConfigError::DuplicatePhase {
                    rubric_id: self.id.clone(),
                    phase_id: phase.id.clone(),
                });
            }
            if phase.levels.len() != 4 {
                return Err(ConfigError::InvalidLevels {
                    phase_id: phase.id.clone(),
                    count: phase.levels.len(),
                });
            }
        }

        let total: i64 = self.phases.iter().map(|p| p.weight as i64).sum();
        if (total - 100).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ConfigError::InvalidWeights {
                rubric_id: self.id.clone(),
                total,
            });
        }

        Ok(())
    }

    /// 按量表定义顺序返回所有阶段 id
    pub fn phase_ids(&self) -> Vec<&str> {
        self.phases.iter().map(|p| p.id.as_str()).collect()
    }

    /// 按 id 查找阶段
    pub fn phase(&self, id: &str) -> Option<&RubricPhase> {
        self.phases.iter().find(|p| p.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(name: &str, min: u32, max: u32) -> PerformanceLevel {
        PerformanceLevel {
            name: name.to_string(),
            descriptor: format!("desempeño {}", name.to_lowercase()),
            band_min: min,
            band_max: max,
        }
    }

    fn four_levels() -> Vec<PerformanceLevel> {
        vec![
            level("Excelente", 86, 100),
            level("Bueno", 70, 85),
            level("Satisfactorio", 55, 69),
            level("Insuficiente", 0, 54),
        ]
    }

    fn phase(id: &str, weight: u32) -> RubricPhase {
        RubricPhase {
            id: id.to_string(),
            description: format!("Fase {}", id),
            weight,
            levels: four_levels(),
        }
    }

    fn rubric_with_weights(weights: &[u32]) -> Rubric {
        Rubric {
            id: "r-test".to_string(),
            name: "Rúbrica de prueba".to_string(),
            description: String::new(),
            phases: weights
                .iter()
                .enumerate()
                .map(|(i, w)| phase(&format!("F{}", i + 1), *w))
                .collect(),
        }
    }

    #[test]
    fn test_validate_accepts_exact_hundred() {
        assert!(rubric_with_weights(&[15, 20, 25, 30, 10]).validate().is_ok());
    }

    #[test]
    fn test_validate_accepts_rounding_tolerance() {
        assert!(rubric_with_weights(&[33, 33, 33]).validate().is_ok()); // 99
        assert!(rubric_with_weights(&[34, 34, 33]).validate().is_ok()); // 101
    }

    #[test]
    fn test_validate_rejects_bad_weight_sum() {
        let err = rubric_with_weights(&[30, 30, 30]).validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidWeights { total: 90, .. }));
    }

    #[test]
    fn test_validate_rejects_empty_rubric() {
        let err = rubric_with_weights(&[]).validate().unwrap_err();
        assert!(matches!(err, ConfigError::EmptyRubric { .. }));
    }

    #[test]
    fn test_validate_rejects_wrong_level_count() {
        let mut rubric = rubric_with_weights(&[50, 50]);
        rubric.phases[1].levels.pop();
        let err = rubric.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidLevels { count: 3, .. }));
    }

    #[test]
    fn test_validate_rejects_duplicate_phase_id() {
        let mut rubric = rubric_with_weights(&[50, 50]);
        rubric.phases[1].id = "F1".to_string();
        let err = rubric.validate().unwrap_err();
        assert!(matches!(err, ConfigError::DuplicatePhase { .. }));
    }

    #[test]
    fn test_toml_roundtrip() {
        let text = r#"
id = "fisica-5-fases"
name = "Rúbrica 5 Fases"

[[phase]]
id = "F1"
description = "Comprensión del problema"
weight = 50

[[phase.level]]
name = "Excelente"
descriptor = "Identifica todos los datos"
band_min = 86
band_max = 100

[[phase.level]]
name = "Bueno"
descriptor = "Identifica la mayoría de los datos"
band_min = 70
band_max = 85

[[phase.level]]
name = "Satisfactorio"
descriptor = "Identifica algunos datos"
band_min = 55
band_max = 69

[[phase.level]]
name = "Insuficiente"
descriptor = "No identifica los datos"
band_min = 0
band_max = 54

[[phase]]
id = "F2"
description = "Ejecución"
weight = 50

[[phase.level]]
name = "Excelente"
descriptor = "Resuelve sin errores"
band_min = 86
band_max = 100

[[phase.level]]
name = "Bueno"
descriptor = "Resuelve con errores menores"
band_min = 70
band_max = 85

[[phase.level]]
name = "Satisfactorio"
descriptor = "Resuelve parcialmente"
band_min = 55
band_max = 69

[[phase.level]]
name = "Insuficiente"
descriptor = "No resuelve"
band_min = 0
band_max = 54
"#;
        let rubric: Rubric = toml::from_str(text).expect("TOML 解析失败");
        assert_eq!(rubric.phases.len(), 2);
        assert_eq!(rubric.phase_ids(), vec!["F1", "F2"]);
        assert!(rubric.validate().is_ok());
    }
}
