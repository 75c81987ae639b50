/// 加权分数计算 - 业务能力层
///
/// 纯函数：给定同一组阶段评分，结果永远一致。
/// AI 的非确定性止步于 Analyzer，这里开始分数可审计。
use crate::models::evaluation::StageScore;
use crate::models::rubric::Rubric;

/// 计算加权最终分
///
/// `round(Σ score × weight / 100)`，夹取到 [0, 100]。
/// 调用前提：每个量表阶段恰好有一条评分（由 Analyzer 的 Schema 校验保证）。
pub fn calculate_score(scores: &[StageScore], rubric: &Rubric) -> u32 {
    debug_assert_eq!(scores.len(), rubric.phases.len());

    let weighted_sum: f64 = scores
        .iter()
        .filter_map(|s| {
            rubric
                .phase(&s.phase_id)
                .map(|p| s.score * p.weight as f64 / 100.0)
        })
        .sum();

    weighted_sum.round().clamp(0.0, 100.0) as u32
}

/// 按分数段返回反馈结尾的鼓励语
pub fn score_message(score: u32) -> &'static str {
    if score >= 85 {
        "¡Excelente trabajo! Tu desempeño demuestra un sólido dominio de los conceptos. \
         Continuá con este nivel de dedicación."
    } else if score >= 70 {
        "Buen trabajo. Mostraste comprensión de los conceptos. Enfocate en las áreas de \
         mejora identificadas para alcanzar la excelencia."
    } else if score >= 55 {
        "Demostraste esfuerzo y comprensión básica. Con práctica enfocada en las áreas \
         identificadas vas a poder mejorar significativamente."
    } else {
        "Este resultado muestra que necesitás apoyo adicional. No te desanimes: \
         identificá las áreas clave y buscá ayuda de tu docente."
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::rubric::{PerformanceLevel, RubricPhase};

    fn levels() -> Vec<PerformanceLevel> {
        ["Excelente", "Bueno", "Satisfactorio", "Insuficiente"]
            .iter()
            .map(|name| PerformanceLevel {
                name: name.to_string(),
                descriptor: String::new(),
                band_min: 0,
                band_max: 100,
            })
            .collect()
    }

    /// 原系统的 5 阶段量表：15/20/25/30/10
    fn five_phase_rubric() -> Rubric {
        Rubric {
            id: "fisica-5-fases".into(),
            name: "Rúbrica 5 Fases".into(),
            description: String::new(),
            phases: [("F1", 15), ("F2", 20), ("F3", 25), ("F4", 30), ("F5", 10)]
                .iter()
                .map(|(id, weight)| RubricPhase {
                    id: id.to_string(),
                    description: String::new(),
                    weight: *weight,
                    levels: levels(),
                })
                .collect(),
        }
    }

    fn scores(values: &[(&str, f64)]) -> Vec<StageScore> {
        values
            .iter()
            .map(|(id, score)| StageScore {
                phase_id: id.to_string(),
                score: *score,
                notes: String::new(),
                evidence: None,
            })
            .collect()
    }

    #[test]
    fn test_uniform_scores_round_up() {
        let rubric = five_phase_rubric();
        let s = scores(&[
            ("F1", 92.5),
            ("F2", 92.5),
            ("F3", 92.5),
            ("F4", 92.5),
            ("F5", 92.5),
        ]);
        assert_eq!(calculate_score(&s, &rubric), 93);
    }

    #[test]
    fn test_mixed_scores_weighted() {
        let rubric = five_phase_rubric();
        // 11.55 + 12.4 + 19.25 + 27.75 + 6.2 = 77.15 → 77
        let s = scores(&[
            ("F1", 77.0),
            ("F2", 62.0),
            ("F3", 77.0),
            ("F4", 92.5),
            ("F5", 62.0),
        ]);
        assert_eq!(calculate_score(&s, &rubric), 77);
    }

    #[test]
    fn test_extremes_clamped() {
        let rubric = five_phase_rubric();
        let max = scores(&[
            ("F1", 100.0),
            ("F2", 100.0),
            ("F3", 100.0),
            ("F4", 100.0),
            ("F5", 100.0),
        ]);
        assert_eq!(calculate_score(&max, &rubric), 100);

        let min = scores(&[
            ("F1", 0.0),
            ("F2", 0.0),
            ("F3", 0.0),
            ("F4", 0.0),
            ("F5", 0.0),
        ]);
        assert_eq!(calculate_score(&min, &rubric), 0);
    }

    #[test]
    fn test_deterministic_for_same_input() {
        let rubric = five_phase_rubric();
        let s = scores(&[
            ("F1", 81.0),
            ("F2", 64.0),
            ("F3", 73.0),
            ("F4", 88.0),
            ("F5", 55.0),
        ]);
        let first = calculate_score(&s, &rubric);
        for _ in 0..10 {
            assert_eq!(calculate_score(&s, &rubric), first);
        }
    }

    #[test]
    fn test_score_message_bands() {
        assert!(score_message(90).contains("Excelente"));
        assert!(score_message(75).contains("Buen trabajo"));
        assert!(score_message(60).contains("esfuerzo"));
        assert!(score_message(30).contains("apoyo adicional"));
    }
}
