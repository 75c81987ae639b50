//! 反馈生成服务 - 业务能力层
//!
//! 把阶段评分合成为面向学生的叙述性反馈（Markdown）。
//! 这是第二次独立的 LLM 调用，采样参数与评分调用分开调校——
//! 这里是散文合成，不是打分。
//!
//! 反馈属于纯外观层：生成调用耗尽自己的重试预算后，单元不判失败，
//! 改用模板兜底并把状态降为 SuccessPartial，分数照常落库。

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::clients::{ChatRequest, LlmBackend};
use crate::config::Config;
use crate::models::batch::RetryPolicy;
use crate::models::evaluation::{CostLedger, StageScore};
use crate::models::rubric::Rubric;
use crate::models::submission::SubmissionUnit;
use crate::services::analyzer::Pricing;
use crate::services::calculator::score_message;

const GENERATOR_TEMPERATURE: f32 = 0.7;
const GENERATOR_MAX_TOKENS: u32 = 2_048;

/// 反馈生成结果
#[derive(Debug, Clone)]
pub struct FeedbackOutcome {
    pub text: String,
    /// 是否使用了模板兜底（true 时单元状态为 SuccessPartial）
    pub fallback_used: bool,
}

/// 反馈生成服务
pub struct Generator {
    llm: Arc<dyn LlmBackend>,
    model: String,
    retry: RetryPolicy,
    pricing: Pricing,
    max_chars: usize,
}

impl Generator {
    pub fn new(config: &Config, llm: Arc<dyn LlmBackend>) -> Self {
        Self {
            llm,
            model: config.generator_model_name.clone(),
            retry: RetryPolicy::new(
                config.retry_attempts,
                config.retry_base_delay_ms,
                config.retry_max_delay_ms,
            ),
            pricing: Pricing::from_config(config),
            max_chars: config.feedback_max_chars,
        }
    }

    /// 生成叙述性反馈；失败时回落到模板，从不返回错误
    pub async fn generate(
        &self,
        unit: &SubmissionUnit,
        student_name: &str,
        scores: &[StageScore],
        final_score: u32,
        rubric: &Rubric,
        unit_index: usize,
        ledger: &mut CostLedger,
    ) -> FeedbackOutcome {
        let request = ChatRequest {
            model: self.model.clone(),
            system: Some(
                "Sos un docente que escribe devoluciones pedagógicas en español rioplatense. \
                 Escribí en Markdown, con tono constructivo y concreto, dirigido al estudiante."
                    .to_string(),
            ),
            user: build_feedback_prompt(unit, student_name, scores, final_score, rubric),
            temperature: GENERATOR_TEMPERATURE,
            max_tokens: GENERATOR_MAX_TOKENS,
        };

        for attempt in 1..=self.retry.max_attempts {
            debug!(
                "[单元 {}] 反馈生成尝试 {}/{}",
                unit_index, attempt, self.retry.max_attempts
            );
            ledger.generator_calls += 1;

            match self.llm.chat(&request).await {
                Ok(response) => {
                    ledger.cost.add_usage(
                        &self.model,
                        response.tokens_input,
                        response.tokens_output,
                        self.pricing
                            .cost_usd(response.tokens_input, response.tokens_output),
                    );

                    if !response.content.trim().is_empty() {
                        info!(
                            "[单元 {}] ✓ 反馈已生成 ({} 字符)",
                            unit_index,
                            response.content.len()
                        );
                        return FeedbackOutcome {
                            text: truncate_chars(response.content.trim(), self.max_chars),
                            fallback_used: false,
                        };
                    }
                    warn!("[单元 {}] ⚠️ 反馈内容为空，按瞬时失败处理", unit_index);
                }
                Err(call_error) => {
                    warn!(
                        "[单元 {}] ⚠️ 反馈生成尝试 {}/{} 失败: {}",
                        unit_index, attempt, self.retry.max_attempts, call_error
                    );
                    if !call_error.is_transient() {
                        // 永久拒绝不值得继续烧预算，直接走模板
                        break;
                    }
                }
            }

            if attempt < self.retry.max_attempts {
                tokio::time::sleep(self.retry.delay_for(attempt)).await;
            }
        }

        warn!(
            "[单元 {}] ⚠️ 反馈生成预算耗尽，使用模板兜底 (状态: SuccessPartial)",
            unit_index
        );
        FeedbackOutcome {
            text: fallback_template(student_name, unit, scores, final_score, rubric),
            fallback_used: true,
        }
    }
}

/// 反馈生成的 user prompt
fn build_feedback_prompt(
    unit: &SubmissionUnit,
    student_name: &str,
    scores: &[StageScore],
    final_score: u32,
    rubric: &Rubric,
) -> String {
    let mut detail = String::new();
    for s in scores {
        let description = rubric
            .phase(&s.phase_id)
            .map(|p| p.description.as_str())
            .unwrap_or("");
        detail.push_str(&format!(
            "- {} ({}): {:.0}/100. Observaciones: {}\n",
            s.phase_id, description, s.score, s.notes
        ));
    }

    format!(
        "Estudiante: {}\nMateria: {} - {}\nNota final: {}/100\n\n\
         Evaluación por fase:\n{}\n\
         Redactá una devolución completa en Markdown: un párrafo de apertura, \
         una sección por fase con fortalezas y aspectos a mejorar, y un cierre \
         motivador. No inventes contenido que no esté en las observaciones.",
        student_name, unit.subject, unit.topic, final_score, detail
    )
}

/// 模板兜底：只用确定性数据渲染一份简洁的反馈
fn fallback_template(
    student_name: &str,
    unit: &SubmissionUnit,
    scores: &[StageScore],
    final_score: u32,
    rubric: &Rubric,
) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "# Devolución — {}\n\n**Materia**: {} — {}\n**Nota final**: {}/100\n\n## Evaluación por fase\n\n",
        student_name, unit.subject, unit.topic, final_score
    ));

    for s in scores {
        let description = rubric
            .phase(&s.phase_id)
            .map(|p| p.description.as_str())
            .unwrap_or("");
        out.push_str(&format!("### {} — {}\n", s.phase_id, description));
        out.push_str(&format!("**Puntaje**: {:.0}/100\n\n", s.score));
        if !s.notes.is_empty() {
            out.push_str(&format!("{}\n\n", s.notes));
        }
        if let Some(evidence) = &s.evidence {
            out.push_str(&format!("> {}\n\n", evidence));
        }
    }

    out.push_str(&format!("## Mensaje final\n\n{}\n", score_message(final_score)));
    out
}

/// 按字符边界截断
fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect::<String>() + "…"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::rubric::{PerformanceLevel, RubricPhase};
    use crate::models::submission::SubmissionUnit;

    fn rubric() -> Rubric {
        Rubric {
            id: "r".into(),
            name: "Rúbrica".into(),
            description: String::new(),
            phases: vec![RubricPhase {
                id: "F1".into(),
                description: "Comprensión".into(),
                weight: 100,
                levels: vec![
                    PerformanceLevel {
                        name: "Excelente".into(),
                        descriptor: String::new(),
                        band_min: 86,
                        band_max: 100,
                    };
                    4
                ],
            }],
        }
    }

    fn unit() -> SubmissionUnit {
        SubmissionUnit::exam_file("Gonzalez.md", "Gonzalez.md", "...", "Física", "Tiro Oblicuo")
    }

    #[test]
    fn test_fallback_template_contains_scores_and_notes() {
        let scores = vec![StageScore {
            phase_id: "F1".into(),
            score: 81.0,
            notes: "Identifica bien los datos del problema".into(),
            evidence: Some("v0 = 20 m/s".into()),
        }];
        let text = fallback_template("González, Juan", &unit(), &scores, 81, &rubric());
        assert!(text.contains("González, Juan"));
        assert!(text.contains("81/100"));
        assert!(text.contains("Comprensión"));
        assert!(text.contains("Identifica bien los datos"));
        assert!(text.contains("> v0 = 20 m/s"));
        assert!(text.contains("Excelente trabajo") || text.contains("Buen trabajo"));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("áéíóú", 3), "áéí…");
        assert_eq!(truncate_chars("corto", 10), "corto");
    }

    #[test]
    fn test_feedback_prompt_embeds_phase_notes() {
        let scores = vec![StageScore {
            phase_id: "F1".into(),
            score: 64.0,
            notes: "confunde variables".into(),
            evidence: None,
        }];
        let prompt = build_feedback_prompt(&unit(), "Pérez, Ana", &scores, 64, &rubric());
        assert!(prompt.contains("Pérez, Ana"));
        assert!(prompt.contains("confunde variables"));
        assert!(prompt.contains("64/100"));
    }
}
