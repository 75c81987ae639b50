//! AI 评分服务 - 业务能力层
//!
//! ## 职责
//!
//! 1. 构建嵌入全部量表阶段的评分 prompt（每个单元只发一次调用，控制成本）
//! 2. 调用 LLM 并校验响应 Schema
//! 3. 在单元自己的任务内执行重试循环（指数退避 + 抖动）
//! 4. 每次尝试的 token 用量都记入账本，失败也计费
//!
//! AI 的输出永远不可信：Schema 校验失败是一条一等的可重试错误路径，
//! 而不是能炸掉整个批次的未捕获异常。

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::clients::{ChatRequest, LlmBackend};
use crate::config::Config;
use crate::error::{AnalyzerError, EvalError};
use crate::models::batch::RetryPolicy;
use crate::models::evaluation::{CostLedger, StageScore};
use crate::models::rubric::Rubric;
use crate::models::submission::SubmissionUnit;

const ANALYZER_TEMPERATURE: f32 = 0.1;
const ANALYZER_MAX_TOKENS: u32 = 4_096;

/// LLM 响应中单个阶段的原始评分
#[derive(Debug, Deserialize)]
struct RawStageScore {
    phase: String,
    score: f64,
    #[serde(default)]
    notes: String,
    #[serde(default)]
    evidence: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnalyzerReply {
    scores: Vec<RawStageScore>,
}

/// token 计价（美元 / 百万 token）
#[derive(Debug, Clone, Copy)]
pub struct Pricing {
    pub input_per_mtok: f64,
    pub output_per_mtok: f64,
}

impl Pricing {
    pub fn from_config(config: &Config) -> Self {
        Self {
            input_per_mtok: config.llm_input_price_per_mtok,
            output_per_mtok: config.llm_output_price_per_mtok,
        }
    }

    pub fn cost_usd(&self, tokens_input: u64, tokens_output: u64) -> f64 {
        tokens_input as f64 / 1_000_000.0 * self.input_per_mtok
            + tokens_output as f64 / 1_000_000.0 * self.output_per_mtok
    }
}

/// AI 评分服务
pub struct Analyzer {
    llm: Arc<dyn LlmBackend>,
    model: String,
    retry: RetryPolicy,
    pricing: Pricing,
}

impl Analyzer {
    pub fn new(config: &Config, llm: Arc<dyn LlmBackend>) -> Self {
        Self {
            llm,
            model: config.analyzer_model_name.clone(),
            retry: RetryPolicy::new(
                config.retry_attempts,
                config.retry_base_delay_ms,
                config.retry_max_delay_ms,
            ),
            pricing: Pricing::from_config(config),
        }
    }

    /// 对一份提交执行量表评分，返回按量表顺序排列的阶段评分
    ///
    /// 可重试错误（瞬时 / Schema）按策略重试；服务商永久拒绝立即失败。
    /// 耗尽预算后返回最后一个错误。
    pub async fn analyze(
        &self,
        unit: &SubmissionUnit,
        student_name: &str,
        rubric: &Rubric,
        unit_index: usize,
        ledger: &mut CostLedger,
    ) -> Result<Vec<StageScore>, EvalError> {
        let request = ChatRequest {
            model: self.model.clone(),
            system: Some(build_system_prompt(rubric)),
            user: build_user_prompt(unit, student_name),
            temperature: ANALYZER_TEMPERATURE,
            max_tokens: ANALYZER_MAX_TOKENS,
        };

        let mut last_error: Option<AnalyzerError> = None;

        for attempt in 1..=self.retry.max_attempts {
            debug!(
                "[单元 {}] 评分尝试 {}/{}",
                unit_index, attempt, self.retry.max_attempts
            );
            ledger.analyzer_calls += 1;

            let error = match self.llm.chat(&request).await {
                Ok(response) => {
                    // 有响应就记账——Schema 失败同样消耗了 token
                    ledger.cost.add_usage(
                        &self.model,
                        response.tokens_input,
                        response.tokens_output,
                        self.pricing
                            .cost_usd(response.tokens_input, response.tokens_output),
                    );

                    match parse_scores(&response.content, rubric) {
                        Ok(scores) => {
                            info!(
                                "[单元 {}] ✓ 评分完成 ({} 个阶段, 输入 {} / 输出 {} tokens)",
                                unit_index,
                                scores.len(),
                                response.tokens_input,
                                response.tokens_output
                            );
                            return Ok(scores);
                        }
                        Err(e) => e,
                    }
                }
                Err(call_error) => {
                    if call_error.is_transient() {
                        AnalyzerError::Transient {
                            model: self.model.clone(),
                            message: call_error.to_string(),
                        }
                    } else {
                        // 内容政策等永久拒绝：不消耗重试预算，立即失败
                        warn!(
                            "[单元 {}] ❌ LLM 永久拒绝: {}",
                            unit_index, call_error
                        );
                        return Err(AnalyzerError::Policy {
                            model: self.model.clone(),
                            message: call_error.to_string(),
                        }
                        .into());
                    }
                }
            };

            warn!(
                "[单元 {}] ⚠️ 评分尝试 {}/{} 失败: {}",
                unit_index, attempt, self.retry.max_attempts, error
            );

            if attempt < self.retry.max_attempts {
                let delay = self.retry.delay_for(attempt);
                debug!(
                    "[单元 {}] ⏳ {} ms 后重试...",
                    unit_index,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }
            last_error = Some(error);
        }

        Err(last_error
            .unwrap_or_else(|| AnalyzerError::Schema {
                message: "未产生任何尝试".to_string(),
            })
            .into())
    }
}

/// 构建 system prompt：量表的全部阶段、权重与等级描述
fn build_system_prompt(rubric: &Rubric) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "Eres un corrector experto. Evalúa el trabajo del estudiante usando \
         exclusivamente la siguiente rúbrica.\n\n",
    );
    prompt.push_str(&format!("RÚBRICA: {}\n\n", rubric.name));

    for phase in &rubric.phases {
        prompt.push_str(&format!(
            "### {} — {} (peso {}%)\n",
            phase.id, phase.description, phase.weight
        ));
        for level in &phase.levels {
            prompt.push_str(&format!(
                "- {} ({}-{}): {}\n",
                level.name, level.band_min, level.band_max, level.descriptor
            ));
        }
        prompt.push('\n');
    }

    let ids = rubric.phase_ids().join("\", \"");
    prompt.push_str(&format!(
        "Devuelve SOLO un JSON con esta estructura exacta, sin texto adicional:\n\
         {{\"scores\": [{{\"phase\": \"<id>\", \"score\": <0-100>, \
         \"notes\": \"<observaciones>\", \"evidence\": \"<cita textual>\"}}]}}\n\
         Debe haber exactamente una entrada por cada fase: \"{}\".",
        ids
    ));

    prompt
}

/// 构建 user prompt：学生信息 + 提交全文
fn build_user_prompt(unit: &SubmissionUnit, student_name: &str) -> String {
    format!(
        "Estudiante: {}\nMateria: {} - {}\nArchivo: {}\n\n---\n\n\
         TRANSCRIPCIÓN DE LA ENTREGA:\n\n{}\n\n---\n\n\
         Evalúa esta entrega con la rúbrica del system prompt y devuelve SOLO el JSON.",
        student_name, unit.subject, unit.topic, unit.id, unit.raw_content
    )
}

/// 去掉模型偶尔包裹的 Markdown 代码栅栏
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

/// 解析并校验评分响应
///
/// 校验规则：每个量表阶段恰好出现一次，分数落在 [0, 100]，
/// 不允许未知阶段。任何违反都是可重试的 Schema 错误。
fn parse_scores(raw: &str, rubric: &Rubric) -> Result<Vec<StageScore>, AnalyzerError> {
    let cleaned = strip_code_fences(raw);

    let reply: AnalyzerReply =
        serde_json::from_str(cleaned).map_err(|e| AnalyzerError::Schema {
            message: format!("JSON 无法解析: {}", e),
        })?;

    let mut by_phase: std::collections::HashMap<&str, &RawStageScore> =
        std::collections::HashMap::new();
    for entry in &reply.scores {
        if rubric.phase(&entry.phase).is_none() {
            return Err(AnalyzerError::Schema {
                message: format!("未知阶段 id: {}", entry.phase),
            });
        }
        if by_phase.insert(entry.phase.as_str(), entry).is_some() {
            return Err(AnalyzerError::Schema {
                message: format!("阶段 {} 出现多次", entry.phase),
            });
        }
        if !entry.score.is_finite() || entry.score < 0.0 || entry.score > 100.0 {
            return Err(AnalyzerError::Schema {
                message: format!("阶段 {} 分数超出范围: {}", entry.phase, entry.score),
            });
        }
    }

    // 按量表定义顺序输出，缺失任何阶段都是 Schema 错误
    let mut scores = Vec::with_capacity(rubric.phases.len());
    for phase in &rubric.phases {
        let entry = by_phase
            .get(phase.id.as_str())
            .ok_or_else(|| AnalyzerError::Schema {
                message: format!("缺少阶段 {} 的评分", phase.id),
            })?;
        scores.push(StageScore {
            phase_id: phase.id.clone(),
            score: entry.score,
            notes: entry.notes.clone(),
            evidence: entry.evidence.clone(),
        });
    }

    Ok(scores)
}
