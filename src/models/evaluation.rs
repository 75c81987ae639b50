use serde::{Deserialize, Serialize};

/// 单个量表阶段的评分
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageScore {
    pub phase_id: String,
    /// 分数，[0, 100]
    pub score: f64,
    /// 定性评语
    pub notes: String,
    /// 支撑评分的原文摘录
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
}

/// API 成本信息
///
/// 跨多次尝试可累加——失败的尝试同样计入，批次账目反映真实花费。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostInfo {
    pub model: String,
    pub tokens_input: u64,
    pub tokens_output: u64,
    pub cost_usd: f64,
}

impl CostInfo {
    /// 记录一次调用的用量
    pub fn add_usage(&mut self, model: &str, tokens_input: u64, tokens_output: u64, cost_usd: f64) {
        if self.model.is_empty() {
            self.model = model.to_string();
        }
        self.tokens_input += tokens_input;
        self.tokens_output += tokens_output;
        self.cost_usd += cost_usd;
    }
}

/// 单元处理过程中的成本与调用计数账本
///
/// 由 UnitFlow 持有，Analyzer / Generator 的每次尝试都记账，
/// 无论成功失败。
#[derive(Debug, Clone, Default)]
pub struct CostLedger {
    pub cost: CostInfo,
    pub analyzer_calls: u32,
    pub generator_calls: u32,
}

/// 评估记录的自然键：(studentId, subject, topic)
///
/// 同一自然键至多存储一条记录——重新评估覆盖，不会产生重复。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EvaluationKey {
    pub student_id: String,
    pub subject: String,
    pub topic: String,
}

impl EvaluationKey {
    pub fn new(
        student_id: impl Into<String>,
        subject: impl Into<String>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            student_id: student_id.into(),
            subject: subject.into(),
            topic: topic.into(),
        }
    }

    /// 从自然键派生确定性记录 id
    ///
    /// 同一自然键永远得到同一 id，这是 upsert 幂等性的基础。
    pub fn record_id(&self) -> String {
        format!(
            "eval_{}_{}_{}",
            slug(&self.student_id),
            slug(&self.subject),
            slug(&self.topic)
        )
    }
}

fn slug(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if c.is_alphanumeric() {
            out.push(c);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}

/// 评估状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvaluationStatus {
    /// 全部阶段成功，含 AI 生成的叙述性反馈
    Success,
    /// 分数与阶段评语已落库，但叙述性反馈使用了模板兜底
    SuccessPartial,
    /// 处理失败
    Failed,
}

/// 评估结果记录——由 Persister 独占创建/覆盖
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub id: String,
    pub key: EvaluationKey,
    pub student_name: String,
    /// 加权最终分，[0, 100]
    pub score: u32,
    /// 叙述性反馈（Markdown）
    pub feedback: String,
    /// 按量表顺序排列的阶段评分
    pub stage_scores: Vec<StageScore>,
    pub status: EvaluationStatus,
    pub cost: CostInfo,
    /// ISO 8601
    pub created_at: String,
    pub updated_at: String,
}

impl EvaluationResult {
    pub fn new(
        key: EvaluationKey,
        student_name: impl Into<String>,
        score: u32,
        feedback: impl Into<String>,
        stage_scores: Vec<StageScore>,
        status: EvaluationStatus,
        cost: CostInfo,
    ) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: key.record_id(),
            key,
            student_name: student_name.into(),
            score,
            feedback: feedback.into(),
            stage_scores,
            status,
            cost,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_is_deterministic() {
        let a = EvaluationKey::new("u_123", "Física", "Tiro Oblicuo");
        let b = EvaluationKey::new("u_123", "Física", "Tiro Oblicuo");
        assert_eq!(a.record_id(), b.record_id());
        assert!(a.record_id().starts_with("eval_"));
    }

    #[test]
    fn test_record_id_distinguishes_keys() {
        let a = EvaluationKey::new("u_123", "Física", "Tiro Oblicuo");
        let b = EvaluationKey::new("u_123", "Física", "Termodinámica");
        assert_ne!(a.record_id(), b.record_id());
    }

    #[test]
    fn test_cost_accumulates_across_attempts() {
        let mut cost = CostInfo::default();
        cost.add_usage("gpt-4o-mini", 1_000, 500, 0.01);
        cost.add_usage("gpt-4o-mini", 2_000, 0, 0.002);
        assert_eq!(cost.tokens_input, 3_000);
        assert_eq!(cost.tokens_output, 500);
        assert!((cost.cost_usd - 0.012).abs() < 1e-9);
        assert_eq!(cost.model, "gpt-4o-mini");
    }
}
