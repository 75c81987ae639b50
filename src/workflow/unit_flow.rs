//! 单元处理流程 - 流程层
//!
//! 核心职责：定义"一份提交"的完整评分流程
//!
//! 流程顺序：
//! 1. Parser → Matcher（周报身份已知时跳过）
//! 2. 幂等续跑检查（已落库的单元在 Analyzer 之前跳过，不烧 AI 预算）
//! 3. Analyzer → Calculator → Generator → Persister
//!
//! 不持有任何资源（池、信号量），只依赖业务能力（services）。
//! 所有重试循环都在本单元的任务内顺序执行，不会饿死其他单元。

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use crate::clients::LlmBackend;
use crate::config::Config;
use crate::error::EvalError;
use crate::models::batch::{RetryPolicy, UnitOutcome, UnitReport};
use crate::models::evaluation::{
    CostLedger, EvaluationKey, EvaluationResult, EvaluationStatus,
};
use crate::models::roster::{RosterEntry, RosterScope};
use crate::models::rubric::Rubric;
use crate::models::submission::SubmissionUnit;
use crate::services::persister::EvaluationStore;
use crate::services::{calculate_score, parse_submission, Analyzer, Generator, Matcher, Persister};
use crate::utils::logging;
use crate::workflow::unit_ctx::UnitCtx;

/// 流程内部结果
enum FlowOutcome {
    /// 已有落库结果，本次跳过
    Skipped { student_name: String },
    /// 完整处理并落库
    Completed { student_name: String, score: u32 },
}

/// 单元处理流程
pub struct UnitFlow {
    matcher: Matcher,
    analyzer: Analyzer,
    generator: Generator,
    persister: Persister,
    roster: Arc<Vec<RosterEntry>>,
    scope: RosterScope,
    rubric: Arc<Rubric>,
}

impl UnitFlow {
    pub fn new(
        config: &Config,
        llm: Arc<dyn LlmBackend>,
        store: Arc<dyn EvaluationStore>,
        roster: Arc<Vec<RosterEntry>>,
        scope: RosterScope,
        rubric: Arc<Rubric>,
    ) -> Self {
        let retry = RetryPolicy::new(
            config.retry_attempts,
            config.retry_base_delay_ms,
            config.retry_max_delay_ms,
        );
        Self {
            matcher: Matcher::new(config),
            analyzer: Analyzer::new(config, llm.clone()),
            generator: Generator::new(config, llm),
            persister: Persister::new(store, retry),
            roster,
            scope,
            rubric,
        }
    }

    /// 运行完整流程，总是产出一份单元报告
    ///
    /// 错误在这里终结：折叠进报告，绝不向兄弟单元传播。
    pub async fn run(&self, unit: &SubmissionUnit, ctx: &UnitCtx) -> UnitReport {
        let start = Instant::now();
        let mut ledger = CostLedger::default();

        let (outcome, student_name, score, error) =
            match self.run_inner(unit, ctx, &mut ledger).await {
                Ok(FlowOutcome::Skipped { student_name }) => {
                    (UnitOutcome::Skipped, Some(student_name), None, None)
                }
                Ok(FlowOutcome::Completed {
                    student_name,
                    score,
                }) => (UnitOutcome::Succeeded, Some(student_name), Some(score), None),
                Err(e) => {
                    warn!("[单元 {}] ❌ 处理失败: {}", ctx.unit_index, e);
                    (
                        UnitOutcome::Failed,
                        None,
                        None,
                        Some((e.class().to_string(), e.to_string())),
                    )
                }
            };

        UnitReport {
            unit_id: unit.id.clone(),
            student_name,
            score,
            outcome,
            ledger,
            latency_ms: start.elapsed().as_millis() as u64,
            error,
        }
    }

    async fn run_inner(
        &self,
        unit: &SubmissionUnit,
        ctx: &UnitCtx,
        ledger: &mut CostLedger,
    ) -> Result<FlowOutcome, EvalError> {
        self.log_submission(unit, ctx);

        // ========== 阶段 1-2: 身份解析与匹配 ==========
        let (student_id, student_name) = self.resolve_identity(unit, ctx)?;

        // ========== 幂等续跑检查 ==========
        let key = EvaluationKey::new(&student_id, &unit.subject, &unit.topic);
        if self.persister.already_evaluated(&key).await {
            info!(
                "[单元 {}] ⏭️ 已有落库结果，跳过 (学生: {})",
                ctx.unit_index, student_name
            );
            return Ok(FlowOutcome::Skipped {
                student_name,
            });
        }

        // ========== 阶段 3: AI 评分 ==========
        let scores = self
            .analyzer
            .analyze(unit, &student_name, &self.rubric, ctx.unit_index, ledger)
            .await?;

        // ========== 阶段 4: 加权计算 ==========
        let final_score = calculate_score(&scores, &self.rubric);
        info!(
            "[单元 {}] ✓ 最终分数: {}/100 (学生: {})",
            ctx.unit_index, final_score, student_name
        );

        // ========== 阶段 5: 反馈生成（纯外观，失败降级不判死）==========
        let feedback = self
            .generator
            .generate(
                unit,
                &student_name,
                &scores,
                final_score,
                &self.rubric,
                ctx.unit_index,
                ledger,
            )
            .await;

        let status = if feedback.fallback_used {
            EvaluationStatus::SuccessPartial
        } else {
            EvaluationStatus::Success
        };

        // ========== 阶段 6: 幂等落库 ==========
        let result = EvaluationResult::new(
            key,
            student_name.clone(),
            final_score,
            feedback.text,
            scores,
            status,
            ledger.cost.clone(),
        );
        self.persister.persist(&result, ctx.unit_index).await?;

        Ok(FlowOutcome::Completed {
            student_name,
            score: final_score,
        })
    }

    /// 解析学生身份
    ///
    /// 周报单元身份已知：直接用 student_id，能从花名册补全姓名就补全。
    /// 考试文件：Parser 提取标识 → Matcher 在范围内确定性匹配。
    fn resolve_identity(
        &self,
        unit: &SubmissionUnit,
        ctx: &UnitCtx,
    ) -> Result<(String, String), EvalError> {
        if let Some(student_id) = &unit.student_id {
            let name = self
                .roster
                .iter()
                .find(|e| &e.id == student_id)
                .map(|e| e.name.clone())
                .unwrap_or_else(|| student_id.clone());
            return Ok((student_id.clone(), name));
        }

        let parsed = parse_submission(unit)?;
        info!(
            "[单元 {}] 🔍 正在匹配学生: \"{}\" ({} 个练习)",
            ctx.unit_index,
            parsed.identity_token,
            parsed.exercises.len()
        );

        let matched =
            self.matcher
                .match_student(&parsed.identity_token, &self.roster, &self.scope)?;
        info!(
            "[单元 {}] ✓ 匹配成功: {} (置信度 {:.1}%)",
            ctx.unit_index, matched.student.name, matched.confidence
        );

        Ok((matched.student.id, matched.student.name))
    }

    // ========== 日志辅助方法 ==========

    /// 显示提交内容预览
    fn log_submission(&self, unit: &SubmissionUnit, ctx: &UnitCtx) {
        info!(
            "[单元 {}] 📄 {} ({}): {}",
            ctx.unit_index,
            unit.id,
            unit.kind.label(),
            logging::truncate_text(&unit.raw_content, 80)
        );
    }
}
