use std::time::Duration;

use serde::Serialize;

use crate::models::evaluation::CostLedger;

/// 重试策略：上限封顶的指数退避 + 随机抖动
///
/// 退避在单元自己的任务内顺序执行，不会阻塞其他单元的派发。
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 最大尝试次数（含首次）
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms,
            max_delay_ms,
        }
    }

    /// 第 `attempt` 次（从 1 开始）失败后的等待时长
    ///
    /// 指数部分: base × 2^(attempt-1)，封顶 max_delay；
    /// 抖动: 在 [exp/2, exp] 区间内随机取值，避免并发单元同步重试。
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay_ms
            .saturating_mul(1u64 << (attempt.saturating_sub(1)).min(16))
            .min(self.max_delay_ms);
        let half = exp / 2;
        Duration::from_millis(half + fastrand::u64(0..=exp - half))
    }
}

/// 单元处理的终态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOutcome {
    /// 成功（含反馈降级为模板的部分成功）
    Succeeded,
    /// 已有落库结果，本次运行跳过（幂等续跑）
    Skipped,
    /// 失败（重试耗尽或不可重试错误）
    Failed,
}

/// 单元处理报告——每个单元任务结束时产出一份
#[derive(Debug, Clone)]
pub struct UnitReport {
    pub unit_id: String,
    pub student_name: Option<String>,
    pub score: Option<u32>,
    pub outcome: UnitOutcome,
    pub ledger: CostLedger,
    pub latency_ms: u64,
    /// (错误分类, 错误信息)
    pub error: Option<(String, String)>,
}

impl UnitReport {
    /// 截止时间耗尽的单元报告
    pub fn timed_out(unit_id: &str, latency_ms: u64) -> Self {
        Self {
            unit_id: unit_id.to_string(),
            student_name: None,
            score: None,
            outcome: UnitOutcome::Failed,
            ledger: CostLedger::default(),
            latency_ms,
            error: Some((
                "TimeoutError".to_string(),
                crate::error::TimeoutError.to_string(),
            )),
        }
    }
}

/// 批次失败列表中的一项
#[derive(Debug, Clone, Serialize)]
pub struct UnitFailure {
    pub unit_id: String,
    pub error_class: String,
    pub message: String,
}

/// 运行中的批次累计状态
///
/// 活动期间只追加，所有权归调用方——不存在"是否有批次在跑"的全局标志，
/// 并发调用各自持有独立的 BatchRun。完成事件在编排器自己的任务里逐个
/// 折叠进来（单一累计点），单元之间无需加锁。
#[derive(Debug)]
pub struct BatchRun {
    pub id: String,
    pub total: usize,
    attempted: usize,
    successful: usize,
    failed: usize,
    skipped: usize,
    score_sum: u64,
    total_cost_usd: f64,
    total_tokens_input: u64,
    total_tokens_output: u64,
    failures: Vec<UnitFailure>,
    started_at: std::time::Instant,
}

impl BatchRun {
    pub fn new(id: impl Into<String>, total: usize) -> Self {
        Self {
            id: id.into(),
            total,
            attempted: 0,
            successful: 0,
            failed: 0,
            skipped: 0,
            score_sum: 0,
            total_cost_usd: 0.0,
            total_tokens_input: 0,
            total_tokens_output: 0,
            failures: Vec::new(),
            started_at: std::time::Instant::now(),
        }
    }

    /// 折叠一个单元的完成事件
    pub fn record(&mut self, report: &UnitReport) {
        self.attempted += 1;
        self.total_cost_usd += report.ledger.cost.cost_usd;
        self.total_tokens_input += report.ledger.cost.tokens_input;
        self.total_tokens_output += report.ledger.cost.tokens_output;

        match report.outcome {
            UnitOutcome::Succeeded => {
                self.successful += 1;
                self.score_sum += report.score.unwrap_or(0) as u64;
            }
            UnitOutcome::Skipped => self.skipped += 1,
            UnitOutcome::Failed => {
                self.failed += 1;
                let (class, message) = report
                    .error
                    .clone()
                    .unwrap_or_else(|| ("UnknownError".to_string(), String::new()));
                self.failures.push(UnitFailure {
                    unit_id: report.unit_id.clone(),
                    error_class: class,
                    message,
                });
            }
        }
    }

    pub fn successful(&self) -> usize {
        self.successful
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    /// 终结批次，产出不可变摘要
    pub fn finalize(self) -> BatchSummary {
        let avg_score = if self.successful > 0 {
            (self.score_sum as f64 / self.successful as f64).round() as u32
        } else {
            0
        };
        BatchSummary {
            batch_id: self.id,
            total: self.total,
            successful: self.successful,
            failed: self.failed,
            skipped: self.skipped,
            avg_score,
            failed_units: self.failures,
            total_cost_usd: self.total_cost_usd,
            total_tokens_input: self.total_tokens_input,
            total_tokens_output: self.total_tokens_output,
            total_latency_ms: self.started_at.elapsed().as_millis() as u64,
        }
    }
}

/// 终结后的批次摘要——不可变
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub batch_id: String,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub avg_score: u32,
    pub failed_units: Vec<UnitFailure>,
    pub total_cost_usd: f64,
    pub total_tokens_input: u64,
    pub total_tokens_output: u64,
    pub total_latency_ms: u64,
}
