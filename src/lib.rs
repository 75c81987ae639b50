//! # Exam Auto Grader
//!
//! 一个基于评分量表（rúbrica）对学生提交进行批量 AI 评分的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Clients）
//! - `clients/` - 唯一触网的模块，只暴露能力
//! - `LlmBackend` - LLM 调用抽象，测试中以脚本化实现替换
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个提交
//! - `parser` - 身份标识与练习结构提取（纯函数）
//! - `matcher` - 确定性身份匹配（编辑距离，无 AI）
//! - `analyzer` - AI 量表评分 + Schema 校验 + 重试
//! - `calculator` - 加权分数计算（纯函数，可审计）
//! - `generator` - 叙述性反馈合成（失败降级为模板）
//! - `persister` - 按自然键幂等落库
//! - `notifier` - 批次摘要通知（发后即忘）
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一份提交"的完整评分流程
//! - `UnitCtx` - 上下文封装（unit_id + 批次序号）
//! - `UnitFlow` - 流程编排（parse → match → analyze → calculate → generate → persist）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 批量评分处理器，管理并发、限速、
//!   截止时间与全局统计
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::{ChatRequest, LlmBackend, LlmCallError, LlmClient, LlmResponse};
pub use config::Config;
pub use error::{EvalError, EvalResult};
pub use models::{
    BatchRun, BatchSummary, EvaluationKey, EvaluationResult, EvaluationStatus, Rubric,
    RubricPhase, StageScore, SubmissionUnit,
};
pub use orchestrator::{run_batch, App, BatchOptions, ProgressCallback};
pub use workflow::{UnitCtx, UnitFlow};
