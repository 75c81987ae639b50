//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和流程调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量评分处理器
//! - 管理应用生命周期（初始化、运行、统计）
//! - 批量加载提交（Vec<SubmissionUnit>）
//! - 控制并发数量（Semaphore）与批间限速
//! - 应用截止时间与幂等续跑
//! - 终结 BatchRun 并通知摘要
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<SubmissionUnit>)
//!     ↓
//! workflow::UnitFlow (处理单个 SubmissionUnit)
//!     ↓
//! services (能力层：parse / match / analyze / calculate / generate / persist)
//!     ↓
//! clients (基础设施：LlmBackend)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：编排层只做调度和统计，不做业务判断
//! 2. **失败隔离**：单元错误终结于本单元，绝不中止批次
//! 3. **向下依赖**：编排层 → workflow → services → clients

pub mod batch_processor;

pub use batch_processor::{run_batch, App, BatchOptions, ProgressCallback};
