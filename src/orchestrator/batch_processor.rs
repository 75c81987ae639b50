//! 批量评分处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责批量提交的评分和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：启动日志、加载量表与花名册、创建 LLM 客户端和存储
//! 2. **批量加载**：扫描并加载所有待评分的提交（`Vec<SubmissionUnit>`）
//! 3. **并发控制**：使用 Semaphore 限制并发数量
//! 4. **分批处理**：提交分批次处理，批间等待固定延迟以尊重服务商限速
//! 5. **截止时间**：超过调用方给定的截止时间后，剩余单元记超时失败
//! 6. **全局统计**：把完成事件折叠进 BatchRun，终结为不可变摘要
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单个提交的细节，向下委托 workflow::UnitFlow
//! - **句柄归调用方**：BatchRun 由调用方持有，并发调用互不干扰，
//!   不存在"是否有批次在跑"的全局标志
//! - **失败隔离**：单元的重试在它自己的任务内进行；任何单元失败
//!   都不会中止批次
//! - **单一累计点**：统计只在编排器自己的任务里更新，单元间无锁

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::clients::LlmClient;
use crate::config::Config;
use crate::models::batch::{BatchRun, BatchSummary, UnitReport};
use crate::models::loaders;
use crate::models::roster::RosterScope;
use crate::models::submission::SubmissionUnit;
use crate::services::notifier::BatchNotifier;
use crate::services::{JsonFileStore, WebhookNotifier};
use crate::utils::logging;
use crate::workflow::{UnitCtx, UnitFlow};

/// 单元完成后的进度回调：(已完成数, 总数)
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// 批次编排选项
#[derive(Default)]
pub struct BatchOptions {
    /// 每个单元完成后调用
    pub progress: Option<ProgressCallback>,
    /// 批次整体截止时间；到期后剩余单元记超时失败，可幂等续跑
    pub deadline: Option<Duration>,
}

/// 应用主结构
pub struct App {
    config: Config,
    flow: Arc<UnitFlow>,
    notifier: Arc<dyn BatchNotifier>,
}

impl App {
    /// 初始化应用：加载量表与花名册，组装流水线
    pub async fn initialize(config: Config) -> Result<Self> {
        logging::init_log_file(&config.output_log_file)?;
        logging::log_startup(&config);

        let rubric = Arc::new(loaders::load_rubric(config.rubric_file.as_ref()).await?);
        let roster = Arc::new(loaders::load_roster(config.roster_file.as_ref()).await?);

        let scope = RosterScope {
            subject: config.subject.clone(),
            academic_year: config.academic_year.clone(),
            division: config.division.clone(),
        };

        let llm = Arc::new(LlmClient::new(&config));
        let store = Arc::new(JsonFileStore::new(&config.evaluations_file));
        let notifier = Arc::new(WebhookNotifier::new(config.summary_webhook_url.clone()));

        let flow = Arc::new(UnitFlow::new(
            &config, llm, store, roster, scope, rubric,
        ));

        Ok(Self {
            config,
            flow,
            notifier,
        })
    }

    /// 运行应用主逻辑：加载提交并评分
    pub async fn run(&self) -> Result<Option<BatchSummary>> {
        let mut units = self.load_units().await?;

        if units.is_empty() {
            warn!("⚠️ 没有找到待评分的提交，程序结束");
            return Ok(None);
        }

        if self.config.max_units > 0 && units.len() > self.config.max_units {
            info!(
                "📋 操作员限制生效: {} → {} 个单元",
                units.len(),
                self.config.max_units
            );
            units.truncate(self.config.max_units);
        }

        let deadline = (self.config.batch_deadline_secs > 0)
            .then(|| Duration::from_secs(self.config.batch_deadline_secs));

        let summary = run_batch(
            self.flow.clone(),
            units,
            &self.config,
            BatchOptions {
                progress: None,
                deadline,
            },
            self.notifier.clone(),
        )
        .await?;

        logging::print_final_stats(&summary, &self.config);
        Ok(Some(summary))
    }

    /// 加载提交单元
    async fn load_units(&self) -> Result<Vec<SubmissionUnit>> {
        info!("\n📁 正在扫描待评分的提交...");
        loaders::load_submission_units(
            &self.config.submissions_folder,
            &self.config.subject,
            &self.config.exam_topic,
        )
        .await
    }
}

/// 核心编排入口：把一组单元推过完整评分流水线
///
/// 单元按输入顺序分批派发，完成顺序不保证——调用方按 unit_id
/// 关联结果，不要依赖数组位置。
pub async fn run_batch(
    flow: Arc<UnitFlow>,
    units: Vec<SubmissionUnit>,
    config: &Config,
    options: BatchOptions,
    notifier: Arc<dyn BatchNotifier>,
) -> Result<BatchSummary> {
    let batch_id = format!("batch_{}", chrono::Utc::now().format("%Y%m%d%H%M%S%3f"));
    let total = units.len();
    let pool_size = config.max_concurrent_units.max(1);

    logging::log_units_loaded(total, pool_size);

    let mut run = BatchRun::new(batch_id, total);
    let semaphore = Arc::new(Semaphore::new(pool_size));
    let started = Instant::now();
    let deadline_at = options.deadline.map(|d| started + d);
    let completed = Arc::new(AtomicUsize::new(0));

    let total_chunks = total.div_ceil(pool_size);

    for (chunk_index, chunk) in units.chunks(pool_size).enumerate() {
        let chunk_num = chunk_index + 1;
        let chunk_start = chunk_index * pool_size;
        logging::log_chunk_start(
            chunk_num,
            total_chunks,
            chunk_start + 1,
            chunk_start + chunk.len(),
            total,
        );

        // 截止时间已过：剩余单元不再派发，直接记超时
        if let Some(at) = deadline_at {
            if Instant::now() >= at {
                warn!("⏰ 批次截止时间已到，剩余单元记为超时");
                for unit in &units[chunk_start..] {
                    let report = UnitReport::timed_out(&unit.id, 0);
                    bump_progress(&completed, total, &options.progress);
                    run.record(&report);
                }
                break;
            }
        }

        let mut chunk_handles = Vec::new();

        for (offset, unit) in chunk.iter().enumerate() {
            let unit_index = chunk_start + offset + 1;
            let permit = semaphore.clone().acquire_owned().await?;

            let flow = flow.clone();
            let unit = unit.clone();
            let completed = completed.clone();
            let progress = options.progress.clone();
            let remaining = deadline_at.map(|at| at.saturating_duration_since(Instant::now()));

            let handle = tokio::spawn(async move {
                let _permit = permit;
                let ctx = UnitCtx::new(
                    unit.id.clone(),
                    unit_index,
                    unit.subject.clone(),
                    unit.topic.clone(),
                );

                let task_started = Instant::now();
                let report = match remaining {
                    Some(remaining) => {
                        match tokio::time::timeout(remaining, flow.run(&unit, &ctx)).await {
                            Ok(report) => report,
                            Err(_) => {
                                warn!("[单元 {}] ⏰ 截止时间内未完成", unit_index);
                                UnitReport::timed_out(
                                    &unit.id,
                                    task_started.elapsed().as_millis() as u64,
                                )
                            }
                        }
                    }
                    None => flow.run(&unit, &ctx).await,
                };

                bump_progress(&completed, total, &progress);
                report
            });
            chunk_handles.push((unit_index, handle));
        }

        // 等待本批所有任务完成，在单一累计点折叠统计
        for (unit_index, handle) in chunk_handles {
            match handle.await {
                Ok(report) => run.record(&report),
                Err(e) => {
                    error!("[单元 {}] 任务执行失败: {}", unit_index, e);
                    run.record(&UnitReport {
                        unit_id: format!("unit_{}", unit_index),
                        student_name: None,
                        score: None,
                        outcome: crate::models::batch::UnitOutcome::Failed,
                        ledger: Default::default(),
                        latency_ms: 0,
                        error: Some(("TaskError".to_string(), e.to_string())),
                    });
                }
            }
        }

        logging::log_chunk_complete(chunk_num, run.successful(), run.failed());

        // 批间限速：还有下一批且未到截止时间时等待
        let more_chunks = chunk_start + chunk.len() < total;
        if more_chunks && config.chunk_delay_ms > 0 {
            info!("⏳ 等待 {} ms 后派发下一批...", config.chunk_delay_ms);
            tokio::time::sleep(Duration::from_millis(config.chunk_delay_ms)).await;
        }
    }

    let summary = run.finalize();

    // 发后即忘的摘要通知——失败绝不影响批次结果
    notifier.send_batch_summary(&summary).await;

    Ok(summary)
}

fn bump_progress(
    completed: &Arc<AtomicUsize>,
    total: usize,
    progress: &Option<ProgressCallback>,
) {
    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
    if let Some(callback) = progress {
        callback(done, total);
    }
}
