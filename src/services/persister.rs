//! 评估结果持久化服务 - 业务能力层
//!
//! [`EvaluationStore`] 是外部协作方契约：按自然键 (studentId, subject, topic)
//! 原子且幂等地 upsert。重复处理同一单元覆盖旧记录，绝不产生重复行。
//!
//! [`JsonFileStore`] 是文件实现：整库一个 JSON 文档，写临时文件后原子
//! rename。任何写入失败都是可重试的 `PersistError`——上游全部成功但落库
//! 失败的单元仍然判失败，流水线从不在没有持久化的情况下报告成功。

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::{EvalError, PersistError};
use crate::models::batch::RetryPolicy;
use crate::models::evaluation::{EvaluationKey, EvaluationResult};

/// 评估结果存储抽象
#[async_trait]
pub trait EvaluationStore: Send + Sync {
    /// 原子 upsert：同一自然键覆盖而非新增
    async fn upsert(&self, result: &EvaluationResult) -> Result<(), PersistError>;
    /// 自然键是否已有落库结果（幂等续跑的依据）
    async fn exists(&self, key: &EvaluationKey) -> Result<bool, PersistError>;
    /// 读取单条记录
    async fn find_by_key(
        &self,
        key: &EvaluationKey,
    ) -> Result<Option<EvaluationResult>, PersistError>;
}

/// 单 JSON 文件存储
///
/// 进程内写操作经由互斥锁串行化；落盘走 tmp + rename，崩溃时
/// 要么保留旧文档要么是完整新文档，不会出现半写状态。
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    async fn load_all(&self) -> Result<BTreeMap<String, EvaluationResult>, PersistError> {
        match fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => {
                serde_json::from_str(&content).map_err(|e| PersistError::Corrupted {
                    path: self.path.display().to_string(),
                    message: e.to_string(),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(PersistError::ReadFailed {
                path: self.path.display().to_string(),
                message: e.to_string(),
            }),
        }
    }

    async fn store_all(
        &self,
        records: &BTreeMap<String, EvaluationResult>,
    ) -> Result<(), PersistError> {
        let json =
            serde_json::to_string_pretty(records).map_err(|e| PersistError::WriteFailed {
                path: self.path.display().to_string(),
                message: e.to_string(),
            })?;

        let tmp_path = self.path.with_extension("json.tmp");
        let write_err = |e: std::io::Error| PersistError::WriteFailed {
            path: self.path.display().to_string(),
            message: e.to_string(),
        };

        fs::write(&tmp_path, json).await.map_err(write_err)?;
        fs::rename(&tmp_path, &self.path).await.map_err(write_err)?;
        Ok(())
    }
}

#[async_trait]
impl EvaluationStore for JsonFileStore {
    async fn upsert(&self, result: &EvaluationResult) -> Result<(), PersistError> {
        let _guard = self.write_lock.lock().await;

        let mut records = self.load_all().await?;

        let mut record = result.clone();
        if let Some(previous) = records.get(&record.id) {
            // 覆盖时保留首次创建时间
            record.created_at = previous.created_at.clone();
            record.updated_at = chrono::Utc::now().to_rfc3339();
            debug!("覆盖已有评估记录: {}", record.id);
        }

        records.insert(record.id.clone(), record);
        self.store_all(&records).await
    }

    async fn exists(&self, key: &EvaluationKey) -> Result<bool, PersistError> {
        Ok(self.load_all().await?.contains_key(&key.record_id()))
    }

    async fn find_by_key(
        &self,
        key: &EvaluationKey,
    ) -> Result<Option<EvaluationResult>, PersistError> {
        Ok(self.load_all().await?.get(&key.record_id()).cloned())
    }
}

/// 持久化服务：在存储之上套重试策略
pub struct Persister {
    store: Arc<dyn EvaluationStore>,
    retry: RetryPolicy,
}

impl Persister {
    pub fn new(store: Arc<dyn EvaluationStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// 带重试的落库
    pub async fn persist(
        &self,
        result: &EvaluationResult,
        unit_index: usize,
    ) -> Result<(), EvalError> {
        let mut last_error = None;

        for attempt in 1..=self.retry.max_attempts {
            match self.store.upsert(result).await {
                Ok(()) => {
                    info!(
                        "[单元 {}] ✓ 评估已落库: {} (分数: {})",
                        unit_index, result.id, result.score
                    );
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        "[单元 {}] ⚠️ 落库尝试 {}/{} 失败: {}",
                        unit_index, attempt, self.retry.max_attempts, e
                    );
                    if attempt < self.retry.max_attempts {
                        tokio::time::sleep(self.retry.delay_for(attempt)).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| PersistError::WriteFailed {
                path: String::new(),
                message: "未产生任何尝试".to_string(),
            })
            .into())
    }

    /// 自然键是否已有结果——幂等续跑的检查
    ///
    /// 读失败按"未评估"处理：宁可重评一次，也不能因存储抖动丢掉单元。
    pub async fn already_evaluated(&self, key: &EvaluationKey) -> bool {
        match self.store.exists(key).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!("检查评估记录失败，按未评估处理: {}", e);
                false
            }
        }
    }
}
