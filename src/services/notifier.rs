//! 批次摘要通知服务 - 业务能力层
//!
//! 批次终结后把摘要推送给外部协作方。发后即忘：
//! 通知失败只记日志，永远不会让批次本身失败。

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::models::batch::BatchSummary;

/// 批次摘要通知抽象
#[async_trait]
pub trait BatchNotifier: Send + Sync {
    async fn send_batch_summary(&self, summary: &BatchSummary);
}

/// Webhook 通知实现（POST JSON）
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    /// url 为空时退化为 no-op
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl BatchNotifier for WebhookNotifier {
    async fn send_batch_summary(&self, summary: &BatchSummary) {
        if self.url.is_empty() {
            debug!("未配置摘要 webhook，跳过通知");
            return;
        }

        match self.client.post(&self.url).json(summary).send().await {
            Ok(response) if response.status().is_success() => {
                info!("✓ 批次摘要已通知: {}", summary.batch_id);
            }
            Ok(response) => {
                warn!(
                    "⚠️ 批次摘要通知被拒绝 (HTTP {}): {}",
                    response.status(),
                    summary.batch_id
                );
            }
            Err(e) => {
                warn!("⚠️ 批次摘要通知失败 (不影响批次结果): {}", e);
            }
        }
    }
}
