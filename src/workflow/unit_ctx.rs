//! 单元处理上下文
//!
//! 封装"我正在处理这一批里的哪份提交"这一信息

use std::fmt::Display;

/// 单元处理上下文
#[derive(Debug, Clone)]
pub struct UnitCtx {
    /// 单元 id（文件名或报告 id）
    pub unit_id: String,

    /// 单元在批次中的序号（从 1 开始，仅用于日志显示）
    pub unit_index: usize,

    /// 科目
    pub subject: String,

    /// 考试/报告主题
    pub topic: String,
}

impl UnitCtx {
    /// 创建新的单元上下文
    pub fn new(unit_id: String, unit_index: usize, subject: String, topic: String) -> Self {
        Self {
            unit_id,
            unit_index,
            subject,
            topic,
        }
    }
}

impl Display for UnitCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[单元 #{} {} | {} - {}]",
            self.unit_index, self.unit_id, self.subject, self.topic
        )
    }
}
