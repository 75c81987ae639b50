use thiserror::Error;

/// 评分流水线错误类型
///
/// 错误分为两大阵营：
/// - **不可重试**：解析失败、身份匹配失败、服务商永久拒绝——需要人工介入，
///   重试只会浪费预算
/// - **可重试**：网络瞬时错误、频率限制、Schema 校验失败、持久化失败
///
/// 批次汇总按 [`EvalError::class`] 分组，操作员据此区分
/// "需要修正身份" / "瞬时错误可安全重跑" / "内容被服务商拒绝"。
#[derive(Debug, Error)]
pub enum EvalError {
    /// 提交内容解析错误
    #[error("解析错误: {0}")]
    Parse(#[from] ParseError),
    /// 学生身份匹配错误
    #[error("匹配错误: {0}")]
    Match(#[from] MatchError),
    /// AI 评分错误
    #[error("AI 分析错误: {0}")]
    Analyzer(#[from] AnalyzerError),
    /// 评估结果持久化错误
    #[error("持久化错误: {0}")]
    Persist(#[from] PersistError),
    /// 批次截止时间耗尽
    #[error("{0}")]
    Timeout(#[from] TimeoutError),
    /// 配置错误（评分量表、环境变量）
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

impl EvalError {
    /// 该错误是否值得在单元自己的任务内重试
    pub fn is_retryable(&self) -> bool {
        match self {
            EvalError::Analyzer(e) => e.is_retryable(),
            EvalError::Persist(_) => true,
            EvalError::Parse(_)
            | EvalError::Match(_)
            | EvalError::Timeout(_)
            | EvalError::Config(_) => false,
        }
    }

    /// 稳定的错误分类标签，用于批次汇总的失败列表分组
    pub fn class(&self) -> &'static str {
        match self {
            EvalError::Parse(_) => "ParseError",
            EvalError::Match(_) => "MatchError",
            EvalError::Analyzer(AnalyzerError::Transient { .. }) => "AnalyzerTransient",
            EvalError::Analyzer(AnalyzerError::Schema { .. }) => "AnalyzerSchema",
            EvalError::Analyzer(AnalyzerError::Policy { .. }) => "AnalyzerPolicy",
            EvalError::Persist(_) => "PersistError",
            EvalError::Timeout(_) => "TimeoutError",
            EvalError::Config(_) => "ConfigError",
        }
    }
}

/// 提交内容解析错误（不可重试）
#[derive(Debug, Error)]
pub enum ParseError {
    /// 文件名和内容首行都无法提供身份标识
    #[error("无法从文件名或内容中提取身份标识 (文件: {file_name})")]
    MissingIdentity { file_name: String },
    /// 提交内容为空
    #[error("提交内容为空 (文件: {file_name})")]
    EmptyContent { file_name: String },
}

/// 学生身份匹配错误（不可重试——需要人工修正，绝不静默猜测）
#[derive(Debug, Error)]
pub enum MatchError {
    /// 范围过滤后花名册为空
    #[error("花名册范围内没有候选学生 (范围: {scope})")]
    EmptyRoster { scope: String },
    /// 没有候选达到相似度阈值
    #[error(
        "未找到相似度达标的学生 (标识: \"{token}\", 最佳候选: \"{best_name}\" \
         {best_score:.1}%, 阈值: {threshold:.0}%)"
    )]
    NotFound {
        token: String,
        best_name: String,
        best_score: f64,
        threshold: f64,
    },
    /// 前两名候选差距小于最小间隔，拒绝歧义匹配
    #[error(
        "匹配存在歧义 (标识: \"{token}\", \"{first_name}\" {first_score:.1}% 与 \
         \"{second_name}\" {second_score:.1}% 差距不足 {margin:.0}%)"
    )]
    Ambiguous {
        token: String,
        first_name: String,
        first_score: f64,
        second_name: String,
        second_score: f64,
        margin: f64,
    },
}

/// AI 评分错误
#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// 网络/服务端瞬时错误或频率限制（可重试）
    #[error("LLM 调用瞬时失败 (模型: {model}): {message}")]
    Transient { model: String, message: String },
    /// 响应不符合评分 Schema（可重试——AI 输出永远不可信）
    #[error("LLM 响应不符合评分 Schema: {message}")]
    Schema { message: String },
    /// 服务商报告的永久拒绝，如内容政策（不可重试）
    #[error("LLM 服务商永久拒绝 (模型: {model}): {message}")]
    Policy { model: String, message: String },
}

impl AnalyzerError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AnalyzerError::Transient { .. } | AnalyzerError::Schema { .. }
        )
    }
}

/// 评估结果持久化错误（按瞬时基础设施故障处理，可重试）
#[derive(Debug, Error)]
pub enum PersistError {
    /// 写入存储失败
    #[error("写入评估记录失败 ({path}): {message}")]
    WriteFailed { path: String, message: String },
    /// 读取存储失败
    #[error("读取评估存储失败 ({path}): {message}")]
    ReadFailed { path: String, message: String },
    /// 存储内容无法解析
    #[error("评估存储内容损坏 ({path}): {message}")]
    Corrupted { path: String, message: String },
}

/// 批次截止时间耗尽——该运行内不再重试，下次运行可幂等续跑
#[derive(Debug, Error)]
#[error("单元在批次截止时间前未完成")]
pub struct TimeoutError;

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 量表权重之和超出 100±1 容差
    #[error("评分量表 {rubric_id} 的权重之和必须为 100 (±1)，实际为 {total}")]
    InvalidWeights { rubric_id: String, total: i64 },
    /// 量表没有任何阶段
    #[error("评分量表 {rubric_id} 缺少阶段定义")]
    EmptyRubric { rubric_id: String },
    /// 阶段的等级描述数量不是 4
    #[error("阶段 {phase_id} 必须恰好有 4 个等级描述，实际为 {count}")]
    InvalidLevels { phase_id: String, count: usize },
    /// 阶段 id 重复
    #[error("评分量表 {rubric_id} 中阶段 id {phase_id} 重复")]
    DuplicatePhase { rubric_id: String, phase_id: String },
}

/// 评分流水线结果类型
pub type EvalResult<T> = Result<T, EvalError>;
