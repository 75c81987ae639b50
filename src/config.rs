/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 同时处理的提交单元数量
    pub max_concurrent_units: usize,
    /// 可重试错误的最大尝试次数（含首次）
    pub retry_attempts: u32,
    /// 重试退避基础延迟（毫秒）
    pub retry_base_delay_ms: u64,
    /// 重试退避延迟上限（毫秒）
    pub retry_max_delay_ms: u64,
    /// 批次之间的限速延迟（毫秒）
    pub chunk_delay_ms: u64,
    /// 整个批次的截止时间（秒，0 表示不限）
    pub batch_deadline_secs: u64,
    /// 单次运行最多处理的单元数（0 表示不限）
    pub max_units: usize,
    /// 考试文件目录
    pub submissions_folder: String,
    /// 花名册 TOML 文件
    pub roster_file: String,
    /// 评分量表 TOML 文件
    pub rubric_file: String,
    /// 评估结果存储文件
    pub evaluations_file: String,
    /// 输出日志文件
    pub output_log_file: String,
    // --- 匹配配置 ---
    /// 最低接受相似度（百分比）
    pub match_threshold: f64,
    /// 与第二名候选的最小差距（百分比）
    pub match_margin: f64,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    /// 评分模型
    pub analyzer_model_name: String,
    /// 反馈生成模型
    pub generator_model_name: String,
    /// 每百万输入 token 的价格（美元）
    pub llm_input_price_per_mtok: f64,
    /// 每百万输出 token 的价格（美元）
    pub llm_output_price_per_mtok: f64,
    /// 反馈正文的最大长度（字符）
    pub feedback_max_chars: usize,
    /// 批次摘要通知 webhook（为空则不通知）
    pub summary_webhook_url: String,
    // --- 课程范围（操作员过滤）---
    pub subject: String,
    pub exam_topic: String,
    pub academic_year: String,
    pub division: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_units: 5,
            retry_attempts: 3,
            retry_base_delay_ms: 2_000,
            retry_max_delay_ms: 30_000,
            chunk_delay_ms: 1_000,
            batch_deadline_secs: 0,
            max_units: 0,
            submissions_folder: "submissions".to_string(),
            roster_file: "roster.toml".to_string(),
            rubric_file: "rubric.toml".to_string(),
            evaluations_file: "evaluations.json".to_string(),
            output_log_file: "output.txt".to_string(),
            match_threshold: 90.0,
            match_margin: 5.0,
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            analyzer_model_name: "gpt-4o-mini".to_string(),
            generator_model_name: "gpt-4o-mini".to_string(),
            llm_input_price_per_mtok: 1.0,
            llm_output_price_per_mtok: 5.0,
            feedback_max_chars: 12_000,
            summary_webhook_url: String::new(),
            subject: "Física".to_string(),
            exam_topic: String::new(),
            academic_year: String::new(),
            division: String::new(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            max_concurrent_units: std::env::var("MAX_CONCURRENT_UNITS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_concurrent_units),
            retry_attempts: std::env::var("RETRY_ATTEMPTS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.retry_attempts),
            retry_base_delay_ms: std::env::var("RETRY_BASE_DELAY_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.retry_base_delay_ms),
            retry_max_delay_ms: std::env::var("RETRY_MAX_DELAY_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.retry_max_delay_ms),
            chunk_delay_ms: std::env::var("CHUNK_DELAY_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.chunk_delay_ms),
            batch_deadline_secs: std::env::var("BATCH_DEADLINE_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.batch_deadline_secs),
            max_units: std::env::var("MAX_UNITS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_units),
            submissions_folder: std::env::var("SUBMISSIONS_FOLDER").unwrap_or(default.submissions_folder),
            roster_file: std::env::var("ROSTER_FILE").unwrap_or(default.roster_file),
            rubric_file: std::env::var("RUBRIC_FILE").unwrap_or(default.rubric_file),
            evaluations_file: std::env::var("EVALUATIONS_FILE").unwrap_or(default.evaluations_file),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            match_threshold: std::env::var("MATCH_THRESHOLD").ok().and_then(|v| v.parse().ok()).unwrap_or(default.match_threshold),
            match_margin: std::env::var("MATCH_MARGIN").ok().and_then(|v| v.parse().ok()).unwrap_or(default.match_margin),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(default.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            analyzer_model_name: std::env::var("ANALYZER_MODEL_NAME").unwrap_or(default.analyzer_model_name),
            generator_model_name: std::env::var("GENERATOR_MODEL_NAME").unwrap_or(default.generator_model_name),
            llm_input_price_per_mtok: std::env::var("LLM_INPUT_PRICE_PER_MTOK").ok().and_then(|v| v.parse().ok()).unwrap_or(default.llm_input_price_per_mtok),
            llm_output_price_per_mtok: std::env::var("LLM_OUTPUT_PRICE_PER_MTOK").ok().and_then(|v| v.parse().ok()).unwrap_or(default.llm_output_price_per_mtok),
            feedback_max_chars: std::env::var("FEEDBACK_MAX_CHARS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.feedback_max_chars),
            summary_webhook_url: std::env::var("SUMMARY_WEBHOOK_URL").unwrap_or(default.summary_webhook_url),
            subject: std::env::var("SUBJECT").unwrap_or(default.subject),
            exam_topic: std::env::var("EXAM_TOPIC").unwrap_or(default.exam_topic),
            academic_year: std::env::var("ACADEMIC_YEAR").unwrap_or(default.academic_year),
            division: std::env::var("DIVISION").unwrap_or(default.division),
        }
    }
}
