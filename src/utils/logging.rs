/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use std::fs;

use anyhow::Result;
use tracing::info;

use crate::config::Config;
use crate::models::batch::BatchSummary;

/// 初始化 tracing 订阅器（环境变量 RUST_LOG 可覆盖级别）
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}

/// 初始化日志文件
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n批量评分日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 批量评分模式");
    info!("📊 最大并发数: {}", config.max_concurrent_units);
    info!("📚 课程: {} - {}", config.subject, config.exam_topic);
    info!("{}", "=".repeat(60));
}

/// 记录提交加载信息
pub fn log_units_loaded(total: usize, max_concurrent: usize) {
    info!("✓ 找到 {} 个待评分的提交", total);
    info!("📋 将以每批 {} 个的方式处理", max_concurrent);
    info!("💡 每批完成后等待限速延迟再开始下一批\n");
}

/// 记录批次开始信息
pub fn log_chunk_start(
    chunk_num: usize,
    total_chunks: usize,
    start: usize,
    end: usize,
    total: usize,
) {
    info!("\n{}", "=".repeat(60));
    info!("📦 开始处理第 {}/{} 批", chunk_num, total_chunks);
    info!("📄 本批提交: {}-{} / 共 {} 个", start, end, total);
    info!("{}", "=".repeat(60));
}

/// 记录批次完成信息
pub fn log_chunk_complete(chunk_num: usize, successful: usize, failed: usize) {
    info!("\n{}", "─".repeat(60));
    info!(
        "✓ 第 {} 批完成: 累计成功 {} / 失败 {}",
        chunk_num, successful, failed
    );
    info!("{}", "─".repeat(60));
}

/// 打印最终统计信息
pub fn print_final_stats(summary: &BatchSummary, config: &Config) {
    info!("\n{}", "=".repeat(60));
    info!("📊 批次 {} 处理完成统计", summary.batch_id);
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", summary.successful, summary.total);
    info!("⏭️ 跳过(已有结果): {}", summary.skipped);
    info!("❌ 失败: {}", summary.failed);
    if summary.successful > 0 {
        info!("📈 平均分: {}/100", summary.avg_score);
    }
    info!(
        "💰 总花费: ${:.6} (输入 {} / 输出 {} tokens)",
        summary.total_cost_usd, summary.total_tokens_input, summary.total_tokens_output
    );
    info!("⏱️ 总耗时: {:.1}s", summary.total_latency_ms as f64 / 1000.0);
    if !summary.failed_units.is_empty() {
        info!("{}", "─".repeat(60));
        info!("失败明细 (按错误分类排查):");
        for failure in &summary.failed_units {
            info!(
                "  ❌ {} [{}] {}",
                failure.unit_id, failure.error_class, failure.message
            );
        }
    }
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", config.output_log_file);
}

/// 截断长文本用于日志显示
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
