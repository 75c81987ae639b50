use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::fs;

use crate::models::roster::RosterEntry;
use crate::models::rubric::Rubric;
use crate::models::submission::SubmissionUnit;

/// 从 TOML 文件加载评分量表并在加载时完成校验
///
/// 权重之和等结构性校验只在这里执行一次，不在每次评估时重复。
pub async fn load_rubric(path: &Path) -> Result<Rubric> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("无法读取评分量表文件: {}", path.display()))?;

    let rubric: Rubric = toml::from_str(&content)
        .with_context(|| format!("无法解析评分量表文件: {}", path.display()))?;

    rubric
        .validate()
        .with_context(|| format!("评分量表校验失败: {}", path.display()))?;

    tracing::info!(
        "✓ 评分量表已加载: {} ({} 个阶段)",
        rubric.name,
        rubric.phases.len()
    );

    Ok(rubric)
}

#[derive(Debug, Deserialize)]
struct RosterFile {
    #[serde(rename = "student")]
    students: Vec<RosterEntry>,
}

/// 从 TOML 文件加载花名册
pub async fn load_roster(path: &Path) -> Result<Vec<RosterEntry>> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("无法读取花名册文件: {}", path.display()))?;

    let roster: RosterFile = toml::from_str(&content)
        .with_context(|| format!("无法解析花名册文件: {}", path.display()))?;

    tracing::info!("✓ 花名册已加载: {} 名学生", roster.students.len());

    Ok(roster.students)
}

/// 扫描目录，把所有 .md 考试文件加载为提交单元
///
/// 单个文件读取失败只记警告并继续，不影响其余文件。
pub async fn load_submission_units(
    folder_path: &str,
    subject: &str,
    topic: &str,
) -> Result<Vec<SubmissionUnit>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        anyhow::bail!("提交目录不存在: {}", folder_path);
    }

    let mut units = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .with_context(|| format!("无法读取提交目录: {}", folder_path))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("md") {
            continue;
        }

        let file_name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        tracing::info!("正在加载: {}", file_name);

        match fs::read_to_string(&path).await {
            Ok(raw_content) => {
                units.push(SubmissionUnit::exam_file(
                    file_name,
                    path.to_string_lossy().to_string(),
                    raw_content,
                    subject,
                    topic,
                ));
            }
            Err(e) => {
                tracing::warn!("加载文件失败 {}: {}", path.display(), e);
            }
        }
    }

    // 让派发顺序与目录列表顺序无关，稳定可复现
    units.sort_by(|a, b| a.id.cmp(&b.id));

    Ok(units)
}
