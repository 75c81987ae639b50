//! 身份匹配服务 - 业务能力层
//!
//! 把自由文本身份标识解析为花名册中的学生记录。
//! 纯字符串相似度，刻意不依赖 AI——完全确定性，无网络即可单测。
//!
//! 接受规则：最佳候选相似度 ≥ 阈值，且领先第二名至少 margin 个百分点。
//! 差距不足视为歧义，返回错误交由人工裁决，绝不静默取最优。

use unicode_normalization::UnicodeNormalization;

use crate::config::Config;
use crate::error::MatchError;
use crate::models::roster::{RosterEntry, RosterScope};

/// 匹配结果：学生 + 置信度（0-100）
#[derive(Debug, Clone)]
pub struct StudentMatch {
    pub student: RosterEntry,
    pub confidence: f64,
}

/// 身份匹配服务
pub struct Matcher {
    threshold: f64,
    margin: f64,
}

impl Matcher {
    pub fn new(config: &Config) -> Self {
        Self {
            threshold: config.match_threshold,
            margin: config.match_margin,
        }
    }

    /// 使用自定义阈值创建
    pub fn with_limits(threshold: f64, margin: f64) -> Self {
        Self { threshold, margin }
    }

    /// 在范围内的花名册条目中解析身份标识
    pub fn match_student(
        &self,
        token: &str,
        roster: &[RosterEntry],
        scope: &RosterScope,
    ) -> Result<StudentMatch, MatchError> {
        let candidates = scope.filter(roster);
        if candidates.is_empty() {
            return Err(MatchError::EmptyRoster {
                scope: scope.to_string(),
            });
        }

        // 每个条目取所有姓名拆分策略中的最高相似度
        let mut scored: Vec<(&RosterEntry, f64)> = candidates
            .iter()
            .map(|entry| (*entry, best_similarity(token, &entry.name)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        let (best, best_score) = scored[0];

        if best_score < self.threshold {
            return Err(MatchError::NotFound {
                token: token.to_string(),
                best_name: best.name.clone(),
                best_score,
                threshold: self.threshold,
            });
        }

        if let Some((second, second_score)) = scored.get(1).copied() {
            // 精确匹配（归一化后完全相等）只要独占第一名就直接接受
            let exact_and_unique = best_score >= 100.0 && second_score < 100.0;
            if !exact_and_unique && best_score - second_score < self.margin {
                return Err(MatchError::Ambiguous {
                    token: token.to_string(),
                    first_name: best.name.clone(),
                    first_score: best_score,
                    second_name: second.name.clone(),
                    second_score,
                    margin: self.margin,
                });
            }
        }

        Ok(StudentMatch {
            student: best.clone(),
            confidence: best_score,
        })
    }
}

/// 归一化姓名：NFD 分解去除变音符号，小写，只保留字母数字、空格和连字符
pub fn normalize_name(name: &str) -> String {
    name.nfd()
        .filter(|c| !unicode_normalization::char::is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ' || *c == '-')
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Levenshtein 编辑距离（按字符计）
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// 两个字符串的相似度百分比（归一化编辑距离）
pub fn similarity(a: &str, b: &str) -> f64 {
    let na = normalize_name(a);
    let nb = normalize_name(b);

    if na == nb {
        return 100.0;
    }

    let max_len = na.chars().count().max(nb.chars().count());
    if max_len == 0 {
        return 0.0;
    }

    let distance = levenshtein(&na, &nb);
    ((max_len - distance.min(max_len)) as f64 / max_len as f64 * 100.0).clamp(0.0, 100.0)
}

/// 标识与一个花名册姓名的最佳相似度
///
/// 姓名写法不统一，逐一尝试多种拆分：
/// - "Apellido, Nombre"：取逗号前的姓氏
/// - 无逗号：每个单词、首/末 1-2 个词的组合
/// - 完整姓名（去掉逗号）
fn best_similarity(token: &str, roster_name: &str) -> f64 {
    let mut scores = Vec::new();

    if let Some((surname, _)) = roster_name.split_once(',') {
        scores.push(similarity(token, surname.trim()));
    } else {
        let parts: Vec<&str> = roster_name.split_whitespace().collect();
        for part in &parts {
            scores.push(similarity(token, part));
        }
        if parts.len() >= 2 {
            scores.push(similarity(token, &parts[parts.len() - 2..].join(" ")));
            scores.push(similarity(token, &parts[..2].join(" ")));
        }
    }

    let full_name = roster_name.replace(',', " ");
    scores.push(similarity(token, &full_name));

    scores.into_iter().fold(0.0, f64::max)
}
