//! 提交解析服务 - 业务能力层
//!
//! 只负责"从原始提交中提取身份标识和练习结构"，纯函数，无副作用。
//!
//! 身份标识提取策略：
//! 1. 文件名模式（首选）："Rosiello_Ana.md" → "Rosiello"
//! 2. 内容首个非空行（兜底）
//!
//! 练习按 `## Ejercicio N` / `## N` 标记切分；识别不出结构的内容
//! 保留为单个完整块，绝不丢弃。

use std::sync::OnceLock;

use regex::Regex;

use crate::error::ParseError;
use crate::models::submission::{Exercise, ParsedSubmission, SubmissionUnit};

fn exercise_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^Ejercicio\s+(\d+)\s*:?\s*(.*)$").unwrap())
}

fn numeric_heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)\s*:?\s*(.*)$").unwrap())
}

fn section_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^## ").unwrap())
}

/// 从文件名中提取身份标识（通常是姓氏）
///
/// 支持的格式：
/// - "Rosiello.md" → "Rosiello"
/// - "Rosiello_Ana.md" → "Rosiello"
/// - "Di_Bernardo_Ana.md" → "Di Bernardo"（复合姓氏取前两个词）
///
/// 下划线和连字符统一转为空格；一个词直接返回，两个词取第一个，
/// 三个以上取前两个作为复合姓氏。
pub fn extract_identity_token(file_name: &str) -> Option<String> {
    let stem = file_name
        .rsplit_once('.')
        .map(|(name, _ext)| name)
        .unwrap_or(file_name);

    let normalized = stem.replace(['_', '-'], " ");
    let parts: Vec<&str> = normalized.split_whitespace().collect();

    match parts.len() {
        0 => None,
        1 => Some(parts[0].to_string()),
        2 => Some(parts[0].to_string()),
        _ => Some(format!("{} {}", parts[0], parts[1])),
    }
}

/// 内容首个非空行，作为身份标识的兜底来源
fn first_content_line(content: &str) -> Option<String> {
    content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.trim_matches(['#', '*', '>', ' ']).to_string())
        .filter(|line| !line.is_empty())
}

/// 按 `## ` 二级标题切分练习
///
/// 先尝试 "Ejercicio N" 格式，一个都没有时回退为纯数字标题格式。
pub fn parse_exercises(content: &str) -> Vec<Exercise> {
    // 首段是第一个标记之前的导语（或空串），不属于任何练习
    let sections: Vec<&str> = section_marker_re().split(content).skip(1).collect();

    let mut exercises = collect_exercises(&sections, exercise_re());

    if exercises.is_empty() {
        exercises = collect_exercises(&sections, numeric_heading_re());
    }

    exercises.sort_by_key(|e| e.number);
    exercises
}

fn collect_exercises(sections: &[&str], re: &Regex) -> Vec<Exercise> {
    let mut exercises = Vec::new();
    for section in sections {
        let mut lines = section.lines();
        let first_line = lines.next().unwrap_or("").trim();

        if let Some(caps) = re.captures(first_line) {
            let number: u32 = match caps[1].parse() {
                Ok(n) => n,
                Err(_) => continue,
            };
            let title = caps
                .get(2)
                .map(|m| m.as_str().trim().to_string())
                .filter(|t| !t.is_empty());
            let body = lines.collect::<Vec<_>>().join("\n").trim().to_string();
            let has_answer = !body.is_empty();

            exercises.push(Exercise {
                number,
                title,
                content: body,
                has_answer,
            });
        }
    }
    exercises
}

/// 解析一份提交：身份标识 + 练习列表
///
/// 只有当文件名和内容都无法提供身份标识时才返回 `ParseError`。
pub fn parse_submission(unit: &SubmissionUnit) -> Result<ParsedSubmission, ParseError> {
    if unit.raw_content.trim().is_empty() {
        return Err(ParseError::EmptyContent {
            file_name: unit.id.clone(),
        });
    }

    let identity_token = extract_identity_token(&unit.id)
        .or_else(|| first_content_line(&unit.raw_content))
        .ok_or_else(|| ParseError::MissingIdentity {
            file_name: unit.id.clone(),
        })?;

    let mut exercises = parse_exercises(&unit.raw_content);

    if exercises.is_empty() {
        // 没有编号练习的实验报告/小论文：整个文档作为一个练习块
        exercises.push(Exercise {
            number: 1,
            title: Some("Informe Completo".to_string()),
            content: unit.raw_content.trim().to_string(),
            has_answer: true,
        });
    }

    Ok(ParsedSubmission {
        identity_token,
        exercises,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::submission::SubmissionUnit;

    fn exam(file_name: &str, content: &str) -> SubmissionUnit {
        SubmissionUnit::exam_file(file_name, file_name, content, "Física", "Tiro Oblicuo")
    }

    #[test]
    fn test_identity_from_single_word_filename() {
        assert_eq!(
            extract_identity_token("Rosiello.md"),
            Some("Rosiello".to_string())
        );
    }

    #[test]
    fn test_identity_from_surname_name_filename() {
        assert_eq!(
            extract_identity_token("Rosiello_Ana.md"),
            Some("Rosiello".to_string())
        );
        assert_eq!(
            extract_identity_token("Rosiello Ana.md"),
            Some("Rosiello".to_string())
        );
    }

    #[test]
    fn test_identity_from_compound_surname_filename() {
        assert_eq!(
            extract_identity_token("Di_Bernardo_Ana.md"),
            Some("Di Bernardo".to_string())
        );
        assert_eq!(
            extract_identity_token("García-López-María.md"),
            Some("García López".to_string())
        );
    }

    #[test]
    fn test_identity_falls_back_to_first_content_line() {
        let unit = exam(".md", "\n\n**Suárez**\n\n## Ejercicio 1\nrespuesta");
        let parsed = parse_submission(&unit).unwrap();
        assert_eq!(parsed.identity_token, "Suárez");
    }

    #[test]
    fn test_empty_content_is_parse_error() {
        let unit = exam("Rosiello.md", "   \n  ");
        assert!(matches!(
            parse_submission(&unit),
            Err(ParseError::EmptyContent { .. })
        ));
    }

    #[test]
    fn test_exercises_with_ejercicio_headers() {
        let content = "# Examen de Física\n\n\
                       ## Ejercicio 1: Calcular alcance\nv0 = 20 m/s\nR = 35 m\n\n\
                       ## Ejercicio 2: Altura máxima\n\n\
                       ## Ejercicio 3\nh = 5.1 m";
        let exercises = parse_exercises(content);
        assert_eq!(exercises.len(), 3);
        assert_eq!(exercises[0].number, 1);
        assert_eq!(exercises[0].title.as_deref(), Some("Calcular alcance"));
        assert!(exercises[0].has_answer);
        assert!(!exercises[1].has_answer);
        assert_eq!(exercises[2].title, None);
    }

    #[test]
    fn test_exercises_with_bare_numeric_headers() {
        let content = "## 1: Planteo\ndatos\n\n## 2\nresolución";
        let exercises = parse_exercises(content);
        assert_eq!(exercises.len(), 2);
        assert_eq!(exercises[0].title.as_deref(), Some("Planteo"));
    }

    #[test]
    fn test_unstructured_content_kept_as_single_block() {
        let unit = exam(
            "Gonzalez.md",
            "Informe de laboratorio sobre péndulo simple.\nMediciones y conclusiones...",
        );
        let parsed = parse_submission(&unit).unwrap();
        assert_eq!(parsed.exercises.len(), 1);
        assert_eq!(parsed.exercises[0].number, 1);
        assert!(parsed.exercises[0].content.contains("péndulo"));
        assert!(parsed.exercises[0].has_answer);
    }

    #[test]
    fn test_exercises_sorted_by_number() {
        let content = "## Ejercicio 3\nc\n\n## Ejercicio 1\na\n\n## Ejercicio 2\nb";
        let numbers: Vec<u32> = parse_exercises(content).iter().map(|e| e.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }
}
