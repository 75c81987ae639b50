use serde::{Deserialize, Serialize};

/// 提交单元的类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitKind {
    /// 考试转录文件——身份需要从文件名/内容中提取并匹配
    ExamFile,
    /// 周报——学生身份在创建时已知，跳过解析和匹配阶段
    WeeklyReport,
}

impl UnitKind {
    /// 日志显示用的类型标签
    pub fn label(self) -> &'static str {
        match self {
            UnitKind::ExamFile => "考试文件",
            UnitKind::WeeklyReport => "周报",
        }
    }
}

/// 一份待评分的学生提交
#[derive(Debug, Clone)]
pub struct SubmissionUnit {
    /// 单元 id（文件名或报告 id）
    pub id: String,
    /// 来源引用（文件路径或报告编号）
    pub source: String,
    /// 原始提交内容
    pub raw_content: String,
    /// 已知的学生 id（周报单元携带，考试文件为 None）
    pub student_id: Option<String>,
    pub subject: String,
    pub topic: String,
    pub kind: UnitKind,
}

impl SubmissionUnit {
    /// 从考试文件构造单元
    pub fn exam_file(
        file_name: impl Into<String>,
        source: impl Into<String>,
        raw_content: impl Into<String>,
        subject: impl Into<String>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            id: file_name.into(),
            source: source.into(),
            raw_content: raw_content.into(),
            student_id: None,
            subject: subject.into(),
            topic: topic.into(),
            kind: UnitKind::ExamFile,
        }
    }

    /// 从周报构造单元（身份已知）
    pub fn weekly_report(
        report_id: impl Into<String>,
        student_id: impl Into<String>,
        raw_content: impl Into<String>,
        subject: impl Into<String>,
        topic: impl Into<String>,
    ) -> Self {
        let report_id = report_id.into();
        Self {
            source: report_id.clone(),
            id: report_id,
            raw_content: raw_content.into(),
            student_id: Some(student_id.into()),
            subject: subject.into(),
            topic: topic.into(),
            kind: UnitKind::WeeklyReport,
        }
    }
}

/// 从提交内容中解析出的单个练习
#[derive(Debug, Clone, PartialEq)]
pub struct Exercise {
    pub number: u32,
    pub title: Option<String>,
    pub content: String,
    /// 练习下方是否有作答内容
    pub has_answer: bool,
}

/// Parser 的输出：身份标识 + 结构化练习列表
///
/// 无法识别结构的内容保留为单个完整块，不会被丢弃。
#[derive(Debug, Clone)]
pub struct ParsedSubmission {
    pub identity_token: String,
    pub exercises: Vec<Exercise>,
}
