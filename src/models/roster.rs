use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// 花名册中的一名学生
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: String,
    /// 姓名，支持 "Apellido, Nombre" 与 "Nombre Apellido" 两种写法
    pub name: String,
    pub academic_year: String,
    pub division: String,
    /// 选修科目列表，空表示不按科目过滤
    #[serde(default)]
    pub subjects: Vec<String>,
}

/// 匹配时的花名册过滤范围（科目 / 学年 / 班级）
///
/// 空字段表示该维度不过滤。
#[derive(Debug, Clone, Default)]
pub struct RosterScope {
    pub subject: String,
    pub academic_year: String,
    pub division: String,
}

impl RosterScope {
    /// 过滤出范围内的候选学生
    pub fn filter<'a>(&self, entries: &'a [RosterEntry]) -> Vec<&'a RosterEntry> {
        entries
            .iter()
            .filter(|e| {
                (self.academic_year.is_empty() || e.academic_year == self.academic_year)
                    && (self.division.is_empty() || e.division == self.division)
                    && (self.subject.is_empty()
                        || e.subjects.is_empty()
                        || e.subjects.iter().any(|s| s == &self.subject))
            })
            .collect()
    }
}

impl Display for RosterScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let part = |s: &str| if s.is_empty() { "*" } else { s }.to_string();
        write!(
            f,
            "{} / {} / {}",
            part(&self.subject),
            part(&self.academic_year),
            part(&self.division)
        )
    }
}
