use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ExportError;

/// Admin data sets that can be exported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BusinessType {
    User,
    Role,
    Category,
    Tag,
    Comment,
    BlackList,
    LoginLog,
    OperateLog,
}

impl BusinessType {
    pub const ALL: [BusinessType; 8] = [
        BusinessType::User,
        BusinessType::Role,
        BusinessType::Category,
        BusinessType::Tag,
        BusinessType::Comment,
        BusinessType::BlackList,
        BusinessType::LoginLog,
        BusinessType::OperateLog,
    ];

    /// Code used in export URLs
    pub fn code(&self) -> &'static str {
        match self {
            BusinessType::User => "user",
            BusinessType::Role => "role",
            BusinessType::Category => "category",
            BusinessType::Tag => "tag",
            BusinessType::Comment => "comment",
            BusinessType::BlackList => "blackList",
            BusinessType::LoginLog => "loginLog",
            BusinessType::OperateLog => "operateLog",
        }
    }

    /// Name used for default export file names
    pub fn display_name(&self) -> &'static str {
        match self {
            BusinessType::User => "用户数据",
            BusinessType::Role => "角色数据",
            BusinessType::Category => "分类数据",
            BusinessType::Tag => "标签数据",
            BusinessType::Comment => "评论数据",
            BusinessType::BlackList => "黑名单数据",
            BusinessType::LoginLog => "登录日志",
            BusinessType::OperateLog => "操作日志",
        }
    }
}

impl fmt::Display for BusinessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for BusinessType {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Accept both `blackList` and the backend's `BLACK_LIST` spelling
        let wanted: String = s.chars().filter(|c| *c != '_' && *c != '-').collect();
        BusinessType::ALL
            .into_iter()
            .find(|bt| bt.code().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| ExportError::UnknownBusinessType(s.to_string()))
    }
}

/// Export file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Excel,
    Html,
}

impl ExportFormat {
    pub fn code(&self) -> &'static str {
        match self {
            ExportFormat::Excel => "excel",
            ExportFormat::Html => "html",
        }
    }

    pub fn file_extension(&self) -> &'static str {
        match self {
            ExportFormat::Excel => "xlsx",
            ExportFormat::Html => "html",
        }
    }

    /// Case-insensitive match against a type name the backend reports.
    pub fn matches(&self, reported: &str) -> bool {
        self.code().eq_ignore_ascii_case(reported.trim())
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [ExportFormat::Excel, ExportFormat::Html]
            .into_iter()
            .find(|f| f.matches(s))
            .ok_or_else(|| ExportError::UnknownFormat(s.to_string()))
    }
}
