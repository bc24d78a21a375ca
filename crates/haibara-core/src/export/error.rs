use std::path::PathBuf;

use thiserror::Error;

use crate::api::ApiError;

use super::{BusinessType, ExportFormat};

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("No permission to export {0}")]
    PermissionDenied(BusinessType),

    #[error("{business} does not support {format} export")]
    UnsupportedFormat {
        business: BusinessType,
        format: ExportFormat,
    },

    #[error("An export is already in progress")]
    Busy,

    #[error("Unknown business type: {0}")]
    UnknownBusinessType(String),

    #[error("Unknown export format: {0}")]
    UnknownFormat(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("{} already exists", .0.display())]
    FileExists(PathBuf),

    #[error("Failed to write export file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExportError {
    /// Message suitable for showing to the person who asked for the export.
    pub fn user_message(&self) -> String {
        match self {
            ExportError::PermissionDenied(_) => "您没有导出该数据的权限，请联系管理员".to_string(),
            ExportError::UnsupportedFormat { format, .. } => {
                format!("该业务模块不支持{}格式导出", format.code().to_uppercase())
            }
            ExportError::Busy => "正在导出，请稍候".to_string(),
            ExportError::FileExists(path) => format!("文件已存在: {}", path.display()),
            ExportError::Io { path, source } => format!("文件写入失败: {} ({})", path.display(), source),
            ExportError::Api(e) if e.is_network() => "网络连接异常，请检查网络后重试".to_string(),
            ExportError::Api(e) if e.is_unauthorized() => "登录状态已过期，请重新登录".to_string(),
            _ => "导出失败，请稍后重试".to_string(),
        }
    }
}
