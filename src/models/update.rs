// 备份记录与升级结果

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 一个已完成的备份归档（创建后不可修改）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
}

/// 升级/结构检查结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateResult {
    pub success: bool,
    pub backup_created: bool,
    pub backup_path: Option<PathBuf>,
    pub files_updated: Vec<PathBuf>,
    pub structure_verified: bool,
    pub message: String,
}

impl UpdateResult {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            ..Self::default()
        }
    }

    /// 备份之后的步骤失败，保留备份路径以便恢复
    pub fn failed_after_backup(backup: &BackupRecord, message: impl Into<String>) -> Self {
        Self {
            success: false,
            backup_created: true,
            backup_path: Some(backup.path.clone()),
            message: message.into(),
            ..Self::default()
        }
    }
}
