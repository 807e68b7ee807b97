//! 统一错误类型定义
//!
//! 使用 `thiserror` 定义安装、升级、备份流程的错误类型。
//! 所有错误的 Display 文本都可以直接展示给用户。
//!
//! 注意：工具检测失败不属于这里的错误，检测失败会以软错误的形式
//! 嵌入到 `DependencyInfo` 中，不会中断流程。

use std::path::PathBuf;
use thiserror::Error;

use crate::models::InstallationStage;

/// 安装编排器的统一错误类型
#[derive(Error, Debug)]
pub enum SetupError {
    /// 用户选择的目录无效（空路径等）
    #[error("无效的数据目录: {0}")]
    InvalidDirectory(String),

    /// 创建目录结构失败，对当前安装流程是致命错误
    #[error("创建目录结构失败: {path}: {source}")]
    Structure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 配置文件不存在
    #[error("配置文件不存在: {0}")]
    ConfigNotFound(PathBuf),

    /// 配置文件损坏（可通过 reset 恢复）
    #[error("配置文件已损坏: {path}: {reason}")]
    ConfigCorrupt { path: PathBuf, reason: String },

    /// 配置写入失败
    #[error("写入配置失败: {path}: {source}")]
    ConfigWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 备份失败（不会留下不完整的归档）
    #[error("备份失败: {0}")]
    Backup(String),

    /// 恢复失败（现有数据保持不变）
    #[error("恢复失败: {0}")]
    Restore(String),

    /// prune(keep = 0) 未显式指定 force
    #[error("保留数量为 0 会删除全部备份，需要显式指定 force")]
    InvalidRetention,

    /// 已有安装或升级流程正在运行
    #[error("{0} 正在进行中，请稍后再试")]
    Busy(String),

    /// 非法的状态转换
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// 获取文件锁失败
    #[error("获取文件锁失败: {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 其他文件 I/O 错误
    #[error("文件 I/O 错误: {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// 便于服务层使用的结果别名
pub type SetupResult<T> = std::result::Result<T, SetupError>;

impl SetupError {
    /// 从 `std::io::Error` 和路径创建 I/O 错误
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn structure(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Structure {
            path: path.into(),
            source,
        }
    }

    pub fn config_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ConfigWrite {
            path: path.into(),
            source,
        }
    }

    /// 是否可以通过重置配置恢复
    pub fn is_config_recoverable(&self) -> bool {
        matches!(self, Self::ConfigCorrupt { .. } | Self::ConfigWrite { .. })
    }
}

/// 安装状态机的非法转换
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// 试图跳过中间阶段
    #[error("不能从「{from}」直接进入「{to}」")]
    SkippedStage {
        from: InstallationStage,
        to: InstallationStage,
    },

    /// 试图回退
    #[error("安装流程只能前进，不能从「{from}」回到「{to}」")]
    BackwardTransition {
        from: InstallationStage,
        to: InstallationStage,
    },

    /// 已处于终止状态
    #[error("安装流程已结束（{from}），请重新开始")]
    FromTerminalState { from: InstallationStage },

    /// 当前阶段不允许该操作
    #[error("当前阶段「{stage}」不允许{action}")]
    NotAllowed {
        stage: InstallationStage,
        action: &'static str,
    },

    /// 目录创建开始后不能取消
    #[error("「{stage}」已开始，安装流程不能取消")]
    NotCancellable { stage: InstallationStage },
}
