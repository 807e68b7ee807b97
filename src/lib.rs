// lib.rs - 安装、升级与备份编排，供 CLI 和桌面端共用

pub mod commands;
pub mod core;
pub mod models;
pub mod services;
pub mod utils;

/// 当前应用版本（升级时与配置中记录的版本比较）
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub use models::*;
pub use services::{
    BackupManager, ConfigStore, DependencyProbe, DetectorRegistry, DirectoryManager,
    InstallSession, InstallationOrchestrator, ProgressBus, SetupContext, ToolDetector,
    UpdateCoordinator,
};
pub use utils::{SetupPaths, SetupSettings};

// 重新导出常用类型
pub use anyhow::{Context, Result};

pub use crate::core::{init_logger, update_log_level, SetupError, SetupResult, TransitionError};
