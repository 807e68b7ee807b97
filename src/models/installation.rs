//! 安装流程的阶段、进度事件与结果

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use super::config::AppConfig;
use super::tool::{DependencyInfo, ToolKind};

/// 安装阶段
///
/// ```text
/// Initializing
///     ↓
/// SelectingDirectory
///     ↓
/// CreatingStructure
///     ↓
/// DetectingDependencies  (可重复检测)
///     ↓
/// Installing
///     ↓
/// Finalizing
///     ↓
/// Complete
///
/// (任何非终止阶段都可以进入 Error)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum InstallationStage {
    Initializing = 0,
    SelectingDirectory = 1,
    CreatingStructure = 2,
    DetectingDependencies = 3,
    Installing = 4,
    Finalizing = 5,
    Complete = 6,
    Error = 255,
}

impl InstallationStage {
    #[inline]
    pub const fn order(self) -> u8 {
        self as u8
    }

    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }

    /// 流程中的下一阶段，终止阶段返回 None
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Initializing => Some(Self::SelectingDirectory),
            Self::SelectingDirectory => Some(Self::CreatingStructure),
            Self::CreatingStructure => Some(Self::DetectingDependencies),
            Self::DetectingDependencies => Some(Self::Installing),
            Self::Installing => Some(Self::Finalizing),
            Self::Finalizing => Some(Self::Complete),
            Self::Complete | Self::Error => None,
        }
    }

    /// 在此阶段之前放弃安装是否没有副作用
    pub const fn is_cancellable(self) -> bool {
        matches!(self, Self::Initializing | Self::SelectingDirectory)
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::Initializing => "正在初始化",
            Self::SelectingDirectory => "选择数据目录",
            Self::CreatingStructure => "正在创建目录结构",
            Self::DetectingDependencies => "正在检测 AI 工具",
            Self::Installing => "正在写入安装配置",
            Self::Finalizing => "正在完成安装",
            Self::Complete => "安装完成",
            Self::Error => "安装失败",
        }
    }

    pub const fn progress_percent(self) -> u8 {
        match self {
            Self::Initializing => 0,
            Self::SelectingDirectory => 10,
            Self::CreatingStructure => 25,
            Self::DetectingDependencies => 45,
            Self::Installing => 70,
            Self::Finalizing => 90,
            Self::Complete => 100,
            Self::Error => 0,
        }
    }
}

impl fmt::Display for InstallationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// 进度事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationProgress {
    pub stage: InstallationStage,
    pub message: String,
    pub progress_percentage: u8,
}

impl InstallationProgress {
    pub fn new(stage: InstallationStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            progress_percentage: stage.progress_percent(),
        }
    }
}

/// 安装状态快照（按需计算，不持久化）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationConfig {
    pub app_data_path: PathBuf,
    pub is_first_install: bool,
    pub claude_code_detected: bool,
    pub ollama_detected: bool,
    pub gemini_detected: bool,
}

impl InstallationConfig {
    pub fn detected(&self, kind: ToolKind) -> bool {
        match kind {
            ToolKind::ClaudeCode => self.claude_code_detected,
            ToolKind::Ollama => self.ollama_detected,
            ToolKind::Gemini => self.gemini_detected,
        }
    }
}

/// 安装流程的最终结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallationResult {
    pub success: bool,
    pub config: Option<AppConfig>,
    pub dependencies: BTreeMap<ToolKind, DependencyInfo>,
    pub error_message: Option<String>,
}

impl InstallationResult {
    pub fn failed(
        message: impl Into<String>,
        dependencies: BTreeMap<ToolKind, DependencyInfo>,
    ) -> Self {
        Self {
            success: false,
            config: None,
            dependencies,
            error_message: Some(message.into()),
        }
    }
}
