// 安装元数据与日志配置，在库和二进制之间共享

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::tool::ToolKind;

/// 各工具的启用状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnabledTools {
    #[serde(default)]
    pub claude_code: bool,
    #[serde(default)]
    pub ollama: bool,
    #[serde(default)]
    pub gemini: bool,
}

impl EnabledTools {
    pub fn get(&self, kind: ToolKind) -> bool {
        match kind {
            ToolKind::ClaudeCode => self.claude_code,
            ToolKind::Ollama => self.ollama,
            ToolKind::Gemini => self.gemini,
        }
    }

    pub fn set(&mut self, kind: ToolKind, enabled: bool) {
        match kind {
            ToolKind::ClaudeCode => self.claude_code = enabled,
            ToolKind::Ollama => self.ollama = enabled,
            ToolKind::Gemini => self.gemini = enabled,
        }
    }
}

/// 各工具的可执行文件路径
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolPaths {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claude_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ollama: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gemini: Option<String>,
}

impl ToolPaths {
    pub fn get(&self, kind: ToolKind) -> Option<&str> {
        match kind {
            ToolKind::ClaudeCode => self.claude_code.as_deref(),
            ToolKind::Ollama => self.ollama.as_deref(),
            ToolKind::Gemini => self.gemini.as_deref(),
        }
    }

    pub fn set(&mut self, kind: ToolKind, path: Option<String>) {
        let slot = match kind {
            ToolKind::ClaudeCode => &mut self.claude_code,
            ToolKind::Ollama => &mut self.ollama,
            ToolKind::Gemini => &mut self.gemini,
        };
        *slot = path;
    }
}

/// 安装配置（每个安装唯一，只能通过 ConfigStore 原子写入）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub data_directory: PathBuf,
    pub installed_at: DateTime<Utc>,
    pub version: String,
    #[serde(default)]
    pub enabled_tools: EnabledTools,
    #[serde(default)]
    pub tool_paths: ToolPaths,
    #[serde(default)]
    pub last_update_check: Option<DateTime<Utc>>,
    #[serde(default)]
    pub log_config: LogConfig,
}

impl AppConfig {
    /// 以当前应用版本创建新配置
    pub fn new(data_directory: impl Into<PathBuf>) -> Self {
        Self {
            data_directory: data_directory.into(),
            installed_at: Utc::now(),
            version: crate::APP_VERSION.to_string(),
            enabled_tools: EnabledTools::default(),
            tool_paths: ToolPaths::default(),
            last_update_check: None,
            log_config: LogConfig::default(),
        }
    }
}

/// 日志级别
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    /// 解析字符串为日志级别
    pub fn parse(level_str: &str) -> Result<Self, String> {
        match level_str.to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(format!("无效的日志级别: {level_str}")),
        }
    }
}

/// 日志输出格式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// 日志输出目标
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Console,
    File,
    Both,
}

/// 日志配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default)]
    pub level: LogLevel,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default)]
    pub output: LogOutput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}
