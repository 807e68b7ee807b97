// 可选 AI 工具的标识与检测结果

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 可选的外部工具
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ToolKind {
    #[serde(rename = "claude-code")]
    ClaudeCode,
    #[serde(rename = "ollama")]
    Ollama,
    #[serde(rename = "gemini")]
    Gemini,
}

impl ToolKind {
    /// 所有工具，按固定顺序
    pub const ALL: [ToolKind; 3] = [ToolKind::ClaudeCode, ToolKind::Ollama, ToolKind::Gemini];

    /// 工具唯一标识（如 "claude-code"）
    pub fn id(&self) -> &'static str {
        match self {
            ToolKind::ClaudeCode => "claude-code",
            ToolKind::Ollama => "ollama",
            ToolKind::Gemini => "gemini",
        }
    }

    /// 工具显示名称
    pub fn display_name(&self) -> &'static str {
        match self {
            ToolKind::ClaudeCode => "Claude Code",
            ToolKind::Ollama => "Ollama",
            ToolKind::Gemini => "Gemini CLI",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ToolKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "claude-code" | "claude_code" | "claude" => Ok(ToolKind::ClaudeCode),
            "ollama" => Ok(ToolKind::Ollama),
            "gemini" | "gemini-cli" => Ok(ToolKind::Gemini),
            other => Err(format!("未知的工具: {other}")),
        }
    }
}

/// 所有工具共享的检测字段
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeBase {
    pub installed: bool,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    /// 是否可以直接通过 PATH 找到（false 表示只在常见安装目录中找到）
    #[serde(default)]
    pub in_path: bool,
    /// 检测过程中的环境错误（软错误，不影响其他工具）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProbeBase {
    pub fn missing() -> Self {
        Self::default()
    }

    pub fn soft_error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }
}

/// 单个工具的检测结果
///
/// 每种工具一个变体，工具特有字段只出现在对应变体中。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "kebab-case")]
pub enum DependencyInfo {
    ClaudeCode {
        #[serde(flatten)]
        base: ProbeBase,
    },
    Ollama {
        #[serde(flatten)]
        base: ProbeBase,
        /// 本地 Ollama 服务是否在运行
        running: bool,
    },
    Gemini {
        #[serde(flatten)]
        base: ProbeBase,
        /// 是否已配置 Google 认证
        authenticated: bool,
    },
}

impl DependencyInfo {
    /// 用共享字段构造结果，工具特有字段取保守值（false）
    pub fn from_base(kind: ToolKind, base: ProbeBase) -> Self {
        match kind {
            ToolKind::ClaudeCode => DependencyInfo::ClaudeCode { base },
            ToolKind::Ollama => DependencyInfo::Ollama {
                base,
                running: false,
            },
            ToolKind::Gemini => DependencyInfo::Gemini {
                base,
                authenticated: false,
            },
        }
    }

    /// 未安装
    pub fn not_installed(kind: ToolKind) -> Self {
        Self::from_base(kind, ProbeBase::missing())
    }

    /// 检测失败（installed = false，附带诊断信息）
    pub fn soft_error(kind: ToolKind, message: impl Into<String>) -> Self {
        Self::from_base(kind, ProbeBase::soft_error(message))
    }

    pub fn kind(&self) -> ToolKind {
        match self {
            DependencyInfo::ClaudeCode { .. } => ToolKind::ClaudeCode,
            DependencyInfo::Ollama { .. } => ToolKind::Ollama,
            DependencyInfo::Gemini { .. } => ToolKind::Gemini,
        }
    }

    pub fn base(&self) -> &ProbeBase {
        match self {
            DependencyInfo::ClaudeCode { base }
            | DependencyInfo::Ollama { base, .. }
            | DependencyInfo::Gemini { base, .. } => base,
        }
    }

    pub fn installed(&self) -> bool {
        self.base().installed
    }

    pub fn version(&self) -> Option<&str> {
        self.base().version.as_deref()
    }

    pub fn path(&self) -> Option<&str> {
        self.base().path.as_deref()
    }

    pub fn soft_error_message(&self) -> Option<&str> {
        self.base().error.as_deref()
    }
}
