// 命令层共享状态

use crate::models::DependencyInfo;
use crate::services::SetupContext;
use crate::utils::{SetupPaths, SetupSettings};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 所有命令共享的服务上下文
#[derive(Clone)]
pub struct SetupState {
    pub context: Arc<SetupContext>,
}

impl SetupState {
    pub fn new(context: SetupContext) -> Self {
        Self {
            context: Arc::new(context),
        }
    }

    /// 按环境变量装配（默认 ~/.researchdesk）
    pub fn from_env() -> Result<Self, String> {
        SetupContext::from_env().map(Self::new)
    }

    pub fn with_paths(paths: SetupPaths, settings: SetupSettings) -> Self {
        Self::new(SetupContext::new(paths, settings))
    }
}

/// 三个工具的检测结果，未注册的工具为 None
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliToolDetections {
    pub claude_code: Option<DependencyInfo>,
    pub ollama: Option<DependencyInfo>,
    pub gemini: Option<DependencyInfo>,
}
