// 安装配置命令

use super::state::SetupState;
use crate::models::{AppConfig, ToolKind};

/// 读取配置，未安装时返回 None
pub async fn get_app_config(state: &SetupState) -> Result<Option<AppConfig>, String> {
    state
        .context
        .config_store
        .load_optional()
        .map_err(|e| format!("读取配置失败: {e}"))
}

pub async fn save_app_config(state: &SetupState, config: AppConfig) -> Result<(), String> {
    state
        .context
        .config_store
        .save(&config)
        .map_err(|e| format!("保存配置失败: {e}"))
}

pub async fn config_exists(state: &SetupState) -> Result<bool, String> {
    Ok(state.context.config_store.exists())
}

/// 删除配置（配置损坏时的恢复手段）
pub async fn reset_config(state: &SetupState) -> Result<(), String> {
    state
        .context
        .config_store
        .reset()
        .map_err(|e| format!("重置配置失败: {e}"))
}

pub async fn update_claude_code_config(
    state: &SetupState,
    enabled: bool,
    path: Option<String>,
) -> Result<AppConfig, String> {
    update_tool_config(state, ToolKind::ClaudeCode, enabled, path)
}

pub async fn update_ollama_config(
    state: &SetupState,
    enabled: bool,
    path: Option<String>,
) -> Result<AppConfig, String> {
    update_tool_config(state, ToolKind::Ollama, enabled, path)
}

pub async fn update_gemini_config(
    state: &SetupState,
    enabled: bool,
    path: Option<String>,
) -> Result<AppConfig, String> {
    update_tool_config(state, ToolKind::Gemini, enabled, path)
}

/// 记录最近一次升级检查时间
pub async fn update_last_check(state: &SetupState) -> Result<AppConfig, String> {
    state
        .context
        .config_store
        .touch_last_check()
        .map_err(|e| format!("更新检查时间失败: {e}"))
}

fn update_tool_config(
    state: &SetupState,
    kind: ToolKind,
    enabled: bool,
    path: Option<String>,
) -> Result<AppConfig, String> {
    state
        .context
        .config_store
        .update_tool_config(kind, enabled, path)
        .map_err(|e| format!("更新 {} 配置失败: {e}", kind.display_name()))
}
