// 首次安装与工具检测命令

use super::state::{CliToolDetections, SetupState};
use crate::models::{
    DependencyInfo, InstallationConfig, InstallationProgress, InstallationResult, ToolKind,
};
use std::path::PathBuf;

/// 检查安装状态（含三个工具的检测结果）
pub async fn check_installation_status(state: &SetupState) -> Result<InstallationConfig, String> {
    state
        .context
        .orchestrator
        .status()
        .await
        .map_err(|e| format!("检查安装状态失败: {e}"))
}

pub async fn detect_claude_code(state: &SetupState) -> Result<Option<DependencyInfo>, String> {
    Ok(state.context.probe.detect(ToolKind::ClaudeCode).await)
}

pub async fn detect_ollama(state: &SetupState) -> Result<Option<DependencyInfo>, String> {
    Ok(state.context.probe.detect(ToolKind::Ollama).await)
}

pub async fn detect_gemini(state: &SetupState) -> Result<Option<DependencyInfo>, String> {
    Ok(state.context.probe.detect(ToolKind::Gemini).await)
}

/// 并行检测所有工具
pub async fn detect_all_cli_tools(state: &SetupState) -> Result<CliToolDetections, String> {
    let mut detected = state.context.probe.detect_all().await;
    Ok(CliToolDetections {
        claude_code: detected.remove(&ToolKind::ClaudeCode),
        ollama: detected.remove(&ToolKind::Ollama),
        gemini: detected.remove(&ToolKind::Gemini),
    })
}

/// 清除单个工具的检测缓存
pub async fn clear_cli_detection_cache(state: &SetupState, tool: String) -> Result<(), String> {
    let kind: ToolKind = tool.parse()?;
    state.context.probe.clear_cache(Some(kind));
    Ok(())
}

pub async fn clear_all_cli_detection_caches(state: &SetupState) -> Result<(), String> {
    state.context.probe.clear_cache(None);
    Ok(())
}

pub async fn get_claude_code_install_instructions(state: &SetupState) -> Result<String, String> {
    Ok(state.context.probe.instructions(ToolKind::ClaudeCode).to_string())
}

pub async fn get_ollama_install_instructions(state: &SetupState) -> Result<String, String> {
    Ok(state.context.probe.instructions(ToolKind::Ollama).to_string())
}

pub async fn get_gemini_install_instructions(state: &SetupState) -> Result<String, String> {
    Ok(state.context.probe.instructions(ToolKind::Gemini).to_string())
}

/// 执行完整安装流程
///
/// `on_progress` 在独立任务中按顺序收到每个阶段的进度事件，
/// 返回前所有已发出的事件都已处理完毕。
pub async fn run_installation<F>(
    state: &SetupState,
    data_dir: Option<PathBuf>,
    on_progress: F,
) -> Result<InstallationResult, String>
where
    F: FnMut(InstallationProgress) + Send + 'static,
{
    let listener = state.context.bus.subscribe_with(on_progress);
    let result = state.context.orchestrator.run(data_dir).await;
    listener.finish().await;
    Ok(result)
}

pub async fn verify_directory_structure(state: &SetupState) -> Result<bool, String> {
    state
        .context
        .orchestrator
        .verify_directory_structure()
        .map_err(|e| format!("校验目录结构失败: {e}"))
}

/// 清除检测缓存后重新检测
pub async fn redetect_dependencies(state: &SetupState) -> Result<InstallationConfig, String> {
    state
        .context
        .orchestrator
        .redetect()
        .await
        .map_err(|e| format!("重新检测失败: {e}"))
}

pub async fn is_first_install(state: &SetupState) -> Result<bool, String> {
    Ok(state.context.orchestrator.is_first_install())
}
