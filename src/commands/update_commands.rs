// 升级、备份与恢复命令

use super::state::SetupState;
use crate::models::UpdateResult;
use std::path::PathBuf;

/// 启动时执行的升级流程
pub async fn run_update_process(state: &SetupState) -> Result<UpdateResult, String> {
    Ok(state.context.updater.run().await)
}

/// 只检查并修复目录结构
pub async fn check_and_preserve_structure(state: &SetupState) -> Result<UpdateResult, String> {
    Ok(state.context.updater.check_and_preserve_structure().await)
}

pub async fn verify_installation_integrity(state: &SetupState) -> Result<bool, String> {
    Ok(state.context.updater.verify_integrity())
}

/// 备份当前数据目录，返回归档路径
pub async fn backup_installation(state: &SetupState) -> Result<PathBuf, String> {
    backup_data_directory(state).await
}

/// 备份用户数据，返回归档路径
pub async fn backup_user_data(state: &SetupState) -> Result<PathBuf, String> {
    backup_data_directory(state).await
}

async fn backup_data_directory(state: &SetupState) -> Result<PathBuf, String> {
    let config = state
        .context
        .config_store
        .load()
        .map_err(|e| format!("读取配置失败: {e}"))?;
    let backups = state.context.backups.clone();
    let record = tokio::task::spawn_blocking(move || backups.backup(&config.data_directory))
        .await
        .map_err(|e| format!("备份任务异常退出: {e}"))?
        .map_err(|e| format!("创建备份失败: {e}"))?;
    Ok(record.path)
}

/// 清理旧备份，返回保留下来的备份（从新到旧）
///
/// `keep == 0` 会删除全部备份，必须同时传入 `force`。
pub async fn cleanup_old_backups(
    state: &SetupState,
    keep_count: usize,
    force: bool,
) -> Result<Vec<PathBuf>, String> {
    let backups = &state.context.backups;
    let removed = backups
        .prune(keep_count, force)
        .map_err(|e| format!("清理备份失败: {e}"))?;
    tracing::info!(removed = removed.len(), keep = keep_count, "旧备份已清理");
    list_backups(state).await
}

/// 所有备份，从新到旧
pub async fn list_backups(state: &SetupState) -> Result<Vec<PathBuf>, String> {
    let records = state
        .context
        .backups
        .list()
        .map_err(|e| format!("读取备份列表失败: {e}"))?;
    Ok(records.into_iter().map(|r| r.path).collect())
}

/// 用指定备份替换当前数据目录
///
/// 安装或升级进行中时拒绝恢复。
pub async fn restore_from_backup(state: &SetupState, backup_path: PathBuf) -> Result<(), String> {
    let _guard = state
        .context
        .run_lock
        .try_acquire("恢复")
        .map_err(|e| format!("恢复备份失败: {e}"))?;
    let config = state
        .context
        .config_store
        .load()
        .map_err(|e| format!("读取配置失败: {e}"))?;
    let backups = state.context.backups.clone();
    tokio::task::spawn_blocking(move || backups.restore(&backup_path, &config.data_directory))
        .await
        .map_err(|e| format!("恢复任务异常退出: {e}"))?
        .map_err(|e| format!("恢复备份失败: {e}"))
}
