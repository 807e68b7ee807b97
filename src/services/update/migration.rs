// Structure Migration - 数据目录结构迁移
//
// 基于版本号驱动：配置中记录的版本 < 迁移目标版本 <= 当前应用版本时执行，
// 按目标版本从低到高依次执行，遇到失败立即停止。

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// 迁移接口
#[async_trait]
pub trait StructureMigration: Send + Sync {
    /// 迁移唯一标识（如 "conversations_to_chats"）
    fn id(&self) -> &str;

    /// 迁移名称（用于日志）
    fn name(&self) -> &str;

    /// 目标版本号（迁移执行后达到的版本）
    fn target_version(&self) -> &str;

    /// 执行迁移，返回所有被修改的路径
    async fn apply(&self, root: &Path) -> Result<Vec<PathBuf>>;
}

/// 版本比较，无法解析的版本排在可解析版本之前
pub fn compare_versions(v1: &str, v2: &str) -> Ordering {
    use semver::Version;

    match (Version::parse(v1).ok(), Version::parse(v2).ok()) {
        (Some(ver1), Some(ver2)) => ver1.cmp(&ver2),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => v1.cmp(v2),
    }
}

/// 单个迁移的执行结果
#[derive(Debug, Clone, Serialize)]
pub struct MigrationOutcome {
    pub migration_id: String,
    pub target_version: String,
    pub touched: Vec<PathBuf>,
    pub duration_secs: f64,
}

/// 迁移失败，附带失败前已经修改的路径
#[derive(Debug, thiserror::Error)]
#[error("迁移 {migration_id} 失败: {reason}")]
pub struct MigrationError {
    pub migration_id: String,
    pub reason: String,
    pub touched: Vec<PathBuf>,
}

pub struct MigrationRunner {
    migrations: Vec<Arc<dyn StructureMigration>>,
}

impl Default for MigrationRunner {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl MigrationRunner {
    pub fn new() -> Self {
        Self {
            migrations: Vec::new(),
        }
    }

    /// 注册所有内置迁移
    pub fn with_builtin() -> Self {
        let mut runner = Self::new();
        runner.register(Arc::new(ConversationsToChats));
        runner.register(Arc::new(McpConfigToDirectory));
        runner
    }

    pub fn register(&mut self, migration: Arc<dyn StructureMigration>) {
        tracing::debug!(
            "注册迁移: {} (目标版本: {})",
            migration.id(),
            migration.target_version()
        );
        self.migrations.push(migration);
    }

    /// 需要执行的迁移，按目标版本从低到高
    pub fn pending(&self, persisted: &str, running: &str) -> Vec<Arc<dyn StructureMigration>> {
        let mut pending: Vec<_> = self
            .migrations
            .iter()
            .filter(|m| {
                compare_versions(persisted, m.target_version()) == Ordering::Less
                    && compare_versions(m.target_version(), running) != Ordering::Greater
            })
            .cloned()
            .collect();
        pending.sort_by(|a, b| compare_versions(a.target_version(), b.target_version()));
        pending
    }

    /// 依次执行迁移，第一个失败即停止
    pub async fn run(
        &self,
        root: &Path,
        persisted: &str,
        running: &str,
    ) -> std::result::Result<Vec<MigrationOutcome>, MigrationError> {
        let pending = self.pending(persisted, running);
        if pending.is_empty() {
            tracing::info!("无需执行迁移（{persisted} → {running}）");
            return Ok(Vec::new());
        }
        tracing::info!("共 {} 个迁移需要执行（{persisted} → {running}）", pending.len());

        let mut outcomes: Vec<MigrationOutcome> = Vec::new();
        for migration in pending {
            let start = Instant::now();
            match migration.apply(root).await {
                Ok(touched) => {
                    let duration_secs = start.elapsed().as_secs_f64();
                    tracing::info!(
                        "迁移 {} 成功，修改 {} 个路径（耗时 {:.2}s）",
                        migration.name(),
                        touched.len(),
                        duration_secs
                    );
                    outcomes.push(MigrationOutcome {
                        migration_id: migration.id().to_string(),
                        target_version: migration.target_version().to_string(),
                        touched,
                        duration_secs,
                    });
                }
                Err(e) => {
                    tracing::error!("迁移 {} 失败: {:#}", migration.name(), e);
                    return Err(MigrationError {
                        migration_id: migration.id().to_string(),
                        reason: format!("{e:#}"),
                        touched: outcomes.into_iter().flat_map(|o| o.touched).collect(),
                    });
                }
            }
        }
        Ok(outcomes)
    }
}

/// 1.2.0：旧版的 conversations/ 合并到 chats/
pub struct ConversationsToChats;

#[async_trait]
impl StructureMigration for ConversationsToChats {
    fn id(&self) -> &str {
        "conversations_to_chats"
    }

    fn name(&self) -> &str {
        "会话目录重命名"
    }

    fn target_version(&self) -> &str {
        "1.2.0"
    }

    async fn apply(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let legacy = root.join("conversations");
        if !legacy.is_dir() {
            return Ok(Vec::new());
        }

        let chats = root.join("chats");
        fs::create_dir_all(&chats).with_context(|| format!("创建 {} 失败", chats.display()))?;

        let mut touched = Vec::new();
        for entry in fs::read_dir(&legacy).with_context(|| format!("读取 {} 失败", legacy.display()))? {
            let entry = entry?;
            let mut target = chats.join(entry.file_name());
            if target.exists() {
                // 同名时保留现有文件，旧文件加后缀
                let mut name = entry.file_name();
                name.push(".legacy");
                target = chats.join(name);
            }
            fs::rename(entry.path(), &target)
                .with_context(|| format!("移动 {} 失败", entry.path().display()))?;
            touched.push(target);
        }

        fs::remove_dir(&legacy).with_context(|| format!("删除 {} 失败", legacy.display()))?;
        touched.push(legacy);
        Ok(touched)
    }
}

/// 1.3.0：根目录的 mcp.json 移到 mcp/servers.json
pub struct McpConfigToDirectory;

#[async_trait]
impl StructureMigration for McpConfigToDirectory {
    fn id(&self) -> &str {
        "mcp_config_to_directory"
    }

    fn name(&self) -> &str {
        "MCP 配置迁移"
    }

    fn target_version(&self) -> &str {
        "1.3.0"
    }

    async fn apply(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let legacy = root.join("mcp.json");
        if !legacy.is_file() {
            return Ok(Vec::new());
        }

        let mut touched = Vec::new();
        let target = root.join("mcp").join("servers.json");
        if target.exists() {
            tracing::warn!(path = %target.display(), "mcp/servers.json 已存在，保留现有配置");
        } else {
            fs::create_dir_all(root.join("mcp"))?;
            fs::copy(&legacy, &target)
                .with_context(|| format!("复制 {} 失败", legacy.display()))?;
            touched.push(target);
        }

        let archived = root.join("mcp.json.migrated");
        fs::rename(&legacy, &archived)
            .with_context(|| format!("归档 {} 失败", legacy.display()))?;
        touched.push(legacy);
        touched.push(archived);
        Ok(touched)
    }
}
