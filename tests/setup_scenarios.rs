//! 安装、升级、备份恢复的端到端场景
//!
//! 所有场景使用 TempDir 隔离，工具检测使用固定结果的检测器，不依赖宿主机环境。

use async_trait::async_trait;
use researchdesk::services::lock::RunLock;
use researchdesk::services::update::{MigrationRunner, StructureMigration};
use researchdesk::utils::CommandExecutor;
use researchdesk::{
    AppConfig, DependencyInfo, DetectorRegistry, InstallationStage, ProgressBus, SetupContext,
    SetupError, SetupPaths, SetupSettings, ToolDetector, ToolKind, UpdateCoordinator,
    UpdateResult,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// 宿主机上找不到任何工具
struct MissingTool(ToolKind);

#[async_trait]
impl ToolDetector for MissingTool {
    fn kind(&self) -> ToolKind {
        self.0
    }

    fn binary_name(&self) -> &str {
        "researchdesk-missing-tool"
    }

    async fn detect(&self, _executor: &CommandExecutor) -> DependencyInfo {
        DependencyInfo::not_installed(self.0)
    }
}

struct BrokenMigration;

#[async_trait]
impl StructureMigration for BrokenMigration {
    fn id(&self) -> &str {
        "broken"
    }

    fn name(&self) -> &str {
        "总是失败的迁移"
    }

    fn target_version(&self) -> &str {
        "1.3.0"
    }

    async fn apply(&self, _root: &Path) -> anyhow::Result<Vec<PathBuf>> {
        anyhow::bail!("磁盘已满")
    }
}

fn context(dir: &TempDir) -> SetupContext {
    let mut registry = DetectorRegistry::empty();
    for kind in ToolKind::ALL {
        registry.register(Arc::new(MissingTool(kind)));
    }
    SetupContext::with_registry(
        SetupPaths::new(dir.path().join("home")),
        SetupSettings::default(),
        registry,
    )
}

async fn install(ctx: &SetupContext, root: &Path) {
    let result = ctx.orchestrator.run(Some(root.to_path_buf())).await;
    assert!(result.success, "{:?}", result.error_message);
}

#[tokio::test]
async fn fresh_install_without_tools() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);
    let root = dir.path().join("data");

    let detected = ctx.probe.detect_all().await;
    assert_eq!(detected.len(), 3);
    assert!(detected.values().all(|info| !info.installed()));

    let mut events = ctx.bus.subscribe();
    let result = ctx.orchestrator.run(Some(root.clone())).await;
    assert!(result.success);

    let stages: Vec<_> = events.drain().into_iter().map(|e| e.stage).collect();
    assert!(stages.contains(&InstallationStage::Installing));
    assert_eq!(stages.last(), Some(&InstallationStage::Complete));
    // 阶段只前进不后退
    assert!(stages
        .windows(2)
        .all(|w| w[0].progress_percent() <= w[1].progress_percent()));

    let config = ctx.config_store.load().unwrap();
    assert_eq!(config.data_directory, root);
    for kind in ToolKind::ALL {
        assert!(!config.enabled_tools.get(kind));
    }
    assert!(ctx.directories.verify_structure(&root));
}

#[tokio::test]
async fn update_with_intact_structure_changes_nothing() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);
    let root = dir.path().join("data");
    install(&ctx, &root).await;

    let result = ctx.updater.run().await;
    assert!(result.success);
    assert!(!result.backup_created);
    assert!(result.structure_verified);
    assert!(result.files_updated.is_empty());
    assert!(ctx.backups.list().unwrap().is_empty());
}

#[tokio::test]
async fn update_with_broken_structure_backs_up_then_repairs() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);
    let root = dir.path().join("data");
    install(&ctx, &root).await;

    fs::write(root.join("notes").join("draft.md"), "# 草稿").unwrap();
    fs::remove_dir_all(root.join("workflows")).unwrap();

    let result = ctx.updater.run().await;
    assert!(result.success, "{}", result.message);
    assert!(result.backup_created);
    assert!(!result.files_updated.is_empty());
    assert!(ctx.directories.verify_structure(&root));
    // 用户文件不受影响
    assert_eq!(fs::read_to_string(root.join("notes").join("draft.md")).unwrap(), "# 草稿");

    let backup = result.backup_path.unwrap();
    assert!(ctx.backups.verify_archive(&backup));
    assert!(ctx.updater.verify_integrity());
}

#[tokio::test]
async fn failure_after_backup_keeps_backup_for_restore() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);
    let root = dir.path().join("data");
    install(&ctx, &root).await;
    fs::write(root.join("notes").join("paper.md"), "原稿").unwrap();

    let mut config = ctx.config_store.load().unwrap();
    config.version = "1.0.0".to_string();
    ctx.config_store.save(&config).unwrap();

    let mut migrations = MigrationRunner::new();
    migrations.register(Arc::new(BrokenMigration));
    let updater = UpdateCoordinator::new(
        ctx.config_store.clone(),
        ctx.directories.clone(),
        ctx.backups.clone(),
        ProgressBus::new(),
        RunLock::new(),
        5,
    )
    .with_migrations(migrations)
    .with_running_version("1.3.0");

    let result: UpdateResult = updater.run().await;
    assert!(!result.success);
    assert!(result.backup_created);
    assert!(result.message.contains("磁盘已满"));
    // 版本号未被更新
    assert_eq!(ctx.config_store.load().unwrap().version, "1.0.0");

    fs::write(root.join("notes").join("paper.md"), "被改坏的内容").unwrap();
    ctx.backups
        .restore(&result.backup_path.unwrap(), &root)
        .unwrap();
    assert_eq!(fs::read_to_string(root.join("notes").join("paper.md")).unwrap(), "原稿");
}

#[tokio::test]
async fn restoring_corrupt_archive_leaves_live_tree_alone() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);
    let root = dir.path().join("data");
    install(&ctx, &root).await;
    fs::write(root.join("chats").join("today.json"), "[]").unwrap();

    let good = ctx.backups.backup(&root).unwrap();
    let corrupt = dir.path().join("corrupt.zip");
    let bytes = fs::read(&good.path).unwrap();
    fs::write(&corrupt, &bytes[..bytes.len() / 2]).unwrap();

    let err = ctx.backups.restore(&corrupt, &root).unwrap_err();
    assert!(matches!(err, SetupError::Restore(_)));
    assert!(ctx.directories.verify_structure(&root));
    assert_eq!(fs::read_to_string(root.join("chats").join("today.json")).unwrap(), "[]");
}

#[tokio::test]
async fn backups_are_listed_newest_first_and_pruned() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);
    let root = dir.path().join("data");
    install(&ctx, &root).await;

    let created: Vec<_> = (0..4).map(|_| ctx.backups.backup(&root).unwrap()).collect();
    let listed = ctx.backups.list().unwrap();
    assert_eq!(listed.len(), 4);
    assert!(listed.windows(2).all(|w| w[0].created_at > w[1].created_at));
    assert_eq!(listed[0].path, created[3].path);

    ctx.backups.prune(2, false).unwrap();
    let remaining = ctx.backups.list().unwrap();
    assert_eq!(remaining.len(), 2);
    assert_eq!(remaining[0].path, created[3].path);

    assert!(matches!(
        ctx.backups.prune(0, false),
        Err(SetupError::InvalidRetention)
    ));
    assert_eq!(ctx.backups.list().unwrap().len(), 2);
}

#[tokio::test]
async fn install_and_update_cannot_run_together() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir);
    ctx.config_store
        .save(&AppConfig::new(dir.path().join("data")))
        .unwrap();

    let session = ctx.orchestrator.start().unwrap();
    let result = ctx.updater.run().await;
    assert!(!result.success);
    assert!(matches!(ctx.orchestrator.start(), Err(SetupError::Busy(_))));
    drop(session);

    assert!(ctx.updater.run().await.success);
}
