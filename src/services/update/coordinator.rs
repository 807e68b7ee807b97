//! 升级协调
//!
//! 每次启动时校验数据目录：结构完整且版本未变时直接返回；
//! 否则先备份，再迁移和修复，最后更新配置中的版本号。
//! 备份之后的任何失败都会在结果中带上备份路径，方便调用方提供恢复。

use super::migration::{compare_versions, MigrationRunner};
use crate::core::SetupError;
use crate::models::{AppConfig, BackupRecord, InstallationProgress, InstallationStage, UpdateResult};
use crate::services::backup::BackupManager;
use crate::services::config_store::ConfigStore;
use crate::services::directory::DirectoryManager;
use crate::services::installation::ProgressBus;
use crate::services::lock::RunLock;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const NOT_INSTALLED_MESSAGE: &str = "尚未完成安装，请先运行安装向导";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// 结构修复 + 版本迁移
    Full,
    /// 只检查并修复目录结构
    StructureOnly,
}

pub struct UpdateCoordinator {
    config_store: Arc<ConfigStore>,
    directories: Arc<DirectoryManager>,
    backups: Arc<BackupManager>,
    migrations: MigrationRunner,
    bus: ProgressBus,
    run_lock: RunLock,
    backup_retention: usize,
    running_version: String,
}

impl UpdateCoordinator {
    pub fn new(
        config_store: Arc<ConfigStore>,
        directories: Arc<DirectoryManager>,
        backups: Arc<BackupManager>,
        bus: ProgressBus,
        run_lock: RunLock,
        backup_retention: usize,
    ) -> Self {
        Self {
            config_store,
            directories,
            backups,
            migrations: MigrationRunner::with_builtin(),
            bus,
            run_lock,
            backup_retention,
            running_version: crate::APP_VERSION.to_string(),
        }
    }

    pub fn with_migrations(mut self, migrations: MigrationRunner) -> Self {
        self.migrations = migrations;
        self
    }

    pub fn with_running_version(mut self, version: impl Into<String>) -> Self {
        self.running_version = version.into();
        self
    }

    /// 完整的升级流程
    pub async fn run(&self) -> UpdateResult {
        self.reconcile(Mode::Full).await
    }

    /// 只检查并修复目录结构（不执行迁移，不更新版本号）
    pub async fn check_and_preserve_structure(&self) -> UpdateResult {
        self.reconcile(Mode::StructureOnly).await
    }

    /// 目录结构完整，且最新备份可用
    pub fn verify_integrity(&self) -> bool {
        match self.config_store.load() {
            Ok(config) => self.backups.verify_integrity(&config.data_directory),
            Err(e) => {
                tracing::warn!(error = %e, "无法读取配置，完整性校验失败");
                false
            }
        }
    }

    async fn reconcile(&self, mode: Mode) -> UpdateResult {
        let _guard = match self.run_lock.try_acquire("升级") {
            Ok(guard) => guard,
            Err(e) => return UpdateResult::failed(e.to_string()),
        };

        self.emit(InstallationStage::Initializing, "正在校验目录结构");
        let config = match self.config_store.load() {
            Ok(config) => config,
            Err(SetupError::ConfigNotFound(_)) => {
                return self.fail(UpdateResult::failed(NOT_INSTALLED_MESSAGE));
            }
            Err(e) => return self.fail(UpdateResult::failed(format!("读取配置失败: {e}"))),
        };

        let root = config.data_directory.clone();
        let intact = self.directories.verify_structure(&root);
        let version_order = compare_versions(&config.version, &self.running_version);
        let migrate = mode == Mode::Full && version_order == Ordering::Less;

        if version_order == Ordering::Greater && mode == Mode::Full {
            tracing::warn!(
                persisted = %config.version,
                running = %self.running_version,
                "配置版本高于当前应用版本，跳过迁移"
            );
        }

        if intact && !migrate {
            tracing::info!(root = %root.display(), "目录结构完整，无需升级");
            self.emit(InstallationStage::Complete, "目录结构完整");
            return UpdateResult {
                success: true,
                structure_verified: true,
                message: "目录结构完整，无需升级".to_string(),
                ..UpdateResult::default()
            };
        }

        tracing::info!(
            root = %root.display(),
            intact,
            persisted = %config.version,
            running = %self.running_version,
            "开始升级数据目录"
        );
        self.emit(InstallationStage::Installing, "正在备份数据");

        // 数据目录整个不存在时没有可备份的内容
        let backup = if root.is_dir() {
            match self.backup(&root).await {
                Ok(record) => Some(record),
                Err(message) => {
                    return self.fail(UpdateResult::failed(format!("备份失败，未做任何修改: {message}")));
                }
            }
        } else {
            tracing::warn!(root = %root.display(), "数据目录不存在，跳过备份");
            None
        };

        let files_updated = match self.repair(&root, &config, migrate).await {
            Ok(touched) => touched,
            Err(failure) => {
                return self.fail(failed_after(backup.as_ref(), failure.message, failure.touched));
            }
        };

        self.emit(InstallationStage::Finalizing, "正在更新安装配置");
        let new_version = migrate.then_some(self.running_version.as_str());
        let recorded = if mode == Mode::Full {
            self.config_store.record_update(new_version).map(|_| ())
        } else {
            Ok(())
        };
        if let Err(e) = recorded {
            return self.fail(failed_after(
                backup.as_ref(),
                format!("更新配置失败: {e}"),
                files_updated,
            ));
        }

        if backup.is_some() {
            if let Err(e) = self.backups.prune(self.backup_retention, false) {
                tracing::warn!(error = %e, "清理旧备份失败");
            }
        }

        tracing::info!(files = files_updated.len(), "升级完成");
        self.emit(InstallationStage::Complete, "升级完成");
        UpdateResult {
            success: true,
            backup_created: backup.is_some(),
            backup_path: backup.map(|record| record.path),
            files_updated,
            structure_verified: true,
            message: if migrate {
                format!("已升级到 {}", self.running_version)
            } else {
                "目录结构已修复".to_string()
            },
        }
    }

    /// 在阻塞线程池中打包归档
    async fn backup(&self, root: &Path) -> Result<BackupRecord, String> {
        let backups = self.backups.clone();
        let root = root.to_path_buf();
        tokio::task::spawn_blocking(move || backups.backup(&root))
            .await
            .map_err(|e| format!("备份任务异常退出: {e}"))?
            .map_err(|e| e.to_string())
    }

    /// 迁移（可选）后修复目录结构，返回所有被修改的路径
    ///
    /// 失败时同样带回已经修改过的路径。
    async fn repair(
        &self,
        root: &Path,
        config: &AppConfig,
        migrate: bool,
    ) -> Result<Vec<PathBuf>, RepairFailure> {
        let mut touched = Vec::new();

        if migrate {
            match self
                .migrations
                .run(root, &config.version, &self.running_version)
                .await
            {
                Ok(outcomes) => touched.extend(outcomes.into_iter().flat_map(|o| o.touched)),
                Err(e) => {
                    let message = e.to_string();
                    return Err(RepairFailure {
                        message,
                        touched: e.touched,
                    });
                }
            }
        }

        match self.directories.repair_structure(root) {
            Ok(repaired) => touched.extend(repaired),
            Err(e) => {
                return Err(RepairFailure {
                    message: format!("修复目录结构失败: {e}"),
                    touched,
                });
            }
        }

        if !self.directories.verify_structure(root) {
            return Err(RepairFailure {
                message: "修复后目录结构仍不完整".to_string(),
                touched,
            });
        }
        Ok(touched)
    }

    fn emit(&self, stage: InstallationStage, message: &str) {
        self.bus.emit(InstallationProgress::new(stage, message));
    }

    fn fail(&self, result: UpdateResult) -> UpdateResult {
        tracing::error!(message = %result.message, backup = ?result.backup_path, "升级失败");
        self.emit(InstallationStage::Error, &result.message);
        result
    }
}

struct RepairFailure {
    message: String,
    touched: Vec<PathBuf>,
}

fn failed_after(
    backup: Option<&BackupRecord>,
    message: String,
    touched: Vec<PathBuf>,
) -> UpdateResult {
    let mut result = match backup {
        Some(record) => UpdateResult::failed_after_backup(record, message),
        None => UpdateResult::failed(message),
    };
    result.files_updated = touched;
    result
}
