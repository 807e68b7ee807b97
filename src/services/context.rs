//! 服务装配
//!
//! 所有服务共享同一个运行锁和进度总线，同一个上下文内安装、升级与恢复互斥。

use crate::services::backup::BackupManager;
use crate::services::config_store::ConfigStore;
use crate::services::directory::DirectoryManager;
use crate::services::installation::{InstallationOrchestrator, ProgressBus};
use crate::services::lock::RunLock;
use crate::services::tool::{DependencyProbe, DetectionCache, DetectorRegistry, SystemClock};
use crate::services::update::UpdateCoordinator;
use crate::utils::{SetupPaths, SetupSettings};
use std::sync::Arc;

pub struct SetupContext {
    pub paths: SetupPaths,
    pub settings: SetupSettings,
    pub config_store: Arc<ConfigStore>,
    pub directories: Arc<DirectoryManager>,
    pub backups: Arc<BackupManager>,
    pub probe: Arc<DependencyProbe>,
    pub bus: ProgressBus,
    /// 安装、升级与恢复共用
    pub run_lock: RunLock,
    pub orchestrator: InstallationOrchestrator,
    pub updater: UpdateCoordinator,
}

impl SetupContext {
    pub fn new(paths: SetupPaths, settings: SetupSettings) -> Self {
        Self::with_registry(paths, settings, DetectorRegistry::new())
    }

    /// 使用自定义的工具检测器
    pub fn with_registry(
        paths: SetupPaths,
        settings: SetupSettings,
        registry: DetectorRegistry,
    ) -> Self {
        let cache = DetectionCache::with_clock(Arc::new(SystemClock), settings.detection_ttl);
        let probe = Arc::new(
            DependencyProbe::new(settings.probe_timeout)
                .with_registry(registry)
                .with_cache(cache),
        );
        Self::assemble(paths, settings, probe)
    }

    /// 从环境变量读取路径和参数
    pub fn from_env() -> Result<Self, String> {
        let paths = SetupPaths::from_env()?;
        Ok(Self::new(paths, SetupSettings::from_env()))
    }

    fn assemble(paths: SetupPaths, settings: SetupSettings, probe: Arc<DependencyProbe>) -> Self {
        let config_store = Arc::new(ConfigStore::new(&paths));
        let directories = Arc::new(DirectoryManager::new(&paths));
        let backups = Arc::new(BackupManager::new(&paths, directories.clone()));
        let bus = ProgressBus::new();
        let run_lock = RunLock::new();

        let orchestrator = InstallationOrchestrator::new(
            config_store.clone(),
            probe.clone(),
            directories.clone(),
            bus.clone(),
            run_lock.clone(),
        );
        let updater = UpdateCoordinator::new(
            config_store.clone(),
            directories.clone(),
            backups.clone(),
            bus.clone(),
            run_lock.clone(),
            settings.backup_retention,
        );

        tracing::debug!(app_home = %paths.app_home().display(), "服务初始化完成");
        Self {
            paths,
            settings,
            config_store,
            directories,
            backups,
            probe,
            bus,
            run_lock,
            orchestrator,
            updater,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_install_and_update_share_run_lock() {
        let dir = TempDir::new().unwrap();
        let ctx = SetupContext::with_registry(
            SetupPaths::new(dir.path()),
            SetupSettings::default(),
            DetectorRegistry::empty(),
        );

        let session = ctx.orchestrator.start().unwrap();
        let result = ctx.updater.run().await;
        assert!(!result.success);
        drop(session);

        // 安装未完成，升级报告未安装
        let result = ctx.updater.run().await;
        assert!(result.message.contains("尚未完成安装"));
    }
}
