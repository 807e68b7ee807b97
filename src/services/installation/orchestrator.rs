//! 首次安装流程
//!
//! `start()` 获取运行锁并返回一个 `InstallSession`，调用方按顺序驱动：
//! 选择目录 → 创建目录结构（随后自动检测工具）→ 可选的重新检测 → 完成。
//! 每次阶段转换都先发送进度事件再执行该阶段的工作。
//! 出错后流程进入 Error，不会自动重试。

use super::progress::ProgressBus;
use super::state::InstallationMachine;
use crate::core::{SetupError, SetupResult, TransitionError};
use crate::models::{
    AppConfig, DependencyInfo, InstallationConfig, InstallationProgress, InstallationResult,
    InstallationStage, ToolKind,
};
use crate::services::config_store::ConfigStore;
use crate::services::directory::DirectoryManager;
use crate::services::lock::{RunGuard, RunLock};
use crate::services::tool::DependencyProbe;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct InstallationOrchestrator {
    config_store: Arc<ConfigStore>,
    probe: Arc<DependencyProbe>,
    directories: Arc<DirectoryManager>,
    bus: ProgressBus,
    run_lock: RunLock,
}

impl InstallationOrchestrator {
    pub fn new(
        config_store: Arc<ConfigStore>,
        probe: Arc<DependencyProbe>,
        directories: Arc<DirectoryManager>,
        bus: ProgressBus,
        run_lock: RunLock,
    ) -> Self {
        Self {
            config_store,
            probe,
            directories,
            bus,
            run_lock,
        }
    }

    pub fn bus(&self) -> &ProgressBus {
        &self.bus
    }

    /// 开始一次安装，已有安装或升级在运行时返回 Busy
    pub fn start(&self) -> SetupResult<InstallSession<'_>> {
        let guard = self.run_lock.try_acquire("安装")?;
        let mut session = InstallSession {
            orchestrator: self,
            machine: InstallationMachine::new(),
            _guard: guard,
            suggested_path: PathBuf::new(),
            data_dir: None,
            dependencies: BTreeMap::new(),
        };

        session.emit("正在加载默认设置");
        session.suggested_path = self.directories.default_path();
        session.advance(InstallationStage::SelectingDirectory, "请选择数据目录")?;

        tracing::info!(suggested = %session.suggested_path.display(), "安装流程已开始");
        Ok(session)
    }

    /// 一次性执行完整的安装流程（未指定目录时使用推荐目录）
    pub async fn run(&self, data_dir: Option<PathBuf>) -> InstallationResult {
        let mut session = match self.start() {
            Ok(session) => session,
            Err(e) => return InstallationResult::failed(e.to_string(), BTreeMap::new()),
        };

        let dir = data_dir.unwrap_or_else(|| session.suggested_path().to_path_buf());
        if let Err(e) = session.select_directory(dir) {
            session.abort(&e);
            return session.into_failed(e);
        }
        if let Err(e) = session.create_structure().await {
            return session.into_failed(e);
        }
        session.finish()
    }

    /// 当前安装状态（已安装时使用配置中的目录）
    pub async fn status(&self) -> SetupResult<InstallationConfig> {
        let config = self.config_store.load_optional()?;
        let detected = self.probe.detect_all().await;

        let (app_data_path, is_first_install) = match config {
            Some(config) => (config.data_directory, false),
            None => (self.directories.default_path(), true),
        };
        Ok(installation_config(app_data_path, is_first_install, &detected))
    }

    /// 清除检测缓存后重新计算安装状态
    pub async fn redetect(&self) -> SetupResult<InstallationConfig> {
        self.probe.clear_cache(None);
        self.status().await
    }

    pub fn is_first_install(&self) -> bool {
        !self.config_store.exists()
    }

    pub fn verify_directory_structure(&self) -> SetupResult<bool> {
        let config = self.config_store.load()?;
        Ok(self.directories.verify_structure(&config.data_directory))
    }
}

fn installation_config(
    app_data_path: PathBuf,
    is_first_install: bool,
    detected: &BTreeMap<ToolKind, DependencyInfo>,
) -> InstallationConfig {
    let installed = |kind: ToolKind| detected.get(&kind).is_some_and(DependencyInfo::installed);
    InstallationConfig {
        app_data_path,
        is_first_install,
        claude_code_detected: installed(ToolKind::ClaudeCode),
        ollama_detected: installed(ToolKind::Ollama),
        gemini_detected: installed(ToolKind::Gemini),
    }
}

/// 一次安装流程，持有运行锁直到结束或放弃
pub struct InstallSession<'a> {
    orchestrator: &'a InstallationOrchestrator,
    machine: InstallationMachine,
    _guard: RunGuard,
    suggested_path: PathBuf,
    data_dir: Option<PathBuf>,
    dependencies: BTreeMap<ToolKind, DependencyInfo>,
}

impl<'a> InstallSession<'a> {
    pub fn stage(&self) -> InstallationStage {
        self.machine.current()
    }

    pub fn suggested_path(&self) -> &Path {
        &self.suggested_path
    }

    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    pub fn dependencies(&self) -> &BTreeMap<ToolKind, DependencyInfo> {
        &self.dependencies
    }

    /// 选择数据目录（目录不必已存在），可以多次选择
    pub fn select_directory(&mut self, path: impl Into<PathBuf>) -> SetupResult<()> {
        self.machine
            .require(InstallationStage::SelectingDirectory, "选择目录")?;

        let path = path.into();
        if path.as_os_str().is_empty() || path.to_string_lossy().trim().is_empty() {
            return Err(SetupError::InvalidDirectory("请选择数据目录".to_string()));
        }

        tracing::info!(path = %path.display(), "已选择数据目录");
        self.data_dir = Some(path);
        Ok(())
    }

    /// 创建目录结构，成功后进入依赖检测阶段并检测所有工具
    ///
    /// 失败时流程进入 Error，不可在本次流程中重试。
    pub async fn create_structure(&mut self) -> SetupResult<()> {
        self.machine
            .require(InstallationStage::SelectingDirectory, "创建目录结构")?;
        let dir = self
            .data_dir
            .clone()
            .ok_or_else(|| SetupError::InvalidDirectory("尚未选择数据目录".to_string()))?;

        self.advance(
            InstallationStage::CreatingStructure,
            format!("正在创建目录结构: {}", dir.display()),
        )?;
        if let Err(e) = self.orchestrator.directories.create_structure(&dir) {
            self.abort(&e);
            return Err(e);
        }

        self.advance(InstallationStage::DetectingDependencies, "正在检测 AI 工具")?;
        self.detect().await;
        Ok(())
    }

    /// 重新检测工具（只允许在依赖检测阶段）
    pub async fn redetect(&mut self) -> SetupResult<&BTreeMap<ToolKind, DependencyInfo>> {
        self.machine
            .require(InstallationStage::DetectingDependencies, "重新检测")?;
        self.emit("正在重新检测 AI 工具");
        self.orchestrator.probe.clear_cache(None);
        self.detect().await;
        Ok(&self.dependencies)
    }

    /// 写入安装配置并结束流程
    pub fn finish(mut self) -> InstallationResult {
        match self.persist() {
            Ok(config) => {
                debug_assert!(self.machine.is_complete());
                tracing::info!(
                    data_dir = %config.data_directory.display(),
                    steps = self.machine.history().len(),
                    "安装完成"
                );
                InstallationResult {
                    success: true,
                    config: Some(config),
                    dependencies: self.dependencies,
                    error_message: None,
                }
            }
            Err(e) => {
                if !self.machine.is_failed() {
                    self.abort(&e);
                }
                self.into_failed(e)
            }
        }
    }

    /// 放弃安装（只允许在创建目录之前，没有任何副作用）
    pub fn skip(self) -> Result<(), TransitionError> {
        self.machine.cancel()?;
        tracing::info!(stage = ?self.machine.current(), "用户跳过安装");
        Ok(())
    }

    fn persist(&mut self) -> SetupResult<AppConfig> {
        self.advance(InstallationStage::Installing, "正在写入工具配置")?;

        let data_dir = self
            .data_dir
            .clone()
            .ok_or_else(|| SetupError::InvalidDirectory("尚未选择数据目录".to_string()))?;
        let mut config = AppConfig::new(data_dir);
        for (kind, info) in &self.dependencies {
            config.enabled_tools.set(*kind, info.installed());
            config
                .tool_paths
                .set(*kind, info.path().map(str::to_string));
        }
        // 重新安装时保留原有的日志设置
        if let Ok(Some(existing)) = self.orchestrator.config_store.load_optional() {
            config.log_config = existing.log_config;
        }

        if let Err(e) = self.orchestrator.config_store.save(&config) {
            self.abort(&e);
            return Err(e);
        }

        self.advance(InstallationStage::Finalizing, "正在完成安装")?;
        if !self
            .orchestrator
            .directories
            .verify_structure(&config.data_directory)
        {
            tracing::warn!(data_dir = %config.data_directory.display(), "安装完成前目录结构校验未通过");
        }

        self.advance(InstallationStage::Complete, "安装完成")?;
        Ok(config)
    }

    async fn detect(&mut self) {
        self.dependencies = self.orchestrator.probe.detect_all().await;
        for info in self.dependencies.values() {
            if let Some(error) = info.soft_error_message() {
                tracing::warn!(tool = %info.kind(), error, "工具检测失败，按未安装处理");
            }
        }
    }

    fn advance(
        &mut self,
        stage: InstallationStage,
        message: impl Into<String>,
    ) -> Result<(), TransitionError> {
        self.machine.transition_to(stage)?;
        self.emit(message);
        Ok(())
    }

    fn emit(&self, message: impl Into<String>) {
        self.orchestrator
            .bus
            .emit(InstallationProgress::new(self.machine.current(), message));
    }

    fn abort(&mut self, error: &SetupError) {
        let message = error.to_string();
        if self.machine.fail(message.clone()).is_ok() {
            self.emit(message);
        }
    }

    fn into_failed(self, error: SetupError) -> InstallationResult {
        let message = self
            .machine
            .error_message()
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        tracing::debug!(failed_at = ?self.machine.failed_at(), "安装未完成");
        InstallationResult::failed(message, self.dependencies)
    }
}
