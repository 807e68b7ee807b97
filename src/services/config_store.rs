//! 安装配置存储
//!
//! 单文件 JSON（默认 ~/.researchdesk/config.json），写入采用「临时文件 + rename」，
//! 进程崩溃也不会留下截断的配置。读-改-写操作在进程内用互斥锁串行化，
//! 跨进程用 `.setup.lock` 文件锁串行化（与备份/恢复共用）。

use crate::core::{SetupError, SetupResult};
use crate::models::{AppConfig, ToolKind};
use crate::services::lock::DataLock;
use crate::utils::{atomic_write, SetupPaths};
use chrono::Utc;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub struct ConfigStore {
    config_path: PathBuf,
    lock_path: PathBuf,
    /// 进程内读-改-写串行化
    write_guard: Mutex<()>,
}

impl ConfigStore {
    pub fn new(paths: &SetupPaths) -> Self {
        Self {
            config_path: paths.config_file(),
            lock_path: paths.lock_file(),
            write_guard: Mutex::new(()),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn exists(&self) -> bool {
        self.config_path.is_file()
    }

    /// 读取配置
    ///
    /// 文件不存在返回 `ConfigNotFound`，无法解析返回 `ConfigCorrupt`，
    /// 不会静默返回默认配置。
    pub fn load(&self) -> SetupResult<AppConfig> {
        let content = match fs::read_to_string(&self.config_path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(SetupError::ConfigNotFound(self.config_path.clone()));
            }
            Err(e) => return Err(SetupError::io(&self.config_path, e)),
        };

        serde_json::from_str(&content).map_err(|e| {
            tracing::error!(path = %self.config_path.display(), error = %e, "配置文件解析失败");
            SetupError::ConfigCorrupt {
                path: self.config_path.clone(),
                reason: e.to_string(),
            }
        })
    }

    /// 读取配置，不存在时返回 None（损坏仍然返回错误）
    pub fn load_optional(&self) -> SetupResult<Option<AppConfig>> {
        match self.load() {
            Ok(config) => Ok(Some(config)),
            Err(SetupError::ConfigNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// 原子写入配置
    pub fn save(&self, config: &AppConfig) -> SetupResult<()> {
        let _guard = self.lock_in_process();
        let _lock = DataLock::acquire(&self.lock_path)?;
        self.write_locked(config)
    }

    /// 更新单个工具的启用状态和路径
    pub fn update_tool_config(
        &self,
        tool: ToolKind,
        enabled: bool,
        path: Option<String>,
    ) -> SetupResult<AppConfig> {
        self.modify(|config| {
            config.enabled_tools.set(tool, enabled);
            config.tool_paths.set(tool, path);
            tracing::info!(tool = %tool, enabled, "更新工具配置");
        })
    }

    /// 记录最近一次升级检查时间
    pub fn touch_last_check(&self) -> SetupResult<AppConfig> {
        self.modify(|config| {
            config.last_update_check = Some(Utc::now());
        })
    }

    /// 记录一次升级：写入新版本号（None 表示保持原版本）并更新检查时间
    pub fn record_update(&self, version: Option<&str>) -> SetupResult<AppConfig> {
        self.modify(|config| {
            if let Some(version) = version {
                config.version = version.to_string();
            }
            config.last_update_check = Some(Utc::now());
        })
    }

    /// 删除配置文件（不存在视为成功）
    pub fn reset(&self) -> SetupResult<()> {
        let _guard = self.lock_in_process();
        let _lock = DataLock::acquire(&self.lock_path)?;
        match fs::remove_file(&self.config_path) {
            Ok(()) => {
                tracing::info!(path = %self.config_path.display(), "配置已重置");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SetupError::config_write(&self.config_path, e)),
        }
    }

    /// 在锁内执行读-改-写
    fn modify<F>(&self, mutate: F) -> SetupResult<AppConfig>
    where
        F: FnOnce(&mut AppConfig),
    {
        let _guard = self.lock_in_process();
        let _lock = DataLock::acquire(&self.lock_path)?;

        let mut config = self.load()?;
        mutate(&mut config);
        self.write_locked(&config)?;
        Ok(config)
    }

    fn write_locked(&self, config: &AppConfig) -> SetupResult<()> {
        let json = serde_json::to_string_pretty(config).map_err(|e| {
            SetupError::config_write(&self.config_path, io::Error::new(io::ErrorKind::InvalidData, e))
        })?;

        atomic_write(&self.config_path, json.as_bytes())
            .map_err(|e| SetupError::config_write(&self.config_path, e))?;

        tracing::debug!(path = %self.config_path.display(), "配置已保存");
        Ok(())
    }

    fn lock_in_process(&self) -> std::sync::MutexGuard<'_, ()> {
        // 锁中毒只意味着另一个写入者 panic，配置文件本身仍然完整
        self.write_guard
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LogLevel, ToolPaths};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> ConfigStore {
        ConfigStore::new(&SetupPaths::new(dir.path()))
    }

    fn sample_config(dir: &TempDir) -> AppConfig {
        let mut config = AppConfig::new(dir.path().join("data"));
        config.enabled_tools.claude_code = true;
        config.tool_paths = ToolPaths {
            claude_code: Some("/usr/local/bin/claude".to_string()),
            ..ToolPaths::default()
        };
        config.log_config.level = LogLevel::Debug;
        config
    }

    #[test]
    fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let config = sample_config(&dir);

        assert!(!store.exists());
        store.save(&config).unwrap();
        assert!(store.exists());

        let loaded = store.load().unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = store(&dir).load().unwrap_err();
        assert!(matches!(err, SetupError::ConfigNotFound(_)));
        assert!(store(&dir).load_optional().unwrap().is_none());
    }

    #[test]
    fn test_load_corrupt_is_distinguishable() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        fs::write(store.config_path(), "{\"data_directory\": ").unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, SetupError::ConfigCorrupt { .. }));
        assert!(err.is_config_recoverable());

        // reset 后恢复为未安装状态
        store.reset().unwrap();
        assert!(!store.exists());
        assert!(matches!(store.load(), Err(SetupError::ConfigNotFound(_))));
    }

    #[test]
    fn test_update_tool_config() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.save(&sample_config(&dir)).unwrap();

        let updated = store
            .update_tool_config(ToolKind::Ollama, true, Some("/opt/ollama".to_string()))
            .unwrap();
        assert!(updated.enabled_tools.ollama);
        assert_eq!(updated.tool_paths.ollama.as_deref(), Some("/opt/ollama"));
        assert!(updated.enabled_tools.claude_code);

        let updated = store
            .update_tool_config(ToolKind::ClaudeCode, false, None)
            .unwrap();
        assert!(!updated.enabled_tools.claude_code);
        assert!(updated.tool_paths.claude_code.is_none());
        assert_eq!(store.load().unwrap(), updated);
    }

    #[test]
    fn test_update_without_config_fails() {
        let dir = TempDir::new().unwrap();
        let err = store(&dir)
            .update_tool_config(ToolKind::Gemini, true, None)
            .unwrap_err();
        assert!(matches!(err, SetupError::ConfigNotFound(_)));
    }

    #[test]
    fn test_touch_last_check() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.save(&sample_config(&dir)).unwrap();

        let before = Utc::now();
        let updated = store.touch_last_check().unwrap();
        let checked = updated.last_update_check.unwrap();
        assert!(checked >= before);
    }

    #[test]
    fn test_reset_missing_is_ok() {
        let dir = TempDir::new().unwrap();
        assert!(store(&dir).reset().is_ok());
    }

    #[test]
    fn test_concurrent_updates_are_serialized() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(store(&dir));
        store.save(&sample_config(&dir)).unwrap();

        let handles: Vec<_> = ToolKind::ALL
            .into_iter()
            .map(|kind| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store
                        .update_tool_config(kind, true, Some(format!("/bin/{kind}")))
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // 每个线程的修改都没有丢失
        let config = store.load().unwrap();
        for kind in ToolKind::ALL {
            assert!(config.enabled_tools.get(kind));
            assert_eq!(config.tool_paths.get(kind), Some(format!("/bin/{kind}").as_str()));
        }
    }
}
