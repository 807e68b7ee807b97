// Ollama Detector
//
// 除了安装状态，还检测本地服务是否在运行（`ollama list` 需要连接服务）。

use super::super::detector_trait::ToolDetector;
use crate::models::{DependencyInfo, ToolKind};
use crate::utils::CommandExecutor;
use async_trait::async_trait;
use std::path::PathBuf;

pub struct OllamaDetector;

impl OllamaDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for OllamaDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolDetector for OllamaDetector {
    fn kind(&self) -> ToolKind {
        ToolKind::Ollama
    }

    fn binary_name(&self) -> &str {
        "ollama"
    }

    fn fallback_locations(&self) -> Vec<PathBuf> {
        if cfg!(target_os = "macos") {
            vec![PathBuf::from("/Applications/Ollama.app/Contents/Resources/ollama")]
        } else {
            Vec::new()
        }
    }

    async fn detect(&self, executor: &CommandExecutor) -> DependencyInfo {
        let base = self.probe_base(executor).await;

        let running = match base.path.as_deref() {
            Some(path) if base.installed => {
                let result = executor.execute_async(path, ["list"]).await;
                if !result.success {
                    tracing::debug!(stderr = %result.stderr, "Ollama 服务未运行");
                }
                result.success
            }
            _ => false,
        };

        DependencyInfo::Ollama { base, running }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::utils::PlatformInfo;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn executor_with_script(dir: &TempDir, body: &str) -> CommandExecutor {
        let script = dir.path().join("ollama");
        fs::write(&script, body).unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        CommandExecutor::with_platform(
            PlatformInfo::current().with_search_dirs(vec![dir.path().to_path_buf()]),
        )
    }

    #[tokio::test]
    async fn test_running_service() {
        let dir = TempDir::new().unwrap();
        let executor = executor_with_script(
            &dir,
            "#!/bin/sh\ncase \"$1\" in\n  --version) echo 'ollama version is 0.5.7' ;;\n  list) echo 'NAME ID SIZE' ;;\nesac\n",
        );

        let info = OllamaDetector::new().detect(&executor).await;
        assert!(info.installed());
        assert_eq!(info.version(), Some("0.5.7"));
        assert!(matches!(info, DependencyInfo::Ollama { running: true, .. }));
    }

    #[tokio::test]
    async fn test_installed_but_not_running() {
        let dir = TempDir::new().unwrap();
        let executor = executor_with_script(
            &dir,
            "#!/bin/sh\ncase \"$1\" in\n  --version) echo 'ollama version is 0.5.7' ;;\n  list) echo 'could not connect to ollama app' >&2; exit 1 ;;\nesac\n",
        );

        let info = OllamaDetector::new().detect(&executor).await;
        assert!(info.installed());
        assert!(matches!(info, DependencyInfo::Ollama { running: false, .. }));
    }
}
