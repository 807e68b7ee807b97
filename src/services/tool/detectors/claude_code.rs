// Claude Code Detector

use super::super::detector_trait::ToolDetector;
use crate::models::ToolKind;
use async_trait::async_trait;
use std::path::PathBuf;

/// Claude Code 工具检测器
pub struct ClaudeCodeDetector {
    /// 官方安装脚本的本地安装位置（~/.claude/local）
    local_install_dir: Option<PathBuf>,
}

impl ClaudeCodeDetector {
    pub fn new() -> Self {
        Self {
            local_install_dir: dirs::home_dir().map(|home| home.join(".claude").join("local")),
        }
    }
}

impl Default for ClaudeCodeDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolDetector for ClaudeCodeDetector {
    fn kind(&self) -> ToolKind {
        ToolKind::ClaudeCode
    }

    fn binary_name(&self) -> &str {
        "claude"
    }

    fn fallback_locations(&self) -> Vec<PathBuf> {
        let Some(dir) = &self.local_install_dir else {
            return Vec::new();
        };
        if cfg!(target_os = "windows") {
            vec![dir.join("claude.exe"), dir.join("claude.cmd")]
        } else {
            vec![dir.join("claude")]
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::models::DependencyInfo;
    use crate::utils::{CommandExecutor, PlatformInfo};
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn detector_without_fallback() -> ClaudeCodeDetector {
        ClaudeCodeDetector {
            local_install_dir: None,
        }
    }

    #[tokio::test]
    async fn test_detects_installed_claude() {
        let bin = TempDir::new().unwrap();
        let script = bin.path().join("claude");
        fs::write(&script, "#!/bin/sh\necho '2.0.14 (Claude Code)'\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let executor = CommandExecutor::with_platform(
            PlatformInfo::current().with_search_dirs(vec![bin.path().to_path_buf()]),
        );
        let info = detector_without_fallback().detect(&executor).await;

        assert!(matches!(info, DependencyInfo::ClaudeCode { .. }));
        assert!(info.installed());
        assert_eq!(info.version(), Some("2.0.14"));
        assert_eq!(info.path(), Some(script.to_string_lossy().as_ref()));
        assert!(info.base().in_path);
    }

    #[tokio::test]
    async fn test_missing_claude_is_not_an_error() {
        let bin = TempDir::new().unwrap();
        let executor = CommandExecutor::with_platform(
            PlatformInfo::current().with_search_dirs(vec![bin.path().to_path_buf()]),
        );
        let info = detector_without_fallback().detect(&executor).await;

        assert!(!info.installed());
        assert!(info.soft_error_message().is_none());
    }

    #[tokio::test]
    async fn test_fallback_location_is_not_in_path() {
        let local = TempDir::new().unwrap();
        let script = local.path().join("claude");
        fs::write(&script, "#!/bin/sh\necho 1.0.3\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let empty = TempDir::new().unwrap();
        let executor = CommandExecutor::with_platform(
            PlatformInfo::current().with_search_dirs(vec![empty.path().to_path_buf()]),
        );
        let detector = ClaudeCodeDetector {
            local_install_dir: Some(local.path().to_path_buf()),
        };
        let info = detector.detect(&executor).await;

        assert!(info.installed());
        assert!(!info.base().in_path);
        assert_eq!(info.version(), Some("1.0.3"));
    }
}
