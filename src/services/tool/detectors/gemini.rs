// Gemini CLI Detector
//
// 认证状态：存在 API Key 环境变量，或 ~/.gemini/oauth_creds.json 存在。

use super::super::detector_trait::ToolDetector;
use crate::models::{DependencyInfo, ToolKind};
use crate::utils::CommandExecutor;
use async_trait::async_trait;
use std::env;
use std::path::PathBuf;

const API_KEY_ENVS: [&str; 2] = ["GEMINI_API_KEY", "GOOGLE_API_KEY"];
const OAUTH_CREDS_FILE: &str = "oauth_creds.json";

pub struct GeminiDetector {
    config_dir: Option<PathBuf>,
}

impl GeminiDetector {
    pub fn new() -> Self {
        Self {
            config_dir: dirs::home_dir().map(|home| home.join(".gemini")),
        }
    }

    pub fn with_config_dir(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: Some(config_dir.into()),
        }
    }

    fn is_authenticated(&self) -> bool {
        let has_api_key = API_KEY_ENVS
            .iter()
            .any(|key| env::var(key).map(|v| !v.trim().is_empty()).unwrap_or(false));
        if has_api_key {
            return true;
        }

        self.config_dir
            .as_ref()
            .map(|dir| dir.join(OAUTH_CREDS_FILE).is_file())
            .unwrap_or(false)
    }
}

impl Default for GeminiDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolDetector for GeminiDetector {
    fn kind(&self) -> ToolKind {
        ToolKind::Gemini
    }

    fn binary_name(&self) -> &str {
        "gemini"
    }

    async fn detect(&self, executor: &CommandExecutor) -> DependencyInfo {
        let base = self.probe_base(executor).await;
        // 未安装时认证状态没有意义
        let authenticated = base.installed && self.is_authenticated();
        DependencyInfo::Gemini {
            base,
            authenticated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    fn clear_api_keys() {
        for key in API_KEY_ENVS {
            env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_oauth_creds_means_authenticated() {
        clear_api_keys();
        let dir = TempDir::new().unwrap();
        let detector = GeminiDetector::with_config_dir(dir.path());
        assert!(!detector.is_authenticated());

        fs::write(dir.path().join(OAUTH_CREDS_FILE), "{}").unwrap();
        assert!(detector.is_authenticated());
    }

    #[test]
    #[serial]
    fn test_api_key_means_authenticated() {
        clear_api_keys();
        let dir = TempDir::new().unwrap();
        let detector = GeminiDetector::with_config_dir(dir.path());

        env::set_var("GEMINI_API_KEY", "  ");
        assert!(!detector.is_authenticated());

        env::set_var("GEMINI_API_KEY", "test-key");
        assert!(detector.is_authenticated());
        clear_api_keys();
    }

    #[tokio::test]
    #[serial]
    async fn test_not_installed_is_never_authenticated() {
        env::set_var("GOOGLE_API_KEY", "test-key");
        let dir = TempDir::new().unwrap();
        let executor = CommandExecutor::with_platform(
            crate::utils::PlatformInfo::current().with_search_dirs(vec![dir.path().to_path_buf()]),
        );

        let info = GeminiDetector::with_config_dir(dir.path())
            .detect(&executor)
            .await;
        clear_api_keys();

        assert!(!info.installed());
        assert!(matches!(info, DependencyInfo::Gemini { authenticated: false, .. }));
    }
}
