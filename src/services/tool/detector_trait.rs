// Tool Detector Trait - 工具检测器接口
//
// 每个可选工具实现此 trait，提供定位、版本读取以及工具特有的状态检测。
// 检测不会返回错误：找不到工具是正常结果，环境错误作为软错误写入结果。

use crate::models::{DependencyInfo, ProbeBase, ToolKind};
use crate::utils::{CommandExecutor, ExecutableLocation};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io;
use std::path::PathBuf;

static VERSION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"v?(\d+\.\d+\.\d+(?:-[\w.]+)?)").unwrap_or_else(|e| panic!("版本正则无效: {e}"))
});

/// 从命令输出中提取版本号
///
/// 匹配格式：v1.2.3 或 1.2.3-beta.1
pub fn extract_version(output: &str) -> Option<String> {
    VERSION_REGEX
        .captures(output)?
        .get(1)
        .map(|m| m.as_str().to_string())
}

#[async_trait]
pub trait ToolDetector: Send + Sync {
    fn kind(&self) -> ToolKind;

    fn tool_name(&self) -> &str {
        self.kind().display_name()
    }

    /// 可执行文件名（如 "claude"）
    fn binary_name(&self) -> &str;

    /// 版本检查参数
    fn version_args(&self) -> &[&str] {
        &["--version"]
    }

    /// PATH 和常见目录之外的候选位置
    fn fallback_locations(&self) -> Vec<PathBuf> {
        Vec::new()
    }

    /// 检测工具，默认只填充共享字段
    async fn detect(&self, executor: &CommandExecutor) -> DependencyInfo {
        DependencyInfo::from_base(self.kind(), self.probe_base(executor).await)
    }

    /// 定位可执行文件
    fn locate(&self, executor: &CommandExecutor) -> io::Result<Option<ExecutableLocation>> {
        if let Some(found) = executor.platform().find_executable(self.binary_name())? {
            return Ok(Some(found));
        }
        Ok(self
            .fallback_locations()
            .into_iter()
            .find(|path| path.is_file())
            .map(|path| ExecutableLocation {
                path,
                in_path: false,
            }))
    }

    /// 共享的检测逻辑：定位 + 读取版本
    async fn probe_base(&self, executor: &CommandExecutor) -> ProbeBase {
        let location = match self.locate(executor) {
            Ok(Some(location)) => location,
            Ok(None) => {
                tracing::debug!(tool = %self.kind(), "未找到可执行文件");
                return ProbeBase::missing();
            }
            Err(e) => {
                tracing::warn!(tool = %self.kind(), error = %e, "查找可执行文件失败");
                return ProbeBase::soft_error(format!("无法查找 {}: {e}", self.binary_name()));
            }
        };

        let result = executor
            .execute_async(&location.path, self.version_args())
            .await;

        let version = if result.success {
            extract_version(&result.stdout).or_else(|| extract_version(&result.stderr))
        } else {
            tracing::warn!(
                tool = %self.kind(),
                path = %location.path.display(),
                stderr = %result.stderr,
                "版本检查失败"
            );
            None
        };

        tracing::debug!(tool = %self.kind(), version = ?version, path = %location.path.display(), "检测到工具");
        ProbeBase {
            installed: true,
            version,
            path: Some(location.path.to_string_lossy().into_owned()),
            in_path: location.in_path,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::PlatformInfo;
    use tempfile::TempDir;

    struct PlainDetector;

    #[async_trait]
    impl ToolDetector for PlainDetector {
        fn kind(&self) -> ToolKind {
            ToolKind::Ollama
        }

        fn binary_name(&self) -> &str {
            "researchdesk-plain-tool"
        }
    }

    #[test]
    fn test_extract_version() {
        assert_eq!(extract_version("2.0.14 (Claude Code)").as_deref(), Some("2.0.14"));
        assert_eq!(
            extract_version("ollama version is 0.5.7").as_deref(),
            Some("0.5.7")
        );
        assert_eq!(extract_version("v1.2.3-beta.1").as_deref(), Some("1.2.3-beta.1"));
        assert_eq!(extract_version("unknown"), None);
    }

    // 搜索目录其实是普通文件，查找时返回 ENOTDIR 而不是 NotFound
    #[cfg(unix)]
    #[tokio::test]
    async fn test_lookup_error_becomes_soft_error() {
        let dir = TempDir::new().unwrap();
        let not_a_dir = dir.path().join("bin");
        std::fs::write(&not_a_dir, "").unwrap();
        let executor = CommandExecutor::with_platform(
            PlatformInfo::current().with_search_dirs(vec![not_a_dir]),
        );

        let info = PlainDetector.detect(&executor).await;
        assert!(!info.installed());
        let message = info.soft_error_message().unwrap();
        assert!(message.contains("researchdesk-plain-tool"), "{message}");
    }

    #[tokio::test]
    async fn test_missing_binary_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let executor = CommandExecutor::with_platform(
            PlatformInfo::current().with_search_dirs(vec![dir.path().to_path_buf()]),
        );

        let info = PlainDetector.detect(&executor).await;
        assert!(!info.installed());
        assert!(info.soft_error_message().is_none());
    }
}
