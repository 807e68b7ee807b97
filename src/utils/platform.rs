//! 平台信息与可执行文件查找
//!
//! GUI 应用启动时继承的 PATH 往往不完整（例如 macOS 从 Dock 启动），
//! 所以查找工具时会在 PATH 之外再补充常见的安装目录。

use std::env;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// 可执行文件位置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutableLocation {
    pub path: PathBuf,
    /// 是否位于 PATH 中（false 表示在补充目录中找到）
    pub in_path: bool,
}

/// 平台信息
#[derive(Debug, Clone)]
pub struct PlatformInfo {
    pub os: String,
    pub arch: String,
    pub is_windows: bool,
    pub is_macos: bool,
    pub is_linux: bool,
    /// 替换 PATH 的搜索目录（测试或受限环境使用）
    search_dirs: Option<Vec<PathBuf>>,
}

impl PlatformInfo {
    pub fn current() -> Self {
        Self {
            os: env::consts::OS.to_string(),
            arch: env::consts::ARCH.to_string(),
            is_windows: cfg!(target_os = "windows"),
            is_macos: cfg!(target_os = "macos"),
            is_linux: cfg!(target_os = "linux"),
            search_dirs: None,
        }
    }

    /// 只在给定目录中查找（不读取 PATH，也不补充常见目录）
    pub fn with_search_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.search_dirs = Some(dirs);
        self
    }

    /// PATH 中的目录
    fn path_dirs(&self) -> Vec<PathBuf> {
        if let Some(dirs) = &self.search_dirs {
            return dirs.clone();
        }
        env::var_os("PATH")
            .map(|path| env::split_paths(&path).collect())
            .unwrap_or_default()
    }

    /// 常见的安装目录（npm 全局目录、Homebrew、用户 bin 等）
    pub fn extra_search_dirs(&self) -> Vec<PathBuf> {
        if self.search_dirs.is_some() {
            return Vec::new();
        }

        let mut dirs = Vec::new();
        let home = dirs::home_dir();

        if self.is_windows {
            if let Some(appdata) = env::var_os("APPDATA") {
                dirs.push(PathBuf::from(appdata).join("npm"));
            }
            if let Some(local) = env::var_os("LOCALAPPDATA") {
                let local = PathBuf::from(local);
                dirs.push(local.join("Programs").join("Ollama"));
                dirs.push(local.join("Programs").join("claude"));
            }
            if let Some(home) = &home {
                dirs.push(home.join(".local").join("bin"));
            }
        } else {
            if let Some(home) = &home {
                dirs.push(home.join(".local").join("bin"));
                dirs.push(home.join(".npm-global").join("bin"));
                dirs.push(home.join(".claude").join("local"));
                dirs.push(home.join(".volta").join("bin"));
                dirs.push(home.join("bin"));
            }
            dirs.push(PathBuf::from("/usr/local/bin"));
            dirs.push(PathBuf::from("/usr/bin"));
            if self.is_macos {
                dirs.push(PathBuf::from("/opt/homebrew/bin"));
                dirs.push(PathBuf::from("/Applications/Ollama.app/Contents/Resources"));
            }
        }

        dirs
    }

    /// 构建增强的 PATH（原 PATH + 常见安装目录，去重）
    pub fn build_enhanced_path(&self) -> OsString {
        let mut all: Vec<PathBuf> = Vec::new();
        for dir in self.path_dirs().into_iter().chain(self.extra_search_dirs()) {
            if !all.contains(&dir) {
                all.push(dir);
            }
        }
        env::join_paths(all).unwrap_or_else(|_| env::var_os("PATH").unwrap_or_default())
    }

    /// 命令对应的候选文件名（Windows 需要补全扩展名）
    fn candidate_names(&self, name: &str) -> Vec<String> {
        if self.is_windows && Path::new(name).extension().is_none() {
            ["exe", "cmd", "bat"]
                .iter()
                .map(|ext| format!("{name}.{ext}"))
                .collect()
        } else {
            vec![name.to_string()]
        }
    }

    /// 查找可执行文件
    ///
    /// 先查找 PATH，再查找补充目录。目录枚举时遇到的非 NotFound 错误
    /// （如权限不足）会被记录，只有在最终没有找到时才返回。
    pub fn find_executable(&self, name: &str) -> io::Result<Option<ExecutableLocation>> {
        let mut first_error: Option<io::Error> = None;

        let search_order = self
            .path_dirs()
            .into_iter()
            .map(|dir| (dir, true))
            .chain(self.extra_search_dirs().into_iter().map(|dir| (dir, false)));

        for (dir, in_path) in search_order {
            for candidate in self.candidate_names(name) {
                let path = dir.join(&candidate);
                match fs::metadata(&path) {
                    Ok(meta) if meta.is_file() && is_executable(&meta) => {
                        return Ok(Some(ExecutableLocation { path, in_path }));
                    }
                    Ok(_) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => {
                        tracing::debug!(path = %path.display(), error = %e, "检查可执行文件失败");
                        if first_error.is_none() {
                            first_error = Some(e);
                        }
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }
}

#[cfg(unix)]
fn is_executable(meta: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_meta: &fs::Metadata) -> bool {
    true
}
