//! 数据目录结构管理
//!
//! 数据目录布局：
//! ```text
//! <root>/
//!   notes/  chats/  skills/  workflows/  templates/
//!   mcp/servers.json          MCP 服务器列表
//!   .meta/structure.json      布局版本与创建时间
//! ```

use crate::core::{SetupError, SetupResult};
use crate::utils::{atomic_write, SetupPaths, DATA_DIR_ENV};
use chrono::Utc;
use serde_json::{json, Value};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// 当前布局版本
pub const LAYOUT_VERSION: u32 = 1;

const DIRECTORIES: [&str; 7] = [
    "notes",
    "chats",
    "skills",
    "workflows",
    "mcp",
    "templates",
    ".meta",
];

const STRUCTURE_FILE: &str = ".meta/structure.json";
const MCP_SERVERS_FILE: &str = "mcp/servers.json";

const DEFAULT_DIR_NAME: &str = "ResearchDesk";

pub struct DirectoryManager {
    fallback_root: PathBuf,
}

impl DirectoryManager {
    pub fn new(paths: &SetupPaths) -> Self {
        Self {
            fallback_root: paths.app_home().join("data"),
        }
    }

    /// 推荐的数据目录
    ///
    /// `$RESEARCHDESK_DATA_DIR`，否则系统应用数据目录下的 ResearchDesk，
    /// 都不可用时为应用主目录下的 data/。
    pub fn default_path(&self) -> PathBuf {
        if let Some(dir) = env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
            return PathBuf::from(dir);
        }
        dirs::data_dir()
            .map(|dir| dir.join(DEFAULT_DIR_NAME))
            .unwrap_or_else(|| self.fallback_root.clone())
    }

    /// 创建目录结构（幂等，已完整时不做任何修改）
    pub fn create_structure(&self, root: &Path) -> SetupResult<()> {
        let touched = self.repair_structure(root)?;
        if !touched.is_empty() {
            tracing::info!(root = %root.display(), created = touched.len(), "目录结构已创建");
        }
        Ok(())
    }

    /// 只读检查目录结构是否完整（不会返回错误）
    pub fn verify_structure(&self, root: &Path) -> bool {
        if !root.is_dir() {
            return false;
        }
        let dirs_ok = DIRECTORIES.iter().all(|dir| root.join(dir).is_dir());
        dirs_ok && seed_files().iter().all(|(rel, _)| is_valid_json_file(&root.join(rel)))
    }

    /// 修复缺失或损坏的条目，返回所有被修改的路径
    ///
    /// 损坏的条目重命名为 `<name>.corrupt-<时间戳>` 后重建。
    pub fn repair_structure(&self, root: &Path) -> SetupResult<Vec<PathBuf>> {
        ensure_root(root)?;
        let mut touched = Vec::new();

        for dir in DIRECTORIES {
            let path = root.join(dir);
            if path.is_dir() {
                continue;
            }
            if path.symlink_metadata().is_ok() {
                touched.push(quarantine(&path)?);
            }
            fs::create_dir_all(&path).map_err(|e| SetupError::structure(&path, e))?;
            tracing::debug!(path = %path.display(), "创建目录");
            touched.push(path);
        }

        for (rel, content) in seed_files() {
            let path = root.join(rel);
            if is_valid_json_file(&path) {
                continue;
            }
            if path.symlink_metadata().is_ok() {
                tracing::warn!(path = %path.display(), "种子文件损坏，重新生成");
                touched.push(quarantine(&path)?);
            }
            write_seed(&path, &content)?;
            touched.push(path);
        }

        Ok(touched)
    }
}

fn seed_files() -> [(&'static str, Value); 2] {
    [
        (
            STRUCTURE_FILE,
            json!({
                "layout_version": LAYOUT_VERSION,
                "created_at": Utc::now().to_rfc3339(),
            }),
        ),
        (MCP_SERVERS_FILE, json!({ "servers": [] })),
    ]
}

fn ensure_root(root: &Path) -> SetupResult<()> {
    if root.as_os_str().is_empty() {
        return Err(SetupError::InvalidDirectory("数据目录不能为空".to_string()));
    }
    if root.exists() && !root.is_dir() {
        return Err(SetupError::InvalidDirectory(format!(
            "{} 已存在且不是目录",
            root.display()
        )));
    }
    fs::create_dir_all(root).map_err(|e| SetupError::structure(root, e))
}

fn is_valid_json_file(path: &Path) -> bool {
    fs::read(path)
        .ok()
        .and_then(|bytes| serde_json::from_slice::<Value>(&bytes).ok())
        .is_some()
}

fn write_seed(path: &Path, content: &Value) -> SetupResult<()> {
    let bytes = serde_json::to_vec_pretty(content).map_err(|e| {
        SetupError::structure(path, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })?;
    atomic_write(path, &bytes).map_err(|e| SetupError::structure(path, e))?;
    tracing::debug!(path = %path.display(), "写入种子文件");
    Ok(())
}

/// 把损坏的条目移到一边，返回新路径
fn quarantine(path: &Path) -> SetupResult<PathBuf> {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".corrupt-{}", Utc::now().format("%Y%m%d%H%M%S%3f")));
    let target = path.with_file_name(name);

    fs::rename(path, &target).map_err(|e| SetupError::structure(path, e))?;
    tracing::warn!(from = %path.display(), to = %target.display(), "已隔离损坏的条目");
    Ok(target)
}
