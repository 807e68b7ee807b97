//! 锁
//!
//! - `DataLock`：跨进程的文件锁（fs2），配置写入与备份/恢复共用同一个锁文件
//! - `RunLock`：进程内的运行锁，同一时间只允许一个安装或升级流程

use crate::core::{SetupError, SetupResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// 数据目录的排他文件锁，drop 时自动释放
#[derive(Debug)]
pub struct DataLock {
    file: File,
    path: PathBuf,
}

impl DataLock {
    /// 获取排他锁（阻塞等待其他写操作完成）
    ///
    /// 同一进程内不要嵌套获取同一个锁文件，否则会死锁。
    pub fn acquire(lock_path: &Path) -> SetupResult<Self> {
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent).map_err(|e| SetupError::Lock {
                path: lock_path.to_path_buf(),
                source: e,
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(lock_path)
            .map_err(|e| SetupError::Lock {
                path: lock_path.to_path_buf(),
                source: e,
            })?;

        file.lock_exclusive().map_err(|e| SetupError::Lock {
            path: lock_path.to_path_buf(),
            source: e,
        })?;

        tracing::trace!(path = %lock_path.display(), "已获取文件锁");
        Ok(Self {
            file,
            path: lock_path.to_path_buf(),
        })
    }
}

impl Drop for DataLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!(path = %self.path.display(), error = %e, "释放文件锁失败");
        }
    }
}

/// 进程内运行锁
#[derive(Debug, Clone, Default)]
pub struct RunLock {
    inner: Arc<Mutex<()>>,
}

/// 持有期间独占运行权
#[derive(Debug)]
pub struct RunGuard {
    _guard: OwnedMutexGuard<()>,
    operation: &'static str,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        tracing::debug!(operation = self.operation, "释放运行锁");
    }
}

impl RunLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// 尝试获取运行权，已有流程在运行时立即返回 Busy
    pub fn try_acquire(&self, operation: &'static str) -> SetupResult<RunGuard> {
        match self.inner.clone().try_lock_owned() {
            Ok(guard) => {
                tracing::debug!(operation, "获取运行锁");
                Ok(RunGuard {
                    _guard: guard,
                    operation,
                })
            }
            Err(_) => {
                tracing::warn!(operation, "已有流程在运行，拒绝并发启动");
                Err(SetupError::Busy(operation.to_string()))
            }
        }
    }

    pub fn is_held(&self) -> bool {
        self.inner.try_lock().is_err()
    }
}
