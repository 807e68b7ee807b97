//! 文件操作辅助函数
//!
//! 提供流式校验和计算、原子写入等常用操作。

use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

/// 边复制边计算 SHA256，返回（十六进制哈希, 字节数）
///
/// 备份写入归档和校验归档条目共用，`writer` 为 `io::sink()` 时只计算哈希。
pub fn copy_with_checksum<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
) -> io::Result<(String, u64)> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];
    let mut size = 0u64;
    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
        writer.write_all(&buffer[..n])?;
        size += n as u64;
    }
    Ok((format!("{:x}", hasher.finalize()), size))
}

/// 同目录下的临时文件路径（如 config.json -> config.json.tmp）
pub fn sibling_temp_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

/// 原子写入文件
///
/// 先写入同目录的临时文件并 fsync，再 rename 覆盖目标文件。
/// 任何一步失败都会删除临时文件，目标文件保持原样。
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_path = sibling_temp_path(path, ".tmp");
    let result = (|| {
        let mut file = File::create(&temp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
        drop(file);
        set_private_permissions(&temp_path)?;
        fs::rename(&temp_path, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

/// 设置文件权限为仅当前用户可读写（Unix 0o600）
pub fn set_private_permissions(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_copy_with_checksum() -> io::Result<()> {
        let mut copied = Vec::new();
        let (checksum, size) = copy_with_checksum(&mut &b"test content"[..], &mut copied)?;

        // 64 位十六进制字符串（SHA256）
        assert_eq!(checksum.len(), 64);
        assert!(checksum.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(size, 12);
        assert_eq!(copied, b"test content");

        let (again, _) = copy_with_checksum(&mut &b"test content"[..], &mut io::sink())?;
        assert_eq!(again, checksum);
        Ok(())
    }

    #[test]
    fn test_atomic_write_replaces_content() -> io::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("nested").join("config.json");

        atomic_write(&path, b"{\"v\":1}")?;
        atomic_write(&path, b"{\"v\":2}")?;

        assert_eq!(fs::read_to_string(&path)?, "{\"v\":2}");
        assert!(!sibling_temp_path(&path, ".tmp").exists());
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_atomic_write_sets_private_permissions() -> io::Result<()> {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new()?;
        let path = dir.path().join("config.json");
        atomic_write(&path, b"{}")?;

        let mode = fs::metadata(&path)?.permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        Ok(())
    }
}
