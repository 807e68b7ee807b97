//! 数据目录备份
//!
//! 备份为 zip 归档，存放在 ~/.researchdesk/backups/，文件名即创建时间
//! （`backup-YYYYMMDD-HHMMSS-mmm.zip`，UTC），按文件名排序即按时间排序。
//! 归档内附带 `__backup_manifest.json`，记录每个文件的 SHA-256 和大小，
//! 恢复前用它校验归档完整性。
//!
//! 备份和恢复都持有 `.setup.lock`，与配置写入互斥。

use crate::core::{SetupError, SetupResult};
use crate::models::BackupRecord;
use crate::services::directory::DirectoryManager;
use crate::services::lock::DataLock;
use crate::utils::{copy_with_checksum, sibling_temp_path, SetupPaths};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MANIFEST_NAME: &str = "__backup_manifest.json";
const NAME_PREFIX: &str = "backup-";
const NAME_SUFFIX: &str = ".zip";
const PARTIAL_SUFFIX: &str = ".partial";

#[derive(Debug, Serialize, Deserialize)]
struct BackupManifest {
    created_at: DateTime<Utc>,
    source: PathBuf,
    app_version: String,
    files: BTreeMap<String, ManifestEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ManifestEntry {
    sha256: String,
    size: u64,
}

pub struct BackupManager {
    backups_dir: PathBuf,
    lock_path: PathBuf,
    directories: Arc<DirectoryManager>,
}

impl BackupManager {
    pub fn new(paths: &SetupPaths, directories: Arc<DirectoryManager>) -> Self {
        Self {
            backups_dir: paths.backups_dir(),
            lock_path: paths.lock_file(),
            directories,
        }
    }

    pub fn backups_dir(&self) -> &Path {
        &self.backups_dir
    }

    /// 备份整个数据目录
    ///
    /// 归档先写入 `.partial` 文件并 fsync，完成后才重命名为正式文件名；
    /// 任何失败都会删除未完成的文件。
    pub fn backup(&self, root: &Path) -> SetupResult<BackupRecord> {
        if !root.is_dir() {
            return Err(SetupError::Backup(format!(
                "数据目录不存在: {}",
                root.display()
            )));
        }

        let _lock = DataLock::acquire(&self.lock_path)?;
        fs::create_dir_all(&self.backups_dir).map_err(|e| {
            SetupError::Backup(format!("无法创建备份目录 {}: {e}", self.backups_dir.display()))
        })?;

        let created_at = self.next_timestamp()?;
        let path = self.backups_dir.join(archive_name(created_at));
        let partial = sibling_temp_path(&path, PARTIAL_SUFFIX);

        tracing::info!(root = %root.display(), archive = %path.display(), "开始备份");
        if let Err(e) = self.write_archive(root, &partial, created_at) {
            let _ = fs::remove_file(&partial);
            tracing::error!(error = %e, "备份失败，已删除未完成的归档");
            return Err(SetupError::Backup(format!("写入备份归档失败: {e}")));
        }

        if let Err(e) = fs::rename(&partial, &path) {
            let _ = fs::remove_file(&partial);
            return Err(SetupError::Backup(format!("保存备份归档失败: {e}")));
        }

        tracing::info!(archive = %path.display(), "备份完成");
        Ok(BackupRecord { path, created_at })
    }

    /// 所有备份，最新的在前
    pub fn list(&self) -> SetupResult<Vec<BackupRecord>> {
        let entries = match fs::read_dir(&self.backups_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(SetupError::io(&self.backups_dir, e)),
        };

        let mut records: Vec<BackupRecord> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| {
                let created_at = parse_archive_name(&entry.file_name().to_string_lossy())?;
                Some(BackupRecord {
                    path: entry.path(),
                    created_at,
                })
            })
            .collect();

        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    pub fn latest(&self) -> SetupResult<Option<BackupRecord>> {
        Ok(self.list()?.into_iter().next())
    }

    /// 只保留最新的 `keep` 个备份，返回被删除的路径
    ///
    /// `keep == 0` 会删除全部备份，必须显式传入 `force`。
    pub fn prune(&self, keep: usize, force: bool) -> SetupResult<Vec<PathBuf>> {
        if keep == 0 && !force {
            return Err(SetupError::InvalidRetention);
        }

        let mut deleted = Vec::new();
        for record in self.list()?.into_iter().skip(keep) {
            fs::remove_file(&record.path).map_err(|e| {
                SetupError::Backup(format!("删除备份 {} 失败: {e}", record.path.display()))
            })?;
            tracing::debug!(archive = %record.path.display(), "已删除旧备份");
            deleted.push(record.path);
        }

        if !deleted.is_empty() {
            tracing::info!(deleted = deleted.len(), keep, "清理旧备份完成");
        }
        Ok(deleted)
    }

    /// 校验归档：逐个读取条目（zip CRC）并核对清单中的哈希和大小
    pub fn verify_archive(&self, archive: &Path) -> bool {
        match read_and_check(archive) {
            Ok(()) => true,
            Err(reason) => {
                tracing::warn!(archive = %archive.display(), reason = %reason, "备份归档校验失败");
                false
            }
        }
    }

    /// 数据目录结构完整，且最新的备份（如有）可用
    pub fn verify_integrity(&self, root: &Path) -> bool {
        if !self.directories.verify_structure(root) {
            return false;
        }
        match self.latest() {
            Ok(Some(record)) => self.verify_archive(&record.path),
            Ok(None) => true,
            Err(e) => {
                tracing::warn!(error = %e, "读取备份列表失败");
                false
            }
        }
    }

    /// 从备份恢复数据目录
    ///
    /// 归档校验通过后先解压到同级的临时目录，再整体替换数据目录。
    /// 替换之前的任何失败都不会改动现有数据目录。
    pub fn restore(&self, archive: &Path, root: &Path) -> SetupResult<()> {
        let _lock = DataLock::acquire(&self.lock_path)?;

        read_and_check(archive)
            .map_err(|reason| SetupError::Restore(format!("备份归档校验失败: {reason}")))?;

        let parent = root
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| SetupError::Restore(format!("无效的数据目录: {}", root.display())))?;
        fs::create_dir_all(parent)
            .map_err(|e| SetupError::Restore(format!("无法创建 {}: {e}", parent.display())))?;

        let stamp = Utc::now().format("%Y%m%d%H%M%S%3f").to_string();
        let staging = sibling_temp_path(root, &format!(".restore-{stamp}"));
        let previous = sibling_temp_path(root, &format!(".pre-restore-{stamp}"));

        tracing::info!(archive = %archive.display(), root = %root.display(), "开始恢复备份");
        if let Err(e) = extract_archive(archive, &staging) {
            let _ = fs::remove_dir_all(&staging);
            return Err(SetupError::Restore(format!("解压备份失败: {e}")));
        }

        let had_live_tree = root.exists();
        if had_live_tree {
            if let Err(e) = fs::rename(root, &previous) {
                let _ = fs::remove_dir_all(&staging);
                return Err(SetupError::Restore(format!("无法替换数据目录: {e}")));
            }
        }

        if let Err(e) = fs::rename(&staging, root) {
            if had_live_tree {
                if let Err(rollback) = fs::rename(&previous, root) {
                    tracing::error!(
                        error = %rollback,
                        previous = %previous.display(),
                        "回滚失败，原数据保留在该目录"
                    );
                }
            }
            let _ = fs::remove_dir_all(&staging);
            return Err(SetupError::Restore(format!("无法替换数据目录: {e}")));
        }

        if had_live_tree {
            if let Err(e) = fs::remove_dir_all(&previous) {
                tracing::warn!(path = %previous.display(), error = %e, "删除旧数据目录失败");
            }
        }

        tracing::info!(root = %root.display(), "恢复完成");
        Ok(())
    }

    /// 新备份的时间戳，保证严格晚于已有的最新备份
    fn next_timestamp(&self) -> SetupResult<DateTime<Utc>> {
        let now = truncate_to_millis(Utc::now());
        let Some(newest) = self.latest()? else {
            return Ok(now);
        };
        if now > newest.created_at {
            Ok(now)
        } else {
            Ok(newest.created_at + chrono::Duration::milliseconds(1))
        }
    }

    fn write_archive(&self, root: &Path, target: &Path, created_at: DateTime<Utc>) -> io::Result<()> {
        let file = File::create(target)?;
        let mut zip = ZipWriter::new(file);
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        let mut files = BTreeMap::new();
        let walker = WalkDir::new(root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !entry.path().starts_with(&self.backups_dir));

        for entry in walker {
            let entry = entry.map_err(io::Error::from)?;
            let rel = archive_path(root, entry.path())?;

            if entry.file_type().is_dir() {
                zip.add_directory(format!("{rel}/"), options)?;
            } else if entry.file_type().is_file() {
                let options = options.unix_permissions(file_mode(entry.path())?);
                zip.start_file(rel.as_str(), options)?;
                let (sha256, size) =
                    copy_with_checksum(&mut File::open(entry.path())?, &mut zip)?;
                files.insert(rel, ManifestEntry { sha256, size });
            } else {
                tracing::warn!(path = %entry.path().display(), "跳过非普通文件");
            }
        }

        let manifest = BackupManifest {
            created_at,
            source: root.to_path_buf(),
            app_version: crate::APP_VERSION.to_string(),
            files,
        };
        zip.start_file(MANIFEST_NAME, options)?;
        serde_json::to_writer_pretty(&mut zip, &manifest)?;

        let file = zip.finish()?;
        file.sync_all()
    }
}

fn archive_name(created_at: DateTime<Utc>) -> String {
    format!(
        "{NAME_PREFIX}{}-{:03}{NAME_SUFFIX}",
        created_at.format("%Y%m%d-%H%M%S"),
        created_at.timestamp_subsec_millis()
    )
}

fn parse_archive_name(name: &str) -> Option<DateTime<Utc>> {
    let stem = name.strip_prefix(NAME_PREFIX)?.strip_suffix(NAME_SUFFIX)?;
    let (seconds, millis) = stem.rsplit_once('-')?;
    if millis.len() != 3 {
        return None;
    }
    let millis: i64 = millis.parse().ok()?;
    let naive = NaiveDateTime::parse_from_str(seconds, "%Y%m%d-%H%M%S").ok()?;
    Some(Utc.from_utc_datetime(&naive) + chrono::Duration::milliseconds(millis))
}

fn truncate_to_millis(time: DateTime<Utc>) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(time.timestamp_millis())
        .single()
        .unwrap_or(time)
}

/// 归档内的相对路径，统一使用 `/`
fn archive_path(root: &Path, path: &Path) -> io::Result<String> {
    let rel = path
        .strip_prefix(root)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}

#[cfg(unix)]
fn file_mode(path: &Path) -> io::Result<u32> {
    use std::os::unix::fs::PermissionsExt;
    Ok(fs::metadata(path)?.permissions().mode() & 0o777)
}

#[cfg(not(unix))]
fn file_mode(_path: &Path) -> io::Result<u32> {
    Ok(0o644)
}

/// 读取全部条目并核对清单，失败时返回原因
fn read_and_check(archive: &Path) -> Result<(), String> {
    let file = File::open(archive).map_err(|e| format!("无法打开归档: {e}"))?;
    let mut zip = ZipArchive::new(file).map_err(|e| format!("无法读取 zip: {e}"))?;

    let mut manifest: Option<BackupManifest> = None;
    let mut actual = BTreeMap::new();

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(|e| format!("读取条目失败: {e}"))?;
        let name = entry.name().to_string();
        if entry.enclosed_name().is_none() {
            return Err(format!("条目路径不安全: {name}"));
        }
        if entry.is_dir() {
            continue;
        }

        if name == MANIFEST_NAME {
            let mut content = Vec::new();
            entry
                .read_to_end(&mut content)
                .map_err(|e| format!("读取清单失败: {e}"))?;
            manifest = Some(
                serde_json::from_slice(&content).map_err(|e| format!("清单格式错误: {e}"))?,
            );
        } else {
            let (sha256, size) = copy_with_checksum(&mut entry, &mut io::sink())
                .map_err(|e| format!("条目 {name} 损坏: {e}"))?;
            actual.insert(name, ManifestEntry { sha256, size });
        }
    }

    let manifest = manifest.ok_or_else(|| "缺少备份清单".to_string())?;
    if manifest.files != actual {
        let missing = manifest.files.keys().find(|k| !actual.contains_key(*k));
        let mismatch = manifest
            .files
            .iter()
            .find(|(k, v)| actual.get(*k).is_some_and(|a| a != *v))
            .map(|(k, _)| k);
        return Err(match (missing, mismatch) {
            (Some(name), _) => format!("缺少文件: {name}"),
            (None, Some(name)) => format!("文件内容不一致: {name}"),
            (None, None) => "归档包含清单之外的文件".to_string(),
        });
    }
    Ok(())
}

fn extract_archive(archive: &Path, target: &Path) -> io::Result<()> {
    let mut zip = ZipArchive::new(File::open(archive)?).map_err(io::Error::from)?;
    fs::create_dir_all(target)?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(io::Error::from)?;
        let Some(rel) = entry.enclosed_name().map(Path::to_path_buf) else {
            continue;
        };
        if entry.name() == MANIFEST_NAME {
            continue;
        }

        let out = target.join(rel);
        if entry.is_dir() {
            fs::create_dir_all(&out)?;
            continue;
        }
        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = File::create(&out)?;
        io::copy(&mut entry, &mut file)?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&out, fs::Permissions::from_mode(mode & 0o777))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        root: PathBuf,
        manager: BackupManager,
        directories: Arc<DirectoryManager>,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let paths = SetupPaths::new(dir.path().join("home"));
        let directories = Arc::new(DirectoryManager::new(&paths));
        let root = dir.path().join("data");
        directories.create_structure(&root).unwrap();
        fs::write(root.join("notes").join("paper.md"), "# 文献笔记\n").unwrap();
        fs::create_dir_all(root.join("chats").join("2024")).unwrap();
        fs::write(root.join("chats").join("2024").join("a.json"), "{}").unwrap();

        Fixture {
            manager: BackupManager::new(&paths, directories.clone()),
            _dir: dir,
            root,
            directories,
        }
    }

    #[test]
    fn test_archive_name_round_trip() {
        let time = Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap()
            + chrono::Duration::milliseconds(42);
        let name = archive_name(time);
        assert_eq!(name, "backup-20240305-070809-042.zip");
        assert_eq!(parse_archive_name(&name), Some(time));
        assert_eq!(parse_archive_name("backup-20240305-070809-042.zip.partial"), None);
        assert_eq!(parse_archive_name("notes.zip"), None);
    }

    #[test]
    fn test_backup_creates_verifiable_archive() {
        let f = fixture();
        let record = f.manager.backup(&f.root).unwrap();

        assert!(record.path.is_file());
        assert!(f.manager.verify_archive(&record.path));
        assert!(!sibling_temp_path(&record.path, PARTIAL_SUFFIX).exists());
        assert_eq!(f.manager.list().unwrap(), vec![record]);
        assert!(f.manager.verify_integrity(&f.root));
    }

    #[test]
    fn test_list_is_strictly_descending() {
        let f = fixture();
        let records: Vec<_> = (0..4).map(|_| f.manager.backup(&f.root).unwrap()).collect();

        let listed = f.manager.list().unwrap();
        assert_eq!(listed.len(), 4);
        for pair in listed.windows(2) {
            assert!(pair[0].created_at > pair[1].created_at);
        }
        assert_eq!(listed[0], records[3]);
    }

    #[test]
    fn test_prune_keeps_most_recent() {
        let f = fixture();
        for _ in 0..5 {
            f.manager.backup(&f.root).unwrap();
        }
        let newest = f.manager.latest().unwrap().unwrap();

        let deleted = f.manager.prune(2, false).unwrap();
        assert_eq!(deleted.len(), 3);
        let remaining = f.manager.list().unwrap();
        assert_eq!(remaining.len(), 2);
        assert_eq!(remaining[0], newest);

        // 保留数量大于现有数量时不删除
        assert!(f.manager.prune(10, false).unwrap().is_empty());
    }

    #[test]
    fn test_prune_zero_requires_force() {
        let f = fixture();
        f.manager.backup(&f.root).unwrap();

        let err = f.manager.prune(0, false).unwrap_err();
        assert!(matches!(err, SetupError::InvalidRetention));
        assert_eq!(f.manager.list().unwrap().len(), 1);

        assert_eq!(f.manager.prune(0, true).unwrap().len(), 1);
        assert!(f.manager.list().unwrap().is_empty());
    }

    #[test]
    fn test_restore_replaces_tree() {
        let f = fixture();
        let record = f.manager.backup(&f.root).unwrap();

        fs::write(f.root.join("notes").join("paper.md"), "changed").unwrap();
        fs::write(f.root.join("notes").join("new.md"), "new").unwrap();

        f.manager.restore(&record.path, &f.root).unwrap();
        assert_eq!(
            fs::read_to_string(f.root.join("notes").join("paper.md")).unwrap(),
            "# 文献笔记\n"
        );
        assert!(!f.root.join("notes").join("new.md").exists());
        assert!(f.root.join("chats").join("2024").join("a.json").is_file());
        assert!(f.directories.verify_structure(&f.root));

        // 没有留下临时目录
        let leftovers: Vec<_> = fs::read_dir(f.root.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("data."))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_restore_into_missing_root() {
        let f = fixture();
        let record = f.manager.backup(&f.root).unwrap();
        fs::remove_dir_all(&f.root).unwrap();

        f.manager.restore(&record.path, &f.root).unwrap();
        assert!(f.directories.verify_structure(&f.root));
    }

    #[test]
    fn test_corrupt_archive_leaves_tree_untouched() {
        let f = fixture();
        let record = f.manager.backup(&f.root).unwrap();

        let mut bytes = fs::read(&record.path).unwrap();
        let middle = bytes.len() / 2;
        bytes.truncate(middle);
        fs::write(&record.path, bytes).unwrap();
        fs::write(f.root.join("notes").join("paper.md"), "live").unwrap();

        assert!(!f.manager.verify_archive(&record.path));
        let err = f.manager.restore(&record.path, &f.root).unwrap_err();
        assert!(matches!(err, SetupError::Restore(_)));
        assert_eq!(
            fs::read_to_string(f.root.join("notes").join("paper.md")).unwrap(),
            "live"
        );
        assert!(f.directories.verify_structure(&f.root));
        assert!(!f.manager.verify_integrity(&f.root));
    }

    #[test]
    fn test_archive_without_manifest_is_rejected() {
        let f = fixture();
        let path = f.manager.backups_dir().join("backup-20240101-000000-000.zip");
        fs::create_dir_all(f.manager.backups_dir()).unwrap();
        let mut zip = ZipWriter::new(File::create(&path).unwrap());
        zip.start_file("notes/x.md", FileOptions::default()).unwrap();
        zip.write_all(b"x").unwrap();
        zip.finish().unwrap();

        assert!(!f.manager.verify_archive(&path));
        assert!(matches!(
            f.manager.restore(&path, &f.root),
            Err(SetupError::Restore(_))
        ));
    }

    #[test]
    fn test_backup_of_missing_root_fails() {
        let f = fixture();
        let err = f.manager.backup(&f.root.join("nope")).unwrap_err();
        assert!(matches!(err, SetupError::Backup(_)));
        assert!(f.manager.list().unwrap().is_empty());
    }
}
