use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 应用主目录环境变量（测试或便携模式使用）
pub const HOME_ENV: &str = "RESEARCHDESK_HOME";
/// 默认数据目录环境变量
pub const DATA_DIR_ENV: &str = "RESEARCHDESK_DATA_DIR";
const PROBE_TIMEOUT_ENV: &str = "RESEARCHDESK_PROBE_TIMEOUT_SECS";
const BACKUP_RETENTION_ENV: &str = "RESEARCHDESK_BACKUP_RETENTION";

const CONFIG_FILE: &str = "config.json";
const BACKUPS_DIR: &str = "backups";
const LOGS_DIR: &str = "logs";
const LOCK_FILE: &str = ".setup.lock";

/// 应用自身文件的位置：
/// - ~/.researchdesk/config.json   安装配置
/// - ~/.researchdesk/backups/      数据目录备份
/// - ~/.researchdesk/logs/         日志
/// - ~/.researchdesk/.setup.lock   配置写入与备份/恢复共用的文件锁
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupPaths {
    app_home: PathBuf,
}

impl SetupPaths {
    pub fn new(app_home: impl Into<PathBuf>) -> Self {
        Self {
            app_home: app_home.into(),
        }
    }

    /// $RESEARCHDESK_HOME，否则 ~/.researchdesk
    pub fn from_env() -> Result<Self, String> {
        if let Some(home) = env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            return Ok(Self::new(PathBuf::from(home)));
        }
        let home_dir = dirs::home_dir().ok_or("无法获取用户主目录")?;
        Ok(Self::new(home_dir.join(".researchdesk")))
    }

    pub fn app_home(&self) -> &Path {
        &self.app_home
    }

    pub fn config_file(&self) -> PathBuf {
        self.app_home.join(CONFIG_FILE)
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.app_home.join(BACKUPS_DIR)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.app_home.join(LOGS_DIR)
    }

    pub fn lock_file(&self) -> PathBuf {
        self.app_home.join(LOCK_FILE)
    }
}

/// 运行参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupSettings {
    /// 单个工具检测的超时时间
    pub probe_timeout: Duration,
    /// 升级成功后保留的备份数量
    pub backup_retention: usize,
    /// 检测缓存有效期（None 表示直到显式清除）
    pub detection_ttl: Option<Duration>,
}

impl Default for SetupSettings {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(10),
            backup_retention: 5,
            detection_ttl: None,
        }
    }
}

impl SetupSettings {
    /// 读取环境变量覆盖，无效值忽略并保留默认值
    pub fn from_env() -> Self {
        let mut settings = Self::default();

        if let Some(secs) = read_env_number(PROBE_TIMEOUT_ENV) {
            if secs > 0 {
                settings.probe_timeout = Duration::from_secs(secs);
            }
        }
        if let Some(keep) = read_env_number(BACKUP_RETENTION_ENV) {
            if keep > 0 {
                settings.backup_retention = keep as usize;
            }
        }

        settings
    }
}

fn read_env_number(key: &str) -> Option<u64> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "忽略无效的环境变量");
            None
        }
    }
}
