use crate::models::{LogConfig, LogFormat, LogLevel, LogOutput};
use crate::utils::SetupPaths;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    fmt,
    layer::{Layered, SubscriberExt},
    reload::{self, Handle},
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// 全局日志级别 reload handle
static LOG_LEVEL_HANDLE: OnceLock<Handle<EnvFilter, Registry>> = OnceLock::new();
/// 文件输出的后台写线程 guard，进程退出前不能 drop
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

const LOG_FILE_PREFIX: &str = "researchdesk.log";

type FilteredRegistry = Layered<reload::Layer<EnvFilter, Registry>, Registry>;
type BoxedLayer = Box<dyn Layer<FilteredRegistry> + Send + Sync + 'static>;

/// 初始化日志系统
///
/// 级别、格式、输出目标来自安装配置中的 `log_config`。
/// 只有级别支持运行时热更新（见 `update_log_level`），其他选项需要重启生效。
/// `RUST_LOG` 存在时优先使用。
pub fn init_logger(config: &LogConfig) -> anyhow::Result<()> {
    let filter = create_env_filter(config.level);
    let (filter_layer, reload_handle) = reload::Layer::new(filter);

    if LOG_LEVEL_HANDLE.set(reload_handle).is_err() {
        anyhow::bail!("日志系统已初始化，不能重复初始化");
    }

    let mut layers: Vec<BoxedLayer> = Vec::new();
    if matches!(config.output, LogOutput::Console | LogOutput::Both) {
        layers.push(console_layer(config.format));
    }
    if matches!(config.output, LogOutput::File | LogOutput::Both) {
        layers.push(file_layer(config.format, config.file_path.as_deref())?);
    }

    Registry::default().with(filter_layer).with(layers).try_init()?;

    tracing::info!(
        level = config.level.as_str(),
        format = ?config.format,
        output = ?config.output,
        file_path = ?config.file_path,
        "日志系统初始化完成"
    );
    Ok(())
}

fn create_env_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        // 本 crate 使用配置级别，第三方库只输出警告
        EnvFilter::new(format!("researchdesk={},tokio=warn", level.as_str()))
    })
}

// 日志写到 stderr，stdout 留给 CLI 的 JSON 输出
fn console_layer(format: LogFormat) -> BoxedLayer {
    match format {
        LogFormat::Text => fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(cfg!(debug_assertions))
            .with_ansi(true)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
    }
}

fn file_layer(format: LogFormat, file_path: Option<&str>) -> anyhow::Result<BoxedLayer> {
    let log_dir = resolve_log_dir(file_path)?;
    std::fs::create_dir_all(&log_dir)?;

    let (writer, guard) = non_blocking(rolling::daily(&log_dir, LOG_FILE_PREFIX));
    let _ = FILE_GUARD.set(guard);

    let layer = match format {
        LogFormat::Text => fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(false)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(writer)
            .with_target(true)
            .with_thread_ids(true)
            .boxed(),
    };
    Ok(layer)
}

/// 日志目录：配置指定的路径，否则为应用主目录下的 logs/
fn resolve_log_dir(file_path: Option<&str>) -> anyhow::Result<PathBuf> {
    match file_path {
        Some(path) if !path.trim().is_empty() => Ok(PathBuf::from(path)),
        _ => {
            let paths = SetupPaths::from_env().map_err(anyhow::Error::msg)?;
            Ok(paths.logs_dir())
        }
    }
}

/// 动态更新日志级别
pub fn update_log_level(new_level: LogLevel) -> anyhow::Result<()> {
    let handle = LOG_LEVEL_HANDLE
        .get()
        .ok_or_else(|| anyhow::anyhow!("日志系统未初始化"))?;

    handle
        .reload(create_env_filter(new_level))
        .map_err(|e| anyhow::anyhow!("重载日志级别失败: {e}"))?;

    tracing::info!(new_level = new_level.as_str(), "日志级别已动态更新");
    Ok(())
}
