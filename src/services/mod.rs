// 服务层模块
//
// - config_store: 安装配置的读写
// - directory: 数据目录结构的创建、校验与修复
// - backup: 数据目录备份与恢复
// - tool: 外部工具检测
// - installation: 首次安装流程
// - update: 启动时的升级与结构修复
// - context: 服务装配

pub mod backup;
pub mod config_store;
pub mod context;
pub mod directory;
pub mod installation;
pub mod lock;
pub mod tool;
pub mod update;

pub use backup::BackupManager;
pub use config_store::ConfigStore;
pub use context::SetupContext;
pub use directory::DirectoryManager;
pub use installation::{InstallationOrchestrator, InstallSession, ProgressBus};
pub use lock::{DataLock, RunLock};
pub use tool::{DependencyProbe, DetectorRegistry, ToolDetector};
pub use update::UpdateCoordinator;
