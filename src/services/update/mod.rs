// 数据目录升级
//
// - coordinator: 启动时的结构校验、备份、迁移与修复
// - migration: 版本驱动的结构迁移

pub mod coordinator;
pub mod migration;

pub use coordinator::UpdateCoordinator;
pub use migration::{
    compare_versions, ConversationsToChats, McpConfigToDirectory, MigrationError,
    MigrationOutcome, MigrationRunner, StructureMigration,
};
