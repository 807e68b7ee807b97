// 命令层
//
// 界面调用的操作入口，错误统一转换为可直接展示的字符串。

pub mod config_commands;
pub mod installation_commands;
pub mod state;
pub mod update_commands;

pub use config_commands::*;
pub use installation_commands::*;
pub use state::{CliToolDetections, SetupState};
pub use update_commands::*;
