// 核心基础设施：错误类型与日志
pub mod error;
pub mod logger;

pub use error::{SetupError, SetupResult, TransitionError};
pub use logger::{init_logger, update_log_level};
