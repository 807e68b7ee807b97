// 首次安装：状态机、进度事件、流程编排

pub mod orchestrator;
pub mod progress;
pub mod state;

pub use orchestrator::{InstallSession, InstallationOrchestrator};
pub use progress::{ProgressBus, ProgressListener, ProgressSubscription};
pub use state::InstallationMachine;
