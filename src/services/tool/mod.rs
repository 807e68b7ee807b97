// 工具检测服务模块
//
// 包含检测器接口、内置检测器、检测缓存、安装说明

pub mod cache;
pub mod detector_trait;
pub mod detectors;
pub mod instructions;
pub mod probe;

pub use cache::{Clock, DetectionCache, ManualClock, SystemClock};
pub use detector_trait::{extract_version, ToolDetector};
pub use detectors::{ClaudeCodeDetector, DetectorRegistry, GeminiDetector, OllamaDetector};
pub use instructions::{install_instructions, quick_install_command};
pub use probe::DependencyProbe;
