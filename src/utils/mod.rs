pub mod command;
pub mod config;
pub mod file_helpers;
pub mod platform;

pub use command::*;
pub use config::*;
pub use file_helpers::*;
pub use platform::*;
