pub mod config;
pub mod installation;
pub mod tool;
pub mod update;

pub use config::*;
pub use installation::*;
pub use tool::*;
pub use update::*;
