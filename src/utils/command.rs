use super::platform::PlatformInfo;
use std::ffi::OsStr;
use std::io;
use std::process::{Output, Stdio};
use tokio::process::Command;

/// 命令执行结果
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl CommandResult {
    pub fn from_output(output: Output) -> Self {
        CommandResult {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            exit_code: output.status.code(),
        }
    }

    pub fn from_error(error: io::Error) -> Self {
        CommandResult {
            success: false,
            stdout: String::new(),
            stderr: error.to_string(),
            exit_code: None,
        }
    }
}

/// 命令执行器
///
/// 不经过 shell 直接启动程序，并使用增强的 PATH。
/// 子进程设置了 kill_on_drop，调用方超时丢弃 future 时子进程会被终止。
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    platform: PlatformInfo,
}

impl CommandExecutor {
    pub fn new() -> Self {
        CommandExecutor {
            platform: PlatformInfo::current(),
        }
    }

    pub fn with_platform(platform: PlatformInfo) -> Self {
        CommandExecutor { platform }
    }

    pub fn platform(&self) -> &PlatformInfo {
        &self.platform
    }

    /// 执行命令（异步）
    pub async fn execute_async<P, I, S>(&self, program: P, args: I) -> CommandResult
    where
        P: AsRef<OsStr>,
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(program.as_ref());
        command
            .args(args)
            .env("PATH", self.platform.build_enhanced_path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(target_os = "windows")]
        command.creation_flags(0x08000000); // CREATE_NO_WINDOW

        tracing::trace!(program = ?program.as_ref(), "执行命令");

        match command.output().await {
            Ok(output) => CommandResult::from_output(output),
            Err(e) => CommandResult::from_error(e),
        }
    }
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}
