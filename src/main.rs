mod cli;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use cli::{Cli, Commands, ConfigCommands};
use researchdesk::commands::{self, SetupState};
use researchdesk::{init_logger, LogConfig};
use serde::Serialize;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let state = SetupState::from_env().map_err(|e| anyhow!(e))?;

    // 已安装时使用配置中的日志设置
    let log_config = commands::get_app_config(&state)
        .await
        .ok()
        .flatten()
        .map(|config| config.log_config)
        .unwrap_or_else(LogConfig::default);
    init_logger(&log_config).context("初始化日志失败")?;

    tracing::debug!(version = researchdesk::APP_VERSION, "researchdesk 启动");
    run(cli, &state).await
}

async fn run(cli: Cli, state: &SetupState) -> Result<()> {
    let json = cli.json;
    match cli.command {
        Commands::Status => {
            let status = commands::check_installation_status(state)
                .await
                .map_err(|e| anyhow!(e))?;
            print(json, &status, || {
                let mut lines = vec![
                    format!("数据目录: {}", status.app_data_path.display()),
                    format!("首次安装: {}", if status.is_first_install { "是" } else { "否" }),
                ];
                for kind in researchdesk::ToolKind::ALL {
                    let mark = if status.detected(kind) { "已安装" } else { "未安装" };
                    lines.push(format!("{}: {mark}", kind.display_name()));
                }
                lines.join("\n")
            })
        }
        Commands::Detect { refresh } => {
            if refresh {
                commands::clear_all_cli_detection_caches(state)
                    .await
                    .map_err(|e| anyhow!(e))?;
            }
            let detected = commands::detect_all_cli_tools(state)
                .await
                .map_err(|e| anyhow!(e))?;
            print(json, &detected, || {
                [&detected.claude_code, &detected.ollama, &detected.gemini]
                    .into_iter()
                    .flatten()
                    .map(describe_dependency)
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }
        Commands::Instructions { tool } => {
            let kind: researchdesk::ToolKind = tool.parse().map_err(|e: String| anyhow!(e))?;
            println!("{}", researchdesk::services::tool::install_instructions(kind));
            Ok(())
        }
        Commands::Install { dir } => {
            let result = commands::run_installation(state, dir, |event| {
                println!("[{:>3}%] {}", event.progress_percentage, event.message);
            })
            .await
            .map_err(|e| anyhow!(e))?;
            if !result.success {
                return Err(anyhow!(result
                    .error_message
                    .unwrap_or_else(|| "安装失败".to_string())));
            }
            print(json, &result, || "安装完成".to_string())
        }
        Commands::Update { structure_only } => {
            // 进度在后台任务中打印，订阅在本次命令结束时释放
            let listener = state.context.bus.subscribe_with(|event| {
                println!("[{:>3}%] {}", event.progress_percentage, event.message);
            });
            let result = if structure_only {
                commands::check_and_preserve_structure(state).await
            } else {
                commands::run_update_process(state).await
            }
            .map_err(|e| anyhow!(e))?;
            listener.finish().await;

            print(json, &result, || {
                let mut text = result.message.clone();
                if let Some(path) = &result.backup_path {
                    text.push_str(&format!("\n备份: {}", path.display()));
                }
                for path in &result.files_updated {
                    text.push_str(&format!("\n  修改: {}", path.display()));
                }
                text
            })?;
            if result.success {
                Ok(())
            } else {
                Err(anyhow!("升级失败"))
            }
        }
        Commands::Verify => {
            let structure = commands::verify_directory_structure(state)
                .await
                .map_err(|e| anyhow!(e))?;
            let integrity = commands::verify_installation_integrity(state)
                .await
                .map_err(|e| anyhow!(e))?;
            println!("目录结构: {}", if structure { "完整" } else { "不完整" });
            println!("完整性（含最新备份）: {}", if integrity { "通过" } else { "未通过" });
            if integrity {
                Ok(())
            } else {
                Err(anyhow!("完整性校验未通过"))
            }
        }
        Commands::Backup => {
            let path = commands::backup_installation(state).await.map_err(|e| anyhow!(e))?;
            println!("{}", path.display());
            Ok(())
        }
        Commands::Backups => {
            let backups = commands::list_backups(state).await.map_err(|e| anyhow!(e))?;
            print(json, &backups, || {
                backups
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }
        Commands::Prune { keep, force } => {
            let retained = commands::cleanup_old_backups(state, keep, force)
                .await
                .map_err(|e| anyhow!(e))?;
            println!("保留 {} 个备份", retained.len());
            Ok(())
        }
        Commands::Restore { archive } => {
            commands::restore_from_backup(state, archive)
                .await
                .map_err(|e| anyhow!(e))?;
            println!("恢复完成");
            Ok(())
        }
        Commands::Config { action } => match action {
            ConfigCommands::Show => {
                let config = commands::get_app_config(state).await.map_err(|e| anyhow!(e))?;
                match config {
                    Some(config) => {
                        println!("{}", serde_json::to_string_pretty(&config)?);
                        Ok(())
                    }
                    None => Err(anyhow!("尚未完成安装")),
                }
            }
            ConfigCommands::Reset => {
                commands::reset_config(state).await.map_err(|e| anyhow!(e))?;
                println!("配置已删除");
                Ok(())
            }
        },
    }
}

fn describe_dependency(info: &researchdesk::DependencyInfo) -> String {
    let name = info.kind().display_name();
    if let Some(error) = info.soft_error_message() {
        return format!("{name}: 检测失败（{error}）");
    }
    match (info.installed(), info.version(), info.path()) {
        (true, version, path) => format!(
            "{name}: {} {}",
            version.unwrap_or("未知版本"),
            path.unwrap_or_default()
        ),
        (false, _, _) => format!("{name}: 未安装"),
    }
}

fn print<T, F>(json: bool, value: &T, text: F) -> Result<()>
where
    T: Serialize,
    F: FnOnce() -> String,
{
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", text());
    }
    Ok(())
}
