use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ResearchDesk 安装与维护工具
#[derive(Parser)]
#[command(name = "researchdesk")]
#[command(about = "ResearchDesk 数据目录的安装、升级、备份与恢复")]
#[command(version)]
pub struct Cli {
    /// 以 JSON 输出结果
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 查看安装状态
    Status,
    /// 检测可选工具
    Detect {
        /// 忽略缓存重新检测
        #[arg(long)]
        refresh: bool,
    },
    /// 查看工具安装说明
    Instructions {
        /// 工具（claude-code / ollama / gemini）
        tool: String,
    },
    /// 执行首次安装
    Install {
        /// 数据目录（默认使用推荐目录）
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
    /// 校验目录结构，必要时备份并升级
    Update {
        /// 只修复目录结构，不执行版本迁移
        #[arg(long)]
        structure_only: bool,
    },
    /// 校验目录结构与最新备份
    Verify,
    /// 立即备份数据目录
    Backup,
    /// 列出备份（从新到旧）
    Backups,
    /// 只保留最近的若干个备份
    Prune {
        /// 保留数量
        keep: usize,
        /// 允许 keep 为 0（删除全部备份）
        #[arg(long)]
        force: bool,
    },
    /// 从备份恢复数据目录
    Restore {
        /// 备份归档路径
        archive: PathBuf,
    },
    /// 安装配置
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// 显示当前配置
    Show,
    /// 删除配置（配置损坏时使用）
    Reset,
}
