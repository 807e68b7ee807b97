// 安装说明
//
// 每个工具一段可读的安装步骤，其中以 "$ " 开头的一行是可直接复制的快速安装命令。

use crate::models::ToolKind;

const CLAUDE_CODE: &str = "\
Claude Code 需要 Node.js 18 或更高版本。

1. 安装 Node.js：https://nodejs.org
2. 在终端中执行：
$ npm install -g @anthropic-ai/claude-code
3. 执行 `claude` 并按提示登录
4. 返回本应用，点击「重新检测」";

#[cfg(not(target_os = "windows"))]
const OLLAMA: &str = "\
Ollama 用于在本地运行开源模型。

1. 在终端中执行官方安装脚本：
$ curl -fsSL https://ollama.com/install.sh | sh
   macOS 也可以从 https://ollama.com/download 下载应用
2. 启动服务：`ollama serve`（桌面应用会自动启动）
3. 下载模型，例如 `ollama pull llama3.2`
4. 返回本应用，点击「重新检测」";

#[cfg(target_os = "windows")]
const OLLAMA: &str = "\
Ollama 用于在本地运行开源模型。

1. 在 PowerShell 中执行：
$ winget install Ollama.Ollama
   也可以从 https://ollama.com/download 下载安装程序
2. 安装完成后 Ollama 会在后台自动运行
3. 下载模型，例如 `ollama pull llama3.2`
4. 返回本应用，点击「重新检测」";

const GEMINI: &str = "\
Gemini CLI 需要 Node.js 20 或更高版本。

1. 安装 Node.js：https://nodejs.org
2. 在终端中执行：
$ npm install -g @google/gemini-cli
3. 执行 `gemini` 并使用 Google 账号登录，或设置 GEMINI_API_KEY 环境变量
4. 返回本应用，点击「重新检测」";

/// 工具的安装说明（当前平台）
pub fn install_instructions(kind: ToolKind) -> &'static str {
    match kind {
        ToolKind::ClaudeCode => CLAUDE_CODE,
        ToolKind::Ollama => OLLAMA,
        ToolKind::Gemini => GEMINI,
    }
}

/// 从安装说明中提取快速安装命令
pub fn extract_quick_command(instructions: &str) -> Option<&str> {
    instructions
        .lines()
        .find_map(|line| line.trim_start().strip_prefix("$ "))
        .map(str::trim)
        .filter(|cmd| !cmd.is_empty())
}

pub fn quick_install_command(kind: ToolKind) -> Option<&'static str> {
    extract_quick_command(install_instructions(kind))
}
