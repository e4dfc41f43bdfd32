//! # jointcast CLI
//!
//! 关节状态桥接器的命令行入口。
//!
//! ```bash
//! # 校验配置并探测设备
//! jointcast-cli check --config apps/cli/config/bridge.toml
//!
//! # 运行 5 秒，以 JSON 行输出
//! jointcast-cli run --config apps/cli/config/bridge.toml --duration 5 --json
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{CheckCommand, RunCommand};

/// jointcast CLI - 关节状态桥接器
#[derive(Parser, Debug)]
#[command(name = "jointcast-cli")]
#[command(about = "Republish motion-control joint state on a telemetry topic", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 运行桥接器并打印发布的消息
    Run {
        #[command(flatten)]
        args: RunCommand,
    },

    /// 校验配置文件
    Check {
        #[command(flatten)]
        args: CheckCommand,
    },
}

fn main() -> Result<()> {
    jointcast::init_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { args } => args.execute(),
        Commands::Check { args } => args.execute(),
    }
}
