//! Ares Config 主程序入口
//!
//! 分层配置查看与监视工具

use anyhow::{Context, Result};
use ares_config::cli::args::{Args, Commands};
use ares_config::cli::commands::{
    Command, GetCommand, ShowCommand, ValidateCommand, VersionCommand, WatchCommand,
};
use ares_config::logging::LoggingSystem;
use clap::Parser;
use tracing::{debug, error};

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let args = Args::parse();

    // 初始化日志系统
    let _logging_system =
        LoggingSystem::setup_logging(args.log_config()).context("初始化日志系统失败")?;

    debug!("{} v{} 启动", ares_config::APP_NAME, ares_config::VERSION);

    // 启动失败属于致命错误，直接退出
    if let Err(e) = execute_command(&args).await {
        error!("命令执行失败: {}", e);
        eprintln!("错误: {e:#}");
        std::process::exit(1);
    }

    Ok(())
}

/// 执行CLI命令
async fn execute_command(args: &Args) -> Result<()> {
    let command: Box<dyn Command> = match &args.command {
        Commands::Get { .. } => Box::new(GetCommand),
        Commands::Show { .. } => Box::new(ShowCommand),
        Commands::Watch { .. } => Box::new(WatchCommand),
        Commands::Validate => Box::new(ValidateCommand),
        Commands::Version { .. } => Box::new(VersionCommand),
    };

    command
        .execute(args)
        .await
        .with_context(|| format!("配置文件: {}", args.get_config_path().display()))
}
