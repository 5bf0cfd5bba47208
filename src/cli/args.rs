//! 命令行参数定义
//!
//! 使用clap定义应用程序的命令行接口

use crate::config::{select_source, CONFIG_FILE_ENV};
use crate::logging::LogConfig;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Ares Config - 分层配置查看工具
#[derive(Parser, Debug, Clone)]
#[command(
    name = "ares-config",
    version = crate::VERSION,
    about = crate::APP_DESCRIPTION,
    long_about = None
)]
pub struct Args {
    /// 配置文件路径
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "本地配置文件路径",
        env = CONFIG_FILE_ENV
    )]
    pub config: Option<PathBuf>,

    /// 日志级别
    #[arg(
        short,
        long,
        value_enum,
        default_value = "warn",
        help = "日志级别",
        env = "ARES_LOG_LEVEL"
    )]
    pub log_level: LogLevel,

    /// 是否以JSON格式输出日志
    #[arg(long, help = "以JSON格式输出日志")]
    pub json_logs: bool,

    /// 日志文件，指定后不再输出到控制台
    #[arg(long, value_name = "FILE", help = "日志输出文件", env = "ARES_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// 模块级别日志，例如 ares_config::remote=debug
    #[arg(
        long = "log-module",
        value_name = "MODULE=LEVEL",
        value_parser = parse_module_level,
        help = "单独设置模块日志级别，可重复"
    )]
    pub log_modules: Vec<(String, LogLevel)>,

    /// 子命令
    #[command(subcommand)]
    pub command: Commands,
}

/// 日志级别枚举
#[derive(ValueEnum, Clone, Debug, PartialEq)]
pub enum LogLevel {
    /// 调试级别
    Debug,
    /// 信息级别
    Info,
    /// 警告级别
    Warn,
    /// 错误级别
    Error,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

/// 取值类型
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum ValueKind {
    /// 字符串
    String,
    /// 布尔
    Bool,
    /// 32位整数
    Int,
    /// 64位整数
    Int64,
    /// 字符串数组
    ArrayString,
    /// 整数数组
    ArrayInt64,
    /// 数组子树原样输出
    Json,
}

/// 要查看的配置层
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum LayerSelection {
    /// 本地配置
    Local,
    /// 远程配置
    Remote,
    /// 两层都输出
    All,
}

/// 输出格式
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum OutputFormat {
    /// 纯文本
    Text,
    /// JSON
    Json,
}

/// 子命令定义
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// 按优先级读取配置项
    Get {
        /// 点分路径，例如 a.b.c
        #[arg(value_name = "PATH")]
        path: String,

        /// 取值类型
        #[arg(short, long, value_enum, default_value = "string")]
        kind: ValueKind,

        /// 未命中时使用的默认值，数组以逗号分隔
        #[arg(short, long, value_name = "VALUE")]
        default: Option<String>,

        /// 输出格式
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// 输出配置文档原文
    Show {
        /// 要查看的配置层
        #[arg(short, long, value_enum, default_value = "all")]
        layer: LayerSelection,
    },

    /// 持续输出配置项，远程配置每次变更后刷新
    Watch {
        /// 点分路径
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<String>,

        /// 取值类型
        #[arg(short, long, value_enum, default_value = "string")]
        kind: ValueKind,
    },

    /// 检查本地配置文件并报告远程配置声明
    Validate,

    /// 显示版本信息
    Version {
        /// 输出格式
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

fn parse_module_level(text: &str) -> Result<(String, LogLevel), String> {
    let (module, level) = text
        .split_once('=')
        .ok_or_else(|| format!("格式应为 MODULE=LEVEL: {text}"))?;
    if module.trim().is_empty() {
        return Err(format!("模块名为空: {text}"));
    }
    let level = LogLevel::from_str(level.trim(), true)?;
    Ok((module.trim().to_string(), level))
}

impl Args {
    /// 根据命令行参数构造日志配置
    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            level: self.log_level.clone().into(),
            file_path: self.log_file.clone(),
            console: self.log_file.is_none(),
            json_format: self.json_logs,
            module_levels: self
                .log_modules
                .iter()
                .map(|(module, level)| (module.clone(), level.clone().into()))
                .collect(),
        }
    }

    /// 获取最终使用的本地配置文件路径
    pub fn get_config_path(&self) -> PathBuf {
        select_source(self.config.clone())
    }
}
