//! Ares Config - 分层配置与热更新
//!
//! 合并本地JSON配置文件与 Nacos 配置中心中的远程配置，支持：
//! - 远程 > 本地 > 默认值 的优先级解析
//! - 远程配置变更的无锁原子替换
//! - 类型化取值（字符串、布尔、整数、数组、结构体）
//! - 结构化日志记录

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod remote;

// 重新导出主要类型
pub use config::{Bootstrap, Document, LayerStore, LayeredConfig, Resolver};
pub use error::AresConfigError;
pub use remote::{NacosConfigClient, RemoteBinding, RemoteConfigClient};

/// 应用程序版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 应用程序名称
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// 应用程序描述
pub const APP_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
