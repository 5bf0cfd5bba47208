//! 配置管理模块
//!
//! 提供配置文档解析、两层存储、优先级解析和启动流程

pub mod bootstrap;
pub mod document;
pub mod layered;
pub mod layers;
pub mod resolver;

// 重新导出主要类型
pub use bootstrap::{select_source, Bootstrap, BootstrapState, CONFIG_FILE_ENV, DEFAULT_CONFIG_FILE};
pub use document::{Document, Lookup};
pub use layered::LayeredConfig;
pub use layers::{LayerStore, Snapshot};
pub use resolver::{ConfigValue, Resolver};
