//! 远程配置模块
//!
//! 提供配置中心客户端抽象、Nacos 实现以及远程层的绑定与热更新

pub mod binding;
pub mod client;
pub mod nacos;
pub mod settings;

// 重新导出主要类型
pub use binding::{RemoteBinding, RemoteUpdate};
pub use client::{ClientConfig, ConfigChange, ConfigParam, RemoteConfigClient, DEFAULT_GROUP};
pub use nacos::NacosConfigClient;
pub use settings::{RemoteSettings, ServerConfig};
