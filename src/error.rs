//! 错误处理模块
//!
//! 定义应用程序的统一错误类型

use thiserror::Error;

/// Ares Config 的主要错误类型
#[derive(Error, Debug)]
pub enum AresConfigError {
    /// 本地配置相关错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// 远程配置相关错误
    #[error("远程配置错误: {0}")]
    Remote(#[from] RemoteError),

    /// JSON序列化/反序列化错误
    #[error("JSON错误: {0}")]
    Json(#[from] serde_json::Error),

    /// 其他错误
    #[error("其他错误: {0}")]
    Other(#[from] anyhow::Error),
}

/// 配置文档错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 配置文档解析错误
    #[error("配置文档解析失败: {0}")]
    Parse(String),

    /// 配置文件不存在
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    /// 配置文件读取失败
    #[error("读取配置文件失败 {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// 远程配置错误类型
#[derive(Error, Debug)]
pub enum RemoteError {
    /// 远程参数声明不合法
    #[error("远程配置参数无效: {0}")]
    InvalidSettings(String),

    /// 客户端创建失败
    #[error("连接配置中心失败: {0}")]
    Connect(String),

    /// 拉取配置失败
    #[error("拉取配置失败 dataId={data_id}, group={group}: {reason}")]
    Fetch {
        data_id: String,
        group: String,
        reason: String,
    },

    /// 订阅配置变更失败
    #[error("订阅配置变更失败: {0}")]
    Subscribe(String),

    /// HTTP请求错误
    #[error("HTTP请求失败: {0}")]
    Http(#[from] reqwest::Error),
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, AresConfigError>;
