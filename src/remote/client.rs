//! 远程配置客户端接口
//!
//! 定义配置中心客户端的抽象以及固定的连接参数

use crate::error::RemoteError;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;

/// 未指定分组时使用的分组名
pub const DEFAULT_GROUP: &str = "DEFAULT_GROUP";

/// 客户端连接参数
///
/// 除命名空间外均为固定值，不从配置文档中读取。
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// HTTP请求超时时间
    pub timeout: Duration,
    /// 长轮询监听间隔
    pub listen_interval: Duration,
    /// 心跳间隔（仅服务发现使用）
    pub beat_interval: Duration,
    /// 命名空间
    pub namespace_id: String,
    /// 并发拉取更新的工作数
    pub update_thread_num: usize,
    /// 启动时不读取缓存
    pub not_load_cache_at_start: bool,
    /// 内容为空时仍然更新缓存并通知
    pub update_cache_when_empty: bool,
}

impl ClientConfig {
    /// 以固定参数创建客户端配置
    pub fn new(namespace_id: impl Into<String>) -> Self {
        Self {
            timeout: Duration::from_secs(30),
            listen_interval: Duration::from_secs(10),
            beat_interval: Duration::from_secs(5),
            namespace_id: namespace_id.into(),
            update_thread_num: 20,
            not_load_cache_at_start: true,
            update_cache_when_empty: true,
        }
    }
}

/// 配置项标识
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigParam {
    /// 数据ID
    pub data_id: String,
    /// 分组
    pub group: String,
}

impl ConfigParam {
    /// 创建配置项标识，空分组替换为默认分组
    pub fn new(data_id: impl Into<String>, group: impl Into<String>) -> Self {
        let group = group.into();
        Self {
            data_id: data_id.into(),
            group: if group.is_empty() {
                DEFAULT_GROUP.to_string()
            } else {
                group
            },
        }
    }
}

/// 配置变更通知
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigChange {
    /// 命名空间
    pub namespace_id: String,
    /// 分组
    pub group: String,
    /// 数据ID
    pub data_id: String,
    /// 新的配置内容
    pub content: String,
}

/// 配置中心客户端
#[async_trait]
pub trait RemoteConfigClient: Send + Sync {
    /// 拉取配置内容
    ///
    /// # 参数
    /// * `param` - 配置项标识
    ///
    /// # 返回
    /// * `Result<String, RemoteError>` - 配置文本
    async fn get_config(&self, param: &ConfigParam) -> Result<String, RemoteError>;

    /// 注册配置变更监听
    ///
    /// 客户端在后台检测变更，并通过 `sender` 投递新内容。
    /// `sender` 关闭后监听自动结束。
    async fn listen_config(
        &self,
        param: ConfigParam,
        sender: mpsc::Sender<ConfigChange>,
    ) -> Result<(), RemoteError>;

    /// 停止所有监听
    fn stop_listening(&self) {}

    /// 命名空间
    fn namespace_id(&self) -> &str;
}
