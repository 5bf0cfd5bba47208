//! 远程配置参数
//!
//! 从本地文档的 `nacos` 节点读取配置中心地址和数据集标识

use crate::config::document::Document;
use crate::error::RemoteError;
use crate::remote::client::{ClientConfig, ConfigParam};
use serde::Serialize;

/// 未填写 contextPath 时使用的默认值
pub const DEFAULT_CONTEXT_PATH: &str = "/nacos";

/// 配置中心服务端地址
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// 服务端IP或主机名
    pub ip_addr: String,
    /// 上下文路径
    pub context_path: String,
    /// 端口
    pub port: u16,
}

impl ServerConfig {
    /// 服务端基础URL，例如 `http://127.0.0.1:8848/nacos`
    pub fn base_url(&self) -> String {
        let context_path = self.context_path.trim().trim_end_matches('/');
        let context_path = if context_path.is_empty() {
            DEFAULT_CONTEXT_PATH.to_string()
        } else if context_path.starts_with('/') {
            context_path.to_string()
        } else {
            format!("/{context_path}")
        };

        format!("http://{}:{}{}", self.ip_addr, self.port, context_path)
    }
}

/// 本地文档中声明的远程配置参数
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSettings {
    /// 服务端列表
    pub server_configs: Vec<ServerConfig>,
    /// 数据ID
    pub data_id: String,
    /// 分组
    pub group: String,
    /// 命名空间
    pub namespace_id: String,
}

impl RemoteSettings {
    /// 从本地文档读取远程配置参数
    ///
    /// 仅当 `nacos.serverConfigs` 为非空数组且 `nacos.dataId` 存在时返回参数，
    /// 否则远程层不启用。
    ///
    /// # 返回
    /// * `Result<Option<RemoteSettings>, RemoteError>` - 参数、未声明或参数错误
    pub fn from_document(document: &Document) -> Result<Option<Self>, RemoteError> {
        let servers = document.get("nacos.serverConfigs");
        let data_id = document.get("nacos.dataId");

        if !servers.is_array() || !data_id.exists() {
            return Ok(None);
        }

        let count = document.get("nacos.serverConfigs.#").as_i64();
        if count == 0 {
            return Ok(None);
        }

        let mut server_configs = Vec::new();
        for index in 0..count {
            let prefix = format!("nacos.serverConfigs.{index}");
            let port = document.get(&format!("{prefix}.port")).as_i64();
            let port = u16::try_from(port).map_err(|_| {
                RemoteError::InvalidSettings(format!("第{}个服务端端口无效: {}", index + 1, port))
            })?;

            server_configs.push(ServerConfig {
                ip_addr: document.get(&format!("{prefix}.ipAddr")).as_string(),
                context_path: document.get(&format!("{prefix}.contextPath")).as_string(),
                port,
            });
        }

        Ok(Some(Self {
            server_configs,
            data_id: data_id.as_string(),
            group: document.get("nacos.group").as_string(),
            namespace_id: document.get("nacos.namespaceId").as_string(),
        }))
    }

    /// 配置项标识
    pub fn param(&self) -> ConfigParam {
        ConfigParam::new(self.data_id.clone(), self.group.clone())
    }

    /// 客户端连接参数
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.namespace_id.clone())
    }
}
