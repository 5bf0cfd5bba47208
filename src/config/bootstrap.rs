//! 启动流程
//!
//! 确定本地配置文件、加载本地文档，并在声明了远程参数时建立远程绑定

use crate::config::document::Document;
use crate::config::layered::LayeredConfig;
use crate::config::layers::LayerStore;
use crate::config::resolver::Resolver;
use crate::error::{RemoteError, Result};
use crate::remote::{NacosConfigClient, RemoteBinding, RemoteConfigClient, RemoteSettings};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// 指定本地配置文件的环境变量
pub const CONFIG_FILE_ENV: &str = "ARES_CONFIG_FILE";

/// 默认本地配置文件名
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// 启动阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapState {
    /// 确定本地配置来源
    SelectSource,
    /// 加载本地文档
    LoadLocal,
    /// 连接配置中心
    ConnectRemote,
    /// 拉取初始远程配置
    FetchInitial,
    /// 注册变更监听
    Subscribe,
    /// 就绪
    Ready,
}

impl fmt::Display for BootstrapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BootstrapState::SelectSource => "SELECT_SOURCE",
            BootstrapState::LoadLocal => "LOAD_LOCAL",
            BootstrapState::ConnectRemote => "CONNECT_REMOTE",
            BootstrapState::FetchInitial => "FETCH_INITIAL",
            BootstrapState::Subscribe => "SUBSCRIBE",
            BootstrapState::Ready => "READY",
        };
        write!(f, "{name}")
    }
}

impl BootstrapState {
    /// 记录进入该阶段
    pub(crate) fn enter(self) {
        debug!("启动阶段: {}", self);
    }
}

/// 确定本地配置文件路径
///
/// 优先级：显式指定 > 环境变量 `ARES_CONFIG_FILE` > `config.json`
pub fn select_source(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .filter(|path| !path.as_os_str().is_empty())
        .or_else(|| {
            std::env::var(CONFIG_FILE_ENV)
                .ok()
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
        })
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// 启动流程
#[derive(Debug, Clone, Default)]
pub struct Bootstrap {
    /// 显式指定的配置文件路径
    explicit_path: Option<PathBuf>,
}

impl Bootstrap {
    /// 创建启动流程
    ///
    /// # 参数
    /// * `explicit_path` - 显式指定的配置文件路径（通常来自命令行）
    pub fn new(explicit_path: Option<PathBuf>) -> Self {
        Self { explicit_path }
    }

    /// 使用 Nacos 客户端执行启动流程
    pub async fn run(self) -> Result<LayeredConfig> {
        self.run_with_connector(|settings| {
            let client = NacosConfigClient::connect(
                settings.server_configs.clone(),
                settings.client_config(),
            )?;
            Ok(Arc::new(client) as Arc<dyn RemoteConfigClient>)
        })
        .await
    }

    /// 使用自定义客户端执行启动流程
    ///
    /// 任何阶段失败都会返回错误，调用方应当终止进程。
    ///
    /// # 参数
    /// * `connect` - 根据远程参数创建客户端
    ///
    /// # 返回
    /// * `Result<LayeredConfig>` - 就绪的分层配置
    pub async fn run_with_connector<F>(self, connect: F) -> Result<LayeredConfig>
    where
        F: FnOnce(&RemoteSettings) -> std::result::Result<Arc<dyn RemoteConfigClient>, RemoteError>,
    {
        BootstrapState::SelectSource.enter();
        let source = select_source(self.explicit_path);
        info!("{}: {}", CONFIG_FILE_ENV, source.display());

        BootstrapState::LoadLocal.enter();
        let local = Document::from_file(&source).await?;
        info!("本地配置加载成功: {}", source.display());
        debug!("本地配置内容: {}", local.raw());

        let settings = RemoteSettings::from_document(&local)?;
        let store = Arc::new(LayerStore::new(local));

        let binding = match settings {
            Some(settings) => Some(Self::bind_remote(&settings, connect, Arc::clone(&store)).await?),
            None => {
                debug!("未声明远程配置，仅使用本地配置");
                None
            }
        };

        BootstrapState::Ready.enter();
        info!("配置已就绪");
        Ok(LayeredConfig::new(Resolver::new(store), binding, source))
    }

    async fn bind_remote<F>(
        settings: &RemoteSettings,
        connect: F,
        store: Arc<LayerStore>,
    ) -> Result<RemoteBinding>
    where
        F: FnOnce(&RemoteSettings) -> std::result::Result<Arc<dyn RemoteConfigClient>, RemoteError>,
    {
        BootstrapState::ConnectRemote.enter();
        info!(
            "加载远程配置 dataId={}, group={}, 服务端数量: {}",
            settings.data_id,
            settings.group,
            settings.server_configs.len()
        );
        let client = connect(settings)?;

        let binding = RemoteBinding::establish(client, settings.param(), store).await?;
        Ok(binding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_select_source_precedence() {
        std::env::set_var(CONFIG_FILE_ENV, "from-env.json");
        assert_eq!(
            select_source(Some(PathBuf::from("explicit.json"))),
            PathBuf::from("explicit.json")
        );
        assert_eq!(select_source(None), PathBuf::from("from-env.json"));
        assert_eq!(
            select_source(Some(PathBuf::new())),
            PathBuf::from("from-env.json")
        );

        std::env::set_var(CONFIG_FILE_ENV, "");
        assert_eq!(select_source(None), PathBuf::from(DEFAULT_CONFIG_FILE));

        std::env::remove_var(CONFIG_FILE_ENV);
        assert_eq!(select_source(None), PathBuf::from(DEFAULT_CONFIG_FILE));
    }

    #[test]
    fn test_state_names() {
        assert_eq!(BootstrapState::SelectSource.to_string(), "SELECT_SOURCE");
        assert_eq!(BootstrapState::Ready.to_string(), "READY");
    }
}
