//! 远程配置绑定
//!
//! 负责首次拉取远程配置、注册变更监听，并由单个更新任务将新文档发布到层存储

use crate::config::bootstrap::BootstrapState;
use crate::config::document::Document;
use crate::config::layers::LayerStore;
use crate::error::RemoteError;
use crate::remote::client::{ConfigChange, ConfigParam, RemoteConfigClient};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// 变更队列容量
const UPDATE_QUEUE_CAPACITY: usize = 32;

/// 远程配置更新通知
#[derive(Debug, Clone)]
pub struct RemoteUpdate {
    /// 新的远程版本号
    pub revision: u64,
    /// 数据ID
    pub data_id: String,
    /// 分组
    pub group: String,
    /// 生效时间
    pub timestamp: DateTime<Utc>,
}

/// 远程配置绑定
///
/// 进程内只需要一个实例；调用 [`RemoteBinding::shutdown`] 或丢弃时停止监听。
pub struct RemoteBinding {
    /// 配置中心客户端
    client: Arc<dyn RemoteConfigClient>,
    /// 配置项标识
    param: ConfigParam,
    /// 更新通知发送器
    update_sender: broadcast::Sender<RemoteUpdate>,
    /// 更新任务
    applier: Option<JoinHandle<()>>,
}

impl RemoteBinding {
    /// 创建绑定，此时尚未拉取或监听
    pub fn new(client: Arc<dyn RemoteConfigClient>, param: ConfigParam) -> Self {
        let (update_sender, _) = broadcast::channel(UPDATE_QUEUE_CAPACITY);
        Self {
            client,
            param,
            update_sender,
            applier: None,
        }
    }

    /// 拉取初始配置、安装到层存储并开始监听
    ///
    /// # 参数
    /// * `client` - 配置中心客户端
    /// * `param` - 配置项标识
    /// * `store` - 层存储
    ///
    /// # 返回
    /// * `Result<Self, RemoteError>` - 已生效的绑定
    pub async fn establish(
        client: Arc<dyn RemoteConfigClient>,
        param: ConfigParam,
        store: Arc<LayerStore>,
    ) -> Result<Self, RemoteError> {
        let mut binding = Self::new(client, param);

        BootstrapState::FetchInitial.enter();
        let document = binding.fetch_initial().await?;
        let revision = store.swap_remote(document);
        info!("远程配置已加载，版本: {}", revision);

        BootstrapState::Subscribe.enter();
        binding.subscribe(store).await?;
        Ok(binding)
    }

    /// 拉取并解析初始远程配置
    pub async fn fetch_initial(&self) -> Result<Document, RemoteError> {
        let content = self.client.get_config(&self.param).await?;
        debug!("远程配置内容: {}", content);

        Document::parse(&content).map_err(|e| RemoteError::Fetch {
            data_id: self.param.data_id.clone(),
            group: self.param.group.clone(),
            reason: e.to_string(),
        })
    }

    /// 注册监听并启动更新任务
    pub async fn subscribe(&mut self, store: Arc<LayerStore>) -> Result<(), RemoteError> {
        let (sender, receiver) = mpsc::channel(UPDATE_QUEUE_CAPACITY);

        self.client.listen_config(self.param.clone(), sender).await?;

        let update_sender = self.update_sender.clone();
        self.applier = Some(tokio::spawn(async move {
            Self::run_applier(receiver, store, update_sender).await;
        }));

        info!("远程配置监听已注册");
        Ok(())
    }

    async fn run_applier(
        mut receiver: mpsc::Receiver<ConfigChange>,
        store: Arc<LayerStore>,
        update_sender: broadcast::Sender<RemoteUpdate>,
    ) {
        while let Some(change) = receiver.recv().await {
            Self::apply_change(&store, &update_sender, change);
        }
        debug!("远程配置更新任务结束");
    }

    /// 解析变更内容并发布
    ///
    /// 内容无法解析时保留当前远程文档。
    ///
    /// # 返回
    /// * `Option<u64>` - 发布后的版本号，未发布时为 `None`
    pub fn apply_change(
        store: &LayerStore,
        update_sender: &broadcast::Sender<RemoteUpdate>,
        change: ConfigChange,
    ) -> Option<u64> {
        let document = match Document::parse(&change.content) {
            Ok(document) => document,
            Err(e) => {
                warn!(
                    "远程配置变更无法解析，保留当前配置 dataId={}: {}",
                    change.data_id, e
                );
                return None;
            }
        };

        let revision = store.swap_remote(document);
        info!(
            "远程配置已更新 dataId={}, group={}, 版本: {}",
            change.data_id, change.group, revision
        );

        // 没有订阅者时发送失败是正常情况
        let _ = update_sender.send(RemoteUpdate {
            revision,
            data_id: change.data_id,
            group: change.group,
            timestamp: Utc::now(),
        });

        Some(revision)
    }

    /// 订阅更新通知
    pub fn updates(&self) -> broadcast::Receiver<RemoteUpdate> {
        self.update_sender.subscribe()
    }

    /// 配置中心客户端
    pub fn client(&self) -> Arc<dyn RemoteConfigClient> {
        Arc::clone(&self.client)
    }

    /// 配置项标识
    pub fn param(&self) -> &ConfigParam {
        &self.param
    }

    /// 是否仍在监听
    pub fn is_active(&self) -> bool {
        self.applier
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// 停止监听和更新任务
    pub fn shutdown(&mut self) {
        if let Some(applier) = self.applier.take() {
            self.client.stop_listening();
            applier.abort();
            info!("远程配置监听已停止");
        }
    }
}

impl Drop for RemoteBinding {
    fn drop(&mut self) {
        self.shutdown();
    }
}
