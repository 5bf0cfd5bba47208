//! 分层配置门面
//!
//! 组合层存储、解析器和可选的远程绑定，是应用持有的唯一配置实例

use crate::config::document::Document;
use crate::config::layers::LayerStore;
use crate::config::resolver::Resolver;
use crate::remote::{RemoteBinding, RemoteConfigClient, RemoteUpdate};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;

/// 分层配置
///
/// 由 [`crate::config::Bootstrap`] 在进程启动时创建，并以引用或 `Arc`
/// 的方式传递给需要配置的组件。通过 `Deref` 可直接调用 [`Resolver`] 的取值方法。
pub struct LayeredConfig {
    /// 解析器
    resolver: Resolver,
    /// 远程绑定
    binding: Option<RemoteBinding>,
    /// 本地配置文件路径
    source: PathBuf,
}

impl LayeredConfig {
    /// 创建分层配置
    pub fn new(resolver: Resolver, binding: Option<RemoteBinding>, source: PathBuf) -> Self {
        Self {
            resolver,
            binding,
            source,
        }
    }

    /// 仅包含本地层的配置
    pub fn local_only(document: Document, source: PathBuf) -> Self {
        let store = Arc::new(LayerStore::new(document));
        Self::new(Resolver::new(store), None, source)
    }

    /// 解析器的克隆，可移动到其他任务中
    pub fn resolver(&self) -> Resolver {
        self.resolver.clone()
    }

    /// 本地文档
    pub fn local_document(&self) -> Arc<Document> {
        self.resolver.store().current_local()
    }

    /// 当前远程文档
    pub fn remote_document(&self) -> Option<Arc<Document>> {
        self.resolver.store().current_remote()
    }

    /// 配置中心客户端
    pub fn remote_client(&self) -> Option<Arc<dyn RemoteConfigClient>> {
        self.binding.as_ref().map(RemoteBinding::client)
    }

    /// 订阅远程配置更新
    pub fn remote_updates(&self) -> Option<broadcast::Receiver<RemoteUpdate>> {
        self.binding.as_ref().map(RemoteBinding::updates)
    }

    /// 是否启用了远程层
    pub fn has_remote(&self) -> bool {
        self.binding.is_some()
    }

    /// 本地配置文件路径
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// 停止远程监听，已加载的配置仍然可读
    pub fn shutdown(&mut self) {
        if let Some(binding) = self.binding.as_mut() {
            binding.shutdown();
        }
    }
}

impl Deref for LayeredConfig {
    type Target = Resolver;

    fn deref(&self) -> &Self::Target {
        &self.resolver
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_only_config() {
        let document = Document::parse(r#"{"a":{"b":"1"}}"#).unwrap();
        let config = LayeredConfig::local_only(document, PathBuf::from("config.json"));

        assert!(!config.has_remote());
        assert!(config.remote_document().is_none());
        assert!(config.remote_client().is_none());
        assert!(config.remote_updates().is_none());
        assert_eq!(config.get_string("a.b"), "1");
        assert_eq!(config.local_document().get("a.b").as_string(), "1");
        assert_eq!(config.source(), Path::new("config.json"));
    }
}
