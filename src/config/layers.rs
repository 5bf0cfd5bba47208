//! 配置层存储模块
//!
//! 持有本地文档与可替换的远程文档，远程文档以原子方式整体替换

use crate::config::document::Document;
use arc_swap::ArcSwapOption;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// 两层配置的存储
///
/// 本地文档在构造时确定且不可更换；远程文档在首次拉取成功前为空，
/// 之后每次变更都整体替换。读取从不阻塞写入，写入也从不阻塞读取。
#[derive(Debug)]
pub struct LayerStore {
    /// 本地文档
    local: Arc<Document>,
    /// 远程文档
    remote: ArcSwapOption<Document>,
    /// 远程文档版本号，0 表示尚未安装
    remote_revision: AtomicU64,
}

/// 某一时刻两层文档的一致视图
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// 本地文档
    pub local: Arc<Document>,
    /// 远程文档
    pub remote: Option<Arc<Document>>,
}

impl Snapshot {
    /// 按优先级排列的文档：远程在前，本地在后
    pub fn layers(&self) -> impl Iterator<Item = &Document> {
        self.remote
            .as_deref()
            .into_iter()
            .chain(std::iter::once(self.local.as_ref()))
    }
}

impl LayerStore {
    /// 以本地文档创建存储
    pub fn new(local: Document) -> Self {
        Self {
            local: Arc::new(local),
            remote: ArcSwapOption::empty(),
            remote_revision: AtomicU64::new(0),
        }
    }

    /// 原子替换远程文档
    ///
    /// # 返回
    /// * `u64` - 新的远程版本号
    pub fn swap_remote(&self, document: Document) -> u64 {
        self.remote.store(Some(Arc::new(document)));
        let revision = self.remote_revision.fetch_add(1, Ordering::AcqRel) + 1;
        debug!("远程配置已替换，版本: {}", revision);
        revision
    }

    /// 当前远程文档
    pub fn current_remote(&self) -> Option<Arc<Document>> {
        self.remote.load_full()
    }

    /// 本地文档
    pub fn current_local(&self) -> Arc<Document> {
        Arc::clone(&self.local)
    }

    /// 获取两层文档的快照
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            local: self.current_local(),
            remote: self.current_remote(),
        }
    }

    /// 当前远程版本号
    pub fn remote_revision(&self) -> u64 {
        self.remote_revision.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> Document {
        Document::parse(text).unwrap()
    }

    #[test]
    fn test_store_starts_without_remote() {
        let store = LayerStore::new(doc(r#"{"a":1}"#));
        assert!(store.current_remote().is_none());
        assert_eq!(store.remote_revision(), 0);
        assert_eq!(store.current_local().get("a").as_i64(), 1);
        assert_eq!(store.snapshot().layers().count(), 1);
    }

    #[test]
    fn test_swap_remote_replaces_whole_document() {
        let store = LayerStore::new(doc("{}"));

        assert_eq!(store.swap_remote(doc(r#"{"a":1,"b":2}"#)), 1);
        assert_eq!(store.swap_remote(doc(r#"{"a":3}"#)), 2);

        let remote = store.current_remote().unwrap();
        assert_eq!(remote.get("a").as_i64(), 3);
        assert!(!remote.get("b").exists());
        assert_eq!(store.remote_revision(), 2);
    }

    #[test]
    fn test_snapshot_survives_later_swap() {
        let store = LayerStore::new(doc("{}"));
        store.swap_remote(doc(r#"{"v":"old"}"#));

        let snapshot = store.snapshot();
        store.swap_remote(doc(r#"{"v":"new"}"#));

        let layers: Vec<_> = snapshot.layers().collect();
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0].get("v").as_string(), "old");
        assert_eq!(
            store.current_remote().unwrap().get("v").as_string(),
            "new"
        );
    }
}
