//! 配置解析模块
//!
//! 按 远程 > 本地 > 调用方默认值 > 零值 的优先级解析配置项

use crate::config::document::Lookup;
use crate::config::layers::LayerStore;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::warn;

/// 可从查询结果中取出的配置值类型
pub trait ConfigValue: Sized {
    /// 是否要求命中的值为数组，标量视为不存在
    const REQUIRES_ARRAY: bool = false;

    /// 从已命中的查询结果转换
    fn from_lookup(lookup: &Lookup<'_>) -> Self;
}

impl ConfigValue for String {
    fn from_lookup(lookup: &Lookup<'_>) -> Self {
        lookup.as_string()
    }
}

impl ConfigValue for bool {
    fn from_lookup(lookup: &Lookup<'_>) -> Self {
        lookup.as_bool()
    }
}

impl ConfigValue for i64 {
    fn from_lookup(lookup: &Lookup<'_>) -> Self {
        lookup.as_i64()
    }
}

/// 超出 i32 范围时返回 0，不截断也不回绕
impl ConfigValue for i32 {
    fn from_lookup(lookup: &Lookup<'_>) -> Self {
        i32::try_from(lookup.as_i64()).unwrap_or(0)
    }
}

impl ConfigValue for Vec<String> {
    const REQUIRES_ARRAY: bool = true;

    fn from_lookup(lookup: &Lookup<'_>) -> Self {
        lookup.as_array_string()
    }
}

impl ConfigValue for Vec<i64> {
    const REQUIRES_ARRAY: bool = true;

    fn from_lookup(lookup: &Lookup<'_>) -> Self {
        lookup.as_array_i64()
    }
}

/// 配置解析器
///
/// 克隆成本很低，可在任意线程中使用。每次调用只读取一次两层快照，
/// 因此一次解析要么看到旧的远程文档，要么看到新的，不会混合。
/// 查询从不返回错误：未命中时返回默认值或零值，
/// 需要区分"显式配置为零"和"未配置"时请使用 [`Resolver::lookup`]。
#[derive(Debug, Clone)]
pub struct Resolver {
    store: Arc<LayerStore>,
}

impl Resolver {
    /// 创建解析器
    pub fn new(store: Arc<LayerStore>) -> Self {
        Self { store }
    }

    /// 底层存储
    pub fn store(&self) -> &Arc<LayerStore> {
        &self.store
    }

    /// 按优先级查找，未命中返回 `None`
    pub fn lookup<T: ConfigValue>(&self, path: &str) -> Option<T> {
        let snapshot = self.store.snapshot();
        for document in snapshot.layers() {
            let lookup = document.get(path);
            if lookup.exists() && (!T::REQUIRES_ARRAY || lookup.is_array()) {
                return Some(T::from_lookup(&lookup));
            }
        }
        None
    }

    /// 未命中时返回零值
    pub fn get<T: ConfigValue + Default>(&self, path: &str) -> T {
        self.lookup(path).unwrap_or_default()
    }

    /// 未命中时返回给定默认值
    pub fn get_or<T: ConfigValue>(&self, path: &str, default: T) -> T {
        self.lookup(path).unwrap_or(default)
    }

    pub fn get_string(&self, path: &str) -> String {
        self.get(path)
    }

    pub fn get_string_or(&self, path: &str, default: &str) -> String {
        self.lookup(path).unwrap_or_else(|| default.to_string())
    }

    pub fn get_bool(&self, path: &str) -> bool {
        self.get(path)
    }

    pub fn get_bool_or(&self, path: &str, default: bool) -> bool {
        self.get_or(path, default)
    }

    pub fn get_int64(&self, path: &str) -> i64 {
        self.get(path)
    }

    pub fn get_int64_or(&self, path: &str, default: i64) -> i64 {
        self.get_or(path, default)
    }

    /// 32位整数，超出范围返回 0
    pub fn get_int(&self, path: &str) -> i32 {
        self.get(path)
    }

    pub fn get_int_or(&self, path: &str, default: i32) -> i32 {
        self.get_or(path, default)
    }

    pub fn get_array_string(&self, path: &str) -> Vec<String> {
        self.get(path)
    }

    pub fn get_array_string_or(&self, path: &str, default: Vec<String>) -> Vec<String> {
        self.get_or(path, default)
    }

    pub fn get_array_int64(&self, path: &str) -> Vec<i64> {
        self.get(path)
    }

    pub fn get_array_int64_or(&self, path: &str, default: Vec<i64>) -> Vec<i64> {
        self.get_or(path, default)
    }

    /// 将数组子树解码为调用方定义的类型
    ///
    /// 某一层解码失败时记录警告并继续查找下一层。
    pub fn get_struct<T: DeserializeOwned>(&self, path: &str) -> Option<T> {
        let snapshot = self.store.snapshot();
        for document in snapshot.layers() {
            let lookup = document.get(path);
            let Some(value) = lookup.value().filter(|_| lookup.is_array()) else {
                continue;
            };
            match T::deserialize(value) {
                Ok(decoded) => return Some(decoded),
                Err(e) => warn!("配置项 {} 解码失败: {}", path, e),
            }
        }
        None
    }
}
