//! 配置文档模块
//!
//! 不可变的JSON配置树，支持点分路径查询和基础类型转换

use crate::error::ConfigError;
use serde_json::{Map, Number, Value};
use std::borrow::Cow;
use std::path::Path;
use tracing::debug;

/// 已解析的配置文档
///
/// 文档创建后不再修改；远程配置更新时整体替换为新的文档。
#[derive(Debug, Clone)]
pub struct Document {
    /// 原始文本
    raw: String,
    /// 解析后的配置树
    root: Value,
}

impl Document {
    /// 从文本解析配置文档
    ///
    /// 空文本（或仅包含空白）视为空文档，所有查询均不命中。
    ///
    /// # 参数
    /// * `text` - JSON文本
    ///
    /// # 返回
    /// * `Result<Document, ConfigError>` - 文档或解析错误
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::empty());
        }

        let root: Value = serde_json::from_str(text)
            .map_err(|e| ConfigError::Parse(format!("JSON解析失败: {e}")))?;

        Ok(Self {
            raw: text.to_string(),
            root,
        })
    }

    /// 创建空文档
    pub fn empty() -> Self {
        Self {
            raw: String::new(),
            root: Value::Object(Map::new()),
        }
    }

    /// 从文件加载配置文档
    ///
    /// # 参数
    /// * `path` - 配置文件路径
    ///
    /// # 返回
    /// * `Result<Document, ConfigError>` - 文档或错误
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_string_lossy().to_string(),
            });
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_string_lossy().to_string(),
                source,
            })?;

        let document = Self::parse(&content)?;
        debug!("成功解析配置文件: {}", path.display());
        Ok(document)
    }

    /// 原始文本
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// 解析后的配置树
    pub fn root(&self) -> &Value {
        &self.root
    }

    /// 按路径查询
    pub fn get(&self, path: &str) -> Lookup<'_> {
        Lookup {
            value: self.resolve(path),
        }
    }

    /// 路径上的值是否为数组
    pub fn is_array(&self, path: &str) -> bool {
        self.get(path).is_array()
    }

    /// 路径上子树的JSON文本，用于结构体解码
    pub fn raw_subtree(&self, path: &str) -> Option<String> {
        self.get(path).raw()
    }

    fn resolve(&self, path: &str) -> Option<Cow<'_, Value>> {
        if path.is_empty() {
            return None;
        }

        let segments = split_path(path);
        let last = segments.len() - 1;
        let mut current = &self.root;

        for (index, segment) in segments.iter().enumerate() {
            current = match current {
                Value::Object(map) => map.get(segment.as_str())?,
                Value::Array(items) => {
                    if segment == "#" {
                        // `#` 只允许出现在路径末尾
                        return (index == last)
                            .then(|| Cow::Owned(Value::Number(Number::from(items.len()))));
                    }
                    let position: usize = segment.parse().ok()?;
                    items.get(position)?
                }
                _ => return None,
            };
        }

        Some(Cow::Borrowed(current))
    }
}

/// 拆分路径，`\.` 表示键名中的字面量点号
fn split_path(path: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            '.' => segments.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    segments.push(current);

    segments
}

/// 单次路径查询的结果
///
/// 未命中时所有转换都返回零值，调用方应先检查 [`Lookup::exists`]。
#[derive(Debug, Clone)]
pub struct Lookup<'a> {
    value: Option<Cow<'a, Value>>,
}

impl Lookup<'_> {
    /// 路径是否存在（JSON `null` 也算存在）
    pub fn exists(&self) -> bool {
        self.value.is_some()
    }

    /// 是否为数组
    pub fn is_array(&self) -> bool {
        matches!(self.value.as_deref(), Some(Value::Array(_)))
    }

    /// 命中的原始值
    pub fn value(&self) -> Option<&Value> {
        self.value.as_deref()
    }

    /// 字符串形式
    pub fn as_string(&self) -> String {
        self.value().map(coerce_string).unwrap_or_default()
    }

    /// 布尔形式
    pub fn as_bool(&self) -> bool {
        self.value().is_some_and(coerce_bool)
    }

    /// 64位整数形式，无法表示时为0
    pub fn as_i64(&self) -> i64 {
        self.value().map(coerce_i64).unwrap_or_default()
    }

    /// 字符串数组形式，非数组时为空
    pub fn as_array_string(&self) -> Vec<String> {
        match self.value() {
            Some(Value::Array(items)) => items.iter().map(coerce_string).collect(),
            _ => Vec::new(),
        }
    }

    /// 整数数组形式，非数组时为空
    pub fn as_array_i64(&self) -> Vec<i64> {
        match self.value() {
            Some(Value::Array(items)) => items.iter().map(coerce_i64).collect(),
            _ => Vec::new(),
        }
    }

    /// 子树的紧凑JSON文本
    pub fn raw(&self) -> Option<String> {
        self.value().and_then(|v| serde_json::to_string(v).ok())
    }
}

fn coerce_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn coerce_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(s.as_str(), "1" | "t" | "T" | "TRUE" | "true" | "True"),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => false,
    }
}

fn coerce_i64(value: &Value) -> i64 {
    match value {
        Value::Bool(true) => 1,
        Value::Number(n) => number_to_i64(n),
        Value::String(s) => parse_i64(s.trim()),
        _ => 0,
    }
}

fn number_to_i64(n: &Number) -> i64 {
    if let Some(i) = n.as_i64() {
        return i;
    }
    // 超出 i64 的无符号整数
    if n.as_u64().is_some() {
        return 0;
    }
    n.as_f64().map(float_to_i64).unwrap_or(0)
}

fn parse_i64(s: &str) -> i64 {
    s.parse::<i64>()
        .ok()
        .or_else(|| s.parse::<f64>().ok().map(float_to_i64))
        .unwrap_or(0)
}

fn float_to_i64(f: f64) -> i64 {
    if f.is_finite() && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        f.trunc() as i64
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"{
        "app": {"name": "ares", "port": 8080, "debug": "true", "ratio": 2.75},
        "hosts": ["a", "b", 3],
        "ids": [1, "2", 3.9, "x"],
        "dotted.key": {"inner": "escaped"},
        "nothing": null
    }"#;

    fn sample() -> Document {
        Document::parse(SAMPLE).unwrap()
    }

    #[test]
    fn test_nested_lookup() {
        let doc = sample();
        assert_eq!(doc.get("app.name").as_string(), "ares");
        assert_eq!(doc.get("app.port").as_i64(), 8080);
        assert_eq!(doc.get("app.port").as_string(), "8080");
        assert!(doc.get("app.debug").as_bool());
        assert_eq!(doc.get("app.ratio").as_i64(), 2);
    }

    #[test]
    fn test_missing_path_yields_zero_values() {
        let doc = sample();
        let lookup = doc.get("app.missing.deeper");
        assert!(!lookup.exists());
        assert_eq!(lookup.as_string(), "");
        assert!(!lookup.as_bool());
        assert_eq!(lookup.as_i64(), 0);
        assert!(lookup.as_array_string().is_empty());
        assert!(lookup.raw().is_none());
        assert!(!doc.get("").exists());
    }

    #[test]
    fn test_null_counts_as_existing() {
        let doc = sample();
        assert!(doc.get("nothing").exists());
        assert_eq!(doc.get("nothing").as_string(), "");
    }

    #[test]
    fn test_array_indexing_and_length() {
        let doc = sample();
        assert!(doc.is_array("hosts"));
        assert!(!doc.is_array("app.name"));
        assert_eq!(doc.get("hosts.1").as_string(), "b");
        assert_eq!(doc.get("hosts.#").as_i64(), 3);
        assert!(!doc.get("hosts.7").exists());
        assert!(!doc.get("hosts.#.x").exists());
        assert_eq!(doc.get("hosts").as_array_string(), vec!["a", "b", "3"]);
        assert_eq!(doc.get("ids").as_array_i64(), vec![1, 2, 3, 0]);
    }

    #[test]
    fn test_escaped_dot_in_key() {
        let doc = sample();
        assert_eq!(doc.get(r"dotted\.key.inner").as_string(), "escaped");
        assert!(!doc.get("dotted.key.inner").exists());
    }

    #[test]
    fn test_string_coercions() {
        let doc = Document::parse(
            r#"{"n": "42", "f": "7.9", "big": "9999999999", "neg": -3, "t": "T", "zero": 0, "obj": {"k": [1, 2]}}"#,
        )
        .unwrap();
        assert_eq!(doc.get("n").as_i64(), 42);
        assert_eq!(doc.get("f").as_i64(), 7);
        assert_eq!(doc.get("big").as_i64(), 9_999_999_999);
        assert_eq!(doc.get("neg").as_i64(), -3);
        assert!(doc.get("t").as_bool());
        assert!(!doc.get("zero").as_bool());
        assert_eq!(doc.get("obj").as_string(), r#"{"k":[1,2]}"#);
        assert_eq!(doc.raw_subtree("obj.k").as_deref(), Some("[1,2]"));
    }

    #[test]
    fn test_out_of_range_integer_is_zero() {
        let doc = Document::parse(r#"{"huge": 18446744073709551615, "inf": "1e400"}"#).unwrap();
        assert_eq!(doc.get("huge").as_i64(), 0);
        assert_eq!(doc.get("inf").as_i64(), 0);
    }

    #[test]
    fn test_empty_text_is_empty_document() {
        let doc = Document::parse("  \n").unwrap();
        assert!(!doc.get("a").exists());
        assert_eq!(doc.raw(), "");
    }

    #[test]
    fn test_malformed_text_is_rejected() {
        let result = Document::parse(r#"{"a": "#);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[tokio::test]
    async fn test_from_file() {
        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(temp_file.path(), r#"{"a":{"b":"1"}}"#).unwrap();

        let doc = Document::from_file(temp_file.path()).await.unwrap();
        assert_eq!(doc.get("a.b").as_string(), "1");

        let missing = Document::from_file("/nonexistent/config.json").await;
        assert!(matches!(missing, Err(ConfigError::FileNotFound { .. })));
    }

    #[tokio::test]
    async fn test_unreadable_file_reports_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Document::from_file(dir.path()).await;
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
