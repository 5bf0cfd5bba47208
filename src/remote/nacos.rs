//! Nacos 配置中心客户端
//!
//! 基于 Nacos v1 Open API 实现配置拉取和长轮询监听

use crate::error::RemoteError;
use crate::remote::client::{ClientConfig, ConfigChange, ConfigParam, RemoteConfigClient};
use crate::remote::settings::ServerConfig;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

const CONFIG_PATH: &str = "/v1/cs/configs";
const LISTENER_PATH: &str = "/v1/cs/configs/listener";
const WORD_SEPARATOR: char = '\u{2}';
const LINE_SEPARATOR: char = '\u{1}';

/// 配置内容的MD5摘要
///
/// 空内容返回空串，服务端对不存在的配置同样报告空摘要。
pub fn content_md5(content: &str) -> String {
    if content.is_empty() {
        return String::new();
    }
    format!("{:x}", md5::compute(content.as_bytes()))
}

/// Nacos 配置客户端
pub struct NacosConfigClient {
    inner: Arc<ClientInner>,
    /// 监听任务
    listeners: Mutex<Vec<JoinHandle<()>>>,
}

struct ClientInner {
    /// HTTP客户端
    http: Client,
    /// 服务端列表
    servers: Vec<ServerConfig>,
    /// 当前使用的服务端下标
    current_server: AtomicUsize,
    /// 连接参数
    config: ClientConfig,
    /// 已知配置内容缓存
    cache: Mutex<HashMap<String, String>>,
    /// 限制并发拉取
    update_permits: Semaphore,
}

impl NacosConfigClient {
    /// 创建客户端
    ///
    /// # 参数
    /// * `servers` - 服务端列表
    /// * `config` - 连接参数
    ///
    /// # 返回
    /// * `Result<Self, RemoteError>` - 客户端实例
    pub fn connect(servers: Vec<ServerConfig>, config: ClientConfig) -> Result<Self, RemoteError> {
        if servers.is_empty() {
            return Err(RemoteError::Connect("未配置任何服务端地址".to_string()));
        }
        if let Some(server) = servers.iter().find(|s| s.ip_addr.trim().is_empty()) {
            return Err(RemoteError::Connect(format!(
                "服务端地址为空: {}",
                server.base_url()
            )));
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(format!("{}/{}", crate::APP_NAME, crate::VERSION))
            .build()
            .map_err(|e| RemoteError::Connect(format!("创建HTTP客户端失败: {e}")))?;

        info!(
            "创建配置中心客户端，服务端数量: {}, 命名空间: {:?}",
            servers.len(),
            config.namespace_id
        );
        debug!("客户端参数: {:?}", config);

        let update_permits = Semaphore::new(config.update_thread_num.max(1));

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                servers,
                current_server: AtomicUsize::new(0),
                config,
                cache: Mutex::new(HashMap::new()),
                update_permits,
            }),
            listeners: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl RemoteConfigClient for NacosConfigClient {
    async fn get_config(&self, param: &ConfigParam) -> Result<String, RemoteError> {
        let content = self.inner.fetch(param).await?;
        self.inner.update_cache(param, &content);
        Ok(content)
    }

    async fn listen_config(
        &self,
        param: ConfigParam,
        sender: mpsc::Sender<ConfigChange>,
    ) -> Result<(), RemoteError> {
        let initial_md5 = self
            .inner
            .cached(&param)
            .map(|content| content_md5(&content))
            .unwrap_or_default();

        info!(
            "注册配置监听: dataId={}, group={}",
            param.data_id, param.group
        );

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            inner.listen_loop(param, sender, initial_md5).await;
        });

        self.listeners
            .lock()
            .map_err(|_| RemoteError::Subscribe("监听任务列表锁已损坏".to_string()))?
            .push(handle);
        Ok(())
    }

    fn stop_listening(&self) {
        if let Ok(mut listeners) = self.listeners.lock() {
            for handle in listeners.drain(..) {
                handle.abort();
            }
            debug!("配置监听已停止");
        }
    }

    fn namespace_id(&self) -> &str {
        &self.inner.config.namespace_id
    }
}

impl Drop for NacosConfigClient {
    fn drop(&mut self) {
        self.stop_listening();
    }
}

impl ClientInner {
    fn cache_key(&self, param: &ConfigParam) -> String {
        format!(
            "{}@@{}@@{}",
            param.data_id, param.group, self.config.namespace_id
        )
    }

    fn cached(&self, param: &ConfigParam) -> Option<String> {
        let key = self.cache_key(param);
        self.cache.lock().ok()?.get(&key).cloned()
    }

    fn update_cache(&self, param: &ConfigParam, content: &str) {
        if content.is_empty() && !self.config.update_cache_when_empty {
            return;
        }
        let key = self.cache_key(param);
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, content.to_string());
        }
    }

    fn current_server(&self) -> &ServerConfig {
        let index = self.current_server.load(Ordering::Relaxed) % self.servers.len();
        &self.servers[index]
    }

    fn rotate_server(&self) {
        self.current_server.fetch_add(1, Ordering::Relaxed);
    }

    fn tenant_query<'a>(&'a self, param: &'a ConfigParam) -> Vec<(&'static str, &'a str)> {
        let mut query = vec![
            ("dataId", param.data_id.as_str()),
            ("group", param.group.as_str()),
        ];
        if !self.config.namespace_id.is_empty() {
            query.push(("tenant", self.config.namespace_id.as_str()));
        }
        query
    }

    /// 拉取配置，传输失败或服务端错误时依次尝试其他服务端
    async fn fetch(&self, param: &ConfigParam) -> Result<String, RemoteError> {
        let fetch_error = |reason: String| RemoteError::Fetch {
            data_id: param.data_id.clone(),
            group: param.group.clone(),
            reason,
        };

        let mut last_error = String::from("没有可用的服务端");
        for _ in 0..self.servers.len() {
            let url = format!("{}{}", self.current_server().base_url(), CONFIG_PATH);
            debug!("拉取配置: {}", url);

            let response = match self
                .http
                .get(&url)
                .query(&self.tenant_query(param))
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    warn!("请求配置中心失败 {}: {}", url, e);
                    last_error = e.to_string();
                    self.rotate_server();
                    continue;
                }
            };

            let status = response.status();
            if status.is_success() {
                return Ok(response.text().await?);
            }
            if status == StatusCode::NOT_FOUND {
                warn!(
                    "配置不存在: dataId={}, group={}",
                    param.data_id, param.group
                );
                return Ok(String::new());
            }

            let body = response.text().await.unwrap_or_default();
            if status.is_server_error() {
                warn!("配置中心返回错误 {}: {} - {}", url, status, body);
                last_error = format!("{status} {body}");
                self.rotate_server();
                continue;
            }
            return Err(fetch_error(format!("{status} {body}")));
        }

        Err(fetch_error(last_error))
    }

    /// 长轮询检查配置是否变更
    async fn poll_changed(&self, param: &ConfigParam, md5: &str) -> Result<bool, RemoteError> {
        let mut listening = format!(
            "{}{WORD_SEPARATOR}{}{WORD_SEPARATOR}{}",
            param.data_id, param.group, md5
        );
        if !self.config.namespace_id.is_empty() {
            listening.push(WORD_SEPARATOR);
            listening.push_str(&self.config.namespace_id);
        }
        listening.push(LINE_SEPARATOR);

        let url = format!("{}{}", self.current_server().base_url(), LISTENER_PATH);
        let response = self
            .http
            .post(&url)
            .header(
                "Long-Pulling-Timeout",
                self.config.listen_interval.as_millis().to_string(),
            )
            .timeout(self.config.listen_interval + self.config.timeout)
            .form(&[("Listening-Configs", listening)])
            .send()
            .await
            .inspect_err(|_| self.rotate_server())?;

        let status = response.status();
        if !status.is_success() {
            self.rotate_server();
            return Err(RemoteError::Subscribe(format!("监听请求失败: {status}")));
        }

        let body = response.text().await?;
        Ok(!body.trim().is_empty())
    }

    async fn listen_loop(
        &self,
        param: ConfigParam,
        sender: mpsc::Sender<ConfigChange>,
        mut md5: String,
    ) {
        loop {
            if sender.is_closed() {
                break;
            }

            let started = Instant::now();
            let changed = match self.poll_changed(&param, &md5).await {
                Ok(changed) => changed,
                Err(e) => {
                    warn!("配置监听失败，稍后重试: {}", e);
                    tokio::time::sleep(self.config.listen_interval).await;
                    continue;
                }
            };
            if !changed {
                Self::pause_until(started + self.config.listen_interval).await;
                continue;
            }

            let content = {
                let Ok(_permit) = self.update_permits.acquire().await else {
                    break;
                };
                match self.fetch(&param).await {
                    Ok(content) => content,
                    Err(e) => {
                        error!("拉取变更后的配置失败: {}", e);
                        tokio::time::sleep(self.config.listen_interval).await;
                        continue;
                    }
                }
            };

            let new_md5 = content_md5(&content);
            if new_md5 == md5 {
                debug!("配置内容未变化: dataId={}", param.data_id);
                Self::pause_until(started + self.config.listen_interval).await;
                continue;
            }
            md5 = new_md5;

            if content.is_empty() && !self.config.update_cache_when_empty {
                debug!("配置内容为空，跳过更新");
                continue;
            }
            self.update_cache(&param, &content);

            info!(
                "检测到配置变更: dataId={}, group={}",
                param.data_id, param.group
            );
            let change = ConfigChange {
                namespace_id: self.config.namespace_id.clone(),
                group: param.group.clone(),
                data_id: param.data_id.clone(),
                content,
            };
            if sender.send(change).await.is_err() {
                break;
            }
        }
        debug!("配置监听结束: dataId={}", param.data_id);
    }

    /// 服务端提前返回时补足一个监听周期
    async fn pause_until(deadline: Instant) {
        if deadline > Instant::now() {
            tokio::time::sleep_until(deadline).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use std::time::Duration;
    use tokio::time::timeout;

    fn client_with(server: &mockito::Server, config: ClientConfig) -> NacosConfigClient {
        let (host, port) = server.host_with_port().split_once(':').map(|(h, p)| {
            (h.to_string(), p.parse::<u16>().unwrap())
        }).unwrap();

        NacosConfigClient::connect(
            vec![ServerConfig {
                ip_addr: host,
                context_path: "/nacos".to_string(),
                port,
            }],
            config,
        )
        .unwrap()
    }

    fn client_for(server: &mockito::Server, namespace_id: &str) -> NacosConfigClient {
        client_with(server, ClientConfig::new(namespace_id))
    }

    /// 缩短监听周期，便于在测试中观察多轮轮询
    fn fast_listening_client(server: &mockito::Server) -> NacosConfigClient {
        let mut config = ClientConfig::new("");
        config.listen_interval = Duration::from_millis(50);
        client_with(server, config)
    }

    #[test]
    fn test_connect_requires_servers() {
        let result = NacosConfigClient::connect(Vec::new(), ClientConfig::new(""));
        assert!(matches!(result, Err(RemoteError::Connect(_))));

        let blank = ServerConfig {
            ip_addr: " ".to_string(),
            context_path: String::new(),
            port: 8848,
        };
        let result = NacosConfigClient::connect(vec![blank], ClientConfig::new(""));
        assert!(matches!(result, Err(RemoteError::Connect(_))));
    }

    #[test]
    fn test_content_md5() {
        assert_eq!(content_md5("a"), "0cc175b9c0f1b6a831c399e269772661");
        assert_eq!(content_md5(""), "");
    }

    #[tokio::test]
    async fn test_get_config_sends_identifiers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/nacos/v1/cs/configs")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("dataId".into(), "app.json".into()),
                Matcher::UrlEncoded("group".into(), "PROD".into()),
                Matcher::UrlEncoded("tenant".into(), "ns-1".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"a":{"b":"2"}}"#)
            .create_async()
            .await;

        let client = client_for(&server, "ns-1");
        let content = client
            .get_config(&ConfigParam::new("app.json", "PROD"))
            .await
            .unwrap();

        assert_eq!(content, r#"{"a":{"b":"2"}}"#);
        mock.assert_async().await;
        assert_eq!(
            client.inner.cached(&ConfigParam::new("app.json", "PROD")).as_deref(),
            Some(r#"{"a":{"b":"2"}}"#)
        );
    }

    #[tokio::test]
    async fn test_get_config_not_found_is_empty() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/nacos/v1/cs/configs")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let client = client_for(&server, "");
        let content = client.get_config(&ConfigParam::new("x", "")).await.unwrap();
        assert!(content.is_empty());
    }

    #[tokio::test]
    async fn test_get_config_client_error_is_fatal() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/nacos/v1/cs/configs")
            .match_query(Matcher::Any)
            .with_status(403)
            .with_body("forbidden")
            .create_async()
            .await;

        let client = client_for(&server, "");
        let result = client.get_config(&ConfigParam::new("x", "")).await;
        assert!(matches!(result, Err(RemoteError::Fetch { .. })));
    }

    #[tokio::test]
    async fn test_poll_reports_change() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/nacos/v1/cs/configs/listener")
            .match_header("Long-Pulling-Timeout", "10000")
            .match_body(Matcher::UrlEncoded(
                "Listening-Configs".into(),
                "x\u{2}DEFAULT_GROUP\u{2}abc\u{1}".into(),
            ))
            .with_status(200)
            .with_body("x%02DEFAULT_GROUP%01\n")
            .create_async()
            .await;

        let client = client_for(&server, "");
        let changed = client
            .inner
            .poll_changed(&ConfigParam::new("x", ""), "abc")
            .await
            .unwrap();

        assert!(changed);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_poll_without_change() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/nacos/v1/cs/configs/listener")
            .with_status(200)
            .with_body("")
            .create_async()
            .await;

        let client = client_for(&server, "");
        let changed = client
            .inner
            .poll_changed(&ConfigParam::new("x", ""), "abc")
            .await
            .unwrap();
        assert!(!changed);
    }

    #[tokio::test]
    async fn test_listener_delivers_change_once() {
        let mut server = mockito::Server::new_async().await;
        let listener = server
            .mock("POST", "/nacos/v1/cs/configs/listener")
            .with_status(200)
            .with_body("x%02DEFAULT_GROUP%01\n")
            .expect_at_least(2)
            .expect_at_most(20)
            .create_async()
            .await;
        server
            .mock("GET", "/nacos/v1/cs/configs")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"v":2}"#)
            .create_async()
            .await;

        let client = fast_listening_client(&server);
        let (sender, mut receiver) = mpsc::channel(8);
        client
            .listen_config(ConfigParam::new("x", ""), sender)
            .await
            .unwrap();

        let change = timeout(Duration::from_secs(5), receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(change.content, r#"{"v":2}"#);
        assert_eq!(change.data_id, "x");
        assert_eq!(change.group, "DEFAULT_GROUP");

        // 服务端持续报告变更，但内容相同，不会再次通知
        assert!(timeout(Duration::from_millis(300), receiver.recv())
            .await
            .is_err());
        assert_eq!(
            client.inner.cached(&ConfigParam::new("x", "")).as_deref(),
            Some(r#"{"v":2}"#)
        );

        client.stop_listening();
        listener.assert_async().await;
    }

    #[tokio::test]
    async fn test_listener_waits_when_config_is_missing() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/nacos/v1/cs/configs")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;
        let listener = server
            .mock("POST", "/nacos/v1/cs/configs/listener")
            .match_body(Matcher::UrlEncoded(
                "Listening-Configs".into(),
                "x\u{2}DEFAULT_GROUP\u{2}\u{1}".into(),
            ))
            .with_status(200)
            .with_body("x%02DEFAULT_GROUP%01\n")
            .expect_at_least(1)
            .expect_at_most(20)
            .create_async()
            .await;

        let client = fast_listening_client(&server);
        let param = ConfigParam::new("x", "");
        assert!(client.get_config(&param).await.unwrap().is_empty());

        let (sender, mut receiver) = mpsc::channel(8);
        client.listen_config(param, sender).await.unwrap();

        assert!(timeout(Duration::from_millis(500), receiver.recv())
            .await
            .is_err());

        client.stop_listening();
        listener.assert_async().await;
    }

    #[tokio::test]
    async fn test_stop_listening_ends_listener_task() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/nacos/v1/cs/configs/listener")
            .with_status(200)
            .with_body("")
            .create_async()
            .await;

        let client = fast_listening_client(&server);
        let (sender, mut receiver) = mpsc::channel(8);
        client
            .listen_config(ConfigParam::new("x", ""), sender)
            .await
            .unwrap();
        assert_eq!(client.listeners.lock().unwrap().len(), 1);

        client.stop_listening();

        // 任务结束后发送端被释放，通道关闭
        let closed = timeout(Duration::from_secs(1), receiver.recv()).await.unwrap();
        assert!(closed.is_none());
        assert!(client.listeners.lock().unwrap().is_empty());
    }
}
