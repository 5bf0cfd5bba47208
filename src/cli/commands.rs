//! 命令处理逻辑
//!
//! 实现各种CLI命令的处理逻辑

use crate::cli::args::{Args, Commands, LayerSelection, OutputFormat, ValueKind};
use crate::config::{Bootstrap, Document, Resolver};
use crate::error::Result;
use crate::logging::LoggingSystem;
use crate::remote::RemoteSettings;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

/// 命令处理器trait
#[async_trait]
pub trait Command: Send + Sync {
    /// 执行命令
    async fn execute(&self, args: &Args) -> Result<()>;
}

/// 按指定类型解析配置项
///
/// # 参数
/// * `resolver` - 配置解析器
/// * `path` - 点分路径
/// * `kind` - 取值类型
/// * `default` - 默认值文本，数组以逗号分隔
///
/// # 返回
/// * `Result<Value>` - 解析结果；默认值文本无法转换为目标类型时返回错误
pub fn resolve_value(
    resolver: &Resolver,
    path: &str,
    kind: ValueKind,
    default: Option<&str>,
) -> Result<Value> {
    let value = match kind {
        ValueKind::String => json!(match default {
            Some(d) => resolver.get_string_or(path, d),
            None => resolver.get_string(path),
        }),
        ValueKind::Bool => json!(match default {
            Some(d) => resolver.get_bool_or(path, parse_default(d)?),
            None => resolver.get_bool(path),
        }),
        ValueKind::Int => json!(match default {
            Some(d) => resolver.get_int_or(path, parse_default(d)?),
            None => resolver.get_int(path),
        }),
        ValueKind::Int64 => json!(match default {
            Some(d) => resolver.get_int64_or(path, parse_default(d)?),
            None => resolver.get_int64(path),
        }),
        ValueKind::ArrayString => json!(match default {
            Some(d) => resolver.get_array_string_or(path, split_default(d)),
            None => resolver.get_array_string(path),
        }),
        ValueKind::ArrayInt64 => json!(match default {
            Some(d) => resolver.get_array_int64_or(
                path,
                split_default(d)
                    .iter()
                    .map(|item| parse_default(item))
                    .collect::<Result<Vec<i64>>>()?,
            ),
            None => resolver.get_array_int64(path),
        }),
        ValueKind::Json => match (resolver.get_struct::<Value>(path), default) {
            (Some(value), _) => value,
            (None, Some(d)) => serde_json::from_str(d)?,
            (None, None) => Value::Array(Vec::new()),
        },
    };
    Ok(value)
}

fn parse_default<T>(text: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    text.trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("默认值 {:?} 无效: {}", text, e).into())
}

fn split_default(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    text.split(',').map(|item| item.trim().to_string()).collect()
}

/// 文本输出时字符串不带引号
fn render(value: &Value, format: OutputFormat) -> String {
    match (format, value) {
        (OutputFormat::Text, Value::String(s)) => s.clone(),
        _ => value.to_string(),
    }
}

/// 取值命令
pub struct GetCommand;

#[async_trait]
impl Command for GetCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Get {
            path,
            kind,
            default,
            format,
        } = &args.command
        {
            let mut config = Bootstrap::new(args.config.clone()).run().await?;
            let value = resolve_value(&config, path, *kind, default.as_deref())?;
            println!("{}", render(&value, *format));
            config.shutdown();
        }
        Ok(())
    }
}

/// 文档查看命令
pub struct ShowCommand;

#[async_trait]
impl Command for ShowCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Show { layer } = &args.command {
            let mut config = Bootstrap::new(args.config.clone()).run().await?;

            let local = config.local_document();
            let remote = config.remote_document();
            let output = match layer {
                LayerSelection::Local => local.root().clone(),
                LayerSelection::Remote => remote
                    .map(|document| document.root().clone())
                    .unwrap_or(Value::Null),
                LayerSelection::All => json!({
                    "source": config.source().display().to_string(),
                    "local": local.root(),
                    "remote": remote.as_ref().map(|document| document.root()),
                    "remoteRevision": config.store().remote_revision(),
                }),
            };

            println!("{}", serde_json::to_string_pretty(&output)?);
            config.shutdown();
        }
        Ok(())
    }
}

/// 监视命令
pub struct WatchCommand;

#[async_trait]
impl Command for WatchCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Watch { paths, kind } = &args.command {
            let mut config = Bootstrap::new(args.config.clone()).run().await?;
            let logging = LoggingSystem::new(args.log_config());

            let snapshot = |resolver: &Resolver| -> Result<HashMap<String, String>> {
                paths
                    .iter()
                    .map(|path| {
                        let value = resolve_value(resolver, path, *kind, None)?;
                        Ok((path.clone(), render(&value, OutputFormat::Text)))
                    })
                    .collect()
            };

            let print = |values: &HashMap<String, String>| {
                for path in paths {
                    println!("{} = {}", path, values.get(path).map_or("", String::as_str));
                }
            };

            print(&snapshot(&*config)?);

            let Some(mut updates) = config.remote_updates() else {
                info!("未启用远程配置，配置不会变化");
                return Ok(());
            };

            loop {
                tokio::select! {
                    update = updates.recv() => match update {
                        Ok(update) => {
                            let values = snapshot(&*config)?;
                            logging.remote_update_log(&update, &values);
                            print(&values);
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("跳过了 {} 次更新通知", skipped);
                        }
                        Err(RecvError::Closed) => break,
                    },
                    _ = tokio::signal::ctrl_c() => {
                        info!("收到中断信号，停止监视");
                        break;
                    }
                }
            }

            config.shutdown();
        }
        Ok(())
    }
}

/// 验证命令
pub struct ValidateCommand;

#[async_trait]
impl Command for ValidateCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        let config_path = args.get_config_path();
        let document = Document::from_file(&config_path).await?;
        println!("配置文件有效: {}", config_path.display());

        match RemoteSettings::from_document(&document)? {
            Some(settings) => {
                println!(
                    "远程配置: dataId={}, group={}, namespaceId={}",
                    settings.data_id,
                    settings.param().group,
                    settings.namespace_id
                );
                for server in &settings.server_configs {
                    println!("  服务端: {}", server.base_url());
                }
            }
            None => println!("未声明远程配置，仅使用本地配置"),
        }
        Ok(())
    }
}

/// 版本命令
pub struct VersionCommand;

#[async_trait]
impl Command for VersionCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Version { format } = &args.command {
            match format {
                OutputFormat::Json => {
                    let version_info = json!({
                        "name": crate::APP_NAME,
                        "version": crate::VERSION,
                        "description": crate::APP_DESCRIPTION
                    });
                    println!("{}", serde_json::to_string_pretty(&version_info)?);
                }
                OutputFormat::Text => {
                    println!("{} v{}", crate::APP_NAME, crate::VERSION);
                    println!("{}", crate::APP_DESCRIPTION);
                }
            }
        }
        Ok(())
    }
}
