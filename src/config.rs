// src/config.rs

//! 客户端配置与固定的连接策略常量。
//!
//! 心跳周期、重连上限与会话过期阈值是编译期常量，不随配置文件变化；
//! 配置文件只描述连接地址、是否启用心跳以及持久化文件位置等部署相关信息。

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::client::transport::parse_ws_url;

/// 心跳 (`{"name": "ping"}`) 发送周期。
pub const KEEPALIVE_PERIOD: Duration = Duration::from_secs(3 * 60);

/// 连续自动重连的最大次数。
pub const MAX_RECONNECT_ATTEMPTS: u32 = 6;

/// 断开时判定登录会话过期的阈值 (秒)。
///
/// 保留了现有行为 `24*60*59`，即 84_960 秒 (23小时36分钟)。文档中常见的
/// "约 86340 秒 / 23小时59分钟" 与该公式不符，本意大概是 `24*60*60`，
/// 待产品确认后再调整。
pub const SESSION_EXPIRY_SECONDS: i64 = 24 * 60 * 59;

/// 持久化存储中登录记录使用的键。
pub const LOGIN_USER_KEY: &str = "loginUser";

/// 默认配置文件位置 (相对于工作目录)。
pub const DEFAULT_CONFIG_PATH: &str = "config/qwtctrl_client.json";

fn default_keepalive() -> bool {
    true
}

/// WebSocket 客户端配置。
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// 服务端 WebSocket 地址，例如 `"wss://example.com/socket"`。
    pub ws_url: String,
    /// 首次连接时是否启用心跳定时器。
    #[serde(default = "default_keepalive")]
    pub keepalive: bool,
    /// 持久化存储 (登录记录等) 对应的 JSON 文件；缺省时只保存在内存中。
    #[serde(default)]
    pub storage_path: Option<PathBuf>,
    /// 日志级别过滤，例如 `"info"`、`"debug"`；`RUST_LOG` 环境变量优先。
    #[serde(default)]
    pub log_level: Option<String>,
}

impl ClientConfig {
    /// 从 JSON 文件加载配置。
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::warn!("[客户端配置] 配置文件 '{}' 未找到。", path.display());
            return Err(anyhow!(
                "客户端配置文件 '{}' 未找到，请创建该文件或通过命令行参数指定配置路径。",
                path.display()
            ));
        }

        let config_str = fs::read_to_string(path)
            .with_context(|| format!("无法读取配置文件 '{}' 的内容", path.display()))?;
        let config = Self::from_json(&config_str)
            .with_context(|| format!("解析配置文件 '{}' 失败", path.display()))?;

        log::info!(
            "[客户端配置] 已从 '{}' 加载配置。服务端地址: {}",
            path.display(),
            config.ws_url
        );
        Ok(config)
    }

    /// 从 JSON 文本解析配置，并校验 `ws_url`。
    pub fn from_json(text: &str) -> Result<Self> {
        let config: ClientConfig =
            serde_json::from_str(text).context("配置内容不是合法的 ClientConfig JSON")?;
        parse_ws_url(&config.ws_url).context("配置项 ws_url 不可用")?;
        Ok(config)
    }
}
