// src/main.rs

//! `qwtctrl_ws` 命令行入口。
//!
//! 用法: `qwtctrl_ws [配置文件路径]`，缺省读取 `config/qwtctrl_client.json`。
//! 连接到配置中的服务端，打印系统消息与收到的消息，按 Ctrl-C 主动关闭后退出。

use anyhow::{Context, Result};
use log::{LevelFilter, error, info, warn};
use tokio::sync::broadcast::error::RecvError;

use qwtctrl_ws::WebSocketClientService;
use qwtctrl_ws::config::{ClientConfig, DEFAULT_CONFIG_PATH};
use qwtctrl_ws::store::Store;
use qwtctrl_ws::store::persist::{JsonFileStore, MemoryStore, PersistentStore};

#[tokio::main]
async fn main() -> Result<()> {
    // 默认 Info，本 crate 为 Debug；RUST_LOG 优先
    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .filter_module("qwtctrl_ws", LevelFilter::Debug)
        .parse_default_env()
        .try_init()
        .context("初始化 env_logger 日志服务失败")?;

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = ClientConfig::load(&config_path)?;

    if std::env::var_os("RUST_LOG").is_none() {
        if let Some(level) = config.log_level.as_deref() {
            match level.parse::<LevelFilter>() {
                Ok(filter) => log::set_max_level(filter),
                Err(_) => warn!("配置中的日志级别 '{}' 无法识别，保持默认。", level),
            }
        }
    }

    let persist: Box<dyn PersistentStore> = match config.storage_path.as_ref() {
        Some(path) => Box::new(
            JsonFileStore::open(path)
                .with_context(|| format!("无法打开持久化存储 '{}'", path.display()))?,
        ),
        None => Box::new(MemoryStore::new()),
    };

    let mut service = WebSocketClientService::with_tungstenite(Store::new(persist));
    info!(
        "qwtctrl_ws 正在启动，登录状态: {}",
        if service.login().is_logged_in { "已登录" } else { "未登录" }
    );

    let mut sys_msgs = service.subscribe_sys_msgs();
    tokio::spawn(async move {
        loop {
            match sys_msgs.recv().await {
                Ok(msg) if msg.is_error => println!("[错误] {}", msg.text),
                Ok(msg) => println!("[提示] {}", msg.text),
                Err(RecvError::Lagged(skipped)) => warn!("系统消息积压，跳过 {} 条。", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    });

    service.start(&config.ws_url, config.keepalive).await?;
    service
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("监听 Ctrl-C 失败: {}", e);
            }
            info!("收到退出请求。");
        })
        .await;

    if let Some(message) = service.state().message.as_ref() {
        info!("最后一条服务端消息: {}", message);
    }
    Ok(())
}
