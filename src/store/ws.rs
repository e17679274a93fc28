// src/store/ws.rs

//! 连接状态模块与事件归约器。
//!
//! 概念上是 {未连接, 已连接, 重连中} 三态状态机，实际由 `is_connected` 与
//! `reconnect_count` 两个字段表达：
//!
//! - `Open`：置为已连接，重连计数归零，提示 "Connected to server!"；
//! - `Error`：记录诊断信息并提示错误，不改变连接状态 (随后的 `Close` 负责恢复)；
//! - `Close`：置为未连接；已登录会话超过过期阈值时注销并删除持久化的登录记录，
//!   否则在未达到重连上限时计数加一并重连，达到上限后只提示一次连接丢失；
//! - `Message`：解析为 JSON 并替换最新消息，格式错误时记录日志并保留旧值。

use log::{debug, error, info, warn};
use serde_json::Value;

use crate::client::connection::ReconnectHandle;
use crate::config::{LOGIN_USER_KEY, MAX_RECONNECT_ATTEMPTS, SESSION_EXPIRY_SECONDS};
use crate::event::TransportEvent;
use crate::message::decode_message;
use crate::store::Store;
use crate::store::login::LoginState;

pub const MSG_CONNECTED: &str = "Connected to server!";
pub const MSG_CONNECT_ERROR: &str = "Error connecting to server.";
pub const MSG_CLOSED: &str = "Connection to server closed!";
pub const MSG_RECONNECTING: &str = "Reconnecting...";
pub const MSG_CONNECTION_LOST: &str = "Connection to server lost.";

/// 共享的连接状态，只由归约器修改，供界面读取。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WsState {
    pub is_connected: bool,
    pub reconnect_count: u32,
    /// 最近一条入站消息的解析结果。
    pub message: Option<Value>,
    /// 自动重连次数已用尽。
    pub reconnect_error: bool,
}

impl WsState {
    pub fn socket_onopen(&mut self) {
        self.is_connected = true;
        self.reconnect_count = 0;
        self.reconnect_error = false;
    }

    pub fn socket_onclose(&mut self) {
        self.is_connected = false;
    }

    pub fn socket_onerror(&mut self, detail: &str) {
        error!("[连接状态] 连接错误: {} (当前状态: {:?})", detail, self);
    }

    pub fn socket_onmessage(&mut self, message: Value) {
        self.message = Some(message);
    }

    pub fn socket_reconnect(&mut self, count: u32) {
        info!("[连接状态] 第 {} 次重连", count);
        self.reconnect_count = count;
    }

    pub fn socket_reconnect_error(&mut self) {
        self.reconnect_error = true;
    }
}

/// 已登录会话在 `now` 时刻是否已超过过期阈值。未登录时不存在可过期的会话。
pub fn session_expired(login: &LoginState, now: i64) -> bool {
    login
        .session_created_at()
        .is_some_and(|created| now.saturating_sub(created) > SESSION_EXPIRY_SECONDS)
}

/// 事件归约器入口，把一条规范化事件应用到根状态上。
///
/// # Arguments
/// * `store` - 根状态。`ws` 与 `ui` 模块会被修改；会话过期时还会注销 `login` 并删除持久化的登录记录。
/// * `event` - 当前连接产生的事件 (过期代号的事件应由调用方事先过滤)。
/// * `now` - 当前 Unix 时间 (秒)，用于判断登录会话是否过期。
/// * `conn` - 触发重连的能力，只在 `Close` 且允许重连时调用一次。
///
/// 任何事件都不会导致错误返回：解析失败、存储失败都只记录日志。
pub async fn handle_event(
    store: &mut Store,
    event: TransportEvent,
    now: i64,
    conn: &dyn ReconnectHandle,
) {
    debug!("[事件归约] 处理事件: {}", event.kind());
    match event {
        TransportEvent::Open => handle_open(store),
        TransportEvent::Error(detail) => handle_error(store, &detail),
        TransportEvent::Close { code, reason } => {
            handle_close(store, code, &reason, now, conn).await
        }
        TransportEvent::Message(raw) => handle_message(store, &raw),
    }
}

fn handle_open(store: &mut Store) {
    info!("[事件归约] 连接已打开。");
    store.ws.socket_onopen();
    store.ui.sys_msg_info(MSG_CONNECTED);
}

fn handle_error(store: &mut Store, detail: &str) {
    store.ws.socket_onerror(detail);
    store.ui.sys_msg_error(MSG_CONNECT_ERROR);
}

async fn handle_close(
    store: &mut Store,
    code: Option<u16>,
    reason: &str,
    now: i64,
    conn: &dyn ReconnectHandle,
) {
    info!("[事件归约] 连接已关闭 (code: {:?}, 原因: {})", code, reason);
    store.ui.sys_msg_info(MSG_CLOSED);
    store.ws.socket_onclose();

    if session_expired(&store.login, now) {
        warn!(
            "[事件归约] 登录会话已超过 {} 秒，注销并清除登录记录，不再重连。",
            SESSION_EXPIRY_SECONDS
        );
        store.login.set_logged_out();
        if let Err(e) = store.persist.remove(LOGIN_USER_KEY) {
            error!("[事件归约] 删除持久化登录记录失败: {}", e);
        }
        return;
    }

    if store.ws.reconnect_count < MAX_RECONNECT_ATTEMPTS {
        let attempt = store.ws.reconnect_count + 1;
        store.ws.socket_reconnect(attempt);
        store.ui.sys_msg_info(MSG_RECONNECTING);
        conn.request_reconnect().await;
    } else if !store.ws.reconnect_error {
        warn!("[事件归约] 已连续重连 {} 次，放弃自动重连。", MAX_RECONNECT_ATTEMPTS);
        store.ws.socket_reconnect_error();
        store.ui.sys_msg_error(MSG_CONNECTION_LOST);
    }
}

fn handle_message(store: &mut Store, raw: &str) {
    match decode_message(raw) {
        Ok(message) => store.ws.socket_onmessage(message),
        Err(e) => error!("[事件归约] 丢弃无法解析的消息: {}", e),
    }
}
