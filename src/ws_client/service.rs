// src/ws_client/service.rs

//! WebSocket 客户端服务。
//!
//! 服务独占连接管理器 (`WsConn`)、根状态 (`Store`) 与事件接收端，
//! 在单个任务中逐条处理规范化事件，因此归约器对状态的修改彼此之间是原子的。
//! 连接管理器以 `ReconnectHandle` 的形式注入归约器，不依赖任何全局实例。

use std::future::Future;

use chrono::Utc;
use log::{debug, info};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::client::connection::WsConn;
use crate::client::transport::{Connector, TungsteniteConnector};
use crate::error::WsError;
use crate::event::{ConnEvent, EventReceiver, event_channel};
use crate::store::Store;
use crate::store::login::LoginState;
use crate::store::ui::{SysMsg, UiState};
use crate::store::ws::{WsState, handle_event};

/// WebSocket 客户端服务。
pub struct WebSocketClientService<C: Connector = TungsteniteConnector> {
    conn: WsConn<C>,
    store: Store,
    events: EventReceiver,
}

impl WebSocketClientService<TungsteniteConnector> {
    /// 使用 `tokio-tungstenite` 传输创建服务。
    pub fn with_tungstenite(store: Store) -> Self {
        Self::new(TungsteniteConnector, store)
    }
}

impl<C: Connector> WebSocketClientService<C> {
    pub fn new(connector: C, store: Store) -> Self {
        info!("[客户端服务] 正在初始化...");
        let (events_tx, events_rx) = event_channel();
        Self {
            conn: WsConn::new(connector, events_tx),
            store,
            events: events_rx,
        }
    }

    /// 发起首次连接。
    pub async fn start(&self, url: &str, keepalive: bool) -> Result<(), WsError> {
        info!("[客户端服务] 连接到 {} (心跳: {})", url, keepalive);
        self.conn.connect(url, keepalive).await
    }

    /// 发送载荷；未连接时静默丢弃。
    pub async fn send<T: Serialize + ?Sized>(&self, payload: &T) {
        self.conn.send(payload).await;
    }

    /// 主动关闭连接。主动关闭不会触发自动重连。
    pub async fn close(&mut self) {
        info!("[客户端服务] 主动关闭连接。");
        self.conn.close().await;
        self.store.ws.socket_onclose();
    }

    /// 处理一条事件。来自已被替换或已主动关闭的连接的事件会被丢弃。
    pub async fn dispatch(&mut self, conn_event: ConnEvent) {
        let ConnEvent { generation, event } = conn_event;
        if self.conn.current_generation().await != Some(generation) {
            debug!(
                "[客户端服务] 丢弃过期连接 (代号 {}) 的 {} 事件。",
                generation,
                event.kind()
            );
            return;
        }
        let now = Utc::now().timestamp();
        handle_event(&mut self.store, event, now, &self.conn).await;
    }

    /// 等待并处理下一条事件。事件通道关闭时返回 `false`。
    pub async fn handle_next(&mut self) -> bool {
        match self.events.recv().await {
            Some(conn_event) => {
                self.dispatch(conn_event).await;
                true
            }
            None => false,
        }
    }

    /// 持续处理事件，直到 `shutdown` 完成；退出前主动关闭连接。
    pub async fn run_until<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            let next = tokio::select! {
                _ = &mut shutdown => None,
                conn_event = self.events.recv() => conn_event,
            };
            match next {
                Some(conn_event) => self.dispatch(conn_event).await,
                None => break,
            }
        }
        self.close().await;
        info!("[客户端服务] 事件循环已退出。");
    }

    pub fn state(&self) -> &WsState {
        &self.store.ws
    }

    pub fn ui(&self) -> &UiState {
        &self.store.ui
    }

    pub fn login(&self) -> &LoginState {
        &self.store.login
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    pub fn connection(&self) -> &WsConn<C> {
        &self.conn
    }

    /// 订阅系统消息。
    pub fn subscribe_sys_msgs(&self) -> broadcast::Receiver<SysMsg> {
        self.store.ui.subscribe()
    }
}
