// src/client/connection.rs

//! 连接管理器 `WsConn`。
//!
//! 同一时刻只持有一条底层连接：`connect` 直接丢弃旧连接 (不做关闭握手) 后建立新连接，
//! `reconnect` 以上次的地址重新 `connect` 且不启用心跳，`close` 关闭并清空连接。
//! 所有操作都不通过返回值报告连接结果，调用方只能从随后的规范化事件得知。
//!
//! 心跳定时器的句柄保存在管理器内：启用心跳的 `connect` 会先中止旧定时器再安装新定时器，
//! `close` 会中止定时器，`reconnect` 沿用现有定时器，因此任何时刻最多只有一个心跳任务。

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::future::BoxFuture;
use log::{debug, error, info, warn};
use serde::Serialize;
use tokio::sync::Mutex as TokioMutex;
use tokio::task::JoinHandle;
use url::Url;

use crate::client::transport::{Connector, TransportHandle, parse_ws_url};
use crate::config::KEEPALIVE_PERIOD;
use crate::error::WsError;
use crate::event::EventSender;
use crate::message::{PingPayload, encode_payload};

/// 当前连接及其代号。
struct ActiveConnection<H> {
    generation: u64,
    handle: H,
}

/// 归约器触发重连所依赖的能力。由服务循环把 `WsConn` 注入归约器。
pub trait ReconnectHandle: Send + Sync {
    fn request_reconnect(&self) -> BoxFuture<'_, ()>;
}

/// WebSocket 连接管理器。
///
/// 持有最近一次使用的地址、当前连接句柄 (连同其代号) 以及心跳任务句柄。
/// 连接的每个生命周期事件都以 `ConnEvent { generation, .. }` 的形式发往构造时给定的事件通道，
/// 调用方据此区分当前连接与已被替换的旧连接。
pub struct WsConn<C: Connector> {
    connector: C,
    events: EventSender,
    url: TokioMutex<Option<Url>>,
    connection: Arc<TokioMutex<Option<ActiveConnection<C::Handle>>>>,
    keepalive_task: TokioMutex<Option<JoinHandle<()>>>,
    next_generation: AtomicU64,
}

impl<C: Connector> WsConn<C> {
    /// 创建管理器，此时尚未连接任何地址。
    ///
    /// # Arguments
    /// * `connector` - 用于打开底层连接的 `Connector` 实现。
    /// * `events` - 所有连接产生的规范化事件都会发往该通道。
    pub fn new(connector: C, events: EventSender) -> Self {
        Self {
            connector,
            events,
            url: TokioMutex::new(None),
            connection: Arc::new(TokioMutex::new(None)),
            keepalive_task: TokioMutex::new(None),
            next_generation: AtomicU64::new(1),
        }
    }

    /// 连接到 `url_str`，丢弃已有连接 (不做关闭握手)。
    ///
    /// # Arguments
    /// * `url_str` - 服务端地址，必须是 `ws://` 或 `wss://`。该地址会被记录，供之后的 `reconnect` 使用。
    /// * `keepalive` - 为真时中止已有的心跳任务并安装新的心跳任务；为假时保持现有心跳任务不变。
    ///
    /// # Returns
    /// * `Ok(())` - 已发起连接。连接是否成功只能从随后的 `Open` / `Error` / `Close` 事件得知。
    /// * `Err(WsError::InvalidUrl)` - 地址无法解析或协议不是 `ws`/`wss`，此时不会改动现有连接与心跳。
    pub async fn connect(&self, url_str: &str, keepalive: bool) -> Result<(), WsError> {
        let url = parse_ws_url(url_str)?;
        self.open(url, keepalive).await;
        Ok(())
    }

    /// 以上次使用的地址重新连接，不安装新的心跳定时器。
    ///
    /// 现有的心跳任务 (如果有) 继续运行，并通过新连接发送 ping。
    /// 从未调用过 `connect` 时只记录一条警告。
    pub async fn reconnect(&self) {
        let last_url = self.url.lock().await.clone();
        match last_url {
            Some(url) => {
                info!("[连接管理] 重新连接到 {}", url);
                self.open(url, false).await;
            }
            None => warn!("[连接管理] 尚未连接过任何地址，忽略重连请求。"),
        }
    }

    async fn open(&self, url: Url, keepalive: bool) {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        *self.url.lock().await = Some(url.clone());

        let handle = self.connector.open(&url, generation, self.events.clone());
        let previous = self
            .connection
            .lock()
            .await
            .replace(ActiveConnection { generation, handle });
        if let Some(previous) = previous {
            debug!("[连接管理] 丢弃旧连接 (代号 {})，不进行关闭握手。", previous.generation);
        }
        info!("[连接管理] 已发起连接 {} (代号 {})", url, generation);

        if keepalive {
            self.start_keepalive().await;
        }
    }

    async fn start_keepalive(&self) {
        let mut task_guard = self.keepalive_task.lock().await;
        if let Some(existing) = task_guard.take() {
            debug!("[连接管理] 中止旧的心跳任务。");
            existing.abort();
        }

        let connection = Arc::clone(&self.connection);
        let task = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + KEEPALIVE_PERIOD;
            let mut ticker = tokio::time::interval_at(start, KEEPALIVE_PERIOD);
            loop {
                ticker.tick().await;
                let guard = connection.lock().await;
                let Some(active) = guard.as_ref() else {
                    debug!("[心跳] 当前没有连接，跳过本次 ping。");
                    continue;
                };
                info!("[心跳] 向服务端发送 ping (连接代号 {})", active.generation);
                match encode_payload(&PingPayload::default()) {
                    Ok(text) => {
                        if let Err(e) = active.handle.send_text(text) {
                            warn!("[心跳] 发送 ping 失败: {}", e);
                        }
                    }
                    Err(e) => error!("[心跳] {}", e),
                }
            }
        });
        *task_guard = Some(task);
        info!("[连接管理] 心跳任务已启动，周期 {} 秒。", KEEPALIVE_PERIOD.as_secs());
    }

    /// 关闭当前连接并中止心跳任务；没有连接时什么也不做。
    ///
    /// 关闭后当前代号被清空，该连接随后发出的 `Close` 事件会被服务循环视为过期事件丢弃。
    pub async fn close(&self) {
        if let Some(task) = self.keepalive_task.lock().await.take() {
            task.abort();
            debug!("[连接管理] 心跳任务已中止。");
        }
        match self.connection.lock().await.take() {
            Some(active) => {
                info!("[连接管理] 关闭连接 (代号 {})", active.generation);
                active.handle.close();
            }
            None => debug!("[连接管理] 当前没有连接，close 无操作。"),
        }
    }

    /// 序列化并发送 `payload`。
    ///
    /// # Arguments
    /// * `payload` - 任意可序列化为 JSON 的载荷，原样发送，不做包装。
    ///
    /// 没有连接时静默丢弃；序列化或写入失败只记录警告，不向调用方返回错误。
    pub async fn send<T: Serialize + ?Sized>(&self, payload: &T) {
        let guard = self.connection.lock().await;
        let Some(active) = guard.as_ref() else {
            debug!("[连接管理] 当前没有连接，丢弃待发送的载荷。");
            return;
        };
        let result = encode_payload(payload).and_then(|text| active.handle.send_text(text));
        if let Err(e) = result {
            warn!("[连接管理] 发送失败 (连接代号 {}): {}", active.generation, e);
        }
    }

    /// 当前连接的代号；没有连接时为 `None`。
    pub async fn current_generation(&self) -> Option<u64> {
        self.connection.lock().await.as_ref().map(|active| active.generation)
    }

    /// 是否持有连接句柄 (不代表握手已完成)。
    pub async fn is_open(&self) -> bool {
        self.connection.lock().await.is_some()
    }

    /// 最近一次使用的地址。
    pub async fn url(&self) -> Option<Url> {
        self.url.lock().await.clone()
    }

    /// 心跳任务是否在运行。
    pub async fn keepalive_active(&self) -> bool {
        self.keepalive_task
            .lock()
            .await
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

impl<C: Connector> ReconnectHandle for WsConn<C> {
    fn request_reconnect(&self) -> BoxFuture<'_, ()> {
        Box::pin(self.reconnect())
    }
}

impl<C: Connector> Drop for WsConn<C> {
    fn drop(&mut self) {
        if let Some(task) = self.keepalive_task.get_mut().take() {
            task.abort();
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::event::{ConnEvent, TransportEvent, event_channel};
    use std::sync::Mutex;
    use std::time::Duration;

    /// 模拟连接的记录。
    #[derive(Debug, Default)]
    pub(crate) struct Recorded {
        pub opened: Vec<(String, u64)>,
        pub sent: Vec<(u64, String)>,
        pub closed: Vec<u64>,
        pub dropped: Vec<u64>,
        events: Option<EventSender>,
    }

    /// 不进行网络访问的 `Connector`，只记录调用。`auto_open` 为真时每次打开立即发出 `Open`。
    #[derive(Clone, Default)]
    pub(crate) struct FakeConnector {
        pub log: Arc<Mutex<Recorded>>,
        pub auto_open: bool,
    }

    impl FakeConnector {
        pub(crate) fn auto_open() -> Self {
            Self {
                auto_open: true,
                ..Self::default()
            }
        }

        /// 以指定连接代号注入一条事件。
        pub(crate) fn emit(&self, generation: u64, event: TransportEvent) {
            let log = self.log.lock().unwrap();
            if let Some(events) = log.events.as_ref() {
                let _ = events.send(ConnEvent { generation, event });
            }
        }
    }

    pub(crate) struct FakeHandle {
        generation: u64,
        events: EventSender,
        log: Arc<Mutex<Recorded>>,
    }

    impl FakeHandle {
        fn emit(&self, event: TransportEvent) {
            let _ = self.events.send(ConnEvent {
                generation: self.generation,
                event,
            });
        }
    }

    impl Connector for FakeConnector {
        type Handle = FakeHandle;

        fn open(&self, url: &Url, generation: u64, events: EventSender) -> FakeHandle {
            {
                let mut log = self.log.lock().unwrap();
                log.opened.push((url.to_string(), generation));
                log.events = Some(events.clone());
            }
            let handle = FakeHandle {
                generation,
                events,
                log: Arc::clone(&self.log),
            };
            if self.auto_open {
                handle.emit(TransportEvent::Open);
            }
            handle
        }
    }

    impl TransportHandle for FakeHandle {
        fn send_text(&self, text: String) -> Result<(), WsError> {
            self.log.lock().unwrap().sent.push((self.generation, text));
            Ok(())
        }

        fn close(&self) {
            self.log.lock().unwrap().closed.push(self.generation);
            self.emit(TransportEvent::Close {
                code: Some(1000),
                reason: "closed by client".to_string(),
            });
        }
    }

    impl Drop for FakeHandle {
        fn drop(&mut self) {
            self.log.lock().unwrap().dropped.push(self.generation);
        }
    }

    #[tokio::test]
    async fn send_before_connect_is_a_silent_noop() {
        let (tx, _rx) = event_channel();
        let connector = FakeConnector::default();
        let conn = WsConn::new(connector.clone(), tx);

        conn.send(&serde_json::json!({"name": "hello"})).await;

        assert!(!conn.is_open().await);
        let log = connector.log.lock().unwrap();
        assert!(log.opened.is_empty());
        assert!(log.sent.is_empty());
    }

    #[tokio::test]
    async fn connect_rejects_invalid_url() {
        let (tx, _rx) = event_channel();
        let conn = WsConn::new(FakeConnector::default(), tx);
        assert!(matches!(conn.connect("::not a url::", true).await, Err(WsError::InvalidUrl(_))));
        assert!(!conn.is_open().await);
        assert!(!conn.keepalive_active().await);
    }

    #[tokio::test]
    async fn connect_replaces_previous_connection_without_close() {
        let (tx, _rx) = event_channel();
        let connector = FakeConnector::default();
        let conn = WsConn::new(connector.clone(), tx);

        conn.connect("wss://example/socket", false).await.unwrap();
        conn.connect("wss://example/other", false).await.unwrap();

        assert_eq!(conn.current_generation().await, Some(2));
        let log = connector.log.lock().unwrap();
        assert_eq!(log.opened.len(), 2);
        assert_eq!(log.dropped, vec![1]);
        assert!(log.closed.is_empty());
    }

    #[tokio::test]
    async fn send_serializes_through_current_connection() {
        let (tx, _rx) = event_channel();
        let connector = FakeConnector::default();
        let conn = WsConn::new(connector.clone(), tx);
        conn.connect("wss://example/socket", false).await.unwrap();

        conn.send(&serde_json::json!({"name": "say", "text": "hi"})).await;

        let log = connector.log.lock().unwrap();
        assert_eq!(log.sent.len(), 1);
        let (generation, text) = &log.sent[0];
        assert_eq!(*generation, 1);
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(text).unwrap(),
            serde_json::json!({"name": "say", "text": "hi"})
        );
    }

    #[tokio::test]
    async fn reconnect_reuses_last_url_and_keeps_single_timer() {
        let (tx, _rx) = event_channel();
        let connector = FakeConnector::default();
        let conn = WsConn::new(connector.clone(), tx);

        conn.reconnect().await;
        assert!(connector.log.lock().unwrap().opened.is_empty());

        conn.connect("wss://example/socket", true).await.unwrap();
        assert!(conn.keepalive_active().await);
        conn.reconnect().await;
        conn.request_reconnect().await;

        assert!(conn.keepalive_active().await);
        let log = connector.log.lock().unwrap();
        let urls: Vec<&str> = log.opened.iter().map(|(url, _)| url.as_str()).collect();
        assert_eq!(urls, vec!["wss://example/socket"; 3]);
    }

    #[tokio::test]
    async fn close_clears_handle_and_cancels_keepalive() {
        let (tx, mut rx) = event_channel();
        let connector = FakeConnector::default();
        let conn = WsConn::new(connector.clone(), tx);
        conn.connect("wss://example/socket", true).await.unwrap();

        conn.close().await;
        conn.close().await;

        assert!(!conn.is_open().await);
        assert!(!conn.keepalive_active().await);
        assert_eq!(connector.log.lock().unwrap().closed, vec![1]);
        assert_eq!(rx.recv().await.map(|e| e.generation), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn keepalive_pings_every_period_through_current_connection() {
        let (tx, _rx) = event_channel();
        let connector = FakeConnector::default();
        let conn = WsConn::new(connector.clone(), tx);
        conn.connect("wss://example/socket", true).await.unwrap();

        tokio::time::sleep(Duration::from_secs(179)).await;
        assert!(connector.log.lock().unwrap().sent.is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        conn.reconnect().await;
        tokio::time::sleep(Duration::from_secs(180)).await;

        let log = connector.log.lock().unwrap();
        let pings: Vec<(u64, &str)> = log.sent.iter().map(|(g, t)| (*g, t.as_str())).collect();
        assert_eq!(pings, vec![(1, r#"{"name":"ping"}"#), (2, r#"{"name":"ping"}"#)]);
    }

    #[tokio::test]
    async fn connect_rejects_non_websocket_scheme_and_keeps_current_connection() {
        let (tx, _rx) = event_channel();
        let connector = FakeConnector::default();
        let conn = WsConn::new(connector.clone(), tx);
        conn.connect("wss://example/socket", false).await.unwrap();

        let result = conn.connect("http://example/socket", true).await;

        assert!(matches!(result, Err(WsError::InvalidUrl(_))));
        assert_eq!(conn.current_generation().await, Some(1));
        assert_eq!(conn.url().await.map(|url| url.to_string()), Some("wss://example/socket".to_string()));
        assert!(!conn.keepalive_active().await);
        assert_eq!(connector.log.lock().unwrap().opened.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn second_keepalive_connect_replaces_previous_timer() {
        let (tx, _rx) = event_channel();
        let connector = FakeConnector::default();
        let conn = WsConn::new(connector.clone(), tx);
        conn.connect("wss://example/socket", true).await.unwrap();
        conn.connect("wss://example/socket", true).await.unwrap();

        tokio::time::sleep(Duration::from_secs(181)).await;

        let log = connector.log.lock().unwrap();
        assert_eq!(log.sent, vec![(2, r#"{"name":"ping"}"#.to_string())]);
    }

    #[tokio::test(start_paused = true)]
    async fn keepalive_is_noop_without_connection() {
        let (tx, _rx) = event_channel();
        let connector = FakeConnector::default();
        let conn = WsConn::new(connector.clone(), tx);
        conn.connect("wss://example/socket", true).await.unwrap();
        conn.connection.lock().await.take();

        tokio::time::sleep(Duration::from_secs(181)).await;

        assert!(conn.keepalive_active().await);
        assert!(connector.log.lock().unwrap().sent.is_empty());
    }
}
