// src/client/transport.rs

//! 客户端 WebSocket 传输层。
//!
//! 本模块定义连接管理器与具体传输实现之间的接缝 (`Connector` / `TransportHandle`)，
//! 并提供基于 `tokio-tungstenite` 的实现。每条连接运行在独立的 tokio 任务中，
//! 该任务把底层的握手结果、数据帧和关闭帧统一转换为 `TransportEvent`，
//! 行为与浏览器 WebSocket 一致：
//!
//! - 握手失败：先发 `Error`，再发 `Close`；
//! - 握手成功：发 `Open`；
//! - 文本帧：发 `Message(原文)`；
//! - 关闭帧或流结束：发 `Close`；
//! - 读写错误：先发 `Error`，再发 `Close`。

use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    WebSocketStream, connect_async,
    tungstenite::Error as TungsteniteError,
    tungstenite::protocol::Message,
};
use url::Url;

use crate::error::WsError;
use crate::event::{ConnEvent, EventSender, TransportEvent};

/// 可能经过 TLS 加密的客户端 WebSocket 流。
pub type ClientWsStream = WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// 打开连接的能力。连接管理器通过它创建底层连接，测试中可替换为模拟实现。
pub trait Connector: Send + Sync + 'static {
    type Handle: TransportHandle;

    /// 开始连接 `url`，立即返回句柄。连接结果通过 `events` 以代号 `generation` 异步通知。
    fn open(&self, url: &Url, generation: u64, events: EventSender) -> Self::Handle;
}

/// 一条已发起的连接。丢弃句柄即放弃该连接 (不进行关闭握手)。
pub trait TransportHandle: Send + Sync + 'static {
    /// 发送一条文本帧。握手完成前写入的内容会在连接打开后依次发出。
    fn send_text(&self, text: String) -> Result<(), WsError>;

    /// 发起关闭握手。
    fn close(&self);
}

/// 已建立的客户端连接，拆分为发送端与接收端。
pub struct ClientConnection {
    pub ws_sender: SplitSink<ClientWsStream, Message>,
    pub ws_receiver: SplitStream<ClientWsStream>,
}

/// 解析 WebSocket 地址，只接受 `ws` 与 `wss` 协议。
///
/// # Arguments
/// * `url_str` - 待解析的地址字符串，例如 `"wss://example.com/socket"`。
///
/// # Returns
/// * `Ok(Url)` - 解析成功且协议为 `ws`/`wss`。
/// * `Err(WsError::InvalidUrl)` - 地址无法解析，或协议不是 WebSocket 协议。
pub fn parse_ws_url(url_str: &str) -> Result<Url, WsError> {
    let url = Url::parse(url_str)
        .map_err(|e| WsError::InvalidUrl(format!("无效的 WebSocket URL '{}': {}", url_str, e)))?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(WsError::InvalidUrl(format!(
            "WebSocket URL '{}' 的协议必须是 ws 或 wss，实际为 '{}'",
            url_str, other
        ))),
    }
}

/// 连接到指定的 WebSocket 服务器并完成握手。
///
/// # Arguments
/// * `url_str` - 服务端地址，必须是 `ws://` 或 `wss://`。
///
/// # Returns
/// * `Ok(ClientConnection)` - 握手成功，返回拆分好的发送端与接收端。
/// * `Err(WsError::InvalidUrl)` - 地址不合法。
/// * `Err(WsError::WebSocketProtocolError)` - TCP 连接或 WebSocket 握手失败。
pub async fn connect_client(url_str: &str) -> Result<ClientConnection, WsError> {
    info!("[传输层] 开始连接 WebSocket 服务器: {}", url_str);
    let parsed_url = parse_ws_url(url_str)?;

    match connect_async(parsed_url.as_str()).await {
        Ok((ws_stream, response)) => {
            info!("[传输层] 已连接到 {} (HTTP 状态码: {})", url_str, response.status());
            debug!("[传输层] 握手响应头: {:?}", response.headers());
            let (ws_sender, ws_receiver) = ws_stream.split();
            Ok(ClientConnection { ws_sender, ws_receiver })
        }
        Err(e) => {
            error!("[传输层] 连接 {} 失败: {}", url_str, e);
            Err(WsError::WebSocketProtocolError(e))
        }
    }
}

/// 从接收端读取下一条对上层有意义的事件。
///
/// Ping/Pong 由 tungstenite 自动应答，这里直接跳过；二进制帧不在协议之内，
/// 若内容是 UTF-8 则按文本处理，否则丢弃。
pub async fn receive_event(ws_receiver: &mut SplitStream<ClientWsStream>) -> TransportEvent {
    loop {
        match ws_receiver.next().await {
            Some(Ok(Message::Text(text))) => {
                debug!("[传输层] 收到文本帧: '{}'", text);
                break TransportEvent::Message(text);
            }
            Some(Ok(Message::Binary(bin))) => match String::from_utf8(bin) {
                Ok(text) => break TransportEvent::Message(text),
                Err(e) => warn!("[传输层] 丢弃非 UTF-8 的二进制帧 ({} 字节)", e.as_bytes().len()),
            },
            Some(Ok(Message::Ping(data))) => debug!("[传输层] 收到 Ping 帧 ({} 字节)", data.len()),
            Some(Ok(Message::Pong(data))) => debug!("[传输层] 收到 Pong 帧 ({} 字节)", data.len()),
            Some(Ok(Message::Close(frame))) => {
                debug!("[传输层] 收到 Close 帧: {:?}", frame);
                break match frame {
                    Some(frame) => TransportEvent::Close {
                        code: Some(u16::from(frame.code)),
                        reason: frame.reason.into_owned(),
                    },
                    None => TransportEvent::closed("服务端关闭了连接"),
                };
            }
            Some(Ok(Message::Frame(_))) => debug!("[传输层] 跳过原始 Frame"),
            Some(Err(TungsteniteError::ConnectionClosed | TungsteniteError::AlreadyClosed)) | None => {
                debug!("[传输层] 接收流已结束。");
                break TransportEvent::closed("连接已结束");
            }
            Some(Err(e)) => {
                error!("[传输层] 接收消息时发生错误: {}", e);
                break TransportEvent::Error(e.to_string());
            }
        }
    }
}

enum Outbound {
    Text(String),
    Close,
}

/// 基于 `tokio-tungstenite` 的 `Connector`。必须在 tokio 运行时内调用 `open`。
#[derive(Debug, Default, Clone, Copy)]
pub struct TungsteniteConnector;

impl Connector for TungsteniteConnector {
    type Handle = TungsteniteHandle;

    fn open(&self, url: &Url, generation: u64, events: EventSender) -> TungsteniteHandle {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_connection(url.clone(), generation, events, outbound_rx));
        TungsteniteHandle {
            outbound: outbound_tx,
            closing: AtomicBool::new(false),
            task,
        }
    }
}

/// `TungsteniteConnector` 打开的连接。
#[derive(Debug)]
pub struct TungsteniteHandle {
    outbound: mpsc::UnboundedSender<Outbound>,
    closing: AtomicBool,
    task: JoinHandle<()>,
}

impl TransportHandle for TungsteniteHandle {
    fn send_text(&self, text: String) -> Result<(), WsError> {
        self.outbound
            .send(Outbound::Text(text))
            .map_err(|_| WsError::SendErrorClosed)
    }

    fn close(&self) {
        self.closing.store(true, Ordering::SeqCst);
        let _ = self.outbound.send(Outbound::Close);
    }
}

impl Drop for TungsteniteHandle {
    fn drop(&mut self) {
        // 已发起关闭握手的任务自行结束，其余直接中止
        if !self.closing.load(Ordering::SeqCst) {
            self.task.abort();
        }
    }
}

impl std::fmt::Debug for Outbound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outbound::Text(text) => write!(f, "Text({} 字节)", text.len()),
            Outbound::Close => f.write_str("Close"),
        }
    }
}

async fn run_connection(
    url: Url,
    generation: u64,
    events: EventSender,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
) {
    let emit = |event: TransportEvent| {
        if events.send(ConnEvent { generation, event }).is_err() {
            debug!("[传输层] 事件接收端已关闭 (连接代号 {})", generation);
        }
    };

    let ClientConnection {
        mut ws_sender,
        mut ws_receiver,
    } = match connect_client(url.as_str()).await {
        Ok(connection) => connection,
        Err(e) => {
            emit(TransportEvent::Error(e.to_string()));
            emit(TransportEvent::closed(format!("连接失败: {}", e)));
            return;
        }
    };
    emit(TransportEvent::Open);

    loop {
        tokio::select! {
            command = outbound.recv() => match command {
                Some(Outbound::Text(text)) => {
                    if let Err(e) = ws_sender.send(Message::Text(text)).await {
                        error!("[传输层] 发送文本帧失败 (连接代号 {}): {}", generation, e);
                        emit(TransportEvent::Error(e.to_string()));
                        emit(TransportEvent::closed("发送失败，连接已断开"));
                        return;
                    }
                }
                Some(Outbound::Close) | None => {
                    if let Err(e) = ws_sender.close().await {
                        debug!("[传输层] 发送关闭帧失败: {}", e);
                    }
                    emit(TransportEvent::Close { code: Some(1000), reason: "客户端主动关闭".to_string() });
                    return;
                }
            },
            incoming = receive_event(&mut ws_receiver) => match incoming {
                TransportEvent::Error(detail) => {
                    emit(TransportEvent::Error(detail));
                    emit(TransportEvent::closed("接收失败，连接已断开"));
                    return;
                }
                close @ TransportEvent::Close { .. } => {
                    emit(close);
                    return;
                }
                other => emit(other),
            },
        }
    }
}
