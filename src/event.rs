// src/event.rs

//! 规范化的传输层事件。
//!
//! 底层连接的四种生命周期回调 (打开、关闭、错误、收到消息) 都会被转换成
//! `TransportEvent`，再附上所属连接的代号 (`generation`) 后经由同一个通道
//! 送往事件归约器。

use std::fmt;
use tokio::sync::mpsc;

/// 事件种类，对应浏览器 WebSocket 的 `event.type`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Open,
    Close,
    Error,
    Message,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Open => "open",
            EventKind::Close => "close",
            EventKind::Error => "error",
            EventKind::Message => "message",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单条规范化事件，携带原始事件中对归约器有意义的部分。
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// 握手完成，连接可用。
    Open,
    /// 连接已关闭。`code` 为关闭帧中的状态码 (握手失败或流异常结束时为 `None`)。
    Close { code: Option<u16>, reason: String },
    /// 传输层错误的诊断信息。之后总会跟随一个 `Close`。
    Error(String),
    /// 文本帧的原始内容，尚未解析。
    Message(String),
}

impl TransportEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            TransportEvent::Open => EventKind::Open,
            TransportEvent::Close { .. } => EventKind::Close,
            TransportEvent::Error(_) => EventKind::Error,
            TransportEvent::Message(_) => EventKind::Message,
        }
    }

    /// 没有关闭帧时使用的关闭事件。
    pub fn closed(reason: impl Into<String>) -> Self {
        TransportEvent::Close {
            code: None,
            reason: reason.into(),
        }
    }
}

/// 带有连接代号的事件。每次 `connect` 都会分配一个新代号，
/// 服务循环据此丢弃来自已被替换或已主动关闭的连接的迟到事件。
#[derive(Debug, Clone, PartialEq)]
pub struct ConnEvent {
    pub generation: u64,
    pub event: TransportEvent,
}

pub type EventSender = mpsc::UnboundedSender<ConnEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ConnEvent>;

/// 创建事件通道。
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_browser_event_type() {
        assert_eq!(TransportEvent::Open.kind().as_str(), "open");
        assert_eq!(TransportEvent::closed("bye").kind(), EventKind::Close);
        assert_eq!(TransportEvent::Error("x".into()).kind().to_string(), "error");
        assert_eq!(TransportEvent::Message("{}".into()).kind(), EventKind::Message);
    }
}
