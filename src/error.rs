// src/error.rs

//! 定义 WebSocket 客户端及各状态存储模块使用的错误类型。

use thiserror::Error;

/// 本库的统一错误类型。
///
/// 所有错误都不会中止宿主进程：传输层错误最终都会退化为"已断开"的 UI 状态。
#[derive(Error, Debug)]
pub enum WsError {
    /// serde 序列化失败。
    #[error("序列化错误: {0}")]
    SerializationError(String),

    /// 收到的载荷无法解析为 JSON。
    #[error("反序列化错误: {0}")]
    DeserializationError(String),

    /// WebSocket 协议相关的错误 (握手失败、帧格式错误等)。
    #[error("WebSocket协议错误: {0}")]
    WebSocketProtocolError(#[from] tokio_tungstenite::tungstenite::Error),

    /// 底层 I/O 错误。
    #[error("I/O错误: {0}")]
    IoError(#[from] std::io::Error),

    /// 连接任务已结束，发送通道已关闭。
    #[error("发送错误: 通道已关闭")]
    SendErrorClosed,

    /// 无效的 URL 格式。
    #[error("无效的URL: {0}")]
    InvalidUrl(String),

    /// 持久化存储读写失败。
    #[error("存储错误: {0}")]
    StorageError(String),
}
