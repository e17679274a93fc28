// src/client/mod.rs

//! WebSocket 客户端模块。
//!
//! - `transport`: 传输层接缝 (`Connector` / `TransportHandle`) 及基于 `tokio-tungstenite` 的实现；
//! - `connection`: 连接管理器 `WsConn`，负责连接、重连、关闭、发送与心跳定时器。

pub mod connection;
pub mod transport;
