// src/ws_client/mod.rs

//! WebSocket 客户端服务模块。
//!
//! `service.rs` 中的 `WebSocketClientService` 把连接管理器、事件归约器与状态存储
//! 组装成一个单任务事件循环。

pub mod service;

pub use service::WebSocketClientService;
