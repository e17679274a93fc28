//! `qwtctrl_ws`：qwtctrl 控制台的 WebSocket 连接管理与客户端状态存储。
//!
//! 主要模块：
//! - `client`: 传输层与连接管理器 (连接、重连、关闭、发送、心跳)。
//! - `event`: 规范化的传输事件。
//! - `store`: 登录、界面与连接状态模块，以及处理连接事件的归约器。
//! - `ws_client`: 把上述组件组装成单任务事件循环的客户端服务。
//! - `config`: 配置文件与固定的连接策略常量。
//! - `message` / `error`: 载荷编解码与错误类型。

pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod message;
pub mod store;
pub mod ws_client;

pub use client::connection::{ReconnectHandle, WsConn};
pub use client::transport::{Connector, TransportHandle, TungsteniteConnector};
pub use error::WsError;
pub use event::{ConnEvent, EventKind, TransportEvent};
pub use store::Store;
pub use ws_client::WebSocketClientService;
