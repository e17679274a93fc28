// src/store/mod.rs

//! 客户端状态存储。
//!
//! 仿照前端的模块化 store：`login` (登录会话)、`ui` (界面提示)、`ws` (连接状态与事件归约器)，
//! 外加一个持久化键值存储。整个 `Store` 由服务循环独占，只有事件归约器会修改 `ws` 模块。

pub mod login;
pub mod persist;
pub mod ui;
pub mod ws;

use self::login::LoginState;
use self::persist::{MemoryStore, PersistentStore};
use self::ui::UiState;
use self::ws::WsState;

/// 根状态，聚合各模块。
pub struct Store {
    pub login: LoginState,
    pub ui: UiState,
    pub ws: WsState,
    pub persist: Box<dyn PersistentStore>,
}

impl Store {
    /// 以给定的持久化存储创建根状态，并从中恢复登录记录。
    pub fn new(persist: Box<dyn PersistentStore>) -> Self {
        let mut login = LoginState::default();
        login.restore_from(persist.as_ref());
        Self {
            login,
            ui: UiState::default(),
            ws: WsState::default(),
            persist,
        }
    }

    /// 仅使用内存存储的根状态。
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStore::new()))
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("login", &self.login)
            .field("ui", &self.ui)
            .field("ws", &self.ws)
            .finish_non_exhaustive()
    }
}
