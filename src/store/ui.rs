// src/store/ui.rs

//! 界面状态模块：侧边栏开关与系统消息横幅。
//!
//! 每条系统消息除了写入状态外，还会广播给所有订阅者 (例如界面渲染层或测试)。

use log::{debug, error, info};
use tokio::sync::broadcast;

/// 系统消息广播通道容量。
const SYS_MSG_CHANNEL_CAPACITY: usize = 64;

/// 一条系统消息。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysMsg {
    pub text: String,
    pub is_error: bool,
}

#[derive(Debug)]
pub struct UiState {
    pub is_drawer_open: bool,
    pub sys_msg: String,
    pub sys_msg_error: bool,
    notices: broadcast::Sender<SysMsg>,
}

impl Default for UiState {
    fn default() -> Self {
        let (notices, _) = broadcast::channel(SYS_MSG_CHANNEL_CAPACITY);
        Self {
            is_drawer_open: false,
            sys_msg: String::new(),
            sys_msg_error: false,
            notices,
        }
    }
}

impl UiState {
    pub fn open_drawer(&mut self) {
        self.is_drawer_open = true;
    }

    pub fn close_drawer(&mut self) {
        self.is_drawer_open = false;
    }

    pub fn set_drawer(&mut self, open: bool) {
        self.is_drawer_open = open;
    }

    pub fn set_sys_msg_err(&mut self, is_error: bool) {
        self.sys_msg_error = is_error;
    }

    pub fn set_sys_msg(&mut self, text: impl Into<String>) {
        self.sys_msg = text.into();
        let notice = SysMsg {
            text: self.sys_msg.clone(),
            is_error: self.sys_msg_error,
        };
        if self.notices.send(notice).is_err() {
            debug!("[界面状态] 当前没有系统消息订阅者。");
        }
    }

    /// 显示一条普通提示。
    pub fn sys_msg_info(&mut self, text: impl Into<String>) {
        let text = text.into();
        info!("[界面状态] 提示: {}", text);
        self.set_sys_msg_err(false);
        self.set_sys_msg(text);
    }

    /// 显示一条错误提示。
    pub fn sys_msg_error(&mut self, text: impl Into<String>) {
        let text = text.into();
        error!("[界面状态] 错误提示: {}", text);
        self.set_sys_msg_err(true);
        self.set_sys_msg(text);
    }

    /// 订阅之后产生的系统消息。
    pub fn subscribe(&self) -> broadcast::Receiver<SysMsg> {
        self.notices.subscribe()
    }
}
