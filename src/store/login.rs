// src/store/login.rs

//! 登录状态模块。

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::config::LOGIN_USER_KEY;
use crate::error::WsError;
use crate::store::persist::PersistentStore;

/// 登录接口返回并持久化在 `"loginUser"` 下的用户记录。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LoginUser {
    pub title: String,
    pub user_pk: String,
    pub token: String,
    /// 会话创建时间 (Unix 秒)。
    pub created: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginState {
    pub is_logged_in: bool,
    pub title: String,
    pub user_pk: String,
    pub token: String,
    pub created: i64,
}

impl LoginState {
    pub fn set_logged_user(&mut self, user: LoginUser) {
        self.is_logged_in = true;
        self.title = user.title;
        self.user_pk = user.user_pk;
        self.token = user.token;
        self.created = user.created;
    }

    pub fn set_logged_out(&mut self) {
        *self = LoginState::default();
    }

    /// 会话创建时间；未登录时为 `None`。
    pub fn session_created_at(&self) -> Option<i64> {
        self.is_logged_in.then_some(self.created)
    }

    /// 登录并把记录写入持久化存储。
    pub fn login(&mut self, user: LoginUser, persist: &mut dyn PersistentStore) -> Result<(), WsError> {
        let record = serde_json::to_value(&user)
            .map_err(|e| WsError::SerializationError(format!("登录记录序列化失败: {}", e)))?;
        persist.set(LOGIN_USER_KEY, record)?;
        info!("[登录状态] 用户 '{}' 已登录。", user.title);
        self.set_logged_user(user);
        Ok(())
    }

    /// 从持久化存储恢复登录记录。记录缺失或格式不对时保持未登录。
    pub fn restore_from(&mut self, persist: &dyn PersistentStore) -> bool {
        let Some(record) = persist.get(LOGIN_USER_KEY) else {
            return false;
        };
        match serde_json::from_value::<LoginUser>(record) {
            Ok(user) => {
                info!("[登录状态] 已恢复用户 '{}' 的登录记录。", user.title);
                self.set_logged_user(user);
                true
            }
            Err(e) => {
                warn!("[登录状态] 持久化的登录记录格式不正确，已忽略: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::persist::MemoryStore;
    use serde_json::json;

    fn user() -> LoginUser {
        LoginUser {
            title: "operator".into(),
            user_pk: "U#1".into(),
            token: "secret".into(),
            created: 1_700_000_000,
        }
    }

    #[test]
    fn logged_user_then_logged_out() {
        let mut state = LoginState::default();
        assert_eq!(state.session_created_at(), None);

        state.set_logged_user(user());
        assert!(state.is_logged_in);
        assert_eq!(state.session_created_at(), Some(1_700_000_000));

        state.set_logged_out();
        assert_eq!(state, LoginState::default());
    }

    #[test]
    fn login_persists_and_restores() {
        let mut persist = MemoryStore::new();
        LoginState::default().login(user(), &mut persist).unwrap();
        assert_eq!(persist.get(LOGIN_USER_KEY).unwrap()["user_pk"], json!("U#1"));

        let mut restored = LoginState::default();
        assert!(restored.restore_from(&persist));
        assert_eq!(restored.token, "secret");
    }

    #[test]
    fn restore_ignores_malformed_record() {
        let mut persist = MemoryStore::new();
        persist.set(LOGIN_USER_KEY, json!({"title": 5})).unwrap();
        let mut state = LoginState::default();
        assert!(!state.restore_from(&persist));
        assert!(!state.is_logged_in);
    }
}
