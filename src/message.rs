// src/message.rs

//! 出站载荷的序列化与入站消息的解析。
//!
//! 服务端协议除通用的 JSON 信封外没有约定具体结构：出站载荷由调用方定义，
//! 原样序列化后发送；入站消息只要求是合法 JSON，解析结果以
//! `serde_json::Value` 保存。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WsError;

/// 心跳载荷的 `name` 字段。
pub const PING_NAME: &str = "ping";

/// 心跳载荷 `{"name": "ping"}`。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PingPayload {
    pub name: String,
}

impl Default for PingPayload {
    fn default() -> Self {
        Self {
            name: PING_NAME.to_string(),
        }
    }
}

/// 将任意可序列化的载荷编码为 JSON 文本。
pub fn encode_payload<T: Serialize + ?Sized>(payload: &T) -> Result<String, WsError> {
    serde_json::to_string(payload)
        .map_err(|e| WsError::SerializationError(format!("载荷序列化为JSON失败: {}", e)))
}

/// 解析入站文本帧。格式错误时返回 `DeserializationError`，原文截断后附在错误信息中。
pub fn decode_message(raw: &str) -> Result<Value, WsError> {
    serde_json::from_str(raw).map_err(|e| {
        WsError::DeserializationError(format!(
            "收到的消息不是合法JSON: {}, 原始文本 (前100字符): '{}'",
            e,
            raw.chars().take(100).collect::<String>()
        ))
    })
}
