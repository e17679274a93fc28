// src/store/persist.rs

//! 持久化键值存储 (相当于浏览器的 localStorage)。

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde_json::Value;

use crate::error::WsError;

/// 持久化存储接口。值为任意 JSON。
pub trait PersistentStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&mut self, key: &str, value: Value) -> Result<(), WsError>;
    /// 删除键；键不存在时同样视为成功。
    fn remove(&mut self, key: &str) -> Result<(), WsError>;
}

/// 仅保存在内存中的存储。
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistentStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), WsError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), WsError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// 以单个 JSON 对象文件保存的存储，每次修改都会整体重写文件。
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, Value>,
}

impl JsonFileStore {
    /// 打开 `path`，文件不存在时从空存储开始。
    pub fn open(path: impl AsRef<Path>) -> Result<Self, WsError> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let text = fs::read_to_string(&path)?;
            if text.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&text).map_err(|e| {
                    WsError::StorageError(format!("存储文件 '{}' 不是合法的 JSON 对象: {}", path.display(), e))
                })?
            }
        } else {
            BTreeMap::new()
        };
        info!("[持久化存储] 已打开 '{}'，共 {} 项。", path.display(), entries.len());
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), WsError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| WsError::SerializationError(format!("存储内容序列化失败: {}", e)))?;
        fs::write(&self.path, text)?;
        debug!("[持久化存储] 已写入 '{}'", self.path.display());
        Ok(())
    }
}

impl PersistentStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), WsError> {
        self.entries.insert(key.to_string(), value);
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<(), WsError> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}
