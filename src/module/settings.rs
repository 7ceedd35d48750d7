//! 模块设置
//!
//! 编排器不生成也不校验模块设置，只负责把 [`SettingsProvider`] 提供的
//! [`ModuleSettings`] 原样交给各阶段钩子。

use std::collections::HashMap;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::{CoreError, Result};

/// 单个模块的设置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleSettings {
    /// 提供方是否已就绪
    pub ready: bool,
    /// 设置内容（不透明）
    #[serde(default)]
    pub values: Value,
}

impl ModuleSettings {
    /// 创建已就绪的设置
    pub fn ready(values: Value) -> Self {
        Self { ready: true, values }
    }

    /// 未就绪的空设置
    pub fn pending() -> Self {
        Self::default()
    }

    /// 以指定类型读取全部设置
    pub fn get<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.values.clone()).map_err(CoreError::from)
    }

    /// 读取单个键
    ///
    /// 键不存在时返回 `Ok(None)`。
    pub fn get_key<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.values.get(key) {
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| CoreError::InvalidConfigValue {
                    key: key.to_string(),
                    reason: e.to_string(),
                }),
            None => Ok(None),
        }
    }
}

/// 设置提供者
#[async_trait]
pub trait SettingsProvider: Send + Sync {
    /// 获取模块设置
    async fn settings_for(&self, module_id: &str) -> ModuleSettings;
}

/// 基于内存表的设置提供者
///
/// 通常由配置文件的 `settings` 段构造。
#[derive(Debug, Clone, Default)]
pub struct StaticSettingsProvider {
    entries: HashMap<String, Value>,
}

impl StaticSettingsProvider {
    /// 创建空的提供者
    pub fn new() -> Self {
        Self::default()
    }

    /// 从设置表创建
    pub fn from_map(entries: HashMap<String, Value>) -> Self {
        Self { entries }
    }

    /// 添加模块设置
    pub fn with(mut self, module_id: impl Into<String>, values: Value) -> Self {
        self.entries.insert(module_id.into(), values);
        self
    }
}

#[async_trait]
impl SettingsProvider for StaticSettingsProvider {
    async fn settings_for(&self, module_id: &str) -> ModuleSettings {
        self.entries
            .get(module_id)
            .cloned()
            .map(ModuleSettings::ready)
            .unwrap_or_else(ModuleSettings::pending)
    }
}
