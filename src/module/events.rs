//! 单元生命周期通知
//!
//! 加载器在加载、卸载、出错时广播 [`UnitEvent`]，外部监督进程或文件监视器可以订阅。

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::generate_uuid;

/// 通知类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitEventKind {
    /// 单元已加载
    Loaded,
    /// 单元已卸载
    Unloaded,
    /// 操作出错
    Error,
}

impl UnitEventKind {
    /// 事件类型字符串（格式: category.name）
    pub fn event_type(&self) -> &'static str {
        match self {
            UnitEventKind::Loaded => unit_events::UNIT_LOADED,
            UnitEventKind::Unloaded => unit_events::UNIT_UNLOADED,
            UnitEventKind::Error => unit_events::UNIT_ERROR,
        }
    }
}

impl fmt::Display for UnitEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event_type())
    }
}

/// 单元生命周期通知
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitEvent {
    /// 事件唯一标识
    pub event_id: String,

    /// 通知类型
    pub kind: UnitEventKind,

    /// 单元 ID
    pub unit_id: String,

    /// 隔离边界 ID（加载失败且边界未建立时为空）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boundary_id: Option<String>,

    /// 附加说明
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,

    /// 事件时间戳
    pub timestamp: DateTime<Utc>,
}

impl UnitEvent {
    /// 创建通知
    pub fn new(kind: UnitEventKind, unit_id: impl Into<String>) -> Self {
        Self {
            event_id: generate_uuid(),
            kind,
            unit_id: unit_id.into(),
            boundary_id: None,
            message: String::new(),
            timestamp: Utc::now(),
        }
    }

    /// 加载完成
    pub fn loaded(unit_id: impl Into<String>, boundary_id: impl Into<String>) -> Self {
        Self::new(UnitEventKind::Loaded, unit_id).with_boundary(boundary_id)
    }

    /// 卸载完成
    pub fn unloaded(unit_id: impl Into<String>, boundary_id: impl Into<String>) -> Self {
        Self::new(UnitEventKind::Unloaded, unit_id).with_boundary(boundary_id)
    }

    /// 出错
    pub fn error(unit_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(UnitEventKind::Error, unit_id).with_message(message)
    }

    /// 设置边界 ID
    pub fn with_boundary(mut self, boundary_id: impl Into<String>) -> Self {
        self.boundary_id = Some(boundary_id.into());
        self
    }

    /// 设置说明
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// 事件类型字符串
    pub fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }
}

/// 单元事件类型常量
pub mod unit_events {
    /// 单元加载完成
    pub const UNIT_LOADED: &str = "unit.loaded";
    /// 单元卸载完成
    pub const UNIT_UNLOADED: &str = "unit.unloaded";
    /// 单元操作出错
    pub const UNIT_ERROR: &str = "unit.error";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_creation() {
        let event = UnitEvent::loaded("mail", "bnd-abc");
        assert_eq!(event.kind, UnitEventKind::Loaded);
        assert_eq!(event.event_type(), "unit.loaded");
        assert_eq!(event.boundary_id.as_deref(), Some("bnd-abc"));
        assert!(!event.event_id.is_empty());

        let event = UnitEvent::error("mail", "entry symbol missing");
        assert_eq!(event.kind, UnitEventKind::Error);
        assert!(event.boundary_id.is_none());
    }

    #[test]
    fn test_event_serialization() {
        let event = UnitEvent::unloaded("mail", "bnd-abc").with_message("reclaimed");
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["kind"], "unloaded");
        assert_eq!(json["message"], "reclaimed");

        let back: UnitEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back.event_id, event.event_id);
    }
}
