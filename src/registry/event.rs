//! 导航事件数据结构
//!
//! 定义核心生命周期事件与传送协议消息的统一载体。

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::generate_uuid;

/// 导航事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// 事件唯一标识
    pub event_id: String,

    /// 事件类型（格式: category.name，如 nav.mounted）
    pub event_type: String,

    /// 发送方标识（区域名或组件标签）
    pub sender: String,

    /// 事件数据
    #[serde(default)]
    pub data: Value,

    /// 事件时间戳
    pub timestamp: DateTime<Utc>,

    /// 扩展元数据
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

impl Event {
    /// 创建新事件
    pub fn new(event_type: impl Into<String>, sender: impl Into<String>, data: Value) -> Self {
        Self {
            event_id: generate_uuid(),
            event_type: event_type.into(),
            sender: sender.into(),
            data,
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    /// 添加元数据
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// 事件过滤器
///
/// 在事件类型之上做的二次筛选，当前支持按发送方匹配。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    /// 发送方过滤
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
}

impl EventFilter {
    /// 创建空过滤器（匹配所有）
    pub fn new() -> Self {
        Self::default()
    }

    /// 按发送方过滤
    pub fn by_sender(sender: impl Into<String>) -> Self {
        Self {
            sender: Some(sender.into()),
        }
    }

    /// 检查事件是否匹配过滤器
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(ref filter_sender) = self.sender {
            if filter_sender != &event.sender {
                return false;
            }
        }
        true
    }
}

/// 预定义的导航事件类型
pub mod nav_events {
    /// 区域挂载了新组件
    pub const MOUNTED: &str = "nav.mounted";
    /// 导航处理失败（守卫拒绝或解析失败）
    pub const NAV_ERROR: &str = "nav.error";
    /// 区域被出口绑定
    pub const AREA_BOUND: &str = "nav.area.bound";
    /// 区域被出口释放
    pub const AREA_RELEASED: &str = "nav.area.released";
    /// 传送发现请求
    pub const TELEPORT_REQUEST: &str = "teleport.request";
    /// 传送发现应答
    pub const TELEPORT_RESPONSE: &str = "teleport.response";
    /// 核心启动
    pub const CORE_STARTED: &str = "nav.core.started";
    /// 核心关闭
    pub const CORE_SHUTDOWN: &str = "nav.core.shutdown";
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_creation() {
        let event = Event::new(nav_events::MOUNTED, "main", json!({"component": "detail"}));

        assert!(!event.event_id.is_empty());
        assert_eq!(event.event_type, "nav.mounted");
        assert_eq!(event.sender, "main");
    }

    #[test]
    fn test_event_metadata() {
        let event = Event::new(nav_events::NAV_ERROR, "main", json!({}))
            .with_metadata("intent_id", json!("abc"));
        assert!(event.metadata.contains_key("intent_id"));
    }

    #[test]
    fn test_event_filter_sender() {
        let filter = EventFilter::by_sender("main");

        let event1 = Event::new("nav.mounted", "main", json!({}));
        let event2 = Event::new("nav.mounted", "sidebar", json!({}));

        assert!(filter.matches(&event1));
        assert!(!filter.matches(&event2));
    }

    #[test]
    fn test_event_serialization() {
        let event = Event::new("nav.mounted", "main", json!({"component": "a"}));
        let json = serde_json::to_string(&event).unwrap();
        let parsed: Event = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.event_type, event.event_type);
        assert_eq!(parsed.sender, event.sender);
    }
}
