//! 路由结构相等性与缓存键
//!
//! 出口的幂等检查和解析缓存都依赖这里的纯函数。

use serde_json::Value;

use crate::registry::intent::ActiveRoute;

/// 比较两个活动路由是否结构相等
///
/// 区域、已解析标签与状态三者全部相等才视为同一路由。
pub fn route_equal(a: &ActiveRoute, b: &ActiveRoute) -> bool {
    a.area == b.area && a.component == b.component && state_equal(&a.state, &b.state)
}

/// 比较"待提交结果"与当前活动路由是否结构相等
///
/// 用于出口的幂等检查：相同则丢弃导航意图。
pub fn intent_matches_route(tag: &str, state: &Option<Value>, current: &ActiveRoute) -> bool {
    current.component == tag && state_equal(state, &current.state)
}

/// 状态相等性
///
/// None 与空对象视为等价：二者在 URL 中都不产生状态令牌。
pub fn state_equal(a: &Option<Value>, b: &Option<Value>) -> bool {
    match (normalize(a), normalize(b)) {
        (None, None) => true,
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

fn normalize(state: &Option<Value>) -> Option<&Value> {
    match state {
        None => None,
        Some(Value::Null) => None,
        Some(Value::Object(m)) if m.is_empty() => None,
        Some(v) => Some(v),
    }
}

/// 生成确定性缓存键
///
/// 由区域 + 已解析标签 + 清洗后状态构成。serde_json 的对象键有序，
/// 同一输入总是产生同一键。
pub fn cache_key(area: &str, tag: &str, sanitized_state: &Option<Value>) -> String {
    match normalize(sanitized_state) {
        Some(state) => format!(
            "{}::{}::{}",
            area,
            tag,
            serde_json::to_string(state).unwrap_or_default()
        ),
        None => format!("{}::{}", area, tag),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn route(area: &str, tag: &str, state: Option<Value>) -> ActiveRoute {
        ActiveRoute {
            area: area.to_string(),
            component: tag.to_string(),
            state,
        }
    }

    #[test]
    fn test_route_equal() {
        let a = route("main", "detail-panel", Some(json!({"id": 42})));
        let b = route("main", "detail-panel", Some(json!({"id": 42})));
        assert!(route_equal(&a, &b));

        let c = route("main", "detail-panel", Some(json!({"id": 43})));
        assert!(!route_equal(&a, &c));

        let d = route("sidebar", "detail-panel", Some(json!({"id": 42})));
        assert!(!route_equal(&a, &d));
    }

    #[test]
    fn test_state_equal_none_vs_empty() {
        assert!(state_equal(&None, &Some(json!({}))));
        assert!(state_equal(&Some(Value::Null), &None));
        assert!(!state_equal(&None, &Some(json!({"id": 1}))));
    }

    #[test]
    fn test_intent_matches_route() {
        let current = route("main", "detail-panel", Some(json!({"id": 42})));
        assert!(intent_matches_route(
            "detail-panel",
            &Some(json!({"id": 42})),
            &current
        ));
        assert!(!intent_matches_route(
            "detail-panel",
            &Some(json!({"id": 43})),
            &current
        ));
        assert!(!intent_matches_route("other-panel", &None, &current));
    }

    #[test]
    fn test_cache_key_deterministic() {
        let s1 = Some(json!({"b": 2, "a": 1}));
        let s2 = Some(json!({"a": 1, "b": 2}));
        assert_eq!(cache_key("main", "tag", &s1), cache_key("main", "tag", &s2));
    }

    #[test]
    fn test_cache_key_distinguishes_inputs() {
        let state = Some(json!({"id": 1}));
        assert_ne!(
            cache_key("main", "tag", &state),
            cache_key("sidebar", "tag", &state)
        );
        assert_ne!(
            cache_key("main", "tag-a", &state),
            cache_key("main", "tag-b", &state)
        );
        assert_ne!(
            cache_key("main", "tag", &state),
            cache_key("main", "tag", &None)
        );
    }
}
