//! 路由状态编解码
//!
//! 在任意状态对象与 URL 安全令牌之间进行可逆转换。
//! 不可表示的值（非有限浮点数等）会被逐键丢弃，而不是悄悄损坏。

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{Map, Value};

use crate::utils::{NavError, Result};

/// 将状态对象编码为 URL 安全令牌
///
/// 编码流程：剔除不可表示的值 → 规范化 JSON → base64（URL 安全、无填充）。
/// 空状态（Null、空对象）返回 `None`，表示 URL 中无需携带状态。
///
/// # Example
///
/// ```
/// use luopan::codec::state::{encode_state, decode_state};
/// use serde_json::json;
///
/// let token = encode_state(&json!({"id": 42})).unwrap();
/// let decoded = decode_state(&token).unwrap();
/// assert_eq!(decoded, json!({"id": 42}));
/// ```
pub fn encode_state(state: &Value) -> Option<String> {
    let cleaned = drop_unrepresentable(state)?;
    if matches!(cleaned, Value::Object(ref m) if m.is_empty()) {
        return None;
    }

    // Map 内部按键有序，serde_json 输出即为规范形式
    let json = serde_json::to_string(&cleaned).ok()?;
    Some(URL_SAFE_NO_PAD.encode(json.as_bytes()))
}

/// 将 URL 安全令牌解码回状态对象
pub fn decode_state(token: &str) -> Result<Value> {
    let bytes = URL_SAFE_NO_PAD
        .decode(token.as_bytes())
        .map_err(|e| NavError::InvalidStateToken(format!("base64 解码失败: {}", e)))?;
    let json = String::from_utf8(bytes)
        .map_err(|e| NavError::InvalidStateToken(format!("非 UTF-8 内容: {}", e)))?;
    serde_json::from_str(&json)
        .map_err(|e| NavError::InvalidStateToken(format!("JSON 解析失败: {}", e)))
}

/// 剔除不可表示的值
///
/// 返回 None 表示该值整体不可表示（调用方应丢弃对应键）。
fn drop_unrepresentable(value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Number(n) => {
            // serde_json 的 Number 不会携带 NaN/Inf，但 from_f64 构造失败的
            // 浮点数以 Null 形式出现，这里统一拦截
            if n.as_f64().map(|f| f.is_finite()).unwrap_or(true) {
                Some(Value::Number(n.clone()))
            } else {
                None
            }
        }
        Value::Object(map) => {
            let mut out = Map::new();
            for (k, v) in map {
                if let Some(cleaned) = drop_unrepresentable(v) {
                    out.insert(k.clone(), cleaned);
                }
            }
            Some(Value::Object(out))
        }
        Value::Array(items) => {
            let cleaned: Vec<Value> = items.iter().filter_map(drop_unrepresentable).collect();
            Some(Value::Array(cleaned))
        }
        other => Some(other.clone()),
    }
}

/// 清洗路由状态
///
/// 返回删除了指定键的浅拷贝，用于在状态进入 URL 前剥离敏感字段，
/// 避免密钥泄漏到浏览器历史中。非对象状态原样返回。
///
/// # Example
///
/// ```
/// use luopan::codec::state::sanitize_route_state;
/// use serde_json::json;
///
/// let state = json!({"id": 42, "token": "secret"});
/// let cleaned = sanitize_route_state(&state, &["token"]);
/// assert_eq!(cleaned, json!({"id": 42}));
/// ```
pub fn sanitize_route_state(state: &Value, keys_to_remove: &[&str]) -> Value {
    match state {
        Value::Object(map) => {
            let mut out = map.clone();
            for key in keys_to_remove {
                out.remove(*key);
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}
