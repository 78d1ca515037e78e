//! 十位 62 进制 ID 生成器
//!
//! 为组件实例、订阅条目等生成短标识符。
//! ID 格式：10 位 62 进制字符串（0-9, a-z, A-Z）

use rand::Rng;
use std::time::{SystemTime, UNIX_EPOCH};

/// 62 进制字符集
const BASE62_CHARS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// ID 长度
const ID_LENGTH: usize = 10;

/// 生成 10 位 62 进制 ID
///
/// 使用时间戳 + 随机数组合，确保唯一性
///
/// # Example
///
/// ```
/// use luopan::utils::id::generate_id;
///
/// let id = generate_id();
/// assert_eq!(id.len(), 10);
/// ```
pub fn generate_id() -> String {
    let mut rng = rand::thread_rng();

    // 获取当前时间戳（毫秒）
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;

    // 生成随机数
    let random: u64 = rng.gen();

    // 组合时间戳和随机数
    let mut value = timestamp ^ random;

    // 转换为 62 进制
    let mut result = Vec::with_capacity(ID_LENGTH);
    for _ in 0..ID_LENGTH {
        let index = (value % 62) as usize;
        result.push(BASE62_CHARS[index]);
        value /= 62;
    }

    result.reverse();
    String::from_utf8(result).unwrap_or_default()
}

/// 验证 ID 格式是否有效
pub fn is_valid_id(id: &str) -> bool {
    id.len() == ID_LENGTH && id.chars().all(|c| c.is_ascii_alphanumeric())
}

/// 生成 UUID v4 格式的 ID
///
/// 用于导航意图 ID、传送请求 ID 等需要全局唯一性的场景
pub fn generate_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_id_length() {
        let id = generate_id();
        assert_eq!(id.len(), ID_LENGTH);
    }

    #[test]
    fn test_generate_id_charset() {
        let id = generate_id();
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_generate_id_uniqueness() {
        let mut ids = HashSet::new();
        for _ in 0..1000 {
            let id = generate_id();
            assert!(ids.insert(id), "ID collision detected");
        }
    }

    #[test]
    fn test_is_valid_id() {
        assert!(is_valid_id("a1B2c3D4e5"));
        assert!(!is_valid_id("short"));
        assert!(!is_valid_id("a1B2c3-4e5"));
        assert!(!is_valid_id(""));
    }

    #[test]
    fn test_generate_uuid() {
        let uuid = generate_uuid();
        assert_eq!(uuid.len(), 36);
        assert!(uuid.contains('-'));
    }
}
