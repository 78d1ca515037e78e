//! 状态编解码与路由工具
//!
//! 纯函数集合：URL 安全状态令牌、查询字符串构建/解析、
//! 状态清洗、结构相等性比较和缓存键生成。

pub mod keys;
pub mod query;
pub mod state;

pub use keys::{cache_key, intent_matches_route, route_equal, state_equal};
pub use query::{build_query, parse_query, query_get};
pub use state::{decode_state, encode_state, sanitize_route_state};
