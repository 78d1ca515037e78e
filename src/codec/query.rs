//! 查询字符串构建与解析
//!
//! 对 URL 查询段的纯函数封装，保持键的插入顺序。

use url::form_urlencoded;

/// 将键值对构建为查询字符串（不含 `?` 前缀）
///
/// # Example
///
/// ```
/// use luopan::codec::query::build_query;
///
/// let q = build_query(&[("main".into(), "detail-panel".into())]);
/// assert_eq!(q, "main=detail-panel");
/// ```
pub fn build_query(pairs: &[(String, String)]) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}

/// 解析查询字符串（可带 `?` 前缀）为键值对列表
///
/// 非法片段被跳过而不是报错：初始加载时的 URL 不受本核心控制。
pub fn parse_query(query: &str) -> Vec<(String, String)> {
    let trimmed = query.strip_prefix('?').unwrap_or(query);
    form_urlencoded::parse(trimmed.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// 在键值对列表中查找第一个匹配键的值
pub fn query_get<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}
