//! 位置抽象与内存历史栈
//!
//! 把宿主的地址栏抽象为 `LocationDriver` 特征，核心不直接接触任何
//! 浏览器 API。`MemoryHistory` 是内建实现，用于测试与无宿主运行。

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use tracing::debug;

use crate::codec::{build_query, parse_query};
use crate::utils::Result;

/// 一个位置：路径加查询参数
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Location {
    /// 路径（以 `/` 开头）
    pub path: String,

    /// 查询参数（保持插入顺序）
    pub query: Vec<(String, String)>,
}

impl Location {
    /// 创建位置
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: Vec::new(),
        }
    }

    /// 解析 `/path?key=value` 形式的字符串
    ///
    /// 无法解析的查询片段被跳过，路径缺省为 `/`。
    pub fn parse(raw: &str) -> Self {
        let (path, query_str) = match raw.split_once('?') {
            Some((p, q)) => (p, q),
            None => (raw, ""),
        };
        let path = if path.is_empty() {
            "/".to_string()
        } else {
            path.to_string()
        };
        Self {
            path,
            query: parse_query(query_str),
        }
    }

    /// 添加查询参数
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// 取查询参数值
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// 路径的第一个段（去掉前导 `/`）
    pub fn first_segment(&self) -> Option<&str> {
        let trimmed = self.path.trim_start_matches('/');
        let segment = trimmed.split('/').next().unwrap_or("");
        if segment.is_empty() {
            None
        } else {
            Some(segment)
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)?;
        if !self.query.is_empty() {
            write!(f, "?{}", build_query(&self.query))?;
        }
        Ok(())
    }
}

/// 位置驱动
///
/// 宿主地址栏的唯一接口。核心内只有历史桥持有并写入驱动，
/// 出口与注册表从不直接接触它。
#[async_trait]
pub trait LocationDriver: Send + Sync {
    /// 当前位置
    async fn current(&self) -> Location;

    /// 新建历史条目
    async fn push(&self, location: Location) -> Result<()>;

    /// 覆盖当前历史条目
    async fn replace(&self, location: Location) -> Result<()>;

    /// 历史回退
    async fn back(&self) -> Result<()>;

    /// 历史前进
    async fn forward(&self) -> Result<()>;

    /// 订阅回退/前进信号
    ///
    /// 每次 back/forward 都发送被恢复的位置，即使与上一次相同。
    fn subscribe_pop(&self) -> watch::Receiver<Option<Location>>;
}

/// 内存历史栈
///
/// 栈加游标：push 截断游标之后的前进尾巴，back/forward 移动游标
/// 并触发 pop 信号。
pub struct MemoryHistory {
    /// (历史栈, 游标) —— 游标恒指向当前条目
    entries: Mutex<(Vec<Location>, usize)>,

    /// pop 信号
    pop_tx: watch::Sender<Option<Location>>,
}

impl MemoryHistory {
    /// 以根位置 `/` 初始化
    pub fn new() -> Self {
        Self::with_initial(Location::new("/"))
    }

    /// 以指定位置初始化
    pub fn with_initial(initial: Location) -> Self {
        let (pop_tx, _) = watch::channel(None);
        Self {
            entries: Mutex::new((vec![initial], 0)),
            pop_tx,
        }
    }

    /// 历史条目数量
    pub async fn len(&self) -> usize {
        self.entries.lock().await.0.len()
    }

    /// 当前游标位置
    pub async fn cursor(&self) -> usize {
        self.entries.lock().await.1
    }
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocationDriver for MemoryHistory {
    async fn current(&self) -> Location {
        let guard = self.entries.lock().await;
        guard.0[guard.1].clone()
    }

    async fn push(&self, location: Location) -> Result<()> {
        let mut guard = self.entries.lock().await;
        let cursor = guard.1;
        guard.0.truncate(cursor + 1);
        guard.0.push(location.clone());
        guard.1 = guard.0.len() - 1;
        debug!(location = %location, cursor = guard.1, "历史 push");
        Ok(())
    }

    async fn replace(&self, location: Location) -> Result<()> {
        let mut guard = self.entries.lock().await;
        let cursor = guard.1;
        guard.0[cursor] = location.clone();
        debug!(location = %location, cursor = cursor, "历史 replace");
        Ok(())
    }

    async fn back(&self) -> Result<()> {
        let restored = {
            let mut guard = self.entries.lock().await;
            if guard.1 == 0 {
                return Ok(());
            }
            guard.1 -= 1;
            guard.0[guard.1].clone()
        };
        debug!(location = %restored, "历史 back");
        let _ = self.pop_tx.send(Some(restored));
        Ok(())
    }

    async fn forward(&self) -> Result<()> {
        let restored = {
            let mut guard = self.entries.lock().await;
            if guard.1 + 1 >= guard.0.len() {
                return Ok(());
            }
            guard.1 += 1;
            guard.0[guard.1].clone()
        };
        debug!(location = %restored, "历史 forward");
        let _ = self.pop_tx.send(Some(restored));
        Ok(())
    }

    fn subscribe_pop(&self) -> watch::Receiver<Option<Location>> {
        self.pop_tx.subscribe()
    }
}

/// 共享驱动句柄类型
pub type DriverHandle = Arc<dyn LocationDriver>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_parse_roundtrip() {
        let loc = Location::parse("/detail?sidebar=nav&sidebar.s=abc");
        assert_eq!(loc.path, "/detail");
        assert_eq!(loc.param("sidebar"), Some("nav"));
        assert_eq!(loc.param("sidebar.s"), Some("abc"));
        assert_eq!(loc.to_string(), "/detail?sidebar=nav&sidebar.s=abc");
    }

    #[test]
    fn test_location_first_segment() {
        assert_eq!(Location::parse("/detail/sub").first_segment(), Some("detail"));
        assert_eq!(Location::parse("/").first_segment(), None);
        assert_eq!(Location::parse("").first_segment(), None);
    }

    #[tokio::test]
    async fn test_push_and_current() {
        let history = MemoryHistory::new();
        history.push(Location::parse("/a")).await.unwrap();
        history.push(Location::parse("/b")).await.unwrap();

        assert_eq!(history.current().await.path, "/b");
        assert_eq!(history.len().await, 3);
    }

    #[tokio::test]
    async fn test_replace_keeps_length() {
        let history = MemoryHistory::new();
        history.push(Location::parse("/a")).await.unwrap();
        history.replace(Location::parse("/b")).await.unwrap();

        assert_eq!(history.current().await.path, "/b");
        assert_eq!(history.len().await, 2);
    }

    #[tokio::test]
    async fn test_back_fires_pop_signal() {
        let history = MemoryHistory::new();
        let mut pop_rx = history.subscribe_pop();

        history.push(Location::parse("/a")).await.unwrap();
        history.back().await.unwrap();

        pop_rx.changed().await.unwrap();
        assert_eq!(pop_rx.borrow().as_ref().unwrap().path, "/");
        assert_eq!(history.current().await.path, "/");
    }

    #[tokio::test]
    async fn test_push_truncates_forward_tail() {
        let history = MemoryHistory::new();
        history.push(Location::parse("/a")).await.unwrap();
        history.push(Location::parse("/b")).await.unwrap();
        history.back().await.unwrap();
        history.push(Location::parse("/c")).await.unwrap();

        // /b 被截断，forward 无处可去
        history.forward().await.unwrap();
        assert_eq!(history.current().await.path, "/c");
        assert_eq!(history.len().await, 3);
    }

    #[tokio::test]
    async fn test_back_at_root_is_noop() {
        let history = MemoryHistory::new();
        history.back().await.unwrap();
        assert_eq!(history.current().await.path, "/");
    }
}
