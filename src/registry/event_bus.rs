//! 导航事件总线
//!
//! 出口、传送代理与宿主之间的松耦合通信通道。
//!
//! # 主要功能
//!
//! - **事件发布**: 支持异步和同步发布模式
//! - **事件订阅**: 支持按事件类型订阅（`nav.*` 通配符），可附加过滤器
//! - **订阅者隔离**: 单个订阅者 panic 不影响其他订阅者
//! - **超时控制**: 防止单个订阅者阻塞导航流程

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use super::event::{Event, EventFilter};
use crate::utils::{generate_id, NavError, Result};

/// 默认订阅者处理超时时间（秒）
const DEFAULT_HANDLER_TIMEOUT_SECS: u64 = 5;

/// 事件回调函数类型
///
/// 回调函数必须是线程安全的，可以在多个线程中并发调用。
pub type EventCallback = Arc<dyn Fn(Event) + Send + Sync>;

/// 内部订阅条目
#[derive(Clone)]
struct SubscriptionEntry {
    /// 订阅唯一标识
    subscription_id: String,

    /// 订阅者标识（区域名或宿主组件名）
    subscriber_id: String,

    /// 订阅的事件类型（支持通配符）
    event_type: String,

    /// 事件过滤器
    filter: Option<EventFilter>,

    /// 事件回调函数
    callback: EventCallback,
}

impl SubscriptionEntry {
    fn new(
        subscriber_id: impl Into<String>,
        event_type: impl Into<String>,
        filter: Option<EventFilter>,
        callback: EventCallback,
    ) -> Self {
        Self {
            subscription_id: generate_id(),
            subscriber_id: subscriber_id.into(),
            event_type: event_type.into(),
            filter,
            callback,
        }
    }

    /// 检查事件是否匹配此订阅
    fn matches(&self, event: &Event) -> bool {
        if !Self::matches_pattern(&self.event_type, &event.event_type) {
            return false;
        }
        if let Some(ref filter) = self.filter {
            return filter.matches(event);
        }
        true
    }

    /// 匹配模式（支持 * 通配符）
    fn matches_pattern(pattern: &str, value: &str) -> bool {
        if pattern == "*" {
            return true;
        }
        if pattern.ends_with(".*") {
            let prefix = &pattern[..pattern.len() - 2];
            return value.starts_with(prefix) && value.len() > prefix.len();
        }
        pattern == value
    }
}

/// 分发统计信息
#[derive(Debug, Clone, Default)]
pub struct DispatchStats {
    /// 总分发次数
    pub total_dispatched: u64,

    /// 成功分发次数
    pub successful: u64,

    /// 失败分发次数
    pub failed: u64,

    /// 超时次数
    pub timeouts: u64,

    /// 最后分发时间
    pub last_dispatch_at: Option<DateTime<Utc>>,
}

/// 事件总线
///
/// 提供发布-订阅模式的事件机制，使用 `Arc<RwLock>` 保证线程安全。
/// 导航核心内所有跨组件通知（挂载、错误、传送发现）都经由此总线。
#[derive(Clone)]
pub struct EventBus {
    /// 订阅列表：事件类型 -> 订阅条目列表
    subscriptions: Arc<RwLock<HashMap<String, Vec<SubscriptionEntry>>>>,

    /// 所有订阅的快速查找表：订阅 ID -> (事件类型, 订阅者 ID)
    subscription_index: Arc<RwLock<HashMap<String, (String, String)>>>,

    /// 分发统计
    stats: Arc<RwLock<DispatchStats>>,

    /// 订阅者处理超时时间
    handler_timeout: Duration,
}

impl EventBus {
    /// 创建新的事件总线
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(DEFAULT_HANDLER_TIMEOUT_SECS))
    }

    /// 使用自定义处理超时创建事件总线
    pub fn with_timeout(handler_timeout: Duration) -> Self {
        debug!("创建事件总线: timeout={:?}", handler_timeout);
        Self {
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            subscription_index: Arc::new(RwLock::new(HashMap::new())),
            stats: Arc::new(RwLock::new(DispatchStats::default())),
            handler_timeout,
        }
    }

    /// 订阅事件
    ///
    /// # 参数
    ///
    /// * `subscriber_id` - 订阅者标识
    /// * `event_type` - 要订阅的事件类型（支持通配符，如 `nav.*`）
    /// * `filter` - 可选的事件过滤器
    /// * `callback` - 事件回调函数
    ///
    /// # 返回
    ///
    /// 返回订阅 ID，用于后续取消订阅
    pub async fn subscribe(
        &self,
        subscriber_id: impl Into<String>,
        event_type: impl Into<String>,
        filter: Option<EventFilter>,
        callback: EventCallback,
    ) -> Result<String> {
        let subscriber_id = subscriber_id.into();
        let event_type = event_type.into();

        let entry =
            SubscriptionEntry::new(subscriber_id.clone(), event_type.clone(), filter, callback);
        let subscription_id = entry.subscription_id.clone();

        {
            let mut subscriptions = self.subscriptions.write().await;
            subscriptions
                .entry(event_type.clone())
                .or_insert_with(Vec::new)
                .push(entry);
        }

        {
            let mut index = self.subscription_index.write().await;
            index.insert(subscription_id.clone(), (event_type.clone(), subscriber_id.clone()));
        }

        info!(
            subscription_id = %subscription_id,
            subscriber_id = %subscriber_id,
            event_type = %event_type,
            "事件订阅成功"
        );

        Ok(subscription_id)
    }

    /// 取消订阅
    ///
    /// # 错误
    ///
    /// 如果订阅不存在，返回 `NavError::SubscriptionNotFound`
    pub async fn unsubscribe(&self, subscription_id: &str) -> Result<()> {
        let (event_type, subscriber_id) = {
            let index = self.subscription_index.read().await;
            index
                .get(subscription_id)
                .cloned()
                .ok_or_else(|| NavError::SubscriptionNotFound(subscription_id.to_string()))?
        };

        {
            let mut subscriptions = self.subscriptions.write().await;
            if let Some(subs) = subscriptions.get_mut(&event_type) {
                subs.retain(|s| s.subscription_id != subscription_id);
                if subs.is_empty() {
                    subscriptions.remove(&event_type);
                }
            }
        }

        {
            let mut index = self.subscription_index.write().await;
            index.remove(subscription_id);
        }

        debug!(
            subscription_id = %subscription_id,
            subscriber_id = %subscriber_id,
            event_type = %event_type,
            "取消订阅成功"
        );

        Ok(())
    }

    /// 取消某个订阅者的所有订阅
    ///
    /// 出口释放区域时调用，返回取消的订阅数量。
    pub async fn unsubscribe_all(&self, subscriber_id: &str) -> Result<usize> {
        let subscription_ids_to_remove: Vec<String> = {
            let index = self.subscription_index.read().await;
            index
                .iter()
                .filter(|(_, (_, sub_id))| sub_id == subscriber_id)
                .map(|(id, _)| id.clone())
                .collect()
        };

        let mut removed_count = 0;
        for subscription_id in subscription_ids_to_remove {
            if self.unsubscribe(&subscription_id).await.is_ok() {
                removed_count += 1;
            }
        }

        debug!(
            subscriber_id = %subscriber_id,
            removed_count = removed_count,
            "取消订阅者所有订阅"
        );

        Ok(removed_count)
    }

    /// 异步发布事件
    ///
    /// 事件将被异步分发给所有匹配的订阅者，不等待处理完成。
    /// 返回匹配的订阅者数量。
    pub async fn publish(&self, event: Event) -> Result<usize> {
        trace!(
            event_id = %event.event_id,
            event_type = %event.event_type,
            sender = %event.sender,
            "发布事件"
        );

        let matching = self.find_matching_subscriptions(&event).await;
        if matching.is_empty() {
            return Ok(0);
        }

        let subscriber_count = matching.len();
        self.dispatch_concurrent(event, matching).await;
        Ok(subscriber_count)
    }

    /// 同步发布事件
    ///
    /// 等待所有匹配的订阅者处理完成后返回 `(成功数, 失败数, 超时数)`。
    pub async fn publish_sync(&self, event: Event) -> Result<(usize, usize, usize)> {
        debug!(
            event_id = %event.event_id,
            event_type = %event.event_type,
            sender = %event.sender,
            "同步发布事件"
        );

        let matching = self.find_matching_subscriptions(&event).await;
        if matching.is_empty() {
            return Ok((0, 0, 0));
        }

        let results = self.dispatch_with_results(event, matching).await;

        let successful = results
            .iter()
            .filter(|r| matches!(r, DispatchResult::Success))
            .count();
        let failed = results
            .iter()
            .filter(|r| matches!(r, DispatchResult::Failed(_)))
            .count();
        let timeouts = results
            .iter()
            .filter(|r| matches!(r, DispatchResult::Timeout))
            .count();

        {
            let mut stats = self.stats.write().await;
            stats.total_dispatched += results.len() as u64;
            stats.successful += successful as u64;
            stats.failed += failed as u64;
            stats.timeouts += timeouts as u64;
            stats.last_dispatch_at = Some(Utc::now());
        }

        Ok((successful, failed, timeouts))
    }

    /// 查找所有匹配的订阅
    async fn find_matching_subscriptions(&self, event: &Event) -> Vec<SubscriptionEntry> {
        let subscriptions = self.subscriptions.read().await;
        let mut matching = Vec::new();

        for (pattern, subs) in subscriptions.iter() {
            if pattern == "*" {
                continue;
            }
            if SubscriptionEntry::matches_pattern(pattern, &event.event_type) {
                for sub in subs {
                    if sub.matches(event) {
                        matching.push(sub.clone());
                    }
                }
            }
        }

        if let Some(wildcard_subs) = subscriptions.get("*") {
            for sub in wildcard_subs {
                if sub.matches(event) {
                    matching.push(sub.clone());
                }
            }
        }

        matching
    }

    /// 并发分发事件（不等待结果）
    async fn dispatch_concurrent(&self, event: Event, subscriptions: Vec<SubscriptionEntry>) {
        for sub in subscriptions {
            let event_clone = event.clone();
            let callback = sub.callback.clone();
            let timeout_duration = self.handler_timeout;
            let subscription_id = sub.subscription_id.clone();
            let subscriber_id = sub.subscriber_id.clone();
            let stats = self.stats.clone();

            tokio::spawn(async move {
                let result =
                    Self::invoke_callback_with_timeout(callback, event_clone, timeout_duration)
                        .await;

                let mut stats = stats.write().await;
                stats.total_dispatched += 1;
                stats.last_dispatch_at = Some(Utc::now());

                match result {
                    DispatchResult::Success => {
                        stats.successful += 1;
                    }
                    DispatchResult::Failed(e) => {
                        stats.failed += 1;
                        warn!(
                            subscription_id = %subscription_id,
                            subscriber_id = %subscriber_id,
                            error = %e,
                            "事件处理失败"
                        );
                    }
                    DispatchResult::Timeout => {
                        stats.timeouts += 1;
                        warn!(
                            subscription_id = %subscription_id,
                            subscriber_id = %subscriber_id,
                            "事件处理超时"
                        );
                    }
                }
            });
        }
    }

    /// 并发分发事件并等待结果
    async fn dispatch_with_results(
        &self,
        event: Event,
        subscriptions: Vec<SubscriptionEntry>,
    ) -> Vec<DispatchResult> {
        let timeout_duration = self.handler_timeout;

        let tasks: Vec<_> = subscriptions
            .into_iter()
            .map(|sub| {
                let event_clone = event.clone();
                let callback = sub.callback.clone();
                let subscription_id = sub.subscription_id.clone();
                let subscriber_id = sub.subscriber_id.clone();

                tokio::spawn(async move {
                    let result =
                        Self::invoke_callback_with_timeout(callback, event_clone, timeout_duration)
                            .await;

                    if let DispatchResult::Failed(ref e) = result {
                        warn!(
                            subscription_id = %subscription_id,
                            subscriber_id = %subscriber_id,
                            error = %e,
                            "事件处理失败"
                        );
                    }
                    result
                })
            })
            .collect();

        let results = futures::future::join_all(tasks).await;

        results
            .into_iter()
            .map(|r| match r {
                Ok(result) => result,
                Err(e) => DispatchResult::Failed(format!("任务执行失败: {}", e)),
            })
            .collect()
    }

    /// 带超时的回调调用
    ///
    /// 回调是同步的，用 `spawn_blocking` 在专用线程中执行并用 `timeout`
    /// 包装。超时后回调可能仍在运行，但不再等待其结果。
    async fn invoke_callback_with_timeout(
        callback: EventCallback,
        event: Event,
        timeout_duration: Duration,
    ) -> DispatchResult {
        let result = timeout(timeout_duration, async move {
            tokio::task::spawn_blocking(move || {
                std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
                    callback(event);
                }))
            })
            .await
        })
        .await;

        match result {
            Ok(Ok(Ok(()))) => DispatchResult::Success,
            Ok(Ok(Err(_))) => DispatchResult::Failed("回调函数 panic".to_string()),
            Ok(Err(e)) => DispatchResult::Failed(format!("任务执行失败: {}", e)),
            Err(_) => DispatchResult::Timeout,
        }
    }

    /// 获取订阅数量
    pub async fn subscription_count(&self) -> usize {
        self.subscription_index.read().await.len()
    }

    /// 检查是否有订阅者订阅了指定的事件类型
    pub async fn has_subscribers(&self, event_type: &str) -> bool {
        let subscriptions = self.subscriptions.read().await;

        for (pattern, subs) in subscriptions.iter() {
            if !subs.is_empty() && SubscriptionEntry::matches_pattern(pattern, event_type) {
                return true;
            }
        }
        false
    }

    /// 获取分发统计信息
    pub async fn stats(&self) -> DispatchStats {
        self.stats.read().await.clone()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// 分发结果
#[derive(Debug, Clone)]
enum DispatchResult {
    Success,
    Failed(String),
    Timeout,
}
