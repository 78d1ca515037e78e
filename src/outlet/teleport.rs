//! 传送协议
//!
//! 让存活的组件实例跨区域移动而不丢失内部状态。没有中央实例
//! 登记表：发现走事件总线的请求/应答主题，实例本体经 `oneshot`
//! 通道点对点移交。
//!
//! - `teleport.request` 携带 `{tag, request_id}`
//! - `teleport.response` 携带 `{request_id, instance_id}`（仅观测用）
//! - 首个应答者获胜，超时不是错误（回落到全新构造）

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::component::ComponentInstance;
use crate::registry::{nav_events, Event, EventBus, RegistryStats};
use crate::utils::Result;

/// 默认发现等待窗口（毫秒）
pub const DEFAULT_DISCOVER_TIMEOUT_MS: u64 = 50;

/// 待决发现请求表：请求 ID -> 实例接收端
type PendingMap = Arc<Mutex<HashMap<String, oneshot::Sender<ComponentInstance>>>>;

/// 传送代理
#[derive(Clone)]
pub struct TeleportBroker {
    /// 事件总线
    bus: EventBus,

    /// 待决发现请求
    pending: PendingMap,

    /// 注册表统计（记录传送命中）
    stats: Arc<RegistryStats>,
}

impl TeleportBroker {
    /// 创建传送代理
    pub fn new(bus: EventBus, stats: Arc<RegistryStats>) -> Self {
        Self {
            bus,
            pending: Arc::new(Mutex::new(HashMap::new())),
            stats,
        }
    }

    /// 发现存活实例
    ///
    /// 发布发现请求并在窗口内等待首个应答。窗口耗尽返回 `None`，
    /// 调用方自行走全新构造。
    pub async fn discover(
        &self,
        tag: &str,
        wait: Duration,
    ) -> Result<Option<ComponentInstance>> {
        let request_id = crate::utils::generate_id();
        let (tx, rx) = oneshot::channel();

        {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.insert(request_id.clone(), tx);
        }

        trace!(tag = %tag, request_id = %request_id, "发布传送发现请求");
        self.bus
            .publish(Event::new(
                nav_events::TELEPORT_REQUEST,
                tag,
                json!({"tag": tag, "request_id": request_id}),
            ))
            .await?;

        match timeout(wait, rx).await {
            Ok(Ok(instance)) => {
                self.stats
                    .teleport_hits
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                debug!(
                    tag = %tag,
                    instance_id = %instance.instance_id(),
                    "传送命中，复用存活实例"
                );
                Ok(Some(instance))
            }
            _ => {
                let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
                pending.remove(&request_id);
                trace!(tag = %tag, "传送窗口耗尽，走全新构造");
                Ok(None)
            }
        }
    }

    /// 以默认窗口发现存活实例
    pub async fn discover_default(&self, tag: &str) -> Result<Option<ComponentInstance>> {
        self.discover(tag, Duration::from_millis(DEFAULT_DISCOVER_TIMEOUT_MS))
            .await
    }

    /// 停放实例作为应答者
    ///
    /// 停放的应答者对匹配标签的发现请求应答恰好一次，移交同一个
    /// `Arc`（身份与内部状态保持）。未被领取前实例一直可用；请求方
    /// 已超时放弃时实例放回，等待下一个请求。返回订阅 ID。
    pub async fn park(&self, instance: ComponentInstance) -> Result<String> {
        let tag = instance.tag().to_string();
        let slot = Arc::new(Mutex::new(Some(instance)));
        let pending = Arc::clone(&self.pending);
        let bus = self.bus.clone();

        debug!(tag = %tag, "停放实例等待传送");

        let responder_tag = tag.clone();
        self.bus
            .subscribe(
                format!("teleport:{}", tag),
                nav_events::TELEPORT_REQUEST,
                None,
                Arc::new(move |event: Event| {
                    let Some(req_tag) = event.data.get("tag").and_then(|v| v.as_str()) else {
                        return;
                    };
                    if req_tag != responder_tag {
                        return;
                    }
                    let Some(request_id) =
                        event.data.get("request_id").and_then(|v| v.as_str())
                    else {
                        return;
                    };

                    // 应答恰好一次；晚到的请求留给其他应答者
                    let Some(instance) = slot
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .take()
                    else {
                        return;
                    };

                    let sender = pending
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .remove(request_id);
                    let Some(sender) = sender else {
                        // 请求已被别的应答者抢先，实例放回
                        *slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(instance);
                        return;
                    };

                    let instance_id = instance.instance_id().to_string();
                    if let Err(returned) = sender.send(instance) {
                        // 请求方已超时放弃，实例放回
                        warn!(request_id = %request_id, "传送应答晚于请求方超时");
                        *slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(returned);
                        return;
                    }

                    let bus = bus.clone();
                    let request_id = request_id.to_string();
                    let responder_tag = responder_tag.clone();
                    tokio::spawn(async move {
                        let _ = bus
                            .publish(Event::new(
                                nav_events::TELEPORT_RESPONSE,
                                responder_tag,
                                json!({
                                    "request_id": request_id,
                                    "instance_id": instance_id,
                                }),
                            ))
                            .await;
                    });
                }),
            )
            .await
    }

    /// 撤销停放
    pub async fn unpark(&self, subscription_id: &str) -> Result<()> {
        self.bus.unsubscribe(subscription_id).await
    }
}
