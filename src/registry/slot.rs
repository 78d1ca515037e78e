//! 区域单槽信箱
//!
//! 每个区域持有一条独立的单槽通道：
//! - 槽内最多保留一条未消费的导航意图，后写覆盖先写
//! - 出口晚于意图到达时可以回放槽内意图（迟到订阅者不丢失最后一次导航）
//! - 每次写入递增单调序号，出口以此丢弃过期的异步解析结果

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{watch, Mutex, Notify};

use super::intent::{ActiveRoute, NavTarget, NavigationIntent};
use crate::codec::keys::state_equal;
use crate::component::ComponentRef;

/// 区域单槽信箱
pub struct AreaSlot {
    /// 槽位：最多一条未消费意图及其序号
    slot: Mutex<Option<(u64, NavigationIntent)>>,

    /// 写入通知
    notify: Notify,

    /// 单调递增的写入序号
    seq: AtomicU64,

    /// 当前活动路由流（区域级状态广播）
    state_tx: watch::Sender<Option<ActiveRoute>>,

    /// 覆盖丢弃计数
    overwrites: AtomicU64,

    /// 结构性重复丢弃计数
    duplicate_drops: AtomicU64,
}

impl AreaSlot {
    /// 创建空槽
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(None);
        Self {
            slot: Mutex::new(None),
            notify: Notify::new(),
            seq: AtomicU64::new(0),
            state_tx,
            overwrites: AtomicU64::new(0),
            duplicate_drops: AtomicU64::new(0),
        }
    }

    /// 写入一条意图，返回其序号
    ///
    /// 槽内已有未消费意图时直接覆盖（只有最新导航有意义）；
    /// 新意图与槽内意图结构相同时丢弃新意图，返回 `None`。
    pub async fn publish(&self, intent: NavigationIntent) -> Option<u64> {
        let mut slot = self.slot.lock().await;

        if let Some((seq, pending)) = slot.as_ref() {
            if same_payload(pending, &intent) {
                self.duplicate_drops.fetch_add(1, Ordering::Relaxed);
                return Some(*seq);
            }
            self.overwrites.fetch_add(1, Ordering::Relaxed);
        }

        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        *slot = Some((seq, intent));
        drop(slot);

        self.notify.notify_one();
        Some(seq)
    }

    /// 取出槽内意图，槽空则等待下一次写入
    ///
    /// 消费方恒为该区域的出口任务（单消费者）。
    pub async fn recv(&self) -> (u64, NavigationIntent) {
        loop {
            {
                let mut slot = self.slot.lock().await;
                if let Some(entry) = slot.take() {
                    return entry;
                }
            }
            self.notify.notified().await;
        }
    }

    /// 非阻塞取出槽内意图
    pub async fn try_recv(&self) -> Option<(u64, NavigationIntent)> {
        self.slot.lock().await.take()
    }

    /// 槽是否为空
    pub async fn is_empty(&self) -> bool {
        self.slot.lock().await.is_none()
    }

    /// 最新写入序号
    ///
    /// 出口在异步解析完成后与此值比对，不一致则丢弃解析结果。
    pub fn latest_seq(&self) -> u64 {
        self.seq.load(Ordering::SeqCst)
    }

    /// 广播该区域的新活动路由
    ///
    /// 无订阅者时也要留存当前值，供后续快照与迟到订阅者读取。
    pub fn publish_state(&self, route: Option<ActiveRoute>) {
        self.state_tx.send_replace(route);
    }

    /// 订阅该区域的活动路由流
    ///
    /// 新订阅者立即观察到当前值（含 `None`）。
    pub fn subscribe_state(&self) -> watch::Receiver<Option<ActiveRoute>> {
        self.state_tx.subscribe()
    }

    /// 当前活动路由的快照
    pub fn current_state(&self) -> Option<ActiveRoute> {
        self.state_tx.borrow().clone()
    }

    /// 覆盖丢弃计数
    pub fn overwrite_count(&self) -> u64 {
        self.overwrites.load(Ordering::Relaxed)
    }

    /// 结构性重复丢弃计数
    pub fn duplicate_drop_count(&self) -> u64 {
        self.duplicate_drops.load(Ordering::Relaxed)
    }
}

impl Default for AreaSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// 两条意图是否携带结构相同的载荷
///
/// 仅当目标可比较（标签或声明键）且状态结构相等时判定为重复；
/// 构造器、实例、工厂等不可比较的引用一律视为不同。
fn same_payload(a: &NavigationIntent, b: &NavigationIntent) -> bool {
    let target_eq = match (&a.target, &b.target) {
        (NavTarget::Route(x), NavTarget::Route(y)) => x == y,
        (NavTarget::Component(x), NavTarget::Component(y)) => match (x, y) {
            (ComponentRef::Tag(x), ComponentRef::Tag(y)) => x == y,
            (ComponentRef::Instance(x), ComponentRef::Instance(y)) => x.same_instance(y),
            _ => false,
        },
        _ => false,
    };
    target_eq && state_equal(&a.state, &b.state)
}
