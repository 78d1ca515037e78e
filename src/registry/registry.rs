//! 路由注册表
//!
//! 导航核心的中枢：持有所有区域的单槽信箱，接收导航意图并投递到
//! 对应区域，维护区域与出口的绑定关系，聚合全局运行统计。
//!
//! # 主要功能
//!
//! - **意图投递**: `push` 按区域名路由到单槽信箱，区域间完全独立
//! - **历史回退**: `pop` 在历史模式下委托给历史桥
//! - **状态订阅**: 每个区域一条 `watch` 流，迟到订阅者立即收到当前值
//! - **绑定管理**: 每个区域最多一个活跃出口

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::event_bus::EventBus;
use super::intent::{ActiveRoute, HistoryStrategy, NavigationIntent};
use super::slot::AreaSlot;
use crate::history::HistoryBridge;
use crate::utils::{NavError, Result};

/// 注册表运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterMode {
    /// 导航不写入位置（无历史桥）
    Silent,
    /// 导航按策略镜像到位置
    History,
}

/// 注册表运行统计
#[derive(Debug, Default)]
pub struct RegistryStats {
    /// 投递的意图总数
    pub pushes: AtomicU64,

    /// 结构性重复丢弃数
    pub duplicate_drops: AtomicU64,

    /// 过期解析结果丢弃数
    pub stale_drops: AtomicU64,

    /// 解析失败数
    pub resolution_errors: AtomicU64,

    /// 守卫拒绝数
    pub guard_rejections: AtomicU64,

    /// 传送命中数（复用已存活实例的挂载）
    pub teleport_hits: AtomicU64,
}

/// 统计快照
#[derive(Debug, Clone, Default)]
pub struct StatsSnapshot {
    /// 投递的意图总数
    pub pushes: u64,
    /// 结构性重复丢弃数
    pub duplicate_drops: u64,
    /// 过期解析结果丢弃数
    pub stale_drops: u64,
    /// 解析失败数
    pub resolution_errors: u64,
    /// 守卫拒绝数
    pub guard_rejections: u64,
    /// 传送命中数
    pub teleport_hits: u64,
}

impl RegistryStats {
    /// 生成当前快照
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            pushes: self.pushes.load(Ordering::Relaxed),
            duplicate_drops: self.duplicate_drops.load(Ordering::Relaxed),
            stale_drops: self.stale_drops.load(Ordering::Relaxed),
            resolution_errors: self.resolution_errors.load(Ordering::Relaxed),
            guard_rejections: self.guard_rejections.load(Ordering::Relaxed),
            teleport_hits: self.teleport_hits.load(Ordering::Relaxed),
        }
    }
}

/// 路由注册表
pub struct RouteRegistry {
    /// 区域名 -> 单槽信箱（按需创建，从不销毁）
    slots: std::sync::RwLock<HashMap<String, Arc<AreaSlot>>>,

    /// 已被出口绑定的区域
    bound_areas: std::sync::RwLock<HashSet<String>>,

    /// 事件总线
    bus: EventBus,

    /// 运行模式
    mode: RouterMode,

    /// 历史桥（历史模式下由核心装配时注入）
    bridge: std::sync::RwLock<Option<Arc<HistoryBridge>>>,

    /// 运行统计
    stats: Arc<RegistryStats>,
}

impl RouteRegistry {
    /// 创建注册表
    pub fn new(mode: RouterMode, bus: EventBus) -> Self {
        info!("创建路由注册表: mode={:?}", mode);
        Self {
            slots: std::sync::RwLock::new(HashMap::new()),
            bound_areas: std::sync::RwLock::new(HashSet::new()),
            bus,
            mode,
            bridge: std::sync::RwLock::new(None),
            stats: Arc::new(RegistryStats::default()),
        }
    }

    /// 运行模式
    pub fn mode(&self) -> RouterMode {
        self.mode
    }

    /// 注入历史桥
    ///
    /// 仅历史模式下有意义，由核心在装配阶段调用一次。
    pub fn set_history_bridge(&self, bridge: Arc<HistoryBridge>) {
        *self.bridge.write().unwrap_or_else(|e| e.into_inner()) = Some(bridge);
    }

    /// 当前装配的历史桥
    pub fn history_bridge(&self) -> Option<Arc<HistoryBridge>> {
        self.bridge
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// 获取或创建区域的单槽信箱
    pub fn slot(&self, area: &str) -> Arc<AreaSlot> {
        {
            let slots = self.slots.read().unwrap_or_else(|e| e.into_inner());
            if let Some(slot) = slots.get(area) {
                return Arc::clone(slot);
            }
        }
        let mut slots = self.slots.write().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            slots
                .entry(area.to_string())
                .or_insert_with(|| Arc::new(AreaSlot::new())),
        )
    }

    /// 投递导航意图
    ///
    /// 按区域名路由到该区域的单槽信箱。区域没有出口时意图保留在槽内，
    /// 等待出口订阅后回放。历史模式下未指定策略默认为 Push。
    pub async fn push(&self, mut intent: NavigationIntent) -> Result<u64> {
        if intent.history_strategy.is_none() && self.mode == RouterMode::History {
            intent.history_strategy = Some(HistoryStrategy::Push);
        }

        let area = intent.area.clone();
        let slot = self.slot(&area);

        debug!(
            intent_id = %intent.intent_id,
            area = %area,
            "投递导航意图"
        );

        let before = slot.duplicate_drop_count();
        let seq = slot.publish(intent).await.unwrap_or(0);
        if slot.duplicate_drop_count() > before {
            self.stats.duplicate_drops.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.pushes.fetch_add(1, Ordering::Relaxed);
        }

        Ok(seq)
    }

    /// 区域的历史回退
    ///
    /// 历史模式下委托历史桥驱动位置回退，由位置变更信号为各区域
    /// 合成 Pop 意图；静默模式下为空操作。
    pub async fn pop(&self, area: &str) -> Result<()> {
        if self.mode != RouterMode::History {
            debug!(area = %area, "静默模式下忽略 pop");
            return Ok(());
        }
        debug!(area = %area, "委托历史桥回退");
        let bridge = self
            .history_bridge()
            .ok_or(NavError::HistoryBridgeMissing)?;
        bridge.back().await
    }

    /// 事件总线句柄
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// 传送发现流
    ///
    /// 承载 `teleport.*` 请求/应答话题的总线克隆，
    /// 供传送协议的发现端使用。
    pub fn find(&self) -> EventBus {
        self.bus.clone()
    }

    /// 订阅区域的活动路由流
    ///
    /// 新订阅者立即观察到当前值（未挂载时为 `None`）。
    pub fn subscribe_state(&self, area: &str) -> watch::Receiver<Option<ActiveRoute>> {
        self.slot(area).subscribe_state()
    }

    /// 发布区域的新活动路由（仅出口调用）
    pub fn publish_state(&self, area: &str, route: Option<ActiveRoute>) {
        self.slot(area).publish_state(route);
    }

    /// 区域当前活动路由的快照
    pub fn current_state(&self, area: &str) -> Option<ActiveRoute> {
        self.slot(area).current_state()
    }

    /// 所有持有非空状态的区域及其活动路由
    pub fn active_routes(&self) -> Vec<ActiveRoute> {
        let slots = self.slots.read().unwrap_or_else(|e| e.into_inner());
        slots
            .values()
            .filter_map(|slot| slot.current_state())
            .collect()
    }

    /// 绑定区域
    ///
    /// 每个区域最多一个活跃出口，重复绑定是装配期错误。
    pub fn bind_area(&self, area: &str) -> Result<()> {
        let mut bound = self.bound_areas.write().unwrap_or_else(|e| e.into_inner());
        if !bound.insert(area.to_string()) {
            warn!(area = %area, "区域已被其他出口绑定");
            return Err(NavError::AreaAlreadyBound(area.to_string()));
        }
        info!(area = %area, "区域绑定成功");
        Ok(())
    }

    /// 释放区域
    pub fn release_area(&self, area: &str) -> Result<()> {
        let mut bound = self.bound_areas.write().unwrap_or_else(|e| e.into_inner());
        if !bound.remove(area) {
            return Err(NavError::AreaNotBound(area.to_string()));
        }
        info!(area = %area, "区域已释放");
        Ok(())
    }

    /// 区域是否已被绑定
    pub fn is_bound(&self, area: &str) -> bool {
        self.bound_areas
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(area)
    }

    /// 运行统计句柄（出口与传送代理共享计数）
    pub fn stats_handle(&self) -> Arc<RegistryStats> {
        Arc::clone(&self.stats)
    }

    /// 统计快照
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}
