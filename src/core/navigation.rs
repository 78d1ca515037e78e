//! 导航核心门面
//!
//! 罗盘的主要对外接口。提供统一的 API 访问导航核心的所有功能：
//!
//! - 组件登记：注册标签与构造器
//! - 出口管理：按区域创建、附加、分离出口
//! - 导航：投递意图、历史回退、订阅区域状态
//! - 事件系统：发布/订阅导航事件
//!
//! # 示例
//!
//! ```rust,no_run
//! use luopan::{NavigationCore, CoreConfig, NavigationIntent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CoreConfig::builder()
//!         .primary_area("main")
//!         .log_level("info")
//!         .build();
//!
//!     let core = NavigationCore::new(config)?;
//!     core.start().await?;
//!
//!     core.define_component("detail-panel")?;
//!     let outlet = core.outlet("main");
//!     outlet.attach().await?;
//!
//!     core.push(NavigationIntent::to_component("main", "detail-panel"))
//!         .await?;
//!
//!     core.shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use serde_json::json;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::config::CoreConfig;
use crate::component::{ComponentCtor, ComponentRegistry, ComponentResolver};
use crate::history::{HistoryBridge, Location, MemoryHistory};
use crate::outlet::{AreaOutlet, OutletConfig, TeleportBroker};
use crate::registry::{
    nav_events, ActiveRoute, Event, EventBus, EventCallback, EventFilter, NavigationIntent,
    RouteRegistry, RouterMode, StatsSnapshot,
};
use crate::utils::{NavError, Result};

// ============================================================================
// 核心状态
// ============================================================================

/// 核心状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreState {
    /// 已初始化
    Initialized,
    /// 运行中
    Running,
    /// 已关闭
    Shutdown,
}

impl CoreState {
    /// 检查是否可以启动
    pub fn can_start(&self) -> bool {
        matches!(self, CoreState::Initialized)
    }

    /// 检查是否正在运行
    pub fn is_running(&self) -> bool {
        matches!(self, CoreState::Running)
    }
}

// ============================================================================
// NavigationCore 主结构体
// ============================================================================

/// 导航核心主结构体
///
/// 整个导航核心的入口点，负责装配注册表、事件总线、组件解析器、
/// 传送代理与历史桥。
///
/// # 生命周期
///
/// 1. `new()` - 创建并装配核心
/// 2. `start()` - 播种初始位置并启动回退监听
/// 3. `shutdown()` - 分离所有出口并关闭
pub struct NavigationCore {
    /// 核心配置
    config: CoreConfig,

    /// 核心状态
    state: Arc<RwLock<CoreState>>,

    /// 路由注册表
    registry: Arc<RouteRegistry>,

    /// 事件总线
    bus: EventBus,

    /// 组件注册表
    components: Arc<ComponentRegistry>,

    /// 组件解析器
    resolver: Arc<ComponentResolver>,

    /// 传送代理
    broker: TeleportBroker,

    /// 历史桥（历史模式下存在）
    bridge: Option<Arc<HistoryBridge>>,

    /// 已创建的出口
    outlets: StdMutex<Vec<Arc<AreaOutlet>>>,

    /// 回退监听任务
    pop_listener: StdMutex<Option<JoinHandle<()>>>,
}

impl NavigationCore {
    /// 使用配置装配核心
    pub fn new(config: CoreConfig) -> Result<Self> {
        let bus = EventBus::new();
        let mode = if config.registry.history_enabled {
            RouterMode::History
        } else {
            RouterMode::Silent
        };
        let registry = Arc::new(RouteRegistry::new(mode, bus.clone()));

        let components = Arc::new(ComponentRegistry::new());
        let resolver = Arc::new(ComponentResolver::with_cache_capacity(
            Arc::clone(&components),
            config.registry.loader_cache_capacity,
        ));
        let broker = TeleportBroker::new(registry.find(), registry.stats_handle());

        let bridge = if config.registry.history_enabled {
            let initial = Location::parse(&config.history.initial_location);
            let history = Arc::new(MemoryHistory::with_initial(initial));
            let bridge = Arc::new(HistoryBridge::new(
                history,
                config.history.primary_area.clone(),
            ));
            registry.set_history_bridge(Arc::clone(&bridge));
            Some(bridge)
        } else {
            None
        };

        info!(mode = ?mode, "导航核心已装配");

        Ok(Self {
            config,
            state: Arc::new(RwLock::new(CoreState::Initialized)),
            registry,
            bus,
            components,
            resolver,
            broker,
            bridge,
            outlets: StdMutex::new(Vec::new()),
            pop_listener: StdMutex::new(None),
        })
    }

    /// 启动核心
    ///
    /// 历史模式下把当前位置播种进注册表并启动回退监听。
    /// 必须在附加任何出口之前调用，单槽回放保证播种意图不丢失。
    pub async fn start(&self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if !state.can_start() {
                return Err(NavError::InitFailed(format!(
                    "核心状态不允许启动: {:?}",
                    *state
                )));
            }
            *state = CoreState::Running;
        }

        if let Some(bridge) = &self.bridge {
            bridge.seed(&self.registry).await?;
            let handle = bridge.spawn_pop_listener(Arc::clone(&self.registry));
            *self
                .pop_listener
                .lock()
                .unwrap_or_else(|e| e.into_inner()) = Some(handle);
        }

        let _ = self
            .bus
            .publish(Event::new(nav_events::CORE_STARTED, "core", json!({})))
            .await;

        info!("导航核心已启动");
        Ok(())
    }

    /// 当前核心状态
    pub async fn state(&self) -> CoreState {
        *self.state.read().await
    }

    /// 登记组件构造器
    pub fn define(&self, ctor: Arc<dyn ComponentCtor>) -> Result<()> {
        self.components.define(ctor)
    }

    /// 登记裸标签组件
    pub fn define_component(&self, tag: impl Into<String>) -> Result<()> {
        self.components.define_tag(tag)
    }

    /// 为区域创建出口
    ///
    /// 出口尚未附加：调用方先配置声明表与默认组件，再 `attach()`。
    pub fn outlet(&self, area: impl Into<String>) -> Arc<AreaOutlet> {
        let outlet_config = OutletConfig {
            guard_timeout: Duration::from_millis(self.config.registry.guard_timeout_ms),
            teleport_wait: Duration::from_millis(self.config.teleport.discover_timeout_ms),
        };
        let outlet = AreaOutlet::with_config(
            area,
            Arc::clone(&self.registry),
            Arc::clone(&self.resolver),
            self.broker.clone(),
            outlet_config,
        );

        self.outlets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Arc::clone(&outlet));

        outlet
    }

    /// 投递导航意图
    pub async fn push(&self, intent: NavigationIntent) -> Result<u64> {
        self.registry.push(intent).await
    }

    /// 区域的历史回退
    pub async fn pop(&self, area: &str) -> Result<()> {
        self.registry.pop(area).await
    }

    /// 订阅区域的活动路由流
    pub fn subscribe_state(&self, area: &str) -> watch::Receiver<Option<ActiveRoute>> {
        self.registry.subscribe_state(area)
    }

    /// 区域当前活动路由
    pub fn current_state(&self, area: &str) -> Option<ActiveRoute> {
        self.registry.current_state(area)
    }

    /// 订阅导航事件
    pub async fn subscribe_events(
        &self,
        subscriber_id: impl Into<String>,
        event_type: impl Into<String>,
        filter: Option<EventFilter>,
        callback: EventCallback,
    ) -> Result<String> {
        self.bus.subscribe(subscriber_id, event_type, filter, callback).await
    }

    /// 路由注册表句柄
    pub fn registry(&self) -> &Arc<RouteRegistry> {
        &self.registry
    }

    /// 事件总线句柄
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// 传送代理句柄
    pub fn broker(&self) -> &TeleportBroker {
        &self.broker
    }

    /// 历史桥句柄
    pub fn bridge(&self) -> Option<&Arc<HistoryBridge>> {
        self.bridge.as_ref()
    }

    /// 注册表统计快照
    pub fn stats(&self) -> StatsSnapshot {
        self.registry.stats()
    }

    /// 关闭核心
    ///
    /// 分离所有出口、停止回退监听并广播关闭事件。
    pub async fn shutdown(&self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if !state.is_running() {
                return Err(NavError::InitFailed(format!(
                    "核心状态不允许关闭: {:?}",
                    *state
                )));
            }
            *state = CoreState::Shutdown;
        }

        if let Some(handle) = self
            .pop_listener
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            handle.abort();
        }

        let outlets: Vec<Arc<AreaOutlet>> = self
            .outlets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for outlet in outlets {
            if let Err(e) = outlet.detach().await {
                // 调用方可能已自行分离
                warn!(area = %outlet.area(), error = %e, "关闭时分离出口失败");
            }
        }

        let _ = self
            .bus
            .publish(Event::new(nav_events::CORE_SHUTDOWN, "core", json!({})))
            .await;

        info!("导航核心已关闭");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lifecycle() {
        let core = NavigationCore::new(CoreConfig::default()).unwrap();
        assert_eq!(core.state().await, CoreState::Initialized);

        core.start().await.unwrap();
        assert_eq!(core.state().await, CoreState::Running);

        core.shutdown().await.unwrap();
        assert_eq!(core.state().await, CoreState::Shutdown);
    }

    #[tokio::test]
    async fn test_double_start_fails() {
        let core = NavigationCore::new(CoreConfig::default()).unwrap();
        core.start().await.unwrap();
        assert!(core.start().await.is_err());
    }

    #[tokio::test]
    async fn test_silent_mode_has_no_bridge() {
        let core = NavigationCore::new(CoreConfig::builder().silent().build()).unwrap();
        assert!(core.bridge().is_none());
        assert_eq!(core.registry().mode(), RouterMode::Silent);
    }

    #[tokio::test]
    async fn test_push_and_subscribe() {
        let core = NavigationCore::new(CoreConfig::builder().silent().build()).unwrap();
        core.start().await.unwrap();
        core.define_component("detail-panel").unwrap();

        let outlet = core.outlet("main");
        outlet.attach().await.unwrap();

        core.push(NavigationIntent::to_component("main", "detail-panel"))
            .await
            .unwrap();

        let mut rx = core.subscribe_state("main");
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if rx.borrow_and_update().is_some() {
                    break;
                }
                rx.changed().await.unwrap();
            }
        })
        .await
        .unwrap();

        assert_eq!(core.current_state("main").unwrap().component, "detail-panel");
    }
}
