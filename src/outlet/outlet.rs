//! 区域出口
//!
//! 渲染侧的代理：每个出口绑定一个区域，串行消费该区域的导航意图，
//! 把意图变成真正挂载的组件实例。
//!
//! # 处理流水线
//!
//! 1. 取目标：意图直接携带组件引用，或按声明表匹配 `when` 键
//! 2. 守卫：有界等待，拒绝/超时/出错都不放行
//! 3. 幂等检查：与当前活动路由结构相等的意图直接丢弃
//! 4. 传送优先：先在传送窗口内找存活实例，找不到再解析构造
//! 5. 过期检查：解析期间槽内出现更新意图时丢弃本次结果
//! 6. 挂载并广播新活动路由，历史模式下驱动历史桥
//!
//! 解析与守卫失败保留上一个活动路由，经 `nav.error` 上报宿主，
//! 槽保持可用。

use std::sync::{Arc, Mutex as StdMutex, RwLock as StdRwLock};
use std::time::Duration;

use serde_json::json;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::declaration::{DeclarationTable, RouteDeclaration, RouteGuard};
use super::teleport::{TeleportBroker, DEFAULT_DISCOVER_TIMEOUT_MS};
use crate::codec::intent_matches_route;
use crate::component::{ComponentInstance, ComponentRef, ComponentResolver};
use crate::registry::{
    nav_events, ActiveRoute, Event, HistoryStrategy, NavTarget, NavigationIntent, RegistryStats,
    RouteRegistry, RouterMode,
};
use crate::utils::{NavError, Result};

/// 默认守卫超时（秒）
pub const DEFAULT_GUARD_TIMEOUT_SECS: u64 = 5;

/// 出口配置
#[derive(Debug, Clone)]
pub struct OutletConfig {
    /// 守卫超时
    pub guard_timeout: Duration,

    /// 传送发现窗口
    pub teleport_wait: Duration,
}

impl Default for OutletConfig {
    fn default() -> Self {
        Self {
            guard_timeout: Duration::from_secs(DEFAULT_GUARD_TIMEOUT_SECS),
            teleport_wait: Duration::from_millis(DEFAULT_DISCOVER_TIMEOUT_MS),
        }
    }
}

/// 区域出口
pub struct AreaOutlet {
    /// 绑定的区域名
    area: String,

    /// 路由注册表
    registry: Arc<RouteRegistry>,

    /// 组件解析器
    resolver: Arc<ComponentResolver>,

    /// 传送代理
    broker: TeleportBroker,

    /// 声明表快照
    declarations: StdRwLock<Arc<DeclarationTable>>,

    /// 默认组件（槽空时以 Silent 意图挂载）
    default_component: StdRwLock<Option<ComponentRef>>,

    /// 出口配置
    config: OutletConfig,

    /// 当前挂载的实例
    current: StdMutex<Option<ComponentInstance>>,

    /// 处理任务句柄
    task: StdMutex<Option<JoinHandle<()>>>,

    /// 注册表统计
    stats: Arc<RegistryStats>,
}

impl AreaOutlet {
    /// 创建出口
    pub fn new(
        area: impl Into<String>,
        registry: Arc<RouteRegistry>,
        resolver: Arc<ComponentResolver>,
        broker: TeleportBroker,
    ) -> Arc<Self> {
        Self::with_config(area, registry, resolver, broker, OutletConfig::default())
    }

    /// 使用自定义配置创建出口
    pub fn with_config(
        area: impl Into<String>,
        registry: Arc<RouteRegistry>,
        resolver: Arc<ComponentResolver>,
        broker: TeleportBroker,
        config: OutletConfig,
    ) -> Arc<Self> {
        let stats = registry.stats_handle();
        Arc::new(Self {
            area: area.into(),
            registry,
            resolver,
            broker,
            declarations: StdRwLock::new(Arc::new(DeclarationTable::empty())),
            default_component: StdRwLock::new(None),
            config,
            current: StdMutex::new(None),
            task: StdMutex::new(None),
            stats,
        })
    }

    /// 区域名
    pub fn area(&self) -> &str {
        &self.area
    }

    /// 替换声明集合（子声明变更通知）
    ///
    /// 整表重新编译，不影响正在处理中的意图。
    pub fn set_declarations(&self, declarations: Vec<RouteDeclaration>) {
        let table = Arc::new(DeclarationTable::compile(declarations));
        *self
            .declarations
            .write()
            .unwrap_or_else(|e| e.into_inner()) = table;
    }

    /// 设置默认组件
    pub fn set_default_component(&self, component: impl Into<ComponentRef>) {
        *self
            .default_component
            .write()
            .unwrap_or_else(|e| e.into_inner()) = Some(component.into());
    }

    /// 当前挂载的实例
    pub fn current_instance(&self) -> Option<ComponentInstance> {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// 附加出口
    ///
    /// 绑定区域（已被占用时报错）、订阅单槽信箱并启动串行处理任务。
    /// 槽空且声明了默认组件时，合成一条 Silent 意图挂载默认组件。
    pub async fn attach(self: &Arc<Self>) -> Result<()> {
        self.registry.bind_area(&self.area)?;

        let slot = self.registry.slot(&self.area);

        let default = self
            .default_component
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if slot.is_empty().await && self.registry.current_state(&self.area).is_none() {
            if let Some(component) = default {
                let intent = NavigationIntent::to_component(self.area.clone(), component)
                    .with_strategy(HistoryStrategy::Silent);
                slot.publish(intent).await;
            }
        }

        let _ = self
            .registry
            .bus()
            .publish(Event::new(
                nav_events::AREA_BOUND,
                self.area.clone(),
                json!({"area": self.area}),
            ))
            .await;

        let outlet = Arc::clone(self);
        let handle = tokio::spawn(async move {
            loop {
                let (seq, intent) = slot.recv().await;
                outlet.process(seq, intent).await;
            }
        });
        *self.task.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);

        info!(area = %self.area, "出口已附加");
        Ok(())
    }

    /// 分离出口
    ///
    /// 停止处理任务、释放区域，并把最后挂载的实例停放为传送应答者，
    /// 供其他区域在传送窗口内领取。
    pub async fn detach(&self) -> Result<()> {
        if let Some(handle) = self.task.lock().unwrap_or_else(|e| e.into_inner()).take() {
            handle.abort();
        } else {
            return Err(NavError::OutletDetached(self.area.clone()));
        }

        self.registry.release_area(&self.area)?;

        let parked = self
            .current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(instance) = parked {
            debug!(
                area = %self.area,
                tag = %instance.tag(),
                "分离时停放实例"
            );
            self.broker.park(instance).await?;
        }

        let _ = self
            .registry
            .bus()
            .publish(Event::new(
                nav_events::AREA_RELEASED,
                self.area.clone(),
                json!({"area": self.area}),
            ))
            .await;

        info!(area = %self.area, "出口已分离");
        Ok(())
    }

    /// 处理一条意图
    async fn process(&self, seq: u64, intent: NavigationIntent) {
        let (component, guard) = match self.select_target(&intent) {
            Ok(pair) => pair,
            Err(e) => {
                self.report_error(&intent, e).await;
                return;
            }
        };

        // 守卫：有界等待，超时视为拒绝
        if let Some(guard) = guard {
            let allowed = timeout(self.config.guard_timeout, guard(&intent))
                .await
                .unwrap_or(false);
            if !allowed {
                self.report_error(
                    &intent,
                    NavError::GuardRejected(format!("意图 {}", intent.intent_id)),
                )
                .await;
                return;
            }
        }

        // 幂等检查：标签已知时在解析前做
        let static_tag = component_static_tag(&component);
        if let Some(tag) = &static_tag {
            if let Some(current) = self.registry.current_state(&self.area) {
                if intent_matches_route(tag, &intent.state, &current) {
                    debug!(area = %self.area, tag = %tag, "丢弃幂等意图");
                    return;
                }
            }
        }

        // 传送优先，未命中再解析构造
        let instance = match self.acquire_instance(&component, static_tag.as_deref()).await {
            Ok(instance) => instance,
            Err(e) => {
                self.report_error(&intent, e).await;
                return;
            }
        };

        // 过期检查：解析期间槽内出现更新意图则丢弃本次结果
        let slot = self.registry.slot(&self.area);
        if slot.latest_seq() != seq {
            self.stats
                .stale_drops
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            debug!(
                area = %self.area,
                seq = seq,
                latest = slot.latest_seq(),
                "丢弃过期解析结果"
            );
            return;
        }

        // 标签解析后才可知时的幂等检查
        if static_tag.is_none() {
            if let Some(current) = self.registry.current_state(&self.area) {
                if intent_matches_route(instance.tag(), &intent.state, &current) {
                    debug!(area = %self.area, tag = %instance.tag(), "丢弃幂等意图");
                    return;
                }
            }
        }

        self.mount(intent, instance).await;
    }

    /// 从意图取出目标组件引用与守卫
    fn select_target(
        &self,
        intent: &NavigationIntent,
    ) -> Result<(ComponentRef, Option<RouteGuard>)> {
        match &intent.target {
            NavTarget::Component(component) => Ok((component.clone(), None)),
            NavTarget::Route(key) if key.is_empty() => {
                let default = self
                    .default_component
                    .read()
                    .unwrap_or_else(|e| e.into_inner())
                    .clone();
                default
                    .map(|c| (c, None))
                    .ok_or_else(|| NavError::UnknownTag(format!("{}:<default>", self.area)))
            }
            NavTarget::Route(key) => {
                let table = Arc::clone(
                    &self
                        .declarations
                        .read()
                        .unwrap_or_else(|e| e.into_inner()),
                );
                table
                    .find(key)
                    .map(|decl| (decl.component.clone(), decl.guard.clone()))
                    .ok_or_else(|| NavError::UnknownTag(key.clone()))
            }
        }
    }

    /// 获取实例：传送命中复用，未命中走解析器
    ///
    /// 只有按标签引用的目标才参与发现；显式给出实例、构造器或
    /// 模板时按原样解析，避免同标签的停放实例抢占调用方指定的目标。
    async fn acquire_instance(
        &self,
        component: &ComponentRef,
        static_tag: Option<&str>,
    ) -> Result<ComponentInstance> {
        if matches!(component, ComponentRef::Tag(_)) {
            if let Some(tag) = static_tag {
                if let Some(instance) =
                    self.broker.discover(tag, self.config.teleport_wait).await?
                {
                    return Ok(instance);
                }
            }
        }
        self.resolver.resolve(component).await
    }

    /// 挂载实例并广播
    async fn mount(&self, intent: NavigationIntent, instance: ComponentInstance) {
        if let Some(state) = &intent.state {
            instance.set_state(state.clone());
        }

        let route = ActiveRoute {
            area: self.area.clone(),
            component: instance.tag().to_string(),
            state: intent.state.clone(),
        };

        debug!(
            area = %self.area,
            component = %route.component,
            intent_id = %intent.intent_id,
            "挂载组件"
        );

        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = Some(instance.clone());
        self.registry.publish_state(&self.area, Some(route));

        let _ = self
            .registry
            .bus()
            .publish(Event::new(
                nav_events::MOUNTED,
                self.area.clone(),
                json!({
                    "component": instance.tag(),
                    "intent_id": intent.intent_id,
                }),
            ))
            .await;

        // 历史模式下按策略镜像位置
        if self.registry.mode() == RouterMode::History {
            let strategy = intent.effective_strategy(HistoryStrategy::Push);
            if !matches!(strategy, HistoryStrategy::Pop | HistoryStrategy::Silent) {
                if let Some(bridge) = self.registry.history_bridge() {
                    let routes = self.registry.active_routes();
                    if let Err(e) = bridge.sync(&intent, routes).await {
                        warn!(area = %self.area, error = %e, "历史镜像失败");
                    }
                }
            }
        }
    }

    /// 上报失败，保留上一个活动路由
    async fn report_error(&self, intent: &NavigationIntent, error: NavError) {
        let counter = match &error {
            NavError::GuardRejected(_) => &self.stats.guard_rejections,
            _ => &self.stats.resolution_errors,
        };
        counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        warn!(
            area = %self.area,
            intent_id = %intent.intent_id,
            error = %error,
            "导航处理失败，保留当前路由"
        );

        let _ = self
            .registry
            .bus()
            .publish(Event::new(
                nav_events::NAV_ERROR,
                self.area.clone(),
                json!({
                    "intent_id": intent.intent_id,
                    "error": error.to_string(),
                    "code": error.error_code(),
                }),
            ))
            .await;
    }
}

impl Drop for AreaOutlet {
    fn drop(&mut self) {
        if let Some(handle) = self.task.lock().unwrap_or_else(|e| e.into_inner()).take() {
            handle.abort();
        }
    }
}

/// 静态可知的组件标签
///
/// 工厂与加载器在解析前无法确定标签。
fn component_static_tag(component: &ComponentRef) -> Option<String> {
    match component {
        ComponentRef::Tag(tag) => Some(tag.clone()),
        ComponentRef::Ctor(ctor) => Some(ctor.tag().to_string()),
        ComponentRef::Instance(instance) => Some(instance.tag().to_string()),
        ComponentRef::Template(template) => Some(template.tag.clone()),
        ComponentRef::Factory(_) | ComponentRef::Loader { .. } => None,
    }
}
