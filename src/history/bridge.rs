//! 历史桥
//!
//! 活动路由与宿主位置之间的双向翻译层，也是位置驱动的唯一写入方。
//!
//! # URL 映射
//!
//! 主区域的组件标签作为第一个路径段，其余区域是 `?<区域>=<标签>`
//! 查询对，每个区域的状态是 `?<区域>.s=<令牌>`（主区域同样如此）。
//! 映射是确定且可逆的。
//!
//! # 方向规则
//!
//! - Push 新建历史条目，Replace 覆盖当前条目
//! - Pop 与 Silent 绝不回写位置（回写 Pop 会吞掉用户的回退）

use std::sync::Arc;

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::location::{DriverHandle, Location};
use crate::codec::{decode_state, encode_state, sanitize_route_state};
use crate::registry::{ActiveRoute, ClearQuery, HistoryStrategy, NavigationIntent, RouteRegistry};
use crate::utils::Result;

/// 状态令牌参数后缀
const STATE_SUFFIX: &str = ".s";

/// 历史桥
pub struct HistoryBridge {
    /// 位置驱动
    driver: DriverHandle,

    /// 主区域名（其组件标签占据路径段）
    primary_area: String,
}

impl HistoryBridge {
    /// 创建历史桥
    pub fn new(driver: DriverHandle, primary_area: impl Into<String>) -> Self {
        let primary_area = primary_area.into();
        info!(primary_area = %primary_area, "创建历史桥");
        Self {
            driver,
            primary_area,
        }
    }

    /// 主区域名
    pub fn primary_area(&self) -> &str {
        &self.primary_area
    }

    /// 当前位置
    pub async fn current_location(&self) -> Location {
        self.driver.current().await
    }

    /// 把活动路由集合编码为位置
    ///
    /// 区域按名称排序以保证确定性，主区域占据路径段。
    pub fn build_location(&self, routes: &[ActiveRoute]) -> Location {
        let mut location = Location::new("/");
        let mut sorted: Vec<&ActiveRoute> = routes.iter().collect();
        sorted.sort_by(|a, b| a.area.cmp(&b.area));

        // 主区域：标签进路径，状态进查询
        if let Some(primary) = sorted.iter().find(|r| r.area == self.primary_area) {
            location.path = format!("/{}", primary.component);
            if let Some(token) = primary.state.as_ref().and_then(encode_state) {
                location
                    .query
                    .push((format!("{}{}", self.primary_area, STATE_SUFFIX), token));
            }
        }

        // 其余区域：标签与状态都进查询
        for route in sorted.iter().filter(|r| r.area != self.primary_area) {
            location
                .query
                .push((route.area.clone(), route.component.clone()));
            if let Some(token) = route.state.as_ref().and_then(encode_state) {
                location
                    .query
                    .push((format!("{}{}", route.area, STATE_SUFFIX), token));
            }
        }

        location
    }

    /// 把位置解码为一组 Pop 策略意图
    ///
    /// 无法解析的片段被跳过：坏掉的状态令牌只丢状态，坏掉的区域对
    /// 整个跳过，对应区域由出口的默认组件兜底。
    pub fn parse_location(&self, location: &Location) -> Vec<NavigationIntent> {
        let mut intents = Vec::new();

        if let Some(tag) = location.first_segment() {
            let state = self.decode_param(location, &self.primary_area);
            let mut intent = NavigationIntent::to_component(self.primary_area.clone(), tag)
                .with_strategy(HistoryStrategy::Pop);
            intent.state = state;
            intents.push(intent);
        }

        for (key, value) in &location.query {
            if key.ends_with(STATE_SUFFIX) || key == &self.primary_area {
                continue;
            }
            if value.is_empty() {
                warn!(area = %key, "跳过空组件标签的区域对");
                continue;
            }
            let state = self.decode_param(location, key);
            let mut intent = NavigationIntent::to_component(key.clone(), value.as_str())
                .with_strategy(HistoryStrategy::Pop);
            intent.state = state;
            intents.push(intent);
        }

        intents
    }

    /// 解码某区域的状态令牌，解码失败时丢弃状态
    fn decode_param(&self, location: &Location, area: &str) -> Option<Value> {
        let token = location.param(&format!("{}{}", area, STATE_SUFFIX))?;
        match decode_state(token) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(area = %area, error = %e, "状态令牌解码失败，丢弃状态");
                None
            }
        }
    }

    /// 按意图的历史策略把新的路由集合镜像到位置
    ///
    /// `clear_query` 只作用于本次导航区域的状态编码，其他区域不受影响。
    pub async fn sync(&self, intent: &NavigationIntent, routes: Vec<ActiveRoute>) -> Result<()> {
        let strategy = intent.effective_strategy(HistoryStrategy::Push);
        if matches!(strategy, HistoryStrategy::Pop | HistoryStrategy::Silent) {
            return Ok(());
        }

        let routes = self.apply_clear_query(intent, routes);
        let location = self.build_location(&routes);

        debug!(
            intent_id = %intent.intent_id,
            strategy = ?strategy,
            location = %location,
            "镜像位置"
        );

        match strategy {
            HistoryStrategy::Push => self.driver.push(location).await,
            HistoryStrategy::Replace => self.driver.replace(location).await,
            HistoryStrategy::Pop | HistoryStrategy::Silent => unreachable!(),
        }
    }

    /// 对意图区域的状态应用清除指令
    fn apply_clear_query(
        &self,
        intent: &NavigationIntent,
        mut routes: Vec<ActiveRoute>,
    ) -> Vec<ActiveRoute> {
        let Some(clear) = &intent.clear_query else {
            return routes;
        };
        for route in routes.iter_mut().filter(|r| r.area == intent.area) {
            match clear {
                ClearQuery::All => route.state = None,
                ClearQuery::Keys(keys) => {
                    if let Some(state) = &route.state {
                        let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
                        let cleaned = sanitize_route_state(state, &refs);
                        route.state = if cleaned == Value::Object(Default::default()) {
                            None
                        } else {
                            Some(cleaned)
                        };
                    }
                }
            }
        }
        routes
    }

    /// 历史回退
    pub async fn back(&self) -> Result<()> {
        self.driver.back().await
    }

    /// 历史前进
    pub async fn forward(&self) -> Result<()> {
        self.driver.forward().await
    }

    /// 启动时把当前位置播种进注册表
    ///
    /// 必须在任何出口订阅之前调用；单槽回放保证意图不丢失。
    pub async fn seed(&self, registry: &RouteRegistry) -> Result<usize> {
        let location = self.driver.current().await;
        let intents = self.parse_location(&location);
        let count = intents.len();

        info!(location = %location, count = count, "播种初始位置");
        for intent in intents {
            registry.push(intent).await?;
        }
        Ok(count)
    }

    /// 启动回退/前进监听任务
    ///
    /// 把位置变更信号翻译成每个区域的 Pop 意图；从位置中消失的区域
    /// 收到一条空目标的 Pop 意图，由出口的默认组件兜底。
    pub fn spawn_pop_listener(
        self: &Arc<Self>,
        registry: Arc<RouteRegistry>,
    ) -> JoinHandle<()> {
        let bridge = Arc::clone(self);
        let mut pop_rx = self.driver.subscribe_pop();

        tokio::spawn(async move {
            while pop_rx.changed().await.is_ok() {
                let Some(location) = pop_rx.borrow_and_update().clone() else {
                    continue;
                };
                let intents = bridge.parse_location(&location);
                let restored_areas: Vec<String> =
                    intents.iter().map(|i| i.area.clone()).collect();

                // 从位置中消失的活跃区域退回默认组件
                for route in registry.active_routes() {
                    if !restored_areas.contains(&route.area) {
                        let fallback = NavigationIntent::builder(route.area.clone())
                            .strategy(HistoryStrategy::Pop)
                            .build();
                        if let Err(e) = registry.push(fallback).await {
                            warn!(area = %route.area, error = %e, "回退兜底意图投递失败");
                        }
                    }
                }

                for intent in intents {
                    let area = intent.area.clone();
                    if let Err(e) = registry.push(intent).await {
                        warn!(area = %area, error = %e, "回退意图投递失败");
                    }
                }
            }
            debug!("位置驱动已关闭，回退监听退出");
        })
    }
}
