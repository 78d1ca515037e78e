//! 导航意图与活动路由数据结构
//!
//! 导航意图和活动路由是核心与调用方之间唯一的数据交换格式。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::component::ComponentRef;
use crate::utils::generate_uuid;

/// 历史策略
///
/// 一次导航对浏览器历史栈的影响方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryStrategy {
    /// 新建历史条目（历史模式下的默认值）
    Push,
    /// 覆盖当前历史条目
    Replace,
    /// 由回退/前进信号或初始加载合成，绝不能回写历史
    Pop,
    /// 完全不触碰历史
    Silent,
}

/// 查询参数清除指令
///
/// 仅对本次导航生效，其他区域的编码状态不受影响。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClearQuery {
    /// 清除全部状态键
    All,
    /// 清除指定的状态键
    Keys(Vec<String>),
}

/// 导航目标
///
/// 命令式导航直接携带组件引用；声明式导航携带匹配键，
/// 由出口在其路由声明表中查找。
#[derive(Debug, Clone)]
pub enum NavTarget {
    /// 命令式：直接给出组件引用
    Component(ComponentRef),
    /// 声明式：按 `when` 键匹配出口的路由声明
    Route(String),
}

/// 导航意图
///
/// 对"改变一个区域所显示内容"的单次请求。
/// 每个意图恰好被其区域的出口消费一次。
#[derive(Debug, Clone)]
pub struct NavigationIntent {
    /// 意图唯一标识（UUID v4）
    pub intent_id: String,

    /// 目标区域名
    pub area: String,

    /// 导航目标
    pub target: NavTarget,

    /// 路由状态
    pub state: Option<Value>,

    /// 历史策略（未指定时历史模式下默认为 Push）
    pub history_strategy: Option<HistoryStrategy>,

    /// 查询参数清除指令
    pub clear_query: Option<ClearQuery>,

    /// 创建时间戳
    pub timestamp: DateTime<Utc>,
}

impl NavigationIntent {
    /// 创建指向组件引用的命令式意图
    pub fn to_component(area: impl Into<String>, component: impl Into<ComponentRef>) -> Self {
        Self {
            intent_id: generate_uuid(),
            area: area.into(),
            target: NavTarget::Component(component.into()),
            state: None,
            history_strategy: None,
            clear_query: None,
            timestamp: Utc::now(),
        }
    }

    /// 创建按声明匹配的声明式意图
    pub fn to_route(area: impl Into<String>, when: impl Into<String>) -> Self {
        Self {
            intent_id: generate_uuid(),
            area: area.into(),
            target: NavTarget::Route(when.into()),
            state: None,
            history_strategy: None,
            clear_query: None,
            timestamp: Utc::now(),
        }
    }

    /// 使用 Builder 模式构建意图
    pub fn builder(area: impl Into<String>) -> NavigationIntentBuilder {
        NavigationIntentBuilder::new(area)
    }

    /// 设置路由状态
    pub fn with_state(mut self, state: Value) -> Self {
        self.state = Some(state);
        self
    }

    /// 设置历史策略
    pub fn with_strategy(mut self, strategy: HistoryStrategy) -> Self {
        self.history_strategy = Some(strategy);
        self
    }

    /// 设置查询参数清除指令
    pub fn with_clear_query(mut self, clear: ClearQuery) -> Self {
        self.clear_query = Some(clear);
        self
    }

    /// 生效的历史策略
    ///
    /// 未指定时按调用方给出的默认值（历史模式为 Push）。
    pub fn effective_strategy(&self, default: HistoryStrategy) -> HistoryStrategy {
        self.history_strategy.unwrap_or(default)
    }

    /// 是否为历史合成意图（回退/前进/初始加载）
    pub fn is_pop(&self) -> bool {
        self.history_strategy == Some(HistoryStrategy::Pop)
    }
}

/// 导航意图构建器
pub struct NavigationIntentBuilder {
    area: String,
    target: Option<NavTarget>,
    state: Option<Value>,
    history_strategy: Option<HistoryStrategy>,
    clear_query: Option<ClearQuery>,
}

impl NavigationIntentBuilder {
    /// 创建新的构建器
    pub fn new(area: impl Into<String>) -> Self {
        Self {
            area: area.into(),
            target: None,
            state: None,
            history_strategy: None,
            clear_query: None,
        }
    }

    /// 设置组件引用目标
    pub fn component(mut self, component: impl Into<ComponentRef>) -> Self {
        self.target = Some(NavTarget::Component(component.into()));
        self
    }

    /// 设置声明匹配目标
    pub fn route(mut self, when: impl Into<String>) -> Self {
        self.target = Some(NavTarget::Route(when.into()));
        self
    }

    /// 设置路由状态
    pub fn state(mut self, state: Value) -> Self {
        self.state = Some(state);
        self
    }

    /// 设置历史策略
    pub fn strategy(mut self, strategy: HistoryStrategy) -> Self {
        self.history_strategy = Some(strategy);
        self
    }

    /// 设置查询参数清除指令
    pub fn clear_query(mut self, clear: ClearQuery) -> Self {
        self.clear_query = Some(clear);
        self
    }

    /// 构建意图
    ///
    /// 未设置目标时退化为声明式空键匹配（由出口的默认组件兜底）。
    pub fn build(self) -> NavigationIntent {
        NavigationIntent {
            intent_id: generate_uuid(),
            area: self.area,
            target: self
                .target
                .unwrap_or_else(|| NavTarget::Route(String::new())),
            state: self.state,
            history_strategy: self.history_strategy,
            clear_query: self.clear_query,
            timestamp: Utc::now(),
        }
    }
}

/// 活动路由
///
/// 一个区域当前已挂载内容的真实状态。组件引用在挂载前已被解析，
/// 这里只保留解析后的标签，因此可以安全序列化。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActiveRoute {
    /// 所属区域名（恒等于其出口的区域名）
    pub area: String,

    /// 已解析的组件标签
    pub component: String,

    /// 路由状态
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<Value>,
}

impl ActiveRoute {
    /// 创建活动路由
    pub fn new(area: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            area: area.into(),
            component: component.into(),
            state: None,
        }
    }

    /// 设置路由状态
    pub fn with_state(mut self, state: Value) -> Self {
        self.state = Some(state);
        self
    }
}
