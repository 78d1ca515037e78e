//! 路由注册表模块
//!
//! 导航核心的中枢层：意图与活动路由的数据结构、区域单槽信箱、
//! 事件总线与注册表本体。

pub mod event;
pub mod event_bus;
pub mod intent;
pub mod registry;
pub mod slot;

pub use event::{nav_events, Event, EventFilter};
pub use event_bus::{DispatchStats, EventBus, EventCallback};
pub use intent::{
    ActiveRoute, ClearQuery, HistoryStrategy, NavTarget, NavigationIntent, NavigationIntentBuilder,
};
pub use registry::{RegistryStats, RouteRegistry, RouterMode, StatsSnapshot};
pub use slot::AreaSlot;
