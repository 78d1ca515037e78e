//! # Luopan - 罗盘多区域导航核心
//!
//! 罗盘是一个与渲染层无关的响应式导航核心，提供以下核心功能：
//!
//! - **多区域出口**: 每个命名区域独立展示一个存活组件，互不干扰
//! - **单槽回放通道**: 每区域最多保留一条未消费意图，迟到订阅者不丢失导航
//! - **异步守卫与解析**: 有界守卫等待、六种组件引用形态的统一解析
//! - **历史桥**: 活动路由与宿主位置的确定性双向映射
//! - **传送协议**: 存活组件实例跨区域移交，身份与内部状态保持
//! - **状态编解码**: 路由状态与 URL 安全令牌的可逆转换
//!
//! ## 快速开始
//!
//! ```rust,no_run
//! use luopan::{CoreConfig, NavigationCore, NavigationIntent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let core = NavigationCore::new(CoreConfig::default())?;
//!     core.start().await?;
//!
//!     core.define_component("detail-panel")?;
//!     let outlet = core.outlet("main");
//!     outlet.attach().await?;
//!
//!     core.push(NavigationIntent::to_component("main", "detail-panel"))
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## 模块结构
//!
//! - `registry` - 路由注册表、单槽信箱、事件总线
//! - `outlet` - 区域出口、声明表、传送协议
//! - `component` - 组件模型与解析器
//! - `history` - 位置抽象与历史桥
//! - `codec` - 状态编解码与路由等价判定
//! - `core` - 核心配置与门面
//! - `utils` - 工具函数和错误类型

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod codec;
pub mod component;
pub mod core;
pub mod history;
pub mod outlet;
pub mod registry;
pub mod utils;

// 重导出常用类型，方便使用
pub use registry::{
    nav_events, ActiveRoute, AreaSlot, ClearQuery, Event, EventBus, EventFilter,
    HistoryStrategy, NavTarget, NavigationIntent, NavigationIntentBuilder, RouteRegistry,
    RouterMode, StatsSnapshot,
};

pub use component::{
    ComponentCtor, ComponentInstance, ComponentRef, ComponentRegistry, ComponentResolver,
    FnCtor, TemplateDef,
};

pub use history::{HistoryBridge, Location, LocationDriver, MemoryHistory};
pub use outlet::{AreaOutlet, DeclarationTable, RouteDeclaration, RouteGuard, TeleportBroker};

pub use utils::{error_code, generate_id, generate_uuid, NavError, Result};
pub use utils::logger::{LogGuard, Logger, LoggerConfig, LoggerConfigBuilder, RotationStrategy};

pub use core::config::{CoreConfig, CoreConfigBuilder, LogConfig};
pub use core::navigation::{CoreState, NavigationCore};

/// 库版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
