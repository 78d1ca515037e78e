//! 核心模块
//!
//! 包含核心配置与导航核心门面。

pub mod config;
pub mod navigation;

pub use config::{
    CoreConfig, CoreConfigBuilder, HistoryConfig, LogConfig, RegistryConfig, TeleportConfig,
};
pub use navigation::{CoreState, NavigationCore};
