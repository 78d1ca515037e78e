//! 罗盘导航核心错误类型定义
//!
//! 本模块定义了导航核心中使用的所有错误类型。

use thiserror::Error;

/// 导航核心错误类型
#[derive(Error, Debug)]
pub enum NavError {
    // ==================== 区域与出口错误 ====================

    /// 区域已被其他出口绑定
    #[error("区域已被绑定: '{0}'")]
    AreaAlreadyBound(String),

    /// 区域未绑定任何出口
    #[error("区域未绑定出口: '{0}'")]
    AreaNotBound(String),

    /// 出口未处于附加状态
    #[error("出口未附加: area '{0}'")]
    OutletDetached(String),

    // ==================== 组件解析错误 ====================

    /// 标签未在组件注册表中登记
    #[error("未知组件标签: '{0}'")]
    UnknownTag(String),

    /// 标签已注册，不能重复登记
    #[error("组件标签已注册: '{0}'")]
    DuplicateTag(String),

    /// 工厂函数构建组件失败
    #[error("组件构建失败: '{tag}' - {reason}")]
    ResolveFailed {
        tag: String,
        reason: String,
    },

    /// 异步模块加载失败
    #[error("组件模块加载失败: '{key}' - {reason}")]
    LoadFailed {
        key: String,
        reason: String,
    },

    /// 守卫拒绝放行（含超时与 panic）
    #[error("守卫拒绝导航: {0}")]
    GuardRejected(String),

    // ==================== 历史与位置错误 ====================

    /// 位置字符串无法解析
    #[error("位置解析失败: {0}")]
    InvalidLocation(String),

    /// 状态令牌解码失败
    #[error("状态令牌无效: {0}")]
    InvalidStateToken(String),

    /// 历史桥未接入注册中心
    #[error("历史桥未接入")]
    HistoryBridgeMissing,

    // ==================== 事件系统错误 ====================

    /// 事件发布失败
    #[error("事件发布失败: {0}")]
    EventPublishFailed(String),

    /// 订阅未找到
    #[error("订阅未找到: '{0}'")]
    SubscriptionNotFound(String),

    // ==================== 配置错误 ====================

    /// 配置加载失败
    #[error("配置加载失败: {0}")]
    ConfigLoadFailed(String),

    /// 配置值无效
    #[error("配置值无效: '{key}' - {reason}")]
    InvalidConfigValue {
        key: String,
        reason: String,
    },

    // ==================== IO 和序列化错误 ====================

    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 序列化/反序列化错误
    #[error("JSON 错误: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML 序列化/反序列化错误
    #[error("YAML 错误: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // ==================== 通用错误 ====================

    /// 内部错误
    #[error("内部错误: {0}")]
    Internal(String),

    /// 初始化失败
    #[error("初始化失败: {0}")]
    InitFailed(String),

    /// 其他错误
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// 导航核心操作结果类型别名
pub type Result<T> = std::result::Result<T, NavError>;

/// 错误码常量
pub mod error_code {
    // 区域错误 (AREA-xxx)
    pub const AREA_ALREADY_BOUND: &str = "AREA-001";
    pub const AREA_NOT_BOUND: &str = "AREA-002";

    // 解析错误 (RESOLVE-xxx)
    pub const RESOLVE_UNKNOWN_TAG: &str = "RESOLVE-001";
    pub const RESOLVE_BUILD_FAILED: &str = "RESOLVE-002";
    pub const RESOLVE_LOAD_FAILED: &str = "RESOLVE-003";
    pub const RESOLVE_GUARD_REJECTED: &str = "RESOLVE-004";

    // 历史错误 (HISTORY-xxx)
    pub const HISTORY_INVALID_LOCATION: &str = "HISTORY-001";
    pub const HISTORY_INVALID_TOKEN: &str = "HISTORY-002";

    // 事件错误 (EVENT-xxx)
    pub const EVENT_PUBLISH_FAILED: &str = "EVENT-001";
    pub const EVENT_SUBSCRIPTION_NOT_FOUND: &str = "EVENT-002";

    // 配置错误 (CONFIG-xxx)
    pub const CONFIG_LOAD_FAILED: &str = "CONFIG-001";
    pub const CONFIG_INVALID_VALUE: &str = "CONFIG-002";
}

impl NavError {
    /// 获取错误码
    pub fn error_code(&self) -> &'static str {
        match self {
            NavError::AreaAlreadyBound(_) => error_code::AREA_ALREADY_BOUND,
            NavError::AreaNotBound(_) | NavError::OutletDetached(_) => error_code::AREA_NOT_BOUND,
            NavError::UnknownTag(_) | NavError::DuplicateTag(_) => error_code::RESOLVE_UNKNOWN_TAG,
            NavError::ResolveFailed { .. } => error_code::RESOLVE_BUILD_FAILED,
            NavError::LoadFailed { .. } => error_code::RESOLVE_LOAD_FAILED,
            NavError::GuardRejected(_) => error_code::RESOLVE_GUARD_REJECTED,
            NavError::InvalidLocation(_) => error_code::HISTORY_INVALID_LOCATION,
            NavError::InvalidStateToken(_) => error_code::HISTORY_INVALID_TOKEN,
            NavError::EventPublishFailed(_) => error_code::EVENT_PUBLISH_FAILED,
            NavError::SubscriptionNotFound(_) => error_code::EVENT_SUBSCRIPTION_NOT_FOUND,
            NavError::ConfigLoadFailed(_) => error_code::CONFIG_LOAD_FAILED,
            NavError::InvalidConfigValue { .. } => error_code::CONFIG_INVALID_VALUE,
            _ => "UNKNOWN",
        }
    }

    /// 是否为可恢复错误
    ///
    /// 可恢复错误不会中断出口的处理循环：保留上一个活动路由并上报宿主。
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            NavError::UnknownTag(_)
                | NavError::ResolveFailed { .. }
                | NavError::LoadFailed { .. }
                | NavError::GuardRejected(_)
                | NavError::InvalidLocation(_)
                | NavError::InvalidStateToken(_)
        )
    }
}
