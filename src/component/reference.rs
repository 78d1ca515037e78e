//! 组件引用
//!
//! 导航意图中允许出现的所有组件引用形式。引用从不序列化：
//! 总是在挂载前的最后一刻由解析器归一化为组件实例。

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use super::instance::{ComponentCtor, ComponentInstance};
use crate::utils::Result;

/// 同步工厂函数
pub type SyncFactory = Arc<dyn Fn() -> Result<ComponentInstance> + Send + Sync>;

/// 异步模块加载函数
///
/// 返回构造器而非实例：加载的"模块"可以被缓存并多次构建。
pub type AsyncLoader =
    Arc<dyn Fn() -> BoxFuture<'static, Result<Arc<dyn ComponentCtor>>> + Send + Sync>;

/// 声明式模板
///
/// 标签加初始内部状态，足以描述一个待构建的组件。
#[derive(Debug, Clone)]
pub struct TemplateDef {
    /// 组件标签
    pub tag: String,

    /// 初始内部状态
    pub initial_state: Value,
}

impl TemplateDef {
    /// 创建模板
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            initial_state: Value::Null,
        }
    }

    /// 设置初始内部状态
    pub fn with_initial_state(mut self, state: Value) -> Self {
        self.initial_state = state;
        self
    }
}

/// 组件引用（穷尽的带标签联合）
///
/// 六种引用形式对应六种宿主习惯：标签字符串、构造器、活实例、
/// 声明式模板、同步工厂与异步模块加载器。
#[derive(Clone)]
pub enum ComponentRef {
    /// 标签名，经组件注册表解析
    Tag(String),

    /// 直接给出的构造器
    Ctor(Arc<dyn ComponentCtor>),

    /// 已构建完成的活实例
    Instance(ComponentInstance),

    /// 声明式模板
    Template(TemplateDef),

    /// 同步工厂函数
    Factory(SyncFactory),

    /// 异步模块加载器
    Loader {
        /// 加载器标识，同时作为加载结果的缓存键
        key: String,
        /// 加载函数
        load: AsyncLoader,
    },
}

impl ComponentRef {
    /// 从标签名创建引用
    pub fn tag(tag: impl Into<String>) -> Self {
        ComponentRef::Tag(tag.into())
    }

    /// 从同步工厂创建引用
    pub fn factory(f: impl Fn() -> Result<ComponentInstance> + Send + Sync + 'static) -> Self {
        ComponentRef::Factory(Arc::new(f))
    }

    /// 从异步加载器创建引用
    pub fn loader(
        key: impl Into<String>,
        load: impl Fn() -> BoxFuture<'static, Result<Arc<dyn ComponentCtor>>>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        ComponentRef::Loader {
            key: key.into(),
            load: Arc::new(load),
        }
    }

    /// 引用形式名称（用于日志）
    pub fn kind(&self) -> &'static str {
        match self {
            ComponentRef::Tag(_) => "tag",
            ComponentRef::Ctor(_) => "ctor",
            ComponentRef::Instance(_) => "instance",
            ComponentRef::Template(_) => "template",
            ComponentRef::Factory(_) => "factory",
            ComponentRef::Loader { .. } => "loader",
        }
    }
}

impl fmt::Debug for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentRef::Tag(tag) => f.debug_tuple("Tag").field(tag).finish(),
            ComponentRef::Ctor(ctor) => f.debug_tuple("Ctor").field(&ctor.tag()).finish(),
            ComponentRef::Instance(inst) => f.debug_tuple("Instance").field(inst).finish(),
            ComponentRef::Template(t) => f.debug_tuple("Template").field(&t.tag).finish(),
            ComponentRef::Factory(_) => f.write_str("Factory(..)"),
            ComponentRef::Loader { key, .. } => f.debug_struct("Loader").field("key", key).finish(),
        }
    }
}

impl From<&str> for ComponentRef {
    fn from(tag: &str) -> Self {
        ComponentRef::Tag(tag.to_string())
    }
}

impl From<String> for ComponentRef {
    fn from(tag: String) -> Self {
        ComponentRef::Tag(tag)
    }
}

impl From<ComponentInstance> for ComponentRef {
    fn from(instance: ComponentInstance) -> Self {
        ComponentRef::Instance(instance)
    }
}

impl From<TemplateDef> for ComponentRef {
    fn from(template: TemplateDef) -> Self {
        ComponentRef::Template(template)
    }
}
