//! 组件模型与解析器
//!
//! 包含组件实例、构造器、注册表、组件引用联合和统一的异步解析路径。

pub mod instance;
pub mod reference;
pub mod resolver;

pub use instance::{ComponentCtor, ComponentInstance, ComponentRegistry, FnCtor};
pub use reference::{AsyncLoader, ComponentRef, SyncFactory, TemplateDef};
pub use resolver::{ComponentResolver, ResolverStats};
