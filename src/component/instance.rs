//! 组件实例与组件注册表
//!
//! 导航核心不负责渲染：组件实例是一个带标签、可变内部状态和稳定身份的
//! 引用计数单元，宿主在其上挂载真正的视图。挂载/卸载/传送移动的都是
//! 同一个 `Arc`，内部状态（滚动位置、未完成的工作等）随之保留。

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use serde_json::Value;

use crate::utils::{generate_id, NavError, Result};

/// 组件实例内部数据
struct InstanceInner {
    /// 实例唯一标识
    instance_id: String,

    /// 组件标签
    tag: String,

    /// 组件内部状态（路由状态之外的活数据，如滚动位置）
    state: RwLock<Value>,
}

/// 组件实例
///
/// 克隆只是增加引用计数；身份比较基于实例 ID。
#[derive(Clone)]
pub struct ComponentInstance {
    inner: Arc<InstanceInner>,
}

impl ComponentInstance {
    /// 创建新的组件实例
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(InstanceInner {
                instance_id: generate_id(),
                tag: tag.into(),
                state: RwLock::new(Value::Null),
            }),
        }
    }

    /// 创建带初始内部状态的实例
    pub fn with_state(tag: impl Into<String>, state: Value) -> Self {
        let instance = Self::new(tag);
        instance.set_state(state);
        instance
    }

    /// 实例唯一标识
    pub fn instance_id(&self) -> &str {
        &self.inner.instance_id
    }

    /// 组件标签
    pub fn tag(&self) -> &str {
        &self.inner.tag
    }

    /// 读取内部状态快照
    pub fn state(&self) -> Value {
        self.inner
            .state
            .read()
            .map(|s| s.clone())
            .unwrap_or(Value::Null)
    }

    /// 覆写内部状态
    pub fn set_state(&self, state: Value) {
        if let Ok(mut guard) = self.inner.state.write() {
            *guard = state;
        }
    }

    /// 判断两个句柄是否指向同一实例
    pub fn same_instance(&self, other: &ComponentInstance) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("instance_id", &self.inner.instance_id)
            .field("tag", &self.inner.tag)
            .finish()
    }
}

/// 组件构造器 trait
///
/// 宿主为每个标签实现此 trait 以创建新实例。
pub trait ComponentCtor: Send + Sync {
    /// 构造器产出的组件标签
    fn tag(&self) -> &str;

    /// 构建一个新实例
    fn build(&self) -> ComponentInstance;
}

/// 基于闭包的简单构造器
///
/// 大多数宿主用不着自定义 trait 实现，一个标签加闭包就够了。
pub struct FnCtor {
    tag: String,
    build_fn: Box<dyn Fn() -> ComponentInstance + Send + Sync>,
}

impl FnCtor {
    /// 创建闭包构造器
    pub fn new(
        tag: impl Into<String>,
        build_fn: impl Fn() -> ComponentInstance + Send + Sync + 'static,
    ) -> Self {
        Self {
            tag: tag.into(),
            build_fn: Box::new(build_fn),
        }
    }

    /// 创建"裸实例"构造器：仅按标签生成空实例
    pub fn bare(tag: impl Into<String>) -> Self {
        let tag = tag.into();
        let tag_clone = tag.clone();
        Self::new(tag, move || ComponentInstance::new(tag_clone.clone()))
    }
}

impl ComponentCtor for FnCtor {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn build(&self) -> ComponentInstance {
        (self.build_fn)()
    }
}

/// 组件注册表
///
/// 标签到构造器的映射（自定义元素注册表的角色）。
/// 同一标签重复注册是配置错误。
pub struct ComponentRegistry {
    ctors: RwLock<HashMap<String, Arc<dyn ComponentCtor>>>,
}

impl ComponentRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self {
            ctors: RwLock::new(HashMap::new()),
        }
    }

    /// 注册构造器
    ///
    /// # Errors
    ///
    /// 标签已存在时返回 `NavError::DuplicateTag`
    pub fn define(&self, ctor: Arc<dyn ComponentCtor>) -> Result<()> {
        let tag = ctor.tag().to_string();
        let mut ctors = self
            .ctors
            .write()
            .map_err(|_| NavError::Internal("组件注册表锁中毒".to_string()))?;
        if ctors.contains_key(&tag) {
            return Err(NavError::DuplicateTag(tag));
        }
        ctors.insert(tag, ctor);
        Ok(())
    }

    /// 便捷方法：注册一个裸标签
    pub fn define_tag(&self, tag: impl Into<String>) -> Result<()> {
        self.define(Arc::new(FnCtor::bare(tag)))
    }

    /// 查找构造器
    pub fn get(&self, tag: &str) -> Option<Arc<dyn ComponentCtor>> {
        self.ctors.read().ok()?.get(tag).cloned()
    }

    /// 标签是否已注册
    pub fn contains(&self, tag: &str) -> bool {
        self.ctors
            .read()
            .map(|c| c.contains_key(tag))
            .unwrap_or(false)
    }

    /// 已注册标签列表
    pub fn tags(&self) -> Vec<String> {
        self.ctors
            .read()
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_instance_identity() {
        let a = ComponentInstance::new("detail-panel");
        let b = a.clone();
        let c = ComponentInstance::new("detail-panel");

        assert!(a.same_instance(&b));
        assert!(!a.same_instance(&c));
        assert_eq!(a.instance_id(), b.instance_id());
        assert_ne!(a.instance_id(), c.instance_id());
    }

    #[test]
    fn test_instance_state_shared() {
        let a = ComponentInstance::new("detail-panel");
        let b = a.clone();

        a.set_state(json!({"scroll": 120}));
        assert_eq!(b.state(), json!({"scroll": 120}));
    }

    #[test]
    fn test_registry_define_and_build() {
        let registry = ComponentRegistry::new();
        registry.define_tag("detail-panel").unwrap();

        let ctor = registry.get("detail-panel").unwrap();
        let instance = ctor.build();
        assert_eq!(instance.tag(), "detail-panel");
    }

    #[test]
    fn test_registry_duplicate_tag() {
        let registry = ComponentRegistry::new();
        registry.define_tag("detail-panel").unwrap();

        let result = registry.define_tag("detail-panel");
        assert!(matches!(result, Err(NavError::DuplicateTag(_))));
    }

    #[test]
    fn test_registry_unknown_tag() {
        let registry = ComponentRegistry::new();
        assert!(registry.get("missing").is_none());
        assert!(!registry.contains("missing"));
    }

    #[test]
    fn test_fn_ctor_custom_build() {
        let ctor = FnCtor::new("user-card", || {
            ComponentInstance::with_state("user-card", json!({"ready": false}))
        });
        let instance = ctor.build();
        assert_eq!(instance.tag(), "user-card");
        assert_eq!(instance.state(), json!({"ready": false}));
    }
}
