//! 组件解析器
//!
//! 将任意形式的组件引用归一化为可挂载的组件实例。
//! 即使输入同步可得，解析也走同一条异步路径，调用方只有一种代码路径。
//!
//! 解析器本身不做"过期结果"判断：序列令牌检查由出口在提交前完成
//! （见 outlet 模块），解析器只负责把引用变成实例。

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use lru::LruCache;
use tracing::{debug, warn};

use super::instance::{ComponentCtor, ComponentInstance, ComponentRegistry};
use super::reference::ComponentRef;
use crate::utils::{NavError, Result};

/// 默认加载器缓存容量
const DEFAULT_LOADER_CACHE_CAPACITY: usize = 64;

/// 解析统计快照
#[derive(Debug, Clone)]
pub struct ResolverStats {
    /// 总解析次数
    pub total: u64,
    /// 失败次数
    pub failures: u64,
    /// 加载器缓存命中次数
    pub loader_cache_hits: u64,
    /// 加载器缓存未命中次数
    pub loader_cache_misses: u64,
}

/// 组件解析器
pub struct ComponentResolver {
    /// 组件注册表（标签 → 构造器）
    registry: Arc<ComponentRegistry>,

    /// 异步加载结果缓存（加载器 key → 构造器）
    loader_cache: Mutex<LruCache<String, Arc<dyn ComponentCtor>>>,

    /// 总解析次数
    total: AtomicU64,
    /// 失败次数
    failures: AtomicU64,
    /// 缓存命中
    cache_hits: AtomicU64,
    /// 缓存未命中
    cache_misses: AtomicU64,
}

impl ComponentResolver {
    /// 创建解析器
    pub fn new(registry: Arc<ComponentRegistry>) -> Self {
        Self::with_cache_capacity(registry, DEFAULT_LOADER_CACHE_CAPACITY)
    }

    /// 使用指定缓存容量创建解析器
    pub fn with_cache_capacity(registry: Arc<ComponentRegistry>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            registry,
            loader_cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
            total: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
        }
    }

    /// 组件注册表引用
    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    /// 解析组件引用
    ///
    /// 六种引用形式统一归一化为组件实例：
    ///
    /// - `Tag` 查注册表后构建
    /// - `Ctor` 直接构建
    /// - `Instance` 原样返回（身份保留）
    /// - `Template` 查注册表构建后注入初始状态，注册表无此标签时退化为裸实例
    /// - `Factory` 同步调用
    /// - `Loader` 异步加载（结果按 key 进 LRU 缓存）后构建
    ///
    /// # Errors
    ///
    /// 未知标签、工厂失败或加载失败时返回相应错误；
    /// 错误由出口边界捕获，不会进入共享通道。
    pub async fn resolve(&self, reference: &ComponentRef) -> Result<ComponentInstance> {
        self.total.fetch_add(1, Ordering::Relaxed);

        let result = self.resolve_inner(reference).await;
        if result.is_err() {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    async fn resolve_inner(&self, reference: &ComponentRef) -> Result<ComponentInstance> {
        match reference {
            ComponentRef::Tag(tag) => {
                let ctor = self
                    .registry
                    .get(tag)
                    .ok_or_else(|| NavError::UnknownTag(tag.clone()))?;
                Ok(ctor.build())
            }

            ComponentRef::Ctor(ctor) => Ok(ctor.build()),

            ComponentRef::Instance(instance) => Ok(instance.clone()),

            ComponentRef::Template(template) => {
                let instance = match self.registry.get(&template.tag) {
                    Some(ctor) => ctor.build(),
                    None => ComponentInstance::new(&template.tag),
                };
                if !template.initial_state.is_null() {
                    instance.set_state(template.initial_state.clone());
                }
                Ok(instance)
            }

            ComponentRef::Factory(factory) => factory(),

            ComponentRef::Loader { key, load } => {
                let ctor = self.load_module(key, load).await?;
                Ok(ctor.build())
            }
        }
    }

    /// 加载异步模块（带缓存）
    async fn load_module(
        &self,
        key: &str,
        load: &super::reference::AsyncLoader,
    ) -> Result<Arc<dyn ComponentCtor>> {
        // 缓存命中则跳过加载
        if let Ok(mut cache) = self.loader_cache.lock() {
            if let Some(ctor) = cache.get(key) {
                self.cache_hits.fetch_add(1, Ordering::Relaxed);
                debug!(key, "加载器缓存命中");
                return Ok(ctor.clone());
            }
        }
        self.cache_misses.fetch_add(1, Ordering::Relaxed);

        let ctor = load().await.map_err(|e| {
            warn!(key, error = %e, "组件模块加载失败");
            NavError::LoadFailed {
                key: key.to_string(),
                reason: e.to_string(),
            }
        })?;

        if let Ok(mut cache) = self.loader_cache.lock() {
            cache.put(key.to_string(), ctor.clone());
        }

        Ok(ctor)
    }

    /// 获取统计快照
    pub fn stats(&self) -> ResolverStats {
        ResolverStats {
            total: self.total.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            loader_cache_hits: self.cache_hits.load(Ordering::Relaxed),
            loader_cache_misses: self.cache_misses.load(Ordering::Relaxed),
        }
    }

    /// 清空加载器缓存
    pub fn clear_loader_cache(&self) {
        if let Ok(mut cache) = self.loader_cache.lock() {
            cache.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::instance::FnCtor;
    use crate::component::reference::TemplateDef;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn resolver_with(tags: &[&str]) -> ComponentResolver {
        let registry = Arc::new(ComponentRegistry::new());
        for tag in tags {
            registry.define_tag(*tag).unwrap();
        }
        ComponentResolver::new(registry)
    }

    #[tokio::test]
    async fn test_resolve_tag() {
        let resolver = resolver_with(&["detail-panel"]);
        let instance = resolver
            .resolve(&ComponentRef::tag("detail-panel"))
            .await
            .unwrap();
        assert_eq!(instance.tag(), "detail-panel");
    }

    #[tokio::test]
    async fn test_resolve_unknown_tag() {
        let resolver = resolver_with(&[]);
        let result = resolver.resolve(&ComponentRef::tag("missing")).await;
        assert!(matches!(result, Err(NavError::UnknownTag(_))));
        assert_eq!(resolver.stats().failures, 1);
    }

    #[tokio::test]
    async fn test_resolve_instance_preserves_identity() {
        let resolver = resolver_with(&[]);
        let original = ComponentInstance::new("live-panel");
        let resolved = resolver
            .resolve(&ComponentRef::Instance(original.clone()))
            .await
            .unwrap();
        assert!(resolved.same_instance(&original));
    }

    #[tokio::test]
    async fn test_resolve_template_injects_state() {
        let resolver = resolver_with(&["user-card"]);
        let template = TemplateDef::new("user-card").with_initial_state(json!({"id": 9}));
        let instance = resolver
            .resolve(&ComponentRef::Template(template))
            .await
            .unwrap();
        assert_eq!(instance.tag(), "user-card");
        assert_eq!(instance.state(), json!({"id": 9}));
    }

    #[tokio::test]
    async fn test_resolve_factory_error() {
        let resolver = resolver_with(&[]);
        let reference = ComponentRef::factory(|| {
            Err(NavError::ResolveFailed {
                tag: "broken".to_string(),
                reason: "no luck".to_string(),
            })
        });
        assert!(resolver.resolve(&reference).await.is_err());
    }

    #[tokio::test]
    async fn test_loader_cached_by_key() {
        let resolver = resolver_with(&[]);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        let reference = ComponentRef::loader("mod-a", move || {
            let calls = calls_clone.clone();
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(FnCtor::bare("lazy-panel")) as Arc<dyn ComponentCtor>)
            })
        });

        let a = resolver.resolve(&reference).await.unwrap();
        let b = resolver.resolve(&reference).await.unwrap();

        assert_eq!(a.tag(), "lazy-panel");
        // 模块只加载一次，实例各自独立
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!a.same_instance(&b));
        assert_eq!(resolver.stats().loader_cache_hits, 1);
    }

    #[tokio::test]
    async fn test_loader_failure_not_cached() {
        let resolver = resolver_with(&[]);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        let reference = ComponentRef::loader("mod-b", move || {
            let calls = calls_clone.clone();
            Box::pin(async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    Err(NavError::Internal("network down".to_string()))
                } else {
                    Ok(Arc::new(FnCtor::bare("late-panel")) as Arc<dyn ComponentCtor>)
                }
            })
        });

        assert!(resolver.resolve(&reference).await.is_err());
        // 第二次重新加载成功
        let instance = resolver.resolve(&reference).await.unwrap();
        assert_eq!(instance.tag(), "late-panel");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
