//! 出口与注册表集成测试

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde_json::json;

use luopan::{
    nav_events, ActiveRoute, ComponentRef, CoreConfig, NavError, NavigationCore,
    NavigationIntent, RouteDeclaration,
};

/// 静默模式核心，预注册常用组件
fn silent_core() -> NavigationCore {
    let core = NavigationCore::new(CoreConfig::builder().silent().build()).unwrap();
    for tag in ["detail-panel", "list-panel", "settings-panel", "nav-tree"] {
        core.define_component(tag).unwrap();
    }
    core
}

/// 等待区域挂载指定组件
async fn wait_for_component(core: &NavigationCore, area: &str, component: &str) -> ActiveRoute {
    let mut rx = core.subscribe_state(area);
    tokio::time::timeout(Duration::from_secs(3), async {
        loop {
            {
                let current = rx.borrow_and_update();
                if let Some(route) = current.as_ref() {
                    if route.component == component {
                        return route.clone();
                    }
                }
            }
            rx.changed().await.unwrap();
        }
    })
    .await
    .unwrap_or_else(|_| panic!("等待 {} 挂载 {} 超时", area, component))
}

#[tokio::test]
async fn test_imperative_navigation_mounts_component() {
    let core = silent_core();
    core.start().await.unwrap();
    core.outlet("main").attach().await.unwrap();

    core.push(
        NavigationIntent::to_component("main", "detail-panel").with_state(json!({"id": 42})),
    )
    .await
    .unwrap();

    let route = wait_for_component(&core, "main", "detail-panel").await;
    assert_eq!(route.state, Some(json!({"id": 42})));
}

#[tokio::test]
async fn test_late_outlet_replays_pending_intent() {
    let core = silent_core();
    core.start().await.unwrap();

    // 意图先于出口到达，保留在槽内
    core.push(NavigationIntent::to_component("main", "detail-panel"))
        .await
        .unwrap();

    core.outlet("main").attach().await.unwrap();
    wait_for_component(&core, "main", "detail-panel").await;
}

#[tokio::test]
async fn test_idempotent_intent_is_dropped() {
    let core = silent_core();
    core.start().await.unwrap();

    let mounts = Arc::new(AtomicUsize::new(0));
    let mounts_clone = Arc::clone(&mounts);
    core.subscribe_events(
        "host",
        nav_events::MOUNTED,
        None,
        Arc::new(move |_| {
            mounts_clone.fetch_add(1, Ordering::SeqCst);
        }),
    )
    .await
    .unwrap();

    core.outlet("main").attach().await.unwrap();
    let intent = NavigationIntent::to_component("main", "detail-panel")
        .with_state(json!({"id": 1}));
    core.push(intent.clone()).await.unwrap();
    wait_for_component(&core, "main", "detail-panel").await;

    // 结构相同的意图不触发第二次挂载
    core.push(NavigationIntent::to_component("main", "detail-panel").with_state(json!({"id": 1})))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(mounts.load(Ordering::SeqCst), 1);

    // 状态不同的意图照常挂载
    core.push(NavigationIntent::to_component("main", "detail-panel").with_state(json!({"id": 2})))
        .await
        .unwrap();
    tokio::time::timeout(Duration::from_secs(2), async {
        while mounts.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_rapid_pushes_last_value_wins() {
    let core = silent_core();
    core.start().await.unwrap();
    core.outlet("main").attach().await.unwrap();

    // 慢加载器让第一条意图在解析中被第二条覆盖
    let slow = ComponentRef::loader("slow-module", || {
        async {
            tokio::time::sleep(Duration::from_millis(150)).await;
            Ok(Arc::new(luopan::FnCtor::bare("slow-panel"))
                as Arc<dyn luopan::ComponentCtor>)
        }
        .boxed()
    });

    core.push(NavigationIntent::to_component("main", slow))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    core.push(NavigationIntent::to_component("main", "detail-panel"))
        .await
        .unwrap();

    let route = wait_for_component(&core, "main", "detail-panel").await;
    assert_eq!(route.component, "detail-panel");

    // 慢解析的结果按序号丢弃，绝不覆盖后来的导航
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(core.current_state("main").unwrap().component, "detail-panel");
    assert!(core.stats().stale_drops >= 1);
}

#[tokio::test]
async fn test_areas_are_independent() {
    let core = silent_core();
    core.start().await.unwrap();
    core.outlet("main").attach().await.unwrap();
    core.outlet("sidebar").attach().await.unwrap();

    core.push(NavigationIntent::to_component("main", "detail-panel"))
        .await
        .unwrap();
    core.push(NavigationIntent::to_component("sidebar", "nav-tree"))
        .await
        .unwrap();

    wait_for_component(&core, "main", "detail-panel").await;
    wait_for_component(&core, "sidebar", "nav-tree").await;

    // main 的后续导航不影响 sidebar
    core.push(NavigationIntent::to_component("main", "list-panel"))
        .await
        .unwrap();
    wait_for_component(&core, "main", "list-panel").await;
    assert_eq!(core.current_state("sidebar").unwrap().component, "nav-tree");
}

#[tokio::test]
async fn test_declarative_navigation_with_guard() {
    let core = silent_core();
    core.start().await.unwrap();

    let outlet = core.outlet("main");
    outlet.set_declarations(vec![
        RouteDeclaration::exact("settings", "settings-panel"),
        RouteDeclaration::exact("locked", "detail-panel")
            .with_guard(Arc::new(|_: &NavigationIntent| {
                futures::future::ready(false).boxed()
            })),
    ]);
    outlet.attach().await.unwrap();

    // 被守卫拒绝的导航不挂载
    core.push(NavigationIntent::to_route("main", "locked"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(core.current_state("main").is_none());
    assert!(core.stats().guard_rejections >= 1);
    assert_eq!(core.stats().resolution_errors, 0);

    // 无守卫的声明照常命中
    core.push(NavigationIntent::to_route("main", "settings"))
        .await
        .unwrap();
    wait_for_component(&core, "main", "settings-panel").await;
}

#[tokio::test]
async fn test_async_guard_inspects_intent() {
    let core = silent_core();
    core.start().await.unwrap();

    let outlet = core.outlet("main");
    outlet.set_declarations(vec![RouteDeclaration::exact("detail", "detail-panel")
        .with_guard(Arc::new(|intent: &NavigationIntent| {
            let allowed = intent
                .state
                .as_ref()
                .and_then(|s| s.get("authorized"))
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                allowed
            }
            .boxed()
        }))]);
    outlet.attach().await.unwrap();

    core.push(
        NavigationIntent::to_route("main", "detail").with_state(json!({"authorized": false})),
    )
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(core.current_state("main").is_none());

    core.push(
        NavigationIntent::to_route("main", "detail").with_state(json!({"authorized": true})),
    )
    .await
    .unwrap();
    wait_for_component(&core, "main", "detail-panel").await;
}

#[tokio::test]
async fn test_resolution_error_keeps_previous_route() {
    let core = silent_core();
    core.start().await.unwrap();
    core.outlet("main").attach().await.unwrap();

    core.push(NavigationIntent::to_component("main", "detail-panel"))
        .await
        .unwrap();
    wait_for_component(&core, "main", "detail-panel").await;

    let errors = Arc::new(AtomicUsize::new(0));
    let errors_clone = Arc::clone(&errors);
    core.subscribe_events(
        "host",
        nav_events::NAV_ERROR,
        None,
        Arc::new(move |_| {
            errors_clone.fetch_add(1, Ordering::SeqCst);
        }),
    )
    .await
    .unwrap();

    // 未登记的标签解析失败
    core.push(NavigationIntent::to_component("main", "ghost-panel"))
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(2), async {
        while errors.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    // 上一个路由保留，槽保持可用
    assert_eq!(core.current_state("main").unwrap().component, "detail-panel");
    core.push(NavigationIntent::to_component("main", "list-panel"))
        .await
        .unwrap();
    wait_for_component(&core, "main", "list-panel").await;
}

#[tokio::test]
async fn test_duplicate_area_binding_is_rejected() {
    let core = silent_core();
    core.start().await.unwrap();

    core.outlet("main").attach().await.unwrap();
    let second = core.outlet("main");
    assert!(matches!(
        second.attach().await,
        Err(NavError::AreaAlreadyBound(_))
    ));
}

#[tokio::test]
async fn test_default_component_mounts_silently() {
    let core = silent_core();
    core.start().await.unwrap();

    let outlet = core.outlet("sidebar");
    outlet.set_default_component("nav-tree");
    outlet.attach().await.unwrap();

    wait_for_component(&core, "sidebar", "nav-tree").await;
}

#[tokio::test]
async fn test_factory_reference_resolves() {
    let core = silent_core();
    core.start().await.unwrap();
    core.outlet("main").attach().await.unwrap();

    let factory = ComponentRef::factory(|| {
        Ok(luopan::ComponentInstance::with_state(
            "factory-panel",
            json!({"built": true}),
        ))
    });
    core.push(NavigationIntent::to_component("main", factory))
        .await
        .unwrap();

    wait_for_component(&core, "main", "factory-panel").await;
}
