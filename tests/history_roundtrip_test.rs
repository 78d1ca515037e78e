//! 历史桥端到端测试
//!
//! 覆盖位置往返、回退正确性、启动播种、查询清除与状态清洗。

use std::time::Duration;

use serde_json::json;

use luopan::codec::decode_state;
use luopan::{
    ActiveRoute, ClearQuery, CoreConfig, HistoryStrategy, NavigationCore, NavigationIntent,
};

/// 历史模式核心
fn history_core(initial: &str) -> NavigationCore {
    let config = CoreConfig::builder()
        .primary_area("main")
        .initial_location(initial)
        .build();
    let core = NavigationCore::new(config).unwrap();
    for tag in ["detail-panel", "list-panel", "nav-tree"] {
        core.define_component(tag).unwrap();
    }
    core
}

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

async fn wait_for_path(core: &NavigationCore, path: &str) {
    let bridge = core.bridge().unwrap().clone();
    tokio::time::timeout(Duration::from_secs(3), async {
        loop {
            if bridge.current_location().await.path == path {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("等待位置 {} 超时", path));
}

#[tokio::test]
async fn test_worked_detail_panel_example() {
    // 规整的双区域场景：main 导航携带状态，sidebar 不动
    let core = history_core("/");
    core.start().await.unwrap();

    let main = core.outlet("main");
    main.attach().await.unwrap();
    let sidebar = core.outlet("sidebar");
    sidebar.set_default_component("nav-tree");
    sidebar.attach().await.unwrap();

    wait_for_component(&core, "sidebar", "nav-tree").await;

    core.push(
        NavigationIntent::to_component("main", "detail-panel").with_state(json!({"id": 42})),
    )
    .await
    .unwrap();
    wait_for_component(&core, "main", "detail-panel").await;
    wait_for_path(&core, "/detail-panel").await;

    let location = core.bridge().unwrap().current_location().await;
    assert_eq!(location.path, "/detail-panel");
    // sidebar 是 Silent 挂载的默认组件，不进入本次 Push 的位置时
    // 仍然作为活动路由被编码
    assert_eq!(location.param("sidebar"), Some("nav-tree"));

    let token = location.param("main.s").expect("主区域状态应被编码");
    assert_eq!(decode_state(token).unwrap(), json!({"id": 42}));
}

#[tokio::test]
async fn test_push_then_pop_restores_previous_route() {
    let core = history_core("/");
    core.start().await.unwrap();
    core.outlet("main").attach().await.unwrap();

    core.push(NavigationIntent::to_component("main", "list-panel"))
        .await
        .unwrap();
    wait_for_component(&core, "main", "list-panel").await;
    wait_for_path(&core, "/list-panel").await;

    core.push(NavigationIntent::to_component("main", "detail-panel"))
        .await
        .unwrap();
    wait_for_component(&core, "main", "detail-panel").await;
    wait_for_path(&core, "/detail-panel").await;

    core.pop("main").await.unwrap();
    wait_for_component(&core, "main", "list-panel").await;
    wait_for_path(&core, "/list-panel").await;

    // Pop 合成的意图绝不回写位置：再 pop 一次仍能回到根
    core.pop("main").await.unwrap();
    tokio::time::timeout(Duration::from_secs(3), async {
        loop {
            if core.bridge().unwrap().current_location().await.path == "/" {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_seed_restores_state_before_outlets_attach() {
    // 先用一个核心生成合法的 URL
    let seeded_url = {
        let core = history_core("/");
        core.start().await.unwrap();
        core.outlet("main").attach().await.unwrap();
        core.push(
            NavigationIntent::to_component("main", "detail-panel")
                .with_state(json!({"id": 7})),
        )
        .await
        .unwrap();
        wait_for_path(&core, "/detail-panel").await;
        core.bridge().unwrap().current_location().await.to_string()
    };

    // 用该 URL 冷启动：出口晚于播种附加，靠单槽回放恢复
    let core = history_core(&seeded_url);
    core.start().await.unwrap();
    core.outlet("main").attach().await.unwrap();

    let route = wait_for_component(&core, "main", "detail-panel").await;
    assert_eq!(route.state, Some(json!({"id": 7})));
}

#[tokio::test]
async fn test_malformed_state_token_falls_back() {
    let core = history_core("/detail-panel?main.s=!!!garbage!!!");
    core.start().await.unwrap();
    core.outlet("main").attach().await.unwrap();

    // 坏令牌只丢状态，组件照常挂载
    let route = wait_for_component(&core, "main", "detail-panel").await;
    assert_eq!(route.state, None);
}

#[tokio::test]
async fn test_replace_does_not_grow_history() {
    let core = history_core("/");
    core.start().await.unwrap();
    core.outlet("main").attach().await.unwrap();

    core.push(NavigationIntent::to_component("main", "list-panel"))
        .await
        .unwrap();
    wait_for_path(&core, "/list-panel").await;

    core.push(
        NavigationIntent::to_component("main", "detail-panel")
            .with_strategy(HistoryStrategy::Replace),
    )
    .await
    .unwrap();
    wait_for_path(&core, "/detail-panel").await;

    // Replace 覆盖了 /list-panel，pop 直接回根
    core.pop("main").await.unwrap();
    tokio::time::timeout(Duration::from_secs(3), async {
        loop {
            if core.bridge().unwrap().current_location().await.path == "/" {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_silent_strategy_skips_location() {
    let core = history_core("/");
    core.start().await.unwrap();
    core.outlet("main").attach().await.unwrap();

    core.push(
        NavigationIntent::to_component("main", "detail-panel")
            .with_strategy(HistoryStrategy::Silent),
    )
    .await
    .unwrap();
    wait_for_component(&core, "main", "detail-panel").await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(core.bridge().unwrap().current_location().await.path, "/");
}

#[tokio::test]
async fn test_clear_query_strips_only_this_navigation() {
    let core = history_core("/");
    core.start().await.unwrap();
    core.outlet("main").attach().await.unwrap();

    core.push(
        NavigationIntent::to_component("main", "detail-panel")
            .with_state(json!({"id": 9, "token": "secret"}))
            .with_clear_query(ClearQuery::Keys(vec!["token".to_string()])),
    )
    .await
    .unwrap();
    wait_for_path(&core, "/detail-panel").await;

    let location = core.bridge().unwrap().current_location().await;
    let state = decode_state(location.param("main.s").unwrap()).unwrap();
    // 敏感键不进 URL，活动路由本身不受影响
    assert_eq!(state, json!({"id": 9}));
    assert_eq!(
        core.current_state("main").unwrap().state,
        Some(json!({"id": 9, "token": "secret"}))
    );
}

#[tokio::test]
async fn test_unrepresentable_state_values_dropped() {
    let core = history_core("/");
    core.start().await.unwrap();
    core.outlet("main").attach().await.unwrap();

    core.push(
        NavigationIntent::to_component("main", "detail-panel")
            .with_state(json!({"id": 3, "ghost": null})),
    )
    .await
    .unwrap();
    wait_for_path(&core, "/detail-panel").await;

    let location = core.bridge().unwrap().current_location().await;
    let state = decode_state(location.param("main.s").unwrap()).unwrap();
    // null 值被丢弃而非写成会还原出错的占位
    assert_eq!(state, json!({"id": 3}));
}
