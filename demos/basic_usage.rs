//! 基本使用示例
//!
//! 本示例展示了罗盘导航核心的基本使用方法，包括：
//!
//! - 创建并启动导航核心
//! - 附加区域出口（声明表、守卫、默认组件）
//! - 命令式与声明式导航
//! - URL 位置镜像与历史回退
//!
//! # 运行示例
//!
//! ```bash
//! cargo run --example basic_usage
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use luopan::{
    CoreConfig, HistoryStrategy, Logger, LoggerConfig, NavigationCore, NavigationIntent,
    RouteDeclaration,
};
use serde_json::json;

/// 主函数
///
/// 演示罗盘导航核心的基本用法。
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== 罗盘导航核心基本使用示例 ===\n");

    // -------------------------------------------------------------------------
    // 1. 创建并启动核心
    // -------------------------------------------------------------------------
    println!("1. 创建导航核心...");

    let config = CoreConfig::builder()
        .primary_area("main")
        .initial_location("/")
        .log_level("info")
        .build();
    let _log_guard = Logger::try_init(LoggerConfig::from_log_config(&config.logging));
    println!("   - 主区域: {}", config.history.primary_area);
    println!("   - 守卫超时: {}ms", config.registry.guard_timeout_ms);

    let core = NavigationCore::new(config)?;
    core.define_component("list-panel")?;
    core.define_component("detail-panel")?;
    core.define_component("admin-panel")?;
    core.define_component("nav-tree")?;

    core.start().await?;
    println!("   ✅ 核心已启动（状态: {:?}）\n", core.state().await);

    // -------------------------------------------------------------------------
    // 2. 附加出口
    // -------------------------------------------------------------------------
    println!("2. 附加区域出口...");

    // main 区域：声明表 + 一条拒绝未授权访问的守卫
    let main = core.outlet("main");
    main.set_declarations(vec![
        RouteDeclaration::exact("list", "list-panel"),
        RouteDeclaration::exact("detail", "detail-panel"),
        RouteDeclaration::exact("admin", "admin-panel").with_guard(Arc::new(
            |intent: &NavigationIntent| {
                let authorized = intent
                    .state
                    .as_ref()
                    .and_then(|s| s.get("admin"))
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                futures::future::ready(authorized).boxed()
            },
        )),
    ]);
    main.attach().await?;

    // sidebar 区域：默认组件，无意图时静默挂载
    let sidebar = core.outlet("sidebar");
    sidebar.set_default_component("nav-tree");
    sidebar.attach().await?;
    println!("   ✅ main 与 sidebar 已附加\n");

    // -------------------------------------------------------------------------
    // 3. 命令式导航（携带状态）
    // -------------------------------------------------------------------------
    println!("3. 命令式导航到 detail-panel...");

    core.push(
        NavigationIntent::to_component("main", "detail-panel").with_state(json!({"id": 42})),
    )
    .await?;
    wait_for(&core, "main", "detail-panel").await;

    let location = core.bridge().unwrap().current_location().await;
    println!("   当前位置: {}", location);
    println!("   ✅ 状态已作为 URL 安全令牌编码\n");

    // -------------------------------------------------------------------------
    // 4. 声明式导航与守卫
    // -------------------------------------------------------------------------
    println!("4. 声明式导航...");

    core.push(NavigationIntent::to_route("main", "list")).await?;
    wait_for(&core, "main", "list-panel").await;
    println!("   路由键 \"list\" 命中 list-panel");

    // 未授权访问 admin 会被守卫拒绝，当前路由保持不变
    core.push(NavigationIntent::to_route("main", "admin")).await?;
    tokio::time::sleep(Duration::from_millis(100)).await;
    let current = core.current_state("main").map(|r| r.component);
    println!("   未授权访问 admin 被拒绝，当前仍是: {:?}", current);

    core.push(
        NavigationIntent::to_route("main", "admin").with_state(json!({"admin": true})),
    )
    .await?;
    wait_for(&core, "main", "admin-panel").await;
    println!("   ✅ 携带授权状态后放行\n");

    // -------------------------------------------------------------------------
    // 5. 历史回退与静默导航
    // -------------------------------------------------------------------------
    println!("5. 历史回退...");

    core.pop("main").await?;
    wait_for(&core, "main", "list-panel").await;
    println!("   回退后: {}", core.bridge().unwrap().current_location().await);

    core.push(
        NavigationIntent::to_component("main", "detail-panel")
            .with_strategy(HistoryStrategy::Silent),
    )
    .await?;
    wait_for(&core, "main", "detail-panel").await;
    println!(
        "   静默导航不触碰位置: {}",
        core.bridge().unwrap().current_location().await
    );

    // -------------------------------------------------------------------------
    // 6. 统计与收尾
    // -------------------------------------------------------------------------
    let stats = core.stats();
    println!("\n6. 统计信息:");
    println!("   - 导航次数: {}", stats.pushes);
    println!("   - 重复丢弃: {}", stats.duplicate_drops);
    println!("   - 解析失败: {}", stats.resolution_errors);
    println!("   - 守卫拒绝: {}", stats.guard_rejections);

    core.shutdown().await?;
    println!("\n✅ 核心已关闭");
    Ok(())
}

/// 等待区域挂载指定组件
async fn wait_for(core: &NavigationCore, area: &str, component: &str) {
    let mut rx = core.subscribe_state(area);
    tokio::time::timeout(Duration::from_secs(3), async {
        loop {
            {
                let current = rx.borrow_and_update();
                if current.as_ref().map(|r| r.component == component) == Some(true) {
                    return;
                }
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("等待 {} 挂载 {} 超时", area, component));
}
