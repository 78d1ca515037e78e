//! 区域出口模块
//!
//! 声明表、传送协议与出口本体。

pub mod declaration;
pub mod outlet;
pub mod teleport;

pub use declaration::{DeclarationTable, RouteDeclaration, RouteGuard};
pub use outlet::{AreaOutlet, OutletConfig, DEFAULT_GUARD_TIMEOUT_SECS};
pub use teleport::{TeleportBroker, DEFAULT_DISCOVER_TIMEOUT_MS};
