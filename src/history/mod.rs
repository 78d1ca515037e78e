//! 历史模块
//!
//! 位置抽象、内存历史栈与历史桥。

pub mod bridge;
pub mod location;

pub use bridge::HistoryBridge;
pub use location::{DriverHandle, Location, LocationDriver, MemoryHistory};
