//! 工具模块
//!
//! 包含错误类型、ID 生成和日志系统。

pub mod error;
pub mod id;
pub mod logger;

pub use error::{error_code, NavError, Result};
pub use id::{generate_id, generate_uuid, is_valid_id};
pub use logger::{LogGuard, Logger, LoggerConfig, LoggerConfigBuilder, RotationStrategy};
