//! 工具模块
//!
//! 包含错误类型、ID 生成与日志系统。

pub mod error;
pub mod id;
pub mod logger;

// 重导出常用类型
pub use error::{error_code, CoreError, Result};
pub use id::{generate_boundary_id, generate_id, generate_uuid};
pub use logger::{fields, unit_span, LogGuard, Logger, LoggerConfig, LoggerConfigBuilder, RotationStrategy};
