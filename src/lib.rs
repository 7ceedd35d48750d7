//! # Chips Orchestrator - 模块编排器
//!
//! 决定独立开发的模块以什么顺序激活、校验模块之间的版本兼容性，
//! 并在运行时安全地加载和卸载可替换的代码单元：
//!
//! - **依赖解析**: 校验缺失依赖、版本过低与循环依赖，一次报告全部问题，给出确定性的激活顺序
//! - **生命周期编排**: 配置、初始化、启动三个阶段屏障，按逆序停止
//! - **隔离单元**: 每个单元运行在自己的隔离边界中，支持卸载与热重载
//! - **配置管理**: YAML / JSON 配置文件
//! - **日志系统**: 结构化日志记录
//!
//! ## 快速开始
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use chips_orchestrator::{
//!     Dependency, Manifest, ModuleManager, NoopHooks, OrchestratorConfig,
//!     StaticSourceLocator, VersionSpec,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut manager = ModuleManager::new(
//!         OrchestratorConfig::default(),
//!         Arc::new(StaticSourceLocator::new()),
//!     )?;
//!
//!     manager.register_static(Manifest::new("core", "Core", VersionSpec::new(1, 0, 0)), NoopHooks)?;
//!     manager.register_static(
//!         Manifest::new("mail", "Mail", VersionSpec::new(1, 0, 0))
//!             .with_dependency(Dependency::required("core")),
//!         NoopHooks,
//!     )?;
//!
//!     let order = manager.activate().await?;
//!     println!("激活顺序: {}", order);
//!
//!     manager.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## 模块结构
//!
//! - `module` - 清单、依赖图、生命周期编排与隔离单元加载
//! - `core` - 编排器配置
//! - `utils` - 错误类型、ID 生成与日志

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod core;
pub mod module;
pub mod utils;

// 重导出常用类型，方便使用
pub use module::{
    ActivationOrder, CodeUnit, Dependency, DependencyGraph, FnHooks, GraphError, GraphIssue,
    IsolatedUnitLoader, LifecycleOrchestrator, LifecyclePhase, LoadableUnit, Manifest,
    ManifestParser, ModuleHooks, ModuleManager, ModuleRegistry, ModuleSettings, ModuleState,
    NoopHooks, PhaseContext, PhaseFailure, ReclamationStatus, ResolutionMode, SettingsProvider,
    SourceLocator, StaticSettingsProvider, StaticSourceLocator, UnitContext, UnitEvent,
    UnitEventKind, UnitHandle, UnitState, UnloadReport, VersionSpec,
};

pub use utils::logger::{fields, LogGuard, Logger, LoggerConfig, LoggerConfigBuilder, RotationStrategy};
pub use utils::{error_code, generate_boundary_id, generate_id, generate_uuid, CoreError, Result};

pub use crate::core::config::{
    LoaderConfig, LogConfig, ModuleConfig, OrchestratorConfig, OrchestratorConfigBuilder,
    ResolutionConfig,
};

/// 库版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
