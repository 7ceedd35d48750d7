//! 模块管理模块
//!
//! 包含模块编排的核心组件：
//! - 版本号与模块清单
//! - 依赖图与激活顺序
//! - 生命周期钩子与编排器
//! - 隔离单元运行时与加载器
//! - 统一的模块管理器

pub mod dependency;
pub mod events;
pub mod hooks;
pub mod lifecycle;
pub mod loader;
pub mod manager;
pub mod manifest;
pub mod parser;
pub mod registry;
pub mod runtime;
pub mod settings;
pub mod version;

// 重导出常用类型
pub use dependency::{
    resolve, ActivationOrder, DependencyGraph, GraphError, GraphIssue, ResolutionMode,
};
pub use events::{UnitEvent, UnitEventKind};
pub use hooks::{FnHooks, ModuleHooks, NoopHooks, PhaseContext};
pub use lifecycle::{
    LifecycleOrchestrator, LifecyclePhase, ModuleRuntimeState, ModuleState, PhaseFailure,
};
pub use loader::{
    IsolatedUnitLoader, IsolationBoundary, ReclamationStatus, UnitGuard, UnitHandle, UnitState,
    UnloadReport,
};
pub use manager::ModuleManager;
pub use manifest::{Dependency, Manifest};
pub use parser::{ManifestFormat, ManifestParser};
pub use registry::{HookSource, ModuleRegistry};
pub use runtime::{CodeUnit, LoadableUnit, SourceLocator, StaticSourceLocator, UnitContext};
pub use settings::{ModuleSettings, SettingsProvider, StaticSettingsProvider};
pub use version::VersionSpec;
