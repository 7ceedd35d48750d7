//! 核心模块
//!
//! 包含编排器配置。

pub mod config;

pub use config::{
    LoaderConfig, LogConfig, ModuleConfig, OrchestratorConfig, OrchestratorConfigBuilder,
    ResolutionConfig,
};
