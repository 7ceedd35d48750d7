//! 编排器错误类型定义
//!
//! 本模块定义了编排器中使用的所有错误类型。

use thiserror::Error;

use crate::module::dependency::GraphError;
use crate::module::lifecycle::{LifecyclePhase, ModuleState, PhaseFailure};

/// 编排器核心错误类型
#[derive(Error, Debug)]
pub enum CoreError {
    // ==================== 版本与清单错误 ====================

    /// 版本号格式错误（必须是三段非负整数）
    #[error("版本号格式错误: '{input}' - {reason}")]
    MalformedVersion {
        input: String,
        reason: String,
    },

    /// 无效的模块清单
    #[error("无效的模块清单: {0}")]
    InvalidManifest(String),

    /// 模块未注册
    #[error("模块未注册: '{0}'")]
    ModuleNotFound(String),

    // ==================== 依赖解析错误 ====================

    /// 依赖图校验失败（包含全部问题）
    #[error("依赖解析失败: {0}")]
    DependencyResolution(GraphError),

    // ==================== 生命周期错误 ====================

    /// 前向阶段钩子失败
    #[error("{0}")]
    PhaseFailed(PhaseFailure),

    /// 停止阶段的失败汇总
    #[error("停止阶段共有 {} 个模块失败: {}", .0.len(), format_failures(.0))]
    StopFailed(Vec<PhaseFailure>),

    /// 阶段转换不合法
    #[error("模块 '{module_id}' 处于 {from} 状态，无法进入 {to} 阶段")]
    InvalidPhaseTransition {
        module_id: String,
        from: ModuleState,
        to: LifecyclePhase,
    },

    /// 操作被取消
    #[error("{phase} 阶段在模块 '{module_id}' 之前被取消")]
    Cancelled {
        phase: LifecyclePhase,
        module_id: String,
    },

    // ==================== 隔离单元错误 ====================

    /// 单元加载失败
    #[error("单元加载失败: '{unit_id}' - {reason}")]
    LoadFailed {
        unit_id: String,
        reason: String,
    },

    /// 单元卸载后回收未确认（非致命）
    #[error("单元 '{unit_id}' 已释放，但在 {attempts} 次探测后仍未确认回收")]
    UnloadTimeout {
        unit_id: String,
        attempts: u32,
    },

    /// 同一单元已有操作在进行中
    #[error("单元 '{0}' 正在执行其他操作")]
    ConcurrentOperationRejected(String),

    /// 单元未加载
    #[error("单元未加载: '{0}'")]
    UnitNotLoaded(String),

    /// 单元已加载
    #[error("单元已加载: '{0}'")]
    UnitAlreadyLoaded(String),

    // ==================== 配置错误 ====================

    /// 配置加载失败
    #[error("配置加载失败: {0}")]
    ConfigLoadFailed(String),

    /// 配置值无效
    #[error("配置值无效: '{key}' - {reason}")]
    InvalidConfigValue {
        key: String,
        reason: String,
    },

    // ==================== IO 和序列化错误 ====================

    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 序列化/反序列化错误
    #[error("JSON 错误: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML 序列化/反序列化错误
    #[error("YAML 错误: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // ==================== 通用错误 ====================

    /// 初始化失败
    #[error("初始化失败: {0}")]
    InitFailed(String),

    /// 其他错误
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

fn format_failures(failures: &[PhaseFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// 编排器操作结果类型别名
pub type Result<T> = std::result::Result<T, CoreError>;

impl From<GraphError> for CoreError {
    fn from(err: GraphError) -> Self {
        CoreError::DependencyResolution(err)
    }
}

impl From<PhaseFailure> for CoreError {
    fn from(failure: PhaseFailure) -> Self {
        CoreError::PhaseFailed(failure)
    }
}

/// 错误码常量
pub mod error_code {
    // 版本与清单错误 (MANIFEST-xxx)
    pub const MANIFEST_MALFORMED_VERSION: &str = "MANIFEST-001";
    pub const MANIFEST_INVALID: &str = "MANIFEST-002";

    // 模块错误 (MODULE-xxx)
    pub const MODULE_NOT_FOUND: &str = "MODULE-001";
    pub const MODULE_PHASE_FAILED: &str = "MODULE-002";
    pub const MODULE_STOP_FAILED: &str = "MODULE-003";
    pub const MODULE_INVALID_TRANSITION: &str = "MODULE-004";
    pub const MODULE_DEPENDENCY_RESOLUTION: &str = "MODULE-005";
    pub const MODULE_CANCELLED: &str = "MODULE-006";

    // 单元错误 (UNIT-xxx)
    pub const UNIT_LOAD_FAILED: &str = "UNIT-001";
    pub const UNIT_UNLOAD_TIMEOUT: &str = "UNIT-002";
    pub const UNIT_OPERATION_IN_PROGRESS: &str = "UNIT-003";
    pub const UNIT_NOT_LOADED: &str = "UNIT-004";
    pub const UNIT_ALREADY_LOADED: &str = "UNIT-005";

    // 配置错误 (CONFIG-xxx)
    pub const CONFIG_LOAD_FAILED: &str = "CONFIG-001";
    pub const CONFIG_INVALID_VALUE: &str = "CONFIG-002";

    // 核心错误 (CORE-xxx)
    pub const CORE_IO: &str = "CORE-001";
    pub const CORE_SERIALIZATION: &str = "CORE-002";
    pub const CORE_INIT_FAILED: &str = "CORE-003";
    pub const CORE_UNKNOWN: &str = "CORE-999";
}

impl CoreError {
    /// 获取错误码
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::MalformedVersion { .. } => error_code::MANIFEST_MALFORMED_VERSION,
            CoreError::InvalidManifest(_) => error_code::MANIFEST_INVALID,
            CoreError::ModuleNotFound(_) => error_code::MODULE_NOT_FOUND,
            CoreError::DependencyResolution(_) => error_code::MODULE_DEPENDENCY_RESOLUTION,
            CoreError::PhaseFailed(_) => error_code::MODULE_PHASE_FAILED,
            CoreError::StopFailed(_) => error_code::MODULE_STOP_FAILED,
            CoreError::InvalidPhaseTransition { .. } => error_code::MODULE_INVALID_TRANSITION,
            CoreError::Cancelled { .. } => error_code::MODULE_CANCELLED,
            CoreError::LoadFailed { .. } => error_code::UNIT_LOAD_FAILED,
            CoreError::UnloadTimeout { .. } => error_code::UNIT_UNLOAD_TIMEOUT,
            CoreError::ConcurrentOperationRejected(_) => error_code::UNIT_OPERATION_IN_PROGRESS,
            CoreError::UnitNotLoaded(_) => error_code::UNIT_NOT_LOADED,
            CoreError::UnitAlreadyLoaded(_) => error_code::UNIT_ALREADY_LOADED,
            CoreError::ConfigLoadFailed(_) => error_code::CONFIG_LOAD_FAILED,
            CoreError::InvalidConfigValue { .. } => error_code::CONFIG_INVALID_VALUE,
            CoreError::Io(_) => error_code::CORE_IO,
            CoreError::Json(_) | CoreError::Yaml(_) => error_code::CORE_SERIALIZATION,
            CoreError::InitFailed(_) => error_code::CORE_INIT_FAILED,
            CoreError::Other(_) => error_code::CORE_UNKNOWN,
        }
    }

    /// 是否为非致命错误
    ///
    /// 目前只有回收未确认属于软错误，单元在逻辑上已经卸载。
    pub fn is_soft(&self) -> bool {
        matches!(self, CoreError::UnloadTimeout { .. })
    }

    /// 错误涉及的模块或单元 ID（如果有）
    pub fn module_id(&self) -> Option<&str> {
        match self {
            CoreError::ModuleNotFound(id)
            | CoreError::ConcurrentOperationRejected(id)
            | CoreError::UnitNotLoaded(id)
            | CoreError::UnitAlreadyLoaded(id) => Some(id),
            CoreError::PhaseFailed(failure) => Some(&failure.module_id),
            CoreError::InvalidPhaseTransition { module_id, .. }
            | CoreError::Cancelled { module_id, .. } => Some(module_id),
            CoreError::LoadFailed { unit_id, .. } | CoreError::UnloadTimeout { unit_id, .. } => {
                Some(unit_id)
            }
            _ => None,
        }
    }
}
