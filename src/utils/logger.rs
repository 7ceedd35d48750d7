//! 日志系统模块
//!
//! 基于 tracing 生态，为编排器提供：
//!
//! - 多级别日志与 `RUST_LOG` 过滤
//! - 控制台 Pretty / JSON 输出
//! - 按时间轮转的文件日志（异步非阻塞）
//! - 每个隔离单元独立的日志通道（[`unit_span`]）
//!
//! # 示例
//!
//! ```rust,no_run
//! use chips_orchestrator::utils::logger::{Logger, LoggerConfig, RotationStrategy};
//!
//! let config = LoggerConfig::builder()
//!     .level("debug")
//!     .file_output("./logs")
//!     .rotation(RotationStrategy::Hourly)
//!     .build();
//!
//! let _guard = Logger::init(config).unwrap();
//! tracing::info!(module_id = "mail", phase = "started", "模块已启动");
//! ```

use std::io;
use std::path::PathBuf;
use std::sync::OnceLock;

use tracing::Span;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::core::config::LogConfig;
use crate::utils::{CoreError, Result};

/// 默认日志文件前缀
const DEFAULT_FILE_PREFIX: &str = "chips-orchestrator";

// ============================================================================
// 日志轮转策略
// ============================================================================

/// 日志轮转策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RotationStrategy {
    /// 不轮转（单个日志文件）
    Never,
    /// 每分钟轮转（主要用于测试）
    Minutely,
    /// 每小时轮转
    Hourly,
    /// 每天轮转（默认）
    #[default]
    Daily,
}

impl RotationStrategy {
    fn to_rotation(self) -> Rotation {
        match self {
            RotationStrategy::Never => Rotation::NEVER,
            RotationStrategy::Minutely => Rotation::MINUTELY,
            RotationStrategy::Hourly => Rotation::HOURLY,
            RotationStrategy::Daily => Rotation::DAILY,
        }
    }

    /// 从字符串解析轮转策略，无法识别时回退到每天轮转
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "never" | "none" => RotationStrategy::Never,
            "minutely" | "minute" => RotationStrategy::Minutely,
            "hourly" | "hour" => RotationStrategy::Hourly,
            _ => RotationStrategy::Daily,
        }
    }
}

impl std::fmt::Display for RotationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RotationStrategy::Never => "never",
            RotationStrategy::Minutely => "minutely",
            RotationStrategy::Hourly => "hourly",
            RotationStrategy::Daily => "daily",
        };
        f.write_str(name)
    }
}

// ============================================================================
// 日志配置
// ============================================================================

/// 日志系统配置
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// 默认日志级别（trace / debug / info / warn / error）
    pub level: String,
    /// 是否使用 JSON 格式输出
    pub json_format: bool,
    /// 是否输出到控制台
    pub console_output: bool,
    /// 文件输出目录（None 表示不输出到文件）
    pub file_output: Option<PathBuf>,
    /// 日志文件名前缀
    pub file_prefix: String,
    /// 日志轮转策略
    pub rotation: RotationStrategy,
    /// 是否显示目标模块
    pub show_target: bool,
    /// 是否显示文件名和行号
    pub show_file_line: bool,
    /// 自定义过滤指令（EnvFilter 格式），例如 "chips_orchestrator::module::loader=trace"
    pub filter_directives: Option<String>,
    /// 是否启用 ANSI 颜色（仅控制台）
    pub ansi_colors: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            console_output: true,
            file_output: None,
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
            rotation: RotationStrategy::Daily,
            show_target: true,
            show_file_line: false,
            filter_directives: None,
            ansi_colors: true,
        }
    }
}

impl LoggerConfig {
    /// 创建配置构建器
    pub fn builder() -> LoggerConfigBuilder {
        LoggerConfigBuilder::default()
    }

    /// 从 [`LogConfig`] 配置段创建
    pub fn from_log_config(log_config: &LogConfig) -> Self {
        Self {
            level: log_config.level.clone(),
            json_format: log_config.json_format,
            file_output: if log_config.file_output {
                log_config.log_dir.clone()
            } else {
                None
            },
            rotation: RotationStrategy::parse(&log_config.rotation),
            ..Default::default()
        }
    }
}

/// 日志配置构建器
#[derive(Debug, Default)]
pub struct LoggerConfigBuilder {
    config: LoggerConfig,
}

impl LoggerConfigBuilder {
    /// 设置日志级别
    pub fn level(mut self, level: impl Into<String>) -> Self {
        self.config.level = level.into();
        self
    }

    /// 启用 JSON 格式输出
    pub fn json_format(mut self, enable: bool) -> Self {
        self.config.json_format = enable;
        self
    }

    /// 设置控制台输出
    pub fn console_output(mut self, enable: bool) -> Self {
        self.config.console_output = enable;
        self
    }

    /// 设置文件输出目录
    pub fn file_output(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.file_output = Some(dir.into());
        self
    }

    /// 设置日志文件前缀
    pub fn file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.file_prefix = prefix.into();
        self
    }

    /// 设置轮转策略
    pub fn rotation(mut self, strategy: RotationStrategy) -> Self {
        self.config.rotation = strategy;
        self
    }

    /// 显示目标模块
    pub fn show_target(mut self, enable: bool) -> Self {
        self.config.show_target = enable;
        self
    }

    /// 显示文件名和行号
    pub fn show_file_line(mut self, enable: bool) -> Self {
        self.config.show_file_line = enable;
        self
    }

    /// 设置过滤指令
    pub fn filter_directives(mut self, directives: impl Into<String>) -> Self {
        self.config.filter_directives = Some(directives.into());
        self
    }

    /// 启用 ANSI 颜色
    pub fn ansi_colors(mut self, enable: bool) -> Self {
        self.config.ansi_colors = enable;
        self
    }

    /// 构建配置
    pub fn build(self) -> LoggerConfig {
        self.config
    }
}

// ============================================================================
// 日志守卫
// ============================================================================

/// 日志系统守卫
///
/// 持有非阻塞写入器的 WorkerGuard，丢弃时等待挂起的日志写入完成。
#[derive(Default)]
pub struct LogGuard {
    _console_guard: Option<WorkerGuard>,
    _file_guard: Option<WorkerGuard>,
}

impl LogGuard {
    /// 是否持有任何写入器
    pub fn is_active(&self) -> bool {
        self._console_guard.is_some() || self._file_guard.is_some()
    }
}

// ============================================================================
// 日志系统
// ============================================================================

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// 日志系统
pub struct Logger;

impl Logger {
    /// 初始化日志系统
    ///
    /// 返回的 [`LogGuard`] 必须保持存活直到程序退出。
    ///
    /// # Errors
    ///
    /// 日志系统已初始化，或全局订阅者已被其他代码安装时返回 `InitFailed`。
    pub fn init(config: LoggerConfig) -> Result<LogGuard> {
        if LOGGER_INITIALIZED.get().is_some() {
            return Err(CoreError::InitFailed(
                "日志系统已初始化，不能重复初始化".to_string(),
            ));
        }

        let env_filter = Self::create_env_filter(&config);
        let mut guard = LogGuard::default();

        let console_writer = if config.console_output {
            let (writer, console_guard) = tracing_appender::non_blocking(io::stdout());
            guard._console_guard = Some(console_guard);
            Some(writer)
        } else {
            None
        };

        let file_writer = config.file_output.as_ref().map(|log_dir| {
            let appender = RollingFileAppender::new(
                config.rotation.to_rotation(),
                log_dir,
                format!("{}.log", config.file_prefix),
            );
            let (writer, file_guard) = tracing_appender::non_blocking(appender);
            guard._file_guard = Some(file_guard);
            writer
        });

        let registry = tracing_subscriber::registry().with(env_filter);
        let installed = if config.json_format {
            let console_layer = console_writer.map(|w| {
                fmt::layer()
                    .json()
                    .with_writer(w)
                    .with_target(config.show_target)
                    .with_file(config.show_file_line)
                    .with_line_number(config.show_file_line)
            });
            let file_layer = file_writer.map(|w| {
                fmt::layer()
                    .json()
                    .with_writer(w)
                    .with_target(config.show_target)
                    .with_file(config.show_file_line)
                    .with_line_number(config.show_file_line)
            });
            registry.with(console_layer).with(file_layer).try_init()
        } else {
            let console_layer = console_writer.map(|w| {
                fmt::layer()
                    .with_writer(w)
                    .with_target(config.show_target)
                    .with_file(config.show_file_line)
                    .with_line_number(config.show_file_line)
                    .with_ansi(config.ansi_colors)
            });
            // 文件不使用 ANSI
            let file_layer = file_writer.map(|w| {
                fmt::layer()
                    .with_writer(w)
                    .with_target(config.show_target)
                    .with_file(config.show_file_line)
                    .with_line_number(config.show_file_line)
                    .with_ansi(false)
            });
            registry.with(console_layer).with(file_layer).try_init()
        };

        installed.map_err(|e| CoreError::InitFailed(format!("日志系统初始化失败: {}", e)))?;
        let _ = LOGGER_INITIALIZED.set(());

        Ok(guard)
    }

    /// 尝试初始化日志系统，已初始化时返回空守卫
    pub fn try_init(config: LoggerConfig) -> LogGuard {
        Self::init(config).unwrap_or_default()
    }

    /// 创建 EnvFilter，优先使用环境变量 RUST_LOG
    fn create_env_filter(config: &LoggerConfig) -> EnvFilter {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

        match config.filter_directives {
            Some(ref directives) => directives
                .split(',')
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .fold(filter, |f, directive| match directive.parse::<Directive>() {
                    Ok(d) => f.add_directive(d),
                    Err(_) => f,
                }),
            None => filter,
        }
    }
}

/// 为隔离单元创建独立的日志通道
///
/// 单元钩子内的日志都会带上 `unit_id` 与 `boundary_id`，
/// 可通过 `chips_orchestrator::unit=debug` 单独过滤。
pub fn unit_span(unit_id: &str, boundary_id: &str) -> Span {
    tracing::info_span!(
        target: "chips_orchestrator::unit",
        "unit",
        unit_id = %unit_id,
        boundary_id = %boundary_id
    )
}

// ============================================================================
// 结构化日志字段定义
// ============================================================================

/// 标准日志字段名称
pub mod fields {
    /// 模块 ID
    pub const MODULE_ID: &str = "module_id";
    /// 生命周期阶段
    pub const PHASE: &str = "phase";
    /// 隔离单元 ID
    pub const UNIT_ID: &str = "unit_id";
    /// 隔离边界 ID
    pub const BOUNDARY_ID: &str = "boundary_id";
    /// 错误码
    pub const ERROR_CODE: &str = "error_code";
    /// 回收探测次数
    pub const ATTEMPTS: &str = "attempts";
    /// 耗时（毫秒）
    pub const DURATION_MS: &str = "duration_ms";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_strategy_parse() {
        assert_eq!(RotationStrategy::parse("DAILY"), RotationStrategy::Daily);
        assert_eq!(RotationStrategy::parse("hour"), RotationStrategy::Hourly);
        assert_eq!(RotationStrategy::parse("minutely"), RotationStrategy::Minutely);
        assert_eq!(RotationStrategy::parse("none"), RotationStrategy::Never);
        // 无效值返回默认值
        assert_eq!(RotationStrategy::parse("weekly"), RotationStrategy::Daily);
        assert_eq!(RotationStrategy::Hourly.to_string(), "hourly");
    }

    #[test]
    fn test_logger_config_builder() {
        let config = LoggerConfig::builder()
            .level("debug")
            .json_format(true)
            .file_output("/var/log/chips")
            .rotation(RotationStrategy::Hourly)
            .filter_directives("chips_orchestrator=trace")
            .ansi_colors(false)
            .build();

        assert_eq!(config.level, "debug");
        assert!(config.json_format);
        assert_eq!(config.file_output, Some(PathBuf::from("/var/log/chips")));
        assert_eq!(config.file_prefix, DEFAULT_FILE_PREFIX);
        assert_eq!(config.rotation, RotationStrategy::Hourly);
        assert!(!config.ansi_colors);
    }

    #[test]
    fn test_logger_config_from_log_config() {
        let log_config = LogConfig {
            level: "debug".to_string(),
            file_output: true,
            log_dir: Some(PathBuf::from("/var/log")),
            json_format: true,
            rotation: "hourly".to_string(),
        };

        let logger_config = LoggerConfig::from_log_config(&log_config);
        assert_eq!(logger_config.level, "debug");
        assert!(logger_config.json_format);
        assert_eq!(logger_config.file_output, Some(PathBuf::from("/var/log")));
        assert_eq!(logger_config.rotation, RotationStrategy::Hourly);

        // file_output=false 时即使有目录也不输出
        let log_config = LogConfig {
            file_output: false,
            ..log_config
        };
        assert!(LoggerConfig::from_log_config(&log_config).file_output.is_none());
    }

    #[test]
    fn test_env_filter_ignores_bad_directives() {
        let config = LoggerConfig::builder()
            .filter_directives("chips_orchestrator=debug,,=bogus=")
            .build();
        let _filter = Logger::create_env_filter(&config);
    }

    #[test]
    fn test_unit_span_is_constructible() {
        let span = unit_span("mail", "bnd-0000000000");
        let _enter = span.enter();
        tracing::debug!("inside unit span");
    }

    #[test]
    fn test_logger_try_init_never_fails() {
        let _guard = Logger::try_init(LoggerConfig::default());
        let guard2 = Logger::try_init(LoggerConfig::default());
        assert!(!guard2.is_active());
    }
}
