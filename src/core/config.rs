//! 编排器配置
//!
//! 定义编排器的配置结构和加载逻辑。配置文件可以是 YAML 或 JSON（按扩展名判断）。
//!
//! ```yaml
//! logging:
//!   level: debug
//! resolution:
//!   enabled: true
//! loader:
//!   reclaim_attempts: 10
//!   reclaim_interval_ms: 50
//! settings:
//!   mail:
//!     smtp_host: localhost
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::utils::{CoreError, Result};

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否输出到文件
    #[serde(default)]
    pub file_output: bool,

    /// 日志文件目录
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// 是否输出 JSON 格式
    #[serde(default)]
    pub json_format: bool,

    /// 日志轮转策略
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_output: false,
            log_dir: None,
            json_format: false,
            rotation: default_rotation(),
        }
    }
}

/// 依赖解析配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionConfig {
    /// 是否启用依赖解析
    ///
    /// 关闭后直接按注册顺序激活，不做任何图分析。
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// 隔离单元加载器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// 入口符号名
    #[serde(default = "default_entry_symbol")]
    pub entry_symbol: String,

    /// 卸载后回收探测的最大次数
    #[serde(default = "default_reclaim_attempts")]
    pub reclaim_attempts: u32,

    /// 两次回收探测之间的间隔（毫秒）
    #[serde(default = "default_reclaim_interval_ms")]
    pub reclaim_interval_ms: u64,

    /// 重载时卸载与加载之间的稳定等待（毫秒）
    #[serde(default = "default_reload_settle_ms")]
    pub reload_settle_ms: u64,

    /// 通知通道容量
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

/// 默认入口符号
pub const DEFAULT_ENTRY_SYMBOL: &str = "chips_unit_entry";

fn default_entry_symbol() -> String {
    DEFAULT_ENTRY_SYMBOL.to_string()
}

fn default_reclaim_attempts() -> u32 {
    10
}

fn default_reclaim_interval_ms() -> u64 {
    50
}

fn default_reload_settle_ms() -> u64 {
    100
}

fn default_event_capacity() -> usize {
    256
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            entry_symbol: default_entry_symbol(),
            reclaim_attempts: default_reclaim_attempts(),
            reclaim_interval_ms: default_reclaim_interval_ms(),
            reload_settle_ms: default_reload_settle_ms(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl LoaderConfig {
    /// 回收探测间隔
    pub fn reclaim_interval(&self) -> Duration {
        Duration::from_millis(self.reclaim_interval_ms)
    }

    /// 重载稳定等待
    pub fn reload_settle(&self) -> Duration {
        Duration::from_millis(self.reload_settle_ms)
    }

    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        if self.entry_symbol.trim().is_empty() {
            return Err(CoreError::InvalidConfigValue {
                key: "loader.entry_symbol".to_string(),
                reason: "入口符号不能为空".to_string(),
            });
        }
        if self.reclaim_attempts == 0 {
            return Err(CoreError::InvalidConfigValue {
                key: "loader.reclaim_attempts".to_string(),
                reason: "至少需要探测一次".to_string(),
            });
        }
        if self.event_capacity == 0 {
            return Err(CoreError::InvalidConfigValue {
                key: "loader.event_capacity".to_string(),
                reason: "通知通道容量必须大于 0".to_string(),
            });
        }
        Ok(())
    }
}

/// 模块清单配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// 模块清单目录列表（每个子目录包含一个 module.yaml）
    #[serde(default)]
    pub manifest_dirs: Vec<PathBuf>,
}

/// 编排器配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// 配置文件路径
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    /// 日志配置
    #[serde(default)]
    pub logging: LogConfig,

    /// 依赖解析配置
    #[serde(default)]
    pub resolution: ResolutionConfig,

    /// 加载器配置
    #[serde(default)]
    pub loader: LoaderConfig,

    /// 模块清单配置
    #[serde(default)]
    pub modules: ModuleConfig,

    /// 各模块的设置对象：module_id -> settings
    #[serde(default)]
    pub settings: HashMap<String, serde_json::Value>,

    /// 是否为开发模式
    #[serde(default)]
    pub dev_mode: bool,
}

impl OrchestratorConfig {
    /// 创建配置构建器
    pub fn builder() -> OrchestratorConfigBuilder {
        OrchestratorConfigBuilder::new()
    }

    /// 从文件加载配置
    pub async fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            CoreError::ConfigLoadFailed(format!("无法读取 {}: {}", path.display(), e))
        })?;

        let mut config = Self::from_str_with_ext(&content, is_json(&path))?;
        config.config_path = Some(path);
        config.validate()?;
        Ok(config)
    }

    fn from_str_with_ext(content: &str, json: bool) -> Result<Self> {
        let config = if json {
            serde_json::from_str(content)?
        } else {
            serde_yaml::from_str(content)?
        };
        Ok(config)
    }

    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        self.loader.validate()
    }

    /// 合并另一个配置（用于覆盖）
    ///
    /// 只覆盖非默认值；模块目录追加，设置按模块 ID 覆盖。
    pub fn merge(&mut self, other: OrchestratorConfig) {
        if other.logging.level != default_log_level() {
            self.logging.level = other.logging.level;
        }
        if other.logging.file_output {
            self.logging.file_output = true;
            self.logging.log_dir = other.logging.log_dir;
        }
        if other.logging.json_format {
            self.logging.json_format = true;
        }
        if other.logging.rotation != default_rotation() {
            self.logging.rotation = other.logging.rotation;
        }
        if !other.resolution.enabled {
            self.resolution.enabled = false;
        }
        if other.loader.entry_symbol != default_entry_symbol() {
            self.loader.entry_symbol = other.loader.entry_symbol;
        }
        if other.loader.reclaim_attempts != default_reclaim_attempts() {
            self.loader.reclaim_attempts = other.loader.reclaim_attempts;
        }
        if other.loader.reclaim_interval_ms != default_reclaim_interval_ms() {
            self.loader.reclaim_interval_ms = other.loader.reclaim_interval_ms;
        }
        if other.loader.reload_settle_ms != default_reload_settle_ms() {
            self.loader.reload_settle_ms = other.loader.reload_settle_ms;
        }
        if other.loader.event_capacity != default_event_capacity() {
            self.loader.event_capacity = other.loader.event_capacity;
        }
        self.modules.manifest_dirs.extend(other.modules.manifest_dirs);
        self.settings.extend(other.settings);
        if other.dev_mode {
            self.dev_mode = true;
        }
    }
}

fn is_json(path: &std::path::Path) -> bool {
    path.extension().map(|e| e == "json").unwrap_or(false)
}

/// 配置构建器
#[derive(Debug, Default)]
pub struct OrchestratorConfigBuilder {
    config: OrchestratorConfig,
}

impl OrchestratorConfigBuilder {
    /// 创建新的构建器
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置日志级别
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    /// 启用文件日志
    pub fn file_logging(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.config.logging.file_output = true;
        self.config.logging.log_dir = Some(log_dir.into());
        self
    }

    /// 启用或关闭依赖解析
    pub fn dependency_resolution(mut self, enabled: bool) -> Self {
        self.config.resolution.enabled = enabled;
        self
    }

    /// 设置入口符号
    pub fn entry_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.config.loader.entry_symbol = symbol.into();
        self
    }

    /// 设置回收探测策略
    pub fn reclaim_probe(mut self, attempts: u32, interval_ms: u64) -> Self {
        self.config.loader.reclaim_attempts = attempts;
        self.config.loader.reclaim_interval_ms = interval_ms;
        self
    }

    /// 设置重载稳定等待
    pub fn reload_settle_ms(mut self, ms: u64) -> Self {
        self.config.loader.reload_settle_ms = ms;
        self
    }

    /// 添加模块清单目录
    pub fn manifest_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.modules.manifest_dirs.push(dir.into());
        self
    }

    /// 设置某个模块的设置对象
    pub fn module_settings(mut self, module_id: impl Into<String>, settings: serde_json::Value) -> Self {
        self.config.settings.insert(module_id.into(), settings);
        self
    }

    /// 启用开发模式
    pub fn dev_mode(mut self) -> Self {
        self.config.dev_mode = true;
        self
    }

    /// 构建配置
    pub fn build(self) -> OrchestratorConfig {
        self.config
    }
}
