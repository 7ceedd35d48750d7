//! Chips Orchestrator 命令行入口
//!
//! 模块编排器的命令行工具，用于检查模块清单与配置。
//!
//! # 命令概览
//!
//! - `resolve` - 扫描清单目录并打印激活顺序（或全部依赖问题）
//! - `check-config` - 验证配置文件
//! - `version` - 显示版本信息
//!
//! # 使用示例
//!
//! ```bash
//! # 解析 ./modules 下的全部清单
//! chips-orchestrator resolve --dir ./modules
//!
//! # 使用配置文件中的清单目录
//! chips-orchestrator -c orchestrator.yaml resolve
//!
//! # 检查配置文件
//! chips-orchestrator check-config -c orchestrator.yaml
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::info;

use chips_orchestrator::module::dependency::{DependencyGraph, ResolutionMode};
use chips_orchestrator::module::parser::ManifestParser;
use chips_orchestrator::{CoreError, LogConfig, Logger, LoggerConfig, OrchestratorConfig};

/// Chips Orchestrator - 模块依赖解析与生命周期编排
#[derive(Parser)]
#[command(name = "chips-orchestrator")]
#[command(version, about = "模块依赖解析与生命周期编排器", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, default_value = "orchestrator.yaml", global = true)]
    config: PathBuf,

    /// 日志级别 (trace, debug, info, warn, error)，覆盖配置文件中的级别
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// 子命令
    #[command(subcommand)]
    command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
enum Commands {
    /// 解析激活顺序
    ///
    /// 扫描清单目录，校验依赖图并打印激活顺序；存在问题时列出全部问题。
    Resolve {
        /// 清单目录（可重复；不指定则使用配置文件中的目录）
        #[arg(short, long)]
        dir: Vec<PathBuf>,

        /// 关闭依赖解析，按扫描顺序输出
        #[arg(long)]
        no_resolution: bool,
    },

    /// 验证配置文件
    CheckConfig {
        /// 配置文件路径（不指定则使用全局 -c 选项）
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// 查看版本信息
    Version,
}

/// 加载配置文件；文件不存在时使用默认配置
async fn load_config(path: &Path) -> Result<OrchestratorConfig, CoreError> {
    if path.exists() {
        OrchestratorConfig::from_file(path).await
    } else {
        Ok(OrchestratorConfig::default())
    }
}

/// 命令行未指定级别且没有配置文件日志段时的级别
const DEFAULT_CLI_LOG_LEVEL: &str = "warn";

/// 组合日志配置：以配置文件的日志段为基础，命令行级别优先
fn logger_config(cli_level: Option<&str>, log_config: Option<&LogConfig>) -> LoggerConfig {
    let mut logger = match log_config {
        Some(log_config) => LoggerConfig::from_log_config(log_config),
        None => LoggerConfig::builder().level(DEFAULT_CLI_LOG_LEVEL).build(),
    };
    if let Some(level) = cli_level {
        logger.level = level.to_string();
    }
    logger.show_target = false;
    logger
}

/// 解析激活顺序
async fn run_resolve(
    config: OrchestratorConfig,
    dirs: Vec<PathBuf>,
    no_resolution: bool,
) -> Result<bool, CoreError> {
    let dirs = if dirs.is_empty() {
        config.modules.manifest_dirs.clone()
    } else {
        dirs
    };

    let manifests = ManifestParser::scan_dirs(&dirs).await?;
    println!("发现 {} 个模块清单", manifests.len());

    let mode = if no_resolution {
        ResolutionMode::RegistrationOrder
    } else {
        ResolutionMode::from_enabled(config.resolution.enabled)
    };

    if mode == ResolutionMode::RegistrationOrder {
        println!("依赖解析已关闭，按扫描顺序激活:");
        for (index, manifest) in manifests.iter().enumerate() {
            println!("  {:>3}. {} ({})", index + 1, manifest.id, manifest.version);
        }
        return Ok(true);
    }

    let mut graph = DependencyGraph::build(&manifests);
    match graph.activation_order() {
        Ok(order) => {
            println!("激活顺序:");
            for (index, id) in order.iter().enumerate() {
                let deps = graph.get_dependencies(id);
                if deps.is_empty() {
                    println!("  {:>3}. {}", index + 1, id);
                } else {
                    println!("  {:>3}. {}  <- {}", index + 1, id, deps.join(", "));
                }
            }
            for (dependent, missing) in graph.pruned_optional() {
                println!("  (可选依赖 {} -> {} 未注册，已忽略)", dependent, missing);
            }
            Ok(true)
        }
        Err(err) => {
            println!("依赖解析失败，共 {} 个问题:", err.len());
            for issue in err.issues() {
                println!("  - {}", issue);
            }
            Ok(false)
        }
    }
}

/// 检查配置文件
async fn check_config(path: &Path) -> Result<bool, CoreError> {
    println!("检查配置文件: {}", path.display());

    if !path.exists() {
        println!("配置文件不存在，将使用默认配置");
        print_config(&OrchestratorConfig::default());
        return Ok(true);
    }

    match OrchestratorConfig::from_file(path).await {
        Ok(config) => {
            println!("配置文件有效");
            print_config(&config);
            Ok(true)
        }
        Err(e) => {
            println!("配置文件无效: {}", e);
            Ok(false)
        }
    }
}

fn print_config(config: &OrchestratorConfig) {
    println!("────────────────────────────────────────");
    println!("  [日志配置]");
    println!("    日志级别:       {}", config.logging.level);
    println!("    文件输出:       {}", if config.logging.file_output { "是" } else { "否" });
    println!("    JSON 格式:      {}", if config.logging.json_format { "是" } else { "否" });
    println!("  [依赖解析]");
    println!("    启用:           {}", if config.resolution.enabled { "是" } else { "否" });
    println!("  [隔离单元加载器]");
    println!("    入口符号:       {}", config.loader.entry_symbol);
    println!(
        "    回收探测:       {} 次 × {} ms",
        config.loader.reclaim_attempts, config.loader.reclaim_interval_ms
    );
    println!("    重载稳定等待:   {} ms", config.loader.reload_settle_ms);
    println!("  [模块]");
    println!("    清单目录:       {:?}", config.modules.manifest_dirs);
    println!("    设置条目:       {}", config.settings.len());
    println!("  开发模式:         {}", if config.dev_mode { "是" } else { "否" });
    println!("────────────────────────────────────────");
}

fn print_version() {
    println!("Chips Orchestrator {}", chips_orchestrator::VERSION);
    println!("  目标平台: {}", std::env::consts::ARCH);
    println!("  操作系统: {}", std::env::consts::OS);
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let cli_level = cli.log_level.as_deref();

    let result = match cli.command {
        Commands::Resolve { dir, no_resolution } => match load_config(&cli.config).await {
            Ok(config) => {
                let _guard = Logger::try_init(logger_config(cli_level, Some(&config.logging)));
                match &config.config_path {
                    Some(path) => info!("已加载配置文件: {}", path.display()),
                    None => info!("配置文件不存在 ({})，使用默认配置", cli.config.display()),
                }
                run_resolve(config, dir, no_resolution).await
            }
            Err(e) => Err(e),
        },
        Commands::CheckConfig { config } => {
            let _guard = Logger::try_init(logger_config(cli_level, None));
            let path = config.unwrap_or(cli.config);
            check_config(&path).await
        }
        Commands::Version => {
            print_version();
            Ok(true)
        }
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("错误 [{}]: {}", e.error_code(), e);
            ExitCode::FAILURE
        }
    }
}
