//! 基本使用示例
//!
//! 本示例展示了模块编排器的基本使用方法，包括：
//!
//! - 注册静态钩子模块与隔离单元模块
//! - 解析激活顺序并依次配置、初始化、启动
//! - 订阅单元通知并热重载隔离单元
//! - 按逆序停止所有模块
//!
//! # 运行示例
//!
//! ```bash
//! cargo run --example basic_usage
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use chips_orchestrator::{
    CodeUnit, Dependency, FnHooks, LifecyclePhase, LoadableUnit, Logger, LoggerConfig, Manifest,
    ModuleHooks, ModuleManager, OrchestratorConfig, PhaseContext, StaticSourceLocator,
    UnitContext, VersionSpec,
};
use serde_json::json;

/// 邮件模块的隔离单元
struct MailUnit {
    build: &'static str,
}

#[async_trait]
impl ModuleHooks for MailUnit {
    async fn configure(&self, ctx: &PhaseContext) -> anyhow::Result<()> {
        let host: Option<String> = ctx.settings.get_key("smtp_host")?;
        println!(
            "   [mail@{}] 配置完成，SMTP 主机: {}",
            self.build,
            host.as_deref().unwrap_or("(未设置)")
        );
        Ok(())
    }

    async fn start(&self, _ctx: &PhaseContext) -> anyhow::Result<()> {
        println!("   [mail@{}] 开始收发邮件", self.build);
        Ok(())
    }

    async fn stop(&self, _ctx: &PhaseContext) -> anyhow::Result<()> {
        println!("   [mail@{}] 停止收发邮件", self.build);
        Ok(())
    }
}

#[async_trait]
impl CodeUnit for MailUnit {
    async fn on_load(&self, ctx: &UnitContext<'_>) -> anyhow::Result<()> {
        println!("   [mail@{}] 单元已加载到边界 {}", self.build, ctx.boundary_id());
        ctx.own("smtp-connection", || println!("   [mail] 关闭 SMTP 连接"));
        Ok(())
    }

    async fn on_unload(&self, _ctx: &UnitContext<'_>) -> anyhow::Result<()> {
        println!("   [mail@{}] 单元即将卸载", self.build);
        Ok(())
    }
}

fn mail_unit(build: &'static str) -> LoadableUnit {
    LoadableUnit::with_entry(move || Ok(Box::new(MailUnit { build })))
}

/// 主函数
///
/// 演示模块编排器的基本用法。
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _guard = Logger::try_init(LoggerConfig::builder().level("warn").build());

    println!("=== 模块编排器基本使用示例 ===\n");

    // -------------------------------------------------------------------------
    // 1. 创建模块管理器
    // -------------------------------------------------------------------------
    println!("1. 创建模块管理器...");

    let config = OrchestratorConfig::builder()
        .reload_settle_ms(20)
        .module_settings("mail", json!({ "smtp_host": "smtp.example.com" }))
        .build();
    let locator = Arc::new(StaticSourceLocator::new().with("mail-unit", mail_unit("build-1")));
    let mut manager = ModuleManager::new(config, locator.clone())?;
    println!("   ✅ 管理器创建成功\n");

    // -------------------------------------------------------------------------
    // 2. 注册模块
    // -------------------------------------------------------------------------
    println!("2. 注册模块...");

    let core_hooks = FnHooks::new()
        .on(LifecyclePhase::Initialized, |ctx| async move {
            println!("   [{}] 初始化存储", ctx.module_id);
            Ok(())
        })
        .on(LifecyclePhase::Stopped, |ctx| async move {
            println!("   [{}] 刷新存储", ctx.module_id);
            Ok(())
        });

    manager.register_isolated(
        Manifest::new("mail", "Mail", VersionSpec::new(1, 2, 0))
            .with_dependency(Dependency::required("core").at_least(VersionSpec::new(2, 0, 0)))
            .with_dependency(Dependency::optional("spellcheck")),
        "mail-unit",
    )?;
    manager.register_static(
        Manifest::new("core", "Core", VersionSpec::new(2, 1, 0)),
        core_hooks,
    )?;
    println!("   ✅ 已注册 core（静态）与 mail（隔离单元）\n");

    // -------------------------------------------------------------------------
    // 3. 激活
    // -------------------------------------------------------------------------
    println!("3. 激活所有模块...");
    let order = manager.activate().await?;
    println!("   ✅ 激活顺序: {}\n", order);

    // -------------------------------------------------------------------------
    // 4. 热重载隔离单元
    // -------------------------------------------------------------------------
    println!("4. 热重载 mail 单元...");
    let mut events = manager.subscribe_units();

    locator.insert("mail-unit", mail_unit("build-2"));
    let handle = manager.reload_unit("mail").await?;
    println!("   ✅ 新边界: {}", handle.boundary_id());

    while let Ok(event) = events.try_recv() {
        println!("   通知: {} ({})", event.kind, event.unit_id);
    }
    println!();

    // -------------------------------------------------------------------------
    // 5. 停止
    // -------------------------------------------------------------------------
    println!("5. 停止所有模块...");
    manager.shutdown().await?;
    println!("   ✅ 所有模块已停止\n");

    println!("=== 示例运行完成 ===");
    Ok(())
}
