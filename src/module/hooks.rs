//! 生命周期钩子
//!
//! 每个模块通过 [`ModuleHooks`] 暴露四个阶段钩子。钩子在注册时确定，
//! 编排器按阶段直接调用，不做任何运行时类型探测。
//!
//! 不想实现 trait 的调用方可以使用 [`FnHooks`]：按阶段登记闭包。

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use super::lifecycle::LifecyclePhase;
use super::settings::ModuleSettings;

/// 阶段上下文
///
/// 每次钩子调用都会收到一份上下文，包含模块设置和取消信号。
#[derive(Debug, Clone)]
pub struct PhaseContext {
    /// 模块 ID
    pub module_id: String,
    /// 当前阶段
    pub phase: LifecyclePhase,
    /// 模块设置
    pub settings: Arc<ModuleSettings>,
    /// 取消信号
    pub cancel: CancellationToken,
}

impl PhaseContext {
    /// 创建上下文
    pub fn new(
        module_id: impl Into<String>,
        phase: LifecyclePhase,
        settings: Arc<ModuleSettings>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            module_id: module_id.into(),
            phase,
            settings,
            cancel,
        }
    }

    /// 取消信号是否已触发
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// 模块生命周期钩子
///
/// 所有方法默认成功。钩子可以挂起（I/O、网络调用），编排器会等待其完成。
#[async_trait]
pub trait ModuleHooks: Send + Sync {
    /// 配置阶段
    async fn configure(&self, _ctx: &PhaseContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// 初始化阶段
    async fn initialize(&self, _ctx: &PhaseContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// 启动阶段
    async fn start(&self, _ctx: &PhaseContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// 停止阶段
    async fn stop(&self, _ctx: &PhaseContext) -> anyhow::Result<()> {
        Ok(())
    }
}

/// 按阶段分派到对应钩子
pub(crate) async fn dispatch<H>(hooks: &H, ctx: &PhaseContext) -> anyhow::Result<()>
where
    H: ModuleHooks + ?Sized,
{
    match ctx.phase {
        LifecyclePhase::Configured => hooks.configure(ctx).await,
        LifecyclePhase::Initialized => hooks.initialize(ctx).await,
        LifecyclePhase::Started => hooks.start(ctx).await,
        LifecyclePhase::Stopped => hooks.stop(ctx).await,
    }
}

/// 阶段处理闭包
pub type PhaseHandler =
    Arc<dyn Fn(PhaseContext) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// 以闭包表实现的钩子
///
/// 未登记的阶段直接成功。
///
/// ```rust
/// use chips_orchestrator::module::hooks::FnHooks;
/// use chips_orchestrator::module::lifecycle::LifecyclePhase;
///
/// let hooks = FnHooks::new()
///     .on(LifecyclePhase::Started, |ctx| async move {
///         tracing::info!(module_id = %ctx.module_id, "started");
///         Ok(())
///     });
/// assert!(hooks.handles(LifecyclePhase::Started));
/// ```
#[derive(Clone, Default)]
pub struct FnHooks {
    handlers: HashMap<LifecyclePhase, PhaseHandler>,
}

impl FnHooks {
    /// 创建空的闭包表
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记某个阶段的处理闭包（覆盖已有的）
    pub fn on<F, Fut>(mut self, phase: LifecyclePhase, handler: F) -> Self
    where
        F: Fn(PhaseContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let handler: PhaseHandler = Arc::new(move |ctx| Box::pin(handler(ctx)));
        self.handlers.insert(phase, handler);
        self
    }

    /// 是否登记了该阶段
    pub fn handles(&self, phase: LifecyclePhase) -> bool {
        self.handlers.contains_key(&phase)
    }

    async fn run(&self, ctx: &PhaseContext) -> anyhow::Result<()> {
        match self.handlers.get(&ctx.phase) {
            Some(handler) => handler(ctx.clone()).await,
            None => Ok(()),
        }
    }
}

impl fmt::Debug for FnHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut phases: Vec<&LifecyclePhase> = self.handlers.keys().collect();
        phases.sort();
        f.debug_struct("FnHooks").field("phases", &phases).finish()
    }
}

#[async_trait]
impl ModuleHooks for FnHooks {
    async fn configure(&self, ctx: &PhaseContext) -> anyhow::Result<()> {
        self.run(ctx).await
    }

    async fn initialize(&self, ctx: &PhaseContext) -> anyhow::Result<()> {
        self.run(ctx).await
    }

    async fn start(&self, ctx: &PhaseContext) -> anyhow::Result<()> {
        self.run(ctx).await
    }

    async fn stop(&self, ctx: &PhaseContext) -> anyhow::Result<()> {
        self.run(ctx).await
    }
}

/// 所有阶段都直接成功的钩子
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl ModuleHooks for NoopHooks {}
