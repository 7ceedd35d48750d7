//! 生命周期编排器
//!
//! 按激活顺序驱动所有模块依次经过各个生命周期阶段。
//!
//! # 状态机
//!
//! ```text
//! Registered → Configured → Initialized → Started → Stopped
//!      └────────────┴─────────────┴───────────┴──→ Failed
//! ```
//!
//! # 阶段屏障
//!
//! 前向阶段逐个执行：所有模块完成配置后才开始初始化，所有模块完成初始化后才开始启动。
//! 同一阶段内严格按激活顺序串行调用，后面的模块可以读取前面模块在本阶段写下的状态。
//!
//! # 失败策略
//!
//! - 前向阶段：第一个失败立即中止，失败模块进入 `Failed`，其余模块保持上一阶段的状态，
//!   已启动的模块不会自动回滚
//! - 停止阶段：按激活逆序对每个模块尝试一次，失败全部收集后一起返回

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

use super::dependency::ActivationOrder;
use super::hooks::{dispatch, ModuleHooks, PhaseContext};
use super::loader::{IsolatedUnitLoader, ReclamationStatus, UnitHandle};
use super::registry::{HookSource, ModuleRegistry};
use super::settings::{ModuleSettings, SettingsProvider, StaticSettingsProvider};
use crate::utils::{error_code, CoreError, Result};

// ============================================================================
// 阶段与状态
// ============================================================================

/// 生命周期阶段
///
/// 前向阶段依次为 `Configured → Initialized → Started`，`Stopped` 是终止阶段。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    /// 配置
    Configured,
    /// 初始化
    Initialized,
    /// 启动
    Started,
    /// 停止
    Stopped,
}

impl LifecyclePhase {
    /// 全部阶段
    pub const ALL: [LifecyclePhase; 4] = [
        LifecyclePhase::Configured,
        LifecyclePhase::Initialized,
        LifecyclePhase::Started,
        LifecyclePhase::Stopped,
    ];

    /// 进入该阶段前模块必须处于的状态
    pub fn required_state(&self) -> Option<ModuleState> {
        match self {
            LifecyclePhase::Configured => Some(ModuleState::Registered),
            LifecyclePhase::Initialized => Some(ModuleState::Configured),
            LifecyclePhase::Started => Some(ModuleState::Initialized),
            LifecyclePhase::Stopped => None,
        }
    }

    /// 阶段成功后的状态
    pub fn reached_state(&self) -> ModuleState {
        match self {
            LifecyclePhase::Configured => ModuleState::Configured,
            LifecyclePhase::Initialized => ModuleState::Initialized,
            LifecyclePhase::Started => ModuleState::Started,
            LifecyclePhase::Stopped => ModuleState::Stopped,
        }
    }

    /// 钩子名称
    pub fn hook_name(&self) -> &'static str {
        match self {
            LifecyclePhase::Configured => "configure",
            LifecyclePhase::Initialized => "initialize",
            LifecyclePhase::Started => "start",
            LifecyclePhase::Stopped => "stop",
        }
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecyclePhase::Configured => "Configured",
            LifecyclePhase::Initialized => "Initialized",
            LifecyclePhase::Started => "Started",
            LifecyclePhase::Stopped => "Stopped",
        };
        f.write_str(name)
    }
}

/// 模块状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleState {
    /// 已注册
    #[default]
    Registered,
    /// 已配置
    Configured,
    /// 已初始化
    Initialized,
    /// 已启动
    Started,
    /// 已停止
    Stopped,
    /// 失败（吸收态）
    Failed,
}

impl ModuleState {
    /// 停止阶段是否需要调用该模块的停止钩子
    pub fn needs_stop(&self) -> bool {
        matches!(
            self,
            ModuleState::Configured | ModuleState::Initialized | ModuleState::Started
        )
    }
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModuleState::Registered => "Registered",
            ModuleState::Configured => "Configured",
            ModuleState::Initialized => "Initialized",
            ModuleState::Started => "Started",
            ModuleState::Stopped => "Stopped",
            ModuleState::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// 阶段失败记录
///
/// 指明失败的模块、阶段和原因，可以直接展示给用户。
#[derive(Debug, Clone)]
pub struct PhaseFailure {
    /// 模块 ID
    pub module_id: String,
    /// 失败的阶段
    pub phase: LifecyclePhase,
    /// 原因
    pub cause: Arc<anyhow::Error>,
}

impl PhaseFailure {
    /// 创建失败记录
    pub fn new(module_id: impl Into<String>, phase: LifecyclePhase, cause: anyhow::Error) -> Self {
        Self::from_shared(module_id, phase, Arc::new(cause))
    }

    /// 使用共享的原因创建失败记录
    pub fn from_shared(
        module_id: impl Into<String>,
        phase: LifecyclePhase,
        cause: Arc<anyhow::Error>,
    ) -> Self {
        Self {
            module_id: module_id.into(),
            phase,
            cause,
        }
    }
}

impl fmt::Display for PhaseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "模块 '{}' 在 {} 阶段失败: {:#}",
            self.module_id, self.phase, self.cause
        )
    }
}

/// 模块运行时状态
#[derive(Debug, Clone, Default)]
pub struct ModuleRuntimeState {
    /// 当前状态
    pub state: ModuleState,
    /// 最后成功完成的阶段
    pub phase_reached: Option<LifecyclePhase>,
    /// 失败记录
    pub failure: Option<PhaseFailure>,
    /// 隔离单元句柄（仅隔离模块）
    pub unit: Option<UnitHandle>,
}

// ============================================================================
// 编排器
// ============================================================================

/// 生命周期编排器
///
/// 持有模块注册表与激活顺序；模块状态只由编排器修改，钩子无法直接改写。
pub struct LifecycleOrchestrator {
    registry: ModuleRegistry,
    order: ActivationOrder,
    states: HashMap<String, ModuleRuntimeState>,
    settings_provider: Arc<dyn SettingsProvider>,
    settings: HashMap<String, Arc<ModuleSettings>>,
    loader: Option<Arc<IsolatedUnitLoader>>,
    cancel: CancellationToken,
}

impl LifecycleOrchestrator {
    /// 创建编排器
    ///
    /// # 错误
    ///
    /// - 激活顺序包含未注册的模块：`ModuleNotFound`
    /// - 存在隔离模块却未提供加载器时，在配置阶段报告该模块失败
    pub fn new(registry: ModuleRegistry, order: ActivationOrder) -> Result<Self> {
        for id in order.iter() {
            registry.require(id)?;
        }

        let states = registry
            .entries()
            .map(|entry| (entry.id().to_string(), ModuleRuntimeState::default()))
            .collect();

        info!(modules = order.len(), order = %order, "创建生命周期编排器");
        Ok(Self {
            registry,
            order,
            states,
            settings_provider: Arc::new(StaticSettingsProvider::new()),
            settings: HashMap::new(),
            loader: None,
            cancel: CancellationToken::new(),
        })
    }

    /// 设置模块设置提供者
    pub fn with_settings(mut self, provider: Arc<dyn SettingsProvider>) -> Self {
        self.settings_provider = provider;
        self
    }

    /// 设置隔离单元加载器
    pub fn with_loader(mut self, loader: Arc<IsolatedUnitLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// 使用外部取消信号
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// 取消信号
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 激活顺序
    pub fn order(&self) -> &ActivationOrder {
        &self.order
    }

    /// 模块注册表
    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    // ==================== 阶段驱动 ====================

    /// 配置所有模块
    pub async fn configure_all(&mut self) -> Result<()> {
        self.run_forward(LifecyclePhase::Configured).await
    }

    /// 初始化所有模块
    pub async fn initialize_all(&mut self) -> Result<()> {
        self.run_forward(LifecyclePhase::Initialized).await
    }

    /// 启动所有模块
    pub async fn start_all(&mut self) -> Result<()> {
        self.run_forward(LifecyclePhase::Started).await
    }

    /// 依次执行配置、初始化、启动
    pub async fn activate_all(&mut self) -> Result<()> {
        self.configure_all().await?;
        self.initialize_all().await?;
        self.start_all().await
    }

    async fn run_forward(&mut self, phase: LifecyclePhase) -> Result<()> {
        let required = phase.required_state().unwrap_or_default();

        // 屏障前置条件：所有模块都完成了上一阶段
        for id in self.order.iter() {
            let current = self.current_state(id);
            if current != required {
                warn!(module_id = %id, from = %current, to = %phase, "阶段转换不合法");
                return Err(CoreError::InvalidPhaseTransition {
                    module_id: id.clone(),
                    from: current,
                    to: phase,
                });
            }
        }

        info!(phase = %phase, modules = self.order.len(), "开始阶段");
        let order = self.order.clone();

        for id in order.iter() {
            if self.cancel.is_cancelled() {
                warn!(
                    phase = %phase,
                    module_id = %id,
                    error_code = error_code::MODULE_CANCELLED,
                    "阶段被取消，停止推进"
                );
                return Err(CoreError::Cancelled {
                    phase,
                    module_id: id.clone(),
                });
            }

            let started = std::time::Instant::now();
            match self.run_hook(id, phase).await {
                Ok(()) => {
                    let runtime = self.runtime_mut(id);
                    runtime.state = phase.reached_state();
                    runtime.phase_reached = Some(phase);
                    debug!(
                        module_id = %id,
                        phase = %phase,
                        duration_ms = started.elapsed().as_millis() as u64,
                        "阶段钩子完成"
                    );
                }
                Err(cause) => {
                    let failure = PhaseFailure::new(id.as_str(), phase, cause);
                    error!(
                        module_id = %id,
                        phase = %phase,
                        error_code = error_code::MODULE_PHASE_FAILED,
                        "{}",
                        failure
                    );
                    self.mark_failed(id, failure.clone());
                    return Err(CoreError::PhaseFailed(failure));
                }
            }
        }

        info!(phase = %phase, "阶段完成");
        Ok(())
    }

    /// 执行单个模块的钩子；前向阶段与取消信号竞争
    ///
    /// 隔离单元的加载不可取消：加载期间到达的取消信号在加载完成后立即生效，
    /// 配置钩子不会执行，已加载的单元留待停止阶段卸载。
    async fn run_hook(&mut self, id: &str, phase: LifecyclePhase) -> anyhow::Result<()> {
        if phase == LifecyclePhase::Configured {
            self.ensure_unit_loaded(id).await?;
        }

        let ctx = PhaseContext::new(id, phase, self.settings_for(id).await, self.cancel.clone());
        let target = self.hook_target(id).await?;

        if phase == LifecyclePhase::Stopped {
            return target.call(&ctx).await;
        }

        let cancel = self.cancel.clone();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                Err(anyhow::anyhow!("{} 钩子执行期间收到取消信号", phase.hook_name()))
            }
            result = target.call(&ctx) => result,
        }
    }

    /// 停止所有模块
    ///
    /// 按激活逆序对处于 Configured / Initialized / Started 的模块调用停止钩子，
    /// 每个模块只尝试一次，不受取消信号影响。隔离模块在停止钩子之后卸载；
    /// 失败但单元仍在加载中的隔离模块同样会被卸载。
    ///
    /// # 错误
    ///
    /// 任一模块停止失败时返回 `StopFailed`，其中列出全部失败。
    pub async fn stop_all(&mut self) -> Result<()> {
        info!(modules = self.order.len(), "开始停止阶段");
        let order = self.order.clone();
        let mut failures = Vec::new();

        for id in order.teardown() {
            let state = self.current_state(id);

            if state.needs_stop() {
                match self.run_hook(id, LifecyclePhase::Stopped).await {
                    Ok(()) => {
                        let runtime = self.runtime_mut(id);
                        runtime.state = ModuleState::Stopped;
                        runtime.phase_reached = Some(LifecyclePhase::Stopped);
                        debug!(module_id = %id, "模块已停止");
                    }
                    Err(cause) => {
                        let failure = PhaseFailure::new(id.as_str(), LifecyclePhase::Stopped, cause);
                        error!(
                            module_id = %id,
                            error_code = error_code::MODULE_STOP_FAILED,
                            "{}",
                            failure
                        );
                        self.mark_failed(id, failure.clone());
                        failures.push(failure);
                    }
                }
            } else {
                debug!(module_id = %id, state = %state, "跳过停止钩子");
            }

            if let Err(failure) = self.unload_unit(id).await {
                self.mark_failed(id, failure.clone());
                failures.push(failure);
            }
        }

        if failures.is_empty() {
            info!("停止阶段完成");
            Ok(())
        } else {
            warn!(failed = failures.len(), "停止阶段完成，部分模块失败");
            Err(CoreError::StopFailed(failures))
        }
    }

    // ==================== 查询 ====================

    /// 获取模块状态
    pub fn get_state(&self, module_id: &str) -> Option<ModuleState> {
        self.states.get(module_id).map(|s| s.state)
    }

    /// 获取模块运行时状态
    pub fn runtime_state(&self, module_id: &str) -> Option<&ModuleRuntimeState> {
        self.states.get(module_id)
    }

    /// 所有模块状态（按激活顺序）
    pub fn states(&self) -> Vec<(String, ModuleState)> {
        self.order
            .iter()
            .map(|id| (id.clone(), self.current_state(id)))
            .collect()
    }

    // ==================== 内部方法 ====================

    fn current_state(&self, id: &str) -> ModuleState {
        self.states.get(id).map(|s| s.state).unwrap_or_default()
    }

    fn runtime_mut(&mut self, id: &str) -> &mut ModuleRuntimeState {
        self.states.entry(id.to_string()).or_default()
    }

    fn mark_failed(&mut self, id: &str, failure: PhaseFailure) {
        let runtime = self.runtime_mut(id);
        runtime.state = ModuleState::Failed;
        runtime.failure = Some(failure);
    }

    async fn settings_for(&mut self, id: &str) -> Arc<ModuleSettings> {
        if let Some(settings) = self.settings.get(id) {
            return settings.clone();
        }
        let settings = Arc::new(self.settings_provider.settings_for(id).await);
        if !settings.ready {
            debug!(module_id = %id, "模块设置尚未就绪");
        }
        self.settings.insert(id.to_string(), settings.clone());
        settings
    }

    /// 隔离模块在配置钩子之前加载单元
    async fn ensure_unit_loaded(&mut self, id: &str) -> anyhow::Result<()> {
        let HookSource::Isolated { source_id } = self.registry.require(id)?.source.clone() else {
            return Ok(());
        };
        let loader = self.require_loader(id)?;

        let handle = match loader.handle(id).await {
            Some(handle) => handle,
            None => loader.load(id, &source_id).await?,
        };
        debug!(module_id = %id, boundary_id = %handle.boundary_id(), "隔离单元已就绪");
        self.runtime_mut(id).unit = Some(handle);
        Ok(())
    }

    /// 在调用时解析钩子：隔离模块总是取加载器中的当前实例，重载后即生效
    async fn hook_target(&mut self, id: &str) -> anyhow::Result<HookTarget> {
        let source = self.registry.require(id)?.source.clone();
        match source {
            HookSource::Static(hooks) => Ok(HookTarget::Static(hooks)),
            HookSource::Isolated { .. } => {
                let loader = self.require_loader(id)?;
                let handle = loader
                    .handle(id)
                    .await
                    .ok_or_else(|| CoreError::UnitNotLoaded(id.to_string()))?;
                let guard = handle
                    .enter()
                    .ok_or_else(|| CoreError::UnitNotLoaded(id.to_string()))?;
                self.runtime_mut(id).unit = Some(handle);
                Ok(HookTarget::Unit(guard))
            }
        }
    }

    fn require_loader(&self, id: &str) -> Result<Arc<IsolatedUnitLoader>> {
        self.loader.clone().ok_or_else(|| CoreError::LoadFailed {
            unit_id: id.to_string(),
            reason: "未配置隔离单元加载器".to_string(),
        })
    }

    /// 卸载隔离模块的单元（若已加载）
    async fn unload_unit(&mut self, id: &str) -> std::result::Result<(), PhaseFailure> {
        let Some(loader) = self.loader.clone() else {
            return Ok(());
        };
        let isolated = self
            .registry
            .get(id)
            .map(|entry| entry.source.is_isolated())
            .unwrap_or(false);
        if !isolated || !loader.is_loaded(id).await {
            return Ok(());
        }

        match loader.unload(id).await {
            Ok(report) => {
                if let ReclamationStatus::Unconfirmed { attempts } = report.reclamation {
                    warn!(module_id = %id, attempts, "隔离单元已释放，回收未确认");
                }
                if let Some(err) = &report.deactivation_error {
                    warn!(module_id = %id, error = %err, "隔离单元停用钩子失败");
                }
                self.runtime_mut(id).unit = None;
                Ok(())
            }
            Err(err) => Err(PhaseFailure::new(
                id,
                LifecyclePhase::Stopped,
                anyhow::Error::new(err),
            )),
        }
    }
}

impl fmt::Debug for LifecycleOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleOrchestrator")
            .field("order", &self.order)
            .field("states", &self.states())
            .finish_non_exhaustive()
    }
}

/// 调用时解析出的钩子
enum HookTarget {
    Static(Arc<dyn ModuleHooks>),
    Unit(super::loader::UnitGuard),
}

impl HookTarget {
    async fn call(&self, ctx: &PhaseContext) -> anyhow::Result<()> {
        match self {
            HookTarget::Static(hooks) => dispatch(hooks.as_ref(), ctx).await,
            HookTarget::Unit(guard) => {
                let span = guard.span().clone();
                dispatch(guard.unit(), ctx).instrument(span).await
            }
        }
    }
}
