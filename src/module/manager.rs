//! 模块管理器
//!
//! 整合配置、注册表、设置提供者、隔离单元加载器和生命周期编排器，提供统一的模块管理接口。
//!
//! 一次编排的典型流程：
//!
//! 1. 注册模块（静态钩子或隔离单元）
//! 2. [`ModuleManager::activate`]：解析依赖，依次配置、初始化、启动
//! 3. 运行期间可以 [`ModuleManager::reload_unit`] 热重载隔离单元
//! 4. [`ModuleManager::shutdown`]：按逆序停止并卸载

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use super::dependency::{resolve, ActivationOrder, ResolutionMode};
use super::events::UnitEvent;
use super::hooks::ModuleHooks;
use super::lifecycle::{LifecycleOrchestrator, ModuleRuntimeState, ModuleState};
use super::loader::{IsolatedUnitLoader, UnitHandle, UnitState};
use super::manifest::Manifest;
use super::parser::ManifestParser;
use super::registry::ModuleRegistry;
use super::runtime::SourceLocator;
use super::settings::{SettingsProvider, StaticSettingsProvider};
use crate::core::config::OrchestratorConfig;
use crate::utils::{CoreError, Result};

/// 模块管理器
pub struct ModuleManager {
    /// 配置
    config: OrchestratorConfig,
    /// 模块注册表（编排开始后移交给编排器）
    registry: Option<ModuleRegistry>,
    /// 隔离单元加载器
    loader: Arc<IsolatedUnitLoader>,
    /// 模块设置提供者
    settings: Arc<dyn SettingsProvider>,
    /// 生命周期编排器（编排开始后创建）
    orchestrator: Option<LifecycleOrchestrator>,
    /// 取消信号
    cancel: CancellationToken,
}

impl ModuleManager {
    /// 创建模块管理器
    ///
    /// 设置提供者默认由配置文件的 `settings` 段构造。
    pub fn new(config: OrchestratorConfig, locator: Arc<dyn SourceLocator>) -> Result<Self> {
        config.validate()?;
        let loader = Arc::new(IsolatedUnitLoader::new(locator, config.loader.clone()));
        let settings: Arc<dyn SettingsProvider> =
            Arc::new(StaticSettingsProvider::from_map(config.settings.clone()));

        info!(
            dependency_resolution = config.resolution.enabled,
            dev_mode = config.dev_mode,
            "创建模块管理器"
        );

        Ok(Self {
            config,
            registry: Some(ModuleRegistry::new()),
            loader,
            settings,
            orchestrator: None,
            cancel: CancellationToken::new(),
        })
    }

    /// 替换模块设置提供者
    pub fn with_settings_provider(mut self, provider: Arc<dyn SettingsProvider>) -> Self {
        self.settings = provider;
        self
    }

    /// 配置
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// 隔离单元加载器
    pub fn loader(&self) -> &Arc<IsolatedUnitLoader> {
        &self.loader
    }

    /// 生命周期编排器（编排开始后可用）
    pub fn orchestrator(&self) -> Option<&LifecycleOrchestrator> {
        self.orchestrator.as_ref()
    }

    /// 取消信号：触发后前向阶段停止推进，停止阶段不受影响
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    // ==================== 注册 ====================

    /// 注册静态钩子模块
    pub fn register_static<H>(&mut self, manifest: Manifest, hooks: H) -> Result<()>
    where
        H: ModuleHooks + 'static,
    {
        let id = manifest.id.clone();
        self.registry_mut(&id)?.register_static(manifest, hooks)
    }

    /// 注册隔离单元模块
    pub fn register_isolated(&mut self, manifest: Manifest, source_id: impl Into<String>) -> Result<()> {
        let id = manifest.id.clone();
        self.registry_mut(&id)?.register_isolated(manifest, source_id)
    }

    /// 扫描配置中的清单目录，把每个清单注册为隔离模块（来源 ID 即模块 ID）
    pub async fn register_discovered(&mut self) -> Result<Vec<String>> {
        let manifests = ManifestParser::scan_dirs(&self.config.modules.manifest_dirs).await?;
        let mut ids = Vec::with_capacity(manifests.len());
        for manifest in manifests {
            let id = manifest.id.clone();
            self.register_isolated(manifest, id.as_str())?;
            ids.push(id);
        }
        info!(count = ids.len(), "已注册清单目录中的模块");
        Ok(ids)
    }

    fn registry_mut(&mut self, module_id: &str) -> Result<&mut ModuleRegistry> {
        self.registry.as_mut().ok_or_else(|| {
            CoreError::InvalidManifest(format!("编排已开始，无法再注册模块 '{}'", module_id))
        })
    }

    // ==================== 编排 ====================

    /// 解析激活顺序
    pub fn resolve(&self) -> Result<ActivationOrder> {
        let mode = ResolutionMode::from_enabled(self.config.resolution.enabled);
        match (&self.registry, &self.orchestrator) {
            (Some(registry), _) => resolve(&registry.manifests(), mode),
            (None, Some(orchestrator)) => Ok(orchestrator.order().clone()),
            (None, None) => Err(CoreError::InitFailed("模块注册表不可用".to_string())),
        }
    }

    /// 激活所有模块：解析依赖后依次配置、初始化、启动
    ///
    /// 失败时不会自动回滚，调用方可以随后调用 [`shutdown`](Self::shutdown)
    /// 停止已经推进过的模块。
    #[instrument(skip(self))]
    pub async fn activate(&mut self) -> Result<ActivationOrder> {
        if self.orchestrator.is_none() {
            let order = self.resolve()?;
            let registry = self
                .registry
                .take()
                .ok_or_else(|| CoreError::InitFailed("模块注册表不可用".to_string()))?;
            let orchestrator = LifecycleOrchestrator::new(registry, order)?
                .with_settings(self.settings.clone())
                .with_loader(self.loader.clone())
                .with_cancellation(self.cancel.clone());
            self.orchestrator = Some(orchestrator);
        }

        let orchestrator = self.orchestrator_mut()?;
        orchestrator.activate_all().await?;
        info!(order = %orchestrator.order(), "所有模块已启动");
        Ok(orchestrator.order().clone())
    }

    /// 停止所有模块（按激活逆序）
    #[instrument(skip(self))]
    pub async fn shutdown(&mut self) -> Result<()> {
        match self.orchestrator.as_mut() {
            Some(orchestrator) => orchestrator.stop_all().await,
            None => {
                warn!("编排尚未开始，无需停止");
                Ok(())
            }
        }
    }

    /// 热重载隔离单元
    pub async fn reload_unit(&self, module_id: &str) -> Result<UnitHandle> {
        info!(module_id = %module_id, "热重载隔离单元");
        self.loader.reload(module_id).await
    }

    fn orchestrator_mut(&mut self) -> Result<&mut LifecycleOrchestrator> {
        self.orchestrator
            .as_mut()
            .ok_or_else(|| CoreError::InitFailed("生命周期编排器尚未创建".to_string()))
    }

    // ==================== 查询 ====================

    /// 模块状态（未注册返回 `None`）
    pub fn state(&self, module_id: &str) -> Option<ModuleState> {
        match &self.orchestrator {
            Some(orchestrator) => orchestrator.get_state(module_id),
            None => self
                .registry
                .as_ref()
                .filter(|registry| registry.contains(module_id))
                .map(|_| ModuleState::Registered),
        }
    }

    /// 模块运行时状态（编排开始后可用）
    pub fn runtime_state(&self, module_id: &str) -> Option<&ModuleRuntimeState> {
        self.orchestrator.as_ref()?.runtime_state(module_id)
    }

    /// 隔离单元状态
    pub async fn unit_state(&self, module_id: &str) -> UnitState {
        self.loader.state(module_id).await
    }

    /// 订阅隔离单元通知
    pub fn subscribe_units(&self) -> broadcast::Receiver<UnitEvent> {
        self.loader.subscribe()
    }
}

impl std::fmt::Debug for ModuleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleManager")
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}
