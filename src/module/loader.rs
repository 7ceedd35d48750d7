//! 隔离单元加载器
//!
//! 把代码单元加载到各自的隔离边界中运行，并支持卸载与重载。
//!
//! # 所有权约定
//!
//! - 边界（[`IsolationBoundary`]）独占单元实例、边界内存储和单元登记的资源
//! - 对外只发放 [`UnitHandle`]（弱引用），每次调用通过 [`UnitHandle::enter`] 临时固定边界
//! - 卸载时先调用停用钩子，再释放资源，最后丢弃边界的唯一强引用
//!
//! 丢弃强引用后，仍在进行中的调用可能还持有边界。加载器用弱引用探测回收情况，
//! 在有限次数内确认不了就报告“已释放，回收未确认”，而不是无限等待。
//!
//! # 并发
//!
//! 同一单元 ID 上的 load / unload / reload 互斥，重叠的请求直接以
//! `ConcurrentOperationRejected` 拒绝；不同 ID 之间互不影响。

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, warn, Instrument, Span};

use super::events::UnitEvent;
use super::runtime::{CodeUnit, OwnedResource, SourceLocator, UnitContext};
use crate::core::config::LoaderConfig;
use crate::utils::{error_code, generate_boundary_id, unit_span, CoreError, Result};

// ============================================================================
// 状态与报告
// ============================================================================

/// 单元状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitState {
    /// 未加载
    #[default]
    Unloaded,
    /// 加载中
    Loading,
    /// 运行中
    Running,
    /// 卸载中
    Unloading,
    /// 加载失败
    Failed,
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UnitState::Unloaded => "Unloaded",
            UnitState::Loading => "Loading",
            UnitState::Running => "Running",
            UnitState::Unloading => "Unloading",
            UnitState::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// 回收探测结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReclamationStatus {
    /// 已确认回收（第几次探测确认）
    Confirmed {
        /// 探测次数
        attempts: u32,
    },
    /// 已释放，但探测次数用尽仍未确认回收
    Unconfirmed {
        /// 探测次数
        attempts: u32,
    },
}

impl ReclamationStatus {
    /// 是否已确认回收
    pub fn is_confirmed(&self) -> bool {
        matches!(self, ReclamationStatus::Confirmed { .. })
    }
}

/// 卸载报告
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnloadReport {
    /// 单元 ID
    pub unit_id: String,
    /// 被释放的边界 ID
    pub boundary_id: String,
    /// 回收探测结果
    pub reclamation: ReclamationStatus,
    /// 停用钩子的错误（不阻止卸载）
    pub deactivation_error: Option<String>,
}

impl UnloadReport {
    /// 回收未确认时对应的软错误
    pub fn soft_error(&self) -> Option<CoreError> {
        match self.reclamation {
            ReclamationStatus::Confirmed { .. } => None,
            ReclamationStatus::Unconfirmed { attempts } => Some(CoreError::UnloadTimeout {
                unit_id: self.unit_id.clone(),
                attempts,
            }),
        }
    }
}

// ============================================================================
// 隔离边界
// ============================================================================

/// 边界内部：单元实例及其独占的全部资源
struct BoundaryArena {
    unit_id: String,
    boundary_id: String,
    unit: Box<dyn CodeUnit>,
    storage: Mutex<HashMap<String, Value>>,
    resources: Mutex<Vec<OwnedResource>>,
    span: Span,
}

impl BoundaryArena {
    fn context(&self) -> UnitContext<'_> {
        UnitContext::new(
            &self.unit_id,
            &self.boundary_id,
            &self.storage,
            &self.resources,
            &self.span,
        )
    }

    /// 按登记的逆序释放资源，返回释放数量
    fn dispose_resources(&self) -> usize {
        let resources: Vec<OwnedResource> = std::mem::take(&mut *self.resources.lock());
        let count = resources.len();
        let _entered = self.span.enter();
        for resource in resources.into_iter().rev() {
            resource.dispose();
        }
        count
    }
}

impl Drop for BoundaryArena {
    fn drop(&mut self) {
        let leftover = self.dispose_resources();
        if leftover > 0 {
            warn!(
                unit_id = %self.unit_id,
                boundary_id = %self.boundary_id,
                leftover,
                "边界销毁时仍有未释放的资源，已强制释放"
            );
        }
        self.storage.lock().clear();
    }
}

/// 隔离边界
///
/// 持有边界的唯一强引用。释放边界即丢弃该引用。
pub struct IsolationBoundary {
    arena: Arc<BoundaryArena>,
}

impl IsolationBoundary {
    fn new(unit_id: &str, unit: Box<dyn CodeUnit>) -> Self {
        let boundary_id = generate_boundary_id();
        let span = unit_span(unit_id, &boundary_id);
        Self {
            arena: Arc::new(BoundaryArena {
                unit_id: unit_id.to_string(),
                boundary_id,
                unit,
                storage: Mutex::new(HashMap::new()),
                resources: Mutex::new(Vec::new()),
                span,
            }),
        }
    }

    /// 边界 ID
    pub fn id(&self) -> &str {
        &self.arena.boundary_id
    }

    /// 单元 ID
    pub fn unit_id(&self) -> &str {
        &self.arena.unit_id
    }

    fn handle(&self) -> UnitHandle {
        UnitHandle {
            unit_id: self.arena.unit_id.clone(),
            boundary_id: self.arena.boundary_id.clone(),
            arena: Arc::downgrade(&self.arena),
        }
    }

    /// 释放边界，返回回收探针
    fn release(self) -> Weak<BoundaryArena> {
        let probe = Arc::downgrade(&self.arena);
        drop(self.arena);
        probe
    }
}

impl fmt::Debug for IsolationBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IsolationBoundary")
            .field("unit_id", &self.arena.unit_id)
            .field("boundary_id", &self.arena.boundary_id)
            .finish()
    }
}

/// 单元句柄
///
/// 只持有弱引用，单元卸载后句柄自动失效。
#[derive(Clone)]
pub struct UnitHandle {
    unit_id: String,
    boundary_id: String,
    arena: Weak<BoundaryArena>,
}

impl UnitHandle {
    /// 单元 ID
    pub fn unit_id(&self) -> &str {
        &self.unit_id
    }

    /// 边界 ID
    pub fn boundary_id(&self) -> &str {
        &self.boundary_id
    }

    /// 边界是否仍然存活
    pub fn is_alive(&self) -> bool {
        self.arena.strong_count() > 0
    }

    /// 进入边界
    ///
    /// 返回的守卫在存活期间固定边界；单元已卸载时返回 `None`。
    pub fn enter(&self) -> Option<UnitGuard> {
        self.arena.upgrade().map(|arena| UnitGuard { arena })
    }
}

impl fmt::Debug for UnitHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitHandle")
            .field("unit_id", &self.unit_id)
            .field("boundary_id", &self.boundary_id)
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// 进行中的调用
///
/// 持有期间边界不会被回收。
pub struct UnitGuard {
    arena: Arc<BoundaryArena>,
}

impl UnitGuard {
    /// 单元实例
    pub fn unit(&self) -> &dyn CodeUnit {
        self.arena.unit.as_ref()
    }

    /// 单元上下文
    pub fn context(&self) -> UnitContext<'_> {
        self.arena.context()
    }

    /// 单元专属日志 span
    pub fn span(&self) -> &Span {
        &self.arena.span
    }

    /// 边界 ID
    pub fn boundary_id(&self) -> &str {
        &self.arena.boundary_id
    }
}

// ============================================================================
// 加载器
// ============================================================================

/// 已加载单元
#[derive(Debug)]
struct LoadedUnit {
    source_id: String,
    boundary: IsolationBoundary,
    loaded_at: DateTime<Utc>,
}

/// 单元操作守卫：存活期间占用该单元 ID
struct OperationGuard<'a> {
    in_flight: &'a Mutex<HashSet<String>>,
    unit_id: String,
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.unit_id);
    }
}

/// 隔离单元加载器
pub struct IsolatedUnitLoader {
    locator: Arc<dyn SourceLocator>,
    config: LoaderConfig,
    units: RwLock<HashMap<String, LoadedUnit>>,
    states: RwLock<HashMap<String, UnitState>>,
    in_flight: Mutex<HashSet<String>>,
    events: broadcast::Sender<UnitEvent>,
}

impl IsolatedUnitLoader {
    /// 创建加载器
    pub fn new(locator: Arc<dyn SourceLocator>, config: LoaderConfig) -> Self {
        info!(entry_symbol = %config.entry_symbol, "创建隔离单元加载器");
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            locator,
            config,
            units: RwLock::new(HashMap::new()),
            states: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashSet::new()),
            events,
        }
    }

    /// 加载器配置
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// 订阅单元通知
    pub fn subscribe(&self) -> broadcast::Receiver<UnitEvent> {
        self.events.subscribe()
    }

    // ==================== 加载 ====================

    /// 加载单元
    ///
    /// # 加载流程
    /// 1. 占用单元 ID（已有操作进行中则拒绝）
    /// 2. 通过来源定位器取得可加载单元
    /// 3. 查找入口符号并实例化
    /// 4. 建立隔离边界，调用加载钩子
    ///
    /// 入口符号缺失、实例化失败或加载钩子失败时，边界立即销毁，单元进入 `Failed`。
    pub async fn load(&self, unit_id: &str, source_id: &str) -> Result<UnitHandle> {
        let _op = self.begin(unit_id)?;
        self.load_inner(unit_id, source_id).await
    }

    async fn load_inner(&self, unit_id: &str, source_id: &str) -> Result<UnitHandle> {
        if self.units.read().await.contains_key(unit_id) {
            warn!(unit_id = %unit_id, "单元已加载");
            return Err(CoreError::UnitAlreadyLoaded(unit_id.to_string()));
        }

        info!(unit_id = %unit_id, source_id = %source_id, "开始加载单元");
        self.set_state(unit_id, UnitState::Loading).await;

        let boundary = match self.instantiate(unit_id, source_id).await {
            Ok(boundary) => boundary,
            Err(reason) => {
                error!(
                    unit_id = %unit_id,
                    error_code = error_code::UNIT_LOAD_FAILED,
                    reason = %reason,
                    "单元加载失败"
                );
                self.set_state(unit_id, UnitState::Failed).await;
                self.emit(UnitEvent::error(unit_id, reason.clone()));
                return Err(CoreError::LoadFailed {
                    unit_id: unit_id.to_string(),
                    reason,
                });
            }
        };

        let handle = boundary.handle();
        let boundary_id = boundary.id().to_string();

        self.units.write().await.insert(
            unit_id.to_string(),
            LoadedUnit {
                source_id: source_id.to_string(),
                boundary,
                loaded_at: Utc::now(),
            },
        );
        self.set_state(unit_id, UnitState::Running).await;
        self.emit(UnitEvent::loaded(unit_id, boundary_id.as_str()));

        info!(unit_id = %unit_id, boundary_id = %boundary_id, "单元加载完成");
        Ok(handle)
    }

    /// 定位、实例化并激活单元；失败时返回原因，边界已销毁
    async fn instantiate(
        &self,
        unit_id: &str,
        source_id: &str,
    ) -> std::result::Result<IsolationBoundary, String> {
        let loadable = self
            .locator
            .locate(source_id)
            .await
            .map_err(|e| e.to_string())?;

        let entry = &self.config.entry_symbol;
        let factory = loadable
            .resolve(entry)
            .ok_or_else(|| format!("未找到入口符号 '{}'", entry))?;

        let unit = factory().map_err(|e| format!("实例化失败: {:#}", e))?;
        let boundary = IsolationBoundary::new(unit_id, unit);
        debug!(unit_id = %unit_id, boundary_id = %boundary.id(), "隔离边界已建立");

        let arena = &boundary.arena;
        let activated = {
            let ctx = arena.context();
            arena.unit.on_load(&ctx).instrument(arena.span.clone()).await
        };

        match activated {
            Ok(()) => Ok(boundary),
            Err(e) => {
                let boundary_id = boundary.id().to_string();
                boundary.arena.dispose_resources();
                drop(boundary);
                debug!(unit_id = %unit_id, boundary_id = %boundary_id, "激活失败，隔离边界已销毁");
                Err(format!("加载钩子失败: {:#}", e))
            }
        }
    }

    // ==================== 卸载 ====================

    /// 卸载单元
    ///
    /// 停用钩子失败不会阻止卸载，错误记录在报告中。回收未确认属于软错误：
    /// 记录警告并在报告中标记为 `Unconfirmed`，单元在逻辑上仍视为已卸载。
    pub async fn unload(&self, unit_id: &str) -> Result<UnloadReport> {
        let _op = self.begin(unit_id)?;
        self.unload_inner(unit_id).await
    }

    async fn unload_inner(&self, unit_id: &str) -> Result<UnloadReport> {
        let loaded = self
            .units
            .write()
            .await
            .remove(unit_id)
            .ok_or_else(|| CoreError::UnitNotLoaded(unit_id.to_string()))?;

        self.set_state(unit_id, UnitState::Unloading).await;
        let boundary_id = loaded.boundary.id().to_string();
        info!(
            unit_id = %unit_id,
            boundary_id = %boundary_id,
            uptime_ms = (Utc::now() - loaded.loaded_at).num_milliseconds(),
            "开始卸载单元"
        );

        let deactivation_error = {
            let arena = &loaded.boundary.arena;
            let ctx = arena.context();
            match arena.unit.on_unload(&ctx).instrument(arena.span.clone()).await {
                Ok(()) => None,
                Err(e) => {
                    warn!(unit_id = %unit_id, error = %format!("{:#}", e), "停用钩子失败，继续卸载");
                    Some(format!("{:#}", e))
                }
            }
        };

        let disposed = loaded.boundary.arena.dispose_resources();
        debug!(unit_id = %unit_id, disposed, "单元资源已释放");

        let probe = loaded.boundary.release();
        let reclamation = self.probe_reclamation(unit_id, &probe).await;

        self.set_state(unit_id, UnitState::Unloaded).await;
        if let Some(message) = &deactivation_error {
            self.emit(UnitEvent::error(unit_id, message.clone()).with_boundary(boundary_id.as_str()));
        }
        let message = match reclamation {
            ReclamationStatus::Confirmed { .. } => "reclaimed",
            ReclamationStatus::Unconfirmed { .. } => "released, reclamation unconfirmed",
        };
        self.emit(UnitEvent::unloaded(unit_id, boundary_id.as_str()).with_message(message));

        info!(unit_id = %unit_id, boundary_id = %boundary_id, "单元卸载完成");
        Ok(UnloadReport {
            unit_id: unit_id.to_string(),
            boundary_id,
            reclamation,
            deactivation_error,
        })
    }

    /// 轮询回收探针
    async fn probe_reclamation(&self, unit_id: &str, probe: &Weak<BoundaryArena>) -> ReclamationStatus {
        let attempts = self.config.reclaim_attempts.max(1);
        for attempt in 1..=attempts {
            if probe.strong_count() == 0 {
                debug!(unit_id = %unit_id, attempts = attempt, "边界已回收");
                return ReclamationStatus::Confirmed { attempts: attempt };
            }
            if attempt < attempts {
                tokio::time::sleep(self.config.reclaim_interval()).await;
            }
        }

        let soft = CoreError::UnloadTimeout {
            unit_id: unit_id.to_string(),
            attempts,
        };
        warn!(
            unit_id = %unit_id,
            error_code = soft.error_code(),
            in_flight = probe.strong_count(),
            "{}",
            soft
        );
        ReclamationStatus::Unconfirmed { attempts }
    }

    // ==================== 重载 ====================

    /// 重载单元：卸载，稳定等待，再从同一来源加载
    ///
    /// 两步之间不是原子的：加载失败时单元保持未加载状态，不会恢复旧实例。
    pub async fn reload(&self, unit_id: &str) -> Result<UnitHandle> {
        let _op = self.begin(unit_id)?;

        let source_id = self
            .units
            .read()
            .await
            .get(unit_id)
            .map(|u| u.source_id.clone())
            .ok_or_else(|| CoreError::UnitNotLoaded(unit_id.to_string()))?;

        info!(unit_id = %unit_id, source_id = %source_id, "开始重载单元");
        let report = self.unload_inner(unit_id).await?;
        debug!(
            unit_id = %unit_id,
            confirmed = report.reclamation.is_confirmed(),
            "旧边界已释放"
        );

        tokio::time::sleep(self.config.reload_settle()).await;
        self.load_inner(unit_id, &source_id).await
    }

    // ==================== 查询 ====================

    /// 单元状态（从未出现过的单元视为 `Unloaded`）
    pub async fn state(&self, unit_id: &str) -> UnitState {
        self.states
            .read()
            .await
            .get(unit_id)
            .copied()
            .unwrap_or_default()
    }

    /// 获取单元句柄
    pub async fn handle(&self, unit_id: &str) -> Option<UnitHandle> {
        self.units
            .read()
            .await
            .get(unit_id)
            .map(|u| u.boundary.handle())
    }

    /// 单元是否已加载
    pub async fn is_loaded(&self, unit_id: &str) -> bool {
        self.units.read().await.contains_key(unit_id)
    }

    /// 已加载的单元 ID（已排序）
    pub async fn loaded_units(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.units.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// 单元的来源 ID
    pub async fn source_of(&self, unit_id: &str) -> Option<String> {
        self.units
            .read()
            .await
            .get(unit_id)
            .map(|u| u.source_id.clone())
    }

    // ==================== 内部方法 ====================

    /// 占用单元 ID；在第一个 await 之前同步完成
    fn begin(&self, unit_id: &str) -> Result<OperationGuard<'_>> {
        let mut in_flight = self.in_flight.lock();
        if !in_flight.insert(unit_id.to_string()) {
            warn!(
                unit_id = %unit_id,
                error_code = error_code::UNIT_OPERATION_IN_PROGRESS,
                "单元正在执行其他操作，拒绝请求"
            );
            return Err(CoreError::ConcurrentOperationRejected(unit_id.to_string()));
        }
        Ok(OperationGuard {
            in_flight: &self.in_flight,
            unit_id: unit_id.to_string(),
        })
    }

    async fn set_state(&self, unit_id: &str, state: UnitState) {
        debug!(unit_id = %unit_id, state = %state, "单元状态变更");
        self.states.write().await.insert(unit_id.to_string(), state);
    }

    fn emit(&self, event: UnitEvent) {
        debug!(unit_id = %event.unit_id, event_type = event.event_type(), "发布单元通知");
        // 没有订阅者时发送失败，忽略
        let _ = self.events.send(event);
    }
}

impl fmt::Debug for IsolatedUnitLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IsolatedUnitLoader")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::events::UnitEventKind;
    use crate::module::hooks::ModuleHooks;
    use crate::module::runtime::{LoadableUnit, StaticSourceLocator};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const DEFAULT_ENTRY: &str = crate::core::config::DEFAULT_ENTRY_SYMBOL;

    #[derive(Default)]
    struct Probe {
        loads: AtomicUsize,
        unloads: AtomicUsize,
        disposed: Arc<AtomicUsize>,
    }

    struct TestUnit {
        probe: Arc<Probe>,
        fail_load: bool,
        fail_unload: bool,
    }

    impl ModuleHooks for TestUnit {}

    #[async_trait]
    impl CodeUnit for TestUnit {
        async fn on_load(&self, ctx: &UnitContext<'_>) -> anyhow::Result<()> {
            self.probe.loads.fetch_add(1, Ordering::SeqCst);
            let disposed = self.probe.disposed.clone();
            ctx.own("buffer", move || {
                disposed.fetch_add(1, Ordering::SeqCst);
            });
            ctx.put("greeting", Value::from("hello"));
            if self.fail_load {
                anyhow::bail!("activation refused");
            }
            Ok(())
        }

        async fn on_unload(&self, ctx: &UnitContext<'_>) -> anyhow::Result<()> {
            self.probe.unloads.fetch_add(1, Ordering::SeqCst);
            assert_eq!(ctx.get("greeting"), Some(Value::from("hello")));
            if self.fail_unload {
                anyhow::bail!("flush failed");
            }
            Ok(())
        }
    }

    fn unit(probe: &Arc<Probe>, fail_load: bool, fail_unload: bool) -> LoadableUnit {
        let probe = probe.clone();
        LoadableUnit::with_entry(move || {
            Ok(Box::new(TestUnit {
                probe: probe.clone(),
                fail_load,
                fail_unload,
            }))
        })
    }

    fn fast_config() -> LoaderConfig {
        LoaderConfig {
            reclaim_attempts: 3,
            reclaim_interval_ms: 1,
            reload_settle_ms: 5,
            ..LoaderConfig::default()
        }
    }

    fn loader_with(source: &str, unit: LoadableUnit) -> IsolatedUnitLoader {
        let locator = StaticSourceLocator::new().with(source, unit);
        IsolatedUnitLoader::new(Arc::new(locator), fast_config())
    }

    #[tokio::test]
    async fn test_load_and_unload() {
        let probe = Arc::new(Probe::default());
        let loader = loader_with("mail-src", unit(&probe, false, false));

        let handle = loader.load("mail", "mail-src").await.unwrap();
        assert!(handle.is_alive());
        assert!(crate::utils::id::is_boundary_id(handle.boundary_id()));
        assert_eq!(loader.state("mail").await, UnitState::Running);
        assert_eq!(loader.loaded_units().await, vec!["mail"]);
        assert_eq!(probe.loads.load(Ordering::SeqCst), 1);

        let report = loader.unload("mail").await.unwrap();
        assert_eq!(report.boundary_id, handle.boundary_id());
        assert_eq!(report.reclamation, ReclamationStatus::Confirmed { attempts: 1 });
        assert!(report.deactivation_error.is_none());
        assert!(report.soft_error().is_none());

        assert!(!handle.is_alive());
        assert!(handle.enter().is_none());
        assert_eq!(loader.state("mail").await, UnitState::Unloaded);
        assert_eq!(probe.unloads.load(Ordering::SeqCst), 1);
        assert_eq!(probe.disposed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_entry_symbol() {
        let probe = Arc::new(Probe::default());
        let only_other = LoadableUnit::new().export("something_else", {
            let probe = probe.clone();
            move || {
                Ok(Box::new(TestUnit {
                    probe: probe.clone(),
                    fail_load: false,
                    fail_unload: false,
                }))
            }
        });
        let loader = loader_with("mail-src", only_other);
        let mut events = loader.subscribe();

        let err = loader.load("mail", "mail-src").await.unwrap_err();
        assert!(matches!(err, CoreError::LoadFailed { .. }));
        assert!(err.to_string().contains(DEFAULT_ENTRY));
        assert_eq!(loader.state("mail").await, UnitState::Failed);
        assert!(!loader.is_loaded("mail").await);
        assert_eq!(events.recv().await.unwrap().kind, UnitEventKind::Error);
    }

    #[tokio::test]
    async fn test_activation_failure_tears_down_boundary() {
        let probe = Arc::new(Probe::default());
        let loader = loader_with("mail-src", unit(&probe, true, false));

        let err = loader.load("mail", "mail-src").await.unwrap_err();
        assert!(err.to_string().contains("activation refused"));
        assert_eq!(loader.state("mail").await, UnitState::Failed);
        assert!(loader.handle("mail").await.is_none());
        // 激活钩子里登记的资源已随边界释放
        assert_eq!(probe.disposed.load(Ordering::SeqCst), 1);

        // 失败的单元不残留，再次加载会重新走完整流程
        assert!(matches!(
            loader.load("mail", "mail-src").await,
            Err(CoreError::LoadFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_source() {
        let loader = IsolatedUnitLoader::new(Arc::new(StaticSourceLocator::new()), fast_config());
        let err = loader.load("mail", "nowhere").await.unwrap_err();
        assert!(matches!(err, CoreError::LoadFailed { .. }));
    }

    #[tokio::test]
    async fn test_double_load_rejected() {
        let probe = Arc::new(Probe::default());
        let loader = loader_with("mail-src", unit(&probe, false, false));

        loader.load("mail", "mail-src").await.unwrap();
        assert!(matches!(
            loader.load("mail", "mail-src").await,
            Err(CoreError::UnitAlreadyLoaded(_))
        ));
        assert_eq!(loader.state("mail").await, UnitState::Running);
    }

    #[tokio::test]
    async fn test_unload_not_loaded() {
        let loader = IsolatedUnitLoader::new(Arc::new(StaticSourceLocator::new()), fast_config());
        assert!(matches!(
            loader.unload("ghost").await,
            Err(CoreError::UnitNotLoaded(_))
        ));
    }

    #[tokio::test]
    async fn test_deactivation_error_does_not_block_unload() {
        let probe = Arc::new(Probe::default());
        let loader = loader_with("mail-src", unit(&probe, false, true));

        loader.load("mail", "mail-src").await.unwrap();
        let report = loader.unload("mail").await.unwrap();

        assert!(report.deactivation_error.unwrap().contains("flush failed"));
        assert_eq!(loader.state("mail").await, UnitState::Unloaded);
        assert_eq!(probe.disposed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_in_flight_call_leaves_reclamation_unconfirmed() {
        let probe = Arc::new(Probe::default());
        let loader = loader_with("mail-src", unit(&probe, false, false));

        let handle = loader.load("mail", "mail-src").await.unwrap();
        let pinned = handle.enter().unwrap();

        let report = loader.unload("mail").await.unwrap();
        assert_eq!(report.reclamation, ReclamationStatus::Unconfirmed { attempts: 3 });
        assert!(report.soft_error().unwrap().is_soft());
        assert_eq!(loader.state("mail").await, UnitState::Unloaded);
        // 资源在边界释放前已清理，不依赖回收
        assert_eq!(probe.disposed.load(Ordering::SeqCst), 1);

        drop(pinned);
        assert!(!handle.is_alive());
    }

    #[tokio::test]
    async fn test_reload_picks_up_new_source() {
        let probe = Arc::new(Probe::default());
        let locator = Arc::new(StaticSourceLocator::new().with("mail-src", unit(&probe, false, false)));
        let loader = IsolatedUnitLoader::new(locator.clone(), fast_config());

        let first = loader.load("mail", "mail-src").await.unwrap();

        let probe_v2 = Arc::new(Probe::default());
        locator.insert("mail-src", unit(&probe_v2, false, false));

        let second = loader.reload("mail").await.unwrap();
        assert_ne!(first.boundary_id(), second.boundary_id());
        assert!(!first.is_alive());
        assert_eq!(probe.unloads.load(Ordering::SeqCst), 1);
        assert_eq!(probe_v2.loads.load(Ordering::SeqCst), 1);
        assert_eq!(loader.source_of("mail").await.as_deref(), Some("mail-src"));
    }

    #[tokio::test]
    async fn test_operations_on_different_units_are_independent() {
        let probe = Arc::new(Probe::default());
        let locator = StaticSourceLocator::new()
            .with("a-src", unit(&probe, false, false))
            .with("b-src", unit(&probe, false, false));
        let loader = IsolatedUnitLoader::new(Arc::new(locator), fast_config());

        let (a, b) = tokio::join!(loader.load("a", "a-src"), loader.load("b", "b-src"));
        assert!(a.is_ok());
        assert!(b.is_ok());
        assert_eq!(loader.loaded_units().await, vec!["a", "b"]);
    }
}
