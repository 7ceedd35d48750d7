//! 隔离单元运行时接口
//!
//! 定义可热重载代码单元与外部来源之间的契约：
//!
//! - [`SourceLocator`] - 根据来源 ID 找到可加载的单元
//! - [`LoadableUnit`] - 导出符号表（符号名 -> 单元工厂），对应共享库的符号查找
//! - [`CodeUnit`] - 单元本身：生命周期钩子 + 加载/卸载钩子
//! - [`UnitContext`] - 钩子执行期间从隔离边界借出的上下文
//!
//! 单元在边界内分配的资源必须在边界内释放：通过 [`UnitContext::own`]
//! 登记的资源会在边界释放前按登记的逆序逐一清理。

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::{debug, Span};

use super::hooks::ModuleHooks;
use crate::core::config::DEFAULT_ENTRY_SYMBOL;
use crate::utils::{CoreError, Result};

// ============================================================================
// 代码单元
// ============================================================================

/// 可热重载的代码单元
///
/// 除四个生命周期钩子外，单元还有加载与卸载钩子。两者都只能通过借用的
/// [`UnitContext`] 访问边界内的状态，调用结束后不会留下任何指向边界内部的引用。
#[async_trait]
pub trait CodeUnit: ModuleHooks {
    /// 加载（激活）钩子
    async fn on_load(&self, _ctx: &UnitContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// 卸载（停用）钩子
    async fn on_unload(&self, _ctx: &UnitContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }
}

/// 单元工厂：实例化一个代码单元
pub type UnitFactory = Arc<dyn Fn() -> anyhow::Result<Box<dyn CodeUnit>> + Send + Sync>;

/// 边界拥有的资源：释放时执行清理闭包
pub struct OwnedResource {
    name: String,
    dispose: Box<dyn FnOnce() + Send>,
}

impl OwnedResource {
    /// 创建资源
    pub fn new(name: impl Into<String>, dispose: impl FnOnce() + Send + 'static) -> Self {
        Self {
            name: name.into(),
            dispose: Box::new(dispose),
        }
    }

    /// 资源名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 执行清理
    pub fn dispose(self) {
        debug!(resource = %self.name, "释放单元资源");
        (self.dispose)();
    }
}

impl fmt::Debug for OwnedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnedResource").field("name", &self.name).finish()
    }
}

/// 单元上下文
///
/// 从隔离边界借出，生命周期不超过一次钩子调用。
/// 提供边界内的键值存储、资源登记以及单元专属的日志 span。
pub struct UnitContext<'a> {
    unit_id: &'a str,
    boundary_id: &'a str,
    storage: &'a Mutex<HashMap<String, Value>>,
    resources: &'a Mutex<Vec<OwnedResource>>,
    span: &'a Span,
}

impl<'a> UnitContext<'a> {
    pub(crate) fn new(
        unit_id: &'a str,
        boundary_id: &'a str,
        storage: &'a Mutex<HashMap<String, Value>>,
        resources: &'a Mutex<Vec<OwnedResource>>,
        span: &'a Span,
    ) -> Self {
        Self {
            unit_id,
            boundary_id,
            storage,
            resources,
            span,
        }
    }

    /// 单元 ID
    pub fn unit_id(&self) -> &str {
        self.unit_id
    }

    /// 边界 ID
    pub fn boundary_id(&self) -> &str {
        self.boundary_id
    }

    /// 单元专属日志 span
    pub fn logger(&self) -> &Span {
        self.span
    }

    /// 写入边界内存储，返回旧值
    pub fn put(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.storage.lock().insert(key.into(), value)
    }

    /// 读取边界内存储
    pub fn get(&self, key: &str) -> Option<Value> {
        self.storage.lock().get(key).cloned()
    }

    /// 删除边界内存储中的键
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.storage.lock().remove(key)
    }

    /// 登记由单元拥有的资源，卸载时释放
    pub fn own(&self, name: impl Into<String>, dispose: impl FnOnce() + Send + 'static) {
        let resource = OwnedResource::new(name, dispose);
        self.span.in_scope(|| debug!(resource = %resource.name(), "登记单元资源"));
        self.resources.lock().push(resource);
    }

    /// 已登记的资源数量
    pub fn owned_resources(&self) -> usize {
        self.resources.lock().len()
    }
}

// ============================================================================
// 可加载单元与来源定位
// ============================================================================

/// 可加载的单元：导出符号表
#[derive(Clone, Default)]
pub struct LoadableUnit {
    symbols: HashMap<String, UnitFactory>,
}

impl LoadableUnit {
    /// 创建空的符号表
    pub fn new() -> Self {
        Self::default()
    }

    /// 以默认入口符号导出工厂
    pub fn with_entry<F>(factory: F) -> Self
    where
        F: Fn() -> anyhow::Result<Box<dyn CodeUnit>> + Send + Sync + 'static,
    {
        Self::new().export(DEFAULT_ENTRY_SYMBOL, factory)
    }

    /// 导出符号
    pub fn export<F>(mut self, symbol: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> anyhow::Result<Box<dyn CodeUnit>> + Send + Sync + 'static,
    {
        self.symbols.insert(symbol.into(), Arc::new(factory));
        self
    }

    /// 查找符号
    pub fn resolve(&self, symbol: &str) -> Option<UnitFactory> {
        self.symbols.get(symbol).cloned()
    }

    /// 导出的符号名（已排序）
    pub fn symbols(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.symbols.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for LoadableUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadableUnit")
            .field("symbols", &self.symbols())
            .finish()
    }
}

/// 来源定位器
///
/// 给定来源 ID，产出一个可加载单元。来源可以是文件、内嵌资源等，编排器不关心。
#[async_trait]
pub trait SourceLocator: Send + Sync {
    /// 定位来源
    async fn locate(&self, source_id: &str) -> Result<LoadableUnit>;
}

/// 内存中的来源定位器
///
/// 条目可在运行时替换，重载时即可取到新的构建。
#[derive(Debug, Default)]
pub struct StaticSourceLocator {
    entries: RwLock<HashMap<String, LoadableUnit>>,
}

impl StaticSourceLocator {
    /// 创建空定位器
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加来源（构建时使用）
    pub fn with(self, source_id: impl Into<String>, unit: LoadableUnit) -> Self {
        self.insert(source_id, unit);
        self
    }

    /// 插入或替换来源，返回旧条目
    pub fn insert(&self, source_id: impl Into<String>, unit: LoadableUnit) -> Option<LoadableUnit> {
        self.entries.write().insert(source_id.into(), unit)
    }

    /// 移除来源
    pub fn remove(&self, source_id: &str) -> Option<LoadableUnit> {
        self.entries.write().remove(source_id)
    }

    /// 是否包含来源
    pub fn contains(&self, source_id: &str) -> bool {
        self.entries.read().contains_key(source_id)
    }
}

#[async_trait]
impl SourceLocator for StaticSourceLocator {
    async fn locate(&self, source_id: &str) -> Result<LoadableUnit> {
        self.entries
            .read()
            .get(source_id)
            .cloned()
            .ok_or_else(|| CoreError::LoadFailed {
                unit_id: source_id.to_string(),
                reason: format!("来源 '{}' 不存在", source_id),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::hooks::ModuleHooks;

    struct Dummy;

    impl ModuleHooks for Dummy {}
    impl CodeUnit for Dummy {}

    #[tokio::test]
    async fn test_static_locator_replace() {
        let locator = StaticSourceLocator::new()
            .with("mail", LoadableUnit::with_entry(|| Ok(Box::new(Dummy))));

        let unit = locator.locate("mail").await.unwrap();
        assert_eq!(unit.symbols(), vec![DEFAULT_ENTRY_SYMBOL]);

        let old = locator.insert("mail", LoadableUnit::new().export("other", || Ok(Box::new(Dummy))));
        assert!(old.is_some());
        let unit = locator.locate("mail").await.unwrap();
        assert!(unit.resolve(DEFAULT_ENTRY_SYMBOL).is_none());
        assert!(unit.resolve("other").is_some());

        assert!(matches!(
            locator.locate("ghost").await,
            Err(CoreError::LoadFailed { .. })
        ));
    }

    #[test]
    fn test_unit_context_storage_and_resources() {
        let storage = Mutex::new(HashMap::new());
        let resources = Mutex::new(Vec::new());
        let span = Span::none();
        let ctx = UnitContext::new("mail", "bnd-1", &storage, &resources, &span);

        assert!(ctx.put("counter", Value::from(1)).is_none());
        assert_eq!(ctx.get("counter"), Some(Value::from(1)));
        assert_eq!(ctx.remove("counter"), Some(Value::from(1)));
        assert!(ctx.get("counter").is_none());

        ctx.own("socket", || {});
        assert_eq!(ctx.owned_resources(), 1);
        assert_eq!(ctx.unit_id(), "mail");
        assert_eq!(ctx.boundary_id(), "bnd-1");
    }
}
