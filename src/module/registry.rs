//! 模块注册表
//!
//! 保存所有已注册模块的清单与钩子来源。注册表由调用方显式持有并传给编排器，
//! 进程内不存在任何全局的“已加载模块表”。

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use super::hooks::ModuleHooks;
use super::manifest::Manifest;
use crate::utils::{CoreError, Result};

/// 钩子来源
#[derive(Clone)]
pub enum HookSource {
    /// 静态注册的钩子实例
    Static(Arc<dyn ModuleHooks>),
    /// 由隔离单元加载器按来源 ID 加载
    Isolated {
        /// 交给 [`SourceLocator`](super::runtime::SourceLocator) 的来源 ID
        source_id: String,
    },
}

impl HookSource {
    /// 是否为隔离单元
    pub fn is_isolated(&self) -> bool {
        matches!(self, HookSource::Isolated { .. })
    }
}

impl fmt::Debug for HookSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookSource::Static(_) => f.write_str("Static"),
            HookSource::Isolated { source_id } => f
                .debug_struct("Isolated")
                .field("source_id", source_id)
                .finish(),
        }
    }
}

/// 注册表条目
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    /// 模块清单
    pub manifest: Manifest,
    /// 钩子来源
    pub source: HookSource,
}

impl RegistryEntry {
    /// 模块 ID
    pub fn id(&self) -> &str {
        &self.manifest.id
    }
}

/// 模块注册表
///
/// 保留注册顺序，依赖解析以此顺序打破平局。
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    entries: Vec<RegistryEntry>,
    index: HashMap<String, usize>,
}

impl ModuleRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册模块
    ///
    /// # 错误
    ///
    /// - 清单结构无效：`InvalidManifest`
    /// - 模块 ID 已注册：`InvalidManifest`
    pub fn register(&mut self, manifest: Manifest, source: HookSource) -> Result<()> {
        if let Err(errors) = manifest.validate() {
            return Err(CoreError::InvalidManifest(errors.join("; ")));
        }

        if self.index.contains_key(&manifest.id) {
            return Err(CoreError::InvalidManifest(format!(
                "模块 '{}' 已注册",
                manifest.id
            )));
        }

        info!(
            module_id = %manifest.id,
            version = %manifest.version,
            isolated = source.is_isolated(),
            "注册模块"
        );

        self.index.insert(manifest.id.clone(), self.entries.len());
        self.entries.push(RegistryEntry { manifest, source });
        Ok(())
    }

    /// 注册静态钩子模块
    pub fn register_static<H>(&mut self, manifest: Manifest, hooks: H) -> Result<()>
    where
        H: ModuleHooks + 'static,
    {
        self.register(manifest, HookSource::Static(Arc::new(hooks)))
    }

    /// 注册隔离单元模块
    pub fn register_isolated(
        &mut self,
        manifest: Manifest,
        source_id: impl Into<String>,
    ) -> Result<()> {
        self.register(
            manifest,
            HookSource::Isolated {
                source_id: source_id.into(),
            },
        )
    }

    /// 获取条目
    pub fn get(&self, module_id: &str) -> Option<&RegistryEntry> {
        self.index.get(module_id).map(|&i| &self.entries[i])
    }

    /// 获取条目，不存在时返回 `ModuleNotFound`
    pub fn require(&self, module_id: &str) -> Result<&RegistryEntry> {
        self.get(module_id)
            .ok_or_else(|| CoreError::ModuleNotFound(module_id.to_string()))
    }

    /// 是否已注册
    pub fn contains(&self, module_id: &str) -> bool {
        self.index.contains_key(module_id)
    }

    /// 按注册顺序遍历条目
    pub fn entries(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.iter()
    }

    /// 按注册顺序返回全部清单
    pub fn manifests(&self) -> Vec<Manifest> {
        debug!(count = self.entries.len(), "导出模块清单");
        self.entries.iter().map(|e| e.manifest.clone()).collect()
    }

    /// 按注册顺序返回全部模块 ID
    pub fn ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.manifest.id.clone()).collect()
    }

    /// 模块数量
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::hooks::NoopHooks;
    use crate::module::manifest::Dependency;
    use crate::module::version::VersionSpec;

    fn manifest(id: &str) -> Manifest {
        Manifest::new(id, id, VersionSpec::new(1, 0, 0))
    }

    #[test]
    fn test_register_preserves_order() {
        let mut registry = ModuleRegistry::new();
        registry.register_static(manifest("mail"), NoopHooks).unwrap();
        registry.register_isolated(manifest("calendar"), "calendar-src").unwrap();
        registry.register_static(manifest("core"), NoopHooks).unwrap();

        assert_eq!(registry.ids(), vec!["mail", "calendar", "core"]);
        assert_eq!(registry.len(), 3);
        assert!(registry.get("calendar").unwrap().source.is_isolated());
        assert!(!registry.get("core").unwrap().source.is_isolated());
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = ModuleRegistry::new();
        registry.register_static(manifest("mail"), NoopHooks).unwrap();
        let err = registry.register_static(manifest("mail"), NoopHooks).unwrap_err();

        assert!(matches!(err, CoreError::InvalidManifest(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_invalid_manifest_rejected() {
        let mut registry = ModuleRegistry::new();
        let bad = manifest("mail").with_dependency(Dependency::required("mail"));

        assert!(matches!(
            registry.register_static(bad, NoopHooks),
            Err(CoreError::InvalidManifest(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_require_missing() {
        let registry = ModuleRegistry::new();
        assert!(matches!(
            registry.require("ghost"),
            Err(CoreError::ModuleNotFound(_))
        ));
    }
}
