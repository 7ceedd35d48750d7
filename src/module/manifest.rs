//! 模块清单定义
//!
//! 定义模块描述文件 (module.yaml) 中的数据结构：模块身份、声明版本与依赖。
//! 清单在注册时生成一次，注册后不再修改。

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::version::VersionSpec;

/// 依赖声明
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// 被依赖模块 ID
    #[serde(rename = "id")]
    pub target_id: String,

    /// 最低版本要求（缺省表示任意版本）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_version: Option<VersionSpec>,

    /// 是否为可选依赖
    #[serde(default)]
    pub optional: bool,
}

impl Dependency {
    /// 创建必需依赖（任意版本）
    pub fn required(target_id: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            min_version: None,
            optional: false,
        }
    }

    /// 创建可选依赖（任意版本）
    pub fn optional(target_id: impl Into<String>) -> Self {
        Self {
            optional: true,
            ..Self::required(target_id)
        }
    }

    /// 设置最低版本要求
    pub fn at_least(mut self, min_version: VersionSpec) -> Self {
        self.min_version = Some(min_version);
        self
    }

    /// 检查目标版本是否满足要求
    pub fn accepts(&self, version: &VersionSpec) -> bool {
        self.min_version
            .as_ref()
            .map_or(true, |min| version.satisfies_min(min))
    }
}

/// 模块清单
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// 模块唯一标识
    pub id: String,

    /// 模块显示名称
    #[serde(rename = "name")]
    pub display_name: String,

    /// 模块版本
    pub version: VersionSpec,

    /// 依赖声明（保持声明顺序）
    #[serde(default)]
    pub dependencies: Vec<Dependency>,

    /// 标签（仅供展示）
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// 模块描述
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl Manifest {
    /// 创建新的模块清单
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, version: VersionSpec) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            version,
            dependencies: vec![],
            tags: vec![],
            description: String::new(),
        }
    }

    /// 添加依赖
    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// 添加标签
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// 必需依赖
    pub fn required_dependencies(&self) -> impl Iterator<Item = &Dependency> {
        self.dependencies.iter().filter(|d| !d.optional)
    }

    /// 验证清单有效性
    ///
    /// 版本格式已经在反序列化时校验，这里检查结构性问题。
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = vec![];

        if self.id.trim().is_empty() {
            errors.push("模块 ID 不能为空".to_string());
        }

        if self.display_name.trim().is_empty() {
            errors.push(format!("模块 '{}' 的名称不能为空", self.id));
        }

        let mut seen = HashSet::new();
        for dep in &self.dependencies {
            if dep.target_id.trim().is_empty() {
                errors.push(format!("模块 '{}' 存在空的依赖 ID", self.id));
            } else if dep.target_id == self.id {
                errors.push(format!("模块 '{}' 不能依赖自身", self.id));
            } else if !seen.insert(dep.target_id.as_str()) {
                errors.push(format!("模块 '{}' 重复声明依赖 '{}'", self.id, dep.target_id));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
