//! 模块清单解析器
//!
//! 负责从 module.yaml（或 module.json）解析模块清单，并扫描清单目录。

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, trace, warn};

use super::manifest::{Dependency, Manifest};
use super::version::VersionSpec;
use crate::utils::{CoreError, Result};

/// 默认的模块清单文件名
pub const MANIFEST_FILENAME: &str = "module.yaml";

/// JSON 格式的模块清单文件名
pub const MANIFEST_JSON_FILENAME: &str = "module.json";

/// 清单格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    /// YAML
    Yaml,
    /// JSON
    Json,
}

impl ManifestFormat {
    /// 根据文件扩展名判断格式（默认 YAML）
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ManifestFormat::Json,
            _ => ManifestFormat::Yaml,
        }
    }
}

/// 文件中的原始清单；版本号保持字符串，转换时统一报告 `MalformedVersion`
#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    version: String,
    #[serde(default)]
    dependencies: Vec<RawDependency>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct RawDependency {
    id: String,
    #[serde(default)]
    min_version: Option<String>,
    #[serde(default)]
    optional: bool,
}

impl RawManifest {
    fn into_manifest(self) -> Result<Manifest> {
        let mut manifest = Manifest::new(self.id, self.name, VersionSpec::parse(&self.version)?);
        for dep in self.dependencies {
            let mut dependency = if dep.optional {
                Dependency::optional(dep.id)
            } else {
                Dependency::required(dep.id)
            };
            if let Some(min) = dep.min_version {
                dependency = dependency.at_least(VersionSpec::parse(&min)?);
            }
            manifest = manifest.with_dependency(dependency);
        }
        manifest.tags = self.tags;
        manifest.description = self.description;
        Ok(manifest)
    }
}

/// 模块清单解析器
#[derive(Debug, Clone, Default)]
pub struct ManifestParser;

impl ManifestParser {
    /// 创建新的解析器实例
    pub fn new() -> Self {
        Self
    }

    /// 从文件解析模块清单（按扩展名选择格式）
    ///
    /// # Errors
    ///
    /// - 文件不存在或无法读取时返回 IO 错误
    /// - 内容格式错误时返回 `Yaml` / `Json` 错误
    /// - 版本号格式错误时返回 `MalformedVersion`
    /// - 结构校验失败时返回 `InvalidManifest`
    pub async fn parse_file(path: &Path) -> Result<Manifest> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse_str(&content, ManifestFormat::from_path(path))
    }

    /// 从文件同步解析模块清单
    pub fn parse_file_sync(path: &Path) -> Result<Manifest> {
        let content = std::fs::read_to_string(path)?;
        Self::parse_str(&content, ManifestFormat::from_path(path))
    }

    /// 从字符串解析模块清单
    pub fn parse_str(content: &str, format: ManifestFormat) -> Result<Manifest> {
        let raw: RawManifest = match format {
            ManifestFormat::Yaml => serde_yaml::from_str(content)?,
            ManifestFormat::Json => serde_json::from_str(content)?,
        };
        let manifest = raw.into_manifest()?;
        Self::validate(&manifest)?;
        Ok(manifest)
    }

    /// 验证模块清单
    ///
    /// 在 [`Manifest::validate`] 的基础上检查 ID 字符集（字母、数字、下划线、连字符、点）。
    pub fn validate(manifest: &Manifest) -> Result<()> {
        let mut errors = match manifest.validate() {
            Ok(()) => Vec::new(),
            Err(errors) => errors,
        };

        if !manifest.id.is_empty() && !Self::is_valid_module_id(&manifest.id) {
            errors.push(format!(
                "模块 ID '{}' 格式无效，只允许字母、数字、下划线、连字符和点",
                manifest.id
            ));
        }
        for dep in &manifest.dependencies {
            if !dep.target_id.is_empty() && !Self::is_valid_module_id(&dep.target_id) {
                errors.push(format!("依赖 ID '{}' 格式无效", dep.target_id));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(CoreError::InvalidManifest(errors.join("; ")))
        }
    }

    /// 检查模块 ID 格式
    pub fn is_valid_module_id(id: &str) -> bool {
        !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    }

    /// 查找目录中的清单文件（优先 module.yaml）
    pub fn manifest_path(dir: &Path) -> Option<PathBuf> {
        [MANIFEST_FILENAME, MANIFEST_JSON_FILENAME]
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
    }

    /// 扫描清单目录
    ///
    /// 每个包含清单文件的子目录对应一个模块，按目录名排序，保证注册顺序稳定。
    /// 任一清单解析失败都会中止扫描，错误中带有文件路径。
    pub async fn scan_dir(dir: &Path) -> Result<Vec<Manifest>> {
        if !dir.is_dir() {
            warn!("清单目录不存在: {:?}", dir);
            return Ok(Vec::new());
        }

        let mut subdirs = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.is_dir() {
                subdirs.push(path);
            }
        }
        subdirs.sort();

        let mut manifests = Vec::new();
        for subdir in subdirs {
            let Some(path) = Self::manifest_path(&subdir) else {
                trace!("目录 {:?} 中未找到清单文件，跳过", subdir);
                continue;
            };
            let manifest = Self::parse_file(&path).await.map_err(|e| match e {
                CoreError::MalformedVersion { .. } | CoreError::InvalidManifest(_) => {
                    CoreError::InvalidManifest(format!("{}: {}", path.display(), e))
                }
                other => other,
            })?;
            debug!(module_id = %manifest.id, path = %path.display(), "发现模块清单");
            manifests.push(manifest);
        }

        Ok(manifests)
    }

    /// 扫描多个清单目录，按目录列表顺序拼接
    pub async fn scan_dirs(dirs: &[PathBuf]) -> Result<Vec<Manifest>> {
        let mut manifests = Vec::new();
        for dir in dirs {
            manifests.extend(Self::scan_dir(dir).await?);
        }
        Ok(manifests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MAIL_YAML: &str = r#"
id: mail
name: Mail
version: 1.2.0
dependencies:
  - id: core
    min_version: 2.0.0
  - id: spellcheck
    optional: true
tags: [messaging]
"#;

    #[test]
    fn test_parse_yaml() {
        let manifest = ManifestParser::parse_str(MAIL_YAML, ManifestFormat::Yaml).unwrap();

        assert_eq!(manifest.id, "mail");
        assert_eq!(manifest.display_name, "Mail");
        assert_eq!(manifest.version, VersionSpec::new(1, 2, 0));
        assert_eq!(manifest.dependencies.len(), 2);
        assert_eq!(
            manifest.dependencies[0].min_version,
            Some(VersionSpec::new(2, 0, 0))
        );
        assert!(manifest.dependencies[1].optional);
    }

    #[test]
    fn test_parse_json() {
        let json = r#"{"id": "core", "name": "Core", "version": "2.0.0"}"#;
        let manifest = ManifestParser::parse_str(json, ManifestFormat::Json).unwrap();
        assert_eq!(manifest.id, "core");
        assert!(manifest.dependencies.is_empty());
    }

    #[test]
    fn test_malformed_version() {
        let yaml = "id: mail\nname: Mail\nversion: \"2.1\"\n";
        let err = ManifestParser::parse_str(yaml, ManifestFormat::Yaml).unwrap_err();
        assert!(matches!(err, CoreError::MalformedVersion { .. }));

        let yaml = "id: mail\nname: Mail\nversion: 1.0.0\ndependencies:\n  - id: core\n    min_version: 2.x.0\n";
        let err = ManifestParser::parse_str(yaml, ManifestFormat::Yaml).unwrap_err();
        assert!(matches!(err, CoreError::MalformedVersion { .. }));
    }

    #[test]
    fn test_validation_errors() {
        let yaml = "id: \"bad id\"\nname: \"\"\nversion: 1.0.0\n";
        let err = ManifestParser::parse_str(yaml, ManifestFormat::Yaml).unwrap_err();
        let CoreError::InvalidManifest(message) = err else {
            panic!("expected InvalidManifest");
        };
        assert!(message.contains("bad id"));
    }

    #[test]
    fn test_module_id_format() {
        assert!(ManifestParser::is_valid_module_id("com.chips.mail"));
        assert!(ManifestParser::is_valid_module_id("mail_v2-beta"));
        assert!(!ManifestParser::is_valid_module_id("mail box"));
        assert!(!ManifestParser::is_valid_module_id(""));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            ManifestFormat::from_path(Path::new("a/module.json")),
            ManifestFormat::Json
        );
        assert_eq!(
            ManifestFormat::from_path(Path::new("a/module.yaml")),
            ManifestFormat::Yaml
        );
    }

    #[tokio::test]
    async fn test_scan_dir_sorted() {
        let temp = TempDir::new().unwrap();
        for (dir, id) in [("b-mail", "mail"), ("a-core", "core")] {
            let module_dir = temp.path().join(dir);
            std::fs::create_dir(&module_dir).unwrap();
            std::fs::write(
                module_dir.join(MANIFEST_FILENAME),
                format!("id: {}\nname: {}\nversion: 1.0.0\n", id, id),
            )
            .unwrap();
        }
        std::fs::create_dir(temp.path().join("c-empty")).unwrap();
        std::fs::write(temp.path().join("stray.txt"), "ignored").unwrap();

        let manifests = ManifestParser::scan_dir(temp.path()).await.unwrap();
        let ids: Vec<&str> = manifests.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["core", "mail"]);
    }

    #[tokio::test]
    async fn test_scan_dir_reports_path() {
        let temp = TempDir::new().unwrap();
        let module_dir = temp.path().join("broken");
        std::fs::create_dir(&module_dir).unwrap();
        std::fs::write(
            module_dir.join(MANIFEST_FILENAME),
            "id: broken\nname: Broken\nversion: \"1.0\"\n",
        )
        .unwrap();

        let err = ManifestParser::scan_dir(temp.path()).await.unwrap_err();
        let CoreError::InvalidManifest(message) = err else {
            panic!("expected InvalidManifest");
        };
        assert!(message.contains("broken"));
    }

    #[tokio::test]
    async fn test_scan_missing_dir() {
        let manifests = ManifestParser::scan_dir(Path::new("/nonexistent/chips"))
            .await
            .unwrap();
        assert!(manifests.is_empty());
    }
}
