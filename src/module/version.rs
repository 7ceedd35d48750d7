//! 模块版本号
//!
//! 版本号严格由三段非负整数组成（`major.minor.patch`），不支持预发布或构建元数据。
//! 比较按整数逐段进行，因此 `2.9.0 < 2.10.0`。

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::utils::{CoreError, Result};

/// 三段式版本号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct VersionSpec {
    /// 主版本号
    pub major: u64,
    /// 次版本号
    pub minor: u64,
    /// 修订号
    pub patch: u64,
}

impl VersionSpec {
    /// 创建版本号
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self { major, minor, patch }
    }

    /// 解析版本号字符串
    ///
    /// # 错误
    ///
    /// 段数不是 3，或任意一段不是纯数字（不允许符号、空白、空段）时返回
    /// `CoreError::MalformedVersion`。
    ///
    /// ```rust
    /// use chips_orchestrator::module::version::VersionSpec;
    ///
    /// assert_eq!(VersionSpec::parse("2.1.5").unwrap(), VersionSpec::new(2, 1, 5));
    /// assert!(VersionSpec::parse("2.1").is_err());
    /// assert!(VersionSpec::parse("2.1.x").is_err());
    /// ```
    pub fn parse(text: &str) -> Result<Self> {
        let segments: Vec<&str> = text.split('.').collect();
        if segments.len() != 3 {
            return Err(malformed(
                text,
                format!("需要三段，实际 {} 段", segments.len()),
            ));
        }

        let mut parts = [0u64; 3];
        for (slot, segment) in parts.iter_mut().zip(&segments) {
            *slot = parse_segment(text, segment)?;
        }

        Ok(Self::new(parts[0], parts[1], parts[2]))
    }

    /// 比较两个版本号
    pub fn compare(a: &VersionSpec, b: &VersionSpec) -> Ordering {
        a.cmp(b)
    }

    /// 是否满足最低版本要求
    pub fn satisfies_min(&self, min: &VersionSpec) -> bool {
        self >= min
    }
}

fn parse_segment(text: &str, segment: &str) -> Result<u64> {
    if segment.is_empty() {
        return Err(malformed(text, "存在空段".to_string()));
    }
    // u64::from_str 接受前导 '+'，这里只允许 ASCII 数字
    if !segment.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed(text, format!("'{}' 不是非负整数", segment)));
    }
    segment
        .parse::<u64>()
        .map_err(|e| malformed(text, format!("'{}' 超出范围: {}", segment, e)))
}

fn malformed(input: &str, reason: String) -> CoreError {
    CoreError::MalformedVersion {
        input: input.to_string(),
        reason,
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for VersionSpec {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for VersionSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}
