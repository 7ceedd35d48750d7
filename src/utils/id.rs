//! 标识符生成
//!
//! - 隔离边界 ID：`bnd-` 前缀 + 10 位 62 进制随机串，每次加载都不同，
//!   用于区分同一单元的前后两次加载。
//! - 事件 ID：UUID v4。

use rand::Rng;

/// 62 进制字符集
const BASE62_CHARS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// 随机部分长度
const ID_LENGTH: usize = 10;

/// 边界 ID 前缀
pub const BOUNDARY_ID_PREFIX: &str = "bnd-";

/// 生成 10 位 62 进制随机 ID
///
/// ```
/// use chips_orchestrator::utils::id::generate_id;
///
/// let id = generate_id();
/// assert_eq!(id.len(), 10);
/// ```
pub fn generate_id() -> String {
    let mut rng = rand::thread_rng();
    (0..ID_LENGTH)
        .map(|_| BASE62_CHARS[rng.gen_range(0..BASE62_CHARS.len())] as char)
        .collect()
}

/// 生成隔离边界 ID
pub fn generate_boundary_id() -> String {
    format!("{}{}", BOUNDARY_ID_PREFIX, generate_id())
}

/// 判断字符串是否为边界 ID
pub fn is_boundary_id(id: &str) -> bool {
    id.strip_prefix(BOUNDARY_ID_PREFIX)
        .map(|rest| rest.len() == ID_LENGTH && rest.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or(false)
}

/// 生成 UUID v4 格式的 ID（事件 ID）
pub fn generate_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}
