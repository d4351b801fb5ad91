//! # 工具模块
//!
//! - `url` - 站内/站外链接判断、语言路径段的读取与插入

pub mod url;

// Re-export commonly used items for convenience
pub use url::{parse_absolute, UrlConverter};
