//! # 解析器模块
//!
//! - `html` - HTML树抽象、选择器匹配和DOM操作
//! - `link_rewriter` - 为站内链接和表单加上当前语言

pub mod html;
pub mod link_rewriter;

// Re-export commonly used items for convenience
pub use html::{HtmlTree, Selector};
pub use link_rewriter::{LinkRewriter, LINK_PROCESSED_MARKER};
