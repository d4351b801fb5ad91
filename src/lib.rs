//! # Transpage Library
//!
//! 将网页标记渲染为指定语言版本的工具库：定位HTML文档中的可翻译片段，
//! 替换为已存储的译文，并将最终结果写入页面缓存，后续请求直接命中缓存。
//!
//! ## 模块组织
//!
//! - `core` - 渲染管道的入口与请求处理（缓存查找 → 渲染 → 写入）
//! - `parsers` - HTML树抽象、选择器和链接/表单重写
//! - `translation` - 标记解包、片段提取、翻译块匹配、译文查找与替换、JSON响应处理、页面缓存
//! - `utils` - URL语言段转换等工具函数
//! - `env` - 环境变量管理

pub mod core;
pub mod env;
pub mod parsers;
pub mod translation;
pub mod utils;

// Re-export commonly used items for convenience
pub use crate::core::TranslationRenderer;
pub use parsers::html::HtmlTree;
pub use translation::context::RequestContext;
pub use translation::error::{RenderError, RenderResult};
pub use translation::storage::{CachedPage, PageCache, PageCacheError};
