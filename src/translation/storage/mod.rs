//! 存储模块
//!
//! 提供渲染结果的持久化页面缓存。

pub mod cache;

pub use cache::{url_hash, CachedPage, ContentUrlResolver, PageCache, PageCacheError, PageCacheResult};
