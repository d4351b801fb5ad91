//! 翻译模块
//!
//! 渲染管道的各个阶段，按执行顺序：
//! - **markers**: 标记括号还原、标记解包与文本方式的标记删除
//! - **blocks**: 翻译块匹配
//! - **collector**: 可翻译片段提取
//! - **lookup**: 译文查找与机器翻译回退
//! - **substitution**: 译文替换与预览注释
//! - **json**: JSON 响应体的逐叶翻译
//! - **storage**: 页面缓存
//!
//! # 基本用法
//!
//! ```rust,no_run
//! use transpage::translation::config::RenderSettings;
//! use transpage::translation::lookup::MemoryTranslationStore;
//! use transpage::{RequestContext, TranslationRenderer};
//!
//! let settings = RenderSettings {
//!     translation_languages: vec!["en".into(), "fr".into()],
//!     ..Default::default()
//! };
//! let store = MemoryTranslationStore::new().with_translation("fr", "Hello", "Bonjour");
//! let renderer = TranslationRenderer::new(settings, store);
//!
//! let ctx = RequestContext::new("http://localhost/fr/", "fr");
//! let html = renderer.translate_page("<p>Hello</p>".to_string(), &ctx);
//! assert_eq!(html, "<p>Bonjour</p>");
//! ```

// ============================================================================
// 子模块声明
// ============================================================================

/// 翻译块匹配
pub mod blocks;

/// 可翻译片段提取
pub mod collector;

/// 渲染配置 - 文件与环境变量加载
pub mod config;

/// 请求上下文
pub mod context;

/// 错误处理模块 - 统一的错误类型和处理机制
pub mod error;

/// 候选过滤规则
pub mod filters;

/// 扩展点
pub mod hooks;

/// JSON 响应体处理
pub mod json;

/// 译文查找
pub mod lookup;

/// 标记解包
pub mod markers;

/// 页面缓存
pub mod storage;

/// 译文替换
pub mod substitution;

// ============================================================================
// 公共API导出
// ============================================================================

pub use collector::{Accessor, Candidates, FragmentExtractor, NodeBinding, TranslatableUnit, UnitKind};
pub use config::{MergeRules, NodeAccessor, RenderSettings};
pub use context::RequestContext;
pub use error::{RenderError, RenderResult};
pub use hooks::Hooks;
pub use lookup::{
    BlockType, MachineTranslator, MemoryTranslationStore, TranslationBlock, TranslationStore,
};
