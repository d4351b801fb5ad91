//! 渲染管道入口
//!
//! `TranslationRenderer` 把各个阶段串成一次同步渲染：
//!
//! ```text
//! 缓存查找 → 命中：直接返回
//!          → 未命中：标记预处理 → 解析 → 翻译块匹配 → 标记解包 → 片段提取
//!                    → 译文查找 → 替换 → 链接重写 → 序列化 → 写入缓存
//! ```
//!
//! 除配置加载外，管道内部的失败都不会中断响应：缓存读失败按未命中处理，
//! 缓存写失败只记录日志，文档无法解析时退回到文本方式删除标记。

use std::collections::HashMap;
use std::path::Path;

use encoding_rs::Encoding;

use crate::parsers::html::dom::prepend_html;
use crate::parsers::html::HtmlTree;
use crate::parsers::link_rewriter::LinkRewriter;
use crate::translation::blocks::BlockMatcher;
use crate::translation::collector::FragmentExtractor;
use crate::translation::config::RenderSettings;
use crate::translation::context::RequestContext;
use crate::translation::error::{RenderError, RenderResult};
use crate::translation::hooks::Hooks;
use crate::translation::json::{decode_json_body, is_internal_action, translate_json_body};
use crate::translation::lookup::{MachineTranslator, TranslationLookup, TranslationStore};
use crate::translation::markers::{remove_markers, restore_marker_brackets, MarkerUnwrapper};
use crate::translation::substitution::SubstitutionEngine;
use crate::translation::storage::PageCache;

/// 一次树渲染的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub blocks: usize,
    pub markers: usize,
    pub candidates: usize,
    pub substituted: usize,
    pub links: usize,
}

/// 记录一次被吸收的失败，渲染继续进行
fn log_degraded(stage: &str, error: &RenderError) {
    tracing::warn!(category = ?error.category(), "{}失败，继续渲染: {}", stage, error);
}

/// 按字符集标签解码输入字节，未指定时按 UTF-8（带 BOM 时以 BOM 为准）
pub fn decode_document(data: &[u8], charset: Option<&str>) -> RenderResult<String> {
    let label = charset.unwrap_or("utf-8");
    let encoding = Encoding::for_label(label.as_bytes())
        .ok_or_else(|| RenderError::Parse(format!("未知的字符编码: {}", label)))?;

    let (decoded, used, had_errors) = encoding.decode(data);
    if had_errors {
        tracing::warn!("输入中存在无法按 {} 解码的字节", used.name());
    }
    Ok(decoded.into_owned())
}

/// 翻译渲染器
pub struct TranslationRenderer {
    settings: RenderSettings,
    store: Box<dyn TranslationStore>,
    translator: Option<Box<dyn MachineTranslator>>,
    cache: Option<PageCache>,
    hooks: Hooks,
}

impl TranslationRenderer {
    /// 使用内置扩展点创建渲染器，不带页面缓存
    pub fn new(settings: RenderSettings, store: impl TranslationStore + 'static) -> Self {
        Self {
            settings,
            store: Box::new(store),
            translator: None,
            cache: None,
            hooks: Hooks::with_defaults(),
        }
    }

    /// 按配置创建渲染器，配置了 `cache_path` 时打开磁盘缓存
    pub fn from_settings(
        settings: RenderSettings,
        store: impl TranslationStore + 'static,
    ) -> RenderResult<Self> {
        settings.validate()?;
        let cache = match settings.cache_path.as_deref().map(|path| open_cache(Path::new(path))) {
            Some(Ok(cache)) => Some(cache),
            // 缓存库损坏或被占用时不带缓存运行
            Some(Err(e)) if e.is_recoverable() => {
                log_degraded("打开页面缓存", &e);
                None
            }
            Some(Err(e)) => return Err(e),
            None => None,
        };

        let mut renderer = Self::new(settings, store);
        renderer.cache = cache;
        Ok(renderer)
    }

    pub fn with_cache(mut self, cache: PageCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_machine_translator(mut self, translator: impl MachineTranslator + 'static) -> Self {
        self.translator = Some(Box::new(translator));
        self
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn cache(&self) -> Option<&PageCache> {
        self.cache.as_ref()
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut Hooks {
        &mut self.hooks
    }

    /// 处理一次页面请求
    ///
    /// 先查页面缓存，命中时不调用 `produce_body`；未命中时生成响应体并渲染，
    /// 非预览的渲染结果写入缓存。后台请求绕过缓存和翻译。
    pub fn handle_request<F>(&self, ctx: &RequestContext, produce_body: F) -> String
    where
        F: FnOnce() -> String,
    {
        if ctx.is_admin {
            return produce_body();
        }

        if !ctx.preview {
            if let Some(content) = self.cached_page(ctx) {
                return content;
            }
        }

        let body = produce_body();
        self.translate_page(body, ctx)
    }

    fn cached_page(&self, ctx: &RequestContext) -> Option<String> {
        let cache = self.cache.as_ref()?;
        match cache.get(&ctx.url, &ctx.language) {
            Ok(Some(content)) if !content.is_empty() => {
                tracing::info!("页面缓存命中: {} [{}]", ctx.url, ctx.language);
                Some(content)
            }
            Ok(_) => {
                tracing::debug!("页面缓存未命中: {} [{}]", ctx.url, ctx.language);
                None
            }
            Err(e) => {
                log_degraded("读取页面缓存", &RenderError::from(e));
                None
            }
        }
    }

    /// 渲染整个响应体
    pub fn translate_page(&self, content: String, ctx: &RequestContext) -> String {
        if self.hooks.stop_translating(&content, ctx) {
            tracing::debug!("扩展点要求停止翻译: {}", ctx.url);
            return content;
        }

        let content = restore_marker_brackets(&content);
        let content = self.hooks.before_translate_content(content, ctx);
        if content.is_empty() {
            return content;
        }

        if !self.settings.is_configured_language(&ctx.language) {
            tracing::debug!("语言 {} 未发布，跳过翻译", ctx.language);
            return remove_markers(&content, ctx.preview);
        }

        if ctx.language == self.settings.default_language && !ctx.preview {
            let html = remove_markers(&content, false);
            return self.finish(html, ctx);
        }

        if let Some(value) = decode_json_body(&content) {
            if is_internal_action(ctx.action.as_deref()) {
                return content;
            }
            return match translate_json_body(value, &mut |leaf: &str| {
                self.translate_fragment(leaf, ctx)
            }) {
                Ok(body) => self.finish(body, ctx),
                Err(e) => {
                    log_degraded("序列化 JSON 响应体", &e);
                    remove_markers(&content, ctx.preview)
                }
            };
        }

        let tree = match HtmlTree::parse(&content, self.settings.max_document_size) {
            Ok(tree) => tree,
            Err(e) => {
                log_degraded("解析文档", &RenderError::from(e));
                return remove_markers(&content, ctx.preview);
            }
        };

        let stats = self.render_tree(&tree, ctx);
        if ctx.preview && self.lookup_language(ctx) != self.settings.default_language {
            self.add_editor_notices(&tree, ctx);
        }
        tracing::debug!(
            "渲染完成: {} [{}] 翻译块 {}，标记 {}，候选 {}，替换 {}，链接 {}",
            ctx.url,
            ctx.language,
            stats.blocks,
            stats.markers,
            stats.candidates,
            stats.substituted,
            stats.links
        );

        let html = remove_markers(&tree.save(), ctx.preview);
        self.finish(html, ctx)
    }

    /// 翻译一段标记片段，不读写缓存
    ///
    /// 渲染后的树与解析时序列化结果相同则原样返回输入（仅删除标记语法），
    /// 避免序列化改变原文。
    pub fn translate_fragment(&self, content: &str, ctx: &RequestContext) -> String {
        if content.trim().is_empty() {
            return content.to_string();
        }
        if !self.settings.is_configured_language(&ctx.language)
            || (ctx.language == self.settings.default_language && !ctx.preview)
        {
            return remove_markers(content, ctx.preview);
        }

        match HtmlTree::parse(content, self.settings.max_document_size) {
            Ok(tree) => {
                let parsed = tree.save();
                self.render_tree(&tree, ctx);
                let rendered = tree.save();
                if rendered == parsed {
                    remove_markers(content, ctx.preview)
                } else {
                    remove_markers(&rendered, ctx.preview)
                }
            }
            Err(e) => {
                log_degraded("解析片段", &RenderError::from(e));
                remove_markers(content, ctx.preview)
            }
        }
    }

    /// 预览默认语言时使用第一个非默认语言查找，以便取得字符串编号
    fn lookup_language<'a>(&'a self, ctx: &'a RequestContext) -> &'a str {
        if ctx.preview && ctx.language == self.settings.default_language {
            self.settings
                .first_secondary_language()
                .unwrap_or(&self.settings.default_language)
        } else {
            &ctx.language
        }
    }

    fn render_tree(&self, tree: &HtmlTree, ctx: &RequestContext) -> RenderStats {
        let mut stats = RenderStats::default();
        let mut matched_blocks = Vec::new();
        let lookup_language = self.lookup_language(ctx);
        let is_default = lookup_language == self.settings.default_language;

        if !is_default {
            let blocks = self
                .store
                .get_all_blocks(lookup_language)
                .unwrap_or_else(|e| {
                    log_degraded("读取翻译块", &e);
                    Vec::new()
                });
            let matcher = BlockMatcher::new(&self.settings.merge_rules, ctx.preview);
            let blocks = matcher.prepare(tree, blocks);
            matched_blocks = matcher.apply(tree, &blocks);
            stats.blocks = matched_blocks.len();
        }

        let unwrapper = MarkerUnwrapper::new(ctx.preview);
        stats.markers = unwrapper.unwrap(tree) + unwrapper.unwrap_attributes(tree);

        if is_default {
            return stats;
        }

        let candidates = FragmentExtractor::new(&self.settings, &self.hooks)
            .with_matched_blocks(&matched_blocks)
            .extract(tree, ctx);
        stats.candidates = candidates.len();

        let strings = candidates.strings();
        let lookup = TranslationLookup::new(self.store.as_ref(), self.translator.as_deref());
        let translations =
            lookup.process_strings(&strings, lookup_language, &candidates.skip_machine_translation);

        let string_ids = if ctx.preview {
            self.store
                .get_string_ids(&strings, lookup_language)
                .unwrap_or_else(|e| {
                    log_degraded("读取字符串编号", &e);
                    HashMap::new()
                })
        } else {
            HashMap::new()
        };

        stats.substituted = SubstitutionEngine::new(&self.settings, &self.hooks, ctx).apply(
            &candidates,
            &translations,
            &string_ids,
        );
        stats.links = LinkRewriter::new(&self.settings, &self.hooks).rewrite(tree, ctx);

        stats
    }

    fn add_editor_notices(&self, tree: &HtmlTree, ctx: &RequestContext) {
        if let Some(notices) = ctx.editor_notices.as_deref().filter(|n| !n.is_empty()) {
            prepend_html(
                &tree.body(),
                &format!(
                    r#"<div data-no-translation class="trp-editor-notices">{}</div>"#,
                    notices
                ),
            );
        }
    }

    /// 最终标记扩展点，随后写入缓存（预览结果不缓存）
    fn finish(&self, content: String, ctx: &RequestContext) -> String {
        let content = self.hooks.translated_html(content, ctx);

        // 默认语言的结果同样写入缓存，命中时省去标记清理
        if !ctx.preview {
            if let Some(cache) = &self.cache {
                if let Err(e) = cache.set(&ctx.url, &ctx.language, &content) {
                    log_degraded("写入页面缓存", &RenderError::from(e));
                }
            }
        }
        content
    }
}

fn open_cache(path: &Path) -> RenderResult<PageCache> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let cache = PageCache::open(path)?;
    tracing::info!("打开页面缓存: {}", path.display());
    Ok(cache)
}
