//! 扩展点
//!
//! 每个扩展点是一组按注册顺序调用的变换函数。变换函数返回 `None`
//! 表示结果不可用，此时保留调用前的值继续执行。

use markup5ever_rcdom::Handle;

use crate::parsers::html::dom::{has_node_attr, set_node_attr};
use crate::parsers::html::HtmlTree;
use crate::translation::collector::Candidates;
use crate::translation::config::NodeAccessor;
use crate::translation::context::RequestContext;

pub type StopTranslatingHook = Box<dyn Fn(&str, &RequestContext) -> bool + Send + Sync>;
pub type ContentHook = Box<dyn Fn(String, &RequestContext) -> Option<String> + Send + Sync>;
pub type CandidatesHook =
    Box<dyn Fn(Candidates, &HtmlTree, &RequestContext) -> Option<Candidates> + Send + Sync>;
pub type MachineTranslationHook = Box<dyn Fn(&str, &NodeAccessor) -> bool + Send + Sync>;
pub type HrefHook = Box<dyn Fn(String, &RequestContext) -> Option<String> + Send + Sync>;
pub type ForceLinkHook =
    Box<dyn Fn(String, &str, &Handle, &RequestContext) -> Option<String> + Send + Sync>;
pub type FormInputsHook = Box<dyn Fn(String, &str, &RequestContext) -> Option<String> + Send + Sync>;
pub type AttributeTranslatedHook = Box<dyn Fn(&Handle, &str, &str) + Send + Sync>;

/// 渲染管道的全部扩展点
#[derive(Default)]
pub struct Hooks {
    stop_translating: Vec<StopTranslatingHook>,
    before_translate_content: Vec<ContentHook>,
    candidates: Vec<CandidatesHook>,
    allow_machine_translation: Vec<MachineTranslationHook>,
    href_from_translated_page: Vec<HrefHook>,
    force_custom_links: Vec<ForceLinkHook>,
    form_inputs: Vec<FormInputsHook>,
    attribute_translated: Vec<AttributeTranslatedHook>,
    translated_html: Vec<ContentHook>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 带内置处理器的扩展点集合
    pub fn with_defaults() -> Self {
        let mut hooks = Self::new();
        hooks.on_attribute_translated(translate_image_srcset_attributes);
        hooks
    }

    /// 返回 `true` 时整个页面原样输出
    pub fn on_stop_translating<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&str, &RequestContext) -> bool + Send + Sync + 'static,
    {
        self.stop_translating.push(Box::new(hook));
        self
    }

    /// 解析前对响应体的变换
    pub fn on_before_translate_content<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(String, &RequestContext) -> Option<String> + Send + Sync + 'static,
    {
        self.before_translate_content.push(Box::new(hook));
        self
    }

    /// 提取完成后增删候选
    pub fn on_candidates<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(Candidates, &HtmlTree, &RequestContext) -> Option<Candidates> + Send + Sync + 'static,
    {
        self.candidates.push(Box::new(hook));
        self
    }

    /// 返回 `false` 时该属性字符串不交给机器翻译
    pub fn on_allow_machine_translation<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&str, &NodeAccessor) -> bool + Send + Sync + 'static,
    {
        self.allow_machine_translation.push(Box::new(hook));
        self
    }

    /// 重写前解析链接地址
    pub fn on_href_from_translated_page<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(String, &RequestContext) -> Option<String> + Send + Sync + 'static,
    {
        self.href_from_translated_page.push(Box::new(hook));
        self
    }

    /// 调整加上语言段之后的链接
    pub fn on_force_custom_links<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(String, &str, &Handle, &RequestContext) -> Option<String> + Send + Sync + 'static,
    {
        self.force_custom_links.push(Box::new(hook));
        self
    }

    /// 调整注入表单的隐藏字段
    pub fn on_form_inputs<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(String, &str, &RequestContext) -> Option<String> + Send + Sync + 'static,
    {
        self.form_inputs.push(Box::new(hook));
        self
    }

    /// 每次属性替换之后的通知
    pub fn on_attribute_translated<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&Handle, &str, &str) + Send + Sync + 'static,
    {
        self.attribute_translated.push(Box::new(hook));
        self
    }

    /// 写入缓存前对最终标记的变换
    pub fn on_translated_html<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(String, &RequestContext) -> Option<String> + Send + Sync + 'static,
    {
        self.translated_html.push(Box::new(hook));
        self
    }

    pub fn stop_translating(&self, content: &str, ctx: &RequestContext) -> bool {
        self.stop_translating.iter().any(|hook| hook(content, ctx))
    }

    pub fn before_translate_content(&self, content: String, ctx: &RequestContext) -> String {
        apply_content_hooks(&self.before_translate_content, content, ctx)
    }

    pub fn translated_html(&self, content: String, ctx: &RequestContext) -> String {
        apply_content_hooks(&self.translated_html, content, ctx)
    }

    pub fn candidates(
        &self,
        mut candidates: Candidates,
        tree: &HtmlTree,
        ctx: &RequestContext,
    ) -> Candidates {
        for hook in &self.candidates {
            let previous = candidates.clone();
            candidates = match hook(candidates, tree, ctx) {
                Some(updated) if updated.is_consistent() => updated,
                _ => {
                    tracing::warn!("候选扩展点返回了无效结果，已忽略");
                    previous
                }
            };
        }
        candidates
    }

    pub fn allow_machine_translation(&self, string: &str, accessor: &NodeAccessor) -> bool {
        self.allow_machine_translation
            .iter()
            .all(|hook| hook(string, accessor))
    }

    pub fn href_from_translated_page(&self, href: String, ctx: &RequestContext) -> String {
        let mut href = href;
        for hook in &self.href_from_translated_page {
            if let Some(updated) = hook(href.clone(), ctx) {
                href = updated;
            }
        }
        href
    }

    pub fn force_custom_links(
        &self,
        rewritten: String,
        original: &str,
        node: &Handle,
        ctx: &RequestContext,
    ) -> String {
        let mut rewritten = rewritten;
        for hook in &self.force_custom_links {
            if let Some(updated) = hook(rewritten.clone(), original, node, ctx) {
                rewritten = updated;
            }
        }
        rewritten
    }

    pub fn form_inputs(&self, markup: String, slug: &str, ctx: &RequestContext) -> String {
        let mut markup = markup;
        for hook in &self.form_inputs {
            if let Some(updated) = hook(markup.clone(), slug, ctx) {
                markup = updated;
            }
        }
        markup
    }

    pub fn attribute_translated(&self, node: &Handle, accessor: &str, translation: &str) {
        for hook in &self.attribute_translated {
            hook(node, accessor, translation);
        }
    }
}

fn apply_content_hooks(hooks: &[ContentHook], content: String, ctx: &RequestContext) -> String {
    let mut content = content;
    for hook in hooks {
        if let Some(updated) = hook(content.clone(), ctx) {
            content = updated;
        }
    }
    content
}

/// 图片地址被翻译后同步相关属性
///
/// 响应式尺寸无法在没有媒体库的情况下推导，`srcset` 直接移除，让浏览器使用翻译后的 `src`。
pub fn translate_image_srcset_attributes(node: &Handle, accessor: &str, translation: &str) {
    if accessor != "src" {
        return;
    }
    if has_node_attr(node, "data-src") {
        set_node_attr(node, "data-src", Some(translation.to_string()));
    }
    for attribute in ["srcset", "data-srcset"] {
        if has_node_attr(node, attribute) {
            set_node_attr(node, attribute, None);
        }
    }
}
