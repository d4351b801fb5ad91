//! 链接重写模块
//!
//! 负责为站内链接和表单加上当前语言的路径段，并在预览模式下记录编辑器所需的链接信息

use markup5ever_rcdom::Handle;

use crate::parsers::html::dom::{append_html, get_node_attr, set_node_attr};
use crate::parsers::html::HtmlTree;
use crate::translation::config::RenderSettings;
use crate::translation::context::RequestContext;
use crate::translation::hooks::Hooks;
use crate::utils::url::UrlConverter;

/// 已处理链接的标记，带有该标记的链接不再重写
pub const LINK_PROCESSED_MARKER: &str = "#TRPLINKPROCESSED";

/// 链接重写器
pub struct LinkRewriter<'a> {
    settings: &'a RenderSettings,
    hooks: &'a Hooks,
    urls: UrlConverter<'a>,
}

impl<'a> LinkRewriter<'a> {
    pub fn new(settings: &'a RenderSettings, hooks: &'a Hooks) -> Self {
        Self {
            settings,
            hooks,
            urls: UrlConverter::new(settings),
        }
    }

    /// 处理文档中的锚点、表单和 `link` 元素，返回加上语言段的链接数量
    pub fn rewrite(&self, tree: &HtmlTree, ctx: &RequestContext) -> usize {
        let mut rewritten = 0;

        for anchor in tree.find(r##"a[href!="#"]"##) {
            if self.rewrite_anchor_link(&anchor, ctx) {
                rewritten += 1;
            }
        }
        for form in tree.find("form") {
            if self.rewrite_form_action(&form, ctx) {
                rewritten += 1;
            }
        }
        for link in tree.find("link[href]") {
            strip_processed_marker(&link, "href");
        }

        if rewritten > 0 {
            tracing::debug!("重写 {} 个链接", rewritten);
        }
        rewritten
    }

    /// 重写锚点链接的href属性
    fn rewrite_anchor_link(&self, node: &Handle, ctx: &RequestContext) -> bool {
        let Some(href) = get_node_attr(node, "href") else {
            return false;
        };

        // 跳过特殊链接
        if should_skip_link(href.trim()) {
            return false;
        }

        let href = self.hooks.href_from_translated_page(href, ctx);
        set_node_attr(node, "href", Some(href.clone()));

        let url = self.urls.maybe_is_local_url(&href);
        let is_external_link = self.urls.is_external_link(&url);
        let is_admin_link = self.urls.is_admin_link(&url);

        if ctx.preview && !is_external_link {
            set_node_attr(node, "data-trp-original-href", Some(url.clone()));
        }

        let mut rewritten = false;
        let mut current = url;
        if ctx.language != self.settings.default_language
            && self.settings.force_language_to_custom_links
            && !is_external_link
            && self.urls.get_lang_from_url_string(&current).is_none()
            && !is_admin_link
            && !href.contains(LINK_PROCESSED_MARKER)
        {
            let localized = self.urls.get_url_for_language(&ctx.language, &href);
            let localized = self.hooks.force_custom_links(localized, &href, node, ctx);
            set_node_attr(node, "href", Some(localized.clone()));
            current = self.urls.maybe_is_local_url(&localized);
            rewritten = true;
        }

        if ctx.preview
            && (is_external_link
                || self.urls.is_different_language(&current, &ctx.language)
                || is_admin_link)
        {
            set_node_attr(
                node,
                "data-trp-unpreviewable",
                Some("trp-unpreviewable".to_string()),
            );
        }

        strip_processed_marker(node, "href");
        rewritten
    }

    /// 重写表单的action属性，并注入当前语言的隐藏字段
    fn rewrite_form_action(&self, node: &Handle, ctx: &RequestContext) -> bool {
        let action = get_node_attr(node, "action").unwrap_or_default();
        set_node_attr(node, "data-trp-original-action", Some(action.clone()));

        let slug = self.settings.url_slug(&ctx.language);
        let inputs = format!(
            r#"<input type="hidden" name="trp-form-language" value="{}"/>"#,
            slug
        );
        append_html(node, &self.hooks.form_inputs(inputs, slug, ctx));

        let trimmed_action = action.trim();
        let mut rewritten = false;
        if !trimmed_action.is_empty()
            && self.settings.force_language_to_custom_links
            && !self.urls.is_external_link(trimmed_action)
            && !self.urls.is_admin_link(trimmed_action)
            && !trimmed_action.contains(LINK_PROCESSED_MARKER)
        {
            let localized = self.urls.get_url_for_language(&ctx.language, trimmed_action);
            set_node_attr(node, "action", Some(localized));
            rewritten = true;
        }

        strip_processed_marker(node, "action");
        rewritten
    }
}

fn strip_processed_marker(node: &Handle, attribute: &str) {
    if let Some(value) = get_node_attr(node, attribute) {
        if value.contains(LINK_PROCESSED_MARKER) {
            set_node_attr(
                node,
                attribute,
                Some(value.replace(LINK_PROCESSED_MARKER, "")),
            );
        }
    }
}

/// 判断是否应该跳过重写的链接
fn should_skip_link(href: &str) -> bool {
    // 锚点、脚本、邮件、电话、内联数据和空链接都不是站内导航
    href.is_empty()
        || href.starts_with('#')
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
        || href.starts_with("blob:")
}
