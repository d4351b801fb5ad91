//! 译文替换
//!
//! 按提取顺序把译文写回绑定的节点或属性。替换使用字面子串替换而不是整体赋值，
//! 提取时保留在原值两端的空白因此不受影响。预览模式下另外为节点加上编辑器所需的
//! 字符串编号、分组和描述。

use std::collections::HashMap;

use markup5ever_rcdom::Handle;

use crate::parsers::html::dom::{
    create_element, get_node_attr, get_node_name, get_parent_node, inner_html, outer_html,
    set_inner_html, set_node_attr, set_outer_html, wrap_nodes,
};
use crate::parsers::html::utils::encode_entities;
use crate::translation::collector::{Accessor, Candidates, NodeBinding};
use crate::translation::config::RenderSettings;
use crate::translation::context::RequestContext;
use crate::translation::hooks::Hooks;

/// 预览模式下包裹外层文本的标签
pub const PREVIEW_WRAP_TAG: &str = "translate-press";

const GROUP_META_INFORMATION: &str = "Meta Information";
const GROUP_IMAGES: &str = "Images";
const GROUP_STRING_LIST: &str = "String List";

/// `(节点类型, 属性名, 属性值, 描述)`，属性名为空表示只按类型匹配
const NODE_DESCRIPTIONS: &[(&str, &str, &str, &str)] = &[
    ("meta_desc", "name", "description", "Description"),
    ("meta_desc", "property", "og:title", "OG Title"),
    ("meta_desc", "property", "og:site_name", "OG Site Name"),
    ("meta_desc", "property", "og:description", "OG Description"),
    ("meta_desc", "name", "twitter:title", "Twitter Title"),
    ("meta_desc", "name", "twitter:description", "Twitter Description"),
    ("page_title", "", "", "Page Title"),
];

/// 在节点当前值中重新定位原文
///
/// 依次尝试原文本身、实体编码后的原文，都不存在时退回到整个当前值。
pub fn maybe_correct_translatable_string(translatable: &str, node_value: &str) -> String {
    if node_value.contains(translatable) {
        return translatable.to_string();
    }
    let encoded = encode_entities(translatable);
    if node_value.contains(&encoded) {
        return encoded;
    }
    node_value.to_string()
}

/// 节点类型在编辑器中的分组
pub fn node_type_category(node_type: &str) -> &'static str {
    match node_type {
        "meta_desc" | "page_title" => GROUP_META_INFORMATION,
        "image_src" => GROUP_IMAGES,
        _ => GROUP_STRING_LIST,
    }
}

/// 节点在编辑器下拉列表中的描述
pub fn node_description(node: &Handle, node_type: &str) -> Option<&'static str> {
    NODE_DESCRIPTIONS
        .iter()
        .find(|(kind, attribute, value, _)| {
            *kind == node_type
                && (attribute.is_empty()
                    || get_node_attr(node, attribute).as_deref() == Some(*value))
        })
        .map(|(_, _, _, description)| *description)
}

fn read_value(node: &Handle, accessor: &Accessor) -> Option<String> {
    match accessor {
        Accessor::Attribute(name) => get_node_attr(node, name),
        Accessor::InnerText if get_node_name(node).is_some() => Some(inner_html(node)),
        _ => Some(outer_html(node)),
    }
}

/// 替换引擎
pub struct SubstitutionEngine<'a> {
    settings: &'a RenderSettings,
    hooks: &'a Hooks,
    ctx: &'a RequestContext,
}

impl<'a> SubstitutionEngine<'a> {
    pub fn new(settings: &'a RenderSettings, hooks: &'a Hooks, ctx: &'a RequestContext) -> Self {
        Self {
            settings,
            hooks,
            ctx,
        }
    }

    /// 应用译文，返回实际替换的单元数量
    ///
    /// `string_ids` 只在预览模式下使用，缺少编号的单元不加注释。
    pub fn apply(
        &self,
        candidates: &Candidates,
        translations: &HashMap<usize, String>,
        string_ids: &HashMap<String, u64>,
    ) -> usize {
        let preview = self.ctx.preview;
        let annotate_only = preview && self.ctx.language == self.settings.default_language;
        let mut substituted = 0;

        for (index, (unit, binding)) in candidates
            .units
            .iter()
            .zip(candidates.bindings.iter())
            .enumerate()
        {
            let translation = translations.get(&index);
            if translation.is_none() && !preview {
                continue;
            }
            if self.settings.node_accessor(&binding.node_type).is_none() {
                continue;
            }
            let Some(node) = binding.node() else {
                continue;
            };

            let mut nodes = vec![node.clone()];
            if let Some(translation) = translation {
                if !annotate_only {
                    nodes = self.substitute(&node, binding, &unit.original, translation);
                    substituted += 1;
                }
            }

            if preview {
                if let Some(id) = string_ids.get(&unit.original) {
                    self.annotate(&nodes, binding, *id);
                }
            }
        }

        tracing::debug!("替换 {} 个单元", substituted);
        substituted
    }

    /// 写回一个译文，返回替换后代表该单元的节点
    fn substitute(
        &self,
        node: &Handle,
        binding: &NodeBinding,
        original: &str,
        translation: &str,
    ) -> Vec<Handle> {
        let Some(current) = read_value(node, &binding.accessor) else {
            return vec![node.clone()];
        };
        let target = maybe_correct_translatable_string(original, &current);
        let updated = current.replacen(&target, translation, 1);

        match &binding.accessor {
            Accessor::Attribute(name) => {
                set_node_attr(node, name, Some(updated));
                self.hooks.attribute_translated(node, name, translation);
                vec![node.clone()]
            }
            Accessor::InnerText if get_node_name(node).is_some() => {
                set_inner_html(node, &updated);
                vec![node.clone()]
            }
            _ => {
                let inserted = set_outer_html(node, &updated);
                if inserted.is_empty() {
                    vec![node.clone()]
                } else {
                    inserted
                }
            }
        }
    }

    fn annotate(&self, nodes: &[Handle], binding: &NodeBinding, id: u64) {
        let Some(first) = nodes.first() else {
            return;
        };
        let category = node_type_category(&binding.node_type);
        let description = node_description(first, &binding.node_type);
        let accessor = binding.accessor.name();

        if binding.accessor == Accessor::OuterText && binding.node_type != "button" {
            let id = id.to_string();
            let mut attrs = vec![
                ("data-trp-translate-id", id.as_str()),
                ("data-trp-node-group", category),
            ];
            if let Some(description) = description {
                attrs.push(("data-trp-node-description", description));
            }
            let wrapper = create_element(PREVIEW_WRAP_TAG, &attrs);
            wrap_nodes(nodes, &wrapper);
            return;
        }

        let target = if binding.node_type == "button" || binding.node_type == "option" {
            get_parent_node(first).unwrap_or_else(|| first.clone())
        } else {
            first.clone()
        };
        set_node_attr(
            &target,
            &format!("data-trp-translate-id-{}", accessor),
            Some(id.to_string()),
        );
        set_node_attr(
            &target,
            &format!("data-trp-node-group-{}", accessor),
            Some(category.to_string()),
        );
        if let Some(description) = description {
            set_node_attr(
                &target,
                &format!("data-trp-node-description-{}", accessor),
                Some(description.to_string()),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::html::HtmlTree;
    use crate::translation::collector::FragmentExtractor;

    fn render(
        html: &str,
        ctx: &RequestContext,
        translations: &[(&str, &str)],
        string_ids: &[(&str, u64)],
    ) -> String {
        let settings = RenderSettings {
            translation_languages: vec!["en".into(), "fr".into()],
            ..Default::default()
        };
        let hooks = Hooks::with_defaults();
        let tree = HtmlTree::parse(html, usize::MAX).unwrap();
        let candidates = FragmentExtractor::new(&settings, &hooks).extract(&tree, ctx);

        let mut by_position = HashMap::new();
        for (index, original) in candidates.strings().iter().enumerate() {
            if let Some((_, translation)) = translations.iter().find(|(o, _)| o == original) {
                by_position.insert(index, translation.to_string());
            }
        }
        let ids = string_ids
            .iter()
            .map(|(original, id)| (original.to_string(), *id))
            .collect();

        SubstitutionEngine::new(&settings, &hooks, ctx).apply(&candidates, &by_position, &ids);
        tree.save()
    }

    #[test]
    fn test_maybe_correct_translatable_string() {
        assert_eq!(maybe_correct_translatable_string("Hi", "  Hi  "), "Hi");
        assert_eq!(
            maybe_correct_translatable_string("Fish & Chips", "Fish &amp; Chips"),
            "Fish &amp; Chips"
        );
        assert_eq!(
            maybe_correct_translatable_string("Gone", "Something else"),
            "Something else"
        );
    }

    #[test]
    fn test_text_substitution_keeps_surrounding_whitespace() {
        let ctx = RequestContext::new("http://localhost/fr/", "fr");
        let html = "<p>Hello <b>world</b></p><p>\n  Bye  \n</p>";
        assert_eq!(
            render(
                html,
                &ctx,
                &[("Hello", "Bonjour"), ("world", "monde"), ("Bye", "Salut")],
                &[]
            ),
            "<p>Bonjour <b>monde</b></p><p>\n  Salut  \n</p>"
        );
    }

    #[test]
    fn test_missing_translation_is_a_no_op() {
        let ctx = RequestContext::new("http://localhost/fr/", "fr");
        let html = "<p>Hello</p><p>Untranslated</p>";
        assert_eq!(
            render(html, &ctx, &[("Hello", "Bonjour")], &[]),
            "<p>Bonjour</p><p>Untranslated</p>"
        );
    }

    #[test]
    fn test_duplicate_strings_are_placed_independently() {
        let ctx = RequestContext::new("http://localhost/fr/", "fr");
        assert_eq!(
            render("<p>Yes</p><p>Yes</p>", &ctx, &[("Yes", "Oui")], &[]),
            "<p>Oui</p><p>Oui</p>"
        );
    }

    #[test]
    fn test_attribute_substitution_runs_image_hook() {
        let ctx = RequestContext::new("http://localhost/fr/", "fr");
        let html = r#"<img src="/en.png" srcset="/en-300.png 300w" alt="Logo">"#;
        assert_eq!(
            render(html, &ctx, &[("/en.png", "/fr.png"), ("Logo", "Logo FR")], &[]),
            r#"<img src="/fr.png" alt="Logo FR">"#
        );
    }

    #[test]
    fn test_block_inner_markup_is_replaced() {
        let ctx = RequestContext::new("http://localhost/fr/", "fr");
        let html = r#"<p class="translation-block">Hello <em>there</em></p>"#;
        assert_eq!(
            render(html, &ctx, &[("Hello <em>there</em>", "Salut <em>toi</em>")], &[]),
            r#"<p class="translation-block">Salut <em>toi</em></p>"#
        );
    }

    #[test]
    fn test_page_title_substitution() {
        let ctx = RequestContext::new("http://localhost/fr/", "fr");
        let html = "<html><head><title>Fish &amp; Chips</title></head><body></body></html>";
        let rendered = render(html, &ctx, &[("Fish & Chips", "Poisson & Frites")], &[]);
        assert!(rendered.contains("<title>Poisson &amp; Frites</title>"));
    }

    #[test]
    fn test_preview_wraps_text_and_annotates_attributes() {
        let ctx = RequestContext::new("http://localhost/fr/", "fr").with_preview(true);
        let html = r#"<p>Hello</p><img src="/a.png" alt="Logo"><button>Send</button>"#;
        assert_eq!(
            render(
                html,
                &ctx,
                &[("Hello", "Bonjour")],
                &[("Hello", 1), ("/a.png", 2), ("Logo", 3), ("Send", 4)]
            ),
            concat!(
                r#"<p><translate-press data-trp-translate-id="1" data-trp-node-group="String List">Bonjour</translate-press></p>"#,
                r#"<img src="/a.png" alt="Logo" data-trp-translate-id-src="2" data-trp-node-group-src="Images" data-trp-translate-id-alt="3" data-trp-node-group-alt="String List">"#,
                r#"<button data-trp-translate-id-outertext="4" data-trp-node-group-outertext="String List">Send</button>"#
            )
        );
    }

    #[test]
    fn test_preview_on_default_language_only_annotates() {
        let ctx = RequestContext::new("http://localhost/", "en").with_preview(true);
        assert_eq!(
            render("<p>Hello</p>", &ctx, &[("Hello", "Bonjour")], &[("Hello", 1)]),
            r#"<p><translate-press data-trp-translate-id="1" data-trp-node-group="String List">Hello</translate-press></p>"#
        );
    }

    #[test]
    fn test_meta_description_annotation() {
        let ctx = RequestContext::new("http://localhost/fr/", "fr").with_preview(true);
        let html = r#"<html><head><meta name="description" content="About us"></head><body></body></html>"#;
        let rendered = render(html, &ctx, &[("About us", "À propos")], &[("About us", 9)]);
        assert!(rendered.contains(
            r#"<meta name="description" content="À propos" data-trp-translate-id-content="9" data-trp-node-group-content="Meta Information" data-trp-node-description-content="Description">"#
        ));
    }
}
