//! 可翻译片段提取
//!
//! 单次遍历文档，按固定顺序产生候选：
//!
//! 1. 已匹配的翻译块（`.translation-block`）
//! 2. 文本节点，按父元素区分为 `button`、`option` 和普通 `text`
//! 3. 节点访问器表驱动的属性候选（`alt`、`href`、`placeholder` 等）
//!
//! 候选的顺序决定了译文数组的索引，必须稳定。

use std::collections::HashSet;
use std::rc::{Rc, Weak};

use markup5ever_rcdom::{Handle, Node};

use crate::parsers::html::dom::{
    get_node_attr, get_node_name, get_parent_name, inner_html, outer_html, set_node_attr,
    text_content,
};
use crate::parsers::html::utils::full_trim;
use crate::parsers::html::HtmlTree;
use crate::translation::blocks::MatchedBlock;
use crate::translation::config::constants::{NO_TRANSLATE_ATTRIBUTE, TRANSLATION_BLOCK_CLASS};
use crate::translation::config::{NodeAccessor, RenderSettings};
use crate::translation::context::RequestContext;
use crate::translation::filters::{
    has_ancestor_attribute, has_ancestor_class, has_non_translatable_parent,
    is_translatable_string,
};
use crate::translation::hooks::Hooks;
use crate::utils::url::UrlConverter;

/// 候选单元的类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitKind {
    Text,
    Attribute,
    Block,
}

/// 一个待查找译文的原始字符串
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatableUnit {
    pub original: String,
    pub kind: UnitKind,
}

/// 译文写回的位置
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Accessor {
    InnerText,
    OuterText,
    Attribute(String),
}

impl Accessor {
    pub fn from_node_accessor(accessor: &NodeAccessor) -> Self {
        if accessor.attribute {
            Accessor::Attribute(accessor.accessor.clone())
        } else if accessor.accessor == "innertext" {
            Accessor::InnerText
        } else {
            Accessor::OuterText
        }
    }

    /// 访问器名称，用作预览属性的后缀
    pub fn name(&self) -> &str {
        match self {
            Accessor::InnerText => "innertext",
            Accessor::OuterText => "outertext",
            Accessor::Attribute(name) => name,
        }
    }
}

/// 候选单元与树中节点的非拥有绑定
#[derive(Debug, Clone)]
pub struct NodeBinding {
    pub node: Weak<Node>,
    pub accessor: Accessor,
    /// 节点访问器表中的键，例如 `text`、`image_alt`
    pub node_type: String,
}

impl NodeBinding {
    pub fn new(node: &Handle, accessor: Accessor, node_type: impl Into<String>) -> Self {
        Self {
            node: Rc::downgrade(node),
            accessor,
            node_type: node_type.into(),
        }
    }

    pub fn node(&self) -> Option<Handle> {
        self.node.upgrade()
    }
}

/// 提取结果：单元与绑定按位置一一对应
#[derive(Debug, Clone, Default)]
pub struct Candidates {
    pub units: Vec<TranslatableUnit>,
    pub bindings: Vec<NodeBinding>,
    /// 不交给机器翻译的字符串
    pub skip_machine_translation: HashSet<String>,
}

impl Candidates {
    pub fn push(&mut self, unit: TranslatableUnit, binding: NodeBinding) {
        self.units.push(unit);
        self.bindings.push(binding);
    }

    /// 删除一个候选，保持两个序列同步
    pub fn remove(&mut self, index: usize) -> Option<(TranslatableUnit, NodeBinding)> {
        if index >= self.units.len() || index >= self.bindings.len() {
            return None;
        }
        Some((self.units.remove(index), self.bindings.remove(index)))
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn is_consistent(&self) -> bool {
        self.units.len() == self.bindings.len()
    }

    pub fn strings(&self) -> Vec<String> {
        self.units.iter().map(|unit| unit.original.clone()).collect()
    }
}

/// 片段提取器
pub struct FragmentExtractor<'a> {
    settings: &'a RenderSettings,
    hooks: &'a Hooks,
    matched_blocks: &'a [MatchedBlock],
}

impl<'a> FragmentExtractor<'a> {
    pub fn new(settings: &'a RenderSettings, hooks: &'a Hooks) -> Self {
        Self {
            settings,
            hooks,
            matched_blocks: &[],
        }
    }

    /// 本次渲染中被替换的翻译块，其原文原样作为查找键
    pub fn with_matched_blocks(mut self, matched_blocks: &'a [MatchedBlock]) -> Self {
        self.matched_blocks = matched_blocks;
        self
    }

    /// 行对应的翻译块原文；重新序列化的内部标记可能与存储的原文不同
    fn block_original(&self, row: &Handle) -> Option<&str> {
        self.matched_blocks
            .iter()
            .find(|matched| matched.replaced && Rc::ptr_eq(&matched.row, row))
            .map(|matched| full_trim(&matched.original))
    }

    /// 为免翻译选择器命中的元素加上免翻译属性
    pub fn mark_no_translate(&self, tree: &HtmlTree) {
        for selector in &self.settings.no_translate_selectors {
            for row in tree.find(selector) {
                set_node_attr(&row, NO_TRANSLATE_ATTRIBUTE, Some(String::new()));
            }
        }
    }

    pub fn extract(&self, tree: &HtmlTree, ctx: &RequestContext) -> Candidates {
        self.mark_no_translate(tree);

        let mut candidates = Candidates::default();
        self.collect_blocks(tree, &mut candidates);
        self.collect_text(tree, &mut candidates);
        self.collect_attributes(tree, &mut candidates);

        tracing::debug!("提取 {} 个可翻译单元", candidates.len());

        self.hooks.candidates(candidates, tree, ctx)
    }

    fn accessor_for(&self, node_type: &str) -> Accessor {
        self.settings
            .node_accessor(node_type)
            .map(Accessor::from_node_accessor)
            .unwrap_or(Accessor::OuterText)
    }

    fn collect_blocks(&self, tree: &HtmlTree, candidates: &mut Candidates) {
        let selector = format!(".{}", TRANSLATION_BLOCK_CLASS);
        let accessor = self.accessor_for("block");

        for row in tree.find(&selector) {
            let inner = inner_html(&row);
            let trimmed = self.block_original(&row).unwrap_or_else(|| full_trim(&inner));

            if is_translatable_string(trimmed)
                && !outer_html(&row).contains("[vc_")
                && !has_non_translatable_parent(&row)
                && !has_ancestor_attribute(&row, NO_TRANSLATE_ATTRIBUTE)
            {
                candidates.push(
                    TranslatableUnit {
                        original: trimmed.to_string(),
                        kind: UnitKind::Block,
                    },
                    NodeBinding::new(&row, accessor.clone(), "block"),
                );
            }
        }
    }

    fn collect_text(&self, tree: &HtmlTree, candidates: &mut Candidates) {
        for row in tree.text_nodes() {
            let outer = outer_html(&row);
            let trimmed = full_trim(&outer);

            if !is_translatable_string(trimmed)
                || has_non_translatable_parent(&row)
                || has_ancestor_attribute(&row, NO_TRANSLATE_ATTRIBUTE)
                || has_ancestor_class(&row, TRANSLATION_BLOCK_CLASS)
            {
                continue;
            }

            let node_type = match get_parent_name(&row).as_deref() {
                Some("button") => "button",
                Some("option") => "option",
                _ => "text",
            };

            candidates.push(
                TranslatableUnit {
                    original: trimmed.to_string(),
                    kind: UnitKind::Text,
                },
                NodeBinding::new(&row, self.accessor_for(node_type), node_type),
            );
        }
    }

    fn collect_attributes(&self, tree: &HtmlTree, candidates: &mut Candidates) {
        let urls = UrlConverter::new(self.settings);

        for node_accessor in &self.settings.node_accessors {
            let Some(selector) = &node_accessor.selector else {
                continue;
            };
            let accessor = Accessor::from_node_accessor(node_accessor);
            let scoped_no_translate = format!("{}-{}", NO_TRANSLATE_ATTRIBUTE, accessor.name());

            for row in tree.find(selector) {
                if get_node_name(&row) == Some("link") {
                    continue;
                }

                let value = match &accessor {
                    Accessor::Attribute(name) => get_node_attr(&row, name).unwrap_or_default(),
                    Accessor::InnerText => inner_html(&row),
                    Accessor::OuterText => outer_html(&row),
                };
                let mut trimmed = full_trim(&value);

                // 站内页面链接交给链接重写，只有外部链接和文件链接作为字符串翻译
                if accessor.name() == "href"
                    && !(urls.is_external_link(trimmed) || urls.url_is_file(trimmed))
                {
                    trimmed = "";
                }

                if !is_translatable_string(trimmed)
                    || has_ancestor_attribute(&row, NO_TRANSLATE_ATTRIBUTE)
                    || has_ancestor_attribute(&row, &scoped_no_translate)
                    || has_ancestor_class(&row, TRANSLATION_BLOCK_CLASS)
                {
                    continue;
                }

                let original = match accessor {
                    Accessor::Attribute(_) => trimmed.to_string(),
                    _ => decode_entities(trimmed),
                };

                if !self
                    .hooks
                    .allow_machine_translation(&original, node_accessor)
                {
                    candidates.skip_machine_translation.insert(original.clone());
                }

                candidates.push(
                    TranslatableUnit {
                        original,
                        kind: UnitKind::Attribute,
                    },
                    NodeBinding::new(&row, accessor.clone(), node_accessor.key.clone()),
                );
            }
        }
    }
}

/// 解码标记文本中的字符实体
fn decode_entities(markup: &str) -> String {
    if !markup.contains('&') {
        return markup.to_string();
    }
    match HtmlTree::parse(markup, usize::MAX) {
        Ok(fragment) => text_content(fragment.root()),
        Err(_) => markup.to_string(),
    }
}
