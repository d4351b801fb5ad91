//! 翻译块匹配
//!
//! 翻译块是编辑器事先合并好的多节点可翻译单元。每次渲染都要在文档中重新找到它：
//! 对每个合并根标签元素（且其后代不含其他合并根标签），比较其折叠空白后的纯文本
//! 与翻译块的 `trimmed_original`。

use markup5ever_rcdom::Handle;

use crate::parsers::html::dom::{
    add_class, element_children, get_node_name, set_inner_html, set_node_attr, text_content,
};
use crate::parsers::html::utils::collapse_whitespace;
use crate::parsers::html::HtmlTree;
use crate::translation::config::constants::TRANSLATION_BLOCK_CLASS;
use crate::translation::config::MergeRules;
use crate::translation::lookup::{BlockType, TranslationBlock};

/// 去除标签、解码实体并折叠空白
pub fn trim_translation_block(markup: &str) -> String {
    match HtmlTree::parse(markup, usize::MAX) {
        Ok(fragment) => collapse_whitespace(&text_content(fragment.root())),
        Err(_) => collapse_whitespace(markup),
    }
}

/// 后代中是否含有指定的合并根标签
pub fn contains_top_parent(node: &Handle, merge_rules: &MergeRules) -> bool {
    node.children.borrow().iter().any(|child| {
        get_node_name(child).is_some_and(|name| merge_rules.is_top_parent(name))
            || contains_top_parent(child, merge_rules)
    })
}

/// 已应用到树上的翻译块
#[derive(Debug, Clone)]
pub struct MatchedBlock {
    pub row: Handle,
    /// 翻译块的原文，替换后的行以它作为查找键
    pub original: String,
    /// 行的内容已被原文替换（弃用的翻译块只做标注）
    pub replaced: bool,
}

/// 翻译块匹配器
pub struct BlockMatcher<'a> {
    merge_rules: &'a MergeRules,
    preview: bool,
}

impl<'a> BlockMatcher<'a> {
    pub fn new(merge_rules: &'a MergeRules, preview: bool) -> Self {
        Self {
            merge_rules,
            preview,
        }
    }

    /// 计算 `trimmed_original`，并丢弃文本不在页面中的翻译块
    pub fn prepare(&self, tree: &HtmlTree, blocks: Vec<TranslationBlock>) -> Vec<TranslationBlock> {
        if blocks.is_empty() {
            return blocks;
        }

        let body_text = collapse_whitespace(&text_content(&tree.body()));

        blocks
            .into_iter()
            .map(|mut block| {
                block.trimmed_original = trim_translation_block(&block.original);
                block
            })
            .filter(|block| {
                !block.trimmed_original.is_empty() && body_text.contains(&block.trimmed_original)
            })
            .collect()
    }

    /// 查找与元素匹配的翻译块
    pub fn find_block<'b>(
        &self,
        row: &Handle,
        blocks: &'b [TranslationBlock],
    ) -> Option<&'b TranslationBlock> {
        let name = get_node_name(row)?;
        if !self.merge_rules.is_top_parent(name) || contains_top_parent(row, self.merge_rules) {
            return None;
        }

        let trimmed_inner_text = collapse_whitespace(&text_content(row));
        blocks
            .iter()
            .find(|block| block.trimmed_original == trimmed_inner_text)
    }

    /// 在整棵树上应用翻译块，返回匹配的元素
    pub fn apply(&self, tree: &HtmlTree, blocks: &[TranslationBlock]) -> Vec<MatchedBlock> {
        let mut matched = Vec::new();
        if blocks.is_empty() {
            return matched;
        }

        for row in tree.elements() {
            if !tree.contains(&row) {
                continue;
            }
            let Some(block) = self.find_block(&row, blocks) else {
                continue;
            };

            match block.block_type {
                BlockType::Simple => {
                    // 内层元素同样匹配时由内层元素承载翻译块
                    let inner_match = element_children(&row)
                        .iter()
                        .any(|child| self.find_block(child, std::slice::from_ref(block)).is_some());
                    if inner_match {
                        continue;
                    }
                    set_inner_html(&row, &block.original);
                    add_class(&row, TRANSLATION_BLOCK_CLASS);
                    matched.push(MatchedBlock {
                        row: row.clone(),
                        original: block.original.clone(),
                        replaced: true,
                    });
                }
                BlockType::Deprecated if self.preview && block.status != 0 => {
                    let id = block.id.to_string();
                    set_node_attr(&row, "data-trp-translate-id", Some(id.clone()));
                    set_node_attr(&row, "data-trp-translate-id-deprecated", Some(id));
                    add_class(&row, "trp-deprecated-tb");
                    matched.push(MatchedBlock {
                        row: row.clone(),
                        original: block.original.clone(),
                        replaced: false,
                    });
                }
                BlockType::Deprecated => {}
            }
        }

        if !matched.is_empty() {
            tracing::debug!("匹配 {} 个翻译块", matched.len());
        }
        matched
    }
}
