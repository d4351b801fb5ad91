//! 候选过滤器
//!
//! 判断提取出的字符串或节点是否应该进入翻译流程。规则对所有候选来源统一适用：
//! 空串、纯数字、百分比、短代码残留，以及位于免翻译祖先或不可翻译父元素下的节点都会被排除。

use markup5ever_rcdom::Handle;

use crate::parsers::html::dom::{get_node_name, get_parent_node, has_class, has_node_attr};
use crate::parsers::html::utils::{is_numeric, is_percentage, NON_TRANSLATABLE_PARENTS};

/// 页面构建器短代码的前缀
const SHORTCODE_PREFIX: &str = "[vc_";

/// 判断已去除首尾空白的字符串是否可翻译
pub fn is_translatable_string(trimmed: &str) -> bool {
    !trimmed.is_empty()
        && !trimmed.contains(SHORTCODE_PREFIX)
        && !is_numeric(trimmed)
        && !is_percentage(trimmed)
}

/// 节点本身或任意祖先带有指定属性
pub fn has_ancestor_attribute(node: &Handle, attribute: &str) -> bool {
    let mut current = Some(node.clone());
    while let Some(candidate) = current {
        if has_node_attr(&candidate, attribute) {
            return true;
        }
        current = get_parent_node(&candidate);
    }
    false
}

/// 节点本身或任意祖先带有指定类名
pub fn has_ancestor_class(node: &Handle, class: &str) -> bool {
    let mut current = Some(node.clone());
    while let Some(candidate) = current {
        if has_class(&candidate, class) {
            return true;
        }
        current = get_parent_node(&candidate);
    }
    false
}

/// 直接父元素是脚本、样式或标题
pub fn has_non_translatable_parent(node: &Handle) -> bool {
    get_parent_node(node)
        .map(|parent| {
            get_node_name(&parent).is_some_and(|name| NON_TRANSLATABLE_PARENTS.contains(&name))
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::html::HtmlTree;

    #[test]
    fn test_is_translatable_string() {
        assert!(is_translatable_string("Hello"));
        assert!(!is_translatable_string(""));
        assert!(!is_translatable_string("42"));
        assert!(!is_translatable_string("3.14"));
        assert!(!is_translatable_string("75%"));
        assert!(!is_translatable_string("[vc_row]Hello[/vc_row]"));
    }

    #[test]
    fn test_ancestor_checks_include_self() {
        let tree = HtmlTree::parse(
            r#"<div data-no-translation="" class="translation-block"><p>Hi</p></div><p class="x">There</p>"#,
            usize::MAX,
        )
        .unwrap();

        let divs = tree.find("div");
        assert!(has_ancestor_attribute(&divs[0], "data-no-translation"));

        let paragraphs = tree.find("p");
        assert!(has_ancestor_attribute(&paragraphs[0], "data-no-translation"));
        assert!(has_ancestor_class(&paragraphs[0], "translation-block"));
        assert!(!has_ancestor_attribute(&paragraphs[1], "data-no-translation"));
        assert!(!has_ancestor_class(&paragraphs[1], "translation-block"));
    }

    #[test]
    fn test_non_translatable_parent() {
        let tree = HtmlTree::parse(
            "<html><head><title>T</title><script>var a;</script></head><body><p>x</p></body></html>",
            usize::MAX,
        )
        .unwrap();
        let texts = tree.text_nodes();
        assert_eq!(texts.len(), 3);
        assert!(has_non_translatable_parent(&texts[0]));
        assert!(has_non_translatable_parent(&texts[1]));
        assert!(!has_non_translatable_parent(&texts[2]));
    }
}
