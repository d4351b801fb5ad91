//! 标记解包
//!
//! 上游的字符串提取步骤会把已翻译的界面文本包裹在 `<trp-gettext>` 标记中，
//! 标记可以嵌套，也可能被序列化进属性值（例如表单控件的 `value`）。
//! 渲染前需要把这些标记全部解析掉：
//!
//! - 标记是父元素的唯一内容时，展开到父元素中，并把父元素标为免翻译；
//! - 否则替换为惰性的 `<trp-wrap>` 包裹元素；
//! - 属性中的标记按属性处理，免翻译标志同样按属性记录。
//!
//! 当DOM无法解析时，`remove_markers` 以纯文本方式删除残留的标记语法。

use std::collections::BTreeMap;
use std::sync::OnceLock;

use markup5ever_rcdom::Handle;
use regex::Regex;

use crate::parsers::html::dom::{
    create_element, element_children, get_node_attr, get_node_attrs, get_node_name,
    get_parent_node, inner_html, move_children, outer_html, replace_node, set_node_attr,
    text_content, unwrap_node,
};
use crate::parsers::html::HtmlTree;
use crate::translation::config::constants::NO_TRANSLATE_ATTRIBUTE;

/// 标记元素
pub const MARKER_TAG: &str = "trp-gettext";

/// 标记上记录原始字符串ID的属性
pub const MARKER_ID_ATTRIBUTE: &str = "data-trpgettextoriginal";

/// 惰性包裹元素
pub const WRAP_TAG: &str = "trp-wrap";

/// 将转义的标记括号还原为 `<` 和 `>`
pub fn restore_marker_brackets(content: &str) -> String {
    content
        .replace("#!trpst#", "<")
        .replace("#!TRPST#", "<")
        .replace("#!trpen#", ">")
        .replace("#!TRPEN#", ">")
}

fn marker_patterns() -> &'static [Regex; 4] {
    static PATTERNS: OnceLock<[Regex; 4]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r"(<|&lt;)trp-gettext (.*?)(>|&gt;)").expect("marker pattern is valid"),
            Regex::new(r"(<|&lt;)(\\)*/trp-gettext(>|&gt;)").expect("marker pattern is valid"),
            Regex::new(r"(<|&lt;)trp-wrap (.*?)(>|&gt;)").expect("marker pattern is valid"),
            Regex::new(r"(<|&lt;)(\\)*/trp-wrap(>|&gt;)").expect("marker pattern is valid"),
        ]
    })
}

/// 以文本方式删除残留的标记
///
/// 预览模式下保留 `trp-wrap`，编辑器依赖它定位字符串。
pub fn remove_markers(content: &str, preview: bool) -> String {
    let patterns = marker_patterns();
    let count = if preview { 2 } else { 4 };

    let mut result = content.to_string();
    for pattern in &patterns[..count] {
        if pattern.is_match(&result) {
            result = pattern.replace_all(&result, "").into_owned();
        }
    }
    result
}

/// DOM中的标记解包器
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkerUnwrapper {
    preview: bool,
}

impl MarkerUnwrapper {
    pub fn new(preview: bool) -> Self {
        Self { preview }
    }

    /// 解包树中的全部标记元素，返回处理的数量
    ///
    /// 标记按子元素数量升序处理，先处理最简单的，外层标记的展开不会影响
    /// 已经处理过的内层标记。
    pub fn unwrap(&self, tree: &HtmlTree) -> usize {
        let mut levels: BTreeMap<usize, Vec<Handle>> = BTreeMap::new();
        for row in tree.find(MARKER_TAG) {
            levels
                .entry(element_children(&row).len())
                .or_default()
                .push(row);
        }

        let mut processed = 0;
        for row in levels.into_values().flatten() {
            if !tree.contains(&row) {
                continue;
            }
            if self.unwrap_marker(&row) {
                processed += 1;
            }
        }

        if processed > 0 {
            tracing::debug!("解包 {} 个标记", processed);
        }
        processed
    }

    fn unwrap_marker(&self, row: &Handle) -> bool {
        let Some(parent) = get_parent_node(row) else {
            return false;
        };
        let original_id = get_node_attr(row, MARKER_ID_ATTRIBUTE);

        let sole_content =
            element_children(&parent).len() == 1 && inner_html(&parent) == outer_html(row);

        if sole_content {
            if !unwrap_node(row) {
                return false;
            }
            set_node_attr(&parent, NO_TRANSLATE_ATTRIBUTE, Some(String::new()));
            if self.preview {
                if let Some(id) = original_id {
                    set_node_attr(&parent, MARKER_ID_ATTRIBUTE, Some(id));
                }
            }
            true
        } else {
            let mut attrs = vec![("class", WRAP_TAG), (NO_TRANSLATE_ATTRIBUTE, "")];
            if self.preview {
                if let Some(id) = original_id.as_deref() {
                    attrs.push((MARKER_ID_ATTRIBUTE, id));
                }
            }
            let wrapper = create_element(WRAP_TAG, &attrs);
            move_children(row, &wrapper);
            replace_node(row, &wrapper)
        }
    }

    /// 解包属性值中的标记，返回处理的属性数量
    pub fn unwrap_attributes(&self, tree: &HtmlTree) -> usize {
        let mut processed = 0;

        for row in tree.elements() {
            if get_node_name(&row) == Some(MARKER_TAG) {
                continue;
            }
            for (name, value) in get_node_attrs(&row) {
                if !value.contains("trp-gettext ") {
                    continue;
                }
                // JSON 属性值不在这里处理，残留标记稍后以文本方式删除
                if is_json_container(&value) {
                    continue;
                }
                if self.unwrap_attribute(&row, &name, &value) {
                    processed += 1;
                }
            }
        }

        processed
    }

    fn unwrap_attribute(&self, row: &Handle, name: &str, value: &str) -> bool {
        let Ok(fragment) = HtmlTree::parse(value, usize::MAX) else {
            return false;
        };

        let markers = fragment.find(MARKER_TAG);
        if markers.is_empty() {
            return false;
        }

        let mut original_id = None;
        for marker in &markers {
            if let Some(id) = get_node_attr(marker, MARKER_ID_ATTRIBUTE) {
                original_id = Some(id);
            }
            unwrap_node(marker);
        }

        let root = fragment.root();
        let resolved = if element_children(root).is_empty() {
            text_content(root)
        } else {
            fragment.save()
        };

        set_node_attr(row, name, Some(resolved));
        set_node_attr(
            row,
            &format!("{}-{}", NO_TRANSLATE_ATTRIBUTE, name),
            Some(String::new()),
        );
        if self.preview {
            if let Some(id) = original_id {
                set_node_attr(row, &format!("{}-{}", MARKER_ID_ATTRIBUTE, name), Some(id));
            }
        }
        true
    }
}

fn is_json_container(value: &str) -> bool {
    matches!(
        serde_json::from_str::<serde_json::Value>(value),
        Ok(serde_json::Value::Array(_)) | Ok(serde_json::Value::Object(_))
    )
}
