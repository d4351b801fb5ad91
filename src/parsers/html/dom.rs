//! HTML树抽象
//!
//! 基于 `markup5ever_rcdom` 的可变DOM树，提供渲染管道所需的全部操作：
//! 解析、选择器查找、属性读写、内部/外部标记的读写、父子节点访问以及保存。
//!
//! 节点句柄在整棵树的生命周期内有效。标记替换会尽量移动已有节点而不是重新
//! 解析，因此尚未处理的句柄在替换后仍然指向树中的节点。

use std::cell::RefCell;
use std::rc::Rc;

use html5ever::interface::{Attribute, QualName};
use html5ever::serialize::{serialize, SerializeOpts, TraversalScope};
use html5ever::tendril::{format_tendril, StrTendril, TendrilSink};
use html5ever::tree_builder::TreeBuilderOpts;
use html5ever::{namespace_url, ns, parse_document, parse_fragment, LocalName, ParseOpts};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom, SerializableHandle};
use thiserror::Error;

use super::selector::Selector;

/// DOM解析错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    #[error("文档过大: {size} 字节，上限 {limit} 字节")]
    TooLarge { size: usize, limit: usize },
}

/// 已解析的HTML树
///
/// 完整文档（以 `<!DOCTYPE`、`<html`、`<head` 或 `<body` 开头）按文档解析，
/// 其余内容按 `body` 上下文中的片段解析，保存时不会补全 `html`/`body` 外壳。
pub struct HtmlTree {
    dom: RcDom,
    root: Handle,
    fragment: bool,
}

impl HtmlTree {
    /// 解析HTML字符串
    pub fn parse(html: &str, max_size: usize) -> Result<HtmlTree, DomError> {
        if html.len() > max_size {
            return Err(DomError::TooLarge {
                size: html.len(),
                limit: max_size,
            });
        }

        if looks_like_document(html) {
            let dom = parse_document(RcDom::default(), parse_opts()).one(html);
            let root = dom.document.clone();
            Ok(HtmlTree {
                dom,
                root,
                fragment: false,
            })
        } else {
            let dom = parse_fragment(
                RcDom::default(),
                parse_opts(),
                html_name("body"),
                vec![],
            )
            .one(html);
            let root = dom
                .document
                .children
                .borrow()
                .first()
                .cloned()
                .unwrap_or_else(|| dom.document.clone());
            Ok(HtmlTree {
                dom,
                root,
                fragment: true,
            })
        }
    }

    /// 树的根节点（文档节点或片段根元素）
    pub fn root(&self) -> &Handle {
        &self.root
    }

    pub fn is_fragment(&self) -> bool {
        self.fragment
    }

    /// 按文档顺序返回根节点下的全部元素
    pub fn elements(&self) -> Vec<Handle> {
        let mut found = Vec::new();
        collect_descendants(&self.root, &mut found, |node| {
            matches!(node.data, NodeData::Element { .. })
        });
        found
    }

    /// 按文档顺序返回根节点下的全部文本节点
    pub fn text_nodes(&self) -> Vec<Handle> {
        let mut found = Vec::new();
        collect_descendants(&self.root, &mut found, |node| {
            matches!(node.data, NodeData::Text { .. })
        });
        found
    }

    /// 按选择器查找元素；无效选择器返回空结果
    pub fn find(&self, selector: &str) -> Vec<Handle> {
        match Selector::parse(selector) {
            Ok(selector) => self.find_with(&selector),
            Err(e) => {
                tracing::warn!("忽略选择器: {}", e);
                Vec::new()
            }
        }
    }

    pub fn find_with(&self, selector: &Selector) -> Vec<Handle> {
        let mut found = Vec::new();
        collect_descendants(&self.root, &mut found, |node| selector.matches(node));
        found
    }

    /// 查找第一个指定标签的元素
    pub fn find_first(&self, tag: &str) -> Option<Handle> {
        let mut found = Vec::new();
        collect_descendants(&self.root, &mut found, |node| {
            get_node_name(node).is_some_and(|name| name == tag)
        });
        found.into_iter().next()
    }

    /// `body` 元素，片段或缺失时返回根节点
    pub fn body(&self) -> Handle {
        self.find_first("body").unwrap_or_else(|| self.root.clone())
    }

    /// 检查节点是否仍然挂在这棵树上
    pub fn contains(&self, node: &Handle) -> bool {
        let mut current = Some(node.clone());
        while let Some(candidate) = current {
            if Rc::ptr_eq(&candidate, &self.root) {
                return true;
            }
            current = get_parent_node(&candidate);
        }
        false
    }

    /// 序列化整棵树
    pub fn save(&self) -> String {
        if self.fragment {
            inner_html(&self.root)
        } else {
            serialize_handle(&self.dom.document, TraversalScope::ChildrenOnly(None))
        }
    }
}

fn parse_opts() -> ParseOpts {
    // 关闭脚本模式，使 <noscript> 的内容按普通标记解析
    ParseOpts {
        tree_builder: TreeBuilderOpts {
            scripting_enabled: false,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn html_name(local: &str) -> QualName {
    QualName::new(None, ns!(html), LocalName::from(local))
}

/// 判断输入是完整文档还是片段
fn looks_like_document(html: &str) -> bool {
    let head: String = html
        .trim_start_matches(|c: char| c.is_whitespace() || c == '\u{feff}')
        .chars()
        .take(9)
        .collect::<String>()
        .to_ascii_lowercase();

    ["<!doctype", "<html", "<head", "<body"]
        .iter()
        .any(|prefix| head.starts_with(prefix))
}

/// 深度优先（文档顺序）收集满足条件的后代节点，不包括起始节点本身
fn collect_descendants<F>(node: &Handle, found: &mut Vec<Handle>, predicate: F)
where
    F: Fn(&Handle) -> bool,
{
    let mut stack: Vec<Handle> = node.children.borrow().iter().rev().cloned().collect();

    while let Some(current) = stack.pop() {
        if predicate(&current) {
            found.push(current.clone());
        }
        for child in current.children.borrow().iter().rev() {
            stack.push(child.clone());
        }
    }
}

/// 获取节点属性值
pub fn get_node_attr(node: &Handle, attr_name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => {
            for attr in attrs.borrow().iter() {
                if &*attr.name.local == attr_name {
                    return Some(attr.value.to_string());
                }
            }
            None
        }
        _ => None,
    }
}

pub fn has_node_attr(node: &Handle, attr_name: &str) -> bool {
    match &node.data {
        NodeData::Element { attrs, .. } => {
            attrs.borrow().iter().any(|attr| &*attr.name.local == attr_name)
        }
        _ => false,
    }
}

/// 按原始顺序返回全部属性
pub fn get_node_attrs(node: &Handle) -> Vec<(String, String)> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .map(|attr| (attr.name.local.to_string(), attr.value.to_string()))
            .collect(),
        _ => Vec::new(),
    }
}

/// 获取节点名称
pub fn get_node_name(node: &Handle) -> Option<&'_ str> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.as_ref()),
        _ => None,
    }
}

/// 获取父节点
pub fn get_parent_node(child: &Handle) -> Option<Handle> {
    let weak = child.parent.take();
    let parent = weak.as_ref().and_then(|node| node.upgrade());
    child.parent.set(weak);
    parent
}

/// 父元素的标签名
pub fn get_parent_name(node: &Handle) -> Option<String> {
    get_parent_node(node).and_then(|parent| get_node_name(&parent).map(str::to_string))
}

/// 元素子节点（不含文本、注释）
pub fn element_children(node: &Handle) -> Vec<Handle> {
    node.children
        .borrow()
        .iter()
        .filter(|child| matches!(child.data, NodeData::Element { .. }))
        .cloned()
        .collect()
}

/// 设置节点属性，`None` 表示删除
pub fn set_node_attr(node: &Handle, attr_name: &str, attr_value: Option<String>) {
    if let NodeData::Element { attrs, .. } = &node.data {
        let attrs_mut = &mut attrs.borrow_mut();
        let mut i = 0;
        let mut found_existing_attr: bool = false;

        while i < attrs_mut.len() {
            if &attrs_mut[i].name.local == attr_name {
                found_existing_attr = true;

                if let Some(attr_value) = attr_value.clone() {
                    attrs_mut[i].value.clear();
                    attrs_mut[i].value.push_slice(attr_value.as_str());
                } else {
                    // Remove attr completely if attr_value is not defined
                    attrs_mut.remove(i);
                    continue;
                }
            }

            i += 1;
        }

        if !found_existing_attr {
            // Add new attribute (since originally the target node didn't have it)
            if let Some(attr_value) = attr_value {
                attrs_mut.push(Attribute {
                    name: QualName::new(None, ns!(), LocalName::from(attr_name)),
                    value: format_tendril!("{}", attr_value),
                });
            }
        }
    };
}

pub fn has_class(node: &Handle, class: &str) -> bool {
    get_node_attr(node, "class")
        .map(|value| value.split_whitespace().any(|c| c == class))
        .unwrap_or(false)
}

pub fn add_class(node: &Handle, class: &str) {
    let value = match get_node_attr(node, "class") {
        Some(existing) if !existing.trim().is_empty() => format!("{} {}", existing, class),
        _ => class.to_string(),
    };
    set_node_attr(node, "class", Some(value));
}

/// 新建一个游离的元素节点
pub fn create_element(tag: &str, attrs: &[(&str, &str)]) -> Handle {
    let attrs = attrs
        .iter()
        .map(|(name, value)| Attribute {
            name: QualName::new(None, ns!(), LocalName::from(*name)),
            value: StrTendril::from(*value),
        })
        .collect();

    Node::new(NodeData::Element {
        name: html_name(tag),
        attrs: RefCell::new(attrs),
        template_contents: RefCell::new(None),
        mathml_annotation_xml_integration_point: false,
    })
}

/// 文本节点的已解码内容
pub fn get_text(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Text { contents } => Some(contents.borrow().to_string()),
        _ => None,
    }
}

/// 去除标签后的纯文本（跳过脚本和样式）
pub fn text_content(node: &Handle) -> String {
    if let Some(text) = get_text(node) {
        return text;
    }

    let mut texts = Vec::new();
    let mut stack: Vec<Handle> = node.children.borrow().iter().rev().cloned().collect();
    while let Some(current) = stack.pop() {
        match &current.data {
            NodeData::Text { contents } => texts.push(contents.borrow().to_string()),
            NodeData::Element { name, .. }
                if matches!(name.local.as_ref(), "script" | "style") => {}
            _ => {
                for child in current.children.borrow().iter().rev() {
                    stack.push(child.clone());
                }
            }
        }
    }
    texts.concat()
}

fn serialize_handle(node: &Handle, traversal_scope: TraversalScope) -> String {
    let mut buf: Vec<u8> = Vec::new();
    let serializable: SerializableHandle = node.clone().into();
    let opts = SerializeOpts {
        traversal_scope,
        ..Default::default()
    };

    if let Err(e) = serialize(&mut buf, &serializable, opts) {
        tracing::warn!("序列化节点失败: {}", e);
    }

    match String::from_utf8(buf) {
        Ok(markup) => markup,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

/// 节点的内部标记
pub fn inner_html(node: &Handle) -> String {
    match &node.data {
        NodeData::Element { name, .. } => {
            serialize_handle(node, TraversalScope::ChildrenOnly(Some(name.clone())))
        }
        NodeData::Text { .. } => outer_html(node),
        _ => serialize_handle(node, TraversalScope::ChildrenOnly(None)),
    }
}

/// 节点的外部标记
pub fn outer_html(node: &Handle) -> String {
    match &node.data {
        NodeData::Document => serialize_handle(node, TraversalScope::ChildrenOnly(None)),
        _ => serialize_handle(node, TraversalScope::IncludeNode),
    }
}

/// 在给定上下文元素中把标记解析为游离节点
fn parse_markup_nodes(context: QualName, markup: &str) -> Vec<Handle> {
    let dom = parse_fragment(RcDom::default(), parse_opts(), context, vec![]).one(markup);
    let root = dom.document.children.borrow().first().cloned();

    match root {
        Some(root) => {
            let nodes: Vec<Handle> = root.children.borrow_mut().drain(..).collect();
            for node in &nodes {
                node.parent.set(None);
            }
            nodes
        }
        None => Vec::new(),
    }
}

/// 重新解析标记时使用的上下文元素
///
/// 片段的根是解析器合成的 `html` 元素，在 `html` 上下文中解析会补出
/// `head`/`body`，因此按 `body` 处理。
fn context_name(node: &Handle) -> QualName {
    match &node.data {
        NodeData::Element { name, .. } if name.local.as_ref() != "html" => name.clone(),
        _ => html_name("body"),
    }
}

fn position_in_parent(parent: &Handle, node: &Handle) -> Option<usize> {
    parent
        .children
        .borrow()
        .iter()
        .position(|child| Rc::ptr_eq(child, node))
}

/// 用标记替换节点的全部子节点
pub fn set_inner_html(node: &Handle, markup: &str) {
    let nodes = parse_markup_nodes(context_name(node), markup);

    for old in node.children.borrow().iter() {
        old.parent.set(None);
    }
    for new in &nodes {
        new.parent.set(Some(Rc::downgrade(node)));
    }
    *node.children.borrow_mut() = nodes;
}

/// 在末尾追加由标记解析出的节点
pub fn append_html(node: &Handle, markup: &str) {
    let nodes = parse_markup_nodes(context_name(node), markup);
    for new in nodes {
        new.parent.set(Some(Rc::downgrade(node)));
        node.children.borrow_mut().push(new);
    }
}

/// 在开头插入由标记解析出的节点
pub fn prepend_html(node: &Handle, markup: &str) {
    let nodes = parse_markup_nodes(context_name(node), markup);
    for new in &nodes {
        new.parent.set(Some(Rc::downgrade(node)));
    }
    let mut children = node.children.borrow_mut();
    let rest: Vec<Handle> = children.drain(..).collect();
    children.extend(nodes);
    children.extend(rest);
}

/// 用一组节点替换指定节点
fn replace_with_nodes(node: &Handle, nodes: Vec<Handle>) -> bool {
    let Some(parent) = get_parent_node(node) else {
        return false;
    };
    let Some(index) = position_in_parent(&parent, node) else {
        return false;
    };

    for new in &nodes {
        new.parent.set(Some(Rc::downgrade(&parent)));
    }
    parent.children.borrow_mut().splice(index..index + 1, nodes);
    node.parent.set(None);
    true
}

/// 用标记替换节点本身，返回新插入的节点
///
/// 若替换结果是单个文本节点且原节点也是文本节点，则原地修改，节点身份保持不变。
pub fn set_outer_html(node: &Handle, markup: &str) -> Vec<Handle> {
    let context = get_parent_node(node)
        .map(|parent| context_name(&parent))
        .unwrap_or_else(|| html_name("body"));
    let nodes = parse_markup_nodes(context, markup);

    if let (NodeData::Text { contents }, [single]) = (&node.data, nodes.as_slice()) {
        if let Some(text) = get_text(single) {
            *contents.borrow_mut() = StrTendril::from(text);
            return vec![node.clone()];
        }
    }

    if replace_with_nodes(node, nodes.clone()) {
        nodes
    } else {
        Vec::new()
    }
}

/// 用另一个节点替换指定节点
pub fn replace_node(node: &Handle, replacement: &Handle) -> bool {
    replace_with_nodes(node, vec![replacement.clone()])
}

/// 将节点的子节点移动到另一个节点末尾
pub fn move_children(from: &Handle, to: &Handle) {
    let children: Vec<Handle> = from.children.borrow_mut().drain(..).collect();
    for child in children {
        child.parent.set(Some(Rc::downgrade(to)));
        to.children.borrow_mut().push(child);
    }
}

/// 用节点自身的子节点替换该节点（即解包）
pub fn unwrap_node(node: &Handle) -> bool {
    let children: Vec<Handle> = node.children.borrow_mut().drain(..).collect();
    replace_with_nodes(node, children)
}

/// 将一组相邻的兄弟节点包裹进新元素
pub fn wrap_nodes(nodes: &[Handle], wrapper: &Handle) -> bool {
    let Some(first) = nodes.first() else {
        return false;
    };
    if !replace_node(first, wrapper) {
        return false;
    }

    first.parent.set(Some(Rc::downgrade(wrapper)));
    wrapper.children.borrow_mut().push(first.clone());

    for node in &nodes[1..] {
        if let Some(parent) = get_parent_node(node) {
            if let Some(index) = position_in_parent(&parent, node) {
                parent.children.borrow_mut().remove(index);
            }
        }
        node.parent.set(Some(Rc::downgrade(wrapper)));
        wrapper.children.borrow_mut().push(node.clone());
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(html: &str) -> HtmlTree {
        HtmlTree::parse(html, usize::MAX).unwrap()
    }

    #[test]
    fn test_fragment_round_trip_keeps_layout() {
        let html = "<p>Hello <b>world</b></p>";
        let tree = fragment(html);
        assert!(tree.is_fragment());
        assert_eq!(tree.save(), html);
    }

    #[test]
    fn test_document_detection() {
        let tree = fragment("<!DOCTYPE html><html><head></head><body><p>x</p></body></html>");
        assert!(!tree.is_fragment());
        assert!(tree.save().starts_with("<!DOCTYPE html>"));
        assert_eq!(get_node_name(&tree.body()), Some("body"));
    }

    #[test]
    fn test_too_large_document() {
        let result = HtmlTree::parse("<p>abc</p>", 4);
        assert_eq!(result.err(), Some(DomError::TooLarge { size: 10, limit: 4 }));
    }

    #[test]
    fn test_inner_and_outer_html() {
        let tree = fragment(r#"<div class="a"><span>One &amp; two</span></div>"#);
        let div = tree.find("div").remove(0);
        assert_eq!(inner_html(&div), "<span>One &amp; two</span>");
        assert_eq!(outer_html(&div), r#"<div class="a"><span>One &amp; two</span></div>"#);
        assert_eq!(text_content(&div), "One & two");
    }

    #[test]
    fn test_set_inner_html_reparents_children() {
        let tree = fragment("<div><span>old</span></div>");
        let div = tree.find("div").remove(0);
        set_inner_html(&div, "<em>new</em> text");
        assert_eq!(tree.save(), "<div><em>new</em> text</div>");

        let em = tree.find("em").remove(0);
        let parent = get_parent_node(&em).unwrap();
        assert!(Rc::ptr_eq(&parent, &div));
        assert!(tree.contains(&em));
    }

    #[test]
    fn test_set_outer_html_on_text_keeps_identity() {
        let tree = fragment("<p>Hello</p>");
        let text = tree.text_nodes().remove(0);
        let inserted = set_outer_html(&text, "Bonjour &amp; salut");
        assert_eq!(inserted.len(), 1);
        assert!(Rc::ptr_eq(&inserted[0], &text));
        assert_eq!(tree.save(), "<p>Bonjour &amp; salut</p>");
    }

    #[test]
    fn test_set_outer_html_on_top_level_text() {
        let tree = fragment("Hello <b>world</b>");
        let text = tree.text_nodes().remove(0);
        set_outer_html(&text, "Bonjour ");
        assert_eq!(tree.save(), "Bonjour <b>world</b>");

        let text = tree.text_nodes().remove(0);
        let inserted = set_outer_html(&text, "<i>Salut</i> ");
        assert_eq!(inserted.len(), 2);
        assert_eq!(tree.save(), "<i>Salut</i> <b>world</b>");
    }

    #[test]
    fn test_set_outer_html_with_markup() {
        let tree = fragment("<p>Hello there</p>");
        let text = tree.text_nodes().remove(0);
        let inserted = set_outer_html(&text, "<strong>Bonjour</strong> toi");
        assert_eq!(inserted.len(), 2);
        assert_eq!(tree.save(), "<p><strong>Bonjour</strong> toi</p>");
        assert!(!tree.contains(&text));
    }

    #[test]
    fn test_unwrap_and_wrap_nodes() {
        let tree = fragment("<p>a<i>b</i>c</p>");
        let i = tree.find("i").remove(0);
        assert!(unwrap_node(&i));
        assert_eq!(tree.save(), "<p>abc</p>");

        let texts = tree.text_nodes();
        let wrapper = create_element("span", &[("class", "w")]);
        assert!(wrap_nodes(&texts[1..], &wrapper));
        assert_eq!(tree.save(), r#"<p>a<span class="w">bc</span></p>"#);
    }

    #[test]
    fn test_attributes_and_classes() {
        let tree = fragment(r#"<a href="/x" class="link">x</a>"#);
        let a = tree.find("a").remove(0);
        set_node_attr(&a, "href", Some("/y".to_string()));
        set_node_attr(&a, "data-new", Some(String::new()));
        add_class(&a, "translation-block");
        assert!(has_class(&a, "translation-block"));
        assert!(has_node_attr(&a, "data-new"));
        set_node_attr(&a, "data-new", None);
        assert!(!has_node_attr(&a, "data-new"));
        assert_eq!(
            tree.save(),
            r#"<a href="/y" class="link translation-block">x</a>"#
        );
    }

    #[test]
    fn test_fragment_root_edits_use_body_context() {
        let tree = fragment("<p>x</p>");
        append_html(tree.root(), "tail <b>text</b>");
        prepend_html(tree.root(), "head");
        assert_eq!(tree.save(), "head<p>x</p>tail <b>text</b>");
    }

    #[test]
    fn test_append_and_prepend_html() {
        let tree = fragment("<form><input name=\"q\"></form>");
        let form = tree.find("form").remove(0);
        append_html(&form, r#"<input type="hidden" name="lang" value="fr">"#);
        prepend_html(&form, "<div>notice</div>");
        assert_eq!(
            tree.save(),
            r#"<form><div>notice</div><input name="q"><input type="hidden" name="lang" value="fr"></form>"#
        );
    }
}
