//! 节点选择器模块
//!
//! 提供可翻译属性表和免翻译列表所需的CSS选择器子集：
//!
//! - 标签名、`*`、`#id`、`.class`
//! - 属性选择器：`[attr]`、`[attr=v]`、`[attr!=v]`、`[attr~=v]`、`[attr|=v]`、
//!   `[attr^=v]`、`[attr$=v]`、`[attr*=v]`
//! - 后代组合符（空白）和逗号分隔的选择器组
//!
//! 选择器通过 `cssparser` 进行分词，直接在 `markup5ever_rcdom` 节点上匹配。
//! `[attr!=v]` 不是标准CSS，缺少该属性的元素也视为匹配。
//!
//! ```rust
//! use transpage::parsers::html::selector::Selector;
//!
//! let selector = Selector::parse("input[type='submit'], input[type=button]").unwrap();
//! assert_eq!(selector.alternatives().len(), 2);
//! ```

use cssparser::{ParseError, Parser, ParserInput, Token};
use markup5ever_rcdom::{Handle, NodeData};
use thiserror::Error;

use super::dom::{get_node_attr, get_parent_node};

/// 选择器解析错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    #[error("无效的选择器: {0}")]
    Invalid(String),
}

/// 属性匹配运算符
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrOperator {
    Exists,
    Equals(String),
    /// simple_html_dom 风格的 `!=`，属性缺失时同样匹配
    NotEquals(String),
    Includes(String),
    DashMatch(String),
    Prefix(String),
    Suffix(String),
    Substring(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrSelector {
    pub name: String,
    pub operator: AttrOperator,
}

/// 复合选择器，例如 `img.hero[alt]`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompoundSelector {
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attrs: Vec<AttrSelector>,
    universal: bool,
}

/// 由后代组合符连接的复合选择器序列
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplexSelector {
    pub parts: Vec<CompoundSelector>,
}

/// 逗号分隔的选择器组
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    alternatives: Vec<ComplexSelector>,
}

impl AttrSelector {
    fn matches(&self, node: &Handle) -> bool {
        let value = get_node_attr(node, &self.name);

        match (&self.operator, value) {
            (AttrOperator::NotEquals(_), None) => true,
            (_, None) => false,
            (AttrOperator::Exists, Some(_)) => true,
            (AttrOperator::Equals(expected), Some(value)) => value == *expected,
            (AttrOperator::NotEquals(expected), Some(value)) => value != *expected,
            (AttrOperator::Includes(expected), Some(value)) => {
                value.split_whitespace().any(|word| word == expected)
            }
            (AttrOperator::DashMatch(expected), Some(value)) => {
                value == *expected || value.starts_with(&format!("{}-", expected))
            }
            (AttrOperator::Prefix(expected), Some(value)) => {
                !expected.is_empty() && value.starts_with(expected.as_str())
            }
            (AttrOperator::Suffix(expected), Some(value)) => {
                !expected.is_empty() && value.ends_with(expected.as_str())
            }
            (AttrOperator::Substring(expected), Some(value)) => {
                !expected.is_empty() && value.contains(expected.as_str())
            }
        }
    }
}

impl CompoundSelector {
    fn is_empty(&self) -> bool {
        !self.universal
            && self.tag.is_none()
            && self.id.is_none()
            && self.classes.is_empty()
            && self.attrs.is_empty()
    }

    /// 检查元素节点是否满足该复合选择器
    pub fn matches(&self, node: &Handle) -> bool {
        let NodeData::Element { ref name, .. } = node.data else {
            return false;
        };

        if let Some(tag) = &self.tag {
            if !name.local.as_ref().eq_ignore_ascii_case(tag) {
                return false;
            }
        }

        if let Some(id) = &self.id {
            if get_node_attr(node, "id").as_deref() != Some(id.as_str()) {
                return false;
            }
        }

        if !self.classes.is_empty() {
            let class_attr = get_node_attr(node, "class").unwrap_or_default();
            let classes: Vec<&str> = class_attr.split_whitespace().collect();
            if !self.classes.iter().all(|c| classes.contains(&c.as_str())) {
                return false;
            }
        }

        self.attrs.iter().all(|attr| attr.matches(node))
    }
}

impl ComplexSelector {
    pub fn matches(&self, node: &Handle) -> bool {
        let Some((last, ancestors)) = self.parts.split_last() else {
            return false;
        };

        if !last.matches(node) {
            return false;
        }

        // 后代组合符只需贪心地向上查找
        let mut current = get_parent_node(node);
        for part in ancestors.iter().rev() {
            loop {
                match current {
                    Some(ancestor) => {
                        current = get_parent_node(&ancestor);
                        if part.matches(&ancestor) {
                            break;
                        }
                    }
                    None => return false,
                }
            }
        }

        true
    }
}

impl Selector {
    /// 解析选择器字符串
    pub fn parse(selector: &str) -> Result<Selector, SelectorError> {
        let invalid = || SelectorError::Invalid(selector.to_string());

        let mut input = ParserInput::new(selector);
        let mut parser = Parser::new(&mut input);

        let mut alternatives: Vec<ComplexSelector> = Vec::new();
        let mut parts: Vec<CompoundSelector> = Vec::new();
        let mut current = CompoundSelector::default();

        loop {
            let token = match parser.next_including_whitespace() {
                Ok(token) => token.clone(),
                Err(_) => break,
            };

            match token {
                Token::WhiteSpace(_) => {
                    if !current.is_empty() {
                        parts.push(std::mem::take(&mut current));
                    }
                }
                Token::Comma => {
                    if !current.is_empty() {
                        parts.push(std::mem::take(&mut current));
                    }
                    if parts.is_empty() {
                        return Err(invalid());
                    }
                    alternatives.push(ComplexSelector {
                        parts: std::mem::take(&mut parts),
                    });
                }
                Token::Ident(name) => {
                    if current.tag.is_some() {
                        return Err(invalid());
                    }
                    current.tag = Some(name.to_ascii_lowercase());
                }
                Token::Delim('*') => current.universal = true,
                Token::IDHash(id) => current.id = Some(id.to_string()),
                Token::Delim('.') => {
                    let class = parser.expect_ident().map_err(|_| invalid())?;
                    current.classes.push(class.to_string());
                }
                Token::SquareBracketBlock => {
                    let attr = parser
                        .parse_nested_block(|parser| parse_attribute(parser))
                        .map_err(|_| invalid())?;
                    current.attrs.push(attr);
                }
                _ => return Err(invalid()),
            }
        }

        if !current.is_empty() {
            parts.push(current);
        }
        if !parts.is_empty() {
            alternatives.push(ComplexSelector { parts });
        }
        if alternatives.is_empty() {
            return Err(invalid());
        }

        Ok(Selector { alternatives })
    }

    pub fn alternatives(&self) -> &[ComplexSelector] {
        &self.alternatives
    }

    /// 检查节点是否匹配任意一个选择器
    pub fn matches(&self, node: &Handle) -> bool {
        self.alternatives.iter().any(|complex| complex.matches(node))
    }
}

/// 解析 `[...]` 内部的属性选择器
fn parse_attribute<'i, 't>(parser: &mut Parser<'i, 't>) -> Result<AttrSelector, ParseError<'i, ()>> {
    let name = parser.expect_ident()?.to_ascii_lowercase();

    if parser.is_exhausted() {
        return Ok(AttrSelector {
            name,
            operator: AttrOperator::Exists,
        });
    }

    let operator_token = parser.next()?.clone();
    if let Token::Delim('!') = operator_token {
        parser.expect_delim('=')?;
    }

    let value = match parser.next()?.clone() {
        Token::Ident(value) | Token::QuotedString(value) => value.to_string(),
        Token::Number {
            int_value: Some(value),
            ..
        } => value.to_string(),
        _ => return Err(parser.new_custom_error(())),
    };
    parser.expect_exhausted()?;

    let operator = match operator_token {
        Token::Delim('=') => AttrOperator::Equals(value),
        Token::Delim('!') => AttrOperator::NotEquals(value),
        Token::IncludeMatch => AttrOperator::Includes(value),
        Token::DashMatch => AttrOperator::DashMatch(value),
        Token::PrefixMatch => AttrOperator::Prefix(value),
        Token::SuffixMatch => AttrOperator::Suffix(value),
        Token::SubstringMatch => AttrOperator::Substring(value),
        _ => return Err(parser.new_custom_error(())),
    };

    Ok(AttrSelector { name, operator })
}
