use std::sync::OnceLock;

use regex::Regex;

/// ASCII 空白字符
pub const WHITESPACES: &[char] = &[' ', '\t', '\n', '\x0c', '\r'];

/// 不参与翻译的父元素
pub const NON_TRANSLATABLE_PARENTS: &[&str] = &["script", "style", "title"];

/// 去除首尾空白（包括不间断空格等Unicode空白）
pub fn full_trim(value: &str) -> &str {
    value.trim_matches(|c: char| c.is_whitespace() || c == '\0' || c == '\x0b')
}

/// 将连续空白折叠为单个空格并去除首尾空白
pub fn collapse_whitespace(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut pending_space = false;

    for c in value.chars() {
        if c.is_whitespace() {
            pending_space = !result.is_empty();
        } else {
            if pending_space {
                result.push(' ');
                pending_space = false;
            }
            result.push(c);
        }
    }

    result
}

/// 按照 html5ever 序列化器的规则转义文本
///
/// 用于在标记中重新定位已解码的原文：序列化后的文本节点只会
/// 对 `&`、`<`、`>`、不间断空格和引号进行转义。
pub fn encode_entities(value: &str) -> String {
    let mut result = String::with_capacity(value.len());

    for c in value.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\u{a0}' => result.push_str("&nbsp;"),
            _ => result.push(c),
        }
    }

    result
}

/// 检查字符串是否为纯数字（整数、小数或科学计数法）
pub fn is_numeric(value: &str) -> bool {
    static NUMERIC: OnceLock<Regex> = OnceLock::new();
    let re = NUMERIC.get_or_init(|| {
        Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?$").expect("numeric pattern is valid")
    });
    re.is_match(value)
}

/// 检查字符串是否为百分比（例如 `45%`）
pub fn is_percentage(value: &str) -> bool {
    static PERCENTAGE: OnceLock<Regex> = OnceLock::new();
    let re =
        PERCENTAGE.get_or_init(|| Regex::new(r"^\d+%$").expect("percentage pattern is valid"));
    re.is_match(value)
}
