//! JSON 响应体处理
//!
//! 异步接口返回的 JSON 常在字符串字段里嵌入 HTML 片段。这类响应不走整页管道，
//! 而是逐个翻译字符串叶子后重新序列化，键和非字符串值保持不变。

use serde_json::Value;

use crate::translation::error::RenderResult;

/// 自身异步请求的 `action` 前缀
const INTERNAL_ACTION_PREFIX: &str = "trp_";

/// 虽属自身请求但仍需翻译的 `action`
const TRANSLATED_INTERNAL_ACTION: &str = "trp_split_translation_block";

/// 把响应体解析为需要逐叶翻译的 JSON
///
/// 只接受非空数组、非空对象，以及字符串字面量。数字、布尔值和 `null`
/// 与其原始文本无法区分，按普通文本处理。
pub fn decode_json_body(content: &str) -> Option<Value> {
    let value: Value = serde_json::from_str(content.trim()).ok()?;
    match &value {
        Value::Array(items) if !items.is_empty() => Some(value),
        Value::Object(map) if !map.is_empty() => Some(value),
        Value::String(decoded) if !decoded.is_empty() && decoded != content => Some(value),
        _ => None,
    }
}

/// 自身的异步请求，响应原样返回
pub fn is_internal_action(action: Option<&str>) -> bool {
    action.is_some_and(|action| {
        action.starts_with(INTERNAL_ACTION_PREFIX) && action != TRANSLATED_INTERNAL_ACTION
    })
}

/// 递归翻译所有字符串叶子
pub fn translate_json_leaves<F>(value: Value, translate: &mut F) -> Value
where
    F: FnMut(&str) -> String,
{
    match value {
        Value::String(text) => Value::String(translate(&text)),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| translate_json_leaves(item, translate))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, item)| (key, translate_json_leaves(item, translate)))
                .collect(),
        ),
        other => other,
    }
}

/// 翻译 JSON 响应体并重新序列化
pub fn translate_json_body<F>(value: Value, translate: &mut F) -> RenderResult<String>
where
    F: FnMut(&str) -> String,
{
    let translated = translate_json_leaves(value, translate);
    Ok(serde_json::to_string(&translated)?)
}
