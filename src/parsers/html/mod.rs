//! HTML解析和处理模块
//!
//! - `utils`: 空白处理、实体编码和数字判断
//! - `selector`: 选择器解析与匹配
//! - `dom`: HTML树和基础DOM操作

pub mod dom;
pub mod selector;
pub mod utils;

// 重新导出主要的公共 API
pub use dom::{
    get_node_attr, get_node_name, get_parent_node, inner_html, outer_html, set_node_attr,
    DomError, HtmlTree,
};
pub use selector::{Selector, SelectorError};
pub use utils::WHITESPACES;
