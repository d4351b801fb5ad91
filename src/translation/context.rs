//! 请求上下文
//!
//! 一次渲染所需的全部请求级状态，以不可变值的形式显式传递给每个组件。

/// 请求上下文
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// 当前目标语言
    pub language: String,

    /// 规范请求URL，同时作为页面缓存的键
    pub url: String,

    /// 翻译编辑器预览模式
    pub preview: bool,

    /// 后台请求，绕过缓存和翻译
    pub is_admin: bool,

    /// 异步请求的 `action` 参数
    pub action: Option<String>,

    /// 预览模式下展示在页面顶部的编辑器提示（HTML）
    pub editor_notices: Option<String>,
}

impl RequestContext {
    pub fn new(url: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_preview(mut self, preview: bool) -> Self {
        self.preview = preview;
        self
    }

    pub fn with_admin(mut self, is_admin: bool) -> Self {
        self.is_admin = is_admin;
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_editor_notices(mut self, notices: impl Into<String>) -> Self {
        self.editor_notices = Some(notices.into());
        self
    }
}
