//! 渲染管道统一错误处理
//!
//! 大部分失败在管道内部被吸收（解析失败回退到文本清理、缓存失败视为未命中），
//! 这里的错误类型用于配置加载、存储访问和命令行等需要向调用方报告的边界。

use std::fmt;

use thiserror::Error;

use super::storage::PageCacheError;

/// 渲染错误类型
#[derive(Error, Debug)]
pub enum RenderError {
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 标记解析错误
    #[error("解析错误: {0}")]
    Parse(String),

    /// 译文存储错误
    #[error("译文存储错误: {0}")]
    Store(String),

    /// 页面缓存错误
    #[error("缓存错误: {0}")]
    Cache(#[from] PageCacheError),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    Serialization(String),

    /// IO错误
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Configuration,
    Parsing,
    Storage,
    Cache,
    Serialization,
    Io,
}

impl RenderError {
    /// 该错误是否可以在不中断响应的情况下被吸收
    pub fn is_recoverable(&self) -> bool {
        match self {
            RenderError::Parse(_) => true,
            RenderError::Store(_) => true,
            RenderError::Cache(_) => true,
            RenderError::Config(_) => false,
            RenderError::Serialization(_) => false,
            RenderError::Io(_) => false,
        }
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            RenderError::Config(_) => ErrorCategory::Configuration,
            RenderError::Parse(_) => ErrorCategory::Parsing,
            RenderError::Store(_) => ErrorCategory::Storage,
            RenderError::Cache(_) => ErrorCategory::Cache,
            RenderError::Serialization(_) => ErrorCategory::Serialization,
            RenderError::Io(_) => ErrorCategory::Io,
        }
    }

    /// 创建带上下文的错误
    pub fn with_context<T: fmt::Display>(self, context: T) -> Self {
        let attach = |message: String| format!("{} (上下文: {})", message, context);

        match self {
            RenderError::Config(message) => RenderError::Config(attach(message)),
            RenderError::Parse(message) => RenderError::Parse(attach(message)),
            RenderError::Store(message) => RenderError::Store(attach(message)),
            RenderError::Serialization(message) => RenderError::Serialization(attach(message)),
            other => other,
        }
    }
}

impl From<serde_json::Error> for RenderError {
    fn from(error: serde_json::Error) -> Self {
        RenderError::Serialization(format!("JSON序列化错误: {}", error))
    }
}

impl From<config::ConfigError> for RenderError {
    fn from(error: config::ConfigError) -> Self {
        RenderError::Config(error.to_string())
    }
}

impl From<crate::parsers::html::DomError> for RenderError {
    fn from(error: crate::parsers::html::DomError) -> Self {
        RenderError::Parse(error.to_string())
    }
}

/// 错误结果类型别名
pub type RenderResult<T> = Result<T, RenderError>;
