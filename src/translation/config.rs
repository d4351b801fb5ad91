//! 渲染配置
//!
//! 配置来源按优先级从低到高：内置默认值、可选的 TOML 文件、`TRANSPAGE_*` 环境变量。
//! 嵌套字段在环境变量中使用双下划线分隔，例如
//! `TRANSPAGE_MERGE_RULES__TOP_PARENTS`。

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::translation::error::{RenderError, RenderResult};

/// 渲染配置常量
pub mod constants {
    /// 标记为免翻译的属性
    pub const NO_TRANSLATE_ATTRIBUTE: &str = "data-no-translation";

    /// 已匹配翻译块的类名
    pub const TRANSLATION_BLOCK_CLASS: &str = "translation-block";

    /// 默认的免翻译选择器
    pub const DEFAULT_NO_TRANSLATE_SELECTORS: &[&str] = &["#wpadminbar"];

    /// 可以作为合并块根节点的标签
    pub const DEFAULT_TOP_PARENTS: &[&str] = &[
        "p", "div", "li", "ol", "ul", "dl", "h1", "h2", "h3", "h4", "h5", "h6", "body", "footer",
        "article", "main", "iframe", "section", "figure", "figcaption", "blockquote", "cite", "tr",
        "td", "th", "table", "label",
    ];

    pub const DEFAULT_LANGUAGE: &str = "en";
    pub const DEFAULT_HOME_URL: &str = "http://localhost";
    pub const DEFAULT_MAX_DOCUMENT_SIZE: usize = 16 * 1024 * 1024;

    pub const CONFIG_PATHS: &[&str] = &[
        "transpage.toml",
        ".transpage.toml",
        "~/.config/transpage/config.toml",
    ];
}

/// 合并块规则
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct MergeRules {
    pub top_parents: BTreeSet<String>,
}

impl Default for MergeRules {
    fn default() -> Self {
        Self {
            top_parents: constants::DEFAULT_TOP_PARENTS
                .iter()
                .map(|tag| tag.to_string())
                .collect(),
        }
    }
}

impl MergeRules {
    pub fn is_top_parent(&self, tag: &str) -> bool {
        self.top_parents.contains(tag)
    }
}

/// 节点访问器：描述从哪里读取、往哪里写回一种可翻译内容
///
/// 没有选择器的访问器（`text`、`block`、`button`、`option`）只在替换阶段使用。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NodeAccessor {
    pub key: String,
    #[serde(default)]
    pub selector: Option<String>,
    pub accessor: String,
    #[serde(default)]
    pub attribute: bool,
}

impl NodeAccessor {
    fn new(key: &str, selector: Option<&str>, accessor: &str, attribute: bool) -> Self {
        Self {
            key: key.to_string(),
            selector: selector.map(str::to_string),
            accessor: accessor.to_string(),
            attribute,
        }
    }
}

/// 默认的节点访问器表，顺序决定属性候选的提取顺序
pub fn default_node_accessors() -> Vec<NodeAccessor> {
    vec![
        NodeAccessor::new("text", None, "outertext", false),
        NodeAccessor::new("block", None, "innertext", false),
        NodeAccessor::new("button", None, "outertext", false),
        NodeAccessor::new("option", None, "innertext", false),
        NodeAccessor::new("image_src", Some("img[src]"), "src", true),
        NodeAccessor::new(
            "submit",
            Some("input[type='submit'],input[type='button']"),
            "value",
            true,
        ),
        NodeAccessor::new(
            "placeholder",
            Some("input[placeholder],textarea[placeholder]"),
            "placeholder",
            true,
        ),
        NodeAccessor::new("title", Some("[title]"), "title", true),
        NodeAccessor::new("a_href", Some("a[href]"), "href", true),
        NodeAccessor::new("aria_label", Some("[aria-label]"), "aria-label", true),
        NodeAccessor::new("image_alt", Some("img[alt]"), "alt", true),
        NodeAccessor::new(
            "meta_desc",
            Some(
                "meta[name='description'],meta[property='og:title'],meta[property='og:site_name'],\
                 meta[property='og:description'],meta[name='twitter:title'],\
                 meta[name='twitter:description']",
            ),
            "content",
            true,
        ),
        NodeAccessor::new("page_title", Some("title"), "innertext", false),
        NodeAccessor::new("video_src", Some("video[src]"), "src", true),
        NodeAccessor::new("audio_src", Some("audio[src]"), "src", true),
    ]
}

/// 渲染配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RenderSettings {
    /// 站点默认语言
    pub default_language: String,

    /// 已发布的语言，包括默认语言
    pub translation_languages: Vec<String>,

    /// 每种语言在URL中的路径段
    pub url_slugs: BTreeMap<String, String>,

    /// 为站内自定义链接强制加上当前语言
    pub force_language_to_custom_links: bool,

    /// 默认语言同样使用语言路径段
    pub add_subdirectory_to_default_language: bool,

    pub home_url: String,
    pub admin_url: Option<String>,
    pub login_url: Option<String>,

    pub merge_rules: MergeRules,
    pub node_accessors: Vec<NodeAccessor>,
    pub no_translate_selectors: Vec<String>,

    /// 解析器接受的最大文档字节数
    pub max_document_size: usize,

    /// 页面缓存数据库路径，未设置时不启用磁盘缓存
    pub cache_path: Option<String>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            default_language: constants::DEFAULT_LANGUAGE.to_string(),
            translation_languages: vec![constants::DEFAULT_LANGUAGE.to_string()],
            url_slugs: BTreeMap::new(),
            force_language_to_custom_links: true,
            add_subdirectory_to_default_language: false,
            home_url: constants::DEFAULT_HOME_URL.to_string(),
            admin_url: None,
            login_url: None,
            merge_rules: MergeRules::default(),
            node_accessors: default_node_accessors(),
            no_translate_selectors: constants::DEFAULT_NO_TRANSLATE_SELECTORS
                .iter()
                .map(|selector| selector.to_string())
                .collect(),
            max_document_size: constants::DEFAULT_MAX_DOCUMENT_SIZE,
            cache_path: None,
        }
    }
}

impl RenderSettings {
    /// 加载配置
    ///
    /// 指定了 `path` 时该文件必须存在，否则按 `constants::CONFIG_PATHS` 查找第一个存在的文件。
    pub fn load(path: Option<&Path>) -> RenderResult<Self> {
        let mut builder = Config::builder();

        match path {
            Some(path) => {
                builder = builder.add_source(File::from(path).required(true));
                tracing::info!("加载配置文件: {}", path.display());
            }
            None => {
                for candidate in constants::CONFIG_PATHS {
                    let expanded_path = shellexpand::tilde(candidate);
                    if Path::new(expanded_path.as_ref()).exists() {
                        builder = builder.add_source(File::with_name(&expanded_path));
                        tracing::info!("加载配置文件: {}", expanded_path);
                        break;
                    }
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("TRANSPAGE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("translation_languages")
                .with_list_parse_key("no_translate_selectors"),
        );

        let mut settings: RenderSettings = builder.build()?.try_deserialize()?;
        settings.expand_cache_path()?;
        settings.validate()?;

        Ok(settings)
    }

    fn expand_cache_path(&mut self) -> RenderResult<()> {
        if let Some(path) = &self.cache_path {
            let expanded = shellexpand::full(path)
                .map_err(|e| RenderError::Config(format!("无法展开缓存路径 {}: {}", path, e)))?;
            self.cache_path = Some(expanded.into_owned());
        }
        Ok(())
    }

    /// 校验配置的一致性
    pub fn validate(&self) -> RenderResult<()> {
        if self.default_language.trim().is_empty() {
            return Err(RenderError::Config("默认语言不能为空".to_string()));
        }
        if !self.is_configured_language(&self.default_language) {
            return Err(RenderError::Config(format!(
                "默认语言 {} 不在已发布语言列表中",
                self.default_language
            )));
        }
        if url::Url::parse(&self.home_url).is_err() {
            return Err(RenderError::Config(format!(
                "无效的站点地址: {}",
                self.home_url
            )));
        }
        if self.max_document_size == 0 {
            return Err(RenderError::Config("最大文档大小必须大于0".to_string()));
        }
        Ok(())
    }

    pub fn is_configured_language(&self, language: &str) -> bool {
        self.translation_languages.iter().any(|l| l == language)
    }

    /// 语言在URL中的路径段，未配置时使用语言代码本身
    pub fn url_slug<'a>(&'a self, language: &'a str) -> &'a str {
        self.url_slugs
            .get(language)
            .map(String::as_str)
            .unwrap_or(language)
    }

    /// 第一个非默认语言
    pub fn first_secondary_language(&self) -> Option<&str> {
        self.translation_languages
            .iter()
            .find(|l| **l != self.default_language)
            .map(String::as_str)
    }

    pub fn node_accessor(&self, key: &str) -> Option<&NodeAccessor> {
        self.node_accessors.iter().find(|accessor| accessor.key == key)
    }

    pub fn admin_url(&self) -> String {
        self.admin_url
            .clone()
            .unwrap_or_else(|| format!("{}/wp-admin/", self.home_url.trim_end_matches('/')))
    }

    pub fn login_url(&self) -> String {
        self.login_url
            .clone()
            .unwrap_or_else(|| format!("{}/wp-login.php", self.home_url.trim_end_matches('/')))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = RenderSettings::default();
        assert!(settings.validate().is_ok());
        assert!(settings.merge_rules.is_top_parent("p"));
        assert!(!settings.merge_rules.is_top_parent("span"));
        assert_eq!(settings.node_accessors.len(), 15);
        assert_eq!(settings.node_accessor("a_href").unwrap().accessor, "href");
        assert_eq!(settings.admin_url(), "http://localhost/wp-admin/");
    }

    #[test]
    fn test_url_slug_falls_back_to_code() {
        let mut settings = RenderSettings::default();
        settings
            .url_slugs
            .insert("fr_FR".to_string(), "fr".to_string());
        assert_eq!(settings.url_slug("fr_FR"), "fr");
        assert_eq!(settings.url_slug("de"), "de");
    }

    #[test]
    fn test_first_secondary_language() {
        let mut settings = RenderSettings::default();
        assert_eq!(settings.first_secondary_language(), None);
        settings.translation_languages = vec!["en".into(), "fr".into(), "de".into()];
        assert_eq!(settings.first_secondary_language(), Some("fr"));
    }

    #[test]
    fn test_validate_rejects_unlisted_default_language() {
        let settings = RenderSettings {
            default_language: "de".to_string(),
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(RenderError::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
default_language = "en"
translation_languages = ["en", "fr"]
home_url = "https://site.test"
cache_path = "~/transpage-cache.redb"

[url_slugs]
fr = "fr"

[merge_rules]
top_parents = ["p", "div"]
"#
        )
        .unwrap();

        let settings = RenderSettings::load(Some(file.path())).unwrap();
        assert_eq!(settings.translation_languages, vec!["en", "fr"]);
        assert_eq!(settings.home_url, "https://site.test");
        assert_eq!(settings.merge_rules.top_parents.len(), 2);
        assert!(!settings.cache_path.unwrap().starts_with('~'));
        // 未出现在文件中的字段保持默认值
        assert_eq!(settings.no_translate_selectors, vec!["#wpadminbar"]);
    }
}
