//! 站点URL与语言路径段的转换
//!
//! 所有判断都以配置中的站点地址为基准：同主机的链接属于本站，
//! 本站路径中紧跟站点路径之后的第一段若是某个语言的路径段，该链接就带有语言。

use percent_encoding::percent_decode_str;
pub use url::Url;

use crate::translation::config::RenderSettings;

/// 不视为文件资源的扩展名
const PAGE_EXTENSIONS: &[&str] = &["php", "html", "htm", "asp", "aspx", "jsp"];

/// 以站点地址为基准解析绝对或协议相对的URL
pub fn parse_absolute(url: &str, home: Option<&Url>) -> Option<Url> {
    if let Some(rest) = url.strip_prefix("//") {
        let scheme = home.map(Url::scheme).unwrap_or("http");
        return Url::parse(&format!("{}://{}", scheme, rest)).ok();
    }
    Url::parse(url).ok()
}

/// 将路径分成路径本身和查询/片段部分
fn split_path(url: &str) -> (&str, &str) {
    match url.find(['?', '#']) {
        Some(index) => url.split_at(index),
        None => (url, ""),
    }
}

/// URL转换器
pub struct UrlConverter<'a> {
    settings: &'a RenderSettings,
    home: Option<Url>,
}

impl<'a> UrlConverter<'a> {
    pub fn new(settings: &'a RenderSettings) -> Self {
        Self {
            settings,
            home: Url::parse(&settings.home_url).ok(),
        }
    }

    /// 站点地址的路径部分，不带末尾斜杠
    fn home_path(&self) -> &str {
        self.home
            .as_ref()
            .map(|home| home.path().trim_end_matches('/'))
            .unwrap_or("")
    }

    fn home_host(&self) -> Option<&str> {
        self.home.as_ref().and_then(Url::host_str)
    }

    /// 主机与站点不同的链接
    pub fn is_external_link(&self, url: &str) -> bool {
        let Some(parsed) = parse_absolute(url.trim(), self.home.as_ref()) else {
            return false;
        };
        match (parsed.host_str(), self.home_host()) {
            (Some(host), Some(home)) => !host.eq_ignore_ascii_case(home),
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// 后台或登录页链接
    pub fn is_admin_link(&self, url: &str) -> bool {
        let local = self.maybe_is_local_url(url);
        local.contains(&self.settings.admin_url()) || local.contains(&self.settings.login_url())
    }

    /// 指向文件资源（带有非页面扩展名）的链接
    pub fn url_is_file(&self, url: &str) -> bool {
        let url = url.trim();
        let path = match parse_absolute(url, self.home.as_ref()) {
            Some(parsed) if parsed.cannot_be_a_base() => return false,
            Some(parsed) => parsed.path().to_string(),
            None => split_path(url).0.to_string(),
        };

        let Some(file_name) = path.rsplit('/').next() else {
            return false;
        };
        match file_name.rsplit_once('.') {
            Some((stem, extension)) => {
                !stem.is_empty()
                    && !extension.is_empty()
                    && extension.chars().all(|c| c.is_ascii_alphanumeric())
                    && !PAGE_EXTENSIONS.contains(&extension.to_ascii_lowercase().as_str())
            }
            None => false,
        }
    }

    /// 将站内相对链接补全为绝对地址，其余链接原样返回
    pub fn maybe_is_local_url(&self, url: &str) -> String {
        let trimmed = url.trim();
        if trimmed.is_empty()
            || trimmed.starts_with('#')
            || parse_absolute(trimmed, self.home.as_ref()).is_some()
        {
            return trimmed.to_string();
        }
        match self.home.as_ref().map(|home| home.join(trimmed)) {
            Some(Ok(joined)) => joined.to_string(),
            _ => trimmed.to_string(),
        }
    }

    /// 站内链接的本站相对路径（去掉站点路径前缀）
    fn site_relative_path(&self, url: &str) -> Option<String> {
        if self.is_external_link(url) {
            return None;
        }
        let parsed = parse_absolute(&self.maybe_is_local_url(url), self.home.as_ref())?;
        if parsed.cannot_be_a_base() {
            return None;
        }
        parsed
            .path()
            .strip_prefix(self.home_path())
            .map(str::to_string)
    }

    /// 链接路径中携带的语言
    pub fn get_lang_from_url_string(&self, url: &str) -> Option<String> {
        let path = self.site_relative_path(url)?;
        let segment = path.trim_start_matches('/').split('/').next()?;
        if segment.is_empty() {
            return None;
        }
        let segment = percent_decode_str(segment).decode_utf8_lossy();

        self.settings
            .translation_languages
            .iter()
            .find(|language| {
                self.settings
                    .url_slug(language)
                    .eq_ignore_ascii_case(segment.as_ref())
            })
            .cloned()
    }

    /// 链接语言与当前语言不同；不带语言段的链接视为默认语言
    pub fn is_different_language(&self, url: &str, current_language: &str) -> bool {
        let language = self
            .get_lang_from_url_string(url)
            .unwrap_or_else(|| self.settings.default_language.clone());
        language != current_language
    }

    /// 在站点路径之后插入语言路径段
    ///
    /// 绝对地址保持绝对，以 `/` 开头的相对地址保持相对；已有的语言段会被替换。
    /// 其他形式的链接原样返回。
    pub fn get_url_for_language(&self, language: &str, url: &str) -> String {
        let trimmed = url.trim();
        if self.is_external_link(trimmed) {
            return trimmed.to_string();
        }

        if let Some(mut parsed) = parse_absolute(trimmed, self.home.as_ref()) {
            if parsed.cannot_be_a_base() || parsed.host_str().is_none() {
                return trimmed.to_string();
            }
            match self.localize_path(language, parsed.path()) {
                Some(path) => parsed.set_path(&path),
                None => return trimmed.to_string(),
            }
            return parsed.to_string();
        }

        if !trimmed.starts_with('/') {
            return trimmed.to_string();
        }
        let (path, rest) = split_path(trimmed);
        match self.localize_path(language, path) {
            Some(path) => format!("{}{}", path, rest),
            None => trimmed.to_string(),
        }
    }

    fn localize_path(&self, language: &str, path: &str) -> Option<String> {
        let home_path = self.home_path();
        let remainder = path.strip_prefix(home_path)?;
        if !remainder.is_empty() && !remainder.starts_with('/') {
            return None;
        }

        let mut segments: Vec<&str> = remainder.trim_start_matches('/').split('/').collect();
        let has_language = segments.first().is_some_and(|first| {
            let first = percent_decode_str(first).decode_utf8_lossy();
            self.settings.translation_languages.iter().any(|l| {
                !first.is_empty() && self.settings.url_slug(l).eq_ignore_ascii_case(first.as_ref())
            })
        });
        if has_language {
            segments.remove(0);
        }

        let add_segment = language != self.settings.default_language
            || self.settings.add_subdirectory_to_default_language;

        let mut localized = home_path.to_string();
        if add_segment {
            localized.push('/');
            localized.push_str(self.settings.url_slug(language));
        }
        let tail = segments.join("/");
        localized.push('/');
        localized.push_str(&tail);
        Some(localized)
    }
}
