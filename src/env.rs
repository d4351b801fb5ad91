//! 环境变量管理
//!
//! 提供类型安全、可验证的环境变量访问。配置文件中的字段同样可以通过
//! `TRANSPAGE_*` 覆盖（见 `translation::config`），这里只列出进程级变量。

use std::env;
use std::fmt;
use std::path::PathBuf;

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DEFAULT: Option<T>;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    fn get() -> EnvResult<T> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value),
            Err(_) => {
                if let Some(default) = Self::DEFAULT {
                    Ok(default)
                } else {
                    Err(EnvError {
                        variable: Self::NAME.to_string(),
                        message: "Required environment variable not set".to_string(),
                    })
                }
            }
        }
    }

    fn get_or_default(default: T) -> T {
        Self::get().unwrap_or(default)
    }
}

/// 日志级别
pub struct LogLevel;
impl EnvVar<String> for LogLevel {
    const NAME: &'static str = "TRANSPAGE_LOG_LEVEL";
    const DEFAULT: Option<String> = None;
    const DESCRIPTION: &'static str = "Log level: trace, debug, info, warn, error";

    fn get() -> EnvResult<String> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value),
            Err(_) => Ok("info".to_string()),
        }
    }

    fn parse(value: &str) -> EnvResult<String> {
        match value.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(value.to_lowercase()),
            _ => Err(EnvError {
                variable: Self::NAME.to_string(),
                message: format!(
                    "Invalid log level '{}'. Use: trace, debug, info, warn, error",
                    value
                ),
            }),
        }
    }
}

/// 配置文件路径
pub struct ConfigPath;
impl EnvVar<PathBuf> for ConfigPath {
    const NAME: &'static str = "TRANSPAGE_CONFIG";
    const DEFAULT: Option<PathBuf> = None;
    const DESCRIPTION: &'static str = "Path to the TOML settings file";

    fn parse(value: &str) -> EnvResult<PathBuf> {
        parse_path(value, Self::NAME)
    }
}

/// 页面缓存数据库路径
pub struct CachePath;
impl EnvVar<PathBuf> for CachePath {
    const NAME: &'static str = "TRANSPAGE_CACHE_PATH";
    const DEFAULT: Option<PathBuf> = None;
    const DESCRIPTION: &'static str = "Location of the page cache database";

    fn parse(value: &str) -> EnvResult<PathBuf> {
        parse_path(value, Self::NAME)
    }
}

fn parse_path(value: &str, var_name: &str) -> EnvResult<PathBuf> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: "Path must not be empty".to_string(),
        });
    }

    let expanded = shellexpand::full(trimmed).map_err(|e| EnvError {
        variable: var_name.to_string(),
        message: format!("Cannot expand path '{}': {}", trimmed, e),
    })?;
    Ok(PathBuf::from(expanded.as_ref()))
}

/// 环境变量文档
pub fn generate_env_docs() -> String {
    let mut docs = String::new();
    docs.push_str("# Environment Variables\n\n");
    docs.push_str(&format!(
        "- `{}`: {} (default: info)\n",
        LogLevel::NAME,
        LogLevel::DESCRIPTION
    ));
    docs.push_str(&format!(
        "- `{}`: {}\n",
        ConfigPath::NAME,
        ConfigPath::DESCRIPTION
    ));
    docs.push_str(&format!(
        "- `{}`: {}\n",
        CachePath::NAME,
        CachePath::DESCRIPTION
    ));
    docs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::parse("DEBUG").unwrap(), "debug");
        assert_eq!(LogLevel::parse("warn").unwrap(), "warn");
        assert!(LogLevel::parse("verbose").is_err());
    }

    #[test]
    fn test_path_parsing() {
        assert_eq!(
            CachePath::parse(" /tmp/pages.redb ").unwrap(),
            PathBuf::from("/tmp/pages.redb")
        );
        assert!(ConfigPath::parse("   ").is_err());
    }

    #[test]
    fn test_env_docs_lists_all_variables() {
        let docs = generate_env_docs();
        assert!(docs.contains("TRANSPAGE_LOG_LEVEL"));
        assert!(docs.contains("TRANSPAGE_CONFIG"));
        assert!(docs.contains("TRANSPAGE_CACHE_PATH"));
    }
}
