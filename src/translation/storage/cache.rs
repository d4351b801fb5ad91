//! 页面缓存
//!
//! 以 `(URL摘要, 语言)` 为键，持久化保存最终渲染好的页面标记。
//! 摘要为规范URL的 SHA-256 十六进制串（64个字符）。
//!
//! 写入在单个 redb 写事务中完成：先查找再插入或覆盖，redb 串行化写事务，
//! 并发的同键写入不会损坏数据，最后提交的一方生效。

use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use redb::backends::InMemoryBackend;
use redb::{Database, ReadableTable, ReadableTableMetadata, StorageBackend, TableDefinition};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// 键：(url_hash, language)；值：(url, content, last_updated 秒级时间戳)
const TRANSLATED_PAGES: TableDefinition<(&str, &str), (&str, &str, i64)> =
    TableDefinition::new("translated_pages");

/// 页面缓存错误
#[derive(Error, Debug)]
pub enum PageCacheError {
    #[error("缓存存储错误: {0}")]
    Storage(#[from] redb::Error),
}

impl From<redb::DatabaseError> for PageCacheError {
    fn from(error: redb::DatabaseError) -> Self {
        PageCacheError::Storage(error.into())
    }
}

pub type PageCacheResult<T> = Result<T, PageCacheError>;

/// 缓存中的一行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPage {
    pub url_hash: String,
    pub url: String,
    pub language: String,
    pub content: String,
    pub last_updated: DateTime<Utc>,
}

/// 将内容标识解析为规范URL
///
/// 内容编辑事件只知道内容的标识（例如文章ID），由实现者给出受影响的URL。
pub trait ContentUrlResolver {
    fn urls_for_content(&self, content_id: &str) -> Vec<String>;
}

impl<F> ContentUrlResolver for F
where
    F: Fn(&str) -> Vec<String>,
{
    fn urls_for_content(&self, content_id: &str) -> Vec<String> {
        self(content_id)
    }
}

/// 基于 redb 的页面缓存
pub struct PageCache {
    db: Database,
}

/// 计算规范URL的摘要
pub fn url_hash(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl PageCache {
    /// 打开（或创建）磁盘上的缓存数据库
    pub fn open<P: AsRef<Path>>(path: P) -> PageCacheResult<Self> {
        let db = Database::create(path.as_ref())?;
        Self::with_database(db)
    }

    /// 仅存在于内存中的缓存
    pub fn in_memory() -> PageCacheResult<Self> {
        Self::with_backend(InMemoryBackend::new())
    }

    /// 使用自定义存储后端
    pub fn with_backend<B: StorageBackend>(backend: B) -> PageCacheResult<Self> {
        let db = Database::builder().create_with_backend(backend)?;
        Self::with_database(db)
    }

    fn with_database(db: Database) -> PageCacheResult<Self> {
        ensure_table(&db)?;
        Ok(PageCache { db })
    }

    /// 读取缓存内容
    pub fn get(&self, url: &str, language: &str) -> PageCacheResult<Option<String>> {
        Ok(self.get_page(url, language)?.map(|page| page.content))
    }

    /// 读取完整的缓存行
    pub fn get_page(&self, url: &str, language: &str) -> PageCacheResult<Option<CachedPage>> {
        let hash = url_hash(url);
        Ok(read_row(&self.db, &hash, language)?)
    }

    /// 插入或覆盖缓存内容
    pub fn set(&self, url: &str, language: &str, content: &str) -> PageCacheResult<()> {
        let hash = url_hash(url);
        let now = Utc::now().timestamp();
        let replaced = upsert_row(&self.db, &hash, language, url, content, now)?;

        if replaced {
            tracing::debug!("更新页面缓存: {} [{}]", url, language);
        } else {
            tracing::debug!("写入页面缓存: {} [{}]", url, language);
        }
        Ok(())
    }

    /// 删除某个URL在所有语言下的缓存，返回删除的行数
    pub fn invalidate(&self, url: &str) -> PageCacheResult<usize> {
        let hash = url_hash(url);
        let removed = remove_rows(&self.db, &hash)?;
        if removed > 0 {
            tracing::info!("已清除 {} 条页面缓存: {}", removed, url);
        }
        Ok(removed)
    }

    /// 按内容标识清除缓存
    pub fn invalidate_by_content_id(
        &self,
        content_id: &str,
        resolver: &dyn ContentUrlResolver,
    ) -> PageCacheResult<usize> {
        let mut removed = 0;
        for url in resolver.urls_for_content(content_id) {
            removed += self.invalidate(&url)?;
        }
        Ok(removed)
    }

    /// 缓存行总数
    pub fn len(&self) -> PageCacheResult<u64> {
        let read_txn = self.db.begin_read().map_err(redb::Error::from)?;
        let table = read_txn
            .open_table(TRANSLATED_PAGES)
            .map_err(redb::Error::from)?;
        Ok(table.len().map_err(redb::Error::from)?)
    }

    pub fn is_empty(&self) -> PageCacheResult<bool> {
        Ok(self.len()? == 0)
    }
}

fn ensure_table(db: &Database) -> Result<(), redb::Error> {
    let write_txn = db.begin_write()?;
    {
        write_txn.open_table(TRANSLATED_PAGES)?;
    }
    write_txn.commit()?;
    Ok(())
}

fn read_row(db: &Database, hash: &str, language: &str) -> Result<Option<CachedPage>, redb::Error> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(TRANSLATED_PAGES)?;

    let row = match table.get((hash, language))? {
        Some(guard) => {
            let (url, content, last_updated) = guard.value();
            Some(CachedPage {
                url_hash: hash.to_string(),
                url: url.to_string(),
                language: language.to_string(),
                content: content.to_string(),
                last_updated: Utc
                    .timestamp_opt(last_updated, 0)
                    .single()
                    .unwrap_or_default(),
            })
        }
        None => None,
    };
    Ok(row)
}

fn upsert_row(
    db: &Database,
    hash: &str,
    language: &str,
    url: &str,
    content: &str,
    timestamp: i64,
) -> Result<bool, redb::Error> {
    let write_txn = db.begin_write()?;
    let replaced = {
        let mut table = write_txn.open_table(TRANSLATED_PAGES)?;
        let previous = table.insert((hash, language), (url, content, timestamp))?;
        previous.is_some()
    };
    write_txn.commit()?;
    Ok(replaced)
}

fn remove_rows(db: &Database, hash: &str) -> Result<usize, redb::Error> {
    let write_txn = db.begin_write()?;
    let removed = {
        let mut table = write_txn.open_table(TRANSLATED_PAGES)?;

        let mut languages: Vec<String> = Vec::new();
        for entry in table.range((hash, "")..)? {
            let (key, _) = entry?;
            let (row_hash, language) = key.value();
            if row_hash != hash {
                break;
            }
            languages.push(language.to_string());
        }

        for language in &languages {
            table.remove((hash, language.as_str()))?;
        }
        languages.len()
    };
    write_txn.commit()?;
    Ok(removed)
}
