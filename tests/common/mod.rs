// 集成测试公共模块
//
// 提供测试辅助工具和共享功能

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use transpage::translation::config::RenderSettings;
use transpage::translation::lookup::{MemoryTranslationStore, TranslationBlock, TranslationStore};
use transpage::{PageCache, RenderResult, TranslationRenderer};

/// 英语默认、法语已发布的站点配置
pub fn site_settings() -> RenderSettings {
    RenderSettings {
        default_language: "en".to_string(),
        translation_languages: vec!["en".to_string(), "fr".to_string()],
        home_url: "https://site.test".to_string(),
        ..Default::default()
    }
}

/// 常用的法语译文
pub fn french_store() -> MemoryTranslationStore {
    MemoryTranslationStore::new()
        .with_translation("fr", "Hello", "Bonjour")
        .with_translation("fr", "world", "monde")
        .with_translation("fr", "About", "À propos")
        .with_translation("fr", "Search", "Rechercher")
}

/// 把正文包装成完整文档
pub fn page(body: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><title>Site</title></head><body>{}</body></html>",
        body
    )
}

/// 带内存缓存的渲染器
pub fn cached_renderer(store: impl TranslationStore + 'static) -> TranslationRenderer {
    let cache = PageCache::in_memory().expect("in-memory cache");
    TranslationRenderer::new(site_settings(), store).with_cache(cache)
}

/// 调用计数器
#[derive(Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    /// 返回固定响应体并计数的生成函数
    pub fn producer(&self, body: &str) -> impl FnOnce() -> String {
        let counter = self.clone();
        let body = body.to_string();
        move || {
            counter.hit();
            body
        }
    }
}

/// 记录查询次数的译文存储
pub struct CountingStore {
    inner: MemoryTranslationStore,
    pub lookups: CallCounter,
    pub block_reads: CallCounter,
}

impl CountingStore {
    pub fn new(inner: MemoryTranslationStore) -> Self {
        Self {
            inner,
            lookups: CallCounter::new(),
            block_reads: CallCounter::new(),
        }
    }
}

impl TranslationStore for CountingStore {
    fn get_all_blocks(&self, language: &str) -> RenderResult<Vec<TranslationBlock>> {
        self.block_reads.hit();
        self.inner.get_all_blocks(language)
    }

    fn lookup(&self, strings: &[String], language: &str) -> RenderResult<HashMap<usize, String>> {
        self.lookups.hit();
        self.inner.lookup(strings, language)
    }

    fn get_string_ids(
        &self,
        strings: &[String],
        language: &str,
    ) -> RenderResult<HashMap<String, u64>> {
        self.inner.get_string_ids(strings, language)
    }
}
