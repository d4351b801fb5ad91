//! 页面缓存集成测试
//!
//! 测试请求入口的缓存状态机和磁盘持久化

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use redb::backends::InMemoryBackend;
use redb::StorageBackend;
use transpage::translation::storage::{url_hash, ContentUrlResolver};
use transpage::{PageCache, RequestContext, TranslationRenderer};

#[allow(dead_code)]
mod common {
    include!("common/mod.rs");
}

use common::{cached_renderer, french_store, page, site_settings, CallCounter, CountingStore};

fn french(url: &str) -> RequestContext {
    RequestContext::new(url, "fr")
}

#[test]
fn test_set_get_invalidate() {
    let cache = PageCache::in_memory().unwrap();
    cache.set("https://site/x", "fr", "<html>A</html>").unwrap();
    assert_eq!(
        cache.get("https://site/x", "fr").unwrap().as_deref(),
        Some("<html>A</html>")
    );

    assert_eq!(cache.invalidate("https://site/x").unwrap(), 1);
    assert_eq!(cache.get("https://site/x", "fr").unwrap(), None);
}

#[test]
fn test_second_request_is_served_from_cache() {
    let store = CountingStore::new(french_store());
    let lookups = store.lookups.clone();
    let renderer = cached_renderer(store);
    let ctx = french("https://site.test/fr/");
    let produced = CallCounter::new();

    let first = renderer.handle_request(&ctx, produced.producer(&page("<p>Hello</p>")));
    assert_eq!(first, page("<p>Bonjour</p>"));
    assert_eq!(produced.count(), 1);
    assert_eq!(lookups.count(), 1);

    let second = renderer.handle_request(&ctx, produced.producer(&page("<p>Changed</p>")));
    assert_eq!(second, first);
    assert_eq!(produced.count(), 1);
    assert_eq!(lookups.count(), 1);
}

#[test]
fn test_languages_are_cached_separately() {
    let renderer = cached_renderer(french_store());
    let produced = CallCounter::new();
    let url = "https://site.test/page";

    renderer.handle_request(&french(url), produced.producer("<p>Hello</p>"));
    let english = RequestContext::new(url, "en");
    let html = renderer.handle_request(&english, produced.producer("<p>Hello</p>"));

    assert_eq!(html, "<p>Hello</p>");
    assert_eq!(produced.count(), 2);

    let cache = renderer.cache().unwrap();
    assert_eq!(cache.len().unwrap(), 2);
    assert_eq!(cache.get(url, "fr").unwrap().as_deref(), Some("<p>Bonjour</p>"));
}

#[test]
fn test_preview_and_admin_requests_are_not_cached() {
    let renderer = cached_renderer(french_store());
    let produced = CallCounter::new();

    let preview = french("https://site.test/fr/").with_preview(true);
    renderer.handle_request(&preview, produced.producer("<p>Hello</p>"));

    let admin = french("https://site.test/wp-admin/").with_admin(true);
    let html = renderer.handle_request(&admin, produced.producer("<p>Hello</p>"));
    assert_eq!(html, "<p>Hello</p>");

    assert_eq!(produced.count(), 2);
    assert!(renderer.cache().unwrap().is_empty().unwrap());
}

#[test]
fn test_preview_request_ignores_cached_page() {
    let renderer = cached_renderer(french_store());
    let produced = CallCounter::new();
    let url = "https://site.test/fr/";

    renderer.handle_request(&french(url), produced.producer("<p>Hello</p>"));
    let html = renderer.handle_request(
        &french(url).with_preview(true),
        produced.producer("<p>Hello</p>"),
    );

    assert_eq!(produced.count(), 2);
    assert!(html.contains("translate-press"));
}

#[test]
fn test_unparsable_fallback_is_not_cached() {
    let settings = transpage::translation::RenderSettings {
        max_document_size: 4,
        ..site_settings()
    };
    let renderer =
        TranslationRenderer::new(settings, french_store()).with_cache(PageCache::in_memory().unwrap());
    let produced = CallCounter::new();
    let ctx = french("https://site.test/fr/");

    renderer.handle_request(&ctx, produced.producer("<p>Hello</p>"));
    renderer.handle_request(&ctx, produced.producer("<p>Hello</p>"));

    assert_eq!(produced.count(), 2);
    assert!(renderer.cache().unwrap().is_empty().unwrap());
}

#[test]
fn test_cached_content_includes_final_hook_output() {
    let mut renderer = cached_renderer(french_store());
    renderer
        .hooks_mut()
        .on_translated_html(|content, _| Some(format!("{}<!-- rendered -->", content)));
    let ctx = french("https://site.test/fr/");

    let html = renderer.handle_request(&ctx, || "<p>Hello</p>".to_string());
    assert_eq!(html, "<p>Bonjour</p><!-- rendered -->");
    assert_eq!(
        renderer.cache().unwrap().get(&ctx.url, "fr").unwrap().as_deref(),
        Some("<p>Bonjour</p><!-- rendered -->")
    );
}

#[test]
fn test_on_disk_cache_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pages.redb");

    {
        let cache = PageCache::open(&path).unwrap();
        cache.set("https://site.test/a", "fr", "<p>A</p>").unwrap();
        cache.set("https://site.test/a", "fr", "<p>A2</p>").unwrap();
    }

    let cache = PageCache::open(&path).unwrap();
    let row = cache.get_page("https://site.test/a", "fr").unwrap().unwrap();
    assert_eq!(row.content, "<p>A2</p>");
    assert_eq!(row.url, "https://site.test/a");
    assert_eq!(row.url_hash, url_hash("https://site.test/a"));
    assert_eq!(row.url_hash.len(), 64);
    assert_eq!(cache.len().unwrap(), 1);
}

#[test]
fn test_renderer_opens_cache_from_settings() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("pages.redb");
    let settings = transpage::translation::RenderSettings {
        cache_path: Some(path.to_string_lossy().into_owned()),
        ..site_settings()
    };

    let renderer = TranslationRenderer::from_settings(settings, french_store()).unwrap();
    let ctx = french("https://site.test/fr/");
    renderer.handle_request(&ctx, || "<p>Hello</p>".to_string());
    drop(renderer);

    let cache = PageCache::open(&path).unwrap();
    assert_eq!(cache.get(&ctx.url, "fr").unwrap().as_deref(), Some("<p>Bonjour</p>"));
}

struct PostUrls;

impl ContentUrlResolver for PostUrls {
    fn urls_for_content(&self, content_id: &str) -> Vec<String> {
        vec![
            format!("https://site.test/?p={}", content_id),
            format!("https://site.test/fr/?p={}", content_id),
        ]
    }
}

#[test]
fn test_invalidate_by_content_id() {
    let cache = PageCache::in_memory().unwrap();
    cache.set("https://site.test/?p=7", "en", "a").unwrap();
    cache.set("https://site.test/fr/?p=7", "fr", "b").unwrap();
    cache.set("https://site.test/?p=8", "en", "c").unwrap();

    assert_eq!(cache.invalidate_by_content_id("7", &PostUrls).unwrap(), 2);
    assert_eq!(cache.len().unwrap(), 1);

    let by_closure = |id: &str| vec![format!("https://site.test/?p={}", id)];
    assert_eq!(cache.invalidate_by_content_id("8", &by_closure).unwrap(), 1);
    assert!(cache.is_empty().unwrap());
}

/// 可切换为全部IO失败的内存后端
#[derive(Debug)]
struct FailingBackend {
    inner: InMemoryBackend,
    failing: Arc<AtomicBool>,
}

impl FailingBackend {
    fn check(&self) -> Result<(), io::Error> {
        if self.failing.load(Ordering::SeqCst) {
            Err(io::Error::new(io::ErrorKind::Other, "disk unavailable"))
        } else {
            Ok(())
        }
    }
}

impl StorageBackend for FailingBackend {
    fn len(&self) -> Result<u64, io::Error> {
        self.inner.len()
    }

    fn read(&self, offset: u64, len: usize) -> Result<Vec<u8>, io::Error> {
        self.check()?;
        self.inner.read(offset, len)
    }

    fn set_len(&self, len: u64) -> Result<(), io::Error> {
        self.check()?;
        self.inner.set_len(len)
    }

    fn sync_data(&self, eventual: bool) -> Result<(), io::Error> {
        self.check()?;
        self.inner.sync_data(eventual)
    }

    fn write(&self, offset: u64, data: &[u8]) -> Result<(), io::Error> {
        self.check()?;
        self.inner.write(offset, data)
    }
}

#[test]
fn test_cache_failures_do_not_interrupt_rendering() {
    let failing = Arc::new(AtomicBool::new(false));
    let cache = PageCache::with_backend(FailingBackend {
        inner: InMemoryBackend::new(),
        failing: failing.clone(),
    })
    .unwrap();
    let renderer = TranslationRenderer::new(site_settings(), french_store()).with_cache(cache);
    let produced = CallCounter::new();
    let ctx = french("https://site.test/fr/");

    failing.store(true, Ordering::SeqCst);

    // 写入失败被吸收，响应照常返回
    let first = renderer.handle_request(&ctx, produced.producer("<p>Hello</p>"));
    assert_eq!(first, "<p>Bonjour</p>");

    // 读取失败按未命中处理
    let second = renderer.handle_request(&ctx, produced.producer("<p>Hello</p>"));
    assert_eq!(second, "<p>Bonjour</p>");
    assert_eq!(produced.count(), 2);
}

#[test]
fn test_unreadable_cache_file_renders_without_cache() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pages.redb");
    std::fs::write(&path, vec![0x5a; 8192]).unwrap();

    let settings = transpage::translation::RenderSettings {
        cache_path: Some(path.to_string_lossy().into_owned()),
        ..site_settings()
    };
    let renderer = TranslationRenderer::from_settings(settings, french_store()).unwrap();
    assert!(renderer.cache().is_none());

    let html = renderer.handle_request(&french("https://site.test/fr/"), || {
        "<p>Hello</p>".to_string()
    });
    assert_eq!(html, "<p>Bonjour</p>");
}
