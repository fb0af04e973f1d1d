// In-memory collaborators for driving the pipeline without network or browser.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lopdf::{dictionary, Document, Object, Stream};

use site_archiver::crawler::browser::{BrowserEngine, BrowserSession, PageLayout, RenderSurface};
use site_archiver::crawler::errors::{CrawlerResult, RenderError, TransportError};
use site_archiver::crawler::transport::{FetchResponse, Transport};

/// Serves canned responses; unknown URLs fail like an unreachable host
#[derive(Default)]
pub struct MapTransport {
    responses: HashMap<String, FetchResponse>,
    requests: Mutex<Vec<String>>,
}

impl MapTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, status: u16, body: &str) -> Self {
        self.responses
            .insert(url.to_string(), FetchResponse::new(status, body));
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MapTransport {
    async fn fetch(&self, url: &str) -> CrawlerResult<FetchResponse> {
        self.requests.lock().unwrap().push(url.to_string());
        self.responses.get(url).cloned().ok_or_else(|| {
            TransportError::RequestFailed {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            }
            .into()
        })
    }
}

pub fn urlset(urls: &[&str]) -> String {
    let entries: String = urls
        .iter()
        .map(|u| format!("<url><loc>{}</loc></url>", u))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{}</urlset>"#,
        entries
    )
}

pub fn sitemap_index(urls: &[&str]) -> String {
    let entries: String = urls
        .iter()
        .map(|u| format!("<sitemap><loc>{}</loc></sitemap>", u))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{}</sitemapindex>"#,
        entries
    )
}

/// Counters and knobs shared by a fake engine and everything it hands out
#[derive(Default)]
pub struct BrowserState {
    pub launches: AtomicUsize,
    pub session_closes: AtomicUsize,
    pub surfaces_opened: AtomicUsize,
    pub surfaces_closed: AtomicUsize,
    pub navigations: Mutex<Vec<String>>,
    /// Remaining navigation failures per URL
    failures: Mutex<HashMap<String, usize>>,
    fail_launch: bool,
}

impl BrowserState {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().unwrap().clone()
    }
}

/// Browser that "prints" each page as a one-page PDF labelled with its URL
#[derive(Clone, Default)]
pub struct FakeEngine {
    pub state: Arc<BrowserState>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Navigation to `url` fails the next `times` attempts
    pub fn failing(url: &str, times: usize) -> Self {
        let engine = Self::new();
        engine.fail(url, times);
        engine
    }

    pub fn fail(&self, url: &str, times: usize) {
        self.state
            .failures
            .lock()
            .unwrap()
            .insert(url.to_string(), times);
    }

    pub fn unlaunchable() -> Self {
        Self {
            state: Arc::new(BrowserState {
                fail_launch: true,
                ..BrowserState::default()
            }),
        }
    }
}

#[async_trait]
impl BrowserEngine for FakeEngine {
    async fn launch(&self) -> CrawlerResult<Box<dyn BrowserSession>> {
        self.state.launches.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_launch {
            return Err(RenderError::LaunchFailed("no browser installed".to_string()).into());
        }
        Ok(Box::new(FakeSession {
            state: Arc::clone(&self.state),
        }))
    }
}

struct FakeSession {
    state: Arc<BrowserState>,
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn new_surface(&mut self) -> CrawlerResult<Box<dyn RenderSurface>> {
        self.state.surfaces_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSurface {
            state: Arc::clone(&self.state),
            url: None,
        }))
    }

    async fn close(&mut self) -> CrawlerResult<()> {
        self.state.session_closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FakeSurface {
    state: Arc<BrowserState>,
    url: Option<String>,
}

#[async_trait]
impl RenderSurface for FakeSurface {
    async fn navigate_and_wait_idle(&mut self, url: &str) -> CrawlerResult<()> {
        self.state.navigations.lock().unwrap().push(url.to_string());
        {
            let mut failures = self.state.failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(url) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(RenderError::NavigationFailed {
                        url: url.to_string(),
                        reason: "net::ERR_CONNECTION_RESET".to_string(),
                    }
                    .into());
                }
            }
        }
        self.url = Some(url.to_string());
        Ok(())
    }

    async fn export_fixed_layout(&mut self, path: &Path, _layout: PageLayout) -> CrawlerResult<()> {
        let url = self.url.clone().unwrap_or_default();
        write_pdf(path, &[&url]);
        Ok(())
    }

    async fn close(&mut self) -> CrawlerResult<()> {
        self.state.surfaces_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Write a PDF whose pages carry a `Label` entry so order can be checked
pub fn write_pdf(path: &Path, labels: &[&str]) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::new();
    for label in labels {
        let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            "Label" => Object::string_literal(*label),
        });
        kids.push(Object::Reference(page_id));
    }
    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

pub fn page_labels(path: &Path) -> Vec<String> {
    let doc = Document::load(path).unwrap();
    doc.get_pages()
        .into_values()
        .map(|id| {
            let page = doc.get_dictionary(id).unwrap();
            let label = page.get(b"Label").unwrap().as_str().unwrap();
            String::from_utf8_lossy(label).to_string()
        })
        .collect()
}
