// Browser capability used by the renderer, plus the Chromium backend.
// The backend honours CHROME_EXECUTABLE / render.chrome_executable and
// otherwise lets chromiumoxide find an installed Chrome or Chromium.
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::{EventLifecycleEvent, PrintToPdfParams};
use chromiumoxide::Page;
use futures::StreamExt;
use log::{debug, info, warn};
use tokio::task::JoinHandle;

use crate::crawler::config::RenderConfig;
use crate::crawler::errors::{CrawlerResult, RenderError};

/// Page size and margins of the fixed-layout export, in inches
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayout {
    pub width_in: f64,
    pub height_in: f64,
    pub margin_in: f64,
    pub print_background: bool,
}

impl PageLayout {
    pub fn from_config(render: &RenderConfig) -> Self {
        Self {
            width_in: render.paper_width_in,
            height_in: render.paper_height_in,
            margin_in: render.margin_in,
            print_background: render.print_background,
        }
    }

    fn to_print_params(self) -> PrintToPdfParams {
        PrintToPdfParams {
            paper_width: Some(self.width_in),
            paper_height: Some(self.height_in),
            margin_top: Some(self.margin_in),
            margin_bottom: Some(self.margin_in),
            margin_left: Some(self.margin_in),
            margin_right: Some(self.margin_in),
            print_background: Some(self.print_background),
            ..Default::default()
        }
    }
}

/// Starts one browser session for a run
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    async fn launch(&self) -> CrawlerResult<Box<dyn BrowserSession>>;
}

/// A live browser shared by every page render of a run
#[async_trait]
pub trait BrowserSession: Send {
    async fn new_surface(&mut self) -> CrawlerResult<Box<dyn RenderSurface>>;
    async fn close(&mut self) -> CrawlerResult<()>;
}

/// One tab, used for exactly one page
#[async_trait]
pub trait RenderSurface: Send {
    /// Navigate and wait until the page's network activity has gone idle
    async fn navigate_and_wait_idle(&mut self, url: &str) -> CrawlerResult<()>;
    async fn export_fixed_layout(&mut self, path: &Path, layout: PageLayout) -> CrawlerResult<()>;
    async fn close(&mut self) -> CrawlerResult<()>;
}

/// Headless Chromium driven over the DevTools protocol
pub struct ChromiumEngine {
    executable: Option<std::path::PathBuf>,
    idle_timeout: Duration,
}

impl ChromiumEngine {
    pub fn new(render: &RenderConfig) -> Self {
        Self {
            executable: render.resolved_chrome_executable(),
            idle_timeout: Duration::from_millis(render.idle_timeout_ms),
        }
    }

    fn browser_config(&self) -> CrawlerResult<BrowserConfig> {
        let flags = vec![
            String::from("--no-sandbox"),
            String::from("--disable-gpu"),
            String::from("--disable-dev-shm-usage"),
            String::from("--disable-extensions"),
            String::from("--disable-background-networking"),
        ];

        let mut builder = BrowserConfig::builder().args(flags);
        if let Some(exe) = &self.executable {
            info!("[browser] using Chromium at {}", exe.display());
            builder = builder.chrome_executable(exe.clone());
        }

        builder
            .build()
            .map_err(|e| RenderError::LaunchFailed(format!("invalid browser config: {}", e)).into())
    }
}

#[async_trait]
impl BrowserEngine for ChromiumEngine {
    async fn launch(&self) -> CrawlerResult<Box<dyn BrowserSession>> {
        let config = self.browser_config()?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| RenderError::LaunchFailed(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(r) = handler.next().await {
                if r.is_err() {
                    break;
                }
            }
        });

        info!("[browser] session started");
        Ok(Box::new(ChromiumSession {
            browser,
            handler_task: Some(handler_task),
            idle_timeout: self.idle_timeout,
        }))
    }
}

struct ChromiumSession {
    browser: Browser,
    handler_task: Option<JoinHandle<()>>,
    idle_timeout: Duration,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn new_surface(&mut self) -> CrawlerResult<Box<dyn RenderSurface>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| RenderError::SurfaceFailed(e.to_string()))?;
        Ok(Box::new(ChromiumSurface {
            page: Some(page),
            current_url: String::new(),
            idle_timeout: self.idle_timeout,
        }))
    }

    async fn close(&mut self) -> CrawlerResult<()> {
        let result = self.browser.close().await;
        if let Some(task) = self.handler_task.take() {
            if let Err(e) = task.await {
                warn!("[browser] handler task ended abnormally: {}", e);
            }
        }
        result.map_err(|e| RenderError::LaunchFailed(format!("close failed: {}", e)))?;
        info!("[browser] session closed");
        Ok(())
    }
}

struct ChromiumSurface {
    page: Option<Page>,
    current_url: String,
    idle_timeout: Duration,
}

impl ChromiumSurface {
    fn page(&self) -> CrawlerResult<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| RenderError::SurfaceFailed("page already closed".to_string()).into())
    }
}

#[async_trait]
impl RenderSurface for ChromiumSurface {
    async fn navigate_and_wait_idle(&mut self, url: &str) -> CrawlerResult<()> {
        let idle_timeout = self.idle_timeout;
        let page = self.page()?;
        let navigation_failed = |reason: String| RenderError::NavigationFailed {
            url: url.to_string(),
            reason,
        };

        // subscribe before navigating so no lifecycle event is missed
        let main_frame = page
            .mainframe()
            .await
            .map_err(|e| navigation_failed(e.to_string()))?;
        let mut lifecycle = page
            .event_listener::<EventLifecycleEvent>()
            .await
            .map_err(|e| navigation_failed(e.to_string()))?;
        page.goto(url)
            .await
            .map_err(|e| navigation_failed(e.to_string()))?;

        let mut tracker = IdleTracker::default();
        let settled = async {
            while let Some(event) = lifecycle.next().await {
                if main_frame.as_ref().is_some_and(|id| *id != event.frame_id) {
                    continue;
                }
                if tracker.observe(&event.name) {
                    return true;
                }
            }
            false
        };

        match tokio::time::timeout(idle_timeout, settled).await {
            Ok(true) => {}
            Ok(false) => {
                let reason = "page went away before network idle".to_string();
                return Err(navigation_failed(reason).into());
            }
            Err(_) => {
                return Err(navigation_failed(format!(
                    "network not idle after {:?}",
                    idle_timeout
                ))
                .into());
            }
        }

        debug!("[browser] loaded {} (network idle)", url);
        self.current_url = url.to_string();
        Ok(())
    }

    async fn export_fixed_layout(&mut self, path: &Path, layout: PageLayout) -> CrawlerResult<()> {
        let page = self.page()?;
        page.save_pdf(layout.to_print_params(), path)
            .await
            .map_err(|e| RenderError::ExportFailed {
                url: self.current_url.clone(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn close(&mut self) -> CrawlerResult<()> {
        if let Some(page) = self.page.take() {
            page.close()
                .await
                .map_err(|e| RenderError::SurfaceFailed(format!("close failed: {}", e)))?;
        }
        Ok(())
    }
}

/// Follows the lifecycle events of one main-frame navigation. Events of the
/// previous document (before the new `init`) are ignored.
#[derive(Debug, Default)]
struct IdleTracker {
    started: bool,
}

impl IdleTracker {
    /// Feed one lifecycle event name; true once the new document is network idle
    fn observe(&mut self, name: &str) -> bool {
        match name {
            "init" => {
                self.started = true;
                false
            }
            "networkIdle" => self.started,
            _ => false,
        }
    }
}
