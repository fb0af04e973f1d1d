use std::path::{Path, PathBuf};

use log::{debug, warn};
use tokio::time::sleep;

use crate::crawler::browser::{BrowserSession, PageLayout};
use crate::crawler::crawler::RunContext;
use crate::crawler::errors::{ArchiveError, CrawlerResult};

/// What happened to one page URL
#[derive(Debug)]
pub enum RenderOutcome {
    Rendered(PathBuf),
    /// Already rendered earlier in this run; nothing was done
    AlreadyVisited,
    /// No document was produced; the URL stays eligible for a retry
    Failed(ArchiveError),
}

/// Render `url` to its per-page document using a fresh surface of `session`.
///
/// On success the URL is marked visited, appended to the run's document
/// record and the configured delay is applied before returning.
pub async fn render_page(
    ctx: &mut RunContext,
    session: &mut dyn BrowserSession,
    url: &str,
) -> RenderOutcome {
    if ctx.is_visited(url) {
        debug!("[renderer] already converted, skipping {}", url);
        return RenderOutcome::AlreadyVisited;
    }

    let path = ctx.workspace().page_path(url);
    let layout = ctx.layout();

    if let Err(e) = export_page(session, url, &path, layout).await {
        ctx.logger_mut().log_render(url, None, Some(&e.to_string()));
        return RenderOutcome::Failed(e);
    }

    ctx.logger_mut()
        .log_render(url, Some(&path.display().to_string()), None);
    ctx.record_success(url, path.clone());

    let delay = ctx.delay();
    if !delay.is_zero() {
        sleep(delay).await;
    }
    RenderOutcome::Rendered(path)
}

/// Open a surface, export, and always close the surface again
async fn export_page(
    session: &mut dyn BrowserSession,
    url: &str,
    path: &Path,
    layout: PageLayout,
) -> CrawlerResult<()> {
    let mut surface = session.new_surface().await?;

    let mut result = surface.navigate_and_wait_idle(url).await;
    if result.is_ok() {
        result = surface.export_fixed_layout(path, layout).await;
    }

    if let Err(e) = surface.close().await {
        warn!("[renderer] failed to close page for {}: {}", url, e);
    }
    result
}
