use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

use log::{error, info, warn};

use super::browser::{BrowserEngine, ChromiumEngine, PageLayout};
use super::config::ArchiveConfig;
use super::errors::{ArchiveError, CrawlerResult, ErrorCategory};
use super::file_manager::{domain_of, Workspace};
use super::logging::ArchiveLogger;
use super::merger::{merge_documents, DocumentMerger, MergeOutcome, PdfMerger};
use super::renderer::{render_page, RenderOutcome};
use super::robots::locate_sitemap;
use super::sitemap::SitemapFlattener;
use super::transport::{HttpTransport, Transport};

/// State owned by a single run: the visited set, the ordered record of
/// generated documents and the run's logger.
pub struct RunContext {
    base_url: String,
    workspace: Workspace,
    layout: PageLayout,
    delay: Duration,
    visited: HashSet<String>,
    generated: Vec<(String, PathBuf)>,
    logger: ArchiveLogger,
}

impl RunContext {
    pub fn new(base_url: &str, config: &ArchiveConfig) -> CrawlerResult<Self> {
        let domain = domain_of(base_url)?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            workspace: Workspace::new(config.get_output_path(), &domain),
            layout: PageLayout::from_config(&config.render),
            delay: Duration::from_millis(config.render.delay_ms),
            visited: HashSet::new(),
            generated: Vec::new(),
            logger: ArchiveLogger::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn layout(&self) -> PageLayout {
        self.layout
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.visited.contains(url)
    }

    /// Mark `url` converted and append it to the document record
    pub fn record_success(&mut self, url: &str, path: PathBuf) {
        self.visited.insert(url.to_string());
        self.generated.push((url.to_string(), path));
    }

    /// Successfully rendered documents in render order
    pub fn generated(&self) -> &[(String, PathBuf)] {
        &self.generated
    }

    pub fn logger(&self) -> &ArchiveLogger {
        &self.logger
    }

    pub fn logger_mut(&mut self) -> &mut ArchiveLogger {
        &mut self.logger
    }
}

/// Per-run totals of a run that got as far as rendering
#[derive(Debug)]
pub struct RunReport {
    pub sitemap_url: String,
    pub total_urls: usize,
    pub rendered: usize,
    pub duplicates: usize,
    pub failed: Vec<(String, ArchiveError)>,
    pub sitemap_failures: Vec<(String, ArchiveError)>,
    /// Set when the browser could not be started; no page was attempted
    pub launch_error: Option<ArchiveError>,
    pub merge: MergeOutcome,
}

impl RunReport {
    /// Every failure of the run, counted per category
    pub fn failure_breakdown(&self) -> BTreeMap<ErrorCategory, usize> {
        let mut errors: Vec<&ArchiveError> = Vec::new();
        errors.extend(self.sitemap_failures.iter().map(|(_, e)| e));
        errors.extend(self.launch_error.iter());
        errors.extend(self.failed.iter().map(|(_, e)| e));
        match &self.merge {
            MergeOutcome::Merged {
                skipped,
                cleanup_failures,
                ..
            } => {
                errors.extend(skipped.iter().map(|(_, e)| e));
                errors.extend(cleanup_failures.iter());
            }
            MergeOutcome::WriteFailed(e) => errors.push(e),
            MergeOutcome::NothingToMerge => {}
        }

        let mut breakdown = BTreeMap::new();
        for e in errors {
            *breakdown.entry(e.category()).or_insert(0) += 1;
        }
        breakdown
    }
}

#[derive(Debug, Default)]
struct RenderTotals {
    rendered: usize,
    duplicates: usize,
    failed: Vec<(String, ArchiveError)>,
    launch_error: Option<ArchiveError>,
}

/// How a run ended. None of these are crashes.
#[derive(Debug)]
pub enum RunOutcome {
    NoSitemap,
    NoPages {
        sitemap_url: String,
        sitemap_failures: Vec<(String, ArchiveError)>,
    },
    Completed(RunReport),
}

/// Drives locate -> flatten -> render -> merge for one site
pub struct Crawler<'a> {
    config: &'a ArchiveConfig,
    transport: &'a dyn Transport,
    engine: &'a dyn BrowserEngine,
}

impl<'a> Crawler<'a> {
    pub fn new(
        config: &'a ArchiveConfig,
        transport: &'a dyn Transport,
        engine: &'a dyn BrowserEngine,
    ) -> Self {
        Self {
            config,
            transport,
            engine,
        }
    }

    /// Run the whole pipeline. Only setup problems (bad base URL, unusable
    /// output directory) are returned as errors.
    pub async fn run(
        &self,
        base_url: &str,
        merger: &mut dyn DocumentMerger,
    ) -> CrawlerResult<RunOutcome> {
        let mut ctx = RunContext::new(base_url, self.config)?;
        info!("Processing website: {}", ctx.base_url());
        ctx.workspace().create()?;

        ctx.logger_mut().start_operation("locate_sitemap");
        let located = match &self.config.sitemap.sitemap_url {
            Some(url) => {
                info!("Using configured sitemap: {}", url);
                Some(url.clone())
            }
            None => {
                locate_sitemap(self.transport, ctx.base_url(), &self.config.sitemap.probe_paths)
                    .await
            }
        };
        ctx.logger_mut()
            .end_operation("locate_sitemap", located.is_some());

        let Some(sitemap_url) = located else {
            warn!("Could not find sitemap. Please provide the sitemap URL manually.");
            return Ok(RunOutcome::NoSitemap);
        };
        info!("Found sitemap: {}", sitemap_url);

        ctx.logger_mut().start_operation("flatten_sitemap");
        let flattener = SitemapFlattener::new(
            self.transport,
            &self.config.sitemap.index_marker,
            self.config.sitemap.max_depth,
        );
        let flattened = flattener.flatten(&sitemap_url).await;
        for (url, e) in &flattened.failures {
            ctx.logger_mut()
                .log_sitemap_activity("fetch", url, false, Some(&e.to_string()));
        }
        ctx.logger_mut()
            .end_operation("flatten_sitemap", !flattened.urls.is_empty());

        if flattened.urls.is_empty() {
            warn!("No URLs found in sitemap.");
            return Ok(RunOutcome::NoPages {
                sitemap_url,
                sitemap_failures: flattened.failures,
            });
        }
        info!("Found {} URLs in sitemap.", flattened.urls.len());

        let totals = self.render_all(&mut ctx, &flattened.urls).await;

        let merge = {
            let RunContext {
                workspace,
                generated,
                logger,
                ..
            } = &mut ctx;
            merge_documents(merger, generated, workspace, logger)
        };
        match &merge {
            MergeOutcome::Merged { output, .. } => {
                info!("Merged PDF saved as: {}", output.display())
            }
            MergeOutcome::NothingToMerge => {}
            MergeOutcome::WriteFailed(e) => error!("Merged PDF was not written: {}", e),
        }
        ctx.logger().log_final_summary();

        Ok(RunOutcome::Completed(RunReport {
            sitemap_url,
            total_urls: flattened.urls.len(),
            rendered: totals.rendered,
            duplicates: totals.duplicates,
            failed: totals.failed,
            sitemap_failures: flattened.failures,
            launch_error: totals.launch_error,
            merge,
        }))
    }

    /// Render every URL in order with one shared browser session, closed
    /// again before returning whatever happened to the individual pages.
    async fn render_all(
        &self,
        ctx: &mut RunContext,
        urls: &[String],
    ) -> RenderTotals {
        ctx.logger_mut().start_operation("render");
        let mut session = match self.engine.launch().await {
            Ok(session) => session,
            Err(e) => {
                error!("Could not start browser: {}", e);
                ctx.logger_mut().end_operation("render", false);
                return RenderTotals {
                    launch_error: Some(e),
                    ..RenderTotals::default()
                };
            }
        };

        let mut totals = RenderTotals::default();
        for (i, url) in urls.iter().enumerate() {
            ctx.logger().log_pipeline_progress("render", i + 1, urls.len(), url);
            match render_page(ctx, session.as_mut(), url).await {
                RenderOutcome::Rendered(_) => totals.rendered += 1,
                RenderOutcome::AlreadyVisited => totals.duplicates += 1,
                RenderOutcome::Failed(e) => totals.failed.push((url.clone(), e)),
            }
        }

        if let Err(e) = session.close().await {
            warn!("Browser did not shut down cleanly: {}", e);
        }
        ctx.logger_mut()
            .end_operation("render", totals.failed.is_empty());

        totals
    }
}

/// Archive `base_url` with the production collaborators: HTTP transport,
/// headless Chromium and the PDF merger.
pub async fn run_crawler(base_url: &str, config: &ArchiveConfig) -> CrawlerResult<RunOutcome> {
    let transport = HttpTransport::new(&config.sitemap.user_agent)?;
    let engine = ChromiumEngine::new(&config.render);
    let mut merger = PdfMerger::new();

    Crawler::new(config, &transport, &engine)
        .run(base_url, &mut merger)
        .await
}
