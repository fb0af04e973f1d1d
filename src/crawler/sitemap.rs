use std::collections::HashSet;

use log::{debug, info, warn};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::crawler::errors::{ArchiveError, CrawlerResult, SitemapError};
use crate::crawler::transport::Transport;

/// A parsed sitemap document: whether it is an index and its `<loc>` texts
/// in document order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SitemapDocument {
    pub is_index: bool,
    pub locs: Vec<String>,
}

/// Parse a sitemap body. Namespace prefixes are ignored; `<loc>` text may be
/// escaped or CDATA.
pub fn parse_sitemap(xml: &str) -> Result<SitemapDocument, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut document = SitemapDocument::default();
    let mut in_loc = false;
    let mut current = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"sitemapindex" => document.is_index = true,
                b"loc" => {
                    in_loc = true;
                    current.clear();
                }
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"sitemapindex" {
                    document.is_index = true;
                }
            }
            Ok(Event::Text(e)) if in_loc => {
                let text = e.unescape().map_err(|err| err.to_string())?;
                current.push_str(&text);
            }
            Ok(Event::CData(e)) if in_loc => {
                current.push_str(&String::from_utf8_lossy(&e.into_inner()));
            }
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"loc" && in_loc {
                    in_loc = false;
                    let loc = current.trim();
                    if !loc.is_empty() {
                        document.locs.push(loc.to_string());
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(format!(
                    "error at position {}: {}",
                    reader.buffer_position(),
                    e
                ));
            }
            _ => {}
        }
    }

    Ok(document)
}

/// Result of flattening a sitemap tree: page URLs in depth-first document
/// order plus every sub-tree that yielded nothing because it failed.
#[derive(Debug, Default)]
pub struct FlattenOutcome {
    pub urls: Vec<String>,
    pub failures: Vec<(String, ArchiveError)>,
}

/// Expands sitemap indexes into a flat, ordered list of page URLs
pub struct SitemapFlattener<'a> {
    transport: &'a dyn Transport,
    index_marker: String,
    max_depth: usize,
}

impl<'a> SitemapFlattener<'a> {
    pub fn new(transport: &'a dyn Transport, index_marker: &str, max_depth: usize) -> Self {
        Self {
            transport,
            index_marker: index_marker.to_string(),
            max_depth,
        }
    }

    /// Flatten the tree rooted at `sitemap_url`. Index entries are expanded in
    /// place; duplicates across leaves are kept.
    pub async fn flatten(&self, sitemap_url: &str) -> FlattenOutcome {
        let mut outcome = FlattenOutcome::default();
        let mut ancestors = HashSet::new();
        self.flatten_into(sitemap_url, 0, &mut ancestors, &mut outcome)
            .await;
        info!(
            "[sitemap] {} page url(s) from {} ({} failed sub-tree(s))",
            outcome.urls.len(),
            sitemap_url,
            outcome.failures.len()
        );
        outcome
    }

    async fn flatten_into(
        &self,
        sitemap_url: &str,
        depth: usize,
        ancestors: &mut HashSet<String>,
        outcome: &mut FlattenOutcome,
    ) {
        if depth > self.max_depth {
            warn!("[sitemap][depth={}] too deep, skipping {}", depth, sitemap_url);
            outcome.failures.push((
                sitemap_url.to_string(),
                SitemapError::DepthExceeded {
                    url: sitemap_url.to_string(),
                    depth,
                }
                .into(),
            ));
            return;
        }
        // Only true cycles are cut; a leaf listed by two sibling entries is
        // expanded twice.
        if ancestors.contains(sitemap_url) {
            warn!("[sitemap][depth={}] cycle detected at {}", depth, sitemap_url);
            outcome.failures.push((
                sitemap_url.to_string(),
                SitemapError::CycleDetected(sitemap_url.to_string()).into(),
            ));
            return;
        }

        debug!("[sitemap][depth={}] loading {}", depth, sitemap_url);
        let document = match self.fetch_document(sitemap_url).await {
            Ok(document) => document,
            Err(e) => {
                warn!("[sitemap][depth={}] {}", depth, e);
                outcome.failures.push((sitemap_url.to_string(), e));
                return;
            }
        };

        if !document.is_index {
            debug!(
                "[sitemap][depth={}] {} page url(s) in {}",
                depth,
                document.locs.len(),
                sitemap_url
            );
            outcome.urls.extend(document.locs);
            return;
        }

        ancestors.insert(sitemap_url.to_string());
        for nested in document.locs {
            if !nested.contains(&self.index_marker) {
                debug!("[sitemap][depth={}] ignoring index entry {}", depth, nested);
                continue;
            }
            debug!("[sitemap][depth={}] -> nested sitemap {}", depth, nested);
            Box::pin(self.flatten_into(&nested, depth + 1, ancestors, outcome)).await;
        }
        ancestors.remove(sitemap_url);
    }

    async fn fetch_document(&self, sitemap_url: &str) -> CrawlerResult<SitemapDocument> {
        let response = self.transport.fetch(sitemap_url).await?;
        if !response.is_success() {
            return Err(SitemapError::UnexpectedStatus {
                url: sitemap_url.to_string(),
                status: response.status,
            }
            .into());
        }
        parse_sitemap(&response.body).map_err(|reason| {
            SitemapError::ParseError {
                url: sitemap_url.to_string(),
                reason,
            }
            .into()
        })
    }
}
