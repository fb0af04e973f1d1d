use log::{debug, info, warn};
use url::Url;

use crate::crawler::errors::CrawlerResult;
use crate::crawler::transport::Transport;

/// Extract the first `Sitemap:` directive from a robots.txt body.
///
/// Matching is case-insensitive and the value is everything after the first
/// colon of the line, trimmed. Directives with an empty value are ignored.
pub fn sitemap_from_robots(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        if !line.to_lowercase().contains("sitemap:") {
            return None;
        }
        line.split_once(':')
            .map(|(_, rest)| rest.trim().to_string())
            .filter(|url| !url.is_empty())
    })
}

/// Join an absolute path onto the origin of `base_url`
fn origin_url(base_url: &str, path: &str) -> CrawlerResult<String> {
    let parsed = Url::parse(base_url)?;
    Ok(parsed.join(path)?.to_string())
}

/// Find the sitemap for a site: robots.txt first, then the probe paths in
/// order. The first hit wins; every failure along the way only disqualifies
/// that candidate.
pub async fn locate_sitemap(
    transport: &dyn Transport,
    base_url: &str,
    probe_paths: &[String],
) -> Option<String> {
    match origin_url(base_url, "/robots.txt") {
        Ok(robots_url) => {
            debug!("[robots] loading {}", robots_url);
            match transport.fetch(&robots_url).await {
                Ok(response) if response.is_success() => {
                    if let Some(sitemap) = sitemap_from_robots(&response.body) {
                        info!("[robots] sitemap directive found: {}", sitemap);
                        return Some(sitemap);
                    }
                    debug!("[robots] no sitemap directive in {}", robots_url);
                }
                Ok(response) => {
                    debug!("[robots] {} returned status {}", robots_url, response.status);
                }
                Err(e) => {
                    warn!("[robots] could not load {}: {}", robots_url, e);
                }
            }
        }
        Err(e) => {
            warn!("[robots] invalid base url {}: {}", base_url, e);
            return None;
        }
    }

    for path in probe_paths {
        let candidate = match origin_url(base_url, path) {
            Ok(url) => url,
            Err(e) => {
                warn!("[robots] skipping probe {}: {}", path, e);
                continue;
            }
        };
        match transport.fetch(&candidate).await {
            Ok(response) if response.is_success() => {
                info!("[robots] sitemap found at {}", candidate);
                return Some(candidate);
            }
            Ok(response) => {
                debug!("[robots] probe {} returned status {}", candidate, response.status);
            }
            Err(e) => {
                debug!("[robots] probe {} failed: {}", candidate, e);
            }
        }
    }

    None
}
