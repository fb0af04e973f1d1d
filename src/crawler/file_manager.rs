use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, error, info, trace};
use url::Url;

use crate::crawler::errors::{CrawlerResult, FileOperationError, ValidationError};

/// Extension of every per-page document and of the final archive
pub const DOCUMENT_EXTENSION: &str = "pdf";

/// Map a page URL to its per-page document name.
///
/// The path is stripped of surrounding slashes (empty becomes `index`), then
/// `/`, `?` and `&` become `_`. Distinct URLs can collide; the later render
/// overwrites the earlier file.
pub fn derive_filename(url: &str) -> String {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.to_string(),
    };

    let trimmed = path.trim_matches('/');
    let stem = if trimmed.is_empty() { "index" } else { trimmed };
    let sanitized: String = stem
        .chars()
        .map(|c| match c {
            '/' | '?' | '&' => '_',
            c => c,
        })
        .collect();

    format!("{}.{}", sanitized, DOCUMENT_EXTENSION)
}

/// Host (plus explicit port) used to namespace a run's output
pub fn domain_of(base_url: &str) -> CrawlerResult<String> {
    let parsed = Url::parse(base_url)?;
    let host = parsed
        .host_str()
        .ok_or_else(|| ValidationError::MissingHost(base_url.to_string()))?;
    Ok(match parsed.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// Filesystem layout of one run: `<root>/<domain>/` holds the per-page
/// documents and `<root>/<domain>_complete.pdf` is the archive.
#[derive(Debug, Clone)]
pub struct Workspace {
    output_root: PathBuf,
    domain: String,
}

impl Workspace {
    pub fn new(output_root: impl Into<PathBuf>, domain: &str) -> Self {
        Self {
            output_root: output_root.into(),
            domain: domain.to_string(),
        }
    }

    pub fn working_dir(&self) -> PathBuf {
        self.output_root.join(&self.domain)
    }

    pub fn archive_path(&self) -> PathBuf {
        self.output_root
            .join(format!("{}_complete.{}", self.domain, DOCUMENT_EXTENSION))
    }

    pub fn page_path(&self, url: &str) -> PathBuf {
        self.working_dir().join(derive_filename(url))
    }

    /// Create the working directory (and output root) if needed
    pub fn create(&self) -> CrawlerResult<()> {
        let dir = self.working_dir();
        trace!("Creating working directory: {:?}", dir);

        if self.domain.is_empty() {
            error!("Workspace domain is empty");
            return Err(FileOperationError::InvalidPath("Empty domain".to_string()).into());
        }

        if dir.exists() {
            debug!("Working directory already exists: {:?}", dir);
            return Ok(());
        }

        fs::create_dir_all(&dir).map_err(|e| {
            error!("Failed to create working directory {:?}: {}", dir, e);
            FileOperationError::DirectoryCreationFailed(e)
        })?;
        info!("Working directory ready: {:?}", dir);
        Ok(())
    }

    /// Delete one intermediate document
    pub fn remove_document(&self, path: &Path) -> CrawlerResult<()> {
        fs::remove_file(path).map_err(|source| {
            FileOperationError::FileRemovalFailed {
                path: path.display().to_string(),
                source,
            }
            .into()
        })
    }

    /// Remove the working directory; fails if anything is left inside
    pub fn remove_working_dir(&self) -> CrawlerResult<()> {
        fs::remove_dir(self.working_dir())
            .map_err(|e| FileOperationError::DirectoryRemovalFailed(e).into())
    }
}
