use serde::Deserialize;
use std::path::PathBuf;

use crate::crawler::errors::{ArchiveError, ConfigurationError, CrawlerResult};

/// Main configuration structure for the site archiver
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Root directory for working directories and final archives
    pub output_directory: String,
    /// Sitemap discovery and flattening behavior
    pub sitemap: SitemapConfig,
    /// Browser rendering behavior
    pub render: RenderConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Configuration for sitemap discovery
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SitemapConfig {
    /// User agent string for robots.txt and sitemap requests
    pub user_agent: String,
    /// Well-known sitemap locations probed when robots.txt has no directive
    pub probe_paths: Vec<String>,
    /// Substring a `<loc>` inside a sitemap index must contain to be followed
    pub index_marker: String,
    /// Maximum sitemap index nesting
    pub max_depth: usize,
    /// Skip discovery and use this sitemap directly
    pub sitemap_url: Option<String>,
}

/// Configuration for the fixed-layout export
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RenderConfig {
    pub paper_width_in: f64,
    pub paper_height_in: f64,
    /// Uniform margin applied to all four edges
    pub margin_in: f64,
    pub print_background: bool,
    /// Delay after each successfully rendered page in milliseconds
    pub delay_ms: u64,
    /// Longest wait for a page's network activity to go idle
    pub idle_timeout_ms: u64,
    /// Browser binary; falls back to `CHROME_EXECUTABLE`, then auto-detection
    pub chrome_executable: Option<String>,
}

/// Configuration for logging behavior
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            output_directory: "pdf_output".to_string(),
            sitemap: SitemapConfig::default(),
            render: RenderConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for SitemapConfig {
    fn default() -> Self {
        Self {
            user_agent: "SiteArchiver/1.0".to_string(),
            probe_paths: vec![
                "/sitemap.xml".to_string(),
                "/sitemap_index.xml".to_string(),
                "/sitemap/sitemap.xml".to_string(),
            ],
            index_marker: "sitemap".to_string(),
            max_depth: 10,
            sitemap_url: None,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        // A4 with 0.75in margins
        Self {
            paper_width_in: 8.27,
            paper_height_in: 11.69,
            margin_in: 0.75,
            print_background: false,
            delay_ms: 1000,
            idle_timeout_ms: 30000,
            chrome_executable: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl RenderConfig {
    /// Resolve the browser binary from config or the environment
    pub fn resolved_chrome_executable(&self) -> Option<PathBuf> {
        self.chrome_executable
            .clone()
            .or_else(|| std::env::var("CHROME_EXECUTABLE").ok())
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
    }
}

impl ArchiveConfig {
    /// Get output directory as PathBuf
    pub fn get_output_path(&self) -> PathBuf {
        PathBuf::from(&self.output_directory)
    }

    /// Validate configuration values
    pub fn validate(&self) -> CrawlerResult<()> {
        if self.output_directory.is_empty() {
            return Err(invalid("Output directory cannot be empty"));
        }

        if self.sitemap.user_agent.is_empty() {
            return Err(invalid("User agent cannot be empty"));
        }

        if self.sitemap.probe_paths.is_empty() {
            return Err(invalid("At least one sitemap probe path is required"));
        }

        if self.sitemap.index_marker.is_empty() {
            return Err(invalid("Sitemap index marker cannot be empty"));
        }

        if self.sitemap.max_depth == 0 {
            return Err(invalid("Sitemap max depth must be greater than 0"));
        }

        let render = &self.render;
        if render.paper_width_in <= 0.0 || render.paper_height_in <= 0.0 {
            return Err(invalid("Paper size must be positive"));
        }

        if render.margin_in < 0.0
            || render.margin_in * 2.0 >= render.paper_width_in
            || render.margin_in * 2.0 >= render.paper_height_in
        {
            return Err(invalid(format!(
                "Margin {}in leaves no printable area on a {}x{}in page",
                render.margin_in, render.paper_width_in, render.paper_height_in
            )));
        }

        if render.idle_timeout_ms == 0 {
            return Err(invalid("Network idle timeout must be greater than 0"));
        }

        if render.delay_ms > 10000 {
            return Err(invalid("Delay between requests should not exceed 10 seconds"));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(invalid(format!(
                "Invalid log level '{}'. Must be one of: {:?}",
                self.logging.level, valid_log_levels
            )));
        }

        Ok(())
    }

    /// Initialize logging based on configuration. Output goes to stdout so run
    /// outcomes are visible alongside the summary line.
    pub fn init_logging(&self) -> Result<(), Box<dyn std::error::Error>> {
        use log::LevelFilter;

        let log_level = match self.logging.level.as_str() {
            "trace" => LevelFilter::Trace,
            "debug" => LevelFilter::Debug,
            "info" => LevelFilter::Info,
            "warn" => LevelFilter::Warn,
            "error" => LevelFilter::Error,
            _ => LevelFilter::Info,
        };

        env_logger::Builder::new()
            .filter_level(log_level)
            .parse_default_env()
            .target(env_logger::Target::Stdout)
            .try_init()?;

        Ok(())
    }
}

fn invalid(reason: impl Into<String>) -> ArchiveError {
    ConfigurationError::ValidationFailed(reason.into()).into()
}
