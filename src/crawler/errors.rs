use std::fmt;

/// Error types for the site archiver pipeline
#[derive(Debug)]
pub enum ArchiveError {
    /// Fetching robots.txt or sitemap documents
    Transport(TransportError),
    /// Sitemap documents that could not be interpreted
    Sitemap(SitemapError),
    /// Browser launch, navigation or export failures
    Render(RenderError),
    /// Document concatenation failures
    Merge(MergeError),
    /// File operation related errors
    FileOperation(FileOperationError),
    /// Configuration related errors
    Configuration(ConfigurationError),
    /// Validation related errors
    Validation(ValidationError),
}

/// Transport specific errors
#[derive(Debug)]
pub enum TransportError {
    ClientBuildFailed(String),
    RequestFailed { url: String, reason: String },
    BodyReadFailed { url: String, reason: String },
}

/// Sitemap specific errors
#[derive(Debug)]
pub enum SitemapError {
    UnexpectedStatus { url: String, status: u16 },
    ParseError { url: String, reason: String },
    DepthExceeded { url: String, depth: usize },
    CycleDetected(String),
}

/// Browser rendering specific errors
#[derive(Debug)]
pub enum RenderError {
    LaunchFailed(String),
    SurfaceFailed(String),
    NavigationFailed { url: String, reason: String },
    ExportFailed { url: String, reason: String },
}

/// Document merge specific errors
#[derive(Debug)]
pub enum MergeError {
    AppendFailed { path: String, reason: String },
    WriteFailed { path: String, reason: String },
    MalformedDocument(String),
    NothingAppended,
}

/// File operation specific errors
#[derive(Debug)]
pub enum FileOperationError {
    DirectoryCreationFailed(std::io::Error),
    DirectoryRemovalFailed(std::io::Error),
    FileRemovalFailed { path: String, source: std::io::Error },
    InvalidPath(String),
}

/// Configuration specific errors
#[derive(Debug)]
pub enum ConfigurationError {
    ValidationFailed(String),
}

/// Validation specific errors
#[derive(Debug)]
pub enum ValidationError {
    InvalidUrl(String),
    MissingHost(String),
}

/// Failure kinds as they are reported at the end of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorCategory {
    Transport,
    Parse,
    Render,
    MergeAppend,
    MergeWrite,
    Usage,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::Transport => "transport",
            ErrorCategory::Parse => "parse",
            ErrorCategory::Render => "render",
            ErrorCategory::MergeAppend => "merge-append",
            ErrorCategory::MergeWrite => "merge-write",
            ErrorCategory::Usage => "usage",
        };
        f.write_str(name)
    }
}

impl fmt::Display for ArchiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveError::Transport(e) => write!(f, "Transport error: {}", e),
            ArchiveError::Sitemap(e) => write!(f, "Sitemap error: {}", e),
            ArchiveError::Render(e) => write!(f, "Render error: {}", e),
            ArchiveError::Merge(e) => write!(f, "Merge error: {}", e),
            ArchiveError::FileOperation(e) => write!(f, "File operation error: {}", e),
            ArchiveError::Configuration(e) => write!(f, "Configuration error: {}", e),
            ArchiveError::Validation(e) => write!(f, "Validation error: {}", e),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::ClientBuildFailed(msg) => {
                write!(f, "Failed to build HTTP client: {}", msg)
            }
            TransportError::RequestFailed { url, reason } => {
                write!(f, "Request failed for {}: {}", url, reason)
            }
            TransportError::BodyReadFailed { url, reason } => {
                write!(f, "Failed to read body of {}: {}", url, reason)
            }
        }
    }
}

impl fmt::Display for SitemapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SitemapError::UnexpectedStatus { url, status } => {
                write!(f, "Failed to fetch sitemap {} (status {})", url, status)
            }
            SitemapError::ParseError { url, reason } => {
                write!(f, "Failed to parse sitemap {}: {}", url, reason)
            }
            SitemapError::DepthExceeded { url, depth } => {
                write!(f, "Sitemap {} is nested too deep (depth {})", url, depth)
            }
            SitemapError::CycleDetected(url) => {
                write!(f, "Sitemap {} references itself through its own index", url)
            }
        }
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::LaunchFailed(msg) => write!(f, "Failed to launch browser: {}", msg),
            RenderError::SurfaceFailed(msg) => write!(f, "Failed to open page: {}", msg),
            RenderError::NavigationFailed { url, reason } => {
                write!(f, "Navigation to {} failed: {}", url, reason)
            }
            RenderError::ExportFailed { url, reason } => {
                write!(f, "PDF export of {} failed: {}", url, reason)
            }
        }
    }
}

impl fmt::Display for MergeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeError::AppendFailed { path, reason } => {
                write!(f, "Failed to add {}: {}", path, reason)
            }
            MergeError::WriteFailed { path, reason } => {
                write!(f, "Failed to save merged document {}: {}", path, reason)
            }
            MergeError::MalformedDocument(msg) => write!(f, "Malformed document: {}", msg),
            MergeError::NothingAppended => write!(f, "No documents were appended"),
        }
    }
}

impl fmt::Display for FileOperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileOperationError::DirectoryCreationFailed(e) => {
                write!(f, "Failed to create directory: {}", e)
            }
            FileOperationError::DirectoryRemovalFailed(e) => {
                write!(f, "Failed to remove directory: {}", e)
            }
            FileOperationError::FileRemovalFailed { path, source } => {
                write!(f, "Failed to delete {}: {}", path, source)
            }
            FileOperationError::InvalidPath(path) => write!(f, "Invalid file path: {}", path),
        }
    }
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationError::ValidationFailed(msg) => {
                write!(f, "Configuration validation failed: {}", msg)
            }
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::InvalidUrl(url) => write!(f, "Invalid URL: {}", url),
            ValidationError::MissingHost(url) => write!(f, "URL has no host: {}", url),
        }
    }
}

impl std::error::Error for ArchiveError {}
impl std::error::Error for TransportError {}
impl std::error::Error for SitemapError {}
impl std::error::Error for RenderError {}
impl std::error::Error for MergeError {}
impl std::error::Error for FileOperationError {}
impl std::error::Error for ConfigurationError {}
impl std::error::Error for ValidationError {}

impl From<url::ParseError> for ArchiveError {
    fn from(err: url::ParseError) -> Self {
        ArchiveError::Validation(ValidationError::InvalidUrl(err.to_string()))
    }
}

impl From<TransportError> for ArchiveError {
    fn from(err: TransportError) -> Self {
        ArchiveError::Transport(err)
    }
}

impl From<SitemapError> for ArchiveError {
    fn from(err: SitemapError) -> Self {
        ArchiveError::Sitemap(err)
    }
}

impl From<RenderError> for ArchiveError {
    fn from(err: RenderError) -> Self {
        ArchiveError::Render(err)
    }
}

impl From<MergeError> for ArchiveError {
    fn from(err: MergeError) -> Self {
        ArchiveError::Merge(err)
    }
}

impl From<FileOperationError> for ArchiveError {
    fn from(err: FileOperationError) -> Self {
        ArchiveError::FileOperation(err)
    }
}

impl From<ConfigurationError> for ArchiveError {
    fn from(err: ConfigurationError) -> Self {
        ArchiveError::Configuration(err)
    }
}

impl From<ValidationError> for ArchiveError {
    fn from(err: ValidationError) -> Self {
        ArchiveError::Validation(err)
    }
}

impl ArchiveError {
    /// Which reporting bucket this failure belongs to
    pub fn category(&self) -> ErrorCategory {
        match self {
            ArchiveError::Transport(_) => ErrorCategory::Transport,
            ArchiveError::Sitemap(SitemapError::UnexpectedStatus { .. }) => {
                ErrorCategory::Transport
            }
            ArchiveError::Sitemap(_) => ErrorCategory::Parse,
            ArchiveError::Render(_) => ErrorCategory::Render,
            ArchiveError::Merge(MergeError::AppendFailed { .. }) => ErrorCategory::MergeAppend,
            ArchiveError::Merge(_) | ArchiveError::FileOperation(_) => ErrorCategory::MergeWrite,
            ArchiveError::Configuration(_) | ArchiveError::Validation(_) => ErrorCategory::Usage,
        }
    }
}

/// Result type alias for archiver operations
pub type CrawlerResult<T> = Result<T, ArchiveError>;
