use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Structured logging for one archive run
pub struct ArchiveLogger {
    start_time: Instant,
    operation_timers: HashMap<String, Instant>,
    stats: LoggingStats,
}

/// Statistics for logging operations
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoggingStats {
    pub total_operations: usize,
    pub successful_operations: usize,
    pub failed_operations: usize,
    pub warnings_count: usize,
    pub errors_count: usize,
}

/// Log levels for different types of operations
#[derive(Debug, Clone)]
pub enum LogLevel {
    Debug,
    Warn,
}

/// Context information for structured logging
#[derive(Debug, Clone, Default)]
pub struct LogContext {
    pub operation: String,
    pub url: Option<String>,
    pub file_path: Option<String>,
    pub additional_data: HashMap<String, String>,
}

impl ArchiveLogger {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            operation_timers: HashMap::new(),
            stats: LoggingStats::default(),
        }
    }

    /// Start timing an operation
    pub fn start_operation(&mut self, operation_name: &str) {
        self.operation_timers
            .insert(operation_name.to_string(), Instant::now());
        debug!("Starting operation: {}", operation_name);
    }

    /// End timing an operation and log the duration
    pub fn end_operation(&mut self, operation_name: &str, success: bool) {
        if let Some(start_time) = self.operation_timers.remove(operation_name) {
            let duration = start_time.elapsed();
            let status = if success { "SUCCESS" } else { "FAILED" };

            info!("{} Operation '{}' completed in {:?}", status, operation_name, duration);

            self.stats.total_operations += 1;
            if success {
                self.stats.successful_operations += 1;
            } else {
                self.stats.failed_operations += 1;
            }
        }
    }

    /// Log robots.txt / sitemap activity
    pub fn log_sitemap_activity(
        &mut self,
        operation: &str,
        url: &str,
        success: bool,
        details: Option<&str>,
    ) {
        let mut context = LogContext {
            operation: format!("sitemap_{}", operation),
            url: Some(url.to_string()),
            ..LogContext::default()
        };
        context
            .additional_data
            .insert("success".to_string(), success.to_string());
        if let Some(detail) = details {
            context
                .additional_data
                .insert("details".to_string(), detail.to_string());
        }

        if success {
            info!("Sitemap {}: {}", operation, url);
        } else {
            warn!(
                "Sitemap {} failed: {} - {}",
                operation,
                url,
                details.unwrap_or("No additional details")
            );
            self.stats.warnings_count += 1;
        }

        let level = if success { LogLevel::Debug } else { LogLevel::Warn };
        self.log_structured(level, &format!("Sitemap {} completed", operation), &context);
    }

    /// Log the result of rendering one page
    pub fn log_render(&mut self, url: &str, file_path: Option<&str>, error_msg: Option<&str>) {
        let context = LogContext {
            operation: "render".to_string(),
            url: Some(url.to_string()),
            file_path: file_path.map(|s| s.to_string()),
            additional_data: HashMap::new(),
        };

        match (file_path, error_msg) {
            (Some(path), None) => {
                info!("Converted: {} -> {}", url, path);
                self.log_structured(LogLevel::Debug, "Render completed", &context);
            }
            _ => {
                error!(
                    "Error converting {} to PDF: {}",
                    url,
                    error_msg.unwrap_or("Unknown error")
                );
                self.stats.errors_count += 1;
                self.log_structured(LogLevel::Debug, "Render failed", &context);
            }
        }
    }

    /// Log file operation activity
    pub fn log_file_operation(
        &mut self,
        operation: &str,
        file_path: &str,
        success: bool,
        error_msg: Option<&str>,
    ) {
        if success {
            info!("File {}: {}", operation, file_path);
        } else {
            let error_text = error_msg.unwrap_or("Unknown error");
            error!("File {} failed: {} - {}", operation, file_path, error_text);
            self.stats.errors_count += 1;
        }
    }

    /// Log pipeline progress
    pub fn log_pipeline_progress(&self, stage: &str, current: usize, total: usize, url: &str) {
        let percentage = if total > 0 {
            (current as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        info!("Processing {}/{} ({:.1}%) [{}]: {}", current, total, percentage, stage, url);

        let elapsed = self.get_total_elapsed();
        if current > 1 {
            let per_item = elapsed / (current as u32 - 1);
            let remaining = per_item * (total.saturating_sub(current - 1)) as u32;
            debug!("   Estimated time remaining: {:?}", remaining);
        }
    }

    /// Get current logging statistics
    pub fn get_stats(&self) -> &LoggingStats {
        &self.stats
    }

    /// Get total elapsed time since logger creation
    pub fn get_total_elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Log final summary
    pub fn log_final_summary(&self) {
        info!("Archive run completed in {:?}", self.get_total_elapsed());
        info!(
            "   Operations: {} total, {} successful, {} failed",
            self.stats.total_operations,
            self.stats.successful_operations,
            self.stats.failed_operations
        );
        info!(
            "   Warnings: {}, Errors: {}",
            self.stats.warnings_count, self.stats.errors_count
        );
    }

    fn log_structured(&self, level: LogLevel, message: &str, context: &LogContext) {
        let log_entry = format!(
            "[{}] {} | URL: {} | File: {} | Data: {:?}",
            context.operation,
            message,
            context.url.as_deref().unwrap_or("N/A"),
            context.file_path.as_deref().unwrap_or("N/A"),
            context.additional_data
        );

        match level {
            LogLevel::Debug => debug!("{}", log_entry),
            LogLevel::Warn => warn!("{}", log_entry),
        }
    }
}

impl Default for ArchiveLogger {
    fn default() -> Self {
        Self::new()
    }
}
