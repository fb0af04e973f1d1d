use site_archiver::config::config::load_app_config;
use site_archiver::crawler::config::ArchiveConfig;
use site_archiver::crawler::crawler::{run_crawler, RunOutcome};
use site_archiver::crawler::merger::MergeOutcome;
use url::Url;

const USAGE_EXIT_CODE: i32 = 2;

fn usage(program: &str) -> ! {
    eprintln!("Usage: {} <website_url>", program);
    std::process::exit(USAGE_EXIT_CODE);
}

/// One line describing how the run ended
fn summarize(outcome: &RunOutcome) -> String {
    match outcome {
        RunOutcome::NoSitemap => "No sitemap found; nothing was archived.".to_string(),
        RunOutcome::NoPages { sitemap_url, .. } => {
            format!("Sitemap {} listed no pages; nothing was archived.", sitemap_url)
        }
        RunOutcome::Completed(report) => {
            let merge = match &report.merge {
                MergeOutcome::NothingToMerge => "no PDFs to merge".to_string(),
                MergeOutcome::Merged { output, merged, .. } => {
                    format!("{} page(s) merged into {}", merged, output.display())
                }
                MergeOutcome::WriteFailed(e) => format!("merge failed ({})", e),
            };
            let breakdown = report.failure_breakdown();
            let failures = if breakdown.is_empty() {
                String::new()
            } else {
                let parts: Vec<String> = breakdown
                    .iter()
                    .map(|(category, count)| format!("{}={}", category, count))
                    .collect();
                format!(" [errors: {}]", parts.join(", "))
            };
            format!(
                "Conversion complete: {}/{} URL(s) rendered, {} failed, {} duplicate(s); {}.{}",
                report.rendered,
                report.total_urls,
                report.failed.len(),
                report.duplicates,
                merge,
                failures
            )
        }
    }
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("site-archiver");
    if args.len() != 2 {
        usage(program);
    }
    let base_url = &args[1];
    if Url::parse(base_url).map(|u| u.host_str().is_none()).unwrap_or(true) {
        eprintln!("Invalid website URL: {}", base_url);
        usage(program);
    }

    let mut config = load_app_config();
    if let Err(e) = config.validate() {
        eprintln!("[config] invalid configuration ({}), using defaults", e);
        config = ArchiveConfig::default();
    }
    if let Err(e) = config.init_logging() {
        eprintln!("[config] logging already initialised: {}", e);
    }

    match run_crawler(base_url, &config).await {
        Ok(outcome) => println!("{}", summarize(&outcome)),
        Err(e) => println!("Run aborted: {}", e),
    }
}
