use std::fs;
use std::path::Path;

use crate::crawler::config::ArchiveConfig;

const CANDIDATES: [&str; 3] = ["src/config/app.yaml", "config/app.yaml", "app.yaml"];

/// Result of the candidate lookup, before logging is up
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: ArchiveConfig,
    /// Candidate the config came from; `None` means defaults
    pub source: Option<String>,
    /// Candidates that exist but could not be read or parsed
    pub problems: Vec<String>,
}

/// Try loading app config from the common candidate paths.
/// Runs before the logger exists, so diagnostics go straight to the console.
pub fn load_app_config() -> ArchiveConfig {
    let loaded = load_app_config_from(&CANDIDATES);
    for problem in &loaded.problems {
        eprintln!("[config] {}", problem);
    }
    match &loaded.source {
        Some(path) => println!("[config] loaded {}", path),
        None => println!("[config] using default app config"),
    }
    loaded.config
}

/// Every unusable candidate is skipped and reported; the first parseable one wins.
pub fn load_app_config_from(candidates: &[&str]) -> LoadedConfig {
    let mut problems = Vec::new();
    for p in candidates {
        if !Path::new(p).exists() {
            continue;
        }
        match fs::read_to_string(p) {
            Ok(s) => match serde_yaml::from_str::<ArchiveConfig>(&s) {
                Ok(config) => {
                    return LoadedConfig {
                        config,
                        source: Some(p.to_string()),
                        problems,
                    };
                }
                Err(e) => problems.push(format!("failed parse {}: {}", p, e)),
            },
            Err(e) => problems.push(format!("failed read {}: {}", p, e)),
        }
    }
    LoadedConfig {
        config: ArchiveConfig::default(),
        source: None,
        problems,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_first_parseable_candidate_wins() {
        let temp_dir = TempDir::new().unwrap();
        let broken = temp_dir.path().join("broken.yaml");
        let good = temp_dir.path().join("good.yaml");
        let later = temp_dir.path().join("later.yaml");
        fs::write(&broken, "output_directory: [unterminated").unwrap();
        fs::write(&good, "output_directory: first").unwrap();
        fs::write(&later, "output_directory: second").unwrap();

        let missing = temp_dir.path().join("missing.yaml");
        let candidates = [
            missing.to_str().unwrap(),
            broken.to_str().unwrap(),
            good.to_str().unwrap(),
            later.to_str().unwrap(),
        ];
        let loaded = load_app_config_from(&candidates);
        assert_eq!(loaded.config.output_directory, "first");
        assert_eq!(loaded.source.as_deref(), good.to_str());
    }

    #[test]
    fn test_broken_candidate_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let broken = temp_dir.path().join("app.yaml");
        fs::write(&broken, "output_directory: [unterminated").unwrap();

        let loaded = load_app_config_from(&[broken.to_str().unwrap()]);
        assert!(loaded.source.is_none());
        assert_eq!(loaded.config.output_directory, "pdf_output");
        assert_eq!(loaded.problems.len(), 1);
        assert!(loaded.problems[0].starts_with("failed parse"));
        assert!(loaded.problems[0].contains(broken.to_str().unwrap()));
    }

    #[test]
    fn test_defaults_when_nothing_found() {
        let loaded = load_app_config_from(&["/definitely/not/here.yaml"]);
        assert_eq!(loaded.config.output_directory, "pdf_output");
        assert!(loaded.source.is_none());
        assert!(loaded.problems.is_empty());
    }
}
