use crate::config::types::Config;
use crate::config::validation::validate;
use crate::crawler::Target;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Separator between URL and quota in a targets file line
pub const TARGET_LINE_SEPARATOR: &str = "/////";

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use mx_harvest::config::load_config;
///
/// let config = load_config(Path::new("harvest.toml")).unwrap();
/// println!("Page budget: {}", config.crawler.max_pages);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Recorded in the run report so two reports can be tied to the same settings.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

/// Parses one `URL ///// COUNT` line
///
/// # Returns
///
/// * `Ok(Target)` - The parsed target; the start page comes from `page=N`
/// * `Err(ConfigError::InvalidTargetLine)` - The line is malformed
pub fn parse_target_line(line: &str, line_number: usize) -> Result<Target, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidTargetLine {
        line: line_number,
        reason,
    };

    let (url, count) = line
        .split_once(TARGET_LINE_SEPARATOR)
        .ok_or_else(|| invalid(format!("missing '{}' separator", TARGET_LINE_SEPARATOR)))?;

    let url = url.trim();
    if url.is_empty() {
        return Err(invalid("empty URL".to_string()));
    }

    let quota: u32 = count
        .trim()
        .parse()
        .map_err(|_| invalid(format!("quota '{}' is not a number", count.trim())))?;
    if quota == 0 {
        return Err(invalid("quota must be at least 1".to_string()));
    }

    Target::new(url, quota, None).map_err(|e| invalid(e.to_string()))
}

/// Parses a whole targets file, skipping malformed lines with a warning
///
/// Blank lines and lines starting with `#` are ignored.
pub fn parse_targets_list(content: &str) -> Vec<Target> {
    let mut targets = Vec::new();

    for (index, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        match parse_target_line(trimmed, index + 1) {
            Ok(target) => targets.push(target),
            Err(e) => tracing::warn!("Skipping target: {}", e),
        }
    }

    targets
}

/// Resolves every target of the configuration, inline entries first
///
/// # Returns
///
/// * `Ok(Vec<Target>)` - All targets, possibly empty
/// * `Err(ConfigError)` - The targets file could not be read or an inline entry is invalid
pub fn resolve_targets(config: &Config) -> Result<Vec<Target>, ConfigError> {
    let mut targets = Vec::new();

    for entry in &config.targets {
        let target = Target::new(&entry.url, entry.quota, entry.start_page).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid target URL '{}': {}", entry.url, e))
        })?;
        targets.push(target);
    }

    if let Some(path) = &config.targets_file {
        let content = std::fs::read_to_string(path)?;
        let from_file = parse_targets_list(&content);
        tracing::debug!("Loaded {} targets from {}", from_file.len(), path);
        targets.extend(from_file);
    }

    Ok(targets)
}
