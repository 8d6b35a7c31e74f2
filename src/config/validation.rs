use crate::config::types::{
    ClassifierConfig, Config, CrawlerConfig, EgressConfig, OutputConfig, ProviderKind, TargetEntry,
};
use crate::url::directory_base;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_classifier_config(&config.classifier)?;
    validate_egress_config(&config.egress)?;
    validate_output_config(&config.output)?;
    validate_targets(&config.targets, config.crawler.max_pages)?;

    if let Some(path) = &config.targets_file {
        if path.trim().is_empty() {
            return Err(ConfigError::Validation(
                "targets-file cannot be empty".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max-pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    if config.page_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "page-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.entity_path_pattern.trim().is_empty() {
        return Err(ConfigError::Validation(
            "entity-path-pattern cannot be empty".to_string(),
        ));
    }

    if scraper::Selector::parse(&config.website_selector).is_err() {
        return Err(ConfigError::Validation(format!(
            "website-selector '{}' is not a valid CSS selector",
            config.website_selector
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates classifier configuration
fn validate_classifier_config(config: &ClassifierConfig) -> Result<(), ConfigError> {
    if config.dns_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "dns-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.max_concurrent_lookups < 1 || config.max_concurrent_lookups > 8 {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-lookups must be between 1 and 8, got {}",
            config.max_concurrent_lookups
        )));
    }

    if config.affiliate_patterns.iter().all(|p| p.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "affiliate-patterns must contain at least one pattern".to_string(),
        ));
    }

    Ok(())
}

/// Validates egress configuration
fn validate_egress_config(config: &EgressConfig) -> Result<(), ConfigError> {
    if config.acquire_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "acquire-timeout-secs must be >= 1".to_string(),
        ));
    }

    match config.provider {
        ProviderKind::Direct => {
            if !config.profiles.is_empty() {
                tracing::warn!("egress profiles are ignored by the direct provider");
            }
        }
        ProviderKind::Wireguard | ProviderKind::Socks5 => {
            if config.profiles.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "provider '{}' needs at least one profile",
                    config.provider
                )));
            }
        }
    }

    if config.provider == ProviderKind::Socks5 {
        for profile in &config.profiles {
            validate_socks_address(profile)?;
        }
    }

    if !config.identity_probe_url.is_empty() {
        let url = Url::parse(&config.identity_probe_url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid identity-probe-url: {}", e))
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "identity-probe-url must be http or https, got '{}'",
                config.identity_probe_url
            )));
        }
    }

    Ok(())
}

/// Validates a SOCKS5 relay address of the form `host:port`
fn validate_socks_address(address: &str) -> Result<(), ConfigError> {
    let invalid = || {
        ConfigError::Validation(format!(
            "SOCKS5 profile '{}' must be of the form host:port",
            address
        ))
    };

    let (host, port) = address.trim().rsplit_once(':').ok_or_else(invalid)?;
    if host.is_empty() || host.contains("://") {
        return Err(invalid());
    }
    match port.parse::<u16>() {
        Ok(p) if p > 0 => Ok(()),
        _ => Err(invalid()),
    }
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    for (key, value) in [
        ("dedup-log-path", &config.dedup_log_path),
        ("accepted-log-path", &config.accepted_log_path),
        ("report-path", &config.report_path),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", key)));
        }
    }

    if config.dedup_log_path == config.accepted_log_path {
        return Err(ConfigError::Validation(
            "dedup-log-path and accepted-log-path must differ".to_string(),
        ));
    }

    Ok(())
}

/// Validates inline target entries
fn validate_targets(targets: &[TargetEntry], max_pages: u32) -> Result<(), ConfigError> {
    for entry in targets {
        directory_base(&entry.url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid target URL '{}': {}", entry.url, e))
        })?;

        if entry.quota < 1 {
            return Err(ConfigError::Validation(format!(
                "Target '{}' must have a quota >= 1",
                entry.url
            )));
        }

        if let Some(start) = entry.start_page {
            if start < 1 || start > max_pages {
                return Err(ConfigError::Validation(format!(
                    "Target '{}' start-page must be between 1 and max-pages ({}), got {}",
                    entry.url, max_pages, start
                )));
            }
        }
    }

    Ok(())
}
