use serde::Deserialize;

/// Main configuration structure for MX-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub egress: EgressConfig,
    pub output: OutputConfig,

    /// Optional file of `URL ///// COUNT` lines
    #[serde(rename = "targets-file", default)]
    pub targets_file: Option<String>,

    #[serde(rename = "target", default)]
    pub targets: Vec<TargetEntry>,
}

/// Crawl controller configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Highest directory page number that will be requested
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,

    /// Gap retries allowed before a gap is abandoned
    #[serde(rename = "retry-budget", default = "default_retry_budget")]
    pub retry_budget: u32,

    /// Load timeout for a single page (seconds)
    #[serde(rename = "page-timeout-secs", default = "default_page_timeout_secs")]
    pub page_timeout_secs: u64,

    /// Path substring identifying entity profile links
    #[serde(rename = "entity-path-pattern", default = "default_entity_path_pattern")]
    pub entity_path_pattern: String,

    /// CSS selector of the website field on an entity page
    #[serde(rename = "website-selector", default = "default_website_selector")]
    pub website_selector: String,

    /// Consecutive directory-page failures before a target yields its session (0 disables)
    #[serde(rename = "failure-streak-limit", default = "default_failure_streak_limit")]
    pub failure_streak_limit: u32,

    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,
}

/// Classification gate configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    #[serde(rename = "dns-timeout-secs", default = "default_dns_timeout_secs")]
    pub dns_timeout_secs: u64,

    /// Concurrent MX lookups per directory page
    #[serde(rename = "max-concurrent-lookups", default = "default_max_concurrent_lookups")]
    pub max_concurrent_lookups: usize,

    #[serde(rename = "affiliate-patterns", default = "default_affiliate_patterns")]
    pub affiliate_patterns: Vec<String>,
}

/// Which egress provider drives the session loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Direct,
    Wireguard,
    Socks5,
}

/// Egress rotation configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EgressConfig {
    #[serde(default = "default_provider")]
    pub provider: ProviderKind,

    /// Ordered profiles: WireGuard config paths or SOCKS5 `host:port` relays
    #[serde(default)]
    pub profiles: Vec<String>,

    /// Wait after bringing a tunnel up (seconds)
    #[serde(rename = "settle-secs", default = "default_settle_secs")]
    pub settle_secs: u64,

    #[serde(rename = "acquire-timeout-secs", default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,

    #[serde(rename = "use-sudo", default = "default_true")]
    pub use_sudo: bool,

    /// URL returning the public IP as plain text; empty disables the probe
    #[serde(rename = "identity-probe-url", default = "default_identity_probe_url")]
    pub identity_probe_url: String,

    /// Resolve fetched hostnames through the SOCKS5 relay
    #[serde(rename = "remote-dns", default)]
    pub remote_dns: bool,
}

/// Durable log format of the dedup store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DedupBackend {
    Lines,
    Sqlite,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Every domain ever submitted for classification
    #[serde(rename = "dedup-log-path")]
    pub dedup_log_path: String,

    #[serde(rename = "dedup-backend", default = "default_dedup_backend")]
    pub dedup_backend: DedupBackend,

    /// Newly accepted affiliated domains, one per line
    #[serde(rename = "accepted-log-path")]
    pub accepted_log_path: String,

    /// Markdown run report
    #[serde(rename = "report-path")]
    pub report_path: String,
}

/// A directory target declared inline
#[derive(Debug, Clone, Deserialize)]
pub struct TargetEntry {
    pub url: String,
    pub quota: u32,
    #[serde(rename = "start-page", default)]
    pub start_page: Option<u32>,
}

fn default_max_pages() -> u32 {
    20
}

fn default_retry_budget() -> u32 {
    3
}

fn default_page_timeout_secs() -> u64 {
    60
}

fn default_entity_path_pattern() -> String {
    "/business-directory/company-profiles.".to_string()
}

fn default_website_selector() -> String {
    "a#hero-company-link".to_string()
}

fn default_failure_streak_limit() -> u32 {
    5
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

fn default_dns_timeout_secs() -> u64 {
    5
}

fn default_max_concurrent_lookups() -> usize {
    4
}

fn default_affiliate_patterns() -> Vec<String> {
    crate::classify::DEFAULT_AFFILIATE_PATTERNS
        .iter()
        .map(|p| p.to_string())
        .collect()
}

fn default_provider() -> ProviderKind {
    ProviderKind::Direct
}

fn default_settle_secs() -> u64 {
    5
}

fn default_acquire_timeout_secs() -> u64 {
    120
}

fn default_true() -> bool {
    true
}

fn default_identity_probe_url() -> String {
    "https://ifconfig.me/ip".to_string()
}

fn default_dedup_backend() -> DedupBackend {
    DedupBackend::Lines
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            retry_budget: default_retry_budget(),
            page_timeout_secs: default_page_timeout_secs(),
            entity_path_pattern: default_entity_path_pattern(),
            website_selector: default_website_selector(),
            failure_streak_limit: default_failure_streak_limit(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            dns_timeout_secs: default_dns_timeout_secs(),
            max_concurrent_lookups: default_max_concurrent_lookups(),
            affiliate_patterns: default_affiliate_patterns(),
        }
    }
}

impl Default for EgressConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            profiles: Vec::new(),
            settle_secs: default_settle_secs(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
            use_sudo: true,
            identity_probe_url: default_identity_probe_url(),
            remote_dns: false,
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::Wireguard => write!(f, "wireguard"),
            Self::Socks5 => write!(f, "socks5"),
        }
    }
}
