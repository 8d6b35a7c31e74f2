//! Run orchestration
//!
//! Wires the configured collaborators together and drives one harvest run:
//! - Opening the dedup store and the accepted-domain log
//! - Building the classifier, the quota controller and the egress rotation
//! - Running every target through the rotation
//! - Writing the run report

use crate::classify::{AffiliationMatcher, Classifier, MxResolver};
use crate::config::Config;
use crate::crawler::{
    CrawlSettings, CrawlState, HtmlParser, HttpFetcherFactory, QuotaCrawler, Target,
};
use crate::egress::{
    profiles_from_config, provider_from_config, EgressProfile, EgressProvider, EgressRotation,
};
use crate::output::{publish_report, AcceptedLog, RunReport, TargetOutcome};
use crate::storage::{open_dedup_store, DedupStore};
use crate::{HarvestError, Result};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

/// One configured harvest run
pub struct Harvester {
    config: Config,
    config_hash: String,
    dedup: DedupStore,
    accepted: Arc<AcceptedLog>,
    classifier: Classifier,
    provider: Arc<dyn EgressProvider>,
    profiles: Vec<EgressProfile>,
    stop: Arc<AtomicBool>,
}

impl Harvester {
    /// Creates a harvester from a validated configuration
    ///
    /// # Arguments
    ///
    /// * `config` - The harvest configuration
    /// * `config_hash` - Hash of the configuration file, recorded in the report
    ///
    /// # Returns
    ///
    /// * `Ok(Harvester)` - Logs opened and collaborators built
    /// * `Err(HarvestError)` - The dedup store or the accepted log could not be opened
    pub fn new(config: Config, config_hash: impl Into<String>) -> Result<Self> {
        let dedup = open_dedup_store(
            config.output.dedup_backend,
            Path::new(&config.output.dedup_log_path),
        )?;
        tracing::info!("Dedup store: {}", dedup.describe());

        let accepted = Arc::new(AcceptedLog::open(Path::new(
            &config.output.accepted_log_path,
        ))?);

        let classifier = Classifier::from_config(&config.classifier);
        let provider = provider_from_config(&config.egress);
        let profiles = profiles_from_config(&config.egress);

        Ok(Self {
            config,
            config_hash: config_hash.into(),
            dedup,
            accepted,
            classifier,
            provider,
            profiles,
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Replaces the system DNS resolver
    pub fn with_resolver(mut self, resolver: Arc<dyn MxResolver>) -> Self {
        self.classifier = Classifier::new(
            resolver,
            AffiliationMatcher::new(&self.config.classifier.affiliate_patterns),
            Duration::from_secs(self.config.classifier.dns_timeout_secs),
        );
        self
    }

    /// Replaces the configured egress provider and its profiles
    pub fn with_egress(
        mut self,
        provider: Arc<dyn EgressProvider>,
        profiles: Vec<EgressProfile>,
    ) -> Self {
        self.provider = provider;
        self.profiles = profiles;
        self
    }

    /// Flag that asks the run to stop at the next page boundary
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn profiles(&self) -> &[EgressProfile] {
        &self.profiles
    }

    pub fn dedup(&self) -> &DedupStore {
        &self.dedup
    }

    /// Runs every target through the egress rotation and writes the report
    ///
    /// A report that cannot be written is logged and does not fail the run.
    pub async fn run(self, targets: Vec<Target>) -> Result<RunReport> {
        if targets.is_empty() {
            return Err(HarvestError::NoTargets);
        }

        tracing::info!(
            "Harvesting {} targets through {} egress profiles ({} domains already known)",
            targets.len(),
            self.profiles.len(),
            self.dedup.len()
        );

        let settings = CrawlSettings::from_config(&self.config.crawler, &self.config.classifier);
        let crawler = QuotaCrawler::new(
            settings,
            Arc::new(HtmlParser),
            self.classifier,
            self.dedup.clone(),
            Arc::clone(&self.accepted),
            Arc::clone(&self.stop),
        );

        let fetchers = Arc::new(HttpFetcherFactory::new(
            self.config.crawler.user_agent.clone(),
            Duration::from_secs(self.config.crawler.page_timeout_secs),
        ));

        let rotation = EgressRotation::new(
            self.provider,
            self.profiles,
            fetchers,
            crawler,
            Duration::from_secs(self.config.egress.acquire_timeout_secs),
            Arc::clone(&self.stop),
        )
        .with_identity_probe(self.config.egress.identity_probe_url.clone());

        let retry_cap = self.config.crawler.retry_budget;
        let mut states: Vec<CrawlState> =
            targets.iter().map(|t| CrawlState::new(t, retry_cap)).collect();

        let mut report = RunReport::new(self.config_hash);
        rotation.run(&targets, &mut states, &mut report).await;

        report.known_domains = self.dedup.len();
        report.finish(&targets, &states);

        tracing::info!(
            "Run finished: {} of {} accepted, {} targets satisfied",
            report.total_accepted(),
            report.total_quota(),
            report.count_outcome(TargetOutcome::Satisfied)
        );

        publish_report(&report, Path::new(&self.config.output.report_path));

        Ok(report)
    }
}

/// Loads the targets of `config` and runs them
///
/// # Example
///
/// ```no_run
/// use mx_harvest::config::load_config_with_hash;
/// use mx_harvest::harvest::run_harvest;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("harvest.toml"))?;
/// let report = run_harvest(config, hash).await?;
/// println!("{} accepted", report.total_accepted());
/// # Ok(())
/// # }
/// ```
pub async fn run_harvest(config: Config, config_hash: String) -> Result<RunReport> {
    let targets = crate::config::resolve_targets(&config)?;
    let harvester = Harvester::new(config, config_hash)?;
    harvester.run(targets).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        ClassifierConfig, CrawlerConfig, DedupBackend, EgressConfig, OutputConfig,
    };
    use crate::crawler::testing::StaticResolver;

    fn create_test_config(dir: &Path) -> Config {
        Config {
            crawler: CrawlerConfig::default(),
            classifier: ClassifierConfig::default(),
            egress: EgressConfig::default(),
            output: OutputConfig {
                dedup_log_path: dir.join("seen.txt").display().to_string(),
                dedup_backend: DedupBackend::Lines,
                accepted_log_path: dir.join("accepted.txt").display().to_string(),
                report_path: dir.join("report.md").display().to_string(),
            },
            targets_file: None,
            targets: vec![],
        }
    }

    #[tokio::test]
    async fn test_new_opens_logs() {
        let dir = tempfile::tempdir().unwrap();
        let harvester = Harvester::new(create_test_config(dir.path()), "hash").unwrap();

        assert!(dir.path().join("seen.txt").exists());
        assert!(dir.path().join("accepted.txt").exists());
        assert_eq!(harvester.profiles().len(), 1);
        assert!(harvester.dedup().is_empty());
    }

    #[tokio::test]
    async fn test_run_without_targets_fails() {
        let dir = tempfile::tempdir().unwrap();
        let harvester = Harvester::new(create_test_config(dir.path()), "hash")
            .unwrap()
            .with_resolver(Arc::new(StaticResolver::new()));

        let result = harvester.run(Vec::new()).await;
        assert!(matches!(result, Err(HarvestError::NoTargets)));
        assert!(!dir.path().join("report.md").exists());
    }
}
