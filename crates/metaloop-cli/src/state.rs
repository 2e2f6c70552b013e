//! Application state wiring the flywheel to concrete adapters.
//!
//! Phases are generic over their ports; `AppState` pins them to the local
//! infra implementations (snapshot metrics, JSON-lines outcome log, prompt
//! directory on disk, Anthropic provider).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use secrecy::SecretString;

use metaloop_core::audit::AuditLog;
use metaloop_core::generator::Generator;
use metaloop_core::learner::Learner;
use metaloop_core::llm::box_provider::BoxLlmProvider;
use metaloop_core::tracker::Tracker;
use metaloop_infra::config::{SITE_ENV, apply_site_override, load_config};
use metaloop_infra::filesystem::{FilePromptStore, LocalFileSystem, prompt_store};
use metaloop_infra::llm::anthropic::AnthropicProvider;
use metaloop_infra::metrics::SnapshotMetricsSource;
use metaloop_infra::outcome::JsonlOutcomeStore;
use metaloop_types::config::LoopConfig;

/// Environment variable holding the Anthropic API key.
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

pub type ConcreteTracker = Tracker<SnapshotMetricsSource>;
pub type ConcreteLearner = Learner<LocalFileSystem>;

#[derive(Clone)]
pub struct AppState {
    pub config: LoopConfig,
    pub audit: AuditLog,
}

impl AppState {
    /// Load config and open the outcome log. No network access happens here;
    /// the LLM provider is built on demand by the commands that need it.
    pub async fn init(config_path: &Path) -> anyhow::Result<Self> {
        let mut config = load_config(config_path).await;
        apply_site_override(&mut config, std::env::var(SITE_ENV).ok());

        let store = JsonlOutcomeStore::new(&config.paths.outcomes);
        tracing::debug!(outcomes = %store.path().display(), "opened outcome log");
        let audit = AuditLog::new(Arc::new(store));

        Ok(Self { config, audit })
    }

    pub fn site(&self) -> anyhow::Result<&str> {
        if self.config.site.trim().is_empty() {
            bail!("no site configured: set `site` in the config file or {SITE_ENV}");
        }
        Ok(&self.config.site)
    }

    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(&self.config.paths.output)
    }

    pub fn candidates_path(&self) -> PathBuf {
        PathBuf::from(&self.config.paths.candidates)
    }

    pub fn prompt_store(&self) -> FilePromptStore {
        prompt_store(&self.config.paths.prompts_dir)
    }

    pub async fn metrics(&self) -> anyhow::Result<SnapshotMetricsSource> {
        let path = Path::new(&self.config.paths.metrics);
        SnapshotMetricsSource::open(path)
            .await
            .with_context(|| format!("loading metrics snapshot {}", path.display()))
    }

    /// The snapshot, or an unavailable source carrying the load error.
    pub async fn metrics_or_unavailable(&self) -> SnapshotMetricsSource {
        SnapshotMetricsSource::open_or_unavailable(Path::new(&self.config.paths.metrics)).await
    }

    pub fn provider(&self) -> anyhow::Result<Arc<BoxLlmProvider>> {
        let key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .with_context(|| format!("{API_KEY_ENV} is not set"))?;
        let provider = AnthropicProvider::new(SecretString::from(key))?;
        Ok(Arc::new(BoxLlmProvider::new(provider)))
    }

    pub fn tracker(&self, metrics: SnapshotMetricsSource) -> anyhow::Result<ConcreteTracker> {
        Ok(Tracker::new(
            metrics,
            self.audit.clone(),
            self.config.tracker.clone(),
            self.site()?,
        ))
    }

    pub fn learner(&self, provider: Arc<BoxLlmProvider>) -> ConcreteLearner {
        Learner::new(
            provider,
            self.audit.clone(),
            self.prompt_store(),
            self.config.learner.clone(),
        )
    }

    pub fn generator(&self, provider: Arc<BoxLlmProvider>) -> Generator {
        Generator::with_default_chain(provider, self.audit.clone(), self.config.generator.clone())
    }
}
