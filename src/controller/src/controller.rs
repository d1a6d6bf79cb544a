//! Decision and ingestion facade over the report repository and rule engine.

use std::sync::Arc;

use image_warden_core::error::Result;
use image_warden_core::{ControllerConfig, Report};
use image_warden_engine::{Engine, RegistryInspector};
use image_warden_repo::{convert_report, Node, Repo, RepoOptions};

/// What callers (admission webhook, RPC, CLI) talk to.
#[derive(Clone)]
pub struct Controller {
    repo: Repo,
    engine: Arc<Engine>,
}

impl Controller {
    pub fn new(repo: Repo, engine: Engine) -> Self {
        Self {
            repo,
            engine: Arc::new(engine),
        }
    }

    /// Facade for ingestion only: reports are stored, and every image is
    /// rejected with `<No Rules>`.
    pub fn without_rules(repo: Repo) -> Result<Self> {
        Ok(Self::new(repo, Engine::new(Vec::new())?))
    }

    /// Open the store and compile the rule file named by `config`.
    ///
    /// `RollingTag` rules use the store for history and the registry
    /// (credentials from the environment) for live digests.
    pub fn open(config: &ControllerConfig) -> Result<Self> {
        config.validate()?;

        let repo = Repo::open(&config.store_file, RepoOptions::from(config))?;
        let engine = Engine::from_file(&config.rules_file)?
            .with_repo(repo.clone())
            .with_inspector(Arc::new(RegistryInspector::new()))
            .with_inspect_timeout(config.inspect_timeout());

        tracing::info!(
            store = %config.store_file.display(),
            rules = %config.rules_file.display(),
            "Controller opened"
        );
        Ok(Self::new(repo, engine))
    }

    pub fn repo(&self) -> &Repo {
        &self.repo
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Store one agent report. Returns the node's row id.
    pub fn report(&self, report: &Report) -> Result<i64> {
        let (node, filesystems, images) = convert_report(report);
        let node_id = self.repo.store_report(&node, &filesystems, &images)?;
        tracing::info!(
            node = %node.nodename,
            pod = %node.podname,
            images = images.len(),
            "Received report"
        );
        Ok(node_id)
    }

    pub async fn validate(&self, image: &str) -> (bool, String) {
        let (allowed, rule) = self.engine.validate(image).await;
        tracing::info!(image, allowed, rule = %rule, "Validated image");
        (allowed, rule)
    }

    pub fn mutate(&self, image: &str) -> (String, Vec<String>) {
        let (mutated, rules) = self.engine.mutate(image);
        tracing::info!(image, mutated = %mutated, rules = ?rules, "Mutated image");
        (mutated, rules)
    }

    /// The rule set as a YAML rule file.
    pub fn rules_yaml(&self) -> Result<String> {
        self.engine.rules_yaml()
    }

    /// Nodes with their reports. An empty `node` selects every node; `all`
    /// includes silent nodes and history.
    pub fn get_report(&self, node: &str, all: bool) -> Result<Vec<Node>> {
        tracing::debug!(node, all, "GetReport request");
        self.repo.get_report_for_node(node, all)
    }
}
