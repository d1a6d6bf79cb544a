//! Rule engine: ordered validation and mutation of image references.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use image_warden_core::error::Result;
use image_warden_repo::Repo;

use crate::compile::{
    compile, parse_tag_version, CompiledPayload, CompiledRule, CompiledValidation, TagPredicate,
};
use crate::inspect::DigestInspector;
use crate::reference::{parse_image_reference, ImageReference, DEFAULT_TAG};
use crate::rolling::RollingTagCheck;
use crate::rule::{Rule, RuleSet};

/// Rule name reported when no validation rule matches.
pub const NO_RULES: &str = "<No Rules>";

/// Default bound on one registry digest lookup.
pub const DEFAULT_INSPECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Evaluates an ordered, compiled rule set.
///
/// Immutable after construction; share it behind an `Arc` to evaluate
/// concurrently.
pub struct Engine {
    rules: Vec<Rule>,
    compiled: Vec<CompiledRule>,
    repo: Option<Repo>,
    inspector: Option<Arc<dyn DigestInspector>>,
    inspect_timeout: Duration,
}

impl Engine {
    /// Compile `rules`. Fails on the first rule that does not compile.
    pub fn new(rules: Vec<Rule>) -> Result<Self> {
        let compiled = rules.iter().map(compile).collect::<Result<Vec<_>>>()?;

        let validations = compiled
            .iter()
            .filter(|r| matches!(r.payload, CompiledPayload::Validate(_)))
            .count();
        tracing::info!(
            rules = compiled.len(),
            validations,
            mutations = compiled.len() - validations,
            "Compiled rules"
        );

        Ok(Self {
            rules,
            compiled,
            repo: None,
            inspector: None,
            inspect_timeout: DEFAULT_INSPECT_TIMEOUT,
        })
    }

    /// Read and compile a YAML rule file.
    pub fn from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading rules");
        Self::new(RuleSet::from_file(path)?.rules)
    }

    /// History source for `RollingTag` rules.
    pub fn with_repo(mut self, repo: Repo) -> Self {
        self.repo = Some(repo);
        self
    }

    /// Live digest source for `RollingTag` rules.
    pub fn with_inspector(mut self, inspector: Arc<dyn DigestInspector>) -> Self {
        self.inspector = Some(inspector);
        self
    }

    pub fn with_inspect_timeout(mut self, timeout: Duration) -> Self {
        self.inspect_timeout = timeout;
        self
    }

    /// Declared rules, in order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Declared rules as a YAML rule file.
    pub fn rules_yaml(&self) -> Result<String> {
        RuleSet {
            rules: self.rules.clone(),
        }
        .to_yaml()
    }

    /// Decide whether `image_ref` is admitted.
    ///
    /// Returns the `allow` flag and name of the first matching validation
    /// rule, or `(false, "<No Rules>")` when none matches.
    pub async fn validate(&self, image_ref: &str) -> (bool, String) {
        let (name, tag) = parse_image_reference(image_ref);

        for rule in &self.compiled {
            let CompiledPayload::Validate(validation) = &rule.payload else {
                continue;
            };
            if self.matches(validation, &name, &tag).await {
                tracing::debug!(
                    image = image_ref,
                    rule = %rule.name,
                    allow = validation.allow,
                    "Validation rule matched"
                );
                return (validation.allow, rule.name.clone());
            }
        }

        tracing::debug!(image = image_ref, "No validation rule matched");
        (false, NO_RULES.to_string())
    }

    async fn matches(&self, rule: &CompiledValidation, name: &str, tag: &str) -> bool {
        if !rule.name.matches(name) {
            return false;
        }

        match &rule.predicate {
            TagPredicate::Latest => tag == DEFAULT_TAG,
            TagPredicate::Lock(locked) => tag == locked.as_str(),
            TagPredicate::SemVer(constraint) => {
                parse_tag_version(tag).is_some_and(|version| constraint.matches(&version))
            }
            TagPredicate::RollingTag { after } => {
                let Some(repo) = &self.repo else {
                    tracing::warn!(image = name, "RollingTag rule without a report repository");
                    return false;
                };
                RollingTagCheck {
                    repo,
                    inspector: self.inspector.as_deref(),
                    timeout: self.inspect_timeout,
                }
                .is_rolling_tag(name, tag, *after)
                .await
            }
        }
    }

    /// Rewrite the registry of `image_ref`.
    ///
    /// Every mutation rule is applied in order to the running registry
    /// domain. Returns the rewritten `domain/path:tag` (any digest is dropped)
    /// and the names of the rules that applied, or the input unchanged and no
    /// names. A reference that
    /// does not parse or has no tag comes back unchanged with the parse
    /// error as its only entry.
    pub fn mutate(&self, image_ref: &str) -> (String, Vec<String>) {
        let (reference, tag) = match ImageReference::parse(image_ref) {
            Ok(reference) => match reference.tag.clone() {
                Some(tag) => (reference, tag),
                None => {
                    let err = image_warden_core::WardenError::InvalidReference(format!(
                        "'{}': reference has no tag",
                        image_ref
                    ));
                    return (image_ref.to_string(), vec![err.to_string()]);
                }
            },
            Err(e) => return (image_ref.to_string(), vec![e.to_string()]),
        };

        let mut domain = reference.domain.clone();
        let mut applied = Vec::new();
        for rule in &self.compiled {
            let CompiledPayload::Mutate(mutation) = &rule.payload else {
                continue;
            };
            if let Some(new_domain) = mutation.apply(&domain) {
                domain = new_domain;
                applied.push(rule.name.clone());
            }
        }

        if applied.is_empty() {
            return (image_ref.to_string(), applied);
        }

        let mutated = format!("{}:{}", reference.with_domain(domain).name(), tag);
        tracing::debug!(image = image_ref, mutated = %mutated, rules = ?applied, "Mutated image");
        (mutated, applied)
    }
}
