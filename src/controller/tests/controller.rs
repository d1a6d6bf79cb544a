//! Controller facade over a real store and rule file.

use std::sync::Arc;

use async_trait::async_trait;
use image_warden_controller::Controller;
use image_warden_core::error::Result;
use image_warden_core::ControllerConfig;
use image_warden_engine::{DigestInspector, Engine, RuleSet, NO_RULES};
use image_warden_repo::testing::{self, DIGEST_1, IMAGE_SHA_1, NODE_1, NODE_2};

const RULES: &str = r#"
rules:
  - name: docker.io is default
    mutate:
      type: DefaultRegistry
      registry: docker.io
  - name: rewrite .com and .net to .io
    mutate:
      type: RewriteRegistry
      registry: docker(.com|.net)
      newRegisty: docker.io
  - name: No rolling tags
    validate:
      type: RollingTag
      allow: false
  - name: Debian is any 12.x
    validate:
      type: SemVer
      imageName: debian
      imageTag: ">= 12.0.0, < 13.0.0"
      allow: true
  - name: Allow latest
    validate:
      type: Latest
      allow: true
"#;

struct StaticInspector(&'static str);

#[async_trait]
impl DigestInspector for StaticInspector {
    async fn get_digest(&self, _image: &str) -> Result<String> {
        Ok(self.0.to_string())
    }
}

fn open_controller(dir: &tempfile::TempDir) -> Controller {
    let rules_file = dir.path().join("rules.yaml");
    std::fs::write(&rules_file, RULES).unwrap();

    let config = ControllerConfig {
        store_file: dir.path().join("store.db"),
        rules_file,
        ..Default::default()
    };
    Controller::open(&config).unwrap()
}

#[tokio::test]
async fn test_report_and_get_report() {
    let dir = tempfile::tempdir().unwrap();
    let controller = open_controller(&dir);

    controller.report(&testing::report_1()).unwrap();
    controller.report(&testing::report_2()).unwrap();

    let nodes = controller.get_report("", false).unwrap();
    assert_eq!(nodes.len(), 2);

    let nodes = controller.get_report(NODE_1, false).unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].images[0].id, IMAGE_SHA_1);
    assert_eq!(nodes[0].image_filesystems.len(), 1);

    assert!(controller.get_report("unknown-node", true).unwrap().is_empty());
}

#[tokio::test]
async fn test_validate_and_mutate() {
    let dir = tempfile::tempdir().unwrap();
    let controller = open_controller(&dir);

    assert_eq!(
        controller.validate("debian:12.4").await,
        (true, "Debian is any 12.x".to_string())
    );
    assert_eq!(controller.validate("debian:11").await, (false, NO_RULES.to_string()));
    assert_eq!(
        controller.validate("nginx").await,
        (true, "Allow latest".to_string())
    );

    assert_eq!(
        controller.mutate("nginx:latest"),
        (
            "docker.io/nginx:latest".to_string(),
            vec!["docker.io is default".to_string()]
        )
    );
    assert_eq!(
        controller.mutate("docker.com/nginx:latest"),
        (
            "docker.io/nginx:latest".to_string(),
            vec!["rewrite .com and .net to .io".to_string()]
        )
    );
    assert_eq!(
        controller.mutate("ghcr.io/org/app:1.0"),
        ("ghcr.io/org/app:1.0".to_string(), Vec::new())
    );
}

#[tokio::test]
async fn test_rules_yaml_exports_declared_rules() {
    let dir = tempfile::tempdir().unwrap();
    let controller = open_controller(&dir);

    let exported = RuleSet::from_yaml(&controller.rules_yaml().unwrap()).unwrap();
    assert_eq!(exported, RuleSet::from_yaml(RULES).unwrap());
    assert_eq!(exported.rules.len(), 5);
}

#[tokio::test]
async fn test_rolling_tag_through_reports() {
    let (_dir, repo) = testing::new_test_repo();
    let engine = Engine::new(RuleSet::from_yaml(RULES).unwrap().rules)
        .unwrap()
        .with_repo(repo.clone())
        .with_inspector(Arc::new(StaticInspector(DIGEST_1)));
    let controller = Controller::new(repo, engine);

    controller.report(&testing::report_rolling_tags()).unwrap();

    assert_eq!(
        controller.validate("k8s-image-warden-agent:latest").await,
        (false, "No rolling tags".to_string())
    );
    // Single id whose recorded digest is still what the registry serves.
    assert_eq!(
        controller.validate("k8s-image-warden-controller:latest").await,
        (true, "Allow latest".to_string())
    );

    let nodes = controller.get_report(NODE_2, false).unwrap();
    assert_eq!(nodes[0].images.len(), 3);
}

#[tokio::test]
async fn test_ingest_only_controller() {
    let (_dir, repo) = testing::new_test_repo();
    let controller = Controller::without_rules(repo).unwrap();

    controller.report(&testing::report_1()).unwrap();
    let nodes = controller.get_report(NODE_1, false).unwrap();
    assert_eq!(nodes[0].images[0].id, IMAGE_SHA_1);

    assert_eq!(controller.validate("nginx:latest").await, (false, NO_RULES.to_string()));
    assert_eq!(controller.mutate("nginx:latest"), ("nginx:latest".to_string(), Vec::new()));
}

#[test]
fn test_open_fails_on_missing_rules() {
    let dir = tempfile::tempdir().unwrap();
    let config = ControllerConfig {
        store_file: dir.path().join("store.db"),
        rules_file: dir.path().join("missing.yaml"),
        ..Default::default()
    };
    assert!(Controller::open(&config).is_err());
}
