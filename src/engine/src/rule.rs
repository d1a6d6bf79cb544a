//! Declared policy rules, as written in a rule file.
//!
//! A rule carries exactly one payload, validation or mutation. On disk this
//! is a record with a `validate:` or a `mutate:` block; loading rejects a
//! record with both or neither.

use std::path::Path;

use chrono::{DateTime, Utc};
use image_warden_core::error::{Result, WardenError};
use serde::{Deserialize, Serialize};

/// Validation rule kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidateType {
    /// Matches the `latest` tag
    Latest,
    /// Matches tags satisfying a semantic version range
    SemVer,
    /// Matches one literal tag
    Lock,
    /// Matches tags whose image content changed over time
    RollingTag,
}

/// Mutation rule kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationType {
    /// Sets a registry on references that name none
    DefaultRegistry,
    /// Replaces a registry matching a pattern
    RewriteRegistry,
}

/// Allow or deny images matching a name pattern and a tag predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRule {
    #[serde(rename = "type")]
    pub kind: ValidateType,
    /// Regular expression searched in the image name. Empty matches everything.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image_name: String,
    /// Literal tag for `Lock`, version range for `SemVer`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image_tag: String,
    #[serde(default)]
    pub allow: bool,
    /// `RollingTag` only: history reported before this instant is ignored.
    #[serde(
        default,
        rename = "after",
        with = "after_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub rolling_tag_after: Option<DateTime<Utc>>,
}

impl ValidationRule {
    pub fn new(kind: ValidateType, allow: bool) -> Self {
        Self {
            kind,
            image_name: String::new(),
            image_tag: String::new(),
            allow,
            rolling_tag_after: None,
        }
    }

    pub fn image_name(mut self, pattern: impl Into<String>) -> Self {
        self.image_name = pattern.into();
        self
    }

    pub fn image_tag(mut self, tag: impl Into<String>) -> Self {
        self.image_tag = tag.into();
        self
    }

    pub fn after(mut self, after: DateTime<Utc>) -> Self {
        self.rolling_tag_after = Some(after);
        self
    }
}

/// Rewrite the registry domain of an image reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationRule {
    #[serde(rename = "type")]
    pub kind: MutationType,
    /// Literal registry for `DefaultRegistry`, pattern for `RewriteRegistry`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub registry: String,
    /// `RewriteRegistry` only. Older rule files spell it `newRegisty`.
    #[serde(default, alias = "newRegisty", skip_serializing_if = "String::is_empty")]
    pub new_registry: String,
}

impl MutationRule {
    pub fn default_registry(registry: impl Into<String>) -> Self {
        Self {
            kind: MutationType::DefaultRegistry,
            registry: registry.into(),
            new_registry: String::new(),
        }
    }

    pub fn rewrite_registry(pattern: impl Into<String>, new_registry: impl Into<String>) -> Self {
        Self {
            kind: MutationType::RewriteRegistry,
            registry: pattern.into(),
            new_registry: new_registry.into(),
        }
    }
}

/// The payload of a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RulePayload {
    Validate(ValidationRule),
    Mutate(MutationRule),
}

/// A named policy entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "RuleRecord")]
pub struct Rule {
    pub name: String,
    pub payload: RulePayload,
}

impl Rule {
    pub fn validation(name: impl Into<String>, rule: ValidationRule) -> Self {
        Self {
            name: name.into(),
            payload: RulePayload::Validate(rule),
        }
    }

    pub fn mutation(name: impl Into<String>, rule: MutationRule) -> Self {
        Self {
            name: name.into(),
            payload: RulePayload::Mutate(rule),
        }
    }

    pub fn as_validation(&self) -> Option<&ValidationRule> {
        match &self.payload {
            RulePayload::Validate(rule) => Some(rule),
            RulePayload::Mutate(_) => None,
        }
    }

    pub fn as_mutation(&self) -> Option<&MutationRule> {
        match &self.payload {
            RulePayload::Mutate(rule) => Some(rule),
            RulePayload::Validate(_) => None,
        }
    }
}

/// On-disk shape of a rule: both payload blocks optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RuleRecord {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    validate: Option<ValidationRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mutate: Option<MutationRule>,
}

impl From<Rule> for RuleRecord {
    fn from(rule: Rule) -> Self {
        let (validate, mutate) = match rule.payload {
            RulePayload::Validate(v) => (Some(v), None),
            RulePayload::Mutate(m) => (None, Some(m)),
        };
        Self {
            name: rule.name,
            validate,
            mutate,
        }
    }
}

impl TryFrom<RuleRecord> for Rule {
    type Error = WardenError;

    fn try_from(record: RuleRecord) -> Result<Self> {
        let payload = match (record.validate, record.mutate) {
            (Some(v), None) => RulePayload::Validate(v),
            (None, Some(m)) => RulePayload::Mutate(m),
            _ => return Err(WardenError::ConflictingRuleType { rule: record.name }),
        };
        Ok(Self {
            name: record.name,
            payload,
        })
    }
}

/// An ordered rule list, the top level of a rule file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuleSet {
    pub rules: Vec<Rule>,
}

#[derive(Deserialize)]
struct RuleSetRecord {
    #[serde(default)]
    rules: Vec<RuleRecord>,
}

impl RuleSet {
    /// Parse a YAML rule file body.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let record: RuleSetRecord = serde_yaml::from_str(yaml)?;
        let rules = record
            .rules
            .into_iter()
            .map(Rule::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Read and parse a YAML rule file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            WardenError::Config(format!("Failed to read rules {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&yaml)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// `after:` accepts RFC 3339 timestamps and bare `YYYY-MM-DD` dates.
mod after_date {
    use chrono::{DateTime, NaiveDate, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(t) => serializer.serialize_str(&t.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Some(raw) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        parse(&raw).map(Some).ok_or_else(|| {
            de::Error::custom(format!(
                "invalid date '{}', expected RFC 3339 or YYYY-MM-DD",
                raw
            ))
        })
    }

    pub(super) fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
            return Some(t.with_timezone(&Utc));
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|t| t.and_utc())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const RULES: &str = r#"
rules:
  - name: docker.io is default
    mutate:
      type: DefaultRegistry
      registry: docker.io
  - name: No latest
    validate:
      type: Latest
      allow: false
  - name: nginx newer than 1.0.0
    validate:
      type: SemVer
      imageName: docker\.io/nginx
      imageTag: ">= 1.0.0"
      allow: true
  - name: No rolling tags
    validate:
      type: RollingTag
      allow: false
      after: 2023-07-01
"#;

    #[test]
    fn test_from_yaml() {
        let set = RuleSet::from_yaml(RULES).unwrap();
        assert_eq!(set.rules.len(), 4);

        let mutation = set.rules[0].as_mutation().unwrap();
        assert_eq!(mutation.kind, MutationType::DefaultRegistry);
        assert_eq!(mutation.registry, "docker.io");

        let semver = set.rules[2].as_validation().unwrap();
        assert_eq!(semver.kind, ValidateType::SemVer);
        assert_eq!(semver.image_name, "docker\\.io/nginx");
        assert_eq!(semver.image_tag, ">= 1.0.0");
        assert!(semver.allow);

        let rolling = set.rules[3].as_validation().unwrap();
        assert_eq!(
            rolling.rolling_tag_after,
            Some(Utc.with_ymd_and_hms(2023, 7, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_new_registry_alias() {
        let yaml = r#"
rules:
  - name: old spelling
    mutate:
      type: RewriteRegistry
      registry: docker(.com|.net)
      newRegisty: docker.io
  - name: new spelling
    mutate:
      type: RewriteRegistry
      registry: quay
      newRegistry: quay.io
"#;
        let set = RuleSet::from_yaml(yaml).unwrap();
        assert_eq!(set.rules[0].as_mutation().unwrap().new_registry, "docker.io");
        assert_eq!(set.rules[1].as_mutation().unwrap().new_registry, "quay.io");
    }

    #[test]
    fn test_both_payloads_rejected() {
        let yaml = r#"
rules:
  - name: confused
    validate:
      type: Latest
    mutate:
      type: DefaultRegistry
      registry: docker.io
"#;
        let err = RuleSet::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, WardenError::ConflictingRuleType { rule } if rule == "confused"));
    }

    #[test]
    fn test_no_payload_rejected() {
        let err = RuleSet::from_yaml("rules:\n  - name: empty\n").unwrap_err();
        assert!(matches!(err, WardenError::ConflictingRuleType { .. }));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let yaml = "rules:\n  - name: x\n    validate:\n      type: Newest\n";
        assert!(matches!(
            RuleSet::from_yaml(yaml),
            Err(WardenError::Serialization(_))
        ));
    }

    #[test]
    fn test_empty_rule_file() {
        assert!(RuleSet::from_yaml("rules: []").unwrap().rules.is_empty());
    }

    #[test]
    fn test_after_formats() {
        assert_eq!(
            after_date::parse("2023-07-01T12:00:00+02:00"),
            Some(Utc.with_ymd_and_hms(2023, 7, 1, 10, 0, 0).unwrap())
        );
        assert_eq!(
            after_date::parse("2023-07-01"),
            Some(Utc.with_ymd_and_hms(2023, 7, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(after_date::parse("July 1st"), None);
    }

    #[test]
    fn test_to_yaml_reloads() {
        let set = RuleSet::from_yaml(RULES).unwrap();
        let yaml = set.to_yaml().unwrap();
        assert!(yaml.contains("validate:"));
        assert!(!yaml.contains("newRegisty"));
        assert_eq!(RuleSet::from_yaml(&yaml).unwrap(), set);
    }
}
