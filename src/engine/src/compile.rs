//! Rule compilation.
//!
//! Turns declared rules into ready-to-evaluate ones: name and registry
//! patterns become `Regex`, SemVer tags become version requirements. Compiled
//! rules are immutable and shared across concurrent evaluations.

use chrono::{DateTime, Utc};
use image_warden_core::error::{Result, WardenError};
use regex::Regex;
use semver::{Version, VersionReq};

use crate::rule::{MutationRule, MutationType, Rule, RulePayload, ValidateType, ValidationRule};

/// How a validation rule selects image names.
#[derive(Debug, Clone)]
pub enum NameMatcher {
    /// Empty pattern: every name, including the empty one
    Any,
    /// Unanchored search in the name
    Pattern(Regex),
}

impl NameMatcher {
    pub fn matches(&self, name: &str) -> bool {
        match self {
            NameMatcher::Any => true,
            NameMatcher::Pattern(re) => re.is_match(name),
        }
    }
}

/// A version range. Alternatives separated by `||` are OR-ed; comparators
/// inside one alternative (comma or space separated) are AND-ed.
///
/// Written the way image tag constraints usually are: a bare version is an
/// exact match, `a - b` is an inclusive range, `!=` excludes one version,
/// and versions may carry a `v` prefix.
#[derive(Debug, Clone)]
pub struct VersionConstraint {
    alternatives: Vec<Alternative>,
}

#[derive(Debug, Clone)]
struct Alternative {
    required: VersionReq,
    excluded: Vec<VersionReq>,
}

impl Alternative {
    fn matches(&self, version: &Version) -> bool {
        self.required.matches(version) && !self.excluded.iter().any(|req| req.matches(version))
    }
}

impl VersionConstraint {
    pub fn parse(constraint: &str) -> std::result::Result<Self, String> {
        let alternatives = constraint
            .split("||")
            .map(parse_alternative)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { alternatives })
    }

    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|alt| alt.matches(version))
    }
}

fn is_operator(c: char) -> bool {
    matches!(c, '=' | '<' | '>' | '!' | '~' | '^')
}

fn parse_alternative(alternative: &str) -> std::result::Result<Alternative, String> {
    let tokens: Vec<&str> = alternative
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .collect();
    if tokens.is_empty() {
        return Err(format!("empty version constraint '{}'", alternative.trim()));
    }

    let mut required = Vec::new();
    let mut excluded = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let mut comparator = tokens[i].to_string();
        if comparator.chars().all(is_operator) {
            i += 1;
            let version = tokens
                .get(i)
                .ok_or_else(|| format!("operator '{}' without a version", comparator))?;
            comparator.push_str(version);
        }

        if tokens.get(i + 1) == Some(&"-") {
            let upper = tokens
                .get(i + 2)
                .ok_or_else(|| format!("range '{} -' without an upper bound", comparator))?;
            if comparator.starts_with(is_operator) || upper.starts_with(is_operator) {
                return Err(format!("invalid range '{} - {}'", comparator, upper));
            }
            required.push(format!(">={}", strip_v(&comparator)));
            required.push(format!("<={}", strip_v(upper)));
            i += 3;
            continue;
        }

        let split = comparator
            .find(|c: char| !is_operator(c))
            .unwrap_or(comparator.len());
        let (op, version) = comparator.split_at(split);
        let version = strip_v(version);
        let is_wildcard = version
            .split('.')
            .any(|part| matches!(part, "*" | "x" | "X"));
        match op {
            "!=" => excluded.push(parse_req(&format!("={}", version))?),
            "" if is_wildcard => required.push(version.to_string()),
            "" | "==" => required.push(format!("={}", version)),
            "=>" => required.push(format!(">={}", version)),
            "=<" => required.push(format!("<={}", version)),
            _ => required.push(format!("{}{}", op, version)),
        }
        i += 1;
    }

    let required = if required.is_empty() {
        VersionReq::STAR
    } else {
        parse_req(&required.join(", "))?
    };
    Ok(Alternative { required, excluded })
}

fn strip_v(version: &str) -> &str {
    version.strip_prefix('v').unwrap_or(version)
}

fn parse_req(req: &str) -> std::result::Result<VersionReq, String> {
    VersionReq::parse(req).map_err(|e| e.to_string())
}

/// Validation predicate per rule kind.
#[derive(Debug, Clone)]
pub enum TagPredicate {
    Latest,
    Lock(String),
    SemVer(VersionConstraint),
    RollingTag { after: DateTime<Utc> },
}

#[derive(Debug, Clone)]
pub struct CompiledValidation {
    pub name: NameMatcher,
    pub predicate: TagPredicate,
    pub allow: bool,
}

#[derive(Debug, Clone)]
pub enum CompiledMutation {
    DefaultRegistry(String),
    RewriteRegistry { pattern: Regex, new_registry: String },
}

impl CompiledMutation {
    /// Apply to the running registry domain. Returns the new domain when the
    /// rule applies.
    pub fn apply(&self, domain: &str) -> Option<String> {
        match self {
            CompiledMutation::DefaultRegistry(registry) if domain.is_empty() => {
                Some(registry.clone())
            }
            CompiledMutation::RewriteRegistry {
                pattern,
                new_registry,
            } if pattern.is_match(domain) => Some(new_registry.clone()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum CompiledPayload {
    Validate(CompiledValidation),
    Mutate(CompiledMutation),
}

/// A rule ready for evaluation.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub name: String,
    pub payload: CompiledPayload,
}

/// Compile one declared rule.
pub fn compile(rule: &Rule) -> Result<CompiledRule> {
    let payload = match &rule.payload {
        RulePayload::Validate(v) => CompiledPayload::Validate(compile_validation(&rule.name, v)?),
        RulePayload::Mutate(m) => CompiledPayload::Mutate(compile_mutation(&rule.name, m)?),
    };
    Ok(CompiledRule {
        name: rule.name.clone(),
        payload,
    })
}

fn compile_validation(rule: &str, v: &ValidationRule) -> Result<CompiledValidation> {
    let name = if v.image_name.is_empty() {
        NameMatcher::Any
    } else {
        NameMatcher::Pattern(compile_pattern(rule, &v.image_name)?)
    };

    let predicate = match v.kind {
        ValidateType::Latest => TagPredicate::Latest,
        ValidateType::Lock => TagPredicate::Lock(v.image_tag.clone()),
        ValidateType::SemVer => {
            let constraint = VersionConstraint::parse(&v.image_tag).map_err(|message| {
                WardenError::InvalidConstraint {
                    rule: rule.to_string(),
                    constraint: v.image_tag.clone(),
                    message,
                }
            })?;
            TagPredicate::SemVer(constraint)
        }
        ValidateType::RollingTag => TagPredicate::RollingTag {
            after: v.rolling_tag_after.unwrap_or_default(),
        },
    };

    Ok(CompiledValidation {
        name,
        predicate,
        allow: v.allow,
    })
}

fn compile_mutation(rule: &str, m: &MutationRule) -> Result<CompiledMutation> {
    Ok(match m.kind {
        MutationType::DefaultRegistry => CompiledMutation::DefaultRegistry(m.registry.clone()),
        MutationType::RewriteRegistry => CompiledMutation::RewriteRegistry {
            pattern: compile_pattern(rule, &m.registry)?,
            new_registry: m.new_registry.clone(),
        },
    })
}

fn compile_pattern(rule: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| WardenError::InvalidPattern {
        rule: rule.to_string(),
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

/// Parse an image tag as a semantic version.
///
/// Lenient the way image tags are written: a leading `v` is dropped and
/// missing minor/patch parts count as zero (`v3` → `3.0.0`, `1.25` → `1.25.0`).
pub fn parse_tag_version(tag: &str) -> Option<Version> {
    let tag = tag.strip_prefix('v').unwrap_or(tag);
    if let Ok(version) = Version::parse(tag) {
        return Some(version);
    }

    let split = tag.find(|c| c == '-' || c == '+').unwrap_or(tag.len());
    let (core, suffix) = tag.split_at(split);
    let parts: Vec<&str> = core.split('.').collect();
    if parts.len() >= 3
        || parts
            .iter()
            .any(|part| part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()))
    {
        return None;
    }

    let mut padded = parts.join(".");
    for _ in parts.len()..3 {
        padded.push_str(".0");
    }
    padded.push_str(suffix);
    Version::parse(&padded).ok()
}
