//! Image reference parsing.
//!
//! Splits references like `ghcr.io/org/app:v1.2.3` into domain, path, tag and
//! digest. Unlike a pull client, no default registry or `library/` prefix is
//! inserted: `nginx` stays `nginx`. Adding a registry is the job of the
//! `DefaultRegistry` mutation rule.

use std::fmt;

use image_warden_core::error::{Result, WardenError};

/// Tag assumed when a reference carries neither a tag nor a digest.
pub const DEFAULT_TAG: &str = "latest";

const NAME_TOTAL_LENGTH_MAX: usize = 255;
const TAG_LENGTH_MAX: usize = 128;
const DIGEST_HEX_MIN: usize = 32;

/// Parsed image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Registry host, possibly with a port (e.g., "docker.io", "localhost:5000").
    /// Empty when the reference names no registry.
    pub domain: String,
    /// Repository path (e.g., "nginx", "org/app")
    pub path: String,
    /// Explicit tag, if any
    pub tag: Option<String>,
    /// Digest (e.g., "sha256:abc123..."), if any
    pub digest: Option<String>,
}

impl ImageReference {
    /// Parse an image reference string.
    ///
    /// Supports formats:
    /// - `nginx` → path `nginx`, no tag
    /// - `nginx:1.25` → path `nginx`, tag `1.25`
    /// - `myuser/myimage` → path `myuser/myimage` (no registry)
    /// - `ghcr.io/org/image:tag` → domain `ghcr.io`, path `org/image`
    /// - `localhost:5000/image@sha256:abc...` → domain `localhost:5000`, digest
    pub fn parse(reference: &str) -> Result<Self> {
        if reference.is_empty() {
            return Err(invalid(reference, "repository name must have at least one component"));
        }

        // Split off digest first (@ separator)
        let (name_tag, digest) = match reference.split_once('@') {
            Some((name_tag, digest)) => {
                if !is_valid_digest(digest) {
                    return Err(invalid(reference, "invalid digest format, expected algorithm:hex"));
                }
                (name_tag, Some(digest.to_string()))
            }
            None => (reference, None),
        };

        // A colon after the last slash starts the tag; earlier colons belong
        // to a registry port.
        let path_start = name_tag.rfind('/').map_or(0, |pos| pos + 1);
        let (name, tag) = match name_tag[path_start..].rfind(':') {
            Some(colon) => {
                let colon = path_start + colon;
                (&name_tag[..colon], Some(&name_tag[colon + 1..]))
            }
            None => (name_tag, None),
        };

        if let Some(tag) = tag {
            if !is_valid_tag(tag) {
                return Err(invalid(reference, "invalid tag format"));
            }
        }

        if name.len() > NAME_TOTAL_LENGTH_MAX {
            return Err(invalid(
                reference,
                &format!(
                    "repository name must not be more than {NAME_TOTAL_LENGTH_MAX} characters"
                ),
            ));
        }

        let (domain, path) = split_domain(name);
        if !domain.is_empty() && !is_valid_domain(domain) {
            return Err(invalid(reference, "invalid registry domain"));
        }
        if path.chars().any(|c| c.is_ascii_uppercase()) {
            return Err(invalid(reference, "repository name must be lowercase"));
        }
        if !path.split('/').all(is_valid_path_component) {
            return Err(invalid(reference, "invalid repository name"));
        }

        Ok(ImageReference {
            domain: domain.to_string(),
            path: path.to_string(),
            tag: tag.map(str::to_string),
            digest,
        })
    }

    /// Repository name as written, including the domain when present.
    pub fn name(&self) -> String {
        if self.domain.is_empty() {
            self.path.clone()
        } else {
            format!("{}/{}", self.domain, self.path)
        }
    }

    /// Same reference under another registry domain.
    pub fn with_domain(&self, domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            ..self.clone()
        }
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())?;
        if let Some(ref tag) = self.tag {
            write!(f, ":{}", tag)?;
        }
        if let Some(ref digest) = self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}

/// Split an image reference into `(name, tag)` for rule evaluation.
///
/// Never fails: an unparsable reference yields `("", "")`. A digest-only
/// reference uses the digest as its tag, and a bare name defaults to
/// `latest`.
pub fn parse_image_reference(reference: &str) -> (String, String) {
    match ImageReference::parse(reference) {
        Ok(parsed) => {
            let tag = parsed
                .tag
                .clone()
                .or_else(|| parsed.digest.clone())
                .unwrap_or_else(|| DEFAULT_TAG.to_string());
            (parsed.name(), tag)
        }
        Err(e) => {
            tracing::debug!(reference, error = %e, "Unparsable image reference");
            (String::new(), String::new())
        }
    }
}

fn invalid(reference: &str, reason: &str) -> WardenError {
    WardenError::InvalidReference(format!("'{}': {}", reference, reason))
}

/// The first component is a registry only if it looks like a hostname
/// (contains a dot or colon, or is "localhost").
fn split_domain(name: &str) -> (&str, &str) {
    match name.split_once('/') {
        Some((first, rest))
            if first.contains('.') || first.contains(':') || first == "localhost" =>
        {
            (first, rest)
        }
        _ => ("", name),
    }
}

fn is_valid_domain(domain: &str) -> bool {
    let (host, port) = match domain.split_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (domain, None),
    };
    if let Some(port) = port {
        if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
    }
    !host.is_empty()
        && host.split('.').all(|label| {
            let bytes = label.as_bytes();
            !bytes.is_empty()
                && bytes[0].is_ascii_alphanumeric()
                && bytes[bytes.len() - 1].is_ascii_alphanumeric()
                && bytes.iter().all(|b| b.is_ascii_alphanumeric() || *b == b'-')
        })
}

/// Lowercase alphanumeric runs joined by `.`, `_`, `__` or a run of `-`.
fn is_valid_path_component(component: &str) -> bool {
    let alnum = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    let bytes = component.as_bytes();
    if bytes.is_empty() || !alnum(bytes[0]) || !alnum(bytes[bytes.len() - 1]) {
        return false;
    }

    let mut i = 0;
    while i < bytes.len() {
        if alnum(bytes[i]) {
            i += 1;
            continue;
        }
        let start = i;
        while i < bytes.len() && !alnum(bytes[i]) {
            i += 1;
        }
        let separator = &component[start..i];
        let ok = matches!(separator, "." | "_" | "__") || separator.bytes().all(|b| b == b'-');
        if !ok {
            return false;
        }
    }
    true
}

fn is_valid_tag(tag: &str) -> bool {
    let word = |b: u8| b.is_ascii_alphanumeric() || b == b'_';
    let bytes = tag.as_bytes();
    !bytes.is_empty()
        && bytes.len() <= TAG_LENGTH_MAX
        && word(bytes[0])
        && bytes.iter().all(|b| word(*b) || *b == b'.' || *b == b'-')
}

fn is_valid_digest(digest: &str) -> bool {
    let Some((algorithm, hex)) = digest.split_once(':') else {
        return false;
    };
    let algorithm_ok = algorithm.split(['-', '_', '+', '.']).all(|part| {
        let bytes = part.as_bytes();
        !bytes.is_empty()
            && bytes[0].is_ascii_alphabetic()
            && bytes.iter().all(|b| b.is_ascii_alphanumeric())
    });
    algorithm_ok && hex.len() >= DIGEST_HEX_MIN && hex.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALPINE_DIGEST: &str =
        "sha256:7144f7bab3d4c2648d7e59409f15ec52a18006a128c733fcff20d3a4a54ba44a";

    #[test]
    fn test_parse_image_reference_digest() {
        let (name, tag) = parse_image_reference(&format!("alpine@{}", ALPINE_DIGEST));
        assert_eq!(name, "alpine");
        assert_eq!(tag, ALPINE_DIGEST);
    }

    #[test]
    fn test_parse_image_reference_latest() {
        assert_eq!(
            parse_image_reference("alpine"),
            ("alpine".to_string(), "latest".to_string())
        );
    }

    #[test]
    fn test_parse_image_reference_tag() {
        assert_eq!(
            parse_image_reference("alpine:1.2.3"),
            ("alpine".to_string(), "1.2.3".to_string())
        );
    }

    #[test]
    fn test_parse_image_reference_keeps_domain() {
        assert_eq!(
            parse_image_reference("docker.io/mycompany/app1:dev"),
            ("docker.io/mycompany/app1".to_string(), "dev".to_string())
        );
    }

    #[test]
    fn test_parse_image_reference_tag_wins_over_digest() {
        let (name, tag) = parse_image_reference(&format!("alpine:3.18@{}", ALPINE_DIGEST));
        assert_eq!(name, "alpine");
        assert_eq!(tag, "3.18");
    }

    #[test]
    fn test_parse_image_reference_invalid() {
        for reference in ["", "Alpine", "alpine:", "alpine@sha256:short", "alp ine", "/alpine"] {
            assert_eq!(
                parse_image_reference(reference),
                (String::new(), String::new()),
                "{reference}"
            );
        }
    }

    #[test]
    fn test_parse_simple_name() {
        let r = ImageReference::parse("nginx").unwrap();
        assert_eq!(r.domain, "");
        assert_eq!(r.path, "nginx");
        assert_eq!(r.tag, None);
        assert_eq!(r.digest, None);
    }

    #[test]
    fn test_parse_user_repo_has_no_domain() {
        let r = ImageReference::parse("myuser/myimage:v1.0").unwrap();
        assert_eq!(r.domain, "");
        assert_eq!(r.path, "myuser/myimage");
        assert_eq!(r.tag, Some("v1.0".to_string()));
    }

    #[test]
    fn test_parse_custom_registry() {
        let r = ImageReference::parse("ghcr.io/org/sub/image:v1").unwrap();
        assert_eq!(r.domain, "ghcr.io");
        assert_eq!(r.path, "org/sub/image");
        assert_eq!(r.tag, Some("v1".to_string()));
    }

    #[test]
    fn test_parse_localhost_registry() {
        let r = ImageReference::parse("localhost/myimage:test").unwrap();
        assert_eq!(r.domain, "localhost");
        assert_eq!(r.path, "myimage");
    }

    #[test]
    fn test_parse_registry_with_port() {
        let r = ImageReference::parse("myregistry.io:5000/myimage:v1").unwrap();
        assert_eq!(r.domain, "myregistry.io:5000");
        assert_eq!(r.path, "myimage");
        assert_eq!(r.tag, Some("v1".to_string()));

        let r = ImageReference::parse("myregistry.io:5000/myimage").unwrap();
        assert_eq!(r.tag, None);
    }

    #[test]
    fn test_parse_numeric_tag() {
        let r = ImageReference::parse("redis:7").unwrap();
        assert_eq!(r.path, "redis");
        assert_eq!(r.tag, Some("7".to_string()));
    }

    #[test]
    fn test_parse_tag_and_digest() {
        let r =
            ImageReference::parse(&format!("ghcr.io/org/code:v0.1.0@{}", ALPINE_DIGEST)).unwrap();
        assert_eq!(r.domain, "ghcr.io");
        assert_eq!(r.tag, Some("v0.1.0".to_string()));
        assert_eq!(r.digest, Some(ALPINE_DIGEST.to_string()));
    }

    #[test]
    fn test_parse_separators() {
        assert!(ImageReference::parse("my_app__x.y--z").is_ok());
        assert!(ImageReference::parse("my_app_").is_err());
        assert!(ImageReference::parse("a...b").is_err());
    }

    #[test]
    fn test_parse_invalid_domain_port() {
        assert!(ImageReference::parse("myregistry.io:port/myimage").is_err());
    }

    #[test]
    fn test_parse_invalid_digest() {
        let r = ImageReference::parse("nginx@invaliddigest");
        assert!(matches!(r, Err(WardenError::InvalidReference(_))));
    }

    #[test]
    fn test_parse_uppercase_rejected() {
        let err = ImageReference::parse("docker.io/NGINX").unwrap_err();
        assert!(err.to_string().contains("must be lowercase"));
    }

    #[test]
    fn test_display_round_trip() {
        for reference in [
            "nginx:1.25",
            "ghcr.io/org/code:v0.1.0",
            "localhost:5000/app",
            concat!(
                "docker.io/nginx:latest@",
                "sha256:7144f7bab3d4c2648d7e59409f15ec52a18006a128c733fcff20d3a4a54ba44a"
            ),
        ] {
            assert_eq!(ImageReference::parse(reference).unwrap().to_string(), reference);
        }
    }

    #[test]
    fn test_with_domain() {
        let r = ImageReference::parse("docker.com/nginx:latest").unwrap();
        assert_eq!(r.with_domain("docker.io").to_string(), "docker.io/nginx:latest");
        let r = ImageReference::parse("nginx:latest").unwrap();
        assert_eq!(r.with_domain("quay.io").to_string(), "quay.io/nginx:latest");
    }
}
