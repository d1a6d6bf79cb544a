//! Live registry digest lookup.
//!
//! Uses the `oci-distribution` crate to resolve a reference to the digest of
//! the manifest the registry currently serves for it.

use async_trait::async_trait;
use image_warden_core::error::{Result, WardenError};
use oci_distribution::client::{ClientConfig, ClientProtocol};
use oci_distribution::secrets::RegistryAuth as OciRegistryAuth;
use oci_distribution::{Client, Reference};

/// Resolves an image reference to its current registry digest.
#[async_trait]
pub trait DigestInspector: Send + Sync {
    /// Current digest for `image` (`name:tag`), as `algorithm:hex`.
    async fn get_digest(&self, image: &str) -> Result<String>;
}

/// Authentication credentials for a container registry.
#[derive(Debug, Clone, Default)]
pub struct RegistryAuth {
    username: Option<String>,
    password: Option<String>,
}

impl RegistryAuth {
    /// Create anonymous authentication (no credentials).
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Create basic authentication with username and password.
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
        }
    }

    /// Create authentication from environment variables.
    ///
    /// Reads `REGISTRY_USERNAME` and `REGISTRY_PASSWORD`.
    /// Falls back to anonymous if not set.
    pub fn from_env() -> Self {
        let username = std::env::var("REGISTRY_USERNAME").ok();
        let password = std::env::var("REGISTRY_PASSWORD").ok();

        if username.is_some() && password.is_some() {
            Self { username, password }
        } else {
            Self::anonymous()
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.username.is_none()
    }

    fn to_oci_auth(&self) -> OciRegistryAuth {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => OciRegistryAuth::Basic(u.clone(), p.clone()),
            _ => OciRegistryAuth::Anonymous,
        }
    }
}

/// Looks up manifest digests over the OCI distribution API.
pub struct RegistryInspector {
    client: Client,
    auth: RegistryAuth,
}

impl RegistryInspector {
    /// Inspector authenticated from the environment.
    pub fn new() -> Self {
        Self::with_auth(RegistryAuth::from_env())
    }

    pub fn with_auth(auth: RegistryAuth) -> Self {
        let config = ClientConfig {
            protocol: ClientProtocol::Https,
            ..Default::default()
        };
        Self {
            client: Client::new(config),
            auth,
        }
    }
}

impl Default for RegistryInspector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DigestInspector for RegistryInspector {
    async fn get_digest(&self, image: &str) -> Result<String> {
        let oci_ref: Reference = image.parse().map_err(|e| WardenError::Inspect {
            image: image.to_string(),
            message: format!("Invalid OCI reference: {}", e),
        })?;

        let (_manifest, digest) = self
            .client
            .pull_manifest(&oci_ref, &self.auth.to_oci_auth())
            .await
            .map_err(|e| WardenError::Inspect {
                image: image.to_string(),
                message: format!("Failed to pull manifest: {}", e),
            })?;

        tracing::debug!(image, digest = %digest, "Resolved registry digest");
        Ok(digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_auth_anonymous() {
        let auth = RegistryAuth::anonymous();
        assert!(auth.is_anonymous());
        assert!(matches!(auth.to_oci_auth(), OciRegistryAuth::Anonymous));
    }

    #[test]
    fn test_registry_auth_basic() {
        let auth = RegistryAuth::basic("user", "secret");
        assert!(!auth.is_anonymous());
        assert!(matches!(
            auth.to_oci_auth(),
            OciRegistryAuth::Basic(u, p) if u == "user" && p == "secret"
        ));
    }

    #[tokio::test]
    async fn test_invalid_reference_is_inspect_error() {
        let inspector = RegistryInspector::with_auth(RegistryAuth::anonymous());
        let err = inspector.get_digest("Not A Reference").await.unwrap_err();
        assert!(matches!(err, WardenError::Inspect { image, .. } if image == "Not A Reference"));
    }
}
