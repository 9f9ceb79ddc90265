//! Anonymous OCI/Docker Distribution v2 registry client.
//!
//! A single fetch walks the bearer-auth state machine: probe `/v2/`, chase
//! the `WWW-Authenticate` challenge for an anonymous pull token, then fetch
//! the manifest and stream blobs. Only the blob/manifest contract is
//! implemented; credentials and token refresh are out of scope.

use std::collections::HashMap;
use std::io::Write;

use serde::Deserialize;

use minicontainer_common::error::{MinicontainerError, Result};

use crate::reference::Reference;

/// Accepted manifest media types.
pub mod media_types {
    /// Docker schema 2 manifest.
    pub const MANIFEST_V2: &str = "application/vnd.docker.distribution.manifest.v2+json";
    /// OCI image manifest.
    pub const OCI_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
}

/// A content descriptor inside a manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct Descriptor {
    /// Content digest in `sha256:<hex>` form.
    pub digest: String,
    /// Blob size in bytes.
    #[serde(default)]
    pub size: u64,
}

/// An image manifest as returned by the registry.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Manifest schema version; 2 for everything this client accepts.
    pub schema_version: u32,
    /// Descriptor of the image config blob.
    pub config: Descriptor,
    /// Layer descriptors, bottom to top.
    pub layers: Vec<Descriptor>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

/// A parsed `WWW-Authenticate: Bearer` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerChallenge {
    /// Token endpoint to query.
    pub realm: String,
    /// Service parameter for the token request.
    pub service: String,
}

/// Client for pulling one repository from one registry.
pub struct RegistryClient {
    reference: Reference,
    client: reqwest::blocking::Client,
    token: Option<String>,
}

impl RegistryClient {
    /// Creates a client for the registry named by the reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(reference: Reference) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| MinicontainerError::Registry {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            reference,
            client,
            token: None,
        })
    }

    /// Probes the registry and acquires an anonymous pull token if asked.
    ///
    /// A 200 from `/v2/` means no auth is needed; a 401 with a bearer
    /// challenge is chased for an anonymous token; anything else fails.
    ///
    /// # Errors
    ///
    /// Returns a registry error for unexpected statuses, a missing or
    /// malformed challenge, or a failed token request.
    pub fn authenticate(&mut self) -> Result<()> {
        let base = format!("https://{}/v2/", self.reference.registry);
        let response = self
            .client
            .get(&base)
            .send()
            .map_err(|e| MinicontainerError::Registry {
                message: format!("registry probe failed: {e}"),
            })?;

        match response.status() {
            reqwest::StatusCode::OK => {
                tracing::debug!(registry = %self.reference.registry, "registry requires no auth");
                Ok(())
            }
            reqwest::StatusCode::UNAUTHORIZED => {
                let header = response
                    .headers()
                    .get(reqwest::header::WWW_AUTHENTICATE)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| MinicontainerError::Registry {
                        message: "401 without WWW-Authenticate challenge".into(),
                    })?;
                let challenge = parse_bearer_challenge(header)?;
                self.token = Some(self.fetch_token(&challenge)?);
                tracing::debug!(registry = %self.reference.registry, "anonymous pull token acquired");
                Ok(())
            }
            status => Err(MinicontainerError::Registry {
                message: format!("unexpected status {status} from {base}"),
            }),
        }
    }

    fn fetch_token(&self, challenge: &BearerChallenge) -> Result<String> {
        let scope = format!("repository:{}:pull", self.reference.repository);
        let response = self
            .client
            .get(&challenge.realm)
            .query(&[("service", challenge.service.as_str()), ("scope", &scope)])
            .send()
            .map_err(|e| MinicontainerError::Registry {
                message: format!("token request failed: {e}"),
            })?;
        if !response.status().is_success() {
            return Err(MinicontainerError::Registry {
                message: format!("token endpoint returned {}", response.status()),
            });
        }
        let token: TokenResponse = response.json().map_err(|e| MinicontainerError::Registry {
            message: format!("malformed token response: {e}"),
        })?;
        Ok(token.token)
    }

    /// Fetches and decodes the manifest for the reference's tag.
    ///
    /// # Errors
    ///
    /// Returns a registry error on a non-success status or undecodable
    /// body.
    pub fn fetch_manifest(&self) -> Result<Manifest> {
        let url = format!(
            "https://{}/v2/{}/manifests/{}",
            self.reference.registry, self.reference.repository, self.reference.tag
        );
        let accept = format!("{}, {}", media_types::MANIFEST_V2, media_types::OCI_MANIFEST);

        let mut request = self.client.get(&url).header(reqwest::header::ACCEPT, accept);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().map_err(|e| MinicontainerError::Registry {
            message: format!("manifest request failed: {e}"),
        })?;
        if !response.status().is_success() {
            return Err(MinicontainerError::Registry {
                message: format!("manifest fetch returned {} for {url}", response.status()),
            });
        }
        let manifest: Manifest = response.json().map_err(|e| MinicontainerError::Registry {
            message: format!("malformed manifest: {e}"),
        })?;
        tracing::debug!(layers = manifest.layers.len(), "manifest fetched");
        Ok(manifest)
    }

    /// Streams a blob into `dest`.
    ///
    /// Returns the number of bytes written and the Content-Length the
    /// registry declared, if any; the caller checks them against each
    /// other.
    ///
    /// # Errors
    ///
    /// Returns a registry error on a non-success status, or an I/O error
    /// while streaming.
    pub fn fetch_blob(&self, digest: &str, dest: &mut impl Write) -> Result<(u64, Option<u64>)> {
        let url = format!(
            "https://{}/v2/{}/blobs/{digest}",
            self.reference.registry, self.reference.repository
        );

        let mut request = self.client.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let mut response = request.send().map_err(|e| MinicontainerError::Registry {
            message: format!("blob request failed: {e}"),
        })?;
        if !response.status().is_success() {
            return Err(MinicontainerError::Registry {
                message: format!("blob fetch returned {} for {digest}", response.status()),
            });
        }
        let declared = response.content_length();
        let written =
            std::io::copy(&mut response, dest).map_err(|e| MinicontainerError::Registry {
                message: format!("blob download failed for {digest}: {e}"),
            })?;
        Ok((written, declared))
    }
}

/// Parses a `WWW-Authenticate: Bearer` challenge header.
///
/// # Errors
///
/// Returns a registry error if the header is not a bearer challenge or
/// lacks the `realm` or `service` parameters.
pub fn parse_bearer_challenge(header: &str) -> Result<BearerChallenge> {
    let params = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| MinicontainerError::Registry {
            message: format!("not a bearer challenge: {header}"),
        })?;

    let mut fields = HashMap::new();
    for part in params.split(',') {
        if let Some((key, value)) = part.trim().split_once('=') {
            fields.insert(key.to_string(), value.trim_matches('"').to_string());
        }
    }

    let take = |key: &str| {
        fields
            .get(key)
            .cloned()
            .ok_or_else(|| MinicontainerError::Registry {
                message: format!("bearer challenge missing {key}: {header}"),
            })
    };

    Ok(BearerChallenge {
        realm: take("realm")?,
        service: take("service")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_docker_hub_challenge() {
        let header = "Bearer realm=\"https://auth.docker.io/token\",service=\"registry.docker.io\"";
        let challenge = parse_bearer_challenge(header).expect("parse");
        assert_eq!(challenge.realm, "https://auth.docker.io/token");
        assert_eq!(challenge.service, "registry.docker.io");
    }

    #[test]
    fn parse_challenge_with_scope_parameter() {
        let header = "Bearer realm=\"https://ghcr.io/token\",service=\"ghcr.io\",scope=\"repository:o/r:pull\"";
        let challenge = parse_bearer_challenge(header).expect("parse");
        assert_eq!(challenge.realm, "https://ghcr.io/token");
        assert_eq!(challenge.service, "ghcr.io");
    }

    #[test]
    fn non_bearer_challenge_is_rejected() {
        assert!(parse_bearer_challenge("Basic realm=\"x\"").is_err());
    }

    #[test]
    fn challenge_missing_service_is_rejected() {
        assert!(parse_bearer_challenge("Bearer realm=\"https://x/token\"").is_err());
    }

    #[test]
    fn manifest_decodes_docker_schema2() {
        let body = r#"{
            "schemaVersion": 2,
            "mediaType": "application/vnd.docker.distribution.manifest.v2+json",
            "config": {
                "mediaType": "application/vnd.docker.container.image.v1+json",
                "size": 1469,
                "digest": "sha256:aaaabbbbccccddddaaaabbbbccccddddaaaabbbbccccddddaaaabbbbccccdddd"
            },
            "layers": [
                {
                    "mediaType": "application/vnd.docker.image.rootfs.diff.tar.gzip",
                    "size": 3370628,
                    "digest": "sha256:1111222233334444111122223333444411112222333344441111222233334444"
                }
            ]
        }"#;
        let manifest: Manifest = serde_json::from_str(body).expect("decode");
        assert_eq!(manifest.schema_version, 2);
        assert!(manifest.config.digest.starts_with("sha256:aaaa"));
        assert_eq!(manifest.layers.len(), 1);
        assert_eq!(manifest.layers[0].size, 3_370_628);
    }
}
