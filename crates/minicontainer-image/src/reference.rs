//! Docker/OCI image reference parsing.
//!
//! A raw reference like `ghcr.io/org/app:v1` splits into registry,
//! repository, and tag. The grammar is the Docker one:
//!
//! - The rightmost `:` separates the tag only if no `/` appears after it,
//!   which keeps `host:port/repo` intact.
//! - The leading path segment is a registry iff it contains a `.` or a
//!   `:`, or equals `localhost`; otherwise it belongs to the repository.
//! - Single-segment repositories on the default registry get the
//!   `library/` prefix.

use std::fmt;

use minicontainer_common::constants::{DEFAULT_REGISTRY, DEFAULT_TAG};

/// A fully qualified image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Registry host, e.g. `registry-1.docker.io`.
    pub registry: String,
    /// Repository path, e.g. `library/alpine`.
    pub repository: String,
    /// Tag, e.g. `3.19`.
    pub tag: String,
}

impl Reference {
    /// Parses a raw reference string, filling in defaults.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let (remainder, tag) = split_tag(raw);

        let (registry, repository) = match remainder.split_once('/') {
            Some((head, rest)) if is_registry_host(head) => {
                (head.to_string(), rest.to_string())
            }
            _ => (DEFAULT_REGISTRY.to_string(), remainder.to_string()),
        };

        // Official single-segment images live under library/ on Docker Hub.
        let repository = if registry == DEFAULT_REGISTRY && !repository.contains('/') {
            format!("library/{repository}")
        } else {
            repository
        };

        Self {
            registry,
            repository,
            tag: tag.to_string(),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.registry, self.repository, self.tag)
    }
}

/// Splits a raw reference into (pre-tag remainder, tag).
fn split_tag(raw: &str) -> (&str, &str) {
    match raw.rfind(':') {
        Some(idx) if !raw[idx + 1..].contains('/') => (&raw[..idx], &raw[idx + 1..]),
        _ => (raw, DEFAULT_TAG),
    }
}

/// Decides whether a leading path segment names a registry.
fn is_registry_host(segment: &str) -> bool {
    segment.contains('.') || segment.contains(':') || segment == "localhost"
}

/// Splits a local-store reference into (name, tag), defaulting the tag.
///
/// Used for the image store layout, where images are addressed by the name
/// the user typed rather than the fully qualified repository.
#[must_use]
pub fn split_name_tag(raw: &str) -> (&str, &str) {
    split_tag(raw)
}
