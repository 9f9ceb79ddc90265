//! # minicontainer-image
//!
//! Container image and layer management for the minicontainer runtime.
//!
//! Handles:
//! - **References**: Docker/OCI image reference parsing.
//! - **Layers**: content-addressable extracted layer directories.
//! - **Storage**: the local image store: import, lookup, list, remove,
//!   pull, and layer garbage collection.
//! - **Registry**: anonymous bearer-auth Distribution v2 client.
//! - **Hashing**: streamed SHA-256 content digests.

pub mod hash;
pub mod layer;
pub mod metadata;
pub mod reference;
pub mod registry;
pub mod storage;
