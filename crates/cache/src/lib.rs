//! Content-addressed cache for task outputs
//!
//! A task's [`fingerprint`] names a cache entry. The entry holds two blobs:
//! `outputs.tar.gz`, built by the [`archive`] packager, and `manifest.json`
//! describing it. Blobs live in any [`CacheStore`] backend: a local
//! directory, an HTTP endpoint, or an S3-compatible object store, chosen by
//! [`factory::open_store`] from a location string.

pub mod archive;
pub mod artifacts;
pub mod factory;
pub mod fingerprint;
pub mod http;
pub mod local;
pub mod manifest;
pub mod object;
pub mod store;

pub use archive::ArtifactPackager;
pub use artifacts::{ArtifactCache, RestoreOutcome};
pub use factory::{open_store, CacheLocation};
pub use fingerprint::{fingerprinter_for, hash_inputs, outputs_fresh, Fingerprinter, InputFilter};
pub use http::HttpStore;
pub use local::LocalStore;
pub use object::{ObjectStore, ObjectStoreClient, S3HttpClient};
pub use store::CacheStore;
