//! Fingerprint and artifact caches for the recast compiler host.
//!
//! The [`FingerprintCache`] records a content hash and classification flags per
//! source file. The [`ArtifactCache`] stores compiled output on disk keyed by
//! that content hash, one partition per compiler identity, and deduplicates
//! concurrent compilations of the same file.

#![warn(missing_docs)]

pub mod artifact;
pub mod codec;
pub mod error;
pub mod fingerprint;

pub use artifact::ArtifactCache;
pub use error::CacheError;
pub use fingerprint::{FileFingerprint, FingerprintCache, FingerprintPolicy, FingerprintSnapshot};
