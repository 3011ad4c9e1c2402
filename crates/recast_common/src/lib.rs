//! Shared foundational types for the recast transpilation cache.
//!
//! This crate provides content hashing, stable object digests, compiler
//! identities, compiled artifacts, MIME type resolution, path normalization,
//! and the bridge used by every synchronous API to drive its async
//! counterpart.

#![warn(missing_docs)]

pub mod artifact;
pub mod blocking;
pub mod digest;
pub mod hash;
pub mod identity;
pub mod mime;
pub mod path;

pub use artifact::{Artifact, Payload};
pub use blocking::block_on;
pub use digest::{digest, digest_serializable};
pub use hash::{ContentHash, ParseContentHashError};
pub use identity::CompilerIdentity;
pub use mime::MimeTable;
