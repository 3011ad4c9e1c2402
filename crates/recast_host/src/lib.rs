//! The recast compiler host.
//!
//! A [`CompilerHost`] routes source files to compilers by MIME type, chains
//! compilers until a directly loadable format comes out, and caches every
//! result on disk keyed by content hash. A development pass can save its
//! configuration with [`CompilerHost::save_configuration`]; a later process
//! rebuilds a read-only host from it that serves the same results without
//! any compiler present.

#![warn(missing_docs)]

pub mod bulk;
pub mod error;
pub mod host;
pub mod settings;
pub mod snapshot;

pub use bulk::{CompileAllReport, CompileFailure};
pub use error::HostError;
pub use host::{CompilerHost, HostMode};
pub use settings::{DispatchPolicy, HostSettings};
pub use snapshot::{CompilerSnapshot, HostSnapshot, SNAPSHOT_FILE};
