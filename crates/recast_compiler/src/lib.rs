//! The compiler plugin contract.
//!
//! Every translator the host can route files to implements [`Compiler`]. This
//! crate also provides the two built-in compilers the host always needs (the
//! pass-through identity compiler and the read-only stand-in used when
//! replaying a saved configuration) and the [`CompilerRegistry`] that maps
//! input MIME types to compilers.

#![warn(missing_docs)]

pub mod compiler;
pub mod error;
pub mod passthrough;
pub mod read_only;
pub mod registry;

pub use compiler::{CompileContext, Compiler};
pub use error::CompileError;
pub use passthrough::PassthroughCompiler;
pub use read_only::ReadOnlyCompiler;
pub use registry::{CompilerRegistry, PluginDescriptor};
