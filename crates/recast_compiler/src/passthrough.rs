//! The identity compiler.

use std::path::Path;

use recast_common::Artifact;

use crate::compiler::{CompileContext, Compiler};
use crate::error::CompileError;

/// Stable name of the pass-through compiler.
pub const PASSTHROUGH_NAME: &str = "passthrough";

/// Returns every input unchanged, tagged with the input's own MIME type.
///
/// The host uses it as the home partition for files classified as
/// pass-through, and as the fallback for types no compiler is registered for.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughCompiler;

impl PassthroughCompiler {
    /// Creates the pass-through compiler.
    pub fn new() -> Self {
        Self
    }
}

impl Compiler for PassthroughCompiler {
    fn name(&self) -> &str {
        PASSTHROUGH_NAME
    }

    fn input_mime_types(&self) -> Vec<String> {
        vec!["text/plain".to_string()]
    }

    fn compiler_version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    fn compile(
        &self,
        source: &str,
        _path: &Path,
        ctx: &mut CompileContext,
    ) -> Result<Artifact, CompileError> {
        let mime = ctx
            .input_mime_type
            .clone()
            .unwrap_or_else(|| "text/plain".to_string());
        Ok(Artifact::code(source, Some(mime)))
    }
}
