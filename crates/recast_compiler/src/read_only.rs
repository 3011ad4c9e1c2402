//! Stand-in compilers for replaying a saved configuration.

use std::path::Path;

use async_trait::async_trait;
use recast_common::{Artifact, CompilerIdentity};
use serde_json::Value;

use crate::compiler::{CompileContext, Compiler};
use crate::error::CompileError;

/// Carries a saved compiler identity but refuses to compile.
///
/// A read-only host needs each compiler's identity only to locate its cache
/// partition. Every compile attempt fails with
/// [`CompileError::ReadOnlyViolation`].
#[derive(Debug, Clone)]
pub struct ReadOnlyCompiler {
    identity: CompilerIdentity,
    input_mime_types: Vec<String>,
}

impl ReadOnlyCompiler {
    /// Creates a stand-in for the compiler described by the given parts.
    pub fn new(
        name: impl Into<String>,
        compiler_version: impl Into<String>,
        compiler_options: Value,
        input_mime_types: Vec<String>,
    ) -> Self {
        Self {
            identity: CompilerIdentity::new(name, compiler_version, compiler_options),
            input_mime_types,
        }
    }

    /// Creates a stand-in mirroring a live compiler.
    pub fn mirror(compiler: &dyn Compiler) -> Self {
        Self {
            identity: compiler.identity(),
            input_mime_types: compiler.input_mime_types(),
        }
    }

    fn violation(&self, path: &Path) -> CompileError {
        CompileError::ReadOnlyViolation {
            compiler: self.identity.name.clone(),
            path: path.to_path_buf(),
        }
    }
}

#[async_trait]
impl Compiler for ReadOnlyCompiler {
    fn name(&self) -> &str {
        &self.identity.name
    }

    fn input_mime_types(&self) -> Vec<String> {
        self.input_mime_types.clone()
    }

    fn compiler_version(&self) -> String {
        self.identity.version.clone()
    }

    fn compiler_options(&self) -> Value {
        self.identity.options.clone()
    }

    fn identity(&self) -> CompilerIdentity {
        self.identity.clone()
    }

    fn compile(
        &self,
        _source: &str,
        path: &Path,
        _ctx: &mut CompileContext,
    ) -> Result<Artifact, CompileError> {
        Err(self.violation(path))
    }

    async fn compile_async(
        &self,
        _source: &str,
        path: &Path,
        _ctx: &mut CompileContext,
    ) -> Result<Artifact, CompileError> {
        Err(self.violation(path))
    }
}
