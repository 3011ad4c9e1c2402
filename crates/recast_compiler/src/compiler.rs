//! The [`Compiler`] trait and its per-file context.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use recast_common::{Artifact, CompilerIdentity};
use serde_json::{Map, Value};

use crate::error::CompileError;

/// Per-file state shared by the calls of one translation step.
///
/// The host creates a fresh context before calling
/// [`Compiler::should_compile`], and passes the same context to
/// [`Compiler::determine_dependent_files`] and [`Compiler::compile`], so a
/// compiler can stash intermediate results (a parsed tree, a pragma) in
/// `scratch` instead of recomputing them.
#[derive(Debug, Clone, Default)]
pub struct CompileContext {
    /// The file being compiled.
    pub path: PathBuf,
    /// MIME type of the source handed to this step.
    pub input_mime_type: Option<String>,
    /// Compiler-private scratch space.
    pub scratch: Map<String, Value>,
}

impl CompileContext {
    /// Creates a context for `path` with the given input type.
    pub fn new(path: &Path, input_mime_type: Option<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            input_mime_type,
            scratch: Map::new(),
        }
    }
}

/// A translator from one or more input MIME types to some output type.
///
/// Each operation has a synchronous and an asynchronous form. The async forms
/// default to the sync ones, so most compilers implement only the sync
/// methods; a compiler backed by async I/O overrides the async forms instead.
///
/// Output must depend only on the source, the path, and the identity returned
/// by [`Compiler::identity`]: the cache shares results between all compilers
/// with equal identities.
#[async_trait]
pub trait Compiler: Send + Sync {
    /// Stable identifier, part of the cache identity.
    fn name(&self) -> &str;

    /// MIME types this compiler accepts.
    fn input_mime_types(&self) -> Vec<String>;

    /// Version of the underlying translator.
    fn compiler_version(&self) -> String;

    /// Options that affect output.
    fn compiler_options(&self) -> Value {
        Value::Object(Map::new())
    }

    /// The `{name, version, options}` identity naming this compiler's cache.
    fn identity(&self) -> CompilerIdentity {
        CompilerIdentity::new(
            self.name(),
            self.compiler_version(),
            self.compiler_options(),
        )
    }

    /// Whether this file should be compiled at all; `false` passes it through.
    fn should_compile(
        &self,
        _source: &str,
        _ctx: &mut CompileContext,
    ) -> Result<bool, CompileError> {
        Ok(true)
    }

    /// Async form of [`Compiler::should_compile`].
    async fn should_compile_async(
        &self,
        source: &str,
        ctx: &mut CompileContext,
    ) -> Result<bool, CompileError> {
        self.should_compile(source, ctx)
    }

    /// Files whose content feeds into this file's output.
    fn determine_dependent_files(
        &self,
        _source: &str,
        _path: &Path,
        _ctx: &mut CompileContext,
    ) -> Result<Vec<PathBuf>, CompileError> {
        Ok(Vec::new())
    }

    /// Async form of [`Compiler::determine_dependent_files`].
    async fn determine_dependent_files_async(
        &self,
        source: &str,
        path: &Path,
        ctx: &mut CompileContext,
    ) -> Result<Vec<PathBuf>, CompileError> {
        self.determine_dependent_files(source, path, ctx)
    }

    /// Translates `source`.
    fn compile(
        &self,
        source: &str,
        path: &Path,
        ctx: &mut CompileContext,
    ) -> Result<Artifact, CompileError>;

    /// Async form of [`Compiler::compile`].
    async fn compile_async(
        &self,
        source: &str,
        path: &Path,
        ctx: &mut CompileContext,
    ) -> Result<Artifact, CompileError> {
        self.compile(source, path, ctx)
    }
}
