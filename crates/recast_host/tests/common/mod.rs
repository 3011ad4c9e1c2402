//! Spy compilers and project fixtures shared by the host integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use recast_common::Artifact;
use recast_compiler::{CompileContext, CompileError, Compiler};
use recast_config::RecastConfig;
use recast_host::HostSettings;
use serde_json::{json, Value};

/// Shared call counter.
#[derive(Debug, Clone, Default)]
pub struct Calls(Arc<AtomicUsize>);

impl Calls {
    pub fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Uppercases `text/x-lower` into `text/x-upper`.
///
/// Fails on sources containing `syntax error`, declines sources starting with
/// `// raw`, and reports every `@import <file>` line as a dependent file.
pub struct Upper {
    pub calls: Calls,
    pub options: Value,
    pub delay: Option<Duration>,
}

impl Upper {
    pub fn new(calls: &Calls) -> Self {
        Self {
            calls: calls.clone(),
            options: json!({}),
            delay: None,
        }
    }

    pub fn with_options(calls: &Calls, options: Value) -> Self {
        Self {
            options,
            ..Self::new(calls)
        }
    }

    pub fn slow(calls: &Calls, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new(calls)
        }
    }
}

#[async_trait]
impl Compiler for Upper {
    fn name(&self) -> &str {
        "upper"
    }

    fn input_mime_types(&self) -> Vec<String> {
        vec!["text/x-lower".to_string()]
    }

    fn compiler_version(&self) -> String {
        "1.0.0".to_string()
    }

    fn compiler_options(&self) -> Value {
        self.options.clone()
    }

    fn should_compile(&self, source: &str, _ctx: &mut CompileContext) -> Result<bool, CompileError> {
        Ok(!source.starts_with("// raw"))
    }

    fn determine_dependent_files(
        &self,
        source: &str,
        path: &Path,
        _ctx: &mut CompileContext,
    ) -> Result<Vec<PathBuf>, CompileError> {
        let dir = path.parent().unwrap_or(Path::new("/"));
        Ok(source
            .lines()
            .filter_map(|l| l.strip_prefix("@import "))
            .map(|name| dir.join(name.trim()))
            .collect())
    }

    fn compile(
        &self,
        source: &str,
        path: &Path,
        _ctx: &mut CompileContext,
    ) -> Result<Artifact, CompileError> {
        self.calls.bump();
        if source.contains("syntax error") {
            return Err(CompileError::failed(
                "upper",
                path,
                "unexpected token at 1:1",
            ));
        }
        Ok(Artifact::code(source.to_uppercase(), Some("text/x-upper".into())))
    }

    async fn compile_async(
        &self,
        source: &str,
        path: &Path,
        ctx: &mut CompileContext,
    ) -> Result<Artifact, CompileError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.compile(source, path, ctx)
    }
}

/// Rewrites the MIME type from `from` to `to`, appending a marker line.
pub struct Relabel {
    pub name: &'static str,
    pub from: &'static str,
    pub to: &'static str,
    pub calls: Calls,
}

impl Relabel {
    pub fn new(name: &'static str, from: &'static str, to: &'static str, calls: &Calls) -> Self {
        Self {
            name,
            from,
            to,
            calls: calls.clone(),
        }
    }
}

impl Compiler for Relabel {
    fn name(&self) -> &str {
        self.name
    }

    fn input_mime_types(&self) -> Vec<String> {
        vec![self.from.to_string()]
    }

    fn compiler_version(&self) -> String {
        "0.1.0".to_string()
    }

    fn compile(
        &self,
        source: &str,
        _path: &Path,
        _ctx: &mut CompileContext,
    ) -> Result<Artifact, CompileError> {
        self.calls.bump();
        Ok(Artifact::code(
            format!("{source}/* {} */\n", self.name),
            Some(self.to.to_string()),
        ))
    }
}

/// Settings for a project rooted at `dir`: `.lower` is `text/x-lower`,
/// `.ping` is `text/x-ping`, and `text/x-upper` is a terminal type.
pub fn settings(dir: &Path) -> HostSettings {
    let mut config = RecastConfig::default();
    config
        .mime_types
        .insert("lower".to_string(), "text/x-lower".to_string());
    config
        .mime_types
        .insert("ping".to_string(), "text/x-ping".to_string());
    config
        .dispatch
        .terminal_mime_types
        .push("text/x-upper".to_string());
    HostSettings::from_config(&config.resolve_paths(dir))
}

/// Writes `content` to `dir/name`, creating parent directories.
pub fn write(dir: &Path, name: &str, content: impl AsRef<[u8]>) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
}
