//! The compiler host: routing, chaining, and caching of single files.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use recast_cache::{ArtifactCache, FileFingerprint, FingerprintCache};
use recast_common::{block_on, Artifact, ContentHash, MimeTable, Payload};
use recast_compiler::{CompileContext, Compiler, CompilerRegistry, PassthroughCompiler};
use tracing::{debug, info, warn};

use crate::error::HostError;
use crate::settings::HostSettings;
use crate::snapshot::{CompilerSnapshot, HostSnapshot};

/// Operating mode, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostMode {
    /// Fingerprints are computed, compilers run, results are cached.
    Development,
    /// Fingerprints are frozen and every cache miss is fatal.
    ReadOnly,
}

/// A compiler together with the cache partition of its identity.
#[derive(Clone)]
struct Route {
    compiler: Arc<dyn Compiler>,
    cache: Arc<ArtifactCache>,
}

/// Hands out one artifact cache per distinct compiler identity.
struct Partitions<'a> {
    cache_root: &'a Path,
    fingerprints: &'a Arc<FingerprintCache>,
    read_only: bool,
    by_digest: HashMap<String, Arc<ArtifactCache>>,
}

impl Partitions<'_> {
    fn route(&mut self, compiler: Arc<dyn Compiler>) -> Route {
        let identity = compiler.identity();
        let cache = self
            .by_digest
            .entry(identity.digest())
            .or_insert_with(|| {
                Arc::new(ArtifactCache::new(
                    self.cache_root,
                    identity,
                    Arc::clone(self.fingerprints),
                    self.read_only,
                ))
            })
            .clone();
        Route { compiler, cache }
    }
}

enum Contents {
    Text(String),
    Binary(Vec<u8>),
}

/// Routes files to compilers and caches their output.
///
/// Every method takes `&self`; a host is shared between tasks behind an
/// `Arc` or a plain reference.
pub struct CompilerHost {
    mode: HostMode,
    settings: HostSettings,
    fingerprints: Arc<FingerprintCache>,
    routes: BTreeMap<String, Route>,
    passthrough: Route,
    fallback: Option<Route>,
}

impl CompilerHost {
    /// Creates a development host with an empty fingerprint table.
    pub fn new(settings: HostSettings, registry: CompilerRegistry) -> Self {
        let fingerprints = Arc::new(FingerprintCache::new(
            &settings.app_root,
            settings.fingerprint_policy.clone(),
        ));
        Self::from_parts(settings, registry, fingerprints, HostMode::Development)
    }

    /// Creates a host over an existing fingerprint cache.
    pub fn from_parts(
        settings: HostSettings,
        registry: CompilerRegistry,
        fingerprints: Arc<FingerprintCache>,
        mode: HostMode,
    ) -> Self {
        Self::assemble(
            settings,
            registry,
            Arc::new(PassthroughCompiler),
            fingerprints,
            mode,
        )
    }

    fn assemble(
        settings: HostSettings,
        registry: CompilerRegistry,
        passthrough: Arc<dyn Compiler>,
        fingerprints: Arc<FingerprintCache>,
        mode: HostMode,
    ) -> Self {
        let mut partitions = Partitions {
            cache_root: &settings.cache_root,
            fingerprints: &fingerprints,
            read_only: mode == HostMode::ReadOnly,
            by_digest: HashMap::new(),
        };
        let routes: BTreeMap<String, Route> = registry
            .iter()
            .map(|(mime, compiler)| (mime.to_string(), partitions.route(Arc::clone(compiler))))
            .collect();
        let passthrough = partitions.route(passthrough);
        let fallback = settings
            .dispatch
            .fallback_to_passthrough
            .then(|| passthrough.clone());
        debug!(
            mode = ?mode,
            routes = routes.len(),
            partitions = partitions.by_digest.len(),
            "compiler host ready"
        );
        Self {
            mode,
            settings,
            fingerprints,
            routes,
            passthrough,
            fallback,
        }
    }

    /// Resumes development from a saved configuration.
    ///
    /// The saved fingerprint table is reused, but routing uses the live
    /// compilers in `registry`. A compiler whose options changed since the
    /// save gets a new identity and so starts from a cold partition.
    pub async fn from_configuration(
        settings: HostSettings,
        registry: CompilerRegistry,
    ) -> Result<Self, HostError> {
        let snapshot = HostSnapshot::load(&settings.cache_root).await?;
        for (mime, saved) in &snapshot.compilers {
            match registry.get(mime) {
                None => warn!(
                    mime = %mime,
                    compiler = %saved.name,
                    "saved compiler is no longer registered"
                ),
                Some(live) if live.identity() != saved.identity() => debug!(
                    mime = %mime,
                    compiler = %saved.name,
                    "compiler identity changed since last save"
                ),
                Some(_) => {}
            }
        }
        let fingerprints = Arc::new(FingerprintCache::from_snapshot(
            snapshot.file_change_cache,
            &settings.app_root,
            settings.fingerprint_policy.clone(),
            false,
        ));
        Ok(Self::from_parts(
            settings,
            registry,
            fingerprints,
            HostMode::Development,
        ))
    }

    /// Blocking form of [`CompilerHost::from_configuration`].
    pub fn from_configuration_blocking(
        settings: HostSettings,
        registry: CompilerRegistry,
    ) -> Result<Self, HostError> {
        let cache_root = settings.cache_root.clone();
        block_on(Self::from_configuration(settings, registry)).map_err(HostError::io(cache_root))?
    }

    /// Rebuilds a read-only host from a saved configuration.
    ///
    /// Every saved compiler becomes a [`recast_compiler::ReadOnlyCompiler`] stand-in, the
    /// fingerprint table is frozen, and every partition is read-only: the
    /// host serves exactly what the saving process computed.
    pub async fn read_only_from_configuration(settings: HostSettings) -> Result<Self, HostError> {
        let snapshot = HostSnapshot::load(&settings.cache_root).await?;
        let mut registry = CompilerRegistry::new();
        for (mime, saved) in &snapshot.compilers {
            registry.insert(mime.clone(), Arc::new(saved.to_read_only()));
        }
        let passthrough: Arc<dyn Compiler> = Arc::new(snapshot.passthrough.to_read_only());
        let fingerprints = Arc::new(FingerprintCache::from_snapshot(
            snapshot.file_change_cache,
            &settings.app_root,
            settings.fingerprint_policy.clone(),
            true,
        ));
        Ok(Self::assemble(
            settings,
            registry,
            passthrough,
            fingerprints,
            HostMode::ReadOnly,
        ))
    }

    /// Blocking form of [`CompilerHost::read_only_from_configuration`].
    pub fn read_only_from_configuration_blocking(
        settings: HostSettings,
    ) -> Result<Self, HostError> {
        let cache_root = settings.cache_root.clone();
        block_on(Self::read_only_from_configuration(settings)).map_err(HostError::io(cache_root))?
    }

    /// Returns the operating mode.
    pub fn mode(&self) -> HostMode {
        self.mode
    }

    /// Returns the settings the host was built with.
    pub fn settings(&self) -> &HostSettings {
        &self.settings
    }

    /// Returns the cache root.
    pub fn cache_root(&self) -> &Path {
        &self.settings.cache_root
    }

    /// Returns the shared fingerprint cache.
    pub fn fingerprints(&self) -> &Arc<FingerprintCache> {
        &self.fingerprints
    }

    /// Returns the extension table.
    pub fn mime_table(&self) -> &MimeTable {
        self.settings.mime_table()
    }

    /// Returns the compiler routed for `mime_type`.
    pub fn compiler_for(&self, mime_type: &str) -> Option<&Arc<dyn Compiler>> {
        self.routes.get(mime_type).map(|r| &r.compiler)
    }

    /// Returns the cache partition used for `mime_type`.
    pub fn cache_for(&self, mime_type: &str) -> Option<&Arc<ArtifactCache>> {
        self.routes.get(mime_type).map(|r| &r.cache)
    }

    /// Returns the partition holding pass-through files.
    pub fn passthrough_cache(&self) -> &Arc<ArtifactCache> {
        &self.passthrough.cache
    }

    /// Compiles one file, serving it from cache when possible.
    ///
    /// Files in the excluded tree are returned as they are without touching
    /// any cache. Pass-through files are cached verbatim without running a
    /// compiler. Everything else goes to the compiler registered for the
    /// file's type, or to the pass-through fallback when enabled.
    pub async fn compile(&self, path: &Path) -> Result<Artifact, HostError> {
        let path = recast_common::path::resolve(path).map_err(HostError::io(path))?;
        let mime_type = self.mime_table().lookup(&path);

        if self.fingerprints.is_in_excluded_tree(&path) {
            debug!(path = %path.display(), "excluded tree, returning file as is");
            let bytes = tokio::fs::read(&path).await.map_err(HostError::io(&path))?;
            return Ok(verbatim(decode(bytes, false), mime_type));
        }

        let fingerprint = self.fingerprints.get_fingerprint(&path).await?;
        if fingerprint.is_passthrough() {
            debug!(path = %path.display(), "pass-through file");
            return self
                .passthrough
                .cache
                .get_or_fetch_with(&path, fingerprint, |path, fingerprint| async move {
                    let contents = load_contents(&path, fingerprint).await?;
                    Ok::<_, HostError>(verbatim(contents, mime_type))
                })
                .await;
        }

        let (route, is_fallback) = match mime_type.as_deref().and_then(|m| self.routes.get(m)) {
            Some(route) => (route, false),
            None => match &self.fallback {
                Some(fallback) => {
                    debug!(
                        path = %path.display(),
                        mime = ?mime_type,
                        "no compiler registered, passing through"
                    );
                    (fallback, true)
                }
                None => return Err(HostError::NoCompilerFound { path, mime_type }),
            },
        };

        route
            .cache
            .get_or_fetch_with(&path, fingerprint, |path, fingerprint| {
                self.compile_uncached(path, fingerprint, route, mime_type, is_fallback)
            })
            .await
    }

    /// Blocking form of [`CompilerHost::compile`].
    pub fn compile_blocking(&self, path: &Path) -> Result<Artifact, HostError> {
        block_on(self.compile(path)).map_err(HostError::io(path))?
    }

    /// Runs the translation chain for one file, bypassing the cache.
    async fn compile_uncached(
        &self,
        path: PathBuf,
        fingerprint: FileFingerprint,
        route: &Route,
        mime_type: Option<String>,
        is_fallback: bool,
    ) -> Result<Artifact, HostError> {
        let mut source = match load_contents(&path, fingerprint).await? {
            Contents::Binary(data) => return Ok(Artifact::binary(data, mime_type)),
            Contents::Text(text) => text,
        };

        let policy = &self.settings.dispatch;
        let markup_compiler_registered = self.routes.contains_key(&policy.markup_mime_type);
        let mut compiler = Arc::clone(&route.compiler);
        let mut input_mime = mime_type;
        let mut dependent_files = Vec::new();

        for step in 0..policy.max_chain_depth {
            let mut ctx = CompileContext::new(&path, input_mime.clone());
            if !compiler.should_compile_async(&source, &mut ctx).await? {
                debug!(path = %path.display(), compiler = compiler.name(), "compiler declined");
                return Ok(Artifact::code(source, input_mime).with_dependent_files(dependent_files));
            }
            let discovered = compiler
                .determine_dependent_files_async(&source, &path, &mut ctx)
                .await?;
            merge_unique(&mut dependent_files, discovered);

            let artifact = compiler.compile_async(&source, &path, &mut ctx).await?;
            merge_unique(&mut dependent_files, artifact.dependent_files);
            debug!(
                path = %path.display(),
                step,
                compiler = compiler.name(),
                output = ?artifact.mime_type,
                "translation step"
            );

            match (artifact.payload, artifact.mime_type) {
                (Payload::Code(code), Some(next_mime))
                    if !is_fallback
                        && !policy.is_terminal(
                            input_mime.as_deref(),
                            &next_mime,
                            markup_compiler_registered,
                        ) =>
                {
                    let Some(next) = self.routes.get(&next_mime) else {
                        return Err(HostError::UnhandledIntermediateFormat {
                            path,
                            mime_type: next_mime,
                        });
                    };
                    compiler = Arc::clone(&next.compiler);
                    source = code;
                    input_mime = Some(next_mime);
                }
                (payload, mime_type) => {
                    return Ok(Artifact {
                        payload,
                        mime_type,
                        dependent_files,
                    });
                }
            }
        }

        Err(HostError::TranslationCycle {
            path,
            depth: policy.max_chain_depth,
        })
    }

    /// Captures the fingerprint table and the identity of every routed compiler.
    pub fn snapshot(&self) -> HostSnapshot {
        HostSnapshot {
            file_change_cache: self.fingerprints.snapshot(),
            compilers: self
                .routes
                .iter()
                .map(|(mime, route)| {
                    (
                        mime.clone(),
                        CompilerSnapshot::from_compiler(route.compiler.as_ref()),
                    )
                })
                .collect(),
            passthrough: CompilerSnapshot::from_compiler(self.passthrough.compiler.as_ref()),
        }
    }

    /// Saves the configuration for a later [`CompilerHost::from_configuration`]
    /// or [`CompilerHost::read_only_from_configuration`].
    ///
    /// Returns the path written.
    pub async fn save_configuration(&self) -> Result<PathBuf, HostError> {
        let snapshot = self.snapshot();
        let path = snapshot.save(&self.settings.cache_root).await?;
        info!(
            path = %path.display(),
            files = snapshot.file_change_cache.entries.len(),
            compilers = snapshot.compilers.len(),
            "saved compiler configuration"
        );
        Ok(path)
    }

    /// Blocking form of [`CompilerHost::save_configuration`].
    pub fn save_configuration_blocking(&self) -> Result<PathBuf, HostError> {
        block_on(self.save_configuration()).map_err(HostError::io(&self.settings.cache_root))?
    }
}

impl std::fmt::Debug for CompilerHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilerHost")
            .field("mode", &self.mode)
            .field("cache_root", &self.settings.cache_root)
            .field("routes", &self.routes.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Returns the file contents, reusing what the fingerprint lookup read.
///
/// A record without contents forces a re-read, which must still hash to the
/// fingerprinted content.
async fn load_contents(path: &Path, fingerprint: FileFingerprint) -> Result<Contents, HostError> {
    match (fingerprint.source_code, fingerprint.binary_data) {
        (_, Some(data)) => Ok(Contents::Binary(data)),
        (Some(text), None) => Ok(Contents::Text(text)),
        (None, None) => {
            let bytes = tokio::fs::read(path).await.map_err(HostError::io(path))?;
            if ContentHash::from_bytes(&bytes) != fingerprint.hash {
                return Err(HostError::SourceChanged {
                    path: path.to_path_buf(),
                });
            }
            Ok(decode(bytes, fingerprint.is_file_binary))
        }
    }
}

fn decode(bytes: Vec<u8>, binary: bool) -> Contents {
    if binary {
        return Contents::Binary(bytes);
    }
    match String::from_utf8(bytes) {
        Ok(text) => Contents::Text(text),
        Err(e) => Contents::Binary(e.into_bytes()),
    }
}

fn verbatim(contents: Contents, mime_type: Option<String>) -> Artifact {
    match contents {
        Contents::Text(text) => Artifact::code(text, mime_type),
        Contents::Binary(data) => Artifact::binary(data, mime_type),
    }
}

fn merge_unique(into: &mut Vec<PathBuf>, from: Vec<PathBuf>) {
    for path in from {
        if !into.contains(&path) {
            into.push(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recast_compiler::ReadOnlyCompiler;

    #[test]
    fn merge_unique_keeps_first_order() {
        let mut files = vec![PathBuf::from("a.less")];
        merge_unique(
            &mut files,
            vec![PathBuf::from("b.less"), PathBuf::from("a.less")],
        );
        assert_eq!(files, vec![PathBuf::from("a.less"), PathBuf::from("b.less")]);
    }

    #[test]
    fn decode_falls_back_to_binary() {
        assert!(matches!(decode(b"text".to_vec(), false), Contents::Text(_)));
        assert!(matches!(decode(vec![0xff, 0xfe], false), Contents::Binary(_)));
        assert!(matches!(decode(b"text".to_vec(), true), Contents::Binary(_)));
    }

    fn record(hash_of: &[u8]) -> FileFingerprint {
        FileFingerprint {
            hash: ContentHash::from_bytes(hash_of),
            modified_ns: 0,
            size: hash_of.len() as u64,
            is_file_binary: false,
            is_minified: false,
            is_in_excluded_tree: false,
            has_external_source_map: false,
            source_code: None,
            binary_data: None,
        }
    }

    #[tokio::test]
    async fn reread_source_must_match_its_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.js");
        std::fs::write(&path, "next();\n").unwrap();

        let err = load_contents(&path, record(b"prev();\n")).await.err().unwrap();
        assert!(matches!(err, HostError::SourceChanged { .. }));

        let contents = load_contents(&path, record(b"next();\n")).await.ok();
        assert!(matches!(contents, Some(Contents::Text(ref t)) if t == "next();\n"));
    }

    #[tokio::test]
    async fn attached_contents_are_used_without_reading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.js");
        let fingerprint = FileFingerprint {
            source_code: Some("kept();\n".to_string()),
            ..record(b"kept();\n")
        };
        let contents = load_contents(&path, fingerprint).await.ok();
        assert!(matches!(contents, Some(Contents::Text(ref t)) if t == "kept();\n"));
    }

    #[test]
    fn identical_identities_share_a_partition() {
        let dir = tempfile::tempdir().unwrap();
        let settings = HostSettings::new(dir.path().join("cache"), dir.path());
        let mut registry = CompilerRegistry::new();
        let plain: Arc<dyn Compiler> = Arc::new(PassthroughCompiler);
        registry.insert("text/x-a", Arc::clone(&plain));
        registry.insert("text/x-b", Arc::new(ReadOnlyCompiler::mirror(plain.as_ref())));
        let host = CompilerHost::new(settings, registry);

        let a = host.cache_for("text/x-a").unwrap();
        let b = host.cache_for("text/x-b").unwrap();
        assert!(Arc::ptr_eq(a, b));
        assert!(Arc::ptr_eq(a, host.passthrough_cache()));
    }
}
