//! MIME type to compiler routing table.
//!
//! Compilers are described by [`PluginDescriptor`]s and assembled in two
//! phases: standalone compilers first, then compilers that need to route
//! embedded content to other compilers, which receive the completed
//! standalone registry.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::compiler::Compiler;

/// Factory for a compiler that needs access to the other compilers.
pub type RegistryFactory = Box<dyn FnOnce(Arc<CompilerRegistry>) -> Arc<dyn Compiler> + Send>;

/// How to obtain one compiler.
pub enum PluginDescriptor {
    /// A compiler that works on its own.
    Standalone(Arc<dyn Compiler>),
    /// A compiler built from the registry of standalone compilers, e.g. a
    /// markup compiler that hands embedded script and style blocks to them.
    WithRegistry(RegistryFactory),
}

impl PluginDescriptor {
    /// Wraps a standalone compiler.
    pub fn standalone(compiler: impl Compiler + 'static) -> Self {
        Self::Standalone(Arc::new(compiler))
    }

    /// Wraps a registry-dependent compiler factory.
    pub fn with_registry(
        factory: impl FnOnce(Arc<CompilerRegistry>) -> Arc<dyn Compiler> + Send + 'static,
    ) -> Self {
        Self::WithRegistry(Box::new(factory))
    }
}

/// Maps input MIME types to the compiler that handles them.
#[derive(Clone, Default)]
pub struct CompilerRegistry {
    by_mime: BTreeMap<String, Arc<dyn Compiler>>,
}

impl CompilerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from descriptors in two phases.
    ///
    /// Standalone compilers are registered first. Each registry-dependent
    /// factory is then called with a shared snapshot of those, and its
    /// compiler is registered alongside them. Later registrations win when
    /// two compilers claim the same MIME type.
    pub fn build(descriptors: impl IntoIterator<Item = PluginDescriptor>) -> Self {
        let mut registry = Self::new();
        let mut deferred = Vec::new();
        for descriptor in descriptors {
            match descriptor {
                PluginDescriptor::Standalone(compiler) => registry.register(compiler),
                PluginDescriptor::WithRegistry(factory) => deferred.push(factory),
            }
        }
        if deferred.is_empty() {
            return registry;
        }
        let standalone = Arc::new(registry.clone());
        for factory in deferred {
            registry.register(factory(Arc::clone(&standalone)));
        }
        registry
    }

    /// Registers `compiler` under every MIME type it declares.
    pub fn register(&mut self, compiler: Arc<dyn Compiler>) {
        for mime in compiler.input_mime_types() {
            self.insert(mime, Arc::clone(&compiler));
        }
    }

    /// Registers `compiler` under one MIME type.
    pub fn insert(&mut self, mime_type: impl Into<String>, compiler: Arc<dyn Compiler>) {
        let mime_type = mime_type.into();
        if let Some(previous) = self.by_mime.insert(mime_type.clone(), compiler) {
            debug!(mime = %mime_type, replaced = previous.name(), "compiler replaced");
        }
    }

    /// Returns the compiler for `mime_type`.
    pub fn get(&self, mime_type: &str) -> Option<&Arc<dyn Compiler>> {
        self.by_mime.get(mime_type)
    }

    /// Iterates over `(mime type, compiler)` pairs in MIME type order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn Compiler>)> {
        self.by_mime.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of registered MIME types.
    pub fn len(&self) -> usize {
        self.by_mime.len()
    }

    /// Returns `true` if no MIME type is registered.
    pub fn is_empty(&self) -> bool {
        self.by_mime.is_empty()
    }
}

impl fmt::Debug for CompilerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.by_mime.iter().map(|(k, v)| (k, v.name())))
            .finish()
    }
}
