//! Extension-based MIME type resolution.

use std::collections::HashMap;
use std::path::Path;

/// Built-in extension table. Later entries never shadow earlier ones in
/// reverse lookup, so the first extension listed for a type is canonical.
const DEFAULT_TYPES: &[(&str, &str)] = &[
    ("js", "application/javascript"),
    ("mjs", "application/javascript"),
    ("cjs", "application/javascript"),
    ("jsx", "text/jsx"),
    ("ts", "text/typescript"),
    ("tsx", "text/tsx"),
    ("coffee", "text/coffeescript"),
    ("litcoffee", "text/coffeescript"),
    ("css", "text/css"),
    ("less", "text/less"),
    ("scss", "text/scss"),
    ("sass", "text/sass"),
    ("styl", "text/stylus"),
    ("html", "text/html"),
    ("htm", "text/html"),
    ("jade", "text/jade"),
    ("pug", "text/jade"),
    ("vue", "text/vue"),
    ("json", "application/json"),
    ("map", "application/json"),
    ("svg", "image/svg+xml"),
    ("txt", "text/plain"),
    ("md", "text/markdown"),
    ("xml", "application/xml"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("ico", "image/x-icon"),
    ("woff", "font/woff"),
    ("woff2", "font/woff2"),
    ("ttf", "font/ttf"),
    ("otf", "font/otf"),
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
    ("mp4", "video/mp4"),
    ("webm", "video/webm"),
    ("wasm", "application/wasm"),
    ("pdf", "application/pdf"),
    ("zip", "application/zip"),
    ("gz", "application/gzip"),
    ("node", "application/octet-stream"),
    ("bin", "application/octet-stream"),
];

/// Maps file extensions to MIME types and back.
#[derive(Debug, Clone)]
pub struct MimeTable {
    by_extension: HashMap<String, String>,
    by_mime: HashMap<String, String>,
}

impl Default for MimeTable {
    fn default() -> Self {
        let mut table = Self {
            by_extension: HashMap::new(),
            by_mime: HashMap::new(),
        };
        for (ext, mime) in DEFAULT_TYPES {
            table.insert(ext, mime);
        }
        table
    }
}

impl MimeTable {
    /// Creates the built-in table extended with `overrides`.
    ///
    /// Override keys are extensions with or without a leading dot; they replace
    /// built-in entries for the same extension.
    pub fn with_overrides<'a>(overrides: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut table = Self::default();
        for (ext, mime) in overrides {
            let ext = ext.trim_start_matches('.').to_ascii_lowercase();
            table.by_extension.insert(ext.clone(), mime.to_string());
            table.by_mime.insert(mime.to_string(), ext);
        }
        table
    }

    fn insert(&mut self, ext: &str, mime: &str) {
        self.by_extension.insert(ext.to_string(), mime.to_string());
        self.by_mime
            .entry(mime.to_string())
            .or_insert_with(|| ext.to_string());
    }

    /// Returns the MIME type for a path based on its extension.
    pub fn lookup(&self, path: &Path) -> Option<String> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        self.by_extension.get(&ext).cloned()
    }

    /// Returns the canonical extension (without a dot) for a MIME type.
    pub fn extension_for(&self, mime: &str) -> Option<&str> {
        self.by_mime.get(mime).map(String::as_str)
    }

    /// Returns `true` for MIME types whose content is never text.
    pub fn is_binary_mime(mime: &str) -> bool {
        if mime == "image/svg+xml" {
            return false;
        }
        mime.starts_with("image/")
            || mime.starts_with("font/")
            || mime.starts_with("audio/")
            || mime.starts_with("video/")
            || matches!(
                mime,
                "application/octet-stream"
                    | "application/wasm"
                    | "application/pdf"
                    | "application/zip"
                    | "application/gzip"
            )
    }
}
