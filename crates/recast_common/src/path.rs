//! Path resolution shared by the fingerprint table and the host.
//!
//! Every path is made absolute and then folded lexically, so `src/../a.js`,
//! `./a.js` and `a.js` name the same fingerprint entry. Symlinks are not
//! resolved; the file does not need to exist.

use std::io;
use std::path::{Component, Path, PathBuf};

/// Makes `path` absolute against the working directory and removes `.` and
/// `..` components.
pub fn resolve(path: &Path) -> io::Result<PathBuf> {
    Ok(normalize(&std::path::absolute(path)?))
}

/// Removes `.` and `..` components without touching the filesystem.
///
/// `..` at the root stays at the root.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}
