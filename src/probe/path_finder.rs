//! Executable lookup against an explicit search path.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// Find an executable by name on `search_path`.
///
/// The lookup goes through the `which` crate, but against the search path
/// the run carries rather than the process environment, so additions made
/// by the probe are honoured without mutating `PATH`.
pub(crate) fn find_executable(name: &str, search_path: &OsStr) -> Option<PathBuf> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
    which::which_in(name, Some(search_path), cwd).ok()
}

/// `dir` prepended to `search_path`, unless it is already listed.
pub fn prepend_to_search_path(dir: &Path, search_path: &OsStr) -> OsString {
    let mut dirs: Vec<PathBuf> = std::env::split_paths(search_path).collect();
    if dirs.iter().any(|d| d == dir) {
        return search_path.to_os_string();
    }
    dirs.insert(0, dir.to_path_buf());
    std::env::join_paths(dirs).unwrap_or_else(|_| search_path.to_os_string())
}
