//! os-release descriptor parsing.

use std::collections::HashMap;

/// Well-known location of the descriptor.
pub const OS_RELEASE_PATH: &str = "/etc/os-release";

/// Distribution identity read from os-release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsRelease {
    /// Lower-case distribution id (`ID`), e.g. "ubuntu".
    pub id: String,
    /// `VERSION_ID`, e.g. "22.04". Empty when absent (rolling releases).
    pub version_id: String,
    /// `PRETTY_NAME`, falling back to `NAME` and then the id.
    pub pretty_name: String,
}

/// Parse the `KEY=value` lines of an os-release file.
///
/// Values may be double- or single-quoted; comments and malformed lines
/// are ignored. Returns `None` when no `ID` is present.
pub fn parse_os_release(contents: &str) -> Option<OsRelease> {
    let fields: HashMap<&str, String> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim(), unquote(value.trim())))
        .collect();

    let id = fields.get("ID")?.to_ascii_lowercase();
    if id.is_empty() {
        return None;
    }
    let version_id = fields.get("VERSION_ID").cloned().unwrap_or_default();
    let pretty_name = fields
        .get("PRETTY_NAME")
        .or_else(|| fields.get("NAME"))
        .cloned()
        .unwrap_or_else(|| id.clone());

    Some(OsRelease {
        id,
        version_id,
        pretty_name,
    })
}

fn unquote(value: &str) -> String {
    let stripped = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')));
    match stripped {
        Some(inner) => inner.replace("\\\"", "\"").replace("\\\\", "\\"),
        None => value.to_string(),
    }
}
