//! envd filesystem messages (Connect-RPC, JSON encoding).

use crate::interpreter::{FileEntry, FileMetadata};
use serde::{Deserialize, Deserializer, Serialize};

/// Connect-RPC service path prefix.
pub(crate) const FILESYSTEM_SERVICE: &str = "/filesystem.Filesystem";

#[derive(Debug, Serialize)]
pub(crate) struct PathRequest<'a> {
    pub path: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ListDirRequest<'a> {
    pub path: &'a str,
    pub depth: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListDirResponse {
    #[serde(default)]
    pub entries: Vec<EntryInfo>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatResponse {
    pub entry: EntryInfo,
}

/// One filesystem entry as envd reports it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EntryInfo {
    pub name: String,
    #[serde(rename = "type", default)]
    pub file_type: String,
    pub path: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub size: u64,
    #[serde(default)]
    pub permissions: Option<String>,
    #[serde(default)]
    pub modified_time: Option<String>,
}

impl EntryInfo {
    pub(crate) fn is_dir(&self) -> bool {
        self.file_type == "FILE_TYPE_DIRECTORY"
    }
}

impl From<EntryInfo> for FileEntry {
    fn from(entry: EntryInfo) -> Self {
        let is_dir = entry.is_dir();
        Self {
            name: entry.name,
            path: entry.path,
            is_dir,
            size: if is_dir { 0 } else { entry.size },
        }
    }
}

impl From<EntryInfo> for FileMetadata {
    fn from(entry: EntryInfo) -> Self {
        let is_dir = entry.is_dir();
        Self {
            name: entry.name,
            path: entry.path,
            is_dir,
            size: if is_dir { 0 } else { entry.size },
            modified: entry.modified_time,
            permissions: entry.permissions,
        }
    }
}

/// Proto3 JSON encodes int64 as a string; accept numbers too.
fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u64),
        Text(String),
    }

    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(0),
        Some(NumberOrString::Number(n)) => Ok(n),
        Some(NumberOrString::Text(s)) => s.parse().map_err(serde::de::Error::custom),
    }
}
