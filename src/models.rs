use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One file or directory of a listing. Built fresh on every listing call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub name: String,
    pub path: PathBuf,
    pub is_directory: bool,
    /// Bytes, files only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Epoch milliseconds, files only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<i64>,
    /// Directories only; never empty once pruned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<FileInfo>>,
}

impl FileInfo {
    pub fn file(name: String, path: PathBuf, size: u64, modified_at: i64) -> Self {
        Self {
            name,
            path,
            is_directory: false,
            size: Some(size),
            modified_at: Some(modified_at),
            children: None,
        }
    }

    pub fn directory(name: String, path: PathBuf, children: Vec<FileInfo>) -> Self {
        Self {
            name,
            path,
            is_directory: true,
            size: None,
            modified_at: None,
            children: Some(children),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub path: PathBuf,
    pub name: String,
    pub snippet: String,
    /// Character offset of the match in the lower-cased content
    pub match_index: usize,
    /// 1-based
    pub line_number: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCount {
    pub tag: String,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub roots: usize,
    pub indexed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum BuildStatus {
    Completed(IndexStats),
    /// Another build was in flight; this request was dropped
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IndexState {
    Empty,
    Building,
    Ready,
}

/// A user-chosen notes folder as persisted in the app config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderSource {
    pub path: String,
    pub name: String,
    pub added_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_valid: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
