use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::path::VirtualPath;
use crate::props::ExtendedProps;
use crate::storage::StorageType;

/// File extension used by stored internet-shortcut files.
pub const LINK_EXTENSION: &str = "url";

/// An action a caller may perform on an item, with its pre-built target URL
/// where one applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ItemAction {
    /// Enumerate a folder's children.
    List,
    /// Inline view of a file.
    View { url: String },
    /// Raw download of a file.
    Download { url: String },
    /// Open an internet shortcut's target.
    Open { url: String },
}

/// The DTO handed to callers for every listed or inspected item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FileItem {
    /// Identity: the basename.
    pub id: String,
    /// Display name; differs from `id` for renamed shortcuts.
    pub name: String,
    /// Logical path of the containing folder.
    pub path: VirtualPath,
    /// Logical path including the item itself.
    pub full_path: VirtualPath,
    pub type_str: Option<StorageType>,
    pub size: u64,
    #[serde(rename = "ETag")]
    pub etag: String,
    pub owner: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub is_folder: bool,
    pub is_link: bool,
    pub link_url: Option<String>,
    pub shared: bool,
    pub group_id: Option<i64>,
    pub initiator: Option<String>,
    pub content_type: Option<String>,
    /// Whether a thumbnail may be produced for this item.
    pub thumb: bool,
    /// Whether a public link exists for this item.
    pub published: bool,
    pub extended_props: ExtendedProps,
    pub actions: Vec<ItemAction>,
}

impl FileItem {
    pub fn add_action(&mut self, action: ItemAction) {
        self.actions.push(action);
    }
}

/// Body of a stored `.url` shortcut file.
pub fn shortcut_body(url: &str) -> String {
    format!("[InternetShortcut]\r\nURL=\"{}\"\r\n", url)
}

/// Extract the target URL from a shortcut body, tolerating missing quotes
/// and either line-ending convention.
pub fn parse_shortcut(body: &str) -> Option<String> {
    for line in body.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("URL=") {
            let url = rest.trim().trim_matches('"');
            if !url.is_empty() {
                return Some(url.to_string());
            }
        }
    }
    None
}

/// Whether a file name denotes a stored shortcut.
pub fn is_link_name(name: &str) -> bool {
    crate::path::split_name(name)
        .1
        .eq_ignore_ascii_case(".url")
}
