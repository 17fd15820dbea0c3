use std::path::PathBuf;

/// Engine configuration.
///
/// Loading these values from files or the environment is the surrounding
/// system's job; the engine only consumes the typed struct.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root of all physical storage. Personal backends live under
    /// `<data_dir>/personal/<user>`, corporate backends under
    /// `<data_dir>/corporate/<tenant>`, bookkeeping under
    /// `<data_dir>/system`.
    pub data_dir: PathBuf,

    /// When false, every delete is a permanent delete.
    pub trash_enabled: bool,
    /// Reserved top-level folder name holding soft-deleted items. Hidden
    /// from listings of the personal backend.
    pub trash_folder: String,

    /// Default per-user space limit for the personal backend, in megabytes.
    /// 0 means unlimited. Overridable per user record.
    pub user_space_limit_mb: u64,

    pub allow_thumbnails: bool,
    /// Files at or above this size are never thumbnail-eligible.
    pub thumbnail_max_file_size_mb: u64,

    /// Suffix of the companion history sibling copied alongside a file
    /// (`report.docx` + `report.docx.hist`).
    pub history_suffix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            trash_enabled: true,
            trash_folder: ".trash".to_string(),
            user_space_limit_mb: 0,
            allow_thumbnails: true,
            thumbnail_max_file_size_mb: 5,
            history_suffix: ".hist".to_string(),
        }
    }
}

impl Config {
    pub fn system_dir(&self) -> PathBuf {
        self.data_dir.join("system")
    }

    pub fn thumbnail_size_ceiling(&self) -> u64 {
        self.thumbnail_max_file_size_mb * 1024 * 1024
    }
}
