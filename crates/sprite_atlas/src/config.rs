use std::path::{Path, PathBuf};

use sheet_cache::CacheConfig;

use crate::units::GIB;

pub const ATLAS_FOLDER: &str = "Atlas";
pub const MANIFEST_FILE_NAME: &str = "Meta.atlas";
pub const SHEET_EXTENSION: &str = "kyxsheet";

pub const DEFAULT_CAPACITY_BYTES: u64 = GIB;

/// Settings consumed once by [`crate::AtlasSystem::init`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtlasConfig {
    /// Directory that contains the `Atlas` folder.
    pub working_dir: PathBuf,
    pub capacity_bytes: u64,
    pub debug: bool,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("."),
            capacity_bytes: DEFAULT_CAPACITY_BYTES,
            debug: false,
        }
    }
}

impl AtlasConfig {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_capacity(mut self, capacity_bytes: u64) -> Self {
        self.capacity_bytes = capacity_bytes;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn atlas_dir(&self) -> PathBuf {
        self.working_dir.join(ATLAS_FOLDER)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.atlas_dir().join(MANIFEST_FILE_NAME)
    }

    /// Default `tracing` filter directive for this configuration.
    pub fn log_filter(&self) -> &'static str {
        if self.debug { "debug" } else { "info" }
    }

    pub(crate) fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            capacity_bytes: self.capacity_bytes,
            thread_name: "sprite_atlas.sheet_cache".to_owned(),
            ..CacheConfig::default()
        }
    }
}

pub(crate) fn is_sheet_file(path: &Path) -> bool {
    path.extension()
        .is_some_and(|extension| extension == SHEET_EXTENSION)
}
