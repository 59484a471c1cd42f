use std::path::PathBuf;

use atlas_format::FormatError;
use sheet_cache::{CacheStartError, RequestError, SheetIndex};

/// Startup failure of [`crate::AtlasSystem::init`].
#[derive(Debug, thiserror::Error)]
pub enum AtlasInitError {
    #[error("atlas system is already initialized")]
    AlreadyInitialized,
    #[error("atlas manifest {} not found", .path.display())]
    MissingManifest { path: PathBuf },
    #[error("malformed atlas file {}", .path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: FormatError,
    },
    #[error("no sheet file for sheet {index} in {}", .dir.display())]
    MissingSheet { index: SheetIndex, dir: PathBuf },
    #[error("sheet file {} declares sheet {index} but the manifest lists {sheet_count} sheets", .path.display())]
    SheetIndexOutOfRange {
        path: PathBuf,
        index: u32,
        sheet_count: u32,
    },
    #[error("sheet {index} is declared by both {} and {}", .first.display(), .second.display())]
    DuplicateSheet {
        index: SheetIndex,
        first: PathBuf,
        second: PathBuf,
    },
    #[error("sprite name {name:?} appears more than once")]
    DuplicateSpriteName { name: String },
    #[error("sprite {sprite:?} references sheet {sheet} but the manifest lists {sheet_count} sheets")]
    FragmentSheetOutOfRange {
        sprite: String,
        sheet: u32,
        sheet_count: u32,
    },
    #[error("i/o error on {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to start sheet cache")]
    Cache(#[from] CacheStartError),
}

/// Failure of a steady-state call on the atlas system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AtlasError {
    #[error("atlas system is not running")]
    NotRunning,
    #[error(transparent)]
    Request(#[from] RequestError),
}
