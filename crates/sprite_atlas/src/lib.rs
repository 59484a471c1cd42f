//! Sprites backed by budgeted, lazily loaded atlas sheets.
//!
//! [`AtlasSystem::init`] reads `Atlas/Meta.atlas` under the configured working
//! directory, matches every sheet index to a `*.kyxsheet` file and starts a
//! [`sheet_cache::SheetCache`] over them. Drawing a sprite requests each of its
//! sheets; fragments whose sheet is not resident yet are skipped until a later
//! draw.

mod atlas;
mod config;
mod discovery;
mod draw;
mod error;
mod loader;
mod sprite;
pub mod units;

pub use atlas::AtlasSystem;
pub use config::{
    ATLAS_FOLDER, AtlasConfig, DEFAULT_CAPACITY_BYTES, MANIFEST_FILE_NAME, SHEET_EXTENSION,
};
pub use draw::{DrawTransform, RectTransform, SheetRenderer, SpriteEffects, Tint};
pub use error::{AtlasError, AtlasInitError};
#[cfg(feature = "gpu")]
pub use loader::{GpuSheetLoader, SheetTexture};
pub use loader::{ImageSheetLoader, decode_sheet_rgba8};
pub use sprite::{Rect, Sprite, SpriteFragment, Vec2};

pub use sheet_cache::{
    CacheSnapshot, CacheStats, ResidentSheet, SheetDescriptor, SheetIndex, SheetLoadError,
    SheetLoader, SheetRequester,
};
