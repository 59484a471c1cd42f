use std::collections::HashMap;
use std::sync::Arc;

use sheet_cache::{
    CacheSnapshot, CacheStats, ResidentSheet, SheetCache, SheetDescriptor, SheetIndex,
    SheetLoader, SheetRequester,
};
use tracing::{debug, info};

use crate::config::AtlasConfig;
use crate::discovery::discover;
use crate::draw::{DrawTransform, Placement, RectTransform, SheetRenderer, Tint};
use crate::error::{AtlasError, AtlasInitError};
use crate::sprite::{Rect, Sprite, Vec2};

/// Sprite atlas context: sprite table plus the sheet cache behind it.
///
/// Constructed empty, initialized once from an atlas folder, and shut down
/// explicitly or on drop. A system that has been initialized, successfully or
/// not past the loader hand-off, can never be initialized again.
pub struct AtlasSystem<L: SheetLoader> {
    lifecycle: Lifecycle<L>,
}

enum Lifecycle<L: SheetLoader> {
    Uninitialized(L),
    Running(RunningAtlas<L::Resource>),
    Stopped,
}

struct RunningAtlas<R> {
    version: u8,
    sprites: Vec<Sprite>,
    sprite_names: HashMap<String, usize>,
    cache: SheetCache<R>,
}

impl<L: SheetLoader> AtlasSystem<L> {
    pub fn new(loader: L) -> Self {
        Self {
            lifecycle: Lifecycle::Uninitialized(loader),
        }
    }

    /// Reads the manifest, discovers sheet files and starts the sheet cache.
    ///
    /// Discovery failures leave the system uninitialized so the call can be
    /// retried once the atlas folder is fixed.
    pub fn init(&mut self, config: &AtlasConfig) -> Result<(), AtlasInitError> {
        if !matches!(self.lifecycle, Lifecycle::Uninitialized(_)) {
            return Err(AtlasInitError::AlreadyInitialized);
        }
        let discovered = discover(config)?;

        let loader = match std::mem::replace(&mut self.lifecycle, Lifecycle::Stopped) {
            Lifecycle::Uninitialized(loader) => loader,
            other => {
                self.lifecycle = other;
                return Err(AtlasInitError::AlreadyInitialized);
            }
        };
        let sheet_count = discovered.sheets.len();
        let sheet_bytes: u64 = discovered.sheets.iter().map(|sheet| sheet.byte_size).sum();
        let cache = SheetCache::start(discovered.sheets, loader, config.cache_config())?;

        info!(
            atlas = %config.atlas_dir().display(),
            version = discovered.version,
            sprites = discovered.sprites.len(),
            sheets = sheet_count,
            sheet_bytes,
            capacity = config.capacity_bytes,
            "atlas system initialized"
        );
        self.lifecycle = Lifecycle::Running(RunningAtlas {
            version: discovered.version,
            sprites: discovered.sprites,
            sprite_names: discovered.sprite_names,
            cache,
        });
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Running(_))
    }

    /// Stops the cache actor and releases every resident sheet.
    ///
    /// Sheet requests still queued at that point are discarded.
    pub fn shutdown(&mut self) {
        if let Lifecycle::Running(running) = std::mem::replace(&mut self.lifecycle, Lifecycle::Stopped)
        {
            running.cache.shutdown();
            info!("atlas system shut down");
        }
    }

    fn running(&self) -> Result<&RunningAtlas<L::Resource>, AtlasError> {
        match &self.lifecycle {
            Lifecycle::Running(running) => Ok(running),
            _ => Err(AtlasError::NotRunning),
        }
    }

    pub fn version(&self) -> Option<u8> {
        self.running().ok().map(|running| running.version)
    }

    pub fn sprite(&self, name: &str) -> Option<&Sprite> {
        let running = self.running().ok()?;
        running
            .sprite_names
            .get(name)
            .map(|&position| &running.sprites[position])
    }

    pub fn sprite_at(&self, index: usize) -> Option<&Sprite> {
        self.running().ok()?.sprites.get(index)
    }

    /// Sprites in manifest order; empty until initialized.
    pub fn sprites(&self) -> &[Sprite] {
        self.running()
            .map(|running| running.sprites.as_slice())
            .unwrap_or_default()
    }

    pub fn sheet_count(&self) -> usize {
        self.running()
            .map(|running| running.cache.sheet_count())
            .unwrap_or(0)
    }

    pub fn sheet(&self, index: SheetIndex) -> Option<&SheetDescriptor> {
        self.running().ok()?.cache.descriptor(index)
    }

    /// Queues a touch of `index` and returns the handle resident right now.
    pub fn request_resident(
        &self,
        index: SheetIndex,
    ) -> Result<Option<Arc<ResidentSheet<L::Resource>>>, AtlasError> {
        let handle = self.running()?.cache.request_resident(index)?;
        debug!(sheet = index.raw(), resident = handle.is_some(), "sheet touch queued");
        Ok(handle)
    }

    /// Cloneable handle for requesting sheets from other threads.
    pub fn requester(&self) -> Result<SheetRequester<L::Resource>, AtlasError> {
        Ok(self.running()?.cache.requester())
    }

    /// Queues every sheet `sprite` draws from, without waiting for residency.
    pub fn allocate(&self, sprite: &Sprite) -> Result<(), AtlasError> {
        for sheet in sprite.sheets() {
            self.request_resident(sheet)?;
        }
        Ok(())
    }

    pub fn set_capacity(&self, capacity_bytes: u64) -> Result<(), AtlasError> {
        self.running()?.cache.set_capacity(capacity_bytes);
        Ok(())
    }

    pub fn capacity(&self) -> Option<u64> {
        self.running().ok().map(|running| running.cache.capacity())
    }

    pub fn stats(&self) -> Option<CacheStats> {
        self.running().ok().map(|running| running.cache.stats())
    }

    /// Blocks until the cache has processed every touch queued so far.
    pub fn flush(&self) -> Result<CacheSnapshot, AtlasError> {
        Ok(self.running()?.cache.flush()?)
    }

    /// Draws each fragment at `position` plus its offset.
    pub fn draw<D>(
        &self,
        renderer: &mut D,
        sprite: &Sprite,
        position: Vec2,
        tint: Tint,
    ) -> Result<usize, AtlasError>
    where
        D: SheetRenderer<L::Resource> + ?Sized,
    {
        self.draw_fragments(renderer, sprite, tint, Placement::At { position })
    }

    /// Draws with rotation, scale and flips around `transform.origin`.
    pub fn draw_transformed<D>(
        &self,
        renderer: &mut D,
        sprite: &Sprite,
        position: Vec2,
        tint: Tint,
        transform: DrawTransform,
    ) -> Result<usize, AtlasError>
    where
        D: SheetRenderer<L::Resource> + ?Sized,
    {
        self.draw_fragments(
            renderer,
            sprite,
            tint,
            Placement::Transformed {
                position,
                transform,
            },
        )
    }

    /// Stretches the sprite over `dest`.
    pub fn draw_into<D>(
        &self,
        renderer: &mut D,
        sprite: &Sprite,
        dest: Rect,
        tint: Tint,
    ) -> Result<usize, AtlasError>
    where
        D: SheetRenderer<L::Resource> + ?Sized,
    {
        self.draw_fragments(
            renderer,
            sprite,
            tint,
            Placement::Into {
                dest,
                sprite_size: sprite.size(),
            },
        )
    }

    /// Stretches the sprite over `dest` with rotation and flips. Every
    /// fragment is anchored at the corner of `dest` and positioned through
    /// its shifted origin.
    pub fn draw_into_transformed<D>(
        &self,
        renderer: &mut D,
        sprite: &Sprite,
        dest: Rect,
        tint: Tint,
        transform: RectTransform,
    ) -> Result<usize, AtlasError>
    where
        D: SheetRenderer<L::Resource> + ?Sized,
    {
        self.draw_fragments(
            renderer,
            sprite,
            tint,
            Placement::IntoTransformed {
                dest,
                sprite_size: sprite.size(),
                transform,
            },
        )
    }

    /// Returns how many fragments reached the renderer.
    fn draw_fragments<D>(
        &self,
        renderer: &mut D,
        sprite: &Sprite,
        tint: Tint,
        placement: Placement,
    ) -> Result<usize, AtlasError>
    where
        D: SheetRenderer<L::Resource> + ?Sized,
    {
        let cache = &self.running()?.cache;
        let mut drawn = 0;
        for fragment in sprite.fragments() {
            let Some(sheet) = cache.request_resident(fragment.sheet())? else {
                continue;
            };
            placement.emit(
                renderer,
                sheet.resource(),
                fragment.offset(),
                fragment.source(),
                tint,
            );
            drawn += 1;
        }
        Ok(drawn)
    }
}

impl<L: SheetLoader> Drop for AtlasSystem<L> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
