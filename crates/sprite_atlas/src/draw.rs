//! Sprite draw path.
//!
//! Each draw walks the sprite's fragments, asks the atlas for the fragment's
//! sheet and forwards the resident ones to a [`SheetRenderer`]. Fragments whose
//! sheet is still loading are skipped for this frame; the request itself queues
//! the load, so a later frame draws them.

use bitflags::bitflags;

use crate::sprite::{Rect, Vec2};

bitflags! {
    /// Mirroring applied when drawing.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SpriteEffects: u8 {
        const FLIP_HORIZONTALLY = 1 << 0;
        const FLIP_VERTICALLY = 1 << 1;
    }
}

/// Straight RGBA multiplier applied to every drawn texel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tint {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Tint {
    pub const WHITE: Self = Self::rgba(255, 255, 255, 255);

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

impl Default for Tint {
    fn default() -> Self {
        Self::WHITE
    }
}

/// Rotation, origin, scale, flips and depth for position-based draws.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawTransform {
    pub rotation: f32,
    pub origin: Vec2,
    pub scale: Vec2,
    pub effects: SpriteEffects,
    pub depth: f32,
}

impl Default for DrawTransform {
    fn default() -> Self {
        Self {
            rotation: 0.0,
            origin: Vec2::ZERO,
            scale: Vec2::ONE,
            effects: SpriteEffects::empty(),
            depth: 0.0,
        }
    }
}

impl DrawTransform {
    pub fn with_uniform_scale(mut self, scale: f32) -> Self {
        self.scale = Vec2::splat(scale);
        self
    }

    fn shifted_origin(self, offset: Vec2) -> Self {
        Self {
            origin: self.origin - offset,
            ..self
        }
    }
}

/// Rotation, origin, flips and depth for rectangle-based draws. The scale is
/// implied by the destination rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectTransform {
    pub rotation: f32,
    pub origin: Vec2,
    pub effects: SpriteEffects,
    pub depth: f32,
}

impl Default for RectTransform {
    fn default() -> Self {
        Self {
            rotation: 0.0,
            origin: Vec2::ZERO,
            effects: SpriteEffects::empty(),
            depth: 0.0,
        }
    }
}

impl RectTransform {
    fn shifted_origin(self, offset: Vec2) -> Self {
        Self {
            origin: self.origin - offset,
            ..self
        }
    }
}

/// The rendering backend that turns a sheet region into pixels.
pub trait SheetRenderer<R> {
    fn draw(&mut self, sheet: &R, position: Vec2, source: Rect, tint: Tint);

    fn draw_transformed(
        &mut self,
        sheet: &R,
        position: Vec2,
        source: Rect,
        tint: Tint,
        transform: &DrawTransform,
    );

    fn draw_into(&mut self, sheet: &R, dest: Rect, source: Rect, tint: Tint);

    fn draw_into_transformed(
        &mut self,
        sheet: &R,
        dest: Rect,
        source: Rect,
        tint: Tint,
        transform: &RectTransform,
    );
}

/// Per-fragment placement for each draw flavour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Placement {
    At {
        position: Vec2,
    },
    Transformed {
        position: Vec2,
        transform: DrawTransform,
    },
    Into {
        dest: Rect,
        sprite_size: Vec2,
    },
    IntoTransformed {
        dest: Rect,
        sprite_size: Vec2,
        transform: RectTransform,
    },
}

impl Placement {
    pub(crate) fn emit<R, D>(&self, renderer: &mut D, sheet: &R, offset: Vec2, source: Rect, tint: Tint)
    where
        D: SheetRenderer<R> + ?Sized,
    {
        match *self {
            Placement::At { position } => renderer.draw(sheet, position + offset, source, tint),
            Placement::Transformed {
                position,
                transform,
            } => renderer.draw_transformed(
                sheet,
                position,
                source,
                tint,
                &transform.shifted_origin(offset),
            ),
            Placement::Into { dest, sprite_size } => {
                let scalar = dest.size() / sprite_size;
                let fragment_dest = Rect::new(
                    (dest.x as f32 + offset.x * scalar.x) as i32,
                    (dest.y as f32 + offset.y * scalar.y) as i32,
                    (source.width as f32 * scalar.x) as i32,
                    (source.height as f32 * scalar.y) as i32,
                );
                renderer.draw_into(sheet, fragment_dest, source, tint);
            }
            Placement::IntoTransformed {
                dest,
                sprite_size,
                transform,
            } => {
                let scalar = dest.size() / sprite_size;
                let fragment_dest = Rect::new(
                    dest.x,
                    dest.y,
                    (source.width as f32 * scalar.x) as i32,
                    (source.height as f32 * scalar.y) as i32,
                );
                renderer.draw_into_transformed(
                    sheet,
                    fragment_dest,
                    source,
                    tint,
                    &transform.shifted_origin(offset),
                );
            }
        }
    }
}
