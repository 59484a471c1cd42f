use std::ops::{Add, Div, Mul, Neg, Sub};

use atlas_format::{FragmentRecord, SourceRect, SpriteRecord};
use sheet_cache::SheetIndex;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self::new(0.0, 0.0);
    pub const ONE: Self = Self::new(1.0, 1.0);

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub const fn splat(value: f32) -> Self {
        Self::new(value, value)
    }
}

impl Add for Vec2 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul for Vec2 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self::new(self.x * rhs.x, self.y * rhs.y)
    }
}

impl Div for Vec2 {
    type Output = Self;

    fn div(self, rhs: Self) -> Self {
        Self::new(self.x / rhs.x, self.y / rhs.y)
    }
}

impl Neg for Vec2 {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

/// Integer pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }
}

impl From<SourceRect> for Rect {
    fn from(source: SourceRect) -> Self {
        Self::new(source.x, source.y, source.width, source.height)
    }
}

/// Region of one sheet placed at an offset inside its sprite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpriteFragment {
    offset: Vec2,
    sheet: SheetIndex,
    source: Rect,
}

impl SpriteFragment {
    pub fn new(offset: Vec2, sheet: SheetIndex, source: Rect) -> Self {
        Self {
            offset,
            sheet,
            source,
        }
    }

    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    pub fn sheet(&self) -> SheetIndex {
        self.sheet
    }

    pub fn source(&self) -> Rect {
        self.source
    }
}

impl From<&FragmentRecord> for SpriteFragment {
    fn from(record: &FragmentRecord) -> Self {
        Self::new(
            Vec2::new(record.offset_x, record.offset_y),
            SheetIndex::new(record.sheet_index),
            record.source.into(),
        )
    }
}

/// Named composite of fragments, immutable once decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct Sprite {
    name: String,
    width: u32,
    height: u32,
    fragments: Vec<SpriteFragment>,
}

impl Sprite {
    pub fn new(
        name: impl Into<String>,
        width: u32,
        height: u32,
        fragments: Vec<SpriteFragment>,
    ) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            fragments,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }

    /// Fragments in record order.
    pub fn fragments(&self) -> &[SpriteFragment] {
        &self.fragments
    }

    /// Distinct sheets referenced by the fragments, in first-use order.
    pub fn sheets(&self) -> Vec<SheetIndex> {
        let mut sheets: Vec<SheetIndex> = Vec::with_capacity(self.fragments.len());
        for fragment in &self.fragments {
            if !sheets.contains(&fragment.sheet) {
                sheets.push(fragment.sheet);
            }
        }
        sheets
    }
}

impl From<SpriteRecord> for Sprite {
    fn from(record: SpriteRecord) -> Self {
        let fragments = record.fragments.iter().map(SpriteFragment::from).collect();
        Self::new(record.name, record.width, record.height, fragments)
    }
}
