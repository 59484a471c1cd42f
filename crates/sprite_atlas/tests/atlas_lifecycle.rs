use std::fs::{self, File};
use std::io::{Cursor, Write};
use std::path::Path;

use atlas_format::{FragmentRecord, Manifest, SheetHeader, SpriteRecord};
use image::{ImageFormat, Rgba, RgbaImage};
use sprite_atlas::{
    AtlasConfig, AtlasInitError, AtlasSystem, DrawTransform, ImageSheetLoader, Rect,
    RectTransform, SheetIndex, SheetRenderer, Tint, Vec2,
};

/// Software renderer that copies source texels onto a canvas.
struct CanvasRenderer {
    canvas: RgbaImage,
}

impl CanvasRenderer {
    fn new(width: u32, height: u32) -> Self {
        Self {
            canvas: RgbaImage::new(width, height),
        }
    }

    fn blit(&mut self, sheet: &RgbaImage, x: i32, y: i32, source: Rect) {
        for row in 0..source.height {
            for column in 0..source.width {
                let (src_x, src_y) = (source.x + column, source.y + row);
                let (dst_x, dst_y) = (x + column, y + row);
                if src_x < 0
                    || src_y < 0
                    || dst_x < 0
                    || dst_y < 0
                    || src_x as u32 >= sheet.width()
                    || src_y as u32 >= sheet.height()
                    || dst_x as u32 >= self.canvas.width()
                    || dst_y as u32 >= self.canvas.height()
                {
                    continue;
                }
                let texel = *sheet.get_pixel(src_x as u32, src_y as u32);
                self.canvas.put_pixel(dst_x as u32, dst_y as u32, texel);
            }
        }
    }
}

impl SheetRenderer<RgbaImage> for CanvasRenderer {
    fn draw(&mut self, sheet: &RgbaImage, position: Vec2, source: Rect, _tint: Tint) {
        self.blit(sheet, position.x as i32, position.y as i32, source);
    }

    fn draw_transformed(
        &mut self,
        sheet: &RgbaImage,
        position: Vec2,
        source: Rect,
        _tint: Tint,
        transform: &DrawTransform,
    ) {
        let corner = position - transform.origin;
        self.blit(sheet, corner.x as i32, corner.y as i32, source);
    }

    fn draw_into(&mut self, sheet: &RgbaImage, dest: Rect, source: Rect, _tint: Tint) {
        self.blit(sheet, dest.x, dest.y, source);
    }

    fn draw_into_transformed(
        &mut self,
        sheet: &RgbaImage,
        dest: Rect,
        source: Rect,
        _tint: Tint,
        transform: &RectTransform,
    ) {
        let x = dest.x - transform.origin.x as i32;
        let y = dest.y - transform.origin.y as i32;
        self.blit(sheet, x, y, source);
    }
}

const RED: [u8; 4] = [255, 0, 0, 255];
const BLUE: [u8; 4] = [0, 0, 255, 255];

fn png_sheet(color: [u8; 4]) -> Vec<u8> {
    let image = RgbaImage::from_pixel(8, 8, Rgba(color));
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Png).unwrap();
    bytes.into_inner()
}

/// Two 8x8 sheets and one 8x4 sprite whose halves come from different sheets.
fn write_atlas(root: &Path) {
    let atlas_dir = root.join("Atlas");
    fs::create_dir_all(&atlas_dir).unwrap();

    let manifest = Manifest {
        version: 1,
        sheet_count: 2,
        sprites: vec![SpriteRecord {
            name: "banner".to_owned(),
            width: 8,
            height: 4,
            fragments: vec![
                FragmentRecord::new(0.0, 0.0, 0, 0, 4, 4),
                FragmentRecord::new(4.0, 0.0, 1, 0, 4, 4),
            ],
        }],
    };
    manifest
        .encode(&mut File::create(atlas_dir.join("Meta.atlas")).unwrap())
        .unwrap();

    for (index, color) in [(0u32, RED), (1, BLUE)] {
        let mut file = File::create(atlas_dir.join(format!("sheet_{index}.kyxsheet"))).unwrap();
        SheetHeader {
            index,
            byte_size: 8 * 8 * 4,
        }
        .encode(&mut file)
        .unwrap();
        file.write_all(&png_sheet(color)).unwrap();
    }
    fs::write(atlas_dir.join("readme.txt"), "not a sheet").unwrap();
}

#[test]
fn init_request_draw_shutdown_cycle() {
    let root = tempfile::tempdir().unwrap();
    write_atlas(root.path());
    let mut atlas = AtlasSystem::new(ImageSheetLoader);
    atlas
        .init(&AtlasConfig::new(root.path()).with_capacity(1024))
        .unwrap();

    let banner = atlas.sprite("banner").unwrap().clone();
    let mut renderer = CanvasRenderer::new(16, 8);

    let drawn = atlas
        .draw(&mut renderer, &banner, Vec2::new(2.0, 2.0), Tint::WHITE)
        .unwrap();
    assert_eq!(drawn, 0);

    let snapshot = atlas.flush().unwrap();
    assert_eq!(snapshot.recency, [SheetIndex::new(1), SheetIndex::new(0)]);
    assert_eq!(snapshot.resident_bytes, 512);
    assert!(snapshot.is_consistent());

    let drawn = atlas
        .draw(&mut renderer, &banner, Vec2::new(2.0, 2.0), Tint::WHITE)
        .unwrap();
    assert_eq!(drawn, 2);
    assert_eq!(renderer.canvas.get_pixel(2, 2), &Rgba(RED));
    assert_eq!(renderer.canvas.get_pixel(5, 5), &Rgba(RED));
    assert_eq!(renderer.canvas.get_pixel(6, 2), &Rgba(BLUE));
    assert_eq!(renderer.canvas.get_pixel(9, 5), &Rgba(BLUE));
    assert_eq!(renderer.canvas.get_pixel(0, 0), &Rgba([0, 0, 0, 0]));

    let stats = atlas.stats().unwrap();
    assert_eq!(stats.loads, 2);
    assert_eq!(stats.evictions, 0);

    atlas.shutdown();
    assert!(!atlas.is_running());
    assert!(matches!(
        atlas.init(&AtlasConfig::new(root.path())),
        Err(AtlasInitError::AlreadyInitialized)
    ));
}

#[test]
fn budget_for_one_sheet_alternates_residency() {
    let root = tempfile::tempdir().unwrap();
    write_atlas(root.path());
    let mut atlas = AtlasSystem::new(ImageSheetLoader);
    atlas
        .init(&AtlasConfig::new(root.path()).with_capacity(256))
        .unwrap();

    atlas.request_resident(SheetIndex::new(0)).unwrap();
    assert_eq!(atlas.flush().unwrap().recency, [SheetIndex::new(0)]);

    let red = atlas.request_resident(SheetIndex::new(0)).unwrap().unwrap();
    atlas.request_resident(SheetIndex::new(1)).unwrap();
    let snapshot = atlas.flush().unwrap();

    assert_eq!(snapshot.recency, [SheetIndex::new(1)]);
    assert_eq!(snapshot.resident_bytes, 256);
    assert_eq!(atlas.stats().unwrap().evictions, 1);
    assert!(atlas.request_resident(SheetIndex::new(0)).unwrap().is_none());
    assert_eq!(red.get_pixel(0, 0), &Rgba(RED));
}

#[test]
fn corrupt_sheet_payload_is_reported_and_left_absent() {
    let root = tempfile::tempdir().unwrap();
    write_atlas(root.path());
    let corrupt = root.path().join("Atlas").join("sheet_1.kyxsheet");
    let mut file = File::create(&corrupt).unwrap();
    SheetHeader {
        index: 1,
        byte_size: 256,
    }
    .encode(&mut file)
    .unwrap();
    file.write_all(b"not a png").unwrap();
    drop(file);

    let mut atlas = AtlasSystem::new(ImageSheetLoader);
    atlas.init(&AtlasConfig::new(root.path())).unwrap();
    let banner = atlas.sprite("banner").unwrap().clone();
    atlas.allocate(&banner).unwrap();
    let snapshot = atlas.flush().unwrap();

    assert_eq!(snapshot.recency, [SheetIndex::new(0)]);
    assert_eq!(atlas.stats().unwrap().load_failures, 1);

    let mut renderer = CanvasRenderer::new(8, 4);
    let drawn = atlas
        .draw_into(&mut renderer, &banner, Rect::new(0, 0, 8, 4), Tint::WHITE)
        .unwrap();
    assert_eq!(drawn, 1);
}
