use std::fs::File;
use std::io::{BufReader, Cursor, Read};

use atlas_format::read_sheet_header;
use image::RgbaImage;
use sheet_cache::{SheetDescriptor, SheetLoadError, SheetLoader};

/// Decodes sheet payloads into CPU-side RGBA8 images.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageSheetLoader;

impl SheetLoader for ImageSheetLoader {
    type Resource = RgbaImage;

    fn load(&self, sheet: &SheetDescriptor) -> Result<RgbaImage, SheetLoadError> {
        decode_sheet_rgba8(sheet)
    }
}

/// Reads the sheet file behind `sheet` and decodes its payload to RGBA8.
pub fn decode_sheet_rgba8(sheet: &SheetDescriptor) -> Result<RgbaImage, SheetLoadError> {
    let payload = read_sheet_payload(sheet)?;
    let decoded = image::ImageReader::new(Cursor::new(payload))
        .with_guessed_format()
        .map_err(|error| decode_failed(sheet, error))?
        .decode()
        .map_err(|error| decode_failed(sheet, error))?;
    Ok(decoded.to_rgba8())
}

fn decode_failed(
    sheet: &SheetDescriptor,
    error: impl std::error::Error + Send + Sync + 'static,
) -> SheetLoadError {
    SheetLoadError::Decode {
        index: sheet.index,
        source: Box::new(error),
    }
}

/// Verifies the header still names `sheet` and returns the bytes after it.
fn read_sheet_payload(sheet: &SheetDescriptor) -> Result<Vec<u8>, SheetLoadError> {
    let unavailable = |source| SheetLoadError::Unavailable {
        path: sheet.locator.clone(),
        source,
    };
    let mut reader = BufReader::new(File::open(&sheet.locator).map_err(unavailable)?);
    let header = read_sheet_header(&mut reader).map_err(|error| decode_failed(sheet, error))?;
    if header.index != sheet.index.raw() {
        return Err(SheetLoadError::HeaderMismatch {
            path: sheet.locator.clone(),
            expected: sheet.index,
        });
    }
    let mut payload = Vec::new();
    reader.read_to_end(&mut payload).map_err(unavailable)?;
    Ok(payload)
}

#[cfg(feature = "gpu")]
pub use gpu::{GpuSheetLoader, SheetTexture};

#[cfg(feature = "gpu")]
mod gpu {
    use sheet_cache::{SheetDescriptor, SheetLoadError, SheetLoader};

    use super::decode_sheet_rgba8;

    /// A sheet uploaded to the GPU.
    #[derive(Debug)]
    pub struct SheetTexture {
        pub texture: wgpu::Texture,
        pub view: wgpu::TextureView,
        pub width: u32,
        pub height: u32,
    }

    /// Uploads decoded sheets into `Rgba8UnormSrgb` textures.
    #[derive(Debug, Clone)]
    pub struct GpuSheetLoader {
        device: wgpu::Device,
        queue: wgpu::Queue,
    }

    impl GpuSheetLoader {
        pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
            Self { device, queue }
        }
    }

    impl SheetLoader for GpuSheetLoader {
        type Resource = SheetTexture;

        fn load(&self, sheet: &SheetDescriptor) -> Result<SheetTexture, SheetLoadError> {
            let pixels = decode_sheet_rgba8(sheet)?;
            let (width, height) = pixels.dimensions();
            let size = wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            };
            let label = format!("sprite_atlas.sheet.{}", sheet.index);
            let texture = self.device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label.as_str()),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            });
            self.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                pixels.as_raw(),
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(width * 4),
                    rows_per_image: Some(height),
                },
                size,
            );
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            Ok(SheetTexture {
                texture,
                view,
                width,
                height,
            })
        }

        fn release(&self, _sheet: &SheetDescriptor, resource: &SheetTexture) {
            resource.texture.destroy();
        }
    }
}
