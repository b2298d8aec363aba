use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::tga::TgaEncoder;
use image::{ColorType, DynamicImage, ImageEncoder, ImageFormat, RgbaImage};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::canvas::Snapshot;
use crate::error::PaintError;

/// Largest side accepted from a decoded pattern or paste image.
pub const MAX_IMPORT_DIM: u32 = 16_384;

pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Raster formats the export path can encode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SaveFormat {
    #[default]
    Png,
    Jpeg,
    Webp,
    Bmp,
    Tga,
}

impl SaveFormat {
    pub fn all() -> &'static [SaveFormat] {
        &[
            SaveFormat::Png,
            SaveFormat::Jpeg,
            SaveFormat::Webp,
            SaveFormat::Bmp,
            SaveFormat::Tga,
        ]
    }

    pub fn extension(&self) -> &'static str {
        match self {
            SaveFormat::Png => "png",
            SaveFormat::Jpeg => "jpg",
            SaveFormat::Webp => "webp",
            SaveFormat::Bmp => "bmp",
            SaveFormat::Tga => "tga",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SaveFormat::Png => "PNG",
            SaveFormat::Jpeg => "JPEG",
            SaveFormat::Webp => "WebP",
            SaveFormat::Bmp => "BMP",
            SaveFormat::Tga => "TGA",
        }
    }

    pub fn supports_quality(&self) -> bool {
        matches!(self, SaveFormat::Jpeg)
    }

    pub fn from_extension(ext: &str) -> Option<SaveFormat> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(SaveFormat::Png),
            "jpg" | "jpeg" => Some(SaveFormat::Jpeg),
            "webp" => Some(SaveFormat::Webp),
            "bmp" => Some(SaveFormat::Bmp),
            "tga" => Some(SaveFormat::Tga),
            _ => None,
        }
    }

    /// Format implied by the path's extension, PNG when there is none.
    pub fn from_path(path: &Path) -> SaveFormat {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(SaveFormat::from_extension)
            .unwrap_or_default()
    }
}

/// Encode and write an image to a file.
/// Standalone (no session borrow) so it can run on a `rayon::spawn` worker.
pub fn encode_and_write(
    image: &RgbaImage,
    path: &Path,
    format: SaveFormat,
    quality: u8,
) -> Result<(), PaintError> {
    if format == SaveFormat::Webp {
        DynamicImage::ImageRgba8(image.clone()).save_with_format(path, ImageFormat::WebP)?;
        return Ok(());
    }

    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let (w, h) = image.dimensions();

    match format {
        SaveFormat::Png => {
            PngEncoder::new(&mut writer).write_image(image.as_raw(), w, h, ColorType::Rgba8)?;
        }
        SaveFormat::Jpeg => {
            // JPEG has no alpha channel.
            let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
            let mut encoder = JpegEncoder::new_with_quality(&mut writer, quality.clamp(1, 100));
            encoder.encode(rgb.as_raw(), w, h, ColorType::Rgb8)?;
        }
        SaveFormat::Bmp => {
            BmpEncoder::new(&mut writer).encode(image.as_raw(), w, h, ColorType::Rgba8)?;
        }
        SaveFormat::Tga => {
            TgaEncoder::new(&mut writer).encode(image.as_raw(), w, h, ColorType::Rgba8)?;
        }
        SaveFormat::Webp => unreachable!("handled above"),
    }

    writer.flush()?;
    Ok(())
}

/// Write a history snapshot to `path`, picking the encoder from the extension.
pub fn export_snapshot(snapshot: &Snapshot, path: &Path, quality: u8) -> Result<(), PaintError> {
    let format = SaveFormat::from_path(path);
    encode_and_write(snapshot.image(), path, format, quality)?;
    log_info!(
        "Export: {}x{} {} -> {}",
        snapshot.width(),
        snapshot.height(),
        format.label(),
        path.display()
    );
    Ok(())
}

/// Decode any supported image into RGBA8.
pub fn load_image(path: &Path) -> Result<RgbaImage, PaintError> {
    let img = image::open(path)?.into_rgba8();
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 || w > MAX_IMPORT_DIM || h > MAX_IMPORT_DIM {
        return Err(PaintError::Image(format!(
            "{}: unsupported image size {}x{}",
            path.display(),
            w,
            h
        )));
    }
    Ok(img)
}

/// `<dir>/paintpad-<unix seconds>.<ext>`.
pub fn default_export_path(dir: &Path, format: SaveFormat) -> PathBuf {
    dir.join(format!(
        "paintpad-{}.{}",
        crate::logger::unix_seconds(),
        format.extension()
    ))
}

/// Native open dialog for pattern and paste images.
#[cfg(feature = "gui")]
pub fn pick_image_file() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .add_filter("Images", &["png", "jpg", "jpeg", "webp", "bmp", "tga"])
        .add_filter("All Files", &["*"])
        .pick_file()
}

/// Native save dialog; the chosen extension selects the encoder.
#[cfg(feature = "gui")]
pub fn pick_save_file(default_name: &str) -> Option<PathBuf> {
    let mut dialog = rfd::FileDialog::new().set_file_name(default_name);
    for format in SaveFormat::all() {
        dialog = dialog.add_filter(format.label(), &[format.extension()]);
    }
    dialog.save_file()
}
