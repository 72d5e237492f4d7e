//! Image sniffing for downloaded bytes

use crate::error::FetchError;
use crate::extract::links::{extension_of, is_image_extension};
use image::ImageReader;
use std::io::Cursor;

/// Native size assumed when the header carries no usable dimensions
pub const DEFAULT_IMAGE_SIZE_PX: u32 = 120;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub mime: String,
    pub extension: String,
    pub width_px: u32,
    pub height_px: u32,
}

/// Identify an image from its leading bytes.
///
/// Fails with [`FetchError::NotAnImage`] when no known signature matches.
/// The part extension comes from the sniffed MIME type, then the URL, and
/// defaults to `png`; the server's content type is never trusted for it.
pub fn probe(bytes: &[u8], url: &str) -> Result<ImageInfo, FetchError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|_| FetchError::NotAnImage)?;
    let format = reader.format().ok_or(FetchError::NotAnImage)?;
    let mime = format.to_mime_type().to_string();

    let (width_px, height_px) = match reader.into_dimensions() {
        Ok((w, h)) if w > 0 && h > 0 => (w, h),
        _ => (DEFAULT_IMAGE_SIZE_PX, DEFAULT_IMAGE_SIZE_PX),
    };

    let extension = extension_for_mime(&mime)
        .map(str::to_string)
        .or_else(|| {
            let ext = extension_of(url);
            is_image_extension(&ext).then_some(ext)
        })
        .unwrap_or_else(|| "png".to_string());

    Ok(ImageInfo {
        mime,
        extension,
        width_px,
        height_px,
    })
}

/// Media part extension for an image MIME type
pub fn extension_for_mime(mime: &str) -> Option<&'static str> {
    let essence = mime.split(';').next().unwrap_or_default().trim();
    match essence.to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// Content type registered for a media part extension
pub fn mime_for_extension(extension: &str) -> &'static str {
    match extension {
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "image/png",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};

    fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        RgbImage::new(width, height)
            .write_to(&mut buffer, format)
            .unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_probe_png() {
        let bytes = encode(40, 20, ImageFormat::Png);
        let info = probe(&bytes, "https://x.example/a").unwrap();
        assert_eq!(info.mime, "image/png");
        assert_eq!(info.extension, "png");
        assert_eq!((info.width_px, info.height_px), (40, 20));
    }

    #[test]
    fn test_probe_jpeg_uses_jpg_extension() {
        let bytes = encode(8, 8, ImageFormat::Jpeg);
        let info = probe(&bytes, "https://x.example/p.jpeg").unwrap();
        assert_eq!(info.mime, "image/jpeg");
        assert_eq!(info.extension, "jpg");
    }

    #[test]
    fn test_probe_rejects_non_images() {
        assert_eq!(
            probe(b"<html>not found</html>", "https://x.example/a.png"),
            Err(FetchError::NotAnImage)
        );
    }

    #[test]
    fn test_probe_extension_fallbacks() {
        let bmp_header = b"BM\x3a\x00\x00\x00\x00\x00\x00\x00\x36\x00\x00\x00";

        let info = probe(bmp_header, "https://x.example/scan.bmp").unwrap();
        assert_eq!(info.mime, "image/bmp");
        assert_eq!(info.extension, "png");

        let info = probe(bmp_header, "https://x.example/scan.webp?v=1").unwrap();
        assert_eq!(info.extension, "webp");

        let info = probe(bmp_header, "https://x.example/scan").unwrap();
        assert_eq!(info.extension, "png");
        assert_eq!(info.width_px, DEFAULT_IMAGE_SIZE_PX);
    }

    #[test]
    fn test_mime_mapping() {
        assert_eq!(extension_for_mime("image/JPEG; charset=binary"), Some("jpg"));
        assert_eq!(extension_for_mime("image/bmp"), None);
        assert_eq!(mime_for_extension("jpg"), "image/jpeg");
        assert_eq!(mime_for_extension("png"), "image/png");
    }
}
