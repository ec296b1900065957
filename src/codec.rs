//! Image import/export: decoding uploads, encoding surfaces to PNG.

use std::io::Cursor;
use std::path::Path;

use base64::Engine;
use image::{ImageFormat, RgbaImage};

use crate::error::{EditorError, Result};
use crate::surface::RasterSurface;

/// Default upload size limit (10 MiB).
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

const SUPPORTED_FORMATS: [ImageFormat; 4] = [
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::Gif,
    ImageFormat::WebP,
];

/// Raw image bytes as they arrive from an upload widget or the filesystem.
#[derive(Debug, Clone)]
pub struct Upload {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes,
        }
    }

    /// Read a file asynchronously. The MIME type is inferred from the extension.
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(name, mime_for_path(path), bytes))
    }
}

/// An encoded raster ready to be handed to a download/save collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct Export {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl Export {
    pub fn to_data_url(&self) -> String {
        to_data_url("image/png", &self.bytes)
    }
}

pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Check the upload constraints the editor enforces before any bytes reach
/// the layer store.
pub fn validate_upload(upload: &Upload, max_bytes: usize) -> Result<()> {
    if !upload.mime.starts_with("image/") {
        return Err(EditorError::Validation(format!(
            "'{}' is not an image file",
            upload.name
        )));
    }
    if upload.bytes.len() > max_bytes {
        return Err(EditorError::Validation(format!(
            "'{}' is {} bytes, limit is {}",
            upload.name,
            upload.bytes.len(),
            max_bytes
        )));
    }
    match image::guess_format(&upload.bytes) {
        Ok(format) if SUPPORTED_FORMATS.contains(&format) => Ok(()),
        _ => Err(EditorError::Validation(format!(
            "'{}' is not a JPEG, PNG, GIF or WebP image",
            upload.name
        ))),
    }
}

/// Decode png/jpeg/gif/webp bytes to straight-alpha RGBA. The source size is
/// the returned image's dimensions.
pub fn decode(bytes: &[u8]) -> Result<RgbaImage> {
    let format = image::guess_format(bytes)
        .map_err(|e| EditorError::Decode(e.to_string()))?;
    if !SUPPORTED_FORMATS.contains(&format) {
        return Err(EditorError::Decode(format!(
            "unsupported format {:?}",
            format
        )));
    }
    let img = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| EditorError::Decode(e.to_string()))?;
    let rgba = img.into_rgba8();
    if rgba.width() == 0 || rgba.height() == 0 {
        return Err(EditorError::Decode("image has no pixels".to_string()));
    }
    Ok(rgba)
}

pub fn encode_png(surface: &RasterSurface) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    surface
        .image()
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|e| EditorError::Encode(e.to_string()))?;
    Ok(out.into_inner())
}

/// `<prefix>_<stem>.png`, where the stem is the upload name up to its first dot.
pub fn suggested_filename(prefix: &str, upload_name: &str) -> String {
    let stem = upload_name.split('.').next().unwrap_or_default();
    let stem = if stem.is_empty() { "image" } else { stem };
    format!("{}_{}.png", prefix, stem)
}

pub fn to_data_url(mime: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime,
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img: RgbaImage = ImageBuffer::from_pixel(width, height, Rgba([1, 2, 3, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_decode_png() {
        let img = decode(&png_bytes(7, 3)).unwrap();
        assert_eq!(img.dimensions(), (7, 3));
        assert_eq!(*img.get_pixel(0, 0), Rgba([1, 2, 3, 255]));
    }

    #[test]
    fn test_decode_garbage_fails() {
        let err = decode(b"definitely not an image").unwrap_err();
        assert!(matches!(err, EditorError::Decode(_)));
    }

    #[test]
    fn test_decode_truncated_png_fails() {
        let bytes = png_bytes(16, 16);
        let err = decode(&bytes[..bytes.len() / 2]).unwrap_err();
        assert!(matches!(err, EditorError::Decode(_)));
    }

    #[test]
    fn test_encode_decodes_back() {
        let surface = RasterSurface::from_image(ImageBuffer::from_pixel(
            5,
            4,
            Rgba([10, 20, 30, 40]),
        ))
        .unwrap();
        let bytes = encode_png(&surface).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Png);
        assert_eq!(&decode(&bytes).unwrap(), surface.image());
    }

    #[test]
    fn test_suggested_filename() {
        assert_eq!(suggested_filename("masked", "photo.jpg"), "masked_photo.png");
        assert_eq!(
            suggested_filename("masked", "holiday.final.jpeg"),
            "masked_holiday.png"
        );
        assert_eq!(suggested_filename("mask", "noext"), "mask_noext.png");
        assert_eq!(suggested_filename("masked", ".hidden"), "masked_image.png");
    }

    #[test]
    fn test_validate_rejects_non_image_mime() {
        let upload = Upload::new("notes.txt", "text/plain", png_bytes(2, 2));
        assert!(matches!(
            validate_upload(&upload, MAX_UPLOAD_BYTES),
            Err(EditorError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_rejects_oversize() {
        let upload = Upload::new("big.png", "image/png", png_bytes(2, 2));
        assert!(validate_upload(&upload, 10).is_err());
        assert!(validate_upload(&upload, MAX_UPLOAD_BYTES).is_ok());
    }

    #[test]
    fn test_validate_rejects_unsupported_format() {
        let upload = Upload::new("fake.png", "image/png", b"GIF-ish but not".to_vec());
        assert!(validate_upload(&upload, MAX_UPLOAD_BYTES).is_err());
    }

    #[test]
    fn test_mime_for_path() {
        assert_eq!(mime_for_path(Path::new("a/b.JPG")), "image/jpeg");
        assert_eq!(mime_for_path(Path::new("x.webp")), "image/webp");
        assert_eq!(mime_for_path(Path::new("x.bmp")), "application/octet-stream");
    }

    #[test]
    fn test_data_url() {
        assert_eq!(to_data_url("image/png", b"abc"), "data:image/png;base64,YWJj");
    }

    #[tokio::test]
    async fn test_upload_from_missing_path_errors() {
        assert!(Upload::from_path(Path::new("/nonexistent/dir/x.png"))
            .await
            .is_err());
    }
}
