//! PNG encoding, data URLs and file export.

use super::render::{to_colored_image, to_grayscale_image};
use crate::core::errors::{DepthError, DepthResult, ProcessingStage};
use crate::domain::{Adjustments, Colormap, DepthMap};
use base64::Engine;
use image::{ImageFormat, RgbaImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};

const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Encodes an RGBA image as PNG bytes.
pub fn encode_png(image: &RgbaImage) -> DepthResult<Vec<u8>> {
    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| DepthError::image_encode("PNG export", e))?;
    Ok(png)
}

/// Wraps PNG bytes in a `data:image/png;base64,` URL.
pub fn to_data_url(png: &[u8]) -> String {
    let mut url = String::from(PNG_DATA_URL_PREFIX);
    base64::engine::general_purpose::STANDARD.encode_string(png, &mut url);
    url
}

/// Decodes a base64 image data URL back into an RGBA image.
///
/// Any image media type the `image` crate can sniff is accepted.
pub fn decode_data_url(url: &str) -> DepthResult<RgbaImage> {
    let payload = url
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(";base64,"))
        .map(|(_, payload)| payload)
        .ok_or_else(|| DepthError::invalid_input("not a base64 data URL"))?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| {
            DepthError::processing_error(ProcessingStage::Encoding, "invalid base64 payload", e)
        })?;
    let image = image::load_from_memory(&bytes)?;
    Ok(image.to_rgba8())
}

/// File name used for exported depth maps.
pub fn export_filename(timestamp_ms: u64) -> String {
    format!("depth_map_{timestamp_ms}.png")
}

/// Writes exported bytes to `directory/filename`, creating the directory if needed.
pub fn trigger_download(bytes: &[u8], directory: &Path, filename: &str) -> DepthResult<PathBuf> {
    let plain_name = Path::new(filename).file_name() == Some(std::ffi::OsStr::new(filename));
    if filename.is_empty() || !plain_name {
        return Err(DepthError::invalid_input(format!(
            "export file name '{filename}' must be a plain file name"
        )));
    }
    std::fs::create_dir_all(directory)?;
    let path = directory.join(filename);
    std::fs::write(&path, bytes)?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "Exported depth image");
    Ok(path)
}

/// Renders a depth map with neutral adjustments and writes it as PNG.
pub fn download_depth_map(
    map: &DepthMap,
    directory: &Path,
    filename: &str,
    colored: bool,
    colormap: Colormap,
) -> DepthResult<PathBuf> {
    let image = if colored {
        to_colored_image(map, colormap, &Adjustments::IDENTITY)
    } else {
        to_grayscale_image(map, &Adjustments::IDENTITY)
    };
    let png = encode_png(&image)?;
    trigger_download(&png, directory, filename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_data_url_round_trip() {
        let mut image = RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 255]));
        image.put_pixel(1, 1, Rgba([200, 100, 50, 255]));
        let url = to_data_url(&encode_png(&image).expect("encode"));
        assert!(url.starts_with("data:image/png;base64,"));
        let decoded = decode_data_url(&url).expect("decode");
        assert_eq!(decoded, image);
    }

    #[test]
    fn test_decode_rejects_malformed_urls() {
        assert!(matches!(
            decode_data_url("https://example.com/a.png"),
            Err(DepthError::InvalidInput { .. })
        ));
        assert!(matches!(
            decode_data_url("data:image/png;base64,@@@"),
            Err(DepthError::Processing {
                kind: ProcessingStage::Encoding,
                ..
            })
        ));
        assert!(matches!(
            decode_data_url("data:image/png;base64,aGVsbG8="),
            Err(DepthError::ImageLoad(_))
        ));
    }

    #[test]
    fn test_export_filename() {
        assert_eq!(export_filename(1700000000123), "depth_map_1700000000123.png");
    }

    #[test]
    fn test_download_depth_map_writes_png() {
        let dir = tempfile::tempdir().expect("tempdir");
        let map = DepthMap::from_fn(4, 4, |x, y| (x * y) as f32).expect("valid map");
        let path = download_depth_map(
            &map,
            &dir.path().join("exports"),
            &export_filename(42),
            true,
            Colormap::Plasma,
        )
        .expect("export");
        assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("depth_map_42.png"));
        let written = image::open(&path).expect("readable png");
        assert_eq!((written.width(), written.height()), (4, 4));
    }

    #[test]
    fn test_trigger_download_rejects_nested_names() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(trigger_download(b"png", dir.path(), "../escape.png").is_err());
        assert!(trigger_download(b"png", dir.path(), "").is_err());
    }
}
