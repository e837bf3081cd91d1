//! Image inputs and their materialization as files.

use std::io::{BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage, RgbaImage};
use tempfile::TempPath;
use tracing::debug;

use crate::error::{Result, WinOcrError};

/// Something to recognize: a file on disk or an image in memory.
#[derive(Debug, Clone)]
pub enum ImageRef {
    /// An image file in any format the OS decoder supports.
    Path(PathBuf),
    /// A decoded image. It is written to a temporary PNG before recognition.
    Image(DynamicImage),
}

impl ImageRef {
    /// Wrap raw RGBA pixel data (4 bytes per pixel, row-major).
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(WinOcrError::InvalidImage(format!(
                "invalid RGBA data size: expected {} bytes for {}x{}, got {}",
                expected,
                width,
                height,
                data.len()
            )));
        }

        let buffer = RgbaImage::from_raw(width, height, data)
            .ok_or_else(|| WinOcrError::InvalidImage("failed to create image buffer".to_string()))?;
        Ok(ImageRef::Image(DynamicImage::ImageRgba8(buffer)))
    }

    /// Short description for logs and CLI output.
    pub fn describe(&self) -> String {
        match self {
            ImageRef::Path(path) => path.display().to_string(),
            ImageRef::Image(img) => format!("<in-memory {}x{} image>", img.width(), img.height()),
        }
    }

    /// Turn the reference into an absolute, normalized file path the
    /// interpreter can open.
    pub(crate) fn prepare(self) -> Result<PreparedImage> {
        match self {
            ImageRef::Path(path) => Ok(PreparedImage {
                path: absolute(path)?,
                _temp: None,
            }),
            ImageRef::Image(img) => materialize(img),
        }
    }
}

/// An image ready to hand to the helper.
///
/// Holds the temporary file, if one was needed, and removes it on drop.
#[derive(Debug)]
pub(crate) struct PreparedImage {
    path: PathBuf,
    _temp: Option<TempPath>,
}

impl PreparedImage {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn absolute(path: PathBuf) -> std::io::Result<PathBuf> {
    let path = if path.is_absolute() {
        path
    } else {
        std::env::current_dir()?.join(path)
    };
    Ok(normalize(&path))
}

/// Drop `.` and resolve `..` lexically, rejoining with the native separator.
///
/// `StorageFile.GetFileFromPathAsync` rejects `/` and relative segments.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            // `..` at the root stays at the root
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

fn materialize(img: DynamicImage) -> Result<PreparedImage> {
    if img.width() == 0 || img.height() == 0 {
        return Err(WinOcrError::InvalidImage("image has no pixels".to_string()));
    }

    // PNG has no floating point pixel formats
    let img = match img {
        DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => {
            DynamicImage::ImageRgba8(img.to_rgba8())
        }
        other => other,
    };

    let file = tempfile::Builder::new()
        .prefix("winocr-")
        .suffix(".png")
        .tempfile()?;

    {
        let mut writer = BufWriter::new(file.as_file());
        img.write_to(&mut writer, ImageFormat::Png)?;
        writer.flush()?;
    }

    // Close our handle so the interpreter can open the file on Windows
    let temp = file.into_temp_path();
    debug!(
        "Materialized {}x{} image at {:?}",
        img.width(),
        img.height(),
        temp
    );

    Ok(PreparedImage {
        path: temp.to_path_buf(),
        _temp: Some(temp),
    })
}

impl From<PathBuf> for ImageRef {
    fn from(path: PathBuf) -> Self {
        ImageRef::Path(path)
    }
}

impl From<&Path> for ImageRef {
    fn from(path: &Path) -> Self {
        ImageRef::Path(path.to_path_buf())
    }
}

impl From<&PathBuf> for ImageRef {
    fn from(path: &PathBuf) -> Self {
        ImageRef::Path(path.clone())
    }
}

impl From<&str> for ImageRef {
    fn from(path: &str) -> Self {
        ImageRef::Path(PathBuf::from(path))
    }
}

impl From<String> for ImageRef {
    fn from(path: String) -> Self {
        ImageRef::Path(PathBuf::from(path))
    }
}

impl From<&String> for ImageRef {
    fn from(path: &String) -> Self {
        ImageRef::Path(PathBuf::from(path))
    }
}

impl From<DynamicImage> for ImageRef {
    fn from(img: DynamicImage) -> Self {
        ImageRef::Image(img)
    }
}

impl From<RgbaImage> for ImageRef {
    fn from(img: RgbaImage) -> Self {
        ImageRef::Image(DynamicImage::ImageRgba8(img))
    }
}

impl From<RgbImage> for ImageRef {
    fn from(img: RgbImage) -> Self {
        ImageRef::Image(DynamicImage::ImageRgb8(img))
    }
}

impl From<GrayImage> for ImageRef {
    fn from(img: GrayImage) -> Self {
        ImageRef::Image(DynamicImage::ImageLuma8(img))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rgba_validates_size() {
        let err = ImageRef::from_rgba(100, 100, vec![0; 100]).unwrap_err();
        assert!(matches!(err, WinOcrError::InvalidImage(_)));

        let ok = ImageRef::from_rgba(2, 3, vec![255; 24]).unwrap();
        assert_eq!(ok.describe(), "<in-memory 2x3 image>");
    }

    #[test]
    fn test_relative_path_becomes_absolute() {
        let prepared = ImageRef::from("scans/page1.png").prepare().unwrap();
        assert!(prepared.path().is_absolute());
        assert!(prepared.path().ends_with("scans/page1.png"));
    }

    #[test]
    fn test_relative_path_is_normalized() {
        let prepared = ImageRef::from("scans/../scans/./page1.png").prepare().unwrap();
        let expected = std::env::current_dir()
            .unwrap()
            .join("scans")
            .join("page1.png");

        assert_eq!(prepared.path(), expected.as_path());
        assert!(prepared
            .path()
            .components()
            .all(|c| !matches!(c, Component::CurDir | Component::ParentDir)));
    }

    #[test]
    fn test_normalize_stops_at_root() {
        let root = std::env::current_dir().unwrap();
        let root = root.ancestors().last().unwrap();

        assert_eq!(normalize(&root.join("..").join("a.png")), root.join("a.png"));
    }

    #[cfg(windows)]
    #[test]
    fn test_forward_slashes_become_native() {
        let prepared = ImageRef::from("C:/scans/./a.png").prepare().unwrap();
        assert_eq!(prepared.path(), Path::new(r"C:\scans\a.png"));
    }

    #[test]
    fn test_absolute_path_is_kept() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("a.png");

        let prepared = ImageRef::from(path.clone()).prepare().unwrap();
        assert_eq!(prepared.path(), path.as_path());
    }

    #[test]
    fn test_in_memory_image_is_written_and_removed() {
        let img = RgbaImage::from_pixel(8, 4, image::Rgba([0, 0, 0, 255]));

        let prepared = ImageRef::from(img).prepare().unwrap();
        let path = prepared.path().to_path_buf();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("png"));

        let decoded = image::open(&path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 4));

        drop(prepared);
        assert!(!path.exists());
    }

    #[test]
    fn test_float_image_is_converted() {
        let img = DynamicImage::new_rgba32f(3, 3);

        let prepared = ImageRef::from(img).prepare().unwrap();
        assert!(image::open(prepared.path()).is_ok());
    }

    #[test]
    fn test_empty_image_is_rejected() {
        let err = ImageRef::from(RgbaImage::new(0, 0)).prepare().unwrap_err();
        assert!(matches!(err, WinOcrError::InvalidImage(_)));
    }
}
