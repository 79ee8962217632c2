//! Generated QR images.
//!
//! Each registered student gets `<identifier>.png` in a single directory.
//! The directory is also served read-only over HTTP.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat, Luma};
use qrcode::QrCode;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Extension of generated images.
pub const IMAGE_EXTENSION: &str = "png";

/// Render `data` as a QR code and return the PNG bytes.
///
/// # Errors
///
/// Returns an error if the data does not fit in a QR code or PNG encoding
/// fails.
pub fn render_png(data: &str) -> Result<Vec<u8>> {
    let code = QrCode::new(data.as_bytes())?;
    let image = code.render::<Luma<u8>>().quiet_zone(true).build();

    let mut bytes = Vec::new();
    DynamicImage::ImageLuma8(image).write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

/// The image directory.
#[derive(Debug, Clone)]
pub struct QrImages {
    dir: PathBuf,
}

impl QrImages {
    /// Use `dir` for images, creating it if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|source| Error::DirectoryCreate {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(Self { dir })
    }

    /// The image directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name used for `identifier`.
    #[must_use]
    pub fn file_name(identifier: &str) -> String {
        format!("{identifier}.{IMAGE_EXTENSION}")
    }

    /// Render and persist the image for `identifier`, returning its file name.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering or writing fails.
    pub fn write(&self, identifier: &str) -> Result<String> {
        let file_name = Self::file_name(identifier);
        let bytes = render_png(identifier)?;
        fs::write(self.dir.join(&file_name), bytes)?;
        debug!("Wrote QR image {}", file_name);
        Ok(file_name)
    }

    /// The lexicographically first file whose name starts with `prefix`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed.
    pub fn find_by_prefix(&self, prefix: &str) -> Result<Option<String>> {
        Ok(self
            .file_names()?
            .into_iter()
            .find(|name| name.starts_with(prefix)))
    }

    /// Sorted names of the regular files in the directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed.
    pub fn file_names(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Delete every file in the directory, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if listing or deleting fails.
    pub fn clear(&self) -> Result<usize> {
        let names = self.file_names()?;
        for name in &names {
            fs::remove_file(self.dir.join(name))?;
        }
        info!("Removed {} QR images", names.len());
        Ok(names.len())
    }
}
