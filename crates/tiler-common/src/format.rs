//! Output image format registry.
//!
//! Closed enumeration of the supported output formats. Every variant maps
//! to an encoder driver and a MIME type through exhaustive matches, so a
//! new variant cannot be added without defining both.

use crate::error::TilerError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported output image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageType {
    Png,
    Jpg,
    Webp,
    Tif,
    /// Raw array passthrough for programmatic consumers; no encoder driver.
    Npy,
}

impl ImageType {
    /// All variants, in declaration order.
    pub const ALL: [ImageType; 5] = [
        ImageType::Png,
        ImageType::Jpg,
        ImageType::Webp,
        ImageType::Tif,
        ImageType::Npy,
    ];

    /// Encoder driver name. `Npy` is a raw container and has no driver.
    pub fn driver(&self) -> Option<&'static str> {
        match self {
            ImageType::Png => Some("PNG"),
            ImageType::Jpg => Some("JPEG"),
            ImageType::Webp => Some("WEBP"),
            ImageType::Tif => Some("GTiff"),
            ImageType::Npy => None,
        }
    }

    /// MIME type for the Content-Type header.
    pub fn mime(&self) -> &'static str {
        match self {
            ImageType::Png => "image/png",
            ImageType::Jpg => "image/jpg",
            ImageType::Webp => "image/webp",
            ImageType::Tif => "image/tiff",
            ImageType::Npy => "application/x-binary",
        }
    }

    /// File extension as it appears in tile URLs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageType::Png => "png",
            ImageType::Jpg => "jpg",
            ImageType::Webp => "webp",
            ImageType::Tif => "tif",
            ImageType::Npy => "npy",
        }
    }

    /// Parse a URL extension segment.
    pub fn from_extension(ext: &str) -> Result<Self, TilerError> {
        match ext {
            "png" => Ok(ImageType::Png),
            "jpg" | "jpeg" => Ok(ImageType::Jpg),
            "webp" => Ok(ImageType::Webp),
            "tif" | "tiff" => Ok(ImageType::Tif),
            "npy" => Ok(ImageType::Npy),
            other => Err(TilerError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Stable discriminant used by the cache entry framing.
    pub fn discriminant(&self) -> u8 {
        match self {
            ImageType::Png => 0,
            ImageType::Jpg => 1,
            ImageType::Webp => 2,
            ImageType::Tif => 3,
            ImageType::Npy => 4,
        }
    }

    /// Inverse of [`ImageType::discriminant`].
    pub fn from_discriminant(d: u8) -> Option<Self> {
        match d {
            0 => Some(ImageType::Png),
            1 => Some(ImageType::Jpg),
            2 => Some(ImageType::Webp),
            3 => Some(ImageType::Tif),
            4 => Some(ImageType::Npy),
            _ => None,
        }
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
