//! Encoder drivers for the output format registry.
//!
//! `render` dispatches a postprocessed tile to the driver selected by the
//! format registry. GeoTIFF is the one format that carries spatial
//! metadata: a pixel-scale/tiepoint pair plus a geo key directory naming
//! the tile matrix set's CRS. `npy` bypasses the image codecs entirely and
//! packs the raw samples and the alignment mask into an NPY container.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

use crate::colormap::ColorMap;
use crate::postprocess::ScaledTile;
use tiler_common::{tile::GeoTransform, CrsCode, ImageType, TilerError, TilerResult};

// GeoTIFF tag ids.
const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
const TAG_MODEL_TIEPOINT: u16 = 33922;
const TAG_GEO_KEY_DIRECTORY: u16 = 34735;

// Per-driver default encoder options (the profile table).
const JPEG_QUALITY: u8 = 85;
const WEBP_QUALITY: f32 = 75.0;

/// Spatial metadata injected into GeoTIFF output.
#[derive(Debug, Clone, Copy)]
pub struct GeoReference {
    pub crs: CrsCode,
    pub transform: GeoTransform,
}

/// Encode a postprocessed tile in the requested format.
///
/// `geo` is required for (and only used by) `Tif`. A colormap, when given,
/// replaces the gray expansion of single-band tiles.
pub fn render(
    tile: &ScaledTile,
    colormap: Option<&ColorMap>,
    format: ImageType,
    geo: Option<&GeoReference>,
) -> TilerResult<Vec<u8>> {
    match format {
        ImageType::Npy => Ok(encode_npy(tile)),
        ImageType::Png => encode_png(&to_rgba(tile, colormap)?, tile.width, tile.height),
        ImageType::Jpg => {
            let rgba = to_rgba(tile, colormap)?;
            encode_jpeg(&rgba_to_rgb(&rgba), tile.width, tile.height)
        }
        ImageType::Webp => {
            let rgba = to_rgba(tile, colormap)?;
            let encoder = webp::Encoder::from_rgba(&rgba, tile.width, tile.height);
            Ok(encoder.encode(WEBP_QUALITY).to_vec())
        }
        ImageType::Tif => {
            let geo = geo.ok_or_else(|| {
                TilerError::InternalError("GeoTIFF encoding requires a georeference".to_string())
            })?;
            encode_geotiff(&to_rgba(tile, colormap)?, tile.width, tile.height, geo)
        }
    }
}

/// Expand bands + mask into interleaved RGBA.
fn to_rgba(tile: &ScaledTile, colormap: Option<&ColorMap>) -> TilerResult<Vec<u8>> {
    let n = (tile.width * tile.height) as usize;
    let mut rgba = vec![0u8; n * 4];

    match (tile.bands.as_slice(), colormap) {
        ([band], Some(cmap)) => {
            for i in 0..n {
                let color = cmap.get(&band[i]).copied().unwrap_or([0, 0, 0, 0]);
                rgba[i * 4..i * 4 + 4].copy_from_slice(&color);
                if tile.mask[i] == 0 {
                    rgba[i * 4 + 3] = 0;
                }
            }
        }
        ([band], None) => {
            for i in 0..n {
                let v = band[i];
                rgba[i * 4] = v;
                rgba[i * 4 + 1] = v;
                rgba[i * 4 + 2] = v;
                rgba[i * 4 + 3] = tile.mask[i];
            }
        }
        ([r, g, b, ..], _) => {
            for i in 0..n {
                rgba[i * 4] = r[i];
                rgba[i * 4 + 1] = g[i];
                rgba[i * 4 + 2] = b[i];
                rgba[i * 4 + 3] = tile.mask[i];
            }
        }
        (bands, _) => {
            return Err(TilerError::EncodeError(format!(
                "cannot render {} band(s) as an image",
                bands.len()
            )))
        }
    }

    Ok(rgba)
}

fn rgba_to_rgb(rgba: &[u8]) -> Vec<u8> {
    rgba.chunks_exact(4)
        .flat_map(|px| [px[0], px[1], px[2]])
        .collect()
}

fn encode_png(rgba: &[u8], width: u32, height: u32) -> TilerResult<Vec<u8>> {
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf)
        .write_image(rgba, width, height, ColorType::Rgba8)
        .map_err(|e| TilerError::EncodeError(format!("PNG encoding failed: {}", e)))?;
    Ok(buf)
}

fn encode_jpeg(rgb: &[u8], width: u32, height: u32) -> TilerResult<Vec<u8>> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY)
        .write_image(rgb, width, height, ColorType::Rgb8)
        .map_err(|e| TilerError::EncodeError(format!("JPEG encoding failed: {}", e)))?;
    Ok(buf)
}

fn encode_geotiff(
    rgba: &[u8],
    width: u32,
    height: u32,
    geo: &GeoReference,
) -> TilerResult<Vec<u8>> {
    let tiff_err = |e: tiff::TiffError| TilerError::EncodeError(format!("TIFF encoding failed: {}", e));

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut cursor).map_err(tiff_err)?;
        let mut image = encoder
            .new_image::<colortype::RGBA8>(width, height)
            .map_err(tiff_err)?;

        image
            .encoder()
            .write_tag(
                Tag::Unknown(TAG_MODEL_PIXEL_SCALE),
                &geo.transform.pixel_scale()[..],
            )
            .map_err(tiff_err)?;
        image
            .encoder()
            .write_tag(
                Tag::Unknown(TAG_MODEL_TIEPOINT),
                &geo.transform.tiepoint()[..],
            )
            .map_err(tiff_err)?;
        image
            .encoder()
            .write_tag(
                Tag::Unknown(TAG_GEO_KEY_DIRECTORY),
                &geo_key_directory(geo.crs)[..],
            )
            .map_err(tiff_err)?;

        image.write_data(rgba).map_err(tiff_err)?;
    }
    Ok(cursor.into_inner())
}

/// GeoKeyDirectory: header (version, revision, minor, key count) followed
/// by (key id, location, count, value) entries.
fn geo_key_directory(crs: CrsCode) -> [u16; 16] {
    let (model_type, crs_key) = if crs.is_geographic() {
        (2, 2048) // ModelTypeGeographic, GeodeticCRSGeoKey
    } else {
        (1, 3072) // ModelTypeProjected, ProjectedCSTypeGeoKey
    };
    [
        1, 1, 0, 3, // header
        1024, 0, 1, model_type, // GTModelTypeGeoKey
        1025, 0, 1, 1, // GTRasterTypeGeoKey = PixelIsArea
        crs_key, 0, 1, crs.epsg(),
    ]
}

/// Pack the raw bands and the alignment mask into an NPY v1.0 container:
/// shape `(bands + 1, height, width)`, dtype `|u1`, mask as the last plane.
pub fn encode_npy(tile: &ScaledTile) -> Vec<u8> {
    let planes = tile.bands.len() + 1;
    let header_dict = format!(
        "{{'descr': '|u1', 'fortran_order': False, 'shape': ({}, {}, {}), }}",
        planes, tile.height, tile.width
    );

    // Magic + version + u16 header length, with the header padded so the
    // data section starts on a 64-byte boundary.
    let unpadded = 10 + header_dict.len() + 1;
    let padding = (64 - unpadded % 64) % 64;
    let header_len = (header_dict.len() + padding + 1) as u16;

    let plane_size = (tile.width * tile.height) as usize;
    let mut out = Vec::with_capacity(10 + header_len as usize + planes * plane_size);
    out.extend_from_slice(b"\x93NUMPY");
    out.push(1);
    out.push(0);
    out.extend_from_slice(&header_len.to_le_bytes());
    out.extend_from_slice(header_dict.as_bytes());
    out.extend(std::iter::repeat(b' ').take(padding));
    out.push(b'\n');

    for band in &tile.bands {
        out.extend_from_slice(band);
    }
    out.extend_from_slice(&tile.mask);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiler_common::BoundingBox;

    fn rgb_tile() -> ScaledTile {
        ScaledTile {
            width: 4,
            height: 4,
            bands: vec![vec![10; 16], vec![20; 16], vec![30; 16]],
            mask: vec![255; 16],
        }
    }

    fn geo() -> GeoReference {
        GeoReference {
            crs: CrsCode::Epsg3857,
            transform: GeoTransform::from_bounds(
                &BoundingBox::new(0.0, 0.0, 1024.0, 1024.0),
                4,
                4,
            ),
        }
    }

    #[test]
    fn test_png_magic() {
        let bytes = render(&rgb_tile(), None, ImageType::Png, None).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn test_jpeg_magic() {
        let bytes = render(&rgb_tile(), None, ImageType::Jpg, None).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_webp_magic() {
        let bytes = render(&rgb_tile(), None, ImageType::Webp, None).unwrap();
        assert_eq!(&bytes[..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WEBP");
    }

    #[test]
    fn test_tif_has_spatial_tags() {
        let bytes = render(&rgb_tile(), None, ImageType::Tif, Some(&geo())).unwrap();
        // Little-endian TIFF magic.
        assert_eq!(&bytes[..4], b"II\x2a\x00");
        // The geo key directory must reference EPSG:3857.
        assert!(contains_u16_le(&bytes, 34735), "geo key directory tag missing");
        assert!(contains_u16_le(&bytes, 3857), "EPSG code missing");
    }

    #[test]
    fn test_tif_requires_georeference() {
        assert!(render(&rgb_tile(), None, ImageType::Tif, None).is_err());
    }

    #[test]
    fn test_non_tif_formats_carry_no_geo_tags() {
        for format in [ImageType::Png, ImageType::Jpg, ImageType::Webp] {
            let bytes = render(&rgb_tile(), None, format, Some(&geo())).unwrap();
            assert!(!contains_u16_le(&bytes, 34735));
        }
    }

    #[test]
    fn test_npy_container() {
        let tile = ScaledTile {
            width: 2,
            height: 2,
            bands: vec![vec![1, 2, 3, 4]],
            mask: vec![255, 255, 0, 255],
        };
        let bytes = encode_npy(&tile);
        assert_eq!(&bytes[..6], b"\x93NUMPY");
        assert_eq!(bytes[6], 1); // version 1.0
        let header_len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
        assert_eq!((10 + header_len) % 64, 0);

        let header = std::str::from_utf8(&bytes[10..10 + header_len]).unwrap();
        assert!(header.contains("'shape': (2, 2, 2)"));
        assert!(header.contains("'|u1'"));

        // Band plane then mask plane.
        let data = &bytes[10 + header_len..];
        assert_eq!(data, &[1, 2, 3, 4, 255, 255, 0, 255]);
    }

    #[test]
    fn test_colormap_applied_to_single_band() {
        let tile = ScaledTile {
            width: 1,
            height: 1,
            bands: vec![vec![0]],
            mask: vec![255],
        };
        let mut cmap = ColorMap::new();
        cmap.insert(0, [9, 8, 7, 255]);
        let rgba = to_rgba(&tile, Some(&cmap)).unwrap();
        assert_eq!(rgba, vec![9, 8, 7, 255]);

        // Values missing from the map become transparent.
        let tile2 = ScaledTile {
            width: 1,
            height: 1,
            bands: vec![vec![42]],
            mask: vec![255],
        };
        let rgba = to_rgba(&tile2, Some(&cmap)).unwrap();
        assert_eq!(rgba[3], 0);
    }

    #[test]
    fn test_mask_becomes_alpha() {
        let tile = ScaledTile {
            width: 2,
            height: 1,
            bands: vec![vec![100, 100]],
            mask: vec![255, 0],
        };
        let rgba = to_rgba(&tile, None).unwrap();
        assert_eq!(rgba[3], 255);
        assert_eq!(rgba[7], 0);
    }

    fn contains_u16_le(haystack: &[u8], value: u16) -> bool {
        let needle = value.to_le_bytes();
        haystack.windows(2).any(|w| w == needle)
    }
}
