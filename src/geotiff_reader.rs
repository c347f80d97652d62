//! GeoTIFF reader for single-band input tiles and written chunks.
//!
//! Reads the first image directory of a file together with its GeoTIFF
//! georeferencing (`ModelPixelScale` + `ModelTiepoint`, or
//! `ModelTransformation`), the `GDAL_NODATA` tag and the EPSG code from the
//! GeoKey directory.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tiff::ColorType;

use crate::error::DecodeError;
use crate::geometry::GeoTransform;
use crate::raster::{Raster, RasterTile};
use crate::source::TileLoader;

pub(crate) const GEOTIFF_MODELPIXELSCALE: u16 = 33550;
pub(crate) const GEOTIFF_MODELTIEPOINT: u16 = 33922;
pub(crate) const GEOTIFF_MODELTRANSFORMATION: u16 = 34264;
pub(crate) const GEOTIFF_GEOKEYDIRECTORY: u16 = 34735;
pub(crate) const GDAL_NODATA: u16 = 42113;

pub(crate) const GEOGRAPHIC_TYPE_GEO_KEY: u16 = 2048;
pub(crate) const PROJECTED_CS_TYPE_GEO_KEY: u16 = 3072;

/// A decoded file, keeping 8-bit data as 8-bit.
#[derive(Debug, Clone)]
pub enum DecodedRaster {
    U8(Raster<u8>),
    /// Every other sample type, widened or narrowed to `f32`
    F32(Raster<f32>),
}

impl DecodedRaster {
    #[must_use]
    pub fn dimensions(&self) -> (usize, usize) {
        match self {
            Self::U8(r) => (r.width, r.height),
            Self::F32(r) => (r.width, r.height),
        }
    }

    /// Convert to a float raster, carrying the no-data value along.
    #[must_use]
    pub fn into_f32(self) -> Raster<f32> {
        match self {
            Self::F32(r) => r,
            Self::U8(r) => Raster {
                width: r.width,
                height: r.height,
                pixels: r.pixels.into_iter().map(f32::from).collect(),
                transform: r.transform,
                nodata: r.nodata.map(f32::from),
                crs: r.crs,
            },
        }
    }
}

/// [`TileLoader`] for GeoTIFF files.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoTiffTileLoader;

impl TileLoader for GeoTiffTileLoader {
    fn load(&self, path: &Path) -> Result<RasterTile, DecodeError> {
        let raster = read_geotiff(path)?.into_f32();

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();

        Ok(RasterTile::new(name, raster.width, raster.height, raster.pixels, raster.transform)
            .with_path(path)
            .with_nodata(raster.nodata.map(f64::from))
            .with_crs(raster.crs))
    }
}

/// Read the first image of a GeoTIFF file.
///
/// # Errors
/// Returns [`DecodeError`] if the file cannot be opened, is not a single-band
/// TIFF, or has no georeferencing.
pub fn read_geotiff(path: &Path) -> Result<DecodedRaster, DecodeError> {
    let file = File::open(path).map_err(|source| DecodeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_geotiff_from(BufReader::new(file), path)
}

/// Read the first image of a GeoTIFF from any seekable reader.
///
/// `path` is only used for error messages.
///
/// # Errors
/// See [`read_geotiff`].
pub fn read_geotiff_from<R: Read + Seek>(reader: R, path: &Path) -> Result<DecodedRaster, DecodeError> {
    let tiff_err = |e: tiff::TiffError| DecodeError::Tiff {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let mut decoder = Decoder::new(reader)
        .map_err(tiff_err)?
        .with_limits(Limits::unlimited());

    match decoder.colortype().map_err(tiff_err)? {
        ColorType::Gray(_) => {}
        other => {
            return Err(DecodeError::Unsupported {
                path: path.to_path_buf(),
                message: format!("expected a single band, found {other:?}"),
            })
        }
    }

    let (width, height) = decoder.dimensions().map_err(tiff_err)?;
    let transform = read_transform(&mut decoder).ok_or_else(|| DecodeError::MissingGeoreference {
        path: path.to_path_buf(),
    })?;
    let nodata = read_nodata(&mut decoder);
    let crs = read_epsg(&mut decoder);

    let width = width as usize;
    let height = height as usize;
    let result = decoder.read_image().map_err(tiff_err)?;
    let unsupported = |message: &str| DecodeError::Unsupported {
        path: path.to_path_buf(),
        message: message.to_string(),
    };

    let raster = if let DecodingResult::U8(pixels) = result {
        if pixels.len() != width * height {
            return Err(unsupported("sample count does not match image dimensions"));
        }
        DecodedRaster::U8(Raster {
            width,
            height,
            pixels,
            transform,
            nodata: nodata.and_then(nodata_as_u8),
            crs,
        })
    } else {
        let pixels = widen_to_f32(result).ok_or_else(|| unsupported("unsupported sample format"))?;
        if pixels.len() != width * height {
            return Err(unsupported("sample count does not match image dimensions"));
        }
        // Allow truncation: f32 is the working precision of the mosaic
        #[allow(clippy::cast_possible_truncation)]
        let nodata = nodata.map(|n| n as f32);
        DecodedRaster::F32(Raster {
            width,
            height,
            pixels,
            transform,
            nodata,
            crs,
        })
    };

    Ok(raster)
}

// Allow precision loss: integer samples beyond 2^24 lose precision in f32,
// which is standard practice for imagery
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn widen_to_f32(result: DecodingResult) -> Option<Vec<f32>> {
    let pixels = match result {
        DecodingResult::U8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|x| x as f32).collect(),
        #[allow(unreachable_patterns)]
        _ => return None,
    };
    Some(pixels)
}

fn nodata_as_u8(value: f64) -> Option<u8> {
    if value.fract() == 0.0 && (0.0..=255.0).contains(&value) {
        // Safety: integral and within range, checked above
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Some(value as u8)
    } else {
        None
    }
}

fn find_f64_vec<R: Read + Seek>(decoder: &mut Decoder<R>, tag: u16) -> Option<Vec<f64>> {
    decoder
        .find_tag(Tag::from_u16_exhaustive(tag))
        .ok()
        .flatten()
        .and_then(|value| value.into_f64_vec().ok())
}

fn read_transform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = find_f64_vec(decoder, GEOTIFF_MODELPIXELSCALE);
    let tiepoint = find_f64_vec(decoder, GEOTIFF_MODELTIEPOINT);
    if let (Some(scale), Some(tiepoint)) = (scale, tiepoint) {
        return GeoTransform::from_tiepoint(&tiepoint, &scale);
    }
    find_f64_vec(decoder, GEOTIFF_MODELTRANSFORMATION)
        .and_then(|matrix| GeoTransform::from_model_transformation(&matrix))
}

fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    let text = decoder
        .find_tag(Tag::from_u16_exhaustive(GDAL_NODATA))
        .ok()
        .flatten()
        .and_then(|value| value.into_string().ok())?;
    text.trim_end_matches('\0').trim().parse::<f64>().ok()
}

fn read_epsg<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<u16> {
    let keys = decoder
        .find_tag(Tag::from_u16_exhaustive(GEOTIFF_GEOKEYDIRECTORY))
        .ok()
        .flatten()
        .and_then(|value| value.into_u16_vec().ok())?;
    epsg_from_geokeys(&keys)
}

/// Extract the EPSG code from a GeoKey directory.
///
/// Only keys stored inline (`TIFFTagLocation == 0`) are considered; a
/// projected CRS wins over a geographic one.
pub(crate) fn epsg_from_geokeys(keys: &[u16]) -> Option<u16> {
    let header = keys.get(..4)?;
    let count = usize::from(header[3]);
    let entries = keys.get(4..4 + count * 4)?;

    let mut geographic = None;
    for entry in entries.chunks_exact(4) {
        let (key, location, value) = (entry[0], entry[1], entry[3]);
        if location != 0 {
            continue;
        }
        match key {
            PROJECTED_CS_TYPE_GEO_KEY => return Some(value),
            GEOGRAPHIC_TYPE_GEO_KEY => geographic = Some(value),
            _ => {}
        }
    }
    geographic
}
