//! Tiled GeoTIFF writer for mosaic chunks
//!
//! This module writes [`Raster`] data to internally tiled GeoTIFF files. It
//! uses pure Rust libraries (no GDAL dependency) and writes proper GeoTIFF
//! metadata including coordinate reference system information and the
//! `GDAL_NODATA` tag. Reduced-resolution levels are stored as extra image
//! directories flagged as overviews.
//!
//! # Example
//!
//! ```rust,no_run
//! use geomosaic::codec::{CompressionScheme, CompressionSettings, EncodeOptions, Tiling};
//! use geomosaic::geometry::GeoTransform;
//! use geomosaic::geotiff_writer::GeoTiffWriter;
//! use geomosaic::raster::Raster;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let transform = GeoTransform::from_origin(500_000.0, 4_010_000.0, 10.0, -10.0);
//!     let raster = Raster::filled(512, 512, 0u8, transform).with_crs(Some(32610));
//!
//!     GeoTiffWriter::new(&raster)
//!         .tiling(Tiling::new(256, 256))
//!         .compression(CompressionSettings::new(CompressionScheme::Lzw, 0.75))
//!         .write("m_0.tif")?;
//!
//!     Ok(())
//! }
//! ```

use std::fs::{self, File};
use std::io::{BufWriter, Seek, Write};
use std::path::{Path, PathBuf};

use flate2::write::ZlibEncoder;
use tiff::encoder::{TiffEncoder, TiffKind};
use tiff::tags::Tag;
use tracing::debug;

use crate::casting::{u64_to_u32, usize_to_u32};
use crate::codec::{
    ChunkEncoder, CompressionScheme, CompressionSettings, EncodeOptions, OverviewBuilder, OverviewRequest, Tiling,
};
use crate::error::{BuildError, EncodeError};
use crate::geometry::projection::{get_proj_string, is_geographic_crs};
use crate::geotiff_reader::{
    read_geotiff, DecodedRaster, GDAL_NODATA, GEOGRAPHIC_TYPE_GEO_KEY, GEOTIFF_GEOKEYDIRECTORY,
    GEOTIFF_MODELPIXELSCALE, GEOTIFF_MODELTIEPOINT, GEOTIFF_MODELTRANSFORMATION, PROJECTED_CS_TYPE_GEO_KEY,
};
use crate::pyramid::build_pyramid;
use crate::raster::{Raster, Sample};

// GeoTIFF Tag IDs (not in standard tiff crate)
const GEOTIFF_GEOASCIIPARAMS: u16 = 34737;
const NEW_SUBFILE_TYPE: u16 = 254;

// GeoKey IDs
const GT_MODEL_TYPE_GEO_KEY: u16 = 1024;
const GT_RASTER_TYPE_GEO_KEY: u16 = 1025;

// GeoKey values
const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

// NewSubfileType: reduced-resolution version of another image
const SUBFILE_REDUCED_IMAGE: u32 = 1;

/// Builder for configuring GeoTIFF output
pub struct GeoTiffWriter<'a, T: Sample> {
    raster: &'a Raster<T>,
    options: EncodeOptions,
    overviews: &'a [Raster<T>],
}

impl<'a, T: Sample> GeoTiffWriter<'a, T> {
    /// Create a new GeoTIFF writer for a raster
    #[must_use]
    pub fn new(raster: &'a Raster<T>) -> Self {
        Self {
            raster,
            options: EncodeOptions::default(),
            overviews: &[],
        }
    }

    /// Set tiling and compression together
    #[must_use]
    pub fn options(mut self, options: EncodeOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn tiling(mut self, tiling: Tiling) -> Self {
        self.options.tiling = tiling;
        self
    }

    /// Set the compression method
    #[must_use]
    pub fn compression(mut self, compression: CompressionSettings) -> Self {
        self.options.compression = compression;
        self
    }

    /// Reduced-resolution levels written after the full-resolution image
    #[must_use]
    pub fn overviews(mut self, overviews: &'a [Raster<T>]) -> Self {
        self.overviews = overviews;
        self
    }

    /// Write to a file path
    ///
    /// # Errors
    /// Returns [`EncodeError`] if the raster is invalid or the file cannot be written.
    pub fn write<P: AsRef<Path>>(self, path: P) -> Result<(), EncodeError> {
        // Validate before touching the filesystem
        self.validate()?;
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Write to any writer that implements Write + Seek
    ///
    /// # Errors
    /// Returns [`EncodeError`] if the raster is invalid or encoding fails.
    pub fn write_to<W: Write + Seek>(self, writer: W) -> Result<(), EncodeError> {
        self.validate()?;

        let mut encoder = TiffEncoder::new(writer)?;
        self.write_image(&mut encoder, self.raster, false)?;
        for level in self.overviews {
            self.write_image(&mut encoder, level, true)?;
        }
        Ok(())
    }

    /// Write this raster to bytes as a GeoTIFF.
    ///
    /// # Errors
    /// See [`GeoTiffWriter::write_to`].
    pub fn to_bytes(self) -> Result<Vec<u8>, EncodeError> {
        let mut buffer = std::io::Cursor::new(Vec::new());
        self.write_to(&mut buffer)?;
        Ok(buffer.into_inner())
    }

    fn validate(&self) -> Result<(), EncodeError> {
        let tiling = self.options.tiling;
        if !tiling.is_valid() {
            return Err(EncodeError::InvalidData(format!(
                "tile size {}x{} is not a positive multiple of {}",
                tiling.width,
                tiling.height,
                Tiling::ALIGNMENT
            )));
        }
        for raster in std::iter::once(self.raster).chain(self.overviews) {
            if raster.width == 0 || raster.height == 0 {
                return Err(EncodeError::InvalidData("Raster has zero dimensions".to_string()));
            }
            if raster.pixels.len() != raster.width * raster.height {
                return Err(EncodeError::InvalidData(format!(
                    "Raster has {} samples, expected {}x{}",
                    raster.pixels.len(),
                    raster.width,
                    raster.height
                )));
            }
        }
        Ok(())
    }

    /// Write one tiled, single-band image directory using the low-level
    /// DirectoryEncoder API.
    fn write_image<W: Write + Seek, K: TiffKind>(
        &self,
        encoder: &mut TiffEncoder<W, K>,
        raster: &Raster<T>,
        is_overview: bool,
    ) -> Result<(), EncodeError> {
        let tiling = self.options.tiling;
        let compression = self.options.compression;
        let scheme = compression.effective_scheme();

        let width = usize_to_u32(raster.width).map_err(EncodeError::InvalidData)?;
        let height = usize_to_u32(raster.height).map_err(EncodeError::InvalidData)?;

        let mut dir = encoder.image_directory()?;

        if is_overview {
            dir.write_tag(Tag::Unknown(NEW_SUBFILE_TYPE), SUBFILE_REDUCED_IMAGE)?;
        }

        // Required TIFF tags for image
        dir.write_tag(Tag::ImageWidth, width)?;
        dir.write_tag(Tag::ImageLength, height)?;
        dir.write_tag(Tag::BitsPerSample, T::BITS_PER_SAMPLE)?;
        dir.write_tag(Tag::Compression, scheme.tag_value())?;

        // PhotometricInterpretation: 1 = BlackIsZero
        dir.write_tag(Tag::PhotometricInterpretation, 1u16)?;
        dir.write_tag(Tag::SamplesPerPixel, 1u16)?;
        dir.write_tag(Tag::SampleFormat, T::SAMPLE_FORMAT)?;
        dir.write_tag(Tag::PlanarConfiguration, 1u16)?;

        dir.write_tag(Tag::TileWidth, tiling.width)?;
        dir.write_tag(Tag::TileLength, tiling.height)?;

        // Georeferencing lives on the full-resolution image only
        if !is_overview {
            write_geotiff_tags(&mut dir, raster)?;
        }
        if let Some(nodata) = raster.nodata {
            let text = format_nodata(nodata.to_f64());
            dir.write_tag(Tag::Unknown(GDAL_NODATA), text.as_str())?;
        }

        let fill = raster.nodata.unwrap_or(T::ZERO);
        let tile_w = tiling.width as usize;
        let tile_h = tiling.height as usize;
        let tiles_across = raster.width.div_ceil(tile_w);
        let tiles_down = raster.height.div_ceil(tile_h);

        let mut offsets = Vec::with_capacity(tiles_across * tiles_down);
        let mut byte_counts = Vec::with_capacity(tiles_across * tiles_down);
        let mut tile = Vec::with_capacity(tile_w * tile_h * usize::from(T::BITS_PER_SAMPLE / 8));

        for ty in 0..tiles_down {
            for tx in 0..tiles_across {
                tile.clear();
                for row in ty * tile_h..(ty + 1) * tile_h {
                    for col in tx * tile_w..(tx + 1) * tile_w {
                        raster.get(col, row).unwrap_or(fill).extend_le_bytes(&mut tile);
                    }
                }

                let encoded = compress(&tile, scheme, &compression)?;
                let offset = dir.write_data(encoded.as_slice())?;
                offsets.push(u64_to_u32(offset).map_err(EncodeError::InvalidData)?);
                byte_counts.push(usize_to_u32(encoded.len()).map_err(EncodeError::InvalidData)?);
            }
        }

        dir.write_tag(Tag::TileOffsets, offsets.as_slice())?;
        dir.write_tag(Tag::TileByteCounts, byte_counts.as_slice())?;

        // Finish the directory
        dir.finish()?;
        Ok(())
    }
}

fn compress(data: &[u8], scheme: CompressionScheme, settings: &CompressionSettings) -> Result<Vec<u8>, EncodeError> {
    match scheme {
        CompressionScheme::None => Ok(data.to_vec()),
        CompressionScheme::Deflate => {
            let level = flate2::Compression::new(settings.deflate_level());
            let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2), level);
            encoder.write_all(data)?;
            Ok(encoder.finish()?)
        }
        CompressionScheme::Lzw => weezl::encode::Encoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8)
            .encode(data)
            .map_err(|e| EncodeError::TiffEncode(format!("LZW: {e}"))),
    }
}

fn format_nodata(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else {
        value.to_string()
    }
}

fn write_geotiff_tags<W: Write + Seek, K: TiffKind, T: Sample>(
    dir: &mut tiff::encoder::DirectoryEncoder<'_, W, K>,
    raster: &Raster<T>,
) -> Result<(), EncodeError> {
    let t = raster.transform;

    if t.is_north_up() {
        // ModelPixelScale: [ScaleX, ScaleY, ScaleZ]
        let pixel_scale = [t.a, -t.e, 0.0];
        dir.write_tag(Tag::Unknown(GEOTIFF_MODELPIXELSCALE), pixel_scale.as_slice())?;

        // ModelTiepoint: [I, J, K, X, Y, Z]
        // Ties pixel (0, 0) to the world coordinate of the top-left corner
        let tiepoint = [0.0, 0.0, 0.0, t.c, t.f, 0.0];
        dir.write_tag(Tag::Unknown(GEOTIFF_MODELTIEPOINT), tiepoint.as_slice())?;
    } else {
        let matrix = [
            t.a, t.b, 0.0, t.c, //
            t.d, t.e, 0.0, t.f, //
            0.0, 0.0, 0.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ];
        dir.write_tag(Tag::Unknown(GEOTIFF_MODELTRANSFORMATION), matrix.as_slice())?;
    }

    let geokeys = build_geokey_directory(raster.crs);
    dir.write_tag(Tag::Unknown(GEOTIFF_GEOKEYDIRECTORY), geokeys.as_slice())?;

    // Write PROJ string as GeoAsciiParams if we have one
    if let Some(proj_string) = raster.crs.and_then(get_proj_string) {
        // GeoAsciiParams entries are pipe-terminated
        let ascii_params = format!("{proj_string}|");
        dir.write_tag(Tag::Unknown(GEOTIFF_GEOASCIIPARAMS), ascii_params.as_str())?;
    }

    Ok(())
}

fn build_geokey_directory(crs: Option<u16>) -> Vec<u16> {
    // GeoKeyDirectory structure:
    // [KeyDirectoryVersion, KeyRevision, MinorRevision, NumberOfKeys,
    //  KeyID1, TIFFTagLocation1, Count1, Value_Offset1, ...]
    let Some(epsg) = crs else {
        return vec![1, 1, 0, 1, GT_RASTER_TYPE_GEO_KEY, 0, 1, RASTER_PIXEL_IS_AREA];
    };

    let is_geographic = is_geographic_crs(epsg);
    let mut keys = vec![1, 1, 0, 3];

    // GTModelTypeGeoKey
    keys.extend_from_slice(&[
        GT_MODEL_TYPE_GEO_KEY,
        0,
        1,
        if is_geographic {
            MODEL_TYPE_GEOGRAPHIC
        } else {
            MODEL_TYPE_PROJECTED
        },
    ]);

    // GTRasterTypeGeoKey
    keys.extend_from_slice(&[GT_RASTER_TYPE_GEO_KEY, 0, 1, RASTER_PIXEL_IS_AREA]);

    // Geographic or Projected CRS type
    if is_geographic {
        keys.extend_from_slice(&[GEOGRAPHIC_TYPE_GEO_KEY, 0, 1, epsg]);
    } else {
        keys.extend_from_slice(&[PROJECTED_CS_TYPE_GEO_KEY, 0, 1, epsg]);
    }

    keys
}

impl<T: Sample> Raster<T> {
    /// Write this raster to a GeoTIFF file with default tiling and compression.
    ///
    /// # Errors
    /// See [`GeoTiffWriter::write`].
    pub fn write_geotiff<P: AsRef<Path>>(&self, path: P) -> Result<(), EncodeError> {
        GeoTiffWriter::new(self).write(path)
    }

    /// Get a GeoTIFF writer builder for more control over output options.
    #[must_use]
    pub fn geotiff_writer(&self) -> GeoTiffWriter<'_, T> {
        GeoTiffWriter::new(self)
    }
}

/// [`ChunkEncoder`] producing tiled GeoTIFF files.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoTiffChunkEncoder;

impl ChunkEncoder for GeoTiffChunkEncoder {
    fn write<T: Sample>(&self, path: &Path, raster: &Raster<T>, options: &EncodeOptions) -> Result<PathBuf, EncodeError> {
        GeoTiffWriter::new(raster).options(*options).write(path)?;
        Ok(path.to_path_buf())
    }
}

/// [`OverviewBuilder`] that rewrites a GeoTIFF with its overview levels.
///
/// The file is read back, the pyramid is computed in memory, and the result
/// is written to a sibling temporary file that then replaces the original.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoTiffOverviewBuilder;

impl GeoTiffOverviewBuilder {
    fn rewrite<T: Sample>(path: &Path, base: &Raster<T>, request: &OverviewRequest) -> Result<usize, BuildError> {
        let levels = build_pyramid(
            base,
            request.downsample_step as usize,
            request.num_steps as usize,
            request.interpolation,
        );

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".ovr.tmp");
        let tmp = PathBuf::from(tmp);

        let written = GeoTiffWriter::new(base)
            .options(request.encode)
            .overviews(&levels)
            .write(&tmp);
        if let Err(e) = written {
            // Best effort: the original file is untouched
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        fs::rename(&tmp, path).map_err(|source| BuildError::Replace {
            path: path.to_path_buf(),
            source,
        })?;

        debug!(path = %path.display(), levels = levels.len(), "Embedded overviews");
        Ok(levels.len())
    }
}

impl OverviewBuilder for GeoTiffOverviewBuilder {
    fn build(&self, path: &Path, request: &OverviewRequest) -> Result<usize, BuildError> {
        match read_geotiff(path)? {
            DecodedRaster::U8(base) => Self::rewrite(path, &base, request),
            DecodedRaster::F32(base) => Self::rewrite(path, &base, request),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use tiff::decoder::Decoder;

    use super::*;
    use crate::codec::OverviewInterpolation;
    use crate::geometry::GeoTransform;
    use crate::geotiff_reader::read_geotiff_from;

    fn create_test_raster(width: usize, height: usize) -> Raster<f32> {
        let transform = GeoTransform::from_origin(500_000.0, 4_010_000.0, 10.0, -10.0);
        let mut raster = Raster::filled(width, height, 0.0f32, transform).with_crs(Some(32610)); // UTM 10N
        for (i, p) in raster.pixels.iter_mut().enumerate() {
            *p = u8::try_from(i % 256).map(f32::from).unwrap();
        }
        raster
    }

    fn small_tiles() -> Tiling {
        Tiling::new(16, 16)
    }

    #[test]
    fn test_write_float_geotiff() {
        let raster = create_test_raster(64, 64);
        let bytes = raster.geotiff_writer().to_bytes().unwrap();

        // Check TIFF magic bytes
        assert!(bytes.len() > 8);
        assert!(bytes[0] == b'I' && bytes[1] == b'I' || bytes[0] == b'M' && bytes[1] == b'M');
    }

    #[test]
    fn test_roundtrip_verify_geotiff() {
        let raster = create_test_raster(40, 23).with_nodata(Some(-9999.0));
        for scheme in [CompressionScheme::None, CompressionScheme::Lzw, CompressionScheme::Deflate] {
            let bytes = raster
                .geotiff_writer()
                .tiling(small_tiles())
                .compression(CompressionSettings::new(scheme, 0.5))
                .to_bytes()
                .unwrap();

            let decoded = read_geotiff_from(Cursor::new(bytes), Path::new("mem.tif"))
                .unwrap()
                .into_f32();
            assert_eq!((decoded.width, decoded.height), (40, 23));
            assert_eq!(decoded.pixels, raster.pixels, "{scheme:?}");
            assert_eq!(decoded.transform, raster.transform);
            assert_eq!(decoded.nodata, Some(-9999.0));
            assert_eq!(decoded.crs, Some(32610));
        }
    }

    #[test]
    fn test_u8_roundtrip_stays_u8() {
        let transform = GeoTransform::from_origin(0.0, 0.0, 0.025, -0.015);
        let raster = Raster::filled(20, 20, 7u8, transform).with_nodata(Some(0));
        let bytes = raster.geotiff_writer().tiling(small_tiles()).to_bytes().unwrap();

        match read_geotiff_from(Cursor::new(bytes), Path::new("mem.tif")).unwrap() {
            DecodedRaster::U8(decoded) => {
                assert_eq!(decoded.pixels, raster.pixels);
                assert_eq!(decoded.nodata, Some(0));
                assert_eq!(decoded.crs, None);
            }
            DecodedRaster::F32(_) => panic!("expected 8-bit samples"),
        }
    }

    #[test]
    fn test_rotated_transform_uses_model_transformation() {
        let mut raster = create_test_raster(16, 16);
        raster.transform = GeoTransform::new(1.0, 0.5, 10.0, 0.5, -1.0, 20.0);
        let bytes = raster.geotiff_writer().tiling(small_tiles()).to_bytes().unwrap();
        let decoded = read_geotiff_from(Cursor::new(bytes), Path::new("mem.tif")).unwrap();
        let DecodedRaster::F32(decoded) = decoded else {
            panic!("expected float samples");
        };
        assert_eq!(decoded.transform, raster.transform);
    }

    #[test]
    fn test_deflate_shrinks_uniform_data() {
        let raster = Raster::filled(128, 128, 1.0f32, GeoTransform::IDENTITY);
        let plain = raster
            .geotiff_writer()
            .compression(CompressionSettings::none())
            .to_bytes()
            .unwrap();
        let packed = raster.geotiff_writer().to_bytes().unwrap();
        assert!(packed.len() < plain.len() / 4);
    }

    #[test]
    fn test_geokey_directory_projected() {
        let geokeys = build_geokey_directory(Some(32610));

        // Check header
        assert_eq!(geokeys[0], 1); // Version
        assert_eq!(geokeys[1], 1); // Revision
        assert_eq!(geokeys[2], 0); // Minor revision
        assert_eq!(geokeys[3], 3); // Number of keys

        // Check GTModelTypeGeoKey = Projected
        assert_eq!(geokeys[4], GT_MODEL_TYPE_GEO_KEY);
        assert_eq!(geokeys[7], MODEL_TYPE_PROJECTED);

        // Check ProjectedCSTypeGeoKey = 32610
        assert_eq!(geokeys[12], PROJECTED_CS_TYPE_GEO_KEY);
        assert_eq!(geokeys[15], 32610);
    }

    #[test]
    fn test_geokey_directory_geographic() {
        let geokeys = build_geokey_directory(Some(4326));

        // Check GTModelTypeGeoKey = Geographic
        assert_eq!(geokeys[7], MODEL_TYPE_GEOGRAPHIC);

        // Check GeographicTypeGeoKey = 4326
        assert_eq!(geokeys[12], GEOGRAPHIC_TYPE_GEO_KEY);
        assert_eq!(geokeys[15], 4326);
    }

    #[test]
    fn test_geokey_directory_without_crs() {
        let geokeys = build_geokey_directory(None);
        assert_eq!(geokeys[3], 1);
        assert_eq!(geokeys[4], GT_RASTER_TYPE_GEO_KEY);
    }

    #[test]
    fn test_empty_raster_error() {
        let raster = Raster::filled(0, 0, 0.0f32, GeoTransform::IDENTITY);
        let result = raster.geotiff_writer().to_bytes();
        assert!(matches!(result, Err(EncodeError::InvalidData(_))));
    }

    #[test]
    fn test_unaligned_tiling_error() {
        let raster = create_test_raster(8, 8);
        let result = raster.geotiff_writer().tiling(Tiling::new(10, 16)).to_bytes();
        assert!(matches!(result, Err(EncodeError::InvalidData(_))));
    }

    #[test]
    fn test_overview_directories() {
        let raster = create_test_raster(64, 48);
        let levels = build_pyramid(&raster, 2, 2, OverviewInterpolation::Nearest);
        let bytes = raster
            .geotiff_writer()
            .tiling(small_tiles())
            .overviews(&levels)
            .to_bytes()
            .unwrap();

        let mut decoder = Decoder::new(Cursor::new(bytes)).unwrap();
        let mut sizes = vec![decoder.dimensions().unwrap()];
        while decoder.more_images() {
            decoder.next_image().unwrap();
            sizes.push(decoder.dimensions().unwrap());
        }
        assert_eq!(sizes, vec![(64, 48), (32, 24), (16, 12)]);
    }

    #[test]
    fn test_write_to_file_and_build_overviews() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m_0.tif");
        let raster = create_test_raster(64, 64);

        let written = GeoTiffChunkEncoder
            .write(&path, &raster, &EncodeOptions::default())
            .unwrap();
        assert_eq!(written, path);

        let request = OverviewRequest {
            downsample_step: 2,
            num_steps: 3,
            encode: EncodeOptions {
                tiling: small_tiles(),
                ..EncodeOptions::default()
            },
            ..OverviewRequest::default()
        };
        let added = GeoTiffOverviewBuilder.build(&path, &request).unwrap();
        assert_eq!(added, 3);

        // Base image is unchanged and no temporary file is left behind
        let reread = read_geotiff(&path).unwrap().into_f32();
        assert_eq!(reread.pixels, raster.pixels);
        let names: Vec<_> = fs::read_dir(dir.path()).unwrap().map(|e| e.unwrap().file_name()).collect();
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn test_overview_build_on_missing_file() {
        let result = GeoTiffOverviewBuilder.build(Path::new("/nonexistent/m_0.tif"), &OverviewRequest::default());
        assert!(matches!(result, Err(BuildError::Decode(_))));
    }
}
