//! Coordinate geometry: affine grid transforms, envelopes and CRS lookups.

mod affine;
mod envelope;
pub mod projection;

pub use affine::GeoTransform;
pub use envelope::Envelope;
