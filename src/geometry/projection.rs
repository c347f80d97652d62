//! CRS lookups used when tagging output rasters.
//!
//! Mosaicking never reprojects: inputs are expected to share a reference
//! system. The EPSG code read from the first tile is carried through to the
//! output, and these helpers decide which GeoKeys describe it.

/// Get PROJ4 string for an EPSG code using the crs-definitions database
#[inline]
#[must_use]
pub fn get_proj_string(epsg: u16) -> Option<&'static str> {
    crs_definitions::from_code(epsg).map(|def| def.proj4)
}

/// Check if an EPSG code represents a geographic (lon/lat) CRS
#[inline]
#[must_use]
pub fn is_geographic_crs(epsg: u16) -> bool {
    // Geographic CRS codes are typically in the 4000-4999 range
    // but we check the proj string to be sure
    if let Some(proj_str) = get_proj_string(epsg) {
        proj_str.contains("+proj=longlat")
    } else {
        (4000..5000).contains(&epsg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes_have_proj_strings() {
        assert!(get_proj_string(4326).is_some());
        assert!(get_proj_string(3857).is_some());
        assert!(get_proj_string(32633).is_some());
    }

    #[test]
    fn test_geographic_detection() {
        assert!(is_geographic_crs(4326));
        assert!(!is_geographic_crs(3857));
        assert!(!is_geographic_crs(32610));
    }
}
