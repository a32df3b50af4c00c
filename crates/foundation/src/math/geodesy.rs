//! WGS84 ellipsoid and Earth-centered coordinates.

pub const WGS84_A: f64 = 6_378_137.0;
pub const WGS84_F: f64 = 1.0 / 298.257_223_563;
pub const WGS84_B: f64 = WGS84_A * (1.0 - WGS84_F);
/// First eccentricity squared.
pub const WGS84_E2: f64 = WGS84_F * (2.0 - WGS84_F);

/// Earth-centered, Earth-fixed position in meters.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ecef {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Ecef {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Latitude/longitude in radians, altitude in meters.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Geodetic {
    pub lat_rad: f64,
    pub lon_rad: f64,
    pub alt_m: f64,
}

impl Geodetic {
    pub fn new(lat_rad: f64, lon_rad: f64, alt_m: f64) -> Self {
        Self {
            lat_rad,
            lon_rad,
            alt_m,
        }
    }
}

pub fn geodetic_to_ecef(geo: Geodetic) -> Ecef {
    let (sin_lat, cos_lat) = geo.lat_rad.sin_cos();
    let (sin_lon, cos_lon) = geo.lon_rad.sin_cos();
    // Prime vertical radius of curvature.
    let n = WGS84_A / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
    let r = (n + geo.alt_m) * cos_lat;
    Ecef::new(
        r * cos_lon,
        r * sin_lon,
        (n * (1.0 - WGS84_E2) + geo.alt_m) * sin_lat,
    )
}

#[cfg(test)]
mod tests {
    use super::{Geodetic, WGS84_A, WGS84_B, geodetic_to_ecef};
    use std::f64::consts::FRAC_PI_2;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-6
    }

    #[test]
    fn equator_points_sit_on_the_semi_major_axis() {
        let origin = geodetic_to_ecef(Geodetic::new(0.0, 0.0, 0.0));
        assert!(close(origin.x, WGS84_A) && close(origin.y, 0.0) && close(origin.z, 0.0));

        let east = geodetic_to_ecef(Geodetic::new(0.0, FRAC_PI_2, 250.0));
        assert!(close(east.x, 0.0) && close(east.y, WGS84_A + 250.0));
    }

    #[test]
    fn pole_sits_on_the_semi_minor_axis() {
        let pole = geodetic_to_ecef(Geodetic::new(FRAC_PI_2, 1.0, 500.0));
        assert!(close(pole.x, 0.0) && close(pole.y, 0.0));
        assert!(close(pole.z, WGS84_B + 500.0), "z = {}", pole.z);
    }
}
