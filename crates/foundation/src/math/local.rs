use super::{Ecef, Geodetic, Vec3, geodetic_to_ecef};

/// East-North-Up offsets in meters.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Enu {
    pub east: f64,
    pub north: f64,
    pub up: f64,
}

/// Tangent frame anchored at a geodetic position.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LocalFrame {
    origin: Vec3,
    east: Vec3,
    north: Vec3,
    up: Vec3,
}

impl LocalFrame {
    pub fn at(origin: Geodetic) -> Self {
        let (sin_lat, cos_lat) = origin.lat_rad.sin_cos();
        let (sin_lon, cos_lon) = origin.lon_rad.sin_cos();
        Self {
            origin: geodetic_to_ecef(origin).into(),
            east: Vec3::new(-sin_lon, cos_lon, 0.0),
            north: Vec3::new(-sin_lat * cos_lon, -sin_lat * sin_lon, cos_lat),
            up: Vec3::new(cos_lat * cos_lon, cos_lat * sin_lon, sin_lat),
        }
    }

    pub fn to_enu(&self, point: Ecef) -> Enu {
        let d = Vec3::from(point) - self.origin;
        Enu {
            east: d.dot(self.east),
            north: d.dot(self.north),
            up: d.dot(self.up),
        }
    }
}
