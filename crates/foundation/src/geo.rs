use crate::math::{Ecef, Geodetic, geodetic_to_ecef};

/// Geographic position: longitude/latitude in degrees, height in meters
/// above the WGS84 ellipsoid.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
    pub height: f64,
}

impl GeoPoint {
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self {
            lon,
            lat,
            height: 0.0,
        }
    }

    pub const fn with_height(lon: f64, lat: f64, height: f64) -> Self {
        Self { lon, lat, height }
    }

    pub fn is_finite(&self) -> bool {
        self.lon.is_finite() && self.lat.is_finite() && self.height.is_finite()
    }

    pub fn to_geodetic(self) -> Geodetic {
        Geodetic::new(self.lat.to_radians(), self.lon.to_radians(), self.height)
    }

    pub fn to_ecef(self) -> Ecef {
        geodetic_to_ecef(self.to_geodetic())
    }
}

/// Midpoint (by arc length in degree space) of a polyline.
pub fn polyline_midpoint(vertices: &[GeoPoint]) -> Option<GeoPoint> {
    if vertices.len() < 2 {
        return vertices.first().copied();
    }

    let mut total = 0.0;
    let mut segments: Vec<(GeoPoint, GeoPoint, f64)> = Vec::with_capacity(vertices.len() - 1);
    for pair in vertices.windows(2) {
        let a = pair[0];
        let b = pair[1];
        let len = ((b.lon - a.lon).powi(2) + (b.lat - a.lat).powi(2)).sqrt();
        if !len.is_finite() || len <= 0.0 {
            continue;
        }
        total += len;
        segments.push((a, b, len));
    }
    if total <= 0.0 {
        return vertices.first().copied();
    }

    let mut acc = 0.0;
    let target = total * 0.5;
    for (a, b, len) in segments {
        if acc + len >= target {
            let t = (target - acc) / len;
            return Some(GeoPoint::with_height(
                a.lon + (b.lon - a.lon) * t,
                a.lat + (b.lat - a.lat) * t,
                a.height + (b.height - a.height) * t,
            ));
        }
        acc += len;
    }

    vertices.last().copied()
}

/// Vertex average of the outer ring of a polygon.
pub fn ring_centroid(rings: &[Vec<GeoPoint>]) -> Option<GeoPoint> {
    let outer = rings.first()?;
    let mut sum = GeoPoint::default();
    let mut count = 0.0_f64;
    for v in outer {
        if v.is_finite() {
            sum.lon += v.lon;
            sum.lat += v.lat;
            sum.height += v.height;
            count += 1.0;
        }
    }
    if count <= 0.0 {
        return None;
    }
    Some(GeoPoint::with_height(
        sum.lon / count,
        sum.lat / count,
        sum.height / count,
    ))
}

#[cfg(test)]
mod tests {
    use super::{GeoPoint, polyline_midpoint, ring_centroid};

    #[test]
    fn midpoint_of_two_segment_line() {
        let line = vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(2.0, 0.0),
            GeoPoint::new(2.0, 2.0),
        ];
        let mid = polyline_midpoint(&line).unwrap();
        assert_eq!(mid, GeoPoint::new(2.0, 0.0));
    }

    #[test]
    fn centroid_ignores_non_finite_vertices() {
        let rings = vec![vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(2.0, 0.0),
            GeoPoint::new(f64::NAN, 1.0),
            GeoPoint::new(2.0, 2.0),
            GeoPoint::new(0.0, 2.0),
        ]];
        assert_eq!(ring_centroid(&rings), Some(GeoPoint::new(1.0, 1.0)));
        assert_eq!(ring_centroid(&[]), None);
    }
}
