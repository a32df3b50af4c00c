use foundation::{GeoPoint, polyline_midpoint, ring_centroid};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    Point,
    Line,
    Polygon,
}

/// Geographic geometry of one feature.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureGeometry {
    Point { position: GeoPoint },
    Line { vertices: Vec<GeoPoint> },
    Polygon { rings: Vec<Vec<GeoPoint>> },
}

impl FeatureGeometry {
    pub fn point(lon: f64, lat: f64) -> Self {
        FeatureGeometry::Point {
            position: GeoPoint::new(lon, lat),
        }
    }

    pub fn kind(&self) -> GeometryKind {
        match self {
            FeatureGeometry::Point { .. } => GeometryKind::Point,
            FeatureGeometry::Line { .. } => GeometryKind::Line,
            FeatureGeometry::Polygon { .. } => GeometryKind::Polygon,
        }
    }

    /// Representative position used for projection, clustering and labels:
    /// the point itself, the arc-length midpoint of a line, or the vertex
    /// average of a polygon's outer ring.
    pub fn anchor(&self) -> Option<GeoPoint> {
        match self {
            FeatureGeometry::Point { position } => position.is_finite().then_some(*position),
            FeatureGeometry::Line { vertices } => polyline_midpoint(vertices),
            FeatureGeometry::Polygon { rings } => ring_centroid(rings),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FeatureGeometry, GeometryKind};
    use foundation::GeoPoint;

    #[test]
    fn anchors_per_kind() {
        let p = FeatureGeometry::point(3.0, 4.0);
        assert_eq!(p.kind(), GeometryKind::Point);
        assert_eq!(p.anchor(), Some(GeoPoint::new(3.0, 4.0)));

        let line = FeatureGeometry::Line {
            vertices: vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(4.0, 0.0)],
        };
        assert_eq!(line.kind(), GeometryKind::Line);
        assert_eq!(line.anchor(), Some(GeoPoint::new(2.0, 0.0)));

        let area = FeatureGeometry::Polygon {
            rings: vec![vec![
                GeoPoint::new(0.0, 0.0),
                GeoPoint::new(2.0, 0.0),
                GeoPoint::new(2.0, 2.0),
                GeoPoint::new(0.0, 2.0),
            ]],
        };
        assert_eq!(area.kind(), GeometryKind::Polygon);
        assert_eq!(area.anchor(), Some(GeoPoint::new(1.0, 1.0)));
    }

    #[test]
    fn non_finite_point_has_no_anchor() {
        assert_eq!(FeatureGeometry::point(f64::NAN, 0.0).anchor(), None);
        assert_eq!(FeatureGeometry::Line { vertices: vec![] }.anchor(), None);
    }
}
