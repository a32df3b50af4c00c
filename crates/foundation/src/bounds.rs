/// Axis-aligned bounding box in a planar (screen) space.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb2 {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl Aabb2 {
    pub fn new(min: [f64; 2], max: [f64; 2]) -> Self {
        Aabb2 { min, max }
    }

    pub fn point(p: [f64; 2]) -> Self {
        Aabb2 { min: p, max: p }
    }

    /// Square window of side `side` centered on `center`.
    pub fn square(center: [f64; 2], side: f64) -> Self {
        let half = side * 0.5;
        Aabb2 {
            min: [center[0] - half, center[1] - half],
            max: [center[0] + half, center[1] + half],
        }
    }

    pub fn union(&self, other: &Self) -> Self {
        Aabb2 {
            min: [self.min[0].min(other.min[0]), self.min[1].min(other.min[1])],
            max: [self.max[0].max(other.max[0]), self.max[1].max(other.max[1])],
        }
    }

    pub fn intersects(&self, other: &Self) -> bool {
        self.min[0] <= other.max[0]
            && self.max[0] >= other.min[0]
            && self.min[1] <= other.max[1]
            && self.max[1] >= other.min[1]
    }

    pub fn contains(&self, p: [f64; 2]) -> bool {
        p[0] >= self.min[0] && p[0] <= self.max[0] && p[1] >= self.min[1] && p[1] <= self.max[1]
    }
}

/// Geographic query rectangle in degrees.
///
/// `west > east` means the box crosses the antimeridian.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GeoBounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl GeoBounds {
    pub const WORLD: GeoBounds = GeoBounds {
        west: -180.0,
        south: -90.0,
        east: 180.0,
        north: 90.0,
    };

    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    pub fn crosses_antimeridian(&self) -> bool {
        self.west > self.east
    }

    /// Longitudinal extent in degrees, accounting for antimeridian wrap.
    pub fn width(&self) -> f64 {
        if self.crosses_antimeridian() {
            self.east + 360.0 - self.west
        } else {
            self.east - self.west
        }
    }

    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        if lat < self.south || lat > self.north {
            return false;
        }
        if self.crosses_antimeridian() {
            lon >= self.west || lon <= self.east
        } else {
            lon >= self.west && lon <= self.east
        }
    }

    /// Splits boxes wider than 180° of longitude into two query boxes.
    ///
    /// Boxes that wrap the antimeridian are cut at ±180°, other wide boxes at
    /// their central meridian. Narrower boxes are returned unchanged.
    pub fn split_for_query(&self) -> Vec<GeoBounds> {
        if self.width() <= 180.0 {
            return vec![*self];
        }

        if self.crosses_antimeridian() {
            return vec![
                GeoBounds::new(self.west, self.south, 180.0, self.north),
                GeoBounds::new(-180.0, self.south, self.east, self.north),
            ];
        }

        let mid = self.west + self.width() * 0.5;
        vec![
            GeoBounds::new(self.west, self.south, mid, self.north),
            GeoBounds::new(mid, self.south, self.east, self.north),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::{Aabb2, GeoBounds};

    #[test]
    fn square_window_is_centered() {
        let w = Aabb2::square([10.0, 20.0], 4.0);
        assert_eq!(w.min, [8.0, 18.0]);
        assert_eq!(w.max, [12.0, 22.0]);
        assert!(w.contains([12.0, 18.0]));
        assert!(!w.contains([12.1, 20.0]));
    }

    #[test]
    fn narrow_box_is_not_split() {
        let b = GeoBounds::new(-10.0, -5.0, 10.0, 5.0);
        assert_eq!(b.split_for_query(), vec![b]);
    }

    #[test]
    fn wide_box_across_antimeridian_splits_in_two() {
        let b = GeoBounds::new(80.0, -30.0, -80.0, 30.0);
        assert!(b.crosses_antimeridian());
        assert_eq!(b.width(), 200.0);

        let parts = b.split_for_query();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], GeoBounds::new(80.0, -30.0, 180.0, 30.0));
        assert_eq!(parts[1], GeoBounds::new(-180.0, -30.0, -80.0, 30.0));

        // Union of the parts covers the original box.
        for lon in [80.0, 120.0, 179.9, -179.9, -120.0, -80.0] {
            assert!(b.contains(lon, 0.0));
            assert!(parts.iter().any(|p| p.contains(lon, 0.0)), "lon {lon}");
        }
        let covered: f64 = parts.iter().map(|p| p.width()).sum();
        assert_eq!(covered, b.width());
    }

    #[test]
    fn wide_box_without_wrap_splits_at_center() {
        let b = GeoBounds::new(-100.0, 0.0, 100.0, 10.0);
        let parts = b.split_for_query();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].east, 0.0);
        assert_eq!(parts[1].west, 0.0);
    }
}
