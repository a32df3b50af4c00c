use foundation::GeoPoint;
use foundation::math::{LocalFrame, Vec3};

/// Where the camera is.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CameraPose {
    pub position: GeoPoint,
}

impl CameraPose {
    pub fn new(position: GeoPoint) -> Self {
        Self { position }
    }

    pub fn height_m(&self) -> f64 {
        self.position.height
    }

    /// `true` when the eye moved farther than `ratio` times the previous
    /// camera height (floored at 1 m).
    pub fn moved_beyond(&self, previous: &CameraPose, ratio: f64) -> bool {
        let a = Vec3::from(previous.position.to_ecef());
        let b = Vec3::from(self.position.to_ecef());
        a.distance(b) / previous.height_m().max(1.0) > ratio
    }
}

/// Maps geographic positions to viewport pixels.
///
/// `project` returns `None` for anything that is not visible: off-screen,
/// behind the horizon or behind the camera.
pub trait Viewport {
    fn project(&self, point: GeoPoint) -> Option<[f64; 2]>;
    fn camera(&self) -> CameraPose;
}

/// Pinhole camera looking straight down at the ellipsoid.
///
/// Pixel origin is the top-left corner; x grows east, y grows south.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PerspectiveCamera {
    pub position: GeoPoint,
    pub viewport_px: [f64; 2],
    pub fov_y_deg: f64,
}

impl PerspectiveCamera {
    pub fn new(position: GeoPoint, viewport_px: [f64; 2], fov_y_deg: f64) -> Self {
        Self {
            position,
            viewport_px,
            fov_y_deg,
        }
    }

    fn focal_px(&self) -> f64 {
        (self.viewport_px[1] * 0.5) / (self.fov_y_deg.to_radians() * 0.5).tan()
    }
}

impl Viewport for PerspectiveCamera {
    fn project(&self, point: GeoPoint) -> Option<[f64; 2]> {
        if !point.is_finite() {
            return None;
        }
        let target = point.to_ecef();

        // Horizon: the surface normal at the target must face the eye.
        let p = Vec3::from(target);
        let eye = Vec3::from(self.position.to_ecef());
        if (eye - p).dot(p) <= 0.0 {
            return None;
        }

        let local = LocalFrame::at(self.position.to_geodetic()).to_enu(target);
        let depth = -local.up;
        if depth <= 0.0 {
            return None;
        }

        let f = self.focal_px();
        let [w, h] = self.viewport_px;
        let x = w * 0.5 + f * local.east / depth;
        let y = h * 0.5 - f * local.north / depth;
        if !(x.is_finite() && y.is_finite()) || x < 0.0 || y < 0.0 || x > w || y > h {
            return None;
        }
        Some([x, y])
    }

    fn camera(&self) -> CameraPose {
        CameraPose::new(self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::{CameraPose, PerspectiveCamera, Viewport};
    use foundation::GeoPoint;

    fn camera() -> PerspectiveCamera {
        PerspectiveCamera::new(GeoPoint::with_height(0.0, 0.0, 1_000_000.0), [800.0, 600.0], 60.0)
    }

    #[test]
    fn nadir_projects_to_viewport_center() {
        let p = camera().project(GeoPoint::new(0.0, 0.0)).expect("visible");
        assert!((p[0] - 400.0).abs() < 1e-6);
        assert!((p[1] - 300.0).abs() < 1e-6);
    }

    #[test]
    fn east_is_right_and_north_is_up() {
        let cam = camera();
        let east = cam.project(GeoPoint::new(1.0, 0.0)).expect("visible");
        let north = cam.project(GeoPoint::new(0.0, 1.0)).expect("visible");
        assert!(east[0] > 400.0);
        assert!((east[1] - 300.0).abs() < 1e-3);
        assert!(north[1] < 300.0);
    }

    #[test]
    fn far_side_and_off_screen_points_fail() {
        let cam = camera();
        assert_eq!(cam.project(GeoPoint::new(180.0, 0.0)), None);
        assert_eq!(cam.project(GeoPoint::new(60.0, 0.0)), None);
        assert_eq!(cam.project(GeoPoint::new(f64::NAN, 0.0)), None);
    }

    #[test]
    fn movement_is_relative_to_height() {
        let a = CameraPose::new(GeoPoint::with_height(0.0, 0.0, 1000.0));
        let small = CameraPose::new(GeoPoint::with_height(0.0, 0.0, 1100.0));
        let large = CameraPose::new(GeoPoint::with_height(0.0, 0.0, 1300.0));
        assert!(!small.moved_beyond(&a, 0.2));
        assert!(large.moved_beyond(&a, 0.2));
    }
}
