//! Deterministic float ordering for sorting projected coordinates.

use core::cmp::Ordering;

/// Folds `-0.0` into `0.0` and every NaN into one NaN.
pub fn canonical_f64(v: f64) -> f64 {
    if v == 0.0 {
        0.0
    } else if v.is_nan() {
        f64::NAN
    } else {
        v
    }
}

/// Total order over floats that treats `-0.0 == 0.0` and sorts NaN last.
pub fn stable_total_cmp_f64(a: f64, b: f64) -> Ordering {
    canonical_f64(a).total_cmp(&canonical_f64(b))
}

#[cfg(test)]
mod tests {
    use super::stable_total_cmp_f64;
    use core::cmp::Ordering;

    #[test]
    fn signed_zeros_compare_equal() {
        assert_eq!(stable_total_cmp_f64(-0.0, 0.0), Ordering::Equal);
        assert_eq!(stable_total_cmp_f64(f64::NAN, -f64::NAN), Ordering::Equal);
    }

    #[test]
    fn screen_coordinates_sort_with_nan_last() {
        let mut xs = vec![640.0, f64::NAN, -0.0, 12.5];
        xs.sort_by(|a, b| stable_total_cmp_f64(*a, *b));
        assert_eq!(&xs[..3], &[0.0, 12.5, 640.0]);
        assert!(xs[3].is_nan());
    }
}
