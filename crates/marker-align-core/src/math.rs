//! Mathematical utilities and type definitions.

use nalgebra::{Matrix3, Point3, Vector3};

/// Scalar type used throughout the library (currently `f64`).
pub type Real = f64;

/// 3D vector with [`Real`] components.
pub type Vec3 = Vector3<Real>;
/// 3D point with [`Real`] coordinates.
pub type Pt3 = Point3<Real>;
/// 3×3 matrix with [`Real`] entries.
pub type Mat3 = Matrix3<Real>;

/// Mean of a set of points, or `None` for an empty slice.
pub fn centroid(points: &[Pt3]) -> Option<Pt3> {
    if points.is_empty() {
        return None;
    }
    let sum = points.iter().fold(Vec3::zeros(), |acc, p| acc + p.coords);
    Some(Pt3::from(sum / points.len() as Real))
}

/// Largest axis-aligned extent of a point set.
///
/// Returns `0.0` for empty or single-point sets.
pub fn max_extent(points: &[Pt3]) -> Real {
    let mut iter = points.iter();
    let Some(first) = iter.next() else {
        return 0.0;
    };
    let (lo, hi) = iter.fold((first.coords, first.coords), |(lo, hi), p| {
        (lo.inf(&p.coords), hi.sup(&p.coords))
    });
    (hi - lo).max()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centroid_of_empty_is_none() {
        assert!(centroid(&[]).is_none());
    }

    #[test]
    fn centroid_averages_points() {
        let c = centroid(&[Pt3::new(0.0, 0.0, 0.0), Pt3::new(2.0, 4.0, -6.0)]).unwrap();
        assert!((c - Pt3::new(1.0, 2.0, -3.0)).norm() < 1e-12);
    }

    #[test]
    fn max_extent_picks_widest_axis() {
        let pts = [
            Pt3::new(0.0, 0.0, 0.0),
            Pt3::new(1.0, -3.0, 0.5),
            Pt3::new(0.5, 2.0, 0.0),
        ];
        assert!((max_extent(&pts) - 5.0).abs() < 1e-12);
        assert_eq!(max_extent(&pts[..1]), 0.0);
    }
}
