//! Euler-angle similarity transform with a fixed `rotate -> scale -> translate` order.
//!
//! Angles follow the azimuth/elevation/roll convention:
//! - `rotation[0]` azimuth, about z,
//! - `rotation[1]` elevation, about the rotated y axis,
//! - `rotation[2]` roll, about the rotated x axis,
//!
//! so that `R = Rz(azimuth) * Ry(elevation) * Rx(roll)` pre-multiplies column points.

use crate::{AlignError, Mat3, Pt3, Real, Vec3};
use serde::{Deserialize, Serialize};

/// Rotation, uniform scale and translation of a similarity transform.
///
/// The translation is stored in absolute length units. During fitting the
/// translation may be expressed in reduced units, see `translation_factor` on
/// [`TransformParams::transform_point`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformParams {
    /// Euler angles in radians: azimuth, elevation, roll.
    pub rotation: [Real; 3],
    /// Uniform scale applied after rotation.
    pub scale: Real,
    /// Offset applied after scaling.
    pub translation: [Real; 3],
}

impl Default for TransformParams {
    fn default() -> Self {
        Self::identity()
    }
}

impl TransformParams {
    pub const fn identity() -> Self {
        Self {
            rotation: [0.0; 3],
            scale: 1.0,
            translation: [0.0; 3],
        }
    }

    /// Build parameters from loosely typed slices, checking their lengths.
    ///
    /// # Errors
    ///
    /// [`AlignError::Precondition`] if either slice does not hold exactly three
    /// values or the resulting parameters fail [`TransformParams::validate`].
    pub fn from_slices(
        rotation: &[Real],
        scale: Real,
        translation: &[Real],
    ) -> Result<Self, AlignError> {
        let rotation: [Real; 3] = rotation.try_into().map_err(|_| {
            AlignError::Precondition(format!(
                "rotation needs 3 euler angles, got {}",
                rotation.len()
            ))
        })?;
        let translation: [Real; 3] = translation.try_into().map_err(|_| {
            AlignError::Precondition(format!(
                "translation needs 3 components, got {}",
                translation.len()
            ))
        })?;
        let params = Self {
            rotation,
            scale,
            translation,
        };
        params.validate()?;
        Ok(params)
    }

    /// Reject non-finite values and a non-positive scale.
    pub fn validate(&self) -> Result<(), AlignError> {
        if self.rotation.iter().any(|a| !a.is_finite()) {
            return Err(AlignError::Precondition(format!(
                "non-finite rotation {:?}",
                self.rotation
            )));
        }
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(AlignError::Precondition(format!(
                "scale must be positive and finite, got {}",
                self.scale
            )));
        }
        if self.translation.iter().any(|t| !t.is_finite()) {
            return Err(AlignError::Precondition(format!(
                "non-finite translation {:?}",
                self.translation
            )));
        }
        Ok(())
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    pub fn rotation_matrix(&self) -> Mat3 {
        euler_rotation_matrix(self.rotation)
    }

    pub fn translation_vector(&self) -> Vec3 {
        Vec3::from(self.translation)
    }

    /// `scale * R * p + translation_factor * translation`.
    pub fn transform_point(&self, p: &Pt3, translation_factor: Real) -> Pt3 {
        let rotated = self.rotation_matrix() * p.coords;
        Pt3::from(rotated * self.scale + self.translation_vector() * translation_factor)
    }

    /// Undo [`TransformParams::transform_point`] with a unit translation factor.
    ///
    /// Applies the negated translation, the inverse scale and the transposed
    /// rotation, in that order.
    pub fn inverse_transform_point(&self, p: &Pt3) -> Pt3 {
        let unscaled = (p.coords - self.translation_vector()) / self.scale;
        Pt3::from(self.rotation_matrix().transpose() * unscaled)
    }
}

/// Apply `params` to every point, multiplying the translation by `translation_factor`.
///
/// The rotation matrix is built once for the whole batch.
pub fn apply_transform(points: &[Pt3], params: &TransformParams, translation_factor: Real) -> Vec<Pt3> {
    let r = params.rotation_matrix();
    let t = params.translation_vector() * translation_factor;
    points
        .iter()
        .map(|p| Pt3::from(r * p.coords * params.scale + t))
        .collect()
}

fn rot_z(a: Real) -> Mat3 {
    let (s, c) = a.sin_cos();
    Mat3::new(c, -s, 0.0, s, c, 0.0, 0.0, 0.0, 1.0)
}

fn rot_y(a: Real) -> Mat3 {
    let (s, c) = a.sin_cos();
    Mat3::new(c, 0.0, s, 0.0, 1.0, 0.0, -s, 0.0, c)
}

fn rot_x(a: Real) -> Mat3 {
    let (s, c) = a.sin_cos();
    Mat3::new(1.0, 0.0, 0.0, 0.0, c, -s, 0.0, s, c)
}

fn d_rot_z(a: Real) -> Mat3 {
    let (s, c) = a.sin_cos();
    Mat3::new(-s, -c, 0.0, c, -s, 0.0, 0.0, 0.0, 0.0)
}

fn d_rot_y(a: Real) -> Mat3 {
    let (s, c) = a.sin_cos();
    Mat3::new(-s, 0.0, c, 0.0, 0.0, 0.0, -c, 0.0, -s)
}

fn d_rot_x(a: Real) -> Mat3 {
    let (s, c) = a.sin_cos();
    Mat3::new(0.0, 0.0, 0.0, 0.0, -s, -c, 0.0, c, -s)
}

/// Rotation matrix `Rz(azimuth) * Ry(elevation) * Rx(roll)`.
pub fn euler_rotation_matrix(angles: [Real; 3]) -> Mat3 {
    rot_z(angles[0]) * rot_y(angles[1]) * rot_x(angles[2])
}

/// Partial derivatives of [`euler_rotation_matrix`] with respect to each angle.
pub fn euler_rotation_derivatives(angles: [Real; 3]) -> [Mat3; 3] {
    let [a, e, r] = angles;
    let (rz, ry, rx) = (rot_z(a), rot_y(e), rot_x(r));
    [
        d_rot_z(a) * ry * rx,
        rz * d_rot_y(e) * rx,
        rz * ry * d_rot_x(r),
    ]
}
