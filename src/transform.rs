//! Geometric transforms applied while reslicing
//!
//! A [`ResliceTransform`] maps points of the *output* grid into the *input*
//! volume. Operations are concatenated in pre-multiply order: every call
//! right-multiplies the current matrix, so the operation added last is the
//! first one applied to a point.

use crate::error::{Result, VolumeError};
use crate::types::Vec3;
use nalgebra::{Matrix4, Point3, Rotation3, Translation3, Vector3};
use serde::{Deserialize, Serialize};

/// Parameters of a rigid motion as given on the command line
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RigidParams {
    pub translation: Vec3,
    /// Rotation about X, then Y, then Z, in degrees
    pub rotation_angles: Vec3,
    pub rotation_center: Vec3,
}

/// 4x4 homogeneous transform from output space to input space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResliceTransform {
    matrix: Matrix4<f64>,
}

impl Default for ResliceTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl ResliceTransform {
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    pub fn from_matrix(matrix: Matrix4<f64>) -> Self {
        Self { matrix }
    }

    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.matrix
    }

    fn concatenate(mut self, m: Matrix4<f64>) -> Self {
        self.matrix *= m;
        self
    }

    pub fn translate(self, offset: [f64; 3]) -> Self {
        self.concatenate(Translation3::new(offset[0], offset[1], offset[2]).to_homogeneous())
    }

    pub fn rotate_x(self, degrees: f64) -> Self {
        self.rotate(Vector3::x_axis(), degrees)
    }

    pub fn rotate_y(self, degrees: f64) -> Self {
        self.rotate(Vector3::y_axis(), degrees)
    }

    pub fn rotate_z(self, degrees: f64) -> Self {
        self.rotate(Vector3::z_axis(), degrees)
    }

    fn rotate(self, axis: nalgebra::Unit<Vector3<f64>>, degrees: f64) -> Self {
        self.concatenate(Rotation3::from_axis_angle(&axis, degrees.to_radians()).to_homogeneous())
    }

    /// Translate to the rotation centre, rotate about X, Y then Z, translate
    /// back, then translate by the requested offset.
    ///
    /// Axis order matches the display transform of common volume viewers. Because
    /// the transform pulls samples from the input, the requested translation and
    /// rotation show up negated in the resliced image; the centre does not.
    pub fn rigid(params: &RigidParams) -> Self {
        let [cx, cy, cz] = params.rotation_center.as_array();
        let [rx, ry, rz] = params.rotation_angles.as_array();

        Self::identity()
            .translate([cx, cy, cz])
            .rotate_x(rx)
            .rotate_y(ry)
            .rotate_z(rz)
            .translate([-cx, -cy, -cz])
            .translate(params.translation.as_array())
    }

    pub fn transform_point(&self, point: &Point3<f64>) -> Point3<f64> {
        self.matrix.transform_point(point)
    }

    pub fn inverse(&self) -> Result<Self> {
        self.matrix
            .try_inverse()
            .map(Self::from_matrix)
            .ok_or_else(|| VolumeError::InvalidArgument("transform is not invertible".to_string()))
    }

    pub fn is_identity(&self) -> bool {
        self.matrix
            .iter()
            .zip(Matrix4::<f64>::identity().iter())
            .all(|(a, b)| (a - b).abs() < 1e-12)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_identity() {
        let transform = ResliceTransform::rigid(&RigidParams::default());
        assert!(transform.is_identity());
        let p = Point3::new(1.0, -2.0, 3.0);
        assert_relative_eq!(transform.transform_point(&p), p);
    }

    #[test]
    fn test_translation_only() {
        let params = RigidParams {
            translation: Vec3::new(5.0, 0.0, -1.0),
            ..Default::default()
        };
        let transform = ResliceTransform::rigid(&params);
        assert!(!transform.is_identity());
        assert_relative_eq!(
            transform.transform_point(&Point3::new(1.0, 1.0, 1.0)),
            Point3::new(6.0, 1.0, 0.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_rotation_about_center() {
        let params = RigidParams {
            rotation_angles: Vec3::new(0.0, 0.0, 90.0),
            rotation_center: Vec3::new(1.0, 1.0, 0.0),
            ..Default::default()
        };
        let transform = ResliceTransform::rigid(&params);
        assert_relative_eq!(
            transform.transform_point(&Point3::new(2.0, 1.0, 0.0)),
            Point3::new(1.0, 2.0, 0.0),
            epsilon = 1e-12
        );
        // the centre is a fixed point
        assert_relative_eq!(
            transform.transform_point(&Point3::new(1.0, 1.0, 7.0)),
            Point3::new(1.0, 1.0, 7.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_translation_applied_before_rotation() {
        let params = RigidParams {
            translation: Vec3::new(1.0, 0.0, 0.0),
            rotation_angles: Vec3::new(0.0, 0.0, 90.0),
            ..Default::default()
        };
        let transform = ResliceTransform::rigid(&params);
        assert_relative_eq!(
            transform.transform_point(&Point3::origin()),
            Point3::new(0.0, 1.0, 0.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_rotation_order_x_then_y() {
        // rotate_x is concatenated first, so it is applied last
        let transform = ResliceTransform::identity().rotate_x(90.0).rotate_y(90.0);
        // Ry(90) maps z to x, then Rx(90) leaves x alone
        assert_relative_eq!(
            transform.transform_point(&Point3::new(0.0, 0.0, 1.0)),
            Point3::new(1.0, 0.0, 0.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_inverse() {
        let params = RigidParams {
            translation: Vec3::new(3.0, -2.0, 1.0),
            rotation_angles: Vec3::new(10.0, 20.0, 30.0),
            rotation_center: Vec3::new(5.0, 5.0, 5.0),
        };
        let transform = ResliceTransform::rigid(&params);
        let inverse = transform.inverse().unwrap();
        let p = Point3::new(0.5, 8.0, -3.0);
        assert_relative_eq!(
            inverse.transform_point(&transform.transform_point(&p)),
            p,
            epsilon = 1e-9
        );

        let singular = ResliceTransform::from_matrix(Matrix4::zeros());
        assert!(singular.inverse().is_err());
    }
}
