//! Geometry utilities: element length, local axis triads and rotation transforms

use super::{Mat12, Mat3, Vec3};

/// Elements shorter than this are treated as degenerate
pub const LENGTH_TOLERANCE: f64 = 1e-9;

/// Above this |x·Z| an element is near-vertical and uses the fallback reference axis
const VERTICAL_THRESHOLD: f64 = 0.9;

/// Convert a coordinate triple into a vector
pub fn point(coords: &[f64; 3]) -> Vec3 {
    Vec3::new(coords[0], coords[1], coords[2])
}

/// Distance between two points
pub fn element_length(i: &[f64; 3], j: &[f64; 3]) -> f64 {
    (point(j) - point(i)).norm()
}

/// Rotate a vector about a unit axis by `angle` radians (Rodrigues' formula)
pub fn rotate_about_axis(v: &Vec3, axis: &Vec3, angle: f64) -> Vec3 {
    let (sin, cos) = angle.sin_cos();
    v * cos + axis.cross(v) * sin + axis * axis.dot(v) * (1.0 - cos)
}

/// Orthonormal element triad: x along the element, y/z spanning the cross-section
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalAxes {
    pub x: Vec3,
    pub y: Vec3,
    pub z: Vec3,
}

impl LocalAxes {
    /// Build the triad for an element running from `i` to `j`.
    ///
    /// The reference "up" vector is global Z. Near-vertical elements take
    /// global Y instead. `rotation` turns y/z about local x.
    /// Returns `None` when the element length is within [`LENGTH_TOLERANCE`].
    pub fn from_nodes(i: &[f64; 3], j: &[f64; 3], rotation: f64) -> Option<Self> {
        let d = point(j) - point(i);
        let length = d.norm();
        if length <= LENGTH_TOLERANCE {
            return None;
        }
        let x = d / length;

        let (y, z) = if x.z.abs() < VERTICAL_THRESHOLD {
            let y = Vec3::z().cross(&x).normalize();
            (y, x.cross(&y))
        } else {
            let z = x.cross(&Vec3::y()).normalize();
            (z.cross(&x), z)
        };

        let (y, z) = if rotation.abs() > 1e-12 {
            (
                rotate_about_axis(&y, &x, rotation),
                rotate_about_axis(&z, &x, rotation),
            )
        } else {
            (y, z)
        };

        Some(Self { x, y, z })
    }

    /// 3x3 rotation with rows = local axes in global components (global -> local)
    pub fn rotation_matrix(&self) -> Mat3 {
        Mat3::from_rows(&[self.x.transpose(), self.y.transpose(), self.z.transpose()])
    }

    /// Direction cosines of the element axis
    pub fn direction_cosines(&self) -> [f64; 3] {
        [self.x.x, self.x.y, self.x.z]
    }

    /// Components of a global vector in local axes
    pub fn to_local(&self, v: &Vec3) -> Vec3 {
        Vec3::new(self.x.dot(v), self.y.dot(v), self.z.dot(v))
    }
}

/// Orthonormalize a row-wise axis matrix (rows = x, y, z directions).
/// The z row is rebuilt from x × y; `None` if x and y are parallel or zero.
pub fn orthonormal_axes(rows: &[[f64; 3]; 3]) -> Option<Mat3> {
    let x = point(&rows[0]);
    let y = point(&rows[1]);
    if x.norm() < 1e-12 {
        return None;
    }
    let x = x.normalize();
    let y = y - x * x.dot(&y);
    if y.norm() < 1e-12 {
        return None;
    }
    let y = y.normalize();
    let z = x.cross(&y);
    Some(Mat3::from_rows(&[x.transpose(), y.transpose(), z.transpose()]))
}

/// Build the 12x12 block-diagonal transformation from a 3x3 rotation
pub fn transformation_matrix(r: &Mat3) -> Mat12 {
    let mut t = Mat12::zeros();
    for block in 0..4 {
        let offset = block * 3;
        t.fixed_view_mut::<3, 3>(offset, offset).copy_from(r);
    }
    t
}

/// Map from nodal DOF axes to global axes for the two end nodes.
///
/// Nodes without local axes contribute identity blocks. A node rotation `R`
/// (rows = node axes) contributes `Rᵀ` to its translation and rotation blocks.
pub fn node_rotation_matrix(i_axes: Option<&Mat3>, j_axes: Option<&Mat3>) -> Mat12 {
    let mut g = Mat12::identity();
    for (node, axes) in [i_axes, j_axes].into_iter().enumerate() {
        if let Some(r) = axes {
            let rt = r.transpose();
            for half in 0..2 {
                let offset = node * 6 + half * 3;
                g.fixed_view_mut::<3, 3>(offset, offset).copy_from(&rt);
            }
        }
    }
    g
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_orthonormal(axes: &LocalAxes) {
        let r = axes.rotation_matrix();
        let should_be_identity = r * r.transpose();
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_relative_eq!(should_be_identity[(i, j)], expected, epsilon = 1e-12);
            }
        }
        assert_relative_eq!(axes.x.cross(&axes.y).dot(&axes.z), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_horizontal_element_along_x() {
        let axes = LocalAxes::from_nodes(&[0.0, 0.0, 0.0], &[10.0, 0.0, 0.0], 0.0).unwrap();
        assert_relative_eq!(axes.x.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(axes.y.y, 1.0, epsilon = 1e-12);
        assert_relative_eq!(axes.z.z, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_vertical_element_uses_fallback_axis() {
        let axes = LocalAxes::from_nodes(&[0.0, 0.0, 0.0], &[0.0, 0.0, 3.0], 0.0).unwrap();
        assert_relative_eq!(axes.x.z, 1.0, epsilon = 1e-12);
        assert_relative_eq!(axes.y.y, 1.0, epsilon = 1e-12);
        assert_relative_eq!(axes.z.x, -1.0, epsilon = 1e-12);
        assert_orthonormal(&axes);
    }

    #[test]
    fn test_inclined_element_is_orthonormal() {
        let axes = LocalAxes::from_nodes(&[1.0, -2.0, 0.5], &[4.0, 3.0, 2.0], 0.3).unwrap();
        assert_orthonormal(&axes);
    }

    #[test]
    fn test_orientation_rotates_y_onto_z() {
        let axes = LocalAxes::from_nodes(
            &[0.0, 0.0, 0.0],
            &[5.0, 0.0, 0.0],
            std::f64::consts::FRAC_PI_2,
        )
        .unwrap();
        assert_relative_eq!(axes.y.z, 1.0, epsilon = 1e-12);
        assert_relative_eq!(axes.z.y, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_length_has_no_axes() {
        assert!(LocalAxes::from_nodes(&[1.0, 1.0, 1.0], &[1.0, 1.0, 1.0], 0.0).is_none());
    }

    #[test]
    fn test_transformation_preserves_length() {
        let axes = LocalAxes::from_nodes(&[0.0, 0.0, 0.0], &[1.0, 2.0, 3.0], 0.7).unwrap();
        let t = transformation_matrix(&axes.rotation_matrix());
        let v = crate::math::Vec12::from_fn(|i, _| i as f64 - 4.0);
        assert_relative_eq!((t * v).norm(), v.norm(), epsilon = 1e-10);
    }

    #[test]
    fn test_orthonormal_axes_repairs_skew_input() {
        let r = orthonormal_axes(&[[2.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 0.0, 0.0]]).unwrap();
        assert_relative_eq!(r[(1, 1)], 1.0, epsilon = 1e-12);
        assert_relative_eq!(r[(2, 2)], 1.0, epsilon = 1e-12);
        assert!(orthonormal_axes(&[[1.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0; 3]]).is_none());
    }
}
