//! Volume geometry - origin, spacing and extent of a regular voxel grid

use crate::error::{Result, VolumeError};
use crate::types::Extent;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Geometry of a regular 3D grid
///
/// The world position of voxel `(i, j, k)` is `origin + spacing * (i, j, k)`,
/// where the indices are absolute extent indices (they need not start at 0).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageGrid {
    pub origin: [f64; 3],
    pub spacing: [f64; 3],
    pub extent: Extent,
}

impl ImageGrid {
    /// Create a new grid
    pub fn new(origin: [f64; 3], spacing: [f64; 3], extent: Extent) -> Result<Self> {
        if spacing.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(VolumeError::InvalidDimensions(format!(
                "Spacing must be positive and finite, got {:?}",
                spacing
            )));
        }
        if origin.iter().any(|o| !o.is_finite()) {
            return Err(VolumeError::InvalidDimensions(format!(
                "Origin must be finite, got {:?}",
                origin
            )));
        }

        Ok(Self {
            origin,
            spacing,
            extent,
        })
    }

    /// Number of voxels along (i, j, k)
    pub fn dims(&self) -> [usize; 3] {
        self.extent.dims()
    }

    /// Shape of the backing arrays, ordered (k, j, i)
    pub fn shape(&self) -> (usize, usize, usize) {
        let [nx, ny, nz] = self.dims();
        (nz, ny, nx)
    }

    pub fn num_points(&self) -> usize {
        self.extent.num_points()
    }

    /// World position of an absolute voxel index
    pub fn index_to_world(&self, index: [i64; 3]) -> Point3<f64> {
        Point3::new(
            self.origin[0] + self.spacing[0] * index[0] as f64,
            self.origin[1] + self.spacing[1] * index[1] as f64,
            self.origin[2] + self.spacing[2] * index[2] as f64,
        )
    }

    /// Continuous absolute index of a world position
    pub fn world_to_continuous_index(&self, point: &Point3<f64>) -> [f64; 3] {
        [
            (point.x - self.origin[0]) / self.spacing[0],
            (point.y - self.origin[1]) / self.spacing[1],
            (point.z - self.origin[2]) / self.spacing[2],
        ]
    }

    /// World box spanned by the centres of the first and last voxels
    pub fn bounds(&self) -> Bounds {
        let min = self.index_to_world(self.extent.min_corner());
        let max = self.index_to_world([
            self.extent.max(0),
            self.extent.max(1),
            self.extent.max(2),
        ]);
        Bounds::new(min, max)
    }

    /// Check that another grid shares this grid's origin, spacing and extent
    pub fn same_geometry(&self, other: &ImageGrid) -> bool {
        const TOLERANCE: f64 = 1e-9;
        self.extent == other.extent
            && (0..3).all(|axis| {
                (self.origin[axis] - other.origin[axis]).abs() <= TOLERANCE
                    && (self.spacing[axis] - other.spacing[axis]).abs() <= TOLERANCE
            })
    }

    /// Get a summary string of the grid
    pub fn summary(&self) -> String {
        let [nx, ny, nz] = self.dims();
        format!(
            "{} x {} x {} voxels, origin ({}, {}, {}), spacing ({}, {}, {}), extent {}",
            nx,
            ny,
            nz,
            self.origin[0],
            self.origin[1],
            self.origin[2],
            self.spacing[0],
            self.spacing[1],
            self.spacing[2],
            self.extent
        )
    }
}

/// Axis-aligned world bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl Bounds {
    /// Creates a box from two corners in any order
    pub fn new(corner1: Point3<f64>, corner2: Point3<f64>) -> Self {
        Self {
            min: Point3::new(
                corner1.x.min(corner2.x),
                corner1.y.min(corner2.y),
                corner1.z.min(corner2.z),
            ),
            max: Point3::new(
                corner1.x.max(corner2.x),
                corner1.y.max(corner2.y),
                corner1.z.max(corner2.z),
            ),
        }
    }

    /// Smallest box enclosing all points, `None` for an empty iterator
    pub fn from_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Point3<f64>>,
    {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        Some(iter.fold(Self::new(first, first), |acc, point| Self {
            min: Point3::new(
                acc.min.x.min(point.x),
                acc.min.y.min(point.y),
                acc.min.z.min(point.z),
            ),
            max: Point3::new(
                acc.max.x.max(point.x),
                acc.max.y.max(point.y),
                acc.max.z.max(point.z),
            ),
        }))
    }

    /// The eight corner points
    pub fn corners(&self) -> [Point3<f64>; 8] {
        let (a, b) = (self.min, self.max);
        [
            Point3::new(a.x, a.y, a.z),
            Point3::new(b.x, a.y, a.z),
            Point3::new(a.x, b.y, a.z),
            Point3::new(b.x, b.y, a.z),
            Point3::new(a.x, a.y, b.z),
            Point3::new(b.x, a.y, b.z),
            Point3::new(a.x, b.y, b.z),
            Point3::new(b.x, b.y, b.z),
        ]
    }

    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn size(&self) -> Vector3<f64> {
        self.max - self.min
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn create_test_grid() -> ImageGrid {
        ImageGrid::new(
            [10.0, -5.0, 0.0],
            [0.5, 0.5, 2.0],
            Extent::new([0, 19, 0, 9, 2, 6]),
        )
        .unwrap()
    }

    #[test]
    fn test_grid_creation() {
        let grid = create_test_grid();
        assert_eq!(grid.dims(), [20, 10, 5]);
        assert_eq!(grid.shape(), (5, 10, 20));
        assert_eq!(grid.num_points(), 1000);

        assert!(ImageGrid::new([0.0; 3], [1.0, 0.0, 1.0], Extent::from_dims([2, 2, 2])).is_err());
        assert!(ImageGrid::new([f64::NAN, 0.0, 0.0], [1.0; 3], Extent::from_dims([2, 2, 2])).is_err());
    }

    #[test]
    fn test_index_world_conversion() {
        let grid = create_test_grid();
        let p = grid.index_to_world([4, 2, 3]);
        assert_relative_eq!(p, Point3::new(12.0, -4.0, 6.0));

        let index = grid.world_to_continuous_index(&Point3::new(12.25, -4.0, 7.0));
        assert_relative_eq!(index[0], 4.5);
        assert_relative_eq!(index[1], 2.0);
        assert_relative_eq!(index[2], 3.5);
    }

    #[test]
    fn test_bounds() {
        let grid = create_test_grid();
        let bounds = grid.bounds();
        assert_relative_eq!(bounds.min, Point3::new(10.0, -5.0, 4.0));
        assert_relative_eq!(bounds.max, Point3::new(19.5, -0.5, 12.0));
        assert_relative_eq!(bounds.center(), Point3::new(14.75, -2.75, 8.0));
        assert_relative_eq!(bounds.size(), Vector3::new(9.5, 4.5, 8.0));
    }

    #[test]
    fn test_bounds_from_points() {
        let points = [
            Point3::new(1.0, 5.0, -1.0),
            Point3::new(-2.0, 0.0, 3.0),
            Point3::new(0.0, 7.0, 0.0),
        ];
        let bounds = Bounds::from_points(&points).unwrap();
        assert_relative_eq!(bounds.min, Point3::new(-2.0, 0.0, -1.0));
        assert_relative_eq!(bounds.max, Point3::new(1.0, 7.0, 3.0));
        assert_eq!(bounds.corners().len(), 8);
        assert!(Bounds::from_points(&Vec::<Point3<f64>>::new()).is_none());
    }

    #[test]
    fn test_same_geometry() {
        let grid = create_test_grid();
        let mut other = grid;
        assert!(grid.same_geometry(&other));
        other.origin[1] += 0.1;
        assert!(!grid.same_geometry(&other));
    }
}
