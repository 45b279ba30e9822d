//! Reslicing: recompute an array's voxels on a new grid
//!
//! Every output voxel centre is mapped through the reslice transform into
//! the input volume and interpolated there. Output voxels that land outside
//! the input (beyond its half-voxel border) take the background value.

use crate::array::{DataArray, Voxel};
use crate::error::{Result, VolumeError};
use crate::grid::{Bounds, ImageGrid};
use crate::interpolate::Sampler;
use crate::transform::ResliceTransform;
use crate::types::{Extent, Interpolation};
use crate::volume::ImageVolume;
use crate::with_array_data;
use ndarray::{Array3, ArrayView3, Zip};
use nalgebra::Point3;
use tracing::debug;

/// Round half up, the rounding used for output extents
#[inline]
fn round_index(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

/// Resampling filter configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reslicer {
    output_spacing: Option<[f64; 3]>,
    transform: ResliceTransform,
    interpolation: Interpolation,
    auto_crop: bool,
    background: f64,
}

impl Default for Reslicer {
    fn default() -> Self {
        Self {
            output_spacing: None,
            transform: ResliceTransform::identity(),
            interpolation: Interpolation::NearestNeighbor,
            auto_crop: false,
            background: 0.0,
        }
    }
}

impl Reslicer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spacing of the output grid; the input spacing when unset
    pub fn output_spacing(mut self, spacing: [f64; 3]) -> Self {
        self.output_spacing = Some(spacing);
        self
    }

    /// Transform mapping output points into the input volume
    pub fn transform(mut self, transform: ResliceTransform) -> Self {
        self.transform = transform;
        self
    }

    pub fn interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    /// Grow or shrink the output to enclose the whole transformed input
    pub fn auto_crop(mut self, auto_crop: bool) -> Self {
        self.auto_crop = auto_crop;
        self
    }

    /// Value of output voxels that fall outside the input
    pub fn background(mut self, value: f64) -> Self {
        self.background = value;
        self
    }

    /// Geometry of the output for a given input grid
    ///
    /// Without auto-crop the output covers the input bounds and is centred on
    /// them. With auto-crop the bounds are those of the input corners mapped
    /// through the inverse transform, and the output starts at their minimum.
    pub fn output_grid(&self, input: &ImageGrid) -> Result<ImageGrid> {
        if input.extent.is_empty() {
            return Err(VolumeError::InvalidDimensions(format!(
                "cannot reslice empty extent {}",
                input.extent
            )));
        }

        let spacing = self.output_spacing.unwrap_or(input.spacing);
        if spacing.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(VolumeError::InvalidArgument(format!(
                "output spacing must be positive, got {:?}",
                spacing
            )));
        }

        let mut bounds = input.bounds();
        if self.auto_crop && !self.transform.is_identity() {
            let inverse = self.transform.inverse()?;
            let corners: Vec<Point3<f64>> = bounds
                .corners()
                .iter()
                .map(|corner| inverse.transform_point(corner))
                .collect();
            bounds = Bounds::from_points(&corners).unwrap_or(bounds);
        }

        let center = bounds.center();
        let mut origin = [0.0; 3];
        let mut extent = [0i64; 6];
        for axis in 0..3 {
            let s = spacing[axis];
            let (min, max) = (bounds.min[axis], bounds.max[axis]);
            let lo = round_index(min / s);
            let hi = round_index(lo as f64 + (max - min) / s);
            extent[2 * axis] = lo;
            extent[2 * axis + 1] = hi;
            origin[axis] = if self.auto_crop {
                min - lo as f64 * s
            } else {
                center[axis] - 0.5 * (lo + hi) as f64 * s
            };
        }

        ImageGrid::new(origin, spacing, Extent::new(extent))
    }

    /// Reslice one array with the configured kernel
    pub fn reslice_array(&self, volume: &ImageVolume, name: &str) -> Result<DataArray> {
        self.reslice_array_with(volume, name, self.interpolation)
    }

    /// Reslice one array with an explicit kernel; the scalar type is kept
    pub fn reslice_array_with(
        &self,
        volume: &ImageVolume,
        name: &str,
        interpolation: Interpolation,
    ) -> Result<DataArray> {
        let array = volume.require_array(name)?;
        let output_grid = self.output_grid(volume.grid())?;

        debug!(
            array = name,
            kernel = %interpolation,
            output = %output_grid.summary(),
            "reslicing"
        );

        let data = with_array_data!(array.data(), input => {
            self.resample(input.view(), volume.grid(), &output_grid, interpolation)
        });
        Ok(DataArray::new(name, data))
    }

    /// Reslice one array into a single-array volume on the output grid
    pub fn reslice_volume(
        &self,
        volume: &ImageVolume,
        name: &str,
        interpolation: Interpolation,
    ) -> Result<ImageVolume> {
        let array = self.reslice_array_with(volume, name, interpolation)?;
        let mut output = ImageVolume::new(self.output_grid(volume.grid())?);
        output.add_array(array)?;
        Ok(output)
    }

    fn resample<T: Voxel>(
        &self,
        input: ArrayView3<'_, T>,
        input_grid: &ImageGrid,
        output_grid: &ImageGrid,
        interpolation: Interpolation,
    ) -> crate::array::ArrayData {
        let sampler = Sampler::new(input, interpolation);
        let in_min = input_grid.extent.min_corner();
        let out_min = output_grid.extent.min_corner();
        let transform = &self.transform;

        let mut output = Array3::from_elem(output_grid.shape(), T::from_f64(self.background));
        Zip::indexed(&mut output).par_for_each(|(k, j, i), value| {
            let point = output_grid.index_to_world([
                out_min[0] + i as i64,
                out_min[1] + j as i64,
                out_min[2] + k as i64,
            ]);
            let source = input_grid.world_to_continuous_index(&transform.transform_point(&point));
            let relative = [
                source[0] - in_min[0] as f64,
                source[1] - in_min[1] as f64,
                source[2] - in_min[2] as f64,
            ];
            if let Some(sample) = sampler.sample(relative) {
                *value = T::from_f64(sample);
            }
        });

        T::wrap(output)
    }
}
