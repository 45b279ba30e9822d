//! Interpolation kernels for sampling a voxel array at continuous indices

use crate::array::Voxel;
use crate::types::Interpolation;
use ndarray::ArrayView3;

/// Slack on the half-voxel border test, absorbs round-off from transforms
const BORDER_TOLERANCE: f64 = 1e-7;

/// Catmull-Rom weights for taps at offsets -1, 0, 1, 2 around `floor(x)`
#[inline]
pub fn cubic_weights(t: f64) -> [f64; 4] {
    let t2 = t * t;
    let t3 = t2 * t;
    [
        -0.5 * t3 + t2 - 0.5 * t,
        1.5 * t3 - 2.5 * t2 + 1.0,
        -1.5 * t3 + 2.0 * t2 + 0.5 * t,
        0.5 * t3 - 0.5 * t2,
    ]
}

#[inline]
fn clamp_index(index: i64, len: usize) -> usize {
    index.clamp(0, len as i64 - 1) as usize
}

/// Samples one typed array with a fixed kernel
///
/// Coordinates are continuous `(i, j, k)` indices relative to the array's first
/// voxel. A point is inside when each coordinate lies within half a voxel of
/// the array, neighbours beyond the edge are clamped to it.
pub struct Sampler<'a, T> {
    data: ArrayView3<'a, T>,
    /// Voxels along (i, j, k)
    dims: [usize; 3],
    kernel: Interpolation,
}

impl<'a, T: Voxel> Sampler<'a, T> {
    pub fn new(data: ArrayView3<'a, T>, kernel: Interpolation) -> Self {
        let (nz, ny, nx) = data.dim();
        Self {
            data,
            dims: [nx, ny, nz],
            kernel,
        }
    }

    pub fn kernel(&self) -> Interpolation {
        self.kernel
    }

    /// Interpolated value, `None` outside the array
    pub fn sample(&self, index: [f64; 3]) -> Option<f64> {
        if !self.inside(index) {
            return None;
        }

        let value = match self.kernel {
            Interpolation::NearestNeighbor => self.nearest(index),
            Interpolation::Linear => self.linear(index),
            Interpolation::Cubic => self.cubic(index),
        };
        Some(value)
    }

    fn inside(&self, index: [f64; 3]) -> bool {
        index.iter().zip(self.dims).all(|(&x, n)| {
            n > 0 && x >= -0.5 - BORDER_TOLERANCE && x <= n as f64 - 0.5 + BORDER_TOLERANCE
        })
    }

    #[inline]
    fn at(&self, i: usize, j: usize, k: usize) -> f64 {
        self.data[[k, j, i]].to_f64()
    }

    fn nearest(&self, index: [f64; 3]) -> f64 {
        let [i, j, k] = [0, 1, 2].map(|axis| clamp_index(index[axis].round() as i64, self.dims[axis]));
        self.at(i, j, k)
    }

    fn linear(&self, index: [f64; 3]) -> f64 {
        let mut taps = [[0usize; 2]; 3];
        let mut weights = [[0.0f64; 2]; 3];
        for axis in 0..3 {
            let base = index[axis].floor();
            let t = index[axis] - base;
            let base = base as i64;
            taps[axis] = [
                clamp_index(base, self.dims[axis]),
                clamp_index(base + 1, self.dims[axis]),
            ];
            weights[axis] = [1.0 - t, t];
        }

        let mut value = 0.0;
        for (dk, wk) in weights[2].iter().enumerate() {
            for (dj, wj) in weights[1].iter().enumerate() {
                for (di, wi) in weights[0].iter().enumerate() {
                    value += wi * wj * wk * self.at(taps[0][di], taps[1][dj], taps[2][dk]);
                }
            }
        }
        value
    }

    fn cubic(&self, index: [f64; 3]) -> f64 {
        let mut taps = [[0usize; 4]; 3];
        let mut weights = [[0.0f64; 4]; 3];
        for axis in 0..3 {
            let base = index[axis].floor();
            weights[axis] = cubic_weights(index[axis] - base);
            let base = base as i64;
            for (offset, tap) in taps[axis].iter_mut().enumerate() {
                *tap = clamp_index(base - 1 + offset as i64, self.dims[axis]);
            }
        }

        let mut value = 0.0;
        for (dk, wk) in weights[2].iter().enumerate() {
            for (dj, wj) in weights[1].iter().enumerate() {
                let wjk = wj * wk;
                for (di, wi) in weights[0].iter().enumerate() {
                    value += wi * wjk * self.at(taps[0][di], taps[1][dj], taps[2][dk]);
                }
            }
        }
        value
    }
}
