//! Core data types for project volumes

use crate::error::{Result, VolumeError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Scalar types a voxel array can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DataType {
    /// Unsigned 8-bit integer
    U8 = 0,
    /// Signed 8-bit integer
    I8 = 1,
    /// Unsigned 16-bit integer
    U16 = 2,
    /// Signed 16-bit integer
    I16 = 3,
    /// Unsigned 32-bit integer
    U32 = 4,
    /// Signed 32-bit integer
    I32 = 5,
    /// 32-bit floating point
    F32 = 6,
    /// 64-bit floating point
    F64 = 7,
}

impl DataType {
    /// Size in bytes of this data type
    pub fn size_in_bytes(&self) -> usize {
        match self {
            DataType::U8 | DataType::I8 => 1,
            DataType::U16 | DataType::I16 => 2,
            DataType::U32 | DataType::I32 | DataType::F32 => 4,
            DataType::F64 => 8,
        }
    }

    /// Check if this is a floating point type
    pub fn is_float(&self) -> bool {
        matches!(self, DataType::F32 | DataType::F64)
    }

    /// Check if this is an integer type
    pub fn is_integer(&self) -> bool {
        !self.is_float()
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::U8 => "u8",
            DataType::I8 => "i8",
            DataType::U16 => "u16",
            DataType::I16 => "i16",
            DataType::U32 => "u32",
            DataType::I32 => "i32",
            DataType::F32 => "f32",
            DataType::F64 => "f64",
        };
        f.pad(name)
    }
}

impl FromStr for DataType {
    type Err = VolumeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "u8" | "uchar" | "unsigned_char" => Ok(DataType::U8),
            "i8" | "char" => Ok(DataType::I8),
            "u16" | "ushort" | "unsigned_short" => Ok(DataType::U16),
            "i16" | "short" => Ok(DataType::I16),
            "u32" | "uint" => Ok(DataType::U32),
            "i32" | "int" => Ok(DataType::I32),
            "f32" | "float" => Ok(DataType::F32),
            "f64" | "double" => Ok(DataType::F64),
            other => Err(VolumeError::InvalidArgument(format!(
                "unknown data type '{}'",
                other
            ))),
        }
    }
}

/// Inclusive voxel index bounds `[i_min, i_max, j_min, j_max, k_min, k_max]`
///
/// An axis whose maximum is below its minimum is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Extent([i64; 6]);

impl Extent {
    pub fn new(bounds: [i64; 6]) -> Self {
        Self(bounds)
    }

    /// Extent starting at index 0 with the given number of voxels per axis
    pub fn from_dims(dims: [usize; 3]) -> Self {
        Self([
            0,
            dims[0] as i64 - 1,
            0,
            dims[1] as i64 - 1,
            0,
            dims[2] as i64 - 1,
        ])
    }

    /// The raw bounds
    pub fn bounds(&self) -> [i64; 6] {
        self.0
    }

    /// First index along `axis`
    pub fn min(&self, axis: usize) -> i64 {
        self.0[2 * axis]
    }

    /// Last index along `axis`
    pub fn max(&self, axis: usize) -> i64 {
        self.0[2 * axis + 1]
    }

    /// Inclusive index range along `axis`
    pub fn axis_range(&self, axis: usize) -> RangeInclusive<i64> {
        self.min(axis)..=self.max(axis)
    }

    /// Minimum corner as (i, j, k)
    pub fn min_corner(&self) -> [i64; 3] {
        [self.0[0], self.0[2], self.0[4]]
    }

    /// Number of voxels along each axis (i, j, k)
    pub fn dims(&self) -> [usize; 3] {
        let mut dims = [0usize; 3];
        for (axis, dim) in dims.iter_mut().enumerate() {
            let span = self.max(axis) - self.min(axis) + 1;
            *dim = span.max(0) as usize;
        }
        dims
    }

    /// Total number of voxels
    pub fn num_points(&self) -> usize {
        self.dims().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.num_points() == 0
    }

    /// Same size, translated by `delta` voxels per axis
    pub fn shifted(&self, delta: [i64; 3]) -> Self {
        let mut bounds = self.0;
        for axis in 0..3 {
            bounds[2 * axis] += delta[axis];
            bounds[2 * axis + 1] += delta[axis];
        }
        Self(bounds)
    }

    /// Smallest extent containing both
    pub fn union(&self, other: &Extent) -> Self {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let mut bounds = [0i64; 6];
        for axis in 0..3 {
            bounds[2 * axis] = self.min(axis).min(other.min(axis));
            bounds[2 * axis + 1] = self.max(axis).max(other.max(axis));
        }
        Self(bounds)
    }

    /// Check whether an absolute index lies inside
    pub fn contains(&self, index: [i64; 3]) -> bool {
        (0..3).all(|axis| self.axis_range(axis).contains(&index[axis]))
    }

    /// Check whether `other` lies entirely inside
    pub fn encloses(&self, other: &Extent) -> bool {
        other.is_empty()
            || (0..3).all(|axis| other.min(axis) >= self.min(axis) && other.max(axis) <= self.max(axis))
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0;
        write!(
            f,
            "[{}, {}, {}, {}, {}, {}]",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

/// Triple of floats given on the command line as `x,y,z`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3(pub [f64; 3]);

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self([x, y, z])
    }

    pub fn splat(value: f64) -> Self {
        Self([value; 3])
    }

    pub fn as_array(&self) -> [f64; 3] {
        self.0
    }
}

impl FromStr for Vec3 {
    type Err = VolumeError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(VolumeError::InvalidArgument(format!(
                "expected three comma-separated values, got '{}'",
                s
            )));
        }

        let mut values = [0.0; 3];
        for (value, part) in values.iter_mut().zip(parts) {
            *value = part.parse::<f64>().map_err(|e| {
                VolumeError::InvalidArgument(format!("invalid number '{}': {}", part, e))
            })?;
            if !value.is_finite() {
                return Err(VolumeError::InvalidArgument(format!(
                    "non-finite value '{}'",
                    part
                )));
            }
        }
        Ok(Self(values))
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.0[0], self.0[1], self.0[2])
    }
}

/// Interpolation kernel used when resampling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Interpolation {
    NearestNeighbor,
    Linear,
    #[default]
    Cubic,
}

impl FromStr for Interpolation {
    type Err = VolumeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nearest" | "nearestneighbor" | "nearest_neighbor" => Ok(Interpolation::NearestNeighbor),
            "linear" | "trilinear" => Ok(Interpolation::Linear),
            "cubic" | "tricubic" => Ok(Interpolation::Cubic),
            other => Err(VolumeError::InvalidArgument(format!(
                "unknown interpolation '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Interpolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Interpolation::NearestNeighbor => "nearest",
            Interpolation::Linear => "linear",
            Interpolation::Cubic => "cubic",
        };
        f.write_str(name)
    }
}

/// Value range of an array
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min <= self.max
    }
}
