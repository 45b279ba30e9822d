//! Named per-voxel arrays (channels) attached to a volume
//!
//! Arrays are stored as `ndarray::Array3` indexed `[k, j, i]`, so the `i`
//! index varies fastest in memory, which is also the byte order of the
//! blobs in a store.

use crate::error::{Result, VolumeError};
use crate::types::{DataType, ValueRange};
use ndarray::Array3;
use num_traits::Zero;

/// Intensity image read from the original scan
pub const SOURCE: &str = "Source";
/// Working image derived from the source
pub const TARGET: &str = "Target";
/// Tissue label map
pub const TISSUE: &str = "Tissue";

/// Scalar types that can back an array
pub trait Voxel: Copy + Send + Sync + PartialEq + Zero + bytemuck::Pod + 'static {
    const DATA_TYPE: DataType;

    fn to_f64(self) -> f64;

    /// Convert from a sample value; integer types round and saturate
    fn from_f64(value: f64) -> Self;

    fn wrap(array: Array3<Self>) -> ArrayData;
}

macro_rules! impl_voxel {
    ($ty:ty, $variant:ident, integer) => {
        impl Voxel for $ty {
            const DATA_TYPE: DataType = DataType::$variant;

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }

            #[inline]
            fn from_f64(value: f64) -> Self {
                // float-to-int `as` saturates and maps NaN to 0
                value.round() as $ty
            }

            fn wrap(array: Array3<Self>) -> ArrayData {
                ArrayData::$variant(array)
            }
        }
    };
    ($ty:ty, $variant:ident, float) => {
        impl Voxel for $ty {
            const DATA_TYPE: DataType = DataType::$variant;

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }

            #[inline]
            fn from_f64(value: f64) -> Self {
                value as $ty
            }

            fn wrap(array: Array3<Self>) -> ArrayData {
                ArrayData::$variant(array)
            }
        }
    };
}

impl_voxel!(u8, U8, integer);
impl_voxel!(i8, I8, integer);
impl_voxel!(u16, U16, integer);
impl_voxel!(i16, I16, integer);
impl_voxel!(u32, U32, integer);
impl_voxel!(i32, I32, integer);
impl_voxel!(f32, F32, float);
impl_voxel!(f64, F64, float);

/// Typed voxel buffer
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    U8(Array3<u8>),
    I8(Array3<i8>),
    U16(Array3<u16>),
    I16(Array3<i16>),
    U32(Array3<u32>),
    I32(Array3<i32>),
    F32(Array3<f32>),
    F64(Array3<f64>),
}

/// Run `$body` with `$array` bound to the typed buffer inside an `ArrayData`
#[macro_export]
macro_rules! with_array_data {
    ($data:expr, $array:ident => $body:expr) => {
        match $data {
            $crate::array::ArrayData::U8($array) => $body,
            $crate::array::ArrayData::I8($array) => $body,
            $crate::array::ArrayData::U16($array) => $body,
            $crate::array::ArrayData::I16($array) => $body,
            $crate::array::ArrayData::U32($array) => $body,
            $crate::array::ArrayData::I32($array) => $body,
            $crate::array::ArrayData::F32($array) => $body,
            $crate::array::ArrayData::F64($array) => $body,
        }
    };
}

/// Build an `ArrayData` of `data_type` by mapping every sample of `source`
fn map_into<S: Voxel>(source: &Array3<S>, data_type: DataType) -> ArrayData {
    fn convert<S: Voxel, D: Voxel>(source: &Array3<S>) -> ArrayData {
        D::wrap(source.mapv(|v| D::from_f64(v.to_f64())))
    }

    match data_type {
        DataType::U8 => convert::<S, u8>(source),
        DataType::I8 => convert::<S, i8>(source),
        DataType::U16 => convert::<S, u16>(source),
        DataType::I16 => convert::<S, i16>(source),
        DataType::U32 => convert::<S, u32>(source),
        DataType::I32 => convert::<S, i32>(source),
        DataType::F32 => convert::<S, f32>(source),
        DataType::F64 => convert::<S, f64>(source),
    }
}

fn zeros_of<T: Voxel>(shape: (usize, usize, usize)) -> ArrayData {
    T::wrap(Array3::zeros(shape))
}

fn typed_from_bytes<T: Voxel>(shape: (usize, usize, usize), bytes: &[u8]) -> Result<ArrayData> {
    if bytes.len() % std::mem::size_of::<T>() != 0 {
        return Err(VolumeError::InvalidFormat(
            "Byte length not aligned with data type size".to_string(),
        ));
    }
    // copy into an aligned buffer; `bytes` may come from an unaligned Vec<u8>
    let mut values = vec![T::zero(); bytes.len() / std::mem::size_of::<T>()];
    bytemuck::cast_slice_mut::<T, u8>(&mut values).copy_from_slice(bytes);
    let array = Array3::from_shape_vec(shape, values)
        .map_err(|e| VolumeError::InvalidDimensions(e.to_string()))?;
    Ok(T::wrap(array))
}

impl ArrayData {
    /// Zero-filled buffer with shape (k, j, i)
    pub fn zeros(data_type: DataType, shape: (usize, usize, usize)) -> Self {
        match data_type {
            DataType::U8 => zeros_of::<u8>(shape),
            DataType::I8 => zeros_of::<i8>(shape),
            DataType::U16 => zeros_of::<u16>(shape),
            DataType::I16 => zeros_of::<i16>(shape),
            DataType::U32 => zeros_of::<u32>(shape),
            DataType::I32 => zeros_of::<i32>(shape),
            DataType::F32 => zeros_of::<f32>(shape),
            DataType::F64 => zeros_of::<f64>(shape),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            ArrayData::U8(_) => DataType::U8,
            ArrayData::I8(_) => DataType::I8,
            ArrayData::U16(_) => DataType::U16,
            ArrayData::I16(_) => DataType::I16,
            ArrayData::U32(_) => DataType::U32,
            ArrayData::I32(_) => DataType::I32,
            ArrayData::F32(_) => DataType::F32,
            ArrayData::F64(_) => DataType::F64,
        }
    }

    /// Shape ordered (k, j, i)
    pub fn shape(&self) -> (usize, usize, usize) {
        with_array_data!(self, a => a.dim())
    }
}

/// A named voxel array
#[derive(Debug, Clone, PartialEq)]
pub struct DataArray {
    name: String,
    data: ArrayData,
}

impl DataArray {
    pub fn new(name: impl Into<String>, data: ArrayData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    /// Wrap a typed buffer
    pub fn from_array<T: Voxel>(name: impl Into<String>, array: Array3<T>) -> Self {
        Self::new(name, T::wrap(array))
    }

    /// Zero-filled array with shape (k, j, i)
    pub fn zeros(name: impl Into<String>, data_type: DataType, shape: (usize, usize, usize)) -> Self {
        Self::new(name, ArrayData::zeros(data_type, shape))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut ArrayData {
        &mut self.data
    }

    pub fn into_data(self) -> ArrayData {
        self.data
    }

    pub fn data_type(&self) -> DataType {
        self.data.data_type()
    }

    /// Shape ordered (k, j, i)
    pub fn shape(&self) -> (usize, usize, usize) {
        self.data.shape()
    }

    /// Number of voxels along (i, j, k)
    pub fn dims(&self) -> [usize; 3] {
        let (nz, ny, nx) = self.shape();
        [nx, ny, nz]
    }

    pub fn len(&self) -> usize {
        let (nz, ny, nx) = self.shape();
        nx * ny * nz
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sample at relative index (i, j, k) as f64
    pub fn value_at(&self, index: [usize; 3]) -> Option<f64> {
        let [i, j, k] = index;
        with_array_data!(&self.data, a => a.get((k, j, i)).map(|v| v.to_f64()))
    }

    /// Converted copy; float to integer conversions round and saturate
    pub fn cast(&self, data_type: DataType) -> DataArray {
        if data_type == self.data_type() {
            return self.clone();
        }
        let data = with_array_data!(&self.data, a => map_into(a, data_type));
        Self::new(self.name.clone(), data)
    }

    /// Raw sample bytes in `[k, j, i]` order
    pub fn to_bytes(&self) -> Vec<u8> {
        with_array_data!(&self.data, a => {
            let standard = a.as_standard_layout();
            match standard.as_slice() {
                Some(values) => bytemuck::cast_slice::<_, u8>(values).to_vec(),
                None => a.iter().flat_map(|v| bytemuck::bytes_of(v).to_vec()).collect(),
            }
        })
    }

    /// Rebuild from raw sample bytes
    pub fn from_bytes(
        name: impl Into<String>,
        data_type: DataType,
        shape: (usize, usize, usize),
        bytes: &[u8],
    ) -> Result<Self> {
        let expected = shape.0 * shape.1 * shape.2 * data_type.size_in_bytes();
        if bytes.len() != expected {
            return Err(VolumeError::InvalidDimensions(format!(
                "Data size mismatch: expected {} bytes, got {}",
                expected,
                bytes.len()
            )));
        }

        let data = match data_type {
            DataType::U8 => typed_from_bytes::<u8>(shape, bytes)?,
            DataType::I8 => typed_from_bytes::<i8>(shape, bytes)?,
            DataType::U16 => typed_from_bytes::<u16>(shape, bytes)?,
            DataType::I16 => typed_from_bytes::<i16>(shape, bytes)?,
            DataType::U32 => typed_from_bytes::<u32>(shape, bytes)?,
            DataType::I32 => typed_from_bytes::<i32>(shape, bytes)?,
            DataType::F32 => typed_from_bytes::<f32>(shape, bytes)?,
            DataType::F64 => typed_from_bytes::<f64>(shape, bytes)?,
        };
        Ok(Self::new(name, data))
    }

    /// Minimum and maximum sample, `None` when empty
    pub fn value_range(&self) -> Option<ValueRange> {
        with_array_data!(&self.data, a => {
            a.iter().map(|v| v.to_f64()).fold(None, |range: Option<ValueRange>, v| {
                Some(match range {
                    None => ValueRange::new(v, v),
                    Some(r) => ValueRange::new(r.min.min(v), r.max.max(v)),
                })
            })
        })
    }
}

/// How an array is treated when resampled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelRole {
    /// Continuous image values, resampled with the requested kernel
    Intensity,
    /// Discrete labels, always resampled with nearest neighbour
    Labels,
}

impl ChannelRole {
    pub fn for_array(name: &str, data_type: DataType) -> Self {
        match name {
            SOURCE | TARGET => ChannelRole::Intensity,
            TISSUE => ChannelRole::Labels,
            _ if data_type.is_float() => ChannelRole::Intensity,
            _ => ChannelRole::Labels,
        }
    }
}
