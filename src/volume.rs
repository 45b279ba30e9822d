//! In-memory project volume: a grid plus named arrays

use crate::array::DataArray;
use crate::error::{Result, VolumeError};
use crate::grid::ImageGrid;
use crate::types::{DataType, Extent};

/// A regular grid carrying any number of uniquely named arrays
#[derive(Debug, Clone, PartialEq)]
pub struct ImageVolume {
    grid: ImageGrid,
    arrays: Vec<DataArray>,
}

impl ImageVolume {
    /// Create a volume with no arrays
    pub fn new(grid: ImageGrid) -> Self {
        Self {
            grid,
            arrays: Vec::new(),
        }
    }

    pub fn grid(&self) -> &ImageGrid {
        &self.grid
    }

    pub fn origin(&self) -> [f64; 3] {
        self.grid.origin
    }

    pub fn spacing(&self) -> [f64; 3] {
        self.grid.spacing
    }

    pub fn extent(&self) -> Extent {
        self.grid.extent
    }

    /// Attach an array; its shape must match the grid and its name must be new
    pub fn add_array(&mut self, array: DataArray) -> Result<()> {
        self.check_shape(&array)?;
        if self.array(array.name()).is_some() {
            return Err(VolumeError::InvalidArgument(format!(
                "array '{}' already present",
                array.name()
            )));
        }
        self.arrays.push(array);
        Ok(())
    }

    /// Attach an array, replacing any array with the same name
    pub fn replace_array(&mut self, array: DataArray) -> Result<()> {
        self.check_shape(&array)?;
        match self.arrays.iter_mut().find(|a| a.name() == array.name()) {
            Some(existing) => *existing = array,
            None => self.arrays.push(array),
        }
        Ok(())
    }

    pub fn remove_array(&mut self, name: &str) -> Option<DataArray> {
        let position = self.arrays.iter().position(|a| a.name() == name)?;
        Some(self.arrays.remove(position))
    }

    pub fn array(&self, name: &str) -> Option<&DataArray> {
        self.arrays.iter().find(|a| a.name() == name)
    }

    /// Like [`ImageVolume::array`] but missing arrays are an error
    pub fn require_array(&self, name: &str) -> Result<&DataArray> {
        self.array(name)
            .ok_or_else(|| VolumeError::MissingArray(name.to_string()))
    }

    /// Sample of an array at an absolute extent index
    pub fn value(&self, name: &str, index: [i64; 3]) -> Result<f64> {
        let array = self.require_array(name)?;
        let extent = self.grid.extent;
        if !extent.contains(index) {
            return Err(VolumeError::OutOfBounds(format!(
                "index {:?} outside extent {}",
                index, extent
            )));
        }
        let min = extent.min_corner();
        let relative = [0, 1, 2].map(|axis| (index[axis] - min[axis]) as usize);
        array
            .value_at(relative)
            .ok_or_else(|| VolumeError::OutOfBounds(format!("index {:?} in '{}'", index, name)))
    }

    pub fn arrays(&self) -> &[DataArray] {
        &self.arrays
    }

    pub fn array_names(&self) -> Vec<&str> {
        self.arrays.iter().map(|a| a.name()).collect()
    }

    /// Move the grid without touching voxel data
    pub fn set_origin(&mut self, origin: [f64; 3]) {
        self.grid.origin = origin;
    }

    /// Re-index the voxels; the number of voxels per axis must not change
    pub fn set_extent(&mut self, extent: Extent) -> Result<()> {
        if extent.dims() != self.grid.extent.dims() {
            return Err(VolumeError::InvalidDimensions(format!(
                "cannot re-index extent {} as {}: sizes differ",
                self.grid.extent, extent
            )));
        }
        self.grid.extent = extent;
        Ok(())
    }

    /// Convert an array's scalar type in place
    pub fn cast_array(&mut self, name: &str, data_type: DataType) -> Result<()> {
        let array = self
            .arrays
            .iter_mut()
            .find(|a| a.name() == name)
            .ok_or_else(|| VolumeError::MissingArray(name.to_string()))?;
        if array.data_type() != data_type {
            *array = array.cast(data_type);
        }
        Ok(())
    }

    fn check_shape(&self, array: &DataArray) -> Result<()> {
        if array.shape() != self.grid.shape() {
            return Err(VolumeError::InvalidDimensions(format!(
                "array '{}' has shape {:?}, grid expects {:?}",
                array.name(),
                array.shape(),
                self.grid.shape()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::{SOURCE, TISSUE};

    fn create_test_volume() -> ImageVolume {
        let grid = ImageGrid::new([0.0; 3], [1.0; 3], Extent::from_dims([4, 3, 2])).unwrap();
        let mut volume = ImageVolume::new(grid);
        volume
            .add_array(DataArray::zeros(SOURCE, DataType::F32, (2, 3, 4)))
            .unwrap();
        volume
            .add_array(DataArray::zeros(TISSUE, DataType::U8, (2, 3, 4)))
            .unwrap();
        volume
    }

    #[test]
    fn test_add_array_validation() {
        let mut volume = create_test_volume();
        assert_eq!(volume.array_names(), vec![SOURCE, TISSUE]);

        let wrong_shape = DataArray::zeros("Other", DataType::U8, (3, 3, 4));
        assert!(matches!(
            volume.add_array(wrong_shape),
            Err(VolumeError::InvalidDimensions(_))
        ));

        let duplicate = DataArray::zeros(SOURCE, DataType::F32, (2, 3, 4));
        assert!(volume.add_array(duplicate.clone()).is_err());
        assert!(volume.replace_array(duplicate).is_ok());
        assert_eq!(volume.arrays().len(), 2);
    }

    #[test]
    fn test_set_extent_requires_same_size() {
        let mut volume = create_test_volume();
        let shifted = volume.extent().shifted([10, 0, -3]);
        volume.set_extent(shifted).unwrap();
        assert_eq!(volume.extent().bounds(), [10, 13, 0, 2, -3, -2]);

        assert!(volume.set_extent(Extent::from_dims([5, 3, 2])).is_err());
    }

    #[test]
    fn test_value_at_absolute_index() {
        let mut volume = create_test_volume();
        let tissue = ndarray::Array3::from_shape_fn((2, 3, 4), |(k, j, i)| (i + 4 * j + 12 * k) as u8);
        volume.replace_array(DataArray::from_array(TISSUE, tissue)).unwrap();
        volume.set_extent(volume.extent().shifted([5, 0, 0])).unwrap();

        assert_eq!(volume.value(TISSUE, [5, 0, 0]).unwrap(), 0.0);
        assert_eq!(volume.value(TISSUE, [8, 2, 1]).unwrap(), 23.0);
        assert!(matches!(
            volume.value(TISSUE, [4, 0, 0]),
            Err(VolumeError::OutOfBounds(_))
        ));
        assert!(volume.value("Target", [5, 0, 0]).is_err());
    }

    #[test]
    fn test_cast_and_remove() {
        let mut volume = create_test_volume();
        volume.cast_array(TISSUE, DataType::U16).unwrap();
        assert_eq!(volume.require_array(TISSUE).unwrap().data_type(), DataType::U16);
        assert!(matches!(
            volume.cast_array("Target", DataType::F32),
            Err(VolumeError::MissingArray(_))
        ));

        assert!(volume.remove_array(SOURCE).is_some());
        assert!(volume.array(SOURCE).is_none());
    }
}
