//! Image append: combine several volumes into one
//!
//! Inputs are either pasted at their own extents (the output extent is the
//! union) or laid end to end along one axis. Every input must carry the same
//! arrays, and the output carries one array of each name.

use crate::array::{ArrayData, DataArray, Voxel};
use crate::error::{Result, VolumeError};
use crate::grid::ImageGrid;
use crate::types::Extent;
use crate::volume::ImageVolume;
use ndarray::{s, Array3, Zip};
use tracing::{debug, warn};

/// Append filter configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageAppend {
    preserve_extents: bool,
    axis: usize,
    use_transparency: bool,
    transparent_value: f64,
}

impl Default for ImageAppend {
    fn default() -> Self {
        Self {
            preserve_extents: true,
            axis: 0,
            use_transparency: true,
            transparent_value: 0.0,
        }
    }
}

impl ImageAppend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paste inputs at their own extents instead of stacking them
    pub fn preserve_extents(mut self, preserve: bool) -> Self {
        self.preserve_extents = preserve;
        self
    }

    /// Stacking axis, used when extents are not preserved
    pub fn axis(mut self, axis: usize) -> Self {
        self.axis = axis;
        self
    }

    pub fn use_transparency(mut self, enabled: bool) -> Self {
        self.use_transparency = enabled;
        self
    }

    /// Input voxels holding this value never overwrite pasted data
    pub fn transparent_value(mut self, value: f64) -> Self {
        self.transparent_value = value;
        self
    }

    /// Extent of the output and the extent each input is pasted at
    pub fn placements(&self, inputs: &[ImageVolume]) -> Result<(Extent, Vec<Extent>)> {
        let first = inputs
            .first()
            .ok_or_else(|| VolumeError::InvalidArgument("nothing to append".to_string()))?;

        let placed: Vec<Extent> = if self.preserve_extents {
            inputs.iter().map(|input| input.extent()).collect()
        } else {
            if self.axis > 2 {
                return Err(VolumeError::InvalidArgument(format!(
                    "append axis must be 0, 1 or 2, got {}",
                    self.axis
                )));
            }
            let mut next = first.extent().min(self.axis);
            inputs
                .iter()
                .map(|input| {
                    let extent = input.extent();
                    let mut delta = [0i64; 3];
                    delta[self.axis] = next - extent.min(self.axis);
                    next += extent.dims()[self.axis] as i64;
                    extent.shifted(delta)
                })
                .collect()
        };

        let output = placed
            .iter()
            .skip(1)
            .fold(placed[0], |acc, extent| acc.union(extent));
        Ok((output, placed))
    }

    /// Append the inputs in order
    pub fn execute(&self, inputs: &[ImageVolume]) -> Result<ImageVolume> {
        let (extent, placed) = self.placements(inputs)?;
        let first = &inputs[0];
        check_compatible(inputs)?;

        for (index, input) in inputs.iter().enumerate().skip(1) {
            let mismatch = (0..3).any(|axis| (input.spacing()[axis] - first.spacing()[axis]).abs() > 1e-9);
            if mismatch {
                warn!(
                    input = index,
                    spacing = ?input.spacing(),
                    reference = ?first.spacing(),
                    "spacing differs from the first input"
                );
            }
        }

        let grid = ImageGrid::new(first.origin(), first.spacing(), extent)?;
        let out_min = extent.min_corner();
        debug!(output = %grid.summary(), inputs = inputs.len(), "appending");

        let mut output = ImageVolume::new(grid);
        for array in first.arrays() {
            let mut data = ArrayData::zeros(array.data_type(), grid.shape());
            for (input, placement) in inputs.iter().zip(&placed) {
                // empty inputs take no part in the output extent
                if placement.is_empty() {
                    continue;
                }
                let min = placement.min_corner();
                let offset = [
                    (min[0] - out_min[0]) as usize,
                    (min[1] - out_min[1]) as usize,
                    (min[2] - out_min[2]) as usize,
                ];
                let source = input.require_array(array.name())?;
                self.paste(&mut data, source, offset)?;
            }
            output.add_array(DataArray::new(array.name(), data))?;
        }
        Ok(output)
    }

    fn paste(&self, target: &mut ArrayData, source: &DataArray, offset: [usize; 3]) -> Result<()> {
        let transparent = self.use_transparency.then_some(self.transparent_value);
        match (target, source.data()) {
            (ArrayData::U8(t), ArrayData::U8(s)) => paste_typed(t, s, offset, transparent),
            (ArrayData::I8(t), ArrayData::I8(s)) => paste_typed(t, s, offset, transparent),
            (ArrayData::U16(t), ArrayData::U16(s)) => paste_typed(t, s, offset, transparent),
            (ArrayData::I16(t), ArrayData::I16(s)) => paste_typed(t, s, offset, transparent),
            (ArrayData::U32(t), ArrayData::U32(s)) => paste_typed(t, s, offset, transparent),
            (ArrayData::I32(t), ArrayData::I32(s)) => paste_typed(t, s, offset, transparent),
            (ArrayData::F32(t), ArrayData::F32(s)) => paste_typed(t, s, offset, transparent),
            (ArrayData::F64(t), ArrayData::F64(s)) => paste_typed(t, s, offset, transparent),
            (t, s) => {
                return Err(VolumeError::TypeMismatch {
                    array: source.name().to_string(),
                    expected: t.data_type(),
                    found: s.data_type(),
                })
            }
        }
        Ok(())
    }
}

/// Every input must carry the first input's arrays, with the same types, and nothing else
fn check_compatible(inputs: &[ImageVolume]) -> Result<()> {
    let Some((first, rest)) = inputs.split_first() else {
        return Ok(());
    };
    for input in rest {
        for array in first.arrays() {
            let other = input.require_array(array.name())?;
            if other.data_type() != array.data_type() {
                return Err(VolumeError::TypeMismatch {
                    array: array.name().to_string(),
                    expected: array.data_type(),
                    found: other.data_type(),
                });
            }
        }
        if let Some(extra) = input.arrays().iter().find(|a| first.array(a.name()).is_none()) {
            return Err(VolumeError::MissingArray(extra.name().to_string()));
        }
    }
    Ok(())
}

fn paste_typed<T: Voxel>(
    target: &mut Array3<T>,
    source: &Array3<T>,
    offset: [usize; 3],
    transparent: Option<f64>,
) {
    let [oi, oj, ok] = offset;
    let (nz, ny, nx) = source.dim();
    let mut region = target.slice_mut(s![ok..ok + nz, oj..oj + ny, oi..oi + nx]);
    match transparent {
        None => region.assign(source),
        Some(value) => {
            let transparent = T::from_f64(value);
            Zip::from(&mut region).and(source).for_each(|t, &s| {
                if s != transparent {
                    *t = s;
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::{SOURCE, TISSUE};
    use crate::types::DataType;

    fn create_block(origin: [f64; 3], extent: Extent, source: f32, tissue: u8) -> ImageVolume {
        let grid = ImageGrid::new(origin, [1.0; 3], extent).unwrap();
        let shape = grid.shape();
        let mut volume = ImageVolume::new(grid);
        volume
            .add_array(DataArray::from_array(SOURCE, Array3::from_elem(shape, source)))
            .unwrap();
        volume
            .add_array(DataArray::from_array(TISSUE, Array3::from_elem(shape, tissue)))
            .unwrap();
        volume
    }

    #[test]
    fn test_preserve_extents_union() {
        let a = create_block([0.0; 3], Extent::new([0, 1, 0, 1, 0, 0]), 1.0, 1);
        let b = create_block([5.0; 3], Extent::new([3, 4, 0, 1, 0, 0]), 2.0, 2);
        let output = ImageAppend::new().execute(&[a, b]).unwrap();

        assert_eq!(output.extent(), Extent::new([0, 4, 0, 1, 0, 0]));
        // origin and spacing come from the first input
        assert_eq!(output.origin(), [0.0; 3]);

        let tissue = output.array(TISSUE).unwrap();
        assert_eq!(tissue.value_at([0, 0, 0]), Some(1.0));
        // the gap between the inputs stays empty
        assert_eq!(tissue.value_at([2, 1, 0]), Some(0.0));
        assert_eq!(tissue.value_at([4, 1, 0]), Some(2.0));
        assert_eq!(output.array(SOURCE).unwrap().data_type(), DataType::F32);
    }

    #[test]
    fn test_transparency_keeps_earlier_data() {
        let a = create_block([0.0; 3], Extent::new([0, 3, 0, 0, 0, 0]), 1.0, 1);
        let mut b = create_block([0.0; 3], Extent::new([2, 5, 0, 0, 0, 0]), 0.0, 3);
        // second input: tissue 3 on its first voxel only
        b.replace_array(DataArray::from_array(
            TISSUE,
            Array3::from_shape_fn((1, 1, 4), |(_, _, i)| if i == 0 { 3u8 } else { 0 }),
        ))
        .unwrap();

        let output = ImageAppend::new().execute(&[a.clone(), b.clone()]).unwrap();
        let tissue = output.array(TISSUE).unwrap();
        let row: Vec<f64> = (0..6).map(|i| tissue.value_at([i, 0, 0]).unwrap()).collect();
        assert_eq!(row, vec![1.0, 1.0, 3.0, 1.0, 0.0, 0.0]);
        // all-zero source never overwrites
        let source = output.array(SOURCE).unwrap();
        assert_eq!(source.value_at([3, 0, 0]), Some(1.0));

        let opaque = ImageAppend::new()
            .use_transparency(false)
            .execute(&[a, b])
            .unwrap();
        let tissue = opaque.array(TISSUE).unwrap();
        assert_eq!(tissue.value_at([3, 0, 0]), Some(0.0));
    }

    #[test]
    fn test_append_along_axis() {
        let a = create_block([0.0; 3], Extent::new([0, 1, 0, 1, 2, 2]), 1.0, 1);
        let b = create_block([0.0; 3], Extent::new([0, 1, 0, 1, 0, 1]), 2.0, 2);
        let append = ImageAppend::new().preserve_extents(false).axis(2);

        let (extent, placed) = append.placements(&[a.clone(), b.clone()]).unwrap();
        assert_eq!(extent, Extent::new([0, 1, 0, 1, 2, 4]));
        assert_eq!(placed[1], Extent::new([0, 1, 0, 1, 3, 4]));

        let output = append.execute(&[a, b]).unwrap();
        let tissue = output.array(TISSUE).unwrap();
        assert_eq!(tissue.dims(), [2, 2, 3]);
        assert_eq!(tissue.value_at([1, 1, 0]), Some(1.0));
        assert_eq!(tissue.value_at([1, 1, 1]), Some(2.0));
        assert_eq!(tissue.value_at([0, 0, 2]), Some(2.0));

        assert!(ImageAppend::new()
            .preserve_extents(false)
            .axis(3)
            .placements(&output_pair())
            .is_err());
    }

    fn output_pair() -> Vec<ImageVolume> {
        vec![
            create_block([0.0; 3], Extent::from_dims([1, 1, 1]), 1.0, 1),
            create_block([0.0; 3], Extent::from_dims([1, 1, 1]), 1.0, 1),
        ]
    }

    #[test]
    fn test_incompatible_inputs() {
        assert!(ImageAppend::new().execute(&[]).is_err());

        let mut inputs = output_pair();
        inputs[1].cast_array(TISSUE, DataType::U16).unwrap();
        assert!(matches!(
            ImageAppend::new().execute(&inputs),
            Err(VolumeError::TypeMismatch { .. })
        ));

        let mut inputs = output_pair();
        inputs[1].remove_array(SOURCE);
        assert!(matches!(
            ImageAppend::new().execute(&inputs),
            Err(VolumeError::MissingArray(name)) if name == SOURCE
        ));
    }

    #[test]
    fn test_empty_input_is_skipped() {
        let a = create_block([0.0; 3], Extent::new([0, 1, 0, 1, 0, 0]), 1.0, 1);
        let empty = create_block([0.0; 3], Extent::new([10, 9, 0, 1, 0, 0]), 2.0, 2);

        let output = ImageAppend::new().execute(&[a.clone(), empty.clone()]).unwrap();
        assert_eq!(output.extent(), a.extent());
        assert_eq!(output.array(TISSUE).unwrap().value_at([1, 1, 0]), Some(1.0));

        let stacked = ImageAppend::new()
            .preserve_extents(false)
            .execute(&[empty, a.clone()])
            .unwrap();
        assert_eq!(stacked.grid().dims(), [2, 2, 1]);
        assert_eq!(stacked.array(SOURCE).unwrap().value_at([0, 0, 0]), Some(1.0));
    }

    #[test]
    fn test_single_input_is_copied() {
        let inputs = output_pair();
        let output = ImageAppend::new().execute(&inputs[..1]).unwrap();
        assert_eq!(output, inputs[0]);
    }
}
