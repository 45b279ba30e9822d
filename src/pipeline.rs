//! The two project workflows: append several projects, resample one project
//!
//! Both read stores, run the in-memory filters from [`crate::append`] and
//! [`crate::reslice`], and write the result to a new store.

use crate::append::ImageAppend;
use crate::array::ChannelRole;
use crate::compression::CompressionMethod;
use crate::error::{Result, VolumeError};
use crate::reslice::Reslicer;
use crate::store::{ArraySelection, VolumeStore};
use crate::transform::{ResliceTransform, RigidParams};
use crate::types::{DataType, Interpolation, Vec3};
use crate::utils::format_bytes;
use crate::volume::ImageVolume;
use futures::future::try_join_all;
use rayon::prelude::*;
use std::fmt::Write as _;
use tracing::{debug, info};

/// Options of [`append_projects`]
#[derive(Debug, Clone, PartialEq)]
pub struct AppendOptions {
    /// Input stores, appended in this order
    pub inputs: Vec<String>,
    pub output: String,
    /// Move every input onto the first input's origin, re-indexing its extent
    pub shift: bool,
    pub preserve_extents: bool,
    /// Stacking axis when extents are not preserved
    pub axis: usize,
    pub selection: ArraySelection,
    pub compression: CompressionMethod,
}

impl Default for AppendOptions {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            output: String::new(),
            shift: false,
            preserve_extents: true,
            axis: 0,
            selection: ArraySelection::default(),
            compression: CompressionMethod::default(),
        }
    }
}

impl AppendOptions {
    pub fn new<I, S>(inputs: I, output: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            output: output.into(),
            ..Default::default()
        }
    }

    pub fn with_shift(mut self, shift: bool) -> Self {
        self.shift = shift;
        self
    }

    pub fn with_preserve_extents(mut self, preserve: bool) -> Self {
        self.preserve_extents = preserve;
        self
    }

    pub fn with_axis(mut self, axis: usize) -> Self {
        self.axis = axis;
        self
    }

    pub fn with_selection(mut self, selection: ArraySelection) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_compression(mut self, compression: CompressionMethod) -> Self {
        self.compression = compression;
        self
    }
}

/// Options of [`resample_project`]
#[derive(Debug, Clone, PartialEq)]
pub struct ResampleOptions {
    pub input: String,
    pub output: String,
    pub spacing: Vec3,
    /// Rigid motion applied while resampling, none when unset
    pub rigid: Option<RigidParams>,
    /// Fit the output to the transformed input
    pub crop: bool,
    /// Kernel for intensity arrays; labels always use nearest neighbour
    pub intensity_interpolation: Interpolation,
    pub selection: ArraySelection,
    pub compression: CompressionMethod,
}

impl Default for ResampleOptions {
    fn default() -> Self {
        Self {
            input: String::new(),
            output: String::new(),
            spacing: Vec3::splat(1.0),
            rigid: None,
            crop: false,
            intensity_interpolation: Interpolation::Cubic,
            selection: ArraySelection::default(),
            compression: CompressionMethod::default(),
        }
    }
}

impl ResampleOptions {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            ..Default::default()
        }
    }

    pub fn with_spacing(mut self, spacing: Vec3) -> Self {
        self.spacing = spacing;
        self
    }

    pub fn with_rigid(mut self, rigid: RigidParams) -> Self {
        self.rigid = Some(rigid);
        self
    }

    pub fn with_crop(mut self, crop: bool) -> Self {
        self.crop = crop;
        self
    }

    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.intensity_interpolation = interpolation;
        self
    }

    pub fn with_selection(mut self, selection: ArraySelection) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_compression(mut self, compression: CompressionMethod) -> Self {
        self.compression = compression;
        self
    }
}

/// Re-index a volume onto `reference`, keeping its voxels in place
///
/// The extent moves by the whole number of voxels between the two origins,
/// truncated toward zero.
pub fn shift_to_origin(volume: &mut ImageVolume, reference: [f64; 3]) -> Result<()> {
    let origin = volume.origin();
    let spacing = volume.spacing();
    let delta = [0, 1, 2].map(|axis| ((origin[axis] - reference[axis]) / spacing[axis]).trunc() as i64);

    volume.set_origin(reference);
    volume.set_extent(volume.extent().shifted(delta))?;
    info!(
        origin = ?reference,
        delta = ?delta,
        extent = %volume.extent(),
        "shifted onto reference origin"
    );
    Ok(())
}

/// Concatenate several stored projects into one and write it
pub async fn append_projects(options: &AppendOptions) -> Result<ImageVolume> {
    if options.inputs.len() < 2 {
        return Err(VolumeError::InvalidArgument(format!(
            "append needs at least two inputs, got {}",
            options.inputs.len()
        )));
    }
    info!(inputs = options.inputs.len(), output = %options.output, "appending projects");

    let mut volumes = try_join_all(
        options
            .inputs
            .iter()
            .map(|url| VolumeStore::load(url.as_str(), &options.selection)),
    )
    .await?;

    let mut reference = None;
    for (index, (url, volume)) in options.inputs.iter().zip(volumes.iter_mut()).enumerate() {
        info!(
            index,
            input = %url,
            origin = ?volume.origin(),
            spacing = ?volume.spacing(),
            extent = %volume.extent(),
            arrays = ?volume.array_names(),
            "read input"
        );

        if options.shift {
            match reference {
                None => {
                    info!(origin = ?volume.origin(), "reference origin");
                    reference = Some(volume.origin());
                }
                Some(origin) => shift_to_origin(volume, origin)?,
            }
        }
    }

    let append = ImageAppend::new()
        .preserve_extents(options.preserve_extents)
        .axis(options.axis);
    let output = append.execute(&volumes)?;

    info!(output = %output.grid().summary(), "writing appended project");
    VolumeStore::save(options.output.as_str(), &output, options.compression).await?;
    Ok(output)
}

/// Resample one stored project and write it
///
/// Intensity arrays are converted to f32 and resampled with the requested
/// kernel; label arrays keep their type and use nearest neighbour.
pub async fn resample_project(options: &ResampleOptions) -> Result<ImageVolume> {
    let mut volume = VolumeStore::load(options.input.as_str(), &options.selection).await?;
    info!(
        input = %options.input,
        origin = ?volume.origin(),
        spacing = ?volume.spacing(),
        extent = %volume.extent(),
        "read input"
    );

    let names: Vec<String> = volume.array_names().into_iter().map(String::from).collect();
    if names.is_empty() {
        return Err(VolumeError::InvalidArgument(format!(
            "no selected arrays found in '{}'",
            options.input
        )));
    }

    let transform = match &options.rigid {
        Some(rigid) => {
            info!(
                translation = %rigid.translation,
                rotation_angles = %rigid.rotation_angles,
                rotation_center = %rigid.rotation_center,
                "rigid transform"
            );
            ResliceTransform::rigid(rigid)
        }
        None => ResliceTransform::identity(),
    };
    info!(spacing = %options.spacing, crop = options.crop, "resampling");

    let reslicer = Reslicer::new()
        .output_spacing(options.spacing.as_array())
        .transform(transform)
        .auto_crop(options.crop);

    let mut kernels = Vec::with_capacity(names.len());
    for name in &names {
        let data_type = volume.require_array(name)?.data_type();
        let kernel = match ChannelRole::for_array(name, data_type) {
            ChannelRole::Intensity => {
                if data_type != DataType::F32 {
                    debug!(array = %name, from = %data_type, "casting to f32");
                    volume.cast_array(name, DataType::F32)?;
                }
                options.intensity_interpolation
            }
            ChannelRole::Labels => Interpolation::NearestNeighbor,
        };
        info!(array = %name, kernel = %kernel, "resampling array");
        kernels.push(kernel);
    }

    let parts = names
        .par_iter()
        .zip(kernels)
        .map(|(name, kernel)| reslicer.reslice_volume(&volume, name, kernel))
        .collect::<Result<Vec<_>>>()?;

    let grid = *parts[0].grid();
    let mut output = ImageVolume::new(grid);
    for (name, mut part) in names.iter().zip(parts) {
        if !part.grid().same_geometry(&grid) {
            return Err(VolumeError::GridMismatch(format!(
                "'{}' resampled to ({}), expected ({})",
                name,
                part.grid().summary(),
                grid.summary()
            )));
        }
        let array = part
            .remove_array(name)
            .ok_or_else(|| VolumeError::MissingArray(name.clone()))?;
        output.add_array(array)?;
    }

    info!(output = %grid.summary(), "writing resampled project");
    VolumeStore::save(options.output.as_str(), &output, options.compression).await?;
    Ok(output)
}

/// Human-readable description of a stored project
pub async fn describe_store(url: &str) -> Result<String> {
    let store = VolumeStore::open(url).await?;
    let metadata = store.metadata();
    let grid = metadata.grid;

    let mut text = String::new();
    // writing to a String cannot fail
    let _ = writeln!(text, "store:    {} (format {})", url, metadata.version);
    let _ = writeln!(text, "origin:   {:?}", grid.origin);
    let _ = writeln!(text, "spacing:  {:?}", grid.spacing);
    let _ = writeln!(text, "extent:   {}", grid.extent);
    let [nx, ny, nz] = grid.dims();
    let _ = writeln!(text, "voxels:   {} x {} x {} = {}", nx, ny, nz, grid.num_points());
    let _ = writeln!(text, "modified: {}", metadata.modified_at.to_rfc3339());
    let _ = writeln!(text, "arrays:");
    for descriptor in &metadata.arrays {
        let range = descriptor
            .value_range
            .map(|r| format!("[{}, {}]", r.min, r.max))
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            text,
            "  {:<8} {:<4} {:<8} {:>10} -> {:>10} ({:.1}x) range {}",
            descriptor.name,
            descriptor.data_type,
            descriptor.compression,
            format_bytes(descriptor.uncompressed_size),
            format_bytes(descriptor.compressed_size),
            descriptor.compression_ratio(),
            range
        );
    }
    for (key, value) in &metadata.custom_metadata {
        let _ = writeln!(text, "  {} = {}", key, value);
    }
    Ok(text)
}
