//! volstack - concatenate and resample segmentation project volumes
//!
//! A project volume is a regular 3D grid carrying named per-voxel arrays:
//! `Source` and `Target` intensities and `Tissue` labels. This crate reads
//! and writes such volumes as stores (a directory with `volume.json` and one
//! compressed blob per array) and provides the two workflows built on them.
//!
//! # Features
//!
//! - Append several projects into one, at their own extents or stacked along an axis
//! - Resample a project to a new spacing, optionally under a rigid transform
//! - Nearest, linear and cubic interpolation, labels always nearest
//! - Multiple compression algorithms (Deflate, Zstd, RLE)
//! - Async store I/O, rayon-parallel resampling
//!
//! # Example
//!
//! ```rust,no_run
//! use volstack::{resample_project, ResampleOptions, Vec3};
//!
//! # async fn example() -> volstack::Result<()> {
//! let options = ResampleOptions::new("/data/head", "/data/head-2mm").with_spacing(Vec3::splat(2.0));
//! let volume = resample_project(&options).await?;
//! println!("{}", volume.grid().summary());
//! # Ok(())
//! # }
//! ```

pub mod append;
pub mod array;
pub mod compression;
pub mod error;
pub mod grid;
pub mod interpolate;
pub mod io;
pub mod metadata;
pub mod pipeline;
pub mod reslice;
pub mod store;
pub mod transform;
pub mod types;
pub mod utils;
pub mod volume;

// Re-exports
pub use append::ImageAppend;
pub use array::{ArrayData, ChannelRole, DataArray, Voxel, SOURCE, TARGET, TISSUE};
pub use compression::{CompressionLevel, CompressionMethod, Compressor};
pub use error::{Result, VolumeError};
pub use grid::{Bounds, ImageGrid};
pub use io::{IOManager, StorageBackend};
pub use metadata::StoreMetadata;
pub use pipeline::{append_projects, describe_store, resample_project, AppendOptions, ResampleOptions};
pub use reslice::Reslicer;
pub use store::{ArraySelection, VolumeStore};
pub use transform::{ResliceTransform, RigidParams};
pub use types::{DataType, Extent, Interpolation, Vec3};
pub use volume::ImageVolume;

/// Version of the volstack implementation
pub const VOLSTACK_VERSION: &str = env!("CARGO_PKG_VERSION");
