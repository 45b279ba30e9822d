//! Project volume store - main API for reading/writing volumes on disk
//!
//! A store is a directory holding `volume.json` (the [`StoreMetadata`]) and
//! one compressed blob per array under `arrays/`.

use crate::array::{DataArray, SOURCE, TARGET, TISSUE};
use crate::compression::{get_compressor, CompressionLevel, CompressionMethod};
use crate::error::{Result, VolumeError};
use crate::grid::ImageGrid;
use crate::io::{create_io_manager, IOManager};
use crate::metadata::{ArrayDescriptor, StoreMetadata};
use crate::utils::{array_path, calculate_checksum, format_bytes, verify_checksum, METADATA_PATH};
use crate::volume::ImageVolume;
use futures::future::try_join_all;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

/// Which arrays to load from a store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArraySelection {
    statuses: BTreeMap<String, bool>,
    default_enabled: bool,
}

impl ArraySelection {
    /// Every stored array
    pub fn all() -> Self {
        Self {
            statuses: BTreeMap::new(),
            default_enabled: true,
        }
    }

    /// Exactly the named arrays
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            statuses: names.into_iter().map(|n| (n.into(), true)).collect(),
            default_enabled: false,
        }
    }

    pub fn enable(mut self, name: impl Into<String>) -> Self {
        self.statuses.insert(name.into(), true);
        self
    }

    pub fn disable(mut self, name: impl Into<String>) -> Self {
        self.statuses.insert(name.into(), false);
        self
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.statuses
            .get(name)
            .copied()
            .unwrap_or(self.default_enabled)
    }

    /// Names switched on explicitly
    pub fn requested(&self) -> impl Iterator<Item = &str> {
        self.statuses
            .iter()
            .filter(|(_, &enabled)| enabled)
            .map(|(name, _)| name.as_str())
    }
}

impl Default for ArraySelection {
    /// Source and Tissue on, Target off
    fn default() -> Self {
        Self::only([SOURCE, TISSUE]).disable(TARGET)
    }
}

impl FromStr for ArraySelection {
    type Err = VolumeError;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(Self::all());
        }
        let names: Vec<&str> = s
            .split(',')
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .collect();
        if names.is_empty() {
            return Err(VolumeError::InvalidArgument(
                "array selection is empty".to_string(),
            ));
        }
        Ok(Self::only(names))
    }
}

/// Main interface for a stored project volume
pub struct VolumeStore {
    /// Store metadata
    metadata: Arc<RwLock<StoreMetadata>>,

    /// I/O manager for storage operations
    io_manager: Arc<Box<dyn IOManager>>,

    /// Level used when writing arrays
    level: CompressionLevel,
}

impl VolumeStore {
    /// Open an existing store
    pub async fn open(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        let io_manager = create_io_manager(&url).await?;
        Self::open_with(io_manager).await
    }

    /// Open a store through an existing I/O manager
    pub async fn open_with(io_manager: Box<dyn IOManager>) -> Result<Self> {
        let metadata_bytes = io_manager.read(METADATA_PATH).await?;
        let metadata: StoreMetadata = serde_json::from_slice(&metadata_bytes)
            .map_err(|e| VolumeError::Metadata(e.to_string()))?;
        metadata.validate()?;

        Ok(Self {
            metadata: Arc::new(RwLock::new(metadata)),
            io_manager: Arc::new(io_manager),
            level: CompressionLevel::default(),
        })
    }

    /// Create a new, empty store for `grid`, discarding any previous content
    pub async fn create(url: impl Into<String>, grid: ImageGrid) -> Result<Self> {
        let url = url.into();
        let io_manager = create_io_manager(&url).await?;
        Self::create_with(io_manager, grid).await
    }

    /// Create a store through an existing I/O manager
    ///
    /// Only blobs recorded in an existing `volume.json` are removed; other
    /// files under `arrays/` are left alone.
    pub async fn create_with(io_manager: Box<dyn IOManager>, grid: ImageGrid) -> Result<Self> {
        for stale in Self::recorded_blobs(io_manager.as_ref()).await? {
            if io_manager.exists(&stale).await? {
                debug!(blob = %stale, "removing stale array blob");
                io_manager.delete(&stale).await?;
            }
        }

        let store = Self {
            metadata: Arc::new(RwLock::new(StoreMetadata::new(grid))),
            io_manager: Arc::new(io_manager),
            level: CompressionLevel::default(),
        };
        store.persist_metadata().await?;
        Ok(store)
    }

    /// Blob paths of a previous store at the same location
    async fn recorded_blobs(io_manager: &dyn IOManager) -> Result<Vec<String>> {
        if !io_manager.exists(METADATA_PATH).await? {
            return Ok(Vec::new());
        }
        let bytes = io_manager.read(METADATA_PATH).await?;
        let previous: StoreMetadata = match serde_json::from_slice(&bytes) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(error = %e, "ignoring unreadable {}", METADATA_PATH);
                return Ok(Vec::new());
            }
        };
        // only paths this crate would have written
        Ok(previous
            .arrays
            .iter()
            .filter(|d| array_path(&d.name).is_ok_and(|path| path == d.path))
            .map(|d| d.path.clone())
            .collect())
    }

    /// Set the compression level used by subsequent writes
    pub fn with_level(mut self, level: CompressionLevel) -> Self {
        self.level = level;
        self
    }

    /// Get the store metadata
    pub fn metadata(&self) -> StoreMetadata {
        self.metadata.read().clone()
    }

    /// Get the volume grid
    pub fn grid(&self) -> ImageGrid {
        self.metadata.read().grid
    }

    /// Names of the stored arrays, in storage order
    pub fn array_names(&self) -> Vec<String> {
        self.metadata
            .read()
            .arrays
            .iter()
            .map(|d| d.name.clone())
            .collect()
    }

    /// Read one array
    pub async fn read_array(&self, name: &str) -> Result<DataArray> {
        let (descriptor, grid) = {
            let metadata = self.metadata.read();
            let descriptor = metadata
                .descriptor(name)
                .cloned()
                .ok_or_else(|| VolumeError::MissingArray(name.to_string()))?;
            (descriptor, metadata.grid)
        };

        let compressed = self.io_manager.read(&descriptor.path).await?;
        let compressor = get_compressor(descriptor.compression);
        let bytes = compressor.decompress(&compressed, Some(descriptor.uncompressed_size))?;

        if !verify_checksum(&bytes, descriptor.checksum) {
            return Err(VolumeError::ChecksumMismatch {
                array: name.to_string(),
            });
        }

        debug!(
            array = name,
            data_type = %descriptor.data_type,
            size = %format_bytes(bytes.len()),
            "read array"
        );
        DataArray::from_bytes(name, descriptor.data_type, grid.shape(), &bytes)
    }

    /// Read the selected arrays concurrently into a volume
    ///
    /// Requested arrays absent from the store are skipped with a warning.
    pub async fn read_volume(&self, selection: &ArraySelection) -> Result<ImageVolume> {
        let stored = self.array_names();

        for requested in selection.requested() {
            if !stored.iter().any(|name| name == requested) {
                warn!(array = requested, "selected array not present in store");
            }
        }

        let names: Vec<&String> = stored
            .iter()
            .filter(|name| selection.is_enabled(name))
            .collect();
        let arrays = try_join_all(names.iter().map(|name| self.read_array(name))).await?;

        let mut volume = ImageVolume::new(self.grid());
        for array in arrays {
            volume.add_array(array)?;
        }
        Ok(volume)
    }

    /// Compress and write one array, then update `volume.json`
    pub async fn write_array(&self, array: &DataArray, method: CompressionMethod) -> Result<()> {
        let descriptor = self.write_blob(array, method).await?;
        self.metadata.write().upsert_descriptor(descriptor);
        self.persist_metadata().await
    }

    /// Write every array of a volume whose grid matches the store's
    pub async fn write_volume(&self, volume: &ImageVolume, method: CompressionMethod) -> Result<()> {
        let grid = self.grid();
        if !grid.same_geometry(volume.grid()) {
            return Err(VolumeError::GridMismatch(format!(
                "volume grid ({}) differs from store grid ({})",
                volume.grid().summary(),
                grid.summary()
            )));
        }

        let descriptors = try_join_all(
            volume
                .arrays()
                .iter()
                .map(|array| self.write_blob(array, method)),
        )
        .await?;

        {
            let mut metadata = self.metadata.write();
            for descriptor in descriptors {
                metadata.upsert_descriptor(descriptor);
            }
        }
        self.persist_metadata().await
    }

    /// Create a store at `url` holding `volume`
    pub async fn save(
        url: impl Into<String>,
        volume: &ImageVolume,
        method: CompressionMethod,
    ) -> Result<Self> {
        let store = Self::create(url, *volume.grid()).await?;
        store.write_volume(volume, method).await?;
        Ok(store)
    }

    /// Open the store at `url` and read the selected arrays
    pub async fn load(url: impl Into<String>, selection: &ArraySelection) -> Result<ImageVolume> {
        Self::open(url).await?.read_volume(selection).await
    }

    async fn write_blob(&self, array: &DataArray, method: CompressionMethod) -> Result<ArrayDescriptor> {
        let grid = self.grid();
        if array.shape() != grid.shape() {
            return Err(VolumeError::InvalidDimensions(format!(
                "array '{}' has shape {:?}, store grid expects {:?}",
                array.name(),
                array.shape(),
                grid.shape()
            )));
        }

        let path = array_path(array.name())?;
        let bytes = array.to_bytes();
        let compressed = get_compressor(method).compress(&bytes, self.level)?;
        self.io_manager.write(&path, &compressed).await?;

        debug!(
            array = array.name(),
            compression = %method,
            raw = %format_bytes(bytes.len()),
            stored = %format_bytes(compressed.len()),
            "wrote array"
        );

        Ok(ArrayDescriptor {
            name: array.name().to_string(),
            data_type: array.data_type(),
            compression: method,
            path,
            uncompressed_size: bytes.len(),
            compressed_size: compressed.len(),
            checksum: calculate_checksum(&bytes),
            value_range: array.value_range(),
        })
    }

    async fn persist_metadata(&self) -> Result<()> {
        let metadata_json = {
            let mut metadata = self.metadata.write();
            metadata.touch();
            serde_json::to_vec_pretty(&*metadata).map_err(|e| VolumeError::Metadata(e.to_string()))?
        };
        self.io_manager.write(METADATA_PATH, &metadata_json).await
    }

    /// Get statistics about the store
    pub fn stats(&self) -> StoreStats {
        let metadata = self.metadata.read();
        StoreStats {
            dims: metadata.grid.dims(),
            total_voxels: metadata.grid.num_points(),
            arrays: metadata
                .arrays
                .iter()
                .map(|d| format!("{} ({}, {})", d.name, d.data_type, d.compression))
                .collect(),
            uncompressed_size: metadata.arrays.iter().map(|d| d.uncompressed_size).sum(),
            stored_size: metadata.arrays.iter().map(|d| d.compressed_size).sum(),
        }
    }
}

/// Store statistics
#[derive(Debug, Clone)]
pub struct StoreStats {
    pub dims: [usize; 3],
    pub total_voxels: usize,
    pub arrays: Vec<String>,
    pub uncompressed_size: usize,
    pub stored_size: usize,
}

impl StoreStats {
    pub fn summary(&self) -> String {
        format!(
            "{} x {} x {} ({} voxels), arrays [{}], {} stored / {} uncompressed",
            self.dims[0],
            self.dims[1],
            self.dims[2],
            self.total_voxels,
            self.arrays.join(", "),
            format_bytes(self.stored_size),
            format_bytes(self.uncompressed_size),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryIOManager;
    use crate::types::{DataType, Extent};
    use ndarray::Array3;
    use tempfile::TempDir;

    fn create_test_volume() -> ImageVolume {
        let grid = ImageGrid::new([1.0, 2.0, 3.0], [0.5, 0.5, 1.5], Extent::new([0, 3, 0, 2, 5, 6])).unwrap();
        let mut volume = ImageVolume::new(grid);
        let source = Array3::from_shape_fn((2, 3, 4), |(k, j, i)| (i + 10 * j + 100 * k) as f32);
        let target = Array3::from_elem((2, 3, 4), 1.0f32);
        let tissue = Array3::from_shape_fn((2, 3, 4), |(k, _, i)| (k * 2 + i % 2) as u8);
        volume.add_array(DataArray::from_array(SOURCE, source)).unwrap();
        volume.add_array(DataArray::from_array(TARGET, target)).unwrap();
        volume.add_array(DataArray::from_array(TISSUE, tissue)).unwrap();
        volume
    }

    #[test]
    fn test_default_selection() {
        let selection = ArraySelection::default();
        assert!(selection.is_enabled(SOURCE));
        assert!(!selection.is_enabled(TARGET));
        assert!(selection.is_enabled(TISSUE));
        assert!(!selection.is_enabled("Other"));
        assert_eq!(selection.requested().collect::<Vec<_>>(), vec![SOURCE, TISSUE]);

        assert!(ArraySelection::all().is_enabled("Other"));
        let parsed: ArraySelection = "Target, Tissue".parse().unwrap();
        assert!(parsed.is_enabled(TARGET));
        assert!(!parsed.is_enabled(SOURCE));
        assert!(",".parse::<ArraySelection>().is_err());
    }

    #[tokio::test]
    async fn test_save_and_load_volume() {
        let temp_dir = TempDir::new().unwrap();
        let url = temp_dir.path().join("project").to_str().unwrap().to_string();
        let volume = create_test_volume();

        VolumeStore::save(url.as_str(), &volume, CompressionMethod::Zstd)
            .await
            .unwrap();

        let store = VolumeStore::open(url.as_str()).await.unwrap();
        assert_eq!(store.array_names(), vec![SOURCE, TARGET, TISSUE]);
        assert!(store.grid().same_geometry(volume.grid()));

        let loaded = store.read_volume(&ArraySelection::default()).await.unwrap();
        assert_eq!(loaded.array_names(), vec![SOURCE, TISSUE]);
        assert_eq!(loaded.array(SOURCE), volume.array(SOURCE));
        assert_eq!(loaded.array(TISSUE), volume.array(TISSUE));

        let stats = store.stats();
        assert_eq!(stats.total_voxels, 24);
        assert_eq!(stats.uncompressed_size, 24 * 4 + 24 * 4 + 24);
    }

    #[tokio::test]
    async fn test_write_array_updates_metadata() {
        let volume = create_test_volume();
        let store = VolumeStore::create_with(Box::new(MemoryIOManager::new()), *volume.grid())
            .await
            .unwrap();
        let tissue = volume.array(TISSUE).unwrap();

        store.write_array(tissue, CompressionMethod::Rle).await.unwrap();
        store
            .write_array(&tissue.cast(DataType::U16), CompressionMethod::Deflate)
            .await
            .unwrap();

        let metadata = store.metadata();
        assert_eq!(metadata.arrays.len(), 1);
        let descriptor = metadata.descriptor(TISSUE).unwrap();
        assert_eq!(descriptor.data_type, DataType::U16);
        assert_eq!(descriptor.compression, CompressionMethod::Deflate);
        assert_eq!(descriptor.uncompressed_size, 48);

        let read = store.read_array(TISSUE).await.unwrap();
        assert_eq!(read, tissue.cast(DataType::U16));
        assert!(matches!(
            store.read_array(SOURCE).await,
            Err(VolumeError::MissingArray(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_mismatched_grid() {
        let volume = create_test_volume();
        let mut grid = *volume.grid();
        grid.origin = [0.0; 3];
        let store = VolumeStore::create_with(Box::new(MemoryIOManager::new()), grid)
            .await
            .unwrap();
        assert!(matches!(
            store.write_volume(&volume, CompressionMethod::None).await,
            Err(VolumeError::GridMismatch(_))
        ));

        let wrong = DataArray::zeros("Small", DataType::U8, (1, 1, 1));
        assert!(store.write_array(&wrong, CompressionMethod::None).await.is_err());
    }

    #[tokio::test]
    async fn test_detects_corrupt_blob() {
        let temp_dir = TempDir::new().unwrap();
        let url = temp_dir.path().to_str().unwrap().to_string();
        let volume = create_test_volume();
        VolumeStore::save(url.as_str(), &volume, CompressionMethod::None)
            .await
            .unwrap();

        let blob = temp_dir.path().join("arrays").join("Tissue.raw");
        let mut bytes = std::fs::read(&blob).unwrap();
        bytes[0] ^= 0xFF;
        std::fs::write(&blob, bytes).unwrap();

        let store = VolumeStore::open(url.as_str()).await.unwrap();
        assert!(matches!(
            store.read_array(TISSUE).await,
            Err(VolumeError::ChecksumMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_create_discards_previous_arrays() {
        let temp_dir = TempDir::new().unwrap();
        let url = temp_dir.path().to_str().unwrap().to_string();
        let volume = create_test_volume();
        VolumeStore::save(url.as_str(), &volume, CompressionMethod::Zstd)
            .await
            .unwrap();

        let store = VolumeStore::create(url.as_str(), *volume.grid()).await.unwrap();
        assert!(store.array_names().is_empty());
        assert!(!temp_dir.path().join("arrays").join("Source.raw").exists());
    }

    #[tokio::test]
    async fn test_create_keeps_unrelated_files() {
        let temp_dir = TempDir::new().unwrap();
        let arrays = temp_dir.path().join("arrays");
        std::fs::create_dir_all(arrays.join("nested")).unwrap();
        std::fs::write(arrays.join("notes.txt"), b"keep me").unwrap();
        std::fs::write(arrays.join("Other.raw"), b"not ours").unwrap();

        let url = temp_dir.path().to_str().unwrap().to_string();
        let volume = create_test_volume();
        VolumeStore::save(url.as_str(), &volume, CompressionMethod::Rle)
            .await
            .unwrap();
        // a second create over a real store drops its own blobs only
        VolumeStore::create(url.as_str(), *volume.grid()).await.unwrap();

        assert!(!arrays.join("Tissue.raw").exists());
        assert_eq!(std::fs::read(arrays.join("notes.txt")).unwrap(), b"keep me");
        assert_eq!(std::fs::read(arrays.join("Other.raw")).unwrap(), b"not ours");
        assert!(arrays.join("nested").is_dir());
    }
}
