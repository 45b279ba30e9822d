//! Store metadata structures

use crate::compression::CompressionMethod;
use crate::error::{Result, VolumeError};
use crate::grid::ImageGrid;
use crate::types::{DataType, ValueRange};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Store format version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreVersion {
    pub major: u16,
    pub minor: u16,
}

impl StoreVersion {
    pub const CURRENT: Self = Self { major: 1, minor: 0 };

    pub fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    pub fn is_compatible(&self, other: &Self) -> bool {
        self.major == other.major
    }
}

impl Default for StoreVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

impl fmt::Display for StoreVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Where and how one array is stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayDescriptor {
    pub name: String,
    pub data_type: DataType,
    pub compression: CompressionMethod,
    /// Path of the blob relative to the store root
    pub path: String,
    pub uncompressed_size: usize,
    pub compressed_size: usize,
    /// CRC32 of the uncompressed bytes
    pub checksum: u32,
    pub value_range: Option<ValueRange>,
}

impl ArrayDescriptor {
    pub fn compression_ratio(&self) -> f64 {
        if self.compressed_size == 0 {
            0.0
        } else {
            self.uncompressed_size as f64 / self.compressed_size as f64
        }
    }
}

/// Complete metadata of a stored volume (`volume.json`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreMetadata {
    pub version: StoreVersion,
    pub grid: ImageGrid,
    pub arrays: Vec<ArrayDescriptor>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    #[serde(default)]
    pub custom_metadata: BTreeMap<String, String>,
}

impl StoreMetadata {
    /// Create metadata for a grid with no arrays yet
    pub fn new(grid: ImageGrid) -> Self {
        let now = Utc::now();
        Self {
            version: StoreVersion::default(),
            grid,
            arrays: Vec::new(),
            created_at: now,
            modified_at: now,
            custom_metadata: BTreeMap::new(),
        }
    }

    /// Add custom metadata
    pub fn add_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.custom_metadata.insert(key.into(), value.into());
    }

    /// Get custom metadata
    pub fn get_metadata(&self, key: &str) -> Option<&str> {
        self.custom_metadata.get(key).map(|s| s.as_str())
    }

    pub fn descriptor(&self, name: &str) -> Option<&ArrayDescriptor> {
        self.arrays.iter().find(|d| d.name == name)
    }

    /// Insert or replace the descriptor with the same name
    pub fn upsert_descriptor(&mut self, descriptor: ArrayDescriptor) {
        match self.arrays.iter_mut().find(|d| d.name == descriptor.name) {
            Some(existing) => *existing = descriptor,
            None => self.arrays.push(descriptor),
        }
    }

    /// Update modification timestamp
    pub fn touch(&mut self) {
        self.modified_at = Utc::now();
    }

    /// Check version and that every descriptor fits the grid
    pub fn validate(&self) -> Result<()> {
        if !StoreVersion::CURRENT.is_compatible(&self.version) {
            return Err(VolumeError::UnsupportedVersion(self.version.to_string()));
        }

        let points = self.grid.num_points();
        for descriptor in &self.arrays {
            let expected = points * descriptor.data_type.size_in_bytes();
            if descriptor.uncompressed_size != expected {
                return Err(VolumeError::InvalidFormat(format!(
                    "array '{}' records {} bytes, grid requires {}",
                    descriptor.name, descriptor.uncompressed_size, expected
                )));
            }
        }
        Ok(())
    }
}
