//! Utility functions

use crate::error::{Result, VolumeError};

/// Store-relative path of the metadata document
pub const METADATA_PATH: &str = "volume.json";

/// Calculate the CRC32 checksum of a blob
pub fn calculate_checksum(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Verify checksum
pub fn verify_checksum(data: &[u8], expected: u32) -> bool {
    calculate_checksum(data) == expected
}

/// Format byte size in human-readable form
pub fn format_bytes(bytes: usize) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];

    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

/// Store-relative blob path for an array
///
/// Array names become file names, so separators and dot-only names are refused.
pub fn array_path(name: &str) -> Result<String> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0']);
    if !valid {
        return Err(VolumeError::InvalidArgument(format!(
            "'{}' cannot be used as an array name",
            name
        )));
    }
    Ok(format!("arrays/{}.raw", name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum() {
        let data = b"Tissue";
        let checksum = calculate_checksum(data);
        assert!(verify_checksum(data, checksum));
        assert!(!verify_checksum(data, checksum.wrapping_add(1)));
        // standard CRC32 check value
        assert_eq!(calculate_checksum(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
    }

    #[test]
    fn test_array_path() {
        assert_eq!(array_path("Source").unwrap(), "arrays/Source.raw");
        assert!(array_path("").is_err());
        assert!(array_path("..").is_err());
        assert!(array_path("a/b").is_err());
    }
}
