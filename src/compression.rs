//! Compression of array blobs

use crate::error::{Result, VolumeError};
use flate2::read::{DeflateDecoder, DeflateEncoder};
use flate2::Compression as FlateCompression;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::str::FromStr;

/// Compression methods for stored arrays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum CompressionMethod {
    /// No compression
    None = 0,
    /// Deflate/ZIP compression
    Deflate = 1,
    /// Run-length encoding, effective on label maps
    Rle = 2,
    /// Zstandard compression
    #[default]
    Zstd = 3,
}

impl FromStr for CompressionMethod {
    type Err = VolumeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "raw" => Ok(CompressionMethod::None),
            "deflate" | "zip" | "zlib" => Ok(CompressionMethod::Deflate),
            "rle" => Ok(CompressionMethod::Rle),
            "zstd" => Ok(CompressionMethod::Zstd),
            other => Err(VolumeError::InvalidArgument(format!(
                "unknown compression method '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompressionMethod::None => "none",
            CompressionMethod::Deflate => "deflate",
            CompressionMethod::Rle => "rle",
            CompressionMethod::Zstd => "zstd",
        };
        f.pad(name)
    }
}

/// Compression level (0-9, where 0 is no compression and 9 is maximum)
#[derive(Debug, Clone, Copy)]
pub struct CompressionLevel(u8);

impl CompressionLevel {
    pub fn new(level: u8) -> Self {
        Self(level.min(9))
    }

    pub fn fast() -> Self {
        Self(1)
    }

    pub fn best() -> Self {
        Self(9)
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self(6)
    }
}

/// Codec for array blobs
///
/// `decompress` fails when `expected_size` is given and the decoded blob has
/// a different length.
pub trait Compressor: Send + Sync {
    fn compress(&self, data: &[u8], level: CompressionLevel) -> Result<Vec<u8>>;

    fn decompress(&self, data: &[u8], expected_size: Option<usize>) -> Result<Vec<u8>>;

    fn method(&self) -> CompressionMethod;
}

fn check_size(decoded: Vec<u8>, expected_size: Option<usize>) -> Result<Vec<u8>> {
    match expected_size {
        Some(expected) if expected != decoded.len() => Err(VolumeError::Decompression(format!(
            "blob decodes to {} bytes, expected {}",
            decoded.len(),
            expected
        ))),
        _ => Ok(decoded),
    }
}

/// No compression
#[derive(Debug, Default)]
pub struct NoneCompressor;

impl Compressor for NoneCompressor {
    fn compress(&self, data: &[u8], _level: CompressionLevel) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8], expected_size: Option<usize>) -> Result<Vec<u8>> {
        check_size(data.to_vec(), expected_size)
    }

    fn method(&self) -> CompressionMethod {
        CompressionMethod::None
    }
}

/// Deflate compression
#[derive(Debug, Default)]
pub struct DeflateCompressor;

impl Compressor for DeflateCompressor {
    fn compress(&self, data: &[u8], level: CompressionLevel) -> Result<Vec<u8>> {
        let mut encoder = DeflateEncoder::new(data, FlateCompression::new(level.value() as u32));
        let mut compressed = Vec::new();
        encoder
            .read_to_end(&mut compressed)
            .map_err(|e| VolumeError::Compression(e.to_string()))?;
        Ok(compressed)
    }

    fn decompress(&self, data: &[u8], expected_size: Option<usize>) -> Result<Vec<u8>> {
        let mut decoder = DeflateDecoder::new(data);
        let mut decompressed = Vec::with_capacity(expected_size.unwrap_or(0));
        decoder
            .read_to_end(&mut decompressed)
            .map_err(|e| VolumeError::Decompression(e.to_string()))?;
        check_size(decompressed, expected_size)
    }

    fn method(&self) -> CompressionMethod {
        CompressionMethod::Deflate
    }
}

/// Zstandard; levels 0-9 map onto zstd levels 1-19
#[derive(Debug, Default)]
pub struct ZstdCompressor;

impl Compressor for ZstdCompressor {
    fn compress(&self, data: &[u8], level: CompressionLevel) -> Result<Vec<u8>> {
        let zstd_level = 1 + 2 * level.value() as i32;
        zstd::encode_all(data, zstd_level).map_err(|e| VolumeError::Compression(e.to_string()))
    }

    fn decompress(&self, data: &[u8], expected_size: Option<usize>) -> Result<Vec<u8>> {
        let decoded = zstd::decode_all(data).map_err(|e| VolumeError::Decompression(e.to_string()))?;
        check_size(decoded, expected_size)
    }

    fn method(&self) -> CompressionMethod {
        CompressionMethod::Zstd
    }
}

/// Run-length encoding: (count, byte) pairs with runs of at most 255
#[derive(Debug, Default)]
pub struct RleCompressor;

impl RleCompressor {
    fn encode(data: &[u8]) -> Vec<u8> {
        let mut encoded = Vec::new();
        let mut i = 0;

        while i < data.len() {
            let byte = data[i];
            let run = data[i..]
                .iter()
                .take(255)
                .take_while(|&&b| b == byte)
                .count();

            encoded.push(run as u8);
            encoded.push(byte);
            i += run;
        }

        encoded
    }

    fn decode(data: &[u8], expected_size: Option<usize>) -> Result<Vec<u8>> {
        if data.len() % 2 != 0 {
            return Err(VolumeError::Decompression(
                "RLE data must have even length".to_string(),
            ));
        }

        let mut decoded = Vec::with_capacity(expected_size.unwrap_or(0));
        for pair in data.chunks_exact(2) {
            let (count, value) = (pair[0] as usize, pair[1]);
            if count == 0 {
                return Err(VolumeError::Decompression(
                    "RLE run of length zero".to_string(),
                ));
            }
            decoded.extend(std::iter::repeat(value).take(count));
        }

        check_size(decoded, expected_size)
    }
}

impl Compressor for RleCompressor {
    fn compress(&self, data: &[u8], _level: CompressionLevel) -> Result<Vec<u8>> {
        Ok(Self::encode(data))
    }

    fn decompress(&self, data: &[u8], expected_size: Option<usize>) -> Result<Vec<u8>> {
        Self::decode(data, expected_size)
    }

    fn method(&self) -> CompressionMethod {
        CompressionMethod::Rle
    }
}

/// Codec for a method
pub fn get_compressor(method: CompressionMethod) -> Box<dyn Compressor> {
    match method {
        CompressionMethod::None => Box::new(NoneCompressor),
        CompressionMethod::Deflate => Box::new(DeflateCompressor),
        CompressionMethod::Rle => Box::new(RleCompressor),
        CompressionMethod::Zstd => Box::new(ZstdCompressor),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deflate() {
        let compressor = DeflateCompressor;
        let data = b"Tissue labels ".repeat(100);
        let compressed = compressor
            .compress(&data, CompressionLevel::default())
            .unwrap();
        assert!(compressed.len() < data.len());
        let decompressed = compressor
            .decompress(&compressed, Some(data.len()))
            .unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn test_zstd() {
        let compressor = ZstdCompressor;
        let data = vec![0u8; 4096];
        let compressed = compressor.compress(&data, CompressionLevel::fast()).unwrap();
        assert!(compressed.len() < data.len());
        assert_eq!(compressor.decompress(&compressed, None).unwrap(), data);
    }

    #[test]
    fn test_rle_long_runs() {
        let compressor = RleCompressor;
        let mut data = vec![0u8; 600];
        data.extend(vec![3u8; 10]);
        let compressed = compressor
            .compress(&data, CompressionLevel::default())
            .unwrap();
        // 600 zeros need three runs (255 + 255 + 90)
        assert_eq!(compressed, vec![255, 0, 255, 0, 90, 0, 10, 3]);
        let decompressed = compressor.decompress(&compressed, None).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn test_rle_rejects_corrupt_input() {
        let compressor = RleCompressor;
        assert!(compressor.decompress(&[1, 2, 3], None).is_err());
        assert!(compressor.decompress(&[0, 7], None).is_err());
    }

    #[test]
    fn test_size_check() {
        let compressed = ZstdCompressor.compress(&[7u8; 64], CompressionLevel::best()).unwrap();
        assert!(ZstdCompressor.decompress(&compressed, Some(64)).is_ok());
        assert!(matches!(
            ZstdCompressor.decompress(&compressed, Some(63)),
            Err(VolumeError::Decompression(_))
        ));
        assert!(NoneCompressor.decompress(&[1, 2, 3], Some(4)).is_err());
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("ZSTD".parse::<CompressionMethod>().unwrap(), CompressionMethod::Zstd);
        assert_eq!("zip".parse::<CompressionMethod>().unwrap(), CompressionMethod::Deflate);
        assert_eq!(CompressionMethod::Rle.to_string(), "rle");
        assert!("wavelet".parse::<CompressionMethod>().is_err());
        assert_eq!(get_compressor(CompressionMethod::None).method(), CompressionMethod::None);
    }
}
