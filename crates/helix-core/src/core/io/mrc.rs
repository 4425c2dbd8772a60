use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MrcError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid MRC dimensions {0:?}")]
    InvalidDimensions([i32; 3]),
}

/// Volume or image size in voxels, as stored in the first three words of an
/// MRC header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MrcDimensions {
    pub nx: u32,
    pub ny: u32,
    pub nz: u32,
}

pub fn read_dimensions(reader: &mut impl Read) -> Result<MrcDimensions, MrcError> {
    let mut header = [0u8; 12];
    reader.read_exact(&mut header)?;
    let word = |i: usize| i32::from_le_bytes([header[i], header[i + 1], header[i + 2], header[i + 3]]);
    let raw = [word(0), word(4), word(8)];
    match raw.map(u32::try_from) {
        [Ok(nx), Ok(ny), Ok(nz)] if nx > 0 && ny > 0 && nz > 0 => Ok(MrcDimensions { nx, ny, nz }),
        _ => Err(MrcError::InvalidDimensions(raw)),
    }
}

pub fn read_dimensions_from_path(path: impl AsRef<Path>) -> Result<MrcDimensions, MrcError> {
    let mut file = File::open(path)?;
    read_dimensions(&mut file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn header(nx: i32, ny: i32, nz: i32) -> Vec<u8> {
        let mut bytes = Vec::new();
        for v in [nx, ny, nz] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes.extend_from_slice(&[0u8; 1012]);
        bytes
    }

    #[test]
    fn reads_little_endian_dimensions() {
        let dims = read_dimensions(&mut Cursor::new(header(128, 128, 64))).unwrap();
        assert_eq!(dims, MrcDimensions { nx: 128, ny: 128, nz: 64 });
    }

    #[test]
    fn rejects_non_positive_dimensions() {
        let err = read_dimensions(&mut Cursor::new(header(128, 0, 64))).unwrap_err();
        assert!(matches!(err, MrcError::InvalidDimensions([128, 0, 64])));
    }

    #[test]
    fn truncated_header_is_an_io_error() {
        let err = read_dimensions(&mut Cursor::new(vec![0u8; 5])).unwrap_err();
        assert!(matches!(err, MrcError::Io(_)));
    }

    #[test]
    fn reads_header_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vol.mrc");
        std::fs::write(&path, header(100, 100, 100)).unwrap();
        assert_eq!(read_dimensions_from_path(&path).unwrap().nx, 100);
    }
}
