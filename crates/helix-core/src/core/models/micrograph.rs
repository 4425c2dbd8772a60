use std::path::{Path, PathBuf};

/// A single micrograph image on disk.
///
/// The sampling rate is shared by the whole acquisition and therefore lives on
/// [`SetOfMicrographs`](super::sets::SetOfMicrographs), not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Micrograph {
    pub path: PathBuf,
}

impl Micrograph {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name without directory and extension, used to pair micrographs
    /// with the coordinate files produced for them.
    pub fn stem(&self) -> Option<&str> {
        self.path.file_stem().and_then(|s| s.to_str())
    }

    /// EMAN2 displays TIFF micrographs upside down, which invalidates the
    /// coordinates picked on them.
    pub fn is_tiff(&self) -> bool {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("tif") || e.eq_ignore_ascii_case("tiff"))
    }
}
