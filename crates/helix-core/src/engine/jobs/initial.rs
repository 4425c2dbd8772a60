use super::ExternalJob;
use crate::engine::helical::MASK;
use crate::engine::runner::JobSpec;
use std::path::PathBuf;

pub const IMAGE_ALIGN: &str = "xmipp_image_align";
pub const RECONSTRUCT_FOURIER: &str = "xmipp_reconstruct_fourier";

/// Height of the horizontal alignment mask, in pixels.
pub const HORIZONTAL_MASK_HEIGHT: u32 = 10;

/// Creates a thin horizontal band mask the size of a class average.
#[derive(Debug, Clone, PartialEq)]
pub struct HorizontalMask {
    /// Image whose geometry the mask takes.
    pub reference: String,
    pub width: u32,
    pub output: PathBuf,
}

impl ExternalJob for HorizontalMask {
    fn spec(&self) -> JobSpec {
        JobSpec::new(MASK)
            .opt("-i", &self.reference)
            .args([
                "--mask".to_string(),
                "rectangular".to_string(),
                format!("-{}", self.width),
                format!("-{HORIZONTAL_MASK_HEIGHT}"),
            ])
            .path("--create_mask", &self.output)
    }
}

/// Aligns class averages to a reference in a single iteration, without
/// trying mirrored images.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAlign {
    pub input: PathBuf,
    pub reference: PathBuf,
    pub output_root: PathBuf,
}

impl ExternalJob for ImageAlign {
    fn spec(&self) -> JobSpec {
        JobSpec::new(IMAGE_ALIGN)
            .path("-i", &self.input)
            .path("--ref", &self.reference)
            .args(["--do_not_check_mirrors", "--iter", "1"])
            .path("--oroot", &self.output_root)
    }
}

/// Direct Fourier reconstruction of a volume from oriented particles.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconstructFourier {
    pub input: PathBuf,
    pub output: PathBuf,
    pub sampling: f64,
    pub threads: usize,
}

impl ExternalJob for ReconstructFourier {
    fn spec(&self) -> JobSpec {
        JobSpec::new(RECONSTRUCT_FOURIER)
            .path("-i", &self.input)
            .path("-o", &self.output)
            .opt("--thr", self.threads)
            .opt("--sampling", format!("{:.6}", self.sampling))
    }
}
