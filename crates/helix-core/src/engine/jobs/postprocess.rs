use super::ExternalJob;
use crate::engine::runner::JobSpec;
use std::path::PathBuf;

pub const POSTPROCESS: &str = "relion_postprocess";

#[derive(Debug, Clone, PartialEq)]
pub enum BFactor {
    /// Estimate from a Guinier fit between the two resolutions (Å).
    Auto { low_res: f64, high_res: f64 },
    /// Apply a fixed B-factor (Å², usually negative).
    AdHoc(f64),
}

impl Default for BFactor {
    fn default() -> Self {
        BFactor::Auto {
            low_res: 10.0,
            high_res: 0.0,
        }
    }
}

/// Masking, sharpening and FSC-weighting of a pair of half maps.
#[derive(Debug, Clone, PartialEq)]
pub struct PostprocessJob {
    pub half1: PathBuf,
    pub output_root: PathBuf,
    pub mask: PathBuf,
    pub sampling: f64,
    pub mtf: Option<PathBuf>,
    pub bfactor: BFactor,
    /// Low-pass resolution (Å) applied instead of FSC weighting.
    pub skip_fsc_weighting: Option<f64>,
    pub filter_edge_width: u32,
    pub randomize_at_fsc: f64,
}

impl PostprocessJob {
    pub fn new(half1: PathBuf, mask: PathBuf, output_root: PathBuf, sampling: f64) -> Self {
        Self {
            half1,
            output_root,
            mask,
            sampling,
            mtf: None,
            bfactor: BFactor::default(),
            skip_fsc_weighting: None,
            filter_edge_width: 2,
            randomize_at_fsc: 0.8,
        }
    }
}

impl ExternalJob for PostprocessJob {
    fn spec(&self) -> JobSpec {
        let mut job = JobSpec::new(POSTPROCESS)
            .path("--i", &self.half1)
            .path("--o", &self.output_root)
            .opt("--angpix", self.sampling)
            .opt("--filter_edge_width", self.filter_edge_width)
            .opt("--randomize_at_fsc", self.randomize_at_fsc)
            .path("--mask", &self.mask);
        if let Some(mtf) = &self.mtf {
            job = job.path("--mtf", mtf);
        }
        job = match self.bfactor {
            BFactor::Auto { low_res, high_res } => job
                .arg("--auto_bfac")
                .opt("--autob_lowres", low_res)
                .opt("--autob_highres", high_res),
            BFactor::AdHoc(value) => job.opt("--adhoc_bfac", value),
        };
        if let Some(low_pass) = self.skip_fsc_weighting {
            job = job.arg("--skip_fsc_weighting").opt("--low_pass", low_pass);
        }
        job
    }
}
