use super::ExternalJob;
use crate::engine::config::RelionRefineOptions;
use crate::engine::runner::JobSpec;
use std::path::PathBuf;

pub const RELION_REFINE: &str = "relion_refine_mpi";

/// One Relion refinement iteration continued from the optimiser of the
/// previous one.
#[derive(Debug, Clone, PartialEq)]
pub struct RelionRefineContinue {
    pub output_root: PathBuf,
    pub optimiser: PathBuf,
    pub iteration: u32,
    pub solvent_mask: PathBuf,
    pub options: RelionRefineOptions,
}

impl ExternalJob for RelionRefineContinue {
    fn spec(&self) -> JobSpec {
        let o = &self.options;
        JobSpec::new(RELION_REFINE)
            .path("--o", &self.output_root)
            .path("--continue", &self.optimiser)
            .opt("--iter", self.iteration)
            .opt("--tau2_fudge", o.tau2_fudge)
            .path("--solvent_mask", &self.solvent_mask)
            .opt("--oversampling", o.oversampling)
            .opt("--healpix_order", o.healpix_order)
            .opt("--offset_range", o.offset_range)
            // Relion evaluates translations on a grid twice as coarse first.
            .opt("--offset_step", o.offset_step * 2.0)
            .opt("--j", o.threads)
    }
}
