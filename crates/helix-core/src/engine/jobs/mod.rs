//! Argument builders for the wrapped EMAN2, Relion and Xmipp programs.

pub mod boxer;
pub mod ctf_refine;
pub mod dihedral;
pub mod initial;
pub mod motioncorr;
pub mod postprocess;
pub mod refine;

use super::runner::{JobRunner, JobSpec, RunnerError};

/// A configured invocation of one external program.
pub trait ExternalJob {
    fn spec(&self) -> JobSpec;

    fn run(&self, runner: &dyn JobRunner) -> Result<(), RunnerError> {
        runner.run(&self.spec())
    }
}
