//! # Workflows Module
//!
//! End-to-end procedures built from the [`core`](crate::core) algorithms and
//! the [`engine`](crate::engine) runner seam. Each workflow validates its
//! inputs, reports progress through a
//! [`ProgressReporter`](crate::engine::progress::ProgressReporter) where it
//! has more than one phase, and returns plain data for the caller to persist.
//!
//! - **Segmentation** ([`segment`]) - Filament files to per-micrograph particle coordinates
//! - **Helical Symmetrization** ([`symmetrize`]) - Dihedral prep, coarse and fine search, imposition
//! - **Angle Assignment** ([`assign_angles`]) - Initial tilt/rotation priors on a particle STAR file
//! - **Filament Boxing** ([`boxing`]) - Interactive helix boxing and export through EMAN2
//! - **Initial Volume** ([`initial_volume`]) - Helical starting map from 2D class averages
//! - **Helical Refinement** ([`helical_refine`]) - Relion iterations alternated with symmetry search
//! - **Relion Steps** ([`relion`]) - Motion correction, post-processing and CTF refinement

pub mod assign_angles;
pub mod boxing;
pub mod helical_refine;
pub mod initial_volume;
pub mod relion;
pub mod segment;
pub mod symmetrize;

#[cfg(test)]
pub(crate) mod testing {
    use crate::engine::runner::{JobRunner, JobSpec, RunnerError};
    use std::sync::Mutex;

    type Script = Box<dyn Fn(&JobSpec) -> Result<(), RunnerError> + Send + Sync>;

    /// Records every job and lets the test decide what each one does.
    pub struct ScriptedRunner {
        script: Script,
        jobs: Mutex<Vec<JobSpec>>,
    }

    impl ScriptedRunner {
        pub fn new(script: impl Fn(&JobSpec) -> Result<(), RunnerError> + Send + Sync + 'static) -> Self {
            Self {
                script: Box::new(script),
                jobs: Mutex::new(Vec::new()),
            }
        }

        pub fn jobs(&self) -> Vec<JobSpec> {
            self.jobs.lock().unwrap().clone()
        }

        pub fn programs(&self) -> Vec<String> {
            self.jobs().into_iter().map(|j| j.program).collect()
        }
    }

    impl JobRunner for ScriptedRunner {
        fn run(&self, job: &JobSpec) -> Result<(), RunnerError> {
            self.jobs.lock().unwrap().push(job.clone());
            (self.script)(job)
        }
    }

    /// Value following `flag` in the job's arguments.
    pub fn arg_after<'a>(job: &'a JobSpec, flag: &str) -> Option<&'a str> {
        let idx = job.args.iter().position(|a| a == flag)?;
        job.args.get(idx + 1).map(String::as_str)
    }
}
