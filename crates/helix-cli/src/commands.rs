pub mod assign_angles;
pub mod boxer;
pub mod initial_volume;
pub mod refine;
pub mod segment;
pub mod symmetrize;

use helixkit::core::models::micrograph::Micrograph;
use helixkit::core::models::sets::SetOfMicrographs;
use helixkit::engine::runner::{DryRunRunner, JobRunner, JobSpec, ProcessRunner, RunnerError};
use std::path::{Path, PathBuf};
use tracing::info;

/// Options shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub dry_run: bool,
    pub threads: Option<usize>,
    pub program_dir: Option<PathBuf>,
}

/// The runner selected by `--dry-run`.
pub enum Runner {
    Process(ProcessRunner),
    DryRun(DryRunRunner),
}

impl Runner {
    pub fn new(dry_run: bool, program_dir: Option<&Path>) -> Self {
        if dry_run {
            return Runner::DryRun(DryRunRunner::new());
        }
        match program_dir {
            Some(dir) => {
                info!("Resolving external programs in {:?}", dir);
                Runner::Process(ProcessRunner::with_program_dir(dir))
            }
            None => Runner::Process(ProcessRunner::new()),
        }
    }

    /// Prints the command lines a dry run collected.
    pub fn print_recorded(&self) {
        if let Runner::DryRun(runner) = self {
            let jobs = runner.jobs();
            println!("Dry run: {} command(s) would be executed:", jobs.len());
            for job in jobs {
                match &job.cwd {
                    Some(cwd) => println!("  (cd {} && {})", cwd.display(), job),
                    None => println!("  {}", job),
                }
            }
        }
    }
}

impl JobRunner for Runner {
    fn run(&self, job: &JobSpec) -> Result<(), RunnerError> {
        match self {
            Runner::Process(r) => r.run(job),
            Runner::DryRun(r) => r.run(job),
        }
    }

    fn executes(&self) -> bool {
        match self {
            Runner::Process(r) => r.executes(),
            Runner::DryRun(r) => r.executes(),
        }
    }
}

pub fn micrograph_set(paths: &[PathBuf], sampling: f64) -> SetOfMicrographs {
    let mut set = SetOfMicrographs::new(sampling);
    for path in paths {
        set.insert(Micrograph::new(path.clone()));
    }
    set
}
