use crate::engine::progress::{Progress, ProgressReporter};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, info};

/// One invocation of an external program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl JobSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Appends `flag value`.
    pub fn opt(self, flag: &str, value: impl fmt::Display) -> Self {
        self.arg(flag).arg(value.to_string())
    }

    pub fn path(self, flag: &str, path: &Path) -> Self {
        self.arg(flag).arg(path.display().to_string())
    }

    pub fn flag_if(self, condition: bool, flag: &str) -> Self {
        if condition { self.arg(flag) } else { self }
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }
}

impl fmt::Display for JobSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "termination by signal".to_string(),
    }
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("'{program}' failed with {}", describe_exit(.code))]
    Failed { program: String, code: Option<i32> },
}

/// Seam through which every external program is invoked.
pub trait JobRunner {
    fn run(&self, job: &JobSpec) -> Result<(), RunnerError>;

    /// `false` for runners that only record commands; workflows stop before
    /// steps that need the outputs of earlier jobs.
    fn executes(&self) -> bool {
        true
    }
}

/// Spawns programs as child processes and waits for them.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    program_dir: Option<PathBuf>,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves programs inside `dir` (for example `$EMAN2DIR/bin`) instead
    /// of on `PATH`.
    pub fn with_program_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            program_dir: Some(dir.into()),
        }
    }

    fn resolve(&self, program: &str) -> PathBuf {
        match &self.program_dir {
            Some(dir) => dir.join(program),
            None => PathBuf::from(program),
        }
    }
}

impl JobRunner for ProcessRunner {
    fn run(&self, job: &JobSpec) -> Result<(), RunnerError> {
        info!(command = %job, "Running external program");
        let mut command = Command::new(self.resolve(&job.program));
        command.args(&job.args);
        if let Some(cwd) = &job.cwd {
            debug!(cwd = %cwd.display(), "Working directory");
            command.current_dir(cwd);
        }

        let status = command.status().map_err(|source| RunnerError::Spawn {
            program: job.program.clone(),
            source,
        })?;
        if !status.success() {
            return Err(RunnerError::Failed {
                program: job.program.clone(),
                code: status.code(),
            });
        }
        Ok(())
    }
}

/// Records jobs instead of running them.
#[derive(Debug, Default)]
pub struct DryRunRunner {
    jobs: Mutex<Vec<JobSpec>>,
}

impl DryRunRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn jobs(&self) -> Vec<JobSpec> {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl JobRunner for DryRunRunner {
    fn run(&self, job: &JobSpec) -> Result<(), RunnerError> {
        info!(command = %job, "Dry run, not executing");
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(job.clone());
        Ok(())
    }

    fn executes(&self) -> bool {
        false
    }
}

/// Wraps another runner and reports each job to a progress reporter.
pub struct ReportingRunner<'a> {
    inner: &'a dyn JobRunner,
    reporter: &'a ProgressReporter<'a>,
}

impl<'a> ReportingRunner<'a> {
    pub fn new(inner: &'a dyn JobRunner, reporter: &'a ProgressReporter<'a>) -> Self {
        Self { inner, reporter }
    }
}

impl JobRunner for ReportingRunner<'_> {
    fn run(&self, job: &JobSpec) -> Result<(), RunnerError> {
        self.reporter.report(Progress::JobStart {
            program: job.program.clone(),
        });
        let result = self.inner.run(job);
        self.reporter.report(Progress::JobFinish);
        result
    }

    fn executes(&self) -> bool {
        self.inner.executes()
    }
}
