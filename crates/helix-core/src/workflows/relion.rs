//! Single-step Relion procedures: motion correction, post-processing and
//! CTF refinement. Each one prepares its inputs, runs the job and, when the
//! runner executes, checks for the file Relion leaves behind.

use crate::engine::error::EngineError;
use crate::engine::jobs::ExternalJob;
use crate::engine::jobs::ctf_refine::CtfRefineJob;
use crate::engine::jobs::motioncorr::{MotionCorrJob, read_global_shifts};
use crate::engine::jobs::postprocess::PostprocessJob;
use crate::engine::runner::JobRunner;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// File name `relion_ctf_refine` gives the refined particles.
pub const CTF_REFINED_PARTICLES: &str = "particles_ctf_refine.star";

#[derive(Debug, Clone, PartialEq)]
pub struct MovieShifts {
    pub movie: PathBuf,
    /// Per-frame `(x, y)` drift in pixels; empty when nothing was executed.
    pub shifts: Vec<(f64, f64)>,
}

fn ensure_dir(dir: &Path) -> Result<(), EngineError> {
    if dir.as_os_str().is_empty() {
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|e| EngineError::io(dir, e))
}

fn require(runner: &dyn JobRunner, path: PathBuf) -> Result<PathBuf, EngineError> {
    if runner.executes() && !path.exists() {
        return Err(EngineError::MissingOutput(path));
    }
    Ok(path)
}

/// Motion-corrects `movies` (which must live in the job's movie directory)
/// and reads back the global drift of each one.
#[instrument(skip_all, name = "motion_correct_workflow")]
pub fn motion_correct(
    runner: &dyn JobRunner,
    job: &MotionCorrJob,
    movies: &[PathBuf],
) -> Result<Vec<MovieShifts>, EngineError> {
    let input = job.write_input_star(movies)?;
    info!(movies = movies.len(), input = %input.display(), "Running motion correction.");
    job.run(runner)?;

    let output_dir = job.movie_dir.join("output");
    movies
        .iter()
        .map(|movie| {
            let mut name = movie.file_stem().unwrap_or(movie.as_os_str()).to_owned();
            name.push(".star");
            let star = output_dir.join(name);
            let shifts = if runner.executes() {
                read_global_shifts(&require(runner, star)?)?
            } else {
                Vec::new()
            };
            Ok(MovieShifts {
                movie: movie.clone(),
                shifts,
            })
        })
        .collect()
}

/// Runs post-processing and returns the `postprocess.star` Relion writes
/// next to the output root.
#[instrument(skip_all, name = "postprocess_workflow")]
pub fn postprocess(runner: &dyn JobRunner, job: &PostprocessJob) -> Result<PathBuf, EngineError> {
    if let Some(parent) = job.output_root.parent() {
        ensure_dir(parent)?;
    }
    job.run(runner)?;
    let mut star = OsString::from(job.output_root.as_os_str());
    star.push(".star");
    let star = require(runner, PathBuf::from(star))?;
    info!(star = %star.display(), "Post-processing finished.");
    Ok(star)
}

/// Runs CTF refinement and returns the refined particle file.
#[instrument(skip_all, name = "ctf_refine_workflow")]
pub fn ctf_refine(runner: &dyn JobRunner, job: &CtfRefineJob) -> Result<PathBuf, EngineError> {
    ensure_dir(&job.output_dir)?;
    job.run(runner)?;
    let particles = require(runner, job.output_dir.join(CTF_REFINED_PARTICLES))?;
    info!(particles = %particles.display(), "CTF refinement finished.");
    Ok(particles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::runner::DryRunRunner;
    use crate::workflows::testing::{ScriptedRunner, arg_after};
    use tempfile::tempdir;

    const SHIFTS_STAR: &str = "data_global_shift\n\nloop_\n_rlnMicrographFrameNumber #1\n\
                               _rlnMicrographShiftX #2\n_rlnMicrographShiftY #3\n1 0.0 0.0\n2 0.5 -1.25\n";

    const POSTPROCESS_STAR: &str = "data_general\n_rlnUnfilteredMapHalf1 half1.mrc\n\
                                    _rlnUnfilteredMapHalf2 half2.mrc\n_rlnMaskName mask.mrc\n";

    #[test]
    fn motion_correction_reads_shifts_of_each_movie() {
        let dir = tempdir().unwrap();
        let job = MotionCorrJob::new(dir.path().to_path_buf(), "movies.star", 1.1);
        let runner = ScriptedRunner::new(|job| {
            let output = job.cwd.as_ref().unwrap().join("output");
            for movie in ["m1", "m2"] {
                fs::write(output.join(format!("{movie}.star")), SHIFTS_STAR).unwrap();
            }
            Ok(())
        });

        let result = motion_correct(&runner, &job, &["m1.tif".into(), "m2.tif".into()]).unwrap();

        assert_eq!(runner.programs(), ["relion_run_motioncorr"]);
        assert_eq!(result.len(), 2);
        assert_eq!(result[1].movie, PathBuf::from("m2.tif"));
        assert_eq!(result[1].shifts, vec![(0.0, 0.0), (0.5, -1.25)]);
        assert!(dir.path().join("movies.star").exists());
    }

    #[test]
    fn motion_correction_without_output_is_reported() {
        let dir = tempdir().unwrap();
        let job = MotionCorrJob::new(dir.path().to_path_buf(), "movies.star", 1.1);
        let runner = ScriptedRunner::new(|_| Ok(()));

        let err = motion_correct(&runner, &job, &["m1.tif".into()]).unwrap_err();

        assert!(matches!(err, EngineError::MissingOutput(p) if p.ends_with("output/m1.star")));
    }

    #[test]
    fn dry_run_motion_correction_has_no_shifts() {
        let dir = tempdir().unwrap();
        let job = MotionCorrJob::new(dir.path().to_path_buf(), "movies.star", 1.1);
        let runner = DryRunRunner::new();

        let result = motion_correct(&runner, &job, &["m1.tif".into()]).unwrap();

        assert_eq!(runner.jobs().len(), 1);
        assert!(result[0].shifts.is_empty());
    }

    #[test]
    fn postprocess_output_feeds_ctf_refinement() {
        let dir = tempdir().unwrap();
        let post = PostprocessJob::new(
            "half1.mrc".into(),
            "mask.mrc".into(),
            dir.path().join("PostProcess/postprocess"),
            1.1,
        );
        let runner = ScriptedRunner::new(|job| {
            match job.program.as_str() {
                "relion_postprocess" => {
                    let root = arg_after(job, "--o").unwrap();
                    fs::write(format!("{root}.star"), POSTPROCESS_STAR).unwrap();
                }
                "relion_ctf_refine" => {
                    let out = Path::new(arg_after(job, "--o").unwrap());
                    fs::write(out.join(CTF_REFINED_PARTICLES), "").unwrap();
                }
                _ => {}
            }
            Ok(())
        });

        let star = postprocess(&runner, &post).unwrap();
        assert_eq!(star, dir.path().join("PostProcess/postprocess.star"));

        let ctf = CtfRefineJob::new("particles.star".into(), dir.path().join("CtfRefine"), star.clone()).unwrap();
        let particles = ctf_refine(&runner, &ctf).unwrap();

        assert_eq!(particles, dir.path().join("CtfRefine").join(CTF_REFINED_PARTICLES));
        assert_eq!(runner.programs(), ["relion_postprocess", "relion_ctf_refine"]);
        assert_eq!(arg_after(&runner.jobs()[1], "--m2"), Some("half2.mrc"));
    }

    #[test]
    fn missing_postprocess_star_is_reported() {
        let dir = tempdir().unwrap();
        let post = PostprocessJob::new("h.mrc".into(), "m.mrc".into(), dir.path().join("pp"), 1.0);
        let runner = ScriptedRunner::new(|_| Ok(()));

        let err = postprocess(&runner, &post).unwrap_err();

        assert!(matches!(err, EngineError::MissingOutput(p) if p == dir.path().join("pp.star")));
    }

    #[test]
    fn dry_run_ctf_refinement_only_records_the_job() {
        let dir = tempdir().unwrap();
        let star = dir.path().join("postprocess.star");
        fs::write(&star, POSTPROCESS_STAR).unwrap();
        let job = CtfRefineJob::new("p.star".into(), dir.path().join("ctf"), star).unwrap();
        let runner = DryRunRunner::new();

        let particles = ctf_refine(&runner, &job).unwrap();

        assert!(!particles.exists());
        assert!(dir.path().join("ctf").is_dir());
        assert_eq!(runner.jobs()[0].program, "relion_ctf_refine");
    }
}
