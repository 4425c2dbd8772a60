//! Iterative helical refinement.
//!
//! Each iteration continues a Relion refinement for one more iteration, then
//! for every reference searches the helical symmetry locally around the
//! current estimate and imposes it. The Relion output map is kept as
//! `*_C1.mrc` and the symmetrized map takes its name, so the next iteration
//! refines against the symmetrized reference.

use crate::core::models::helix::HelicalParams;
use crate::engine::config::{HelicalRefineConfig, SearchRange};
use crate::engine::error::EngineError;
use crate::engine::helical::{CylinderMask, HelicalFinder, params_from_metadata};
use crate::engine::jobs::ExternalJob;
use crate::engine::jobs::refine::RelionRefineContinue;
use crate::engine::progress::ProgressReporter;
use crate::engine::runner::{JobRunner, ReportingRunner};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

pub const ROOT_NAME: &str = "rnp";
const ITERATION_PREFIX: &str = "iter_";

/// Rise window of the local search, in Angstroms.
pub const LOCAL_Z_RANGE: SearchRange = SearchRange {
    start: 1.0,
    end: 500.0,
    step: 1.0,
};
/// Rotation window of the local search, in degrees.
pub const LOCAL_ROT_RANGE: SearchRange = SearchRange {
    start: -360.0,
    end: 360.0,
    step: 1.0,
};

/// File names of one iteration under the run directory.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationPaths {
    pub iteration: u32,
    pub dir: PathBuf,
}

impl IterationPaths {
    pub fn new(run_dir: &Path, iteration: u32) -> Self {
        Self {
            iteration,
            dir: run_dir.join(format!("{ITERATION_PREFIX}{iteration:03}")),
        }
    }

    /// Output root passed to Relion.
    pub fn root(&self) -> PathBuf {
        self.dir.join(ROOT_NAME)
    }

    fn file(&self, suffix: &str) -> PathBuf {
        self.dir
            .join(format!("{ROOT_NAME}_it{:03}{suffix}", self.iteration))
    }

    pub fn optimiser(&self) -> PathBuf {
        self.file("_optimiser.star")
    }

    pub fn relion_volume(&self, reference: u32) -> PathBuf {
        self.file(&format!("_class{reference:03}.mrc"))
    }

    pub fn c1_volume(&self, reference: u32) -> PathBuf {
        self.file(&format!("_class{reference:03}_C1.mrc"))
    }

    pub fn symmetry_params(&self, reference: u32) -> PathBuf {
        self.file(&format!("_class{reference:03}_params.xmd"))
    }
}

/// Highest completed iteration, judged by the `iter_NNN` directories in
/// `run_dir`. `None` when there are none (or no run directory yet).
pub fn last_iteration(run_dir: &Path) -> Result<Option<u32>, EngineError> {
    if !run_dir.exists() {
        return Ok(None);
    }
    let entries = fs::read_dir(run_dir).map_err(|e| EngineError::io(run_dir, e))?;
    let mut last = None;
    for entry in entries {
        let entry = entry.map_err(|e| EngineError::io(run_dir, e))?;
        if !entry.path().is_dir() {
            continue;
        }
        let name = entry.file_name();
        let iteration = name
            .to_str()
            .and_then(|n| n.strip_prefix(ITERATION_PREFIX))
            .filter(|digits| digits.len() == 3)
            .and_then(|digits| digits.parse::<u32>().ok());
        last = last.max(iteration);
    }
    Ok(last)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceResult {
    pub reference: u32,
    /// Parameters imposed on this reference.
    pub params: HelicalParams,
    /// `false` when the runner only recorded the search and the previous
    /// estimate was imposed instead.
    pub searched: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IterationResult {
    pub iteration: u32,
    pub references: Vec<ReferenceResult>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct HelicalRefineResult {
    pub iterations: Vec<IterationResult>,
}

impl HelicalRefineResult {
    /// Parameters imposed on each reference in the last iteration.
    pub fn final_params(&self) -> Vec<HelicalParams> {
        self.iterations
            .last()
            .map(|it| it.references.iter().map(|r| r.params).collect())
            .unwrap_or_default()
    }
}

/// Runs iterations `first_iteration..=last_iteration`. The optimiser of the
/// iteration before the first must already be in place.
#[instrument(skip_all, name = "helical_refine_workflow")]
pub fn run(
    runner: &dyn JobRunner,
    config: &HelicalRefineConfig,
    reporter: &ProgressReporter,
) -> Result<HelicalRefineResult, EngineError> {
    fs::create_dir_all(&config.run_dir).map_err(|e| EngineError::io(&config.run_dir, e))?;
    let runner = &ReportingRunner::new(runner, reporter);

    let search = HelicalFinder::new(config.sampling, config.height_fraction, config.dihedral).with_mask(
        CylinderMask::from_radii(config.inner_radius, config.outer_radius, config.image_size),
    );
    let impose = HelicalFinder::new(config.sampling, config.height_fraction, config.dihedral);
    info!(
        first = config.first_iteration,
        last = config.last_iteration,
        references = config.references,
        symmetry = search.symmetry(),
        "Starting iterative helical refinement."
    );

    let mut estimates = vec![config.helix; config.references as usize];
    let mut result = HelicalRefineResult::default();
    for iteration in config.first_iteration..=config.last_iteration {
        let paths = IterationPaths::new(&config.run_dir, iteration);
        let previous = IterationPaths::new(&config.run_dir, iteration - 1);
        fs::create_dir_all(&paths.dir).map_err(|e| EngineError::io(&paths.dir, e))?;
        info!(iteration, "Refinement iteration");

        reporter.phase("Relion refinement", || -> Result<(), EngineError> {
            let optimiser = previous.optimiser();
            if runner.executes() && !optimiser.exists() {
                return Err(EngineError::MissingOutput(optimiser));
            }
            RelionRefineContinue {
                output_root: paths.root(),
                optimiser,
                iteration,
                solvent_mask: config.solvent_mask.clone(),
                options: config.relion.clone(),
            }
            .run(runner)?;
            Ok(())
        })?;

        let found = reporter.phase("Symmetry search", || -> Result<Vec<Option<HelicalParams>>, EngineError> {
            let mut found = Vec::with_capacity(estimates.len());
            for (reference, start) in (1..).zip(&estimates) {
                let output = paths.symmetry_params(reference);
                runner.run(&search.fine_search_job(
                    &paths.relion_volume(reference),
                    &output,
                    *start,
                    LOCAL_Z_RANGE,
                    LOCAL_ROT_RANGE,
                ))?;
                found.push(if runner.executes() {
                    Some(params_from_metadata(&output)?)
                } else {
                    None
                });
            }
            Ok(found)
        })?;

        let references = reporter.phase("Symmetrizing", || -> Result<Vec<ReferenceResult>, EngineError> {
            let mut references = Vec::with_capacity(found.len());
            for ((reference, found), estimate) in (1..).zip(found).zip(estimates.iter_mut()) {
                let volume = paths.relion_volume(reference);
                let c1 = paths.c1_volume(reference);
                if runner.executes() {
                    debug!(from = %volume.display(), to = %c1.display(), "Keeping unsymmetrized map.");
                    fs::rename(&volume, &c1).map_err(|e| EngineError::io(&volume, e))?;
                }
                let params = found.unwrap_or(*estimate);
                for job in impose.symmetrize_jobs(&c1, params, &volume) {
                    runner.run(&job)?;
                }
                *estimate = params;
                references.push(ReferenceResult {
                    reference,
                    params,
                    searched: found.is_some(),
                });
            }
            Ok(references)
        })?;

        for r in &references {
            info!(
                iteration,
                reference = r.reference,
                rotation = r.params.rotation,
                rise = r.params.rise,
                "Helical parameters imposed."
            );
        }
        result.iterations.push(IterationResult {
            iteration,
            references,
        });
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::HelicalRefineConfigBuilder;
    use crate::engine::runner::DryRunRunner;
    use crate::workflows::testing::{ScriptedRunner, arg_after};
    use tempfile::{TempDir, tempdir};

    const SEARCH_XMD: &str = "# XMIPP_STAR_1 *\n#\ndata_\nloop_\n _angleRot\n _shiftZ\n 22.500000 1.410000\n";

    fn setup() -> (TempDir, HelicalRefineConfigBuilder) {
        let dir = tempdir().unwrap();
        let run_dir = dir.path().join("refine");
        let builder = HelicalRefineConfigBuilder::new()
            .run_dir(run_dir)
            .solvent_mask(dir.path().join("mask.mrc"))
            .sampling(1.2)
            .height_fraction(0.5)
            .helix(HelicalParams::new(22.03, 1.408))
            .image_size(200)
            .references(2);
        (dir, builder)
    }

    fn seed_optimiser(config: &HelicalRefineConfig, iteration: u32) {
        let paths = IterationPaths::new(&config.run_dir, iteration);
        fs::create_dir_all(&paths.dir).unwrap();
        fs::write(paths.optimiser(), "").unwrap();
    }

    /// Leaves behind what Relion and Xmipp would write.
    fn programs_fake(references: u32) -> ScriptedRunner {
        ScriptedRunner::new(move |job| {
            match job.program.as_str() {
                "relion_refine_mpi" => {
                    let root = arg_after(job, "--o").unwrap();
                    let iteration: u32 = arg_after(job, "--iter").unwrap().parse().unwrap();
                    fs::write(format!("{root}_it{iteration:03}_optimiser.star"), "").unwrap();
                    for class in 1..=references {
                        fs::write(format!("{root}_it{iteration:03}_class{class:03}.mrc"), "relion").unwrap();
                    }
                }
                "xmipp_volume_find_symmetry" => fs::write(arg_after(job, "-o").unwrap(), SEARCH_XMD).unwrap(),
                "xmipp_transform_symmetrize" => fs::write(arg_after(job, "-o").unwrap(), "sym").unwrap(),
                _ => {}
            }
            Ok(())
        })
    }

    #[test]
    fn iteration_files_follow_relion_naming() {
        let paths = IterationPaths::new(Path::new("refine"), 7);
        assert_eq!(paths.dir, PathBuf::from("refine/iter_007"));
        assert_eq!(paths.root(), PathBuf::from("refine/iter_007/rnp"));
        assert_eq!(paths.optimiser(), PathBuf::from("refine/iter_007/rnp_it007_optimiser.star"));
        assert_eq!(paths.relion_volume(2), PathBuf::from("refine/iter_007/rnp_it007_class002.mrc"));
        assert_eq!(paths.c1_volume(2), PathBuf::from("refine/iter_007/rnp_it007_class002_C1.mrc"));
        assert_eq!(
            paths.symmetry_params(1),
            PathBuf::from("refine/iter_007/rnp_it007_class001_params.xmd")
        );
    }

    #[test]
    fn last_iteration_ignores_unrelated_entries() {
        let dir = tempdir().unwrap();
        assert_eq!(last_iteration(&dir.path().join("absent")).unwrap(), None);
        assert_eq!(last_iteration(dir.path()).unwrap(), None);

        for name in ["iter_001", "iter_003", "iter_abc", "iter_0004", "other"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }
        fs::write(dir.path().join("iter_009"), "").unwrap();
        assert_eq!(last_iteration(dir.path()).unwrap(), Some(3));
    }

    #[test]
    fn iterations_chain_refinement_search_and_imposition() {
        let (_dir, builder) = setup();
        let config = builder.iterations(1, 2).build().unwrap();
        seed_optimiser(&config, 0);
        let runner = programs_fake(2);

        let result = run(&runner, &config, &ProgressReporter::new()).unwrap();

        let one_iteration = [
            "relion_refine_mpi",
            "xmipp_volume_find_symmetry",
            "xmipp_volume_find_symmetry",
            "xmipp_transform_symmetrize",
            "xmipp_transform_symmetrize",
        ];
        assert_eq!(runner.programs(), [one_iteration, one_iteration].concat());

        let jobs = runner.jobs();
        let it1 = IterationPaths::new(&config.run_dir, 1);
        assert_eq!(arg_after(&jobs[5], "--continue"), Some(it1.optimiser().to_str().unwrap()));
        assert_eq!(arg_after(&jobs[5], "--iter"), Some("2"));

        let local = jobs[1].args.iter().position(|a| a == "--localHelical").unwrap();
        assert_eq!(jobs[1].args[local + 1..local + 3], ["1.408000", "22.030000"]);
        assert!(jobs[1].args.windows(4).any(|w| w == ["tube", "-2", "-40", "-200"]));
        let local = jobs[6].args.iter().position(|a| a == "--localHelical").unwrap();
        assert_eq!(jobs[6].args[local + 1..local + 3], ["1.410000", "22.500000"]);

        assert_eq!(arg_after(&jobs[3], "-i"), Some(it1.c1_volume(1).to_str().unwrap()));
        assert_eq!(arg_after(&jobs[3], "-o"), Some(it1.relion_volume(1).to_str().unwrap()));
        assert!(!jobs[3].args.iter().any(|a| a == "--mask"));
        assert_eq!(fs::read_to_string(it1.c1_volume(2)).unwrap(), "relion");
        assert_eq!(fs::read_to_string(it1.relion_volume(2)).unwrap(), "sym");

        assert_eq!(result.iterations.len(), 2);
        assert!(result.iterations[1].references.iter().all(|r| r.searched));
        assert_eq!(result.final_params(), vec![HelicalParams::new(22.5, 1.41); 2]);
    }

    #[test]
    fn dry_run_records_every_iteration_with_the_initial_estimate() {
        let (_dir, builder) = setup();
        let config = builder.references(1).dihedral(true).continue_from(2, 4).build().unwrap();
        let runner = DryRunRunner::new();

        let result = run(&runner, &config, &ProgressReporter::new()).unwrap();

        let jobs = runner.jobs();
        assert_eq!(jobs.len(), 2 * 3);
        assert_eq!(arg_after(&jobs[0], "--iter"), Some("3"));
        assert_eq!(arg_after(&jobs[1], "--sym"), Some("helicalDihedral"));
        let helix = jobs[5].args.iter().position(|a| a == "--helixParams").unwrap();
        assert_eq!(jobs[5].args[helix + 1..helix + 3], ["1.408000", "22.030000"]);
        assert!(result.iterations.iter().flat_map(|it| &it.references).all(|r| !r.searched));
        assert!(config.run_dir.join("iter_004").is_dir());
    }

    #[test]
    fn missing_previous_optimiser_stops_before_relion() {
        let (_dir, builder) = setup();
        let config = builder.build().unwrap();
        let runner = programs_fake(2);

        let err = run(&runner, &config, &ProgressReporter::new()).unwrap_err();

        assert!(matches!(err, EngineError::MissingOutput(p) if p.ends_with("iter_000/rnp_it000_optimiser.star")));
        assert!(runner.jobs().is_empty());
    }

    #[test]
    fn missing_search_result_is_reported() {
        let (_dir, builder) = setup();
        let config = builder.references(1).build().unwrap();
        seed_optimiser(&config, 0);
        let runner = ScriptedRunner::new(|job| {
            if job.program == "relion_refine_mpi" {
                let root = arg_after(job, "--o").unwrap();
                fs::write(format!("{root}_it001_class001.mrc"), "").unwrap();
            }
            Ok(())
        });

        let err = run(&runner, &config, &ProgressReporter::new()).unwrap_err();

        assert!(matches!(err, EngineError::MissingOutput(p) if p.ends_with("rnp_it001_class001_params.xmd")));
    }
}
