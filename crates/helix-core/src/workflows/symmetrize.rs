use crate::core::io::mrc;
use crate::core::models::helix::HelicalParams;
use crate::engine::config::HelicalSearchConfig;
use crate::engine::error::EngineError;
use crate::engine::helical::{CylinderMask, HelicalFinder};
use crate::engine::jobs::dihedral::DihedralPrep;
use crate::engine::progress::ProgressReporter;
use crate::engine::runner::{JobRunner, JobSpec, ReportingRunner};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

pub const IMAGE_CONVERT: &str = "xmipp_image_convert";

const SYMMETRIZED_VOLUME: &str = "volume_symmetrized.vol";
const COARSE_PARAMS: &str = "coarseParams.xmd";
const FINE_PARAMS: &str = "fineParams.xmd";

/// Files produced under the output directory of a symmetrization run.
#[derive(Debug, Clone, PartialEq)]
pub struct SymmetrizePaths {
    pub volume: PathBuf,
    pub coarse_params: PathBuf,
    pub fine_params: PathBuf,
}

impl SymmetrizePaths {
    pub fn new(output_dir: &Path) -> Self {
        let extra = output_dir.join("extra");
        Self {
            volume: output_dir.join(SYMMETRIZED_VOLUME),
            coarse_params: extra.join(COARSE_PARAMS),
            fine_params: extra.join(FINE_PARAMS),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymmetrizeResult {
    pub paths: SymmetrizePaths,
    /// Starting point of the fine search, as found by the coarse search.
    pub coarse: Option<HelicalParams>,
    /// Imposed parameters; `None` when the runner only records commands.
    pub params: Option<HelicalParams>,
}

#[instrument(skip_all, name = "symmetrize_workflow")]
pub fn run(
    runner: &dyn JobRunner,
    config: &HelicalSearchConfig,
    reporter: &ProgressReporter,
) -> Result<SymmetrizeResult, EngineError> {
    let paths = SymmetrizePaths::new(&config.output_dir);
    for dir in [&config.output_dir, &config.output_dir.join("extra")] {
        fs::create_dir_all(dir).map_err(|e| EngineError::io(dir, e))?;
    }

    let runner = &ReportingRunner::new(runner, reporter);
    let finder = HelicalFinder::new(config.sampling, config.height_fraction, config.dihedral.is_dihedral())
        .with_mask(resolve_mask(config)?);
    info!(
        volume = %config.input_volume.display(),
        symmetry = finder.symmetry(),
        masked = finder.mask().is_some(),
        "Starting helical symmetrization."
    );

    reporter.phase("Preparing volume", || prepare_volume(runner, config, &paths.volume))?;

    reporter.phase("Coarse search", || {
        finder.search_coarse(
            runner,
            &paths.volume,
            &paths.coarse_params,
            config.z,
            config.rot,
            config.threads,
        )
    })?;

    if !runner.executes() {
        info!("Dry run: the remaining steps depend on the coarse search output.");
        return Ok(SymmetrizeResult {
            paths,
            coarse: None,
            params: None,
        });
    }

    let coarse = reporter.phase("Fine search", || {
        finder.search_fine(
            runner,
            &paths.volume,
            &paths.coarse_params,
            &paths.fine_params,
            config.z,
            config.rot,
        )
    })?;

    let params = reporter.phase("Symmetrizing", || {
        finder.symmetrize(runner, &paths.volume, &paths.fine_params, &paths.volume)
    })?;

    info!(
        rotation = params.rotation,
        rise = params.rise,
        rise_voxels = params.rise_in_voxels(config.sampling),
        "Helical parameters imposed."
    );
    Ok(SymmetrizeResult {
        paths,
        coarse: Some(coarse),
        params: Some(params),
    })
}

/// The mask height defaults to the X dimension of the input volume, which is
/// only read when a mask is actually requested.
fn resolve_mask(config: &HelicalSearchConfig) -> Result<Option<CylinderMask>, EngineError> {
    if config.outer_radius <= 0 {
        return Ok(None);
    }
    let height = match config.mask_height {
        Some(h) => h,
        None => {
            mrc::read_dimensions_from_path(&config.input_volume)
                .map_err(|source| EngineError::VolumeHeader {
                    path: config.input_volume.clone(),
                    source,
                })?
                .nx
        }
    };
    Ok(CylinderMask::from_radii(config.inner_radius, config.outer_radius, height))
}

fn prepare_volume(runner: &dyn JobRunner, config: &HelicalSearchConfig, target: &Path) -> Result<(), EngineError> {
    if let Some(prep) = DihedralPrep::for_mode(config.dihedral, config.input_volume.clone(), target.to_path_buf()) {
        prep.run(runner)?;
        return Ok(());
    }

    let input = &config.input_volume;
    if input.extension() == target.extension() {
        if runner.executes() {
            debug!(from = %input.display(), to = %target.display(), "Copying input volume.");
            fs::copy(input, target).map_err(|e| EngineError::io(input, e))?;
        }
        return Ok(());
    }
    runner.run(&JobSpec::new(IMAGE_CONVERT).path("-i", input).path("-o", target))?;
    Ok(())
}
