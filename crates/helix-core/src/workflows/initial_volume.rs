use super::assign_angles::select_table;
use crate::core::alignment::assign_side_views;
use crate::core::io::metadata::{MetadataFile, MetadataTable};
use crate::core::io::mrc;
use crate::core::io::traits::EmFile;
use crate::engine::config::{ConfigError, InitialVolumeConfig};
use crate::engine::error::EngineError;
use crate::engine::helical::HelicalFinder;
use crate::engine::jobs::ExternalJob;
use crate::engine::jobs::initial::{HorizontalMask, ImageAlign, ReconstructFourier};
use crate::engine::progress::ProgressReporter;
use crate::engine::runner::{JobRunner, ReportingRunner};
use rand::Rng;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Files produced under the output directory of an initial-volume run.
#[derive(Debug, Clone, PartialEq)]
pub struct InitialVolumePaths {
    pub mask: PathBuf,
    pub averages: PathBuf,
    pub alignment_root: PathBuf,
    pub particles: PathBuf,
    pub initial_volume: PathBuf,
    pub helical_volume: PathBuf,
}

impl InitialVolumePaths {
    pub fn new(output_dir: &Path) -> Self {
        let extra = output_dir.join("extra");
        Self {
            mask: extra.join("horizontal_mask.spi"),
            averages: extra.join("averages.xmd"),
            alignment_root: extra.join("align"),
            particles: extra.join("input_particles.xmd"),
            initial_volume: output_dir.join("initial_volume.vol"),
            helical_volume: output_dir.join("helical_volume.vol"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InitialVolumeResult {
    pub paths: InitialVolumePaths,
    /// Particles that received side-view angles.
    pub particles: usize,
}

/// File part of an Xmipp image location such as `3@classes.stk`.
fn image_file(location: &str) -> &Path {
    Path::new(location.split_once('@').map_or(location, |(_, file)| file))
}

fn mask_width(config: &InitialVolumeConfig, first_average: &str) -> Result<u32, EngineError> {
    if let Some(width) = config.mask_width {
        return Ok(width);
    }
    let file = image_file(first_average);
    let dims = mrc::read_dimensions_from_path(file).map_err(|source| EngineError::VolumeHeader {
        path: file.to_path_buf(),
        source,
    })?;
    Ok(dims.nx)
}

fn averages_table(averages: &[String]) -> MetadataTable {
    let mut table = MetadataTable::new("", vec!["image".to_string(), "itemId".to_string()]);
    table.rows = averages
        .iter()
        .enumerate()
        .map(|(i, location)| vec![location.clone(), (i + 1).to_string()])
        .collect();
    table
}

fn write_side_view_particles(
    input: &Path,
    output: &Path,
    rng: &mut impl Rng,
) -> Result<usize, EngineError> {
    let mut file = MetadataFile::read_from_path(input).map_err(|e| EngineError::metadata(input, e))?;
    let table = select_table(&mut file, None).map_err(|e| EngineError::metadata(input, e))?;
    let updated = assign_side_views(table, rng);
    file.write_to_path(output)
        .map_err(|e| EngineError::metadata(output, e))?;
    Ok(updated)
}

/// Reconstructs a helical starting volume from 2D class averages.
///
/// The averages are aligned to a horizontal band, every particle is given a
/// side view (tilt 90, random rotation), and the Fourier reconstruction is
/// symmetrized with dihedral helical symmetry.
#[instrument(skip_all, name = "initial_volume_workflow")]
pub fn run(
    runner: &dyn JobRunner,
    config: &InitialVolumeConfig,
    rng: &mut impl Rng,
    reporter: &ProgressReporter,
) -> Result<InitialVolumeResult, EngineError> {
    let first_average = config
        .averages
        .first()
        .ok_or(ConfigError::MissingParameter("averages"))?;
    let width = mask_width(config, first_average)?;

    let paths = InitialVolumePaths::new(&config.output_dir);
    for dir in [&config.output_dir, &config.output_dir.join("extra")] {
        fs::create_dir_all(dir).map_err(|e| EngineError::io(dir, e))?;
    }
    let runner = &ReportingRunner::new(runner, reporter);
    info!(
        averages = config.averages.len(),
        particles = %config.particles.display(),
        mask_width = width,
        "Building initial helical volume."
    );

    reporter.phase("Aligning averages", || -> Result<(), EngineError> {
        HorizontalMask {
            reference: first_average.clone(),
            width,
            output: paths.mask.clone(),
        }
        .run(runner)?;
        MetadataFile {
            tables: vec![averages_table(&config.averages)],
        }
        .write_to_path(&paths.averages)
        .map_err(|e| EngineError::metadata(&paths.averages, e))?;
        ImageAlign {
            input: paths.averages.clone(),
            reference: paths.mask.clone(),
            output_root: paths.alignment_root.clone(),
        }
        .run(runner)?;
        Ok(())
    })?;

    let particles = reporter.phase("Assigning side views", || {
        write_side_view_particles(&config.particles, &paths.particles, rng)
    })?;
    debug!(particles, "Side-view angles assigned.");

    reporter.phase("Reconstructing", || {
        ReconstructFourier {
            input: paths.particles.clone(),
            output: paths.initial_volume.clone(),
            sampling: config.sampling,
            threads: config.threads,
        }
        .run(runner)
    })?;

    let finder = HelicalFinder::new(config.sampling, config.height_fraction, true);
    reporter.phase("Symmetrizing", || -> Result<(), EngineError> {
        for job in finder.symmetrize_jobs(&paths.initial_volume, config.helix, &paths.helical_volume) {
            runner.run(&job)?;
        }
        Ok(())
    })?;

    if runner.executes() && !paths.helical_volume.exists() {
        return Err(EngineError::MissingOutput(paths.helical_volume.clone()));
    }
    info!(volume = %paths.helical_volume.display(), "Initial helical volume ready.");
    Ok(InitialVolumeResult { paths, particles })
}
