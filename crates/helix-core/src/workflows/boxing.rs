use crate::core::io::box_file::HelixBoxFile;
use crate::core::io::traits::EmFile;
use crate::core::models::ids::MicrographId;
use crate::core::models::micrograph::Micrograph;
use crate::core::models::sets::{SetOfFilaments, SetOfMicrographs};
use crate::engine::error::EngineError;
use crate::engine::jobs::ExternalJob;
use crate::engine::jobs::boxer::{HelixBoxerExport, HelixBoxerGui, boxer_warnings};
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::runner::JobRunner;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct BoxingResult {
    pub filaments: SetOfFilaments,
    /// Micrographs whose export failed; they contribute no filaments.
    pub failed: Vec<MicrographId>,
    pub coordinate_files: Vec<PathBuf>,
}

fn absolute(path: &Path) -> Result<PathBuf, EngineError> {
    std::path::absolute(path).map_err(|e| EngineError::io(path, e))
}

fn absolute_micrographs(micrographs: &SetOfMicrographs) -> Result<Vec<PathBuf>, EngineError> {
    micrographs.iter().map(|(_, m)| absolute(m.path())).collect()
}

fn export_path(extra_dir: &Path, mic: &Micrograph) -> PathBuf {
    let stem = mic.stem().unwrap_or("micrograph");
    extra_dir.join(format!("{stem}_coords.box"))
}

/// Opens the interactive helix boxer on every micrograph.
///
/// EMAN2 keeps the boxed helices in a database under its working directory,
/// so `working_dir` must be the same directory later passed to
/// [`export_filaments`].
pub fn pick_interactively(
    runner: &dyn JobRunner,
    micrographs: &SetOfMicrographs,
    working_dir: &Path,
    helix_width: u32,
) -> Result<(), EngineError> {
    for warning in boxer_warnings(micrographs.iter().map(|(_, m)| m)) {
        warn!("{warning}");
    }
    fs::create_dir_all(working_dir).map_err(|e| EngineError::io(working_dir, e))?;
    HelixBoxerGui {
        micrographs: absolute_micrographs(micrographs)?,
        helix_width,
        working_dir: Some(absolute(working_dir)?),
    }
    .run(runner)?;
    Ok(())
}

/// Exports the boxed helices of every micrograph to `extra_dir` and reads
/// them back as filaments. The boxer runs inside `extra_dir`.
#[instrument(skip_all, name = "boxing_workflow")]
pub fn export_filaments(
    runner: &dyn JobRunner,
    micrographs: &SetOfMicrographs,
    extra_dir: &Path,
    box_size: u32,
    reporter: &ProgressReporter,
) -> Result<BoxingResult, EngineError> {
    fs::create_dir_all(extra_dir).map_err(|e| EngineError::io(extra_dir, e))?;
    let extra_dir = absolute(extra_dir)?;

    let mut result = BoxingResult {
        filaments: SetOfFilaments::with_box_size(box_size),
        failed: Vec::new(),
        coordinate_files: Vec::new(),
    };

    let mut owners: HashMap<PathBuf, &Path> = HashMap::new();
    for (_, mic) in micrographs.iter() {
        let output = export_path(&extra_dir, mic);
        if let Some(first) = owners.insert(output.clone(), mic.path()) {
            return Err(EngineError::OutputCollision {
                output,
                first: first.to_path_buf(),
                second: mic.path().to_path_buf(),
            });
        }
    }

    reporter.report(Progress::TaskStart {
        total_steps: micrographs.len() as u64,
    });
    for (mic_id, mic) in micrographs.iter() {
        reporter.report(Progress::TaskIncrement);
        let output = export_path(&extra_dir, mic);
        let export = HelixBoxerExport {
            micrograph: absolute(mic.path())?,
            output: output.clone(),
            working_dir: Some(extra_dir.clone()),
        };

        if let Err(e) = export.run(runner) {
            warn!(micrograph = %mic.path().display(), error = %e, "Helix export failed; no filaments for this micrograph.");
            result.failed.push(mic_id);
            continue;
        }
        if !runner.executes() {
            continue;
        }
        if !output.exists() {
            debug!(micrograph = %mic.path().display(), "No helices were boxed.");
            continue;
        }

        let boxes = HelixBoxFile::read_from_path(&output).map_err(|source| EngineError::BoxFile {
            path: output.clone(),
            source,
        })?;
        for filament in boxes.to_filaments(mic_id) {
            result.filaments.insert(filament);
        }
        result.coordinate_files.push(output);
    }
    reporter.report(Progress::TaskFinish);

    info!(
        filaments = result.filaments.len(),
        failed = result.failed.len(),
        "Filament export finished."
    );
    Ok(result)
}
