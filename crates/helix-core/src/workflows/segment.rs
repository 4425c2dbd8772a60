use crate::core::io::box_file::{HelixBoxFile, ParticleBoxFile};
use crate::core::io::matching::match_micrograph;
use crate::core::io::metadata::{Label, MetadataFile, MetadataTable};
use crate::core::io::traits::EmFile;
use crate::core::models::ids::{FilamentId, MicrographId};
use crate::core::models::sets::{SetOfCoordinates, SetOfFilaments, SetOfMicrographs};
use crate::core::segmentation::{overlap_angstrom_to_pixels, segment_set};
use crate::engine::config::{CoordinateFormat, SegmentationConfig};
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

#[derive(Debug, Clone)]
pub struct SegmentationResult {
    pub filaments: SetOfFilaments,
    pub coordinates: SetOfCoordinates,
    /// Filament files for which no micrograph was found.
    pub unmatched: Vec<PathBuf>,
}

#[instrument(skip_all, name = "segment_workflow")]
pub fn run(
    micrographs: &SetOfMicrographs,
    filament_files: &[PathBuf],
    config: &SegmentationConfig,
    reporter: &ProgressReporter,
) -> Result<SegmentationResult, EngineError> {
    let overlap_px = overlap_angstrom_to_pixels(config.overlap, micrographs.sampling_rate())?;
    info!(
        box_size = config.box_size,
        overlap_px,
        files = filament_files.len(),
        "Segmenting filaments."
    );

    let (filaments, unmatched) = reporter.phase("Reading filaments", || {
        read_filaments(micrographs, filament_files, config.box_size, reporter)
    })?;

    let mut result = segment_filaments(filaments, micrographs.sampling_rate(), config, reporter)?;
    result.unmatched = unmatched;
    Ok(result)
}

/// Segments filaments that are already in memory, e.g. as exported by the
/// helix boxer.
pub fn segment_filaments(
    filaments: SetOfFilaments,
    sampling_rate: f64,
    config: &SegmentationConfig,
    reporter: &ProgressReporter,
) -> Result<SegmentationResult, EngineError> {
    let overlap_px = overlap_angstrom_to_pixels(config.overlap, sampling_rate)?;
    let coordinates = reporter.phase("Segmenting", || {
        segment_set(&filaments, config.box_size, overlap_px)
    })?;

    info!(
        filaments = filaments.len(),
        coordinates = coordinates.len(),
        "Segmentation finished."
    );
    Ok(SegmentationResult {
        filaments,
        coordinates,
        unmatched: Vec::new(),
    })
}

fn read_filaments(
    micrographs: &SetOfMicrographs,
    filament_files: &[PathBuf],
    box_size: u32,
    reporter: &ProgressReporter,
) -> Result<(SetOfFilaments, Vec<PathBuf>), EngineError> {
    let mut filaments = SetOfFilaments::with_box_size(box_size);
    let mut unmatched = Vec::new();

    reporter.report(Progress::TaskStart {
        total_steps: filament_files.len() as u64,
    });
    for path in filament_files {
        reporter.report(Progress::TaskIncrement);
        let Some((mic_id, mic)) = match_micrograph(path, micrographs) else {
            warn!(file = %path.display(), "No micrograph matches this filament file; skipping.");
            unmatched.push(path.clone());
            continue;
        };

        let boxes = HelixBoxFile::read_from_path(path).map_err(|source| EngineError::BoxFile {
            path: path.clone(),
            source,
        })?;
        info!(
            file = %path.display(),
            micrograph = %mic.path().display(),
            helices = boxes.len(),
            "Read filaments."
        );
        for filament in boxes.to_filaments(mic_id) {
            filaments.insert(filament);
        }
    }
    reporter.report(Progress::TaskFinish);

    Ok((filaments, unmatched))
}

/// Output path of every micrograph that has coordinates, in set order.
///
/// Two micrographs sharing a file stem (e.g. `a/mic.mrc` and `b/mic.mrc`)
/// would overwrite each other, so that is reported before anything is written.
fn coordinate_outputs(
    result: &SegmentationResult,
    micrographs: &SetOfMicrographs,
    dir: &Path,
    format: CoordinateFormat,
) -> Result<Vec<(MicrographId, PathBuf)>, EngineError> {
    let mut owners: HashMap<PathBuf, &Path> = HashMap::new();
    let mut outputs = Vec::new();
    for (mic_id, mic) in micrographs.iter() {
        if result.coordinates.for_micrograph(mic_id).next().is_none() {
            continue;
        }
        let stem = mic.stem().unwrap_or("micrograph");
        let path = dir.join(format!("{stem}_coords.{}", format.extension()));
        if let Some(first) = owners.insert(path.clone(), mic.path()) {
            return Err(EngineError::OutputCollision {
                output: path,
                first: first.to_path_buf(),
                second: mic.path().to_path_buf(),
            });
        }
        outputs.push((mic_id, path));
    }
    Ok(outputs)
}

/// Writes one coordinate file per micrograph that has coordinates, named
/// `<stem>_coords.box` or `<stem>_coords.star`. Returns the written paths.
pub fn write_coordinates(
    result: &SegmentationResult,
    micrographs: &SetOfMicrographs,
    dir: &Path,
    format: CoordinateFormat,
) -> Result<Vec<PathBuf>, EngineError> {
    let box_size = result
        .coordinates
        .box_size()
        .ok_or_else(|| EngineError::Internal("segmented coordinates carry no box size".to_string()))?;
    let outputs = coordinate_outputs(result, micrographs, dir, format)?;
    fs::create_dir_all(dir).map_err(|e| EngineError::io(dir, e))?;

    let mut written = Vec::new();
    for (mic_id, path) in outputs {
        match format {
            CoordinateFormat::Box => {
                ParticleBoxFile::from_coordinates(result.coordinates.for_micrograph(mic_id), box_size)
                    .write_to_path(&path)
                    .map_err(|source| EngineError::BoxFile {
                        path: path.clone(),
                        source,
                    })?;
            }
            CoordinateFormat::Star => {
                // Relion tube ids are 1-based and local to the micrograph.
                let tube_ids: HashMap<FilamentId, usize> = result
                    .filaments
                    .for_micrograph(mic_id)
                    .enumerate()
                    .map(|(i, (id, _))| (id, i + 1))
                    .collect();
                let mut table = MetadataTable::new(
                    "",
                    vec![
                        Label::CoordinateX.star_name().to_string(),
                        Label::CoordinateY.star_name().to_string(),
                        Label::HelicalTubeId.star_name().to_string(),
                    ],
                );
                table.rows = result
                    .coordinates
                    .for_micrograph(mic_id)
                    .map(|c| {
                        let tube = c.filament_id.and_then(|f| tube_ids.get(&f)).copied().unwrap_or(0);
                        vec![c.x().to_string(), c.y().to_string(), tube.to_string()]
                    })
                    .collect();
                MetadataFile {
                    tables: vec![table],
                }
                .write_to_path(&path)
                .map_err(|e| EngineError::metadata(&path, e))?;
            }
        }
        written.push(path);
    }
    Ok(written)
}
