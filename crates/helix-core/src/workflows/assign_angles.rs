use crate::core::alignment::assign_angles;
use crate::core::io::metadata::{MetadataError, MetadataFile, MetadataTable};
use crate::core::io::traits::EmFile;
use crate::engine::config::AngleAssignConfig;
use crate::engine::error::EngineError;
use rand::Rng;
use std::fs;
use std::path::Path;
use tracing::{info, instrument};

const DEFAULT_TABLE: &str = "particles";

pub(crate) fn select_table<'a>(
    file: &'a mut MetadataFile,
    name: Option<&str>,
) -> Result<&'a mut MetadataTable, MetadataError> {
    if let Some(name) = name {
        return file
            .table_mut(name)
            .ok_or_else(|| MetadataError::MissingTable(name.to_string()));
    }
    let idx = file
        .tables
        .iter()
        .position(|t| t.name == DEFAULT_TABLE)
        .or_else(|| file.tables.iter().position(|t| t.is_loop))
        .ok_or_else(|| MetadataError::MissingTable(DEFAULT_TABLE.to_string()))?;
    Ok(&mut file.tables[idx])
}

/// Sets initial angles on the particles of `input` and writes the result to
/// `output`. Returns the number of particles updated.
#[instrument(skip_all, name = "assign_angles_workflow")]
pub fn run(
    input: &Path,
    output: &Path,
    config: &AngleAssignConfig,
    rng: &mut impl Rng,
) -> Result<usize, EngineError> {
    let mut file = MetadataFile::read_from_path(input).map_err(|e| EngineError::metadata(input, e))?;
    let table = select_table(&mut file, config.table.as_deref()).map_err(|e| EngineError::metadata(input, e))?;

    let updated = assign_angles(table, config.assignment, rng);
    info!(
        table = %table.name,
        particles = updated,
        tilt_90 = config.assignment.assign_tilt_90,
        random_rot = config.assignment.randomize_rot,
        "Assigned initial angles."
    );

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| EngineError::io(parent, e))?;
    }
    file.write_to_path(output)
        .map_err(|e| EngineError::metadata(output, e))?;
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::alignment::AngleAssignment;
    use crate::core::io::metadata::Label;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use tempfile::tempdir;

    const PARTICLES: &str = "
data_optics

loop_
_rlnOpticsGroup #1
_rlnVoltage #2
1 300.0

data_particles

loop_
_rlnCoordinateX #1
_rlnCoordinateY #2
_rlnHelicalTubeID #3
100 200 1
150 260 1
900 40 2
";

    fn both() -> AngleAssignConfig {
        AngleAssignConfig {
            assignment: AngleAssignment {
                assign_tilt_90: true,
                randomize_rot: true,
            },
            ..Default::default()
        }
    }

    #[test]
    fn updates_particles_table_and_keeps_others() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("particles.star");
        let output = dir.path().join("out/particles_angles.star");
        fs::write(&input, PARTICLES).unwrap();

        let updated = run(&input, &output, &both(), &mut StdRng::seed_from_u64(11)).unwrap();
        assert_eq!(updated, 3);

        let file = MetadataFile::read_from_path(&output).unwrap();
        assert_eq!(file.tables.len(), 2);
        assert_eq!(file.table("optics").unwrap().labels.len(), 2);
        let particles = file.table("particles").unwrap();
        for row in particles.iter() {
            assert_eq!(row.f64(Label::AngleTilt).unwrap(), 90.0);
            let rot = row.f64(Label::AngleRot).unwrap();
            assert!((-180.0..=179.0).contains(&rot));
            assert_eq!(rot.fract(), 0.0);
        }
    }

    #[test]
    fn falls_back_to_first_loop_table() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.star");
        let output = dir.path().join("out.star");
        fs::write(&input, "data_\nloop_\n_rlnCoordinateX\n_rlnCoordinateY\n1 2\n").unwrap();

        assert_eq!(run(&input, &output, &both(), &mut StdRng::seed_from_u64(1)).unwrap(), 1);
    }

    #[test]
    fn unknown_table_name_is_an_error() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.star");
        fs::write(&input, PARTICLES).unwrap();
        let config = AngleAssignConfig {
            table: Some("images".to_string()),
            ..both()
        };

        let err = run(&input, &dir.path().join("o.star"), &config, &mut StdRng::seed_from_u64(1)).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Metadata { source: MetadataError::MissingTable(ref t), .. } if t == "images"
        ));
    }
}
