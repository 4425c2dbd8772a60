use crate::core::io::metadata::{Label, MetadataTable};
use rand::Rng;

/// Which initial Euler angles to set on helical segments before refinement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AngleAssignment {
    /// Segments lie in the micrograph plane, so their tilt is 90 degrees.
    pub assign_tilt_90: bool,
    /// Replace the in-plane rotation with a uniform random integer in
    /// `[-180, 179]`.
    pub randomize_rot: bool,
}

impl AngleAssignment {
    pub fn is_noop(&self) -> bool {
        !self.assign_tilt_90 && !self.randomize_rot
    }
}

/// Sets the requested angles on every row of `table`, adding the Relion
/// columns when absent. Returns the number of rows updated.
pub fn assign_angles(table: &mut MetadataTable, assignment: AngleAssignment, rng: &mut impl Rng) -> usize {
    if assignment.is_noop() {
        return 0;
    }

    let tilt_col = assignment
        .assign_tilt_90
        .then(|| table.ensure_column(Label::AngleTilt, "0"));
    let rot_col = assignment
        .randomize_rot
        .then(|| table.ensure_column(Label::AngleRot, "0"));

    for row in &mut table.rows {
        if let Some(col) = tilt_col {
            row[col] = "90".to_string();
        }
        if let Some(col) = rot_col {
            row[col] = rng.gen_range(-180..=179).to_string();
        }
    }
    table.rows.len()
}

/// Side-view priors for reconstructing an initial helical volume: tilt 90
/// and a uniform random rotation in `[0, 360)`. Returns the number of rows
/// updated.
pub fn assign_side_views(table: &mut MetadataTable, rng: &mut impl Rng) -> usize {
    let tilt_col = table.ensure_column(Label::AngleTilt, "0");
    let rot_col = table.ensure_column(Label::AngleRot, "0");
    for row in &mut table.rows {
        row[tilt_col] = "90".to_string();
        row[rot_col] = format!("{:.6}", rng.gen_range(0.0..360.0));
    }
    table.rows.len()
}
