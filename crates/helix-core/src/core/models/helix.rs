use serde::{Deserialize, Serialize};

/// Repeat unit of a helical structure: successive subunits are related by a
/// rotation of `rotation` degrees about the helix axis and a translation of
/// `rise` Angstroms along it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HelicalParams {
    /// Twist between consecutive subunits, in degrees.
    pub rotation: f64,
    /// Axial rise between consecutive subunits, in Angstroms.
    pub rise: f64,
}

impl HelicalParams {
    pub fn new(rotation: f64, rise: f64) -> Self {
        Self { rotation, rise }
    }

    /// Axial rise expressed in voxels of a map sampled at `sampling` Å/px.
    pub fn rise_in_voxels(&self, sampling: f64) -> f64 {
        self.rise / sampling
    }
}
