use crate::engine::config::DihedralMode;
use crate::engine::helical::SYMMETRIZE;
use crate::engine::runner::{JobRunner, JobSpec, RunnerError};
use std::path::PathBuf;

pub const GEOMETRY: &str = "xmipp_transform_geometry";
pub const IMAGE_OPERATE: &str = "xmipp_image_operate";

/// Imposes two-fold symmetry perpendicular to the helix axis before the
/// helical search.
#[derive(Debug, Clone, PartialEq)]
pub struct DihedralPrep {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Assume the two-fold axis is X instead of searching for it.
    pub force_x: bool,
}

impl DihedralPrep {
    /// `None` when the mode does not ask for dihedral symmetry.
    pub fn for_mode(mode: DihedralMode, input: PathBuf, output: PathBuf) -> Option<Self> {
        let force_x = match mode {
            DihedralMode::None => return None,
            DihedralMode::Search => false,
            DihedralMode::ForceX => true,
        };
        Some(Self {
            input,
            output,
            force_x,
        })
    }

    pub fn specs(&self) -> Vec<JobSpec> {
        if !self.force_x {
            return vec![
                JobSpec::new(SYMMETRIZE)
                    .path("-i", &self.input)
                    .path("-o", &self.output)
                    .args(["--sym", "dihedral", "--dont_wrap"]),
            ];
        }
        // Average the volume with its copy rotated 180 degrees about X.
        vec![
            JobSpec::new(GEOMETRY)
                .path("-i", &self.input)
                .path("-o", &self.output)
                .args(["--rotate_volume", "axis", "180", "1", "0", "0"]),
            JobSpec::new(IMAGE_OPERATE)
                .path("-i", &self.input)
                .path("--plus", &self.output)
                .path("-o", &self.output),
            JobSpec::new(IMAGE_OPERATE)
                .path("-i", &self.output)
                .opt("--mult", "0.5"),
        ]
    }

    pub fn run(&self, runner: &dyn JobRunner) -> Result<(), RunnerError> {
        for job in self.specs() {
            runner.run(&job)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::runner::DryRunRunner;

    #[test]
    fn no_prep_without_dihedral_symmetry() {
        assert!(DihedralPrep::for_mode(DihedralMode::None, "a".into(), "b".into()).is_none());
    }

    #[test]
    fn searched_axis_is_a_single_symmetrize_call() {
        let prep = DihedralPrep::for_mode(DihedralMode::Search, "in.mrc".into(), "sym.vol".into()).unwrap();
        let specs = prep.specs();
        assert_eq!(specs.len(), 1);
        assert_eq!(
            specs[0].to_string(),
            "xmipp_transform_symmetrize -i in.mrc -o sym.vol --sym dihedral --dont_wrap"
        );
    }

    #[test]
    fn forced_x_axis_averages_with_rotated_copy() {
        let prep = DihedralPrep::for_mode(DihedralMode::ForceX, "in.mrc".into(), "sym.vol".into()).unwrap();
        let runner = DryRunRunner::new();
        prep.run(&runner).unwrap();
        let lines: Vec<_> = runner.jobs().iter().map(ToString::to_string).collect();
        assert_eq!(
            lines,
            vec![
                "xmipp_transform_geometry -i in.mrc -o sym.vol --rotate_volume axis 180 1 0 0",
                "xmipp_image_operate -i in.mrc --plus sym.vol -o sym.vol",
                "xmipp_image_operate -i sym.vol --mult 0.5",
            ]
        );
    }
}
