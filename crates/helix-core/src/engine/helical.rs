use super::config::SearchRange;
use super::error::EngineError;
use super::runner::{JobRunner, JobSpec};
use crate::core::io::metadata::{self, Label};
use crate::core::models::helix::HelicalParams;
use std::path::Path;
use tracing::{debug, info};

pub const FIND_SYMMETRY: &str = "xmipp_volume_find_symmetry";
pub const SYMMETRIZE: &str = "xmipp_transform_symmetrize";
pub const MASK: &str = "xmipp_transform_mask";

/// Cylindrical (or tubular, with an inner radius) mask around the Z axis,
/// in voxels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CylinderMask {
    pub inner_radius: Option<u32>,
    pub outer_radius: u32,
    pub height: u32,
}

impl CylinderMask {
    /// Interprets radii where non-positive values mean "unset". Without an
    /// outer radius there is no mask at all.
    pub fn from_radii(inner: i32, outer: i32, height: u32) -> Option<Self> {
        let outer_radius = u32::try_from(outer).ok().filter(|&r| r > 0)?;
        let inner_radius = u32::try_from(inner).ok().filter(|&r| r > 0);
        Some(Self {
            inner_radius,
            outer_radius,
            height,
        })
    }

    // Xmipp takes mask geometry as negative numbers, meaning "in voxels".
    fn args(&self) -> Vec<String> {
        let mut args = vec!["--mask".to_string()];
        match self.inner_radius {
            None => args.push("cylinder".to_string()),
            Some(inner) => {
                args.push("tube".to_string());
                args.push(format!("-{inner}"));
            }
        }
        args.push(format!("-{}", self.outer_radius));
        args.push(format!("-{}", self.height));
        args
    }
}

/// Reads `(rotation, rise)` from the first row of a symmetry-search result.
pub fn params_from_metadata(path: &Path) -> Result<HelicalParams, EngineError> {
    if !path.exists() {
        return Err(EngineError::MissingOutput(path.to_path_buf()));
    }
    let row = metadata::first_row(path).map_err(|e| EngineError::metadata(path, e))?;
    let row = row.as_row();
    let rotation = row
        .f64(Label::AngleRot)
        .map_err(|e| EngineError::metadata(path, e))?;
    let rise = row
        .f64(Label::ShiftZ)
        .map_err(|e| EngineError::metadata(path, e))?;
    Ok(HelicalParams::new(rotation, rise))
}

/// Finds and imposes helical symmetry on a volume with Xmipp.
#[derive(Debug, Clone, PartialEq)]
pub struct HelicalFinder {
    sampling: f64,
    height_fraction: f64,
    dihedral: bool,
    mask: Option<CylinderMask>,
}

impl HelicalFinder {
    pub fn new(sampling: f64, height_fraction: f64, dihedral: bool) -> Self {
        Self {
            sampling,
            height_fraction,
            dihedral,
            mask: None,
        }
    }

    pub fn with_mask(mut self, mask: Option<CylinderMask>) -> Self {
        self.mask = mask;
        self
    }

    pub fn symmetry(&self) -> &'static str {
        if self.dihedral { "helicalDihedral" } else { "helical" }
    }

    pub fn mask(&self) -> Option<&CylinderMask> {
        self.mask.as_ref()
    }

    fn common_job(&self, program: &str, input: &Path, output: &Path, with_mask: bool) -> JobSpec {
        let job = JobSpec::new(program)
            .path("-i", input)
            .path("-o", output)
            .opt("--sym", self.symmetry())
            .opt("--heightFraction", format!("{:.6}", self.height_fraction))
            .opt("--sampling", format!("{:.6}", self.sampling));
        match (&self.mask, with_mask) {
            (Some(mask), true) => job.args(mask.args()),
            _ => job,
        }
    }

    pub fn coarse_search_job(
        &self,
        volume: &Path,
        output: &Path,
        z: SearchRange,
        rot: SearchRange,
        threads: usize,
    ) -> JobSpec {
        self.common_job(FIND_SYMMETRY, volume, output, true)
            .args([
                "-z".to_string(),
                format!("{:.6}", z.start),
                format!("{:.6}", z.end),
                format!("{:.6}", z.step),
                "--rotHelical".to_string(),
                format!("{:.6}", rot.start),
                format!("{:.6}", rot.end),
                format!("{:.6}", rot.step),
            ])
            .opt("--thr", threads)
    }

    /// Local refinement around `start`; the grid bounds are kept and the step
    /// is left to Xmipp's local optimiser.
    pub fn fine_search_job(
        &self,
        volume: &Path,
        output: &Path,
        start: HelicalParams,
        z: SearchRange,
        rot: SearchRange,
    ) -> JobSpec {
        self.common_job(FIND_SYMMETRY, volume, output, true).args([
            "--localHelical".to_string(),
            format!("{:.6}", start.rise),
            format!("{:.6}", start.rotation),
            "-z".to_string(),
            format!("{:.6}", z.start),
            format!("{:.6}", z.end),
            "1".to_string(),
            "--rotHelical".to_string(),
            format!("{:.6}", rot.start),
            format!("{:.6}", rot.end),
            "1".to_string(),
        ])
    }

    pub fn symmetrize_jobs(&self, volume: &Path, params: HelicalParams, output: &Path) -> Vec<JobSpec> {
        let mut jobs = vec![self.common_job(SYMMETRIZE, volume, output, false).args([
            "--helixParams".to_string(),
            format!("{:.6}", params.rise),
            format!("{:.6}", params.rotation),
        ])];
        if let Some(mask) = &self.mask {
            jobs.push(JobSpec::new(MASK).path("-i", output).args(mask.args()));
        }
        jobs
    }

    pub fn search_coarse(
        &self,
        runner: &dyn JobRunner,
        volume: &Path,
        output: &Path,
        z: SearchRange,
        rot: SearchRange,
        threads: usize,
    ) -> Result<(), EngineError> {
        info!(volume = %volume.display(), "Coarse helical symmetry search");
        runner.run(&self.coarse_search_job(volume, output, z, rot, threads))?;
        Ok(())
    }

    /// Refines the coarse result stored in `coarse` and returns the starting
    /// point that was used.
    pub fn search_fine(
        &self,
        runner: &dyn JobRunner,
        volume: &Path,
        coarse: &Path,
        output: &Path,
        z: SearchRange,
        rot: SearchRange,
    ) -> Result<HelicalParams, EngineError> {
        let start = params_from_metadata(coarse)?;
        info!(rotation = start.rotation, rise = start.rise, "Fine helical symmetry search");
        runner.run(&self.fine_search_job(volume, output, start, z, rot))?;
        Ok(start)
    }

    /// Imposes the parameters stored in `params_md` and masks the result when
    /// a mask is configured.
    pub fn symmetrize(
        &self,
        runner: &dyn JobRunner,
        volume: &Path,
        params_md: &Path,
        output: &Path,
    ) -> Result<HelicalParams, EngineError> {
        let params = params_from_metadata(params_md)?;
        for job in self.symmetrize_jobs(volume, params, output) {
            debug!(program = %job.program, "Symmetrize step");
            runner.run(&job)?;
        }
        Ok(params)
    }
}
