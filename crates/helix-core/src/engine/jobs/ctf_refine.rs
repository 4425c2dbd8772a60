use super::ExternalJob;
use crate::core::io::metadata::{Label, MetadataError, MetadataFile};
use crate::core::io::traits::EmFile;
use crate::engine::error::EngineError;
use crate::engine::runner::JobSpec;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CTF_REFINE: &str = "relion_ctf_refine";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AstigmatismFit {
    #[default]
    None,
    PerMicrograph,
    PerParticle,
}

/// Half maps and solvent mask referenced by a Relion `postprocess.star`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostprocessInputs {
    pub half1: PathBuf,
    pub half2: PathBuf,
    pub mask: PathBuf,
}

impl PostprocessInputs {
    pub fn from_star(path: &Path) -> Result<Self, EngineError> {
        let file = MetadataFile::read_from_path(path).map_err(|e| EngineError::metadata(path, e))?;
        let row = file
            .tables
            .iter()
            .filter_map(|t| t.row(0))
            .find(|row| row.label(Label::UnfilteredMapHalf1).is_some())
            .ok_or_else(|| {
                EngineError::metadata(
                    path,
                    MetadataError::MissingLabel(Label::UnfilteredMapHalf1.star_name().to_string()),
                )
            })?;

        let required = |label: Label| {
            row.label(label).map(PathBuf::from).ok_or_else(|| {
                EngineError::metadata(path, MetadataError::MissingLabel(label.star_name().to_string()))
            })
        };
        Ok(Self {
            half1: required(Label::UnfilteredMapHalf1)?,
            half2: required(Label::UnfilteredMapHalf2)?,
            mask: required(Label::MaskName)?,
        })
    }
}

/// Per-particle CTF and beam tilt refinement against a post-processed map.
#[derive(Debug, Clone, PartialEq)]
pub struct CtfRefineJob {
    pub particles: PathBuf,
    pub output_dir: PathBuf,
    pub postprocess_star: PathBuf,
    pub inputs: PostprocessInputs,
    /// Lowest resolution used in the fits, in Angstroms.
    pub min_resolution: f64,
    pub fit_defocus: bool,
    pub astigmatism: AstigmatismFit,
    pub fit_phase_shift: bool,
    pub fit_beamtilt: bool,
    pub threads: usize,
}

impl CtfRefineJob {
    /// Reads the half maps and mask from `postprocess_star`; the fit options
    /// start at Relion's GUI defaults.
    pub fn new(particles: PathBuf, output_dir: PathBuf, postprocess_star: PathBuf) -> Result<Self, EngineError> {
        let inputs = PostprocessInputs::from_star(&postprocess_star)?;
        Ok(Self {
            particles,
            output_dir,
            postprocess_star,
            inputs,
            min_resolution: 30.0,
            fit_defocus: true,
            astigmatism: AstigmatismFit::None,
            fit_phase_shift: false,
            fit_beamtilt: false,
            threads: 1,
        })
    }
}

impl ExternalJob for CtfRefineJob {
    fn spec(&self) -> JobSpec {
        let job = JobSpec::new(CTF_REFINE)
            .path("--i", &self.particles)
            .path("--o", &self.output_dir)
            .path("--f", &self.postprocess_star)
            .path("--m1", &self.inputs.half1)
            .path("--m2", &self.inputs.half2)
            .path("--mask", &self.inputs.mask)
            .opt("--kmin_tilt", format!("{:.3}", self.min_resolution))
            .flag_if(self.fit_defocus, "--fit_defocus");
        let job = match self.astigmatism {
            AstigmatismFit::None => job,
            AstigmatismFit::PerMicrograph => job.arg("--glob_astig"),
            AstigmatismFit::PerParticle => job.arg("--astig"),
        };
        job.flag_if(self.fit_phase_shift, "--fit_phase")
            .flag_if(self.fit_beamtilt, "--fit_beamtilt")
            .opt("--j", self.threads)
    }
}
