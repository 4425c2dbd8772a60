use super::ExternalJob;
use crate::core::io::metadata::{MetadataError, MetadataFile};
use crate::core::io::traits::EmFile;
use crate::engine::error::EngineError;
use crate::engine::runner::JobSpec;
use std::fs;
use std::path::{Path, PathBuf};

pub const MOTIONCORR: &str = "relion_run_motioncorr";

#[derive(Debug, Clone, PartialEq)]
pub struct DoseWeighting {
    /// Acceleration voltage in kV.
    pub voltage: u32,
    /// Electrons per Å² per frame.
    pub dose_per_frame: f64,
    pub pre_exposure: f64,
    /// Also keep the sum without dose weighting.
    pub save_non_weighted: bool,
}

/// Relion's own motion correction, run on one movie inside `movie_dir`.
///
/// Paths in the command line are relative to `movie_dir`; results land in
/// its `output/` subdirectory.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionCorrJob {
    pub movie_dir: PathBuf,
    pub input_star: String,
    pub first_frame: u32,
    /// Last frame to sum; `0` means the last frame of the movie.
    pub last_frame: u32,
    pub bin_factor: f64,
    pub bfactor: u32,
    pub sampling: f64,
    pub patches: (u32, u32),
    pub threads: usize,
    pub dose_weighting: Option<DoseWeighting>,
}

impl MotionCorrJob {
    pub fn new(movie_dir: PathBuf, input_star: impl Into<String>, sampling: f64) -> Self {
        Self {
            movie_dir,
            input_star: input_star.into(),
            first_frame: 1,
            last_frame: 0,
            bin_factor: 1.0,
            bfactor: 150,
            sampling,
            patches: (1, 1),
            threads: 4,
            dose_weighting: None,
        }
    }

    /// Writes the single-column movie list the job reads, creating the
    /// `output/` directory next to it.
    pub fn write_input_star(&self, movies: &[PathBuf]) -> Result<PathBuf, EngineError> {
        let output_dir = self.movie_dir.join("output");
        fs::create_dir_all(&output_dir).map_err(|e| EngineError::io(&output_dir, e))?;

        let mut content = String::from("data_\nloop_\n_rlnMicrographMovieName\n");
        for movie in movies {
            let name = movie.file_name().unwrap_or(movie.as_os_str());
            content.push_str(&name.to_string_lossy());
            content.push('\n');
        }
        let path = self.movie_dir.join(&self.input_star);
        fs::write(&path, content).map_err(|e| EngineError::io(&path, e))?;
        Ok(path)
    }
}

impl ExternalJob for MotionCorrJob {
    fn spec(&self) -> JobSpec {
        let job = JobSpec::new(MOTIONCORR)
            .opt("--i", &self.input_star)
            .opt("--o", "output/")
            .args(["--use_motioncor2", "--use_own", "--motioncor2_exe", "fake_mc2"])
            .opt("--first_frame_sum", self.first_frame)
            .opt("--last_frame_sum", self.last_frame)
            .opt("--bin_factor", format!("{:.6}", self.bin_factor))
            .opt("--bfactor", self.bfactor)
            .opt("--angpix", format!("{:.6}", self.sampling))
            .opt("--patch_x", self.patches.0)
            .opt("--patch_y", self.patches.1)
            .opt("--j", self.threads)
            .in_dir(&self.movie_dir);

        match &self.dose_weighting {
            None => job,
            Some(dw) => job
                .arg("--dose_weighting")
                .flag_if(dw.save_non_weighted, "--save_noDW")
                .opt("--voltage", dw.voltage)
                .opt("--dose_per_frame", format!("{:.6}", dw.dose_per_frame))
                .opt("--preexposure", format!("{:.6}", dw.pre_exposure)),
        }
    }
}

/// Per-frame `(x, y)` shifts from the `global_shift` table of a motion
/// correction output STAR file.
pub fn read_global_shifts(path: &Path) -> Result<Vec<(f64, f64)>, EngineError> {
    let file = MetadataFile::read_from_path(path).map_err(|e| EngineError::metadata(path, e))?;
    let table = file.table("global_shift").ok_or_else(|| {
        EngineError::metadata(path, MetadataError::MissingLabel("data_global_shift".to_string()))
    })?;

    table
        .iter()
        .map(|row| {
            let value = |name: &str| -> Result<f64, MetadataError> {
                let raw = row
                    .get(name)
                    .ok_or_else(|| MetadataError::MissingLabel(name.to_string()))?;
                raw.parse().map_err(|_| MetadataError::InvalidValue {
                    label: name.to_string(),
                    value: raw.to_string(),
                })
            };
            Ok((value("rlnMicrographShiftX")?, value("rlnMicrographShiftY")?))
        })
        .collect::<Result<Vec<_>, MetadataError>>()
        .map_err(|e| EngineError::metadata(path, e))
}
