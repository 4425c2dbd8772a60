use super::ExternalJob;
use crate::core::models::micrograph::Micrograph;
use crate::engine::runner::JobSpec;
use std::path::PathBuf;

pub const HELIX_BOXER: &str = "e2helixboxer.py";

/// Exports the helices boxed on one micrograph to a helix-coordinate file.
#[derive(Debug, Clone, PartialEq)]
pub struct HelixBoxerExport {
    pub micrograph: PathBuf,
    pub output: PathBuf,
    pub working_dir: Option<PathBuf>,
}

impl ExternalJob for HelixBoxerExport {
    fn spec(&self) -> JobSpec {
        let job = JobSpec::new(HELIX_BOXER)
            .arg(format!("--helix-coords={}", self.output.display()))
            .arg(self.micrograph.display().to_string());
        match &self.working_dir {
            Some(dir) => job.in_dir(dir),
            None => job,
        }
    }
}

/// Opens the interactive boxer on a list of micrographs.
#[derive(Debug, Clone, PartialEq)]
pub struct HelixBoxerGui {
    pub micrographs: Vec<PathBuf>,
    pub helix_width: u32,
    pub working_dir: Option<PathBuf>,
}

impl ExternalJob for HelixBoxerGui {
    fn spec(&self) -> JobSpec {
        let job = JobSpec::new(HELIX_BOXER)
            .opt("--helix-width", self.helix_width)
            .arg("--gui")
            .args(self.micrographs.iter().map(|m| m.display().to_string()));
        match &self.working_dir {
            Some(dir) => job.in_dir(dir),
            None => job,
        }
    }
}

/// Advisory messages for boxing the given micrographs in EMAN2.
pub fn boxer_warnings<'a>(micrographs: impl IntoIterator<Item = &'a Micrograph>) -> Vec<String> {
    let mut iter = micrographs.into_iter();
    match iter.next() {
        Some(first) if first.is_tiff() => vec![
            "Micrographs in .tif format are displayed upside down in EMAN2.".to_string(),
            "The generated coordinates will not be valid for the original images.".to_string(),
            "A workaround is to import the coordinates with the y axis inverted.".to_string(),
        ],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_job_uses_helix_coords_option() {
        let job = HelixBoxerExport {
            micrograph: "../mics/TMV_001.mrc".into(),
            output: "extra/TMV_001_coords.box".into(),
            working_dir: Some("run".into()),
        }
        .spec();
        assert_eq!(
            job.to_string(),
            "e2helixboxer.py --helix-coords=extra/TMV_001_coords.box ../mics/TMV_001.mrc"
        );
        assert_eq!(job.cwd, Some(PathBuf::from("run")));
    }

    #[test]
    fn gui_job_lists_all_micrographs() {
        let job = HelixBoxerGui {
            micrographs: vec!["a.mrc".into(), "b.mrc".into()],
            helix_width: 100,
            working_dir: None,
        }
        .spec();
        assert_eq!(job.to_string(), "e2helixboxer.py --helix-width 100 --gui a.mrc b.mrc");
        assert_eq!(job.cwd, None);
    }

    #[test]
    fn tiff_micrographs_trigger_orientation_warning() {
        let tiffs = [Micrograph::new("a.TIF"), Micrograph::new("b.mrc")];
        assert_eq!(boxer_warnings(&tiffs).len(), 3);
        let mrcs = [Micrograph::new("a.mrc")];
        assert!(boxer_warnings(&mrcs).is_empty());
        assert!(boxer_warnings(&[] as &[Micrograph]).is_empty());
    }
}
