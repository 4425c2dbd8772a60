use crate::error::{CliError, Result};
use helixkit::engine::config::{CoordinateFormat, DihedralMode, SearchRange};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct FileSegmentationConfig {
    #[serde(rename = "box-size")]
    pub box_size: Option<u32>,
    pub overlap: Option<f64>,
    #[serde(rename = "output-format")]
    pub output_format: Option<CoordinateFormat>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileSymmetrizeConfig {
    pub height_fraction: Option<f64>,
    pub inner_radius: Option<i32>,
    pub outer_radius: Option<i32>,
    pub mask_height: Option<u32>,
    pub dihedral: Option<DihedralMode>,
    pub rot: Option<SearchRange>,
    pub z: Option<SearchRange>,
    pub threads: Option<usize>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct FileProgramsConfig {
    #[serde(rename = "program-dir")]
    pub program_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub segmentation: Option<FileSegmentationConfig>,
    pub symmetrize: Option<FileSymmetrizeConfig>,
    pub programs: Option<FileProgramsConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn parses_all_sections() {
        let config: FileConfig = toml::from_str(
            r#"
            [segmentation]
            box-size = 128
            overlap = 30.5
            output-format = "star"

            [symmetrize]
            height-fraction = 0.8
            inner-radius = -1
            outer-radius = 45
            dihedral = "force-x"
            rot = { start = 0.0, end = 180.0, step = 2.0 }
            threads = 16

            [programs]
            program-dir = "/opt/eman2/bin"
            "#,
        )
        .unwrap();

        let seg = config.segmentation.unwrap();
        assert_eq!(seg.box_size, Some(128));
        assert_eq!(seg.output_format, Some(CoordinateFormat::Star));
        let sym = config.symmetrize.unwrap();
        assert_eq!(sym.inner_radius, Some(-1));
        assert_eq!(sym.dihedral, Some(DihedralMode::ForceX));
        assert_eq!(sym.rot.map(|r| r.end), Some(180.0));
        assert!(sym.z.is_none());
        assert_eq!(
            config.programs.unwrap().program_dir,
            Some(PathBuf::from("/opt/eman2/bin"))
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result: std::result::Result<FileConfig, _> =
            toml::from_str("[segmentation]\nbox_size = 100\n");
        assert!(result.is_err());
    }

    #[test]
    fn from_file_reports_path_on_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[symmetrize]\ndihedral = \"sideways\"\n").unwrap();

        match FileConfig::from_file(&path) {
            Err(CliError::FileParsing { path: p, .. }) => assert_eq!(p, path),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn load_without_path_is_empty() {
        let config = FileConfig::load(None).unwrap();
        assert!(config.segmentation.is_none());
        assert!(config.symmetrize.is_none());
        assert!(config.programs.is_none());
    }
}
