use crate::core::alignment::AngleAssignment;
use crate::core::models::helix::HelicalParams;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{parameter}': {reason}")]
    Invalid {
        parameter: &'static str,
        reason: String,
    },
}

fn invalid(parameter: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        parameter,
        reason: reason.into(),
    }
}

fn validate_sampling(sampling: Option<f64>) -> Result<f64, ConfigError> {
    let sampling = sampling.ok_or(ConfigError::MissingParameter("sampling"))?;
    if !sampling.is_finite() || sampling <= 0.0 {
        return Err(invalid("sampling", format!("{sampling} Å/px is not positive")));
    }
    Ok(sampling)
}

fn validate_height_fraction(fraction: Option<f64>) -> Result<f64, ConfigError> {
    let fraction = fraction.unwrap_or(DEFAULT_HEIGHT_FRACTION);
    if !(fraction > 0.0 && fraction <= 1.0) {
        return Err(invalid("height_fraction", format!("{fraction} is outside (0, 1]")));
    }
    Ok(fraction)
}

fn validate_helix(helix: Option<HelicalParams>) -> Result<HelicalParams, ConfigError> {
    let helix = helix.ok_or(ConfigError::MissingParameter("helix"))?;
    if !(helix.rotation.is_finite() && helix.rise.is_finite()) {
        return Err(invalid("helix", "rotation and rise must be finite"));
    }
    Ok(helix)
}

/// An inclusive `start..=end` grid explored in steps of `step`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchRange {
    pub start: f64,
    pub end: f64,
    pub step: f64,
}

impl SearchRange {
    pub fn new(parameter: &'static str, start: f64, end: f64, step: f64) -> Result<Self, ConfigError> {
        Self { start, end, step }.validated(parameter)
    }

    pub fn validated(self, parameter: &'static str) -> Result<Self, ConfigError> {
        if !(self.start.is_finite() && self.end.is_finite() && self.step.is_finite()) {
            return Err(invalid(parameter, "range bounds must be finite"));
        }
        if self.start > self.end {
            return Err(invalid(
                parameter,
                format!("start {} is greater than end {}", self.start, self.end),
            ));
        }
        if self.step <= 0.0 {
            return Err(invalid(parameter, format!("step {} must be positive", self.step)));
        }
        Ok(self)
    }
}

/// File format for per-micrograph coordinate output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CoordinateFormat {
    /// EMAN particle `.box` files.
    #[default]
    Box,
    /// Relion coordinate STAR files carrying the helical tube id.
    Star,
}

impl CoordinateFormat {
    pub fn extension(self) -> &'static str {
        match self {
            CoordinateFormat::Box => "box",
            CoordinateFormat::Star => "star",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationConfig {
    pub box_size: u32,
    /// Overlap between consecutive boxes, in Angstroms.
    pub overlap: f64,
    pub output_format: CoordinateFormat,
}

#[derive(Default)]
pub struct SegmentationConfigBuilder {
    box_size: Option<u32>,
    overlap: Option<f64>,
    output_format: Option<CoordinateFormat>,
}

impl SegmentationConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn box_size(mut self, size: u32) -> Self {
        self.box_size = Some(size);
        self
    }
    pub fn overlap(mut self, angstroms: f64) -> Self {
        self.overlap = Some(angstroms);
        self
    }
    pub fn output_format(mut self, format: CoordinateFormat) -> Self {
        self.output_format = Some(format);
        self
    }

    pub fn build(self) -> Result<SegmentationConfig, ConfigError> {
        let box_size = self
            .box_size
            .ok_or(ConfigError::MissingParameter("box_size"))?;
        if box_size == 0 {
            return Err(invalid("box_size", "must be at least 1 pixel"));
        }
        let overlap = self.overlap.unwrap_or(0.0);
        if !overlap.is_finite() || overlap < 0.0 {
            return Err(invalid("overlap", format!("{overlap} is not a non-negative distance")));
        }
        Ok(SegmentationConfig {
            box_size,
            overlap,
            output_format: self.output_format.unwrap_or_default(),
        })
    }
}

/// How dihedral symmetry is established before the helical search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DihedralMode {
    #[default]
    None,
    /// Let Xmipp find the dihedral axis.
    Search,
    /// Assume the dihedral axis is X.
    ForceX,
}

impl DihedralMode {
    pub fn is_dihedral(self) -> bool {
        !matches!(self, DihedralMode::None)
    }
}

pub const DEFAULT_HEIGHT_FRACTION: f64 = 0.9;
pub const DEFAULT_ROT_RANGE: SearchRange = SearchRange {
    start: 0.0,
    end: 360.0,
    step: 5.0,
};
pub const DEFAULT_Z_RANGE: SearchRange = SearchRange {
    start: 0.0,
    end: 10.0,
    step: 0.5,
};
pub const DEFAULT_THREADS: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct HelicalSearchConfig {
    pub input_volume: PathBuf,
    pub output_dir: PathBuf,
    /// Å/px of the input volume.
    pub sampling: f64,
    pub height_fraction: f64,
    pub dihedral: DihedralMode,
    /// Cylinder radii in voxels; `-1` (or any non-positive value) disables
    /// the corresponding bound.
    pub inner_radius: i32,
    pub outer_radius: i32,
    /// Mask height in voxels. Falls back to the volume's X dimension.
    pub mask_height: Option<u32>,
    /// Rotation search grid, in degrees.
    pub rot: SearchRange,
    /// Axial shift search grid, in Angstroms.
    pub z: SearchRange,
    pub threads: usize,
}

#[derive(Default)]
pub struct HelicalSearchConfigBuilder {
    input_volume: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    sampling: Option<f64>,
    height_fraction: Option<f64>,
    dihedral: Option<DihedralMode>,
    inner_radius: Option<i32>,
    outer_radius: Option<i32>,
    mask_height: Option<u32>,
    rot: Option<SearchRange>,
    z: Option<SearchRange>,
    threads: Option<usize>,
}

impl HelicalSearchConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input_volume(mut self, path: PathBuf) -> Self {
        self.input_volume = Some(path);
        self
    }
    pub fn output_dir(mut self, path: PathBuf) -> Self {
        self.output_dir = Some(path);
        self
    }
    pub fn sampling(mut self, angstroms_per_pixel: f64) -> Self {
        self.sampling = Some(angstroms_per_pixel);
        self
    }
    pub fn height_fraction(mut self, fraction: f64) -> Self {
        self.height_fraction = Some(fraction);
        self
    }
    pub fn dihedral(mut self, mode: DihedralMode) -> Self {
        self.dihedral = Some(mode);
        self
    }
    pub fn inner_radius(mut self, voxels: i32) -> Self {
        self.inner_radius = Some(voxels);
        self
    }
    pub fn outer_radius(mut self, voxels: i32) -> Self {
        self.outer_radius = Some(voxels);
        self
    }
    pub fn mask_height(mut self, voxels: u32) -> Self {
        self.mask_height = Some(voxels);
        self
    }
    pub fn rot_range(mut self, range: SearchRange) -> Self {
        self.rot = Some(range);
        self
    }
    pub fn z_range(mut self, range: SearchRange) -> Self {
        self.z = Some(range);
        self
    }
    pub fn threads(mut self, n: usize) -> Self {
        self.threads = Some(n);
        self
    }

    pub fn build(self) -> Result<HelicalSearchConfig, ConfigError> {
        let sampling = validate_sampling(self.sampling)?;
        let height_fraction = validate_height_fraction(self.height_fraction)?;
        let threads = self.threads.unwrap_or(DEFAULT_THREADS);
        if threads == 0 {
            return Err(invalid("threads", "at least one thread is required"));
        }

        Ok(HelicalSearchConfig {
            input_volume: self
                .input_volume
                .ok_or(ConfigError::MissingParameter("input_volume"))?,
            output_dir: self
                .output_dir
                .ok_or(ConfigError::MissingParameter("output_dir"))?,
            sampling,
            height_fraction,
            dihedral: self.dihedral.unwrap_or_default(),
            inner_radius: self.inner_radius.unwrap_or(-1),
            outer_radius: self.outer_radius.unwrap_or(-1),
            mask_height: self.mask_height,
            rot: self.rot.unwrap_or(DEFAULT_ROT_RANGE).validated("rot")?,
            z: self.z.unwrap_or(DEFAULT_Z_RANGE).validated("z")?,
            threads,
        })
    }
}

/// Initial helical volume from 2D class averages.
#[derive(Debug, Clone, PartialEq)]
pub struct InitialVolumeConfig {
    /// Class averages as Xmipp image locations (`file` or `N@stack`).
    pub averages: Vec<String>,
    /// Particles of all classes (STAR or `.xmd`).
    pub particles: PathBuf,
    pub output_dir: PathBuf,
    pub sampling: f64,
    pub height_fraction: f64,
    pub helix: HelicalParams,
    /// Width of the horizontal alignment mask in pixels. Falls back to the X
    /// size of the first average.
    pub mask_width: Option<u32>,
    pub threads: usize,
    /// Seed for the random rotations, for reproducible runs.
    pub seed: Option<u64>,
}

#[derive(Default)]
pub struct InitialVolumeConfigBuilder {
    averages: Vec<String>,
    particles: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    sampling: Option<f64>,
    height_fraction: Option<f64>,
    helix: Option<HelicalParams>,
    mask_width: Option<u32>,
    threads: Option<usize>,
    seed: Option<u64>,
}

impl InitialVolumeConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn average(mut self, location: impl Into<String>) -> Self {
        self.averages.push(location.into());
        self
    }
    pub fn averages<I, S>(mut self, locations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.averages.extend(locations.into_iter().map(Into::into));
        self
    }
    pub fn particles(mut self, path: PathBuf) -> Self {
        self.particles = Some(path);
        self
    }
    pub fn output_dir(mut self, path: PathBuf) -> Self {
        self.output_dir = Some(path);
        self
    }
    pub fn sampling(mut self, angstroms_per_pixel: f64) -> Self {
        self.sampling = Some(angstroms_per_pixel);
        self
    }
    pub fn height_fraction(mut self, fraction: f64) -> Self {
        self.height_fraction = Some(fraction);
        self
    }
    pub fn helix(mut self, params: HelicalParams) -> Self {
        self.helix = Some(params);
        self
    }
    pub fn mask_width(mut self, pixels: u32) -> Self {
        self.mask_width = Some(pixels);
        self
    }
    pub fn threads(mut self, n: usize) -> Self {
        self.threads = Some(n);
        self
    }
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn build(self) -> Result<InitialVolumeConfig, ConfigError> {
        if self.averages.is_empty() {
            return Err(ConfigError::MissingParameter("averages"));
        }
        let sampling = validate_sampling(self.sampling)?;
        let height_fraction = validate_height_fraction(self.height_fraction)?;
        let helix = validate_helix(self.helix)?;
        if self.mask_width == Some(0) {
            return Err(invalid("mask_width", "must be at least 1 pixel"));
        }
        let threads = self.threads.unwrap_or(DEFAULT_THREADS);
        if threads == 0 {
            return Err(invalid("threads", "at least one thread is required"));
        }

        Ok(InitialVolumeConfig {
            averages: self.averages,
            particles: self
                .particles
                .ok_or(ConfigError::MissingParameter("particles"))?,
            output_dir: self
                .output_dir
                .ok_or(ConfigError::MissingParameter("output_dir"))?,
            sampling,
            height_fraction,
            helix,
            mask_width: self.mask_width,
            threads,
            seed: self.seed,
        })
    }
}

/// Relion options for one continued refinement iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RelionRefineOptions {
    /// Regularisation parameter T.
    pub tau2_fudge: f64,
    /// Adaptive oversampling order (0 = none, 1 = 2x, 2 = 4x).
    pub oversampling: u32,
    /// HEALPix order of the angular sampling.
    pub healpix_order: u32,
    /// Translational search radius in pixels.
    pub offset_range: f64,
    /// Translational search step in pixels.
    pub offset_step: f64,
    pub threads: usize,
}

impl Default for RelionRefineOptions {
    fn default() -> Self {
        Self {
            tau2_fudge: 2.0,
            oversampling: 1,
            healpix_order: 2,
            offset_range: 5.0,
            offset_step: 1.0,
            threads: 1,
        }
    }
}

impl RelionRefineOptions {
    fn validated(self) -> Result<Self, ConfigError> {
        if !(self.tau2_fudge.is_finite() && self.tau2_fudge > 0.0) {
            return Err(invalid("tau2_fudge", format!("{} is not positive", self.tau2_fudge)));
        }
        if !(self.offset_range.is_finite() && self.offset_range >= 0.0) {
            return Err(invalid("offset_range", format!("{} is negative", self.offset_range)));
        }
        if !(self.offset_step.is_finite() && self.offset_step > 0.0) {
            return Err(invalid("offset_step", format!("{} is not positive", self.offset_step)));
        }
        if self.threads == 0 {
            return Err(invalid("threads", "at least one thread is required"));
        }
        Ok(self)
    }
}

/// Iterative helical refinement: Relion refinement alternated with a local
/// Xmipp symmetry search and imposition.
#[derive(Debug, Clone, PartialEq)]
pub struct HelicalRefineConfig {
    /// Holds one `iter_NNN` directory per iteration.
    pub run_dir: PathBuf,
    pub solvent_mask: PathBuf,
    pub first_iteration: u32,
    pub last_iteration: u32,
    pub references: u32,
    pub sampling: f64,
    pub height_fraction: f64,
    pub dihedral: bool,
    /// Starting point of the local symmetry search.
    pub helix: HelicalParams,
    /// Tube mask radii and box size of the search, in voxels.
    pub inner_radius: i32,
    pub outer_radius: i32,
    pub image_size: u32,
    pub relion: RelionRefineOptions,
}

pub const DEFAULT_REFINE_INNER_RADIUS: i32 = 2;
pub const DEFAULT_REFINE_OUTER_RADIUS: i32 = 40;

#[derive(Default)]
pub struct HelicalRefineConfigBuilder {
    run_dir: Option<PathBuf>,
    solvent_mask: Option<PathBuf>,
    iterations: Option<(u32, u32)>,
    references: Option<u32>,
    sampling: Option<f64>,
    height_fraction: Option<f64>,
    dihedral: bool,
    helix: Option<HelicalParams>,
    inner_radius: Option<i32>,
    outer_radius: Option<i32>,
    image_size: Option<u32>,
    relion: Option<RelionRefineOptions>,
}

impl HelicalRefineConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run_dir(mut self, path: PathBuf) -> Self {
        self.run_dir = Some(path);
        self
    }
    pub fn solvent_mask(mut self, path: PathBuf) -> Self {
        self.solvent_mask = Some(path);
        self
    }
    /// Runs iterations `first..=last`.
    pub fn iterations(mut self, first: u32, last: u32) -> Self {
        self.iterations = Some((first, last));
        self
    }
    /// Continues after `completed` iterations up to `total`.
    pub fn continue_from(self, completed: u32, total: u32) -> Self {
        self.iterations(completed.saturating_add(1), total)
    }
    pub fn references(mut self, n: u32) -> Self {
        self.references = Some(n);
        self
    }
    pub fn sampling(mut self, angstroms_per_pixel: f64) -> Self {
        self.sampling = Some(angstroms_per_pixel);
        self
    }
    pub fn height_fraction(mut self, fraction: f64) -> Self {
        self.height_fraction = Some(fraction);
        self
    }
    pub fn dihedral(mut self, dihedral: bool) -> Self {
        self.dihedral = dihedral;
        self
    }
    pub fn helix(mut self, params: HelicalParams) -> Self {
        self.helix = Some(params);
        self
    }
    pub fn inner_radius(mut self, voxels: i32) -> Self {
        self.inner_radius = Some(voxels);
        self
    }
    pub fn outer_radius(mut self, voxels: i32) -> Self {
        self.outer_radius = Some(voxels);
        self
    }
    pub fn image_size(mut self, voxels: u32) -> Self {
        self.image_size = Some(voxels);
        self
    }
    pub fn relion(mut self, options: RelionRefineOptions) -> Self {
        self.relion = Some(options);
        self
    }

    pub fn build(self) -> Result<HelicalRefineConfig, ConfigError> {
        let sampling = validate_sampling(self.sampling)?;
        let height_fraction = validate_height_fraction(self.height_fraction)?;
        let helix = validate_helix(self.helix)?;

        let (first_iteration, last_iteration) = self.iterations.unwrap_or((1, 1));
        if first_iteration == 0 {
            return Err(invalid("iterations", "iterations are numbered from 1"));
        }
        if last_iteration < first_iteration {
            return Err(invalid(
                "iterations",
                format!(
                    "the total number of iterations must be greater than {} (the last completed iteration)",
                    first_iteration - 1
                ),
            ));
        }
        let references = self.references.unwrap_or(1);
        if references == 0 {
            return Err(invalid("references", "at least one reference is required"));
        }
        let image_size = self
            .image_size
            .ok_or(ConfigError::MissingParameter("image_size"))?;
        if image_size == 0 {
            return Err(invalid("image_size", "must be at least 1 voxel"));
        }
        let inner_radius = self.inner_radius.unwrap_or(DEFAULT_REFINE_INNER_RADIUS);
        let outer_radius = self.outer_radius.unwrap_or(DEFAULT_REFINE_OUTER_RADIUS);
        if outer_radius <= 0 || inner_radius >= outer_radius {
            return Err(invalid(
                "radius",
                format!("tube radii {inner_radius}..{outer_radius} do not describe a tube"),
            ));
        }

        Ok(HelicalRefineConfig {
            run_dir: self.run_dir.ok_or(ConfigError::MissingParameter("run_dir"))?,
            solvent_mask: self
                .solvent_mask
                .ok_or(ConfigError::MissingParameter("solvent_mask"))?,
            first_iteration,
            last_iteration,
            references,
            sampling,
            height_fraction,
            dihedral: self.dihedral,
            helix,
            inner_radius,
            outer_radius,
            image_size,
            relion: self.relion.unwrap_or_default().validated()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AngleAssignConfig {
    pub assignment: AngleAssignment,
    /// Table to update; defaults to `particles`, then to the first loop table.
    pub table: Option<String>,
    /// Seed for the rotation sampler, for reproducible runs.
    pub seed: Option<u64>,
}
