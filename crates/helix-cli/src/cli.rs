use crate::utils::parser;
use clap::{Args, Parser, Subcommand, ValueEnum};
use helixkit::engine::config::{CoordinateFormat, DihedralMode, SearchRange};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Olivia Pfeil-Gardiner, J.M. De la Rosa Trevin",
    version,
    about = "helixkit - Filament segmentation and helical symmetry search for cryo-EM helical reconstruction.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE); HELIXKIT_LOG overrides it
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Also write helixkit's debug log, including every external command line, to a file
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Number of threads passed to external programs that accept one.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,

    /// Print the external program command lines instead of running them.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Directory holding the external programs (e.g. $EMAN2DIR/bin).
    /// Overrides `programs.program-dir` from the config file.
    #[arg(long, global = true, value_name = "DIR")]
    pub program_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Cut picked filaments into overlapping particle coordinates.
    Segment(SegmentArgs),
    /// Search the helical rotation and rise of a volume and impose them.
    Symmetrize(SymmetrizeArgs),
    /// Set initial tilt and/or in-plane rotation angles on a particle STAR file.
    AssignAngles(AssignAnglesArgs),
    /// Pick helices with e2helixboxer.py and segment them into coordinates.
    Box(BoxArgs),
    /// Reconstruct a helical starting volume from 2D class averages.
    InitialVolume(InitialVolumeArgs),
    /// Continue a Relion refinement, imposing helical symmetry after each iteration.
    Refine(RefineArgs),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Box,
    Star,
}

impl From<FormatArg> for CoordinateFormat {
    fn from(f: FormatArg) -> Self {
        match f {
            FormatArg::Box => CoordinateFormat::Box,
            FormatArg::Star => CoordinateFormat::Star,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum DihedralArg {
    None,
    Search,
    ForceX,
}

impl From<DihedralArg> for DihedralMode {
    fn from(d: DihedralArg) -> Self {
        match d {
            DihedralArg::None => DihedralMode::None,
            DihedralArg::Search => DihedralMode::Search,
            DihedralArg::ForceX => DihedralMode::ForceX,
        }
    }
}

/// Segmentation settings shared by `segment` and `box`.
#[derive(Args, Debug, Clone, Default)]
pub struct SegmentationArgs {
    /// Particle box size in pixels.
    #[arg(short, long, value_name = "PX")]
    pub box_size: Option<u32>,

    /// Overlap between consecutive boxes along a filament, in Angstroms.
    #[arg(long, value_name = "ANGSTROM")]
    pub overlap: Option<f64>,

    /// Coordinate file format.
    #[arg(long, value_enum)]
    pub format: Option<FormatArg>,

    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S segmentation.overlap=20
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `segment` subcommand.
#[derive(Args, Debug)]
pub struct SegmentArgs {
    /// Micrographs the filaments were picked on.
    #[arg(short, long, required = true, num_args(1..), value_name = "PATH")]
    pub micrographs: Vec<PathBuf>,

    /// Filament files (EMAN helix coordinates or box pairs), matched to
    /// micrographs by file name.
    #[arg(short, long, required = true, num_args(1..), value_name = "PATH")]
    pub filaments: Vec<PathBuf>,

    /// Pixel size of the micrographs, in Angstroms per pixel.
    #[arg(long, required = true, value_name = "A/PX")]
    pub sampling: f64,

    /// Directory receiving one coordinate file per micrograph.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub output_dir: PathBuf,

    #[command(flatten)]
    pub segmentation: SegmentationArgs,
}

/// Arguments for the `symmetrize` subcommand.
#[derive(Args, Debug)]
pub struct SymmetrizeArgs {
    /// Input volume (any format Xmipp reads).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Output directory; `volume_symmetrized.vol` and `extra/` are created here.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Voxel size of the volume, in Angstroms per voxel.
    #[arg(long, required = true, value_name = "A/PX")]
    pub sampling: f64,

    /// Fraction of the volume height used for the symmetry search.
    #[arg(long, value_name = "FLOAT")]
    pub height_fraction: Option<f64>,

    /// Inner mask radius in voxels; <= 0 gives a solid cylinder.
    #[arg(long, allow_hyphen_values = true, value_name = "VOXELS")]
    pub inner_radius: Option<i32>,

    /// Outer mask radius in voxels; <= 0 disables masking.
    #[arg(long, allow_hyphen_values = true, value_name = "VOXELS")]
    pub outer_radius: Option<i32>,

    /// Mask height in voxels. Defaults to the X size of the volume.
    #[arg(long, value_name = "VOXELS")]
    pub mask_height: Option<u32>,

    /// Rotation search range in degrees.
    #[arg(long, value_parser = parse_range, allow_hyphen_values = true, value_name = "START:END:STEP")]
    pub rot: Option<SearchRange>,

    /// Rise search range in Angstroms.
    #[arg(long, value_parser = parse_range, allow_hyphen_values = true, value_name = "START:END:STEP")]
    pub z: Option<SearchRange>,

    /// Dihedral symmetry handling.
    #[arg(long, value_enum)]
    pub dihedral: Option<DihedralArg>,

    /// Write the imposed helical parameters to this TOML file.
    #[arg(long, value_name = "PATH")]
    pub params_out: Option<PathBuf>,

    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S symmetrize.rot=0:180:2
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `assign-angles` subcommand.
#[derive(Args, Debug)]
pub struct AssignAnglesArgs {
    /// Input particle STAR file.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Output STAR file.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Set the tilt angle of every particle to 90 degrees.
    #[arg(long)]
    pub tilt_90: bool,

    /// Draw a random in-plane rotation in [-180, 179] for every particle.
    #[arg(long)]
    pub random_rot: bool,

    /// Seed for the random rotation.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    /// Data block holding the particles. Defaults to `particles`, then to the
    /// first loop block.
    #[arg(long, value_name = "NAME")]
    pub table: Option<String>,
}

/// Arguments for the `box` subcommand.
#[derive(Args, Debug)]
pub struct BoxArgs {
    /// Micrographs to pick on.
    #[arg(short, long, required = true, num_args(1..), value_name = "PATH")]
    pub micrographs: Vec<PathBuf>,

    /// Pixel size of the micrographs, in Angstroms per pixel.
    #[arg(long, required = true, value_name = "A/PX")]
    pub sampling: f64,

    /// Directory receiving the exported helix files.
    #[arg(long, required = true, value_name = "DIR")]
    pub extra_dir: PathBuf,

    /// Directory receiving one coordinate file per micrograph.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Open the interactive boxer before exporting.
    #[arg(long)]
    pub gui: bool,

    /// Helix width shown in the interactive boxer, in pixels.
    /// Defaults to the box size.
    #[arg(long, value_name = "PX", requires = "gui")]
    pub helix_width: Option<u32>,

    #[command(flatten)]
    pub segmentation: SegmentationArgs,
}

/// Starting helical parameters shared by `initial-volume` and `refine`.
#[derive(Args, Debug, Clone)]
pub struct HelixArgs {
    /// Twist between consecutive subunits, in degrees.
    #[arg(long, required = true, allow_hyphen_values = true, value_name = "DEG")]
    pub rotation: f64,

    /// Axial rise between consecutive subunits, in Angstroms.
    #[arg(long, required = true, value_name = "ANGSTROM")]
    pub rise: f64,

    /// Fraction of the volume height used for symmetrization.
    #[arg(long, value_name = "FLOAT")]
    pub height_fraction: Option<f64>,
}

/// Arguments for the `initial-volume` subcommand.
#[derive(Args, Debug)]
pub struct InitialVolumeArgs {
    /// Class averages as image files or Xmipp locations (`N@stack.mrcs`).
    #[arg(short, long, required = true, num_args(1..), value_name = "LOCATION")]
    pub averages: Vec<String>,

    /// Particles of all classes (STAR or Xmipp metadata).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub particles: PathBuf,

    /// Output directory; the volumes and `extra/` are created here.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Pixel size of the averages, in Angstroms per pixel.
    #[arg(long, required = true, value_name = "A/PX")]
    pub sampling: f64,

    #[command(flatten)]
    pub helix: HelixArgs,

    /// Width of the horizontal alignment mask in pixels.
    /// Defaults to the X size of the first average.
    #[arg(long, value_name = "PX")]
    pub mask_width: Option<u32>,

    /// Seed for the random in-plane rotations.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,
}

/// Arguments for the `refine` subcommand.
#[derive(Args, Debug)]
pub struct RefineArgs {
    /// Run directory holding `iter_000/rnp_it000_optimiser.star` and one
    /// `iter_NNN` directory per completed iteration.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub run_dir: PathBuf,

    /// Solvent mask passed to Relion.
    #[arg(long, required = true, value_name = "PATH")]
    pub solvent_mask: PathBuf,

    /// Total number of iterations; refinement continues after the last
    /// completed one.
    #[arg(long, required = true, value_name = "N")]
    pub iterations: u32,

    /// Number of references (Relion classes).
    #[arg(long, value_name = "N")]
    pub references: Option<u32>,

    /// Voxel size of the references, in Angstroms per voxel.
    #[arg(long, required = true, value_name = "A/PX")]
    pub sampling: f64,

    /// Box size of the references, in voxels.
    #[arg(long, required = true, value_name = "VOXELS")]
    pub image_size: u32,

    #[command(flatten)]
    pub helix: HelixArgs,

    /// Search dihedral helical symmetry.
    #[arg(long)]
    pub dihedral: bool,

    /// Inner radius of the search mask in voxels.
    #[arg(long, allow_hyphen_values = true, value_name = "VOXELS")]
    pub inner_radius: Option<i32>,

    /// Outer radius of the search mask in voxels.
    #[arg(long, allow_hyphen_values = true, value_name = "VOXELS")]
    pub outer_radius: Option<i32>,

    /// TOML file with Relion options (tau2-fudge, oversampling, healpix-order,
    /// offset-range, offset-step).
    #[arg(long, value_name = "PATH")]
    pub relion_config: Option<PathBuf>,
}

fn parse_range(s: &str) -> Result<SearchRange, String> {
    parser::parse_range(s).map_err(|e| e.to_string())
}
