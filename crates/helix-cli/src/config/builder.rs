use super::defaults::DefaultsConfig;
use super::file::FileConfig;
use super::models::{SegmentAppConfig, SymmetrizeAppConfig};
use crate::cli::{SegmentationArgs, SymmetrizeArgs};
use crate::error::{CliError, Result};
use crate::utils::parser;
use helixkit::engine::config as core_config;
use helixkit::engine::error::EngineError;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub fn build_segment_config(
    args: &SegmentationArgs,
    cli_program_dir: Option<&Path>,
) -> Result<SegmentAppConfig> {
    let defaults = DefaultsConfig::default();
    let file_config = FileConfig::load(args.config.as_deref())?;
    let mut file_config = apply_set_values(file_config, &args.set_values)?;

    let seg_file = file_config.segmentation.take().unwrap_or_default();
    let box_size = args
        .box_size
        .or(seg_file.box_size)
        .unwrap_or(defaults.box_size);
    let overlap = args
        .overlap
        .or(seg_file.overlap)
        .unwrap_or(defaults.overlap);
    let output_format = args
        .format
        .map(Into::into)
        .or(seg_file.output_format)
        .unwrap_or(defaults.output_format);

    let core_config = core_config::SegmentationConfigBuilder::new()
        .box_size(box_size)
        .overlap(overlap)
        .output_format(output_format)
        .build()
        .map_err(EngineError::from)?;

    Ok(SegmentAppConfig {
        core_config,
        program_dir: resolve_program_dir(cli_program_dir, &file_config),
    })
}

pub fn build_symmetrize_config(
    args: &SymmetrizeArgs,
    cli_threads: Option<usize>,
    cli_program_dir: Option<&Path>,
) -> Result<SymmetrizeAppConfig> {
    let defaults = DefaultsConfig::default();
    let file_config = FileConfig::load(args.config.as_deref())?;
    let mut file_config = apply_set_values(file_config, &args.set_values)?;

    let sym_file = file_config.symmetrize.take().unwrap_or_default();
    let height_fraction = args
        .height_fraction
        .or(sym_file.height_fraction)
        .unwrap_or(defaults.height_fraction);
    let inner_radius = args
        .inner_radius
        .or(sym_file.inner_radius)
        .unwrap_or(defaults.inner_radius);
    let outer_radius = args
        .outer_radius
        .or(sym_file.outer_radius)
        .unwrap_or(defaults.outer_radius);
    let dihedral = args
        .dihedral
        .map(Into::into)
        .or(sym_file.dihedral)
        .unwrap_or(defaults.dihedral);
    let rot = args.rot.or(sym_file.rot).unwrap_or(defaults.rot);
    let z = args.z.or(sym_file.z).unwrap_or(defaults.z);
    let threads = cli_threads
        .or(sym_file.threads)
        .unwrap_or(defaults.threads);

    let mut builder = core_config::HelicalSearchConfigBuilder::new()
        .input_volume(args.input.clone())
        .output_dir(args.output_dir.clone())
        .sampling(args.sampling)
        .height_fraction(height_fraction)
        .inner_radius(inner_radius)
        .outer_radius(outer_radius)
        .dihedral(dihedral)
        .rot_range(rot)
        .z_range(z)
        .threads(threads);
    if let Some(height) = args.mask_height.or(sym_file.mask_height) {
        builder = builder.mask_height(height);
    }
    let core_config = builder.build().map_err(EngineError::from)?;

    Ok(SymmetrizeAppConfig {
        core_config,
        program_dir: resolve_program_dir(cli_program_dir, &file_config),
    })
}

pub fn resolve_program_dir(cli: Option<&Path>, file_config: &FileConfig) -> Option<PathBuf> {
    cli.map(Path::to_path_buf).or_else(|| {
        file_config
            .programs
            .as_ref()
            .and_then(|p| p.program_dir.clone())
    })
}

fn parse_value<T: FromStr>(key: &str, value: &str, kind: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid {} value for {}: {}", kind, key, value)))
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let (key, value_str) =
            parser::parse_key_value(kv_pair).map_err(|e| CliError::Config(e.to_string()))?;

        match key {
            "segmentation.box-size" => {
                config
                    .segmentation
                    .get_or_insert_with(Default::default)
                    .box_size = Some(parse_value(key, value_str, "integer")?);
            }
            "segmentation.overlap" => {
                config
                    .segmentation
                    .get_or_insert_with(Default::default)
                    .overlap = Some(parse_value(key, value_str, "float")?);
            }
            "segmentation.output-format" => {
                config
                    .segmentation
                    .get_or_insert_with(Default::default)
                    .output_format = Some(
                    parser::parse_variant(value_str, "box, star")
                        .map_err(|e| CliError::Config(e.to_string()))?,
                );
            }
            "symmetrize.height-fraction" => {
                config
                    .symmetrize
                    .get_or_insert_with(Default::default)
                    .height_fraction = Some(parse_value(key, value_str, "float")?);
            }
            "symmetrize.inner-radius" => {
                config
                    .symmetrize
                    .get_or_insert_with(Default::default)
                    .inner_radius = Some(parse_value(key, value_str, "integer")?);
            }
            "symmetrize.outer-radius" => {
                config
                    .symmetrize
                    .get_or_insert_with(Default::default)
                    .outer_radius = Some(parse_value(key, value_str, "integer")?);
            }
            "symmetrize.mask-height" => {
                config
                    .symmetrize
                    .get_or_insert_with(Default::default)
                    .mask_height = Some(parse_value(key, value_str, "integer")?);
            }
            "symmetrize.dihedral" => {
                config
                    .symmetrize
                    .get_or_insert_with(Default::default)
                    .dihedral = Some(
                    parser::parse_variant(value_str, "none, search, force-x")
                        .map_err(|e| CliError::Config(e.to_string()))?,
                );
            }
            "symmetrize.rot" | "symmetrize.z" => {
                let range =
                    parser::parse_range(value_str).map_err(|e| CliError::Config(e.to_string()))?;
                let sym = config.symmetrize.get_or_insert_with(Default::default);
                if key == "symmetrize.rot" {
                    sym.rot = Some(range);
                } else {
                    sym.z = Some(range);
                }
            }
            "symmetrize.threads" => {
                config
                    .symmetrize
                    .get_or_insert_with(Default::default)
                    .threads = Some(parse_value(key, value_str, "integer")?);
            }
            "programs.program-dir" => {
                config
                    .programs
                    .get_or_insert_with(Default::default)
                    .program_dir = Some(PathBuf::from(value_str));
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(config)
}
