use super::{GlobalOptions, Runner, micrograph_set};
use crate::cli::BoxArgs;
use crate::config;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use helixkit::engine::runner::JobRunner;
use helixkit::{engine::progress::ProgressReporter, workflows};
use tracing::{info, warn};

pub fn run(args: BoxArgs, globals: &GlobalOptions) -> Result<()> {
    if args.extra_dir == args.output_dir {
        return Err(CliError::Argument(
            "--extra-dir and --output-dir must differ; exported helices would be overwritten"
                .to_string(),
        ));
    }

    let app = config::build_segment_config(&args.segmentation, globals.program_dir.as_deref())?;
    let seg_config = app.core_config;
    let runner = Runner::new(globals.dry_run, app.program_dir.as_deref());
    let micrographs = micrograph_set(&args.micrographs, args.sampling);

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    if args.gui {
        let helix_width = args.helix_width.unwrap_or(seg_config.box_size);
        println!("Opening the helix boxer on {} micrograph(s)...", micrographs.len());
        workflows::boxing::pick_interactively(&runner, &micrographs, &args.extra_dir, helix_width)?;
    }

    info!("Exporting boxed helices to {:?}", &args.extra_dir);
    let boxing = workflows::boxing::export_filaments(
        &runner,
        &micrographs,
        &args.extra_dir,
        seg_config.box_size,
        &reporter,
    )?;

    if !boxing.failed.is_empty() {
        warn!("{} micrograph(s) could not be exported", boxing.failed.len());
        println!(
            "Warning: helix export failed on {} micrograph(s); they contribute no filaments.",
            boxing.failed.len()
        );
    }

    if !runner.executes() {
        runner.print_recorded();
        return Ok(());
    }

    let result = workflows::segment::segment_filaments(
        boxing.filaments,
        micrographs.sampling_rate(),
        &seg_config,
        &reporter,
    )?;
    let written = workflows::segment::write_coordinates(
        &result,
        &micrographs,
        &args.output_dir,
        seg_config.output_format,
    )?;

    println!(
        "✓ {} coordinate(s) from {} filament(s) written to {} file(s) in {}",
        result.coordinates.len(),
        result.filaments.len(),
        written.len(),
        args.output_dir.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::SegmentationArgs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn args(extra_dir: PathBuf, output_dir: PathBuf, gui: bool) -> BoxArgs {
        BoxArgs {
            micrographs: vec![PathBuf::from("TMV_001.mrc"), PathBuf::from("TMV_002.tif")],
            sampling: 1.0,
            extra_dir,
            output_dir,
            gui,
            helix_width: None,
            segmentation: SegmentationArgs {
                box_size: Some(80),
                ..Default::default()
            },
        }
    }

    #[test]
    fn same_extra_and_output_dir_is_rejected() {
        let dir = tempdir().unwrap();
        let same = dir.path().join("coords");
        let result = run(args(same.clone(), same, false), &GlobalOptions::default());
        assert!(matches!(result, Err(CliError::Argument(_))));
    }

    #[test]
    fn dry_run_only_records_the_boxer_jobs() {
        let dir = tempdir().unwrap();
        let extra = dir.path().join("extra");
        let output = dir.path().join("coords");
        let globals = GlobalOptions {
            dry_run: true,
            ..Default::default()
        };

        run(args(extra.clone(), output.clone(), true), &globals).unwrap();

        assert!(extra.is_dir());
        assert!(!output.exists());
    }
}
