use super::{GlobalOptions, micrograph_set};
use crate::cli::SegmentArgs;
use crate::config;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use helixkit::{engine::progress::ProgressReporter, workflows};
use tracing::{info, warn};

pub fn run(args: SegmentArgs, globals: &GlobalOptions) -> Result<()> {
    let app = config::build_segment_config(&args.segmentation, globals.program_dir.as_deref())?;
    let seg_config = app.core_config;
    let micrographs = micrograph_set(&args.micrographs, args.sampling);

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Segmenting filaments from {} file(s) on {} micrograph(s)...",
        args.filaments.len(),
        micrographs.len()
    );
    info!("Invoking the segmentation workflow...");
    let result = workflows::segment::run(&micrographs, &args.filaments, &seg_config, &reporter)?;

    for path in &result.unmatched {
        warn!("Skipped filament file without a matching micrograph: {:?}", path);
        println!("Warning: no micrograph matches {}", path.display());
    }

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
